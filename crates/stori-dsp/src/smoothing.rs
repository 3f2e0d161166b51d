/// One-pole parameter smoother for automated gains.
#[derive(Clone, Copy, Debug)]
pub struct OnePole {
    coeff: f32,
    state: f32,
}

impl OnePole {
    #[inline]
    pub fn new(sample_rate: f32, time_ms: f32, initial: f32) -> Self {
        let mut smoother = Self {
            coeff: 1.0,
            state: initial,
        };
        smoother.set_time_ms(sample_rate, time_ms);
        smoother
    }

    #[inline]
    pub fn set_time_ms(&mut self, sample_rate: f32, time_ms: f32) {
        let tau = time_ms.max(0.0) * 0.001 * sample_rate.max(1.0);
        self.coeff = if tau <= 1.0 {
            1.0
        } else {
            (1.0 - (-1.0 / tau).exp()).clamp(0.0, 1.0)
        };
    }

    #[inline]
    pub fn reset(&mut self, value: f32) {
        self.state = value;
    }

    #[inline]
    pub fn next(&mut self, target: f32) -> f32 {
        self.state += self.coeff * (target - self.state);
        self.state
    }

    #[inline]
    pub fn state(&self) -> f32 {
        self.state
    }

    /// True once the smoother has converged on `target`.
    #[inline]
    pub fn is_settled(&self, target: f32) -> bool {
        (self.state - target).abs() <= 1.0e-6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settles_on_target() {
        let mut smoother = OnePole::new(48_000.0, 5.0, 0.0);
        let mut value = 0.0;
        for _ in 0..48_000 {
            value = smoother.next(1.0);
        }
        assert!((value - 1.0).abs() < 1e-5);
    }

    #[test]
    fn zero_time_jumps() {
        let mut smoother = OnePole::new(48_000.0, 0.0, 0.25);
        assert_eq!(smoother.next(0.75), 0.75);
        assert!(smoother.is_settled(0.75));
    }
}
