/// Stereo feedback delay; the line is sized once in [`FeedbackDelay::new`].
#[derive(Clone, Debug)]
pub struct FeedbackDelay {
    left: Vec<f32>,
    right: Vec<f32>,
    write: usize,
    delay_samples: usize,
    feedback: f32,
    mix: f32,
}

impl FeedbackDelay {
    pub fn new(sample_rate: f32, time_seconds: f32, feedback: f32, mix: f32) -> Self {
        let delay_samples = ((sample_rate.max(1.0) * time_seconds.max(0.0)).round() as usize).max(1);
        Self {
            left: vec![0.0; delay_samples],
            right: vec![0.0; delay_samples],
            write: 0,
            delay_samples,
            feedback: feedback.clamp(-0.995, 0.995),
            mix: mix.clamp(0.0, 1.0),
        }
    }

    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// Seconds until the echoes decay below -60 dB.
    pub fn decay_seconds(&self, sample_rate: f32) -> f32 {
        let time = self.delay_samples as f32 / sample_rate.max(1.0);
        let feedback = self.feedback.abs();
        if feedback <= 1.0e-3 {
            return time;
        }
        let repeats = (1.0e-3f32).ln() / feedback.ln();
        time * (repeats + 1.0)
    }

    #[inline]
    pub fn process_sample(&mut self, input_l: f32, input_r: f32) -> (f32, f32) {
        let wet_l = self.left[self.write];
        let wet_r = self.right[self.write];
        let dry = 1.0 - self.mix;
        self.left[self.write] = input_l + wet_l * self.feedback;
        self.right[self.write] = input_r + wet_r * self.feedback;
        self.write = (self.write + 1) % self.delay_samples;
        (dry * input_l + self.mix * wet_l, dry * input_r + self.mix * wet_r)
    }

    pub fn clear(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
        self.write = 0;
    }
}
