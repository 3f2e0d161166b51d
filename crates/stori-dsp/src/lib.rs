pub mod biquad;
pub mod delay;
pub mod eq;
pub mod gain;
pub mod limiter;
pub mod oscillator;
pub mod pan;
pub mod smoothing;

pub use delay::FeedbackDelay;
pub use eq::{EqBand, ThreeBandEq};
pub use limiter::PeakLimiter;
pub use oscillator::Waveform;
pub use smoothing::OnePole;
