use thiserror::Error;

/// Fatal configuration problems, surfaced from the constructor. Nothing in this
/// crate aborts the process; a bad configuration simply never becomes a decoder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("spreading factor {0} is out of range [7..12]")]
    SpreadingFactorOutOfRange(u32),
    #[error("coding rate {0} is out of range [1..4]")]
    CodingRateOutOfRange(u32),
    #[error("sample rate must be positive, got {0} Hz")]
    NonPositiveSampleRate(f64),
    #[error("bandwidth must be positive, got {0} Hz")]
    NonPositiveBandwidth(f64),
    #[error("sample rate ({sample_rate} Hz) must be at least the bandwidth ({bandwidth} Hz)")]
    SampleRateBelowBandwidth { sample_rate: f64, bandwidth: f64 },
}
