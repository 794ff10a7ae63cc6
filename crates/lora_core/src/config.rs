use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Immutable configuration for a single LoRa decoder instance.
///
/// Every field here is read once at construction time; nothing in the
/// decoding pipeline reaches back into this struct afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoraConfig {
    /// Host sample rate after channelization, in Hz.
    pub sample_rate: f64,
    /// LoRa channel bandwidth, in Hz. Typically 125 000.
    pub bandwidth: f64,
    /// Spreading factor, `sf ∈ [7..12]`.
    pub sf: u32,
    /// Coding rate nibble, `cr ∈ [1..4]`. Only consulted directly in implicit mode;
    /// in explicit mode it is overwritten from the decoded PHY header.
    pub cr: u32,
    /// Skip header decoding; `cr`/`crc_present` below are used as configured.
    pub implicit_header: bool,
    /// Whether a payload-trailing MAC CRC is present. Only consulted in implicit mode.
    pub crc_present: bool,
    /// Force the low-data-rate optimization schedule regardless of `sf`.
    pub reduced_rate: bool,
    /// Disable per-symbol fine sync entirely.
    pub disable_drift_correction: bool,
    /// Network sync word, stamped into the LoRaTap header only.
    pub sync_word: u8,
    /// Center frequency in Hz, stamped into the LoRaTap header only.
    pub frequency: u32,
}

impl Default for LoraConfig {
    fn default() -> Self {
        Self {
            sample_rate: 1_000_000.0,
            bandwidth: 125_000.0,
            sf: 7,
            cr: 4,
            implicit_header: false,
            crc_present: true,
            reduced_rate: false,
            disable_drift_correction: false,
            sync_word: 0x34,
            frequency: 0,
        }
    }
}

impl LoraConfig {
    /// Validates the configuration, returning a typed error instead of aborting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(7..=12).contains(&self.sf) {
            return Err(ConfigError::SpreadingFactorOutOfRange(self.sf));
        }
        if !(1..=4).contains(&self.cr) {
            return Err(ConfigError::CodingRateOutOfRange(self.cr));
        }
        if self.sample_rate <= 0.0 {
            return Err(ConfigError::NonPositiveSampleRate(self.sample_rate));
        }
        if self.bandwidth <= 0.0 {
            return Err(ConfigError::NonPositiveBandwidth(self.bandwidth));
        }
        if self.sample_rate < self.bandwidth {
            return Err(ConfigError::SampleRateBelowBandwidth {
                sample_rate: self.sample_rate,
                bandwidth: self.bandwidth,
            });
        }
        Ok(())
    }

    /// Whether the reduced-rate (low-data-rate optimization) schedule is in effect.
    pub fn is_reduced_rate(&self) -> bool {
        self.reduced_rate || self.sf > 10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(LoraConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_sf() {
        let mut config = LoraConfig::default();
        config.sf = 6;
        assert_eq!(config.validate(), Err(ConfigError::SpreadingFactorOutOfRange(6)));
        config.sf = 13;
        assert_eq!(config.validate(), Err(ConfigError::SpreadingFactorOutOfRange(13)));
    }

    #[test]
    fn rejects_non_positive_rates() {
        let mut config = LoraConfig::default();
        config.sample_rate = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn reduced_rate_forced_above_sf10() {
        let mut config = LoraConfig::default();
        config.sf = 11;
        assert!(config.is_reduced_rate());
        config.sf = 10;
        config.reduced_rate = false;
        assert!(!config.is_reduced_rate());
    }
}
