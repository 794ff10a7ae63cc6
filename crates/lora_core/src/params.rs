use crate::config::LoraConfig;
use crate::error::ConfigError;

/// Derived constants for a LoRa configuration.
///
/// # Diagram
/// ```text
/// | symbol_period                      |
/// | sample | sample | ... | sample     |  (samples_per_symbol samples)
/// | <--------- decim --------->|               (decim = samples_per_symbol / N)
/// ```
///
/// `N` bins are packed into one symbol period; `decim` samples of the
/// waveform correspond to one bin's worth of instantaneous frequency.
#[derive(Debug, Clone, Copy)]
pub struct DerivedParams {
    /// Bins per symbol, `2^sf`.
    pub n: usize,
    /// Number of complex samples spanning one chirp symbol.
    pub samples_per_symbol: usize,
    /// Samples per bin, `samples_per_symbol / n`.
    pub decim: usize,
    /// Duration of one symbol, in seconds.
    pub symbol_period: f64,
}

impl DerivedParams {
    /// Derives `n`, `samples_per_symbol`, `decim` and `symbol_period` from a
    /// validated configuration.
    pub fn new(config: &LoraConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let n = 1usize << config.sf;
        let samples_per_symbol =
            ((config.sample_rate * n as f64) / config.bandwidth).round() as usize;
        assert!(samples_per_symbol >= n, "samples_per_symbol must cover at least one sample per bin");

        let decim = samples_per_symbol / n;
        let symbol_period = 1.0 / (config.bandwidth / n as f64);

        Ok(Self {
            n,
            samples_per_symbol,
            decim,
            symbol_period,
        })
    }

    /// Bits usable per symbol under the current rate schedule.
    pub fn ppm(&self, reduced_rate: bool) -> u32 {
        let sf = self.n.trailing_zeros();
        if reduced_rate {
            sf - 2
        } else {
            sf
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_expected_constants_for_sf7() {
        let config = LoraConfig {
            sample_rate: 1_000_000.0,
            bandwidth: 125_000.0,
            sf: 7,
            ..LoraConfig::default()
        };
        let params = DerivedParams::new(&config).unwrap();
        assert_eq!(params.n, 128);
        assert_eq!(params.samples_per_symbol, 1024);
        assert_eq!(params.decim, 8);
    }

    #[test]
    fn propagates_config_error() {
        let config = LoraConfig { sf: 20, ..LoraConfig::default() };
        assert!(DerivedParams::new(&config).is_err());
    }

    #[test]
    fn ppm_drops_by_two_under_reduced_rate() {
        let config = LoraConfig { sf: 10, ..LoraConfig::default() };
        let params = DerivedParams::new(&config).unwrap();
        assert_eq!(params.ppm(false), 10);
        assert_eq!(params.ppm(true), 8);
    }
}
