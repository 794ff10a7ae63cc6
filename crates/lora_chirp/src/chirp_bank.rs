use num::complex::Complex32;

use lora_core::DerivedParams;

use crate::ifreq::instantaneous_frequency;

/// Ideal reference chirps for a spreading factor, built once and frozen.
///
/// # Diagram
/// ```text
/// upchirp:   -bw/2 ------------------> +bw/2   (one symbol period)
/// downchirp: +bw/2 ------------------> -bw/2   (the conjugate sweep)
/// ```
pub struct ChirpBank {
    pub upchirp: Vec<Complex32>,
    pub downchirp: Vec<Complex32>,
    pub upchirp_ifreq: Vec<f32>,
    pub downchirp_ifreq: Vec<f32>,
    /// Three concatenated copies of `upchirp_ifreq`, wide enough for a
    /// fine-sync search window spanning a symbol boundary.
    pub upchirp_ifreq_triple: Vec<f32>,
}

impl ChirpBank {
    pub fn build(config_sample_rate: f64, bandwidth: f64, params: &DerivedParams) -> Self {
        let n = params.samples_per_symbol;
        let dt = 1.0 / config_sample_rate;
        let symbols_per_second = bandwidth / params.n as f64;
        let sweep_rate = -0.5 * bandwidth * symbols_per_second;
        let f0 = bandwidth / 2.0;

        let mut upchirp = vec![Complex32::default(); n];
        let mut downchirp = vec![Complex32::default(); n];
        let amplitude = Complex32::new(1.0, 1.0);

        for i in 0..n {
            let t = dt * i as f64;
            let phase = 2.0 * std::f64::consts::PI * t * (f0 + sweep_rate * t);
            downchirp[i] = amplitude * Complex32::new(0.0, phase as f32).exp();
            upchirp[i] = amplitude * Complex32::new(0.0, -phase as f32).exp();
        }

        let mut upchirp_ifreq = vec![0.0f32; n];
        let mut downchirp_ifreq = vec![0.0f32; n];
        instantaneous_frequency(&upchirp, &mut upchirp_ifreq);
        instantaneous_frequency(&downchirp, &mut downchirp_ifreq);

        let mut upchirp_triple = vec![Complex32::default(); n * 3];
        upchirp_triple[0..n].copy_from_slice(&upchirp);
        upchirp_triple[n..2 * n].copy_from_slice(&upchirp);
        upchirp_triple[2 * n..3 * n].copy_from_slice(&upchirp);
        let mut upchirp_ifreq_triple = vec![0.0f32; n * 3];
        instantaneous_frequency(&upchirp_triple, &mut upchirp_ifreq_triple);

        Self {
            upchirp,
            downchirp,
            upchirp_ifreq,
            downchirp_ifreq,
            upchirp_ifreq_triple,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lora_core::LoraConfig;

    fn build_for_sf(sf: u32) -> (ChirpBank, DerivedParams) {
        let config = LoraConfig { sf, ..LoraConfig::default() };
        let params = DerivedParams::new(&config).unwrap();
        let bank = ChirpBank::build(config.sample_rate, config.bandwidth, &params);
        (bank, params)
    }

    #[test]
    fn chirp_lengths_match_samples_per_symbol() {
        for sf in 7..=12 {
            let (bank, params) = build_for_sf(sf);
            assert_eq!(bank.upchirp.len(), params.samples_per_symbol);
            assert_eq!(bank.downchirp.len(), params.samples_per_symbol);
            assert_eq!(bank.upchirp_ifreq.len(), params.samples_per_symbol);
            assert_eq!(bank.upchirp_ifreq_triple.len(), params.samples_per_symbol * 3);
        }
    }

    #[test]
    fn upchirp_and_downchirp_ifreq_are_negations() {
        let (bank, _params) = build_for_sf(7);
        for (&up, &down) in bank.upchirp_ifreq.iter().zip(bank.downchirp_ifreq.iter()) {
            assert!((up + down).abs() < 1e-3);
        }
    }
}
