use num::complex::Complex32;

use crate::ifreq::instantaneous_frequency;

/// Discontinuity threshold used to locate the chirp wrap-around in the
/// averaged instantaneous-frequency curve.
const DISCONTINUITY_THRESHOLD: f32 = 0.1;

/// Demodulates one symbol-length window of samples into its raw bin index,
/// before any rate adjustment or Gray coding. `ifreq_scratch` must be the
/// same length as `window`; it is overwritten with the window's
/// instantaneous-frequency curve.
pub fn demodulate_raw_bin(window: &[Complex32], n: usize, decim: usize, ifreq_scratch: &mut [f32]) -> u32 {
    assert_eq!(window.len(), n * decim, "window must span exactly N*decim samples");
    instantaneous_frequency(window, ifreq_scratch);

    let mut ifreq_avg = vec![0.0f32; n];
    for (bin, chunk) in ifreq_scratch.chunks_exact(decim).enumerate() {
        let sum: f32 = chunk.iter().sum();
        ifreq_avg[bin] = sum / decim as f32;
    }

    for i in 1..n {
        if ifreq_avg[i - 1] - ifreq_avg[i] > DISCONTINUITY_THRESHOLD {
            return ((n - (i + 1)) % n) as u32;
        }
    }

    if ifreq_avg[0] > ifreq_avg[n - 1] {
        0
    } else {
        n as u32
    }
}

/// Reduces a raw bin to the header-rate schedule: divide by 4 and wrap to `N/4`.
pub fn apply_reduced_rate(bin: u32, n: usize) -> u32 {
    let reduced_n = (n / 4) as u32;
    (bin / 4) % reduced_n
}

/// `g(n) = n XOR (n >> 1)`.
pub fn gray_encode(bin: u32) -> u32 {
    bin ^ (bin >> 1)
}

/// Inverse of [`gray_encode`].
pub fn gray_decode(word: u32) -> u32 {
    let mut bin = word;
    let mut shift = 1;
    while shift < 32 {
        bin ^= bin >> shift;
        shift <<= 1;
    }
    bin
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn gray_roundtrips(n: u32) -> bool {
        let n = n % (1 << 12);
        gray_decode(gray_encode(n)) == n
    }

    #[test]
    fn demodulates_clean_upchirp_rotation() {
        use lora_core::{DerivedParams, LoraConfig};
        use crate::chirp_bank::ChirpBank;

        let config = LoraConfig { sf: 7, ..LoraConfig::default() };
        let params = DerivedParams::new(&config).unwrap();
        let bank = ChirpBank::build(config.sample_rate, config.bandwidth, &params);

        for k in [0usize, 1, 5, 30, 100] {
            let shift = k * params.decim;
            let mut window = vec![Complex32::default(); params.samples_per_symbol];
            for i in 0..params.samples_per_symbol {
                window[i] = bank.upchirp[(i + shift) % params.samples_per_symbol];
            }
            let mut scratch = vec![0.0f32; params.samples_per_symbol];
            let bin = demodulate_raw_bin(&window, params.n, params.decim, &mut scratch);
            assert_eq!(bin as usize, k, "rotation by {k} bins should demodulate to bin {k}, got {bin}");
        }
    }
}
