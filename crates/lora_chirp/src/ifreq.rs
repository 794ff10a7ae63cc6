use num::complex::Complex32;
use std::f32::consts::PI;

/// Instantaneous frequency: the first difference of the unwrapped phase,
/// normalized into `(-pi, pi]` at every step. Output has the same length as
/// `samples`; the final entry duplicates the one before it since there is no
/// following sample to difference against.
pub fn instantaneous_frequency(samples: &[Complex32], out: &mut [f32]) {
    assert_eq!(samples.len(), out.len(), "instantaneous frequency buffer must match input length");
    let n = samples.len();
    if n == 0 {
        return;
    }

    for i in 0..n.saturating_sub(1) {
        let delta = wrap_phase(samples[i + 1].arg() - samples[i].arg());
        out[i] = delta;
    }
    if n >= 2 {
        out[n - 1] = out[n - 2];
    } else {
        out[0] = 0.0;
    }
}

/// Mean instantaneous frequency of `window`, in Hz, at `sample_rate`. Called
/// on the aligned preamble upchirp, whose sweep is symmetric around 0 Hz by
/// construction, so the mean directly estimates carrier frequency offset.
pub fn estimate_cfo_hz(window: &[Complex32], sample_rate: f64, scratch: &mut [f32]) -> f32 {
    instantaneous_frequency(window, scratch);
    let n = scratch.len().saturating_sub(1);
    if n == 0 {
        return 0.0;
    }
    let mean: f32 = scratch[..n].iter().sum::<f32>() / n as f32;
    mean * (sample_rate as f32) / (2.0 * PI)
}

/// Wraps a phase difference into `(-pi, pi]`.
fn wrap_phase(mut delta: f32) -> f32 {
    while delta > PI {
        delta -= 2.0 * PI;
    }
    while delta <= -PI {
        delta += 2.0 * PI;
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_frequency_chirp_has_constant_ifreq() {
        // A complex exponential at a fixed normalized frequency has a
        // constant instantaneous-frequency curve (up to the wrap boundary).
        let freq = 0.1_f32;
        let samples: Vec<Complex32> = (0..64)
            .map(|i| Complex32::new(0.0, 2.0 * PI * freq * i as f32).exp())
            .collect();
        let mut ifreq = vec![0.0f32; samples.len()];
        instantaneous_frequency(&samples, &mut ifreq);
        for &value in &ifreq[..ifreq.len() - 1] {
            assert!((value - 2.0 * PI * freq).abs() < 1e-3);
        }
    }

    #[test]
    fn empty_input_does_not_panic() {
        let samples: Vec<Complex32> = vec![];
        let mut ifreq: Vec<f32> = vec![];
        instantaneous_frequency(&samples, &mut ifreq);
    }
}
