use num::complex::Complex32;

use crate::chirp_bank::ChirpBank;
use crate::circular_bucket::CircularBucket;
use crate::ifreq::instantaneous_frequency;

/// A command queued for the synchronizer to consume at the top of its next
/// call, replacing a mutable back-pointer into the owning decoder. Currently
/// `SetCfoHint` is the only producer: the decoder pushes a refined
/// carrier-offset estimate once the header is decoded.
pub enum Command {
    SetCfoHint(f32),
}

/// Correlation threshold for accepting a preamble autocorrelation peak.
pub const PREAMBLE_CORRELATION_THRESHOLD: f32 = 0.90;
/// Upper cross-correlation threshold for an upchirp/downchirp match at the SFD.
pub const SFD_UPCHIRP_THRESHOLD: f32 = 0.96;
/// Lower (negative) cross-correlation threshold identifying the downchirp half of the SFD.
pub const SFD_DOWNCHIRP_THRESHOLD: f32 = -0.97;
/// Number of consecutive failed SFD correlations before falling back to DETECT.
pub const MAX_CORRELATION_FAILURES: u32 = 4;

/// Drives preamble detection, coarse upchirp alignment, and SFD fine-sync.
/// Owns no frame- or header-level state; `lora_radio`'s decoder composes this
/// with a [`ChirpBank`] to run the full DETECT..STOP state machine.
pub struct Synchronizer {
    bank: ChirpBank,
    decim: usize,
    power_history: CircularBucket<f32>,
    corr_fails: u32,
    cfo_hint: f32,
    pending_commands: Vec<Command>,
}

impl Synchronizer {
    pub fn new(bank: ChirpBank, decim: usize) -> Self {
        Self {
            bank,
            decim,
            power_history: CircularBucket::new(4),
            corr_fails: 0,
            cfo_hint: 0.0,
            pending_commands: Vec::new(),
        }
    }

    /// Queues a command for the next `process`-style call to drain. Mirrors
    /// the decoder's own `process()` entry point: commands only take effect
    /// at a call boundary, never mid-symbol.
    pub fn push_command(&mut self, command: Command) {
        self.pending_commands.push(command);
    }

    /// Drains all queued commands. Call this first thing in any synchronizer
    /// entry point.
    pub fn drain_commands(&mut self) {
        for command in self.pending_commands.drain(..) {
            match command {
                Command::SetCfoHint(hint) => self.cfo_hint = hint,
            }
        }
    }

    pub fn cfo_hint(&self) -> f32 {
        self.cfo_hint
    }

    pub fn reset_correlation_failures(&mut self) {
        self.corr_fails = 0;
    }

    pub fn record_correlation_failure(&mut self) -> u32 {
        self.corr_fails += 1;
        self.corr_fails
    }

    pub fn correlation_failures(&self) -> u32 {
        self.corr_fails
    }

    /// Autocorrelation over one symbol length at lag `samples_per_symbol`,
    /// normalized by the geometric mean of the two windows' energies. A
    /// repeating preamble symbol produces a value near 1.0.
    pub fn detect_preamble(&self, window: &[Complex32]) -> f32 {
        let lag = self.bank.upchirp.len();
        autocorrelate(window, lag)
    }

    /// Unnormalized cross-correlation ("fast" variant) of `window` against
    /// the reference upchirp, used during coarse alignment.
    pub fn cross_correlate_upchirp_fast(&self, window: &[Complex32]) -> f32 {
        cross_correlate_fast(window, &self.bank.upchirp)
    }

    /// Normalized (Pearson) cross-correlation of `window`'s instantaneous
    /// frequency against the reference downchirp's, used at the SFD boundary
    /// where amplitude is unreliable but shape is not. The SFD is two
    /// downchirps, so a real match scores high against `downchirp_ifreq`; a
    /// window still sitting on preamble upchirps scores strongly negative.
    pub fn cross_correlate_sfd_ifreq(&self, window: &[Complex32], scratch: &mut [f32]) -> f32 {
        instantaneous_frequency(window, scratch);
        cross_correlate_ifreq(scratch, &self.bank.downchirp_ifreq)
    }

    /// Searches lags in `[-search_radius, search_radius]` around the
    /// reference offset `(bin + 1) * decim + samples_per_symbol` in the
    /// triple-concatenated upchirp IF, returning `fine_sync = -lag`: the
    /// drift correction to fold into the next sample consumption. `bin == -1`
    /// is the SFD-search convention (no coarse bin estimate yet), giving a
    /// reference offset of exactly `samples_per_symbol` (the middle copy).
    pub fn fine_sync(&self, window: &[Complex32], bin: i32, search_radius: usize, scratch: &mut [f32]) -> i32 {
        instantaneous_frequency(window, scratch);
        let reference = &self.bank.upchirp_ifreq_triple;
        let sps = self.bank.upchirp.len() as i32;
        let shift = (bin + 1) * self.decim as i32;
        let center = shift + sps;

        let mut best_lag = 0i32;
        let mut best_score = f32::MIN;
        for lag in -(search_radius as i32)..=(search_radius as i32) {
            let start = center + lag;
            if start < 0 {
                continue;
            }
            let start = start as usize;
            let end = start + scratch.len();
            if end > reference.len() {
                continue;
            }
            let score = cross_correlate_ifreq(scratch, &reference[start..end]);
            if score > best_score {
                best_score = score;
                best_lag = lag;
            }
        }
        -best_lag
    }

    pub fn bank(&self) -> &ChirpBank {
        &self.bank
    }

    pub fn push_power_sample(&mut self, power: f32) {
        self.power_history.consume(&[power], true);
    }

    /// The most recently pushed symbol energy, used as the signal-power term
    /// in the SNR computation.
    pub fn newest_power(&self) -> f32 {
        let len = self.power_history.length();
        if len == 0 { 0.0 } else { self.power_history[len - 1] }
    }

    /// The oldest surviving symbol energy in the ring, used as the
    /// noise-power term in the SNR computation.
    pub fn oldest_power(&self) -> f32 {
        if self.power_history.length() == 0 { 0.0 } else { self.power_history[0] }
    }
}

/// Fine-sync search radius used while hunting for the SFD (`bin = -1`):
/// `4 * decim` either side of the reference offset.
pub fn sfd_fine_sync_radius(decim: usize) -> usize {
    4 * decim
}

/// Fine-sync search radius used per payload/header symbol: `max(decim/4, 2)`.
pub fn payload_fine_sync_radius(decim: usize) -> usize {
    (decim / 4).max(2)
}

fn autocorrelate(samples: &[Complex32], lag: usize) -> f32 {
    if samples.len() < 2 * lag || lag == 0 {
        return 0.0;
    }
    let a = &samples[0..lag];
    let b = &samples[lag..2 * lag];

    let mut dot = Complex32::default();
    let mut energy_a = 0.0f32;
    let mut energy_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y.conj();
        energy_a += x.norm_sqr();
        energy_b += y.norm_sqr();
    }
    let denom = (energy_a * energy_b).sqrt();
    if denom <= f32::EPSILON {
        0.0
    } else {
        dot.norm() / denom
    }
}

fn cross_correlate_fast(a: &[Complex32], b: &[Complex32]) -> f32 {
    let len = a.len().min(b.len());
    let mut dot = Complex32::default();
    for i in 0..len {
        dot += a[i] * b[i].conj();
    }
    dot.norm() / len.max(1) as f32
}

fn cross_correlate_ifreq(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }
    let mean_a: f32 = a[..len].iter().sum::<f32>() / len as f32;
    let mean_b: f32 = b[..len].iter().sum::<f32>() / len as f32;

    let mut cov = 0.0f32;
    let mut var_a = 0.0f32;
    let mut var_b = 0.0f32;
    for i in 0..len {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    let denom = (var_a * var_b).sqrt();
    if denom <= f32::EPSILON {
        0.0
    } else {
        cov / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lora_core::{DerivedParams, LoraConfig};

    fn build_synchronizer(sf: u32) -> (Synchronizer, DerivedParams) {
        let config = LoraConfig { sf, ..LoraConfig::default() };
        let params = DerivedParams::new(&config).unwrap();
        let bank = ChirpBank::build(config.sample_rate, config.bandwidth, &params);
        (Synchronizer::new(bank, params.decim), params)
    }

    #[test]
    fn preamble_autocorrelation_is_near_one_for_repeated_upchirp() {
        let (sync, params) = build_synchronizer(7);
        let mut window = Vec::with_capacity(params.samples_per_symbol * 2);
        window.extend_from_slice(&sync.bank().upchirp);
        window.extend_from_slice(&sync.bank().upchirp);
        let score = sync.detect_preamble(&window);
        assert!(score > PREAMBLE_CORRELATION_THRESHOLD, "expected score above threshold, got {score}");
    }

    #[test]
    fn sfd_downchirp_gives_strongly_positive_ifreq_correlation() {
        let (sync, params) = build_synchronizer(7);
        let mut scratch = vec![0.0f32; params.samples_per_symbol];
        let score = sync.cross_correlate_sfd_ifreq(&sync.bank().downchirp.clone(), &mut scratch);
        assert!(score > SFD_UPCHIRP_THRESHOLD, "expected strongly positive correlation, got {score}");
    }

    #[test]
    fn sfd_upchirp_gives_strongly_negative_ifreq_correlation() {
        let (sync, params) = build_synchronizer(7);
        let mut scratch = vec![0.0f32; params.samples_per_symbol];
        let score = sync.cross_correlate_sfd_ifreq(&sync.bank().upchirp.clone(), &mut scratch);
        assert!(score < SFD_DOWNCHIRP_THRESHOLD, "expected strongly negative correlation, got {score}");
    }

    #[test]
    fn command_queue_applies_cfo_hint_on_drain() {
        let (mut sync, _params) = build_synchronizer(7);
        sync.push_command(Command::SetCfoHint(42.0));
        assert_eq!(sync.cfo_hint(), 0.0);
        sync.drain_commands();
        assert_eq!(sync.cfo_hint(), 42.0);
    }

    #[test]
    fn fine_sync_recovers_zero_lag_for_aligned_window() {
        let (sync, params) = build_synchronizer(7);
        let window = sync.bank().upchirp.clone();
        let mut scratch = vec![0.0f32; params.samples_per_symbol];
        let radius = sfd_fine_sync_radius(params.decim);
        let lag = sync.fine_sync(&window, -1, radius, &mut scratch);
        assert_eq!(lag, 0);
    }
}
