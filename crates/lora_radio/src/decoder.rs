use std::f32::consts::PI;

use num::complex::Complex32;
use tracing::{debug, trace};

use lora_chirp::chirp_bank::ChirpBank;
use lora_chirp::demodulator::{apply_reduced_rate, demodulate_raw_bin, gray_encode};
use lora_chirp::synchronizer::{
    payload_fine_sync_radius, sfd_fine_sync_radius, Synchronizer, MAX_CORRELATION_FAILURES,
    PREAMBLE_CORRELATION_THRESHOLD, SFD_DOWNCHIRP_THRESHOLD, SFD_UPCHIRP_THRESHOLD,
};
use lora_core::{ConfigError, DerivedParams, LoraConfig};
use lora_phy::{BlockDecoder, BlockKind};

use crate::loratap::LoraTapFrame;
use crate::phy_header::{PayloadSchedule, PhyHeader};
use crate::sink::FrameSink;

/// `DETECT..STOP` phases of the frame controller, in the order a frame moves
/// through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Detect,
    Sync,
    FindSfd,
    Pause,
    DecodeHeader,
    DecodePayload,
    Stop,
}

/// Header-derived coding rate the payload block decoder uses, shared between
/// explicit mode (parsed from the header) and implicit mode (from config).
struct ActivePayloadParams {
    cr: u32,
    has_mac_crc: bool,
}

/// Owns the full `DETECT..STOP` state machine: preamble acquisition, SFD
/// fine-sync, header parsing, and payload decode, publishing completed
/// frames to every registered [`FrameSink`].
pub struct LoraDecoder {
    config: LoraConfig,
    params: DerivedParams,
    synchronizer: Synchronizer,
    block_decoder: BlockDecoder,
    state: DecoderState,

    phy_header: Option<PhyHeader>,
    active_payload: Option<ActivePayloadParams>,
    payload_symbols_remaining: u32,
    payload_bytes: Vec<u8>,
    word_scratch: Vec<u32>,
    ifreq_scratch: Vec<f32>,

    /// Drift correction (samples) computed by the most recent fine-sync call,
    /// folded into the next state's sample consumption, then spent.
    fine_sync: i32,
    /// Running carrier-offset estimate (Hz), refreshed once per aligned
    /// preamble and used to derotate subsequent samples.
    cfo_estimate: f32,
    /// Carrier phase accumulator (radians) for the running CFO correction,
    /// continuous across `process()` calls.
    cfo_phase: f32,

    sinks: Vec<Box<dyn FrameSink>>,
    frames_emitted: u32,
    frames_dropped: u32,
}

impl LoraDecoder {
    pub fn new(config: LoraConfig) -> Result<Self, ConfigError> {
        let params = DerivedParams::new(&config)?;
        let bank = ChirpBank::build(config.sample_rate, config.bandwidth, &params);
        let synchronizer = Synchronizer::new(bank, params.decim);

        Ok(Self {
            config,
            ifreq_scratch: vec![0.0; params.samples_per_symbol],
            params,
            synchronizer,
            block_decoder: BlockDecoder::new(),
            state: DecoderState::Detect,
            phy_header: None,
            active_payload: None,
            payload_symbols_remaining: 0,
            payload_bytes: Vec::new(),
            word_scratch: Vec::new(),
            fine_sync: 0,
            cfo_estimate: 0.0,
            cfo_phase: 0.0,
            sinks: Vec::new(),
            frames_emitted: 0,
            frames_dropped: 0,
        })
    }

    pub fn register_sink(&mut self, sink: Box<dyn FrameSink>) {
        self.sinks.push(sink);
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn frames_emitted(&self) -> u32 {
        self.frames_emitted
    }

    pub fn frames_dropped(&self) -> u32 {
        self.frames_dropped
    }

    /// Most recently estimated carrier frequency offset, in Hz.
    pub fn cfo_estimate(&self) -> f32 {
        self.cfo_estimate
    }

    /// Forces the decoder into `STOP`; subsequent calls consume
    /// `samples_per_symbol` per invocation without producing output.
    pub fn stop(&mut self) {
        self.state = DecoderState::Stop;
    }

    /// Queues a corrected carrier-offset hint, drained at the top of the
    /// next `process` call and applied to every sample from then on. Exposed
    /// for a host that runs its own, better-informed CFO tracker; the
    /// decoder also pushes its own estimate here once per preamble lock.
    pub fn push_cfo_hint(&mut self, hint: f32) {
        self.synchronizer.push_command(lora_chirp::Command::SetCfoHint(hint));
    }

    /// Consumes as many whole symbols as `samples` allows, advancing the
    /// state machine and publishing any frames completed along the way.
    /// Returns the number of samples consumed.
    pub fn process(&mut self, samples: &[Complex32]) -> usize {
        self.synchronizer.drain_commands();

        let corrected;
        let mut remaining: &[Complex32] = samples;
        if self.synchronizer.cfo_hint() != 0.0 {
            corrected = self.correct_cfo(samples);
            remaining = &corrected;
        }

        let mut total_consumed = 0usize;
        loop {
            let state_before = self.state;
            let consumed = self.step(remaining);
            total_consumed += consumed;
            remaining = &remaining[consumed..];
            if consumed == 0 && self.state == state_before {
                break;
            }
        }
        total_consumed
    }

    /// Derotates `samples` by the synchronizer's queued CFO hint, grounded on
    /// the source's `correct_cfo` phase-ramp formula. `cfo_phase` carries the
    /// ramp continuously across calls so consecutive chunks stay in phase.
    fn correct_cfo(&mut self, samples: &[Complex32]) -> Vec<Complex32> {
        let step = -2.0 * PI * self.synchronizer.cfo_hint() / self.config.sample_rate as f32;
        samples
            .iter()
            .map(|&sample| {
                let rotated = sample * Complex32::new(self.cfo_phase.cos(), self.cfo_phase.sin());
                self.cfo_phase += step;
                if self.cfo_phase > PI {
                    self.cfo_phase -= 2.0 * PI;
                } else if self.cfo_phase <= -PI {
                    self.cfo_phase += 2.0 * PI;
                }
                rotated
            })
            .collect()
    }

    fn step(&mut self, remaining: &[Complex32]) -> usize {
        match self.state {
            DecoderState::Detect => self.step_detect(remaining),
            DecoderState::Sync => self.step_sync(remaining),
            DecoderState::FindSfd => self.step_find_sfd(remaining),
            DecoderState::Pause => self.step_pause(remaining),
            DecoderState::DecodeHeader => self.step_decode_header(remaining),
            DecoderState::DecodePayload => self.step_decode_payload(remaining),
            DecoderState::Stop => self.step_stop(remaining),
        }
    }

    fn step_detect(&mut self, remaining: &[Complex32]) -> usize {
        let sps = self.params.samples_per_symbol;
        let need = 2 * sps;
        if remaining.len() < need {
            return 0;
        }
        let window = &remaining[..need];
        let score = self.synchronizer.detect_preamble(window);
        if score >= PREAMBLE_CORRELATION_THRESHOLD {
            let energy: f32 = window[..sps].iter().map(Complex32::norm_sqr).sum();
            self.synchronizer.push_power_sample(energy);
            trace!(score, energy, "preamble detected");
            self.state = DecoderState::Sync;
        }
        sps
    }

    fn step_sync(&mut self, remaining: &[Complex32]) -> usize {
        let sps = self.params.samples_per_symbol;
        let need = 2 * sps;
        if remaining.len() < need {
            return 0;
        }
        let window = &remaining[..need];

        let mut best_offset = 0usize;
        let mut best_score = f32::MIN;
        for offset in 0..sps {
            let score = self.synchronizer.cross_correlate_upchirp_fast(&window[offset..offset + sps]);
            if score > best_score {
                best_score = score;
                best_offset = offset;
            }
        }
        let aligned = &window[best_offset..best_offset + sps];
        self.cfo_estimate = lora_chirp::ifreq::estimate_cfo_hz(aligned, self.config.sample_rate, &mut self.ifreq_scratch);
        self.push_cfo_hint(self.cfo_estimate);
        debug!(best_offset, best_score, cfo_estimate = self.cfo_estimate, "upchirp alignment");
        self.state = DecoderState::FindSfd;
        best_offset
    }

    /// Start-of-frame delimiter search (spec §4.2's three-way correlation
    /// table). The middle branch means the window is still upchirps: it
    /// keeps searching (stays in `FindSfd`) rather than acquiring, running
    /// fine-sync to nudge the next window toward the true chirp edge.
    fn step_find_sfd(&mut self, remaining: &[Complex32]) -> usize {
        let sps = self.params.samples_per_symbol;
        if remaining.len() < sps {
            return 0;
        }
        let window = &remaining[..sps];
        let correlation = self.synchronizer.cross_correlate_sfd_ifreq(window, &mut self.ifreq_scratch);

        self.fine_sync = 0;
        if correlation > SFD_UPCHIRP_THRESHOLD {
            self.synchronizer.reset_correlation_failures();
            self.state = DecoderState::Pause;
            debug!(correlation, "sfd acquired");
        } else if correlation < SFD_DOWNCHIRP_THRESHOLD {
            if !self.config.disable_drift_correction {
                let radius = sfd_fine_sync_radius(self.params.decim);
                self.fine_sync = self.synchronizer.fine_sync(window, -1, radius, &mut self.ifreq_scratch);
            }
            self.synchronizer.reset_correlation_failures();
            trace!(correlation, fine_sync = self.fine_sync, "still upchirps, fine sync and keep searching");
        } else {
            let fails = self.synchronizer.record_correlation_failure();
            if fails > MAX_CORRELATION_FAILURES {
                trace!(fails, "sfd search abandoned, reverting to detect");
                self.synchronizer.reset_correlation_failures();
                self.state = DecoderState::Detect;
            }
        }

        let consumed = (sps as i32 + self.fine_sync).max(1) as usize;
        consumed.min(remaining.len())
    }

    fn step_pause(&mut self, remaining: &[Complex32]) -> usize {
        let sps = self.params.samples_per_symbol;
        let need = sps + sps / 4;
        if remaining.len() < need {
            return 0;
        }
        if self.config.implicit_header {
            self.active_payload = Some(ActivePayloadParams {
                cr: self.config.cr,
                has_mac_crc: self.config.crc_present,
            });
            self.payload_symbols_remaining = 1;
            self.state = DecoderState::DecodePayload;
        } else {
            self.state = DecoderState::DecodeHeader;
        }
        need
    }

    fn step_decode_header(&mut self, remaining: &[Complex32]) -> usize {
        const HEADER_CR: u32 = 4;
        let symbols_per_block = HEADER_CR + 4;
        let sps = self.params.samples_per_symbol;
        let need = sps * symbols_per_block as usize;
        let total_need = self.next_block_consume(need);
        if remaining.len() < need.max(total_need) {
            return 0;
        }

        self.word_scratch.clear();
        self.fine_sync = 0;
        for symbol in remaining.chunks_exact(sps).take(symbols_per_block as usize) {
            let bin = demodulate_raw_bin(symbol, self.params.n, self.params.decim, &mut self.ifreq_scratch);
            self.update_fine_sync(symbol, bin);
            let reduced = apply_reduced_rate(bin, self.params.n);
            self.word_scratch.push(gray_encode(reduced));
        }

        let header_ppm = self.params.ppm(true);
        let decoded = self.block_decoder.decode_block(
            &self.word_scratch,
            header_ppm,
            HEADER_CR,
            BlockKind::Header,
            true,
            false,
        );

        if decoded.len() < 3 {
            debug!("header block too short, reverting to detect");
            self.reset_to_detect();
            return total_need.min(remaining.len());
        }

        let header = PhyHeader::parse([decoded[0], decoded[1], decoded[2]]);
        let schedule = PayloadSchedule::compute(&header, self.config.sf, self.config.is_reduced_rate());
        debug!(length = header.length, cr = header.cr, blocks = schedule.blocks_needed, "header parsed");

        self.active_payload = Some(ActivePayloadParams { cr: header.cr, has_mac_crc: header.has_mac_crc });
        self.payload_symbols_remaining = schedule.payload_symbols_remaining;
        self.phy_header = Some(header);
        self.state = DecoderState::DecodePayload;
        total_need.min(remaining.len())
    }

    /// Folds the previous block's accumulated drift correction into this
    /// block's base consumption, per spec §4.3 step 4: `fine_sync` is added
    /// to the *next* consume count, not the block it was measured in.
    fn next_block_consume(&self, need: usize) -> usize {
        (need as i32 + self.fine_sync).max(need as i32 / 2) as usize
    }

    /// Per-symbol drift update (spec §4.3 step 4). Overwrites `fine_sync`
    /// with the lag measured against this symbol's coarse bin estimate; the
    /// value surviving after the last symbol in the block carries forward to
    /// the next block's consumption.
    fn update_fine_sync(&mut self, symbol: &[Complex32], bin: u32) {
        if self.config.disable_drift_correction {
            return;
        }
        let radius = payload_fine_sync_radius(self.params.decim);
        self.fine_sync = self.synchronizer.fine_sync(symbol, bin as i32, radius, &mut self.ifreq_scratch);
    }

    fn step_decode_payload(&mut self, remaining: &[Complex32]) -> usize {
        let Some(active) = &self.active_payload else {
            self.reset_to_detect();
            return 0;
        };
        let cr = active.cr;
        let symbols_per_block = cr + 4;
        let sps = self.params.samples_per_symbol;
        let need = sps * symbols_per_block as usize;
        let total_need = self.next_block_consume(need);
        if remaining.len() < need.max(total_need) {
            return 0;
        }

        let reduced_rate = self.config.is_reduced_rate();
        self.word_scratch.clear();
        self.fine_sync = 0;
        for symbol in remaining.chunks_exact(sps).take(symbols_per_block as usize) {
            let raw_bin = demodulate_raw_bin(symbol, self.params.n, self.params.decim, &mut self.ifreq_scratch);
            self.update_fine_sync(symbol, raw_bin);
            let bin = if reduced_rate { apply_reduced_rate(raw_bin, self.params.n) } else { raw_bin };
            self.word_scratch.push(gray_encode(bin));
        }

        let ppm = self.params.ppm(reduced_rate);
        let decoded = self.block_decoder.decode_block(
            &self.word_scratch,
            ppm,
            cr,
            BlockKind::Payload,
            reduced_rate,
            self.config.implicit_header,
        );
        self.payload_bytes.extend_from_slice(&decoded);
        self.payload_symbols_remaining = self.payload_symbols_remaining.saturating_sub(symbols_per_block);

        if self.payload_symbols_remaining == 0 {
            self.emit_frame();
        }
        total_need.min(remaining.len())
    }

    fn step_stop(&mut self, remaining: &[Complex32]) -> usize {
        self.params.samples_per_symbol.min(remaining.len())
    }

    fn emit_frame(&mut self) {
        let signal_power = self.synchronizer.newest_power();
        let noise_power = self.synchronizer.oldest_power().max(f32::MIN_POSITIVE);
        let snr_linear = signal_power / noise_power;

        let has_mac_crc = self.active_payload.as_ref().map(|p| p.has_mac_crc).unwrap_or(false);
        let cr = self.active_payload.as_ref().map(|p| p.cr).unwrap_or(self.config.cr);
        let length = (self.payload_bytes.len() as u8).saturating_sub(if has_mac_crc { 2 } else { 0 });

        let header = self.phy_header.unwrap_or(PhyHeader {
            length,
            has_mac_crc,
            cr,
            crc_nibbles: 0,
            reserved: 0,
        });
        if self.payload_bytes.len() > header.payload_length() {
            self.payload_bytes.truncate(header.payload_length());
        }

        let rssi = LoraTapFrame::encode_rssi(10.0 * signal_power.max(f32::MIN_POSITIVE).log10());
        let frame = LoraTapFrame {
            channel_frequency: self.config.frequency,
            channel_bandwidth: (self.config.bandwidth / 125_000.0).round() as u8,
            channel_sf: self.config.sf as u8,
            rssi_packet: rssi,
            rssi_max: rssi,
            rssi_current: rssi,
            snr: LoraTapFrame::encode_snr(snr_linear),
            sync_word: self.config.sync_word,
            phy_header: header,
            payload: std::mem::take(&mut self.payload_bytes),
        };

        for sink in &self.sinks {
            sink.publish(&frame);
        }
        self.frames_emitted += 1;
        debug!(frames_emitted = self.frames_emitted, payload_len = frame.payload.len(), "frame emitted");
        self.reset_to_detect();
    }

    fn reset_to_detect(&mut self) {
        self.phy_header = None;
        self.active_payload = None;
        self.payload_symbols_remaining = 0;
        self.payload_bytes.clear();
        self.word_scratch.clear();
        self.fine_sync = 0;
        self.state = DecoderState::Detect;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> LoraConfig {
        LoraConfig { sf: 7, implicit_header: true, cr: 4, crc_present: false, ..LoraConfig::default() }
    }

    #[test]
    fn constructs_and_starts_in_detect() {
        let decoder = LoraDecoder::new(test_config()).unwrap();
        assert_eq!(decoder.state(), DecoderState::Detect);
    }

    #[test]
    fn stop_makes_process_a_noop_consumer() {
        let mut decoder = LoraDecoder::new(test_config()).unwrap();
        decoder.stop();
        let samples = vec![Complex32::default(); decoder.params.samples_per_symbol * 2];
        let consumed = decoder.process(&samples);
        assert_eq!(consumed, decoder.params.samples_per_symbol);
        assert_eq!(decoder.state(), DecoderState::Stop);
    }

    #[test]
    fn detect_advances_by_one_symbol_on_silence() {
        let mut decoder = LoraDecoder::new(test_config()).unwrap();
        let sps = decoder.params.samples_per_symbol;
        let silence = vec![Complex32::default(); sps * 2];
        let consumed = decoder.process(&silence);
        assert_eq!(consumed, sps);
        assert_eq!(decoder.state(), DecoderState::Detect);
    }

    #[test]
    fn clean_preamble_window_advances_past_detect() {
        let mut decoder = LoraDecoder::new(test_config()).unwrap();
        let sps = decoder.params.samples_per_symbol;
        let upchirp = decoder.synchronizer.bank().upchirp.clone();
        let mut window = Vec::with_capacity(sps * 2);
        window.extend_from_slice(&upchirp);
        window.extend_from_slice(&upchirp);
        decoder.process(&window);
        assert_eq!(decoder.state(), DecoderState::Sync);
    }
}
