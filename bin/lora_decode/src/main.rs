use std::io::{BufWriter, Read, Write};

use clap::Parser;
use num::complex::Complex32;

use lora_core::LoraConfig;
use lora_radio::sink::FrameSink;
use lora_radio::{LoraDecoder, LoraTapFrame};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct AppArguments {
    /// Host sample rate in Hz.
    #[arg(long, default_value_t = 1_000_000.0)]
    sample_rate: f64,
    /// LoRa channel bandwidth in Hz.
    #[arg(long, default_value_t = 125_000.0)]
    bandwidth: f64,
    /// Spreading factor, 7 to 12.
    #[arg(long, default_value_t = 7)]
    sf: u32,
    /// Decode without a PHY header, using --cr and --crc-present instead.
    #[arg(long)]
    implicit_header: bool,
    /// Coding rate, 1 to 4. Only consulted in implicit-header mode.
    #[arg(long, default_value_t = 4)]
    cr: u32,
    /// Whether the payload carries a MAC CRC. Only consulted in implicit-header mode.
    #[arg(long)]
    crc_present: bool,
    /// Force the low-data-rate optimization regardless of spreading factor.
    #[arg(long)]
    reduced_rate: bool,
    /// Number of IQ samples to read per input chunk.
    #[arg(short, long, default_value_t = 4096 * 8)]
    number_of_input_samples: usize,
    /// Input filepath carrying interleaved f32 IQ samples. Reads stdin by default.
    #[arg(short, long)]
    input_filepath: Option<String>,
    /// Output filepath for LoRaTap frames. Writes stdout by default.
    #[arg(short, long)]
    output_filepath: Option<String>,
}

struct WriterSink<W: Write> {
    writer: std::sync::Mutex<W>,
}

impl<W: Write> FrameSink for WriterSink<W> {
    fn publish(&self, frame: &LoraTapFrame) {
        let bytes = frame.to_bytes();
        if let Err(err) = self.writer.lock().unwrap().write_all(&bytes) {
            tracing::warn!(%err, "failed to write LoRaTap frame");
        }
    }
}

fn main() -> Result<(), String> {
    tracing_subscriber::fmt::init();
    let args = AppArguments::parse();

    let config = LoraConfig {
        sample_rate: args.sample_rate,
        bandwidth: args.bandwidth,
        sf: args.sf,
        cr: args.cr,
        implicit_header: args.implicit_header,
        crc_present: args.crc_present,
        reduced_rate: args.reduced_rate,
        ..LoraConfig::default()
    };

    let mut decoder = LoraDecoder::new(config).map_err(|err| err.to_string())?;

    let mut input_file: Box<dyn Read> = match &args.input_filepath {
        None => Box::new(std::io::stdin()),
        Some(filepath) => match std::fs::File::open(filepath) {
            Ok(file) => Box::new(file),
            Err(err) => return Err(format!("Failed to open input file {}: {}", filepath, err)),
        },
    };
    let output_file: Box<dyn Write> = match &args.output_filepath {
        None => Box::new(BufWriter::new(std::io::stdout())),
        Some(filepath) => match std::fs::File::create(filepath) {
            Ok(file) => Box::new(BufWriter::new(file)),
            Err(err) => return Err(format!("Failed to open output file {}: {}", filepath, err)),
        },
    };
    decoder.register_sink(Box::new(WriterSink { writer: std::sync::Mutex::new(output_file) }));

    // Samples arrive as interleaved little-endian f32 IQ pairs.
    let bytes_per_sample = 8;
    let mut byte_buffer = vec![0u8; args.number_of_input_samples * bytes_per_sample];
    let mut pending: Vec<Complex32> = Vec::new();

    loop {
        let read_len = match input_file.read(&mut byte_buffer) {
            Ok(0) => break,
            Ok(len) => len,
            Err(err) => {
                tracing::error!(%err, "error reading input");
                break;
            }
        };
        let whole_samples = read_len / bytes_per_sample;
        for chunk in byte_buffer[..whole_samples * bytes_per_sample].chunks_exact(bytes_per_sample) {
            let re = f32::from_le_bytes(chunk[0..4].try_into().unwrap());
            let im = f32::from_le_bytes(chunk[4..8].try_into().unwrap());
            pending.push(Complex32::new(re, im));
        }

        let consumed = decoder.process(&pending);
        pending.drain(..consumed);
    }

    tracing::info!(frames = decoder.frames_emitted(), "decode finished");
    Ok(())
}
