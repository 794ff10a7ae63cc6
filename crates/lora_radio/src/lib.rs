pub mod decoder;
pub mod loratap;
pub mod phy_header;
pub mod sink;

pub use decoder::{DecoderState, LoraDecoder};
pub use loratap::LoraTapFrame;
pub use phy_header::PhyHeader;
pub use sink::FrameSink;
