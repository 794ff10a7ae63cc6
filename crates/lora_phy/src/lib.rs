pub mod block_decoder;
pub mod hamming;
pub mod interleave;
pub mod shuffle;
pub mod tables;
pub mod whitening;

pub use block_decoder::{BlockDecoder, BlockKind};
