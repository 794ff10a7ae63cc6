pub mod chirp_bank;
pub mod circular_bucket;
pub mod demodulator;
pub mod ifreq;
pub mod linear_bucket;
pub mod synchronizer;

pub use chirp_bank::ChirpBank;
pub use circular_bucket::CircularBucket;
pub use linear_bucket::LinearBucket;
pub use synchronizer::{Command, Synchronizer};
