//! Transaction-generation engine for driving a bitcoind-family node (or
//! small cluster) at precisely controlled transaction-per-second rates.

pub mod config;
pub mod error;
pub mod fee;
pub mod maxspeed;
pub mod rate_limiter;
pub mod schedule;
pub mod sighash;
pub mod splitter;
pub mod tx_builder;
pub mod utxo;
pub mod wire;
pub mod worker;

// Re-exports
pub use bitcoin::secp256k1;
pub use config::{Config, Net};
pub use error::{Error, Result};
pub use fee::{FeeProducer, FeeSpec};
pub use rate_limiter::LeakyBucket;
pub use schedule::{Schedule, ScheduleOp, SchedulePhase};
pub use splitter::SplitterConfig;
pub use utxo::Utxo;
pub use wire::WireClient;
