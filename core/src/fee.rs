//! Per-transaction fee generation: either a constant amount or uniform
//! sampling over an inclusive `[min, max]` range.

use rand::rngs::ThreadRng;
use rand::Rng;

/// A configured fee value, as read from the `config.fee` JSON field: either
/// a scalar (constant fee) or a two-element `[min, max]` array (uniform
/// sampling, inclusive on both ends).
#[derive(Debug, Clone, Copy)]
pub enum FeeSpec {
    Constant(u64),
    Range(u64, u64),
}

/// Produces one fee amount per transaction. Random state is seeded from the
/// OS's nondeterministic source at construction (via `rand::thread_rng`).
#[derive(Debug, Clone)]
pub struct FeeProducer {
    spec: FeeSpec,
}

impl FeeProducer {
    /// Construct a constant-fee producer.
    pub fn constant(fee: u64) -> Self {
        FeeProducer {
            spec: FeeSpec::Constant(fee),
        }
    }

    /// Construct a uniform-range fee producer over `[min, max]` inclusive.
    pub fn range(min: u64, max: u64) -> Self {
        FeeProducer {
            spec: FeeSpec::Range(min, max),
        }
    }

    /// Reconfigure this producer, as if it had been constructed fresh.
    pub fn set(&mut self, spec: FeeSpec) {
        self.spec = spec;
    }

    /// Draw one fee amount.
    pub fn sample(&self) -> u64 {
        self.sample_with(&mut rand::thread_rng())
    }

    fn sample_with(&self, rng: &mut ThreadRng) -> u64 {
        match self.spec {
            FeeSpec::Constant(fee) => fee,
            FeeSpec::Range(min, max) => rng.gen_range(min..=max),
        }
    }
}
