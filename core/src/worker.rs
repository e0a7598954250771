//! The generator worker: one wire connection, one rate-limited send loop,
//! spending a disjoint, owned slice of the pool round-robin into a second
//! owned slice and back.

use std::time::{Duration, Instant};

use bitcoin::secp256k1::Secp256k1;

use crate::fee::FeeProducer;
use crate::rate_limiter::{LeakyBucket, FIXED_POINT_SHIFT};
use crate::tx_builder;
use crate::utxo::Utxo;
use crate::wire::WireClient;

/// Everything one worker needs to run its phase, with no shared state
/// against any other worker.
#[derive(Clone)]
pub struct WorkerJob {
    pub name: String,
    /// Seconds since the driver started at which this phase should begin.
    pub start: u64,
    /// Seconds since the driver started at which this phase should end.
    pub end: u64,
    pub host: String,
    /// Target send rate in plain transactions/second, as configured --
    /// scaling to the rate limiter's fixed-point units happens inside
    /// [`run`], not before.
    pub rate_begin: u64,
    pub rate_end: u64,
    pub fee: FeeProducer,
    pub default_port: u16,
    pub magic: [u8; 4],
}

/// Run one generator worker to completion: block until `job.start`, send at
/// `job.rate_begin` transactions/second until `job.end`, then return. Each
/// transaction spends one UTXO from `in_buf` into one slot of
/// `out_buf`; once `in_buf` is exhausted the two buffers swap roles so the
/// worker recycles its own coins indefinitely, without ever touching another
/// worker's slice.
///
/// `job.rate_end` is accepted but unused: this worker holds a flat rate for
/// the whole phase rather than ramping linearly from `rate_begin` to
/// `rate_end` -- see DESIGN.md.
pub fn run(job: WorkerJob, mut in_buf: Vec<Utxo>, mut out_buf: Vec<Utxo>) {
    let wall_start = Instant::now();
    if job.start > 0 {
        std::thread::sleep(Duration::from_secs(job.start));
    }

    let secp = Secp256k1::new();
    let mut client = WireClient::connect(&job.host, job.default_port, job.magic);

    // job.rate_begin/rate_end arrive as plain tx/s; scale into the rate
    // limiter's fixed-point units here, same as the original driver does at
    // the top of its generator function.
    let rate_begin_unscaled = job.rate_begin.max(1);
    let rate_scaled = rate_begin_unscaled * FIXED_POINT_SHIFT;

    // Spec contract: capacity = rateBegin*1024 + 10, initial = rateBegin*1024,
    // fill_rate = rateBegin*1024 / 2 -- the halved refill is a deliberate
    // conservatism against initial bursts, not a rounding accident.
    let mut bucket = LeakyBucket::new(rate_scaled + 10, rate_scaled, rate_scaled / 2);

    // `job.start`/`job.end` are both offsets from the same origin (the
    // scheduler's start instant), and `wall_start` was captured at that same
    // origin -- before the start-delay sleep above -- so the deadline this
    // worker runs against is `job.end` itself, not `job.end - job.start`.
    // Measuring from `job.end - job.start` would double-count the start
    // delay and could leave a phase with no runway at all once the worker
    // wakes up.
    let phase_deadline = Duration::from_secs(job.end);
    let mut cursor = 0usize;
    let mut sent = 0u64;

    log::info!(
        "worker '{}' starting against {} ({} utxos, rate {rate_begin_unscaled})",
        job.name,
        job.host,
        in_buf.len(),
    );

    while wall_start.elapsed() < phase_deadline {
        if !bucket.try_leak(FIXED_POINT_SHIFT) {
            std::thread::sleep(Duration::from_micros(500_000 / rate_begin_unscaled));
            continue;
        }

        if cursor >= in_buf.len() {
            // Every input spent this pass; recycle by swapping buffers and
            // starting over against the newly produced outputs.
            std::mem::swap(&mut in_buf, &mut out_buf);
            cursor = 0;
            if in_buf.is_empty() {
                log::warn!("worker '{}' ran out of utxos, stopping early", job.name);
                break;
            }
        }

        let input_slice = std::slice::from_mut(&mut in_buf[cursor]);
        let output_slice = std::slice::from_mut(&mut out_buf[cursor]);
        match tx_builder::build(&secp, input_slice, output_slice, job.fee.sample()) {
            Some(tx) => {
                let bytes = bitcoin::consensus::encode::serialize(&tx);
                client.send("tx", &bytes);
                sent += 1;
            }
            None => log::warn!("worker '{}': utxo at slot {cursor} has insufficient balance", job.name),
        }
        cursor += 1;
    }

    log::info!("worker '{}' finished, sent {sent} transactions", job.name);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_is_cloneable_for_fanout() {
        let job = WorkerJob {
            name: "warmup".into(),
            start: 0,
            end: 1,
            host: "127.0.0.1:18444".into(),
            rate_begin: 10,
            rate_end: 10,
            fee: FeeProducer::constant(0),
            default_port: 18444,
            magic: crate::wire::REGTEST_MAGIC,
        };
        let cloned = job.clone();
        assert_eq!(cloned.name, job.name);
    }

    #[test]
    fn phase_deadline_leaves_runway_after_a_delayed_start() {
        // A phase starting at t=5s and ending at t=10s has 5 seconds of
        // runway. The deadline a worker runs against has to be measured
        // from the same origin its start-delay sleep was, i.e. `end`
        // itself -- not `end - start`, which would already be exhausted the
        // moment the worker wakes from its start-delay sleep.
        let job = WorkerJob {
            name: "delayed".into(),
            start: 5,
            end: 10,
            host: "127.0.0.1:18444".into(),
            rate_begin: 10,
            rate_end: 10,
            fee: FeeProducer::constant(0),
            default_port: 18444,
            magic: crate::wire::REGTEST_MAGIC,
        };
        let phase_deadline = Duration::from_secs(job.end);
        let elapsed_right_after_wake = Duration::from_secs(job.start);
        assert!(
            elapsed_right_after_wake < phase_deadline,
            "a worker waking from its start-delay must still have runway left"
        );
    }
}
