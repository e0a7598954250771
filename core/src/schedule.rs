//! The generation schedule: a list of time-bounded phases, each with one or
//! more targets, dispatched as one worker per target against a disjoint
//! slice of the UTXO pool.

use crate::fee::FeeProducer;
use crate::utxo::Utxo;
use crate::worker;

/// A (host, rate, fee) triple specifying where and how fast a worker sends
/// during its phase.
#[derive(Debug, Clone)]
pub struct ScheduleOp {
    pub host: String,
    pub rate_begin: u64,
    /// Accepted and stored but not currently used to ramp the rate over the
    /// phase -- see [`crate::worker`] and DESIGN.md.
    pub rate_end: u64,
    pub fee: FeeProducer,
}

/// A time-bounded segment of a schedule, containing one or more targets.
/// Phases do not gate each other: a phase with a later `start_time` simply
/// blocks in its own workers' threads.
#[derive(Debug, Clone)]
pub struct SchedulePhase {
    pub name: String,
    pub start_time: u64,
    pub end_time: u64,
    pub targets: Vec<ScheduleOp>,
}

/// A full generation schedule.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub phases: Vec<SchedulePhase>,
}

impl Schedule {
    /// Total number of (phase, target) pairs across the schedule.
    pub fn total_targets(&self) -> usize {
        self.phases.iter().map(|p| p.targets.len()).sum()
    }

    /// Partition `pool` into one disjoint, contiguous slice per
    /// (phase, target) pair (declaration order), spawn one generator worker
    /// per slice, and join all of them before returning.
    ///
    /// `default_port` and `magic` are passed through to each worker's wire
    /// client. Any leftover UTXOs beyond `total_targets() * slice_size` are
    /// simply unused -- coin distribution favors simplicity over exactness,
    /// per spec.
    pub fn execute(&self, pool: Vec<Utxo>, default_port: u16, magic: [u8; 4]) {
        let total_targets = self.total_targets();
        assert!(total_targets > 0, "schedule has no targets");
        let slice_size = pool.len() / total_targets;
        assert!(slice_size > 0, "pool too small to cover every schedule target");

        // Split the pool into 2*total_targets contiguous chunks: the first
        // half seeds each worker's `in_buf`, the second half its `out_buf`
        // (so outputs created in round 1 don't alias another worker's
        // inputs from round 0).
        let mut in_chunks: Vec<Vec<Utxo>> = Vec::with_capacity(total_targets);
        let mut out_chunks: Vec<Vec<Utxo>> = Vec::with_capacity(total_targets);
        let mut cursor = 0usize;
        for _ in 0..total_targets {
            let in_slice = pool[cursor..cursor + slice_size].to_vec();
            cursor += slice_size;
            in_chunks.push(in_slice);
            out_chunks.push(fresh_output_slice(slice_size));
        }

        std::thread::scope(|scope| {
            let mut target_idx = 0;
            for phase in &self.phases {
                for target in &phase.targets {
                    let in_slice = std::mem::take(&mut in_chunks[target_idx]);
                    let out_slice = std::mem::take(&mut out_chunks[target_idx]);
                    let job = worker::WorkerJob {
                        name: phase.name.clone(),
                        start: phase.start_time,
                        end: phase.end_time,
                        host: target.host.clone(),
                        rate_begin: target.rate_begin,
                        rate_end: target.rate_end,
                        fee: target.fee.clone(),
                        default_port,
                        magic,
                    };
                    target_idx += 1;
                    scope.spawn(move || {
                        worker::run(job, in_slice, out_slice);
                    });
                }
            }
        });
    }
}

/// Allocate a disjoint output slice with freshly generated keys for a
/// worker's `out_buf`. The scripts are filled in lazily by the first
/// transaction build that spends into them.
fn fresh_output_slice(size: usize) -> Vec<Utxo> {
    let secp = bitcoin::secp256k1::Secp256k1::new();
    (0..size).map(|_| Utxo::new_keyed(&secp)).collect()
}
