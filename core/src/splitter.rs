//! Bootstrap phase: fans each seed UTXO out into `split_per_tx` children,
//! repeating rounds until the pool size meets `min_utxos`. No deadlines, no
//! rate limiting -- this runs entirely before any timed workload.

use bitcoin::secp256k1::{Secp256k1, Signing, Verification};

use crate::fee::FeeProducer;
use crate::tx_builder;
use crate::utxo::Utxo;
use crate::wire::WireClient;

/// Parameters governing the bootstrap split.
#[derive(Debug, Clone, Copy)]
pub struct SplitterConfig {
    pub split_per_tx: usize,
    pub min_utxos: usize,
    pub max_threads: usize,
    pub default_port: u16,
    pub magic: [u8; 4],
}

/// Choose how many children each input UTXO should fan out into this round:
/// `split_per_tx`, unless the pool is already close enough to `min_utxos`
/// that a smaller multiplier suffices (in which case use the smaller one,
/// to avoid wildly overshooting the target pool size).
pub fn choose_split_factor(pool_size: usize, min_utxos: usize, split_per_tx: usize) -> usize {
    if min_utxos / pool_size < split_per_tx {
        min_utxos / pool_size + 1
    } else {
        split_per_tx
    }
}

/// Generate fresh keys for every UTXO in `txo`, in parallel once the buffer
/// is large enough to be worth the thread-spawn overhead
/// (`max_threads * 100`, per spec).
fn generate_keys_parallel<C: Signing + Verification>(
    secp: &Secp256k1<C>,
    txo: &mut [Utxo],
    max_threads: usize,
) {
    let len = txo.len();
    if max_threads <= 1 || len <= max_threads * 100 {
        for u in txo.iter_mut() {
            u.regenerate_key(secp);
        }
        return;
    }

    let chunk_size = len / max_threads;
    std::thread::scope(|scope| {
        let mut remaining: &mut [Utxo] = txo;
        for _ in 0..max_threads {
            if remaining.len() <= chunk_size {
                break;
            }
            let (head, tail) = remaining.split_at_mut(chunk_size);
            remaining = tail;
            scope.spawn(move || {
                for u in head {
                    u.regenerate_key(secp);
                }
            });
        }
        // The remainder from integer division is handled on the calling
        // thread, mirroring the original's "do whatever was missed here".
        for u in remaining {
            u.regenerate_key(secp);
        }
    });
}

/// Run the splitter to convergence, sending every generated transaction to
/// `host` over a single shared wire client. Returns the final pool, whose
/// size is `>= cfg.min_utxos`.
pub fn run<C: Signing + Verification>(
    secp: &Secp256k1<C>,
    mut pool: Vec<Utxo>,
    fee: &FeeProducer,
    host: &str,
    cfg: &SplitterConfig,
) -> Vec<Utxo> {
    assert!(!pool.is_empty(), "splitter requires at least one seed UTXO");

    let mut client = WireClient::connect(host, cfg.default_port, cfg.magic);
    let mut round = 1u32;
    let mut step_size = pool.len();

    while step_size < cfg.min_utxos {
        let cur_split = choose_split_factor(pool.len(), cfg.min_utxos, cfg.split_per_tx);
        step_size = pool.len() * cur_split;
        log::info!(
            "split round {round}: {} utxo -> {step_size}, factor {cur_split}",
            pool.len()
        );

        let dummy_key = bitcoin::secp256k1::SecretKey::new(&mut rand::rngs::OsRng);
        let mut txo: Vec<Utxo> = (0..step_size)
            .map(|_| Utxo::new(bitcoin::OutPoint::null(), 0, bitcoin::ScriptBuf::new(), dummy_key))
            .collect();
        generate_keys_parallel(secp, &mut txo, cfg.max_threads);

        let mut txo_cursor = 0;
        for input_idx in 0..pool.len() {
            let out_slice = &mut txo[txo_cursor..txo_cursor + cur_split];
            txo_cursor += cur_split;

            let input_slice = std::slice::from_mut(&mut pool[input_idx]);
            match tx_builder::build(secp, input_slice, out_slice, fee.sample()) {
                Some(tx) => {
                    let bytes = bitcoin::consensus::encode::serialize(&tx);
                    client.send("tx", &bytes);
                }
                None => log::warn!("utxo {input_idx} didn't have enough balance to split"),
            }
        }

        pool = txo;
        round += 1;
    }

    pool
}
