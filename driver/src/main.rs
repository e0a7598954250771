//! txstorm: drives a bitcoind-family node (or small cluster) at a
//! precisely controlled transaction-per-second rate.
//!
//! Usage: `txstorm [config.json]` -- defaults to `txunami.json` in the
//! working directory if no path is given.

use std::io::Read;
use std::path::PathBuf;

use txstorm_core::secp256k1::Secp256k1;
use txstorm_core::splitter;
use txstorm_core::{maxspeed, Config, Error};

fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("txunami.json"))
}

fn main() {
    env_logger::init();

    let path = config_path();
    let config = match Config::load(&path) {
        Ok(c) => c,
        // Malformed JSON is an invariant violation (spec.md SS7): a valid
        // deployment never hands this driver a broken document, so abort
        // rather than limp on. A missing/unreadable file, or a well-formed
        // document with a bad field (unknown `net`, malformed WIF, ...), is
        // an ordinary configuration error and exits nonzero instead.
        Err(e @ Error::Json(_)) => {
            log::error!("malformed config JSON at {}: {e}", path.display());
            std::process::abort();
        }
        Err(e) => {
            log::error!("cannot load config from {}: {e}", path.display());
            std::process::exit(-1);
        }
    };

    log::info!(
        "loaded {} seed coin(s), net={:?}, bitcoind={}",
        config.seed_coins.len(),
        config.net,
        config.bitcoind
    );

    let secp = Secp256k1::new();
    let pool = splitter::run(
        &secp,
        config.seed_coins,
        &config.default_fee,
        &config.bitcoind,
        &config.splitter,
    );
    log::info!("splitter converged at {} utxos", pool.len());

    match config.schedule {
        Some(schedule) => {
            log::info!("dispatching {} scheduled target(s)", schedule.total_targets());
            schedule.execute(pool, config.splitter.default_port, config.splitter.magic);
        }
        None => {
            println!("no schedule configured -- press Enter to start max-speed mode");
            wait_for_enter();
            maxspeed::run(
                pool,
                &config.bitcoind,
                config.splitter.default_port,
                config.splitter.magic,
                config.splitter.max_threads,
                &config.default_fee,
            );
        }
    }

    log::info!("run complete");
}

fn wait_for_enter() {
    let mut buf = [0u8; 1];
    let _ = std::io::stdin().read(&mut buf);
}
