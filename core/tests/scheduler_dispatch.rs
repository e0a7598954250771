//! End-to-end test for schedule dispatch: partitioning the pool into
//! disjoint per-target slices and running each worker to completion against
//! a real (local) TCP sink.

use std::io::Read;
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bitcoin::secp256k1::Secp256k1;

use txstorm_core::fee::FeeProducer;
use txstorm_core::schedule::{Schedule, ScheduleOp, SchedulePhase};
use txstorm_core::utxo::Utxo;
use txstorm_core::wire::REGTEST_MAGIC;

/// A listener that counts completed `tx` message headers it receives across
/// all connections, so the test can assert each worker actually sent traffic.
fn counting_listener() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = count.clone();
    thread::spawn(move || {
        for stream in listener.incoming() {
            if let Ok(mut s) = stream {
                let count = count_clone.clone();
                thread::spawn(move || {
                    let mut header = [0u8; 24];
                    loop {
                        if s.read_exact(&mut header).is_err() {
                            break;
                        }
                        let len = u32::from_le_bytes([header[16], header[17], header[18], header[19]]) as usize;
                        let mut payload = vec![0u8; len];
                        if s.read_exact(&mut payload).is_err() {
                            break;
                        }
                        if header[4] == b't' && header[5] == b'x' {
                            count.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        }
    });
    (addr.to_string(), count)
}

fn fresh_pool(n: usize) -> Vec<Utxo> {
    let secp = Secp256k1::new();
    (0..n)
        .map(|_| {
            let mut u = Utxo::new_keyed(&secp);
            u.satoshi = 100_000;
            u.create_p2pkh(&secp);
            u
        })
        .collect()
}

#[test]
fn two_phase_schedule_dispatches_disjoint_slices() {
    let (host, sends) = counting_listener();

    // Two phases, one target each, pool of 1000 -> each worker gets a slice
    // of 500 utxos, per spec.md's scenario 6.
    let schedule = Schedule {
        phases: vec![
            SchedulePhase {
                name: "warmup".into(),
                start_time: 0,
                end_time: 1,
                targets: vec![ScheduleOp {
                    host: host.clone(),
                    rate_begin: 50,
                    rate_end: 50,
                    fee: FeeProducer::constant(0),
                }],
            },
            SchedulePhase {
                name: "delayed".into(),
                start_time: 1,
                end_time: 2,
                targets: vec![ScheduleOp {
                    host,
                    rate_begin: 50,
                    rate_end: 50,
                    fee: FeeProducer::constant(0),
                }],
            },
        ],
    };

    assert_eq!(schedule.total_targets(), 2);

    let pool = fresh_pool(1000);
    schedule.execute(pool, 18444, REGTEST_MAGIC);

    // A worker handshakes with version+verack before any tx, so at minimum
    // both workers should have produced wire traffic by the time execute()
    // (which joins all workers) returns.
    thread::sleep(Duration::from_millis(50));
    assert!(sends.load(Ordering::SeqCst) > 0, "no tx traffic observed from either worker");
}
