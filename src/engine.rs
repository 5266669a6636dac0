//! The Batch Engine: de-duplicates a batch, fans it out across a
//! bounded worker pool, and collects verdicts into a shared response
//! map.
//!
//! Bounded-channel-plus-N-workers is the "spawn async units of work,
//! await them all" idiom the worker pool used for job dispatch,
//! adapted here to a fixed worker count fed by a channel instead of
//! one task per item, since a batch must honor a configured upper
//! bound on concurrent validators rather than spawn unboundedly.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::mpsc;

use crate::validator::AddressValidator;

/// Shared, mutex-guarded address -> verdict map built up by the worker
/// pool and read once, after every worker has drained, by the caller.
#[derive(Default)]
struct ResponseMap {
    entries: Mutex<HashMap<String, String>>,
}

impl ResponseMap {
    fn add(&self, address: String, verdict: String) {
        self.entries
            .lock()
            .expect("response map mutex poisoned")
            .insert(address, verdict);
    }

    fn into_inner(self) -> HashMap<String, String> {
        self.entries
            .into_inner()
            .expect("response map mutex poisoned")
    }
}

/// Per-batch knobs taken from configuration: worker count, channel
/// depth, and the two logging flags.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub workers: usize,
    pub buffer_size: usize,
    pub verbose: bool,
    pub vduration: bool,
}

/// Runs one batch of addresses through the validator pool and returns
/// the address -> verdict map, keyed by the address exactly as given
/// in `addresses` (first occurrence wins the key casing on a
/// duplicate).
pub async fn run_batch(
    validator: Arc<AddressValidator>,
    addresses: Vec<String>,
    options: EngineOptions,
) -> HashMap<String, String> {
    let mut seen = HashSet::with_capacity(addresses.len());
    let deduped: Vec<String> = addresses
        .into_iter()
        .filter(|address| seen.insert(address.clone()))
        .collect();

    let n = deduped.len();
    if n == 0 {
        return HashMap::new();
    }

    let workers = options.workers.min(n);
    let buffer = if n < options.workers {
        1
    } else {
        options.buffer_size.max(1)
    };

    let (tx, rx) = mpsc::channel::<String>(buffer);
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    let responses = Arc::new(ResponseMap::default());

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let rx = Arc::clone(&rx);
        let validator = Arc::clone(&validator);
        let responses = Arc::clone(&responses);

        handles.push(tokio::spawn(async move {
            loop {
                let next = rx.lock().await.recv().await;
                let Some(address) = next else { break };

                let started = Instant::now();
                let verdict = validator.validate(&address).await;
                let elapsed = started.elapsed();

                let stored = if options.vduration {
                    format!("{verdict} [took {elapsed:?}]")
                } else {
                    verdict
                };

                if options.verbose {
                    eprintln!("verified {address} -> {stored}");
                }

                responses.add(address, stored);
            }
        }));
    }

    for address in deduped {
        if tx.send(address).await.is_err() {
            break;
        }
    }
    drop(tx);

    futures::future::join_all(handles).await;

    Arc::try_unwrap(responses)
        .unwrap_or_else(|_| unreachable!("worker pool failed to release its response map"))
        .into_inner()
}
