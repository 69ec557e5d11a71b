//! Producer/consumer/unshuffler pipeline (spec. 4.2, 5): the concurrency
//! backbone shared by every multi-record operation (extraction, indexing,
//! inversion, merging, fetching). Grounded on the teacher's gen-server
//! `Thread` pattern (one owned thread per role, joined on drop) but
//! specialised for fan-out/fan-in instead of request/response RPC.

pub mod envelope;
pub mod unshuffler;

use std::{
    sync::{mpsc, Arc, Mutex},
    thread,
};

use crate::{config::Config, Result};
pub use envelope::Envelope;
use unshuffler::Unshuffler;

/// Runs `source` through `worker` with `config.num_serve` concurrent
/// workers, handing results to `sink` in the original `source` order.
///
/// `source` yields `(ident, item)` pairs, or an `Err` for a record that
/// failed upstream (e.g. a malformed record the partitioner rejected) —
/// such items are tagged with an index so the unshuffler can still place
/// them, but never reach `worker`.
pub fn run<T, U, I, W, S>(config: &Config, source: I, worker: W, mut sink: S) -> Result<PipelineTally>
where
    T: Send + 'static,
    U: Send + 'static,
    I: Iterator<Item = std::result::Result<(String, T), String>> + Send + 'static,
    W: Fn(&str, T) -> Result<U> + Send + Sync + 'static,
    S: FnMut(Envelope<U>),
{
    let (in_tx, in_rx) = mpsc::sync_channel::<Envelope<T>>(config.chan_depth);
    let in_rx = Arc::new(Mutex::new(in_rx));
    let (out_tx, out_rx) = mpsc::sync_channel::<Envelope<U>>(config.chan_depth);

    let producer = thread::spawn(move || {
        let mut idx = 0u64;
        for item in source {
            let env = match item {
                Ok((ident, payload)) => Envelope::ok(idx, ident, payload),
                Err(msg) => Envelope::failed(idx, String::new(), msg),
            };
            if in_tx.send(env).is_err() {
                break;
            }
            idx += 1;
        }
        // dropping in_tx here signals end-of-stream to every worker
    });

    let worker = Arc::new(worker);
    let mut workers = Vec::with_capacity(config.num_serve);
    for _ in 0..config.num_serve {
        let in_rx = Arc::clone(&in_rx);
        let out_tx = out_tx.clone();
        let worker = Arc::clone(&worker);
        workers.push(thread::spawn(move || loop {
            let env = {
                let rx = in_rx.lock().expect("pipeline input channel poisoned");
                rx.recv()
            };
            let env = match env {
                Ok(env) => env,
                Err(_) => break, // producer closed, channel drained
            };

            let out = match (env.payload, env.error) {
                (Some(payload), None) => match worker(&env.ident, payload) {
                    Ok(result) => Envelope::ok(env.index, env.ident, result),
                    Err(err) => Envelope::failed(env.index, env.ident, err.to_string()),
                },
                (_, Some(err)) => Envelope::failed(env.index, env.ident, err),
                (None, None) => Envelope::empty(env.index),
            };
            if out_tx.send(out).is_err() {
                break;
            }
        }));
    }
    drop(out_tx); // only the worker clones keep the channel alive now

    let mut tally = PipelineTally::default();
    let mut unshuffler = Unshuffler::new(config.heap_size);
    for env in out_rx {
        unshuffler.push(env);
        while let Some(ready) = unshuffler.pop_ready() {
            tally.observe(&ready);
            sink(ready);
        }
    }
    while let Some(ready) = unshuffler.drain_next() {
        tally.observe(&ready);
        sink(ready);
    }

    producer.join().map_err(|_| {
        crate::Error::ThreadFail("pipeline::run".to_string(), "producer panicked".to_string())
    })?;
    for handle in workers {
        handle
            .join()
            .map_err(|_| crate::Error::ThreadFail("pipeline::run".to_string(), "worker panicked".to_string()))?;
    }

    Ok(tally)
}

/// Recoverable-error counters surfaced at the end of a pipeline run
/// (spec. 7: recoverable errors never terminate the pipeline, they
/// increment counters and are surfaced in the final tally).
#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineTally {
    pub processed: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl PipelineTally {
    fn observe<U>(&mut self, env: &Envelope<U>) {
        if env.error.is_some() {
            self.failed += 1;
        } else if env.is_skipped() {
            self.skipped += 1;
        } else {
            self.processed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc as StdArc, Mutex as StdMutex};

    fn cfg(num_serve: usize, heap_size: usize) -> Config {
        let mut c = Config::default();
        c.num_serve = num_serve;
        c.chan_depth = num_serve.max(1);
        c.heap_size = heap_size;
        c
    }

    #[test]
    fn test_output_order_independent_of_worker_count() {
        for num_serve in [1usize, 2, 8, 16] {
            let n = 200u64;
            let source = (0..n).map(|i| Ok((format!("id{}", i), i)));
            let out = StdArc::new(StdMutex::new(Vec::new()));
            let out2 = StdArc::clone(&out);

            let config = cfg(num_serve, 32);
            let tally = run(
                &config,
                source,
                |_ident, i: u64| Ok(i * 2),
                move |env: Envelope<u64>| out2.lock().unwrap().push(env.index),
            )
            .unwrap();

            assert_eq!(tally.processed, n);
            let collected = out.lock().unwrap().clone();
            let expect: Vec<u64> = (0..n).collect();
            assert_eq!(collected, expect, "worker count {} broke ordering", num_serve);
        }
    }

    #[test]
    fn test_error_tagged_items_surface_in_tally() {
        let source = vec![
            Ok(("a".to_string(), 1u64)),
            Err("malformed".to_string()),
            Ok(("c".to_string(), 3u64)),
        ]
        .into_iter();

        let config = cfg(4, 16);
        let out = StdArc::new(StdMutex::new(Vec::new()));
        let out2 = StdArc::clone(&out);
        let tally = run(&config, source, |_ident, i: u64| Ok(i), move |env| {
            out2.lock().unwrap().push(env);
        })
        .unwrap();

        assert_eq!(tally.processed, 2);
        assert_eq!(tally.failed, 1);
        let results = out.lock().unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[1].error.is_some());
    }
}
