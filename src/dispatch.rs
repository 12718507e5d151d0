// src/dispatch.rs
//
// The Dispatch Loop (§4.3): the bounded-concurrency pump. Grounded on
// `guardian.rs`'s `try_accept_job`/`execute_lifecycle` (semaphore
// `try_acquire_owned`, spawn, drop permit on completion) and on the
// "PREVENT BUSY LOOP" polling-sleep segment of `main.rs`'s node-service
// loop. Unlike the teacher's fire-and-forget `tokio::spawn` with no handle
// tracking, this loop keeps every execution activity's `JoinHandle` so it
// can prove drain on shutdown, per the redesign note in §9.

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::StoreError;
use crate::executor::execute_job;
use crate::resolver::Resolver;
use crate::store::Store;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;

pub(crate) async fn run_dispatch_loop<S, R, C>(
    store: Arc<S>,
    resolver: Arc<R>,
    clock: Arc<C>,
    config: EngineConfig,
    mut cancel: watch::Receiver<bool>,
) -> Result<(), StoreError>
where
    S: Store,
    R: Resolver,
    C: Clock,
{
    let semaphore = Arc::new(Semaphore::new(config.parallelism));
    let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

    let result = loop {
        if *cancel.borrow() {
            break Ok(());
        }

        let permit = tokio::select! {
            biased;
            _ = cancel.changed() => break Ok(()),
            permit = semaphore.clone().acquire_owned() => {
                permit.expect("dispatch semaphore is never closed while the loop runs")
            }
        };

        match store.acquire_job(clock.now()).await {
            Ok(None) => {
                drop(permit);
                tokio::select! {
                    _ = cancel.changed() => {}
                    _ = clock.delay(config.polling_frequency) => {}
                }
            }
            Ok(Some(job)) => {
                let store = store.clone();
                let resolver = resolver.clone();
                let clock = clock.clone();
                in_flight.retain(|h| !h.is_finished());
                in_flight.push(tokio::spawn(async move {
                    execute_job(&store, &resolver, &clock, job).await;
                    drop(permit);
                }));
            }
            Err(err) => {
                drop(permit);
                log::error!("dispatch loop: store error acquiring job, terminating dispatch: {err}");
                break Err(err);
            }
        }
    };

    // Drain: stop acquiring (already true by the time we reach here) and
    // wait for every execution activity this loop spawned.
    for handle in in_flight {
        let _ = handle.await;
    }
    // Cross-check: reacquiring full capacity proves every permit handed to
    // an execution activity has since been released.
    let _ = semaphore.acquire_many(config.parallelism as u32).await;

    result
}
