// src/heartbeat.rs
//
// The Heartbeat Loop (§4.2). Grounded on the `hb_interval` segment of
// `main.rs`'s node-service loop: tick on a fixed interval, report this
// worker's configured capacity, log-and-continue on store failure. Unlike
// the teacher, which recomputed a live "free capacity" gauge from the
// `ResourceLedger` each tick, this loop reports the static
// `EngineConfig::parallelism` value — there is no live gauge to go stale,
// since parallelism here is a configured slot count, not a hardware
// allocation (see the CPU-core-scheduling non-goal).

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::store::Store;
use std::sync::Arc;
use tokio::sync::watch;

pub(crate) async fn run_heartbeat_loop<S, C>(
    store: Arc<S>,
    clock: Arc<C>,
    config: EngineConfig,
    mut cancel: watch::Receiver<bool>,
) where
    S: Store,
    C: Clock,
{
    loop {
        tokio::select! {
            _ = cancel.changed() => return,
            _ = clock.delay(config.heartbeat_frequency) => {}
        }
        if *cancel.borrow() {
            return;
        }

        if let Err(err) = store
            .heartbeat(
                &config.machine_id,
                config.parallelism,
                config.polling_frequency,
                config.heartbeat_frequency,
                clock.now(),
            )
            .await
        {
            log::error!("heartbeat loop: store error, will retry next tick: {err}");
        }
    }
}
