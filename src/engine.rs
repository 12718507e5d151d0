// src/engine.rs
//
// The Engine Façade (§4.1): starts and stops the heartbeat and dispatch
// loops as a single lifecycle sharing one cancellation signal, and drains
// on Stop. Grounded on `main.rs`'s `run_node_service` (the ctrl_c ->
// `AtomicBool` shutdown-signal pattern, generalized here into an
// explicitly awaitable `tokio::sync::watch<bool>` so both loops can
// `select!` on it instead of polling) and on `NodeGuardian::boot`'s role
// as the single entry point that wires a worker's loops together.

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::dispatch::run_dispatch_loop;
use crate::error::EngineError;
use crate::heartbeat::run_heartbeat_loop;
use crate::resolver::Resolver;
use crate::store::Store;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct Engine {
    cancel_tx: watch::Sender<bool>,
    dispatch_handle: Mutex<Option<JoinHandle<Result<(), crate::error::StoreError>>>>,
    heartbeat_handle: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl Engine {
    /// Validates `config`, then starts the heartbeat and dispatch loops as
    /// two independent concurrent activities. Returns immediately.
    pub fn start<S, R, C>(
        store: Arc<S>,
        resolver: Arc<R>,
        clock: Arc<C>,
        config: EngineConfig,
    ) -> Result<Self, EngineError>
    where
        S: Store,
        R: Resolver,
        C: Clock,
    {
        config.validate()?;

        let (cancel_tx, dispatch_cancel) = watch::channel(false);
        let heartbeat_cancel = cancel_tx.subscribe();

        let dispatch_handle = tokio::spawn(run_dispatch_loop(
            store.clone(),
            resolver,
            clock.clone(),
            config.clone(),
            dispatch_cancel,
        ));
        let heartbeat_handle = tokio::spawn(run_heartbeat_loop(
            store,
            clock,
            config,
            heartbeat_cancel,
        ));

        Ok(Self {
            cancel_tx,
            dispatch_handle: Mutex::new(Some(dispatch_handle)),
            heartbeat_handle: Mutex::new(Some(heartbeat_handle)),
            stopped: AtomicBool::new(false),
        })
    }

    /// Signals cancellation and waits for both loops to drain. Idempotent:
    /// a second call is a no-op that returns `Ok(())`.
    pub async fn stop(&self) -> Result<(), EngineError> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let _ = self.cancel_tx.send(true);

        let heartbeat_handle = self.heartbeat_handle.lock().unwrap().take();
        if let Some(handle) = heartbeat_handle {
            let _ = handle.await;
        }

        let dispatch_handle = self.dispatch_handle.lock().unwrap().take();
        match dispatch_handle {
            Some(handle) => match handle.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(store_err)) => Err(EngineError::Dispatch(store_err)),
                Err(join_err) => Err(EngineError::DispatchPanicked(join_err.to_string())),
            },
            None => Ok(()),
        }
    }
}
