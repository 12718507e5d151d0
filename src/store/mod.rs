// src/store/mod.rs
//
// The Store port (out of scope as a concrete production backend per the
// spec, but shipped here with two reference implementations: an in-memory
// one for tests, grounded on `marketplace.rs`'s `MarketplaceCoordinator`,
// and a durable `rusqlite`-backed one grounded on `checkpoint.rs`).

pub mod graph;
pub mod memory;
pub mod sqlite;

pub use graph::{GraphNode, JobSpec};
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use crate::clock::Timestamp;
use crate::error::StoreError;
use crate::job::{JobDescription, JobResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A worker's self-reported liveness, keyed by its machine identity. The
/// store uses `last_seen` together with `heartbeat_frequency` to decide
/// when a worker (and therefore its leases) should be considered dead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerHeartbeat {
    pub machine_id: String,
    pub parallelism: usize,
    pub polling_frequency: Duration,
    pub heartbeat_frequency: Duration,
    pub last_seen: Timestamp,
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Returns the next leaf whose dependencies are satisfied and whose
    /// `due_time <= now`, marking it leased. `None` if nothing is ready.
    async fn acquire_job(&self, now: Timestamp) -> Result<Option<JobDescription>, StoreError>;

    /// Applies `result` to job `id`: marks it terminal or reschedules it,
    /// and re-evaluates dependents per §4.5.
    async fn release_job(&self, id: Uuid, result: JobResult) -> Result<(), StoreError>;

    /// Records this worker's liveness. Called by the heartbeat loop.
    async fn heartbeat(
        &self,
        machine_id: &str,
        parallelism: usize,
        polling_frequency: Duration,
        heartbeat_frequency: Duration,
        now: Timestamp,
    ) -> Result<(), StoreError>;

    /// Submits a graph-node tree (Single/Sequence/Set) and returns the id
    /// of its root. Used by schedulers, not by the engine core itself.
    async fn submit(&self, node: GraphNode) -> Result<Uuid, StoreError>;
}
