// src/store/memory.rs
//
// In-memory reference `Store`, used by the engine's own test suite (see
// §8's scenarios) and by anything that doesn't need crash durability.
// Grounded on `marketplace.rs`'s `MarketplaceCoordinator`: the graph
// bookkeeping is the same shape, minus the file-transport/worker-matching
// machinery that coordinator carried for its multi-process protocol — this
// store is called directly, in-process, by the dispatch/heartbeat loops.

use super::graph::GraphState;
use super::{GraphNode, Store, WorkerHeartbeat};
use crate::clock::Timestamp;
use crate::error::StoreError;
use crate::job::{JobDescription, JobResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryStore {
    graph: Mutex<GraphState>,
    workers: Mutex<HashMap<String, WorkerHeartbeat>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/inspection helper: current worker heartbeat records.
    pub fn workers_snapshot(&self) -> Vec<WorkerHeartbeat> {
        self.workers.lock().unwrap().values().cloned().collect()
    }

    /// Test/inspection helper: terminal result recorded for a node, if any.
    pub fn result_of(&self, id: Uuid) -> Option<JobResult> {
        self.graph.lock().unwrap().result_of(id)
    }

    pub fn status_of(&self, id: Uuid) -> Option<super::graph::NodeStatus> {
        self.graph.lock().unwrap().status_of(id)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn acquire_job(&self, now: Timestamp) -> Result<Option<JobDescription>, StoreError> {
        Ok(self.graph.lock().unwrap().acquire_ready(now))
    }

    async fn release_job(&self, id: Uuid, result: JobResult) -> Result<(), StoreError> {
        self.graph.lock().unwrap().apply_result(id, result)
    }

    async fn heartbeat(
        &self,
        machine_id: &str,
        parallelism: usize,
        polling_frequency: Duration,
        heartbeat_frequency: Duration,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        self.workers.lock().unwrap().insert(
            machine_id.to_string(),
            WorkerHeartbeat {
                machine_id: machine_id.to_string(),
                parallelism,
                polling_frequency,
                heartbeat_frequency,
                last_seen: now,
            },
        );
        Ok(())
    }

    async fn submit(&self, node: GraphNode) -> Result<Uuid, StoreError> {
        Ok(self.graph.lock().unwrap().submit(node))
    }
}
