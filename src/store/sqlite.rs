// src/store/sqlite.rs
//
// Durable `Store` backed by `rusqlite`, grounded on `checkpoint.rs`'s
// `CheckpointStore`: same JSON-blob-in-a-column schema-evolution trick, the
// same crash-safety-over-throughput pragma choices (WAL off, NORMAL sync,
// a generous busy_timeout for contended/slow filesystems), and a
// `workers` table for heartbeat persistence.
//
// Unlike `checkpoint.rs`, which batches writes on a periodic
// `maybe_checkpoint` timer, this store writes through on every mutation:
// the graph here is small enough per-process that batching isn't worth the
// added "what if we crash between batches" reasoning. See DESIGN.md.

use super::graph::GraphState;
use super::{GraphNode, Store, WorkerHeartbeat};
use crate::clock::Timestamp;
use crate::error::StoreError;
use crate::job::{JobDescription, JobResult};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    graph: Mutex<GraphState>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "DELETE")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(Duration::from_millis(10_000))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS graph_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                state_json TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS workers (
                machine_id TEXT PRIMARY KEY,
                last_seen_ms INTEGER NOT NULL,
                state_json TEXT NOT NULL
             );",
        )?;

        let existing: Option<String> = conn
            .query_row(
                "SELECT state_json FROM graph_state WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .ok();

        let graph = match existing {
            Some(json) => serde_json::from_str(&json)?,
            None => {
                let fresh = GraphState::new();
                let json = serde_json::to_string(&fresh)?;
                conn.execute(
                    "INSERT INTO graph_state (id, state_json) VALUES (1, ?1)",
                    params![json],
                )?;
                fresh
            }
        };

        Ok(Self {
            conn: Mutex::new(conn),
            graph: Mutex::new(graph),
        })
    }

    fn persist_graph(&self, graph: &GraphState) -> Result<(), StoreError> {
        let json = serde_json::to_string(graph)?;
        self.conn.lock().unwrap().execute(
            "UPDATE graph_state SET state_json = ?1 WHERE id = 1",
            params![json],
        )?;
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn acquire_job(&self, now: Timestamp) -> Result<Option<JobDescription>, StoreError> {
        let mut graph = self.graph.lock().unwrap();
        let job = graph.acquire_ready(now);
        if job.is_some() {
            self.persist_graph(&graph)?;
        }
        Ok(job)
    }

    async fn release_job(&self, id: Uuid, result: JobResult) -> Result<(), StoreError> {
        let mut graph = self.graph.lock().unwrap();
        graph.apply_result(id, result)?;
        self.persist_graph(&graph)
    }

    async fn heartbeat(
        &self,
        machine_id: &str,
        parallelism: usize,
        polling_frequency: Duration,
        heartbeat_frequency: Duration,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let record = WorkerHeartbeat {
            machine_id: machine_id.to_string(),
            parallelism,
            polling_frequency,
            heartbeat_frequency,
            last_seen: now,
        };
        let json = serde_json::to_string(&record)?;
        self.conn.lock().unwrap().execute(
            "INSERT INTO workers (machine_id, last_seen_ms, state_json)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(machine_id) DO UPDATE SET
                last_seen_ms = excluded.last_seen_ms,
                state_json = excluded.state_json",
            params![machine_id, now.as_millis() as i64, json],
        )?;
        Ok(())
    }

    async fn submit(&self, node: GraphNode) -> Result<Uuid, StoreError> {
        let mut graph = self.graph.lock().unwrap();
        let id = graph.submit(node);
        self.persist_graph(&graph)?;
        Ok(id)
    }
}
