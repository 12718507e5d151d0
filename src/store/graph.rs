// src/store/graph.rs
//
// Pure dependency-graph bookkeeping shared by both `Store` implementations.
// Grounded on `marketplace.rs`'s `NodeState`/`ready_queue`/`apply_job_complete`
// (parents_total/parents_done accounting that flips `Blocked` -> `Pending`
// and pushes into a ready queue) generalized from flat parent-counting into
// recursive Sequence/Set composition with explicit ordering for Sequence.
//
// No I/O lives here; `memory.rs` and `sqlite.rs` each wrap a `GraphState`
// and decide how (or whether) to persist it.

use crate::clock::Timestamp;
use crate::error::StoreError;
use crate::job::{JobDescription, JobResult, JobState};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// A unit submitted to the store: a leaf job, or a composite of other units.
pub enum GraphNode {
    Single(JobSpec),
    Sequence(Vec<GraphNode>),
    Set(Vec<GraphNode>),
}

pub struct JobSpec {
    pub job_type: String,
    pub input: Option<Vec<u8>>,
    pub due_time: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum NodeKind {
    Leaf {
        job_type: String,
        input: Option<Vec<u8>>,
    },
    Sequence {
        children: Vec<Uuid>,
    },
    Set {
        children: Vec<Uuid>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Blocked,
    Ready,
    Leased,
    Finished,
    Errored,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Node {
    id: Uuid,
    kind: NodeKind,
    parent: Option<Uuid>,
    status: NodeStatus,
    due_time: Timestamp,
    seq_cursor: usize,
    pending_children: usize,
    any_child_errored: bool,
    last_result: Option<JobResult>,
}

/// The full dependency graph: every node ever submitted, plus a FIFO of
/// leaves whose dependencies are satisfied (due-time may still be in the
/// future; `acquire_ready` is what filters on that).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GraphState {
    nodes: HashMap<Uuid, Node>,
    ready_queue: VecDeque<Uuid>,
}

impl GraphState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a graph-node tree and returns the id of its root. Activation
    /// (pushing eligible leaves into the ready queue) happens immediately.
    pub fn submit(&mut self, node: GraphNode) -> Uuid {
        let id = self.build(node, None);
        self.activate(id);
        id
    }

    pub fn status_of(&self, id: Uuid) -> Option<NodeStatus> {
        self.nodes.get(&id).map(|n| n.status)
    }

    pub fn result_of(&self, id: Uuid) -> Option<JobResult> {
        self.nodes.get(&id).and_then(|n| n.last_result.clone())
    }

    /// Removes and returns the first ready leaf whose `due_time <= now`,
    /// marking it leased. Ties among due-equal leaves break in insertion
    /// (FIFO) order, matching the reference stores' tie-break policy.
    pub fn acquire_ready(&mut self, now: Timestamp) -> Option<JobDescription> {
        let position = self
            .ready_queue
            .iter()
            .position(|id| self.nodes[id].due_time <= now)?;
        let id = self.ready_queue.remove(position)?;
        let node = self.nodes.get_mut(&id).expect("ready_queue entry must exist");
        node.status = NodeStatus::Leased;
        match &node.kind {
            NodeKind::Leaf { job_type, input } => Some(JobDescription {
                id,
                job_type: job_type.clone(),
                input: input.clone(),
                due_time: node.due_time,
            }),
            _ => unreachable!("only leaves ever enter the ready queue"),
        }
    }

    /// Applies a reported `JobResult` for leaf `id`, propagating
    /// Sequence/Set completion up through ancestors as needed.
    pub fn apply_result(&mut self, id: Uuid, result: JobResult) -> Result<(), StoreError> {
        if !self.nodes.contains_key(&id) {
            return Err(StoreError::UnknownJob(id));
        }
        self.nodes.get_mut(&id).unwrap().last_result = Some(result.clone());
        match result.state {
            JobState::Finished => self.finish_node(id),
            JobState::Reschedule => self.reschedule_leaf(id, result.due_time),
            JobState::Error => self.error_node(id),
        }
        Ok(())
    }

    fn build(&mut self, node: GraphNode, parent: Option<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        match node {
            GraphNode::Single(spec) => {
                self.nodes.insert(
                    id,
                    Node {
                        id,
                        kind: NodeKind::Leaf {
                            job_type: spec.job_type,
                            input: spec.input,
                        },
                        parent,
                        status: NodeStatus::Blocked,
                        due_time: spec.due_time,
                        seq_cursor: 0,
                        pending_children: 0,
                        any_child_errored: false,
                        last_result: None,
                    },
                );
            }
            GraphNode::Sequence(children) => {
                let child_ids: Vec<Uuid> =
                    children.into_iter().map(|c| self.build(c, Some(id))).collect();
                self.nodes.insert(
                    id,
                    Node {
                        id,
                        kind: NodeKind::Sequence { children: child_ids },
                        parent,
                        status: NodeStatus::Blocked,
                        due_time: Timestamp::ZERO,
                        seq_cursor: 0,
                        pending_children: 0,
                        any_child_errored: false,
                        last_result: None,
                    },
                );
            }
            GraphNode::Set(children) => {
                let child_ids: Vec<Uuid> =
                    children.into_iter().map(|c| self.build(c, Some(id))).collect();
                let pending = child_ids.len();
                self.nodes.insert(
                    id,
                    Node {
                        id,
                        kind: NodeKind::Set { children: child_ids },
                        parent,
                        status: NodeStatus::Blocked,
                        due_time: Timestamp::ZERO,
                        seq_cursor: 0,
                        pending_children: pending,
                        any_child_errored: false,
                        last_result: None,
                    },
                );
            }
        }
        id
    }

    /// Marks `id` eligible to run: for a leaf, pushes it into the ready
    /// queue; for a Sequence, activates only its first child; for a Set,
    /// activates every child concurrently. Empty composites finish at once.
    fn activate(&mut self, id: Uuid) {
        let kind = self.nodes[&id].kind.clone();
        match kind {
            NodeKind::Leaf { .. } => {
                let node = self.nodes.get_mut(&id).unwrap();
                if node.status == NodeStatus::Blocked {
                    node.status = NodeStatus::Ready;
                    self.ready_queue.push_back(id);
                }
            }
            NodeKind::Sequence { children } => match children.first() {
                Some(&first) => self.activate(first),
                None => self.finish_node(id),
            },
            NodeKind::Set { children } => {
                if children.is_empty() {
                    self.finish_node(id);
                } else {
                    for child in children {
                        self.activate(child);
                    }
                }
            }
        }
    }

    fn reschedule_leaf(&mut self, id: Uuid, due_time: Timestamp) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.due_time = due_time;
            node.status = NodeStatus::Ready;
            self.ready_queue.push_back(id);
        }
    }

    fn finish_node(&mut self, id: Uuid) {
        let parent = match self.nodes.get_mut(&id) {
            Some(node) => {
                node.status = NodeStatus::Finished;
                node.parent
            }
            None => return,
        };
        if let Some(parent_id) = parent {
            self.on_child_finished(parent_id);
        }
    }

    fn error_node(&mut self, id: Uuid) {
        let parent = match self.nodes.get_mut(&id) {
            Some(node) => {
                node.status = NodeStatus::Errored;
                node.parent
            }
            None => return,
        };
        if let Some(parent_id) = parent {
            self.on_child_errored(parent_id);
        }
    }

    fn on_child_finished(&mut self, parent_id: Uuid) {
        let kind = self.nodes[&parent_id].kind.clone();
        match kind {
            NodeKind::Sequence { children } => {
                let cursor = {
                    let node = self.nodes.get_mut(&parent_id).unwrap();
                    node.seq_cursor += 1;
                    node.seq_cursor
                };
                if cursor >= children.len() {
                    self.finish_node(parent_id);
                } else {
                    self.activate(children[cursor]);
                }
            }
            NodeKind::Set { .. } => {
                let (done, errored) = {
                    let node = self.nodes.get_mut(&parent_id).unwrap();
                    node.pending_children = node.pending_children.saturating_sub(1);
                    (node.pending_children == 0, node.any_child_errored)
                };
                if done {
                    if errored {
                        self.error_node(parent_id);
                    } else {
                        self.finish_node(parent_id);
                    }
                }
            }
            NodeKind::Leaf { .. } => unreachable!("a leaf is never a parent"),
        }
    }

    fn on_child_errored(&mut self, parent_id: Uuid) {
        let kind = self.nodes[&parent_id].kind.clone();
        match kind {
            NodeKind::Sequence { children } => {
                // Error propagation through a Sequence: abort the
                // remaining, not-yet-started siblings rather than leasing
                // them (see the Error-propagation open question).
                let cursor = self.nodes[&parent_id].seq_cursor;
                for &child in children.iter().skip(cursor + 1) {
                    if let Some(node) = self.nodes.get_mut(&child) {
                        if !matches!(node.status, NodeStatus::Finished | NodeStatus::Errored) {
                            node.status = NodeStatus::Errored;
                        }
                    }
                }
                self.error_node(parent_id);
            }
            NodeKind::Set { .. } => {
                let done = {
                    let node = self.nodes.get_mut(&parent_id).unwrap();
                    node.any_child_errored = true;
                    node.pending_children = node.pending_children.saturating_sub(1);
                    node.pending_children == 0
                };
                if done {
                    self.error_node(parent_id);
                }
            }
            NodeKind::Leaf { .. } => unreachable!("a leaf is never a parent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobResult;
    use std::time::Duration;

    fn spec(job_type: &str) -> JobSpec {
        JobSpec {
            job_type: job_type.to_string(),
            input: None,
            due_time: Timestamp::ZERO,
        }
    }

    #[test]
    fn single_leaf_is_ready_immediately() {
        let mut graph = GraphState::new();
        let id = graph.submit(GraphNode::Single(spec("a")));
        assert_eq!(graph.status_of(id), Some(NodeStatus::Ready));
        let job = graph.acquire_ready(Timestamp::ZERO).expect("leaf should be ready");
        assert_eq!(job.id, id);
        assert_eq!(graph.status_of(id), Some(NodeStatus::Leased));
    }

    #[test]
    fn sequence_blocks_second_child_until_first_finishes() {
        let mut graph = GraphState::new();
        let root = graph.submit(GraphNode::Sequence(vec![
            GraphNode::Single(spec("a")),
            GraphNode::Single(spec("b")),
        ]));

        let first = graph.acquire_ready(Timestamp::ZERO).expect("a should be ready");
        assert!(graph.acquire_ready(Timestamp::ZERO).is_none(), "b must not be ready yet");

        graph
            .apply_result(first.id, JobResult::finished(Duration::default()))
            .unwrap();

        let second = graph.acquire_ready(Timestamp::ZERO).expect("b should now be ready");
        assert_ne!(first.id, second.id);
        graph
            .apply_result(second.id, JobResult::finished(Duration::default()))
            .unwrap();
        assert_eq!(graph.status_of(root), Some(NodeStatus::Finished));
    }

    #[test]
    fn set_makes_all_children_ready_concurrently() {
        let mut graph = GraphState::new();
        let root = graph.submit(GraphNode::Set(vec![
            GraphNode::Single(spec("a")),
            GraphNode::Single(spec("b")),
        ]));

        let first = graph.acquire_ready(Timestamp::ZERO).expect("a should be ready");
        let second = graph.acquire_ready(Timestamp::ZERO).expect("b should be ready too, unordered");
        assert_ne!(first.id, second.id);

        graph
            .apply_result(first.id, JobResult::finished(Duration::default()))
            .unwrap();
        assert_eq!(graph.status_of(root), Some(NodeStatus::Blocked));
        graph
            .apply_result(second.id, JobResult::finished(Duration::default()))
            .unwrap();
        assert_eq!(graph.status_of(root), Some(NodeStatus::Finished));
    }

    #[test]
    fn error_in_sequence_aborts_remaining_siblings() {
        let mut graph = GraphState::new();
        let root = graph.submit(GraphNode::Sequence(vec![
            GraphNode::Single(spec("a")),
            GraphNode::Single(spec("b")),
            GraphNode::Single(spec("c")),
        ]));

        let first = graph.acquire_ready(Timestamp::ZERO).unwrap();
        graph
            .apply_result(
                first.id,
                JobResult::error("boom", Timestamp::ZERO, Duration::default()),
            )
            .unwrap();

        assert!(graph.acquire_ready(Timestamp::ZERO).is_none(), "later siblings must never be leased");
        assert_eq!(graph.status_of(root), Some(NodeStatus::Errored));
    }

    #[test]
    fn error_in_set_does_not_abort_siblings() {
        let mut graph = GraphState::new();
        let root = graph.submit(GraphNode::Set(vec![
            GraphNode::Single(spec("a")),
            GraphNode::Single(spec("b")),
        ]));

        let first = graph.acquire_ready(Timestamp::ZERO).unwrap();
        let second = graph.acquire_ready(Timestamp::ZERO).unwrap();

        graph
            .apply_result(
                first.id,
                JobResult::error("boom", Timestamp::ZERO, Duration::default()),
            )
            .unwrap();
        assert_eq!(graph.status_of(root), Some(NodeStatus::Blocked));

        graph
            .apply_result(second.id, JobResult::finished(Duration::default()))
            .unwrap();
        assert_eq!(graph.status_of(root), Some(NodeStatus::Errored));
    }

    #[test]
    fn reschedule_keeps_same_node_identity() {
        let mut graph = GraphState::new();
        let id = graph.submit(GraphNode::Single(spec("a")));
        let leased = graph.acquire_ready(Timestamp::ZERO).unwrap();

        let later = Timestamp::from_millis(2_000);
        graph
            .apply_result(leased.id, JobResult::reschedule(later, Duration::default()))
            .unwrap();

        assert!(graph.acquire_ready(Timestamp::from_millis(1_000)).is_none());
        let reacquired = graph.acquire_ready(later).expect("job should be ready at its new due time");
        assert_eq!(reacquired.id, id, "reschedule must not create a new identity");
    }
}
