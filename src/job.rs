// src/job.rs
//
// Data model for units of work: what the engine receives from the store
// under lease (`JobDescription`), the tagged-variant `Job` a `Resolver`
// hands back (replacing the source's generic-base-class-with-reflection
// approach per the redesign note), and what the executor reports back to
// the store (`JobResult`).

use crate::clock::Timestamp;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A job record leased out by the store for this worker to execute.
#[derive(Debug, Clone)]
pub struct JobDescription {
    pub id: Uuid,
    pub job_type: String,
    pub input: Option<Vec<u8>>,
    pub due_time: Timestamp,
}

/// Terminal state a job's run function reports for this attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Finished,
    Reschedule,
    Error,
}

/// What the engine returns to the store after one execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub state: JobState,
    pub due_time: Timestamp,
    pub status_info: Option<String>,
    pub execution_time: Duration,
}

impl JobResult {
    pub fn finished(execution_time: Duration) -> Self {
        Self {
            state: JobState::Finished,
            due_time: Timestamp::ZERO,
            status_info: None,
            execution_time,
        }
    }

    pub fn reschedule(due_time: Timestamp, execution_time: Duration) -> Self {
        Self {
            state: JobState::Reschedule,
            due_time,
            status_info: None,
            execution_time,
        }
    }

    pub fn error(message: impl Into<String>, due_time: Timestamp, execution_time: Duration) -> Self {
        Self {
            state: JobState::Error,
            due_time,
            status_info: Some(message.into()),
            execution_time,
        }
    }
}

/// What a job's run function returns; the executor maps this into a
/// `JobResult` by stamping `ExecutionTime` and (for `Finished`) the
/// original due time.
pub enum JobOutcome {
    Finished,
    Reschedule(Timestamp),
    Error(String),
}

type UntypedRun = Arc<dyn Fn() -> BoxFuture<JobOutcome> + Send + Sync>;
type TypedDecode = Arc<dyn Fn(&[u8]) -> Result<Box<dyn Any + Send>, String> + Send + Sync>;
type TypedRun = Arc<dyn Fn(Box<dyn Any + Send>) -> BoxFuture<JobOutcome> + Send + Sync>;

/// A constructed job instance, as handed back by a `Resolver`.
///
/// `Untyped` jobs ignore `JobDescription::input` entirely. `Typed` jobs
/// carry a decoder (deserialize the opaque input bytes into a concrete
/// type) and a run function operating on the decoded value; the executor
/// never needs to know the concrete type, only that decode-then-run
/// round-trips through `Box<dyn Any + Send>`.
#[derive(Clone)]
pub enum Job {
    Untyped(UntypedRun),
    Typed {
        decode: TypedDecode,
        run: TypedRun,
    },
}

impl Job {
    pub fn untyped<F, Fut>(run: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JobOutcome> + Send + 'static,
    {
        Job::Untyped(Arc::new(move || Box::pin(run())))
    }

    pub fn typed<T, F, Fut>(run: F) -> Self
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JobOutcome> + Send + 'static,
    {
        Job::Typed {
            decode: Arc::new(|bytes| {
                serde_json::from_slice::<T>(bytes)
                    .map(|value| Box::new(value) as Box<dyn Any + Send>)
                    .map_err(|e| e.to_string())
            }),
            run: Arc::new(move |boxed| {
                let input = match boxed.downcast::<T>() {
                    Ok(value) => *value,
                    Err(_) => panic!("decode/run type mismatch: Job::typed was misconstructed"),
                };
                Box::pin(run(input))
            }),
        }
    }
}
