// src/executor.rs
//
// The Job Executor (§4.4). Given a leased `JobDescription` and a resolver,
// materializes the job object, feeds it its input, invokes it, and maps
// the outcome (or a panic) to a `JobResult`. Grounded on `guardian.rs`'s
// `execute_lifecycle` (resolve driver -> execute -> finalize) generalized
// away from the concrete `DriverFactory`/`CalculationResult` types to the
// tagged `Job`/`JobOutcome` model.

use crate::clock::Clock;
use crate::job::{JobDescription, JobOutcome, JobResult};
use crate::resolver::Resolver;
use crate::store::Store;
use std::sync::Arc;

pub(crate) async fn execute_job<S, R, C>(
    store: &Arc<S>,
    resolver: &Arc<R>,
    clock: &Arc<C>,
    job: JobDescription,
) where
    S: Store,
    R: Resolver,
    C: Clock,
{
    let started = clock.now();

    let outcome = match resolver.resolve(&job.job_type) {
        None => JobOutcome::Error(format!("no job type registered for '{}'", job.job_type)),
        Some(crate::job::Job::Untyped(run)) => run_and_catch(run()).await,
        Some(crate::job::Job::Typed { decode, run }) => {
            let bytes = job.input.as_deref().unwrap_or(&[]);
            match decode(bytes) {
                Ok(decoded) => run_and_catch(run(decoded)).await,
                Err(reason) => JobOutcome::Error(format!(
                    "failed to decode input for '{}': {reason}",
                    job.job_type
                )),
            }
        }
    };

    let execution_time = clock.now().duration_since(started);
    let result = match outcome {
        JobOutcome::Finished => JobResult::finished(execution_time),
        JobOutcome::Reschedule(due_time) => JobResult::reschedule(due_time, execution_time),
        JobOutcome::Error(message) => JobResult::error(message, job.due_time, execution_time),
    };

    if let Err(err) = store.release_job(job.id, result).await {
        log::error!("executor: release_job failed for {}: {err}", job.id);
    }
}

/// Runs a job's future on its own task so a panic inside user code is
/// caught at this boundary (`JoinHandle` turns a panic into a `JoinError`)
/// instead of unwinding into the dispatch loop.
async fn run_and_catch(fut: crate::job::BoxFuture<JobOutcome>) -> JobOutcome {
    match tokio::spawn(fut).await {
        Ok(outcome) => outcome,
        Err(join_err) => {
            let message = if join_err.is_panic() {
                panic_message(join_err.into_panic())
            } else {
                join_err.to_string()
            };
            JobOutcome::Error(format!("job panicked: {message}"))
        }
    }
}

/// Recovers the human-readable message from a caught panic payload, the way
/// `guardian.rs:fail_job` preserves `e.to_string()` instead of discarding it.
fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unrecognized panic payload".to_string()
    }
}
