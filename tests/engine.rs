// tests/engine.rs
//
// End-to-end scenarios from the spec's testable-properties section,
// driven directly against `Engine` + the in-memory `Store`, in the
// teacher's habit of exercising integration-shaped behavior against real
// core types rather than through mocks.

use jobforge::{
    Engine, EngineConfig, GraphNode, InMemoryStore, Job, JobOutcome, JobSpec, SimulatedClock,
    Store, SystemClock, Timestamp, TypeRegistry,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn config(parallelism: usize, poll_ms: u64, heartbeat_ms: u64) -> EngineConfig {
    EngineConfig {
        machine_id: "test-worker".to_string(),
        parallelism,
        polling_frequency: Duration::from_millis(poll_ms),
        heartbeat_frequency: Duration::from_millis(heartbeat_ms),
    }
}

#[tokio::test]
async fn single_finished_job_runs_exactly_once() {
    let store = Arc::new(InMemoryStore::new());
    let ran = Arc::new(AtomicUsize::new(0));
    let ran_clone = ran.clone();

    let mut registry = TypeRegistry::new();
    registry.register("simple", move || {
        let ran = ran_clone.clone();
        Job::untyped(move || {
            let ran = ran.clone();
            async move {
                ran.fetch_add(1, Ordering::SeqCst);
                JobOutcome::Finished
            }
        })
    });

    let job_id = store
        .submit(GraphNode::Single(JobSpec {
            job_type: "simple".to_string(),
            input: None,
            due_time: Timestamp::ZERO,
        }))
        .await
        .unwrap();

    let engine = Engine::start(
        store.clone(),
        Arc::new(registry),
        Arc::new(SystemClock),
        config(1, 50, 100),
    )
    .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    engine.stop().await.unwrap();

    assert_eq!(ran.load(Ordering::SeqCst), 1);
    let result = store.result_of(job_id).expect("job should have a recorded result");
    assert_eq!(result.state, jobforge::JobState::Finished);
    assert!(store.workers_snapshot().iter().any(|w| w.machine_id == "test-worker"));
}

#[tokio::test]
async fn parallelism_caps_concurrent_execution() {
    let store = Arc::new(InMemoryStore::new());
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut registry = TypeRegistry::new();
    {
        let current = current.clone();
        let peak = peak.clone();
        registry.register("slow", move || {
            let current = current.clone();
            let peak = peak.clone();
            Job::untyped(move || {
                let current = current.clone();
                let peak = peak.clone();
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    JobOutcome::Finished
                }
            })
        });
    }

    for _ in 0..10 {
        store
            .submit(GraphNode::Single(JobSpec {
                job_type: "slow".to_string(),
                input: None,
                due_time: Timestamp::ZERO,
            }))
            .await
            .unwrap();
    }

    let engine = Engine::start(
        store.clone(),
        Arc::new(registry),
        Arc::new(SystemClock),
        config(3, 20, 1_000),
    )
    .unwrap();

    let started = std::time::Instant::now();
    // 10 jobs / 3 slots * 200ms each, plus slack for polling overhead.
    tokio::time::sleep(Duration::from_millis(1_400)).await;
    engine.stop().await.unwrap();
    let elapsed = started.elapsed();

    assert!(peak.load(Ordering::SeqCst) <= 3, "never more than 3 jobs in flight");
    assert!(
        elapsed >= Duration::from_millis(760),
        "ten jobs at 3-way parallelism can't finish faster than ~4 batches of 200ms"
    );
}

#[tokio::test]
async fn sequence_enforces_ordering() {
    let store = Arc::new(InMemoryStore::new());
    let log = Arc::new(Mutex::new(Vec::<String>::new()));

    let mut registry = TypeRegistry::new();
    for name in ["a", "b", "c"] {
        let log = log.clone();
        registry.register(name, move || {
            let log = log.clone();
            let name = name.to_string();
            Job::untyped(move || {
                let log = log.clone();
                let name = name.clone();
                async move {
                    log.lock().unwrap().push(format!("start:{name}"));
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    log.lock().unwrap().push(format!("end:{name}"));
                    JobOutcome::Finished
                }
            })
        });
    }

    let leaf = |t: &str| {
        GraphNode::Single(JobSpec {
            job_type: t.to_string(),
            input: None,
            due_time: Timestamp::ZERO,
        })
    };
    store
        .submit(GraphNode::Sequence(vec![leaf("a"), leaf("b"), leaf("c")]))
        .await
        .unwrap();

    let engine = Engine::start(
        store.clone(),
        Arc::new(registry),
        Arc::new(SystemClock),
        config(3, 20, 1_000),
    )
    .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    engine.stop().await.unwrap();

    let log = log.lock().unwrap().clone();
    assert_eq!(
        log,
        vec!["start:a", "end:a", "start:b", "end:b", "start:c", "end:c"],
        "a Sequence child never starts before its predecessor finishes"
    );
}

#[tokio::test]
async fn set_runs_children_concurrently() {
    let store = Arc::new(InMemoryStore::new());
    let barrier = Arc::new(tokio::sync::Barrier::new(2));

    let mut registry = TypeRegistry::new();
    for name in ["a", "b"] {
        let barrier = barrier.clone();
        registry.register(name, move || {
            let barrier = barrier.clone();
            Job::untyped(move || {
                let barrier = barrier.clone();
                async move {
                    // Both children must reach this point before either
                    // can finish, proving they were leased concurrently.
                    barrier.wait().await;
                    JobOutcome::Finished
                }
            })
        });
    }

    let leaf = |t: &str| {
        GraphNode::Single(JobSpec {
            job_type: t.to_string(),
            input: None,
            due_time: Timestamp::ZERO,
        })
    };
    let root = store
        .submit(GraphNode::Set(vec![leaf("a"), leaf("b")]))
        .await
        .unwrap();

    let engine = Engine::start(
        store.clone(),
        Arc::new(registry),
        Arc::new(SystemClock),
        config(2, 20, 1_000),
    )
    .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    engine.stop().await.unwrap();

    assert_eq!(store.status_of(root), Some(jobforge::store::graph::NodeStatus::Finished));
}

#[tokio::test]
async fn job_panic_is_reported_as_error_and_engine_continues() {
    let store = Arc::new(InMemoryStore::new());
    let mut registry = TypeRegistry::new();
    registry.register("boom", || {
        Job::untyped(|| async { panic!("boom") })
    });
    let ran_next = Arc::new(AtomicUsize::new(0));
    {
        let ran_next = ran_next.clone();
        registry.register("ok", move || {
            let ran_next = ran_next.clone();
            Job::untyped(move || {
                let ran_next = ran_next.clone();
                async move {
                    ran_next.fetch_add(1, Ordering::SeqCst);
                    JobOutcome::Finished
                }
            })
        });
    }

    let failing = store
        .submit(GraphNode::Single(JobSpec {
            job_type: "boom".to_string(),
            input: None,
            due_time: Timestamp::ZERO,
        }))
        .await
        .unwrap();
    store
        .submit(GraphNode::Single(JobSpec {
            job_type: "ok".to_string(),
            input: None,
            due_time: Timestamp::ZERO,
        }))
        .await
        .unwrap();

    let engine = Engine::start(
        store.clone(),
        Arc::new(registry),
        Arc::new(SystemClock),
        config(2, 20, 1_000),
    )
    .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    engine.stop().await.unwrap();

    let result = store.result_of(failing).expect("failing job must still get a result");
    assert_eq!(result.state, jobforge::JobState::Error);
    assert!(result.status_info.unwrap().contains("boom"));
    assert_eq!(ran_next.load(Ordering::SeqCst), 1, "engine keeps running after a job panics");
}

#[tokio::test]
async fn reschedule_reruns_no_earlier_than_its_new_due_time() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(SimulatedClock::new(Timestamp::ZERO));
    let attempts = Arc::new(AtomicUsize::new(0));

    let mut registry = TypeRegistry::new();
    {
        let attempts = attempts.clone();
        registry.register("flaky", move || {
            let attempts = attempts.clone();
            Job::untyped(move || {
                let attempts = attempts.clone();
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    if n == 0 {
                        JobOutcome::Reschedule(Timestamp::from_millis(2_000))
                    } else {
                        JobOutcome::Finished
                    }
                }
            })
        });
    }

    store
        .submit(GraphNode::Single(JobSpec {
            job_type: "flaky".to_string(),
            input: None,
            due_time: Timestamp::ZERO,
        }))
        .await
        .unwrap();

    let engine = Engine::start(
        store.clone(),
        Arc::new(registry),
        clock.clone(),
        config(1, 10, 10_000),
    )
    .unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 1, "first attempt reschedules immediately");

    clock.advance(Duration::from_millis(1_000));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 1, "must not re-run before its new due time");

    clock.advance(Duration::from_millis(1_000));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 2, "re-runs exactly once at/after the new due time");

    engine.stop().await.unwrap();
}

#[tokio::test]
async fn stop_is_idempotent() {
    let store = Arc::new(InMemoryStore::new());
    let engine = Engine::start(
        store,
        Arc::new(TypeRegistry::new()),
        Arc::new(SystemClock),
        config(1, 20, 50),
    )
    .unwrap();

    engine.stop().await.unwrap();
    engine.stop().await.unwrap();
}
