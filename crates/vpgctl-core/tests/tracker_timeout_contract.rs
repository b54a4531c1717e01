//! Architectural Contract Test: Bounded Task Tracking
//!
//! This test verifies that tracking an operation handle always ends, and
//! ends on time.
//!
//! Constraints verified:
//! - A handle stuck in a non-terminal state fails with Timeout no later
//!   than timeout + poll_interval
//! - The bound holds even when a single status query hangs
//! - The first terminal observation ends polling
//! - Tracking issues nothing but status queries
//! - Tracking events are reported in order and end with Finished
//!
//! Timing is checked against tokio's paused clock, so these tests run
//! instantly while asserting exact durations.
//!
//! If this test fails, someone has made the poll loop unbounded or
//! stopped clamping waits to the deadline.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use tokio::sync::mpsc;
use vpgctl_core::{Error, OperationHandle, TaskState, TaskTracker, TrackOptions, TrackerEvent};

fn options(poll_secs: u64, timeout_secs: Option<u64>) -> TrackOptions {
    TrackOptions::new(
        Duration::from_secs(poll_secs),
        timeout_secs.map(Duration::from_secs),
    )
}

#[tokio::test(start_paused = true)]
async fn stuck_task_times_out_within_bound() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.on_task("task-1", &["Running"]);
    let tracker = TaskTracker::new(transport.clone());
    let session = test_session();

    let opts = options(5, Some(30));
    let started = tokio::time::Instant::now();
    let err = tracker
        .track(&session, &OperationHandle::new("task-1"), &opts)
        .await
        .unwrap_err();
    let waited = started.elapsed();

    match err {
        Error::Timeout { handle, elapsed } => {
            assert_eq!(handle.as_str(), "task-1");
            assert!(elapsed >= Duration::from_secs(30));
            assert!(elapsed <= Duration::from_secs(35));
        }
        other => panic!("Expected Timeout, got {:?}", other),
    }
    assert!(waited <= Duration::from_secs(35), "Waited {:?}", waited);
    assert!(transport.request_count() >= 6);
    assert!(transport.mutating_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn last_wait_is_clamped_to_deadline() {
    // 7s polls against a 10s timeout: polls at 0s and 7s, then a 3s wait
    let transport = Arc::new(ScriptedTransport::new());
    transport.on_task("task-2", &["Pending"]);
    let tracker = TaskTracker::new(transport.clone());

    let started = tokio::time::Instant::now();
    let err = tracker
        .track(&test_session(), &OperationHandle::new("task-2"), &options(7, Some(10)))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout { .. }));
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(10));
    assert!(waited < Duration::from_secs(11), "Waited {:?}", waited);
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn first_terminal_state_ends_tracking() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.on_task("task-3", &["Pending", "Running", "Running", "Completed"]);
    let tracker = TaskTracker::new(transport.clone());

    let result = tracker
        .track(&test_session(), &OperationHandle::new("task-3"), &options(2, None))
        .await
        .unwrap();

    assert_eq!(result.final_status, TaskState::Completed);
    assert!(result.is_success());
    assert_eq!(transport.request_count(), 4);
    assert!(result.elapsed >= Duration::from_secs(6));
    assert!(result.elapsed < Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn slow_status_query_cannot_outlast_deadline() {
    let transport = Arc::new(ScriptedTransport::new().with_latency(Duration::from_secs(25)));
    transport.on_task("task-7", &["Running"]);
    let tracker = TaskTracker::new(transport.clone());

    let started = tokio::time::Instant::now();
    let err = tracker
        .track(&test_session(), &OperationHandle::new("task-7"), &options(5, Some(10)))
        .await
        .unwrap_err();
    let waited = started.elapsed();

    match err {
        Error::Timeout { handle, elapsed } => {
            assert_eq!(handle.as_str(), "task-7");
            assert!(elapsed <= Duration::from_secs(15), "Elapsed {:?}", elapsed);
        }
        other => panic!("Expected Timeout, got {:?}", other),
    }
    assert!(waited <= Duration::from_secs(15), "Waited {:?}", waited);
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_status_query_within_budget_is_awaited() {
    let transport = Arc::new(ScriptedTransport::new().with_latency(Duration::from_secs(3)));
    transport.on_task("task-8", &["Completed"]);
    let tracker = TaskTracker::new(transport.clone());

    let result = tracker
        .track(&test_session(), &OperationHandle::new("task-8"), &options(5, Some(10)))
        .await
        .unwrap();

    assert_eq!(result.final_status, TaskState::Completed);
    assert_eq!(result.elapsed, Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn unbounded_tracking_waits_for_terminal_state() {
    let transport = Arc::new(ScriptedTransport::new());
    let mut statuses = vec!["Running"; 500];
    statuses.push("Failed");
    transport.on_task("task-4", &statuses);
    let tracker = TaskTracker::new(transport.clone());

    let result = tracker
        .track(&test_session(), &OperationHandle::new("task-4"), &options(60, None))
        .await
        .unwrap();

    assert_eq!(result.final_status, TaskState::Failed);
    assert_eq!(transport.request_count(), 501);
}

#[tokio::test(start_paused = true)]
async fn events_end_with_finished() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.on_task("task-5", &["Running", "Completed"]);
    let (tx, mut rx) = mpsc::channel(16);
    let tracker = TaskTracker::new(transport.clone()).with_events(tx);

    tracker
        .track(&test_session(), &OperationHandle::new("task-5"), &options(1, Some(10)))
        .await
        .unwrap();
    drop(tracker);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    let handle = OperationHandle::new("task-5");
    assert_eq!(
        events,
        vec![
            TrackerEvent::PollStarted { handle: handle.clone(), attempt: 1 },
            TrackerEvent::Progress { handle: handle.clone(), state: TaskState::Running, progress: None },
            TrackerEvent::PollStarted { handle: handle.clone(), attempt: 2 },
            TrackerEvent::Finished { handle, final_status: TaskState::Completed },
        ]
    );
}

#[tokio::test]
async fn invalid_options_are_rejected_before_polling() {
    let transport = Arc::new(ScriptedTransport::new());
    let tracker = TaskTracker::new(transport.clone());

    let err = tracker
        .track(&test_session(), &OperationHandle::new("task-6"), &options(0, Some(10)))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert_eq!(transport.request_count(), 0);
}
