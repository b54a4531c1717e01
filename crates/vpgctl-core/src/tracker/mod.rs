//! Asynchronous task tracking
//!
//! The TaskTracker is responsible for:
//! - Polling an operation handle until a terminal state
//! - Absorbing transient polling failures within a bounded budget
//! - Backing off after transient failures
//! - Enforcing a wall-clock timeout
//!
//! ## Poll Loop
//!
//! ```text
//!            ┌──────────────────────────────────────────────┐
//!            ▼                                              │
//!     GET /v1/tasks/{handle}                                │
//!            │                                              │
//!   ┌────────┼─────────────┬───────────────┬─────────────┐  │
//!   ▼        ▼             ▼               ▼             ▼  │
//! Completed Pending/     transient       4xx or      deadline
//! Failed    Running      (5xx, network,  Invalid     passed, or
//!   │        │           unknown state)    │         query overran
//!   │        │             │               │             │
//!   ▼        │             │               ▼             ▼
//! TaskResult │     count > budget?     InvalidHandle   Timeout
//!            │       yes → TrackingExhausted
//!            ▼             ▼ no
//!      sleep(poll_interval | backoff, clamped to deadline) ──┘
//! ```
//!
//! Tracking only issues GET requests. A `Timeout` or `TrackingExhausted`
//! result says nothing about the remote operation, which may still finish.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{OperationHandle, TaskError, TaskResult, TaskState, TaskStatus};
use crate::session::Session;
use crate::traits::{Method, Transport};

/// Path prefix of the task status endpoint
pub const TASK_STATUS_PATH: &str = "/v1/tasks";

/// Polling parameters for [`TaskTracker::track`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackOptions {
    /// Delay between polls while the task is healthy
    pub poll_interval: Duration,
    /// Give up after this long; `None` tracks indefinitely
    pub timeout: Option<Duration>,
    /// Transient errors tolerated before failing with `TrackingExhausted`
    pub max_transient_errors: usize,
    /// Cap for the backoff delay after transient errors
    pub max_backoff: Duration,
}

impl TrackOptions {
    /// Create options with the default error budget
    pub fn new(poll_interval: Duration, timeout: Option<Duration>) -> Self {
        Self {
            poll_interval,
            timeout,
            max_transient_errors: 3,
            max_backoff: poll_interval.saturating_mul(8),
        }
    }

    /// Set the transient error budget
    pub fn with_max_transient_errors(mut self, max_transient_errors: usize) -> Self {
        self.max_transient_errors = max_transient_errors;
        self
    }

    /// Set the backoff cap
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::config("Poll interval must be > 0"));
        }
        if let Some(timeout) = self.timeout
            && timeout < self.poll_interval
        {
            return Err(Error::config(format!(
                "Timeout ({:?}) must be at least the poll interval ({:?})",
                timeout, self.poll_interval
            )));
        }
        if self.max_backoff < self.poll_interval {
            return Err(Error::config("Max backoff must be at least the poll interval"));
        }
        Ok(())
    }

    /// Delay before the next poll after `consecutive` transient errors
    fn backoff(&self, consecutive: u32) -> Duration {
        let exponent = consecutive.saturating_sub(1).min(16);
        self.poll_interval
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

impl Default for TrackOptions {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Some(Duration::from_secs(1800)))
            .with_max_backoff(Duration::from_secs(60))
    }
}

/// Events emitted by the TaskTracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    /// A status query is about to be issued
    PollStarted {
        handle: OperationHandle,
        attempt: usize,
    },

    /// Non-terminal status observed
    Progress {
        handle: OperationHandle,
        state: TaskState,
        progress: Option<u8>,
    },

    /// A poll failed transiently
    TransientError {
        handle: OperationHandle,
        error: String,
        count: usize,
    },

    /// Terminal status observed
    Finished {
        handle: OperationHandle,
        final_status: TaskState,
    },
}

/// Polls operation handles to completion
///
/// The tracker holds no per-handle state: every [`track`](Self::track) call
/// owns its own error counter and clock, so concurrent calls over different
/// handles need no coordination.
pub struct TaskTracker {
    /// Transport for status queries
    transport: Arc<dyn Transport>,

    /// Event sender for external monitoring
    event_tx: Option<mpsc::Sender<TrackerEvent>>,
}

impl TaskTracker {
    /// Create a tracker over a transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            event_tx: None,
        }
    }

    /// Report tracking events on a bounded channel
    ///
    /// Events are sent with `try_send`; a slow receiver loses events rather
    /// than stalling the poll loop.
    pub fn with_events(mut self, event_tx: mpsc::Sender<TrackerEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Query the current status of a handle once
    ///
    /// # Returns
    ///
    /// - `Ok(TaskStatus)`: The reported status
    /// - `Err(Error::TransientTransport)`: Network or 5xx failure
    /// - `Err(Error::Rejected)`: The manager refused the query (4xx)
    /// - `Err(Error::InvalidResponse)`: Unparsable body or unknown status value
    pub async fn status(&self, session: &Session, handle: &OperationHandle) -> Result<TaskStatus> {
        let path = format!("{}/{}", TASK_STATUS_PATH, handle.as_str());
        let response = self
            .transport
            .request(session, Method::Get, &path, None)
            .await?;

        parse_status(&response.body).map_err(Error::invalid_response)
    }

    /// Poll a handle until it reaches a terminal state
    ///
    /// # Parameters
    ///
    /// - `session`: Credential session for the status queries
    /// - `handle`: Handle returned by a submission
    /// - `options`: Poll interval, timeout and error budget
    ///
    /// # Returns
    ///
    /// - `Ok(TaskResult)`: First `Completed` or `Failed` observation
    /// - `Err(Error::InvalidHandle)`: 4xx on the status query, or `Invalid` state
    /// - `Err(Error::TrackingExhausted)`: Transient errors exceeded the budget
    /// - `Err(Error::Timeout)`: No terminal state within `options.timeout`
    pub async fn track(
        &self,
        session: &Session,
        handle: &OperationHandle,
        options: &TrackOptions,
    ) -> Result<TaskResult> {
        options.validate()?;

        let started = Instant::now();
        let deadline = options.timeout.map(|timeout| started + timeout);
        let mut transient_errors = 0usize;
        let mut consecutive_errors = 0u32;
        let mut attempt = 0usize;

        info!(
            "Tracking task {} (poll every {:?}, timeout {:?})",
            handle, options.poll_interval, options.timeout
        );

        loop {
            attempt += 1;
            self.emit_event(TrackerEvent::PollStarted {
                handle: handle.clone(),
                attempt,
            });

            let polled = match deadline {
                // A status query may not outlive the deadline by more than one poll interval
                Some(deadline) => {
                    let budget =
                        deadline.saturating_duration_since(Instant::now()) + options.poll_interval;
                    match tokio::time::timeout(budget, self.status(session, handle)).await {
                        Ok(polled) => polled,
                        Err(_) => {
                            let elapsed = started.elapsed();
                            warn!(
                                "Status query for task {} still pending, stopped tracking after {:?}",
                                handle, elapsed
                            );
                            return Err(Error::Timeout {
                                handle: handle.clone(),
                                elapsed,
                            });
                        }
                    }
                }
                None => self.status(session, handle).await,
            };

            let delay = match polled {
                Ok(status) if status.is_terminal() => {
                    let result = TaskResult {
                        handle: handle.clone(),
                        final_status: status.state,
                        error: status.error,
                        elapsed: started.elapsed(),
                    };
                    info!("Task {} finished: {}", handle, result.final_status);
                    self.emit_event(TrackerEvent::Finished {
                        handle: handle.clone(),
                        final_status: result.final_status,
                    });
                    return Ok(result);
                }
                Ok(status) if status.state == TaskState::Invalid => {
                    warn!("Manager reports task {} as invalid", handle);
                    return Err(Error::InvalidHandle(handle.clone()));
                }
                Ok(status) => {
                    debug!(
                        "Task {} is {} ({}%)",
                        handle,
                        status.state,
                        status.progress.map_or("?".to_string(), |p| p.to_string())
                    );
                    self.emit_event(TrackerEvent::Progress {
                        handle: handle.clone(),
                        state: status.state,
                        progress: status.progress,
                    });
                    consecutive_errors = 0;
                    options.poll_interval
                }
                Err(e) if is_retryable(&e) => {
                    transient_errors += 1;
                    warn!(
                        "Poll {} of task {} failed ({} of {} tolerated): {}",
                        attempt, handle, transient_errors, options.max_transient_errors, e
                    );
                    self.emit_event(TrackerEvent::TransientError {
                        handle: handle.clone(),
                        error: e.to_string(),
                        count: transient_errors,
                    });

                    if transient_errors > options.max_transient_errors {
                        return Err(Error::TrackingExhausted {
                            handle: handle.clone(),
                            attempts: transient_errors,
                            last_error: e.to_string(),
                        });
                    }

                    consecutive_errors = consecutive_errors.saturating_add(1);
                    options.backoff(consecutive_errors)
                }
                Err(Error::Rejected { status, message }) => {
                    warn!("Status query for task {} rejected ({}): {}", handle, status, message);
                    return Err(Error::InvalidHandle(handle.clone()));
                }
                Err(e) => return Err(e),
            };

            let delay = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        let elapsed = started.elapsed();
                        warn!("Stopped tracking task {} after {:?}", handle, elapsed);
                        return Err(Error::Timeout {
                            handle: handle.clone(),
                            elapsed,
                        });
                    }
                    delay.min(deadline - now)
                }
                None => delay,
            };

            tokio::time::sleep(delay).await;
        }
    }

    /// Emit a tracker event, dropping it if the channel is full
    fn emit_event(&self, event: TrackerEvent) {
        if let Some(tx) = &self.event_tx
            && tx.try_send(event).is_err()
        {
            warn!("Tracker event channel full or closed, dropping event");
        }
    }
}

/// Errors that count against the transient budget
///
/// Unrecognised status values are treated as transient: the next poll may
/// well report a known state.
fn is_retryable(error: &Error) -> bool {
    error.is_transient() || matches!(error, Error::InvalidResponse(_))
}

/// Look up the first present key among spellings
fn field<'a>(body: &'a serde_json::Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|name| body.get(*name))
        .filter(|value| !value.is_null())
}

/// Parse a status payload: `{status, progress?, error?}`
fn parse_status(body: &Value) -> std::result::Result<TaskStatus, String> {
    let object = body
        .as_object()
        .ok_or_else(|| format!("task status is not an object: {}", body))?;

    let raw = field(object, &["status", "Status", "state", "State"])
        .and_then(Value::as_str)
        .ok_or_else(|| "task status has no status value".to_string())?;

    let state =
        TaskState::parse(raw).ok_or_else(|| format!("unrecognized task status '{}'", raw))?;

    let progress = field(object, &["progress", "Progress"])
        .and_then(Value::as_f64)
        .map(|p| p.clamp(0.0, 100.0).round() as u8);

    let error = match field(object, &["error", "Error"]) {
        Some(Value::String(message)) => Some(TaskError {
            code: String::new(),
            message: message.clone(),
        }),
        Some(value) => Some(
            serde_json::from_value::<TaskError>(value.clone())
                .map_err(|e| format!("malformed task error payload: {}", e))?,
        ),
        None => None,
    };

    Ok(TaskStatus {
        state,
        progress,
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_running_with_progress() {
        let status = parse_status(&json!({"status": "Running", "progress": 42})).unwrap();
        assert_eq!(status.state, TaskState::Running);
        assert_eq!(status.progress, Some(42));
        assert!(status.error.is_none());
    }

    #[test]
    fn parse_failed_with_error_object() {
        let status = parse_status(&json!({
            "Status": "Failed",
            "Error": {"Code": "VPG-17", "Message": "Journal datastore full"}
        }))
        .unwrap();
        assert_eq!(status.state, TaskState::Failed);
        let error = status.error.unwrap();
        assert_eq!(error.code, "VPG-17");
        assert_eq!(error.message, "Journal datastore full");
    }

    #[test]
    fn parse_error_as_plain_string() {
        let status = parse_status(&json!({"status": "Failed", "error": "boom"})).unwrap();
        assert_eq!(status.error.unwrap().message, "boom");
    }

    #[test]
    fn parse_rejects_unknown_state() {
        let err = parse_status(&json!({"status": "Paused"})).unwrap_err();
        assert!(err.contains("Paused"));
        assert!(parse_status(&json!("Completed")).is_err());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let options = TrackOptions::new(Duration::from_secs(1), None)
            .with_max_backoff(Duration::from_secs(5));
        assert_eq!(options.backoff(1), Duration::from_secs(1));
        assert_eq!(options.backoff(2), Duration::from_secs(2));
        assert_eq!(options.backoff(3), Duration::from_secs(4));
        assert_eq!(options.backoff(4), Duration::from_secs(5));
        assert_eq!(options.backoff(40), Duration::from_secs(5));
    }

    #[test]
    fn options_validation() {
        assert!(TrackOptions::default().validate().is_ok());
        assert!(TrackOptions::new(Duration::ZERO, None).validate().is_err());
        assert!(
            TrackOptions::new(Duration::from_secs(10), Some(Duration::from_secs(5)))
                .validate()
                .is_err()
        );
        assert!(
            TrackOptions::new(Duration::from_secs(10), None)
                .with_max_backoff(Duration::from_secs(1))
                .validate()
                .is_err()
        );
    }
}
