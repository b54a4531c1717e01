//! Test doubles and common utilities for architecture contract tests
//!
//! The scripted transport answers requests from per-endpoint reply queues and
//! records every call, so tests can assert both outcomes and the exact remote
//! traffic (e.g. "no mutating request was made").

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use vpgctl_core::error::{Error, Result};
use vpgctl_core::model::NicConfiguration;
use vpgctl_core::settings;
use vpgctl_core::traits::{ApiResponse, CredentialSource, Method, Transport};
use vpgctl_core::{BearerToken, Session, TabularRow};

/// One scripted reply
#[derive(Debug, Clone)]
pub enum Reply {
    /// 200 with a JSON body
    Ok(Value),
    /// Network failure or 5xx
    Transient(&'static str),
    /// 4xx
    Rejected(u16, &'static str),
}

impl Reply {
    fn into_result(self) -> Result<ApiResponse> {
        match self {
            Reply::Ok(body) => Ok(ApiResponse::new(200, body)),
            Reply::Transient(msg) => Err(Error::transient(msg)),
            Reply::Rejected(status, msg) => Err(Error::rejected(status, msg)),
        }
    }
}

/// A request seen by the scripted transport
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// A Transport answering from scripted reply queues
///
/// Each (method, path) has a queue; replies are consumed in order and the
/// last one repeats forever. Unscripted endpoints answer 404.
pub struct ScriptedTransport {
    scripts: Arc<Mutex<HashMap<(Method, String), VecDeque<Reply>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    request_count: Arc<AtomicUsize>,
    latency: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            scripts: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            request_count: Arc::new(AtomicUsize::new(0)),
            latency: Duration::ZERO,
        }
    }

    /// Delay every reply by `latency` (tokio time, so pausable)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue replies for an endpoint
    pub fn on(&self, method: Method, path: &str, replies: Vec<Reply>) {
        self.scripts
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .extend(replies);
    }

    /// Script `GET /v1/tasks/{handle}` with the given status values
    pub fn on_task(&self, handle: &str, statuses: &[&str]) {
        let replies = statuses
            .iter()
            .map(|status| Reply::Ok(task_status(status)))
            .collect();
        self.on(Method::Get, &format!("/v1/tasks/{}", handle), replies);
    }

    /// Get the number of requests made
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get every recorded request, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Requests with a state-changing method
    pub fn mutating_calls(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.method.is_mutating())
            .collect()
    }

    /// "METHOD path" for every recorded request
    pub fn call_log(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|call| format!("{} {}", call.method, call.path))
            .collect()
    }

    /// Create a new ScriptedTransport that shares scripts and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            scripts: Arc::clone(&other.scripts),
            calls: Arc::clone(&other.calls),
            request_count: Arc::clone(&other.request_count),
            latency: other.latency,
        }
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn request(
        &self,
        _session: &Session,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut scripts = self.scripts.lock().unwrap();
        let reply = match scripts.get_mut(&(method, path.to_string())) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        reply
            .unwrap_or(Reply::Rejected(404, "no script for endpoint"))
            .into_result()
    }

    fn transport_name(&self) -> &'static str {
        "scripted"
    }
}

/// Credentials that always hand out a long-lived token
pub struct StaticCredentials {
    token_call_count: Arc<AtomicUsize>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self {
            token_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the number of times get_token() was called
    pub fn token_call_count(&self) -> usize {
        self.token_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CredentialSource for StaticCredentials {
    async fn get_token(&self) -> Result<BearerToken> {
        self.token_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(BearerToken::expiring_in("test-token", chrono::Duration::hours(1)))
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

/// Session over static credentials
pub fn test_session() -> Session {
    Session::new(Box::new(StaticCredentials::new()))
}

/// Task status payload
pub fn task_status(status: &str) -> Value {
    json!({ "status": status })
}

/// VPG settings document holding the given NIC records
///
/// Extra keys the client does not understand are included so tests can
/// check they survive a round trip.
pub fn vpg_document(vpg_name: &str, nics: &[NicConfiguration]) -> Value {
    let mut vms: Vec<Value> = Vec::new();
    for nic in nics {
        let vm_id = &nic.identity.vm_identifier;
        let position = vms.iter().position(|vm| vm["VmIdentifier"] == json!(vm_id));
        let index = match position {
            Some(index) => index,
            None => {
                vms.push(json!({
                    "VmIdentifier": vm_id,
                    "Recovery": {"HostIdentifier": "host-1"},
                    "Nics": []
                }));
                vms.len() - 1
            }
        };
        vms[index]["Nics"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "NicIdentifier": nic.identity.nic_identifier }));
    }

    let mut document = json!({
        "Basic": {"Name": vpg_name, "RpoInSeconds": 300},
        "Journal": {"Limitation": {"HardLimitInMB": 153600}},
        "Vms": vms
    });
    for nic in nics {
        settings::write_nic(&mut document, nic).unwrap();
    }
    document
}

/// A desired-state row with both phases' required flags set
pub fn desired_row(vm: &str, nic: &str) -> TabularRow {
    TabularRow::new()
        .with("VPG Name", "Finance")
        .with("VM Identifier", vm)
        .with("NIC Identifier", nic)
        .with("Failover ShouldReplaceIpConfiguration", "False")
        .with("Failover DHCP", "False")
        .with("Failover Test ShouldReplaceIpConfiguration", "False")
        .with("Failover Test DHCP", "False")
}
