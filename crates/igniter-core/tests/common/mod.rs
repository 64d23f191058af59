//! Test doubles and common utilities for controller contract tests
//!
//! The doubles here are small but behave like the real collaborators:
//! the directory keeps records in memory and answers with the same outcome
//! shapes as the provider, the event source is fed by the test.

#![allow(dead_code)]

use igniter_core::config::IgniterConfig;
use igniter_core::error::{Error, Result};
use igniter_core::model::{DesiredRecord, IngressSnapshot, NodeInfo, RemoteRecord};
use igniter_core::traits::{
    ApiError, ApiOutcome, IngressEvent, IngressEventSource, IngressEventStream, IngressPayload,
    NodeSource, RemoteDirectory,
};
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A controlled event source that emits events on demand
pub struct ControlledEventSource<P = IngressSnapshot> {
    /// Sender for test to send events
    test_tx: mpsc::UnboundedSender<IngressEvent<P>>,
    /// Receiver handed to the controller on subscribe
    controller_rx: Mutex<Option<mpsc::UnboundedReceiver<IngressEvent<P>>>>,
    /// Call counter for subscribe()
    subscribe_call_count: Arc<AtomicUsize>,
    /// Call counter for cancel()
    cancel_call_count: Arc<AtomicUsize>,
}

impl<P: IngressPayload> ControlledEventSource<P> {
    /// Create a new controlled source
    pub fn new() -> (Self, mpsc::UnboundedSender<IngressEvent<P>>) {
        let (test_tx, controller_rx) = mpsc::unbounded_channel();

        let source = Self {
            test_tx: test_tx.clone(),
            controller_rx: Mutex::new(Some(controller_rx)),
            subscribe_call_count: Arc::new(AtomicUsize::new(0)),
            cancel_call_count: Arc::new(AtomicUsize::new(0)),
        };

        (source, test_tx)
    }

    /// Get the number of times subscribe() was called
    pub fn subscribe_call_count(&self) -> usize {
        self.subscribe_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times cancel() was called
    pub fn cancel_call_count(&self) -> usize {
        self.cancel_call_count.load(Ordering::SeqCst)
    }

    /// Counter handle for cancel(), usable after the source moved into a task
    pub fn cancel_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.cancel_call_count)
    }
}

impl<P: IngressPayload> IngressEventSource for ControlledEventSource<P> {
    type Payload = P;

    fn subscribe(&self) -> IngressEventStream<P> {
        self.subscribe_call_count.fetch_add(1, Ordering::SeqCst);

        let rx = self
            .controller_rx
            .lock()
            .unwrap()
            .take()
            .expect("subscribe() can only be called once");

        Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
    }

    fn cancel(&self) {
        self.cancel_call_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// An event source that never emits events (for idle testing)
pub struct IdleEventSource {
    /// Keeps the stream open
    _tx: mpsc::UnboundedSender<IngressEvent<IngressSnapshot>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<IngressEvent<IngressSnapshot>>>>,
}

impl IdleEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            _tx: tx,
            rx: Mutex::new(Some(rx)),
        }
    }
}

impl IngressEventSource for IdleEventSource {
    type Payload = IngressSnapshot;

    fn subscribe(&self) -> IngressEventStream<IngressSnapshot> {
        let rx = self.rx.lock().unwrap().take().expect("subscribe() once");
        Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
    }

    fn cancel(&self) {}
}

/// A payload that never parses
#[derive(Debug, Clone)]
pub struct MalformedIngress;

impl IngressPayload for MalformedIngress {
    fn snapshot(&self) -> Result<IngressSnapshot> {
        Err(Error::parse("ingress has no metadata"))
    }
}

/// One recorded call against [`MockDirectory`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCall {
    List,
    Create(DesiredRecord),
    Update(String, DesiredRecord),
    Delete(String),
}

/// An in-memory RemoteDirectory that tracks calls
///
/// Creating a record that already exists (same name and content) answers
/// `AlreadyExists`, like the real provider. Updating or deleting an unknown
/// id answers a provider failure.
pub struct MockDirectory {
    /// Stored records
    records: Arc<Mutex<Vec<RemoteRecord>>>,
    /// Every call, in order
    calls: Arc<Mutex<Vec<DirectoryCall>>>,
    /// Hostnames whose create/update calls fail
    failing_hostnames: Arc<Mutex<HashSet<String>>>,
    /// Whether list() fails
    list_fails: Arc<AtomicBool>,
    /// Id sequence
    next_id: Arc<AtomicUsize>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            failing_hostnames: Arc::new(Mutex::new(HashSet::new())),
            list_fails: Arc::new(AtomicBool::new(false)),
            next_id: Arc::new(AtomicUsize::new(1)),
        }
    }

    /// Create a new MockDirectory that shares state with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            records: Arc::clone(&other.records),
            calls: Arc::clone(&other.calls),
            failing_hostnames: Arc::clone(&other.failing_hostnames),
            list_fails: Arc::clone(&other.list_fails),
            next_id: Arc::clone(&other.next_id),
        }
    }

    /// Seed a stored record, returning its id
    pub fn seed(&self, hostname: &str, address: IpAddr) -> String {
        let id = format!("rec-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.records.lock().unwrap().push(remote_record(&id, hostname, address));
        id
    }

    /// Make create/update calls for `hostname` fail
    pub fn fail_hostname(&self, hostname: &str) {
        self.failing_hostnames.lock().unwrap().insert(hostname.to_string());
    }

    /// Make list() fail with a transport error
    pub fn fail_list(&self, fails: bool) {
        self.list_fails.store(fails, Ordering::SeqCst);
    }

    /// Every call made so far
    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of list() calls made so far
    pub fn list_call_count(&self) -> usize {
        self.calls().iter().filter(|c| **c == DirectoryCall::List).count()
    }

    /// Stored records as sorted `(name, content)` pairs
    pub fn stored(&self) -> Vec<(String, String)> {
        let mut stored: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.name.clone(), r.content.clone()))
            .collect();
        stored.sort();
        stored
    }

    fn record_call(&self, call: DirectoryCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn injected_failure(&self, record: &DesiredRecord) -> Option<ApiOutcome> {
        if self.failing_hostnames.lock().unwrap().contains(&record.hostname) {
            Some(ApiOutcome::Failed(vec![ApiError {
                code: 9000,
                message: "internal error".to_string(),
            }]))
        } else {
            None
        }
    }
}

fn unknown_record() -> ApiOutcome {
    ApiOutcome::Failed(vec![ApiError {
        code: 81044,
        message: "Record does not exist.".to_string(),
    }])
}

fn remote_record(id: &str, hostname: &str, address: IpAddr) -> RemoteRecord {
    RemoteRecord {
        id: id.to_string(),
        record_type: if address.is_ipv4() { "A" } else { "AAAA" }.to_string(),
        name: hostname.to_string(),
        content: address.to_string(),
        ttl: 120,
        proxied: false,
        zone: "example.com".to_string(),
        modified_on: None,
    }
}

#[async_trait::async_trait]
impl RemoteDirectory for MockDirectory {
    async fn list(&self) -> Result<Vec<RemoteRecord>> {
        self.record_call(DirectoryCall::List);
        if self.list_fails.load(Ordering::SeqCst) {
            return Err(Error::transport("connection refused"));
        }
        Ok(self.records.lock().unwrap().clone())
    }

    async fn create(&self, record: &DesiredRecord) -> Result<ApiOutcome> {
        self.record_call(DirectoryCall::Create(record.clone()));
        if let Some(outcome) = self.injected_failure(record) {
            return Ok(outcome);
        }

        let content = record.content();
        let mut records = self.records.lock().unwrap();
        if records.iter().any(|r| r.name == record.hostname && r.content == content) {
            return Ok(ApiOutcome::AlreadyExists);
        }

        let id = format!("rec-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        records.push(remote_record(&id, &record.hostname, record.address));
        Ok(ApiOutcome::Success)
    }

    async fn update(&self, id: &str, record: &DesiredRecord) -> Result<ApiOutcome> {
        self.record_call(DirectoryCall::Update(id.to_string(), record.clone()));
        if let Some(outcome) = self.injected_failure(record) {
            return Ok(outcome);
        }

        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| r.id == id) {
            Some(stored) => {
                *stored = remote_record(id, &record.hostname, record.address);
                Ok(ApiOutcome::Success)
            }
            None => Ok(unknown_record()),
        }
    }

    async fn delete(&self, id: &str) -> Result<ApiOutcome> {
        self.record_call(DirectoryCall::Delete(id.to_string()));

        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(unknown_record());
        }
        Ok(ApiOutcome::Success)
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// A NodeSource returning a replaceable node list
pub struct StaticNodeSource {
    nodes: Arc<Mutex<Vec<NodeInfo>>>,
    fails: Arc<AtomicBool>,
    list_call_count: Arc<AtomicUsize>,
}

impl StaticNodeSource {
    pub fn new(nodes: Vec<NodeInfo>) -> Self {
        Self {
            nodes: Arc::new(Mutex::new(nodes)),
            fails: Arc::new(AtomicBool::new(false)),
            list_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a new StaticNodeSource that shares state with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            nodes: Arc::clone(&other.nodes),
            fails: Arc::clone(&other.fails),
            list_call_count: Arc::clone(&other.list_call_count),
        }
    }

    /// Replace the node list returned from now on
    pub fn set_nodes(&self, nodes: Vec<NodeInfo>) {
        *self.nodes.lock().unwrap() = nodes;
    }

    /// Make list_nodes() fail
    pub fn fail(&self, fails: bool) {
        self.fails.store(fails, Ordering::SeqCst);
    }

    /// Get the number of times list_nodes() was called
    pub fn list_call_count(&self) -> usize {
        self.list_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl NodeSource for StaticNodeSource {
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        self.list_call_count.fetch_add(1, Ordering::SeqCst);
        if self.fails.load(Ordering::SeqCst) {
            return Err(Error::node_source("nodes is forbidden"));
        }
        Ok(self.nodes.lock().unwrap().clone())
    }
}

/// Helper to create a minimal IgniterConfig for testing
pub fn minimal_config() -> IgniterConfig {
    let mut config = IgniterConfig::new("test-token", "test-zone");
    config.controller.event_channel_capacity = 100;
    config
}

/// Worker node `name` with IPv4 address `10.0.0.{last}`
pub fn node(name: &str, last: u8) -> NodeInfo {
    NodeInfo::new(name, IpAddr::from([10, 0, 0, last]))
}

/// Ingress `default/{name}` with the given hostnames
pub fn ingress(name: &str, hostnames: &[&str]) -> IngressSnapshot {
    IngressSnapshot::new(
        format!("uid-{}", name),
        "default",
        name,
        hostnames.iter().map(|h| h.to_string()).collect(),
    )
}

/// Pair for stored-record assertions
pub fn stored(hostname: &str, last: u8) -> (String, String) {
    (hostname.to_string(), format!("10.0.0.{}", last))
}

/// Drain every event currently buffered
pub fn drain<T>(rx: &mut mpsc::Receiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
