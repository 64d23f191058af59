//! Reconcile controller
//!
//! The ReconcileController is responsible for:
//! - Receiving ingress lifecycle events from an IngressEventSource
//! - Projecting desired records against the NodeRegistry snapshot
//! - Locating remote record ids in a fresh listing
//! - Issuing create/update/delete calls through the RemoteDirectory
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │ IngressEventSource │─── IngressEvent ───┐
//! └────────────────────┘                    │
//!                                           ▼
//!                               ┌─────────────────────┐
//!                               │ ReconcileController │
//!                               └─────────────────────┘
//!                                           │
//!         ┌─────────────────────────────────┼─────────────────────────────┐
//!         │                                 │                             │
//!         ▼                                 ▼                             ▼
//! ┌──────────────┐               ┌──────────────────┐             ┌─────────────┐
//! │ NodeRegistry │               │ RemoteDirectory  │             │   Events    │
//! │ (snapshot)   │               │ (list/CRUD)      │             │  (notify)   │
//! └──────────────┘               └──────────────────┘             └─────────────┘
//! ```
//!
//! ## Event Flow
//!
//! - **Add**: project, then create every record
//! - **Update**: skip if hostnames are unchanged; otherwise list once, locate
//!   each old record and overwrite it with its new counterpart
//! - **Delete**: project, list once, locate and delete every record
//!
//! Every remote failure is logged and the batch moves on to the next record.
//! A failed listing aborts only the batch that needed it.

use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval};
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use crate::change::hostnames_changed;
use crate::config::IgniterConfig;
use crate::error::Result;
use crate::locator::locate;
use crate::model::{DesiredRecord, IngressSnapshot, RecordType, RemoteRecord};
use crate::projection::project;
use crate::registry::NodeRegistry;
use crate::traits::{
    Classification, IngressEvent, IngressEventSource, IngressPayload, NodeSource, RemoteDirectory,
};

/// Remote operation attempted for a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// POST a new record
    Create,
    /// PUT over an existing record
    Update,
    /// DELETE an existing record
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        })
    }
}

/// Why a record was skipped without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The provider already holds this exact record
    AlreadyExists,
    /// No remote record matched, so there is no id to act on
    NotFound,
}

/// Events emitted by the ReconcileController
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// Controller started
    Started {
        nodes_count: usize,
    },

    /// Controller stopped
    Stopped {
        reason: String,
    },

    /// An event payload could not be parsed and was dropped
    EventDropped {
        kind: &'static str,
        error: String,
    },

    /// Update event without a hostname change (resync)
    IngressUnchanged {
        ingress: String,
    },

    /// Record created
    RecordCreated {
        hostname: String,
        address: IpAddr,
    },

    /// Record overwritten with new values
    RecordUpdated {
        hostname: String,
        address: IpAddr,
        previous_hostname: String,
        previous_address: IpAddr,
    },

    /// Record deleted
    RecordDeleted {
        hostname: String,
        address: IpAddr,
    },

    /// Record skipped without error
    RecordSkipped {
        operation: Operation,
        hostname: String,
        address: IpAddr,
        reason: SkipReason,
    },

    /// Remote call failed; the batch continued
    RecordFailed {
        operation: Operation,
        hostname: String,
        address: IpAddr,
        error: String,
    },

    /// Listing failed; nothing in the batch was attempted
    BatchAborted {
        ingress: String,
        kind: &'static str,
        error: String,
    },

    /// Node snapshot replaced
    NodesRefreshed {
        nodes_count: usize,
    },

    /// Node refresh failed; the previous snapshot is kept
    NodeRefreshFailed {
        error: String,
    },
}

/// Core reconcile controller
///
/// The controller converges the provider's records toward the state implied
/// by ingress events and the current node snapshot. It keeps no state
/// between events: record ids are rediscovered from a fresh listing each
/// time one is needed.
///
/// ## Lifecycle
///
/// 1. Create with [`ReconcileController::new()`]
/// 2. Populate the registry, e.g. with [`ReconcileController::refresh_nodes()`]
/// 3. Start with [`ReconcileController::run()`] or
///    [`ReconcileController::run_with_shutdown()`]
/// 4. The controller runs until the stop signal, then cancels the source
///
/// ## Threading
///
/// Events are handled serially on a single task. The only shared state is
/// the [`NodeRegistry`], which synchronizes itself.
pub struct ReconcileController {
    /// DNS provider directory
    directory: Box<dyn RemoteDirectory>,

    /// Worker node snapshot
    nodes: Arc<NodeRegistry>,

    /// Record type projected for every hostname
    record_type: RecordType,

    /// Node refresh period, if enabled
    node_refresh_interval: Option<Duration>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ControllerEvent>,
}

impl ReconcileController {
    /// Create a new controller
    ///
    /// # Parameters
    ///
    /// - `directory`: DNS provider directory
    /// - `nodes`: Node registry shared with whoever refreshes it
    /// - `config`: igniter configuration
    ///
    /// # Returns
    ///
    /// A tuple of (controller, event_receiver) where event_receiver yields
    /// controller events
    pub fn new(
        directory: Box<dyn RemoteDirectory>,
        nodes: Arc<NodeRegistry>,
        config: &IgniterConfig,
    ) -> Result<(Self, mpsc::Receiver<ControllerEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.controller.event_channel_capacity);

        let node_refresh_interval = match config.controller.node_refresh_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let controller = Self {
            directory,
            nodes,
            record_type: config.records.record_type,
            node_refresh_interval,
            event_tx: tx,
        };

        Ok((controller, rx))
    }

    /// Run the controller until Ctrl-C
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Fatal error
    pub async fn run<S: IngressEventSource>(&self, source: &S, node_source: &dyn NodeSource) -> Result<()> {
        self.run_internal(source, node_source, None).await
    }

    /// Run the controller until `shutdown_rx` fires
    ///
    /// The signal stops the intake of new events: the source is cancelled
    /// and an event already being handled runs to completion first. A
    /// dropped sender counts as a stop signal.
    pub async fn run_with_shutdown<S: IngressEventSource>(
        &self,
        source: &S,
        node_source: &dyn NodeSource,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> Result<()> {
        self.run_internal(source, node_source, Some(shutdown_rx)).await
    }

    async fn run_internal<S: IngressEventSource>(
        &self,
        source: &S,
        node_source: &dyn NodeSource,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.emit_event(ControllerEvent::Started {
            nodes_count: self.nodes.len(),
        });
        info!(
            "Controller started with {} node(s), provider {}",
            self.nodes.len(),
            self.directory.provider_name()
        );

        let mut shutdown: Pin<Box<dyn Future<Output = ()> + Send>> = match shutdown_rx {
            Some(rx) => Box::pin(async move {
                let _ = rx.await;
            }),
            None => Box::pin(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
            }),
        };

        let mut refresh = self
            .node_refresh_interval
            .map(|period| {
                let start = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
                tokio::time::interval_at(start, period)
            });

        let mut events = source.subscribe();

        let reason = loop {
            tokio::select! {
                // Bias toward shutdown so no new event is picked up after the signal
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break "Shutdown signal";
                }

                event = events.next() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        warn!("Ingress event stream ended");
                        break "Event stream ended";
                    }
                },

                _ = next_tick(&mut refresh) => {
                    if let Err(e) = self.refresh_nodes(node_source).await {
                        error!("Failed to refresh nodes, keeping previous snapshot: {}", e);
                        self.emit_event(ControllerEvent::NodeRefreshFailed {
                            error: e.to_string(),
                        });
                    }
                }
            }
        };

        source.cancel();
        self.emit_event(ControllerEvent::Stopped {
            reason: reason.to_string(),
        });
        info!("Controller stopped: {}", reason);

        Ok(())
    }

    /// Replace the node snapshot with a fresh listing
    ///
    /// # Returns
    ///
    /// The number of nodes in the new snapshot. On error the previous
    /// snapshot is left untouched.
    pub async fn refresh_nodes(&self, node_source: &dyn NodeSource) -> Result<usize> {
        let nodes = node_source.list_nodes().await?;
        for node in &nodes {
            debug!("Found node {}", node);
        }

        let count = nodes.len();
        self.nodes.set(nodes);
        info!("Node snapshot refreshed: {} node(s)", count);
        self.emit_event(ControllerEvent::NodesRefreshed { nodes_count: count });

        Ok(count)
    }

    /// Handle one ingress event
    ///
    /// Never fails: parse errors drop the event, remote errors are logged.
    pub async fn handle_event<P: IngressPayload>(&self, event: IngressEvent<P>) {
        let kind = event.kind();
        match event {
            IngressEvent::Add(payload) => {
                if let Some(ingress) = self.parse(kind, &payload) {
                    self.handle_add(&ingress).await;
                }
            }
            IngressEvent::Update(old, new) => {
                let Some(old) = self.parse(kind, &old) else {
                    return;
                };
                let Some(new) = self.parse(kind, &new) else {
                    return;
                };
                self.handle_update(&old, &new).await;
            }
            IngressEvent::Delete(payload) => {
                if let Some(ingress) = self.parse(kind, &payload) {
                    self.handle_delete(&ingress).await;
                }
            }
        }
    }

    fn parse<P: IngressPayload>(&self, kind: &'static str, payload: &P) -> Option<IngressSnapshot> {
        match payload.snapshot() {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Dropping {} event: {}", kind, e);
                self.emit_event(ControllerEvent::EventDropped {
                    kind,
                    error: e.to_string(),
                });
                None
            }
        }
    }

    /// Create every record of a new ingress
    pub async fn handle_add(&self, ingress: &IngressSnapshot) {
        let nodes = self.nodes.get();
        let desired = project(self.record_type, &ingress.hostnames, &nodes);
        debug!(
            "Ingress {} added: {} hostname(s), {} record(s)",
            ingress.key(),
            ingress.hostnames.len(),
            desired.len()
        );

        for record in &desired {
            self.create_record(record).await;
        }
    }

    /// Move the records of an ingress whose hostnames changed
    ///
    /// Records are paired by position. When the hostname count changed,
    /// surplus old records are deleted and surplus new records are created.
    pub async fn handle_update(&self, old: &IngressSnapshot, new: &IngressSnapshot) {
        if !hostnames_changed(&old.hostnames, &new.hostnames) {
            debug!("Skipping update of ingress {}: hostnames unchanged", new.key());
            self.emit_event(ControllerEvent::IngressUnchanged { ingress: new.key() });
            return;
        }

        let nodes = self.nodes.get();
        let old_desired = project(self.record_type, &old.hostnames, &nodes);
        let new_desired = project(self.record_type, &new.hostnames, &nodes);
        info!(
            "Ingress {} hostnames changed: {:?} -> {:?}",
            new.key(),
            old.hostnames,
            new.hostnames
        );

        if old_desired.is_empty() {
            // Nothing to locate
            for record in &new_desired {
                self.create_record(record).await;
            }
            return;
        }

        let Some(remote) = self.list_for_batch(&new.key(), "update").await else {
            return;
        };

        let paired = old_desired.len().min(new_desired.len());
        for (previous, record) in old_desired.iter().zip(&new_desired) {
            self.update_record(previous, record, &remote).await;
        }
        for stale in &old_desired[paired..] {
            self.delete_record(stale, &remote).await;
        }
        for added in &new_desired[paired..] {
            self.create_record(added).await;
        }
    }

    /// Delete every record of a removed ingress
    pub async fn handle_delete(&self, ingress: &IngressSnapshot) {
        let nodes = self.nodes.get();
        let desired = project(self.record_type, &ingress.hostnames, &nodes);
        if desired.is_empty() {
            debug!("Ingress {} deleted: no records to remove", ingress.key());
            return;
        }

        let Some(remote) = self.list_for_batch(&ingress.key(), "delete").await else {
            return;
        };

        for record in &desired {
            self.delete_record(record, &remote).await;
        }
    }

    /// List remote records once for a batch; `None` aborts the batch
    async fn list_for_batch(&self, ingress: &str, kind: &'static str) -> Option<Vec<RemoteRecord>> {
        match self.directory.list().await {
            Ok(remote) => {
                debug!("Listed {} remote record(s) for {} of {}", remote.len(), kind, ingress);
                Some(remote)
            }
            Err(e) => {
                error!(
                    "Unable to list DNS records from {}, aborting {} of ingress {}: {}",
                    self.directory.provider_name(),
                    kind,
                    ingress,
                    e
                );
                self.emit_event(ControllerEvent::BatchAborted {
                    ingress: ingress.to_string(),
                    kind,
                    error: e.to_string(),
                });
                None
            }
        }
    }

    async fn create_record(&self, record: &DesiredRecord) {
        match Classification::from_result(self.directory.create(record).await) {
            Classification::Success => {
                info!("Created DNS record {}", record);
                self.emit_event(ControllerEvent::RecordCreated {
                    hostname: record.hostname.clone(),
                    address: record.address,
                });
            }
            Classification::AlreadyExists => {
                info!("Skipping DNS record {}: already exists", record);
                self.record_skipped(Operation::Create, record, SkipReason::AlreadyExists);
            }
            Classification::Other(reason) => {
                self.record_failed(Operation::Create, record, reason);
            }
        }
    }

    async fn update_record(&self, previous: &DesiredRecord, record: &DesiredRecord, remote: &[RemoteRecord]) {
        let Some(id) = locate(previous, remote) else {
            warn!(
                "No remote DNS record matches {}, skipping update to {}",
                previous, record
            );
            self.record_skipped(Operation::Update, previous, SkipReason::NotFound);
            return;
        };

        match Classification::from_result(self.directory.update(id, record).await) {
            Classification::Success => {
                info!("Updated DNS record {} -> {}", previous, record);
                self.emit_event(ControllerEvent::RecordUpdated {
                    hostname: record.hostname.clone(),
                    address: record.address,
                    previous_hostname: previous.hostname.clone(),
                    previous_address: previous.address,
                });
            }
            Classification::AlreadyExists => {
                info!("Skipping DNS record {}: already exists", record);
                self.record_skipped(Operation::Update, record, SkipReason::AlreadyExists);
            }
            Classification::Other(reason) => {
                self.record_failed(Operation::Update, record, reason);
            }
        }
    }

    async fn delete_record(&self, record: &DesiredRecord, remote: &[RemoteRecord]) {
        let Some(id) = locate(record, remote) else {
            warn!("No remote DNS record matches {}, skipping delete", record);
            self.record_skipped(Operation::Delete, record, SkipReason::NotFound);
            return;
        };

        match Classification::from_result(self.directory.delete(id).await) {
            Classification::Success => {
                info!("Deleted DNS record {}", record);
                self.emit_event(ControllerEvent::RecordDeleted {
                    hostname: record.hostname.clone(),
                    address: record.address,
                });
            }
            Classification::AlreadyExists => {
                self.record_failed(
                    Operation::Delete,
                    record,
                    "provider answered delete with already-exists".to_string(),
                );
            }
            Classification::Other(reason) => {
                self.record_failed(Operation::Delete, record, reason);
            }
        }
    }

    fn record_skipped(&self, operation: Operation, record: &DesiredRecord, reason: SkipReason) {
        self.emit_event(ControllerEvent::RecordSkipped {
            operation,
            hostname: record.hostname.clone(),
            address: record.address,
            reason,
        });
    }

    fn record_failed(&self, operation: Operation, record: &DesiredRecord, reason: String) {
        error!(
            "Failed to {} DNS record {} at {}: {}",
            operation,
            record,
            self.directory.provider_name(),
            reason
        );
        self.emit_event(ControllerEvent::RecordFailed {
            operation,
            hostname: record.hostname.clone(),
            address: record.address,
            error: reason,
        });
    }

    /// Emit a controller event
    ///
    /// # Parameters
    ///
    /// - `event`: The event to emit
    fn emit_event(&self, event: ControllerEvent) {
        // Never block the dispatch loop on a slow consumer
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

/// Wait for the next refresh tick, or forever when refresh is disabled
async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
