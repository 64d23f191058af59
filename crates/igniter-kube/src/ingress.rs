//! Ingress event source backed by a Kubernetes watch
//!
//! The watcher reports objects as they are applied or deleted. The
//! controller needs `(old, new)` pairs on change, so [`IngressCache`]
//! remembers the last seen object per `namespace/name` and turns the watch
//! into add/update/delete events. A ticker re-delivers every cached ingress
//! as `Update(x, x)` on each resync interval.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use igniter_core::model::IngressSnapshot;
use igniter_core::traits::{IngressEvent, IngressEventSource, IngressEventStream, IngressPayload};
use igniter_core::Error;
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, ResourceExt};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Ingress object as delivered by the cluster
#[derive(Debug, Clone, PartialEq)]
pub struct IngressObject(pub Ingress);

impl IngressPayload for IngressObject {
    fn snapshot(&self) -> Result<IngressSnapshot, Error> {
        parse_ingress(&self.0)
    }
}

/// Parse an ingress into a snapshot
///
/// Hostnames are taken from `spec.rules[].host` in rule order. Rules without
/// a host (catch-all rules) contribute no hostname.
///
/// # Errors
///
/// Returns [`Error::Parse`] when the object has no name.
pub fn parse_ingress(ingress: &Ingress) -> Result<IngressSnapshot, Error> {
    let name = ingress
        .metadata
        .name
        .clone()
        .ok_or_else(|| Error::parse("ingress has no metadata.name"))?;
    let namespace = ingress
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| "default".to_string());
    let id = ingress.metadata.uid.clone().unwrap_or_default();

    let hostnames = ingress
        .spec
        .iter()
        .flat_map(|spec| spec.rules.iter().flatten())
        .filter_map(|rule| rule.host.as_deref())
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .collect();

    Ok(IngressSnapshot {
        id,
        namespace,
        name,
        hostnames,
    })
}

fn cache_key(ingress: &Ingress) -> String {
    format!(
        "{}/{}",
        ingress.namespace().unwrap_or_default(),
        ingress.name_any()
    )
}

/// Last seen state of every ingress
///
/// Keys are `namespace/name`; iteration order is sorted so resyncs are
/// deterministic.
#[derive(Debug, Default)]
pub struct IngressCache {
    known: BTreeMap<String, Ingress>,
    /// Keys seen since the last `Init`, while a relist is in progress
    relisted: Option<HashSet<String>>,
}

impl IngressCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached ingresses
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Fold one watcher event into the cache
    ///
    /// A relist (`Init` .. `InitDone`) re-applies every live object; objects
    /// missing from the relist were deleted while the watch was down and
    /// come out as `Delete`.
    pub fn apply(&mut self, event: watcher::Event<Ingress>) -> Vec<IngressEvent<IngressObject>> {
        match event {
            watcher::Event::Init => {
                debug!("Ingress relist started");
                self.relisted = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(ingress) => {
                if let Some(relisted) = self.relisted.as_mut() {
                    relisted.insert(cache_key(&ingress));
                }
                self.upsert(ingress).into_iter().collect()
            }
            watcher::Event::InitDone => {
                let Some(relisted) = self.relisted.take() else {
                    return Vec::new();
                };
                let gone: Vec<String> = self
                    .known
                    .keys()
                    .filter(|key| !relisted.contains(*key))
                    .cloned()
                    .collect();
                debug!(
                    "Ingress relist done: {} live, {} gone",
                    relisted.len(),
                    gone.len()
                );
                gone.into_iter()
                    .filter_map(|key| self.known.remove(&key))
                    .map(|ingress| IngressEvent::Delete(IngressObject(ingress)))
                    .collect()
            }
            watcher::Event::Apply(ingress) => self.upsert(ingress).into_iter().collect(),
            watcher::Event::Delete(ingress) => {
                let key = cache_key(&ingress);
                self.known.remove(&key);
                vec![IngressEvent::Delete(IngressObject(ingress))]
            }
        }
    }

    fn upsert(&mut self, ingress: Ingress) -> Option<IngressEvent<IngressObject>> {
        let key = cache_key(&ingress);
        match self.known.insert(key, ingress.clone()) {
            Some(previous) if previous == ingress => {
                // Relist of an unchanged object; resync covers it
                None
            }
            Some(previous) => Some(IngressEvent::Update(
                IngressObject(previous),
                IngressObject(ingress),
            )),
            None => Some(IngressEvent::Add(IngressObject(ingress))),
        }
    }

    /// Re-deliver every known ingress unchanged
    pub fn resync(&self) -> Vec<IngressEvent<IngressObject>> {
        self.known
            .values()
            .map(|ingress| IngressEvent::Update(IngressObject(ingress.clone()), IngressObject(ingress.clone())))
            .collect()
    }
}

/// Ingress event source watching all namespaces
pub struct KubeIngressSource {
    client: Client,
    resync_interval: Duration,
    cancel_tx: watch::Sender<bool>,
}

impl KubeIngressSource {
    /// Create a source; nothing is watched until subscribe()
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `resync_interval` is zero.
    pub fn new(client: Client, resync_interval: Duration) -> Result<Self, Error> {
        let resync_interval = checked_resync_interval(resync_interval)?;
        let (cancel_tx, _) = watch::channel(false);
        Ok(Self {
            client,
            resync_interval,
            cancel_tx,
        })
    }
}

fn checked_resync_interval(resync_interval: Duration) -> Result<Duration, Error> {
    if resync_interval.is_zero() {
        return Err(Error::config("Ingress resync interval must be > 0"));
    }
    Ok(resync_interval)
}

impl IngressEventSource for KubeIngressSource {
    type Payload = IngressObject;

    fn subscribe(&self) -> IngressEventStream<IngressObject> {
        let (tx, rx) = mpsc::unbounded_channel();
        let api: Api<Ingress> = Api::all(self.client.clone());

        tokio::spawn(drive_watch(
            api,
            self.resync_interval,
            tx,
            self.cancel_tx.subscribe(),
        ));

        Box::pin(UnboundedReceiverStream::new(rx))
    }

    fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }
}

/// Run the watch until cancelled or the consumer goes away
async fn drive_watch(
    api: Api<Ingress>,
    resync_interval: Duration,
    tx: mpsc::UnboundedSender<IngressEvent<IngressObject>>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    if *cancel_rx.borrow_and_update() {
        return;
    }

    let mut cache = IngressCache::new();
    let mut stream = std::pin::pin!(watcher(api, watcher::Config::default()).default_backoff());
    let start = Instant::now().checked_add(resync_interval).unwrap_or_else(Instant::now);
    let mut resync = tokio::time::interval_at(start, resync_interval);
    info!("Watching ingresses, resync every {:?}", resync_interval);

    loop {
        let events = tokio::select! {
            _ = cancel_rx.changed() => break,

            item = stream.next() => match item {
                Some(Ok(event)) => cache.apply(event),
                Some(Err(e)) => {
                    // default_backoff() restarts the watch
                    warn!("Ingress watch error: {}", e);
                    continue;
                }
                None => break,
            },

            _ = resync.tick() => {
                debug!("Resyncing {} ingress(es)", cache.len());
                cache.resync()
            }
        };

        for event in events {
            if tx.send(event).is_err() {
                debug!("Ingress event consumer gone");
                return;
            }
        }
    }

    info!("Ingress watch stopped");
}
