// # Ingress Event Source Trait
//
// Defines the interface for receiving ingress lifecycle events.
//
// ## Implementations
//
// - Kubernetes watcher: `igniter-kube` crate
//
// ## Usage
//
// ```rust,ignore
// use igniter_core::traits::{IngressEvent, IngressEventSource};
// use tokio_stream::StreamExt;
//
// let mut events = source.subscribe();
// while let Some(event) = events.next().await {
//     println!("{} event", event.kind());
// }
// ```

use std::pin::Pin;
use tokio_stream::Stream;

use crate::model::IngressSnapshot;

/// Lifecycle event for one ingress
///
/// `P` is the payload delivered by the source. The controller turns it into
/// an [`IngressSnapshot`] through [`IngressPayload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressEvent<P> {
    /// The ingress appeared
    Add(P),
    /// The ingress was observed again; `(old, new)`
    Update(P, P),
    /// The ingress disappeared
    Delete(P),
}

impl<P> IngressEvent<P> {
    /// Short name of the event kind, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            IngressEvent::Add(_) => "add",
            IngressEvent::Update(_, _) => "update",
            IngressEvent::Delete(_) => "delete",
        }
    }
}

/// A payload the controller can parse into a snapshot
pub trait IngressPayload: Send + Sync + 'static {
    /// Parse the payload
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Parse`] when the payload has an unexpected
    /// shape. The controller drops that event and keeps going.
    fn snapshot(&self) -> Result<IngressSnapshot, crate::Error>;
}

impl IngressPayload for IngressSnapshot {
    fn snapshot(&self) -> Result<IngressSnapshot, crate::Error> {
        Ok(self.clone())
    }
}

/// Stream of ingress events
pub type IngressEventStream<P> = Pin<Box<dyn Stream<Item = IngressEvent<P>> + Send + 'static>>;

/// Trait for ingress event sources
///
/// # Delivery Contract
///
/// - Events are delivered one at a time, in order
/// - Every known ingress is re-delivered as `Update(x, x)` on each resync
///   interval, even without a real change
/// - [`cancel`](IngressEventSource::cancel) stops delivery; the stream ends
///   once buffered events are drained
///
/// # Trust Level: Semi-Trusted
///
/// Sources may spawn one task to drive the underlying watch, and that task
/// must exit when cancelled. Sources never talk to the DNS provider.
pub trait IngressEventSource: Send + Sync {
    /// Payload type carried by the events
    type Payload: IngressPayload;

    /// Start delivering events
    ///
    /// Called once per controller run.
    fn subscribe(&self) -> IngressEventStream<Self::Payload>;

    /// Stop delivering new events
    fn cancel(&self);
}
