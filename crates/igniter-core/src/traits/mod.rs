//! Core traits for igniter
//!
//! This module defines the abstract interfaces the controller is wired from.
//!
//! - [`RemoteDirectory`]: List/create/update/delete DNS records at the provider
//! - [`IngressEventSource`]: Deliver ingress lifecycle events
//! - [`NodeSource`]: List worker nodes and their public addresses

pub mod remote_directory;
pub mod event_source;
pub mod node_source;

pub use remote_directory::{RemoteDirectory, ApiOutcome, ApiError, Classification};
pub use event_source::{IngressEventSource, IngressEvent, IngressPayload, IngressEventStream};
pub use node_source::NodeSource;
