// # igniter-core
//
// Core library for the ingress-to-DNS reconciliation controller.
//
// ## Architecture Overview
//
// This library keeps DNS records at a provider in step with the hostnames
// declared by cluster ingresses:
// - **IngressEventSource**: Trait delivering ingress add/update/delete events
// - **NodeSource**: Trait listing worker nodes and their public addresses
// - **RemoteDirectory**: Trait listing and mutating records at the provider
// - **NodeRegistry**: Shared snapshot of the current worker nodes
// - **ReconcileController**: Turns each event into provider calls
//
// Every hostname of an ingress gets one record per worker node. The
// controller holds no record ids between events; it locates them in a fresh
// listing whenever an update or delete needs them.
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Projection and matching are pure functions
// 2. **Event-Driven**: Ingress changes arrive as an async stream
// 3. **Library-First**: The daemon is a thin wiring layer over this crate
// 4. **Best Effort**: A failed record is logged, never retried, never fatal

pub mod traits;
pub mod controller;
pub mod registry;
pub mod config;
pub mod error;
pub mod model;
pub mod projection;
pub mod change;
pub mod locator;

// Re-export core types for convenience
pub use traits::{IngressEventSource, NodeSource, RemoteDirectory};
pub use controller::{ControllerEvent, ReconcileController};
pub use registry::NodeRegistry;
pub use config::{IgniterConfig, ProviderConfig, RecordSettings, NodeSourceConfig, ControllerSettings};
pub use error::{Error, Result};
pub use model::{DesiredRecord, IngressSnapshot, NodeInfo, RecordType, RemoteRecord};
