//! Worker node registry
//!
//! The registry holds the current snapshot of worker-node public addresses.
//! It is written at startup and on node refresh, and read once per ingress
//! event by the controller.
//!
//! ## Usage
//!
//! ```rust
//! use igniter_core::registry::NodeRegistry;
//! use igniter_core::model::NodeInfo;
//! use std::net::IpAddr;
//!
//! let registry = NodeRegistry::new();
//! registry.set(vec![NodeInfo::new("worker-1", IpAddr::from([10, 0, 0, 1]))]);
//!
//! let nodes = registry.get();
//! assert_eq!(nodes.len(), 1);
//! ```

use crate::model::NodeInfo;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry of worker nodes
///
/// ## Thread Safety
///
/// The snapshot lives behind an `RwLock` and is swapped as a whole, so
/// readers always see a complete node list. Readers get an `Arc` to the
/// snapshot and release the lock immediately; no I/O ever happens while the
/// lock is held.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: RwLock<Arc<Vec<NodeInfo>>>,
}

impl NodeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding an initial snapshot
    pub fn with_nodes(nodes: Vec<NodeInfo>) -> Self {
        Self {
            nodes: RwLock::new(Arc::new(nodes)),
        }
    }

    /// Replace the snapshot
    pub fn set(&self, nodes: Vec<NodeInfo>) {
        let snapshot = Arc::new(nodes);
        let mut guard = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        *guard = snapshot;
    }

    /// Current snapshot
    pub fn get(&self) -> Arc<Vec<NodeInfo>> {
        let guard = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Number of nodes in the current snapshot
    pub fn len(&self) -> usize {
        self.get().len()
    }

    /// Whether the current snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.get().is_empty()
    }
}
