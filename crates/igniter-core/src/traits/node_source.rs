// # Node Source Trait
//
// One-shot listing of the worker nodes DNS records point at.
//
// ## Implementations
//
// - Kubernetes node list: `igniter-kube` crate

use async_trait::async_trait;

use crate::model::NodeInfo;

/// Trait for node sources
///
/// Implementations filter out control-plane nodes and nodes without a usable
/// public address before returning; every returned [`NodeInfo`] is final.
#[async_trait]
pub trait NodeSource: Send + Sync {
    /// List the current worker nodes
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<NodeInfo>)`: worker nodes, in listing order
    /// - `Err(Error)`: if the cluster could not be queried
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, crate::Error>;
}
