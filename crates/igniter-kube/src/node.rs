//! Worker node listing
//!
//! Nodes announce their public address through an annotation (by default
//! the one flannel sets). Control-plane nodes are recognised by name.

use std::net::IpAddr;

use async_trait::async_trait;
use igniter_core::config::NodeSourceConfig;
use igniter_core::model::NodeInfo;
use igniter_core::traits::NodeSource;
use igniter_core::{Error, Result};
use k8s_openapi::api::core::v1::Node;
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use tracing::{debug, warn};

/// Select worker nodes and read their public addresses
///
/// Nodes whose name contains `excluded_name_pattern` are skipped, as are
/// nodes whose annotation is missing or not an IP address. An empty pattern
/// excludes nothing.
pub fn select_workers(nodes: &[Node], config: &NodeSourceConfig) -> Vec<NodeInfo> {
    nodes
        .iter()
        .filter_map(|node| {
            let name = node.name_any();

            if !config.excluded_name_pattern.is_empty() && name.contains(&config.excluded_name_pattern) {
                debug!("Skipping control-plane node {}", name);
                return None;
            }

            let Some(raw) = node.annotations().get(&config.address_annotation) else {
                warn!(
                    "Skipping node {}: annotation {} is missing",
                    name, config.address_annotation
                );
                return None;
            };

            match raw.trim().parse::<IpAddr>() {
                Ok(address) => Some(NodeInfo::new(name, address)),
                Err(e) => {
                    warn!("Skipping node {}: invalid address {:?}: {}", name, raw, e);
                    None
                }
            }
        })
        .collect()
}

/// Node source listing cluster nodes through the API server
pub struct KubeNodeSource {
    client: Client,
    config: NodeSourceConfig,
}

impl KubeNodeSource {
    pub fn new(client: Client, config: NodeSourceConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl NodeSource for KubeNodeSource {
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::node_source(format!("Failed to list nodes: {}", e)))?;

        let workers = select_workers(&nodes.items, &self.config);
        debug!("{} of {} node(s) are workers", workers.len(), nodes.items.len());
        Ok(workers)
    }
}
