//! Desired record projection
//!
//! Maps (record type, hostnames, nodes) to the ordered sequence of records
//! that should exist. Hostnames are the outer dimension and nodes the inner
//! one, so two projections over the same node list can be compared
//! position by position.

use crate::model::{DesiredRecord, NodeInfo, RecordType};

/// Project hostnames onto nodes
///
/// Returns exactly `hostnames.len() * nodes.len()` records. Addresses are not
/// checked against the record type.
pub fn project(record_type: RecordType, hostnames: &[String], nodes: &[NodeInfo]) -> Vec<DesiredRecord> {
    hostnames
        .iter()
        .flat_map(|hostname| {
            nodes.iter().map(move |node| DesiredRecord {
                record_type,
                hostname: hostname.clone(),
                address: node.public_address,
            })
        })
        .collect()
}
