//! Hostname change detection
//!
//! Periodic resync re-delivers update events for ingresses that did not
//! change. [`hostnames_changed`] decides whether an update is real.

/// Whether the hostname list of an ingress changed between two observations
///
/// Lists of different lengths always count as changed. Lists of equal length
/// are compared position by position, since record pairing on update is
/// positional too.
pub fn hostnames_changed(old: &[String], new: &[String]) -> bool {
    if old.len() != new.len() {
        return true;
    }
    old.iter().zip(new).any(|(o, n)| o != n)
}
