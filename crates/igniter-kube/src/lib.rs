// # igniter-kube
//
// Kubernetes-backed sources for the reconcile controller:
//
// - [`KubeIngressSource`]: watches `networking.k8s.io/v1` Ingresses in all
//   namespaces and delivers add/update/delete events with periodic resyncs
// - [`KubeNodeSource`]: lists nodes and reads their public address annotation
//
// Both only read from the API server; they never touch DNS.

pub mod ingress;
pub mod node;

pub use ingress::{parse_ingress, IngressCache, IngressObject, KubeIngressSource};
pub use node::{select_workers, KubeNodeSource};
