//! Architectural Contract Test: Idempotency
//!
//! This test verifies that replayed events converge instead of piling up.
//!
//! Constraints verified:
//! - A resync (Update with identical hostnames) makes no provider calls
//! - Replaying an Add creates no duplicate records
//! - Replaying a Delete is a logged skip, not a failure
//!
//! If this test fails, someone has added:
//! - Unconditional writes on resync
//! - Failure handling that treats AlreadyExists as an error

mod common;

use common::*;
use igniter_core::controller::{ControllerEvent, SkipReason};
use igniter_core::registry::NodeRegistry;
use igniter_core::traits::IngressEvent;
use igniter_core::ReconcileController;
use std::sync::Arc;

fn controller(directory: &MockDirectory) -> (ReconcileController, tokio::sync::mpsc::Receiver<ControllerEvent>) {
    ReconcileController::new(
        Box::new(MockDirectory::sharing_counters_with(directory)),
        Arc::new(NodeRegistry::with_nodes(vec![node("n1", 1), node("n2", 2)])),
        &minimal_config(),
    )
    .expect("controller construction succeeds")
}

#[tokio::test]
async fn resync_makes_no_provider_calls() {
    let directory = MockDirectory::new();
    let (controller, _events) = controller(&directory);
    let web = ingress("web", &["a.example.com", "b.example.com"]);

    for _ in 0..5 {
        controller
            .handle_event(IngressEvent::Update(web.clone(), web.clone()))
            .await;
    }

    assert_eq!(directory.call_count(), 0);
}

#[tokio::test]
async fn replayed_add_creates_no_duplicates() {
    let directory = MockDirectory::new();
    let (controller, mut events) = controller(&directory);
    let web = ingress("web", &["a.example.com"]);

    controller.handle_event(IngressEvent::Add(web.clone())).await;
    let after_first = directory.stored();
    drain(&mut events);

    controller.handle_event(IngressEvent::Add(web)).await;

    assert_eq!(directory.stored(), after_first, "Second Add should not change remote state");
    let events = drain(&mut events);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| matches!(
        e,
        ControllerEvent::RecordSkipped { reason: SkipReason::AlreadyExists, .. }
    )));
}

#[tokio::test]
async fn replayed_delete_is_a_skip() {
    let directory = MockDirectory::new();
    let (controller, mut events) = controller(&directory);
    let web = ingress("web", &["a.example.com"]);

    controller.handle_event(IngressEvent::Add(web.clone())).await;
    controller.handle_event(IngressEvent::Delete(web.clone())).await;
    assert!(directory.stored().is_empty());
    drain(&mut events);

    controller.handle_event(IngressEvent::Delete(web)).await;

    let events = drain(&mut events);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| matches!(
        e,
        ControllerEvent::RecordSkipped { reason: SkipReason::NotFound, .. }
    )));
}
