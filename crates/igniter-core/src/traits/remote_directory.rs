// # Remote Directory Trait
//
// Client-side contract over the DNS provider's record set.
//
// ## Implementations
//
// - Cloudflare: `igniter-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use igniter_core::traits::{Classification, RemoteDirectory};
//
// async fn publish(directory: &dyn RemoteDirectory, record: &DesiredRecord) {
//     match Classification::from_result(directory.create(record).await) {
//         Classification::Success => println!("created"),
//         Classification::AlreadyExists => println!("already there"),
//         Classification::Other(reason) => eprintln!("failed: {}", reason),
//     }
// }
// ```

use async_trait::async_trait;
use std::fmt;

use crate::model::{DesiredRecord, RemoteRecord};

/// One entry of the provider's `errors` array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Provider error code
    pub code: i64,
    /// Human readable message
    pub message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Typed reading of a provider response envelope
///
/// Built by the directory implementation from the parsed response body, so
/// that callers never branch on raw JSON fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiOutcome {
    /// The provider reported no errors
    Success,
    /// The exact record already exists
    AlreadyExists,
    /// The provider rejected the request
    Failed(Vec<ApiError>),
}

/// Classification that drives the controller's branching
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// No errors reported
    Success,
    /// Idempotent no-op: the record is already present
    AlreadyExists,
    /// Any other non-success response, or a transport failure
    Other(String),
}

impl Classification {
    /// Classify the result of a create/update/delete call
    pub fn from_result(result: Result<ApiOutcome, crate::Error>) -> Self {
        match result {
            Ok(ApiOutcome::Success) => Classification::Success,
            Ok(ApiOutcome::AlreadyExists) => Classification::AlreadyExists,
            Ok(ApiOutcome::Failed(errors)) if errors.is_empty() => {
                Classification::Other("provider reported failure without errors".to_string())
            }
            Ok(ApiOutcome::Failed(errors)) => Classification::Other(
                errors
                    .iter()
                    .map(ApiError::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            Err(e) => Classification::Other(e.to_string()),
        }
    }
}

/// Trait for DNS provider record directories
///
/// # Trust Level: Untrusted
///
/// Directories are isolated, stateless and single-shot:
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses into [`ApiOutcome`]
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (a failed item is logged by the controller and skipped)
/// - ❌ Cache record ids between calls (ids are rediscovered per event)
/// - ❌ Spawn tasks or threads
///
/// # Errors
///
/// `Err` is reserved for transport failures and unreadable responses. A
/// well-formed response that reports failure is `Ok(ApiOutcome::Failed(..))`.
#[async_trait]
pub trait RemoteDirectory: Send + Sync {
    /// List the first page of records in the zone
    async fn list(&self) -> Result<Vec<RemoteRecord>, crate::Error>;

    /// Create a record
    async fn create(&self, record: &DesiredRecord) -> Result<ApiOutcome, crate::Error>;

    /// Overwrite the record identified by `id` with `record`
    async fn update(&self, id: &str, record: &DesiredRecord) -> Result<ApiOutcome, crate::Error>;

    /// Delete the record identified by `id`
    async fn delete(&self, id: &str) -> Result<ApiOutcome, crate::Error>;

    /// Provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
