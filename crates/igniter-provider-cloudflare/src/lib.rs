// # Cloudflare DNS Directory
//
// This crate provides the Cloudflare implementation of `RemoteDirectory`.
//
// ## Behaviour
//
// - One HTTP request per trait call; no retries, no caching, no background tasks
// - Responses are classified from the JSON envelope's `errors` array, never
//   from the HTTP status: Cloudflare reports failures in the body, often with
//   a 4xx status, and the controller needs the error code
// - Error code 81057 on the first entry means the exact record already exists
// - Listing reads a single page; a truncated listing is logged
// - HTTP timeout is configurable (5 seconds by default)
//
// ## Security Requirements
//
// - API token NEVER appears in logs
// - API token is sent as a bearer token on every request
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List DNS Records: GET `/zones/:zone_id/dns_records?per_page=N`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Overwrite DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use igniter_core::config::{ProviderConfig, RecordSettings};
use igniter_core::model::{DesiredRecord, RemoteRecord};
use igniter_core::traits::{ApiError, ApiOutcome, RemoteDirectory};
use igniter_core::{Error, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Error code Cloudflare uses for "An identical record already exists."
pub const ALREADY_EXISTS_CODE: i64 = 81057;

const PROVIDER_NAME: &str = "cloudflare";

/// Response envelope shared by every Cloudflare v4 endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: Option<u32>,
    #[serde(default)]
    total_count: Option<u32>,
}

/// DNS record as returned by the API
#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    #[serde(rename = "type")]
    record_type: String,
    name: String,
    content: String,
    #[serde(default)]
    ttl: u32,
    #[serde(default)]
    proxied: bool,
    #[serde(default)]
    zone_id: Option<String>,
    #[serde(default)]
    zone_name: Option<String>,
    #[serde(default)]
    modified_on: Option<DateTime<Utc>>,
}

/// Body of create and overwrite requests
#[derive(Debug, Serialize)]
struct RecordBody<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: String,
    ttl: u32,
    proxied: bool,
}

/// Reduce an envelope's error list to an outcome
///
/// Only the first error decides whether the record already exists.
fn classify(errors: Vec<ApiMessage>) -> ApiOutcome {
    match errors.first() {
        None => ApiOutcome::Success,
        Some(first) if first.code == ALREADY_EXISTS_CODE => ApiOutcome::AlreadyExists,
        Some(_) => ApiOutcome::Failed(
            errors
                .into_iter()
                .map(|e| ApiError {
                    code: e.code,
                    message: e.message,
                })
                .collect(),
        ),
    }
}

/// Describe a body that is not a Cloudflare envelope
fn unreadable_response(status: StatusCode, error: serde_json::Error) -> Error {
    let hint = match status.as_u16() {
        401 | 403 => "Authentication failed: invalid API token or insufficient permissions",
        404 => "Zone or record not found",
        429 => "Rate limit exceeded",
        500..=599 => "Cloudflare server error",
        _ => "Unexpected response",
    };
    Error::provider(
        PROVIDER_NAME,
        format!("{} (HTTP {}): body is not a valid envelope: {}", hint, status, error),
    )
}

/// Cloudflare record directory for one zone
///
/// The Debug implementation does NOT expose the API token.
pub struct CloudflareDirectory {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Zone records are managed in
    zone_id: String,

    /// Base URL without trailing slash
    api_base: String,

    /// Proxied flag sent with every record
    proxied: bool,

    /// TTL sent with every record
    ttl: u32,

    /// Page size for listing
    per_page: u32,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl std::fmt::Debug for CloudflareDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareDirectory")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("api_base", &self.api_base)
            .field("proxied", &self.proxied)
            .field("ttl", &self.ttl)
            .field("per_page", &self.per_page)
            .finish()
    }
}

impl CloudflareDirectory {
    /// Create a directory from validated settings
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the settings are invalid or the
    /// HTTP client cannot be built.
    pub fn new(provider: &ProviderConfig, records: &RecordSettings) -> Result<Self> {
        provider.validate()?;
        records.validate()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(provider.request_timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let api_base = provider
            .api_base
            .as_deref()
            .unwrap_or(CLOUDFLARE_API_BASE)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            api_token: provider.api_token.clone(),
            zone_id: provider.zone_id.clone(),
            api_base,
            proxied: provider.proxied,
            ttl: records.ttl,
            per_page: provider.list_page_size,
            client,
        })
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", self.api_base, self.zone_id)
    }

    fn record_url(&self, id: &str) -> String {
        format!("{}/{}", self.records_url(), id)
    }

    fn body<'a>(&self, record: &'a DesiredRecord) -> RecordBody<'a> {
        RecordBody {
            record_type: record.record_type.as_str(),
            name: &record.hostname,
            content: record.content(),
            ttl: self.ttl,
            proxied: self.proxied,
        }
    }

    /// Authenticated request builder
    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.api_token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
    }

    /// Send a request and parse the envelope
    ///
    /// Transport failures are `Error::Transport`; a body that is not an
    /// envelope is `Error::Provider`.
    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<Envelope<T>> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("Failed to read response body: {}", e)))?;

        tracing::trace!("Cloudflare responded with HTTP {}", status);
        serde_json::from_str(&body).map_err(|e| unreadable_response(status, e))
    }

    async fn mutate(&self, request: reqwest::RequestBuilder) -> Result<ApiOutcome> {
        let envelope: Envelope<serde_json::Value> = self.send(request).await?;
        Ok(classify(envelope.errors))
    }

    fn remote_record(&self, record: DnsRecord) -> RemoteRecord {
        RemoteRecord {
            id: record.id,
            record_type: record.record_type,
            name: record.name,
            content: record.content,
            ttl: record.ttl,
            proxied: record.proxied,
            zone: record
                .zone_name
                .or(record.zone_id)
                .unwrap_or_else(|| self.zone_id.clone()),
            modified_on: record.modified_on,
        }
    }
}

#[async_trait]
impl RemoteDirectory for CloudflareDirectory {
    async fn list(&self) -> Result<Vec<RemoteRecord>> {
        tracing::debug!("Listing DNS records in zone {}", self.zone_id);

        let request = self
            .request(reqwest::Method::GET, self.records_url())
            .query(&[("per_page", self.per_page)]);
        let envelope: Envelope<Vec<DnsRecord>> = self.send(request).await?;

        if !envelope.errors.is_empty() {
            let message = envelope
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.code, e.message))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::provider(PROVIDER_NAME, format!("Listing failed: {}", message)));
        }

        let records = envelope.result.unwrap_or_default();
        if let Some(info) = envelope.result_info
            && info.total_pages.unwrap_or(1) > 1
        {
            tracing::warn!(
                "Zone {} holds {} records but only the first {} were listed; records beyond this page cannot be updated or deleted",
                self.zone_id,
                info.total_count.map_or_else(|| "more".to_string(), |n| n.to_string()),
                records.len()
            );
        }

        Ok(records.into_iter().map(|r| self.remote_record(r)).collect())
    }

    async fn create(&self, record: &DesiredRecord) -> Result<ApiOutcome> {
        tracing::debug!("Creating Cloudflare DNS record {}", record);
        let request = self.request(reqwest::Method::POST, self.records_url()).json(&self.body(record));
        self.mutate(request).await
    }

    async fn update(&self, id: &str, record: &DesiredRecord) -> Result<ApiOutcome> {
        tracing::debug!("Overwriting Cloudflare DNS record {} with {}", id, record);
        let request = self.request(reqwest::Method::PUT, self.record_url(id)).json(&self.body(record));
        self.mutate(request).await
    }

    async fn delete(&self, id: &str) -> Result<ApiOutcome> {
        tracing::debug!("Deleting Cloudflare DNS record {}", id);
        let request = self.request(reqwest::Method::DELETE, self.record_url(id));
        self.mutate(request).await
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}
