// # igniterd - Ingress DNS Daemon
//
// This daemon is a THIN integration layer. All reconciliation logic lives
// in igniter-core; this binary only wires the cluster and Cloudflare into
// the controller.
//
// The igniterd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Listing worker nodes once (fatal on failure)
// 4. Running the controller until SIGTERM/SIGINT
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Cloudflare
// - `CLOUDFLARE_API_TOKEN`: API token with Zone:DNS:Edit permission (required)
// - `CLOUDFLARE_ZONE`: Zone identifier (required)
// - `CLOUDFLARE_PROXY`: Proxy records through Cloudflare (true/false, default false)
// - `CLOUDFLARE_API_BASE`: API base URL override
//
// ### Records
// - `IGNITER_RECORD_TYPE`: A or AAAA (default A)
// - `IGNITER_LIST_PAGE_SIZE`: Records fetched per listing (default 100)
// - `IGNITER_REQUEST_TIMEOUT_SECS`: HTTP timeout per request (default 5)
//
// ### Cluster
// - `IGNITER_RESYNC_SECS`: Ingress resync interval (default 30)
// - `IGNITER_NODE_REFRESH_SECS`: Node re-listing interval, 0 disables, at most 86400 (default 0)
// - `IGNITER_NODE_ADDRESS_ANNOTATION`: Node annotation with the public address
// - `IGNITER_EXCLUDED_NODE_PATTERN`: Skip nodes whose name contains this (default master)
//
// ### Logging
// - `IGNITER_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export CLOUDFLARE_API_TOKEN=your_token
// export CLOUDFLARE_ZONE=023e105f4ecef8ad9ca31a8372d0c353
// export CLOUDFLARE_PROXY=true
//
// igniterd
// ```

use anyhow::{Context, Result};
use igniter_core::config::{
    ControllerSettings, IgniterConfig, NodeSourceConfig, ProviderConfig, RecordSettings,
};
use igniter_core::model::RecordType;
use igniter_core::registry::NodeRegistry;
use igniter_core::ReconcileController;
use igniter_kube::{KubeIngressSource, KubeNodeSource};
use igniter_provider_cloudflare::CloudflareDirectory;
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum IgniterExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<IgniterExitCode> for ExitCode {
    fn from(code: IgniterExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    api_token: String,
    zone: String,
    proxied: bool,
    api_base: Option<String>,
    record_type: RecordType,
    list_page_size: Option<u32>,
    request_timeout_secs: Option<u64>,
    resync_secs: Option<u64>,
    node_refresh_secs: Option<u64>,
    node_address_annotation: Option<String>,
    excluded_node_pattern: Option<String>,
    log_level: String,
}

/// Parse an optional variable, naming it in the error
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{} has an invalid value {:?}: {}", name, raw, e))
        })
        .transpose()
}

/// Parse a boolean flag the way the cluster manifests spell it
fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("expected true or false, got {:?}", other),
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through a variable lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let proxied = match lookup("CLOUDFLARE_PROXY") {
            Some(raw) => parse_flag(&raw).context("CLOUDFLARE_PROXY")?,
            None => false,
        };

        Ok(Self {
            api_token: lookup("CLOUDFLARE_API_TOKEN").context(
                "CLOUDFLARE_API_TOKEN is required. \
                Set it via: export CLOUDFLARE_API_TOKEN=your_token",
            )?,
            zone: lookup("CLOUDFLARE_ZONE").context(
                "CLOUDFLARE_ZONE is required. \
                Set it via: export CLOUDFLARE_ZONE=your_zone_id",
            )?,
            proxied,
            api_base: lookup("CLOUDFLARE_API_BASE").filter(|s| !s.is_empty()),
            record_type: parse_var(&lookup, "IGNITER_RECORD_TYPE")?.unwrap_or_default(),
            list_page_size: parse_var(&lookup, "IGNITER_LIST_PAGE_SIZE")?,
            request_timeout_secs: parse_var(&lookup, "IGNITER_REQUEST_TIMEOUT_SECS")?,
            resync_secs: parse_var(&lookup, "IGNITER_RESYNC_SECS")?,
            node_refresh_secs: parse_var(&lookup, "IGNITER_NODE_REFRESH_SECS")?,
            node_address_annotation: lookup("IGNITER_NODE_ADDRESS_ANNOTATION"),
            excluded_node_pattern: lookup("IGNITER_EXCLUDED_NODE_PATTERN"),
            log_level: lookup("IGNITER_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Checks the values only the daemon knows about (token shape, log
    /// level) and then the assembled [`IgniterConfig`].
    fn validate(&self) -> Result<()> {
        if self.api_token.is_empty() {
            anyhow::bail!(
                "CLOUDFLARE_API_TOKEN is required. \
                Set it via: export CLOUDFLARE_API_TOKEN=your_token"
            );
        }

        // Cloudflare API tokens are 40 characters
        if self.api_token.len() < 20 {
            anyhow::bail!(
                "CLOUDFLARE_API_TOKEN appears too short ({} chars). \
                Cloudflare tokens are typically 40 characters. \
                Verify your token is correct.",
                self.api_token.len()
            );
        }

        // Check for obvious placeholder tokens (common mistake)
        let token_lower = self.api_token.to_lowercase();
        if token_lower.contains("your_token") || token_lower.contains("replace_me") {
            anyhow::bail!(
                "CLOUDFLARE_API_TOKEN appears to be a placeholder. \
                Use an actual API token from Cloudflare."
            );
        }

        if let Some(base) = &self.api_base
            && base.starts_with("http://")
        {
            eprintln!(
                "WARNING: CLOUDFLARE_API_BASE uses HTTP (not HTTPS). \
                The API token will be sent in clear text."
            );
        }

        if let Some(resync) = self.resync_secs
            && !(1..=3600).contains(&resync)
        {
            anyhow::bail!(
                "IGNITER_RESYNC_SECS must be between 1 and 3600 seconds. Got: {}",
                resync
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "IGNITER_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.igniter_config()
            .validate()
            .context("Invalid configuration")?;

        Ok(())
    }

    /// Assemble the library configuration
    fn igniter_config(&self) -> IgniterConfig {
        let mut provider = ProviderConfig::new(self.api_token.clone(), self.zone.clone())
            .with_proxied(self.proxied);
        if let Some(base) = &self.api_base {
            provider = provider.with_api_base(base.clone());
        }
        if let Some(page_size) = self.list_page_size {
            provider.list_page_size = page_size;
        }
        if let Some(timeout) = self.request_timeout_secs {
            provider.request_timeout_secs = timeout;
        }

        let records = RecordSettings {
            record_type: self.record_type,
            ..RecordSettings::default()
        };

        let mut nodes = NodeSourceConfig::default();
        if let Some(annotation) = &self.node_address_annotation {
            nodes.address_annotation = annotation.clone();
        }
        if let Some(pattern) = &self.excluded_node_pattern {
            nodes.excluded_name_pattern = pattern.clone();
        }

        let mut controller = ControllerSettings::default();
        if let Some(resync) = self.resync_secs {
            controller.resync_interval_secs = resync;
        }
        if let Some(refresh) = self.node_refresh_secs {
            controller.node_refresh_interval_secs = refresh;
        }

        IgniterConfig {
            provider,
            records,
            nodes,
            controller,
        }
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return IgniterExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return IgniterExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return IgniterExitCode::ConfigError.into();
    }

    info!("Starting igniterd daemon");
    let igniter_config = config.igniter_config();
    info!(
        "Zone {}: {} records, ttl {}, proxied {}",
        igniter_config.provider.zone_id,
        igniter_config.records.record_type,
        igniter_config.records.ttl,
        igniter_config.provider.proxied
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return IgniterExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let daemon = match Daemon::bootstrap(igniter_config).await {
            Ok(daemon) => daemon,
            Err(e) => {
                error!("Startup failed: {:#}", e);
                return IgniterExitCode::ConfigError;
            }
        };

        if let Err(e) = daemon.run().await {
            error!("Daemon error: {:#}", e);
            IgniterExitCode::RuntimeError
        } else {
            IgniterExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Wired components, ready to run
struct Daemon {
    controller: ReconcileController,
    events: tokio::sync::mpsc::Receiver<igniter_core::ControllerEvent>,
    ingress_source: KubeIngressSource,
    node_source: KubeNodeSource,
}

impl Daemon {
    /// Build every component and capture the initial node list
    async fn bootstrap(config: IgniterConfig) -> Result<Self> {
        let client = kube::Client::try_default()
            .await
            .context("Failed to create Kubernetes client")?;

        let directory = CloudflareDirectory::new(&config.provider, &config.records)
            .context("Failed to create Cloudflare directory")?;
        debug!("Using {:?}", directory);

        let node_source = KubeNodeSource::new(client.clone(), config.nodes.clone());
        let ingress_source = KubeIngressSource::new(
            client,
            Duration::from_secs(config.controller.resync_interval_secs),
        )?;

        let (controller, events) = ReconcileController::new(
            Box::new(directory),
            Arc::new(NodeRegistry::new()),
            &config,
        )?;

        let count = controller
            .refresh_nodes(&node_source)
            .await
            .context("Failed to list cluster nodes")?;
        if count == 0 {
            warn!("No worker nodes with a public address; no records will be created");
        }

        Ok(Self {
            controller,
            events,
            ingress_source,
            node_source,
        })
    }

    /// Run the controller until a shutdown signal
    async fn run(self) -> Result<()> {
        let Daemon {
            controller,
            mut events,
            ingress_source,
            node_source,
        } = self;

        // Controller events are already logged; keep the channel drained
        let drain = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                debug!("Controller event: {:?}", event);
            }
        });

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            match wait_for_shutdown().await {
                Ok(signal) => info!("Received shutdown signal: {}", signal),
                Err(e) => error!("Shutdown signal handling failed: {:#}", e),
            }
            let _ = shutdown_tx.send(());
        });

        info!("Watching ingresses");
        controller
            .run_with_shutdown(&ingress_source, &node_source, shutdown_rx)
            .await?;

        drop(controller);
        let _ = drain.await;
        info!("Shutting down daemon");

        Ok(())
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("SIGINT")
}
