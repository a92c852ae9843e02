//! capability-hub local driver.
//!
//! Builds the built-in catalog over in-memory services, runs the startup
//! consistency and drift checks, then reads one `RequestEnvelope` JSON
//! object per stdin line and writes one JSON line per request to stdout:
//! the `ResponseEnvelope`, or `{"request_id", "error": {kind, message}}`
//! when dispatch rejects the request.
//!
//! # Environment Variables
//!
//! - `HUB_CONFIG`: optional YAML config file (env variables below override it)
//! - `HUB_DEFAULT_POLICY`, `HUB_STRICT_DRIFT`, `HUB_STRICT_CONSISTENCY`,
//!   `HUB_OPERATION_TIMEOUT_SECS`, `HUB_CAPABILITIES_FILE`
//! - `RUST_LOG`: tracing filter (default: "info,capability_hub=debug"); logs go to stderr
//!
//! # Usage
//!
//! ```bash
//! echo '{"operation":"casefile.create","payload":{"title":"Incident 7"},"hooks":["metrics"]}' \
//!   | cargo run --bin hub
//! ```

use std::sync::Arc;

use anyhow::Context;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use capability_hub::capabilities::CapabilityRecord;
use capability_hub::catalog::{builtin_records, DriftReport};
use capability_hub::{HubConfig, HubError, InMemoryStore, RequestEnvelope, RequestHub};

fn declared_records(config: &HubConfig) -> anyhow::Result<Vec<CapabilityRecord>> {
    match &config.capabilities_file {
        Some(path) => CapabilityRecord::list_from_yaml_file(path)
            .with_context(|| format!("reading capabilities {}", path.display())),
        None => Ok(builtin_records()?),
    }
}

fn error_line(request_id: Option<&str>, kind: &str, message: String) -> Value {
    json!({
        "request_id": request_id,
        "error": { "kind": kind, "message": message },
    })
}

async fn handle_line(hub: &RequestHub, line: &str) -> Value {
    let request: RequestEnvelope = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return error_line(None, "parse_error", e.to_string()),
    };
    let request_id = request.request_id.clone();

    match hub.dispatch(request).await {
        Ok(response) => serde_json::to_value(&response)
            .unwrap_or_else(|e| error_line(Some(&request_id), "internal", e.to_string())),
        Err(e @ (HubError::Protocol { .. } | HubError::Validation(_))) => {
            tracing::warn!("Rejected {}: {}", request_id, e);
            error_line(Some(&request_id), e.kind(), e.to_string())
        }
        Err(e) => {
            tracing::error!("Dispatch of {} failed: {}", request_id, e);
            error_line(Some(&request_id), e.kind(), e.to_string())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,capability_hub=debug".into()),
        )
        .init();

    let config = HubConfig::from_env().context("loading hub config")?;
    let store = Arc::new(InMemoryStore::new());
    let hub = RequestHub::in_memory(store, config.clone())?;

    hub.check_consistency().enforce(config.strict_consistency)?;
    let declared = declared_records(&config)?;
    DriftReport::compute(&declared, hub.catalog().snapshot().methods()).enforce(config.strict_drift)?;

    tracing::info!(
        "capability-hub {} ready: {} operation(s)",
        capability_hub::VERSION,
        hub.operations().names().len()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let output = handle_line(&hub, &line).await;
        stdout.write_all(output.to_string().as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    tracing::info!("stdin closed, shutting down");
    Ok(())
}
