//! Observability: tracing init, quiet-aware info logging, provisioning audit log.
//!
//! Uses `config::ObservabilityConfig` for VENVKIT_QUIET, VENVKIT_LOG_LEVEL,
//! VENVKIT_LOG_JSON and VENVKIT_AUDIT_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::ObservabilityConfig;

/// Log at info level unless VENVKIT_QUIET is set.
#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {{
        if !$crate::observability::is_quiet() {
            tracing::info!($($arg)*);
        }
    }};
}

pub fn is_quiet() -> bool {
    ObservabilityConfig::from_env().quiet
}

/// Initialize tracing. Call once at process startup.
///
/// `RUST_LOG` takes precedence; otherwise VENVKIT_LOG_LEVEL, or warn-only
/// when quiet. Output always goes to stderr so stdout stays clean.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let level = if cfg.quiet {
        "venvkit=warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init()
    };
}

/// One provisioning milestone, written as a JSONL record to VENVKIT_AUDIT_LOG.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent<'a> {
    EnvCreated {
        root: &'a str,
    },
    ScriptInstalled {
        root: &'a str,
        name: &'a str,
        exit_code: Option<i32>,
    },
    ActivationPatched {
        root: &'a str,
        patched: usize,
        already_present: usize,
    },
    PackagesInstalled {
        root: &'a str,
        args: &'a str,
    },
    ProvisionFailed {
        root: &'a str,
        error: &'a str,
    },
}

#[derive(Serialize)]
struct AuditRecord<'a> {
    ts: String,
    #[serde(flatten)]
    event: &'a AuditEvent<'a>,
}

/// Append `event` to the configured audit log. No-op when unset.
pub fn audit(event: &AuditEvent<'_>) {
    if let Some(path) = ObservabilityConfig::from_env().audit_log.as_deref() {
        append_audit(Path::new(path), event);
    }
}

/// Append `event` to an explicit audit file. Failures are logged, not raised.
pub fn append_audit(path: &Path, event: &AuditEvent<'_>) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let record = AuditRecord {
        ts: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        event,
    };
    let line = match serde_json::to_string(&record) {
        Ok(l) => l,
        Err(e) => {
            tracing::warn!("Failed to serialize audit record: {}", e);
            return;
        }
    };
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(mut f) => {
            if let Err(e) = writeln!(f, "{}", line) {
                tracing::warn!("Failed to write audit log {}: {}", path.display(), e);
            }
        }
        Err(e) => tracing::warn!("Failed to open audit log {}: {}", path.display(), e),
    }
}
