//! Config structs grouped by concern, loaded from the environment.

use super::env_keys::{bootstrap as boot_keys, observability as obv_keys};
use super::loader::{env_bool, env_optional, env_or, env_u64};

/// Default setuptools bootstrap script.
pub const DEFAULT_SETUPTOOLS_URL: &str = "https://bootstrap.pypa.io/ez_setup.py";
/// Default pip bootstrap script.
pub const DEFAULT_PIP_URL: &str = "https://bootstrap.pypa.io/get-pip.py";
/// Package installed into every provisioned environment.
pub const DEFAULT_CLIENT_PACKAGE: &str = "python-openstackclient";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Logging configuration: quiet, log_level, log_json, audit_log
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| Self {
            quiet: env_bool(obv_keys::VENVKIT_QUIET, obv_keys::QUIET_ALIASES, false),
            log_level: env_or(
                obv_keys::VENVKIT_LOG_LEVEL,
                obv_keys::LOG_LEVEL_ALIASES,
                || "venvkit=info".to_string(),
            ),
            log_json: env_bool(obv_keys::VENVKIT_LOG_JSON, obv_keys::LOG_JSON_ALIASES, false),
            audit_log: env_optional(obv_keys::VENVKIT_AUDIT_LOG, &[]),
        })
    }
}

/// Where bootstrap scripts come from and what gets installed.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Base interpreter override (`None` means search PATH).
    pub python: Option<String>,
    pub client_package: String,
    pub setuptools_url: String,
    pub pip_url: String,
    pub http_timeout_secs: u64,
}

impl BootstrapConfig {
    pub fn from_env() -> Self {
        Self {
            python: env_optional(boot_keys::VENVKIT_PYTHON, boot_keys::PYTHON_ALIASES),
            client_package: env_or(boot_keys::VENVKIT_CLIENT_PACKAGE, &[], || {
                DEFAULT_CLIENT_PACKAGE.to_string()
            }),
            setuptools_url: env_or(boot_keys::VENVKIT_SETUPTOOLS_URL, &[], || {
                DEFAULT_SETUPTOOLS_URL.to_string()
            }),
            pip_url: env_or(boot_keys::VENVKIT_PIP_URL, &[], || DEFAULT_PIP_URL.to_string()),
            http_timeout_secs: env_u64(
                boot_keys::VENVKIT_HTTP_TIMEOUT_SECS,
                &[],
                DEFAULT_HTTP_TIMEOUT_SECS,
            ),
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            python: None,
            client_package: DEFAULT_CLIENT_PACKAGE.to_string(),
            setuptools_url: DEFAULT_SETUPTOOLS_URL.to_string(),
            pip_url: DEFAULT_PIP_URL.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_defaults() {
        let cfg = BootstrapConfig::default();
        assert_eq!(cfg.client_package, "python-openstackclient");
        assert!(cfg.pip_url.ends_with("get-pip.py"));
        assert!(cfg.setuptools_url.ends_with("ez_setup.py"));
        assert!(cfg.python.is_none());
    }
}
