//! Environment variable keys and their aliases.
//!
//! Primary keys use the `VENVKIT_*` prefix; aliases keep older `OSIC_VENV_*`
//! names working.

/// Logging and audit
pub mod observability {
    pub const VENVKIT_QUIET: &str = "VENVKIT_QUIET";
    pub const QUIET_ALIASES: &[&str] = &["OSIC_VENV_QUIET"];

    pub const VENVKIT_LOG_LEVEL: &str = "VENVKIT_LOG_LEVEL";
    pub const LOG_LEVEL_ALIASES: &[&str] = &["OSIC_VENV_LOG_LEVEL"];

    pub const VENVKIT_LOG_JSON: &str = "VENVKIT_LOG_JSON";
    pub const LOG_JSON_ALIASES: &[&str] = &[];

    pub const VENVKIT_AUDIT_LOG: &str = "VENVKIT_AUDIT_LOG";
}

/// Bootstrap sources and installer targets
pub mod bootstrap {
    /// Base interpreter used to create environments.
    pub const VENVKIT_PYTHON: &str = "VENVKIT_PYTHON";
    pub const PYTHON_ALIASES: &[&str] = &["OSIC_VENV_PYTHON"];

    pub const VENVKIT_CLIENT_PACKAGE: &str = "VENVKIT_CLIENT_PACKAGE";

    pub const VENVKIT_SETUPTOOLS_URL: &str = "VENVKIT_SETUPTOOLS_URL";
    pub const VENVKIT_PIP_URL: &str = "VENVKIT_PIP_URL";

    /// Connect/read timeout for bootstrap script downloads, in seconds.
    pub const VENVKIT_HTTP_TIMEOUT_SECS: &str = "VENVKIT_HTTP_TIMEOUT_SECS";
}

/// Exported to installer subprocesses so they resolve against the target env.
pub const VIRTUAL_ENV: &str = "VIRTUAL_ENV";
