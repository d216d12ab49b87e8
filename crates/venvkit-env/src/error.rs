//! Errors raised while configuring or provisioning an environment.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Every step fails with one of these. None of them is retried.
#[derive(Debug, Error)]
pub enum ProvisionError {
    // ─── Configuration (raised before any directory is touched) ─────────────
    #[error(
        "Couldn't read credentials file \"{}\": {source}. Either have a default \
         \"openrc.sh\" in \"~/.config/openstack\" or pass one with --openrc",
        path.display()
    )]
    CredentialsUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("you cannot supply --upgrade and --clear together")]
    UpgradeWithClear,

    #[error("Python {found} is not supported; 3.4 or later is required")]
    UnsupportedPython { found: String },

    #[error("No usable Python interpreter found (tried: {tried})")]
    InterpreterNotFound { tried: String },

    // ─── Environment creation ───────────────────────────────────────────────
    #[error("Creating environment at {} failed: {stderr}", path.display())]
    EnvCreation { path: PathBuf, stderr: String },

    // ─── Bootstrap scripts ──────────────────────────────────────────────────
    #[error("Cannot derive a script file name from URL '{0}'")]
    InvalidScriptUrl(String),

    #[error("Failed to retrieve {url}: {reason}")]
    Retrieval { url: String, reason: String },

    #[error("Failed to run {script}: {source}")]
    ScriptSpawn {
        script: String,
        #[source]
        source: io::Error,
    },

    #[error("{name} bootstrap script exited with {}", describe_code(*code))]
    ScriptFailed { name: String, code: Option<i32> },

    // ─── Package installer ──────────────────────────────────────────────────
    #[error("Invalid installer arguments '{args}': {reason}")]
    InvalidArguments { args: String, reason: String },

    #[error("`{command}` exited with {}: {stderr_tail}", describe_code(*code))]
    Installer {
        command: String,
        code: Option<i32>,
        stderr_tail: String,
    },

    // ─── Filesystem ─────────────────────────────────────────────────────────
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl ProvisionError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// True for errors that abort the run before any directory is touched.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::CredentialsUnreadable { .. }
                | Self::UpgradeWithClear
                | Self::UnsupportedPython { .. }
                | Self::InterpreterNotFound { .. }
        )
    }
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "no exit code (terminated by signal)".to_string(),
    }
}
