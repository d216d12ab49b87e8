//! Base environment creation (`python -m venv`) and interpreter discovery.
//!
//! The builder only lays down the directory tree, interpreter and activation
//! scripts. Everything after that is the orchestrator's post-setup pipeline.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;

use crate::descriptor::EnvDescriptor;
use crate::error::{ProvisionError, Result};

/// Oldest interpreter whose `venv` module we can drive.
pub const MIN_PYTHON: (u32, u32) = (3, 4);

const PYTHON_CANDIDATES: &[&str] = &["python3", "python"];

/// Options passed through to the base builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvOptions {
    /// Give the environment access to the system site-packages dir.
    pub system_site_packages: bool,
    /// Symlink the interpreter instead of copying it.
    pub symlinks: bool,
    /// Delete the directory contents before creating the environment.
    pub clear: bool,
    /// Upgrade the environment in place to the base interpreter's version.
    pub upgrade: bool,
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self {
            system_site_packages: false,
            symlinks: cfg!(not(windows)),
            clear: false,
            upgrade: false,
        }
    }
}

impl EnvOptions {
    pub fn validate(&self) -> Result<()> {
        if self.upgrade && self.clear {
            return Err(ProvisionError::UpgradeWithClear);
        }
        Ok(())
    }

    /// Arguments appended to `python -m venv`.
    pub fn venv_args(&self) -> Vec<&'static str> {
        // pip is bootstrapped by the post-setup pipeline, never by venv itself
        let mut args = vec!["--without-pip"];
        if self.system_site_packages {
            args.push("--system-site-packages");
        }
        args.push(if self.symlinks { "--symlinks" } else { "--copies" });
        if self.clear {
            args.push("--clear");
        }
        if self.upgrade {
            args.push("--upgrade");
        }
        args
    }
}

/// Creates the base directory structure of an environment.
pub trait EnvBuilder: Send + Sync {
    fn create(&self, dir: &Path, options: &EnvOptions) -> Result<EnvDescriptor>;
}

/// Builds environments with the standard library `venv` module of a base
/// interpreter.
#[derive(Debug, Clone)]
pub struct PythonVenvBuilder {
    python: PathBuf,
}

impl PythonVenvBuilder {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }

    /// Use `override_python` if given, otherwise the first of python3/python on PATH.
    pub fn discover(override_python: Option<&str>) -> Result<Self> {
        if let Some(p) = override_python {
            return Ok(Self::new(p));
        }
        for name in PYTHON_CANDIDATES {
            if let Ok(path) = which::which(name) {
                tracing::debug!("Using base interpreter {}", path.display());
                return Ok(Self::new(path));
            }
        }
        Err(ProvisionError::InterpreterNotFound {
            tried: PYTHON_CANDIDATES.join(", "),
        })
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    /// Fail unless the base interpreter is at least [`MIN_PYTHON`].
    pub fn check_version(&self) -> Result<(u32, u32)> {
        let out = Command::new(&self.python)
            .arg("--version")
            .output()
            .map_err(|_| ProvisionError::InterpreterNotFound {
                tried: self.python.display().to_string(),
            })?;
        // Python 2 prints its version to stderr
        let text = format!(
            "{}{}",
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        );
        let version = parse_python_version(&text).ok_or_else(|| {
            ProvisionError::UnsupportedPython {
                found: text.trim().to_string(),
            }
        })?;
        if version < MIN_PYTHON {
            return Err(ProvisionError::UnsupportedPython {
                found: format!("{}.{}", version.0, version.1),
            });
        }
        Ok(version)
    }
}

impl EnvBuilder for PythonVenvBuilder {
    fn create(&self, dir: &Path, options: &EnvOptions) -> Result<EnvDescriptor> {
        std::fs::create_dir_all(dir).map_err(|e| {
            ProvisionError::io(format!("Create environment dir {}", dir.display()), e)
        })?;

        let out = Command::new(&self.python)
            .arg("-m")
            .arg("venv")
            .args(options.venv_args())
            .arg(dir)
            .output()
            .map_err(|e| ProvisionError::io(format!("Run {} -m venv", self.python.display()), e))?;
        if !out.status.success() {
            return Err(ProvisionError::EnvCreation {
                path: dir.to_path_buf(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }

        let root = dir.canonicalize().map_err(|e| {
            ProvisionError::io(format!("Resolve environment dir {}", dir.display()), e)
        })?;
        Ok(EnvDescriptor::from_root(root))
    }
}

/// Extract `(major, minor)` from `python --version` output.
pub fn parse_python_version(text: &str) -> Option<(u32, u32)> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"Python\s+(\d+)\.(\d+)").expect("static regex"));
    let cap = re.captures(text)?;
    Some((cap[1].parse().ok()?, cap[2].parse().ok()?))
}
