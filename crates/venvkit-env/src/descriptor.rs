use std::path::{Path, PathBuf};

/// Layout of one created environment. Built once per target directory and
/// handed by reference to every provisioning step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvDescriptor {
    /// Environment root (absolute once produced by a builder).
    pub root_dir: PathBuf,
    /// Environment-local interpreter used to run bootstrap scripts and pip.
    pub executable_path: PathBuf,
    /// `bin/` (or `Scripts/` on Windows): executables and activation scripts.
    pub binary_dir: PathBuf,
}

impl EnvDescriptor {
    /// Derive interpreter and binary paths from the platform's venv layout.
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root_dir = root.into();
        let binary_dir = root_dir.join(bin_dir_name());
        let executable_path = binary_dir.join(interpreter_name());
        Self {
            root_dir,
            executable_path,
            binary_dir,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Root as a display string for logs and audit records.
    pub fn root_display(&self) -> String {
        self.root_dir.to_string_lossy().to_string()
    }
}

#[cfg(windows)]
fn bin_dir_name() -> &'static str {
    "Scripts"
}

#[cfg(not(windows))]
fn bin_dir_name() -> &'static str {
    "bin"
}

#[cfg(windows)]
fn interpreter_name() -> &'static str {
    "python.exe"
}

#[cfg(not(windows))]
fn interpreter_name() -> &'static str {
    "python"
}
