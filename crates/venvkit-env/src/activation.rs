//! Credentials injection into activation scripts.
//!
//! The credentials file is copied into the binary dir and every `activate*`
//! script gets one line that sources it. A script that already carries the
//! line is left alone, so re-provisioning an environment never duplicates it.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use venvkit_core::config::paths::CREDENTIALS_FILE_NAME;

use crate::descriptor::EnvDescriptor;
use crate::error::{ProvisionError, Result};

const ACTIVATE_PREFIX: &str = "activate";

/// Which activation scripts were touched by one [`patch`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// Where the credentials were copied to.
    pub credentials_path: PathBuf,
    /// Scripts that had the directive appended.
    pub patched: Vec<PathBuf>,
    /// Scripts that already contained the directive.
    pub already_present: Vec<PathBuf>,
}

/// The line that sources the credentials from `script`.
///
/// fish has no `source` builtin in older releases, so it gets `.`.
pub fn directive_for(script: &Path) -> String {
    let is_fish = script
        .file_name()
        .map(|n| n.to_string_lossy().ends_with("fish"))
        .unwrap_or(false);
    let keyword = if is_fish { "." } else { "source" };
    format!("{} {}", keyword, CREDENTIALS_FILE_NAME)
}

/// All activation script variants in `bin_dir`, sorted by name.
pub fn activation_scripts(bin_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(bin_dir)
        .map_err(|e| ProvisionError::io(format!("List {}", bin_dir.display()), e))?;
    let mut scripts: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with(ACTIVATE_PREFIX))
                .unwrap_or(false)
        })
        .collect();
    scripts.sort();
    Ok(scripts)
}

/// Number of lines in `script` equal to its sourcing directive.
pub fn count_directives(script: &Path) -> Result<usize> {
    let directive = directive_for(script);
    let content = fs::read_to_string(script)
        .map_err(|e| ProvisionError::io(format!("Read {}", script.display()), e))?;
    Ok(content.lines().filter(|l| l.trim() == directive).count())
}

/// Copy `credentials_file` into the environment and source it from every
/// activation script.
pub fn patch(env: &EnvDescriptor, credentials_file: &Path) -> Result<PatchReport> {
    let dest = env.binary_dir.join(CREDENTIALS_FILE_NAME);
    fs::copy(credentials_file, &dest).map_err(|e| {
        ProvisionError::io(
            format!(
                "Copy {} to {}",
                credentials_file.display(),
                dest.display()
            ),
            e,
        )
    })?;

    let mut report = PatchReport {
        credentials_path: dest,
        ..PatchReport::default()
    };

    for script in activation_scripts(&env.binary_dir)? {
        let directive = directive_for(&script);
        if count_directives(&script)? > 0 {
            tracing::debug!("{} already sources {}", script.display(), CREDENTIALS_FILE_NAME);
            report.already_present.push(script);
            continue;
        }
        venvkit_core::info_log!("updating {}: {} ...", script.display(), directive);
        append_line(&script, &directive)?;
        report.patched.push(script);
    }

    Ok(report)
}

fn append_line(script: &Path, line: &str) -> Result<()> {
    let io_err = |e| ProvisionError::io(format!("Append to {}", script.display()), e);
    let needs_newline = fs::read(script)
        .map(|b| !b.is_empty() && !b.ends_with(b"\n"))
        .map_err(io_err)?;
    let mut f = OpenOptions::new()
        .append(true)
        .open(script)
        .map_err(io_err)?;
    if needs_newline {
        f.write_all(b"\n").map_err(io_err)?;
    }
    writeln!(f, "{}", line).map_err(io_err)
}
