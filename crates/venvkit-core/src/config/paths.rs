//! Default path resolution for the credentials and requirements files.
//!
//! Precedence: explicit flag value > flag given without a value >
//! filesystem convention default.

use std::path::{Path, PathBuf};

/// File name the credentials are copied to inside the environment, and the
/// default looked up in the working directory when `--openrc` has no value.
pub const CREDENTIALS_FILE_NAME: &str = "openrc";
/// Convention location relative to the home directory.
pub const CREDENTIALS_CONVENTION_PATH: &[&str] = &[".config", "openstack", "openrc.sh"];
/// Default when `--requirements` has no value.
pub const REQUIREMENTS_FILE_NAME: &str = "requirements.txt";

/// How an optional-value path flag appeared on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathArg {
    /// Flag absent.
    NotGiven,
    /// Flag present without a value.
    GivenWithoutValue,
    /// Flag present with a value.
    Given(PathBuf),
}

impl From<Option<Option<PathBuf>>> for PathArg {
    fn from(v: Option<Option<PathBuf>>) -> Self {
        match v {
            None => Self::NotGiven,
            Some(None) => Self::GivenWithoutValue,
            Some(Some(p)) => Self::Given(p),
        }
    }
}

/// Resolve the credentials file using the current user's home directory.
///
/// `disabled` wins over everything (`--no-openrc`).
pub fn resolve_credentials(arg: &PathArg, disabled: bool) -> Option<PathBuf> {
    resolve_credentials_with_home(arg, disabled, dirs::home_dir().as_deref())
}

/// Like [`resolve_credentials`] with an explicit home directory.
///
/// The convention default only applies if that file exists; explicit paths are
/// returned as-is so that a missing file fails validation later.
pub fn resolve_credentials_with_home(
    arg: &PathArg,
    disabled: bool,
    home: Option<&Path>,
) -> Option<PathBuf> {
    if disabled {
        return None;
    }
    match arg {
        PathArg::Given(p) => Some(p.clone()),
        PathArg::GivenWithoutValue => Some(Path::new(".").join(CREDENTIALS_FILE_NAME)),
        PathArg::NotGiven => {
            let convention = CREDENTIALS_CONVENTION_PATH
                .iter()
                .fold(home?.to_path_buf(), |acc, seg| acc.join(seg));
            if convention.is_file() {
                Some(convention)
            } else {
                tracing::debug!(
                    "No credentials at {}, skipping activation patch",
                    convention.display()
                );
                None
            }
        }
    }
}

/// Resolve the requirements file. There is no convention default.
pub fn resolve_requirements(arg: &PathArg) -> Option<PathBuf> {
    match arg {
        PathArg::Given(p) => Some(p.clone()),
        PathArg::GivenWithoutValue => Some(PathBuf::from(REQUIREMENTS_FILE_NAME)),
        PathArg::NotGiven => None,
    }
}
