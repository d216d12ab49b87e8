//! Bootstrap script retrieval.
//!
//! `http(s)://` goes through a blocking `ureq` agent; `file://` URLs are copied
//! from disk so offline mirrors work with the same code path.

use std::fs::File;
use std::io;
use std::path::Path;
use std::time::Duration;

use url::Url;

use crate::error::{ProvisionError, Result};

/// Downloads a script to a local path.
pub trait ScriptFetcher: Send + Sync {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Default fetcher: `ureq` for http(s), filesystem copy for `file://`.
pub struct UrlFetcher {
    agent: ureq::Agent,
}

impl UrlFetcher {
    pub fn new(timeout_secs: u64) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(timeout_secs.min(10)))
            .timeout_read(Duration::from_secs(timeout_secs))
            .build();
        Self { agent }
    }

    fn fetch_http(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self.agent.get(url).call().map_err(|e| match &e {
            ureq::Error::Status(code, _) => ProvisionError::Retrieval {
                url: url.to_string(),
                reason: format!("HTTP {}", code),
            },
            ureq::Error::Transport(_) => ProvisionError::Retrieval {
                url: url.to_string(),
                reason: e.to_string(),
            },
        })?;

        let mut file = File::create(dest)
            .map_err(|e| ProvisionError::io(format!("Create {}", dest.display()), e))?;
        io::copy(&mut response.into_reader(), &mut file).map_err(|e| {
            ProvisionError::Retrieval {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(())
    }
}

impl ScriptFetcher for UrlFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        tracing::debug!("Fetching {} -> {}", url, dest.display());
        let parsed = parse_url(url)?;
        if parsed.scheme() == "file" {
            let local = parsed
                .to_file_path()
                .map_err(|()| ProvisionError::Retrieval {
                    url: url.to_string(),
                    reason: "not a local file path".to_string(),
                })?;
            std::fs::copy(&local, dest).map_err(|e| ProvisionError::Retrieval {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            return Ok(());
        }
        self.fetch_http(url, dest)
    }
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|_| ProvisionError::InvalidScriptUrl(url.to_string()))
}

/// File name a script is saved under: the last path segment of `url`,
/// percent-decoded for `file://` URLs.
pub fn script_file_name(url: &str) -> Result<String> {
    let parsed = parse_url(url)?;
    if parsed.path().ends_with('/') {
        return Err(ProvisionError::InvalidScriptUrl(url.to_string()));
    }
    let name = if parsed.scheme() == "file" {
        parsed
            .to_file_path()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
    } else {
        parsed
            .path_segments()
            .and_then(|segments| segments.last())
            .map(str::to_string)
    };
    match name {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(ProvisionError::InvalidScriptUrl(url.to_string())),
    }
}
