//! Download-run-delete installer for bootstrap scripts (setuptools, pip).

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use crate::descriptor::EnvDescriptor;
use crate::error::{ProvisionError, Result};
use crate::fetch::{script_file_name, ScriptFetcher};
use crate::progress::{ProgressEvent, ProgressSink, ProgressSource};

/// What happened when a bootstrap script ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutcome {
    pub name: String,
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ScriptOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs bootstrap scripts with an environment's own interpreter.
pub struct ScriptInstaller<'a> {
    fetcher: &'a dyn ScriptFetcher,
    progress: &'a dyn ProgressSink,
}

impl<'a> ScriptInstaller<'a> {
    pub fn new(fetcher: &'a dyn ScriptFetcher, progress: &'a dyn ProgressSink) -> Self {
        Self { fetcher, progress }
    }

    /// Fetch `url` into the environment's binary dir, run it, then remove it.
    ///
    /// The exit status is returned, not judged; callers decide whether a
    /// non-zero exit is fatal. The script file is removed on every path out
    /// of this function, including fetch and spawn failures.
    pub fn install(&self, env: &EnvDescriptor, name: &str, url: &str) -> Result<ScriptOutcome> {
        let file_name = script_file_name(url)?;
        let script_path = env.binary_dir.join(&file_name);
        let _cleanup = RemoveOnDrop(script_path.clone());

        self.fetcher.fetch(url, &script_path)?;

        self.emit(format!("Installing {} ...", name), ProgressSource::Main);
        let exit_code = match self.run(env, &file_name) {
            Ok(code) => code,
            Err(e) => {
                self.emit("failed.", ProgressSource::Main);
                return Err(e);
            }
        };
        self.emit("done.", ProgressSource::Main);

        tracing::debug!("{} bootstrap exited with {:?}", name, exit_code);
        Ok(ScriptOutcome {
            name: name.to_string(),
            exit_code,
        })
    }

    fn emit(&self, message: impl Into<String>, source: ProgressSource) {
        self.progress.report(&ProgressEvent::new(message, source));
    }

    fn run(&self, env: &EnvDescriptor, file_name: &str) -> Result<Option<i32>> {
        let mut child = Command::new(&env.executable_path)
            .arg(file_name)
            .current_dir(&env.binary_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ProvisionError::ScriptSpawn {
                script: file_name.to_string(),
                source: e,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let progress = self.progress;

        // Drain both pipes while the child runs; a full pipe buffer would
        // otherwise block the child and we'd deadlock waiting for it.
        let status = thread::scope(|s| {
            let out = stdout
                .map(|r| s.spawn(move || drain_lines(r, ProgressSource::Stdout, progress)));
            let err = stderr
                .map(|r| s.spawn(move || drain_lines(r, ProgressSource::Stderr, progress)));
            let status = child.wait();
            for handle in [out, err].into_iter().flatten() {
                if handle.join().is_err() {
                    tracing::warn!("Progress sink panicked while draining {}", file_name);
                }
            }
            status
        })
        .map_err(|e| ProvisionError::ScriptSpawn {
            script: file_name.to_string(),
            source: e,
        })?;

        Ok(status.code())
    }
}

/// Forward each line of `reader` as a progress event tagged `source`.
fn drain_lines<R: Read>(reader: R, source: ProgressSource, progress: &dyn ProgressSink) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                progress.report(&ProgressEvent::new(line, source));
            }
        }
    }
}

struct RemoveOnDrop(PathBuf);

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        remove_if_exists(&self.0);
    }
}

fn remove_if_exists(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
    }
}
