//! Package installer invocation (pip, run as a subprocess of the environment's
//! own interpreter).
//!
//! The install target is always passed explicitly: `--prefix <root>` on the
//! command line and `VIRTUAL_ENV=<root>` on the child only. Nothing here
//! mutates the calling process's environment.

use std::borrow::Cow;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use venvkit_core::config::env_keys::VIRTUAL_ENV;

use crate::descriptor::EnvDescriptor;
use crate::error::{ProvisionError, Result};

/// Flag that makes pip ignore user/system config files and `PIP_*` variables.
pub const ISOLATED_FLAG: &str = "--isolated";

/// pip general options that consume the following token.
const OPTIONS_WITH_VALUE: &[&str] = &[
    "--log",
    "--proxy",
    "--retries",
    "--timeout",
    "--exists-action",
    "--trusted-host",
    "--cert",
    "--client-cert",
    "--cache-dir",
    "--python",
];

const STDERR_TAIL_LINES: usize = 20;

/// Runs package-manager subcommands against a target environment.
pub trait PackageInstaller: Send + Sync {
    /// One-time setup of the installer's ambient state. The orchestrator calls
    /// this once before the first `invoke`.
    fn prepare(&self) {}

    /// Whether the package manager is usable inside `env`.
    fn is_available(&self, env: &EnvDescriptor) -> bool;

    /// Run a shell-like argument string, e.g. `install -I --prefix /env pkg`.
    fn invoke(&self, env: &EnvDescriptor, args: &str) -> Result<()>;
}

/// A parsed installer command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerCommand {
    pub subcommand: String,
    /// Everything except the subcommand, in original order.
    pub args: Vec<String>,
    pub isolated: bool,
}

impl InstallerCommand {
    /// Pick the subcommand (first non-option token) and detect isolation.
    pub fn parse(argv: Vec<String>) -> Result<Self> {
        let mut subcommand_at = None;
        let mut i = 0;
        while i < argv.len() {
            let tok = argv[i].as_str();
            if !tok.starts_with('-') {
                subcommand_at = Some(i);
                break;
            }
            if OPTIONS_WITH_VALUE.contains(&tok) {
                i += 1;
            }
            i += 1;
        }

        let Some(at) = subcommand_at else {
            return Err(ProvisionError::InvalidArguments {
                args: argv.join(" "),
                reason: "no subcommand given".to_string(),
            });
        };

        let mut args = argv;
        let subcommand = args.remove(at);
        let isolated = args.iter().any(|a| a == ISOLATED_FLAG);
        Ok(Self {
            subcommand,
            args,
            isolated,
        })
    }

    pub fn force_isolation(&mut self) {
        if !self.isolated {
            self.args.insert(0, ISOLATED_FLAG.to_string());
            self.isolated = true;
        }
    }

    /// Full argument vector after `python -m pip`.
    pub fn to_argv(&self) -> Vec<String> {
        std::iter::once(self.subcommand.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// Split a shell-like string into arguments.
///
/// Handles whitespace separation, single quotes (literal), double quotes
/// (backslash escapes `"` `\` `$` and backtick) and bare backslash escapes.
pub fn split_args(input: &str) -> Result<Vec<String>> {
    let invalid = |reason: &str| ProvisionError::InvalidArguments {
        args: input.to_string(),
        reason: reason.to_string(),
    };

    let mut out = Vec::new();
    let mut cur = String::new();
    let mut in_word = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    out.push(std::mem::take(&mut cur));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => cur.push(ch),
                        None => return Err(invalid("unterminated single quote")),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\' | '$' | '`')) => cur.push(ch),
                            Some(ch) => {
                                cur.push('\\');
                                cur.push(ch);
                            }
                            None => return Err(invalid("unterminated double quote")),
                        },
                        Some(ch) => cur.push(ch),
                        None => return Err(invalid("unterminated double quote")),
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some(ch) => cur.push(ch),
                    None => return Err(invalid("trailing backslash")),
                }
            }
            c => {
                in_word = true;
                cur.push(c);
            }
        }
    }
    if in_word {
        out.push(cur);
    }
    Ok(out)
}

/// Quote a path so it survives [`split_args`].
pub fn quote_path(path: &Path) -> String {
    shell_escape::unix::escape(Cow::Owned(path.to_string_lossy().to_string())).into_owned()
}

/// `install --isolated -I --prefix <prefix> <package>`
pub fn package_install_args(prefix: &Path, package: &str) -> String {
    format!(
        "install {} -I --prefix {} {}",
        ISOLATED_FLAG,
        quote_path(prefix),
        package
    )
}

/// `install --isolated -I --prefix <prefix> -r <requirements>`
pub fn requirements_install_args(prefix: &Path, requirements: &Path) -> String {
    format!(
        "install {} -I --prefix {} -r {}",
        ISOLATED_FLAG,
        quote_path(prefix),
        quote_path(requirements)
    )
}

/// pip driven as `<env python> -m pip ...`.
#[derive(Debug, Default)]
pub struct PipInstaller {
    ambient: OnceLock<Vec<(&'static str, String)>>,
}

impl PipInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    fn ambient(&self) -> &[(&'static str, String)] {
        self.ambient.get_or_init(|| {
            let mut vars = vec![
                // surface pip's deprecation warnings instead of hiding them
                ("PYTHONWARNINGS", "default::DeprecationWarning".to_string()),
                ("PYTHONIOENCODING", "utf-8".to_string()),
                ("PIP_DISABLE_PIP_VERSION_CHECK", "1".to_string()),
                ("PIP_NO_INPUT", "1".to_string()),
            ];
            // inherit the user's locale unless one is already pinned
            if std::env::var_os("LC_ALL").is_none() {
                if let Ok(lang) = std::env::var("LANG") {
                    vars.push(("LC_ALL", lang));
                }
            }
            vars
        })
    }

    fn command(&self, env: &EnvDescriptor) -> Command {
        let mut cmd = Command::new(&env.executable_path);
        cmd.arg("-m")
            .arg("pip")
            .env(VIRTUAL_ENV, &env.root_dir)
            .env_remove("PYTHONHOME")
            .stdin(Stdio::null());
        for (k, v) in self.ambient() {
            cmd.env(k, v);
        }
        cmd
    }
}

impl PackageInstaller for PipInstaller {
    fn prepare(&self) {
        let vars = self.ambient();
        tracing::debug!("pip ambient state: {:?}", vars);
    }

    fn is_available(&self, env: &EnvDescriptor) -> bool {
        self.command(env)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn invoke(&self, env: &EnvDescriptor, args: &str) -> Result<()> {
        let mut parsed = InstallerCommand::parse(split_args(args)?)?;
        parsed.force_isolation();
        let argv = parsed.to_argv();
        let command_line = format!("pip {}", argv.join(" "));
        tracing::debug!("Running {} in {}", command_line, env.root_dir.display());

        let out = self
            .command(env)
            .args(&argv)
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| ProvisionError::io(format!("Run {}", command_line), e))?;

        let stderr = String::from_utf8_lossy(&out.stderr);
        if !out.status.success() {
            return Err(ProvisionError::Installer {
                command: command_line,
                code: out.status.code(),
                stderr_tail: tail_lines(&stderr, STDERR_TAIL_LINES),
            });
        }
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            tracing::debug!("pip: {}", line);
        }
        Ok(())
    }
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
