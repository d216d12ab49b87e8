//! Post-setup pipeline: builder → setuptools → pip → activation patch → installs.
//!
//! Each target directory runs the whole pipeline independently. Nothing is
//! rolled back on failure; a partially provisioned tree stays on disk and the
//! next run against it picks up where it can (every step is safe to repeat).

use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use venvkit_core::config::BootstrapConfig;
use venvkit_core::info_log;
use venvkit_core::observability::{audit, AuditEvent};

use crate::activation::{self, PatchReport};
use crate::builder::{EnvBuilder, EnvOptions, PythonVenvBuilder};
use crate::descriptor::EnvDescriptor;
use crate::error::{ProvisionError, Result};
use crate::fetch::{ScriptFetcher, UrlFetcher};
use crate::installer::{
    package_install_args, requirements_install_args, PackageInstaller, PipInstaller,
};
use crate::progress::{ProgressSink, StderrRenderer};
use crate::script::{ScriptInstaller, ScriptOutcome};

pub const SETUPTOOLS_NAME: &str = "setuptools";
pub const PIP_NAME: &str = "pip";

/// What to do when a bootstrap script exits non-zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScriptFailurePolicy {
    /// Abort this directory's pipeline.
    #[default]
    Fail,
    /// Log a warning and carry on.
    Warn,
}

/// Provisioning options, fixed for the lifetime of an [`Orchestrator`].
#[derive(Clone)]
pub struct ProvisionConfig {
    pub skip_distribution_tools: bool,
    pub skip_package_manager: bool,
    pub verbose: bool,
    /// Receives script progress; `None` renders to stderr.
    pub progress_sink: Option<Arc<dyn ProgressSink>>,
    pub requirements_file: Option<PathBuf>,
    pub credentials_file: Option<PathBuf>,
    pub client_package: String,
    pub distribution_tools_url: String,
    pub package_manager_url: String,
    pub script_failure: ScriptFailurePolicy,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self::from_bootstrap(&BootstrapConfig::default())
    }
}

impl std::fmt::Debug for ProvisionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionConfig")
            .field("skip_distribution_tools", &self.skip_distribution_tools)
            .field("skip_package_manager", &self.skip_package_manager)
            .field("verbose", &self.verbose)
            .field("progress_sink", &self.progress_sink.as_ref().map(|_| "custom"))
            .field("requirements_file", &self.requirements_file)
            .field("credentials_file", &self.credentials_file)
            .field("client_package", &self.client_package)
            .field("distribution_tools_url", &self.distribution_tools_url)
            .field("package_manager_url", &self.package_manager_url)
            .field("script_failure", &self.script_failure)
            .finish()
    }
}

impl ProvisionConfig {
    /// Defaults with URLs and client package taken from `bootstrap`.
    pub fn from_bootstrap(bootstrap: &BootstrapConfig) -> Self {
        Self {
            skip_distribution_tools: false,
            skip_package_manager: false,
            verbose: false,
            progress_sink: None,
            requirements_file: None,
            credentials_file: None,
            client_package: bootstrap.client_package.clone(),
            distribution_tools_url: bootstrap.setuptools_url.clone(),
            package_manager_url: bootstrap.pip_url.clone(),
            script_failure: ScriptFailurePolicy::default(),
        }
    }

    /// pip cannot be bootstrapped without setuptools.
    pub fn effective_skip_package_manager(&self) -> bool {
        self.skip_package_manager || self.skip_distribution_tools
    }

    /// Fail fast on a credentials file we will not be able to copy later.
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.credentials_file {
            std::fs::File::open(path).map_err(|e| ProvisionError::CredentialsUnreadable {
                path: path.clone(),
                source: e,
            })?;
            if path.is_dir() {
                return Err(ProvisionError::CredentialsUnreadable {
                    path: path.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "is a directory",
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Pipeline position of one environment. The three middle stages are skipped
/// depending on configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProvisionStage {
    Created,
    ToolsInstalled,
    PackageManagerInstalled,
    ActivationPatched,
    DependenciesInstalled,
}

/// Everything one `post_setup` run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub root_dir: PathBuf,
    /// Stages reached, in order; always ends with `DependenciesInstalled`.
    pub stages: Vec<ProvisionStage>,
    pub scripts: Vec<ScriptOutcome>,
    pub patch: Option<PatchReport>,
    /// Installer argument strings that ran successfully.
    pub installs: Vec<String>,
}

impl ProvisionReport {
    fn new(root_dir: PathBuf) -> Self {
        Self {
            root_dir,
            stages: vec![ProvisionStage::Created],
            scripts: Vec::new(),
            patch: None,
            installs: Vec::new(),
        }
    }

    pub fn reached(&self, stage: ProvisionStage) -> bool {
        self.stages.contains(&stage)
    }
}

/// The external pieces the pipeline drives.
pub struct Collaborators {
    pub builder: Box<dyn EnvBuilder>,
    pub fetcher: Box<dyn ScriptFetcher>,
    pub installer: Box<dyn PackageInstaller>,
}

impl Collaborators {
    /// Real venv builder, HTTP fetcher and pip. Checks the base interpreter
    /// version up front.
    pub fn system(bootstrap: &BootstrapConfig) -> Result<Self> {
        let builder = PythonVenvBuilder::discover(bootstrap.python.as_deref())?;
        let (major, minor) = builder.check_version()?;
        tracing::debug!("Base interpreter is Python {}.{}", major, minor);
        Ok(Self {
            builder: Box::new(builder),
            fetcher: Box::new(UrlFetcher::new(bootstrap.http_timeout_secs)),
            installer: Box::new(PipInstaller::new()),
        })
    }
}

pub struct Orchestrator {
    config: ProvisionConfig,
    options: EnvOptions,
    parts: Collaborators,
    progress: Arc<dyn ProgressSink>,
    installer_ready: Once,
}

impl Orchestrator {
    /// Validates `config` and `options`; nothing on disk is touched yet.
    pub fn new(config: ProvisionConfig, options: EnvOptions, parts: Collaborators) -> Result<Self> {
        options.validate()?;
        config.validate()?;
        let progress = config.progress_sink.clone().unwrap_or_else(|| {
            Arc::new(StderrRenderer::new(config.verbose)) as Arc<dyn ProgressSink>
        });
        Ok(Self {
            config,
            options,
            parts,
            progress,
            installer_ready: Once::new(),
        })
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// Provision every directory in order. The first failure aborts the batch;
    /// environments already finished stay as they are.
    pub fn create_all<P: AsRef<Path>>(&self, dirs: &[P]) -> Result<Vec<ProvisionReport>> {
        dirs.iter().map(|d| self.create(d.as_ref())).collect()
    }

    /// Create the base environment in `dir`, then run the post-setup pipeline.
    pub fn create(&self, dir: &Path) -> Result<ProvisionReport> {
        info_log!("Creating environment in {}", dir.display());
        let root = dir.to_string_lossy().to_string();
        let result = self
            .parts
            .builder
            .create(dir, &self.options)
            .and_then(|env| {
                audit(&AuditEvent::EnvCreated {
                    root: &env.root_display(),
                });
                self.post_setup(&env)
            });
        if let Err(e) = &result {
            audit(&AuditEvent::ProvisionFailed {
                root: &root,
                error: &e.to_string(),
            });
        }
        result
    }

    /// Everything after base creation, for an already-built environment.
    pub fn post_setup(&self, env: &EnvDescriptor) -> Result<ProvisionReport> {
        let root = env.root_display();
        let mut report = ProvisionReport::new(env.root_dir.clone());

        if !self.config.skip_distribution_tools {
            let url = &self.config.distribution_tools_url;
            let outcome = self.run_script(env, SETUPTOOLS_NAME, url)?;
            // leftovers go whether or not the bootstrap succeeded
            remove_setuptools_archives(&env.binary_dir)?;
            self.judge_script(&outcome)?;
            report.scripts.push(outcome);
            report.stages.push(ProvisionStage::ToolsInstalled);
        }

        if !self.config.effective_skip_package_manager() {
            let outcome = self.run_script(env, PIP_NAME, &self.config.package_manager_url)?;
            self.judge_script(&outcome)?;
            report.scripts.push(outcome);
            report.stages.push(ProvisionStage::PackageManagerInstalled);
        }

        if let Some(creds) = &self.config.credentials_file {
            let patch = activation::patch(env, creds)?;
            audit(&AuditEvent::ActivationPatched {
                root: &root,
                patched: patch.patched.len(),
                already_present: patch.already_present.len(),
            });
            report.patch = Some(patch);
            report.stages.push(ProvisionStage::ActivationPatched);
        }

        if self.should_install(env) {
            self.installer_ready.call_once(|| self.parts.installer.prepare());

            let client = package_install_args(&env.root_dir, &self.config.client_package);
            self.install(env, &root, client, &mut report)?;

            if let Some(req) = &self.config.requirements_file {
                let args = requirements_install_args(&env.root_dir, req);
                self.install(env, &root, args, &mut report)?;
            }
        }

        report.stages.push(ProvisionStage::DependenciesInstalled);
        info_log!("Environment {} ready", root);
        Ok(report)
    }

    fn should_install(&self, env: &EnvDescriptor) -> bool {
        if self.config.skip_package_manager {
            tracing::debug!("Package manager skipped; no packages installed");
            return false;
        }
        if self.config.skip_distribution_tools {
            // pip was not bootstrapped by us; it may still exist from an
            // earlier run or a builder that ships it
            let available = self.parts.installer.is_available(env);
            if !available {
                tracing::warn!(
                    "pip is not available in {}; skipping package installation",
                    env.root_dir.display()
                );
            }
            return available;
        }
        true
    }

    fn run_script(&self, env: &EnvDescriptor, name: &str, url: &str) -> Result<ScriptOutcome> {
        let installer = ScriptInstaller::new(self.parts.fetcher.as_ref(), self.progress.as_ref());
        let outcome = installer.install(env, name, url)?;
        audit(&AuditEvent::ScriptInstalled {
            root: &env.root_display(),
            name,
            exit_code: outcome.exit_code,
        });
        Ok(outcome)
    }

    /// Apply the script failure policy to a finished bootstrap run.
    fn judge_script(&self, outcome: &ScriptOutcome) -> Result<()> {
        if outcome.success() {
            return Ok(());
        }
        match self.config.script_failure {
            ScriptFailurePolicy::Fail => Err(ProvisionError::ScriptFailed {
                name: outcome.name.clone(),
                code: outcome.exit_code,
            }),
            ScriptFailurePolicy::Warn => {
                tracing::warn!(
                    "{} bootstrap exited with {:?}; continuing",
                    outcome.name,
                    outcome.exit_code
                );
                Ok(())
            }
        }
    }

    fn install(
        &self,
        env: &EnvDescriptor,
        root: &str,
        args: String,
        report: &mut ProvisionReport,
    ) -> Result<()> {
        info_log!("pip {}", args);
        self.parts.installer.invoke(env, &args)?;
        audit(&AuditEvent::PackagesInstalled { root, args: &args });
        report.installs.push(args);
        Ok(())
    }
}

/// Remove `setuptools-*.tar.gz` archives the setuptools bootstrap leaves behind.
pub fn remove_setuptools_archives(bin_dir: &Path) -> Result<usize> {
    let entries = std::fs::read_dir(bin_dir)
        .map_err(|e| ProvisionError::io(format!("List {}", bin_dir.display()), e))?;
    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with("setuptools-") && name.ends_with(".tar.gz") {
            let path = entry.path();
            std::fs::remove_file(&path)
                .map_err(|e| ProvisionError::io(format!("Remove {}", path.display()), e))?;
            removed += 1;
        }
    }
    Ok(removed)
}
