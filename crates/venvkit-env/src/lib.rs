//! Environment provisioning: create a Python venv, bootstrap setuptools and
//! pip into it, inject credentials into its activation scripts and install
//! the client package plus optional requirements.
//!
//! [`Orchestrator`] sequences the steps; the builder, script fetcher and
//! package installer sit behind traits so each can be replaced.

pub mod activation;
pub mod builder;
pub mod descriptor;
pub mod error;
pub mod fetch;
pub mod installer;
pub mod orchestrator;
pub mod progress;
pub mod script;

pub use builder::{EnvBuilder, EnvOptions, PythonVenvBuilder};
pub use descriptor::EnvDescriptor;
pub use error::{ProvisionError, Result};
pub use fetch::{ScriptFetcher, UrlFetcher};
pub use installer::{PackageInstaller, PipInstaller};
pub use orchestrator::{
    Collaborators, Orchestrator, ProvisionConfig, ProvisionReport, ProvisionStage,
    ScriptFailurePolicy,
};
pub use progress::{ProgressEvent, ProgressSink, ProgressSource, StderrRenderer};
pub use script::{ScriptInstaller, ScriptOutcome};
