mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;

use venvkit_core::config::{resolve_credentials, resolve_requirements, BootstrapConfig, PathArg};
use venvkit_core::{info_log, observability};
use venvkit_env::{Collaborators, EnvOptions, Orchestrator, ProvisionConfig, ScriptFailurePolicy};

fn main() {
    observability::init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let bootstrap = bootstrap_config(&cli, BootstrapConfig::from_env());
    let options = env_options(&cli);
    let config = provision_config(&cli, &bootstrap);

    let parts = Collaborators::system(&bootstrap).context("Base interpreter check failed")?;
    let orchestrator = Orchestrator::new(config, options, parts)?;

    for report in orchestrator.create_all(&cli.dirs)? {
        info_log!(
            "{}: {} script(s), {} install(s)",
            report.root_dir.display(),
            report.scripts.len(),
            report.installs.len()
        );
    }
    Ok(())
}

/// CLI values override the environment-derived bootstrap config.
fn bootstrap_config(cli: &Cli, mut bootstrap: BootstrapConfig) -> BootstrapConfig {
    if let Some(python) = &cli.python {
        bootstrap.python = Some(python.clone());
    }
    if let Some(pkg) = &cli.client_package {
        bootstrap.client_package = pkg.clone();
    }
    bootstrap
}

fn env_options(cli: &Cli) -> EnvOptions {
    EnvOptions {
        system_site_packages: cli.system_site_packages,
        symlinks: cli.use_symlinks(),
        clear: cli.clear,
        upgrade: cli.upgrade,
    }
}

fn provision_config(cli: &Cli, bootstrap: &BootstrapConfig) -> ProvisionConfig {
    let openrc = PathArg::from(cli.openrc.clone());
    let requirements = PathArg::from(cli.requirements.clone());
    ProvisionConfig {
        skip_distribution_tools: cli.no_setuptools,
        skip_package_manager: cli.no_pip,
        verbose: cli.verbose,
        credentials_file: resolve_credentials(&openrc, cli.no_openrc),
        requirements_file: resolve_requirements(&requirements),
        script_failure: if cli.keep_going_on_script_error {
            ScriptFailurePolicy::Warn
        } else {
            ScriptFailurePolicy::Fail
        },
        ..ProvisionConfig::from_bootstrap(bootstrap)
    }
}
