//! End-to-end pipeline tests with a fake builder, fetcher and installer.
//!
//! Bootstrap scripts are real shell scripts executed by `/bin/sh`, standing in
//! for the environment interpreter.
#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use venvkit_env::activation::{activation_scripts, count_directives};
use venvkit_env::installer::{split_args, InstallerCommand};
use venvkit_env::{
    Collaborators, EnvBuilder, EnvDescriptor, EnvOptions, Orchestrator, PackageInstaller,
    ProgressEvent, ProgressSource, ProvisionConfig, ProvisionError, ProvisionStage, Result,
    ScriptFailurePolicy, ScriptFetcher,
};

#[derive(Default, Clone)]
struct Recorder {
    created: Arc<Mutex<Vec<PathBuf>>>,
    fetched: Arc<Mutex<Vec<String>>>,
    installs: Arc<Mutex<Vec<Vec<String>>>>,
    prepared: Arc<AtomicUsize>,
}

impl Recorder {
    fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    fn installs(&self) -> Vec<Vec<String>> {
        self.installs.lock().unwrap().clone()
    }
}

struct FakeBuilder(Recorder);

impl EnvBuilder for FakeBuilder {
    fn create(&self, dir: &Path, _options: &EnvOptions) -> Result<EnvDescriptor> {
        let bin = dir.join("bin");
        fs::create_dir_all(&bin).unwrap();
        for (name, body) in [
            ("activate", "# bash/zsh\n"),
            ("activate.csh", "# csh\n"),
            ("activate.fish", "# fish\n"),
        ] {
            if !bin.join(name).exists() {
                fs::write(bin.join(name), body).unwrap();
            }
        }
        let root = dir.canonicalize().unwrap();
        self.0.created.lock().unwrap().push(root.clone());
        Ok(EnvDescriptor {
            binary_dir: root.join("bin"),
            root_dir: root,
            executable_path: PathBuf::from("/bin/sh"),
        })
    }
}

/// Serves shell scripts; the setuptools one leaves an archive behind like
/// the real bootstrap does.
struct FakeFetcher {
    rec: Recorder,
    exit_code: i32,
}

impl ScriptFetcher for FakeFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        self.rec.fetched.lock().unwrap().push(url.to_string());
        let body = if url.ends_with("ez_setup.py") {
            format!(
                "echo installing setuptools\ntouch setuptools-40.0.tar.gz\nexit {}\n",
                self.exit_code
            )
        } else {
            format!("echo installing pip\necho progress >&2\nexit {}\n", self.exit_code)
        };
        fs::write(dest, body).unwrap();
        Ok(())
    }
}

struct FakeInstaller {
    rec: Recorder,
    available: bool,
}

impl PackageInstaller for FakeInstaller {
    fn prepare(&self) {
        self.rec.prepared.fetch_add(1, Ordering::SeqCst);
    }

    fn is_available(&self, _env: &EnvDescriptor) -> bool {
        self.available
    }

    fn invoke(&self, _env: &EnvDescriptor, args: &str) -> Result<()> {
        let mut cmd = InstallerCommand::parse(split_args(args)?)?;
        cmd.force_isolation();
        self.rec.installs.lock().unwrap().push(cmd.to_argv());
        Ok(())
    }
}

fn orchestrator(config: ProvisionConfig, rec: &Recorder) -> Result<Orchestrator> {
    orchestrator_with(config, rec, 0, true)
}

fn orchestrator_with(
    config: ProvisionConfig,
    rec: &Recorder,
    exit_code: i32,
    pip_available: bool,
) -> Result<Orchestrator> {
    let parts = Collaborators {
        builder: Box::new(FakeBuilder(rec.clone())),
        fetcher: Box::new(FakeFetcher {
            rec: rec.clone(),
            exit_code,
        }),
        installer: Box::new(FakeInstaller {
            rec: rec.clone(),
            available: pip_available,
        }),
    };
    Orchestrator::new(config, EnvOptions::default(), parts)
}

fn quiet_config() -> ProvisionConfig {
    ProvisionConfig {
        progress_sink: Some(Arc::new(|_: &ProgressEvent| {})),
        ..ProvisionConfig::default()
    }
}

fn prefix_of(argv: &[String]) -> &str {
    let at = argv.iter().position(|a| a == "--prefix").unwrap();
    &argv[at + 1]
}

fn bin_names(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(root.join("bin"))
        .unwrap()
        .flatten()
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn full_pipeline_downloads_runs_and_cleans_up() {
    let tmp = TempDir::new().unwrap();
    let env_a = tmp.path().join("envA");
    let rec = Recorder::default();
    let orch = orchestrator(quiet_config(), &rec).unwrap();

    let report = orch.create(&env_a).unwrap();

    assert_eq!(
        rec.fetched(),
        vec![
            "https://bootstrap.pypa.io/ez_setup.py",
            "https://bootstrap.pypa.io/get-pip.py"
        ]
    );
    // scripts and setuptools archive are gone, activation scripts untouched
    assert_eq!(
        bin_names(&report.root_dir),
        vec!["activate", "activate.csh", "activate.fish"]
    );
    assert_eq!(
        report.stages,
        vec![
            ProvisionStage::Created,
            ProvisionStage::ToolsInstalled,
            ProvisionStage::PackageManagerInstalled,
            ProvisionStage::DependenciesInstalled,
        ]
    );
    assert!(report.scripts.iter().all(|s| s.success()));

    let installs = rec.installs();
    assert_eq!(installs.len(), 1);
    let argv = &installs[0];
    assert_eq!(argv[0], "install");
    assert!(argv.contains(&"--isolated".to_string()));
    assert!(argv.contains(&"-I".to_string()));
    assert_eq!(argv.last().unwrap(), "python-openstackclient");
    assert_eq!(Path::new(prefix_of(argv)), report.root_dir);
}

#[test]
fn skip_package_manager_means_no_pip_and_no_installs() {
    let tmp = TempDir::new().unwrap();
    let rec = Recorder::default();
    let config = ProvisionConfig {
        skip_package_manager: true,
        requirements_file: Some(PathBuf::from("requirements.txt")),
        ..quiet_config()
    };
    let orch = orchestrator(config, &rec).unwrap();

    let report = orch.create(&tmp.path().join("env")).unwrap();

    assert_eq!(rec.fetched(), vec!["https://bootstrap.pypa.io/ez_setup.py"]);
    assert!(rec.installs().is_empty());
    assert_eq!(rec.prepared.load(Ordering::SeqCst), 0);
    assert!(!report.reached(ProvisionStage::PackageManagerInstalled));
    assert!(report.reached(ProvisionStage::DependenciesInstalled));
}

#[test]
fn skip_distribution_tools_skips_pip_and_installs_when_pip_absent() {
    let tmp = TempDir::new().unwrap();
    let rec = Recorder::default();
    let config = ProvisionConfig {
        skip_distribution_tools: true,
        ..quiet_config()
    };
    let orch = orchestrator_with(config, &rec, 0, false).unwrap();

    let report = orch.create(&tmp.path().join("env")).unwrap();

    assert!(rec.fetched().is_empty());
    assert!(rec.installs().is_empty());
    assert_eq!(
        report.stages,
        vec![ProvisionStage::Created, ProvisionStage::DependenciesInstalled]
    );
}

#[test]
fn skip_distribution_tools_still_installs_when_pip_present() {
    let tmp = TempDir::new().unwrap();
    let rec = Recorder::default();
    let config = ProvisionConfig {
        skip_distribution_tools: true,
        ..quiet_config()
    };
    let orch = orchestrator_with(config, &rec, 0, true).unwrap();

    orch.create(&tmp.path().join("env")).unwrap();

    assert!(rec.fetched().is_empty());
    assert_eq!(rec.installs().len(), 1);
}

#[test]
fn requirements_file_adds_second_install() {
    let tmp = TempDir::new().unwrap();
    let rec = Recorder::default();
    let config = ProvisionConfig {
        requirements_file: Some(PathBuf::from("/work/my reqs.txt")),
        ..quiet_config()
    };
    let orch = orchestrator(config, &rec).unwrap();

    let report = orch.create(&tmp.path().join("env")).unwrap();

    let installs = rec.installs();
    assert_eq!(installs.len(), 2);
    assert_eq!(report.installs.len(), 2);
    let req = &installs[1];
    assert_eq!(&req[req.len() - 2..], ["-r", "/work/my reqs.txt"]);
    assert!(req.contains(&"--isolated".to_string()));
    assert_eq!(Path::new(prefix_of(req)), report.root_dir);
}

#[test]
fn credentials_are_sourced_once_per_activation_script() {
    let tmp = TempDir::new().unwrap();
    let creds = tmp.path().join("openrc.sh");
    fs::write(&creds, "export OS_USERNAME=demo\n").unwrap();
    let env_dir = tmp.path().join("env");
    let rec = Recorder::default();
    let config = ProvisionConfig {
        credentials_file: Some(creds),
        ..quiet_config()
    };
    let orch = orchestrator(config, &rec).unwrap();

    let first = orch.create(&env_dir).unwrap();
    let patch = first.patch.as_ref().unwrap();
    assert_eq!(patch.patched.len(), 3);
    assert!(first.reached(ProvisionStage::ActivationPatched));
    assert_eq!(
        fs::read_to_string(first.root_dir.join("bin").join("openrc")).unwrap(),
        "export OS_USERNAME=demo\n"
    );

    // second run against the same tree must not duplicate the directive
    let second = orch.create(&env_dir).unwrap();
    assert_eq!(second.patch.as_ref().unwrap().already_present.len(), 3);
    for script in activation_scripts(&second.root_dir.join("bin")).unwrap() {
        assert_eq!(count_directives(&script).unwrap(), 1, "{}", script.display());
    }
    let fish = fs::read_to_string(second.root_dir.join("bin").join("activate.fish")).unwrap();
    assert!(fish.ends_with(". openrc\n"));
}

#[test]
fn unreadable_credentials_fail_before_any_directory_work() {
    let tmp = TempDir::new().unwrap();
    let rec = Recorder::default();
    let config = ProvisionConfig {
        credentials_file: Some(tmp.path().join("missing-openrc")),
        ..quiet_config()
    };

    let err = orchestrator(config, &rec).err().unwrap();

    assert!(matches!(err, ProvisionError::CredentialsUnreadable { .. }));
    assert!(err.is_config_error());
    assert!(rec.created.lock().unwrap().is_empty());
}

#[test]
fn upgrade_with_clear_is_rejected_up_front() {
    let rec = Recorder::default();
    let parts = Collaborators {
        builder: Box::new(FakeBuilder(rec.clone())),
        fetcher: Box::new(FakeFetcher {
            rec: rec.clone(),
            exit_code: 0,
        }),
        installer: Box::new(FakeInstaller {
            rec: rec.clone(),
            available: true,
        }),
    };
    let options = EnvOptions {
        clear: true,
        upgrade: true,
        ..EnvOptions::default()
    };
    let err = Orchestrator::new(quiet_config(), options, parts).err().unwrap();
    assert!(matches!(err, ProvisionError::UpgradeWithClear));
}

#[test]
fn failing_script_aborts_batch_and_is_still_removed() {
    let tmp = TempDir::new().unwrap();
    let rec = Recorder::default();
    let orch = orchestrator_with(quiet_config(), &rec, 1, true).unwrap();
    let dirs = [tmp.path().join("first"), tmp.path().join("second")];

    let err = orch.create_all(&dirs).unwrap_err();

    assert!(matches!(
        err,
        ProvisionError::ScriptFailed { ref name, code: Some(1) } if name == "setuptools"
    ));
    // first dir keeps its partial state, second was never started
    assert_eq!(rec.created.lock().unwrap().len(), 1);
    assert!(!dirs[1].exists());
    assert!(!dirs[0].join("bin").join("ez_setup.py").exists());
    assert!(!dirs[0].join("bin").join("setuptools-40.0.tar.gz").exists());
    assert!(rec.installs().is_empty());
}

#[test]
fn warn_policy_continues_past_failing_scripts() {
    let tmp = TempDir::new().unwrap();
    let rec = Recorder::default();
    let config = ProvisionConfig {
        script_failure: ScriptFailurePolicy::Warn,
        ..quiet_config()
    };
    let orch = orchestrator_with(config, &rec, 2, true).unwrap();

    let report = orch.create(&tmp.path().join("env")).unwrap();

    assert_eq!(report.scripts.len(), 2);
    assert!(report.scripts.iter().all(|s| s.exit_code == Some(2)));
    assert!(!report.root_dir.join("bin").join("get-pip.py").exists());
    assert_eq!(rec.installs().len(), 1);
}

#[test]
fn installer_is_prepared_once_per_orchestrator() {
    let tmp = TempDir::new().unwrap();
    let rec = Recorder::default();
    let orch = orchestrator(quiet_config(), &rec).unwrap();

    let reports = orch
        .create_all(&[tmp.path().join("a"), tmp.path().join("b")])
        .unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(rec.prepared.load(Ordering::SeqCst), 1);
    assert_eq!(rec.installs().len(), 2);
    assert_ne!(prefix_of(&rec.installs()[0]), prefix_of(&rec.installs()[1]));
}

#[test]
fn progress_sink_sees_main_and_stream_events() {
    let tmp = TempDir::new().unwrap();
    let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::default();
    let sink_events = events.clone();
    let rec = Recorder::default();
    let config = ProvisionConfig {
        skip_distribution_tools: false,
        progress_sink: Some(Arc::new(move |e: &ProgressEvent| {
            sink_events.lock().unwrap().push(e.clone())
        })),
        ..ProvisionConfig::default()
    };
    let orch = orchestrator(config, &rec).unwrap();

    orch.create(&tmp.path().join("env")).unwrap();

    let events = events.lock().unwrap();
    let main: Vec<&str> = events
        .iter()
        .filter(|e| e.source == ProgressSource::Main)
        .map(|e| e.message.as_str())
        .collect();
    assert_eq!(
        main,
        vec!["Installing setuptools ...", "done.", "Installing pip ...", "done."]
    );
    assert!(events.contains(&ProgressEvent::new("installing pip", ProgressSource::Stdout)));
    assert!(events.contains(&ProgressEvent::new("progress", ProgressSource::Stderr)));
}
