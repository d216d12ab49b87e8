use std::path::PathBuf;

use clap::Parser;

/// venvkit - create Python virtual environments ready for OpenStack work
///
/// Each ENV_DIR gets a venv with setuptools and pip bootstrapped into it, the
/// OpenStack client installed, and (optionally) an openrc file sourced from
/// every activation script.
#[derive(Parser, Debug)]
#[command(name = "venvkit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directories in which to create virtual environments
    #[arg(value_name = "ENV_DIR", required = true, num_args = 1..)]
    pub dirs: Vec<PathBuf>,

    /// Don't install setuptools or pip in the virtual environment
    #[arg(long = "no-setuptools")]
    pub no_setuptools: bool,

    /// Don't install pip in the virtual environment
    #[arg(long = "no-pip")]
    pub no_pip: bool,

    /// Give the virtual environment access to the system site-packages dir
    #[arg(long)]
    pub system_site_packages: bool,

    /// OpenStack openrc file ("./openrc" if given without a path;
    /// "~/.config/openstack/openrc.sh" if present and the option is omitted)
    #[arg(short = 'O', long, value_name = "PATH", num_args = 0..=1)]
    pub openrc: Option<Option<PathBuf>>,

    /// Don't source any openrc file, even the default one
    #[arg(long, conflicts_with = "openrc")]
    pub no_openrc: bool,

    /// pip requirements file to install ("requirements.txt" if given without a path)
    #[arg(short = 'r', long, value_name = "PATH", num_args = 0..=1)]
    pub requirements: Option<Option<PathBuf>>,

    /// Symlink the interpreter (default everywhere except Windows)
    #[arg(long, conflicts_with = "copies")]
    pub symlinks: bool,

    /// Copy the interpreter instead of symlinking it
    #[arg(long)]
    pub copies: bool,

    /// Delete the environment directory contents before creating it
    #[arg(long, conflicts_with = "upgrade")]
    pub clear: bool,

    /// Upgrade the environment to this Python, assuming Python was upgraded in place
    #[arg(long)]
    pub upgrade: bool,

    /// Show the output of the setuptools and pip bootstrap scripts
    #[arg(long)]
    pub verbose: bool,

    /// Package installed into every environment (default: from env or python-openstackclient)
    #[arg(long, value_name = "NAME")]
    pub client_package: Option<String>,

    /// Base interpreter used to create environments (default: from env or python3 on PATH)
    #[arg(long, value_name = "PATH")]
    pub python: Option<String>,

    /// Warn instead of failing when a bootstrap script exits non-zero
    #[arg(long)]
    pub keep_going_on_script_error: bool,
}

impl Cli {
    /// Symlink preference after applying the platform default.
    pub fn use_symlinks(&self) -> bool {
        if self.copies {
            false
        } else {
            self.symlinks || cfg!(not(windows))
        }
    }
}
