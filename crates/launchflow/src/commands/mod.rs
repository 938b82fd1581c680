pub mod deploy;
pub mod destroy;
pub mod validate;

use colored::Colorize;
use launchflow_config::{DeployConfig, Overrides};
use std::path::{Path, PathBuf};

/// A deploy file with command line overrides applied
pub struct Loaded {
    pub path: PathBuf,
    pub config: DeployConfig,
}

impl Loaded {
    pub fn base_dir(&self) -> PathBuf {
        launchflow_config::base_dir(&self.path)
    }
}

/// Find, parse and override the deploy file; print where it came from.
pub fn load_config(explicit: Option<&Path>, overrides: &Overrides) -> anyhow::Result<Loaded> {
    let path = launchflow_config::find_deploy_file(explicit)?;
    println!("📄 {}", path.display().to_string().cyan());

    let mut config = launchflow_config::load(&path)?;
    for warning in config.apply_overrides(overrides) {
        println!("  {} {}", "⚠".yellow(), warning.yellow());
    }
    Ok(Loaded { path, config })
}
