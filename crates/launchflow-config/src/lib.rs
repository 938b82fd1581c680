//! LaunchFlow deploy file handling
//!
//! Finds `deploy.yaml`, parses it, merges command line overrides and turns
//! the result into a [`launchflow_cloud::DesiredState`].

pub mod error;
pub mod model;
pub mod resolve;

pub use error::*;
pub use model::*;
pub use resolve::*;

use std::path::{Path, PathBuf};

/// Environment variable naming the deploy file directly
pub const CONFIG_ENV: &str = "LAUNCHFLOW_CONFIG";

const CANDIDATES: [&str; 3] = ["deploy.local.yaml", "deploy.yaml", "deploy.yml"];

/// Locate the deploy file.
///
/// Search order:
/// 1. `explicit` (from `--config`)
/// 2. `LAUNCHFLOW_CONFIG`
/// 3. current directory: deploy.local.yaml, deploy.yaml, deploy.yml
/// 4. `./.launchflow/` with the same names
/// 5. `~/.config/launchflow/deploy.yaml`
pub fn find_deploy_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(ConfigError::DeployFileNotFound {
            searched: vec![path.to_path_buf()],
        });
    }

    let mut searched = Vec::new();

    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.is_file() {
            return Ok(path);
        }
        searched.push(path);
    }

    let current_dir = std::env::current_dir()?;
    for dir in [current_dir.clone(), current_dir.join(".launchflow")] {
        for filename in &CANDIDATES {
            let path = dir.join(filename);
            if path.is_file() {
                return Ok(path);
            }
            searched.push(path);
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("launchflow").join("deploy.yaml");
        if global.is_file() {
            return Ok(global);
        }
        searched.push(global);
    }

    Err(ConfigError::DeployFileNotFound { searched })
}

/// Parse a deploy file.
pub fn load(path: &Path) -> Result<DeployConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content, path)
}

/// Parse deploy file content; `path` is only used in error messages.
pub fn parse(content: &str, path: &Path) -> Result<DeployConfig> {
    serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

/// Directory relative paths in the deploy file are resolved against.
pub fn base_dir(deploy_file: &Path) -> PathBuf {
    match deploy_file.parent() {
        Some(parent) if parent.as_os_str().is_empty() => PathBuf::from("."),
        Some(parent) => parent.to_path_buf(),
        None => PathBuf::from("."),
    }
}
