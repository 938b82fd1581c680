#![allow(deprecated)]

use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Scratch project directory isolated from the caller's deploy files
pub struct TestProject {
    pub root: TempDir,
    config_home: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
            config_home: tempfile::tempdir().unwrap(),
        }
    }

    pub fn write_deploy_yaml(&self, content: &str) {
        fs::write(self.root.path().join("deploy.yaml"), content).unwrap();
    }

    #[allow(dead_code)]
    pub fn write_file(&self, name: &str, content: &str) {
        fs::write(self.root.path().join(name), content).unwrap();
    }

    #[allow(dead_code)]
    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    /// `launch` running inside the project, with no global config in reach
    pub fn launch(&self) -> Command {
        let mut cmd = Command::cargo_bin("launch").unwrap();
        cmd.current_dir(self.root.path())
            .env_remove("LAUNCHFLOW_CONFIG")
            .env_remove("RUST_LOG")
            .env("XDG_CONFIG_HOME", self.config_home.path())
            .env("NO_COLOR", "1");
        cmd
    }
}
