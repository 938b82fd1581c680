//! docker CLI wrapper used for the image stage

use crate::progress::Spinner;
use async_trait::async_trait;
use launchflow_cloud::gateway::RegistryAuth;
use launchflow_cloud::{CloudError, ImageBuilder, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Lines of docker stderr kept in error messages
const ERROR_TAIL: usize = 20;

fn tail(output: &[u8]) -> String {
    let text = String::from_utf8_lossy(output);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(ERROR_TAIL);
    lines[start..].join("\n")
}

/// Builds and pushes with the local docker daemon
pub struct DockerImages {
    local_tag: String,
}

impl DockerImages {
    pub fn new(app_name: &str) -> Self {
        Self {
            local_tag: format!("{}:latest", app_name.to_lowercase()),
        }
    }

    /// Run a docker command and return stdout
    async fn run(&self, args: &[&str]) -> Result<String> {
        tracing::debug!("Running: docker {}", args.join(" "));

        let output = Command::new("docker")
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CloudError::ImageBuild(format!("could not run docker: {}", e)))?;

        if !output.status.success() {
            return Err(CloudError::ImageBuild(format!(
                "docker {} exited with {}\n{}",
                args.first().copied().unwrap_or_default(),
                output.status,
                tail(&output.stderr)
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn login(&self, auth: &RegistryAuth) -> Result<()> {
        let mut child = Command::new("docker")
            .args([
                "login",
                "--username",
                auth.username.as_str(),
                "--password-stdin",
                auth.endpoint.as_str(),
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CloudError::ImageBuild(format!("could not run docker: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(auth.password.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(CloudError::ImageBuild(format!(
                "docker login to {} failed\n{}",
                auth.endpoint,
                tail(&output.stderr)
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ImageBuilder for DockerImages {
    async fn build(&self, dockerfile: &str, platform: &str, context: &Path) -> Result<String> {
        let dockerfile_path = context.join(dockerfile);
        if !dockerfile_path.is_file() {
            return Err(CloudError::ImageBuild(format!(
                "Dockerfile not found: {}",
                dockerfile_path.display()
            )));
        }

        let spinner = Spinner::new(format!("Building {} for {}", self.local_tag, platform));
        let dockerfile_arg = dockerfile_path.to_string_lossy().to_string();
        let context_arg = context.to_string_lossy().to_string();
        let result = self
            .run(&[
                "build",
                "--platform",
                platform,
                "-f",
                dockerfile_arg.as_str(),
                "-t",
                self.local_tag.as_str(),
                context_arg.as_str(),
            ])
            .await;

        match result {
            Ok(_) => {
                spinner.finish(&format!("Built {}", self.local_tag));
                Ok(self.local_tag.clone())
            }
            Err(e) => {
                spinner.finish_error("docker build");
                Err(e)
            }
        }
    }

    async fn push(&self, local_tag: &str, remote: &str, auth: &RegistryAuth) -> Result<String> {
        self.login(auth).await?;
        self.run(&["tag", local_tag, remote]).await?;

        let spinner = Spinner::new(format!("Pushing {}", remote));
        match self.run(&["push", remote]).await {
            Ok(_) => {
                spinner.finish(&format!("Pushed {}", remote));
                Ok(remote.to_string())
            }
            Err(e) => {
                spinner.finish_error("docker push");
                Err(e)
            }
        }
    }
}
