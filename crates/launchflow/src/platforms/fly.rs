use super::run_attached;
use colored::Colorize;
use launchflow_config::FlySettings;
use std::path::{Path, PathBuf};

/// Directory holding `fly.toml`: the current one, else `../backend`.
pub fn find_app_dir(cwd: &Path) -> anyhow::Result<PathBuf> {
    let here = cwd.join("fly.toml");
    if here.is_file() {
        return Ok(cwd.to_path_buf());
    }
    let backend = cwd.join("..").join("backend");
    if backend.join("fly.toml").is_file() {
        return Ok(backend);
    }
    anyhow::bail!(
        "fly.toml not found. Tried:\n  - {}\n  - {}\n\nHint:\n  • Run from the directory that holds fly.toml",
        here.display(),
        backend.join("fly.toml").display()
    )
}

pub fn deploy_args() -> Vec<String> {
    vec!["deploy".into(), "--remote-only".into()]
}

/// `fly.toml` scaling settings are not reliable, so the machine count is set
/// explicitly after every deploy.
pub fn scale_args(replicas: u32) -> Vec<String> {
    vec!["scale".into(), "count".into(), replicas.to_string()]
}

pub async fn deploy(settings: &FlySettings) -> anyhow::Result<()> {
    println!("{}", "Deploying to Fly.io...".blue().bold());
    let dir = find_app_dir(&std::env::current_dir()?)?;
    println!("  App: {}", settings.app_name.cyan());
    println!("  Dockerfile: {}", settings.dockerfile);

    run_attached("fly", &deploy_args(), &dir).await?;

    println!();
    println!("Setting machine count to {}...", settings.replicas);
    run_attached("fly", &scale_args(settings.replicas), &dir).await?;

    println!();
    println!("{}", "✓ Deployment to Fly.io completed".green().bold());
    println!("  App: {}", settings.app_name);
    println!("  Replicas: {}", settings.replicas);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_prefers_current_dir() {
        let root = tempfile::tempdir().unwrap();
        let app = root.path().join("app");
        fs::create_dir(&app).unwrap();
        fs::write(app.join("fly.toml"), "app = 'x'").unwrap();

        assert_eq!(find_app_dir(&app).unwrap(), app);
    }

    #[test]
    fn test_falls_back_to_backend_sibling() {
        let root = tempfile::tempdir().unwrap();
        let deploy = root.path().join("deploy");
        let backend = root.path().join("backend");
        fs::create_dir(&deploy).unwrap();
        fs::create_dir(&backend).unwrap();
        fs::write(backend.join("fly.toml"), "app = 'x'").unwrap();

        let found = find_app_dir(&deploy).unwrap();
        assert!(found.join("fly.toml").is_file());
    }

    #[test]
    fn test_missing_fly_toml() {
        let root = tempfile::tempdir().unwrap();
        let err = find_app_dir(root.path()).unwrap_err();
        assert!(err.to_string().contains("fly.toml not found"));
    }

    #[test]
    fn test_commands() {
        assert_eq!(deploy_args(), vec!["deploy", "--remote-only"]);
        assert_eq!(scale_args(3), vec!["scale", "count", "3"]);
    }
}
