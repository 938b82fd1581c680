use super::load_config;
use colored::Colorize;
use launchflow_cloud::Platform;
use launchflow_config::{DeployConfig, Overrides};
use std::path::Path;

fn summary(config: &DeployConfig) -> Vec<(&'static str, String)> {
    let mut lines = vec![("platform", config.platform.to_string())];
    if let Ok(app) = config.app_name() {
        lines.push(("app", app.to_string()));
    }
    match config.platform {
        Platform::Fargate => {
            lines.push(("region", config.region().unwrap_or_default().to_string()));
            let show = |v: &Option<launchflow_config::Scalar>| {
                v.as_ref().map(|s| s.to_string()).unwrap_or_default()
            };
            lines.push((
                "task",
                format!(
                    "cpu {} / memory {} / storage {} / replicas {}",
                    show(&config.task.cpu),
                    show(&config.task.memory),
                    show(&config.task.ephemeral_storage),
                    config.replicas()
                ),
            ));
            lines.push((
                "capacity",
                if config.task.spot.unwrap_or(true) {
                    "FARGATE_SPOT".to_string()
                } else {
                    "FARGATE".to_string()
                },
            ));
        }
        Platform::StaticSite => {
            lines.push(("region", config.region().unwrap_or_default().to_string()));
            if let Some(folder) = config.s3.as_ref().and_then(|s| s.folder.as_ref()) {
                lines.push(("folder", folder.display().to_string()));
            }
        }
        Platform::Fly | Platform::Vercel => {}
    }
    if let Some(public) = &config.public {
        lines.push((
            "public",
            format!(
                "{} ({})",
                public.domain.as_deref().unwrap_or_default(),
                public.mode.as_deref().unwrap_or("production")
            ),
        ));
    }
    if !config.environment.is_empty() {
        lines.push(("env", format!("{} variable(s)", config.environment.len())));
    }
    lines
}

pub async fn handle(config_path: Option<&Path>) -> anyhow::Result<()> {
    println!("{}", "Validating deploy file...".blue());

    let loaded = match load_config(config_path, &Overrides::default()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ Could not load the deploy file".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    match loaded.config.validate() {
        Ok(()) => {
            println!("{}", "✓ Deploy file is valid".green().bold());
            println!();
            for (label, value) in summary(&loaded.config) {
                println!("  {:<10} {}", label, value.cyan());
            }
            Ok(())
        }
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ Configuration error".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_for_fargate() {
        let config: DeployConfig = parse(
            "app_name: shop\naws:\n  region: eu-west-1\ntask:\n  cpu: 256\n  memory: 512\n  ephemeral_storage: 21\n  spot: false\n",
        );
        let lines = summary(&config);
        assert_eq!(lines[0], ("platform", "fargate".to_string()));
        assert!(lines.iter().any(|(k, v)| *k == "task" && v.contains("cpu 256")));
        assert!(lines.contains(&("capacity", "FARGATE".to_string())));
    }

    fn parse(yaml: &str) -> DeployConfig {
        launchflow_config::parse(yaml, Path::new("deploy.yaml")).unwrap()
    }
}
