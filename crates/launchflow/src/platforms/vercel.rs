use super::{run_attached, run_captured};
use colored::Colorize;
use launchflow_config::VercelSettings;
use std::path::Path;

pub fn link_args(settings: &VercelSettings) -> Vec<String> {
    let mut args = vec![
        "link".to_string(),
        "--yes".to_string(),
        "--project".to_string(),
        settings.project_name.clone(),
    ];
    if let Some(scope) = settings.team.as_ref().or(settings.scope.as_ref()) {
        args.push("--scope".into());
        args.push(scope.clone());
    }
    args
}

pub fn deploy_args(settings: &VercelSettings) -> Vec<String> {
    let mut args = Vec::new();
    if settings.prod {
        args.push("--prod".to_string());
    }
    if settings.yes {
        args.push("--yes".to_string());
    }
    if let Some(domain) = &settings.domain {
        args.push("--domain".into());
        args.push(domain.clone());
    }
    args
}

fn already_linked(output: &str) -> bool {
    output.to_lowercase().contains("already linked")
}

pub async fn deploy(settings: &VercelSettings) -> anyhow::Result<()> {
    println!("{}", "Deploying to Vercel...".blue().bold());
    let dir = std::env::current_dir()?;
    ensure_package_json(&dir)?;

    if !settings.environment.is_empty() {
        println!();
        println!(
            "{} {} environment variable(s) are not pushed to Vercel",
            "⚠".yellow(),
            settings.environment.len()
        );
        println!("    Set them in the Vercel dashboard or with 'vercel env add'");
    }

    println!();
    println!("Linking to Vercel project: {}", settings.project_name.cyan());
    let link = run_captured("vercel", &link_args(settings), &dir).await?;
    if !link.success {
        if already_linked(&link.stdout) || already_linked(&link.stderr) {
            println!("  Project is already linked");
        } else {
            println!(
                "  {} Linking reported a problem: {}",
                "⚠".yellow(),
                link.stderr.trim()
            );
        }
    }

    println!();
    run_attached("vercel", &deploy_args(settings), &dir).await?;

    println!();
    println!("{}", "✓ Deployment to Vercel completed".green().bold());
    println!("  App: {}", settings.app_name);
    if let Some(domain) = &settings.domain {
        println!("  Domain: {}", domain.cyan());
    }
    Ok(())
}

fn ensure_package_json(dir: &Path) -> anyhow::Result<()> {
    if dir.join("package.json").is_file() {
        return Ok(());
    }
    anyhow::bail!(
        "package.json not found in {}\n\nHint:\n  • Run the deployment from your frontend/app directory",
        dir.display()
    )
}
