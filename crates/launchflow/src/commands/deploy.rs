use super::{Loaded, load_config};
use crate::console::{ConsoleConfirm, ConsoleReporter};
use crate::http::{DohResolver, ReqwestProbe};
use crate::image::DockerImages;
use crate::links;
use crate::platforms::{fly, vercel};
use clap::Args;
use colored::Colorize;
use launchflow_cloud::gateway::IdentityGateway;
use launchflow_cloud::{
    AssumeYes, Confirm, DeployReport, Deployer, DesiredState, Platform, TokioClock,
};
use launchflow_cloud_aws::{AwsCloud, AwsOptions};
use launchflow_config::Overrides;
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct DeployArgs {
    /// Deploy file (default: ./deploy.yaml, then LAUNCHFLOW_CONFIG, ...)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Remove every resource of the app instead of deploying
    #[arg(long)]
    pub destroy: bool,

    /// Stop after the image is built and pushed
    #[arg(long, conflicts_with = "destroy")]
    pub build_only: bool,

    /// Number of tasks to run
    #[arg(long)]
    pub replicas: Option<u32>,

    /// Use on-demand FARGATE capacity instead of FARGATE_SPOT
    #[arg(long)]
    pub no_spot: bool,

    /// AWS region
    #[arg(long)]
    pub region: Option<String>,

    /// Allow creating missing resources
    #[arg(long)]
    pub allow_create: bool,

    /// Extra environment variable, KEY=VALUE (repeatable)
    #[arg(short, long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Task CPU units
    #[arg(long)]
    pub cpu: Option<String>,

    /// Task memory in MiB
    #[arg(long)]
    pub memory: Option<String>,

    /// Ephemeral storage, e.g. 21 or 21gb
    #[arg(long)]
    pub ephemeral_storage: Option<String>,

    /// AWS profile
    #[arg(long)]
    pub profile: Option<String>,

    /// Dockerfile, relative to the deploy file
    #[arg(long)]
    pub dockerfile: Option<String>,

    /// Answer yes to every prompt
    #[arg(short, long)]
    pub yes: bool,
}

impl DeployArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            replicas: self.replicas,
            no_spot: self.no_spot,
            region: self.region.clone(),
            allow_create: self.allow_create,
            env: self.env.clone(),
            cpu: self.cpu.clone(),
            memory: self.memory.clone(),
            ephemeral_storage: self.ephemeral_storage.clone(),
            profile: self.profile.clone(),
            dockerfile: self.dockerfile.clone(),
        }
    }
}

/// Connect to AWS and resolve the desired state of an AWS platform app
pub async fn connect(loaded: &Loaded) -> anyhow::Result<(AwsCloud, DesiredState)> {
    let config = &loaded.config;
    config.validate()?;

    let options = AwsOptions {
        region: config.region().map(str::to_string),
        profile: Some(config.profile().to_string()),
    };
    tracing::debug!(?options, "connecting to AWS");
    let cloud = AwsCloud::connect(&options).await?;
    let account_id = cloud.account_id().await?;
    println!(
        "  Account: {}  Region: {}  Profile: {}",
        account_id.cyan(),
        cloud.region().cyan(),
        config.profile().cyan()
    );

    let desired = config.desired_state(&account_id, &loaded.base_dir())?;
    Ok((cloud, desired))
}

pub async fn handle(args: &DeployArgs) -> anyhow::Result<()> {
    let loaded = load_config(args.config.as_deref(), &args.overrides())?;
    loaded.config.validate()?;

    match loaded.config.platform {
        Platform::Fly => {
            if args.destroy {
                anyhow::bail!("--destroy is only supported for AWS platforms (fargate, s3)");
            }
            return fly::deploy(&loaded.config.fly_settings()?).await;
        }
        Platform::Vercel => {
            if args.destroy {
                anyhow::bail!("--destroy is only supported for AWS platforms (fargate, s3)");
            }
            return vercel::deploy(&loaded.config.vercel_settings()?).await;
        }
        Platform::Fargate | Platform::StaticSite => {}
    }

    if args.destroy {
        return super::destroy::handle(&loaded, args.yes).await;
    }

    let (cloud, desired) = connect(&loaded).await?;
    println!();
    println!(
        "{} {} ({})",
        "Deploying".blue().bold(),
        desired.app_name.cyan().bold(),
        desired.platform
    );

    let reporter = ConsoleReporter::new();
    let clock = TokioClock::new();
    let resolver = DohResolver::new();
    let probe = ReqwestProbe::new();
    let images = DockerImages::new(&desired.app_name);
    let confirm: &dyn Confirm = if args.yes { &AssumeYes } else { &ConsoleConfirm };

    let deployer = Deployer {
        cloud: &cloud,
        clock: &clock,
        reporter: &reporter,
        resolver: &resolver,
        confirm,
        probe: &probe,
        images: &images,
        assume_yes: args.yes,
        build_only: args.build_only,
    };

    let report = deployer.deploy(&desired).await?;
    print_report(&desired, &report, args.build_only);
    Ok(())
}

fn print_report(desired: &DesiredState, report: &DeployReport, build_only: bool) {
    println!();
    if build_only {
        println!("{}", "✓ Image built and pushed".green().bold());
        if let Some(image) = &report.image_uri {
            println!("  {}", image.cyan());
        }
        return;
    }

    println!("{}", "✓ Deploy finished".green().bold());
    println!("  {}", report.summary());

    if let Some(image) = &report.image_uri {
        println!("  Image: {}", image);
    }
    if let Some(ip) = &report.public_ip {
        println!("  Public IP: {}", ip);
    }

    let urls = links::public_urls(desired, report.cdn_domain.as_deref());
    if !urls.is_empty() {
        println!();
        println!("{}", "Public URLs:".bold());
        for url in urls {
            println!("  {}", url.cyan());
        }
    }

    let console = links::console_links(desired);
    if !console.is_empty() {
        println!();
        println!("{}", "AWS console:".bold());
        for (label, url) in console {
            println!("  {:<12} {}", label, url);
        }
    }

    match report.smoke_passed {
        Some(true) => println!("\n  {} smoke test passed", "✓".green()),
        Some(false) => println!(
            "\n  {} smoke test did not pass yet; DNS and CDN changes can take a while",
            "⚠".yellow()
        ),
        None => {}
    }

    if !report.warnings.is_empty() {
        println!();
        println!("{}", format!("{} warning(s):", report.warnings.len()).yellow());
        for warning in &report.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }
}
