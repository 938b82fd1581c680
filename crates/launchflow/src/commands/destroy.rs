use super::Loaded;
use super::deploy::connect;
use crate::console::{ConsoleConfirm, ConsoleReporter};
use colored::Colorize;
use launchflow_cloud::{
    AssumeYes, CloudError, Confirm, Teardown, TeardownOutcome, TeardownReport, TokioClock,
};

pub async fn handle(loaded: &Loaded, yes: bool) -> anyhow::Result<()> {
    let (cloud, desired) = connect(loaded).await?;
    println!();
    println!(
        "{} {} ({})",
        "Destroying".red().bold(),
        desired.app_name.cyan().bold(),
        desired.platform
    );

    let reporter = ConsoleReporter::new();
    let clock = TokioClock::new();
    let confirm: &dyn Confirm = if yes { &AssumeYes } else { &ConsoleConfirm };

    let teardown = Teardown {
        cloud: &cloud,
        clock: &clock,
        reporter: &reporter,
        confirm,
        assume_yes: yes,
    };

    match teardown.run(&desired).await? {
        TeardownOutcome::Cancelled => {
            println!();
            println!("{}", "Destroy cancelled".yellow());
            Ok(())
        }
        TeardownOutcome::Completed(report) => {
            print_report(&report);
            if report.is_clean() {
                Ok(())
            } else {
                Err(CloudError::PartialFailure(report.warnings).into())
            }
        }
    }
}

fn print_report(report: &TeardownReport) {
    println!();
    println!(
        "{} {} removed, {} not found",
        "✓ Destroy finished:".green().bold(),
        report.removed.len(),
        report.skipped.len()
    );
    for removed in &report.removed {
        println!("  {} {}", "✗".red(), removed);
    }
    if !report.warnings.is_empty() {
        println!();
        for warning in &report.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }
}
