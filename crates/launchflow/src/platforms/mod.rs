//! Non-AWS platforms, driven through their own CLIs

pub mod fly;
pub mod vercel;

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Output of a captured command
pub struct Captured {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` in `dir` with the terminal attached; fail on non-zero exit.
pub async fn run_attached(program: &str, args: &[String], dir: &Path) -> anyhow::Result<()> {
    println!("  Running: {} {}", program, args.join(" "));
    let status = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|e| not_installed(program, e))?;

    if !status.success() {
        anyhow::bail!("{} {} exited with {}", program, args.join(" "), status);
    }
    Ok(())
}

/// Run `program` in `dir` and collect its output regardless of exit status.
pub async fn run_captured(program: &str, args: &[String], dir: &Path) -> anyhow::Result<Captured> {
    tracing::debug!("Running: {} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| not_installed(program, e))?;

    Ok(Captured {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

fn not_installed(program: &str, err: std::io::Error) -> anyhow::Error {
    let install = match program {
        "fly" => "https://fly.io/docs/hands-on/install-flyctl/",
        "vercel" => "npm i -g vercel",
        _ => "see the tool's documentation",
    };
    anyhow::anyhow!(
        "Could not run '{}': {}\n\nHint:\n  • Install it: {}",
        program,
        err,
        install
    )
}
