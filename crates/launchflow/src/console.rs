//! Terminal implementations of the engine's reporter and prompt traits

use crate::progress::Spinner;
use colored::Colorize;
use launchflow_cloud::waiter::ConvergenceTarget;
use launchflow_cloud::{ActionType, Confirm, Prompt, Reporter, ResourceKind};
use std::io::{BufRead, Write};
use std::sync::Mutex;

/// Colored stage headers, per-resource lines and wait spinners
#[derive(Default)]
pub struct ConsoleReporter {
    spinner: Mutex<Option<Spinner>>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn clear_spinner(&self) {
        if let Ok(mut slot) = self.spinner.lock()
            && let Some(spinner) = slot.take()
        {
            spinner.clear();
        }
    }
}

pub fn action_marker(action: ActionType) -> colored::ColoredString {
    match action {
        ActionType::Create => "✓".green(),
        ActionType::Update => "↻".yellow(),
        ActionType::NoOp => "=".dimmed(),
        ActionType::Delete => "✗".red(),
    }
}

impl Reporter for ConsoleReporter {
    fn stage(&self, index: usize, total: usize, title: &str) {
        self.clear_spinner();
        println!();
        println!(
            "{} {}",
            format!("[{}/{}]", index, total).cyan().bold(),
            title.bold()
        );
    }

    fn resource(&self, kind: ResourceKind, name: &str, action: ActionType) {
        self.clear_spinner();
        let verb = match action {
            ActionType::Create => "created",
            ActionType::Update => "updated",
            ActionType::NoOp => "unchanged",
            ActionType::Delete => "deleted",
        };
        println!(
            "  {} {} {} {}",
            action_marker(action),
            kind,
            name.cyan(),
            format!("({})", verb).dimmed()
        );
    }

    fn note(&self, message: &str) {
        println!("    {}", message);
    }

    fn warn(&self, message: &str) {
        self.clear_spinner();
        println!("  {} {}", "⚠".yellow(), message.yellow());
    }

    fn wait_started(&self, target: &ConvergenceTarget) {
        let spinner = Spinner::new(format!(
            "Waiting for {} (up to {}s)",
            target.resource,
            target.timeout.as_secs()
        ));
        if let Ok(mut slot) = self.spinner.lock()
            && let Some(previous) = slot.replace(spinner)
        {
            previous.clear();
        }
    }

    fn wait_finished(&self, target: &ConvergenceTarget) {
        if let Ok(mut slot) = self.spinner.lock()
            && let Some(spinner) = slot.take()
        {
            spinner.finish(&format!("{} ready", target.resource));
        }
    }
}

/// Asks on stdin
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleConfirm;

/// Whether `answer` accepts `prompt`
pub fn accepts(prompt: &Prompt, answer: &str) -> bool {
    let answer = answer.trim();
    if prompt.typed_yes {
        answer == "yes"
    } else {
        answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
    }
}

impl Confirm for ConsoleConfirm {
    fn confirm(&self, prompt: &Prompt) -> bool {
        println!();
        println!("{}", prompt.title.yellow().bold());
        for line in &prompt.details {
            println!("  • {}", line);
        }
        println!();
        if prompt.typed_yes {
            print!("Type 'yes' to continue: ");
        } else {
            print!("Continue? [y/N]: ");
        }
        if std::io::stdout().flush().is_err() {
            return false;
        }

        let mut input = String::new();
        match std::io::stdin().lock().read_line(&mut input) {
            Ok(0) | Err(_) => false,
            Ok(_) => accepts(prompt, &input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_prompt_needs_literal_yes() {
        let prompt = Prompt::new("Destroy shop?").typed();
        assert!(accepts(&prompt, "yes\n"));
        assert!(!accepts(&prompt, "y\n"));
        assert!(!accepts(&prompt, "YES"));
        assert!(!accepts(&prompt, ""));
    }

    #[test]
    fn test_plain_prompt_accepts_y() {
        let prompt = Prompt::new("Proceed with mismatched nameservers?");
        assert!(accepts(&prompt, "y"));
        assert!(accepts(&prompt, "Yes\n"));
        assert!(!accepts(&prompt, "n"));
        assert!(!accepts(&prompt, "\n"));
    }
}
