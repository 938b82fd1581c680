//! Progress reporting and operator prompts
//!
//! The engine never prints. Stage headers, per-resource outcomes and warnings
//! go through a [`Reporter`]; questions to the operator go through [`Confirm`].
//! The CLI supplies console implementations, tests supply closures.

use crate::action::ActionType;
use crate::model::ResourceKind;
use crate::waiter::ConvergenceTarget;

/// Sink for user-facing progress
pub trait Reporter: Send + Sync {
    /// A new stage begins (`index` is 1-based)
    fn stage(&self, index: usize, total: usize, title: &str);

    /// A resource was reconciled
    fn resource(&self, kind: ResourceKind, name: &str, action: ActionType);

    fn note(&self, message: &str);

    fn warn(&self, message: &str);

    fn wait_started(&self, _target: &ConvergenceTarget) {}

    fn wait_finished(&self, _target: &ConvergenceTarget) {}
}

/// Reporter that forwards everything to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn stage(&self, index: usize, total: usize, title: &str) {
        tracing::info!("[{}/{}] {}", index, total, title);
    }

    fn resource(&self, kind: ResourceKind, name: &str, action: ActionType) {
        tracing::info!(%kind, name, %action, "reconciled");
    }

    fn note(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn wait_started(&self, target: &ConvergenceTarget) {
        tracing::info!(
            timeout_secs = target.timeout.as_secs(),
            "waiting for {}",
            target.resource
        );
    }
}

/// A yes/no question for the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub title: String,
    /// Lines shown under the title
    pub details: Vec<String>,
    /// Demand the literal word `yes` instead of y/N
    pub typed_yes: bool,
}

impl Prompt {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            details: Vec::new(),
            typed_yes: false,
        }
    }

    pub fn detail(mut self, line: impl Into<String>) -> Self {
        self.details.push(line.into());
        self
    }

    pub fn typed(mut self) -> Self {
        self.typed_yes = true;
        self
    }
}

/// Answers operator prompts
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &Prompt) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&Prompt) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &Prompt) -> bool {
        self(prompt)
    }
}

/// Accepts every prompt (`--yes`)
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, prompt: &Prompt) -> bool {
        tracing::debug!(title = %prompt.title, "prompt accepted without asking");
        true
    }
}
