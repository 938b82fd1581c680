//! Reconciliation outcomes and run reports

use crate::model::ResourceKind;
use serde::{Deserialize, Serialize};

/// What a reconciler did to a remote resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Created a new resource
    Create,
    /// Changed an existing resource
    Update,
    /// Removed a resource
    Delete,
    /// Already matched the desired state
    NoOp,
}

impl ActionType {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, ActionType::NoOp)
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// One reconciled resource in a deploy run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub kind: ResourceKind,
    pub id: String,
    pub action: ActionType,
}

/// Summary of a deploy run
#[derive(Debug, Clone, Default)]
pub struct DeployReport {
    pub steps: Vec<StepRecord>,
    /// Non-fatal problems (timeouts, failed invalidations, ...)
    pub warnings: Vec<String>,
    pub image_uri: Option<String>,
    pub cdn_domain: Option<String>,
    pub public_ip: Option<String>,
    pub smoke_passed: Option<bool>,
}

impl DeployReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: ResourceKind, id: impl Into<String>, action: ActionType) {
        self.steps.push(StepRecord {
            kind,
            id: id.into(),
            action,
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn summary(&self) -> ReportSummary {
        let count = |action: ActionType| self.steps.iter().filter(|s| s.action == action).count();
        ReportSummary {
            created: count(ActionType::Create),
            updated: count(ActionType::Update),
            unchanged: count(ActionType::NoOp),
            warnings: self.warnings.len(),
        }
    }
}

/// Counts of reconciliation outcomes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub warnings: usize,
}

impl std::fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} unchanged, {} warning(s)",
            self.created, self.updated, self.unchanged, self.warnings
        )
    }
}

/// Summary of a teardown run
#[derive(Debug, Clone, Default)]
pub struct TeardownReport {
    pub removed: Vec<String>,
    /// Resources that were already gone
    pub skipped: Vec<String>,
    /// Partial failures; re-running destroy is safe
    pub warnings: Vec<String>,
}

impl TeardownReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn add_removed(&mut self, what: impl Into<String>) {
        self.removed.push(what.into());
    }

    pub fn add_skipped(&mut self, what: impl Into<String>) {
        self.skipped.push(what.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// How a teardown run ended
#[derive(Debug, Clone)]
pub enum TeardownOutcome {
    Completed(TeardownReport),
    /// The operator declined; nothing was touched.
    Cancelled,
}
