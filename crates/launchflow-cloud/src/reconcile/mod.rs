//! Resource reconcilers
//!
//! Each `ensure_*` function looks a resource up by its deterministic name,
//! compares it with the desired shape and then creates, updates or reuses it.
//! The returned [`ResourceHandle`](crate::ResourceHandle) records which of the
//! three happened.
//!
//! Creation is gated: when `allow_create` is off an absent resource fails
//! with [`CloudError::PermissionDenied`] before any create call is made.

pub mod bucket;
pub mod certificate;
pub mod cluster;
pub mod distribution;
pub mod dns;
pub mod endpoint;
pub mod iam;
pub mod load_balancer;
pub mod logs;
pub mod network;
pub mod registry;
pub mod service;
pub mod task;

use crate::action::ActionType;
use crate::error::{CloudError, Result};
use crate::gateway::CloudGateway;
use crate::handle::ResourceHandle;
use crate::model::ResourceKind;
use crate::reporter::Reporter;
use crate::waiter::Clock;

/// Everything a reconciler needs besides its own inputs
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub cloud: &'a dyn CloudGateway,
    pub clock: &'a dyn Clock,
    pub reporter: &'a dyn Reporter,
    pub allow_create: bool,
}

impl<'a> Context<'a> {
    pub fn new(
        cloud: &'a dyn CloudGateway,
        clock: &'a dyn Clock,
        reporter: &'a dyn Reporter,
        allow_create: bool,
    ) -> Self {
        Self {
            cloud,
            clock,
            reporter,
            allow_create,
        }
    }

    /// Fails unless creating `name` is allowed
    pub fn require_create(&self, kind: ResourceKind, name: &str) -> Result<()> {
        if self.allow_create {
            Ok(())
        } else {
            tracing::debug!(%kind, name, "creation refused");
            Err(CloudError::PermissionDenied {
                kind,
                name: name.to_string(),
            })
        }
    }

    /// Report the handle and hand it back
    pub(crate) fn finish<A>(&self, name: &str, handle: ResourceHandle<A>) -> ResourceHandle<A> {
        self.reporter.resource(handle.kind, name, handle.action);
        handle
    }
}

/// Create when freshly made, Update when anything changed, NoOp otherwise
pub(crate) fn action_for(created: bool, changed: bool) -> ActionType {
    match (created, changed) {
        (true, _) => ActionType::Create,
        (false, true) => ActionType::Update,
        (false, false) => ActionType::NoOp,
    }
}

/// Seconds since the Unix epoch, for caller references that must be unique
pub(crate) fn epoch_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}
