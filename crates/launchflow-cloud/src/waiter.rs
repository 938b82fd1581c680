//! Convergence waiter
//!
//! Bounded poll loop that blocks until an asynchronously provisioned resource
//! reaches a terminal state. The loop is an explicit state machine
//! ([`WaitState`]) driven by a [`Clock`], so tests can run it against
//! [`ManualClock`] without sleeping for real.
//!
//! Timeouts are not errors: callers get [`WaitOutcome::TimedOut`] and decide
//! whether to warn and continue.

use crate::error::{CloudError, GatewayResult, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

/// Source of time for waits
#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic time since the clock was created
    fn now(&self) -> Duration;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio timers
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that only moves when slept on
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += duration;
    }

    /// Every sleep requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(duration);
        self.advance(duration);
    }
}

/// What to wait for and how patiently
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergenceTarget {
    /// Human-readable resource description used in logs and warnings
    pub resource: String,
    pub timeout: Duration,
    pub interval: Duration,
}

impl ConvergenceTarget {
    pub fn new(resource: impl Into<String>, timeout: Duration, interval: Duration) -> Self {
        Self {
            resource: resource.into(),
            timeout,
            interval,
        }
    }

    pub fn certificate_issued(arn: &str) -> Self {
        Self::new(
            format!("certificate {}", arn),
            Duration::from_secs(30 * 60),
            Duration::from_secs(30),
        )
    }

    pub fn validation_records(arn: &str) -> Self {
        Self::new(
            format!("validation records of {}", arn),
            Duration::from_secs(120),
            Duration::from_secs(5),
        )
    }

    pub fn distribution_deployed(id: &str) -> Self {
        Self::new(
            format!("CloudFront distribution {}", id),
            Duration::from_secs(20 * 60),
            Duration::from_secs(30),
        )
    }

    pub fn distribution_disabled(id: &str) -> Self {
        Self::new(
            format!("CloudFront distribution {} to disable", id),
            Duration::from_secs(25 * 60),
            Duration::from_secs(30),
        )
    }

    pub fn load_balancer_active(name: &str) -> Self {
        Self::new(
            format!("load balancer {}", name),
            Duration::from_secs(10 * 60),
            Duration::from_secs(15),
        )
    }

    pub fn load_balancer_deleted(name: &str) -> Self {
        Self::new(
            format!("load balancer {} to be deleted", name),
            Duration::from_secs(5 * 60),
            Duration::from_secs(10),
        )
    }

    pub fn running_tasks(service: &str, timeout: Duration) -> Self {
        Self::new(
            format!("running tasks of {}", service),
            timeout,
            Duration::from_secs(15),
        )
    }

    pub fn healthy_targets(target_group: &str, timeout: Duration) -> Self {
        Self::new(
            format!("healthy targets in {}", target_group),
            timeout,
            Duration::from_secs(15),
        )
    }

    pub fn public_ip(service: &str) -> Self {
        Self::new(
            format!("public IP of {}", service),
            Duration::from_secs(10 * 60),
            Duration::from_secs(15),
        )
    }

    pub fn service_inactive(service: &str) -> Self {
        Self::new(
            format!("ECS service {} to drain", service),
            Duration::from_secs(300),
            Duration::from_secs(10),
        )
    }
}

/// Poll-loop state
#[derive(Debug, Clone, PartialEq)]
pub enum WaitState<S> {
    Waiting { attempts: u32, last: Option<S> },
    Converged(S),
    TimedOut { attempts: u32, last: Option<S> },
    Failed(S),
}

impl<S> WaitState<S> {
    pub fn start() -> Self {
        WaitState::Waiting {
            attempts: 0,
            last: None,
        }
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, WaitState::Waiting { .. })
    }

    /// Fold one poll into the state.
    ///
    /// `observation` is `None` when the poll produced nothing usable (for
    /// example a throttled request). Terminal states absorb further input.
    pub fn observe(
        self,
        observation: Option<S>,
        elapsed: Duration,
        timeout: Duration,
        is_terminal: impl Fn(&S) -> bool,
        is_failed: impl Fn(&S) -> bool,
    ) -> Self {
        let WaitState::Waiting { attempts, last } = self else {
            return self;
        };
        let attempts = attempts + 1;

        match observation {
            Some(status) if is_failed(&status) => WaitState::Failed(status),
            Some(status) if is_terminal(&status) => WaitState::Converged(status),
            observation => {
                let last = observation.or(last);
                if elapsed >= timeout {
                    WaitState::TimedOut { attempts, last }
                } else {
                    WaitState::Waiting { attempts, last }
                }
            }
        }
    }
}

/// Final result of a wait
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome<S> {
    Converged(S),
    TimedOut { last: Option<S>, waited: Duration },
    Failed(S),
}

impl<S> WaitOutcome<S> {
    pub fn is_converged(&self) -> bool {
        matches!(self, WaitOutcome::Converged(_))
    }

    pub fn converged(self) -> Option<S> {
        match self {
            WaitOutcome::Converged(status) => Some(status),
            _ => None,
        }
    }
}

/// Poll `poll` every `target.interval` until `is_terminal` or `is_failed`
/// holds, or `target.timeout` has passed.
///
/// Throttled polls count as attempts without an observation. Any other
/// gateway failure aborts the wait.
pub async fn await_terminal<S, F, Fut, T, X>(
    clock: &dyn Clock,
    target: &ConvergenceTarget,
    mut poll: F,
    is_terminal: T,
    is_failed: X,
) -> Result<WaitOutcome<S>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GatewayResult<S>>,
    T: Fn(&S) -> bool,
    X: Fn(&S) -> bool,
{
    let started = clock.now();
    let mut state = WaitState::start();

    loop {
        let observation = match poll().await {
            Ok(status) => Some(status),
            Err(e) if e.is_throttled() => {
                tracing::debug!(resource = %target.resource, "poll throttled: {}", e);
                None
            }
            Err(source) => {
                return Err(CloudError::Provider {
                    context: format!("waiting for {}", target.resource),
                    source,
                });
            }
        };

        let elapsed = clock.now().saturating_sub(started);
        state = match state.observe(observation, elapsed, target.timeout, &is_terminal, &is_failed)
        {
            WaitState::Waiting { attempts, last } => {
                tracing::debug!(
                    resource = %target.resource,
                    attempts,
                    elapsed_secs = elapsed.as_secs(),
                    "still waiting"
                );
                let remaining = target.timeout.saturating_sub(elapsed);
                clock.sleep(target.interval.min(remaining)).await;
                WaitState::Waiting { attempts, last }
            }
            WaitState::Converged(status) => return Ok(WaitOutcome::Converged(status)),
            WaitState::Failed(status) => return Ok(WaitOutcome::Failed(status)),
            WaitState::TimedOut { attempts, last } => {
                tracing::warn!(
                    resource = %target.resource,
                    attempts,
                    "gave up waiting after {}s",
                    elapsed.as_secs()
                );
                return Ok(WaitOutcome::TimedOut {
                    last,
                    waited: elapsed,
                });
            }
        };
    }
}
