//! Public IP of a lightweight service
//!
//! Best effort only: the address changes on every redeploy, so DNS is
//! rewritten each time.

use super::Context;
use crate::error::{GatewayResult, Result};
use crate::waiter::{ConvergenceTarget, WaitOutcome, await_terminal};

/// One lookup across the service's running tasks.
///
/// Prefers the address on the task attachment and falls back to asking the
/// network interface directly.
async fn lookup_public_ip(
    ctx: &Context<'_>,
    cluster: &str,
    service: &str,
) -> GatewayResult<Option<String>> {
    let tasks = ctx.cloud.service_tasks(cluster, service).await?;
    for task in tasks.iter().filter(|t| t.last_status == "RUNNING") {
        if let Some(ip) = &task.public_ip {
            return Ok(Some(ip.clone()));
        }
        if let Some(eni) = &task.eni_id
            && let Some(ip) = ctx.cloud.network_interface_public_ip(eni).await?
        {
            tracing::debug!(task = %task.arn, eni = %eni, "public IP from network interface");
            return Ok(Some(ip));
        }
    }
    Ok(None)
}

/// Wait for a running task to get a public IP; `None` after the timeout.
pub async fn await_public_ip(
    ctx: &Context<'_>,
    cluster: &str,
    service: &str,
) -> Result<Option<String>> {
    let target = ConvergenceTarget::public_ip(service);
    ctx.reporter.wait_started(&target);
    let outcome = await_terminal(
        ctx.clock,
        &target,
        || lookup_public_ip(ctx, cluster, service),
        |ip: &Option<String>| ip.is_some(),
        |_| false,
    )
    .await?;
    ctx.reporter.wait_finished(&target);

    match outcome {
        WaitOutcome::Converged(ip) => Ok(ip),
        _ => {
            ctx.reporter.warn(&format!(
                "No running task of {} reported a public IP; DNS was not updated",
                service
            ));
            Ok(None)
        }
    }
}
