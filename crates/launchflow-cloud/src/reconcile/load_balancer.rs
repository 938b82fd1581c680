//! Application load balancer, target group, listener and the health wait

use super::Context;
use crate::action::ActionType;
use crate::error::{GatewayResultExt, Result};
use crate::gateway::{HealthCheck, TargetGroupSpec};
use crate::handle::{LoadBalancerAttrs, ResourceHandle};
use crate::model::{ResourceKind, ResourceNames};
use crate::waiter::{ConvergenceTarget, WaitOutcome, await_terminal};
use std::time::Duration;

pub const LISTENER_PORT: u16 = 80;

/// Shared budget of the service health wait
pub const HEALTH_BUDGET: Duration = Duration::from_secs(10 * 60);

/// Pause between tasks running and the first target health check
pub const HEALTH_GRACE: Duration = Duration::from_secs(30);

const TROUBLESHOOTING: &str = "Targets are not healthy yet. Check:\n  \
    • the container listens on the configured port\n  \
    • the health check path returns 200\n  \
    • the task logs in CloudWatch for startup errors";

/// Ensure `{app}-alb`. An existing load balancer is reused as-is.
pub async fn ensure_load_balancer(
    ctx: &Context<'_>,
    names: &ResourceNames,
    subnets: &[String],
    security_group_id: &str,
) -> Result<ResourceHandle<LoadBalancerAttrs>> {
    let name = &names.load_balancer;
    if let Some(lb) = ctx
        .cloud
        .find_load_balancer(name)
        .await
        .context(format!("describe load balancer {}", name))?
    {
        return Ok(ctx.finish(
            name,
            ResourceHandle::new(
                ResourceKind::LoadBalancer,
                lb.arn,
                ActionType::NoOp,
                LoadBalancerAttrs {
                    dns_name: lb.dns_name,
                },
            ),
        ));
    }

    ctx.require_create(ResourceKind::LoadBalancer, name)?;
    let lb = ctx
        .cloud
        .create_load_balancer(name, subnets, &[security_group_id.to_string()])
        .await
        .context(format!("create load balancer {}", name))?;
    tracing::info!(arn = %lb.arn, dns = %lb.dns_name, "created load balancer");

    let target = ConvergenceTarget::load_balancer_active(name);
    ctx.reporter.wait_started(&target);
    let outcome = await_terminal(
        ctx.clock,
        &target,
        || async {
            Ok(ctx
                .cloud
                .find_load_balancer(name)
                .await?
                .map(|lb| lb.state)
                .unwrap_or_default())
        },
        |state: &String| state == "active",
        |state: &String| state == "failed",
    )
    .await?;
    ctx.reporter.wait_finished(&target);
    if !outcome.is_converged() {
        ctx.reporter
            .warn(&format!("Load balancer {} is not active yet; continuing", name));
    }

    Ok(ctx.finish(
        name,
        ResourceHandle::new(
            ResourceKind::LoadBalancer,
            lb.arn,
            ActionType::Create,
            LoadBalancerAttrs {
                dns_name: lb.dns_name,
            },
        ),
    ))
}

/// Ensure `{app}-tg`; the health check path is the only field kept in sync.
pub async fn ensure_target_group(
    ctx: &Context<'_>,
    names: &ResourceNames,
    vpc_id: &str,
    port: u16,
    health_check_path: &str,
) -> Result<ResourceHandle> {
    let name = &names.target_group;
    let existing = ctx
        .cloud
        .find_target_group(name)
        .await
        .context(format!("describe target group {}", name))?;

    let handle = match existing {
        Some(group) if group.health_check_path.as_deref() == Some(health_check_path) => {
            ResourceHandle::bare(ResourceKind::TargetGroup, group.arn, ActionType::NoOp)
        }
        Some(group) => {
            ctx.cloud
                .set_health_check_path(&group.arn, health_check_path)
                .await
                .context(format!("modify target group {}", name))?;
            tracing::info!(
                target_group = %name,
                from = group.health_check_path.as_deref().unwrap_or("-"),
                to = health_check_path,
                "updated health check path"
            );
            ResourceHandle::bare(ResourceKind::TargetGroup, group.arn, ActionType::Update)
        }
        None => {
            ctx.require_create(ResourceKind::TargetGroup, name)?;
            let spec = TargetGroupSpec {
                name: name.clone(),
                vpc_id: vpc_id.to_string(),
                port,
                health_check: HealthCheck::http(health_check_path),
            };
            let group = ctx
                .cloud
                .create_target_group(&spec)
                .await
                .context(format!("create target group {}", name))?;
            tracing::info!(arn = %group.arn, "created target group");
            ResourceHandle::bare(ResourceKind::TargetGroup, group.arn, ActionType::Create)
        }
    };

    Ok(ctx.finish(name, handle))
}

/// Ensure an HTTP :80 listener forwarding to `target_group_arn`
pub async fn ensure_listener(
    ctx: &Context<'_>,
    load_balancer_arn: &str,
    target_group_arn: &str,
) -> Result<ResourceHandle> {
    let label = format!("HTTP:{}", LISTENER_PORT);
    let listeners = ctx
        .cloud
        .listeners(load_balancer_arn)
        .await
        .context("describe listeners")?;

    let handle = match listeners.into_iter().find(|l| l.port == LISTENER_PORT) {
        Some(listener) if listener.target_group_arn.as_deref() == Some(target_group_arn) => {
            ResourceHandle::bare(ResourceKind::Listener, listener.arn, ActionType::NoOp)
        }
        Some(listener) => {
            ctx.cloud
                .set_listener_target(&listener.arn, target_group_arn)
                .await
                .context("modify listener")?;
            tracing::info!(listener = %listener.arn, "listener now forwards to the app target group");
            ResourceHandle::bare(ResourceKind::Listener, listener.arn, ActionType::Update)
        }
        None => {
            ctx.require_create(ResourceKind::Listener, &label)?;
            let listener = ctx
                .cloud
                .create_listener(load_balancer_arn, LISTENER_PORT, target_group_arn)
                .await
                .context("create listener")?;
            tracing::info!(arn = %listener.arn, "created listener");
            ResourceHandle::bare(ResourceKind::Listener, listener.arn, ActionType::Create)
        }
    };

    Ok(ctx.finish(&label, handle))
}

/// Wait for the service's tasks to run and at least one target to pass its
/// health check.
///
/// Three phases share [`HEALTH_BUDGET`]: running count reaches the desired
/// count, a [`HEALTH_GRACE`] pause, then at least one healthy target. Running
/// out of time is only a warning. Returns whether a healthy target was seen.
pub async fn await_service_health(
    ctx: &Context<'_>,
    cluster: &str,
    service: &str,
    desired_count: u32,
    target_group_arn: &str,
) -> Result<bool> {
    let started = ctx.clock.now();

    let running = ConvergenceTarget::running_tasks(service, HEALTH_BUDGET);
    ctx.reporter.wait_started(&running);
    let outcome = await_terminal(
        ctx.clock,
        &running,
        || async {
            Ok(ctx
                .cloud
                .find_service(cluster, service)
                .await?
                .map(|s| s.running_count)
                .unwrap_or(0))
        },
        |count: &u32| desired_count > 0 && *count >= desired_count,
        |_| false,
    )
    .await?;
    ctx.reporter.wait_finished(&running);
    if let WaitOutcome::TimedOut { last, .. } = outcome {
        ctx.reporter.warn(&format!(
            "Only {}/{} tasks of {} are running after {}s",
            last.unwrap_or(0),
            desired_count,
            service,
            HEALTH_BUDGET.as_secs()
        ));
        ctx.reporter.warn(TROUBLESHOOTING);
        return Ok(false);
    }

    ctx.reporter.note(&format!(
        "Tasks running; giving targets {}s to register",
        HEALTH_GRACE.as_secs()
    ));
    ctx.clock.sleep(HEALTH_GRACE).await;

    let remaining = HEALTH_BUDGET.saturating_sub(ctx.clock.now().saturating_sub(started));
    let healthy = ConvergenceTarget::healthy_targets(target_group_arn, remaining);
    ctx.reporter.wait_started(&healthy);
    let outcome = await_terminal(
        ctx.clock,
        &healthy,
        || async {
            let targets = ctx.cloud.target_health(target_group_arn).await?;
            Ok(targets.iter().filter(|t| t.is_healthy()).count())
        },
        |count: &usize| *count >= 1,
        |_| false,
    )
    .await?;
    ctx.reporter.wait_finished(&healthy);

    match outcome {
        WaitOutcome::Converged(count) => {
            tracing::info!(healthy = count, "targets healthy");
            Ok(true)
        }
        _ => {
            ctx.reporter.warn(&format!(
                "No healthy targets in {} after {}s",
                target_group_arn,
                HEALTH_BUDGET.as_secs()
            ));
            ctx.reporter.warn(TROUBLESHOOTING);
            Ok(false)
        }
    }
}
