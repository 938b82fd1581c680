//! Log sink and ECS event capture

use super::{Context, action_for};
use crate::error::{GatewayResultExt, Result};
use crate::gateway::{LogGroup, RuleTarget};
use crate::handle::ResourceHandle;
use crate::model::{ResourceKind, ResourceNames};
use serde_json::{Value, json};

pub const APP_LOG_RETENTION_DAYS: i32 = 30;
pub const EVENT_LOG_RETENTION_DAYS: i32 = 7;

/// Ensure the application log group `/ecs/{app}`
pub async fn ensure_log_sink(ctx: &Context<'_>, names: &ResourceNames) -> Result<ResourceHandle> {
    let (group, created) = ensure_log_group(
        ctx,
        ResourceKind::LogSink,
        &names.log_group,
        APP_LOG_RETENTION_DAYS,
    )
    .await?;

    Ok(ctx.finish(
        &names.log_group,
        ResourceHandle::bare(ResourceKind::LogSink, group.arn, action_for(created, false)),
    ))
}

/// Pattern of the cluster's state-change events
pub fn event_pattern(cluster_arn: &str) -> Value {
    json!({
        "source": ["aws.ecs"],
        "detail-type": [
            "ECS Task State Change",
            "ECS Service Action",
            "ECS Deployment State Change",
            "ECS Container Instance State Change"
        ],
        "detail": { "clusterArn": [cluster_arn] }
    })
}

/// ARN of a log group as EventBridge and resource policies expect it
pub fn log_group_arn(region: &str, account_id: &str, name: &str) -> String {
    format!("arn:aws:logs:{}:{}:log-group:{}", region, account_id, name)
}

/// Resource policy letting EventBridge write into the events log group
pub fn delivery_policy(log_group_arn: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": "EventBridgeToCloudWatchLogs",
            "Effect": "Allow",
            "Principal": {
                "Service": ["events.amazonaws.com", "delivery.logs.amazonaws.com"]
            },
            "Action": ["logs:CreateLogStream", "logs:PutLogEvents"],
            "Resource": format!("{}:*", log_group_arn)
        }]
    })
}

/// Route the cluster's ECS events into `/aws/ecs/events/{cluster}`.
///
/// Ensures the events log group, the delivery policy, the rule and exactly
/// one target; targets left over from earlier setups are removed.
pub async fn ensure_event_capture(
    ctx: &Context<'_>,
    names: &ResourceNames,
    cluster_arn: &str,
    region: &str,
    account_id: &str,
) -> Result<ResourceHandle> {
    let (_, group_created) = ensure_log_group(
        ctx,
        ResourceKind::EventCapture,
        &names.events_log_group,
        EVENT_LOG_RETENTION_DAYS,
    )
    .await?;
    let group_arn = log_group_arn(region, account_id, &names.events_log_group);

    let mut changed = false;

    let policy = delivery_policy(&group_arn);
    let current = ctx
        .cloud
        .resource_policy(&names.event_log_policy)
        .await
        .context("describe logs resource policies")?;
    let current: Option<Value> = current.and_then(|doc| serde_json::from_str(&doc).ok());
    if current.as_ref() != Some(&policy) {
        ctx.cloud
            .put_resource_policy(&names.event_log_policy, &policy.to_string())
            .await
            .context(format!("put resource policy {}", names.event_log_policy))?;
        changed = true;
    }

    let pattern = event_pattern(cluster_arn);
    let rule = ctx
        .cloud
        .find_rule(&names.event_rule)
        .await
        .context(format!("describe rule {}", names.event_rule))?;
    let rule_created = rule.is_none();
    let current_pattern: Option<Value> = rule
        .as_ref()
        .and_then(|r| r.pattern.as_deref())
        .and_then(|p| serde_json::from_str(p).ok());

    let rule_arn = match rule {
        Some(rule) if current_pattern.as_ref() == Some(&pattern) => rule.arn,
        existing => {
            if existing.is_none() {
                ctx.require_create(ResourceKind::EventCapture, &names.event_rule)?;
            }
            let arn = ctx
                .cloud
                .put_rule(
                    &names.event_rule,
                    &pattern.to_string(),
                    &format!("Capture ECS events for {}", names.cluster),
                )
                .await
                .context(format!("put rule {}", names.event_rule))?;
            tracing::info!(rule = %names.event_rule, "put event rule");
            changed = true;
            arn
        }
    };

    let desired = RuleTarget {
        id: names.event_target.clone(),
        arn: group_arn,
    };
    let targets = ctx
        .cloud
        .rule_targets(&names.event_rule)
        .await
        .context(format!("list targets of {}", names.event_rule))?;
    let stale: Vec<String> = targets
        .iter()
        .filter(|t| **t != desired)
        .map(|t| t.id.clone())
        .collect();
    if !stale.is_empty() {
        ctx.cloud
            .remove_targets(&names.event_rule, &stale)
            .await
            .context(format!("remove stale targets from {}", names.event_rule))?;
        tracing::info!(rule = %names.event_rule, removed = stale.len(), "removed stale targets");
        changed = true;
    }
    if !targets.contains(&desired) {
        ctx.cloud
            .put_target(&names.event_rule, &desired)
            .await
            .context(format!("put target on {}", names.event_rule))?;
        changed = true;
    }

    Ok(ctx.finish(
        &names.event_rule,
        ResourceHandle::bare(
            ResourceKind::EventCapture,
            rule_arn,
            action_for(group_created || rule_created, changed),
        ),
    ))
}

async fn ensure_log_group(
    ctx: &Context<'_>,
    kind: ResourceKind,
    name: &str,
    retention_days: i32,
) -> Result<(LogGroup, bool)> {
    if let Some(group) = ctx
        .cloud
        .find_log_group(name)
        .await
        .context(format!("describe log group {}", name))?
    {
        return Ok((group, false));
    }

    ctx.require_create(kind, name)?;
    let group = ctx
        .cloud
        .create_log_group(name, retention_days)
        .await
        .context(format!("create log group {}", name))?;
    tracing::info!(name, retention_days, "created log group");
    Ok((group, true))
}
