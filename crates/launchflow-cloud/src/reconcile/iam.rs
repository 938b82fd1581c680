//! Task execution role and its policy set
//!
//! The attached managed policies are synced to exactly the declared set:
//! anything attached earlier but no longer declared is detached.

use super::{Context, action_for};
use crate::error::{GatewayResultExt, Result};
use crate::handle::ResourceHandle;
use crate::model::{IamPolicySet, ResourceKind, ResourceNames};
use serde_json::{Value, json};
use std::collections::BTreeSet;

pub const POLICY_VERSION: &str = "2012-10-17";

/// Trust policy letting ECS tasks assume the role
pub fn task_trust_policy() -> Value {
    json!({
        "Version": POLICY_VERSION,
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": "ecs-tasks.amazonaws.com" },
            "Action": "sts:AssumeRole"
        }]
    })
}

/// Fill in `Version` when the declared document leaves it out
pub fn normalize_inline_policy(document: &Value) -> Value {
    let mut document = document.clone();
    if let Value::Object(map) = &mut document {
        map.entry("Version")
            .or_insert_with(|| Value::String(POLICY_VERSION.to_string()));
    }
    document
}

pub async fn ensure_execution_role(
    ctx: &Context<'_>,
    names: &ResourceNames,
    policies: &IamPolicySet,
) -> Result<ResourceHandle> {
    let role_name = &names.execution_role;

    let (role, created) = match ctx
        .cloud
        .find_role(role_name)
        .await
        .context(format!("get IAM role {}", role_name))?
    {
        Some(role) => (role, false),
        None => {
            ctx.require_create(ResourceKind::IamRole, role_name)?;
            let trust = task_trust_policy().to_string();
            let role = ctx
                .cloud
                .create_role(role_name, &trust)
                .await
                .context(format!("create IAM role {}", role_name))?;
            tracing::info!(arn = %role.arn, "created IAM role");
            (role, true)
        }
    };

    let mut changed = sync_managed_policies(ctx, role_name, &policies.managed).await?;
    changed |= sync_inline_policy(ctx, names, policies.inline.as_ref()).await?;

    Ok(ctx.finish(
        role_name,
        ResourceHandle::bare(ResourceKind::IamRole, role.arn, action_for(created, changed)),
    ))
}

async fn sync_managed_policies(ctx: &Context<'_>, role: &str, declared: &[String]) -> Result<bool> {
    let attached: BTreeSet<String> = ctx
        .cloud
        .attached_policies(role)
        .await
        .context(format!("list policies attached to {}", role))?
        .into_iter()
        .collect();
    let declared: BTreeSet<String> = declared.iter().cloned().collect();

    let mut changed = false;
    for arn in declared.difference(&attached) {
        ctx.cloud
            .attach_policy(role, arn)
            .await
            .context(format!("attach {} to {}", arn, role))?;
        tracing::info!(role, policy = %arn, "attached policy");
        changed = true;
    }
    for arn in attached.difference(&declared) {
        ctx.cloud
            .detach_policy(role, arn)
            .await
            .context(format!("detach {} from {}", arn, role))?;
        tracing::info!(role, policy = %arn, "detached undeclared policy");
        changed = true;
    }
    Ok(changed)
}

async fn sync_inline_policy(
    ctx: &Context<'_>,
    names: &ResourceNames,
    declared: Option<&Value>,
) -> Result<bool> {
    let role = &names.execution_role;
    let policy = &names.inline_policy;
    let current = ctx
        .cloud
        .inline_policy(role, policy)
        .await
        .context(format!("get inline policy {}", policy))?;

    match (declared.map(normalize_inline_policy), current) {
        (Some(desired), Some(current)) if desired == current => Ok(false),
        (Some(desired), _) => {
            ctx.cloud
                .put_inline_policy(role, policy, &desired.to_string())
                .await
                .context(format!("put inline policy {}", policy))?;
            tracing::info!(role = %role, policy = %policy, "updated inline policy");
            Ok(true)
        }
        (None, Some(_)) => {
            ctx.cloud
                .delete_inline_policy(role, policy)
                .await
                .context(format!("delete inline policy {}", policy))?;
            tracing::info!(role = %role, policy = %policy, "removed undeclared inline policy");
            Ok(true)
        }
        (None, None) => Ok(false),
    }
}
