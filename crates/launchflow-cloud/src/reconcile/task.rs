//! Task definition revisions
//!
//! Revisions are immutable, so every deploy registers a new one and points
//! the service at it.

use super::Context;
use crate::action::ActionType;
use crate::error::{GatewayResultExt, Result};
use crate::gateway::TaskDefinitionSpec;
use crate::handle::ResourceHandle;
use crate::model::{DesiredState, ResourceKind};

pub fn task_definition_spec(
    desired: &DesiredState,
    execution_role_arn: &str,
    image: &str,
) -> TaskDefinitionSpec {
    let names = desired.names();
    TaskDefinitionSpec {
        family: names.task_family,
        container_name: names.container,
        image: image.to_string(),
        cpu: desired.sizing.cpu.clone(),
        memory: desired.sizing.memory.clone(),
        ephemeral_storage_gib: desired.sizing.ephemeral_storage_request(),
        execution_role_arn: execution_role_arn.to_string(),
        environment: desired.environment.clone(),
        port: desired.port,
        log_group: names.log_group,
        log_region: desired.region.clone(),
    }
}

/// Register a new revision of `{app}-task`.
///
/// The first revision of a family counts as a creation and is gated like any
/// other; later ones are reported as updates.
pub async fn register_task_definition(
    ctx: &Context<'_>,
    desired: &DesiredState,
    execution_role_arn: &str,
    image: &str,
) -> Result<ResourceHandle> {
    let spec = task_definition_spec(desired, execution_role_arn, image);

    let revisions = ctx
        .cloud
        .task_definitions(&spec.family)
        .await
        .context(format!("list revisions of {}", spec.family))?;
    let action = if revisions.is_empty() {
        ctx.require_create(ResourceKind::TaskDefinition, &spec.family)?;
        ActionType::Create
    } else {
        ActionType::Update
    };

    let arn = ctx
        .cloud
        .register_task_definition(&spec)
        .await
        .context(format!("register task definition {}", spec.family))?;
    tracing::info!(%arn, image, "registered task definition");

    Ok(ctx.finish(
        &spec.family,
        ResourceHandle::bare(ResourceKind::TaskDefinition, arn, action),
    ))
}
