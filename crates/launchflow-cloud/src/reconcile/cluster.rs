//! ECS cluster

use super::Context;
use crate::action::ActionType;
use crate::error::{GatewayResultExt, Result};
use crate::handle::ResourceHandle;
use crate::model::{CapacityProvider, ResourceKind, ResourceNames};

/// Ensure `{app}-cluster`.
///
/// Capacity providers and enhanced insights are set on every run, whether or
/// not the cluster already existed. They are not diffed, so the handle stays
/// NoOp for an existing cluster.
pub async fn ensure_cluster(ctx: &Context<'_>, names: &ResourceNames) -> Result<ResourceHandle> {
    let name = &names.cluster;
    let existing = ctx
        .cloud
        .find_cluster(name)
        .await
        .context(format!("describe cluster {}", name))?
        .filter(|c| c.is_active());

    let (cluster, action) = match existing {
        Some(cluster) => (cluster, ActionType::NoOp),
        None => {
            ctx.require_create(ResourceKind::Cluster, name)?;
            let cluster = ctx
                .cloud
                .create_cluster(name)
                .await
                .context(format!("create cluster {}", name))?;
            tracing::info!(arn = %cluster.arn, "created cluster");
            (cluster, ActionType::Create)
        }
    };

    ctx.cloud
        .put_capacity_providers(
            name,
            &[CapacityProvider::Fargate, CapacityProvider::FargateSpot],
        )
        .await
        .context(format!("set capacity providers on {}", name))?;
    ctx.cloud
        .enable_enhanced_insights(name)
        .await
        .context(format!("enable Container Insights on {}", name))?;

    Ok(ctx.finish(
        name,
        ResourceHandle::bare(ResourceKind::Cluster, cluster.arn, action),
    ))
}
