//! ECS service

use super::Context;
use crate::action::ActionType;
use crate::error::{GatewayResultExt, Result};
use crate::gateway::{LoadBalancerAttachment, ServiceSpec};
use crate::handle::{ResourceHandle, ServiceAttrs};
use crate::model::{DesiredState, ResourceKind};

/// Ensure the service runs `task_definition_arn`.
///
/// An existing service is always updated so a new image rolls out; an
/// INACTIVE or DRAINING one is treated as absent. A changed load balancer
/// attachment is logged and applied.
pub async fn ensure_service(
    ctx: &Context<'_>,
    desired: &DesiredState,
    task_definition_arn: &str,
    subnets: &[String],
    security_groups: Vec<String>,
    load_balancer: Option<LoadBalancerAttachment>,
) -> Result<ResourceHandle<ServiceAttrs>> {
    let names = desired.names();
    let spec = ServiceSpec {
        cluster: names.cluster.clone(),
        name: desired.service_name.clone(),
        task_definition_arn: task_definition_arn.to_string(),
        desired_count: desired.sizing.replicas,
        capacity_provider: desired.sizing.capacity_provider(),
        subnets: subnets.to_vec(),
        security_groups,
        load_balancer,
    };

    let existing = ctx
        .cloud
        .find_service(&spec.cluster, &spec.name)
        .await
        .context(format!("describe service {}", spec.name))?
        .filter(|s| s.is_active());

    let (summary, action) = match existing {
        Some(current) => {
            let wanted: Vec<LoadBalancerAttachment> = spec.load_balancer.iter().cloned().collect();
            if current.load_balancers != wanted {
                tracing::info!(
                    service = %spec.name,
                    from = current.load_balancers.len(),
                    to = wanted.len(),
                    "load balancer attachment changes"
                );
                ctx.reporter.note(&format!(
                    "Load balancer attachment of {} changes with this deploy",
                    spec.name
                ));
            }
            let summary = ctx
                .cloud
                .update_service(&spec)
                .await
                .context(format!("update service {}", spec.name))?;
            tracing::info!(service = %spec.name, replicas = spec.desired_count, "updated service");
            (summary, ActionType::Update)
        }
        None => {
            ctx.require_create(ResourceKind::Service, &spec.name)?;
            let summary = ctx
                .cloud
                .create_service(&spec)
                .await
                .context(format!("create service {}", spec.name))?;
            tracing::info!(
                service = %spec.name,
                capacity = spec.capacity_provider.as_str(),
                "created service"
            );
            (summary, ActionType::Create)
        }
    };

    Ok(ctx.finish(
        &spec.name,
        ResourceHandle::new(
            ResourceKind::Service,
            summary.arn,
            action,
            ServiceAttrs {
                cluster: spec.cluster,
                desired_count: spec.desired_count,
            },
        ),
    ))
}
