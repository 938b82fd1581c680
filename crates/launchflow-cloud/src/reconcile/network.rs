//! Default VPC, subnets and security groups

use super::{Context, action_for};
use crate::error::{CloudError, GatewayError, GatewayResultExt, Result};
use crate::gateway::{IngressRule, IngressSource};
use crate::handle::{NetworkAttrs, ResourceHandle};
use crate::model::{ExposureMode, ResourceKind, ResourceNames};

/// Web ports every public-facing group accepts
const WEB_PORTS: [u16; 2] = [80, 443];

/// Ingress rules of the task security group
pub fn task_ingress(port: u16, exposure: Option<ExposureMode>) -> Vec<IngressRule> {
    let mut rules: Vec<IngressRule> = WEB_PORTS.iter().map(|p| IngressRule::from_anywhere(*p)).collect();
    if exposure == Some(ExposureMode::Lightweight) && !WEB_PORTS.contains(&port) {
        rules.push(IngressRule::from_anywhere(port));
    }
    rules
}

/// Look up the default VPC and its subnets, then ensure the task security
/// group `{app}-sg`.
pub async fn ensure_network(
    ctx: &Context<'_>,
    names: &ResourceNames,
    port: u16,
    exposure: Option<ExposureMode>,
) -> Result<ResourceHandle<NetworkAttrs>> {
    let vpc_id = ctx
        .cloud
        .default_vpc()
        .await
        .context("look up default VPC")?
        .ok_or(CloudError::NoDefaultVpc)?;

    let subnet_ids = ctx
        .cloud
        .subnets(&vpc_id)
        .await
        .context("list subnets of the default VPC")?;
    let needed = if exposure == Some(ExposureMode::Production) { 2 } else { 1 };
    if subnet_ids.len() < needed {
        return Err(CloudError::NoDefaultVpc);
    }
    tracing::debug!(vpc = %vpc_id, subnets = subnet_ids.len(), "default VPC");

    let (group_id, action) = ensure_group(
        ctx,
        ResourceKind::SecurityGroup,
        &vpc_id,
        &names.security_group,
        &format!("Security group for {}", names.app),
        &task_ingress(port, exposure),
    )
    .await?;

    Ok(ctx.finish(
        &names.security_group,
        ResourceHandle::new(
            ResourceKind::SecurityGroup,
            group_id,
            action,
            NetworkAttrs { vpc_id, subnet_ids },
        ),
    ))
}

/// Ensure the load balancer's own group `{app}-alb-sg` (80/443 from anywhere)
pub async fn ensure_alb_security_group(
    ctx: &Context<'_>,
    names: &ResourceNames,
    vpc_id: &str,
) -> Result<ResourceHandle> {
    let rules: Vec<IngressRule> = WEB_PORTS.iter().map(|p| IngressRule::from_anywhere(*p)).collect();
    let (group_id, action) = ensure_group(
        ctx,
        ResourceKind::AlbSecurityGroup,
        vpc_id,
        &names.alb_security_group,
        &format!("Load balancer security group for {}", names.app),
        &rules,
    )
    .await?;

    Ok(ctx.finish(
        &names.alb_security_group,
        ResourceHandle::bare(ResourceKind::AlbSecurityGroup, group_id, action),
    ))
}

/// Let the load balancer group reach the container port on the task group.
///
/// Returns whether a rule was added.
pub async fn allow_from_load_balancer(
    ctx: &Context<'_>,
    vpc_id: &str,
    names: &ResourceNames,
    alb_group_id: &str,
    port: u16,
) -> Result<bool> {
    let group = ctx
        .cloud
        .find_security_group(vpc_id, &names.security_group)
        .await
        .context("describe task security group")?
        .ok_or_else(|| CloudError::Provider {
            context: "describe task security group".to_string(),
            source: GatewayError::NotFound(names.security_group.clone()),
        })?;

    let rule = IngressRule::from_group(port, alb_group_id);
    if group.ingress.contains(&rule) {
        return Ok(false);
    }

    authorize(ctx, &group.id, &rule).await?;
    tracing::info!(group = %group.id, port, "allowed ingress from load balancer group");
    Ok(true)
}

/// Find or create a group, then add whichever `rules` it lacks.
async fn ensure_group(
    ctx: &Context<'_>,
    kind: ResourceKind,
    vpc_id: &str,
    name: &str,
    description: &str,
    rules: &[IngressRule],
) -> Result<(String, crate::action::ActionType)> {
    let existing = ctx
        .cloud
        .find_security_group(vpc_id, name)
        .await
        .context(format!("describe security group {}", name))?;

    let (group_id, present, created) = match existing {
        Some(group) => (group.id, group.ingress, false),
        None => {
            ctx.require_create(kind, name)?;
            let id = ctx
                .cloud
                .create_security_group(vpc_id, name, description)
                .await
                .context(format!("create security group {}", name))?;
            tracing::info!(group = %id, name, "created security group");
            (id, Vec::new(), true)
        }
    };

    let mut changed = false;
    for rule in rules.iter().filter(|r| !present.contains(r)) {
        authorize(ctx, &group_id, rule).await?;
        changed = true;
    }

    Ok((group_id, action_for(created, changed)))
}

async fn authorize(ctx: &Context<'_>, group_id: &str, rule: &IngressRule) -> Result<()> {
    match ctx.cloud.authorize_ingress(group_id, rule).await {
        Ok(()) => {
            let source = match &rule.source {
                IngressSource::Cidr(cidr) => cidr.as_str(),
                IngressSource::SecurityGroup(id) => id.as_str(),
            };
            tracing::debug!(group = group_id, port = rule.port, source, "authorized ingress");
            Ok(())
        }
        Err(e) if e.is_already_exists() => Ok(()),
        Err(e) => Err(e).context(format!("authorize ingress on {}", group_id)),
    }
}
