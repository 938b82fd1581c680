//! CloudFront distributions
//!
//! There is no lookup by name, so distributions are found by scanning for one
//! that carries the domain as an alias.

use super::{Context, epoch_seconds};
use crate::action::ActionType;
use crate::error::{GatewayError, GatewayResultExt, Result};
use crate::gateway::{
    CachePolicy, Distribution, DistributionPatch, DistributionSpec, DistributionSummary,
    OriginSpec, PRICE_CLASS_ALL,
};
use crate::handle::{DistributionAttrs, ResourceHandle};
use crate::model::ResourceKind;
use crate::waiter::{ConvergenceTarget, WaitOutcome, await_terminal};

pub const STATIC_TTL_SECONDS: i64 = 600;

pub async fn find_distribution(
    ctx: &Context<'_>,
    domain: &str,
) -> Result<Option<DistributionSummary>> {
    let distributions = ctx
        .cloud
        .list_distributions()
        .await
        .context("list CloudFront distributions")?;
    Ok(distributions.into_iter().find(|d| d.has_alias(domain)))
}

/// Fields of `current` that differ from what `spec` asks for
pub fn diff(current: &Distribution, spec: &DistributionSpec) -> DistributionPatch {
    let mut patch = DistributionPatch::default();

    if spec.certificate_arn.is_some() && current.certificate_arn != spec.certificate_arn {
        patch.certificate_arn = spec.certificate_arn.clone();
    }
    if current.price_class != PRICE_CLASS_ALL {
        patch.price_class = Some(PRICE_CLASS_ALL.to_string());
    }
    match (&spec.origin, spec.cache) {
        (OriginSpec::Custom { protocol, .. }, _) => {
            if current.origin_protocol != Some(*protocol) {
                patch.origin_protocol = Some(*protocol);
            }
        }
        (OriginSpec::Bucket { .. }, cache) => {
            if current.default_ttl != Some(cache.default_ttl()) {
                patch.default_ttl = Some(cache.default_ttl());
            }
        }
    }
    patch
}

/// Ensure a distribution aliased to `domain` in front of `origin`.
///
/// An existing one is patched in a single update when any tracked field
/// drifted: certificate, price class, and origin protocol (custom origins) or
/// default TTL (bucket origins).
pub async fn ensure_distribution(
    ctx: &Context<'_>,
    domain: &str,
    origin: OriginSpec,
    cache: CachePolicy,
    certificate_arn: Option<&str>,
) -> Result<ResourceHandle<DistributionAttrs>> {
    let spec = DistributionSpec {
        caller_reference: format!("{}-{}", domain, epoch_seconds()),
        aliases: vec![domain.to_string()],
        certificate_arn: certificate_arn.map(str::to_string),
        default_root_object: match origin {
            OriginSpec::Bucket { .. } => Some("index.html".to_string()),
            OriginSpec::Custom { .. } => None,
        },
        origin,
        cache,
        comment: format!("launchflow: {}", domain),
    };

    if let Some(summary) = find_distribution(ctx, domain).await? {
        let current = ctx
            .cloud
            .get_distribution(&summary.id)
            .await
            .context(format!("get distribution {}", summary.id))?
            .ok_or_else(|| GatewayError::NotFound(summary.id.clone()))
            .context(format!("get distribution {}", summary.id))?;

        let patch = diff(&current, &spec);
        let action = if patch.is_empty() {
            ActionType::NoOp
        } else {
            ctx.cloud
                .update_distribution(&current.id, &current.etag, &patch)
                .await
                .context(format!("update distribution {}", current.id))?;
            tracing::info!(id = %current.id, ?patch, "updated distribution");
            ActionType::Update
        };

        return Ok(ctx.finish(
            domain,
            ResourceHandle::new(
                ResourceKind::Distribution,
                current.id,
                action,
                DistributionAttrs {
                    domain_name: current.domain_name,
                },
            ),
        ));
    }

    ctx.require_create(ResourceKind::Distribution, domain)?;
    let created = ctx
        .cloud
        .create_distribution(&spec)
        .await
        .context(format!("create distribution for {}", domain))?;
    tracing::info!(id = %created.id, cdn = %created.domain_name, "created distribution");

    Ok(ctx.finish(
        domain,
        ResourceHandle::new(
            ResourceKind::Distribution,
            created.id,
            ActionType::Create,
            DistributionAttrs {
                domain_name: created.domain_name,
            },
        ),
    ))
}

/// Wait until the distribution reports Deployed; a timeout is a warning.
pub async fn await_deployed(ctx: &Context<'_>, id: &str) -> Result<bool> {
    let target = ConvergenceTarget::distribution_deployed(id);
    ctx.reporter.wait_started(&target);
    let outcome = await_terminal(
        ctx.clock,
        &target,
        || async {
            ctx.cloud
                .get_distribution(id)
                .await?
                .map(|d| d.status)
                .ok_or_else(|| GatewayError::NotFound(id.to_string()))
        },
        |status: &String| status == "Deployed",
        |_| false,
    )
    .await?;
    ctx.reporter.wait_finished(&target);

    if let WaitOutcome::TimedOut { waited, .. } = outcome {
        ctx.reporter.warn(&format!(
            "Distribution {} still deploying after {}s; edge propagation can take 15-20 minutes",
            id,
            waited.as_secs()
        ));
        return Ok(false);
    }
    Ok(true)
}

/// Invalidate every cached path; returns the invalidation id
pub async fn invalidate_all(ctx: &Context<'_>, id: &str) -> Result<String> {
    let reference = format!("invalidation-{}", epoch_seconds());
    let invalidation = ctx
        .cloud
        .create_invalidation(id, &["/*".to_string()], &reference)
        .await
        .context(format!("invalidate distribution {}", id))?;
    tracing::info!(distribution = id, %invalidation, "created invalidation");
    ctx.reporter
        .note(&format!("Invalidated /* on distribution {}", id));
    Ok(invalidation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::OriginProtocol;

    fn current() -> Distribution {
        Distribution {
            id: "E1".into(),
            etag: "ETAG".into(),
            domain_name: "d111.cloudfront.net".into(),
            status: "Deployed".into(),
            enabled: true,
            aliases: vec!["app.example.com".into()],
            certificate_arn: Some("arn:cert/old".into()),
            price_class: "PriceClass_100".into(),
            origin_protocol: Some(OriginProtocol::HttpOnly),
            default_ttl: Some(0),
        }
    }

    fn spec(origin: OriginSpec, cache: CachePolicy) -> DistributionSpec {
        DistributionSpec {
            caller_reference: "ref".into(),
            aliases: vec!["app.example.com".into()],
            certificate_arn: Some("arn:cert/new".into()),
            origin,
            cache,
            default_root_object: None,
            comment: String::new(),
        }
    }

    #[test]
    fn test_diff_custom_origin() {
        let patch = diff(
            &current(),
            &spec(
                OriginSpec::Custom {
                    domain_name: "alb".into(),
                    protocol: OriginProtocol::HttpOnly,
                },
                CachePolicy::PassThrough,
            ),
        );
        assert_eq!(patch.certificate_arn.as_deref(), Some("arn:cert/new"));
        assert_eq!(patch.price_class.as_deref(), Some(PRICE_CLASS_ALL));
        assert_eq!(patch.origin_protocol, None);
        assert_eq!(patch.default_ttl, None);
    }

    #[test]
    fn test_diff_bucket_origin_ttl() {
        let mut dist = current();
        dist.price_class = PRICE_CLASS_ALL.into();
        dist.certificate_arn = Some("arn:cert/new".into());
        let patch = diff(
            &dist,
            &spec(
                OriginSpec::Bucket {
                    domain_name: "site.s3.eu-west-1.amazonaws.com".into(),
                },
                CachePolicy::Static {
                    ttl_seconds: STATIC_TTL_SECONDS,
                },
            ),
        );
        assert_eq!(patch.default_ttl, Some(600));
        assert_eq!(patch.certificate_arn, None);
    }

    #[test]
    fn test_no_drift_means_empty_patch() {
        let mut dist = current();
        dist.price_class = PRICE_CLASS_ALL.into();
        dist.certificate_arn = Some("arn:cert/new".into());
        let patch = diff(
            &dist,
            &spec(
                OriginSpec::Custom {
                    domain_name: "alb".into(),
                    protocol: OriginProtocol::HttpOnly,
                },
                CachePolicy::PassThrough,
            ),
        );
        assert!(patch.is_empty());
    }
}
