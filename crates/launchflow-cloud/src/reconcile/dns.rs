//! Route53 zones, records and the nameserver delegation gate

use super::{Context, epoch_seconds};
use crate::action::ActionType;
use crate::error::{CloudError, GatewayResultExt, Result};
use crate::gateway::{
    CLOUDFRONT_HOSTED_ZONE_ID, ChangeAction, HostedZone, PublicResolver, RecordSet, RecordTarget,
    RecordType, ValidationRecord,
};
use crate::handle::{ResourceHandle, ZoneAttrs};
use crate::model::ResourceKind;
use crate::reporter::{Confirm, Prompt};
use std::collections::BTreeSet;

/// TTL of A records pointing at a task's public IP
pub const ADDRESS_TTL: i64 = 60;

pub const VALIDATION_TTL: i64 = 300;

/// Name with exactly one trailing dot
pub fn fqdn(name: &str) -> String {
    format!("{}.", name.trim_end_matches('.'))
}

fn normalize(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

/// Record name of `domain` relative to `zone`; the full domain for the apex
pub fn relative_name(domain: &str, zone: &str) -> String {
    let domain = normalize(domain);
    let zone = normalize(zone);
    match domain.strip_suffix(&zone).and_then(|s| s.strip_suffix('.')) {
        Some(prefix) if !prefix.is_empty() => prefix.to_string(),
        _ => domain,
    }
}

/// Last two labels of `domain`
pub fn registrable_parent(domain: &str) -> String {
    let labels: Vec<&str> = domain.trim_end_matches('.').split('.').collect();
    let start = labels.len().saturating_sub(2);
    labels[start..].join(".")
}

/// Compare nameserver sets ignoring case and trailing dots
pub fn same_nameservers(a: &[String], b: &[String]) -> bool {
    let a: BTreeSet<String> = a.iter().map(|n| normalize(n)).collect();
    let b: BTreeSet<String> = b.iter().map(|n| normalize(n)).collect();
    !a.is_empty() && a == b
}

/// Find the most specific registered zone containing `domain`.
///
/// Walks the label suffixes from most to least specific, so both apex and
/// subdomain cases resolve without configuration.
pub async fn find_hosted_zone(
    ctx: &Context<'_>,
    domain: &str,
) -> Result<Option<ResourceHandle<ZoneAttrs>>> {
    let domain = normalize(domain);
    let labels: Vec<&str> = domain.split('.').collect();

    for start in 0..labels.len().saturating_sub(1) {
        let candidate = labels[start..].join(".");
        let zone = ctx
            .cloud
            .find_hosted_zone(&candidate)
            .await
            .context(format!("look up hosted zone {}", candidate))?;
        if let Some(zone) = zone {
            tracing::debug!(zone = %zone.name, domain = %domain, "resolved hosted zone");
            return Ok(Some(zone_handle(zone, &domain, ActionType::NoOp, false)));
        }
    }
    Ok(None)
}

fn zone_handle(
    zone: HostedZone,
    domain: &str,
    action: ActionType,
    fresh: bool,
) -> ResourceHandle<ZoneAttrs> {
    let record_name = relative_name(domain, &zone.name);
    ResourceHandle::new(
        ResourceKind::HostedZone,
        zone.id,
        action,
        ZoneAttrs {
            zone_name: zone.name,
            record_name,
            fresh,
        },
    )
}

/// Resolve (or create) the zone for `domain` and make sure the internet
/// actually delegates to it before anything is written there.
///
/// A nameserver mismatch asks the operator; with `assume_yes` it only warns.
/// A failed public lookup counts as a mismatch.
pub async fn ensure_domain_ready_for_dns(
    ctx: &Context<'_>,
    resolver: &dyn PublicResolver,
    confirm: &dyn Confirm,
    domain: &str,
    assume_yes: bool,
) -> Result<ResourceHandle<ZoneAttrs>> {
    let zone = match find_hosted_zone(ctx, domain).await? {
        Some(handle) => handle,
        None if ctx.allow_create => {
            let parent = registrable_parent(domain);
            let reference = format!("{}-{}", parent, epoch_seconds());
            let zone = ctx
                .cloud
                .create_hosted_zone(&parent, &reference)
                .await
                .context(format!("create hosted zone {}", parent))?;
            tracing::info!(zone = %zone.id, name = %zone.name, "created hosted zone");
            zone_handle(zone, domain, ActionType::Create, true)
        }
        None => return Err(CloudError::HostedZoneNotFound(domain.to_string())),
    };

    let hosted = HostedZone {
        id: zone.id.clone(),
        name: zone.attrs.zone_name.clone(),
    };
    let expected = ctx
        .cloud
        .zone_nameservers(&hosted)
        .await
        .context(format!("get nameservers of zone {}", hosted.name))?;
    let public = match resolver.nameservers(&hosted.name).await {
        Ok(nameservers) => nameservers,
        Err(e) => {
            tracing::warn!(zone = %hosted.name, "public NS lookup failed: {}", e);
            Vec::new()
        }
    };

    if same_nameservers(&expected, &public) {
        tracing::debug!(zone = %hosted.name, "nameserver delegation verified");
    } else {
        let public_list = if public.is_empty() {
            "(none found)".to_string()
        } else {
            public.join(", ")
        };
        let message = format!(
            "Nameservers for {} do not point at the Route53 zone yet",
            hosted.name
        );
        if assume_yes {
            ctx.reporter.warn(&format!(
                "{} (Route53: {}; public: {}). DNS validation may stall until the registrar is updated",
                message,
                expected.join(", "),
                public_list
            ));
        } else {
            let prompt = Prompt::new(format!("{}. Continue anyway?", message))
                .detail(format!("Route53 zone: {}", expected.join(", ")))
                .detail(format!("Public DNS:   {}", public_list));
            if !confirm.confirm(&prompt) {
                return Err(CloudError::NsDelegationRejected {
                    domain: hosted.name,
                    nameservers: expected,
                });
            }
        }
    }

    let name = zone.attrs.zone_name.clone();
    Ok(ctx.finish(&name, zone))
}

/// Point `domain` at a CloudFront distribution with an alias A record
pub async fn upsert_cdn_alias(
    ctx: &Context<'_>,
    zone_id: &str,
    domain: &str,
    cdn_domain: &str,
) -> Result<ResourceHandle> {
    let record = RecordSet {
        name: fqdn(domain),
        record_type: RecordType::A,
        target: RecordTarget::Alias {
            dns_name: fqdn(cdn_domain),
            hosted_zone_id: CLOUDFRONT_HOSTED_ZONE_ID.to_string(),
        },
    };
    upsert_record(ctx, zone_id, record).await
}

/// Point `domain` straight at an IPv4 address
pub async fn upsert_address(
    ctx: &Context<'_>,
    zone_id: &str,
    domain: &str,
    ip: &str,
) -> Result<ResourceHandle> {
    let record = RecordSet {
        name: fqdn(domain),
        record_type: RecordType::A,
        target: RecordTarget::Values {
            ttl: ADDRESS_TTL,
            values: vec![ip.to_string()],
        },
    };
    upsert_record(ctx, zone_id, record).await
}

fn same_record(a: &RecordSet, b: &RecordSet) -> bool {
    if normalize(&a.name) != normalize(&b.name) || a.record_type != b.record_type {
        return false;
    }
    match (&a.target, &b.target) {
        (
            RecordTarget::Alias {
                dns_name: a_name,
                hosted_zone_id: a_zone,
            },
            RecordTarget::Alias {
                dns_name: b_name,
                hosted_zone_id: b_zone,
            },
        ) => normalize(a_name) == normalize(b_name) && a_zone == b_zone,
        (a, b) => a == b,
    }
}

/// Write `record` unless an identical one is already there.
///
/// Overwriting a different existing record needs `allow_create`, which keeps
/// a deploy from silently hijacking a name in use elsewhere.
async fn upsert_record(
    ctx: &Context<'_>,
    zone_id: &str,
    record: RecordSet,
) -> Result<ResourceHandle> {
    let label = normalize(&record.name);
    let existing = ctx
        .cloud
        .find_record(zone_id, &record.name, record.record_type)
        .await
        .context(format!("look up record {}", label))?;

    let (change, action) = match existing {
        Some(current) if same_record(&current, &record) => {
            return Ok(ctx.finish(
                &label,
                ResourceHandle::bare(ResourceKind::DnsRecord, record.name, ActionType::NoOp),
            ));
        }
        Some(_) => {
            ctx.require_create(ResourceKind::DnsRecord, &label)?;
            (ChangeAction::Upsert, ActionType::Update)
        }
        None => {
            ctx.require_create(ResourceKind::DnsRecord, &label)?;
            (ChangeAction::Create, ActionType::Create)
        }
    };

    ctx.cloud
        .change_record(zone_id, change, &record)
        .await
        .context(format!("write record {}", label))?;
    tracing::info!(record = %label, ?change, "changed DNS record");

    Ok(ctx.finish(
        &label,
        ResourceHandle::bare(ResourceKind::DnsRecord, record.name, action),
    ))
}

/// Publish a certificate challenge record in the zone that holds its name.
///
/// The record may belong to a parent of the deployed domain's zone (a
/// wildcard request for `*.example.com` when `app.example.com` is delegated
/// separately), so the zone is resolved per record. `None` when no
/// registered zone contains the name.
pub async fn ensure_validation_record(
    ctx: &Context<'_>,
    validation: &ValidationRecord,
) -> Result<Option<ResourceHandle>> {
    let Some(zone) = find_hosted_zone(ctx, &validation.name).await? else {
        tracing::warn!(record = %validation.name, "no hosted zone for validation record");
        return Ok(None);
    };

    let record_type = RecordType::parse(&validation.record_type).unwrap_or(RecordType::Cname);
    let record = RecordSet {
        name: fqdn(&validation.name),
        record_type,
        target: RecordTarget::Values {
            ttl: VALIDATION_TTL,
            values: vec![validation.value.clone()],
        },
    };
    let label = normalize(&record.name);

    let existing = ctx
        .cloud
        .find_record(&zone.id, &record.name, record_type)
        .await
        .context(format!("look up validation record {}", label))?;
    if existing.is_some() {
        return Ok(Some(ctx.finish(
            &label,
            ResourceHandle::bare(ResourceKind::DnsRecord, record.name, ActionType::NoOp),
        )));
    }

    ctx.require_create(ResourceKind::DnsRecord, &label)?;
    ctx.cloud
        .change_record(&zone.id, ChangeAction::Upsert, &record)
        .await
        .context(format!("write validation record {}", label))?;
    tracing::info!(
        record = %label,
        zone = %zone.attrs.zone_name,
        domain = %validation.domain,
        "published validation record"
    );

    Ok(Some(ctx.finish(
        &label,
        ResourceHandle::bare(ResourceKind::DnsRecord, record.name, ActionType::Create),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_name() {
        assert_eq!(relative_name("a.b.example.com", "example.com"), "a.b");
        assert_eq!(relative_name("app.example.com.", "example.com."), "app");
        assert_eq!(relative_name("example.com", "example.com"), "example.com");
    }

    #[test]
    fn test_registrable_parent() {
        assert_eq!(registrable_parent("a.b.example.com"), "example.com");
        assert_eq!(registrable_parent("example.com"), "example.com");
    }

    #[test]
    fn test_same_nameservers() {
        let zone = vec!["ns-1.awsdns-01.org.".to_string(), "NS-2.awsdns-02.net".to_string()];
        let public = vec!["ns-2.awsdns-02.net".to_string(), "ns-1.awsdns-01.org".to_string()];
        assert!(same_nameservers(&zone, &public));
        assert!(!same_nameservers(&zone, &public[..1]));
        assert!(!same_nameservers(&zone, &[]));
    }

    #[test]
    fn test_fqdn() {
        assert_eq!(fqdn("app.example.com"), "app.example.com.");
        assert_eq!(fqdn("app.example.com."), "app.example.com.");
    }

    #[test]
    fn test_alias_comparison_ignores_trailing_dot() {
        let desired = RecordSet {
            name: "app.example.com.".into(),
            record_type: RecordType::A,
            target: RecordTarget::Alias {
                dns_name: "d111.cloudfront.net.".into(),
                hosted_zone_id: CLOUDFRONT_HOSTED_ZONE_ID.into(),
            },
        };
        let actual = RecordSet {
            name: "app.example.com".into(),
            record_type: RecordType::A,
            target: RecordTarget::Alias {
                dns_name: "D111.cloudfront.net".into(),
                hosted_zone_id: CLOUDFRONT_HOSTED_ZONE_ID.into(),
            },
        };
        assert!(same_record(&desired, &actual));
    }
}
