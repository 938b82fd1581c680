//! TLS certificates for the CDN
//!
//! Lookup scans every certificate in the certificate region: an exact domain
//! match wins, otherwise a wildcard whose parent covers the domain. New
//! requests for subdomains ask for the parent wildcard so later subdomains
//! can share it.

use super::Context;
use crate::action::ActionType;
use crate::error::{CloudError, GatewayError, GatewayResultExt, Result};
use crate::gateway::{CertificateDetail, CertificateStatus, CertificateSummary, ValidationRecord};
use crate::handle::{CertificateAttrs, ResourceHandle};
use crate::model::{CERTIFICATE_REGION, ResourceKind};
use crate::waiter::{ConvergenceTarget, WaitOutcome, await_terminal};
use md5::{Digest, Md5};

/// `*.parent` for a domain with more than two labels
pub fn wildcard_for(domain: &str) -> Option<String> {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() > 2 {
        Some(format!("*.{}", labels[1..].join(".")))
    } else {
        None
    }
}

/// Domain a new certificate is requested for
pub fn request_domain(domain: &str) -> String {
    wildcard_for(domain).unwrap_or_else(|| domain.to_string())
}

/// Whether the certificate name `name` serves `domain`
pub fn covers(name: &str, domain: &str) -> bool {
    if name.eq_ignore_ascii_case(domain) {
        return true;
    }
    match (name.strip_prefix("*."), domain.split_once('.')) {
        (Some(parent), Some((_, domain_parent))) => parent.eq_ignore_ascii_case(domain_parent),
        _ => false,
    }
}

/// ARN of a certificate given by id
pub fn certificate_arn(account_id: &str, certificate_id: &str) -> String {
    format!(
        "arn:aws:acm:{}:{}:certificate/{}",
        CERTIFICATE_REGION, account_id, certificate_id
    )
}

/// ACM idempotency tokens are at most 32 alphanumeric characters; the MD5
/// of the requested name keeps `*.example.com` and `example.com` apart.
fn idempotency_token(requested: &str) -> String {
    hex::encode(Md5::digest(requested.to_ascii_lowercase().as_bytes()))
}

fn names_of(cert: &CertificateSummary) -> impl Iterator<Item = &str> {
    std::iter::once(cert.domain_name.as_str())
        .chain(cert.subject_alternative_names.iter().map(String::as_str))
}

/// Find a usable certificate for `domain`, exact matches first.
pub async fn find_certificate(
    ctx: &Context<'_>,
    domain: &str,
) -> Result<Option<CertificateSummary>> {
    let certificates: Vec<CertificateSummary> = ctx
        .cloud
        .list_certificates()
        .await
        .context("list certificates")?
        .into_iter()
        .filter(|c| c.status.is_usable())
        .collect();

    let exact = certificates
        .iter()
        .find(|c| names_of(c).any(|n| n.eq_ignore_ascii_case(domain)));
    if let Some(cert) = exact {
        tracing::debug!(arn = %cert.arn, "exact certificate match");
        return Ok(Some(cert.clone()));
    }

    let wildcard = certificates
        .iter()
        .find(|c| names_of(c).any(|n| n.starts_with("*.") && covers(n, domain)));
    if let Some(cert) = wildcard {
        tracing::debug!(arn = %cert.arn, "wildcard certificate match");
    }
    Ok(wildcard.cloned())
}

/// Reuse or request a DNS-validated certificate for `domain`.
///
/// The handle carries the validation records not yet satisfied.
pub async fn ensure_certificate(
    ctx: &Context<'_>,
    domain: &str,
) -> Result<ResourceHandle<CertificateAttrs>> {
    if let Some(cert) = find_certificate(ctx, domain).await? {
        let issued = cert.status == CertificateStatus::Issued;
        let validation_records = if issued {
            Vec::new()
        } else {
            pending_records(ctx, &cert.arn).await?
        };
        return Ok(ctx.finish(
            domain,
            ResourceHandle::new(
                ResourceKind::Certificate,
                cert.arn,
                ActionType::NoOp,
                CertificateAttrs {
                    validation_records,
                    issued,
                },
            ),
        ));
    }

    let requested = request_domain(domain);
    ctx.require_create(ResourceKind::Certificate, &requested)?;
    let arn = ctx
        .cloud
        .request_certificate(&requested, &idempotency_token(&requested))
        .await
        .context(format!("request certificate for {}", requested))?;
    tracing::info!(%arn, domain = %requested, "requested certificate");
    ctx.reporter
        .note(&format!("Requested certificate for {}", requested));

    let validation_records = pending_records(ctx, &arn).await?;
    Ok(ctx.finish(
        &requested,
        ResourceHandle::new(
            ResourceKind::Certificate,
            arn,
            ActionType::Create,
            CertificateAttrs {
                validation_records,
                issued: false,
            },
        ),
    ))
}

/// Verify a certificate given explicitly by id.
pub async fn use_existing_certificate(
    ctx: &Context<'_>,
    account_id: &str,
    certificate_id: &str,
) -> Result<ResourceHandle<CertificateAttrs>> {
    let arn = certificate_arn(account_id, certificate_id);
    let detail = describe(ctx, &arn)
        .await?
        .ok_or_else(|| CloudError::CertificateNotFound(arn.clone()))?;

    let issued = detail.status == CertificateStatus::Issued;
    if !issued {
        ctx.reporter.warn(&format!(
            "Certificate {} is {}, not ISSUED",
            certificate_id, detail.status
        ));
    }
    let validation_records = detail
        .validation_records
        .into_iter()
        .filter(|r| !r.is_satisfied())
        .collect();

    Ok(ctx.finish(
        certificate_id,
        ResourceHandle::new(
            ResourceKind::Certificate,
            arn,
            ActionType::NoOp,
            CertificateAttrs {
                validation_records,
                issued,
            },
        ),
    ))
}

/// Block until the certificate is ISSUED or FAILED, or 30 minutes pass.
pub async fn await_issued(
    ctx: &Context<'_>,
    arn: &str,
) -> Result<WaitOutcome<CertificateStatus>> {
    let target = ConvergenceTarget::certificate_issued(arn);
    ctx.reporter.wait_started(&target);
    let outcome = await_terminal(
        ctx.clock,
        &target,
        || async {
            ctx.cloud
                .describe_certificate(arn)
                .await?
                .map(|c| c.status)
                .ok_or_else(|| GatewayError::NotFound(arn.to_string()))
        },
        |status: &CertificateStatus| *status == CertificateStatus::Issued,
        |status: &CertificateStatus| *status == CertificateStatus::Failed,
    )
    .await?;
    ctx.reporter.wait_finished(&target);
    Ok(outcome)
}

async fn describe(ctx: &Context<'_>, arn: &str) -> Result<Option<CertificateDetail>> {
    ctx.cloud
        .describe_certificate(arn)
        .await
        .context(format!("describe certificate {}", arn))
}

/// Validation records that still need to be published.
///
/// Right after a request the records may not be attached yet, so this polls
/// until every domain option carries one. A timeout yields whatever was
/// there.
async fn pending_records(ctx: &Context<'_>, arn: &str) -> Result<Vec<ValidationRecord>> {
    let target = ConvergenceTarget::validation_records(arn);
    let outcome = await_terminal(
        ctx.clock,
        &target,
        || async {
            ctx.cloud
                .describe_certificate(arn)
                .await?
                .ok_or_else(|| GatewayError::NotFound(arn.to_string()))
        },
        |detail: &CertificateDetail| {
            detail.status == CertificateStatus::Issued
                || (detail.validation_options > 0
                    && detail.validation_records.len() >= detail.validation_options)
        },
        |detail: &CertificateDetail| detail.status == CertificateStatus::Failed,
    )
    .await?;

    let detail = match outcome {
        WaitOutcome::Converged(detail) => detail,
        WaitOutcome::Failed(detail) => {
            return Err(CloudError::CertificateNotIssued {
                arn: detail.arn,
                status: detail.status.to_string(),
            });
        }
        WaitOutcome::TimedOut { last, .. } => {
            ctx.reporter.warn(&format!(
                "Validation records for {} are not available yet",
                arn
            ));
            match last {
                Some(detail) => detail,
                None => return Ok(Vec::new()),
            }
        }
    };

    Ok(detail
        .validation_records
        .into_iter()
        .filter(|r| !r.is_satisfied())
        .collect())
}
