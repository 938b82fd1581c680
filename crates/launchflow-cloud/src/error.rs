//! Error types for gateway calls and deployment runs

use crate::model::ResourceKind;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single gateway call, tagged by kind.
///
/// Adapters produce these from provider-specific errors so reconcilers can
/// branch on the kind without inspecting error strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("dependency violation: {0}")]
    DependencyViolation(String),

    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("{operation} failed: {message}")]
    Other { operation: String, message: String },
}

impl GatewayError {
    pub fn other(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Other {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    pub fn is_dependency_violation(&self) -> bool {
        matches!(self, Self::DependencyViolation(_))
    }

    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled(_))
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Run-level errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error(
        "{kind} '{name}' does not exist and resource creation is disabled\n\nHint:\n  • Re-run with --allow-create (or set `allow_create: true`) to let launchflow create it"
    )]
    PermissionDenied { kind: ResourceKind, name: String },

    #[error("{context}: {source}")]
    Provider {
        context: String,
        source: GatewayError,
    },

    #[error("Timed out after {}s waiting for {resource}", .waited.as_secs())]
    ConvergenceTimeout { resource: String, waited: Duration },

    #[error("Teardown finished with {} warning(s); it is safe to run destroy again", .0.len())]
    PartialFailure(Vec<String>),

    #[error(
        "No default VPC found in this region\n\nHint:\n  • Create one with `aws ec2 create-default-vpc`\n  • Or deploy to a region that still has its default VPC"
    )]
    NoDefaultVpc,

    #[error(
        "No Route53 hosted zone found for '{0}'\n\nHint:\n  • Ensure the domain is managed by Route53 in this account\n  • Or re-run with --allow-create to create the hosted zone"
    )]
    HostedZoneNotFound(String),

    #[error(
        "Nameservers for '{domain}' do not point at the Route53 hosted zone\n\nHint:\n  • Set the nameservers at your registrar to: {}\n  • Delegation changes can take up to 48 hours to propagate",
        .nameservers.join(", ")
    )]
    NsDelegationRejected {
        domain: String,
        nameservers: Vec<String>,
    },

    #[error(
        "Certificate not found: {0}\n\nHint:\n  • Check certificate_id in the deploy file\n  • CloudFront certificates must be issued in us-east-1"
    )]
    CertificateNotFound(String),

    #[error("Certificate {arn} is {status}; the CDN needs an issued certificate")]
    CertificateNotIssued { arn: String, status: String },

    #[error("Invalid S3 bucket name '{name}': {reason}")]
    InvalidBucketName { name: String, reason: String },

    #[error("Image build failed: {0}")]
    ImageBuild(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<GatewayError> for CloudError {
    fn from(source: GatewayError) -> Self {
        CloudError::Provider {
            context: "provider call".to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

/// Attach a human-readable context to a gateway failure.
pub trait GatewayResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> GatewayResultExt<T> for GatewayResult<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|source| CloudError::Provider {
            context: context.into(),
            source,
        })
    }
}
