use crate::error::GatewayResult;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateStatus {
    Issued,
    PendingValidation,
    Failed,
    Other(String),
}

impl CertificateStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "ISSUED" => CertificateStatus::Issued,
            "PENDING_VALIDATION" => CertificateStatus::PendingValidation,
            "FAILED" => CertificateStatus::Failed,
            other => CertificateStatus::Other(other.to_string()),
        }
    }

    /// Statuses that can still serve or become servable
    pub fn is_usable(&self) -> bool {
        matches!(
            self,
            CertificateStatus::Issued | CertificateStatus::PendingValidation
        )
    }
}

impl std::fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CertificateStatus::Issued => write!(f, "ISSUED"),
            CertificateStatus::PendingValidation => write!(f, "PENDING_VALIDATION"),
            CertificateStatus::Failed => write!(f, "FAILED"),
            CertificateStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    pub arn: String,
    pub domain_name: String,
    pub subject_alternative_names: Vec<String>,
    pub status: CertificateStatus,
}

/// A DNS challenge that proves control of a domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRecord {
    pub domain: String,
    pub name: String,
    pub record_type: String,
    pub value: String,
    /// SUCCESS, PENDING_VALIDATION or FAILED
    pub status: String,
}

impl ValidationRecord {
    pub fn is_satisfied(&self) -> bool {
        self.status == "SUCCESS"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateDetail {
    pub arn: String,
    pub domain_name: String,
    pub status: CertificateStatus,
    /// Options that already carry a resource record
    pub validation_records: Vec<ValidationRecord>,
    /// Number of domain validation options on the certificate
    pub validation_options: usize,
}

/// ACM in the certificate region
#[async_trait]
pub trait CertificateGateway: Send + Sync {
    async fn list_certificates(&self) -> GatewayResult<Vec<CertificateSummary>>;

    /// DNS-validated request; returns the new ARN
    async fn request_certificate(
        &self,
        domain: &str,
        idempotency_token: &str,
    ) -> GatewayResult<String>;

    async fn describe_certificate(&self, arn: &str) -> GatewayResult<Option<CertificateDetail>>;
}
