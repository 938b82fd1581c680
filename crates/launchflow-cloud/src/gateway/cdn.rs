use crate::error::GatewayResult;
use async_trait::async_trait;

/// CloudFront's hosted zone id for alias records
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

pub const PRICE_CLASS_ALL: &str = "PriceClass_All";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionSummary {
    pub id: String,
    pub domain_name: String,
    pub aliases: Vec<String>,
    /// InProgress or Deployed
    pub status: String,
    pub enabled: bool,
}

impl DistributionSummary {
    pub fn has_alias(&self, domain: &str) -> bool {
        self.aliases.iter().any(|a| a.eq_ignore_ascii_case(domain))
    }
}

/// Protocol CloudFront uses to talk to a custom origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginProtocol {
    HttpOnly,
    HttpsOnly,
    MatchViewer,
}

impl OriginProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginProtocol::HttpOnly => "http-only",
            OriginProtocol::HttpsOnly => "https-only",
            OriginProtocol::MatchViewer => "match-viewer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "http-only" => Some(OriginProtocol::HttpOnly),
            "https-only" => Some(OriginProtocol::HttpsOnly),
            "match-viewer" => Some(OriginProtocol::MatchViewer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginSpec {
    /// Load balancer or any other HTTP backend
    Custom {
        domain_name: String,
        protocol: OriginProtocol,
    },
    /// S3 REST endpoint of a bucket
    Bucket { domain_name: String },
}

impl OriginSpec {
    pub fn id(&self) -> &'static str {
        match self {
            OriginSpec::Custom { .. } => "alb-origin",
            OriginSpec::Bucket { .. } => "s3-origin",
        }
    }

    pub fn domain_name(&self) -> &str {
        match self {
            OriginSpec::Custom { domain_name, .. } | OriginSpec::Bucket { domain_name } => {
                domain_name
            }
        }
    }
}

/// Default cache behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// All methods, all headers/cookies/query strings forwarded, TTL 0
    PassThrough,
    /// GET/HEAD only, nothing forwarded, fixed TTL
    Static { ttl_seconds: i64 },
}

impl CachePolicy {
    pub fn default_ttl(&self) -> i64 {
        match self {
            CachePolicy::PassThrough => 0,
            CachePolicy::Static { ttl_seconds } => *ttl_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionSpec {
    /// Idempotency token for the create call
    pub caller_reference: String,
    pub aliases: Vec<String>,
    pub certificate_arn: Option<String>,
    pub origin: OriginSpec,
    pub cache: CachePolicy,
    pub default_root_object: Option<String>,
    pub comment: String,
}

/// Observed configuration of an existing distribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub id: String,
    pub etag: String,
    pub domain_name: String,
    pub status: String,
    pub enabled: bool,
    pub aliases: Vec<String>,
    pub certificate_arn: Option<String>,
    pub price_class: String,
    /// Protocol policy of the first custom origin, if any
    pub origin_protocol: Option<OriginProtocol>,
    pub default_ttl: Option<i64>,
}

/// Fields to change in a single update call; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionPatch {
    pub certificate_arn: Option<String>,
    pub price_class: Option<String>,
    pub origin_protocol: Option<OriginProtocol>,
    pub default_ttl: Option<i64>,
    pub enabled: Option<bool>,
}

impl DistributionPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// CloudFront
#[async_trait]
pub trait CdnGateway: Send + Sync {
    async fn list_distributions(&self) -> GatewayResult<Vec<DistributionSummary>>;

    async fn get_distribution(&self, id: &str) -> GatewayResult<Option<Distribution>>;

    async fn create_distribution(
        &self,
        spec: &DistributionSpec,
    ) -> GatewayResult<DistributionSummary>;

    /// Applies `patch` on top of the current config, guarded by `etag`
    async fn update_distribution(
        &self,
        id: &str,
        etag: &str,
        patch: &DistributionPatch,
    ) -> GatewayResult<()>;

    async fn delete_distribution(&self, id: &str, etag: &str) -> GatewayResult<()>;

    /// Returns the invalidation id
    async fn create_invalidation(
        &self,
        id: &str,
        paths: &[String],
        caller_reference: &str,
    ) -> GatewayResult<String>;
}
