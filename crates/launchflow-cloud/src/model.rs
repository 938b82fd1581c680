//! Deployment intent and deterministic resource naming

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Region where CloudFront certificates must be issued.
pub const CERTIFICATE_REGION: &str = "us-east-1";

/// Managed policies attached to the execution role when none are declared.
pub const DEFAULT_MANAGED_POLICIES: [&str; 3] = [
    "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy",
    "arn:aws:iam::aws:policy/AmazonSQSFullAccess",
    "arn:aws:iam::aws:policy/AmazonS3FullAccess",
];

/// Target platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Fargate,
    #[serde(rename = "s3")]
    StaticSite,
    Fly,
    Vercel,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Fargate => write!(f, "fargate"),
            Platform::StaticSite => write!(f, "s3"),
            Platform::Fly => write!(f, "fly"),
            Platform::Vercel => write!(f, "vercel"),
        }
    }
}

/// How the application is exposed to the internet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExposureMode {
    /// Domain points straight at the task's public IP. Single replica only.
    Lightweight,
    /// Domain → CDN → load balancer → service.
    Production,
}

impl std::fmt::Display for ExposureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExposureMode::Lightweight => write!(f, "lightweight"),
            ExposureMode::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicExposure {
    pub domain: String,
    pub mode: ExposureMode,
    /// Pre-existing ACM certificate id (the trailing part of the ARN)
    pub certificate_id: Option<String>,
}

/// Fargate capacity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityProvider {
    Fargate,
    FargateSpot,
}

impl CapacityProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapacityProvider::Fargate => "FARGATE",
            CapacityProvider::FargateSpot => "FARGATE_SPOT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "FARGATE" => Some(CapacityProvider::Fargate),
            "FARGATE_SPOT" => Some(CapacityProvider::FargateSpot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeSizing {
    /// CPU units, e.g. "256"
    pub cpu: String,
    /// Memory in MiB, e.g. "512"
    pub memory: String,
    pub ephemeral_storage_gib: u32,
    pub replicas: u32,
    pub spot: bool,
}

impl ComputeSizing {
    pub fn capacity_provider(&self) -> CapacityProvider {
        if self.spot {
            CapacityProvider::FargateSpot
        } else {
            CapacityProvider::Fargate
        }
    }

    /// Ephemeral storage to request, if any.
    ///
    /// Fargate provides 20 GiB without asking; values below that are not sent
    /// and anything above 200 GiB is capped.
    pub fn ephemeral_storage_request(&self) -> Option<u32> {
        if self.ephemeral_storage_gib >= 20 {
            Some(self.ephemeral_storage_gib.min(200))
        } else {
            None
        }
    }
}

/// IAM policies the execution role must carry, exactly.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IamPolicySet {
    pub managed: Vec<String>,
    pub inline: Option<serde_json::Value>,
}

impl IamPolicySet {
    pub fn with_defaults() -> Self {
        Self {
            managed: DEFAULT_MANAGED_POLICIES.iter().map(|p| p.to_string()).collect(),
            inline: None,
        }
    }
}

/// Where the container image comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Build from a Dockerfile in `context` and push to the app registry
    Build { dockerfile: String, context: PathBuf },
    /// Use an image that already exists
    Prebuilt(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticSite {
    pub folder: PathBuf,
    pub bucket_name: String,
}

/// Fully resolved deployment intent for one application.
///
/// Built once per run and never mutated; outputs of earlier stages travel
/// through resource handles instead.
#[derive(Debug, Clone)]
pub struct DesiredState {
    pub app_name: String,
    pub service_name: String,
    pub region: String,
    pub account_id: String,
    pub platform: Platform,
    pub sizing: ComputeSizing,
    pub port: u16,
    pub health_check_path: String,
    pub image: ImageSource,
    pub environment: BTreeMap<String, String>,
    pub iam: IamPolicySet,
    pub public: Option<PublicExposure>,
    pub static_site: Option<StaticSite>,
    pub allow_create: bool,
}

impl DesiredState {
    pub fn names(&self) -> ResourceNames {
        ResourceNames::for_app(&self.app_name)
    }

    pub fn exposure(&self) -> Option<ExposureMode> {
        self.public.as_ref().map(|p| p.mode)
    }

    pub fn domain(&self) -> Option<&str> {
        self.public.as_ref().map(|p| p.domain.as_str())
    }
}

/// Names derived from the app name. Lookups rely on these being stable
/// across runs, so nothing here may involve randomness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    pub app: String,
    pub security_group: String,
    pub alb_security_group: String,
    pub load_balancer: String,
    pub target_group: String,
    pub cluster: String,
    pub task_family: String,
    pub container: String,
    pub repository: String,
    pub log_group: String,
    pub execution_role: String,
    pub inline_policy: String,
    pub events_log_group: String,
    pub event_rule: String,
    pub event_target: String,
    pub event_log_policy: String,
}

impl ResourceNames {
    pub fn for_app(app: &str) -> Self {
        let cluster = format!("{}-cluster", app);
        Self {
            app: app.to_string(),
            security_group: format!("{}-sg", app),
            alb_security_group: format!("{}-alb-sg", app),
            load_balancer: format!("{}-alb", app),
            target_group: format!("{}-tg", app),
            task_family: format!("{}-task", app),
            container: app.to_string(),
            repository: app.to_lowercase(),
            log_group: format!("/ecs/{}", app),
            execution_role: "ecsTaskExecutionRole".to_string(),
            inline_policy: "CustomResourcePermissions".to_string(),
            events_log_group: format!("/aws/ecs/events/{}", cluster),
            event_rule: format!("ecs-event-capture-{}", cluster),
            event_target: format!("ecs-events-{}", cluster),
            event_log_policy: format!("EventBridge-{}", cluster),
            cluster,
        }
    }
}

/// Derive the default static-site bucket name for an app.
///
/// Lowercases, maps `_` to `-`, drops characters S3 rejects, trims leading
/// and trailing separators and clamps to 63 characters.
pub fn default_bucket_name(app: &str) -> String {
    let raw = format!("{}-static-site", app).to_lowercase().replace('_', "-");
    let filtered: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '.')
        .collect();
    let mut name = filtered.trim_matches(|c| c == '-' || c == '.').to_string();
    if name.len() > 63 {
        name.truncate(63);
        name = name.trim_end_matches(['-', '.']).to_string();
    }
    while name.len() < 3 {
        name.push('0');
    }
    name
}

/// Check a user-supplied bucket name against the S3 naming rules.
pub fn validate_bucket_name(name: &str) -> std::result::Result<(), String> {
    if name.len() < 3 || name.len() > 63 {
        return Err("must be between 3 and 63 characters long".to_string());
    }
    if name.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("must be lowercase".to_string());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return Err("may only contain lowercase letters, numbers, dots and hyphens".to_string());
    }
    if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
        return Err("must start and end with a letter or number".to_string());
    }
    Ok(())
}

/// Kinds of remote resources the engine manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    SecurityGroup,
    IamRole,
    LogSink,
    Registry,
    Cluster,
    EventCapture,
    TaskDefinition,
    AlbSecurityGroup,
    LoadBalancer,
    TargetGroup,
    Listener,
    HostedZone,
    Certificate,
    Distribution,
    DnsRecord,
    Service,
    Bucket,
}

impl ResourceKind {
    /// Resources that teardown deliberately leaves in place.
    pub fn retained_on_teardown(&self) -> bool {
        matches!(
            self,
            ResourceKind::IamRole
                | ResourceKind::LogSink
                | ResourceKind::EventCapture
                | ResourceKind::Certificate
                | ResourceKind::HostedZone
        )
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResourceKind::SecurityGroup => "security group",
            ResourceKind::IamRole => "IAM role",
            ResourceKind::LogSink => "log group",
            ResourceKind::Registry => "image repository",
            ResourceKind::Cluster => "ECS cluster",
            ResourceKind::EventCapture => "event capture rule",
            ResourceKind::TaskDefinition => "task definition",
            ResourceKind::AlbSecurityGroup => "ALB security group",
            ResourceKind::LoadBalancer => "load balancer",
            ResourceKind::TargetGroup => "target group",
            ResourceKind::Listener => "listener",
            ResourceKind::HostedZone => "hosted zone",
            ResourceKind::Certificate => "certificate",
            ResourceKind::Distribution => "CloudFront distribution",
            ResourceKind::DnsRecord => "DNS record",
            ResourceKind::Service => "ECS service",
            ResourceKind::Bucket => "S3 bucket",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_deterministic() {
        let names = ResourceNames::for_app("Demo");
        assert_eq!(names.security_group, "Demo-sg");
        assert_eq!(names.load_balancer, "Demo-alb");
        assert_eq!(names.target_group, "Demo-tg");
        assert_eq!(names.repository, "demo");
        assert_eq!(names.log_group, "/ecs/Demo");
        assert_eq!(names.event_rule, "ecs-event-capture-Demo-cluster");
        assert_eq!(names, ResourceNames::for_app("Demo"));
    }

    #[test]
    fn test_ephemeral_storage_request() {
        let mut sizing = ComputeSizing {
            cpu: "256".into(),
            memory: "512".into(),
            ephemeral_storage_gib: 10,
            replicas: 1,
            spot: true,
        };
        assert_eq!(sizing.ephemeral_storage_request(), None);
        sizing.ephemeral_storage_gib = 21;
        assert_eq!(sizing.ephemeral_storage_request(), Some(21));
        sizing.ephemeral_storage_gib = 500;
        assert_eq!(sizing.ephemeral_storage_request(), Some(200));
    }

    #[test]
    fn test_default_bucket_name() {
        assert_eq!(default_bucket_name("My_App"), "my-app-static-site");
        assert_eq!(default_bucket_name("-x!"), "x-static-site");
        let long = "a".repeat(80);
        assert_eq!(default_bucket_name(&long).len(), 63);
    }

    #[test]
    fn test_validate_bucket_name() {
        assert!(validate_bucket_name("my-site.example").is_ok());
        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name("My-Site").is_err());
        assert!(validate_bucket_name("-site").is_err());
        assert!(validate_bucket_name("site_1").is_err());
    }

    #[test]
    fn test_retained_kinds() {
        assert!(ResourceKind::LogSink.retained_on_teardown());
        assert!(ResourceKind::Certificate.retained_on_teardown());
        assert!(!ResourceKind::Distribution.retained_on_teardown());
    }
}
