//! Fixed deployment topologies
//!
//! A topology is selected from (platform, exposure mode) and fixes which
//! resource kinds take part and in what order. Teardown walks the same list
//! backwards.

use crate::model::{ExposureMode, Platform, ResourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentTopology {
    /// Fargate service without a public domain
    FargatePrivate,
    /// Domain → task public IP
    FargateLightweight,
    /// Domain → CloudFront → ALB → Fargate
    FargateProduction,
    /// Bucket website only
    StaticSite,
    /// Domain → CloudFront → S3
    StaticSitePublic,
}

use ResourceKind::*;

const FARGATE_PRIVATE: &[ResourceKind] = &[
    SecurityGroup,
    IamRole,
    LogSink,
    Registry,
    Cluster,
    EventCapture,
    TaskDefinition,
    Service,
];

const FARGATE_LIGHTWEIGHT: &[ResourceKind] = &[
    SecurityGroup,
    IamRole,
    LogSink,
    Registry,
    Cluster,
    EventCapture,
    TaskDefinition,
    Service,
    HostedZone,
    DnsRecord,
];

const FARGATE_PRODUCTION: &[ResourceKind] = &[
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
];

const STATIC_SITE: &[ResourceKind] = &[Bucket];

const STATIC_SITE_PUBLIC: &[ResourceKind] =
    &[Bucket, HostedZone, Certificate, Distribution, DnsRecord];

/// Progress stages shown to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Network,
    Identity,
    Logging,
    Image,
    Cluster,
    TaskDefinition,
    Edge,
    Service,
    Health,
    Endpoint,
    Bucket,
    Upload,
    Invalidation,
    Smoke,
}

impl Stage {
    pub fn title(&self) -> &'static str {
        match self {
            Stage::Network => "Network and security group",
            Stage::Identity => "IAM execution role",
            Stage::Logging => "Log sink",
            Stage::Image => "Image registry and build",
            Stage::Cluster => "ECS cluster and event capture",
            Stage::TaskDefinition => "Task definition",
            Stage::Edge => "Load balancer, certificate, CDN and DNS",
            Stage::Service => "ECS service",
            Stage::Health => "Health checks and cache invalidation",
            Stage::Endpoint => "Public IP and DNS",
            Stage::Bucket => "S3 bucket",
            Stage::Upload => "Upload files",
            Stage::Invalidation => "CDN cache invalidation",
            Stage::Smoke => "Smoke test",
        }
    }
}

impl DeploymentTopology {
    /// `None` for platforms deployed by an external CLI
    pub fn select(platform: Platform, exposure: Option<ExposureMode>) -> Option<Self> {
        match (platform, exposure) {
            (Platform::Fargate, None) => Some(Self::FargatePrivate),
            (Platform::Fargate, Some(ExposureMode::Lightweight)) => Some(Self::FargateLightweight),
            (Platform::Fargate, Some(ExposureMode::Production)) => Some(Self::FargateProduction),
            (Platform::StaticSite, None) => Some(Self::StaticSite),
            (Platform::StaticSite, Some(_)) => Some(Self::StaticSitePublic),
            (Platform::Fly, _) | (Platform::Vercel, _) => None,
        }
    }

    pub fn deploy_order(&self) -> &'static [ResourceKind] {
        match self {
            Self::FargatePrivate => FARGATE_PRIVATE,
            Self::FargateLightweight => FARGATE_LIGHTWEIGHT,
            Self::FargateProduction => FARGATE_PRODUCTION,
            Self::StaticSite => STATIC_SITE,
            Self::StaticSitePublic => STATIC_SITE_PUBLIC,
        }
    }

    /// Reverse of [`deploy_order`](Self::deploy_order) minus retained kinds
    pub fn teardown_order(&self) -> Vec<ResourceKind> {
        self.deploy_order()
            .iter()
            .rev()
            .copied()
            .filter(|kind| !kind.retained_on_teardown())
            .collect()
    }

    /// Kinds deliberately left behind by teardown
    pub fn retained(&self) -> Vec<ResourceKind> {
        self.deploy_order()
            .iter()
            .copied()
            .filter(ResourceKind::retained_on_teardown)
            .collect()
    }

    pub fn is_public(&self) -> bool {
        matches!(
            self,
            Self::FargateLightweight | Self::FargateProduction | Self::StaticSitePublic
        )
    }

    pub fn stages(&self) -> Vec<Stage> {
        match self {
            Self::FargatePrivate => vec![
                Stage::Network,
                Stage::Identity,
                Stage::Logging,
                Stage::Image,
                Stage::Cluster,
                Stage::TaskDefinition,
                Stage::Service,
            ],
            Self::FargateLightweight => vec![
                Stage::Network,
                Stage::Identity,
                Stage::Logging,
                Stage::Image,
                Stage::Cluster,
                Stage::TaskDefinition,
                Stage::Service,
                Stage::Endpoint,
                Stage::Smoke,
            ],
            Self::FargateProduction => vec![
                Stage::Network,
                Stage::Identity,
                Stage::Logging,
                Stage::Image,
                Stage::Cluster,
                Stage::TaskDefinition,
                Stage::Edge,
                Stage::Service,
                Stage::Health,
                Stage::Smoke,
            ],
            Self::StaticSite => vec![Stage::Bucket, Stage::Upload],
            Self::StaticSitePublic => vec![
                Stage::Bucket,
                Stage::Upload,
                Stage::Edge,
                Stage::Invalidation,
                Stage::Smoke,
            ],
        }
    }
}
