//! AWS SDK implementation of the LaunchFlow cloud gateway
//!
//! [`AwsCloud`] holds one SDK client per service and implements every
//! gateway trait from `launchflow-cloud`. ACM is always addressed in
//! `us-east-1`, the only region CloudFront accepts certificates from.
//!
//! Calls are thin: each method issues one request (or one paginated list)
//! and maps failures through [`error::classify`].

mod cdn;
mod certificate;
mod compute;
mod dns;
mod error;
mod identity;
mod load_balancer;
mod logs;
mod network;
mod registry;
mod storage;

use aws_config::{BehaviorVersion, Region};
use launchflow_cloud::{CERTIFICATE_REGION, GatewayError, GatewayResult};

/// Connection options resolved from the deploy file and CLI flags
#[derive(Debug, Clone, Default)]
pub struct AwsOptions {
    /// Falls back to the SDK default chain (AWS_REGION, profile) when unset
    pub region: Option<String>,
    pub profile: Option<String>,
}

pub struct AwsCloud {
    region: String,
    ec2: aws_sdk_ec2::Client,
    iam: aws_sdk_iam::Client,
    sts: aws_sdk_sts::Client,
    logs: aws_sdk_cloudwatchlogs::Client,
    events: aws_sdk_eventbridge::Client,
    ecr: aws_sdk_ecr::Client,
    ecs: aws_sdk_ecs::Client,
    elb: aws_sdk_elasticloadbalancingv2::Client,
    acm: aws_sdk_acm::Client,
    cloudfront: aws_sdk_cloudfront::Client,
    route53: aws_sdk_route53::Client,
    s3: aws_sdk_s3::Client,
}

impl AwsCloud {
    /// Load credentials and build all service clients.
    pub async fn connect(options: &AwsOptions) -> GatewayResult<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &options.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &options.profile {
            loader = loader.profile_name(profile);
        }
        let shared = loader.load().await;

        let region = shared
            .region()
            .map(|r| r.to_string())
            .ok_or_else(|| {
                GatewayError::other(
                    "load AWS configuration",
                    "no region configured; set `region` in the deploy file, pass --region or export AWS_REGION",
                )
            })?;

        let acm = aws_sdk_acm::Client::from_conf(
            aws_sdk_acm::config::Builder::from(&shared)
                .region(Region::new(CERTIFICATE_REGION))
                .build(),
        );

        tracing::debug!(region = %region, profile = ?options.profile, "AWS clients ready");

        Ok(Self {
            region,
            ec2: aws_sdk_ec2::Client::new(&shared),
            iam: aws_sdk_iam::Client::new(&shared),
            sts: aws_sdk_sts::Client::new(&shared),
            logs: aws_sdk_cloudwatchlogs::Client::new(&shared),
            events: aws_sdk_eventbridge::Client::new(&shared),
            ecr: aws_sdk_ecr::Client::new(&shared),
            ecs: aws_sdk_ecs::Client::new(&shared),
            elb: aws_sdk_elasticloadbalancingv2::Client::new(&shared),
            acm,
            cloudfront: aws_sdk_cloudfront::Client::new(&shared),
            route53: aws_sdk_route53::Client::new(&shared),
            s3: aws_sdk_s3::Client::new(&shared),
        })
    }

    /// Region every regional client talks to
    pub fn region(&self) -> &str {
        &self.region
    }
}
