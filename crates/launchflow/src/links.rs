//! AWS console and public URLs printed after a deploy

use launchflow_cloud::{DesiredState, Platform};

/// Label and URL pairs for the deployed resources
pub fn console_links(desired: &DesiredState) -> Vec<(&'static str, String)> {
    let region = &desired.region;
    match desired.platform {
        Platform::StaticSite => desired
            .static_site
            .as_ref()
            .map(|site| {
                vec![(
                    "S3 bucket",
                    format!(
                        "https://s3.console.aws.amazon.com/s3/buckets/{}?region={}",
                        site.bucket_name, region
                    ),
                )]
            })
            .unwrap_or_default(),
        Platform::Fargate => {
            let names = desired.names();
            vec![
                (
                    "ECS cluster",
                    format!(
                        "https://{region}.console.aws.amazon.com/ecs/v2/clusters/{}/services?region={region}",
                        names.cluster
                    ),
                ),
                (
                    "ECS service",
                    format!(
                        "https://{region}.console.aws.amazon.com/ecs/v2/clusters/{}/services/{}?region={region}",
                        names.cluster, desired.service_name
                    ),
                ),
                (
                    "Logs",
                    format!(
                        "https://{region}.console.aws.amazon.com/cloudwatch/home?region={region}#logsV2:log-groups/log-group/{}",
                        escape_log_group(&names.log_group)
                    ),
                ),
            ]
        }
        Platform::Fly | Platform::Vercel => Vec::new(),
    }
}

/// The CloudWatch console double-escapes `/` in log group fragments.
fn escape_log_group(name: &str) -> String {
    name.replace('/', "$252F")
}

/// Public URLs worth opening after a deploy
pub fn public_urls(desired: &DesiredState, cdn_domain: Option<&str>) -> Vec<String> {
    let mut urls = Vec::new();
    if let Some(domain) = desired.domain() {
        urls.push(format!("https://{}", domain));
    }
    if let Some(cdn) = cdn_domain {
        urls.push(format!("https://{}", cdn));
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchflow_cloud::{
        ComputeSizing, ExposureMode, IamPolicySet, ImageSource, PublicExposure, StaticSite,
    };
    use std::collections::BTreeMap;

    fn desired(platform: Platform) -> DesiredState {
        DesiredState {
            app_name: "shop".into(),
            service_name: "shop-service".into(),
            region: "eu-west-1".into(),
            account_id: "123456789012".into(),
            platform,
            sizing: ComputeSizing {
                cpu: "256".into(),
                memory: "512".into(),
                ephemeral_storage_gib: 0,
                replicas: 1,
                spot: true,
            },
            port: 8080,
            health_check_path: "/api/health".into(),
            image: ImageSource::Prebuilt("shop:latest".into()),
            environment: BTreeMap::new(),
            iam: IamPolicySet::with_defaults(),
            public: Some(PublicExposure {
                domain: "shop.example.com".into(),
                mode: ExposureMode::Production,
                certificate_id: None,
            }),
            static_site: Some(StaticSite {
                folder: "dist".into(),
                bucket_name: "shop-static-site".into(),
            }),
            allow_create: false,
        }
    }

    #[test]
    fn test_fargate_links() {
        let links = console_links(&desired(Platform::Fargate));
        assert_eq!(links.len(), 3);
        assert!(links[1].1.contains("/clusters/shop-cluster/services/shop-service"));
        assert!(links[2].1.ends_with("log-group/$252Fecs$252Fshop"));
    }

    #[test]
    fn test_static_site_links() {
        let links = console_links(&desired(Platform::StaticSite));
        assert_eq!(
            links,
            vec![(
                "S3 bucket",
                "https://s3.console.aws.amazon.com/s3/buckets/shop-static-site?region=eu-west-1"
                    .to_string()
            )]
        );
    }

    #[test]
    fn test_public_urls() {
        let urls = public_urls(&desired(Platform::Fargate), Some("d111.cloudfront.net"));
        assert_eq!(
            urls,
            vec!["https://shop.example.com", "https://d111.cloudfront.net"]
        );
    }
}
