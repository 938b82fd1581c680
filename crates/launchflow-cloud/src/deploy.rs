//! Deploy sequencer
//!
//! Runs the reconcilers of a topology strictly in order, threading the
//! handles of earlier stages into later ones. The first fatal error aborts
//! the run; convergence timeouts become warnings on the report.

use crate::action::DeployReport;
use crate::error::{CloudError, GatewayResultExt, Result};
use crate::gateway::{
    CachePolicy, CloudGateway, LoadBalancerAttachment, OriginProtocol, OriginSpec,
    PublicResolver, RegistryAuth,
};
use crate::handle::{CertificateAttrs, NetworkAttrs, ResourceHandle, ZoneAttrs};
use crate::model::{
    DesiredState, ExposureMode, ImageSource, PublicExposure, ResourceNames, validate_bucket_name,
};
use crate::reconcile::{
    Context, bucket, certificate, cluster, distribution, dns, endpoint, iam, load_balancer, logs,
    network, registry, service, task,
};
use crate::reporter::{Confirm, Reporter};
use crate::smoke::{HttpProbe, SmokeTest, run_smoke_test};
use crate::topology::{DeploymentTopology, Stage};
use crate::waiter::{Clock, WaitOutcome};
use async_trait::async_trait;
use std::path::Path;

/// Platform every image is built for
pub const IMAGE_PLATFORM: &str = "linux/amd64";

/// Container image build and push
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Build `dockerfile` in `context`; returns the local tag
    async fn build(&self, dockerfile: &str, platform: &str, context: &Path) -> Result<String>;

    /// Push `local_tag` to `remote` (repository URI plus tag); returns the
    /// pushed image URI
    async fn push(&self, local_tag: &str, remote: &str, auth: &RegistryAuth) -> Result<String>;
}

/// Stage headers numbered within the topology's stage list
struct Progress<'a> {
    reporter: &'a dyn Reporter,
    stages: Vec<Stage>,
}

impl<'a> Progress<'a> {
    fn new(reporter: &'a dyn Reporter, stages: Vec<Stage>) -> Self {
        Self { reporter, stages }
    }

    fn enter(&self, stage: Stage) {
        let index = self
            .stages
            .iter()
            .position(|s| *s == stage)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.reporter.stage(index, self.stages.len(), stage.title());
    }
}

fn track<A>(report: &mut DeployReport, handle: &ResourceHandle<A>) {
    report.record(handle.kind, handle.id.clone(), handle.action);
}

/// Outputs of the production edge stage
struct Edge {
    target_group_arn: String,
    distribution_id: String,
    cdn_domain: String,
}

/// Drives one deploy run
pub struct Deployer<'a> {
    pub cloud: &'a dyn CloudGateway,
    pub clock: &'a dyn Clock,
    pub reporter: &'a dyn Reporter,
    pub resolver: &'a dyn PublicResolver,
    pub confirm: &'a dyn Confirm,
    pub probe: &'a dyn HttpProbe,
    pub images: &'a dyn ImageBuilder,
    /// Accept nameserver mismatches with a warning instead of asking
    pub assume_yes: bool,
    /// Stop after the image is pushed
    pub build_only: bool,
}

impl<'a> Deployer<'a> {
    fn context(&self, desired: &DesiredState) -> Context<'a> {
        Context::new(self.cloud, self.clock, self.reporter, desired.allow_create)
    }

    fn warn(&self, report: &mut DeployReport, message: String) {
        self.reporter.warn(&message);
        report.warn(message);
    }

    pub async fn deploy(&self, desired: &DesiredState) -> Result<DeployReport> {
        let topology = DeploymentTopology::select(desired.platform, desired.exposure())
            .ok_or_else(|| {
                CloudError::Configuration(format!(
                    "platform '{}' is not deployed through AWS",
                    desired.platform
                ))
            })?;

        if desired.exposure() == Some(ExposureMode::Lightweight) && desired.sizing.replicas != 1 {
            return Err(CloudError::Configuration(
                "lightweight mode runs exactly one replica".to_string(),
            ));
        }

        tracing::info!(app = %desired.app_name, ?topology, "deploy started");
        let report = match topology {
            DeploymentTopology::StaticSite | DeploymentTopology::StaticSitePublic => {
                self.run_static_site(desired, topology).await?
            }
            _ => self.run_fargate(desired, topology).await?,
        };
        tracing::info!(app = %desired.app_name, summary = %report.summary(), "deploy finished");
        Ok(report)
    }

    async fn run_fargate(
        &self,
        desired: &DesiredState,
        topology: DeploymentTopology,
    ) -> Result<DeployReport> {
        let ctx = self.context(desired);
        let progress = Progress::new(self.reporter, topology.stages());
        let names = desired.names();
        let mut report = DeployReport::new();

        progress.enter(Stage::Network);
        let network =
            network::ensure_network(&ctx, &names, desired.port, desired.exposure()).await?;
        track(&mut report, &network);

        progress.enter(Stage::Identity);
        let role = iam::ensure_execution_role(&ctx, &names, &desired.iam).await?;
        track(&mut report, &role);

        progress.enter(Stage::Logging);
        let log_sink = logs::ensure_log_sink(&ctx, &names).await?;
        track(&mut report, &log_sink);

        progress.enter(Stage::Image);
        let repository = registry::ensure_repository(&ctx, &names).await?;
        track(&mut report, &repository);
        let image = self.resolve_image(desired, &repository.attrs.uri).await?;
        report.image_uri = Some(image.clone());
        if self.build_only {
            self.reporter
                .note(&format!("Build only: {} pushed, skipping deploy", image));
            return Ok(report);
        }

        progress.enter(Stage::Cluster);
        let cluster = cluster::ensure_cluster(&ctx, &names).await?;
        track(&mut report, &cluster);
        let events = logs::ensure_event_capture(
            &ctx,
            &names,
            &cluster.id,
            &desired.region,
            &desired.account_id,
        )
        .await?;
        track(&mut report, &events);

        progress.enter(Stage::TaskDefinition);
        let task = task::register_task_definition(&ctx, desired, &role.id, &image).await?;
        track(&mut report, &task);

        let edge = match (&desired.public, topology) {
            (Some(public), DeploymentTopology::FargateProduction) => {
                progress.enter(Stage::Edge);
                Some(
                    self.provision_edge(&ctx, desired, public, &names, &network, &mut report)
                        .await?,
                )
            }
            _ => None,
        };

        progress.enter(Stage::Service);
        let attachment = edge.as_ref().map(|edge| LoadBalancerAttachment {
            target_group_arn: edge.target_group_arn.clone(),
            container_name: names.container.clone(),
            container_port: desired.port,
        });
        let service = service::ensure_service(
            &ctx,
            desired,
            &task.id,
            &network.attrs.subnet_ids,
            vec![network.id.clone()],
            attachment,
        )
        .await?;
        track(&mut report, &service);

        if let Some(edge) = &edge {
            progress.enter(Stage::Health);
            let healthy = load_balancer::await_service_health(
                &ctx,
                &service.attrs.cluster,
                &desired.service_name,
                service.attrs.desired_count,
                &edge.target_group_arn,
            )
            .await?;
            if !healthy {
                report.warn(format!(
                    "{} had no healthy targets when the deploy moved on",
                    desired.service_name
                ));
            }
            distribution::invalidate_all(&ctx, &edge.distribution_id).await?;
            report.cdn_domain = Some(edge.cdn_domain.clone());
        }

        if let (Some(public), DeploymentTopology::FargateLightweight) = (&desired.public, topology)
        {
            progress.enter(Stage::Endpoint);
            match endpoint::await_public_ip(&ctx, &names.cluster, &desired.service_name).await? {
                Some(ip) => {
                    let zone = self.domain_gate(&ctx, &public.domain).await?;
                    track(&mut report, &zone);
                    let record = dns::upsert_address(&ctx, &zone.id, &public.domain, &ip).await?;
                    track(&mut report, &record);
                    self.reporter
                        .note(&format!("{} -> {} (changes on every redeploy)", public.domain, ip));
                    report.public_ip = Some(ip);
                }
                None => report.warn(format!(
                    "{} was not pointed at the service; no public IP appeared",
                    public.domain
                )),
            }
        }

        if let Some(public) = &desired.public {
            progress.enter(Stage::Smoke);
            self.smoke_test(public, public.mode, report.cdn_domain.clone(), &mut report)
                .await?;
        }

        Ok(report)
    }

    /// Push a fresh build, or pass a prebuilt image through
    async fn resolve_image(&self, desired: &DesiredState, repository_uri: &str) -> Result<String> {
        match &desired.image {
            ImageSource::Prebuilt(uri) => {
                self.reporter.note(&format!("Using prebuilt image {}", uri));
                Ok(uri.clone())
            }
            ImageSource::Build {
                dockerfile,
                context,
            } => {
                let remote = format!("{}:{}", repository_uri, registry::image_tag());
                let auth = self
                    .cloud
                    .authorization()
                    .await
                    .context("get registry authorization token")?;
                let local = self.images.build(dockerfile, IMAGE_PLATFORM, context).await?;
                let pushed = self.images.push(&local, &remote, &auth).await?;
                tracing::info!(image = %pushed, "image pushed");
                Ok(pushed)
            }
        }
    }

    /// ALB security group through the CDN alias record
    async fn provision_edge(
        &self,
        ctx: &Context<'_>,
        desired: &DesiredState,
        public: &PublicExposure,
        names: &ResourceNames,
        network: &ResourceHandle<NetworkAttrs>,
        report: &mut DeployReport,
    ) -> Result<Edge> {
        let vpc_id = &network.attrs.vpc_id;

        let alb_group = network::ensure_alb_security_group(ctx, names, vpc_id).await?;
        track(report, &alb_group);
        if network::allow_from_load_balancer(ctx, vpc_id, names, &alb_group.id, desired.port)
            .await?
        {
            self.reporter.note(&format!(
                "{} now accepts port {} from {}",
                names.security_group, desired.port, names.alb_security_group
            ));
        }

        let lb = load_balancer::ensure_load_balancer(
            ctx,
            names,
            &network.attrs.subnet_ids,
            &alb_group.id,
        )
        .await?;
        track(report, &lb);

        let target_group = load_balancer::ensure_target_group(
            ctx,
            names,
            vpc_id,
            desired.port,
            &desired.health_check_path,
        )
        .await?;
        track(report, &target_group);

        let listener = load_balancer::ensure_listener(ctx, &lb.id, &target_group.id).await?;
        track(report, &listener);

        let zone = self.domain_gate(ctx, &public.domain).await?;
        track(report, &zone);

        let cert = self
            .certificate(ctx, desired, public, false, report)
            .await?;

        let cdn = distribution::ensure_distribution(
            ctx,
            &public.domain,
            OriginSpec::Custom {
                domain_name: lb.attrs.dns_name.clone(),
                protocol: OriginProtocol::HttpOnly,
            },
            CachePolicy::PassThrough,
            Some(&cert.id),
        )
        .await?;
        track(report, &cdn);
        if cdn.action.is_mutation() && !distribution::await_deployed(ctx, &cdn.id).await? {
            report.warn(format!("Distribution {} was still deploying", cdn.id));
        }

        let alias =
            dns::upsert_cdn_alias(ctx, &zone.id, &public.domain, &cdn.attrs.domain_name).await?;
        track(report, &alias);

        Ok(Edge {
            target_group_arn: target_group.id,
            distribution_id: cdn.id,
            cdn_domain: cdn.attrs.domain_name,
        })
    }

    async fn domain_gate(
        &self,
        ctx: &Context<'_>,
        domain: &str,
    ) -> Result<ResourceHandle<ZoneAttrs>> {
        dns::ensure_domain_ready_for_dns(ctx, self.resolver, self.confirm, domain, self.assume_yes)
            .await
    }

    /// Resolve the certificate, publish its challenge records and wait for
    /// issuance.
    ///
    /// With `require_issued` a certificate that never issues is fatal;
    /// otherwise it is a warning.
    async fn certificate(
        &self,
        ctx: &Context<'_>,
        desired: &DesiredState,
        public: &PublicExposure,
        require_issued: bool,
        report: &mut DeployReport,
    ) -> Result<ResourceHandle<CertificateAttrs>> {
        let cert = match &public.certificate_id {
            Some(id) => {
                certificate::use_existing_certificate(ctx, &desired.account_id, id).await?
            }
            None => {
                let cert = certificate::ensure_certificate(ctx, &public.domain).await?;
                for record in &cert.attrs.validation_records {
                    match dns::ensure_validation_record(ctx, record).await? {
                        Some(handle) => track(report, &handle),
                        None => self.warn(
                            report,
                            format!(
                                "No hosted zone contains {}; add the validation record by hand",
                                record.name.trim_end_matches('.')
                            ),
                        ),
                    }
                }
                cert
            }
        };
        track(report, &cert);

        if cert.attrs.issued {
            return Ok(cert);
        }

        let status = match certificate::await_issued(ctx, &cert.id).await? {
            WaitOutcome::Converged(_) => return Ok(cert),
            WaitOutcome::Failed(status) => {
                return Err(CloudError::CertificateNotIssued {
                    arn: cert.id.clone(),
                    status: status.to_string(),
                });
            }
            WaitOutcome::TimedOut { last, .. } => last
                .map(|s| s.to_string())
                .unwrap_or_else(|| "PENDING_VALIDATION".to_string()),
        };

        if require_issued {
            return Err(CloudError::CertificateNotIssued {
                arn: cert.id.clone(),
                status,
            });
        }
        self.warn(
            report,
            format!(
                "Certificate {} is still {}; the CDN cannot serve HTTPS until it is issued",
                cert.id, status
            ),
        );
        Ok(cert)
    }

    async fn smoke_test(
        &self,
        public: &PublicExposure,
        mode: ExposureMode,
        cdn_domain: Option<String>,
        report: &mut DeployReport,
    ) -> Result<()> {
        let test = SmokeTest::for_domain(&public.domain, mode, cdn_domain.as_deref());
        let result = run_smoke_test(self.clock, self.reporter, self.probe, &test).await?;
        report.smoke_passed = Some(result.passed);
        if !result.passed {
            report.warn(format!("Smoke test against {} did not pass", public.domain));
        }
        Ok(())
    }

    async fn run_static_site(
        &self,
        desired: &DesiredState,
        topology: DeploymentTopology,
    ) -> Result<DeployReport> {
        let site = desired.static_site.as_ref().ok_or_else(|| {
            CloudError::Configuration("the s3 platform needs an s3.folder".to_string())
        })?;
        validate_bucket_name(&site.bucket_name).map_err(|reason| CloudError::InvalidBucketName {
            name: site.bucket_name.clone(),
            reason,
        })?;

        let ctx = self.context(desired);
        let progress = Progress::new(self.reporter, topology.stages());
        let mut report = DeployReport::new();

        progress.enter(Stage::Bucket);
        let bucket = bucket::ensure_site_bucket(&ctx, &site.bucket_name, &desired.region).await?;
        track(&mut report, &bucket);

        progress.enter(Stage::Upload);
        bucket::sync_folder(&ctx, &site.bucket_name, &site.folder).await?;

        let Some(public) = &desired.public else {
            self.reporter.note(&format!(
                "Website endpoint: {}",
                bucket::website_endpoint(&site.bucket_name, &desired.region)
            ));
            return Ok(report);
        };

        progress.enter(Stage::Edge);
        let zone = self.domain_gate(&ctx, &public.domain).await?;
        track(&mut report, &zone);

        let cert = self
            .certificate(&ctx, desired, public, true, &mut report)
            .await?;

        let cdn = distribution::ensure_distribution(
            &ctx,
            &public.domain,
            OriginSpec::Bucket {
                domain_name: bucket::origin_domain(&site.bucket_name, &desired.region),
            },
            CachePolicy::Static {
                ttl_seconds: distribution::STATIC_TTL_SECONDS,
            },
            Some(&cert.id),
        )
        .await?;
        track(&mut report, &cdn);
        if cdn.action.is_mutation() && !distribution::await_deployed(&ctx, &cdn.id).await? {
            report.warn(format!("Distribution {} was still deploying", cdn.id));
        }

        let alias =
            dns::upsert_cdn_alias(&ctx, &zone.id, &public.domain, &cdn.attrs.domain_name).await?;
        track(&mut report, &alias);
        report.cdn_domain = Some(cdn.attrs.domain_name.clone());

        progress.enter(Stage::Invalidation);
        distribution::invalidate_all(&ctx, &cdn.id).await?;

        progress.enter(Stage::Smoke);
        self.smoke_test(
            public,
            ExposureMode::Production,
            report.cdn_domain.clone(),
            &mut report,
        )
        .await?;

        Ok(report)
    }
}
