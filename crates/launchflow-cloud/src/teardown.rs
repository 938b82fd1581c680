//! Teardown sequencer
//!
//! Deletes a topology's resources in exact reverse deploy order. Every step
//! is idempotent: a resource that is already gone counts as skipped, and a
//! failure that a later run can fix (dependency still draining, throttling,
//! a wait that ran out) becomes a warning instead of aborting the run.
//!
//! Log groups, event capture, the IAM role, certificates and hosted zones are
//! kept.

use crate::action::{TeardownOutcome, TeardownReport};
use crate::error::{CloudError, GatewayError, GatewayResult, GatewayResultExt, Result};
use crate::gateway::{CloudGateway, DistributionPatch, IngressSource, RecordType};
use crate::model::{DesiredState, ResourceKind, ResourceNames};
use crate::reconcile::{Context, distribution, dns};
use crate::reporter::{Confirm, Prompt, Reporter};
use crate::topology::DeploymentTopology;
use crate::waiter::{Clock, ConvergenceTarget, WaitOutcome, await_terminal};
use std::time::Duration;

/// Attempts at deleting a cluster that still references services or tasks
pub const CLUSTER_DELETE_ATTEMPTS: u32 = 6;
pub const CLUSTER_DELETE_BACKOFF: Duration = Duration::from_secs(30);

/// Objects per batch delete request
const DELETE_BATCH: usize = 1000;

/// What one teardown step did
#[derive(Debug, Clone, PartialEq, Eq)]
enum Removal {
    Removed,
    Absent,
    /// Left in place for a later run, with the reason
    Deferred(String),
}

/// Treat not-found as success
fn gone(result: GatewayResult<()>) -> GatewayResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

fn removed_or_absent(deleted: bool) -> Removal {
    if deleted {
        Removal::Removed
    } else {
        Removal::Absent
    }
}

/// Drives one teardown run
pub struct Teardown<'a> {
    pub cloud: &'a dyn CloudGateway,
    pub clock: &'a dyn Clock,
    pub reporter: &'a dyn Reporter,
    pub confirm: &'a dyn Confirm,
    /// Skip the confirmation prompt
    pub assume_yes: bool,
}

impl<'a> Teardown<'a> {
    fn context(&self) -> Context<'a> {
        Context::new(self.cloud, self.clock, self.reporter, false)
    }

    /// Human-readable line for the confirmation prompt
    pub fn describe(kind: ResourceKind, desired: &DesiredState) -> String {
        let names = desired.names();
        let domain = desired.domain().unwrap_or("-");
        let subject = match kind {
            ResourceKind::Service => desired.service_name.clone(),
            ResourceKind::DnsRecord => domain.to_string(),
            ResourceKind::Distribution => format!("aliased to {}", domain),
            ResourceKind::Listener => format!("listeners of {}", names.load_balancer),
            ResourceKind::TargetGroup => names.target_group,
            ResourceKind::LoadBalancer => names.load_balancer,
            ResourceKind::AlbSecurityGroup => names.alb_security_group,
            ResourceKind::TaskDefinition => format!("all revisions of {}", names.task_family),
            ResourceKind::Cluster => names.cluster,
            ResourceKind::Registry => format!("{} and its images", names.repository),
            ResourceKind::SecurityGroup => names.security_group,
            ResourceKind::Bucket => desired
                .static_site
                .as_ref()
                .map(|s| format!("{} and its objects", s.bucket_name))
                .unwrap_or_default(),
            ResourceKind::IamRole => names.execution_role,
            ResourceKind::LogSink => names.log_group,
            ResourceKind::EventCapture => names.event_rule,
            ResourceKind::Certificate => domain.to_string(),
            ResourceKind::HostedZone => domain.to_string(),
        };
        format!("{} {}", kind, subject)
    }

    pub async fn run(&self, desired: &DesiredState) -> Result<TeardownOutcome> {
        let topology = DeploymentTopology::select(desired.platform, desired.exposure())
            .ok_or_else(|| {
                CloudError::Configuration(format!(
                    "platform '{}' is not managed through AWS",
                    desired.platform
                ))
            })?;
        let order = topology.teardown_order();

        if !self.assume_yes {
            let mut prompt =
                Prompt::new(format!("Destroy all resources of {}?", desired.app_name)).typed();
            for kind in &order {
                prompt = prompt.detail(Self::describe(*kind, desired));
            }
            for kind in topology.retained() {
                prompt = prompt.detail(format!("(kept) {}", Self::describe(kind, desired)));
            }
            if !self.confirm.confirm(&prompt) {
                tracing::info!(app = %desired.app_name, "teardown cancelled");
                return Ok(TeardownOutcome::Cancelled);
            }
        }

        let ctx = self.context();
        let names = desired.names();
        let mut report = TeardownReport::new();

        for (index, kind) in order.iter().enumerate() {
            self.reporter
                .stage(index + 1, order.len(), &format!("Remove {}", kind));
            let label = Self::describe(*kind, desired);
            match self.remove(&ctx, *kind, desired, &names).await {
                Ok(Removal::Removed) => {
                    self.reporter
                        .resource(*kind, &label, crate::action::ActionType::Delete);
                    report.add_removed(label);
                }
                Ok(Removal::Absent) => {
                    self.reporter.note(&format!("{} not found, skipping", label));
                    report.add_skipped(label);
                }
                Ok(Removal::Deferred(reason)) => {
                    let message = format!("{}: {}", label, reason);
                    self.reporter.warn(&message);
                    report.add_warning(message);
                }
                Err(e) => {
                    let message = format!("{}: {}", label, e);
                    self.reporter.warn(&message);
                    report.add_warning(message);
                }
            }
        }

        for kind in topology.retained() {
            self.reporter.note(&format!(
                "Keeping {}",
                Self::describe(kind, desired)
            ));
        }

        tracing::info!(
            app = %desired.app_name,
            removed = report.removed.len(),
            skipped = report.skipped.len(),
            warnings = report.warnings.len(),
            "teardown finished"
        );
        Ok(TeardownOutcome::Completed(report))
    }

    async fn remove(
        &self,
        ctx: &Context<'_>,
        kind: ResourceKind,
        desired: &DesiredState,
        names: &ResourceNames,
    ) -> Result<Removal> {
        match kind {
            ResourceKind::Service => self.remove_service(names, &desired.service_name).await,
            ResourceKind::DnsRecord => match desired.domain() {
                Some(domain) => self.remove_dns_record(ctx, domain).await,
                None => Ok(Removal::Absent),
            },
            ResourceKind::Distribution => match desired.domain() {
                Some(domain) => self.remove_distribution(ctx, domain).await,
                None => Ok(Removal::Absent),
            },
            ResourceKind::Listener => self.remove_listeners(names).await,
            ResourceKind::TargetGroup => self.remove_target_group(names).await,
            ResourceKind::LoadBalancer => self.remove_load_balancer(names).await,
            ResourceKind::AlbSecurityGroup => self.remove_alb_security_group(names).await,
            ResourceKind::TaskDefinition => self.remove_task_definitions(names).await,
            ResourceKind::Cluster => self.remove_cluster(names).await,
            ResourceKind::Registry => {
                let deleted = gone(self.cloud.delete_repository(&names.repository).await)
                    .context(format!("delete repository {}", names.repository))?;
                Ok(removed_or_absent(deleted))
            }
            ResourceKind::SecurityGroup => {
                self.remove_security_group(&names.security_group).await
            }
            ResourceKind::Bucket => match &desired.static_site {
                Some(site) => self.remove_bucket(&site.bucket_name).await,
                None => Ok(Removal::Absent),
            },
            ResourceKind::IamRole
            | ResourceKind::LogSink
            | ResourceKind::EventCapture
            | ResourceKind::Certificate
            | ResourceKind::HostedZone => Ok(Removal::Absent),
        }
    }

    /// Force delete, then wait until the service is INACTIVE or gone
    async fn remove_service(&self, names: &ResourceNames, service: &str) -> Result<Removal> {
        let cluster = &names.cluster;
        let current = self
            .cloud
            .find_service(cluster, service)
            .await
            .context(format!("describe service {}", service))?;
        if !current.is_some_and(|s| s.is_active()) {
            return Ok(Removal::Absent);
        }

        if !gone(self.cloud.delete_service(cluster, service).await)
            .context(format!("delete service {}", service))?
        {
            return Ok(Removal::Absent);
        }
        tracing::info!(service, "deleting service");

        let target = ConvergenceTarget::service_inactive(service);
        self.reporter.wait_started(&target);
        let outcome = await_terminal(
            self.clock,
            &target,
            || async {
                Ok(self
                    .cloud
                    .find_service(cluster, service)
                    .await?
                    .is_none_or(|s| !s.is_active()))
            },
            |inactive: &bool| *inactive,
            |_| false,
        )
        .await?;
        self.reporter.wait_finished(&target);

        match outcome {
            WaitOutcome::Converged(_) => Ok(Removal::Removed),
            _ => Ok(Removal::Deferred(
                "service is still draining; run destroy again shortly".to_string(),
            )),
        }
    }

    async fn remove_dns_record(&self, ctx: &Context<'_>, domain: &str) -> Result<Removal> {
        let Some(zone) = dns::find_hosted_zone(ctx, domain).await? else {
            return Ok(Removal::Absent);
        };
        let name = dns::fqdn(domain);
        let Some(record) = self
            .cloud
            .find_record(&zone.id, &name, RecordType::A)
            .await
            .context(format!("look up record {}", domain))?
        else {
            return Ok(Removal::Absent);
        };

        let deleted = gone(
            self.cloud
                .change_record(&zone.id, crate::gateway::ChangeAction::Delete, &record)
                .await,
        )
        .context(format!("delete record {}", domain))?;
        Ok(removed_or_absent(deleted))
    }

    /// Disable, wait for the change to deploy, then delete with a fresh ETag
    async fn remove_distribution(&self, ctx: &Context<'_>, domain: &str) -> Result<Removal> {
        let Some(summary) = distribution::find_distribution(ctx, domain).await? else {
            return Ok(Removal::Absent);
        };
        let id = summary.id;
        let Some(current) = self
            .cloud
            .get_distribution(&id)
            .await
            .context(format!("get distribution {}", id))?
        else {
            return Ok(Removal::Absent);
        };

        if current.enabled {
            let patch = DistributionPatch {
                enabled: Some(false),
                ..Default::default()
            };
            self.cloud
                .update_distribution(&id, &current.etag, &patch)
                .await
                .context(format!("disable distribution {}", id))?;
            tracing::info!(%id, "disabled distribution");
        }

        let target = ConvergenceTarget::distribution_disabled(&id);
        self.reporter.wait_started(&target);
        let outcome = await_terminal(
            self.clock,
            &target,
            || async {
                let dist = self
                    .cloud
                    .get_distribution(&id)
                    .await?
                    .ok_or_else(|| GatewayError::NotFound(id.clone()))?;
                Ok(dist)
            },
            |d: &crate::gateway::Distribution| d.status == "Deployed" && !d.enabled,
            |_| false,
        )
        .await;
        self.reporter.wait_finished(&target);

        let ready = match outcome {
            Ok(WaitOutcome::Converged(dist)) => dist,
            Ok(_) => {
                return Ok(Removal::Deferred(format!(
                    "distribution {} is still disabling; run destroy again later",
                    id
                )));
            }
            Err(CloudError::Provider { source, .. }) if source.is_not_found() => {
                return Ok(Removal::Removed);
            }
            Err(e) => return Err(e),
        };

        match self.cloud.delete_distribution(&id, &ready.etag).await {
            Ok(()) => Ok(Removal::Removed),
            Err(e) if e.is_not_found() => Ok(Removal::Absent),
            Err(e) if e.is_dependency_violation() => Ok(Removal::Deferred(format!(
                "distribution {} is not fully disabled yet ({})",
                id, e
            ))),
            Err(e) => Err(e).context(format!("delete distribution {}", id)),
        }
    }

    async fn remove_listeners(&self, names: &ResourceNames) -> Result<Removal> {
        let Some(lb) = self
            .cloud
            .find_load_balancer(&names.load_balancer)
            .await
            .context(format!("describe load balancer {}", names.load_balancer))?
        else {
            return Ok(Removal::Absent);
        };

        let listeners = self
            .cloud
            .listeners(&lb.arn)
            .await
            .context("describe listeners")?;
        let mut deleted = false;
        for listener in listeners {
            deleted |= gone(self.cloud.delete_listener(&listener.arn).await)
                .context(format!("delete listener {}", listener.arn))?;
        }
        Ok(removed_or_absent(deleted))
    }

    async fn remove_target_group(&self, names: &ResourceNames) -> Result<Removal> {
        let Some(group) = self
            .cloud
            .find_target_group(&names.target_group)
            .await
            .context(format!("describe target group {}", names.target_group))?
        else {
            return Ok(Removal::Absent);
        };

        match self.cloud.delete_target_group(&group.arn).await {
            Ok(()) => Ok(Removal::Removed),
            Err(e) if e.is_not_found() => Ok(Removal::Absent),
            Err(e) if e.is_dependency_violation() => Ok(Removal::Deferred(format!(
                "target group still in use ({})",
                e
            ))),
            Err(e) => Err(e).context(format!("delete target group {}", names.target_group)),
        }
    }

    async fn remove_load_balancer(&self, names: &ResourceNames) -> Result<Removal> {
        let name = &names.load_balancer;
        let Some(lb) = self
            .cloud
            .find_load_balancer(name)
            .await
            .context(format!("describe load balancer {}", name))?
        else {
            return Ok(Removal::Absent);
        };

        if !gone(self.cloud.delete_load_balancer(&lb.arn).await)
            .context(format!("delete load balancer {}", name))?
        {
            return Ok(Removal::Absent);
        }

        let target = ConvergenceTarget::load_balancer_deleted(name);
        self.reporter.wait_started(&target);
        let outcome = await_terminal(
            self.clock,
            &target,
            || async { Ok(self.cloud.find_load_balancer(name).await?.is_none()) },
            |deleted: &bool| *deleted,
            |_| false,
        )
        .await?;
        self.reporter.wait_finished(&target);

        if outcome.is_converged() {
            Ok(Removal::Removed)
        } else {
            Ok(Removal::Deferred(
                "load balancer is still being deleted".to_string(),
            ))
        }
    }

    /// Revoke the task group's ingress from the ALB group, then delete it
    async fn remove_alb_security_group(&self, names: &ResourceNames) -> Result<Removal> {
        let Some(vpc_id) = self
            .cloud
            .default_vpc()
            .await
            .context("look up default VPC")?
        else {
            return Ok(Removal::Absent);
        };
        let Some(alb_group) = self
            .cloud
            .find_security_group(&vpc_id, &names.alb_security_group)
            .await
            .context(format!("describe security group {}", names.alb_security_group))?
        else {
            return Ok(Removal::Absent);
        };

        if let Some(task_group) = self
            .cloud
            .find_security_group(&vpc_id, &names.security_group)
            .await
            .context(format!("describe security group {}", names.security_group))?
        {
            let referencing = task_group
                .ingress
                .iter()
                .filter(|r| r.source == IngressSource::SecurityGroup(alb_group.id.clone()));
            for rule in referencing {
                gone(self.cloud.revoke_ingress(&task_group.id, rule).await)
                    .context(format!("revoke ingress on {}", task_group.id))?;
                tracing::info!(group = %task_group.id, port = rule.port, "revoked ALB ingress");
            }
        }

        self.delete_group(&alb_group.id).await
    }

    async fn remove_security_group(&self, name: &str) -> Result<Removal> {
        let Some(vpc_id) = self
            .cloud
            .default_vpc()
            .await
            .context("look up default VPC")?
        else {
            return Ok(Removal::Absent);
        };
        let Some(group) = self
            .cloud
            .find_security_group(&vpc_id, name)
            .await
            .context(format!("describe security group {}", name))?
        else {
            return Ok(Removal::Absent);
        };
        self.delete_group(&group.id).await
    }

    async fn delete_group(&self, group_id: &str) -> Result<Removal> {
        match self.cloud.delete_security_group(group_id).await {
            Ok(()) => Ok(Removal::Removed),
            Err(e) if e.is_not_found() => Ok(Removal::Absent),
            Err(e) if e.is_dependency_violation() => Ok(Removal::Deferred(format!(
                "network interfaces still reference {}; try again in a few minutes",
                group_id
            ))),
            Err(e) => Err(e).context(format!("delete security group {}", group_id)),
        }
    }

    async fn remove_task_definitions(&self, names: &ResourceNames) -> Result<Removal> {
        let revisions = self
            .cloud
            .task_definitions(&names.task_family)
            .await
            .context(format!("list revisions of {}", names.task_family))?;
        let mut deleted = false;
        for arn in &revisions {
            deleted |= gone(self.cloud.deregister_task_definition(arn).await)
                .context(format!("deregister {}", arn))?;
        }
        Ok(removed_or_absent(deleted))
    }

    /// Retry while the cluster still references draining services or tasks
    async fn remove_cluster(&self, names: &ResourceNames) -> Result<Removal> {
        let name = &names.cluster;
        let exists = self
            .cloud
            .find_cluster(name)
            .await
            .context(format!("describe cluster {}", name))?
            .is_some_and(|c| c.is_active());
        if !exists {
            return Ok(Removal::Absent);
        }

        for attempt in 1..=CLUSTER_DELETE_ATTEMPTS {
            match self.cloud.delete_cluster(name).await {
                Ok(()) => return Ok(Removal::Removed),
                Err(e) if e.is_not_found() => return Ok(Removal::Absent),
                Err(e) if e.is_dependency_violation() || e.is_throttled() => {
                    tracing::debug!(cluster = %name, attempt, "cluster busy: {}", e);
                    if attempt < CLUSTER_DELETE_ATTEMPTS {
                        self.clock.sleep(CLUSTER_DELETE_BACKOFF).await;
                    }
                }
                Err(e) => return Err(e).context(format!("delete cluster {}", name)),
            }
        }

        Ok(Removal::Deferred(format!(
            "cluster still has services or tasks after {} attempts",
            CLUSTER_DELETE_ATTEMPTS
        )))
    }

    /// Empty the bucket, then delete it
    async fn remove_bucket(&self, bucket: &str) -> Result<Removal> {
        if !self
            .cloud
            .bucket_exists(bucket)
            .await
            .context(format!("check bucket {}", bucket))?
        {
            return Ok(Removal::Absent);
        }

        let keys: Vec<String> = self
            .cloud
            .list_objects(bucket)
            .await
            .context(format!("list objects in {}", bucket))?
            .into_iter()
            .map(|o| o.key)
            .collect();
        for batch in keys.chunks(DELETE_BATCH) {
            self.cloud
                .delete_objects(bucket, batch)
                .await
                .context(format!("delete objects from {}", bucket))?;
        }
        tracing::info!(bucket, objects = keys.len(), "emptied bucket");

        let deleted = gone(self.cloud.delete_bucket(bucket).await)
            .context(format!("delete bucket {}", bucket))?;
        Ok(removed_or_absent(deleted))
    }
}
