#![allow(dead_code)]

use async_trait::async_trait;
use launchflow_cloud::gateway::*;
use launchflow_cloud::{
    CapacityProvider, CloudError, ComputeSizing, Deployer, DesiredState, ExposureMode,
    GatewayError, GatewayResult, HttpProbe, IamPolicySet, ImageBuilder, ImageSource, ManualClock,
    Platform, ProbeResult, Prompt, PublicExposure, StaticSite, Teardown, TracingReporter,
};
use md5::{Digest, Md5};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const ACCOUNT: &str = "123456789012";
pub const REGION: &str = "eu-west-1";
pub const VPC: &str = "vpc-0default";
pub const TASK_PUBLIC_IP: &str = "203.0.113.10";
pub const ZONE_NAMESERVERS: [&str; 4] = [
    "ns-1.awsdns-01.org",
    "ns-2.awsdns-02.co.uk",
    "ns-3.awsdns-03.com",
    "ns-4.awsdns-04.net",
];

/// Calls every deploy repeats, even when nothing changed
pub const ALWAYS_SET: [&str; 5] = [
    "put_capacity_providers",
    "enable_enhanced_insights",
    "register_task_definition",
    "update_service",
    "create_invalidation",
];

fn normalize(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

#[derive(Debug, Clone)]
pub struct FakeCertificate {
    pub arn: String,
    pub domain: String,
    pub status: CertificateStatus,
    pub validation: Option<ValidationRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeBucket {
    pub website: Option<WebsiteConfig>,
    pub block: Option<PublicAccessBlock>,
    pub policy: Option<String>,
    /// key -> (etag, content type)
    pub objects: BTreeMap<String, (String, String)>,
}

/// Account contents plus a log of every mutating call
#[derive(Debug, Default)]
pub struct State {
    pub default_vpc: Option<String>,
    pub subnets: Vec<String>,
    pub groups: BTreeMap<String, SecurityGroup>,
    pub roles: BTreeMap<String, Role>,
    pub attached: BTreeMap<String, BTreeSet<String>>,
    pub inline: BTreeMap<(String, String), serde_json::Value>,
    pub log_groups: BTreeMap<String, LogGroup>,
    pub resource_policies: BTreeMap<String, String>,
    pub rules: BTreeMap<String, EventRule>,
    pub targets: BTreeMap<String, Vec<RuleTarget>>,
    pub repositories: BTreeMap<String, Repository>,
    pub clusters: BTreeMap<String, Cluster>,
    pub task_definitions: BTreeMap<String, Vec<String>>,
    pub revisions: u32,
    pub services: BTreeMap<(String, String), ServiceSummary>,
    pub load_balancers: BTreeMap<String, LoadBalancer>,
    pub target_groups: BTreeMap<String, TargetGroup>,
    pub listeners: Vec<(String, Listener)>,
    pub certificates: Vec<FakeCertificate>,
    pub distributions: BTreeMap<String, Distribution>,
    pub invalidations: Vec<(String, Vec<String>)>,
    pub zones: Vec<HostedZone>,
    pub records: BTreeMap<String, Vec<RecordSet>>,
    pub buckets: BTreeMap<String, FakeBucket>,
    pub calls: Vec<String>,
    next_id: u32,
}

impl State {
    fn id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&mut self, call: impl Into<String>) {
        self.calls.push(call.into());
    }

    fn has_record(&self, name: &str, record_type: RecordType) -> bool {
        self.records
            .values()
            .flatten()
            .any(|r| normalize(&r.name) == normalize(name) && r.record_type == record_type)
    }

    /// Pending certificates issue once their challenge record is published
    fn refresh_certificates(&mut self) {
        let satisfied: Vec<bool> = self
            .certificates
            .iter()
            .map(|c| {
                c.validation
                    .as_ref()
                    .is_some_and(|v| self.has_record(&v.name, RecordType::Cname))
            })
            .collect();
        for (cert, ok) in self.certificates.iter_mut().zip(satisfied) {
            if ok && cert.status == CertificateStatus::PendingValidation {
                cert.status = CertificateStatus::Issued;
                if let Some(v) = cert.validation.as_mut() {
                    v.status = "SUCCESS".to_string();
                }
            }
        }
    }

    fn group_by_id(&mut self, id: &str) -> GatewayResult<&mut SecurityGroup> {
        self.groups
            .values_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    fn active_service(&self, cluster: &str, name: &str) -> Option<&ServiceSummary> {
        self.services
            .get(&(cluster.to_string(), name.to_string()))
            .filter(|s| s.is_active())
    }
}

/// In-memory AWS account
pub struct FakeCloud {
    state: Mutex<State>,
}

impl FakeCloud {
    pub fn new() -> Self {
        let state = State {
            default_vpc: Some(VPC.to_string()),
            subnets: vec!["subnet-a".to_string(), "subnet-b".to_string()],
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn without_default_vpc() -> Self {
        let cloud = Self::new();
        cloud.with(|s| {
            s.default_vpc = None;
            s.subnets.clear();
        });
        cloud
    }

    /// Register an existing hosted zone
    pub fn with_zone(self, name: &str) -> Self {
        self.with(|s| {
            let id = format!("Z{}", s.id());
            s.zones.push(HostedZone {
                id,
                name: format!("{}.", normalize(name)),
            });
        });
        self
    }

    /// Register an existing certificate; returns its ARN
    pub fn seed_certificate(&self, id: &str, domain: &str, status: CertificateStatus) -> String {
        let arn = format!("arn:aws:acm:us-east-1:{}:certificate/{}", ACCOUNT, id);
        self.with(|s| {
            s.certificates.push(FakeCertificate {
                arn: arn.clone(),
                domain: domain.to_string(),
                status,
                validation: None,
            })
        });
        arn
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn calls(&self) -> Vec<String> {
        self.with(|s| s.calls.clone())
    }

    pub fn clear_calls(&self) {
        self.with(|s| s.calls.clear());
    }

    /// Mutating calls other than the ones every deploy repeats
    pub fn unexpected_mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !ALWAYS_SET.iter().any(|allowed| c.starts_with(allowed)))
            .collect()
    }

    pub fn zone_id(&self, name: &str) -> Option<String> {
        self.with(|s| {
            s.zones
                .iter()
                .find(|z| normalize(&z.name) == normalize(name))
                .map(|z| z.id.clone())
        })
    }

    pub fn record(&self, name: &str, record_type: RecordType) -> Option<RecordSet> {
        self.with(|s| {
            s.records
                .values()
                .flatten()
                .find(|r| normalize(&r.name) == normalize(name) && r.record_type == record_type)
                .cloned()
        })
    }
}

#[async_trait]
impl NetworkGateway for FakeCloud {
    async fn default_vpc(&self) -> GatewayResult<Option<String>> {
        Ok(self.with(|s| s.default_vpc.clone()))
    }

    async fn subnets(&self, _vpc_id: &str) -> GatewayResult<Vec<String>> {
        Ok(self.with(|s| s.subnets.clone()))
    }

    async fn find_security_group(
        &self,
        _vpc_id: &str,
        name: &str,
    ) -> GatewayResult<Option<SecurityGroup>> {
        Ok(self.with(|s| s.groups.get(name).cloned()))
    }

    async fn create_security_group(
        &self,
        _vpc_id: &str,
        name: &str,
        _description: &str,
    ) -> GatewayResult<String> {
        self.with(|s| {
            if s.groups.contains_key(name) {
                return Err(GatewayError::AlreadyExists(name.to_string()));
            }
            let id = format!("sg-{:04}", s.id());
            s.groups.insert(
                name.to_string(),
                SecurityGroup {
                    id: id.clone(),
                    name: name.to_string(),
                    ingress: Vec::new(),
                },
            );
            s.record(format!("create_security_group {}", name));
            Ok(id)
        })
    }

    async fn authorize_ingress(&self, group_id: &str, rule: &IngressRule) -> GatewayResult<()> {
        self.with(|s| {
            let group = s.group_by_id(group_id)?;
            if group.ingress.contains(rule) {
                return Err(GatewayError::AlreadyExists(format!("{:?}", rule)));
            }
            group.ingress.push(rule.clone());
            s.record(format!("authorize_ingress {} {}", group_id, rule.port));
            Ok(())
        })
    }

    async fn revoke_ingress(&self, group_id: &str, rule: &IngressRule) -> GatewayResult<()> {
        self.with(|s| {
            let group = s.group_by_id(group_id)?;
            let before = group.ingress.len();
            group.ingress.retain(|r| r != rule);
            if group.ingress.len() == before {
                return Err(GatewayError::NotFound(format!("{:?}", rule)));
            }
            s.record(format!("revoke_ingress {} {}", group_id, rule.port));
            Ok(())
        })
    }

    async fn delete_security_group(&self, group_id: &str) -> GatewayResult<()> {
        self.with(|s| {
            let referenced = s.groups.values().any(|g| {
                g.ingress
                    .iter()
                    .any(|r| r.source == IngressSource::SecurityGroup(group_id.to_string()))
            });
            if referenced {
                return Err(GatewayError::DependencyViolation(group_id.to_string()));
            }
            let name = s
                .groups
                .values()
                .find(|g| g.id == group_id)
                .map(|g| g.name.clone())
                .ok_or_else(|| GatewayError::NotFound(group_id.to_string()))?;
            s.groups.remove(&name);
            s.record(format!("delete_security_group {}", name));
            Ok(())
        })
    }

    async fn network_interface_public_ip(&self, _eni_id: &str) -> GatewayResult<Option<String>> {
        Ok(None)
    }
}

#[async_trait]
impl IdentityGateway for FakeCloud {
    async fn account_id(&self) -> GatewayResult<String> {
        Ok(ACCOUNT.to_string())
    }

    async fn find_role(&self, name: &str) -> GatewayResult<Option<Role>> {
        Ok(self.with(|s| s.roles.get(name).cloned()))
    }

    async fn create_role(&self, name: &str, _trust_policy: &str) -> GatewayResult<Role> {
        self.with(|s| {
            let role = Role {
                name: name.to_string(),
                arn: format!("arn:aws:iam::{}:role/{}", ACCOUNT, name),
            };
            s.roles.insert(name.to_string(), role.clone());
            s.record(format!("create_role {}", name));
            Ok(role)
        })
    }

    async fn attached_policies(&self, role: &str) -> GatewayResult<Vec<String>> {
        Ok(self.with(|s| {
            s.attached
                .get(role)
                .map(|p| p.iter().cloned().collect())
                .unwrap_or_default()
        }))
    }

    async fn attach_policy(&self, role: &str, policy_arn: &str) -> GatewayResult<()> {
        self.with(|s| {
            s.attached
                .entry(role.to_string())
                .or_default()
                .insert(policy_arn.to_string());
            s.record(format!("attach_policy {}", policy_arn));
            Ok(())
        })
    }

    async fn detach_policy(&self, role: &str, policy_arn: &str) -> GatewayResult<()> {
        self.with(|s| {
            s.attached.entry(role.to_string()).or_default().remove(policy_arn);
            s.record(format!("detach_policy {}", policy_arn));
            Ok(())
        })
    }

    async fn inline_policy(
        &self,
        role: &str,
        name: &str,
    ) -> GatewayResult<Option<serde_json::Value>> {
        Ok(self.with(|s| s.inline.get(&(role.to_string(), name.to_string())).cloned()))
    }

    async fn put_inline_policy(
        &self,
        role: &str,
        name: &str,
        document: &str,
    ) -> GatewayResult<()> {
        let value: serde_json::Value = serde_json::from_str(document)
            .map_err(|e| GatewayError::other("PutRolePolicy", e.to_string()))?;
        self.with(|s| {
            s.inline.insert((role.to_string(), name.to_string()), value);
            s.record(format!("put_inline_policy {}", name));
            Ok(())
        })
    }

    async fn delete_inline_policy(&self, role: &str, name: &str) -> GatewayResult<()> {
        self.with(|s| {
            s.inline.remove(&(role.to_string(), name.to_string()));
            s.record(format!("delete_inline_policy {}", name));
            Ok(())
        })
    }
}

#[async_trait]
impl LogGateway for FakeCloud {
    async fn find_log_group(&self, name: &str) -> GatewayResult<Option<LogGroup>> {
        Ok(self.with(|s| s.log_groups.get(name).cloned()))
    }

    async fn create_log_group(&self, name: &str, retention_days: i32) -> GatewayResult<LogGroup> {
        self.with(|s| {
            let group = LogGroup {
                name: name.to_string(),
                arn: format!("arn:aws:logs:{}:{}:log-group:{}", REGION, ACCOUNT, name),
                retention_days: Some(retention_days),
            };
            s.log_groups.insert(name.to_string(), group.clone());
            s.record(format!("create_log_group {}", name));
            Ok(group)
        })
    }

    async fn resource_policy(&self, name: &str) -> GatewayResult<Option<String>> {
        Ok(self.with(|s| s.resource_policies.get(name).cloned()))
    }

    async fn put_resource_policy(&self, name: &str, document: &str) -> GatewayResult<()> {
        self.with(|s| {
            s.resource_policies
                .insert(name.to_string(), document.to_string());
            s.record(format!("put_resource_policy {}", name));
            Ok(())
        })
    }
}

#[async_trait]
impl EventGateway for FakeCloud {
    async fn find_rule(&self, name: &str) -> GatewayResult<Option<EventRule>> {
        Ok(self.with(|s| s.rules.get(name).cloned()))
    }

    async fn put_rule(
        &self,
        name: &str,
        pattern: &str,
        _description: &str,
    ) -> GatewayResult<String> {
        self.with(|s| {
            let arn = format!("arn:aws:events:{}:{}:rule/{}", REGION, ACCOUNT, name);
            s.rules.insert(
                name.to_string(),
                EventRule {
                    name: name.to_string(),
                    arn: arn.clone(),
                    pattern: Some(pattern.to_string()),
                },
            );
            s.record(format!("put_rule {}", name));
            Ok(arn)
        })
    }

    async fn rule_targets(&self, rule: &str) -> GatewayResult<Vec<RuleTarget>> {
        Ok(self.with(|s| s.targets.get(rule).cloned().unwrap_or_default()))
    }

    async fn remove_targets(&self, rule: &str, ids: &[String]) -> GatewayResult<()> {
        self.with(|s| {
            s.targets
                .entry(rule.to_string())
                .or_default()
                .retain(|t| !ids.contains(&t.id));
            s.record(format!("remove_targets {}", rule));
            Ok(())
        })
    }

    async fn put_target(&self, rule: &str, target: &RuleTarget) -> GatewayResult<()> {
        self.with(|s| {
            let targets = s.targets.entry(rule.to_string()).or_default();
            targets.retain(|t| t.id != target.id);
            targets.push(target.clone());
            s.record(format!("put_target {}", rule));
            Ok(())
        })
    }
}

#[async_trait]
impl RegistryGateway for FakeCloud {
    async fn find_repository(&self, name: &str) -> GatewayResult<Option<Repository>> {
        Ok(self.with(|s| s.repositories.get(name).cloned()))
    }

    async fn create_repository(&self, name: &str) -> GatewayResult<Repository> {
        self.with(|s| {
            let repository = Repository {
                name: name.to_string(),
                uri: format!("{}.dkr.ecr.{}.amazonaws.com/{}", ACCOUNT, REGION, name),
            };
            s.repositories.insert(name.to_string(), repository.clone());
            s.record(format!("create_repository {}", name));
            Ok(repository)
        })
    }

    async fn delete_repository(&self, name: &str) -> GatewayResult<()> {
        self.with(|s| {
            s.repositories
                .remove(name)
                .ok_or_else(|| GatewayError::NotFound(name.to_string()))?;
            s.record(format!("delete_repository {}", name));
            Ok(())
        })
    }

    async fn authorization(&self) -> GatewayResult<RegistryAuth> {
        Ok(RegistryAuth {
            username: "AWS".to_string(),
            password: "token".to_string(),
            endpoint: format!("https://{}.dkr.ecr.{}.amazonaws.com", ACCOUNT, REGION),
        })
    }
}

#[async_trait]
impl ComputeGateway for FakeCloud {
    async fn find_cluster(&self, name: &str) -> GatewayResult<Option<Cluster>> {
        Ok(self.with(|s| s.clusters.get(name).cloned()))
    }

    async fn create_cluster(&self, name: &str) -> GatewayResult<Cluster> {
        self.with(|s| {
            let cluster = Cluster {
                name: name.to_string(),
                arn: format!("arn:aws:ecs:{}:{}:cluster/{}", REGION, ACCOUNT, name),
                status: "ACTIVE".to_string(),
            };
            s.clusters.insert(name.to_string(), cluster.clone());
            s.record(format!("create_cluster {}", name));
            Ok(cluster)
        })
    }

    async fn put_capacity_providers(
        &self,
        cluster: &str,
        providers: &[CapacityProvider],
    ) -> GatewayResult<()> {
        self.with(|s| {
            s.record(format!(
                "put_capacity_providers {} {}",
                cluster,
                providers.len()
            ));
            Ok(())
        })
    }

    async fn enable_enhanced_insights(&self, cluster: &str) -> GatewayResult<()> {
        self.with(|s| {
            s.record(format!("enable_enhanced_insights {}", cluster));
            Ok(())
        })
    }

    async fn delete_cluster(&self, cluster: &str) -> GatewayResult<()> {
        self.with(|s| {
            let busy = s
                .services
                .iter()
                .any(|((c, _), svc)| c == cluster && svc.is_active());
            if busy {
                return Err(GatewayError::DependencyViolation(cluster.to_string()));
            }
            let entry = s
                .clusters
                .get_mut(cluster)
                .filter(|c| c.is_active())
                .ok_or_else(|| GatewayError::NotFound(cluster.to_string()))?;
            entry.status = "INACTIVE".to_string();
            s.record(format!("delete_cluster {}", cluster));
            Ok(())
        })
    }

    async fn register_task_definition(&self, spec: &TaskDefinitionSpec) -> GatewayResult<String> {
        self.with(|s| {
            s.revisions += 1;
            let arn = format!(
                "arn:aws:ecs:{}:{}:task-definition/{}:{}",
                REGION, ACCOUNT, spec.family, s.revisions
            );
            s.task_definitions
                .entry(spec.family.clone())
                .or_default()
                .push(arn.clone());
            s.record(format!("register_task_definition {}", spec.family));
            Ok(arn)
        })
    }

    async fn task_definitions(&self, family: &str) -> GatewayResult<Vec<String>> {
        Ok(self.with(|s| s.task_definitions.get(family).cloned().unwrap_or_default()))
    }

    async fn deregister_task_definition(&self, arn: &str) -> GatewayResult<()> {
        self.with(|s| {
            let mut found = false;
            for revisions in s.task_definitions.values_mut() {
                let before = revisions.len();
                revisions.retain(|r| r != arn);
                found |= revisions.len() != before;
            }
            if !found {
                return Err(GatewayError::NotFound(arn.to_string()));
            }
            s.record(format!("deregister_task_definition {}", arn));
            Ok(())
        })
    }

    async fn find_service(
        &self,
        cluster: &str,
        name: &str,
    ) -> GatewayResult<Option<ServiceSummary>> {
        Ok(self.with(|s| {
            s.services
                .get(&(cluster.to_string(), name.to_string()))
                .cloned()
        }))
    }

    async fn create_service(&self, spec: &ServiceSpec) -> GatewayResult<ServiceSummary> {
        self.with(|s| {
            if s.active_service(&spec.cluster, &spec.name).is_some() {
                return Err(GatewayError::AlreadyExists(spec.name.clone()));
            }
            let summary = ServiceSummary {
                name: spec.name.clone(),
                arn: format!(
                    "arn:aws:ecs:{}:{}:service/{}/{}",
                    REGION, ACCOUNT, spec.cluster, spec.name
                ),
                status: "ACTIVE".to_string(),
                task_definition: spec.task_definition_arn.clone(),
                desired_count: spec.desired_count,
                running_count: spec.desired_count,
                load_balancers: spec.load_balancer.iter().cloned().collect(),
            };
            s.services.insert(
                (spec.cluster.clone(), spec.name.clone()),
                summary.clone(),
            );
            s.record(format!("create_service {}", spec.name));
            Ok(summary)
        })
    }

    async fn update_service(&self, spec: &ServiceSpec) -> GatewayResult<ServiceSummary> {
        self.with(|s| {
            let service = s
                .services
                .get_mut(&(spec.cluster.clone(), spec.name.clone()))
                .filter(|svc| svc.is_active())
                .ok_or_else(|| GatewayError::NotFound(spec.name.clone()))?;
            service.task_definition = spec.task_definition_arn.clone();
            service.desired_count = spec.desired_count;
            service.running_count = spec.desired_count;
            service.load_balancers = spec.load_balancer.iter().cloned().collect();
            let summary = service.clone();
            s.record(format!("update_service {}", spec.name));
            Ok(summary)
        })
    }

    async fn delete_service(&self, cluster: &str, name: &str) -> GatewayResult<()> {
        self.with(|s| {
            let service = s
                .services
                .get_mut(&(cluster.to_string(), name.to_string()))
                .filter(|svc| svc.is_active())
                .ok_or_else(|| GatewayError::NotFound(name.to_string()))?;
            service.status = "INACTIVE".to_string();
            service.desired_count = 0;
            service.running_count = 0;
            s.record(format!("delete_service {}", name));
            Ok(())
        })
    }

    async fn service_tasks(
        &self,
        cluster: &str,
        service: &str,
    ) -> GatewayResult<Vec<TaskSummary>> {
        Ok(self.with(|s| match s.active_service(cluster, service) {
            Some(svc) if svc.running_count > 0 => vec![TaskSummary {
                arn: format!("arn:aws:ecs:{}:{}:task/{}/1", REGION, ACCOUNT, cluster),
                last_status: "RUNNING".to_string(),
                eni_id: Some("eni-0001".to_string()),
                public_ip: Some(TASK_PUBLIC_IP.to_string()),
            }],
            _ => Vec::new(),
        }))
    }
}

#[async_trait]
impl LoadBalancerGateway for FakeCloud {
    /// A fresh load balancer reports `provisioning` once, then `active`
    async fn find_load_balancer(&self, name: &str) -> GatewayResult<Option<LoadBalancer>> {
        Ok(self.with(|s| {
            let lb = s.load_balancers.get_mut(name)?;
            let seen = lb.clone();
            lb.state = "active".to_string();
            Some(seen)
        }))
    }

    async fn create_load_balancer(
        &self,
        name: &str,
        _subnets: &[String],
        _security_groups: &[String],
    ) -> GatewayResult<LoadBalancer> {
        self.with(|s| {
            let id = s.id();
            let lb = LoadBalancer {
                arn: format!(
                    "arn:aws:elasticloadbalancing:{}:{}:loadbalancer/app/{}/{}",
                    REGION, ACCOUNT, name, id
                ),
                name: name.to_string(),
                dns_name: format!("{}-{}.{}.elb.amazonaws.com", name, id, REGION),
                state: "provisioning".to_string(),
            };
            s.load_balancers.insert(name.to_string(), lb.clone());
            s.record(format!("create_load_balancer {}", name));
            Ok(lb)
        })
    }

    async fn delete_load_balancer(&self, arn: &str) -> GatewayResult<()> {
        self.with(|s| {
            let name = s
                .load_balancers
                .values()
                .find(|lb| lb.arn == arn)
                .map(|lb| lb.name.clone())
                .ok_or_else(|| GatewayError::NotFound(arn.to_string()))?;
            s.load_balancers.remove(&name);
            s.listeners.retain(|(lb, _)| lb != arn);
            s.record(format!("delete_load_balancer {}", name));
            Ok(())
        })
    }

    async fn find_target_group(&self, name: &str) -> GatewayResult<Option<TargetGroup>> {
        Ok(self.with(|s| s.target_groups.get(name).cloned()))
    }

    async fn create_target_group(&self, spec: &TargetGroupSpec) -> GatewayResult<TargetGroup> {
        self.with(|s| {
            let id = s.id();
            let group = TargetGroup {
                arn: format!(
                    "arn:aws:elasticloadbalancing:{}:{}:targetgroup/{}/{}",
                    REGION, ACCOUNT, spec.name, id
                ),
                name: spec.name.clone(),
                port: spec.port,
                health_check_path: Some(spec.health_check.path.clone()),
            };
            s.target_groups.insert(spec.name.clone(), group.clone());
            s.record(format!("create_target_group {}", spec.name));
            Ok(group)
        })
    }

    async fn set_health_check_path(&self, arn: &str, path: &str) -> GatewayResult<()> {
        self.with(|s| {
            let group = s
                .target_groups
                .values_mut()
                .find(|g| g.arn == arn)
                .ok_or_else(|| GatewayError::NotFound(arn.to_string()))?;
            group.health_check_path = Some(path.to_string());
            s.record(format!("set_health_check_path {}", path));
            Ok(())
        })
    }

    async fn delete_target_group(&self, arn: &str) -> GatewayResult<()> {
        self.with(|s| {
            if s
                .listeners
                .iter()
                .any(|(_, l)| l.target_group_arn.as_deref() == Some(arn))
            {
                return Err(GatewayError::DependencyViolation(arn.to_string()));
            }
            let name = s
                .target_groups
                .values()
                .find(|g| g.arn == arn)
                .map(|g| g.name.clone())
                .ok_or_else(|| GatewayError::NotFound(arn.to_string()))?;
            s.target_groups.remove(&name);
            s.record(format!("delete_target_group {}", name));
            Ok(())
        })
    }

    async fn listeners(&self, load_balancer_arn: &str) -> GatewayResult<Vec<Listener>> {
        Ok(self.with(|s| {
            s.listeners
                .iter()
                .filter(|(lb, _)| lb == load_balancer_arn)
                .map(|(_, l)| l.clone())
                .collect()
        }))
    }

    async fn create_listener(
        &self,
        load_balancer_arn: &str,
        port: u16,
        target_group_arn: &str,
    ) -> GatewayResult<Listener> {
        self.with(|s| {
            let listener = Listener {
                arn: format!("{}/listener/{}", load_balancer_arn, port),
                port,
                target_group_arn: Some(target_group_arn.to_string()),
            };
            s.listeners
                .push((load_balancer_arn.to_string(), listener.clone()));
            s.record(format!("create_listener {}", port));
            Ok(listener)
        })
    }

    async fn set_listener_target(
        &self,
        listener_arn: &str,
        target_group_arn: &str,
    ) -> GatewayResult<()> {
        self.with(|s| {
            let (_, listener) = s
                .listeners
                .iter_mut()
                .find(|(_, l)| l.arn == listener_arn)
                .ok_or_else(|| GatewayError::NotFound(listener_arn.to_string()))?;
            listener.target_group_arn = Some(target_group_arn.to_string());
            s.record(format!("set_listener_target {}", listener_arn));
            Ok(())
        })
    }

    async fn delete_listener(&self, arn: &str) -> GatewayResult<()> {
        self.with(|s| {
            let before = s.listeners.len();
            s.listeners.retain(|(_, l)| l.arn != arn);
            if s.listeners.len() == before {
                return Err(GatewayError::NotFound(arn.to_string()));
            }
            s.record(format!("delete_listener {}", arn));
            Ok(())
        })
    }

    async fn target_health(&self, target_group_arn: &str) -> GatewayResult<Vec<TargetHealth>> {
        Ok(self.with(|s| {
            let serving = s.services.values().any(|svc| {
                svc.is_active()
                    && svc.running_count > 0
                    && svc
                        .load_balancers
                        .iter()
                        .any(|lb| lb.target_group_arn == target_group_arn)
            });
            if serving {
                vec![TargetHealth {
                    target_id: "10.0.0.10".to_string(),
                    state: "healthy".to_string(),
                }]
            } else {
                Vec::new()
            }
        }))
    }
}

#[async_trait]
impl CertificateGateway for FakeCloud {
    async fn list_certificates(&self) -> GatewayResult<Vec<CertificateSummary>> {
        Ok(self.with(|s| {
            s.refresh_certificates();
            s.certificates
                .iter()
                .map(|c| CertificateSummary {
                    arn: c.arn.clone(),
                    domain_name: c.domain.clone(),
                    subject_alternative_names: vec![c.domain.clone()],
                    status: c.status.clone(),
                })
                .collect()
        }))
    }

    async fn request_certificate(
        &self,
        domain: &str,
        idempotency_token: &str,
    ) -> GatewayResult<String> {
        self.with(|s| {
            let arn = format!(
                "arn:aws:acm:us-east-1:{}:certificate/{}-{}",
                ACCOUNT,
                idempotency_token,
                s.id()
            );
            let base = domain.trim_start_matches("*.");
            s.certificates.push(FakeCertificate {
                arn: arn.clone(),
                domain: domain.to_string(),
                status: CertificateStatus::PendingValidation,
                validation: Some(ValidationRecord {
                    domain: domain.to_string(),
                    name: format!("_3b1f.{}.", base),
                    record_type: "CNAME".to_string(),
                    value: "_9c2e.acm-validations.aws.".to_string(),
                    status: "PENDING_VALIDATION".to_string(),
                }),
            });
            s.record(format!("request_certificate {}", domain));
            Ok(arn)
        })
    }

    async fn describe_certificate(&self, arn: &str) -> GatewayResult<Option<CertificateDetail>> {
        Ok(self.with(|s| {
            s.refresh_certificates();
            s.certificates
                .iter()
                .find(|c| c.arn == arn)
                .map(|c| CertificateDetail {
                    arn: c.arn.clone(),
                    domain_name: c.domain.clone(),
                    status: c.status.clone(),
                    validation_records: c.validation.iter().cloned().collect(),
                    validation_options: 1,
                })
        }))
    }
}

#[async_trait]
impl CdnGateway for FakeCloud {
    async fn list_distributions(&self) -> GatewayResult<Vec<DistributionSummary>> {
        Ok(self.with(|s| {
            s.distributions
                .values()
                .map(|d| DistributionSummary {
                    id: d.id.clone(),
                    domain_name: d.domain_name.clone(),
                    aliases: d.aliases.clone(),
                    status: d.status.clone(),
                    enabled: d.enabled,
                })
                .collect()
        }))
    }

    /// Changes report `InProgress` on one read, then `Deployed`
    async fn get_distribution(&self, id: &str) -> GatewayResult<Option<Distribution>> {
        Ok(self.with(|s| {
            let dist = s.distributions.get_mut(id)?;
            let seen = dist.clone();
            dist.status = "Deployed".to_string();
            Some(seen)
        }))
    }

    async fn create_distribution(
        &self,
        spec: &DistributionSpec,
    ) -> GatewayResult<DistributionSummary> {
        self.with(|s| {
            let id = format!("E{:05}", s.id());
            let dist = Distribution {
                id: id.clone(),
                etag: format!("ETAG{}", s.id()),
                domain_name: format!("d{}.cloudfront.net", id.to_lowercase()),
                status: "InProgress".to_string(),
                enabled: true,
                aliases: spec.aliases.clone(),
                certificate_arn: spec.certificate_arn.clone(),
                price_class: PRICE_CLASS_ALL.to_string(),
                origin_protocol: match &spec.origin {
                    OriginSpec::Custom { protocol, .. } => Some(*protocol),
                    OriginSpec::Bucket { .. } => None,
                },
                default_ttl: Some(spec.cache.default_ttl()),
            };
            let summary = DistributionSummary {
                id: id.clone(),
                domain_name: dist.domain_name.clone(),
                aliases: dist.aliases.clone(),
                status: dist.status.clone(),
                enabled: true,
            };
            s.distributions.insert(id, dist);
            s.record(format!("create_distribution {}", spec.aliases.join(",")));
            Ok(summary)
        })
    }

    async fn update_distribution(
        &self,
        id: &str,
        etag: &str,
        patch: &DistributionPatch,
    ) -> GatewayResult<()> {
        self.with(|s| {
            let next = format!("ETAG{}", s.id());
            let dist = s
                .distributions
                .get_mut(id)
                .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
            if dist.etag != etag {
                return Err(GatewayError::other("UpdateDistribution", "PreconditionFailed"));
            }
            if let Some(arn) = &patch.certificate_arn {
                dist.certificate_arn = Some(arn.clone());
            }
            if let Some(class) = &patch.price_class {
                dist.price_class = class.clone();
            }
            if let Some(protocol) = patch.origin_protocol {
                dist.origin_protocol = Some(protocol);
            }
            if let Some(ttl) = patch.default_ttl {
                dist.default_ttl = Some(ttl);
            }
            if let Some(enabled) = patch.enabled {
                dist.enabled = enabled;
            }
            dist.etag = next;
            dist.status = "InProgress".to_string();
            s.record(format!("update_distribution {}", id));
            Ok(())
        })
    }

    async fn delete_distribution(&self, id: &str, etag: &str) -> GatewayResult<()> {
        self.with(|s| {
            let dist = s
                .distributions
                .get(id)
                .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
            if dist.enabled || dist.status != "Deployed" {
                return Err(GatewayError::DependencyViolation(id.to_string()));
            }
            if dist.etag != etag {
                return Err(GatewayError::other("DeleteDistribution", "PreconditionFailed"));
            }
            s.distributions.remove(id);
            s.record(format!("delete_distribution {}", id));
            Ok(())
        })
    }

    async fn create_invalidation(
        &self,
        id: &str,
        paths: &[String],
        _caller_reference: &str,
    ) -> GatewayResult<String> {
        self.with(|s| {
            s.invalidations.push((id.to_string(), paths.to_vec()));
            s.record(format!("create_invalidation {}", id));
            Ok(format!("I{}", s.id()))
        })
    }
}

#[async_trait]
impl DnsGateway for FakeCloud {
    async fn find_hosted_zone(&self, name: &str) -> GatewayResult<Option<HostedZone>> {
        Ok(self.with(|s| {
            s.zones
                .iter()
                .find(|z| normalize(&z.name) == normalize(name))
                .cloned()
        }))
    }

    async fn create_hosted_zone(
        &self,
        name: &str,
        _caller_reference: &str,
    ) -> GatewayResult<HostedZone> {
        self.with(|s| {
            let zone = HostedZone {
                id: format!("Z{}", s.id()),
                name: format!("{}.", normalize(name)),
            };
            s.zones.push(zone.clone());
            s.record(format!("create_hosted_zone {}", name));
            Ok(zone)
        })
    }

    async fn zone_nameservers(&self, _zone: &HostedZone) -> GatewayResult<Vec<String>> {
        Ok(ZONE_NAMESERVERS.iter().map(|n| format!("{}.", n)).collect())
    }

    async fn find_record(
        &self,
        zone_id: &str,
        name: &str,
        record_type: RecordType,
    ) -> GatewayResult<Option<RecordSet>> {
        Ok(self.with(|s| {
            s.records.get(zone_id).and_then(|records| {
                records
                    .iter()
                    .find(|r| {
                        normalize(&r.name) == normalize(name) && r.record_type == record_type
                    })
                    .cloned()
            })
        }))
    }

    async fn change_record(
        &self,
        zone_id: &str,
        action: ChangeAction,
        record: &RecordSet,
    ) -> GatewayResult<()> {
        self.with(|s| {
            let records = s.records.entry(zone_id.to_string()).or_default();
            let position = records.iter().position(|r| {
                normalize(&r.name) == normalize(&record.name) && r.record_type == record.record_type
            });
            match (action, position) {
                (ChangeAction::Create, Some(_)) => {
                    return Err(GatewayError::AlreadyExists(record.name.clone()));
                }
                (ChangeAction::Delete, None) => {
                    return Err(GatewayError::NotFound(record.name.clone()));
                }
                (ChangeAction::Delete, Some(i)) => {
                    records.remove(i);
                }
                (_, Some(i)) => records[i] = record.clone(),
                (_, None) => records.push(record.clone()),
            }
            s.record(format!(
                "change_record {:?} {} {}",
                action,
                record.record_type.as_str(),
                normalize(&record.name)
            ));
            Ok(())
        })
    }
}

#[async_trait]
impl StorageGateway for FakeCloud {
    async fn bucket_exists(&self, bucket: &str) -> GatewayResult<bool> {
        Ok(self.with(|s| s.buckets.contains_key(bucket)))
    }

    async fn create_bucket(&self, bucket: &str, _region: &str) -> GatewayResult<()> {
        self.with(|s| {
            s.buckets.insert(
                bucket.to_string(),
                FakeBucket {
                    block: Some(PublicAccessBlock {
                        block_public_acls: true,
                        ignore_public_acls: true,
                        block_public_policy: true,
                        restrict_public_buckets: true,
                    }),
                    ..Default::default()
                },
            );
            s.record(format!("create_bucket {}", bucket));
            Ok(())
        })
    }

    async fn website_config(&self, bucket: &str) -> GatewayResult<Option<WebsiteConfig>> {
        self.with(|s| {
            s.buckets
                .get(bucket)
                .map(|b| b.website.clone())
                .ok_or_else(|| GatewayError::NotFound(bucket.to_string()))
        })
    }

    async fn put_website_config(
        &self,
        bucket: &str,
        config: &WebsiteConfig,
    ) -> GatewayResult<()> {
        self.with(|s| {
            let b = s
                .buckets
                .get_mut(bucket)
                .ok_or_else(|| GatewayError::NotFound(bucket.to_string()))?;
            b.website = Some(config.clone());
            s.record(format!("put_website_config {}", bucket));
            Ok(())
        })
    }

    async fn public_access_block(&self, bucket: &str) -> GatewayResult<Option<PublicAccessBlock>> {
        Ok(self.with(|s| s.buckets.get(bucket).and_then(|b| b.block)))
    }

    async fn put_public_access_block(
        &self,
        bucket: &str,
        block: &PublicAccessBlock,
    ) -> GatewayResult<()> {
        self.with(|s| {
            let b = s
                .buckets
                .get_mut(bucket)
                .ok_or_else(|| GatewayError::NotFound(bucket.to_string()))?;
            b.block = Some(*block);
            s.record(format!("put_public_access_block {}", bucket));
            Ok(())
        })
    }

    async fn bucket_policy(&self, bucket: &str) -> GatewayResult<Option<String>> {
        Ok(self.with(|s| s.buckets.get(bucket).and_then(|b| b.policy.clone())))
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> GatewayResult<()> {
        self.with(|s| {
            let b = s
                .buckets
                .get_mut(bucket)
                .ok_or_else(|| GatewayError::NotFound(bucket.to_string()))?;
            b.policy = Some(policy.to_string());
            s.record(format!("put_bucket_policy {}", bucket));
            Ok(())
        })
    }

    async fn list_objects(&self, bucket: &str) -> GatewayResult<Vec<ObjectSummary>> {
        self.with(|s| {
            let b = s
                .buckets
                .get(bucket)
                .ok_or_else(|| GatewayError::NotFound(bucket.to_string()))?;
            Ok(b.objects
                .iter()
                .map(|(key, (etag, _))| ObjectSummary {
                    key: key.clone(),
                    etag: etag.clone(),
                    size: 0,
                })
                .collect())
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> GatewayResult<()> {
        let etag = hex::encode(Md5::digest(&body));
        self.with(|s| {
            let b = s
                .buckets
                .get_mut(bucket)
                .ok_or_else(|| GatewayError::NotFound(bucket.to_string()))?;
            b.objects
                .insert(key.to_string(), (etag, content_type.to_string()));
            s.record(format!("put_object {}", key));
            Ok(())
        })
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> GatewayResult<()> {
        self.with(|s| {
            let b = s
                .buckets
                .get_mut(bucket)
                .ok_or_else(|| GatewayError::NotFound(bucket.to_string()))?;
            for key in keys {
                b.objects.remove(key);
            }
            s.record(format!("delete_objects {} {}", bucket, keys.len()));
            Ok(())
        })
    }

    async fn delete_bucket(&self, bucket: &str) -> GatewayResult<()> {
        self.with(|s| {
            let b = s
                .buckets
                .get(bucket)
                .ok_or_else(|| GatewayError::NotFound(bucket.to_string()))?;
            if !b.objects.is_empty() {
                return Err(GatewayError::DependencyViolation(bucket.to_string()));
            }
            s.buckets.remove(bucket);
            s.record(format!("delete_bucket {}", bucket));
            Ok(())
        })
    }
}

/// Public DNS that reports a fixed nameserver set
pub struct FakeResolver {
    pub nameservers: Vec<String>,
}

impl FakeResolver {
    /// Delegation already points at the zone
    pub fn delegated() -> Self {
        Self {
            nameservers: ZONE_NAMESERVERS.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn registrar_default() -> Self {
        Self {
            nameservers: vec![
                "ns1.registrar-parking.example".to_string(),
                "ns2.registrar-parking.example".to_string(),
            ],
        }
    }
}

#[async_trait]
impl PublicResolver for FakeResolver {
    async fn nameservers(&self, _domain: &str) -> GatewayResult<Vec<String>> {
        Ok(self.nameservers.clone())
    }
}

/// Every URL answers with the same status
pub struct FakeProbe {
    pub status: u16,
    pub calls: AtomicUsize,
}

impl FakeProbe {
    pub fn ok() -> Self {
        Self {
            status: 200,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl HttpProbe for FakeProbe {
    async fn get(&self, _url: &str, _timeout: Duration) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ProbeResult::Status(self.status)
    }
}

/// Answers prompts with a fixed reply and counts them
pub struct CountingConfirm {
    pub answer: bool,
    pub asked: AtomicUsize,
    pub prompts: Mutex<Vec<Prompt>>,
}

impl CountingConfirm {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            asked: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl launchflow_cloud::Confirm for CountingConfirm {
    fn confirm(&self, prompt: &Prompt) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.clone());
        self.answer
    }
}

/// Records builds and pushes without running docker
#[derive(Default)]
pub struct FakeImageBuilder {
    pub pushed: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageBuilder for FakeImageBuilder {
    async fn build(
        &self,
        _dockerfile: &str,
        platform: &str,
        _context: &Path,
    ) -> Result<String, CloudError> {
        assert_eq!(platform, "linux/amd64");
        Ok("launchflow-build:local".to_string())
    }

    async fn push(
        &self,
        _local_tag: &str,
        remote: &str,
        _auth: &RegistryAuth,
    ) -> Result<String, CloudError> {
        self.pushed.lock().unwrap().push(remote.to_string());
        Ok(remote.to_string())
    }
}

pub fn sizing(replicas: u32) -> ComputeSizing {
    ComputeSizing {
        cpu: "256".to_string(),
        memory: "512".to_string(),
        ephemeral_storage_gib: 21,
        replicas,
        spot: true,
    }
}

/// Fargate app behind `domain` in the given mode; `None` keeps it private
pub fn fargate_state(mode: Option<ExposureMode>, allow_create: bool) -> DesiredState {
    DesiredState {
        app_name: "demo".to_string(),
        service_name: "demo-service".to_string(),
        region: REGION.to_string(),
        account_id: ACCOUNT.to_string(),
        platform: Platform::Fargate,
        sizing: sizing(1),
        port: 8080,
        health_check_path: "/health".to_string(),
        image: ImageSource::Prebuilt("public.ecr.aws/nginx/nginx:latest".to_string()),
        environment: BTreeMap::from([("RUST_LOG".to_string(), "info".to_string())]),
        iam: IamPolicySet::with_defaults(),
        public: mode.map(|mode| PublicExposure {
            domain: "app.example.com".to_string(),
            mode,
            certificate_id: None,
        }),
        static_site: None,
        allow_create,
    }
}

pub fn static_site_state(folder: &Path, domain: Option<&str>) -> DesiredState {
    DesiredState {
        app_name: "docs".to_string(),
        service_name: "docs-service".to_string(),
        region: REGION.to_string(),
        account_id: ACCOUNT.to_string(),
        platform: Platform::StaticSite,
        sizing: sizing(1),
        port: 80,
        health_check_path: "/".to_string(),
        image: ImageSource::Prebuilt(String::new()),
        environment: BTreeMap::new(),
        iam: IamPolicySet::default(),
        public: domain.map(|domain| PublicExposure {
            domain: domain.to_string(),
            mode: ExposureMode::Production,
            certificate_id: None,
        }),
        static_site: Some(StaticSite {
            folder: folder.to_path_buf(),
            bucket_name: "docs-static-site".to_string(),
        }),
        allow_create: true,
    }
}

/// Fakes wired together for one test
pub struct Harness {
    pub cloud: FakeCloud,
    pub clock: ManualClock,
    pub resolver: FakeResolver,
    pub confirm: CountingConfirm,
    pub probe: FakeProbe,
    pub images: FakeImageBuilder,
}

impl Harness {
    pub fn new(cloud: FakeCloud) -> Self {
        Self {
            cloud,
            clock: ManualClock::new(),
            resolver: FakeResolver::delegated(),
            confirm: CountingConfirm::answering(true),
            probe: FakeProbe::ok(),
            images: FakeImageBuilder::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: FakeResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn answering(mut self, answer: bool) -> Self {
        self.confirm = CountingConfirm::answering(answer);
        self
    }

    pub fn deployer(&self) -> Deployer<'_> {
        Deployer {
            cloud: &self.cloud,
            clock: &self.clock,
            reporter: &TracingReporter,
            resolver: &self.resolver,
            confirm: &self.confirm,
            probe: &self.probe,
            images: &self.images,
            assume_yes: false,
            build_only: false,
        }
    }

    pub fn teardown(&self, assume_yes: bool) -> Teardown<'_> {
        Teardown {
            cloud: &self.cloud,
            clock: &self.clock,
            reporter: &TracingReporter,
            confirm: &self.confirm,
            assume_yes,
        }
    }
}
