use crate::error::GatewayResult;
use crate::model::CapacityProvider;
use async_trait::async_trait;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub name: String,
    pub arn: String,
    /// ACTIVE, PROVISIONING, INACTIVE, ...
    pub status: String,
}

impl Cluster {
    pub fn is_active(&self) -> bool {
        self.status != "INACTIVE"
    }
}

/// A Fargate task definition revision to register
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinitionSpec {
    pub family: String,
    pub container_name: String,
    pub image: String,
    pub cpu: String,
    pub memory: String,
    pub ephemeral_storage_gib: Option<u32>,
    pub execution_role_arn: String,
    pub environment: BTreeMap<String, String>,
    pub port: u16,
    pub log_group: String,
    pub log_region: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancerAttachment {
    pub target_group_arn: String,
    pub container_name: String,
    pub container_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub cluster: String,
    pub name: String,
    pub task_definition_arn: String,
    pub desired_count: u32,
    pub capacity_provider: CapacityProvider,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    pub load_balancer: Option<LoadBalancerAttachment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSummary {
    pub name: String,
    pub arn: String,
    /// ACTIVE, DRAINING or INACTIVE
    pub status: String,
    pub task_definition: String,
    pub desired_count: u32,
    pub running_count: u32,
    pub load_balancers: Vec<LoadBalancerAttachment>,
}

impl ServiceSummary {
    pub fn is_active(&self) -> bool {
        self.status == "ACTIVE"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub arn: String,
    /// PROVISIONING, PENDING, RUNNING, STOPPED, ...
    pub last_status: String,
    /// `networkInterfaceId` from the task's ENI attachment
    pub eni_id: Option<String>,
    /// `publicIPv4Address` from the attachment, when the provider reports it
    pub public_ip: Option<String>,
}

/// ECS clusters, task definitions, services and tasks
#[async_trait]
pub trait ComputeGateway: Send + Sync {
    async fn find_cluster(&self, name: &str) -> GatewayResult<Option<Cluster>>;

    async fn create_cluster(&self, name: &str) -> GatewayResult<Cluster>;

    async fn put_capacity_providers(
        &self,
        cluster: &str,
        providers: &[CapacityProvider],
    ) -> GatewayResult<()>;

    /// Turns on enhanced Container Insights
    async fn enable_enhanced_insights(&self, cluster: &str) -> GatewayResult<()>;

    async fn delete_cluster(&self, cluster: &str) -> GatewayResult<()>;

    /// Registers a new revision and returns its ARN
    async fn register_task_definition(&self, spec: &TaskDefinitionSpec) -> GatewayResult<String>;

    /// ARNs of ACTIVE revisions in `family`
    async fn task_definitions(&self, family: &str) -> GatewayResult<Vec<String>>;

    async fn deregister_task_definition(&self, arn: &str) -> GatewayResult<()>;

    async fn find_service(
        &self,
        cluster: &str,
        name: &str,
    ) -> GatewayResult<Option<ServiceSummary>>;

    async fn create_service(&self, spec: &ServiceSpec) -> GatewayResult<ServiceSummary>;

    /// Points the service at `spec` and forces a new deployment
    async fn update_service(&self, spec: &ServiceSpec) -> GatewayResult<ServiceSummary>;

    /// Force delete, draining running tasks
    async fn delete_service(&self, cluster: &str, name: &str) -> GatewayResult<()>;

    async fn service_tasks(&self, cluster: &str, service: &str)
    -> GatewayResult<Vec<TaskSummary>>;
}
