use crate::error::GatewayResult;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancer {
    pub arn: String,
    pub name: String,
    pub dns_name: String,
    /// provisioning, active, failed, ...
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheck {
    pub path: String,
    pub interval_seconds: i32,
    pub timeout_seconds: i32,
    pub healthy_threshold: i32,
    pub unhealthy_threshold: i32,
    pub matcher: String,
}

impl HealthCheck {
    pub fn http(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            interval_seconds: 30,
            timeout_seconds: 5,
            healthy_threshold: 2,
            unhealthy_threshold: 3,
            matcher: "200".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroupSpec {
    pub name: String,
    pub vpc_id: String,
    pub port: u16,
    pub health_check: HealthCheck,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroup {
    pub arn: String,
    pub name: String,
    pub port: u16,
    pub health_check_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    pub arn: String,
    pub port: u16,
    /// Target group of the default forward action
    pub target_group_arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetHealth {
    pub target_id: String,
    /// healthy, unhealthy, initial, draining, ...
    pub state: String,
}

impl TargetHealth {
    pub fn is_healthy(&self) -> bool {
        self.state == "healthy"
    }
}

/// Application load balancers, target groups and listeners
#[async_trait]
pub trait LoadBalancerGateway: Send + Sync {
    async fn find_load_balancer(&self, name: &str) -> GatewayResult<Option<LoadBalancer>>;

    /// Internet-facing, IPv4
    async fn create_load_balancer(
        &self,
        name: &str,
        subnets: &[String],
        security_groups: &[String],
    ) -> GatewayResult<LoadBalancer>;

    async fn delete_load_balancer(&self, arn: &str) -> GatewayResult<()>;

    async fn find_target_group(&self, name: &str) -> GatewayResult<Option<TargetGroup>>;

    /// HTTP, target type `ip`
    async fn create_target_group(&self, spec: &TargetGroupSpec) -> GatewayResult<TargetGroup>;

    async fn set_health_check_path(&self, arn: &str, path: &str) -> GatewayResult<()>;

    async fn delete_target_group(&self, arn: &str) -> GatewayResult<()>;

    async fn listeners(&self, load_balancer_arn: &str) -> GatewayResult<Vec<Listener>>;

    /// HTTP listener forwarding to `target_group_arn`
    async fn create_listener(
        &self,
        load_balancer_arn: &str,
        port: u16,
        target_group_arn: &str,
    ) -> GatewayResult<Listener>;

    async fn set_listener_target(
        &self,
        listener_arn: &str,
        target_group_arn: &str,
    ) -> GatewayResult<()>;

    async fn delete_listener(&self, arn: &str) -> GatewayResult<()>;

    async fn target_health(&self, target_group_arn: &str) -> GatewayResult<Vec<TargetHealth>>;
}
