use crate::error::GatewayResult;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogGroup {
    pub name: String,
    pub arn: String,
    pub retention_days: Option<i32>,
}

/// CloudWatch Logs
#[async_trait]
pub trait LogGateway: Send + Sync {
    async fn find_log_group(&self, name: &str) -> GatewayResult<Option<LogGroup>>;

    async fn create_log_group(&self, name: &str, retention_days: i32) -> GatewayResult<LogGroup>;

    /// Current document of a named account-level resource policy
    async fn resource_policy(&self, name: &str) -> GatewayResult<Option<String>>;

    async fn put_resource_policy(&self, name: &str, document: &str) -> GatewayResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRule {
    pub name: String,
    pub arn: String,
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTarget {
    pub id: String,
    pub arn: String,
}

/// EventBridge rules and their targets
#[async_trait]
pub trait EventGateway: Send + Sync {
    async fn find_rule(&self, name: &str) -> GatewayResult<Option<EventRule>>;

    /// Creates or replaces the rule; returns its ARN
    async fn put_rule(&self, name: &str, pattern: &str, description: &str)
    -> GatewayResult<String>;

    async fn rule_targets(&self, rule: &str) -> GatewayResult<Vec<RuleTarget>>;

    async fn remove_targets(&self, rule: &str, ids: &[String]) -> GatewayResult<()>;

    async fn put_target(&self, rule: &str, target: &RuleTarget) -> GatewayResult<()>;
}
