use crate::error::GatewayResult;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub name: String,
    pub arn: String,
}

/// Caller identity plus IAM role management
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    async fn account_id(&self) -> GatewayResult<String>;

    async fn find_role(&self, name: &str) -> GatewayResult<Option<Role>>;

    async fn create_role(&self, name: &str, trust_policy: &str) -> GatewayResult<Role>;

    /// ARNs of the managed policies attached to `role`
    async fn attached_policies(&self, role: &str) -> GatewayResult<Vec<String>>;

    async fn attach_policy(&self, role: &str, policy_arn: &str) -> GatewayResult<()>;

    async fn detach_policy(&self, role: &str, policy_arn: &str) -> GatewayResult<()>;

    /// Decoded inline policy document, if present
    async fn inline_policy(
        &self,
        role: &str,
        name: &str,
    ) -> GatewayResult<Option<serde_json::Value>>;

    async fn put_inline_policy(&self, role: &str, name: &str, document: &str)
    -> GatewayResult<()>;

    async fn delete_inline_policy(&self, role: &str, name: &str) -> GatewayResult<()>;
}
