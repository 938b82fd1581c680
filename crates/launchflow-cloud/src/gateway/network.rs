use crate::error::GatewayResult;
use async_trait::async_trait;

pub const ANYWHERE_CIDR: &str = "0.0.0.0/0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressSource {
    Cidr(String),
    SecurityGroup(String),
}

/// TCP ingress on a single port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    pub port: u16,
    pub source: IngressSource,
}

impl IngressRule {
    pub fn from_anywhere(port: u16) -> Self {
        Self {
            port,
            source: IngressSource::Cidr(ANYWHERE_CIDR.to_string()),
        }
    }

    pub fn from_group(port: u16, group_id: impl Into<String>) -> Self {
        Self {
            port,
            source: IngressSource::SecurityGroup(group_id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    pub ingress: Vec<IngressRule>,
}

#[async_trait]
pub trait NetworkGateway: Send + Sync {
    /// Id of the region's default VPC
    async fn default_vpc(&self) -> GatewayResult<Option<String>>;

    async fn subnets(&self, vpc_id: &str) -> GatewayResult<Vec<String>>;

    async fn find_security_group(
        &self,
        vpc_id: &str,
        name: &str,
    ) -> GatewayResult<Option<SecurityGroup>>;

    /// Returns the new group id
    async fn create_security_group(
        &self,
        vpc_id: &str,
        name: &str,
        description: &str,
    ) -> GatewayResult<String>;

    async fn authorize_ingress(&self, group_id: &str, rule: &IngressRule) -> GatewayResult<()>;

    async fn revoke_ingress(&self, group_id: &str, rule: &IngressRule) -> GatewayResult<()>;

    async fn delete_security_group(&self, group_id: &str) -> GatewayResult<()>;

    async fn network_interface_public_ip(&self, eni_id: &str) -> GatewayResult<Option<String>>;
}
