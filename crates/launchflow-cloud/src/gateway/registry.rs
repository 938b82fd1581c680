use crate::error::GatewayResult;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub name: String,
    /// Registry URI without tag
    pub uri: String,
}

/// Short-lived docker credentials for the registry
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryAuth {
    pub username: String,
    pub password: String,
    pub endpoint: String,
}

impl std::fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[async_trait]
pub trait RegistryGateway: Send + Sync {
    async fn find_repository(&self, name: &str) -> GatewayResult<Option<Repository>>;

    async fn create_repository(&self, name: &str) -> GatewayResult<Repository>;

    /// Deletes the repository together with its images
    async fn delete_repository(&self, name: &str) -> GatewayResult<()>;

    async fn authorization(&self) -> GatewayResult<RegistryAuth>;
}
