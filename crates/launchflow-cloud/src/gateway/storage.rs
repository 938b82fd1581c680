use crate::error::GatewayResult;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsiteConfig {
    pub index_document: String,
    pub error_document: Option<String>,
}

/// The four block-public-access switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublicAccessBlock {
    pub block_public_acls: bool,
    pub ignore_public_acls: bool,
    pub block_public_policy: bool,
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlock {
    pub fn any_enabled(&self) -> bool {
        self.block_public_acls
            || self.ignore_public_acls
            || self.block_public_policy
            || self.restrict_public_buckets
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    /// ETag without quotes
    pub etag: String,
    pub size: i64,
}

/// S3
#[async_trait]
pub trait StorageGateway: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> GatewayResult<bool>;

    async fn create_bucket(&self, bucket: &str, region: &str) -> GatewayResult<()>;

    async fn website_config(&self, bucket: &str) -> GatewayResult<Option<WebsiteConfig>>;

    async fn put_website_config(&self, bucket: &str, config: &WebsiteConfig)
    -> GatewayResult<()>;

    async fn public_access_block(&self, bucket: &str) -> GatewayResult<Option<PublicAccessBlock>>;

    async fn put_public_access_block(
        &self,
        bucket: &str,
        block: &PublicAccessBlock,
    ) -> GatewayResult<()>;

    async fn bucket_policy(&self, bucket: &str) -> GatewayResult<Option<String>>;

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> GatewayResult<()>;

    async fn list_objects(&self, bucket: &str) -> GatewayResult<Vec<ObjectSummary>>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> GatewayResult<()>;

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> GatewayResult<()>;

    async fn delete_bucket(&self, bucket: &str) -> GatewayResult<()>;
}
