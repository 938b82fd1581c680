use crate::AwsCloud;
use crate::error::{classify, invalid_request, optional};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Delete, ErrorDocument, IndexDocument,
    ObjectIdentifier, PublicAccessBlockConfiguration, WebsiteConfiguration,
};
use launchflow_cloud::GatewayResult;
use launchflow_cloud::gateway::{ObjectSummary, PublicAccessBlock, StorageGateway, WebsiteConfig};

/// us-east-1 rejects an explicit location constraint
const DEFAULT_REGION: &str = "us-east-1";

fn unquote(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

#[async_trait]
impl StorageGateway for AwsCloud {
    async fn bucket_exists(&self, bucket: &str) -> GatewayResult<bool> {
        let found = optional(
            self.s3
                .head_bucket()
                .bucket(bucket)
                .send()
                .await
                .map_err(|e| classify("HeadBucket", e)),
        )?;
        Ok(found.is_some())
    }

    async fn create_bucket(&self, bucket: &str, region: &str) -> GatewayResult<()> {
        let mut request = self.s3.create_bucket().bucket(bucket);
        if region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }
        request
            .send()
            .await
            .map_err(|e| classify("CreateBucket", e))?;
        Ok(())
    }

    async fn website_config(&self, bucket: &str) -> GatewayResult<Option<WebsiteConfig>> {
        let out = optional(
            self.s3
                .get_bucket_website()
                .bucket(bucket)
                .send()
                .await
                .map_err(|e| classify("GetBucketWebsite", e)),
        )?;
        Ok(out.and_then(|out| {
            Some(WebsiteConfig {
                index_document: out.index_document()?.suffix().to_string(),
                error_document: out.error_document().map(|e| e.key().to_string()),
            })
        }))
    }

    async fn put_website_config(
        &self,
        bucket: &str,
        config: &WebsiteConfig,
    ) -> GatewayResult<()> {
        let op = "PutBucketWebsite";
        let index = IndexDocument::builder()
            .suffix(&config.index_document)
            .build()
            .map_err(|e| invalid_request(op, e))?;
        let mut website = WebsiteConfiguration::builder().index_document(index);
        if let Some(key) = &config.error_document {
            website = website.error_document(
                ErrorDocument::builder()
                    .key(key)
                    .build()
                    .map_err(|e| invalid_request(op, e))?,
            );
        }
        self.s3
            .put_bucket_website()
            .bucket(bucket)
            .website_configuration(website.build())
            .send()
            .await
            .map_err(|e| classify(op, e))?;
        Ok(())
    }

    async fn public_access_block(&self, bucket: &str) -> GatewayResult<Option<PublicAccessBlock>> {
        let out = optional(
            self.s3
                .get_public_access_block()
                .bucket(bucket)
                .send()
                .await
                .map_err(|e| classify("GetPublicAccessBlock", e)),
        )?;
        Ok(out.and_then(|out| {
            out.public_access_block_configuration()
                .map(|c| PublicAccessBlock {
                    block_public_acls: c.block_public_acls().unwrap_or(false),
                    ignore_public_acls: c.ignore_public_acls().unwrap_or(false),
                    block_public_policy: c.block_public_policy().unwrap_or(false),
                    restrict_public_buckets: c.restrict_public_buckets().unwrap_or(false),
                })
        }))
    }

    async fn put_public_access_block(
        &self,
        bucket: &str,
        block: &PublicAccessBlock,
    ) -> GatewayResult<()> {
        self.s3
            .put_public_access_block()
            .bucket(bucket)
            .public_access_block_configuration(
                PublicAccessBlockConfiguration::builder()
                    .block_public_acls(block.block_public_acls)
                    .ignore_public_acls(block.ignore_public_acls)
                    .block_public_policy(block.block_public_policy)
                    .restrict_public_buckets(block.restrict_public_buckets)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| classify("PutPublicAccessBlock", e))?;
        Ok(())
    }

    async fn bucket_policy(&self, bucket: &str) -> GatewayResult<Option<String>> {
        let out = optional(
            self.s3
                .get_bucket_policy()
                .bucket(bucket)
                .send()
                .await
                .map_err(|e| classify("GetBucketPolicy", e)),
        )?;
        Ok(out.and_then(|out| out.policy().map(str::to_string)))
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> GatewayResult<()> {
        self.s3
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy)
            .send()
            .await
            .map_err(|e| classify("PutBucketPolicy", e))?;
        Ok(())
    }

    async fn list_objects(&self, bucket: &str) -> GatewayResult<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let out = self
                .s3
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(|e| classify("ListObjectsV2", e))?;
            objects.extend(out.contents().iter().filter_map(|o| {
                Some(ObjectSummary {
                    key: o.key()?.to_string(),
                    etag: o.e_tag().map(unquote).unwrap_or_default(),
                    size: o.size().unwrap_or_default(),
                })
            }));
            match out.next_continuation_token() {
                Some(next) if out.is_truncated().unwrap_or(false) => {
                    token = Some(next.to_string())
                }
                _ => break,
            }
        }
        Ok(objects)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> GatewayResult<()> {
        self.s3
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| classify("PutObject", e))?;
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> GatewayResult<()> {
        let op = "DeleteObjects";
        if keys.is_empty() {
            return Ok(());
        }
        let objects = keys
            .iter()
            .map(|k| ObjectIdentifier::builder().key(k).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| invalid_request(op, e))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| invalid_request(op, e))?;
        let out = self
            .s3
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| classify(op, e))?;
        if let Some(failed) = out.errors().first() {
            return Err(launchflow_cloud::GatewayError::other(
                op,
                format!(
                    "{}: {}",
                    failed.key().unwrap_or_default(),
                    failed.message().unwrap_or("delete failed")
                ),
            ));
        }
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> GatewayResult<()> {
        self.s3
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| classify("DeleteBucket", e))?;
        Ok(())
    }
}
