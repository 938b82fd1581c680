//! Static-site bucket and incremental upload

use super::{Context, action_for};
use crate::error::{CloudError, GatewayResultExt, Result};
use crate::gateway::{PublicAccessBlock, WebsiteConfig};
use crate::handle::ResourceHandle;
use crate::model::ResourceKind;
use md5::{Digest, Md5};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::Path;
use walkdir::WalkDir;

pub const INDEX_DOCUMENT: &str = "index.html";

/// Public-read policy for website hosting
pub fn public_read_policy(bucket: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": "PublicReadGetObject",
            "Effect": "Allow",
            "Principal": "*",
            "Action": "s3:GetObject",
            "Resource": format!("arn:aws:s3:::{}/*", bucket)
        }]
    })
}

/// S3 REST endpoint used as the CDN origin
pub fn origin_domain(bucket: &str, region: &str) -> String {
    format!("{}.s3.{}.amazonaws.com", bucket, region)
}

pub fn website_endpoint(bucket: &str, region: &str) -> String {
    format!("http://{}.s3-website-{}.amazonaws.com", bucket, region)
}

/// Ensure the bucket exists and serves a public website.
///
/// Website configuration and the public access block are corrected when they
/// drift. A bucket policy is only written when the bucket has none.
pub async fn ensure_site_bucket(
    ctx: &Context<'_>,
    bucket: &str,
    region: &str,
) -> Result<ResourceHandle> {
    let exists = ctx
        .cloud
        .bucket_exists(bucket)
        .await
        .context(format!("check bucket {}", bucket))?;
    if !exists {
        ctx.require_create(ResourceKind::Bucket, bucket)?;
        ctx.cloud
            .create_bucket(bucket, region)
            .await
            .context(format!("create bucket {}", bucket))?;
        tracing::info!(bucket, region, "created bucket");
    }

    let mut changed = false;

    let website = WebsiteConfig {
        index_document: INDEX_DOCUMENT.to_string(),
        error_document: Some(INDEX_DOCUMENT.to_string()),
    };
    let current = ctx
        .cloud
        .website_config(bucket)
        .await
        .context(format!("get website config of {}", bucket))?;
    if current.as_ref() != Some(&website) {
        ctx.cloud
            .put_website_config(bucket, &website)
            .await
            .context(format!("configure website hosting on {}", bucket))?;
        changed = true;
    }

    let block = ctx
        .cloud
        .public_access_block(bucket)
        .await
        .context(format!("get public access block of {}", bucket))?;
    if block.is_some_and(|b| b.any_enabled()) {
        ctx.cloud
            .put_public_access_block(bucket, &PublicAccessBlock::default())
            .await
            .context(format!("disable public access block on {}", bucket))?;
        changed = true;
    }

    let policy = ctx
        .cloud
        .bucket_policy(bucket)
        .await
        .context(format!("get bucket policy of {}", bucket))?;
    if policy.is_none() {
        ctx.cloud
            .put_bucket_policy(bucket, &public_read_policy(bucket).to_string())
            .await
            .context(format!("put bucket policy on {}", bucket))?;
        changed = true;
    }

    Ok(ctx.finish(
        bucket,
        ResourceHandle::bare(
            ResourceKind::Bucket,
            format!("arn:aws:s3:::{}", bucket),
            action_for(!exists, changed),
        ),
    ))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub uploaded: usize,
    pub skipped: usize,
}

/// Object key for a file below `root`, always with `/` separators
fn object_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Upload every file under `folder`, skipping objects whose ETag already
/// equals the local MD5.
pub async fn sync_folder(
    ctx: &Context<'_>,
    bucket: &str,
    folder: &Path,
) -> Result<UploadSummary> {
    if !folder.join(INDEX_DOCUMENT).is_file() {
        return Err(CloudError::Configuration(format!(
            "{} not found in {}",
            INDEX_DOCUMENT,
            folder.display()
        )));
    }

    let remote: HashMap<String, String> = ctx
        .cloud
        .list_objects(bucket)
        .await
        .context(format!("list objects in {}", bucket))?
        .into_iter()
        .map(|o| (o.key, o.etag))
        .collect();

    let mut summary = UploadSummary::default();
    for entry in WalkDir::new(folder).sort_by_file_name() {
        let entry = entry.map_err(|e| CloudError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(key) = object_key(folder, entry.path()) else {
            continue;
        };

        let body = tokio::fs::read(entry.path()).await?;
        let digest = hex::encode(Md5::digest(&body));
        if remote.get(&key).is_some_and(|etag| *etag == digest) {
            tracing::debug!(key = %key, "unchanged, skipping");
            summary.skipped += 1;
            continue;
        }

        let content_type = mime_guess::from_path(entry.path())
            .first_or_octet_stream()
            .to_string();
        ctx.cloud
            .put_object(bucket, &key, body, &content_type)
            .await
            .context(format!("upload {}", key))?;
        tracing::debug!(key = %key, content_type = %content_type, "uploaded");
        summary.uploaded += 1;
    }

    ctx.reporter.note(&format!(
        "{} file(s) uploaded, {} unchanged",
        summary.uploaded, summary.skipped
    ));
    Ok(summary)
}
