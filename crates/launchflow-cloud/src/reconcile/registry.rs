//! Image repository

use super::Context;
use crate::action::ActionType;
use crate::error::{GatewayResultExt, Result};
use crate::handle::{RepositoryAttrs, ResourceHandle};
use crate::model::{ResourceKind, ResourceNames};

/// Fresh tag for a build, `latest-` plus eight hex characters
pub fn image_tag() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("latest-{}", &id[..8])
}

/// `{account}.dkr.ecr.{region}.amazonaws.com/{repository}`
pub fn repository_uri(account_id: &str, region: &str, repository: &str) -> String {
    format!("{}.dkr.ecr.{}.amazonaws.com/{}", account_id, region, repository)
}

/// Ensure the repository; it has no mutable settings, so it is never updated.
pub async fn ensure_repository(
    ctx: &Context<'_>,
    names: &ResourceNames,
) -> Result<ResourceHandle<RepositoryAttrs>> {
    let name = &names.repository;
    let (repository, action) = match ctx
        .cloud
        .find_repository(name)
        .await
        .context(format!("describe repository {}", name))?
    {
        Some(repository) => (repository, ActionType::NoOp),
        None => {
            ctx.require_create(ResourceKind::Registry, name)?;
            let repository = ctx
                .cloud
                .create_repository(name)
                .await
                .context(format!("create repository {}", name))?;
            tracing::info!(uri = %repository.uri, "created repository");
            (repository, ActionType::Create)
        }
    };

    Ok(ctx.finish(
        name,
        ResourceHandle::new(
            ResourceKind::Registry,
            repository.name,
            action,
            RepositoryAttrs {
                uri: repository.uri,
            },
        ),
    ))
}
