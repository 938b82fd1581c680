use crate::AwsCloud;
use crate::error::{classify, missing, optional};
use async_trait::async_trait;
use aws_sdk_ecr::types::ImageScanningConfiguration;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use launchflow_cloud::gateway::{Repository, RegistryAuth, RegistryGateway};
use launchflow_cloud::{GatewayError, GatewayResult};

fn repository(repo: &aws_sdk_ecr::types::Repository) -> Option<Repository> {
    Some(Repository {
        name: repo.repository_name()?.to_string(),
        uri: repo.repository_uri()?.to_string(),
    })
}

/// ECR tokens are base64 of `user:password`
fn split_token(token: &str) -> GatewayResult<(String, String)> {
    let bad = |reason: &str| GatewayError::other("GetAuthorizationToken", reason.to_string());
    let raw = STANDARD
        .decode(token)
        .map_err(|_| bad("authorization token is not base64"))?;
    let text = String::from_utf8(raw).map_err(|_| bad("authorization token is not UTF-8"))?;
    let (user, password) = text
        .split_once(':')
        .ok_or_else(|| bad("authorization token has no user part"))?;
    Ok((user.to_string(), password.to_string()))
}

#[async_trait]
impl RegistryGateway for AwsCloud {
    async fn find_repository(&self, name: &str) -> GatewayResult<Option<Repository>> {
        let out = optional(
            self.ecr
                .describe_repositories()
                .repository_names(name)
                .send()
                .await
                .map_err(|e| classify("DescribeRepositories", e)),
        )?;
        Ok(out.and_then(|out| out.repositories().first().and_then(repository)))
    }

    async fn create_repository(&self, name: &str) -> GatewayResult<Repository> {
        let out = self
            .ecr
            .create_repository()
            .repository_name(name)
            .image_scanning_configuration(
                ImageScanningConfiguration::builder()
                    .scan_on_push(true)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| classify("CreateRepository", e))?;
        out.repository()
            .and_then(repository)
            .ok_or_else(|| missing("CreateRepository", "repository"))
    }

    async fn delete_repository(&self, name: &str) -> GatewayResult<()> {
        self.ecr
            .delete_repository()
            .repository_name(name)
            .force(true)
            .send()
            .await
            .map_err(|e| classify("DeleteRepository", e))?;
        Ok(())
    }

    async fn authorization(&self) -> GatewayResult<RegistryAuth> {
        let out = self
            .ecr
            .get_authorization_token()
            .send()
            .await
            .map_err(|e| classify("GetAuthorizationToken", e))?;
        let data = out
            .authorization_data()
            .first()
            .ok_or_else(|| missing("GetAuthorizationToken", "authorizationData"))?;
        let token = data
            .authorization_token()
            .ok_or_else(|| missing("GetAuthorizationToken", "authorizationToken"))?;
        let (username, password) = split_token(token)?;
        Ok(RegistryAuth {
            username,
            password,
            endpoint: data.proxy_endpoint().unwrap_or_default().to_string(),
        })
    }
}
