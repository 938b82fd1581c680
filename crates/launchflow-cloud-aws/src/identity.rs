use crate::AwsCloud;
use crate::error::{classify, missing, optional};
use async_trait::async_trait;
use launchflow_cloud::gateway::{IdentityGateway, Role};
use launchflow_cloud::{GatewayError, GatewayResult};

fn role(role: &aws_sdk_iam::types::Role) -> Role {
    Role {
        name: role.role_name().to_string(),
        arn: role.arn().to_string(),
    }
}

/// IAM returns policy documents URL-encoded
fn decode_document(operation: &str, encoded: &str) -> GatewayResult<serde_json::Value> {
    let decoded = urlencoding::decode(encoded)
        .map_err(|e| GatewayError::other(operation, format!("bad policy encoding: {}", e)))?;
    serde_json::from_str(&decoded)
        .map_err(|e| GatewayError::other(operation, format!("bad policy document: {}", e)))
}

#[async_trait]
impl IdentityGateway for AwsCloud {
    async fn account_id(&self) -> GatewayResult<String> {
        let out = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| classify("GetCallerIdentity", e))?;
        out.account()
            .map(str::to_string)
            .ok_or_else(|| missing("GetCallerIdentity", "Account"))
    }

    async fn find_role(&self, name: &str) -> GatewayResult<Option<Role>> {
        let out = optional(
            self.iam
                .get_role()
                .role_name(name)
                .send()
                .await
                .map_err(|e| classify("GetRole", e)),
        )?;
        Ok(out.and_then(|out| out.role().map(role)))
    }

    async fn create_role(&self, name: &str, trust_policy: &str) -> GatewayResult<Role> {
        let out = self
            .iam
            .create_role()
            .role_name(name)
            .assume_role_policy_document(trust_policy)
            .description("ECS task execution role managed by launchflow")
            .send()
            .await
            .map_err(|e| classify("CreateRole", e))?;
        out.role()
            .map(role)
            .ok_or_else(|| missing("CreateRole", "Role"))
    }

    async fn attached_policies(&self, role: &str) -> GatewayResult<Vec<String>> {
        let mut arns = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let out = self
                .iam
                .list_attached_role_policies()
                .role_name(role)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| classify("ListAttachedRolePolicies", e))?;
            arns.extend(
                out.attached_policies()
                    .iter()
                    .filter_map(|p| p.policy_arn().map(str::to_string)),
            );
            match out.marker() {
                Some(next) if out.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(arns)
    }

    async fn attach_policy(&self, role: &str, policy_arn: &str) -> GatewayResult<()> {
        self.iam
            .attach_role_policy()
            .role_name(role)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| classify("AttachRolePolicy", e))?;
        Ok(())
    }

    async fn detach_policy(&self, role: &str, policy_arn: &str) -> GatewayResult<()> {
        self.iam
            .detach_role_policy()
            .role_name(role)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| classify("DetachRolePolicy", e))?;
        Ok(())
    }

    async fn inline_policy(
        &self,
        role: &str,
        name: &str,
    ) -> GatewayResult<Option<serde_json::Value>> {
        let out = optional(
            self.iam
                .get_role_policy()
                .role_name(role)
                .policy_name(name)
                .send()
                .await
                .map_err(|e| classify("GetRolePolicy", e)),
        )?;
        out.map(|out| decode_document("GetRolePolicy", out.policy_document()))
            .transpose()
    }

    async fn put_inline_policy(
        &self,
        role: &str,
        name: &str,
        document: &str,
    ) -> GatewayResult<()> {
        self.iam
            .put_role_policy()
            .role_name(role)
            .policy_name(name)
            .policy_document(document)
            .send()
            .await
            .map_err(|e| classify("PutRolePolicy", e))?;
        Ok(())
    }

    async fn delete_inline_policy(&self, role: &str, name: &str) -> GatewayResult<()> {
        self.iam
            .delete_role_policy()
            .role_name(role)
            .policy_name(name)
            .send()
            .await
            .map_err(|e| classify("DeleteRolePolicy", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_url_encoded_document() {
        let encoded = "%7B%22Version%22%3A%222012-10-17%22%2C%22Statement%22%3A%5B%5D%7D";
        let doc = decode_document("GetRolePolicy", encoded).unwrap();
        assert_eq!(doc["Version"], "2012-10-17");
        assert!(doc["Statement"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_document("GetRolePolicy", "not%20json").is_err());
    }
}
