use crate::AwsCloud;
use crate::error::{classify, invalid_request, missing, optional};
use async_trait::async_trait;
use aws_sdk_eventbridge::types::{RuleState, Target};
use launchflow_cloud::GatewayResult;
use launchflow_cloud::gateway::{EventGateway, EventRule, LogGateway, LogGroup, RuleTarget};

#[async_trait]
impl LogGateway for AwsCloud {
    async fn find_log_group(&self, name: &str) -> GatewayResult<Option<LogGroup>> {
        let out = self
            .logs
            .describe_log_groups()
            .log_group_name_prefix(name)
            .send()
            .await
            .map_err(|e| classify("DescribeLogGroups", e))?;
        // prefix match; keep only the exact name
        Ok(out
            .log_groups()
            .iter()
            .find(|g| g.log_group_name() == Some(name))
            .map(|g| LogGroup {
                name: name.to_string(),
                arn: g.arn().unwrap_or_default().to_string(),
                retention_days: g.retention_in_days(),
            }))
    }

    async fn create_log_group(&self, name: &str, retention_days: i32) -> GatewayResult<LogGroup> {
        self.logs
            .create_log_group()
            .log_group_name(name)
            .send()
            .await
            .map_err(|e| classify("CreateLogGroup", e))?;
        self.logs
            .put_retention_policy()
            .log_group_name(name)
            .retention_in_days(retention_days)
            .send()
            .await
            .map_err(|e| classify("PutRetentionPolicy", e))?;

        match self.find_log_group(name).await? {
            Some(group) => Ok(group),
            None => Err(missing("CreateLogGroup", "log group after create")),
        }
    }

    async fn resource_policy(&self, name: &str) -> GatewayResult<Option<String>> {
        let mut next_token: Option<String> = None;
        loop {
            let out = self
                .logs
                .describe_resource_policies()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify("DescribeResourcePolicies", e))?;
            if let Some(policy) = out
                .resource_policies()
                .iter()
                .find(|p| p.policy_name() == Some(name))
            {
                return Ok(policy.policy_document().map(str::to_string));
            }
            match out.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => return Ok(None),
            }
        }
    }

    async fn put_resource_policy(&self, name: &str, document: &str) -> GatewayResult<()> {
        self.logs
            .put_resource_policy()
            .policy_name(name)
            .policy_document(document)
            .send()
            .await
            .map_err(|e| classify("PutResourcePolicy", e))?;
        Ok(())
    }
}

#[async_trait]
impl EventGateway for AwsCloud {
    async fn find_rule(&self, name: &str) -> GatewayResult<Option<EventRule>> {
        let out = optional(
            self.events
                .describe_rule()
                .name(name)
                .send()
                .await
                .map_err(|e| classify("DescribeRule", e)),
        )?;
        Ok(out.map(|out| EventRule {
            name: out.name().unwrap_or(name).to_string(),
            arn: out.arn().unwrap_or_default().to_string(),
            pattern: out.event_pattern().map(str::to_string),
        }))
    }

    async fn put_rule(
        &self,
        name: &str,
        pattern: &str,
        description: &str,
    ) -> GatewayResult<String> {
        let out = self
            .events
            .put_rule()
            .name(name)
            .event_pattern(pattern)
            .description(description)
            .state(RuleState::Enabled)
            .send()
            .await
            .map_err(|e| classify("PutRule", e))?;
        out.rule_arn()
            .map(str::to_string)
            .ok_or_else(|| missing("PutRule", "RuleArn"))
    }

    async fn rule_targets(&self, rule: &str) -> GatewayResult<Vec<RuleTarget>> {
        let out = self
            .events
            .list_targets_by_rule()
            .rule(rule)
            .send()
            .await
            .map_err(|e| classify("ListTargetsByRule", e))?;
        Ok(out
            .targets()
            .iter()
            .map(|t| RuleTarget {
                id: t.id().to_string(),
                arn: t.arn().to_string(),
            })
            .collect())
    }

    async fn remove_targets(&self, rule: &str, ids: &[String]) -> GatewayResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.events
            .remove_targets()
            .rule(rule)
            .set_ids(Some(ids.to_vec()))
            .send()
            .await
            .map_err(|e| classify("RemoveTargets", e))?;
        Ok(())
    }

    async fn put_target(&self, rule: &str, target: &RuleTarget) -> GatewayResult<()> {
        let target = Target::builder()
            .id(&target.id)
            .arn(&target.arn)
            .build()
            .map_err(|e| invalid_request("PutTargets", e))?;
        let out = self
            .events
            .put_targets()
            .rule(rule)
            .targets(target)
            .send()
            .await
            .map_err(|e| classify("PutTargets", e))?;
        if out.failed_entry_count() > 0 {
            let reason = out
                .failed_entries()
                .first()
                .and_then(|f| f.error_message())
                .unwrap_or("unknown reason");
            return Err(launchflow_cloud::GatewayError::other("PutTargets", reason));
        }
        Ok(())
    }
}
