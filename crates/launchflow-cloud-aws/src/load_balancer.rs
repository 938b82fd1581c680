use crate::AwsCloud;
use crate::error::{classify, invalid_request, missing, optional};
use async_trait::async_trait;
use aws_sdk_elasticloadbalancingv2::types::{
    Action, ActionTypeEnum, IpAddressType, LoadBalancerSchemeEnum, LoadBalancerTypeEnum, Matcher,
    ProtocolEnum, TargetTypeEnum,
};
use launchflow_cloud::GatewayResult;
use launchflow_cloud::gateway::{
    Listener, LoadBalancer, LoadBalancerGateway, TargetGroup, TargetGroupSpec, TargetHealth,
};

fn load_balancer(lb: &aws_sdk_elasticloadbalancingv2::types::LoadBalancer) -> Option<LoadBalancer> {
    Some(LoadBalancer {
        arn: lb.load_balancer_arn()?.to_string(),
        name: lb.load_balancer_name().unwrap_or_default().to_string(),
        dns_name: lb.dns_name().unwrap_or_default().to_string(),
        state: lb
            .state()
            .and_then(|s| s.code())
            .map(|c| c.as_str().to_string())
            .unwrap_or_default(),
    })
}

fn target_group(tg: &aws_sdk_elasticloadbalancingv2::types::TargetGroup) -> Option<TargetGroup> {
    Some(TargetGroup {
        arn: tg.target_group_arn()?.to_string(),
        name: tg.target_group_name().unwrap_or_default().to_string(),
        port: tg.port().and_then(|p| u16::try_from(p).ok()).unwrap_or(0),
        health_check_path: tg.health_check_path().map(str::to_string),
    })
}

fn listener(l: &aws_sdk_elasticloadbalancingv2::types::Listener) -> Option<Listener> {
    Some(Listener {
        arn: l.listener_arn()?.to_string(),
        port: l.port().and_then(|p| u16::try_from(p).ok()).unwrap_or(0),
        target_group_arn: l
            .default_actions()
            .iter()
            .find(|a| a.r#type() == &ActionTypeEnum::Forward)
            .and_then(|a| a.target_group_arn())
            .map(str::to_string),
    })
}

fn forward(target_group_arn: &str) -> GatewayResult<Action> {
    Action::builder()
        .r#type(ActionTypeEnum::Forward)
        .target_group_arn(target_group_arn)
        .build()
        .map_err(|e| invalid_request("ForwardAction", e))
}

#[async_trait]
impl LoadBalancerGateway for AwsCloud {
    async fn find_load_balancer(&self, name: &str) -> GatewayResult<Option<LoadBalancer>> {
        let out = optional(
            self.elb
                .describe_load_balancers()
                .names(name)
                .send()
                .await
                .map_err(|e| classify("DescribeLoadBalancers", e)),
        )?;
        Ok(out.and_then(|out| out.load_balancers().first().and_then(load_balancer)))
    }

    async fn create_load_balancer(
        &self,
        name: &str,
        subnets: &[String],
        security_groups: &[String],
    ) -> GatewayResult<LoadBalancer> {
        let out = self
            .elb
            .create_load_balancer()
            .name(name)
            .set_subnets(Some(subnets.to_vec()))
            .set_security_groups(Some(security_groups.to_vec()))
            .scheme(LoadBalancerSchemeEnum::InternetFacing)
            .r#type(LoadBalancerTypeEnum::Application)
            .ip_address_type(IpAddressType::Ipv4)
            .send()
            .await
            .map_err(|e| classify("CreateLoadBalancer", e))?;
        out.load_balancers()
            .first()
            .and_then(load_balancer)
            .ok_or_else(|| missing("CreateLoadBalancer", "LoadBalancers"))
    }

    async fn delete_load_balancer(&self, arn: &str) -> GatewayResult<()> {
        self.elb
            .delete_load_balancer()
            .load_balancer_arn(arn)
            .send()
            .await
            .map_err(|e| classify("DeleteLoadBalancer", e))?;
        Ok(())
    }

    async fn find_target_group(&self, name: &str) -> GatewayResult<Option<TargetGroup>> {
        let out = optional(
            self.elb
                .describe_target_groups()
                .names(name)
                .send()
                .await
                .map_err(|e| classify("DescribeTargetGroups", e)),
        )?;
        Ok(out.and_then(|out| out.target_groups().first().and_then(target_group)))
    }

    async fn create_target_group(&self, spec: &TargetGroupSpec) -> GatewayResult<TargetGroup> {
        let check = &spec.health_check;
        let out = self
            .elb
            .create_target_group()
            .name(&spec.name)
            .protocol(ProtocolEnum::Http)
            .port(i32::from(spec.port))
            .vpc_id(&spec.vpc_id)
            .target_type(TargetTypeEnum::Ip)
            .health_check_protocol(ProtocolEnum::Http)
            .health_check_path(&check.path)
            .health_check_interval_seconds(check.interval_seconds)
            .health_check_timeout_seconds(check.timeout_seconds)
            .healthy_threshold_count(check.healthy_threshold)
            .unhealthy_threshold_count(check.unhealthy_threshold)
            .matcher(Matcher::builder().http_code(&check.matcher).build())
            .send()
            .await
            .map_err(|e| classify("CreateTargetGroup", e))?;
        out.target_groups()
            .first()
            .and_then(target_group)
            .ok_or_else(|| missing("CreateTargetGroup", "TargetGroups"))
    }

    async fn set_health_check_path(&self, arn: &str, path: &str) -> GatewayResult<()> {
        self.elb
            .modify_target_group()
            .target_group_arn(arn)
            .health_check_path(path)
            .send()
            .await
            .map_err(|e| classify("ModifyTargetGroup", e))?;
        Ok(())
    }

    async fn delete_target_group(&self, arn: &str) -> GatewayResult<()> {
        self.elb
            .delete_target_group()
            .target_group_arn(arn)
            .send()
            .await
            .map_err(|e| classify("DeleteTargetGroup", e))?;
        Ok(())
    }

    async fn listeners(&self, load_balancer_arn: &str) -> GatewayResult<Vec<Listener>> {
        let out = self
            .elb
            .describe_listeners()
            .load_balancer_arn(load_balancer_arn)
            .send()
            .await
            .map_err(|e| classify("DescribeListeners", e))?;
        Ok(out.listeners().iter().filter_map(listener).collect())
    }

    async fn create_listener(
        &self,
        load_balancer_arn: &str,
        port: u16,
        target_group_arn: &str,
    ) -> GatewayResult<Listener> {
        let out = self
            .elb
            .create_listener()
            .load_balancer_arn(load_balancer_arn)
            .protocol(ProtocolEnum::Http)
            .port(i32::from(port))
            .default_actions(forward(target_group_arn)?)
            .send()
            .await
            .map_err(|e| classify("CreateListener", e))?;
        out.listeners()
            .first()
            .and_then(listener)
            .ok_or_else(|| missing("CreateListener", "Listeners"))
    }

    async fn set_listener_target(
        &self,
        listener_arn: &str,
        target_group_arn: &str,
    ) -> GatewayResult<()> {
        self.elb
            .modify_listener()
            .listener_arn(listener_arn)
            .default_actions(forward(target_group_arn)?)
            .send()
            .await
            .map_err(|e| classify("ModifyListener", e))?;
        Ok(())
    }

    async fn delete_listener(&self, arn: &str) -> GatewayResult<()> {
        self.elb
            .delete_listener()
            .listener_arn(arn)
            .send()
            .await
            .map_err(|e| classify("DeleteListener", e))?;
        Ok(())
    }

    async fn target_health(&self, target_group_arn: &str) -> GatewayResult<Vec<TargetHealth>> {
        let out = self
            .elb
            .describe_target_health()
            .target_group_arn(target_group_arn)
            .send()
            .await
            .map_err(|e| classify("DescribeTargetHealth", e))?;
        Ok(out
            .target_health_descriptions()
            .iter()
            .map(|d| TargetHealth {
                target_id: d
                    .target()
                    .map(|t| t.id().to_string())
                    .unwrap_or_default(),
                state: d
                    .target_health()
                    .and_then(|h| h.state())
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_default(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_reads_forward_target() {
        let l = aws_sdk_elasticloadbalancingv2::types::Listener::builder()
            .listener_arn("arn:listener/1")
            .port(80)
            .default_actions(forward("arn:tg/1").unwrap())
            .build();

        let parsed = listener(&l).unwrap();
        assert_eq!(parsed.port, 80);
        assert_eq!(parsed.target_group_arn.as_deref(), Some("arn:tg/1"));
    }
}
