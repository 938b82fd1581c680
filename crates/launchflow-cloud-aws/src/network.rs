use crate::AwsCloud;
use crate::error::{classify, missing, optional};
use async_trait::async_trait;
use aws_sdk_ec2::types::{Filter, IpPermission, IpRange, UserIdGroupPair};
use launchflow_cloud::GatewayResult;
use launchflow_cloud::gateway::{IngressRule, IngressSource, NetworkGateway, SecurityGroup};

fn filter(name: &str, value: &str) -> Filter {
    Filter::builder().name(name).values(value).build()
}

fn permission(rule: &IngressRule) -> IpPermission {
    let builder = IpPermission::builder()
        .ip_protocol("tcp")
        .from_port(i32::from(rule.port))
        .to_port(i32::from(rule.port));
    match &rule.source {
        IngressSource::Cidr(cidr) => builder.ip_ranges(IpRange::builder().cidr_ip(cidr).build()),
        IngressSource::SecurityGroup(group) => {
            builder.user_id_group_pairs(UserIdGroupPair::builder().group_id(group).build())
        }
    }
    .build()
}

/// Single-port TCP rules; ranges and other protocols are not ours
fn ingress_rules(permissions: &[IpPermission]) -> Vec<IngressRule> {
    let mut rules = Vec::new();
    for p in permissions {
        if p.ip_protocol() != Some("tcp") {
            continue;
        }
        let (Some(from), Some(to)) = (p.from_port(), p.to_port()) else {
            continue;
        };
        let Ok(port) = u16::try_from(from) else {
            continue;
        };
        if from != to {
            continue;
        }
        for range in p.ip_ranges() {
            if let Some(cidr) = range.cidr_ip() {
                rules.push(IngressRule {
                    port,
                    source: IngressSource::Cidr(cidr.to_string()),
                });
            }
        }
        for pair in p.user_id_group_pairs() {
            if let Some(group) = pair.group_id() {
                rules.push(IngressRule::from_group(port, group));
            }
        }
    }
    rules
}

#[async_trait]
impl NetworkGateway for AwsCloud {
    async fn default_vpc(&self) -> GatewayResult<Option<String>> {
        let out = self
            .ec2
            .describe_vpcs()
            .filters(filter("is-default", "true"))
            .send()
            .await
            .map_err(|e| classify("DescribeVpcs", e))?;
        Ok(out
            .vpcs()
            .first()
            .and_then(|v| v.vpc_id())
            .map(str::to_string))
    }

    async fn subnets(&self, vpc_id: &str) -> GatewayResult<Vec<String>> {
        let out = self
            .ec2
            .describe_subnets()
            .filters(filter("vpc-id", vpc_id))
            .send()
            .await
            .map_err(|e| classify("DescribeSubnets", e))?;
        let mut ids: Vec<String> = out
            .subnets()
            .iter()
            .filter_map(|s| s.subnet_id().map(str::to_string))
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn find_security_group(
        &self,
        vpc_id: &str,
        name: &str,
    ) -> GatewayResult<Option<SecurityGroup>> {
        let out = self
            .ec2
            .describe_security_groups()
            .filters(filter("vpc-id", vpc_id))
            .filters(filter("group-name", name))
            .send()
            .await
            .map_err(|e| classify("DescribeSecurityGroups", e))?;
        Ok(out.security_groups().first().and_then(|g| {
            Some(SecurityGroup {
                id: g.group_id()?.to_string(),
                name: g.group_name().unwrap_or(name).to_string(),
                ingress: ingress_rules(g.ip_permissions()),
            })
        }))
    }

    async fn create_security_group(
        &self,
        vpc_id: &str,
        name: &str,
        description: &str,
    ) -> GatewayResult<String> {
        let out = self
            .ec2
            .create_security_group()
            .vpc_id(vpc_id)
            .group_name(name)
            .description(description)
            .send()
            .await
            .map_err(|e| classify("CreateSecurityGroup", e))?;
        out.group_id()
            .map(str::to_string)
            .ok_or_else(|| missing("CreateSecurityGroup", "GroupId"))
    }

    async fn authorize_ingress(&self, group_id: &str, rule: &IngressRule) -> GatewayResult<()> {
        self.ec2
            .authorize_security_group_ingress()
            .group_id(group_id)
            .ip_permissions(permission(rule))
            .send()
            .await
            .map_err(|e| classify("AuthorizeSecurityGroupIngress", e))?;
        Ok(())
    }

    async fn revoke_ingress(&self, group_id: &str, rule: &IngressRule) -> GatewayResult<()> {
        self.ec2
            .revoke_security_group_ingress()
            .group_id(group_id)
            .ip_permissions(permission(rule))
            .send()
            .await
            .map_err(|e| classify("RevokeSecurityGroupIngress", e))?;
        Ok(())
    }

    async fn delete_security_group(&self, group_id: &str) -> GatewayResult<()> {
        self.ec2
            .delete_security_group()
            .group_id(group_id)
            .send()
            .await
            .map_err(|e| classify("DeleteSecurityGroup", e))?;
        Ok(())
    }

    async fn network_interface_public_ip(&self, eni_id: &str) -> GatewayResult<Option<String>> {
        let out = optional(
            self.ec2
                .describe_network_interfaces()
                .network_interface_ids(eni_id)
                .send()
                .await
                .map_err(|e| classify("DescribeNetworkInterfaces", e)),
        )?;
        Ok(out.and_then(|out| {
            out.network_interfaces()
                .first()
                .and_then(|eni| eni.association())
                .and_then(|a| a.public_ip())
                .map(str::to_string)
        }))
    }
}
