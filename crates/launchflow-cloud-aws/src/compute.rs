use crate::AwsCloud;
use crate::error::{classify, invalid_request, missing, optional};
use async_trait::async_trait;
use aws_sdk_ecs::types::{
    AssignPublicIp, AwsVpcConfiguration, CapacityProviderStrategyItem, ClusterSetting,
    ClusterSettingName, Compatibility, ContainerDefinition, CpuArchitecture, EphemeralStorage,
    KeyValuePair, LogConfiguration, LogDriver, NetworkConfiguration, NetworkMode, OsFamily,
    PortMapping, RuntimePlatform, TaskDefinitionStatus, TransportProtocol,
};
use launchflow_cloud::gateway::{
    Cluster, ComputeGateway, LoadBalancerAttachment, ServiceSpec, ServiceSummary,
    TaskDefinitionSpec, TaskSummary,
};
use launchflow_cloud::{CapacityProvider, GatewayResult};

const ENI_ATTACHMENT: &str = "ElasticNetworkInterface";

fn cluster(c: &aws_sdk_ecs::types::Cluster) -> Option<Cluster> {
    Some(Cluster {
        name: c.cluster_name()?.to_string(),
        arn: c.cluster_arn().unwrap_or_default().to_string(),
        status: c.status().unwrap_or("ACTIVE").to_string(),
    })
}

fn service(s: &aws_sdk_ecs::types::Service) -> Option<ServiceSummary> {
    Some(ServiceSummary {
        name: s.service_name()?.to_string(),
        arn: s.service_arn().unwrap_or_default().to_string(),
        status: s.status().unwrap_or_default().to_string(),
        task_definition: s.task_definition().unwrap_or_default().to_string(),
        desired_count: u32::try_from(s.desired_count()).unwrap_or(0),
        running_count: u32::try_from(s.running_count()).unwrap_or(0),
        load_balancers: s
            .load_balancers()
            .iter()
            .filter_map(|lb| {
                Some(LoadBalancerAttachment {
                    target_group_arn: lb.target_group_arn()?.to_string(),
                    container_name: lb.container_name()?.to_string(),
                    container_port: u16::try_from(lb.container_port()?).ok()?,
                })
            })
            .collect(),
    })
}

fn strategy(provider: CapacityProvider) -> GatewayResult<CapacityProviderStrategyItem> {
    CapacityProviderStrategyItem::builder()
        .capacity_provider(provider.as_str())
        .weight(1)
        .build()
        .map_err(|e| invalid_request("CapacityProviderStrategy", e))
}

fn network(spec: &ServiceSpec) -> GatewayResult<NetworkConfiguration> {
    let vpc = AwsVpcConfiguration::builder()
        .set_subnets(Some(spec.subnets.clone()))
        .set_security_groups(Some(spec.security_groups.clone()))
        .assign_public_ip(AssignPublicIp::Enabled)
        .build()
        .map_err(|e| invalid_request("AwsVpcConfiguration", e))?;
    Ok(NetworkConfiguration::builder()
        .awsvpc_configuration(vpc)
        .build())
}

fn attachment(lb: &LoadBalancerAttachment) -> aws_sdk_ecs::types::LoadBalancer {
    aws_sdk_ecs::types::LoadBalancer::builder()
        .target_group_arn(&lb.target_group_arn)
        .container_name(&lb.container_name)
        .container_port(i32::from(lb.container_port))
        .build()
}

fn container(spec: &TaskDefinitionSpec) -> GatewayResult<ContainerDefinition> {
    let logging = LogConfiguration::builder()
        .log_driver(LogDriver::Awslogs)
        .options("awslogs-group", &spec.log_group)
        .options("awslogs-region", &spec.log_region)
        .options("awslogs-stream-prefix", "ecs")
        .build()
        .map_err(|e| invalid_request("LogConfiguration", e))?;
    let environment = spec
        .environment
        .iter()
        .map(|(name, value)| KeyValuePair::builder().name(name).value(value).build())
        .collect();
    Ok(ContainerDefinition::builder()
        .name(&spec.container_name)
        .image(&spec.image)
        .essential(true)
        .port_mappings(
            PortMapping::builder()
                .container_port(i32::from(spec.port))
                .protocol(TransportProtocol::Tcp)
                .build(),
        )
        .set_environment(Some(environment))
        .log_configuration(logging)
        .build())
}

/// `arn:...:task-definition/<family>:<revision>`
fn family_of(arn: &str) -> Option<&str> {
    let tail = arn.rsplit_once("task-definition/")?.1;
    Some(tail.rsplit_once(':').map_or(tail, |(family, _)| family))
}

fn task(t: &aws_sdk_ecs::types::Task) -> TaskSummary {
    let eni = t
        .attachments()
        .iter()
        .find(|a| a.r#type() == Some(ENI_ATTACHMENT));
    let detail = |key: &str| {
        eni.and_then(|a| {
            a.details()
                .iter()
                .find(|d| d.name() == Some(key))
                .and_then(|d| d.value())
                .map(str::to_string)
        })
    };
    TaskSummary {
        arn: t.task_arn().unwrap_or_default().to_string(),
        last_status: t.last_status().unwrap_or_default().to_string(),
        eni_id: detail("networkInterfaceId"),
        public_ip: detail("publicIPv4Address"),
    }
}

#[async_trait]
impl ComputeGateway for AwsCloud {
    async fn find_cluster(&self, name: &str) -> GatewayResult<Option<Cluster>> {
        let out = self
            .ecs
            .describe_clusters()
            .clusters(name)
            .send()
            .await
            .map_err(|e| classify("DescribeClusters", e))?;
        Ok(out.clusters().first().and_then(cluster))
    }

    async fn create_cluster(&self, name: &str) -> GatewayResult<Cluster> {
        let out = self
            .ecs
            .create_cluster()
            .cluster_name(name)
            .send()
            .await
            .map_err(|e| classify("CreateCluster", e))?;
        out.cluster()
            .and_then(cluster)
            .ok_or_else(|| missing("CreateCluster", "cluster"))
    }

    async fn put_capacity_providers(
        &self,
        cluster: &str,
        providers: &[CapacityProvider],
    ) -> GatewayResult<()> {
        let names = providers.iter().map(|p| p.as_str().to_string()).collect();
        let default_strategy = match providers.first() {
            Some(first) => vec![strategy(*first)?],
            None => Vec::new(),
        };
        self.ecs
            .put_cluster_capacity_providers()
            .cluster(cluster)
            .set_capacity_providers(Some(names))
            .set_default_capacity_provider_strategy(Some(default_strategy))
            .send()
            .await
            .map_err(|e| classify("PutClusterCapacityProviders", e))?;
        Ok(())
    }

    async fn enable_enhanced_insights(&self, cluster: &str) -> GatewayResult<()> {
        self.ecs
            .update_cluster_settings()
            .cluster(cluster)
            .settings(
                ClusterSetting::builder()
                    .name(ClusterSettingName::ContainerInsights)
                    .value("enhanced")
                    .build(),
            )
            .send()
            .await
            .map_err(|e| classify("UpdateClusterSettings", e))?;
        Ok(())
    }

    async fn delete_cluster(&self, cluster: &str) -> GatewayResult<()> {
        self.ecs
            .delete_cluster()
            .cluster(cluster)
            .send()
            .await
            .map_err(|e| classify("DeleteCluster", e))?;
        Ok(())
    }

    async fn register_task_definition(&self, spec: &TaskDefinitionSpec) -> GatewayResult<String> {
        let mut request = self
            .ecs
            .register_task_definition()
            .family(&spec.family)
            .network_mode(NetworkMode::Awsvpc)
            .requires_compatibilities(Compatibility::Fargate)
            .cpu(&spec.cpu)
            .memory(&spec.memory)
            .execution_role_arn(&spec.execution_role_arn)
            .runtime_platform(
                RuntimePlatform::builder()
                    .cpu_architecture(CpuArchitecture::X8664)
                    .operating_system_family(OsFamily::Linux)
                    .build(),
            )
            .container_definitions(container(spec)?);
        if let Some(gib) = spec.ephemeral_storage_gib {
            let storage = EphemeralStorage::builder()
                .size_in_gib(i32::try_from(gib).unwrap_or(i32::MAX))
                .build()
                .map_err(|e| invalid_request("EphemeralStorage", e))?;
            request = request.ephemeral_storage(storage);
        }

        let out = request
            .send()
            .await
            .map_err(|e| classify("RegisterTaskDefinition", e))?;
        out.task_definition()
            .and_then(|td| td.task_definition_arn())
            .map(str::to_string)
            .ok_or_else(|| missing("RegisterTaskDefinition", "taskDefinitionArn"))
    }

    async fn task_definitions(&self, family: &str) -> GatewayResult<Vec<String>> {
        let mut arns = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let out = self
                .ecs
                .list_task_definitions()
                .family_prefix(family)
                .status(TaskDefinitionStatus::Active)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify("ListTaskDefinitions", e))?;
            // family_prefix also matches longer family names
            arns.extend(
                out.task_definition_arns()
                    .iter()
                    .filter(|arn| family_of(arn) == Some(family))
                    .cloned(),
            );
            match out.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(arns)
    }

    async fn deregister_task_definition(&self, arn: &str) -> GatewayResult<()> {
        self.ecs
            .deregister_task_definition()
            .task_definition(arn)
            .send()
            .await
            .map_err(|e| classify("DeregisterTaskDefinition", e))?;
        Ok(())
    }

    async fn find_service(
        &self,
        cluster: &str,
        name: &str,
    ) -> GatewayResult<Option<ServiceSummary>> {
        let out = optional(
            self.ecs
                .describe_services()
                .cluster(cluster)
                .services(name)
                .send()
                .await
                .map_err(|e| classify("DescribeServices", e)),
        )?;
        Ok(out.and_then(|out| out.services().first().and_then(service)))
    }

    async fn create_service(&self, spec: &ServiceSpec) -> GatewayResult<ServiceSummary> {
        let mut request = self
            .ecs
            .create_service()
            .cluster(&spec.cluster)
            .service_name(&spec.name)
            .task_definition(&spec.task_definition_arn)
            .desired_count(i32::try_from(spec.desired_count).unwrap_or(i32::MAX))
            .capacity_provider_strategy(strategy(spec.capacity_provider)?)
            .network_configuration(network(spec)?);
        if let Some(lb) = &spec.load_balancer {
            request = request
                .load_balancers(attachment(lb))
                .health_check_grace_period_seconds(60);
        }

        let out = request
            .send()
            .await
            .map_err(|e| classify("CreateService", e))?;
        out.service()
            .and_then(service)
            .ok_or_else(|| missing("CreateService", "service"))
    }

    async fn update_service(&self, spec: &ServiceSpec) -> GatewayResult<ServiceSummary> {
        let mut request = self
            .ecs
            .update_service()
            .cluster(&spec.cluster)
            .service(&spec.name)
            .task_definition(&spec.task_definition_arn)
            .desired_count(i32::try_from(spec.desired_count).unwrap_or(i32::MAX))
            .capacity_provider_strategy(strategy(spec.capacity_provider)?)
            .network_configuration(network(spec)?)
            .force_new_deployment(true);
        if let Some(lb) = &spec.load_balancer {
            request = request.load_balancers(attachment(lb));
        }

        let out = request
            .send()
            .await
            .map_err(|e| classify("UpdateService", e))?;
        out.service()
            .and_then(service)
            .ok_or_else(|| missing("UpdateService", "service"))
    }

    async fn delete_service(&self, cluster: &str, name: &str) -> GatewayResult<()> {
        self.ecs
            .delete_service()
            .cluster(cluster)
            .service(name)
            .force(true)
            .send()
            .await
            .map_err(|e| classify("DeleteService", e))?;
        Ok(())
    }

    async fn service_tasks(
        &self,
        cluster: &str,
        service: &str,
    ) -> GatewayResult<Vec<TaskSummary>> {
        let listed = self
            .ecs
            .list_tasks()
            .cluster(cluster)
            .service_name(service)
            .send()
            .await
            .map_err(|e| classify("ListTasks", e))?;
        let arns = listed.task_arns().to_vec();
        if arns.is_empty() {
            return Ok(Vec::new());
        }

        let out = self
            .ecs
            .describe_tasks()
            .cluster(cluster)
            .set_tasks(Some(arns))
            .send()
            .await
            .map_err(|e| classify("DescribeTasks", e))?;
        Ok(out.tasks().iter().map(task).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ecs::types::Attachment;

    #[test]
    fn test_family_of() {
        assert_eq!(
            family_of("arn:aws:ecs:eu-west-1:1:task-definition/demo-task:7"),
            Some("demo-task")
        );
        assert_eq!(
            family_of("arn:aws:ecs:eu-west-1:1:task-definition/demo-task-v2:1"),
            Some("demo-task-v2")
        );
        assert_eq!(family_of("not-an-arn"), None);
    }

    #[test]
    fn test_task_reads_eni_details() {
        let t = aws_sdk_ecs::types::Task::builder()
            .task_arn("arn:task/1")
            .last_status("RUNNING")
            .attachments(
                Attachment::builder()
                    .r#type(ENI_ATTACHMENT)
                    .details(
                        KeyValuePair::builder()
                            .name("networkInterfaceId")
                            .value("eni-1")
                            .build(),
                    )
                    .build(),
            )
            .build();

        let summary = task(&t);
        assert_eq!(summary.last_status, "RUNNING");
        assert_eq!(summary.eni_id.as_deref(), Some("eni-1"));
        assert_eq!(summary.public_ip, None);
    }
}
