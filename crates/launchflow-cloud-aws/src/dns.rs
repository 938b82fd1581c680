use crate::AwsCloud;
use crate::error::{classify, invalid_request, missing, optional};
use async_trait::async_trait;
use aws_sdk_route53::types::{
    AliasTarget, Change, ChangeBatch, ResourceRecord, ResourceRecordSet, RrType,
};
use launchflow_cloud::gateway::{
    ChangeAction, DnsGateway, HostedZone, RecordSet, RecordTarget, RecordType,
};
use launchflow_cloud::{GatewayError, GatewayResult};

fn zone_id(raw: &str) -> String {
    raw.trim_start_matches("/hostedzone/").to_string()
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim_end_matches('.')
        .eq_ignore_ascii_case(b.trim_end_matches('.'))
}

fn hosted_zone(zone: &aws_sdk_route53::types::HostedZone) -> HostedZone {
    HostedZone {
        id: zone_id(zone.id()),
        name: zone.name().trim_end_matches('.').to_string(),
    }
}

fn record_set(set: &ResourceRecordSet) -> Option<RecordSet> {
    let record_type = RecordType::parse(set.r#type().as_str())?;
    let target = match set.alias_target() {
        Some(alias) => RecordTarget::Alias {
            dns_name: alias.dns_name().to_string(),
            hosted_zone_id: alias.hosted_zone_id().to_string(),
        },
        None => RecordTarget::Values {
            ttl: set.ttl().unwrap_or_default(),
            values: set
                .resource_records()
                .iter()
                .map(|r| r.value().to_string())
                .collect(),
        },
    };
    Some(RecordSet {
        name: set.name().to_string(),
        record_type,
        target,
    })
}

fn to_resource_record_set(record: &RecordSet) -> GatewayResult<ResourceRecordSet> {
    let op = "ResourceRecordSet";
    let builder = ResourceRecordSet::builder()
        .name(&record.name)
        .r#type(RrType::from(record.record_type.as_str()));
    let builder = match &record.target {
        RecordTarget::Alias {
            dns_name,
            hosted_zone_id,
        } => builder.alias_target(
            AliasTarget::builder()
                .dns_name(dns_name)
                .hosted_zone_id(hosted_zone_id)
                .evaluate_target_health(false)
                .build()
                .map_err(|e| invalid_request(op, e))?,
        ),
        RecordTarget::Values { ttl, values } => {
            let records = values
                .iter()
                .map(|v| ResourceRecord::builder().value(v).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| invalid_request(op, e))?;
            builder.ttl(*ttl).set_resource_records(Some(records))
        }
    };
    builder.build().map_err(|e| invalid_request(op, e))
}

/// Route53 reports both conflicts as `InvalidChangeBatch`
fn refine_change_error(err: GatewayError, record: &RecordSet) -> GatewayError {
    let GatewayError::Other { message, .. } = &err else {
        return err;
    };
    let lower = message.to_ascii_lowercase();
    if lower.contains("already exists") {
        GatewayError::AlreadyExists(record.name.clone())
    } else if lower.contains("not found") {
        GatewayError::NotFound(record.name.clone())
    } else {
        err
    }
}

#[async_trait]
impl DnsGateway for AwsCloud {
    async fn find_hosted_zone(&self, name: &str) -> GatewayResult<Option<HostedZone>> {
        let out = self
            .route53
            .list_hosted_zones_by_name()
            .dns_name(name)
            .max_items(10)
            .send()
            .await
            .map_err(|e| classify("ListHostedZonesByName", e))?;
        // the list starts at `name`; public zones only
        Ok(out
            .hosted_zones()
            .iter()
            .filter(|z| same_name(z.name(), name))
            .find(|z| !z.config().is_some_and(|c| c.private_zone()))
            .map(hosted_zone))
    }

    async fn create_hosted_zone(
        &self,
        name: &str,
        caller_reference: &str,
    ) -> GatewayResult<HostedZone> {
        let out = self
            .route53
            .create_hosted_zone()
            .name(name)
            .caller_reference(caller_reference)
            .send()
            .await
            .map_err(|e| classify("CreateHostedZone", e))?;
        out.hosted_zone()
            .map(hosted_zone)
            .ok_or_else(|| missing("CreateHostedZone", "HostedZone"))
    }

    async fn zone_nameservers(&self, zone: &HostedZone) -> GatewayResult<Vec<String>> {
        let apex = format!("{}.", zone.name);
        match self.find_record(&zone.id, &apex, RecordType::Ns).await? {
            Some(RecordSet {
                target: RecordTarget::Values { values, .. },
                ..
            }) => Ok(values),
            _ => Ok(Vec::new()),
        }
    }

    async fn find_record(
        &self,
        zone_id: &str,
        name: &str,
        record_type: RecordType,
    ) -> GatewayResult<Option<RecordSet>> {
        let out = optional(
            self.route53
                .list_resource_record_sets()
                .hosted_zone_id(zone_id)
                .start_record_name(name)
                .start_record_type(RrType::from(record_type.as_str()))
                .max_items(1)
                .send()
                .await
                .map_err(|e| classify("ListResourceRecordSets", e)),
        )?;
        Ok(out.and_then(|out| {
            out.resource_record_sets()
                .iter()
                .filter(|s| same_name(s.name(), name))
                .filter_map(record_set)
                .find(|r| r.record_type == record_type)
        }))
    }

    async fn change_record(
        &self,
        zone_id: &str,
        action: ChangeAction,
        record: &RecordSet,
    ) -> GatewayResult<()> {
        let op = "ChangeResourceRecordSets";
        let action = match action {
            ChangeAction::Create => aws_sdk_route53::types::ChangeAction::Create,
            ChangeAction::Upsert => aws_sdk_route53::types::ChangeAction::Upsert,
            ChangeAction::Delete => aws_sdk_route53::types::ChangeAction::Delete,
        };
        let change = Change::builder()
            .action(action)
            .resource_record_set(to_resource_record_set(record)?)
            .build()
            .map_err(|e| invalid_request(op, e))?;
        let batch = ChangeBatch::builder()
            .changes(change)
            .build()
            .map_err(|e| invalid_request(op, e))?;

        self.route53
            .change_resource_record_sets()
            .hosted_zone_id(zone_id)
            .change_batch(batch)
            .send()
            .await
            .map_err(|e| refine_change_error(classify(op, e), record))?;
        Ok(())
    }
}
