use crate::error::GatewayResult;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZone {
    pub id: String,
    /// Zone name without the trailing dot
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    A,
    Cname,
    Ns,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Cname => "CNAME",
            RecordType::Ns => "NS",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "A" => Some(RecordType::A),
            "CNAME" => Some(RecordType::Cname),
            "NS" => Some(RecordType::Ns),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordTarget {
    Alias {
        dns_name: String,
        hosted_zone_id: String,
    },
    Values {
        ttl: i64,
        values: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSet {
    /// Fully qualified name with trailing dot
    pub name: String,
    pub record_type: RecordType,
    pub target: RecordTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Create,
    Upsert,
    Delete,
}

/// Route53
#[async_trait]
pub trait DnsGateway: Send + Sync {
    /// Zone whose name is exactly `name`
    async fn find_hosted_zone(&self, name: &str) -> GatewayResult<Option<HostedZone>>;

    async fn create_hosted_zone(
        &self,
        name: &str,
        caller_reference: &str,
    ) -> GatewayResult<HostedZone>;

    /// Nameservers from the zone's apex NS record
    async fn zone_nameservers(&self, zone: &HostedZone) -> GatewayResult<Vec<String>>;

    async fn find_record(
        &self,
        zone_id: &str,
        name: &str,
        record_type: RecordType,
    ) -> GatewayResult<Option<RecordSet>>;

    async fn change_record(
        &self,
        zone_id: &str,
        action: ChangeAction,
        record: &RecordSet,
    ) -> GatewayResult<()>;
}
