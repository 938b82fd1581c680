//! Typed results of reconciling one resource

use crate::action::ActionType;
use crate::gateway::ValidationRecord;
use crate::model::ResourceKind;

/// Stable identifier of a reconciled resource plus the attributes later
/// stages need from it.
///
/// Produced by exactly one reconciler; never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceHandle<A = ()> {
    pub kind: ResourceKind,
    /// ARN or provider id
    pub id: String,
    /// What the reconciler did to get here
    pub action: ActionType,
    pub attrs: A,
}

impl<A> ResourceHandle<A> {
    pub fn new(kind: ResourceKind, id: impl Into<String>, action: ActionType, attrs: A) -> Self {
        Self {
            kind,
            id: id.into(),
            action,
            attrs,
        }
    }

    pub fn changed(&self) -> bool {
        self.action.is_mutation()
    }
}

impl ResourceHandle<()> {
    pub fn bare(kind: ResourceKind, id: impl Into<String>, action: ActionType) -> Self {
        Self::new(kind, id, action, ())
    }
}

/// Default VPC plus the task security group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkAttrs {
    pub vpc_id: String,
    pub subnet_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryAttrs {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancerAttrs {
    pub dns_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateAttrs {
    /// Challenge records still to be satisfied; empty once issued
    pub validation_records: Vec<ValidationRecord>,
    pub issued: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionAttrs {
    pub domain_name: String,
}

/// Where a domain lives inside Route53
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneAttrs {
    pub zone_name: String,
    /// Record name relative to the zone (the full domain for the apex)
    pub record_name: String,
    /// The zone was created during this run
    pub fresh: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAttrs {
    pub cluster: String,
    pub desired_count: u32,
}
