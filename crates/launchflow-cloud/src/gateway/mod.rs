//! Remote resource gateway
//!
//! One trait per resource kind. Implementations are pure I/O: they translate
//! calls into provider requests and report failures as tagged
//! [`GatewayError`](crate::GatewayError) kinds. Lookups return `Ok(None)` for
//! absent resources; every decision about what to do next lives in
//! [`crate::reconcile`].

mod cdn;
mod certificate;
mod compute;
mod dns;
mod identity;
mod load_balancer;
mod logs;
mod network;
mod registry;
mod storage;

pub use cdn::*;
pub use certificate::*;
pub use compute::*;
pub use dns::*;
pub use identity::*;
pub use load_balancer::*;
pub use logs::*;
pub use network::*;
pub use registry::*;
pub use storage::*;

use crate::error::GatewayResult;
use async_trait::async_trait;

/// Every capability the deploy and teardown sequencers need.
pub trait CloudGateway:
    NetworkGateway
    + IdentityGateway
    + LogGateway
    + EventGateway
    + RegistryGateway
    + ComputeGateway
    + LoadBalancerGateway
    + CertificateGateway
    + CdnGateway
    + DnsGateway
    + StorageGateway
{
}

impl<T> CloudGateway for T where
    T: NetworkGateway
        + IdentityGateway
        + LogGateway
        + EventGateway
        + RegistryGateway
        + ComputeGateway
        + LoadBalancerGateway
        + CertificateGateway
        + CdnGateway
        + DnsGateway
        + StorageGateway
        + ?Sized
{
}

/// Public DNS view of a domain, independent of any provider account
#[async_trait]
pub trait PublicResolver: Send + Sync {
    /// Nameservers the internet currently sees for `domain`
    async fn nameservers(&self, domain: &str) -> GatewayResult<Vec<String>>;
}
