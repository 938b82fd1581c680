//! LaunchFlow Cloud Engine
//!
//! Idempotent reconciliation of the AWS resources behind one application,
//! plus the deploy and teardown sequencers that drive them.
//!
//! Every resource is found by a name derived from the app name, compared
//! with the desired shape, and then created, updated or reused. Running a
//! deploy twice against the same account changes nothing the second time.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 LaunchFlow CLI                   │
//! │          (launch deploy / --destroy)             │
//! └─────────────────┬───────────────────────────────┘
//!                   │ DesiredState
//! ┌─────────────────▼───────────────────────────────┐
//! │               launchflow-cloud                   │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │   Deployer   │  │   Teardown   │  sequencers │
//! │  └──────┬───────┘  └──────┬───────┘             │
//! │  ┌──────▼─────────────────▼───────┐             │
//! │  │   reconcile::ensure_*          │  waiter     │
//! │  └──────┬─────────────────────────┘  smoke      │
//! │  ┌──────▼─────────────────────────┐             │
//! │  │   trait CloudGateway { ... }   │             │
//! │  └────────────────────────────────┘             │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼────────────┐
//! │ launchflow-cloud-  │
//! │ aws (AWS SDK)      │
//! └────────────────────┘
//! ```

pub mod action;
pub mod deploy;
pub mod error;
pub mod gateway;
pub mod handle;
pub mod model;
pub mod reconcile;
pub mod reporter;
pub mod smoke;
pub mod teardown;
pub mod topology;
pub mod waiter;

// Re-exports
pub use action::{
    ActionType, DeployReport, ReportSummary, StepRecord, TeardownOutcome, TeardownReport,
};
pub use deploy::{Deployer, IMAGE_PLATFORM, ImageBuilder};
pub use error::{CloudError, GatewayError, GatewayResult, GatewayResultExt, Result};
pub use gateway::{CloudGateway, PublicResolver};
pub use handle::ResourceHandle;
pub use model::{
    CERTIFICATE_REGION, CapacityProvider, ComputeSizing, DesiredState, ExposureMode,
    IamPolicySet, ImageSource, Platform, PublicExposure, ResourceKind, ResourceNames, StaticSite,
    default_bucket_name, validate_bucket_name,
};
pub use reporter::{AssumeYes, Confirm, Prompt, Reporter, TracingReporter};
pub use smoke::{HttpProbe, PROBE_TIMEOUT, ProbeResult};
pub use teardown::Teardown;
pub use topology::{DeploymentTopology, Stage};
pub use waiter::{Clock, ConvergenceTarget, ManualClock, TokioClock};
