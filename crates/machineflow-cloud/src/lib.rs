//! MachineFlow Cloud Core
//!
//! Provider-agnostic building blocks for provisioning a single machine
//! through a remote, eventually-consistent and rate-limited cloud API.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              machineflow-driver                 │
//! │   (orchestrator, lifecycle ops, saga, poller)   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               machineflow-cloud                 │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │          API Abstraction                  │   │
//! │  │  trait CloudApi { ... }                   │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ Retry Engine │  │ Machine Store│            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────┐
//! │   outscale    │
//! │    client     │
//! └───────────────┘
//! ```

pub mod api;
pub mod error;
pub mod retry;
pub mod state;

// Re-exports
pub use api::{
    AccountInfo, CloudApi, CreateKeypairRequest, CreateSecurityGroupRequest,
    CreateSecurityGroupRuleRequest, CreateVmsRequest, Flow, Keypair, Protocol, PublicIp,
    RootDiskSpec, SecurityGroup, Subnet, Tag, Vm,
};
pub use error::{CloudError, ProviderErrorDetail, Result};
pub use retry::{
    Delay, NOT_FOUND_ERROR_TYPE, RetryPolicies, RetryPolicy, THROTTLING_STATUS_CODES,
    execute_with_retry, is_not_converged, is_not_found_error, is_throttling_error,
};
pub use state::{
    Credentials, MachineLock, MachineRecord, MachineState, MachineStore, ResourceKind, VmState,
};
pub use tokio_util::sync::CancellationToken;
