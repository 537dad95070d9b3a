//! MachineFlow driver
//!
//! Provisions one VM with its keypair, security group, public IP and tags
//! through a [`machineflow_cloud::CloudApi`], and runs the lifecycle
//! operations on it afterwards.
//!
//! ```text
//! Driver::create
//!   ├─ keypair ─ security group (+ rules) ─ public IP ─ VM
//!   ├─ wait running ─ link public IP ─ tags
//!   └─ on failure: saga::teardown (VM → public IP → security group → keypair)
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod poller;
pub mod resources;
pub mod saga;
pub mod sshkey;

#[cfg(test)]
pub(crate) mod fake;

pub use config::{DiskType, DriverConfig, DriverOptions, RootDisk};
pub use driver::{Driver, ProvisionStage};
pub use error::{DriverError, Result, Step, TeardownFailure};
pub use resources::ResourceContext;
pub use resources::security_group::IngressRule;
pub use saga::{CommittedResource, ResourceLedger};
pub use sshkey::{SshKeySource, SshKeygen};
