//! Driver error types

use machineflow_cloud::{CloudError, ResourceKind};
use thiserror::Error;

/// Logical operation a remote failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ReadAccount,
    CreateKeypair,
    DeleteKeypair,
    CreateSecurityGroup,
    AddSecurityGroupRule,
    ReadSecurityGroups,
    DeleteSecurityGroup,
    CreatePublicIp,
    LinkPublicIp,
    DeletePublicIp,
    CreateTags,
    ReadSubnets,
    CreateVm,
    ReadVm,
    WaitVmState,
    StartVm,
    StopVm,
    RebootVm,
    DeleteVm,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Step::ReadAccount => "reading the account",
            Step::CreateKeypair => "creating the keypair",
            Step::DeleteKeypair => "deleting the keypair",
            Step::CreateSecurityGroup => "creating the security group",
            Step::AddSecurityGroupRule => "adding a security group rule",
            Step::ReadSecurityGroups => "reading security groups",
            Step::DeleteSecurityGroup => "deleting the security group",
            Step::CreatePublicIp => "allocating the public IP",
            Step::LinkPublicIp => "linking the public IP",
            Step::DeletePublicIp => "releasing the public IP",
            Step::CreateTags => "tagging",
            Step::ReadSubnets => "reading the subnet",
            Step::CreateVm => "creating the VM",
            Step::ReadVm => "reading the VM",
            Step::WaitVmState => "waiting for the VM state",
            Step::StartVm => "starting the VM",
            Step::StopVm => "stopping the VM",
            Step::RebootVm => "rebooting the VM",
            Step::DeleteVm => "deleting the VM",
        };
        write!(f, "{}", name)
    }
}

/// A deletion that failed during teardown
#[derive(Debug)]
pub struct TeardownFailure {
    pub kind: ResourceKind,
    pub id: String,
    pub error: DriverError,
}

impl std::fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}': {}", self.kind, self.id, self.error)
    }
}

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Error while {step}: {source}")]
    Step {
        step: Step,
        #[source]
        source: CloudError,
    },

    #[error("Error while {step}: {message}")]
    ResourceState { step: Step, message: String },

    #[error("Teardown incomplete: {}", format_failures(.0))]
    Teardown(Vec<TeardownFailure>),

    #[error("Machine '{0}' has no VM")]
    NoVm(String),

    #[error("Machine '{0}' has no IP address")]
    NoIpAddress(String),

    #[error("SSH key error: {0}")]
    SshKey(String),

    #[error(transparent)]
    Cloud(#[from] CloudError),
}

fn format_failures(failures: &[TeardownFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl DriverError {
    pub(crate) fn resource_state(step: Step, message: impl Into<String>) -> Self {
        DriverError::ResourceState {
            step,
            message: message.into(),
        }
    }

    /// The logical step that failed, when known
    pub fn step(&self) -> Option<Step> {
        match self {
            DriverError::Step { step, .. } | DriverError::ResourceState { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The underlying remote failure, when there is one
    pub fn cloud_error(&self) -> Option<&CloudError> {
        match self {
            DriverError::Step { source, .. } => Some(source),
            DriverError::Cloud(err) => Some(err),
            _ => None,
        }
    }
}

/// Attach the failing step to a cloud result
pub trait StepContext<T> {
    fn step(self, step: Step) -> Result<T>;
}

impl<T> StepContext<T> for machineflow_cloud::Result<T> {
    fn step(self, step: Step) -> Result<T> {
        self.map_err(|source| DriverError::Step { step, source })
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;
