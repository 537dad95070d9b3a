//! Remote cloud API abstraction
//!
//! The driver talks to the provider exclusively through [`CloudApi`]. Create
//! calls return `Option`/`Vec` so that a successful transport answer which
//! omits the created resource can be told apart from a real creation.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Remote API covering the five resource families the driver manages
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Read the account behind the configured credentials
    async fn read_account(&self) -> Result<Option<AccountInfo>>;

    async fn create_keypair(&self, request: &CreateKeypairRequest) -> Result<Option<Keypair>>;

    async fn delete_keypair(&self, name: &str) -> Result<()>;

    async fn create_security_group(
        &self,
        request: &CreateSecurityGroupRequest,
    ) -> Result<Option<SecurityGroup>>;

    async fn create_security_group_rule(
        &self,
        request: &CreateSecurityGroupRuleRequest,
    ) -> Result<Option<SecurityGroup>>;

    async fn read_security_groups(&self, ids: &[String]) -> Result<Vec<SecurityGroup>>;

    async fn delete_security_group(&self, id: &str) -> Result<()>;

    async fn create_public_ip(&self) -> Result<Option<PublicIp>>;

    /// Returns the link identifier
    async fn link_public_ip(&self, public_ip_id: &str, vm_id: &str) -> Result<Option<String>>;

    async fn delete_public_ip(&self, id: &str) -> Result<()>;

    async fn create_tags(&self, resource_ids: &[String], tags: &[Tag]) -> Result<()>;

    async fn read_subnets(&self, ids: &[String]) -> Result<Vec<Subnet>>;

    async fn create_vms(&self, request: &CreateVmsRequest) -> Result<Vec<Vm>>;

    async fn read_vms(&self, ids: &[String]) -> Result<Vec<Vm>>;

    async fn start_vms(&self, ids: &[String]) -> Result<()>;

    async fn stop_vms(&self, ids: &[String], force: bool) -> Result<()>;

    async fn reboot_vms(&self, ids: &[String]) -> Result<()>;

    async fn delete_vms(&self, ids: &[String]) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateKeypairRequest {
    pub name: String,
    /// Base64-encoded OpenSSH public key
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypair {
    pub name: String,
    pub fingerprint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSecurityGroupRequest {
    pub name: String,
    pub description: String,
    /// Net (VPC) to create the group in; `None` for the public cloud
    pub net_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    pub net_id: Option<String>,
}

/// Direction of a security group rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flow {
    Inbound,
    Outbound,
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flow::Inbound => write!(f, "Inbound"),
            Flow::Outbound => write!(f, "Outbound"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSecurityGroupRuleRequest {
    pub security_group_id: String,
    pub flow: Flow,
    pub protocol: Protocol,
    pub from_port: u16,
    pub to_port: u16,
    pub ip_range: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicIp {
    pub id: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: String,
    pub net_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootDiskSpec {
    pub device_name: String,
    pub volume_type: String,
    pub size_gib: u32,
    /// Only sent for provisioned-IOPS volumes
    pub iops: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVmsRequest {
    pub image_id: String,
    pub vm_type: String,
    pub keypair_name: String,
    pub security_group_ids: Vec<String>,
    pub subnet_id: Option<String>,
    pub root_disk: RootDiskSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vm {
    pub id: String,
    /// Raw provider state string (see [`crate::state::VmState::from_provider`])
    pub state: String,
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}
