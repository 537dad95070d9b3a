//! OSC API wire types
//!
//! Request and response bodies as the API spells them (PascalCase), with
//! conversions into the provider-agnostic models of `machineflow-cloud`.

use machineflow_cloud::{
    AccountInfo, CreateSecurityGroupRuleRequest, CreateVmsRequest, Keypair, ProviderErrorDetail,
    PublicIp, SecurityGroup, Subnet, Tag, Vm,
};
use serde::{Deserialize, Serialize};

// ============ Requests ============

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Empty {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateKeypairBody<'a> {
    pub keypair_name: &'a str,
    pub public_key: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteKeypairBody<'a> {
    pub keypair_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateSecurityGroupBody<'a> {
    pub security_group_name: &'a str,
    pub description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateSecurityGroupRuleBody {
    pub security_group_id: String,
    pub flow: String,
    pub ip_protocol: String,
    pub from_port_range: u16,
    pub to_port_range: u16,
    pub ip_range: String,
}

impl From<&CreateSecurityGroupRuleRequest> for CreateSecurityGroupRuleBody {
    fn from(rule: &CreateSecurityGroupRuleRequest) -> Self {
        Self {
            security_group_id: rule.security_group_id.clone(),
            flow: rule.flow.to_string(),
            ip_protocol: rule.protocol.to_string(),
            from_port_range: rule.from_port,
            to_port_range: rule.to_port,
            ip_range: rule.ip_range.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroupFilters<'a> {
    pub security_group_ids: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubnetFilters<'a> {
    pub subnet_ids: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VmFilters<'a> {
    pub vm_ids: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReadBody<F> {
    pub filters: F,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteSecurityGroupBody<'a> {
    pub security_group_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LinkPublicIpBody<'a> {
    pub public_ip_id: &'a str,
    pub vm_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeletePublicIpBody<'a> {
    pub public_ip_id: &'a str,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireTag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl From<&Tag> for WireTag {
    fn from(tag: &Tag) -> Self {
        Self {
            key: tag.key.clone(),
            value: tag.value.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateTagsBody<'a> {
    pub resource_ids: &'a [String],
    pub tags: Vec<WireTag>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BsuToCreate {
    pub volume_type: String,
    pub volume_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iops: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockDeviceMapping {
    pub device_name: String,
    pub bsu: BsuToCreate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateVmsBody {
    pub image_id: String,
    pub vm_type: String,
    pub keypair_name: String,
    pub security_group_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    pub block_device_mappings: Vec<BlockDeviceMapping>,
}

impl From<&CreateVmsRequest> for CreateVmsBody {
    fn from(request: &CreateVmsRequest) -> Self {
        Self {
            image_id: request.image_id.clone(),
            vm_type: request.vm_type.clone(),
            keypair_name: request.keypair_name.clone(),
            security_group_ids: request.security_group_ids.clone(),
            subnet_id: request.subnet_id.clone(),
            block_device_mappings: vec![BlockDeviceMapping {
                device_name: request.root_disk.device_name.clone(),
                bsu: BsuToCreate {
                    volume_type: request.root_disk.volume_type.clone(),
                    volume_size: request.root_disk.size_gib,
                    iops: request.root_disk.iops,
                },
            }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VmIdsBody<'a> {
    pub vm_ids: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StopVmsBody<'a> {
    pub vm_ids: &'a [String],
    pub force_stop: bool,
}

// ============ Responses ============

/// Body of every response; only used to discard the payload
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Acknowledged {
    #[serde(default)]
    pub response_context: Option<ResponseContext>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseContext {
    pub request_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorResponse {
    #[serde(default)]
    pub errors: Vec<WireError>,
    #[serde(default)]
    pub response_context: Option<ResponseContext>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireError {
    pub code: Option<String>,
    #[serde(rename = "Type")]
    pub error_type: Option<String>,
    pub details: Option<String>,
}

impl From<WireError> for ProviderErrorDetail {
    fn from(e: WireError) -> Self {
        Self {
            code: e.code,
            error_type: e.error_type,
            details: e.details,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReadAccountsResponse {
    #[serde(default)]
    pub accounts: Vec<WireAccount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireAccount {
    pub account_id: String,
    pub email: Option<String>,
}

impl From<WireAccount> for AccountInfo {
    fn from(a: WireAccount) -> Self {
        Self {
            account_id: a.account_id,
            email: a.email,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateKeypairResponse {
    pub keypair: Option<WireKeypair>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireKeypair {
    pub keypair_name: String,
    pub keypair_fingerprint: Option<String>,
}

impl From<WireKeypair> for Keypair {
    fn from(k: WireKeypair) -> Self {
        Self {
            name: k.keypair_name,
            fingerprint: k.keypair_fingerprint,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityGroupResponse {
    pub security_group: Option<WireSecurityGroup>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReadSecurityGroupsResponse {
    #[serde(default)]
    pub security_groups: Vec<WireSecurityGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireSecurityGroup {
    pub security_group_id: String,
    #[serde(default)]
    pub security_group_name: String,
    pub net_id: Option<String>,
}

impl From<WireSecurityGroup> for SecurityGroup {
    fn from(sg: WireSecurityGroup) -> Self {
        Self {
            id: sg.security_group_id,
            name: sg.security_group_name,
            net_id: sg.net_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreatePublicIpResponse {
    pub public_ip: Option<WirePublicIp>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WirePublicIp {
    pub public_ip_id: String,
    pub public_ip: String,
}

impl From<WirePublicIp> for PublicIp {
    fn from(ip: WirePublicIp) -> Self {
        Self {
            id: ip.public_ip_id,
            address: ip.public_ip,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LinkPublicIpResponse {
    pub link_public_ip_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReadSubnetsResponse {
    #[serde(default)]
    pub subnets: Vec<WireSubnet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireSubnet {
    pub subnet_id: String,
    pub net_id: String,
}

impl From<WireSubnet> for Subnet {
    fn from(s: WireSubnet) -> Self {
        Self {
            id: s.subnet_id,
            net_id: s.net_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VmsResponse {
    #[serde(default)]
    pub vms: Vec<WireVm>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireVm {
    pub vm_id: String,
    #[serde(default)]
    pub state: String,
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
    #[serde(default)]
    pub tags: Vec<WireTag>,
}

impl From<WireVm> for Vm {
    fn from(vm: WireVm) -> Self {
        Self {
            id: vm.vm_id,
            state: vm.state,
            public_ip: vm.public_ip,
            private_ip: vm.private_ip,
            tags: vm.tags.into_iter().map(|t| Tag::new(t.key, t.value)).collect(),
        }
    }
}
