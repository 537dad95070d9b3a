//! Security groups and their ingress rules

use super::{ResourceContext, resource_name, stored};
use crate::error::{DriverError, Result, Step};
use machineflow_cloud::{
    CreateSecurityGroupRequest, CreateSecurityGroupRuleRequest, Flow, Protocol,
};
use std::str::FromStr;

/// Source range of every default rule
pub const ANY_IP_RANGE: &str = "0.0.0.0/0";

/// Inbound rule opened on the default security group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngressRule {
    pub protocol: Protocol,
    pub from_port: u16,
    pub to_port: u16,
}

impl IngressRule {
    pub const fn tcp(port: u16) -> Self {
        Self::range(Protocol::Tcp, port, port)
    }

    pub const fn udp(port: u16) -> Self {
        Self::range(Protocol::Udp, port, port)
    }

    pub const fn range(protocol: Protocol, from_port: u16, to_port: u16) -> Self {
        Self {
            protocol,
            from_port,
            to_port,
        }
    }
}

impl std::fmt::Display for IngressRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.from_port == self.to_port {
            write!(f, "{}:{}", self.protocol, self.from_port)
        } else {
            write!(f, "{}:{}-{}", self.protocol, self.from_port, self.to_port)
        }
    }
}

/// Parses `proto:port` or `proto:from-to`, e.g. `tcp:8080` or `udp:5000-5100`
impl FromStr for IngressRule {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            DriverError::InvalidConfig(format!(
                "ingress rule '{}' must look like 'tcp:PORT' or 'udp:FROM-TO'",
                s
            ))
        };

        let (proto, ports) = s.trim().split_once(':').ok_or_else(invalid)?;
        let protocol = match proto.to_ascii_lowercase().as_str() {
            "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            _ => return Err(invalid()),
        };

        let (from, to) = match ports.split_once('-') {
            Some((from, to)) => (from, to),
            None => (ports, ports),
        };
        let from_port: u16 = from.trim().parse().map_err(|_| invalid())?;
        let to_port: u16 = to.trim().parse().map_err(|_| invalid())?;

        if from_port == 0 || from_port > to_port {
            return Err(invalid());
        }

        Ok(Self::range(protocol, from_port, to_port))
    }
}

/// Rules opened on a driver-created security group
///
/// SSH, the Docker daemon and the usual Kubernetes ports, followed by
/// `extra`.
pub fn default_rules(docker_port: u16, extra: &[IngressRule]) -> Vec<IngressRule> {
    let mut rules = vec![
        IngressRule::tcp(22),
        IngressRule::tcp(docker_port),
        // etcd
        IngressRule::range(Protocol::Tcp, 2379, 2380),
        // kube-apiserver
        IngressRule::tcp(6443),
        // ingress
        IngressRule::tcp(80),
        IngressRule::tcp(443),
        // node ports
        IngressRule::range(Protocol::Tcp, 30000, 32767),
        IngressRule::range(Protocol::Udp, 30000, 32767),
        // kubelet, scheduler, controller-manager, kube-proxy
        IngressRule::range(Protocol::Tcp, 10250, 10252),
        IngressRule::tcp(10256),
        // flannel / calico VXLAN
        IngressRule::udp(8472),
        IngressRule::udp(4789),
    ];
    rules.extend_from_slice(extra);
    rules
}

/// Create an empty security group and return its id
pub async fn create(
    ctx: &ResourceContext,
    machine_name: &str,
    net_id: Option<&str>,
) -> Result<String> {
    let request = CreateSecurityGroupRequest {
        name: resource_name(machine_name),
        description: format!("Security group for machineflow {}", machine_name),
        net_id: net_id.map(str::to_string),
    };
    tracing::debug!("Creating security group {}", request.name);

    let group = ctx
        .call(Step::CreateSecurityGroup, || {
            ctx.api.create_security_group(&request)
        })
        .await?
        .ok_or_else(|| {
            DriverError::resource_state(
                Step::CreateSecurityGroup,
                "the response contains no security group",
            )
        })?;

    Ok(group.id)
}

pub async fn add_rule(ctx: &ResourceContext, group_id: &str, rule: &IngressRule) -> Result<()> {
    let request = CreateSecurityGroupRuleRequest {
        security_group_id: group_id.to_string(),
        flow: Flow::Inbound,
        protocol: rule.protocol,
        from_port: rule.from_port,
        to_port: rule.to_port,
        ip_range: ANY_IP_RANGE.to_string(),
    };
    tracing::debug!("Opening {} on {}", rule, group_id);

    ctx.call(Step::AddSecurityGroupRule, || {
        ctx.api.create_security_group_rule(&request)
    })
    .await?
    .map(|_| ())
    .ok_or_else(|| {
        DriverError::resource_state(
            Step::AddSecurityGroupRule,
            format!("no security group returned after adding {}", rule),
        )
    })
}

/// Whether exactly one group with this id exists
pub async fn exists(ctx: &ResourceContext, id: &str) -> Result<bool> {
    tracing::debug!("Checking that security group '{}' exists", id);
    let ids = [id.to_string()];
    let groups = ctx
        .call(Step::ReadSecurityGroups, || ctx.api.read_security_groups(&ids))
        .await?;
    Ok(groups.len() == 1)
}

pub async fn delete(ctx: &ResourceContext, id: Option<&str>) -> Result<()> {
    let Some(id) = stored(id) else {
        tracing::warn!("Skipping deletion of the security group because none was stored");
        return Ok(());
    };

    tracing::debug!("Deleting security group {}", id);
    ctx.call_delete(Step::DeleteSecurityGroup, &format!("security group {}", id), || ctx.api.delete_security_group(id))
        .await
}
