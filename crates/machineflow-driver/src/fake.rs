//! In-memory [`CloudApi`] for driver tests
//!
//! Records every call, keeps the created resources and lets tests inject
//! failures or drop response bodies per operation.

use crate::resources::ResourceContext;
use async_trait::async_trait;
use machineflow_cloud::{
    AccountInfo, CloudApi, CloudError, CreateKeypairRequest, CreateSecurityGroupRequest,
    CreateSecurityGroupRuleRequest, CreateVmsRequest, Keypair, ProviderErrorDetail, PublicIp,
    Result, RetryPolicies, SecurityGroup, Subnet, Tag, Vm,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard};

pub(crate) fn throttled() -> CloudError {
    CloudError::Api {
        status: 503,
        errors: vec![ProviderErrorDetail {
            code: Some("1".to_string()),
            error_type: Some("RequestLimitExceeded".to_string()),
            details: None,
        }],
        request_id: None,
    }
}

pub(crate) fn bad_request() -> CloudError {
    CloudError::Api {
        status: 400,
        errors: vec![ProviderErrorDetail {
            code: Some("4045".to_string()),
            error_type: Some("InvalidParameterValue".to_string()),
            details: None,
        }],
        request_id: None,
    }
}

pub(crate) fn unknown_resource() -> CloudError {
    CloudError::Api {
        status: 400,
        errors: vec![ProviderErrorDetail {
            code: Some("5063".to_string()),
            error_type: Some("InvalidResource".to_string()),
            details: None,
        }],
        request_id: None,
    }
}

pub(crate) fn connection_reset() -> CloudError {
    CloudError::Transport("connection reset by peer".to_string())
}

#[derive(Default)]
struct FakeState {
    next_id: u32,
    calls: Vec<String>,
    keypairs: Vec<(String, String)>,
    security_groups: Vec<SecurityGroup>,
    rules: Vec<CreateSecurityGroupRuleRequest>,
    public_ips: Vec<PublicIp>,
    links: HashMap<String, String>,
    vms: Vec<Vm>,
    vm_requests: Vec<CreateVmsRequest>,
    transitions: HashMap<String, VecDeque<String>>,
    tags: HashMap<String, Vec<Tag>>,
    subnets: Vec<Subnet>,
    failures: HashMap<&'static str, VecDeque<CloudError>>,
    always_fail: HashMap<&'static str, fn() -> CloudError>,
    omitted: HashSet<&'static str>,
    /// Reads that still show `pending` after a launch; `None` never boots
    boot_rounds: Option<usize>,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:04}", prefix, self.next_id)
    }

    fn transition(&mut self, vm_id: &str, states: &[&str]) {
        self.transitions.insert(
            vm_id.to_string(),
            states.iter().map(|s| s.to_string()).collect(),
        );
    }
}

pub(crate) struct FakeCloud {
    state: Mutex<FakeState>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                boot_rounds: Some(1),
                ..Default::default()
            }),
        }
    }

    /// Context with zero-delay retry policies
    pub fn context(self: &Arc<Self>) -> ResourceContext {
        let api: Arc<dyn CloudApi> = self.clone();
        let mut ctx = ResourceContext::new(api);
        ctx.policies = RetryPolicies::immediate();
        ctx
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Log the call and apply injected failures
    fn begin(
        &self,
        operation: &'static str,
        detail: impl Display,
    ) -> Result<MutexGuard<'_, FakeState>> {
        let mut state = self.lock();
        let detail = detail.to_string();
        if detail.is_empty() {
            state.calls.push(operation.to_string());
        } else {
            state.calls.push(format!("{} {}", operation, detail));
        }

        if let Some(err) = state.failures.get_mut(operation).and_then(|q| q.pop_front()) {
            return Err(err);
        }
        if let Some(make) = state.always_fail.get(operation) {
            return Err(make());
        }
        Ok(state)
    }

    // ---- scripting ----

    pub fn fail_next(&self, operation: &'static str, err: CloudError) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(err);
    }

    pub fn fail_always(&self, operation: &'static str, make: fn() -> CloudError) {
        self.lock().always_fail.insert(operation, make);
    }

    /// Answer `operation` with success but without the resource
    pub fn omit_body(&self, operation: &'static str) {
        self.lock().omitted.insert(operation);
    }

    pub fn never_boot(&self) {
        self.lock().boot_rounds = None;
    }

    pub fn seed_security_group(&self, id: &str) {
        self.lock().security_groups.push(SecurityGroup {
            id: id.to_string(),
            name: id.to_string(),
            net_id: None,
        });
    }

    pub fn seed_subnet(&self, id: &str, net_id: &str) {
        self.lock().subnets.push(Subnet {
            id: id.to_string(),
            net_id: net_id.to_string(),
        });
    }

    pub fn seed_vm(&self, id: &str, state: &str) {
        self.lock().vms.push(Vm {
            id: id.to_string(),
            state: state.to_string(),
            public_ip: None,
            private_ip: None,
            tags: Vec::new(),
        });
    }

    // ---- inspection ----

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn keypairs(&self) -> Vec<String> {
        self.lock().keypairs.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn keypair_public_key(&self, name: &str) -> Option<String> {
        self.lock()
            .keypairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, key)| key.clone())
    }

    pub fn security_groups(&self) -> Vec<String> {
        self.lock()
            .security_groups
            .iter()
            .map(|sg| sg.id.clone())
            .collect()
    }

    pub fn security_group_net(&self, id: &str) -> Option<String> {
        self.lock()
            .security_groups
            .iter()
            .find(|sg| sg.id == id)
            .and_then(|sg| sg.net_id.clone())
    }

    pub fn rules_of(&self, group_id: &str) -> Vec<CreateSecurityGroupRuleRequest> {
        self.lock()
            .rules
            .iter()
            .filter(|r| r.security_group_id == group_id)
            .cloned()
            .collect()
    }

    pub fn public_ips(&self) -> Vec<String> {
        self.lock().public_ips.iter().map(|ip| ip.id.clone()).collect()
    }

    pub fn linked_vm(&self, public_ip_id: &str) -> Option<String> {
        self.lock().links.get(public_ip_id).cloned()
    }

    /// VMs that are listed and not terminated
    pub fn vm_ids(&self) -> Vec<String> {
        self.lock()
            .vms
            .iter()
            .filter(|vm| vm.state != "terminated")
            .map(|vm| vm.id.clone())
            .collect()
    }

    pub fn last_vm_request(&self) -> Option<CreateVmsRequest> {
        self.lock().vm_requests.last().cloned()
    }

    pub fn tags_of(&self, resource_id: &str) -> Vec<Tag> {
        self.lock().tags.get(resource_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CloudApi for FakeCloud {
    async fn read_account(&self) -> Result<Option<AccountInfo>> {
        self.begin("ReadAccounts", "")?;
        Ok(Some(AccountInfo {
            account_id: "123456789012".to_string(),
            email: None,
        }))
    }

    async fn create_keypair(&self, request: &CreateKeypairRequest) -> Result<Option<Keypair>> {
        let mut state = self.begin("CreateKeypair", "")?;
        if state.omitted.contains("CreateKeypair") {
            return Ok(None);
        }
        state
            .keypairs
            .push((request.name.clone(), request.public_key.clone()));
        Ok(Some(Keypair {
            name: request.name.clone(),
            fingerprint: None,
        }))
    }

    async fn delete_keypair(&self, name: &str) -> Result<()> {
        let mut state = self.begin("DeleteKeypair", name)?;
        state.keypairs.retain(|(n, _)| n != name);
        Ok(())
    }

    async fn create_security_group(
        &self,
        request: &CreateSecurityGroupRequest,
    ) -> Result<Option<SecurityGroup>> {
        let mut state = self.begin("CreateSecurityGroup", "")?;
        if state.omitted.contains("CreateSecurityGroup") {
            return Ok(None);
        }
        let group = SecurityGroup {
            id: state.next_id("sg"),
            name: request.name.clone(),
            net_id: request.net_id.clone(),
        };
        state.security_groups.push(group.clone());
        Ok(Some(group))
    }

    async fn create_security_group_rule(
        &self,
        request: &CreateSecurityGroupRuleRequest,
    ) -> Result<Option<SecurityGroup>> {
        let mut state = self.begin("CreateSecurityGroupRule", &request.security_group_id)?;
        if state.omitted.contains("CreateSecurityGroupRule") {
            return Ok(None);
        }
        state.rules.push(request.clone());
        Ok(state
            .security_groups
            .iter()
            .find(|sg| sg.id == request.security_group_id)
            .cloned())
    }

    async fn read_security_groups(&self, ids: &[String]) -> Result<Vec<SecurityGroup>> {
        let state = self.begin("ReadSecurityGroups", ids.join(","))?;
        Ok(state
            .security_groups
            .iter()
            .filter(|sg| ids.contains(&sg.id))
            .cloned()
            .collect())
    }

    async fn delete_security_group(&self, id: &str) -> Result<()> {
        let mut state = self.begin("DeleteSecurityGroup", id)?;
        state.security_groups.retain(|sg| sg.id != id);
        Ok(())
    }

    async fn create_public_ip(&self) -> Result<Option<PublicIp>> {
        let mut state = self.begin("CreatePublicIp", "")?;
        if state.omitted.contains("CreatePublicIp") {
            return Ok(None);
        }
        let id = state.next_id("eipalloc");
        let ip = PublicIp {
            address: format!("198.51.100.{}", state.next_id),
            id,
        };
        state.public_ips.push(ip.clone());
        Ok(Some(ip))
    }

    async fn link_public_ip(&self, public_ip_id: &str, vm_id: &str) -> Result<Option<String>> {
        let mut state = self.begin("LinkPublicIp", format!("{} {}", public_ip_id, vm_id))?;
        if state.omitted.contains("LinkPublicIp") {
            return Ok(None);
        }
        state
            .links
            .insert(public_ip_id.to_string(), vm_id.to_string());
        Ok(Some(state.next_id("eipassoc")))
    }

    async fn delete_public_ip(&self, id: &str) -> Result<()> {
        let mut state = self.begin("DeletePublicIp", id)?;
        state.public_ips.retain(|ip| ip.id != id);
        state.links.remove(id);
        Ok(())
    }

    async fn create_tags(&self, resource_ids: &[String], tags: &[Tag]) -> Result<()> {
        let mut state = self.begin("CreateTags", resource_ids.join(","))?;
        for id in resource_ids {
            state
                .tags
                .entry(id.clone())
                .or_default()
                .extend_from_slice(tags);
        }
        Ok(())
    }

    async fn read_subnets(&self, ids: &[String]) -> Result<Vec<Subnet>> {
        let state = self.begin("ReadSubnets", ids.join(","))?;
        Ok(state
            .subnets
            .iter()
            .filter(|s| ids.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn create_vms(&self, request: &CreateVmsRequest) -> Result<Vec<Vm>> {
        let mut state = self.begin("CreateVms", "")?;
        state.vm_requests.push(request.clone());
        if state.omitted.contains("CreateVms") {
            return Ok(Vec::new());
        }

        let vm = Vm {
            id: state.next_id("i"),
            state: "pending".to_string(),
            public_ip: None,
            private_ip: Some("10.0.0.10".to_string()),
            tags: Vec::new(),
        };
        if let Some(rounds) = state.boot_rounds {
            let mut script = vec!["pending"; rounds];
            script.push("running");
            state.transition(&vm.id, &script);
        }
        state.vms.push(vm.clone());
        Ok(vec![vm])
    }

    async fn read_vms(&self, ids: &[String]) -> Result<Vec<Vm>> {
        let mut state = self.lock();
        let injected = match state.failures.get_mut("ReadVms").and_then(|q| q.pop_front()) {
            Some(err) => Some(err),
            None => state.always_fail.get("ReadVms").map(|make| make()),
        };
        if let Some(err) = injected {
            state.calls.push(format!("ReadVms {}", ids.join(",")));
            return Err(err);
        }

        let mut listed = Vec::new();
        for id in ids {
            let next = state
                .transitions
                .get_mut(id)
                .and_then(|script| script.pop_front());
            let tags = state.tags.get(id).cloned().unwrap_or_default();
            let address = state
                .links
                .iter()
                .find(|(_, vm)| *vm == id)
                .and_then(|(ip_id, _)| state.public_ips.iter().find(|ip| &ip.id == ip_id))
                .map(|ip| ip.address.clone());
            if let Some(vm) = state.vms.iter_mut().find(|vm| &vm.id == id) {
                if let Some(next) = next {
                    vm.state = next;
                }
                vm.tags = tags;
                vm.public_ip = address;
                listed.push(vm.clone());
            }
        }

        let observed: Vec<String> = ids
            .iter()
            .map(|id| {
                let seen = listed
                    .iter()
                    .find(|vm| &vm.id == id)
                    .map(|vm| vm.state.as_str())
                    .unwrap_or("absent");
                format!("{}={}", id, seen)
            })
            .collect();
        state.calls.push(format!("ReadVms {}", observed.join(",")));
        Ok(listed)
    }

    async fn start_vms(&self, ids: &[String]) -> Result<()> {
        let mut state = self.begin("StartVms", ids.join(","))?;
        for id in ids {
            state.transition(id, &["pending", "running"]);
        }
        Ok(())
    }

    async fn stop_vms(&self, ids: &[String], force: bool) -> Result<()> {
        let detail = if force {
            format!("{} force", ids.join(","))
        } else {
            ids.join(",")
        };
        let mut state = self.begin("StopVms", detail)?;
        for id in ids {
            state.transition(id, &["stopping", "stopped"]);
        }
        Ok(())
    }

    async fn reboot_vms(&self, ids: &[String]) -> Result<()> {
        let mut state = self.begin("RebootVms", ids.join(","))?;
        for id in ids {
            state.transition(id, &["pending", "running"]);
        }
        Ok(())
    }

    async fn delete_vms(&self, ids: &[String]) -> Result<()> {
        let mut state = self.begin("DeleteVms", ids.join(","))?;
        for id in ids {
            state.transition(id, &["shutting-down", "terminated"]);
        }
        Ok(())
    }
}
