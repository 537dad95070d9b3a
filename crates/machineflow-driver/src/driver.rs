//! Provisioning orchestrator
//!
//! [`Driver`] owns one [`MachineRecord`] and drives every lifecycle operation
//! on it. Creation is a fixed sequence of [`ProvisionStage`]s; whatever was
//! created before a failing stage is torn down by the saga before the
//! original error is returned.

use crate::config::{DOCKER_PORT, DriverConfig, SSH_PORT, SSH_USERNAME};
use crate::error::{DriverError, Result, Step};
use crate::poller::wait_for_vm_state;
use crate::resources::{
    ResourceContext, keypair, net, public_ip, security_group, tag, vm,
};
use crate::saga::{self, ResourceLedger};
use crate::sshkey::SshKeySource;
use machineflow_cloud::{
    CancellationToken, CloudApi, CreateVmsRequest, MachineRecord, MachineState, ResourceKind,
    RetryPolicies, Tag, VmState,
};
use std::sync::Arc;

/// Tag carrying the machine name on the VM
pub const NAME_TAG: &str = "name";

/// Progress of [`Driver::create`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStage {
    NoResources,
    KeypairCreated,
    SecurityGroupReady,
    PublicIpAllocated,
    VmRequested,
    VmRunning,
    PublicIpLinked,
    Tagged,
    Done,
    RollingBack,
}

impl std::fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProvisionStage::NoResources => "no-resources",
            ProvisionStage::KeypairCreated => "keypair-created",
            ProvisionStage::SecurityGroupReady => "security-group-ready",
            ProvisionStage::PublicIpAllocated => "public-ip-allocated",
            ProvisionStage::VmRequested => "vm-requested",
            ProvisionStage::VmRunning => "vm-running",
            ProvisionStage::PublicIpLinked => "public-ip-linked",
            ProvisionStage::Tagged => "tagged",
            ProvisionStage::Done => "done",
            ProvisionStage::RollingBack => "rolling-back",
        };
        write!(f, "{}", name)
    }
}

pub struct Driver {
    ctx: ResourceContext,
    record: MachineRecord,
}

impl Driver {
    pub fn new(api: Arc<dyn CloudApi>, record: MachineRecord) -> Self {
        Self {
            ctx: ResourceContext::new(api),
            record,
        }
    }

    pub fn with_policies(mut self, policies: RetryPolicies) -> Self {
        self.ctx.policies = policies;
        self
    }

    /// Abort retries and polls when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.ctx.cancel = cancel;
        self
    }

    pub fn record(&self) -> &MachineRecord {
        &self.record
    }

    pub fn into_record(self) -> MachineRecord {
        self.record
    }

    pub fn machine_name(&self) -> &str {
        &self.record.machine_name
    }

    fn vm_id(&self) -> Result<String> {
        self.record
            .resource_id(ResourceKind::Vm)
            .map(str::to_string)
            .ok_or_else(|| DriverError::NoVm(self.record.machine_name.clone()))
    }

    fn stage(&self, stage: ProvisionStage) {
        tracing::info!(machine = %self.record.machine_name, %stage, "Provisioning");
    }

    fn commit(&mut self, ledger: &mut ResourceLedger, kind: ResourceKind, id: &str) {
        ledger.commit(kind, id);
        self.record.remember(kind, id);
    }

    /// Account reachability and existence of every supplied security group
    pub async fn pre_create_check(&self, config: &DriverConfig) -> Result<()> {
        self.check_account().await?;
        self.check_security_groups(config).await
    }

    /// Credentials and endpoint work; [`Driver::create`] checks the groups itself
    pub async fn check_account(&self) -> Result<()> {
        let ctx = &self.ctx;
        let account = ctx
            .call(Step::ReadAccount, || ctx.api.read_account())
            .await?;
        if let Some(account) = account {
            tracing::debug!("Using account {}", account.account_id);
        }
        Ok(())
    }

    async fn check_security_groups(&self, config: &DriverConfig) -> Result<()> {
        for id in &config.security_group_ids {
            if !security_group::exists(&self.ctx, id).await? {
                return Err(DriverError::InvalidConfig(format!(
                    "the security group '{}' does not exist",
                    id
                )));
            }
            tracing::debug!("The security group '{}' exists", id);
        }
        Ok(())
    }

    /// Provision the machine; on failure everything created is rolled back
    pub async fn create(&mut self, config: &DriverConfig, keys: &dyn SshKeySource) -> Result<()> {
        let mut ledger = ResourceLedger::new();

        let err = match self.provision(config, keys, &mut ledger).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        self.stage(ProvisionStage::RollingBack);
        tracing::error!(
            "Provisioning {} failed, rolling back {} resource(s): {}",
            self.record.machine_name,
            ledger.len(),
            err
        );

        // A cancelled run still has to clean up after itself
        let mut rollback = self.ctx.clone();
        rollback.cancel = CancellationToken::new();
        if let Err(rollback_err) = saga::teardown(&rollback, &mut ledger, &mut self.record).await {
            tracing::error!("Rollback incomplete: {}", rollback_err);
            // Leftovers must stay reachable from the record, including a VM
            // that never reached `running`
            for resource in ledger.iter() {
                self.record.remember(resource.kind, &resource.id);
            }
        }

        Err(err)
    }

    async fn provision(
        &mut self,
        config: &DriverConfig,
        keys: &dyn SshKeySource,
        ledger: &mut ResourceLedger,
    ) -> Result<()> {
        let ctx = self.ctx.clone();
        let name = self.record.machine_name.clone();
        self.stage(ProvisionStage::NoResources);

        // Supplied groups are checked before anything is created
        self.check_security_groups(config).await?;
        let net_id = match config.subnet_id.as_deref() {
            Some(subnet_id) => Some(net::net_of_subnet(&ctx, subnet_id).await?),
            None => None,
        };

        let public_key = keys.public_key().await?;
        let keypair_name = keypair::create(&ctx, &name, &public_key).await?;
        self.commit(ledger, ResourceKind::Keypair, &keypair_name);
        self.stage(ProvisionStage::KeypairCreated);

        let security_group_ids = if config.security_group_ids.is_empty() {
            let group_id = security_group::create(&ctx, &name, net_id.as_deref()).await?;
            self.commit(ledger, ResourceKind::SecurityGroup, &group_id);

            for rule in security_group::default_rules(DOCKER_PORT, &config.extra_ingress_rules) {
                security_group::add_rule(&ctx, &group_id, &rule).await?;
            }
            tag::add_tags(&ctx, &group_id, &config.tags_all).await?;
            vec![group_id]
        } else {
            config.security_group_ids.clone()
        };
        self.stage(ProvisionStage::SecurityGroupReady);

        let public_ip = public_ip::create(&ctx).await?;
        self.commit(ledger, ResourceKind::PublicIp, &public_ip.id);
        self.record.ip_address = Some(public_ip.address.clone());
        tag::add_tags(&ctx, &public_ip.id, &config.tags_all).await?;
        self.stage(ProvisionStage::PublicIpAllocated);

        let request = CreateVmsRequest {
            image_id: config.source_image.clone(),
            vm_type: config.instance_type.clone(),
            keypair_name,
            security_group_ids,
            subnet_id: config.subnet_id.clone(),
            root_disk: config.root_disk.to_spec(),
        };
        let vm_id = vm::create(&ctx, &request).await?.id;
        // The record only learns the VM once it has been seen running
        ledger.commit(ResourceKind::Vm, &vm_id);
        self.stage(ProvisionStage::VmRequested);

        wait_for_vm_state(&ctx, &vm_id, VmState::Running).await?;
        self.record.remember(ResourceKind::Vm, &vm_id);
        self.stage(ProvisionStage::VmRunning);

        if vm::read(&ctx, &vm_id).await?.is_none() {
            return Err(DriverError::resource_state(
                Step::ReadVm,
                format!("the VM {} is no longer listed", vm_id),
            ));
        }
        public_ip::link(&ctx, &public_ip, &vm_id).await?;
        self.stage(ProvisionStage::PublicIpLinked);

        let mut tags = vec![Tag::new(NAME_TAG, name.as_str())];
        tags.extend(config.tags_all.iter().cloned());
        tags.extend(config.tags_instance.iter().cloned());
        tag::add_tags(&ctx, &vm_id, &tags).await?;
        self.stage(ProvisionStage::Tagged);

        self.stage(ProvisionStage::Done);
        Ok(())
    }

    pub async fn start(&self) -> Result<()> {
        let vm_id = self.vm_id()?;
        vm::start(&self.ctx, &vm_id).await?;
        wait_for_vm_state(&self.ctx, &vm_id, VmState::Running).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.halt(false).await
    }

    pub async fn force_stop(&self) -> Result<()> {
        self.halt(true).await
    }

    async fn halt(&self, force: bool) -> Result<()> {
        let vm_id = self.vm_id()?;
        vm::stop(&self.ctx, &vm_id, force).await?;
        wait_for_vm_state(&self.ctx, &vm_id, VmState::Stopped).await
    }

    pub async fn restart(&self) -> Result<()> {
        let vm_id = self.vm_id()?;
        vm::reboot(&self.ctx, &vm_id).await?;
        wait_for_vm_state(&self.ctx, &vm_id, VmState::Running).await
    }

    /// Delete every resource stored on the record
    pub async fn remove(&mut self) -> Result<()> {
        let mut ledger = ResourceLedger::from_record(&self.record);
        if ledger.is_empty() {
            tracing::warn!("Nothing to remove for {}", self.record.machine_name);
            return Ok(());
        }
        saga::teardown(&self.ctx, &mut ledger, &mut self.record).await
    }

    pub async fn get_state(&self) -> Result<MachineState> {
        let vm_id = self.vm_id()?;
        let state = match vm::read(&self.ctx, &vm_id).await? {
            Some(vm) => VmState::from_provider(&vm.state).machine_state(),
            None => MachineState::None,
        };
        Ok(state)
    }

    pub fn ip(&self) -> Result<&str> {
        self.record
            .ip_address
            .as_deref()
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| DriverError::NoIpAddress(self.record.machine_name.clone()))
    }

    /// Docker endpoint, e.g. `tcp://1.2.3.4:2376`
    pub fn url(&self) -> Result<String> {
        Ok(format!("tcp://{}:{}", self.ip()?, DOCKER_PORT))
    }

    pub fn ssh_hostname(&self) -> Result<&str> {
        self.ip()
    }

    pub fn ssh_port(&self) -> u16 {
        SSH_PORT
    }

    pub fn ssh_username(&self) -> &'static str {
        SSH_USERNAME
    }
}
