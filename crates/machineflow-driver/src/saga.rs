//! Rollback/teardown saga
//!
//! Resources are committed to a [`ResourceLedger`] as soon as their creation
//! succeeds. Teardown walks the ledger backwards, so the VM goes first and the
//! keypair last. Every deletion is attempted even when an earlier one failed;
//! the failures are reported together.

use crate::error::{DriverError, Result, TeardownFailure};
use crate::poller::wait_for_vm_state;
use crate::resources::{ResourceContext, keypair, public_ip, security_group, vm};
use machineflow_cloud::{MachineRecord, ResourceKind, VmState};

/// A resource the driver created and must delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedResource {
    pub kind: ResourceKind,
    pub id: String,
}

/// Resources in creation order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceLedger {
    committed: Vec<CommittedResource>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the ledger of a stored machine
    pub fn from_record(record: &MachineRecord) -> Self {
        let mut ledger = Self::new();
        for kind in [
            ResourceKind::Keypair,
            ResourceKind::SecurityGroup,
            ResourceKind::PublicIp,
            ResourceKind::Vm,
        ] {
            if let Some(id) = record.resource_id(kind) {
                ledger.commit(kind, id);
            }
        }
        ledger
    }

    pub fn commit(&mut self, kind: ResourceKind, id: impl Into<String>) {
        self.committed.push(CommittedResource {
            kind,
            id: id.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.committed.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommittedResource> {
        self.committed.iter()
    }
}

/// Delete every committed resource, newest first
///
/// Deleted resources leave the ledger and are forgotten by `record`; the ones
/// that failed stay in both.
pub async fn teardown(
    ctx: &ResourceContext,
    ledger: &mut ResourceLedger,
    record: &mut MachineRecord,
) -> Result<()> {
    let mut failures = Vec::new();
    let mut remaining = Vec::new();

    while let Some(resource) = ledger.committed.pop() {
        match delete(ctx, &resource).await {
            Ok(()) => {
                tracing::debug!("Deleted {} {}", resource.kind, resource.id);
                record.forget(resource.kind);
            }
            Err(error) => {
                tracing::error!("Failed to delete {} {}: {}", resource.kind, resource.id, error);
                failures.push(TeardownFailure {
                    kind: resource.kind,
                    id: resource.id.clone(),
                    error,
                });
                remaining.push(resource);
            }
        }
    }

    remaining.reverse();
    ledger.committed = remaining;

    if failures.is_empty() {
        Ok(())
    } else {
        Err(DriverError::Teardown(failures))
    }
}

async fn delete(ctx: &ResourceContext, resource: &CommittedResource) -> Result<()> {
    let id = Some(resource.id.as_str());
    match resource.kind {
        ResourceKind::Vm => {
            vm::delete(ctx, id).await?;
            wait_for_vm_state(ctx, &resource.id, VmState::Terminated).await
        }
        ResourceKind::PublicIp => public_ip::delete(ctx, id).await,
        ResourceKind::SecurityGroup => security_group::delete(ctx, id).await,
        ResourceKind::Keypair => keypair::delete(ctx, id).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeCloud, bad_request};
    use machineflow_cloud::Credentials;
    use std::sync::Arc;

    fn record() -> MachineRecord {
        MachineRecord::new(
            "m1",
            Credentials {
                access_key: "AK".to_string(),
                secret_key: "SK".to_string(),
                region: "eu-west-2".to_string(),
            },
        )
    }

    fn deletes(fake: &FakeCloud) -> Vec<String> {
        fake.calls()
            .into_iter()
            .filter(|c| c.starts_with("Delete"))
            .collect()
    }

    #[test]
    fn test_ledger_from_record_skips_empty_ids() {
        let mut rec = record();
        rec.remember(ResourceKind::Keypair, "kp");
        rec.remember(ResourceKind::PublicIp, "");
        rec.remember(ResourceKind::Vm, "i-1");

        let ledger = ResourceLedger::from_record(&rec);
        let kinds: Vec<ResourceKind> = ledger.iter().map(|r| r.kind).collect();

        assert_eq!(kinds, vec![ResourceKind::Keypair, ResourceKind::Vm]);
    }

    #[tokio::test]
    async fn test_teardown_runs_in_reverse_order() {
        let fake = Arc::new(FakeCloud::new());
        fake.seed_vm("i-1", "running");
        let ctx = fake.context();
        let mut rec = record();
        let mut ledger = ResourceLedger::new();
        for (kind, id) in [
            (ResourceKind::Keypair, "kp"),
            (ResourceKind::SecurityGroup, "sg-1"),
            (ResourceKind::PublicIp, "eipalloc-1"),
            (ResourceKind::Vm, "i-1"),
        ] {
            rec.remember(kind, id);
            ledger.commit(kind, id);
        }

        teardown(&ctx, &mut ledger, &mut rec).await.unwrap();

        assert_eq!(
            deletes(&fake),
            vec![
                "DeleteVms i-1",
                "DeletePublicIp eipalloc-1",
                "DeleteSecurityGroup sg-1",
                "DeleteKeypair kp",
            ]
        );
        assert!(ledger.is_empty());
        assert!(!rec.has_resources());
    }

    #[tokio::test]
    async fn test_teardown_waits_for_termination() {
        let fake = Arc::new(FakeCloud::new());
        fake.seed_vm("i-1", "running");
        let ctx = fake.context();
        let mut rec = record();
        let mut ledger = ResourceLedger::new();
        ledger.commit(ResourceKind::Vm, "i-1");

        teardown(&ctx, &mut ledger, &mut rec).await.unwrap();

        assert!(fake.calls().contains(&"ReadVms i-1=terminated".to_string()));
        assert!(fake.vm_ids().is_empty());
    }

    #[tokio::test]
    async fn test_teardown_attempts_every_deletion() {
        let fake = Arc::new(FakeCloud::new());
        fake.fail_always("DeletePublicIp", bad_request);
        fake.fail_always("DeleteKeypair", bad_request);
        let ctx = fake.context();
        let mut rec = record();
        let mut ledger = ResourceLedger::new();
        for (kind, id) in [
            (ResourceKind::Keypair, "kp"),
            (ResourceKind::SecurityGroup, "sg-1"),
            (ResourceKind::PublicIp, "eipalloc-1"),
        ] {
            rec.remember(kind, id);
            ledger.commit(kind, id);
        }

        let err = teardown(&ctx, &mut ledger, &mut rec).await.unwrap_err();

        let DriverError::Teardown(failures) = err else {
            panic!("expected a teardown error");
        };
        let failed: Vec<ResourceKind> = failures.iter().map(|f| f.kind).collect();
        assert_eq!(failed, vec![ResourceKind::PublicIp, ResourceKind::Keypair]);

        assert_eq!(deletes(&fake).len(), 3);
        assert!(fake.security_groups().is_empty());
        assert_eq!(rec.security_group_id, None);
        assert_eq!(rec.public_ip_id.as_deref(), Some("eipalloc-1"));
        assert_eq!(rec.keypair_name.as_deref(), Some("kp"));

        let kept: Vec<ResourceKind> = ledger.iter().map(|r| r.kind).collect();
        assert_eq!(kept, vec![ResourceKind::Keypair, ResourceKind::PublicIp]);
    }

    #[tokio::test]
    async fn test_teardown_of_empty_ledger_makes_no_calls() {
        let fake = Arc::new(FakeCloud::new());
        let ctx = fake.context();
        let mut rec = record();

        teardown(&ctx, &mut ResourceLedger::new(), &mut rec)
            .await
            .unwrap();

        assert!(fake.calls().is_empty());
    }
}
