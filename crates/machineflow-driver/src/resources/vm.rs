//! VM creation and power operations

use super::{ResourceContext, stored};
use crate::error::{DriverError, Result, Step};
use machineflow_cloud::{CreateVmsRequest, Vm};

/// Launch one VM; any other cardinality in the answer is an error
pub async fn create(ctx: &ResourceContext, request: &CreateVmsRequest) -> Result<Vm> {
    tracing::debug!(
        "Creating a {} VM from {}",
        request.vm_type,
        request.image_id
    );

    let mut vms = ctx
        .call(Step::CreateVm, || ctx.api.create_vms(request))
        .await?;

    if vms.len() != 1 {
        return Err(DriverError::resource_state(
            Step::CreateVm,
            format!("the number of VMs created is wrong ({})", vms.len()),
        ));
    }
    Ok(vms.remove(0))
}

/// Current view of a VM, `None` when it is not listed
pub async fn read(ctx: &ResourceContext, vm_id: &str) -> Result<Option<Vm>> {
    let ids = [vm_id.to_string()];
    let vms = ctx.call(Step::ReadVm, || ctx.api.read_vms(&ids)).await?;
    Ok(vms.into_iter().find(|vm| vm.id == vm_id))
}

pub async fn start(ctx: &ResourceContext, vm_id: &str) -> Result<()> {
    let ids = [vm_id.to_string()];
    ctx.call(Step::StartVm, || ctx.api.start_vms(&ids)).await
}

pub async fn stop(ctx: &ResourceContext, vm_id: &str, force: bool) -> Result<()> {
    let ids = [vm_id.to_string()];
    ctx.call(Step::StopVm, || ctx.api.stop_vms(&ids, force)).await
}

pub async fn reboot(ctx: &ResourceContext, vm_id: &str) -> Result<()> {
    let ids = [vm_id.to_string()];
    ctx.call(Step::RebootVm, || ctx.api.reboot_vms(&ids)).await
}

/// Request deletion; callers wait for `terminated` themselves
pub async fn delete(ctx: &ResourceContext, vm_id: Option<&str>) -> Result<()> {
    let Some(vm_id) = stored(vm_id) else {
        tracing::warn!("Skipping deletion of the VM because none was stored");
        return Ok(());
    };

    tracing::debug!("Deleting VM {}", vm_id);
    let ids = [vm_id.to_string()];
    ctx.call_delete(Step::DeleteVm, &format!("VM {}", vm_id), || {
        ctx.api.delete_vms(&ids)
    })
    .await
}
