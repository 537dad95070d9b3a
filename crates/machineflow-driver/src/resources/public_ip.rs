//! Public IP allocation and linking

use super::{ResourceContext, stored, tag};
use crate::error::{DriverError, Result, Step};
use machineflow_cloud::PublicIp;

/// Tag the provider reads to re-attach the address after a stop/start
pub const AUTO_ATTACH_TAG: &str = "osc.fcu.eip.auto-attach";

pub async fn create(ctx: &ResourceContext) -> Result<PublicIp> {
    tracing::debug!("Allocating a public IP");
    ctx.call(Step::CreatePublicIp, || ctx.api.create_public_ip())
        .await?
        .ok_or_else(|| {
            DriverError::resource_state(Step::CreatePublicIp, "the response contains no public IP")
        })
}

/// Link `public_ip` to a VM and mark it for auto-attach
pub async fn link(ctx: &ResourceContext, public_ip: &PublicIp, vm_id: &str) -> Result<String> {
    tracing::debug!("Linking public IP {} to {}", public_ip.address, vm_id);

    let link_id = ctx
        .call(Step::LinkPublicIp, || {
            ctx.api.link_public_ip(&public_ip.id, vm_id)
        })
        .await?
        .ok_or_else(|| {
            DriverError::resource_state(Step::LinkPublicIp, "the response contains no link id")
        })?;

    tag::add_tag(ctx, vm_id, AUTO_ATTACH_TAG, &public_ip.address).await?;
    Ok(link_id)
}

pub async fn delete(ctx: &ResourceContext, id: Option<&str>) -> Result<()> {
    let Some(id) = stored(id) else {
        tracing::warn!("Skipping deletion of the public IP because none was stored");
        return Ok(());
    };

    tracing::debug!("Releasing public IP {}", id);
    ctx.call_delete(Step::DeletePublicIp, &format!("public IP {}", id), || ctx.api.delete_public_ip(id))
        .await
}
