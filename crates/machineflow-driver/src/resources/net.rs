//! Net (VPC) lookup

use super::ResourceContext;
use crate::error::{DriverError, Result, Step};

/// Net the subnet belongs to
pub async fn net_of_subnet(ctx: &ResourceContext, subnet_id: &str) -> Result<String> {
    let ids = [subnet_id.to_string()];
    let subnets = ctx
        .call(Step::ReadSubnets, || ctx.api.read_subnets(&ids))
        .await?;

    subnets
        .into_iter()
        .find(|subnet| subnet.id == subnet_id)
        .map(|subnet| subnet.net_id)
        .ok_or_else(|| {
            DriverError::resource_state(
                Step::ReadSubnets,
                format!("the subnet '{}' has not been found", subnet_id),
            )
        })
}
