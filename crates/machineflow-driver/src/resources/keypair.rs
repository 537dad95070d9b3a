//! SSH keypair registration

use super::{ResourceContext, resource_name, stored};
use crate::error::{DriverError, Result, Step};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use machineflow_cloud::CreateKeypairRequest;

/// Register `public_key` (OpenSSH format) and return the keypair name
pub async fn create(ctx: &ResourceContext, machine_name: &str, public_key: &[u8]) -> Result<String> {
    let request = CreateKeypairRequest {
        name: resource_name(machine_name),
        public_key: STANDARD.encode(public_key),
    };
    tracing::debug!("Creating keypair {}", request.name);

    let keypair = ctx
        .call(Step::CreateKeypair, || ctx.api.create_keypair(&request))
        .await?
        .ok_or_else(|| {
            DriverError::resource_state(Step::CreateKeypair, "the response contains no keypair")
        })?;

    Ok(keypair.name)
}

pub async fn delete(ctx: &ResourceContext, name: Option<&str>) -> Result<()> {
    let Some(name) = stored(name) else {
        tracing::warn!("Skipping deletion of the keypair because none was stored");
        return Ok(());
    };

    tracing::debug!("Deleting keypair {}", name);
    ctx.call_delete(Step::DeleteKeypair, &format!("keypair {}", name), || ctx.api.delete_keypair(name))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeCloud;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_public_key_is_sent_base64_encoded() {
        let fake = Arc::new(FakeCloud::new());
        let ctx = fake.context();

        let name = create(&ctx, "m1", b"ssh-rsa AAAA m1").await.unwrap();

        assert!(name.starts_with("machineflow-m1-"));
        assert_eq!(fake.keypairs(), vec![name.clone()]);
        assert_eq!(
            fake.keypair_public_key(&name).as_deref(),
            Some("c3NoLXJzYSBBQUFBIG0x")
        );
    }

    #[tokio::test]
    async fn test_missing_keypair_in_response_fails() {
        let fake = Arc::new(FakeCloud::new());
        fake.omit_body("CreateKeypair");
        let ctx = fake.context();

        let err = create(&ctx, "m1", b"ssh-rsa AAAA").await.unwrap_err();

        assert!(matches!(
            err,
            DriverError::ResourceState {
                step: Step::CreateKeypair,
                ..
            }
        ));
    }
}
