//! Resource lifecycle operations
//!
//! One module per resource family. Every remote call goes through
//! [`ResourceContext::call`], which applies the throttling policy and tags
//! failures with the logical [`Step`].
//!
//! Deletes take the identifier as stored on the record: `None` or an empty
//! string means the resource was never created and is skipped without any
//! remote call.

pub mod keypair;
pub mod net;
pub mod public_ip;
pub mod security_group;
pub mod tag;
pub mod vm;

use crate::error::{Result, Step, StepContext};
use machineflow_cloud::{
    CancellationToken, CloudApi, RetryPolicies, execute_with_retry, is_not_found_error,
};
use std::future::Future;
use std::sync::Arc;

/// Prefix of every resource name created by the driver
pub const RESOURCE_NAME_PREFIX: &str = "machineflow";

/// Everything a lifecycle operation needs to reach the provider
#[derive(Clone)]
pub struct ResourceContext {
    pub api: Arc<dyn CloudApi>,
    pub policies: RetryPolicies,
    pub cancel: CancellationToken,
}

impl ResourceContext {
    pub fn new(api: Arc<dyn CloudApi>) -> Self {
        Self {
            api,
            policies: RetryPolicies::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Run one remote call under the throttling policy
    pub async fn call<T, F, Fut>(&self, step: Step, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = machineflow_cloud::Result<T>>,
    {
        execute_with_retry(&self.policies.throttling, &self.cancel, operation)
            .await
            .step(step)
    }

    /// Run one delete call; a resource the provider no longer knows is deleted
    pub async fn call_delete<F, Fut>(&self, step: Step, resource: &str, operation: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = machineflow_cloud::Result<()>>,
    {
        match self.call(step, operation).await {
            Err(err) if err.cloud_error().is_some_and(is_not_found_error) => {
                tracing::warn!("{} no longer exists, treating it as deleted", resource);
                Ok(())
            }
            other => other,
        }
    }
}

/// Unique name for a resource owned by `machine_name`
pub fn resource_name(machine_name: &str) -> String {
    format!(
        "{}-{}-{}",
        RESOURCE_NAME_PREFIX,
        machine_name,
        chrono::Utc::now().timestamp()
    )
}

/// Stored identifier, if the resource was ever created
pub(crate) fn stored(id: Option<&str>) -> Option<&str> {
    id.filter(|id| !id.is_empty())
}
