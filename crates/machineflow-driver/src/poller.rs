//! State-convergence poller
//!
//! Re-reads a VM until it reports the target state. Each read runs under the
//! throttling policy; each round that sees the VM missing or in another state
//! is retried under the convergence policy.

use crate::error::{Result, Step, StepContext};
use crate::resources::ResourceContext;
use machineflow_cloud::{CloudError, VmState, execute_with_retry};

/// Wait until `vm_id` is in `target`
///
/// Exhaustion is reported as [`CloudError::ResourceNotFound`] when the VM was
/// not listed on the last round, or [`CloudError::ConvergenceTimeout`] when it
/// was listed in another state. A VM that is no longer listed satisfies a
/// `Terminated` target.
pub async fn wait_for_vm_state(ctx: &ResourceContext, vm_id: &str, target: VmState) -> Result<()> {
    tracing::debug!("Waiting for VM {} to be {}", vm_id, target);

    let resource = format!("VM {}", vm_id);
    let outcome = execute_with_retry(&ctx.policies.convergence, &ctx.cancel, || {
        poll_once(ctx, vm_id, &resource, target)
    })
    .await;

    match outcome {
        Err(CloudError::StateMismatch {
            resource,
            expected,
            observed,
        }) => Err(CloudError::ConvergenceTimeout {
            resource,
            expected,
            observed,
            attempts: ctx.policies.convergence.max_attempts,
        }),
        other => other,
    }
    .step(Step::WaitVmState)
}

/// One poll round
async fn poll_once(
    ctx: &ResourceContext,
    vm_id: &str,
    resource: &str,
    target: VmState,
) -> machineflow_cloud::Result<()> {
    let ids = [vm_id.to_string()];
    let vms = execute_with_retry(&ctx.policies.throttling, &ctx.cancel, || {
        ctx.api.read_vms(&ids)
    })
    .await?;

    let Some(vm) = vms.iter().find(|vm| vm.id == vm_id) else {
        if target == VmState::Terminated {
            return Ok(());
        }
        return Err(CloudError::ResourceNotFound(resource.to_string()));
    };

    if VmState::from_provider(&vm.state) == target {
        return Ok(());
    }

    tracing::debug!("{} is {}, waiting for {}", resource, vm.state, target);
    Err(CloudError::StateMismatch {
        resource: resource.to_string(),
        expected: target.to_string(),
        observed: vm.state.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverError;
    use crate::fake::{FakeCloud, bad_request, throttled};
    use machineflow_cloud::{CancellationToken, Delay, RetryPolicies, RetryPolicy};
    use std::sync::Arc;
    use std::time::Duration;

    fn short_convergence(fake: &Arc<FakeCloud>, attempts: u32) -> ResourceContext {
        let mut ctx = fake.context();
        ctx.policies.convergence = ctx.policies.convergence.with_max_attempts(attempts);
        ctx
    }

    #[tokio::test]
    async fn test_converges_after_several_rounds() {
        let fake = Arc::new(FakeCloud::new());
        fake.seed_vm("i-1", "stopped");
        let ctx = fake.context();
        ctx.api.start_vms(&["i-1".to_string()]).await.unwrap();

        wait_for_vm_state(&ctx, "i-1", VmState::Running).await.unwrap();

        let reads: Vec<String> = fake
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("ReadVms"))
            .collect();
        assert_eq!(reads, vec!["ReadVms i-1=pending", "ReadVms i-1=running"]);
    }

    #[tokio::test]
    async fn test_wrong_state_times_out() {
        let fake = Arc::new(FakeCloud::new());
        fake.seed_vm("i-1", "pending");
        let ctx = short_convergence(&fake, 3);

        let err = wait_for_vm_state(&ctx, "i-1", VmState::Running)
            .await
            .unwrap_err();

        match err {
            DriverError::Step {
                step: Step::WaitVmState,
                source:
                    CloudError::ConvergenceTimeout {
                        observed, attempts, ..
                    },
            } => {
                assert_eq!(observed, "pending");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_vm_is_not_found() {
        let fake = Arc::new(FakeCloud::new());
        let ctx = short_convergence(&fake, 2);

        let err = wait_for_vm_state(&ctx, "i-404", VmState::Running)
            .await
            .unwrap_err();

        assert!(matches!(
            err.cloud_error(),
            Some(CloudError::ResourceNotFound(_))
        ));
        assert_eq!(fake.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_vanished_vm_counts_as_terminated() {
        let fake = Arc::new(FakeCloud::new());
        let ctx = fake.context();

        wait_for_vm_state(&ctx, "i-gone", VmState::Terminated)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_throttled_reads_are_retried_inside_a_round() {
        let fake = Arc::new(FakeCloud::new());
        fake.seed_vm("i-1", "running");
        fake.fail_next("ReadVms", throttled());
        fake.fail_next("ReadVms", throttled());
        let ctx = short_convergence(&fake, 1);

        wait_for_vm_state(&ctx, "i-1", VmState::Running).await.unwrap();
        assert_eq!(fake.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_read_errors_are_terminal() {
        let fake = Arc::new(FakeCloud::new());
        fake.seed_vm("i-1", "pending");
        fake.fail_next("ReadVms", bad_request());
        let ctx = fake.context();

        let err = wait_for_vm_state(&ctx, "i-1", VmState::Running)
            .await
            .unwrap_err();

        assert_eq!(err.cloud_error().and_then(|e| e.status()), Some(400));
        assert_eq!(fake.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_polling() {
        let fake = Arc::new(FakeCloud::new());
        fake.seed_vm("i-1", "pending");
        let mut ctx = fake.context();
        ctx.policies = RetryPolicies {
            throttling: RetryPolicy::throttling(),
            convergence: RetryPolicy::convergence().with_delay(Delay::Fixed(Duration::from_secs(1))),
        };
        let cancel = CancellationToken::new();
        ctx.cancel = cancel.clone();

        let poll = tokio::spawn(async move {
            wait_for_vm_state(&ctx, "i-1", VmState::Running).await
        });
        tokio::time::sleep(Duration::from_millis(2500)).await;
        cancel.cancel();

        let err = poll.await.unwrap().unwrap_err();
        assert!(matches!(err.cloud_error(), Some(CloudError::Cancelled)));
        assert_eq!(fake.calls().len(), 3);
    }
}
