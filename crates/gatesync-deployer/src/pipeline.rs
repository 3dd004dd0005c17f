//! Run a deployable through its phases in order.

use tracing::{debug, warn};

use crate::deployable::Deployable;
use crate::deployers::Deployer;
use crate::error::SyncResult;

/// `deploy` then `after_deploy`. `after_deploy` is skipped when `deploy` fails.
pub async fn deploy<T, D>(deployer: &D, deployable: &T) -> SyncResult<()>
where
    T: Deployable,
    D: Deployer<T> + ?Sized,
{
    let outcome = async {
        deployer.deploy(deployable).await?;
        deployer.after_deploy(deployable).await
    }
    .await;
    trace_outcome("deploy", deployable, &outcome);
    outcome
}

/// `undeploy` then `after_undeploy`. `after_undeploy` is skipped when `undeploy` fails.
pub async fn undeploy<T, D>(deployer: &D, deployable: &T) -> SyncResult<()>
where
    T: Deployable,
    D: Deployer<T> + ?Sized,
{
    let outcome = async {
        deployer.undeploy(deployable).await?;
        deployer.after_undeploy(deployable).await
    }
    .await;
    trace_outcome("undeploy", deployable, &outcome);
    outcome
}

fn trace_outcome(phase: &str, deployable: &dyn Deployable, outcome: &SyncResult<()>) {
    match outcome {
        Ok(()) => debug!(phase, kind = %deployable.kind(), id = %deployable.id(), "pipeline completed"),
        Err(e) => warn!(phase, kind = %deployable.kind(), id = %deployable.id(), error = %e, "pipeline failed"),
    }
}
