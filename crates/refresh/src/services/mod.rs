use crate::vsphere::Vsphere;
use crate::vsphere::types::{TaskRef, TaskStatus};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use vmtools_common::error::{Error, Result};

pub mod refresh;

// -----------------------------------------------------------------------------

/// How [`wait_until_finish`] polls a task.
///
/// # Fields
///
/// * `interval`: Pause between two status checks.
/// * `timeout`: Total time a task may stay pending. `None` waits forever.
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub timeout: Option<Duration>,
}

/// Polls a vSphere task until it reaches a terminal state.
///
/// # Arguments
///
/// * `vsphere_client`: Client for interacting with the vSphere API.
/// * `task`: vSphere task to monitor.
/// * `policy`: Polling interval and timeout.
///
/// # Returns
///
/// The task result on success, which may be empty. A task in `error` state
/// yields `Error::OperationFailed` with the message reported by the service;
/// a task still pending once the timeout elapsed yields `Error::Timeout`.
/// The timeout also bounds a status query that never answers.
///
pub async fn wait_until_finish(
    vsphere_client: &Arc<dyn Vsphere + Send + Sync>,
    task: &TaskRef,
    policy: &WaitPolicy,
) -> Result<Option<Value>> {
    let start = Instant::now();
    let deadline = policy.timeout.map(|timeout| start + timeout);

    loop {
        let status = match deadline {
            Some(deadline) => {
                tokio::time::timeout_at(deadline, vsphere_client.task_status(task))
                    .await
                    .map_err(|_elapsed| timed_out(task, start))??
            }
            None => vsphere_client.task_status(task).await?,
        };

        match status {
            TaskStatus::Completed(result) => return Ok(result),
            TaskStatus::Failed(message) => return Err(Error::OperationFailed(message)),
            TaskStatus::Pending => {}
        }

        let now = Instant::now();
        let pause = match deadline {
            Some(deadline) if now >= deadline => return Err(timed_out(task, start)),
            Some(deadline) => policy.interval.min(deadline - now),
            None => policy.interval,
        };
        tracing::trace!(target: "service", %task, elapsed = ?start.elapsed(), "Task still pending");
        tokio::time::sleep(pause).await;
    }
}

fn timed_out(task: &TaskRef, start: Instant) -> Error {
    let elapsed = start.elapsed();
    tracing::warn!(target: "service", %task, ?elapsed, "Gave up waiting for task");
    Error::Timeout(elapsed.as_secs_f32())
}
