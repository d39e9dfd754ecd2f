use crate::vsphere::Vsphere;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use vmtools_common::error::Result;

/// Runs `work` against a logged-in client and always ends the session
/// afterwards.
///
/// `disconnect` is called exactly once, whether `work` succeeds, fails or
/// panics. A panic is resumed after the teardown; a failed logout is only
/// logged and never replaces the result of `work`.
///
/// # Arguments
///
/// * `vsphere_client`: Logged-in client whose session is ended at the end.
/// * `work`: Closure receiving a handle to the same client.
///
pub async fn scoped<T, F, Fut>(vsphere_client: Arc<dyn Vsphere + Send + Sync>, work: F) -> Result<T>
where
    F: FnOnce(Arc<dyn Vsphere + Send + Sync>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let outcome = AssertUnwindSafe(work(vsphere_client.clone()))
        .catch_unwind()
        .await;

    match vsphere_client.disconnect().await {
        Ok(()) => tracing::debug!(target: "session", "Session closed"),
        Err(error) => tracing::warn!(target: "session", ?error, "Failed to close session"),
    }

    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
