use std::future::Future;

use tracing::warn;

/// Fire-and-forget side effects (activity logging, command explanation
/// completion). A failure lands in the process log and never propagates to
/// the request that spawned it.
pub fn spawn_detached<F>(label: &'static str, fut: F)
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            warn!("Detached task '{}' failed: {:#}", label, e);
        }
    });
}
