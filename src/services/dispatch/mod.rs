pub mod webhook;

use async_trait::async_trait;

/// Delivery side of the workflow core. Events are fire-and-forget: a
/// failed emit is logged by the caller and never rolls back the state
/// transition that produced it.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn emit(&self, event: &str, payload: &serde_json::Value) -> anyhow::Result<()>;
}

/// Used when no webhook endpoint is configured; events still land in
/// the event log and the SSE feed.
pub struct NoopDispatcher;

#[async_trait]
impl NotificationDispatcher for NoopDispatcher {
    async fn emit(&self, event: &str, _payload: &serde_json::Value) -> anyhow::Result<()> {
        tracing::debug!(event = %event, "no dispatcher configured, skipping delivery");
        Ok(())
    }
}
