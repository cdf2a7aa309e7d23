use std::sync::Arc;

use crate::db::queries;
use crate::models::WorkflowEvent;
use crate::state::AppState;

/// An event produced by a state transition, not yet recorded. The
/// lifecycle and verification managers return these so recording and
/// delivery happen after the entity lock is released.
#[derive(Debug, Clone)]
pub struct OutboundEvent {
    pub name: &'static str,
    pub payload: serde_json::Value,
}

impl OutboundEvent {
    pub fn new(name: &'static str, payload: serde_json::Value) -> Self {
        Self { name, payload }
    }
}

/// Appends the event to the log, pushes it to SSE subscribers, and
/// hands it to the dispatcher without blocking the caller. A dispatch
/// failure is logged and never surfaces to the transition that emitted
/// the event.
pub fn record(state: &Arc<AppState>, event: OutboundEvent) {
    let payload_str = event.payload.to_string();

    let event_id = {
        let db = state.db.lock().unwrap();
        queries::insert_workflow_event(&db, event.name, &payload_str)
    };

    match event_id {
        Ok(id) => {
            let recorded = WorkflowEvent {
                id,
                name: event.name.to_string(),
                payload: event.payload.clone(),
                created_at: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            };
            // Ignore send errors: no subscribers is normal
            let _ = state.events_tx.send(recorded);

            let dispatcher = Arc::clone(&state.dispatcher);
            let name = event.name;
            let payload = event.payload;
            tokio::spawn(async move {
                if let Err(e) = dispatcher.emit(name, &payload).await {
                    tracing::warn!(event = %name, error = %e, "event dispatch failed");
                }
            });
        }
        Err(e) => {
            tracing::error!(event = %event.name, error = %e, "failed to record workflow event");
        }
    }
}
