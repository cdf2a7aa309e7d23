use serde::{Deserialize, Serialize};

/// A workflow event as recorded in the event log and pushed to SSE
/// subscribers. The same name/payload pair is handed to the
/// notification dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub id: i64,
    pub name: String,
    pub payload: serde_json::Value,
    pub created_at: String,
}
