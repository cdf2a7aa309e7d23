use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::models::WorkflowEvent;
use crate::services::clock::Clock;
use crate::services::dispatch::NotificationDispatcher;

pub struct AppState {
    /// Single shared connection. Holding this lock across a whole
    /// read-validate-write sequence is what serializes concurrent
    /// transitions on the same entity.
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    pub clock: Box<dyn Clock>,
    pub events_tx: broadcast::Sender<WorkflowEvent>,
}
