use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use bookflow::config::AppConfig;
use bookflow::db::{self, queries};
use bookflow::handlers;
use bookflow::services::clock::SystemClock;
use bookflow::services::dispatch::webhook::WebhookDispatcher;
use bookflow::services::dispatch::{NoopDispatcher, NotificationDispatcher};
use bookflow::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    // Seed the commission rate log so every transaction has a rate in
    // effect from day one.
    if queries::current_commission_rate(&conn)?.is_none() {
        let now = chrono::Utc::now().naive_utc();
        queries::insert_commission_rate(&conn, config.default_commission_percent, &now)?;
        tracing::info!(
            rate_percent = config.default_commission_percent,
            "seeded initial commission rate"
        );
    }

    let dispatcher: Arc<dyn NotificationDispatcher> = if config.webhook_url.is_empty() {
        tracing::info!("no WEBHOOK_URL configured, events stay local");
        Arc::new(NoopDispatcher)
    } else {
        tracing::info!(url = %config.webhook_url, "dispatching events via webhook");
        Arc::new(WebhookDispatcher::new(
            config.webhook_url.clone(),
            config.webhook_secret.clone(),
        ))
    };

    let (events_tx, _) = broadcast::channel(256);

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        dispatcher,
        clock: Box::new(SystemClock),
        events_tx,
    });

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
