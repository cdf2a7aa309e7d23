use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    /// When set, freshly created bookings skip the pending step.
    pub auto_confirm_bookings: bool,
    /// Cancellations more than this many hours before the appointment
    /// are refund-eligible.
    pub cancellation_window_hours: i64,
    pub default_commission_percent: f64,
    pub webhook_url: String,
    pub webhook_secret: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "bookflow.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            auto_confirm_bookings: env::var("AUTO_CONFIRM_BOOKINGS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            cancellation_window_hours: env::var("CANCELLATION_WINDOW_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(48),
            default_commission_percent: env::var("DEFAULT_COMMISSION_PERCENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15.0),
            webhook_url: env::var("WEBHOOK_URL").unwrap_or_default(),
            webhook_secret: env::var("WEBHOOK_SECRET").unwrap_or_default(),
        }
    }
}
