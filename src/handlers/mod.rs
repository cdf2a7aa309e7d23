pub mod admin;
pub mod bookings;
pub mod events;
pub mod health;
pub mod professionals;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/bookings",
            post(bookings::create_booking).get(bookings::list_bookings),
        )
        .route("/api/bookings/:id", get(bookings::get_booking))
        .route("/api/bookings/:id/confirm", post(bookings::confirm_booking))
        .route("/api/bookings/:id/cancel", post(bookings::cancel_booking))
        .route(
            "/api/bookings/:id/reschedule",
            post(bookings::reschedule_booking),
        )
        .route(
            "/api/bookings/:id/complete",
            post(bookings::complete_booking),
        )
        .route("/api/professionals", post(professionals::register))
        .route("/api/professionals/:id", get(professionals::get_professional))
        .route(
            "/api/professionals/:id/certificates",
            post(professionals::submit_certificate).get(professionals::list_certificates),
        )
        .route(
            "/api/professionals/:id/services",
            post(professionals::submit_service).get(professionals::list_services),
        )
        .route(
            "/api/professionals/:id/unavailable-days",
            post(professionals::add_unavailable_day)
                .get(professionals::list_unavailable_days)
                .delete(professionals::remove_unavailable_day),
        )
        .route("/api/admin/professionals", get(admin::list_professionals))
        .route(
            "/api/admin/professionals/:id/status",
            post(admin::set_professional_status),
        )
        .route(
            "/api/admin/professionals/:id/verification",
            get(admin::verification_summary),
        )
        .route(
            "/api/admin/certificates/:id/status",
            post(admin::set_certificate_status),
        )
        .route(
            "/api/admin/services/:id/status",
            post(admin::set_service_status),
        )
        .route(
            "/api/admin/commission-rate",
            get(admin::get_commission_rate).post(admin::set_commission_rate),
        )
        .route("/api/admin/earnings-report", get(admin::earnings_report))
        .route("/api/admin/events", get(events::events_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
