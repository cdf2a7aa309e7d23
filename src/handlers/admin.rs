use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Actor, CertificateStatus, ProfessionalStatus, ServiceStatus};
use crate::services::{commission, events, verification};
use crate::state::AppState;

#[allow(clippy::result_large_err)]
fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), Response> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "unauthorized"})),
        )
            .into_response());
    }
    Ok(())
}

fn app_err(e: AppError) -> Response {
    e.into_response()
}

/// The admin token is the authorization collaborator at this boundary:
/// a caller that presents it acts with the admin role.
fn admin_actor(actor_id: Option<&str>) -> Actor {
    Actor::admin(actor_id.unwrap_or("admin"))
}

// GET /api/admin/professionals
#[derive(Deserialize)]
pub struct ProfessionalsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_professionals(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ProfessionalsQuery>,
) -> Result<Json<serde_json::Value>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    let professionals = {
        let db = state.db.lock().unwrap();
        queries::list_professionals(&db, query.status.as_deref(), query.limit.unwrap_or(50))
            .map_err(|e| app_err(e.into()))?
    };

    Ok(Json(
        serde_json::to_value(&professionals).unwrap_or_default(),
    ))
}

// POST /api/admin/professionals/:id/status
#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
    pub reason: Option<String>,
    pub actor_id: Option<String>,
}

fn parse_professional_status(s: &str) -> Result<ProfessionalStatus, AppError> {
    match s {
        "pending" => Ok(ProfessionalStatus::Pending),
        "approved" => Ok(ProfessionalStatus::Approved),
        "rejected" => Ok(ProfessionalStatus::Rejected),
        other => Err(AppError::Validation(format!(
            "unknown professional status: {other}"
        ))),
    }
}

pub async fn set_professional_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<SetStatusRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    let new_status = parse_professional_status(&body.status).map_err(app_err)?;
    let actor = admin_actor(body.actor_id.as_deref());
    let now = state.clock.now();

    let (professional, event) = {
        let db = state.db.lock().unwrap();
        verification::set_professional_status(&db, &id, new_status, &actor, &now)
            .map_err(app_err)?
    };

    tracing::info!(professional = %professional.id, status = %professional.status.as_str(), "professional status set");
    if let Some(event) = event {
        events::record(&state, event);
    }

    Ok(Json(
        serde_json::to_value(&professional).unwrap_or_default(),
    ))
}

// POST /api/admin/certificates/:id/status
fn parse_certificate_status(s: &str) -> Result<CertificateStatus, AppError> {
    match s {
        "pending" => Ok(CertificateStatus::Pending),
        "verified" => Ok(CertificateStatus::Verified),
        "rejected" => Ok(CertificateStatus::Rejected),
        other => Err(AppError::Validation(format!(
            "unknown certificate status: {other}"
        ))),
    }
}

pub async fn set_certificate_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<SetStatusRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    let new_status = parse_certificate_status(&body.status).map_err(app_err)?;
    let actor = admin_actor(body.actor_id.as_deref());
    let now = state.clock.now();

    let (certificate, event) = {
        let db = state.db.lock().unwrap();
        verification::set_certificate_status(
            &db,
            &id,
            new_status,
            body.reason.as_deref(),
            &actor,
            &now,
        )
        .map_err(app_err)?
    };

    if let Some(event) = event {
        events::record(&state, event);
    }

    Ok(Json(serde_json::to_value(&certificate).unwrap_or_default()))
}

// POST /api/admin/services/:id/status
fn parse_service_status(s: &str) -> Result<ServiceStatus, AppError> {
    match s {
        "pending" => Ok(ServiceStatus::Pending),
        "approved" => Ok(ServiceStatus::Approved),
        "rejected" => Ok(ServiceStatus::Rejected),
        other => Err(AppError::Validation(format!(
            "unknown service status: {other}"
        ))),
    }
}

pub async fn set_service_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<SetStatusRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    let new_status = parse_service_status(&body.status).map_err(app_err)?;
    let actor = admin_actor(body.actor_id.as_deref());
    let now = state.clock.now();

    let (service, event) = {
        let db = state.db.lock().unwrap();
        verification::set_service_status(&db, &id, new_status, body.reason.as_deref(), &actor, &now)
            .map_err(app_err)?
    };

    if let Some(event) = event {
        events::record(&state, event);
    }

    Ok(Json(serde_json::to_value(&service).unwrap_or_default()))
}

// GET /api/admin/professionals/:id/verification
pub async fn verification_summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<verification::VerificationSummary>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    let summary = {
        let db = state.db.lock().unwrap();
        verification::verification_summary(&db, &id).map_err(app_err)?
    };

    Ok(Json(summary))
}

// GET /api/admin/commission-rate
#[derive(Serialize)]
pub struct CommissionRateResponse {
    rate_percent: f64,
    effective_from: String,
}

pub async fn get_commission_rate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<CommissionRateResponse>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    let rate = {
        let db = state.db.lock().unwrap();
        queries::current_commission_rate(&db).map_err(|e| app_err(e.into()))?
    };

    match rate {
        Some(rate) => Ok(Json(CommissionRateResponse {
            rate_percent: rate.rate_percent,
            effective_from: rate.effective_from,
        })),
        None => Ok(Json(CommissionRateResponse {
            rate_percent: state.config.default_commission_percent,
            effective_from: String::new(),
        })),
    }
}

// POST /api/admin/commission-rate
#[derive(Deserialize)]
pub struct SetCommissionRateRequest {
    pub rate_percent: f64,
}

pub async fn set_commission_rate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SetCommissionRateRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    // Reuse the calculator's range check so an out-of-range rate can
    // never enter the log.
    commission::compute(0.0, body.rate_percent).map_err(app_err)?;

    let now = state.clock.now();
    {
        let db = state.db.lock().unwrap();
        queries::insert_commission_rate(&db, body.rate_percent, &now)
            .map_err(|e| app_err(e.into()))?;
    }

    tracing::info!(rate_percent = body.rate_percent, "commission rate updated");
    Ok(Json(serde_json::json!({"ok": true, "rate_percent": body.rate_percent})))
}

// GET /api/admin/earnings-report
#[derive(Deserialize)]
pub struct EarningsQuery {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct EarningsRow {
    booking_id: String,
    reference: String,
    professional_id: String,
    price: f64,
    rate_percent: f64,
    commission: f64,
    professional_earning: f64,
    completed_at: String,
}

#[derive(Serialize)]
pub struct EarningsReport {
    rows: Vec<EarningsRow>,
    total_amount: f64,
    total_commission: f64,
    total_professional_earning: f64,
}

pub async fn earnings_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<EarningsQuery>,
) -> Result<Json<EarningsReport>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.db.lock().unwrap();
    let bookings =
        queries::list_completed_bookings(&db, query.limit.unwrap_or(100)).map_err(|e| app_err(e.into()))?;

    let mut rows = Vec::with_capacity(bookings.len());
    let mut total_amount = 0.0;
    let mut total_commission = 0.0;
    let mut total_professional_earning = 0.0;

    for booking in bookings {
        // Each transaction uses the rate in effect when the work
        // completed, not the current rate.
        let rate_percent = queries::rate_in_effect_at(&db, &booking.updated_at)
            .map_err(|e| app_err(e.into()))?
            .unwrap_or(state.config.default_commission_percent);

        let payout = commission::compute(booking.price, rate_percent).map_err(app_err)?;
        total_amount += booking.price;
        total_commission += payout.commission;
        total_professional_earning += payout.professional_earning;

        rows.push(EarningsRow {
            booking_id: booking.id,
            reference: booking.reference,
            professional_id: booking.professional_id,
            price: booking.price,
            rate_percent,
            commission: payout.commission,
            professional_earning: payout.professional_earning,
            completed_at: booking.updated_at.format(queries::DATETIME_FMT).to_string(),
        });
    }

    Ok(Json(EarningsReport {
        rows,
        total_amount,
        total_commission,
        total_professional_earning,
    }))
}
