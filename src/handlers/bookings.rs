use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Actor, Booking};
use crate::services::{events, lifecycle};
use crate::state::AppState;

#[derive(Serialize)]
pub struct BookingResponse {
    id: String,
    reference: String,
    service_id: String,
    customer_id: String,
    professional_id: String,
    scheduled_at: String,
    address: String,
    price: f64,
    status: String,
    upcoming: bool,
    has_report: bool,
    created_at: String,
    updated_at: String,
}

impl BookingResponse {
    fn from_booking(b: Booking, now: NaiveDateTime) -> Self {
        Self {
            upcoming: b.is_upcoming(now),
            id: b.id,
            reference: b.reference,
            service_id: b.service_id,
            customer_id: b.customer_id,
            professional_id: b.professional_id,
            scheduled_at: b.scheduled_at.format(queries::DATETIME_FMT).to_string(),
            address: b.address,
            price: b.price,
            status: b.status.as_str().to_string(),
            has_report: b.has_report,
            created_at: b.created_at.format(queries::DATETIME_FMT).to_string(),
            updated_at: b.updated_at.format(queries::DATETIME_FMT).to_string(),
        }
    }
}

pub fn parse_datetime(s: &str) -> Result<NaiveDateTime, AppError> {
    NaiveDateTime::parse_from_str(s, queries::DATETIME_FMT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
        .map_err(|_| AppError::Validation(format!("invalid datetime: {s}")))
}

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub customer_id: String,
    pub professional_id: String,
    pub service_id: String,
    pub scheduled_at: String,
    pub address: String,
    pub price: f64,
    pub actor: Actor,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let scheduled_at = parse_datetime(&body.scheduled_at)?;
    let now = state.clock.now();

    let req = lifecycle::BookingRequest {
        customer_id: body.customer_id,
        professional_id: body.professional_id,
        service_id: body.service_id,
        scheduled_at,
        address: body.address,
        price: body.price,
    };

    let (booking, event) = {
        let db = state.db.lock().unwrap();
        lifecycle::create_booking(&db, &req, &body.actor, state.config.auto_confirm_bookings, &now)?
    };

    tracing::info!(booking = %booking.reference, professional = %booking.professional_id, "booking created");
    events::record(&state, event);

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse::from_booking(booking, now)),
    ))
}

// POST /api/bookings/:id/confirm
#[derive(Deserialize)]
pub struct ActorRequest {
    pub actor: Actor,
}

pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let now = state.clock.now();

    let (booking, event) = {
        let db = state.db.lock().unwrap();
        lifecycle::confirm_booking(&db, &id, &body.actor, &now)?
    };

    if let Some(event) = event {
        events::record(&state, event);
    }

    Ok(Json(BookingResponse::from_booking(booking, now)))
}

// POST /api/bookings/:id/cancel
#[derive(Serialize)]
pub struct CancelResponse {
    booking: BookingResponse,
    refund_eligible: bool,
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<CancelResponse>, AppError> {
    let now = state.clock.now();

    let (outcome, event) = {
        let db = state.db.lock().unwrap();
        lifecycle::cancel_booking(
            &db,
            &id,
            &body.actor,
            state.config.cancellation_window_hours,
            &now,
        )?
    };

    tracing::info!(
        booking = %outcome.booking.reference,
        refund_eligible = outcome.refund_eligible,
        "booking cancelled"
    );
    events::record(&state, event);

    Ok(Json(CancelResponse {
        refund_eligible: outcome.refund_eligible,
        booking: BookingResponse::from_booking(outcome.booking, now),
    }))
}

// POST /api/bookings/:id/reschedule
#[derive(Deserialize)]
pub struct RescheduleRequest {
    pub scheduled_at: String,
    pub reason: Option<String>,
    pub actor: Actor,
}

pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<RescheduleRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let new_scheduled_at = parse_datetime(&body.scheduled_at)?;
    let now = state.clock.now();

    let (booking, event) = {
        let db = state.db.lock().unwrap();
        lifecycle::reschedule_booking(
            &db,
            &id,
            &new_scheduled_at,
            body.reason.as_deref(),
            &body.actor,
            &now,
        )?
    };

    events::record(&state, event);

    Ok(Json(BookingResponse::from_booking(booking, now)))
}

// POST /api/bookings/:id/complete
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let now = state.clock.now();

    let (booking, event) = {
        let db = state.db.lock().unwrap();
        lifecycle::complete_booking(&db, &id, &body.actor, &now)?
    };

    events::record(&state, event);

    Ok(Json(BookingResponse::from_booking(booking, now)))
}

// GET /api/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub customer_id: Option<String>,
    pub professional_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let now = state.clock.now();
    let limit = query.limit.unwrap_or(50);

    // "upcoming" is derived, not stored: fetch without a status filter
    // and keep active future bookings.
    let upcoming = query.status.as_deref() == Some("upcoming");
    let filter = queries::BookingFilter {
        customer_id: query.customer_id.as_deref(),
        professional_id: query.professional_id.as_deref(),
        status: if upcoming { None } else { query.status.as_deref() },
    };

    let bookings = {
        let db = state.db.lock().unwrap();
        queries::list_bookings(&db, &filter, limit)?
    };

    let response: Vec<BookingResponse> = bookings
        .into_iter()
        .filter(|b| !upcoming || b.is_upcoming(now))
        .map(|b| BookingResponse::from_booking(b, now))
        .collect();

    Ok(Json(response))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let now = state.clock.now();

    let booking = {
        let db = state.db.lock().unwrap();
        queries::get_booking(&db, &id)?
    }
    .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;

    Ok(Json(BookingResponse::from_booking(booking, now)))
}
