use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Actor, Role};
use crate::services::{events, verification};
use crate::state::AppState;

fn parse_day(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("invalid date: {s}")))
}

/// Day blocks and submissions may only be touched by the professional
/// themselves or an admin.
fn check_self_or_admin(actor: &Actor, professional_id: &str) -> Result<(), AppError> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Professional if actor.id == professional_id => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

// POST /api/professionals
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub display_name: String,
    #[serde(default)]
    pub business_name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let now = state.clock.now();

    let (professional, event) = {
        let db = state.db.lock().unwrap();
        verification::register_professional(
            &db,
            &body.display_name,
            &body.business_name,
            &body.location,
            &body.phone,
            &body.email,
            &now,
        )?
    };

    tracing::info!(professional = %professional.id, "professional registered");
    events::record(&state, event);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(&professional).unwrap_or_default()),
    ))
}

// GET /api/professionals/:id
pub async fn get_professional(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let professional = {
        let db = state.db.lock().unwrap();
        queries::get_professional(&db, &id)?
    }
    .ok_or_else(|| AppError::NotFound(format!("professional {id}")))?;

    Ok(Json(serde_json::to_value(&professional).unwrap_or_default()))
}

// POST /api/professionals/:id/certificates
#[derive(Deserialize)]
pub struct SubmitCertificateRequest {
    pub name: String,
    #[serde(default)]
    pub evidence_ref: String,
    pub actor: Actor,
}

pub async fn submit_certificate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<SubmitCertificateRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    check_self_or_admin(&body.actor, &id)?;
    let now = state.clock.now();

    let (certificate, event) = {
        let db = state.db.lock().unwrap();
        verification::submit_certificate(&db, &id, &body.name, &body.evidence_ref, &now)?
    };

    events::record(&state, event);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(&certificate).unwrap_or_default()),
    ))
}

// GET /api/professionals/:id/certificates
pub async fn list_certificates(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let certificates = {
        let db = state.db.lock().unwrap();
        queries::list_certificates_for_professional(&db, &id)?
    };
    Ok(Json(serde_json::to_value(&certificates).unwrap_or_default()))
}

// POST /api/professionals/:id/services
#[derive(Deserialize)]
pub struct SubmitServiceRequest {
    pub name: String,
    pub actor: Actor,
}

pub async fn submit_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<SubmitServiceRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    check_self_or_admin(&body.actor, &id)?;
    let now = state.clock.now();

    let (service, event) = {
        let db = state.db.lock().unwrap();
        verification::submit_service(&db, &id, &body.name, &now)?
    };

    events::record(&state, event);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(&service).unwrap_or_default()),
    ))
}

// GET /api/professionals/:id/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let services = {
        let db = state.db.lock().unwrap();
        queries::list_services_for_professional(&db, &id)?
    };
    Ok(Json(serde_json::to_value(&services).unwrap_or_default()))
}

// POST / DELETE /api/professionals/:id/unavailable-days
#[derive(Deserialize)]
pub struct UnavailableDayRequest {
    pub day: String,
    pub actor: Actor,
}

pub async fn add_unavailable_day(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UnavailableDayRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_self_or_admin(&body.actor, &id)?;
    let day = parse_day(&body.day)?;

    {
        let db = state.db.lock().unwrap();
        queries::get_professional(&db, &id)?
            .ok_or_else(|| AppError::NotFound(format!("professional {id}")))?;
        queries::add_unavailable_day(&db, &id, day)?;
    }

    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn remove_unavailable_day(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UnavailableDayRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_self_or_admin(&body.actor, &id)?;
    let day = parse_day(&body.day)?;

    let removed = {
        let db = state.db.lock().unwrap();
        queries::remove_unavailable_day(&db, &id, day)?
    };

    if removed {
        Ok(Json(serde_json::json!({"ok": true})))
    } else {
        Err(AppError::NotFound(format!("no day block on {}", body.day)))
    }
}

pub async fn list_unavailable_days(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<String>>, AppError> {
    let days = {
        let db = state.db.lock().unwrap();
        queries::list_unavailable_days(&db, &id)?
    };
    Ok(Json(days))
}
