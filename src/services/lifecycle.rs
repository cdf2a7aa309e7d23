use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Actor, Booking, BookingStatus, ProfessionalStatus, Role, ServiceStatus};
use crate::services::availability;
use crate::services::events::OutboundEvent;

/// Booking state machine:
///
/// ```text
/// pending --(confirm)--> confirmed --(marked done after the slot)--> completed
/// pending|confirmed --(cancel)--> cancelled
/// pending|confirmed --(reschedule)--> pending
/// ```
///
/// Completed and cancelled are terminal. Every function here expects to
/// run under the shared connection lock so the read-validate-write
/// sequence is atomic with respect to other writers.
pub struct BookingRequest {
    pub customer_id: String,
    pub professional_id: String,
    pub service_id: String,
    pub scheduled_at: NaiveDateTime,
    pub address: String,
    pub price: f64,
}

#[derive(Debug)]
pub struct CancelOutcome {
    pub booking: Booking,
    pub refund_eligible: bool,
}

pub fn create_booking(
    conn: &Connection,
    req: &BookingRequest,
    actor: &Actor,
    auto_confirm: bool,
    now: &NaiveDateTime,
) -> Result<(Booking, OutboundEvent), AppError> {
    if !matches!(actor.role, Role::Customer | Role::Admin) {
        return Err(AppError::Unauthorized);
    }
    if req.address.trim().is_empty() {
        return Err(AppError::Validation("address is required".to_string()));
    }
    if req.price < 0.0 {
        return Err(AppError::Validation(
            "price must not be negative".to_string(),
        ));
    }

    let professional = queries::get_professional(conn, &req.professional_id)?
        .ok_or_else(|| AppError::NotFound(format!("professional {}", req.professional_id)))?;
    if professional.status != ProfessionalStatus::Approved {
        return Err(AppError::Validation(
            "professional is not accepting bookings".to_string(),
        ));
    }

    let service = queries::get_service(conn, &req.service_id)?
        .ok_or_else(|| AppError::NotFound(format!("service {}", req.service_id)))?;
    if service.professional_id != req.professional_id {
        return Err(AppError::Validation(
            "service does not belong to this professional".to_string(),
        ));
    }
    if service.status != ServiceStatus::Approved {
        return Err(AppError::Validation(
            "service is not available for booking".to_string(),
        ));
    }

    if !availability::is_slot_free(conn, &req.professional_id, &req.scheduled_at, now, None)? {
        return Err(AppError::SlotUnavailable);
    }

    let status = if auto_confirm {
        BookingStatus::Confirmed
    } else {
        BookingStatus::Pending
    };

    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        reference: new_reference(),
        service_id: req.service_id.clone(),
        customer_id: req.customer_id.clone(),
        professional_id: req.professional_id.clone(),
        scheduled_at: req.scheduled_at,
        address: req.address.trim().to_string(),
        price: req.price,
        status,
        has_report: false,
        created_at: *now,
        updated_at: *now,
    };

    queries::create_booking(conn, &booking).map_err(map_slot_conflict)?;

    let event = OutboundEvent::new(
        "booking.created",
        serde_json::json!({
            "booking_id": booking.id,
            "reference": booking.reference,
            "customer_id": booking.customer_id,
            "professional_id": booking.professional_id,
            "service_id": booking.service_id,
            "scheduled_at": booking.scheduled_at.format(queries::DATETIME_FMT).to_string(),
            "status": booking.status.as_str(),
        }),
    );

    Ok((booking, event))
}

pub fn confirm_booking(
    conn: &Connection,
    id: &str,
    actor: &Actor,
    now: &NaiveDateTime,
) -> Result<(Booking, Option<OutboundEvent>), AppError> {
    if !matches!(actor.role, Role::Professional | Role::Admin) {
        return Err(AppError::Unauthorized);
    }

    let mut booking =
        queries::get_booking(conn, id)?.ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;

    match booking.status {
        // Retried confirmation of an already-confirmed booking is a
        // no-op success, not an error.
        BookingStatus::Confirmed => Ok((booking, None)),
        BookingStatus::Pending => {
            queries::update_booking_status(conn, id, BookingStatus::Confirmed, now)?;
            booking.status = BookingStatus::Confirmed;
            booking.updated_at = *now;

            let event = OutboundEvent::new(
                "booking.confirmed",
                serde_json::json!({
                    "booking_id": booking.id,
                    "reference": booking.reference,
                }),
            );
            Ok((booking, Some(event)))
        }
        status => Err(invalid_transition(status, "confirm")),
    }
}

pub fn cancel_booking(
    conn: &Connection,
    id: &str,
    actor: &Actor,
    cancellation_window_hours: i64,
    now: &NaiveDateTime,
) -> Result<(CancelOutcome, OutboundEvent), AppError> {
    let mut booking =
        queries::get_booking(conn, id)?.ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;

    if !booking.status.is_active() {
        return Err(invalid_transition(booking.status, "cancel"));
    }

    // Refund-eligible when cancelled strictly more than the configured
    // window before the appointment. The caller moves the money.
    let refund_eligible =
        booking.scheduled_at - *now > Duration::hours(cancellation_window_hours);

    queries::update_booking_status(conn, id, BookingStatus::Cancelled, now)?;
    booking.status = BookingStatus::Cancelled;
    booking.updated_at = *now;

    let event = OutboundEvent::new(
        "booking.cancelled",
        serde_json::json!({
            "booking_id": booking.id,
            "reference": booking.reference,
            "cancelled_by": actor.role.as_str(),
            "refund_eligible": refund_eligible,
        }),
    );

    Ok((
        CancelOutcome {
            booking,
            refund_eligible,
        },
        event,
    ))
}

pub fn reschedule_booking(
    conn: &Connection,
    id: &str,
    new_scheduled_at: &NaiveDateTime,
    reason: Option<&str>,
    actor: &Actor,
    now: &NaiveDateTime,
) -> Result<(Booking, OutboundEvent), AppError> {
    let mut booking =
        queries::get_booking(conn, id)?.ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;

    if !booking.status.is_active() {
        return Err(invalid_transition(booking.status, "reschedule"));
    }

    if !availability::is_slot_free(conn, &booking.professional_id, new_scheduled_at, now, Some(id))?
    {
        return Err(AppError::SlotUnavailable);
    }

    let previous_scheduled_at = booking.scheduled_at;
    queries::update_booking_schedule(conn, id, new_scheduled_at, now).map_err(map_slot_conflict)?;

    // A reschedule is a proposal: it re-enters pending no matter who
    // initiated it or what the status was before.
    booking.scheduled_at = *new_scheduled_at;
    booking.status = BookingStatus::Pending;
    booking.updated_at = *now;

    let event = OutboundEvent::new(
        "booking.reschedule_requested",
        serde_json::json!({
            "booking_id": booking.id,
            "reference": booking.reference,
            "previous_scheduled_at": previous_scheduled_at.format(queries::DATETIME_FMT).to_string(),
            "scheduled_at": booking.scheduled_at.format(queries::DATETIME_FMT).to_string(),
            "reason": reason,
            "requested_by": actor.role.as_str(),
        }),
    );

    Ok((booking, event))
}

pub fn complete_booking(
    conn: &Connection,
    id: &str,
    actor: &Actor,
    now: &NaiveDateTime,
) -> Result<(Booking, OutboundEvent), AppError> {
    if !matches!(actor.role, Role::Professional | Role::Admin) {
        return Err(AppError::Unauthorized);
    }

    let mut booking =
        queries::get_booking(conn, id)?.ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;

    if booking.status != BookingStatus::Confirmed {
        return Err(invalid_transition(booking.status, "complete"));
    }
    if booking.scheduled_at > *now {
        return Err(AppError::Validation(
            "booking cannot be completed before its scheduled time".to_string(),
        ));
    }

    queries::update_booking_status(conn, id, BookingStatus::Completed, now)?;
    booking.status = BookingStatus::Completed;
    booking.updated_at = *now;

    let event = OutboundEvent::new(
        "booking.completed",
        serde_json::json!({
            "booking_id": booking.id,
            "reference": booking.reference,
        }),
    );

    Ok((booking, event))
}

fn new_reference() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("BK-{}", id[..8].to_uppercase())
}

fn invalid_transition(status: BookingStatus, operation: &str) -> AppError {
    AppError::InvalidTransition {
        status: status.as_str().to_string(),
        operation: operation.to_string(),
    }
}

/// The partial unique index on active (professional_id, scheduled_at)
/// pairs fires when two writers race for the same slot; surface that
/// as the slot being taken, not as a database error.
fn map_slot_conflict(err: anyhow::Error) -> AppError {
    if let Some(rusqlite::Error::SqliteFailure(e, _)) = err.downcast_ref::<rusqlite::Error>() {
        if e.code == rusqlite::ErrorCode::ConstraintViolation {
            return AppError::SlotUnavailable;
        }
    }
    AppError::Internal(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Professional, ServiceOffering};

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn customer() -> Actor {
        Actor {
            id: "cust-1".to_string(),
            role: Role::Customer,
        }
    }

    fn professional_actor() -> Actor {
        Actor {
            id: "pro-1".to_string(),
            role: Role::Professional,
        }
    }

    fn seed_professional(conn: &Connection, id: &str, status: ProfessionalStatus) {
        let now = dt("2025-06-01 09:00");
        queries::create_professional(
            conn,
            &Professional {
                id: id.to_string(),
                display_name: "Jess".to_string(),
                business_name: "Jess Inspections".to_string(),
                location: "Leeds".to_string(),
                phone: "+447700900000".to_string(),
                email: "jess@example.com".to_string(),
                status,
                created_at: now,
                updated_at: now,
            },
        )
        .unwrap();
    }

    fn seed_service(conn: &Connection, id: &str, professional_id: &str, status: ServiceStatus) {
        queries::create_service(
            conn,
            &ServiceOffering {
                id: id.to_string(),
                professional_id: professional_id.to_string(),
                name: "Gas safety check".to_string(),
                status,
                updated_at: dt("2025-06-01 09:00"),
            },
        )
        .unwrap();
    }

    fn request(at: &str) -> BookingRequest {
        BookingRequest {
            customer_id: "cust-1".to_string(),
            professional_id: "pro-1".to_string(),
            service_id: "svc-1".to_string(),
            scheduled_at: dt(at),
            address: "12 High St".to_string(),
            price: 120.0,
        }
    }

    fn setup_bookable() -> Connection {
        let conn = setup_db();
        seed_professional(&conn, "pro-1", ProfessionalStatus::Approved);
        seed_service(&conn, "svc-1", "pro-1", ServiceStatus::Approved);
        conn
    }

    #[test]
    fn test_create_booking_pending_with_reference() {
        let conn = setup_bookable();
        let now = dt("2025-11-01 09:00");
        let (booking, event) =
            create_booking(&conn, &request("2025-12-01 10:00"), &customer(), false, &now).unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(booking.reference.starts_with("BK-"));
        assert_eq!(booking.reference.len(), 11);
        assert_eq!(event.name, "booking.created");
        assert!(queries::get_booking(&conn, &booking.id).unwrap().is_some());
    }

    #[test]
    fn test_create_booking_auto_confirm() {
        let conn = setup_bookable();
        let now = dt("2025-11-01 09:00");
        let (booking, _) =
            create_booking(&conn, &request("2025-12-01 10:00"), &customer(), true, &now).unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_create_booking_unapproved_professional() {
        let conn = setup_db();
        seed_professional(&conn, "pro-1", ProfessionalStatus::Rejected);
        seed_service(&conn, "svc-1", "pro-1", ServiceStatus::Approved);
        let now = dt("2025-11-01 09:00");

        let err = create_booking(&conn, &request("2025-12-01 10:00"), &customer(), false, &now)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_create_booking_service_of_other_professional() {
        let conn = setup_bookable();
        seed_professional(&conn, "pro-2", ProfessionalStatus::Approved);
        seed_service(&conn, "svc-2", "pro-2", ServiceStatus::Approved);
        let now = dt("2025-11-01 09:00");

        let mut req = request("2025-12-01 10:00");
        req.service_id = "svc-2".to_string();
        let err = create_booking(&conn, &req, &customer(), false, &now).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_create_booking_unapproved_service() {
        let conn = setup_db();
        seed_professional(&conn, "pro-1", ProfessionalStatus::Approved);
        seed_service(&conn, "svc-1", "pro-1", ServiceStatus::Pending);
        let now = dt("2025-11-01 09:00");

        let err = create_booking(&conn, &request("2025-12-01 10:00"), &customer(), false, &now)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_create_booking_taken_slot() {
        let conn = setup_bookable();
        let now = dt("2025-11-01 09:00");
        create_booking(&conn, &request("2025-12-01 10:00"), &customer(), false, &now).unwrap();

        let err = create_booking(&conn, &request("2025-12-01 10:00"), &customer(), false, &now)
            .unwrap_err();
        assert!(matches!(err, AppError::SlotUnavailable));
    }

    #[test]
    fn test_confirm_then_retry_is_idempotent() {
        let conn = setup_bookable();
        let now = dt("2025-11-01 09:00");
        let (booking, _) =
            create_booking(&conn, &request("2025-12-01 10:00"), &customer(), false, &now).unwrap();

        let (confirmed, event) =
            confirm_booking(&conn, &booking.id, &professional_actor(), &now).unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert!(event.is_some());

        let (again, event) =
            confirm_booking(&conn, &booking.id, &professional_actor(), &now).unwrap();
        assert_eq!(again.status, BookingStatus::Confirmed);
        assert!(event.is_none());
    }

    #[test]
    fn test_confirm_requires_professional_or_admin() {
        let conn = setup_bookable();
        let now = dt("2025-11-01 09:00");
        let (booking, _) =
            create_booking(&conn, &request("2025-12-01 10:00"), &customer(), false, &now).unwrap();

        let err = confirm_booking(&conn, &booking.id, &customer(), &now).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[test]
    fn test_cancel_refund_window() {
        let conn = setup_bookable();
        let now = dt("2025-11-01 09:00");
        let (booking, _) =
            create_booking(&conn, &request("2025-12-03 14:00"), &customer(), false, &now).unwrap();

        // 72 hours out with a 48 hour window: refund-eligible
        let cancel_at = dt("2025-11-30 14:00");
        let (outcome, event) =
            cancel_booking(&conn, &booking.id, &customer(), 48, &cancel_at).unwrap();
        assert!(outcome.refund_eligible);
        assert_eq!(outcome.booking.status, BookingStatus::Cancelled);
        assert_eq!(event.payload["refund_eligible"], serde_json::json!(true));
    }

    #[test]
    fn test_cancel_inside_window_not_refundable() {
        let conn = setup_bookable();
        let now = dt("2025-11-01 09:00");
        let (booking, _) =
            create_booking(&conn, &request("2025-12-03 14:00"), &customer(), false, &now).unwrap();

        // 24 hours before, window 48: too late for a refund
        let cancel_at = dt("2025-12-02 14:00");
        let (outcome, _) = cancel_booking(&conn, &booking.id, &customer(), 48, &cancel_at).unwrap();
        assert!(!outcome.refund_eligible);
    }

    #[test]
    fn test_cancel_exactly_at_window_boundary_not_refundable() {
        let conn = setup_bookable();
        let now = dt("2025-11-01 09:00");
        let (booking, _) =
            create_booking(&conn, &request("2025-12-03 14:00"), &customer(), false, &now).unwrap();

        let cancel_at = dt("2025-12-01 14:00");
        let (outcome, _) = cancel_booking(&conn, &booking.id, &customer(), 48, &cancel_at).unwrap();
        assert!(!outcome.refund_eligible);
    }

    #[test]
    fn test_cancelled_booking_rejects_everything() {
        let conn = setup_bookable();
        let now = dt("2025-11-01 09:00");
        let (booking, _) =
            create_booking(&conn, &request("2025-12-01 10:00"), &customer(), false, &now).unwrap();
        cancel_booking(&conn, &booking.id, &customer(), 48, &now).unwrap();

        assert!(matches!(
            cancel_booking(&conn, &booking.id, &customer(), 48, &now).unwrap_err(),
            AppError::InvalidTransition { .. }
        ));
        assert!(matches!(
            confirm_booking(&conn, &booking.id, &professional_actor(), &now).unwrap_err(),
            AppError::InvalidTransition { .. }
        ));
        assert!(matches!(
            reschedule_booking(&conn, &booking.id, &dt("2025-12-05 10:00"), None, &customer(), &now)
                .unwrap_err(),
            AppError::InvalidTransition { .. }
        ));
        assert!(matches!(
            complete_booking(&conn, &booking.id, &professional_actor(), &now).unwrap_err(),
            AppError::InvalidTransition { .. }
        ));
    }

    #[test]
    fn test_reschedule_resets_confirmed_to_pending() {
        let conn = setup_bookable();
        let now = dt("2025-11-01 09:00");
        let (booking, _) =
            create_booking(&conn, &request("2025-12-01 10:00"), &customer(), false, &now).unwrap();
        confirm_booking(&conn, &booking.id, &professional_actor(), &now).unwrap();

        // even a professional-initiated reschedule needs re-confirmation
        let (rescheduled, event) = reschedule_booking(
            &conn,
            &booking.id,
            &dt("2025-12-03 14:00"),
            Some("double-booked elsewhere"),
            &professional_actor(),
            &now,
        )
        .unwrap();

        assert_eq!(rescheduled.status, BookingStatus::Pending);
        assert_eq!(rescheduled.scheduled_at, dt("2025-12-03 14:00"));
        assert_eq!(event.name, "booking.reschedule_requested");
        assert_eq!(
            event.payload["reason"],
            serde_json::json!("double-booked elsewhere")
        );

        let stored = queries::get_booking(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Pending);
    }

    #[test]
    fn test_reschedule_onto_taken_slot() {
        let conn = setup_bookable();
        let now = dt("2025-11-01 09:00");
        let (first, _) =
            create_booking(&conn, &request("2025-12-01 10:00"), &customer(), false, &now).unwrap();
        let (second, _) =
            create_booking(&conn, &request("2025-12-02 10:00"), &customer(), false, &now).unwrap();

        let err = reschedule_booking(
            &conn,
            &second.id,
            &first.scheduled_at,
            None,
            &customer(),
            &now,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::SlotUnavailable));
    }

    #[test]
    fn test_complete_only_after_scheduled_time() {
        let conn = setup_bookable();
        let now = dt("2025-11-01 09:00");
        let (booking, _) =
            create_booking(&conn, &request("2025-12-01 10:00"), &customer(), false, &now).unwrap();
        confirm_booking(&conn, &booking.id, &professional_actor(), &now).unwrap();

        let too_early = dt("2025-12-01 09:00");
        assert!(matches!(
            complete_booking(&conn, &booking.id, &professional_actor(), &too_early).unwrap_err(),
            AppError::Validation(_)
        ));

        let after = dt("2025-12-01 11:00");
        let (completed, event) =
            complete_booking(&conn, &booking.id, &professional_actor(), &after).unwrap();
        assert_eq!(completed.status, BookingStatus::Completed);
        assert!(!completed.has_report);
        assert_eq!(event.name, "booking.completed");
    }

    #[test]
    fn test_complete_pending_booking_rejected() {
        let conn = setup_bookable();
        let now = dt("2025-11-01 09:00");
        let (booking, _) =
            create_booking(&conn, &request("2025-12-01 10:00"), &customer(), false, &now).unwrap();

        let after = dt("2025-12-01 11:00");
        assert!(matches!(
            complete_booking(&conn, &booking.id, &professional_actor(), &after).unwrap_err(),
            AppError::InvalidTransition { .. }
        ));
    }
}
