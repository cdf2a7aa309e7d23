use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::db::queries;

/// Decides whether a professional can take a booking at the given
/// datetime. A slot is taken when another pending/confirmed booking
/// holds it, when the professional blocked the whole day, or when the
/// datetime is not strictly in the future.
///
/// Callers must invoke this under the same connection lock as the
/// write that follows, so the check reflects current state at
/// transition time. The partial unique index on active bookings is the
/// backstop if that discipline ever slips.
pub fn is_slot_free(
    conn: &Connection,
    professional_id: &str,
    scheduled_at: &NaiveDateTime,
    now: &NaiveDateTime,
    exclude_booking: Option<&str>,
) -> anyhow::Result<bool> {
    if scheduled_at <= now {
        return Ok(false);
    }

    if queries::is_day_unavailable(conn, professional_id, scheduled_at.date())? {
        return Ok(false);
    }

    if queries::has_active_booking_at(conn, professional_id, scheduled_at, exclude_booking)? {
        return Ok(false);
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Booking, BookingStatus, Professional, ProfessionalStatus};

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn seed_professional(conn: &Connection, id: &str) {
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
                status: ProfessionalStatus::Approved,
                created_at: now,
                updated_at: now,
            },
        )
        .unwrap();
    }

    fn seed_booking(conn: &Connection, id: &str, professional_id: &str, at: &str, status: BookingStatus) {
        let now = dt("2025-06-01 09:00");
        queries::create_service(
            conn,
            &crate::models::ServiceOffering {
                id: format!("svc-{id}"),
                professional_id: professional_id.to_string(),
                name: "Gas safety check".to_string(),
                status: crate::models::ServiceStatus::Approved,
                updated_at: now,
            },
        )
        .unwrap();
        queries::create_booking(
            conn,
            &Booking {
                id: id.to_string(),
                reference: format!("BK-{id}"),
                service_id: format!("svc-{id}"),
                customer_id: "cust-1".to_string(),
                professional_id: professional_id.to_string(),
                scheduled_at: dt(at),
                address: "12 High St".to_string(),
                price: 90.0,
                status,
                has_report: false,
                created_at: now,
                updated_at: now,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_free_slot() {
        let conn = setup_db();
        seed_professional(&conn, "pro-1");
        let now = dt("2025-06-10 09:00");
        assert!(is_slot_free(&conn, "pro-1", &dt("2025-06-16 10:00"), &now, None).unwrap());
    }

    #[test]
    fn test_past_slot_is_not_free() {
        let conn = setup_db();
        seed_professional(&conn, "pro-1");
        let now = dt("2025-06-10 09:00");
        assert!(!is_slot_free(&conn, "pro-1", &dt("2025-06-09 10:00"), &now, None).unwrap());
        // exactly "now" is also rejected
        assert!(!is_slot_free(&conn, "pro-1", &now, &now, None).unwrap());
    }

    #[test]
    fn test_active_booking_blocks_slot() {
        let conn = setup_db();
        seed_professional(&conn, "pro-1");
        seed_booking(&conn, "b1", "pro-1", "2025-06-16 10:00", BookingStatus::Pending);
        let now = dt("2025-06-10 09:00");
        assert!(!is_slot_free(&conn, "pro-1", &dt("2025-06-16 10:00"), &now, None).unwrap());
    }

    #[test]
    fn test_cancelled_booking_frees_slot() {
        let conn = setup_db();
        seed_professional(&conn, "pro-1");
        seed_booking(&conn, "b1", "pro-1", "2025-06-16 10:00", BookingStatus::Cancelled);
        let now = dt("2025-06-10 09:00");
        assert!(is_slot_free(&conn, "pro-1", &dt("2025-06-16 10:00"), &now, None).unwrap());
    }

    #[test]
    fn test_blocked_day_is_not_free() {
        let conn = setup_db();
        seed_professional(&conn, "pro-1");
        queries::add_unavailable_day(&conn, "pro-1", dt("2025-06-16 00:00").date()).unwrap();
        let now = dt("2025-06-10 09:00");
        assert!(!is_slot_free(&conn, "pro-1", &dt("2025-06-16 10:00"), &now, None).unwrap());
        // a different day stays bookable
        assert!(is_slot_free(&conn, "pro-1", &dt("2025-06-17 10:00"), &now, None).unwrap());
    }

    #[test]
    fn test_excluded_booking_does_not_block_itself() {
        let conn = setup_db();
        seed_professional(&conn, "pro-1");
        seed_booking(&conn, "b1", "pro-1", "2025-06-16 10:00", BookingStatus::Confirmed);
        let now = dt("2025-06-10 09:00");
        // rescheduling b1 onto its own slot is allowed
        assert!(is_slot_free(&conn, "pro-1", &dt("2025-06-16 10:00"), &now, Some("b1")).unwrap());
        // but another booking is still blocked
        assert!(!is_slot_free(&conn, "pro-1", &dt("2025-06-16 10:00"), &now, Some("b2")).unwrap());
    }

    #[test]
    fn test_other_professional_is_unaffected() {
        let conn = setup_db();
        seed_professional(&conn, "pro-1");
        seed_professional(&conn, "pro-2");
        seed_booking(&conn, "b1", "pro-1", "2025-06-16 10:00", BookingStatus::Confirmed);
        let now = dt("2025-06-10 09:00");
        assert!(is_slot_free(&conn, "pro-2", &dt("2025-06-16 10:00"), &now, None).unwrap());
    }
}
