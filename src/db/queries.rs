use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};

use crate::models::{
    Booking, BookingStatus, Certificate, CertificateStatus, Professional, ProfessionalStatus,
    ServiceOffering, ServiceStatus, WorkflowEvent,
};

pub const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

fn fmt_dt(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FMT).to_string()
}

fn parse_dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT)
        .unwrap_or_else(|_| chrono::Utc::now().naive_utc())
}

// ── Professionals ──

pub fn create_professional(conn: &Connection, pro: &Professional) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO professionals (id, display_name, business_name, location, phone, email, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            pro.id,
            pro.display_name,
            pro.business_name,
            pro.location,
            pro.phone,
            pro.email,
            pro.status.as_str(),
            fmt_dt(&pro.created_at),
            fmt_dt(&pro.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_professional(conn: &Connection, id: &str) -> anyhow::Result<Option<Professional>> {
    let result = conn.query_row(
        "SELECT id, display_name, business_name, location, phone, email, status, created_at, updated_at
         FROM professionals WHERE id = ?1",
        params![id],
        |row| Ok(parse_professional_row(row)),
    );

    match result {
        Ok(pro) => Ok(Some(pro?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_professional_status(
    conn: &Connection,
    id: &str,
    status: ProfessionalStatus,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE professionals SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), fmt_dt(now), id],
    )?;
    Ok(count > 0)
}

pub fn list_professionals(
    conn: &Connection,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Professional>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            "SELECT id, display_name, business_name, location, phone, email, status, created_at, updated_at
             FROM professionals WHERE status = ?1 ORDER BY created_at DESC LIMIT ?2"
                .to_string(),
            vec![
                Box::new(status.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
        None => (
            "SELECT id, display_name, business_name, location, phone, email, status, created_at, updated_at
             FROM professionals ORDER BY created_at DESC LIMIT ?1"
                .to_string(),
            vec![Box::new(limit) as Box<dyn rusqlite::types::ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_professional_row(row)))?;

    let mut pros = vec![];
    for row in rows {
        pros.push(row??);
    }
    Ok(pros)
}

fn parse_professional_row(row: &rusqlite::Row) -> anyhow::Result<Professional> {
    let status_str: String = row.get(6)?;
    let created_at_str: String = row.get(7)?;
    let updated_at_str: String = row.get(8)?;

    Ok(Professional {
        id: row.get(0)?,
        display_name: row.get(1)?,
        business_name: row.get(2)?,
        location: row.get(3)?,
        phone: row.get(4)?,
        email: row.get(5)?,
        status: ProfessionalStatus::parse(&status_str),
        created_at: parse_dt(&created_at_str),
        updated_at: parse_dt(&updated_at_str),
    })
}

// ── Services ──

pub fn create_service(conn: &Connection, service: &ServiceOffering) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, professional_id, name, status, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            service.id,
            service.professional_id,
            service.name,
            service.status.as_str(),
            fmt_dt(&service.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<ServiceOffering>> {
    let result = conn.query_row(
        "SELECT id, professional_id, name, status, updated_at FROM services WHERE id = ?1",
        params![id],
        |row| Ok(parse_service_row(row)),
    );

    match result {
        Ok(service) => Ok(Some(service?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_service_status(
    conn: &Connection,
    id: &str,
    status: ServiceStatus,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE services SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), fmt_dt(now), id],
    )?;
    Ok(count > 0)
}

pub fn list_services_for_professional(
    conn: &Connection,
    professional_id: &str,
) -> anyhow::Result<Vec<ServiceOffering>> {
    let mut stmt = conn.prepare(
        "SELECT id, professional_id, name, status, updated_at
         FROM services WHERE professional_id = ?1 ORDER BY updated_at DESC",
    )?;
    let rows = stmt.query_map(params![professional_id], |row| Ok(parse_service_row(row)))?;

    let mut services = vec![];
    for row in rows {
        services.push(row??);
    }
    Ok(services)
}

fn parse_service_row(row: &rusqlite::Row) -> anyhow::Result<ServiceOffering> {
    let status_str: String = row.get(3)?;
    let updated_at_str: String = row.get(4)?;

    Ok(ServiceOffering {
        id: row.get(0)?,
        professional_id: row.get(1)?,
        name: row.get(2)?,
        status: ServiceStatus::parse(&status_str),
        updated_at: parse_dt(&updated_at_str),
    })
}

// ── Certificates ──

pub fn create_certificate(conn: &Connection, cert: &Certificate) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO certificates (id, professional_id, name, evidence_ref, status, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            cert.id,
            cert.professional_id,
            cert.name,
            cert.evidence_ref,
            cert.status.as_str(),
            fmt_dt(&cert.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_certificate(conn: &Connection, id: &str) -> anyhow::Result<Option<Certificate>> {
    let result = conn.query_row(
        "SELECT id, professional_id, name, evidence_ref, status, updated_at
         FROM certificates WHERE id = ?1",
        params![id],
        |row| Ok(parse_certificate_row(row)),
    );

    match result {
        Ok(cert) => Ok(Some(cert?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_certificate_status(
    conn: &Connection,
    id: &str,
    status: CertificateStatus,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE certificates SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), fmt_dt(now), id],
    )?;
    Ok(count > 0)
}

pub fn list_certificates_for_professional(
    conn: &Connection,
    professional_id: &str,
) -> anyhow::Result<Vec<Certificate>> {
    let mut stmt = conn.prepare(
        "SELECT id, professional_id, name, evidence_ref, status, updated_at
         FROM certificates WHERE professional_id = ?1 ORDER BY updated_at DESC",
    )?;
    let rows = stmt.query_map(params![professional_id], |row| {
        Ok(parse_certificate_row(row))
    })?;

    let mut certs = vec![];
    for row in rows {
        certs.push(row??);
    }
    Ok(certs)
}

fn parse_certificate_row(row: &rusqlite::Row) -> anyhow::Result<Certificate> {
    let status_str: String = row.get(4)?;
    let updated_at_str: String = row.get(5)?;

    Ok(Certificate {
        id: row.get(0)?,
        professional_id: row.get(1)?,
        name: row.get(2)?,
        evidence_ref: row.get(3)?,
        status: CertificateStatus::parse(&status_str),
        updated_at: parse_dt(&updated_at_str),
    })
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, reference, service_id, customer_id, professional_id, scheduled_at, address, price, status, has_report, created_at, updated_at";

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, reference, service_id, customer_id, professional_id, scheduled_at, address, price, status, has_report, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            booking.id,
            booking.reference,
            booking.service_id,
            booking.customer_id,
            booking.professional_id,
            fmt_dt(&booking.scheduled_at),
            booking.address,
            booking.price,
            booking.status.as_str(),
            booking.has_report as i32,
            fmt_dt(&booking.created_at),
            fmt_dt(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), fmt_dt(now), id],
    )?;
    Ok(count > 0)
}

/// Moves a booking to a new slot. The status always drops back to
/// pending: a reschedule is a proposal, not a guarantee.
pub fn update_booking_schedule(
    conn: &Connection,
    id: &str,
    new_scheduled_at: &NaiveDateTime,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET scheduled_at = ?1, status = 'pending', updated_at = ?2 WHERE id = ?3",
        params![fmt_dt(new_scheduled_at), fmt_dt(now), id],
    )?;
    Ok(count > 0)
}

pub fn has_active_booking_at(
    conn: &Connection,
    professional_id: &str,
    scheduled_at: &NaiveDateTime,
    exclude_booking: Option<&str>,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE professional_id = ?1 AND scheduled_at = ?2
           AND status IN ('pending', 'confirmed')
           AND id != COALESCE(?3, '')",
        params![professional_id, fmt_dt(scheduled_at), exclude_booking],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[derive(Default)]
pub struct BookingFilter<'a> {
    pub customer_id: Option<&'a str>,
    pub professional_id: Option<&'a str>,
    pub status: Option<&'a str>,
}

pub fn list_bookings(
    conn: &Connection,
    filter: &BookingFilter,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let mut sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE 1=1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(customer_id) = filter.customer_id {
        params_vec.push(Box::new(customer_id.to_string()));
        sql.push_str(&format!(" AND customer_id = ?{}", params_vec.len()));
    }
    if let Some(professional_id) = filter.professional_id {
        params_vec.push(Box::new(professional_id.to_string()));
        sql.push_str(&format!(" AND professional_id = ?{}", params_vec.len()));
    }
    if let Some(status) = filter.status {
        params_vec.push(Box::new(status.to_string()));
        sql.push_str(&format!(" AND status = ?{}", params_vec.len()));
    }

    params_vec.push(Box::new(limit));
    sql.push_str(&format!(
        " ORDER BY scheduled_at DESC LIMIT ?{}",
        params_vec.len()
    ));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn list_completed_bookings(conn: &Connection, limit: i64) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = 'completed'
         ORDER BY updated_at DESC LIMIT ?1"
    ))?;
    let rows = stmt.query_map(params![limit], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let scheduled_at_str: String = row.get(5)?;
    let status_str: String = row.get(8)?;
    let created_at_str: String = row.get(10)?;
    let updated_at_str: String = row.get(11)?;

    Ok(Booking {
        id: row.get(0)?,
        reference: row.get(1)?,
        service_id: row.get(2)?,
        customer_id: row.get(3)?,
        professional_id: row.get(4)?,
        scheduled_at: parse_dt(&scheduled_at_str),
        address: row.get(6)?,
        price: row.get(7)?,
        status: BookingStatus::parse(&status_str),
        has_report: row.get::<_, i32>(9)? != 0,
        created_at: parse_dt(&created_at_str),
        updated_at: parse_dt(&updated_at_str),
    })
}

// ── Unavailable days ──

pub fn add_unavailable_day(
    conn: &Connection,
    professional_id: &str,
    day: NaiveDate,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO professional_unavailable_days (professional_id, day) VALUES (?1, ?2)
         ON CONFLICT(professional_id, day) DO NOTHING",
        params![professional_id, day.format("%Y-%m-%d").to_string()],
    )?;
    Ok(())
}

pub fn remove_unavailable_day(
    conn: &Connection,
    professional_id: &str,
    day: NaiveDate,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM professional_unavailable_days WHERE professional_id = ?1 AND day = ?2",
        params![professional_id, day.format("%Y-%m-%d").to_string()],
    )?;
    Ok(count > 0)
}

pub fn is_day_unavailable(
    conn: &Connection,
    professional_id: &str,
    day: NaiveDate,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM professional_unavailable_days WHERE professional_id = ?1 AND day = ?2",
        params![professional_id, day.format("%Y-%m-%d").to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list_unavailable_days(
    conn: &Connection,
    professional_id: &str,
) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT day FROM professional_unavailable_days WHERE professional_id = ?1 ORDER BY day ASC",
    )?;
    let rows = stmt.query_map(params![professional_id], |row| row.get::<_, String>(0))?;

    let mut days = vec![];
    for row in rows {
        days.push(row?);
    }
    Ok(days)
}

// ── Commission rates ──

pub struct CommissionRate {
    pub rate_percent: f64,
    pub effective_from: String,
}

pub fn insert_commission_rate(
    conn: &Connection,
    rate_percent: f64,
    now: &NaiveDateTime,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO commission_rates (rate_percent, effective_from) VALUES (?1, ?2)",
        params![rate_percent, fmt_dt(now)],
    )?;
    Ok(())
}

pub fn current_commission_rate(conn: &Connection) -> anyhow::Result<Option<CommissionRate>> {
    let result = conn.query_row(
        "SELECT rate_percent, effective_from FROM commission_rates
         ORDER BY effective_from DESC, id DESC LIMIT 1",
        [],
        |row| {
            Ok(CommissionRate {
                rate_percent: row.get(0)?,
                effective_from: row.get(1)?,
            })
        },
    );

    match result {
        Ok(rate) => Ok(Some(rate)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Rate in effect at a given instant. Transactions reference the rate
/// current at their time, never a later one retroactively; if the log
/// starts after the instant the oldest row applies.
pub fn rate_in_effect_at(conn: &Connection, at: &NaiveDateTime) -> anyhow::Result<Option<f64>> {
    let result = conn.query_row(
        "SELECT rate_percent FROM commission_rates WHERE effective_from <= ?1
         ORDER BY effective_from DESC, id DESC LIMIT 1",
        params![fmt_dt(at)],
        |row| row.get::<_, f64>(0),
    );

    match result {
        Ok(rate) => Ok(Some(rate)),
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            let oldest = conn.query_row(
                "SELECT rate_percent FROM commission_rates ORDER BY effective_from ASC, id ASC LIMIT 1",
                [],
                |row| row.get::<_, f64>(0),
            );
            match oldest {
                Ok(rate) => Ok(Some(rate)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

// ── Workflow events ──

pub fn insert_workflow_event(conn: &Connection, name: &str, payload: &str) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO workflow_events (name, payload) VALUES (?1, ?2)",
        params![name, payload],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_workflow_events_since(
    conn: &Connection,
    since_id: i64,
) -> anyhow::Result<Vec<WorkflowEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, payload, created_at FROM workflow_events WHERE id > ?1 ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![since_id], |row| {
        let payload_str: String = row.get(2)?;
        Ok(WorkflowEvent {
            id: row.get(0)?,
            name: row.get(1)?,
            payload: serde_json::from_str(&payload_str)
                .unwrap_or(serde_json::Value::Null),
            created_at: row.get(3)?,
        })
    })?;

    let mut events = vec![];
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}
