use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Actor, Certificate, CertificateStatus, Professional, ProfessionalStatus, ServiceOffering,
    ServiceStatus,
};
use crate::services::events::OutboundEvent;

/// Three independent review machines with the same shape:
/// `pending -> {approved|verified, rejected}`, plus admin reversals in
/// either direction. Human review can overturn prior human decisions,
/// so no transition between distinct states is forbidden here; the
/// only hard rules are that the actor is an admin, and that a
/// rejection carries a reason. Setting the status an entity already
/// has is an idempotent success and emits nothing.
#[derive(Debug, Serialize)]
pub struct VerificationSummary {
    pub all_certificates_verified: bool,
    pub all_services_approved: bool,
}

pub fn register_professional(
    conn: &Connection,
    display_name: &str,
    business_name: &str,
    location: &str,
    phone: &str,
    email: &str,
    now: &NaiveDateTime,
) -> Result<(Professional, OutboundEvent), AppError> {
    if display_name.trim().is_empty() {
        return Err(AppError::Validation("display name is required".to_string()));
    }

    let professional = Professional {
        id: uuid::Uuid::new_v4().to_string(),
        display_name: display_name.trim().to_string(),
        business_name: business_name.trim().to_string(),
        location: location.trim().to_string(),
        phone: phone.trim().to_string(),
        email: email.trim().to_string(),
        status: ProfessionalStatus::Pending,
        created_at: *now,
        updated_at: *now,
    };
    queries::create_professional(conn, &professional)?;

    let event = OutboundEvent::new(
        "professional.registered",
        serde_json::json!({
            "professional_id": professional.id,
            "display_name": professional.display_name,
        }),
    );
    Ok((professional, event))
}

pub fn set_professional_status(
    conn: &Connection,
    id: &str,
    new_status: ProfessionalStatus,
    actor: &Actor,
    now: &NaiveDateTime,
) -> Result<(Professional, Option<OutboundEvent>), AppError> {
    if !actor.is_admin() {
        return Err(AppError::Unauthorized);
    }

    let mut professional = queries::get_professional(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("professional {id}")))?;

    if professional.status == new_status {
        return Ok((professional, None));
    }

    queries::update_professional_status(conn, id, new_status, now)?;
    professional.status = new_status;
    professional.updated_at = *now;

    let name = match new_status {
        ProfessionalStatus::Approved => "professional.approved",
        ProfessionalStatus::Rejected => "professional.rejected",
        ProfessionalStatus::Pending => "professional.pending",
    };
    let event = OutboundEvent::new(
        name,
        serde_json::json!({
            "professional_id": professional.id,
            "status": professional.status.as_str(),
        }),
    );

    Ok((professional, Some(event)))
}

pub fn submit_certificate(
    conn: &Connection,
    professional_id: &str,
    name: &str,
    evidence_ref: &str,
    now: &NaiveDateTime,
) -> Result<(Certificate, OutboundEvent), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation(
            "certificate name is required".to_string(),
        ));
    }
    queries::get_professional(conn, professional_id)?
        .ok_or_else(|| AppError::NotFound(format!("professional {professional_id}")))?;

    let certificate = Certificate {
        id: uuid::Uuid::new_v4().to_string(),
        professional_id: professional_id.to_string(),
        name: name.trim().to_string(),
        evidence_ref: evidence_ref.to_string(),
        status: CertificateStatus::Pending,
        updated_at: *now,
    };
    queries::create_certificate(conn, &certificate)?;

    let event = OutboundEvent::new(
        "certificate.submitted",
        serde_json::json!({
            "certificate_id": certificate.id,
            "professional_id": certificate.professional_id,
            "name": certificate.name,
        }),
    );
    Ok((certificate, event))
}

pub fn set_certificate_status(
    conn: &Connection,
    id: &str,
    new_status: CertificateStatus,
    reason: Option<&str>,
    actor: &Actor,
    now: &NaiveDateTime,
) -> Result<(Certificate, Option<OutboundEvent>), AppError> {
    if !actor.is_admin() {
        return Err(AppError::Unauthorized);
    }

    let reason = validate_rejection_reason(new_status == CertificateStatus::Rejected, reason)?;

    let mut certificate = queries::get_certificate(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("certificate {id}")))?;

    if certificate.status == new_status {
        return Ok((certificate, None));
    }

    queries::update_certificate_status(conn, id, new_status, now)?;
    certificate.status = new_status;
    certificate.updated_at = *now;

    let name = match new_status {
        CertificateStatus::Verified => "certificate.verified",
        CertificateStatus::Rejected => "certificate.rejected",
        CertificateStatus::Pending => "certificate.pending",
    };
    let mut payload = serde_json::json!({
        "certificate_id": certificate.id,
        "professional_id": certificate.professional_id,
        "status": certificate.status.as_str(),
    });
    if let Some(reason) = reason {
        payload["reason"] = serde_json::json!(reason);
    }

    Ok((certificate, Some(OutboundEvent::new(name, payload))))
}

pub fn submit_service(
    conn: &Connection,
    professional_id: &str,
    name: &str,
    now: &NaiveDateTime,
) -> Result<(ServiceOffering, OutboundEvent), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("service name is required".to_string()));
    }
    queries::get_professional(conn, professional_id)?
        .ok_or_else(|| AppError::NotFound(format!("professional {professional_id}")))?;

    let service = ServiceOffering {
        id: uuid::Uuid::new_v4().to_string(),
        professional_id: professional_id.to_string(),
        name: name.trim().to_string(),
        status: ServiceStatus::Pending,
        updated_at: *now,
    };
    queries::create_service(conn, &service)?;

    let event = OutboundEvent::new(
        "service.submitted",
        serde_json::json!({
            "service_id": service.id,
            "professional_id": service.professional_id,
            "name": service.name,
        }),
    );
    Ok((service, event))
}

pub fn set_service_status(
    conn: &Connection,
    id: &str,
    new_status: ServiceStatus,
    reason: Option<&str>,
    actor: &Actor,
    now: &NaiveDateTime,
) -> Result<(ServiceOffering, Option<OutboundEvent>), AppError> {
    if !actor.is_admin() {
        return Err(AppError::Unauthorized);
    }

    let reason = validate_rejection_reason(new_status == ServiceStatus::Rejected, reason)?;

    let mut service =
        queries::get_service(conn, id)?.ok_or_else(|| AppError::NotFound(format!("service {id}")))?;

    if service.status == new_status {
        return Ok((service, None));
    }

    queries::update_service_status(conn, id, new_status, now)?;
    service.status = new_status;
    service.updated_at = *now;

    let name = match new_status {
        ServiceStatus::Approved => "service.approved",
        ServiceStatus::Rejected => "service.rejected",
        ServiceStatus::Pending => "service.pending",
    };
    let mut payload = serde_json::json!({
        "service_id": service.id,
        "professional_id": service.professional_id,
        "status": service.status.as_str(),
    });
    if let Some(reason) = reason {
        payload["reason"] = serde_json::json!(reason);
    }

    Ok((service, Some(OutboundEvent::new(name, payload))))
}

/// Read-only view used for the "fully verified" badge. It never gates
/// professional approval: an admin may approve a professional while
/// documents are still under review.
pub fn verification_summary(
    conn: &Connection,
    professional_id: &str,
) -> Result<VerificationSummary, AppError> {
    queries::get_professional(conn, professional_id)?
        .ok_or_else(|| AppError::NotFound(format!("professional {professional_id}")))?;

    let certificates = queries::list_certificates_for_professional(conn, professional_id)?;
    let services = queries::list_services_for_professional(conn, professional_id)?;

    Ok(VerificationSummary {
        all_certificates_verified: certificates
            .iter()
            .all(|c| c.status == CertificateStatus::Verified),
        all_services_approved: services.iter().all(|s| s.status == ServiceStatus::Approved),
    })
}

/// A rejection must say why; the reason travels verbatim on the event.
/// Validated before any write so a bad request changes nothing.
fn validate_rejection_reason<'a>(
    is_rejection: bool,
    reason: Option<&'a str>,
) -> Result<Option<&'a str>, AppError> {
    if !is_rejection {
        return Ok(None);
    }
    match reason.map(str::trim) {
        Some(r) if !r.is_empty() => Ok(Some(r)),
        _ => Err(AppError::Validation(
            "a rejection reason is required".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::Role;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn admin() -> Actor {
        Actor::admin("admin-1")
    }

    fn register(conn: &Connection) -> Professional {
        let now = dt("2025-06-01 09:00");
        let (pro, _) = register_professional(
            conn,
            "Jess",
            "Jess Inspections",
            "Leeds",
            "+447700900000",
            "jess@example.com",
            &now,
        )
        .unwrap();
        pro
    }

    #[test]
    fn test_registration_starts_pending() {
        let conn = setup_db();
        let pro = register(&conn);
        assert_eq!(pro.status, ProfessionalStatus::Pending);
    }

    #[test]
    fn test_professional_status_requires_admin() {
        let conn = setup_db();
        let pro = register(&conn);
        let now = dt("2025-06-02 09:00");

        let actor = Actor {
            id: "cust-1".to_string(),
            role: Role::Customer,
        };
        let err = set_professional_status(&conn, &pro.id, ProfessionalStatus::Approved, &actor, &now)
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[test]
    fn test_professional_approval_and_reactivation() {
        let conn = setup_db();
        let pro = register(&conn);
        let now = dt("2025-06-02 09:00");

        let (pro2, event) =
            set_professional_status(&conn, &pro.id, ProfessionalStatus::Approved, &admin(), &now)
                .unwrap();
        assert_eq!(pro2.status, ProfessionalStatus::Approved);
        assert_eq!(event.unwrap().name, "professional.approved");

        // suspension, then reactivation from rejected
        set_professional_status(&conn, &pro.id, ProfessionalStatus::Rejected, &admin(), &now)
            .unwrap();
        let (pro3, event) =
            set_professional_status(&conn, &pro.id, ProfessionalStatus::Approved, &admin(), &now)
                .unwrap();
        assert_eq!(pro3.status, ProfessionalStatus::Approved);
        assert_eq!(event.unwrap().name, "professional.approved");
    }

    #[test]
    fn test_repeated_approval_is_noop_success() {
        let conn = setup_db();
        let pro = register(&conn);
        let now = dt("2025-06-02 09:00");

        set_professional_status(&conn, &pro.id, ProfessionalStatus::Approved, &admin(), &now)
            .unwrap();
        let (pro2, event) =
            set_professional_status(&conn, &pro.id, ProfessionalStatus::Approved, &admin(), &now)
                .unwrap();
        assert_eq!(pro2.status, ProfessionalStatus::Approved);
        assert!(event.is_none());
    }

    #[test]
    fn test_certificate_verification_idempotent() {
        let conn = setup_db();
        let pro = register(&conn);
        let now = dt("2025-06-02 09:00");
        let (cert, _) = submit_certificate(&conn, &pro.id, "Gas Safe", "doc://1", &now).unwrap();

        let (c1, e1) =
            set_certificate_status(&conn, &cert.id, CertificateStatus::Verified, None, &admin(), &now)
                .unwrap();
        assert_eq!(c1.status, CertificateStatus::Verified);
        assert!(e1.is_some());

        let (c2, e2) =
            set_certificate_status(&conn, &cert.id, CertificateStatus::Verified, None, &admin(), &now)
                .unwrap();
        assert_eq!(c2.status, CertificateStatus::Verified);
        assert!(e2.is_none());
    }

    #[test]
    fn test_certificate_rejection_carries_reason() {
        let conn = setup_db();
        let pro = register(&conn);
        let now = dt("2025-06-02 09:00");
        let (cert, _) = submit_certificate(&conn, &pro.id, "Gas Safe", "doc://1", &now).unwrap();

        let (_, event) = set_certificate_status(
            &conn,
            &cert.id,
            CertificateStatus::Rejected,
            Some("expired"),
            &admin(),
            &now,
        )
        .unwrap();
        assert_eq!(event.unwrap().payload["reason"], serde_json::json!("expired"));
    }

    #[test]
    fn test_certificate_rejection_without_reason_changes_nothing() {
        let conn = setup_db();
        let pro = register(&conn);
        let now = dt("2025-06-02 09:00");
        let (cert, _) = submit_certificate(&conn, &pro.id, "Gas Safe", "doc://1", &now).unwrap();

        for bad in [None, Some(""), Some("   ")] {
            let err = set_certificate_status(
                &conn,
                &cert.id,
                CertificateStatus::Rejected,
                bad,
                &admin(),
                &now,
            )
            .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }

        let stored = queries::get_certificate(&conn, &cert.id).unwrap().unwrap();
        assert_eq!(stored.status, CertificateStatus::Pending);
    }

    #[test]
    fn test_admin_may_reverse_certificate_rejection() {
        let conn = setup_db();
        let pro = register(&conn);
        let now = dt("2025-06-02 09:00");
        let (cert, _) = submit_certificate(&conn, &pro.id, "Gas Safe", "doc://1", &now).unwrap();

        set_certificate_status(
            &conn,
            &cert.id,
            CertificateStatus::Rejected,
            Some("blurry scan"),
            &admin(),
            &now,
        )
        .unwrap();
        let (cert2, _) =
            set_certificate_status(&conn, &cert.id, CertificateStatus::Verified, None, &admin(), &now)
                .unwrap();
        assert_eq!(cert2.status, CertificateStatus::Verified);
    }

    #[test]
    fn test_service_rejection_requires_reason() {
        let conn = setup_db();
        let pro = register(&conn);
        let now = dt("2025-06-02 09:00");
        let (service, _) = submit_service(&conn, &pro.id, "Gas safety check", &now).unwrap();

        let err =
            set_service_status(&conn, &service.id, ServiceStatus::Rejected, None, &admin(), &now)
                .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let (_, event) = set_service_status(
            &conn,
            &service.id,
            ServiceStatus::Rejected,
            Some("duplicate listing"),
            &admin(),
            &now,
        )
        .unwrap();
        assert_eq!(
            event.unwrap().payload["reason"],
            serde_json::json!("duplicate listing")
        );
    }

    #[test]
    fn test_verification_summary() {
        let conn = setup_db();
        let pro = register(&conn);
        let now = dt("2025-06-02 09:00");

        // no submissions yet: vacuously verified
        let summary = verification_summary(&conn, &pro.id).unwrap();
        assert!(summary.all_certificates_verified);
        assert!(summary.all_services_approved);

        let (c1, _) = submit_certificate(&conn, &pro.id, "Gas Safe", "doc://1", &now).unwrap();
        let (c2, _) = submit_certificate(&conn, &pro.id, "NICEIC", "doc://2", &now).unwrap();
        let (s1, _) = submit_service(&conn, &pro.id, "Gas safety check", &now).unwrap();

        let summary = verification_summary(&conn, &pro.id).unwrap();
        assert!(!summary.all_certificates_verified);
        assert!(!summary.all_services_approved);

        set_certificate_status(&conn, &c1.id, CertificateStatus::Verified, None, &admin(), &now)
            .unwrap();
        set_service_status(&conn, &s1.id, ServiceStatus::Approved, None, &admin(), &now).unwrap();

        // one certificate still pending
        let summary = verification_summary(&conn, &pro.id).unwrap();
        assert!(!summary.all_certificates_verified);
        assert!(summary.all_services_approved);

        set_certificate_status(&conn, &c2.id, CertificateStatus::Verified, None, &admin(), &now)
            .unwrap();
        let summary = verification_summary(&conn, &pro.id).unwrap();
        assert!(summary.all_certificates_verified);
    }

    #[test]
    fn test_summary_for_unknown_professional() {
        let conn = setup_db();
        assert!(matches!(
            verification_summary(&conn, "nope").unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
