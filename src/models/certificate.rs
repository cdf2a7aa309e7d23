use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Evidence of competency uploaded by a professional. The evidence
/// reference is an opaque pointer into whatever document store the
/// platform uses; this core never dereferences it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub id: String,
    pub professional_id: String,
    pub name: String,
    pub evidence_ref: String,
    pub status: CertificateStatus,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    Pending,
    Verified,
    Rejected,
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::Pending => "pending",
            CertificateStatus::Verified => "verified",
            CertificateStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "verified" => CertificateStatus::Verified,
            "rejected" => CertificateStatus::Rejected,
            _ => CertificateStatus::Pending,
        }
    }
}
