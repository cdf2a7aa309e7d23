use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Professional {
    pub id: String,
    pub display_name: String,
    pub business_name: String,
    pub location: String,
    pub phone: String,
    pub email: String,
    pub status: ProfessionalStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Whether operators show `rejected` as "suspended" (reached from
/// approved) or "rejected" (fresh applicant) is a presentation concern;
/// the stored machine only knows these three states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ProfessionalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ProfessionalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfessionalStatus::Pending => "pending",
            ProfessionalStatus::Approved => "approved",
            ProfessionalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "approved" => ProfessionalStatus::Approved,
            "rejected" => ProfessionalStatus::Rejected,
            _ => ProfessionalStatus::Pending,
        }
    }
}
