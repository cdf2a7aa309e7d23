use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A specific offering registered by one professional. Customers can
/// only book it while it is approved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceOffering {
    pub id: String,
    pub professional_id: String,
    pub name: String,
    pub status: ServiceStatus,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Pending,
    Approved,
    Rejected,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Pending => "pending",
            ServiceStatus::Approved => "approved",
            ServiceStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "approved" => ServiceStatus::Approved,
            "rejected" => ServiceStatus::Rejected,
            _ => ServiceStatus::Pending,
        }
    }
}
