use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    /// Human-readable reference code, unique and immutable once assigned.
    pub reference: String,
    pub service_id: String,
    pub customer_id: String,
    pub professional_id: String,
    pub scheduled_at: NaiveDateTime,
    pub address: String,
    pub price: f64,
    pub status: BookingStatus,
    pub has_report: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    /// Customer-facing "upcoming" view: still active and not yet due.
    /// Derived on read; the stored status stays granular so operators
    /// can tell pending from confirmed.
    pub fn is_upcoming(&self, now: NaiveDateTime) -> bool {
        self.status.is_active() && self.scheduled_at > now
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => BookingStatus::Confirmed,
            "completed" => BookingStatus::Completed,
            "cancelled" => BookingStatus::Cancelled,
            _ => BookingStatus::Pending,
        }
    }

    /// Pending and confirmed bookings still hold their slot.
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    /// Completed and cancelled are terminal; no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}
