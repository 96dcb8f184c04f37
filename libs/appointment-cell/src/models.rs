// libs/appointment-cell/src/models.rs
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==============================================================================
// SLOT LEDGER
// ==============================================================================

/// Per-doctor reservation ledger: calendar date label to the time labels
/// already booked on that date. Both sides stay plain strings; the ledger
/// never interprets them. Invariant: no duplicate time label under one date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotLedger(pub BTreeMap<String, Vec<String>>);

impl SlotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_reserved(&self, date: &str, time: &str) -> bool {
        self.0
            .get(date)
            .map(|times| times.iter().any(|t| t == time))
            .unwrap_or(false)
    }

    /// In-memory mirror of the store-side conditional reserve.
    pub fn reserve(&mut self, date: &str, time: &str) -> Result<(), BookingError> {
        let times = self.0.entry(date.to_string()).or_default();
        if times.iter().any(|t| t == time) {
            return Err(BookingError::SlotUnavailable);
        }
        times.push(time.to_string());
        Ok(())
    }

    /// Idempotent: a missing date or time label is a silent no-op.
    pub fn release(&mut self, date: &str, time: &str) {
        if let Some(times) = self.0.get_mut(date) {
            times.retain(|t| t != time);
            if times.is_empty() {
                self.0.remove(date);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ==============================================================================
// CORE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub specialty: String,
    pub degree: String,
    pub experience: String,
    pub about: String,
    pub fees: i64,
    pub address: serde_json::Value,
    pub image: String,
    pub available: bool,
    #[serde(default)]
    pub slots_booked: SlotLedger,
}

impl Doctor {
    /// Profile snapshot frozen onto an appointment at booking time. The
    /// ledger is excluded so nested documents cannot grow without bound.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "_id": self.id,
            "name": self.name,
            "email": self.email,
            "specialty": self.specialty,
            "degree": self.degree,
            "experience": self.experience,
            "about": self.about,
            "fees": self.fees,
            "address": self.address,
            "image": self.image,
        })
    }
}

/// Lifecycle status as a single tagged value. The flags-as-booleans shape
/// this replaces allowed contradictory states (cancelled + completed);
/// payment remains an orthogonal attribute because payment is deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Booked,
    Cancelled,
    Completed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Booked => write!(f, "booked"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub doc_id: String,
    pub slot_date: String,
    pub slot_time: String,
    pub amount: i64,
    pub user_data: serde_json::Value,
    pub doc_data: serde_json::Value,
    pub status: AppointmentStatus,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Whether this appointment currently holds its ledger slot.
    pub fn holds_slot(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }

    /// Earnings rule: a visit counts once it is completed OR paid. A
    /// completed-but-unpaid visit still counts toward earnings.
    pub fn counts_toward_earnings(&self) -> bool {
        self.status == AppointmentStatus::Completed || self.paid
    }
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doc_id: String,
    pub slot_date: String,
    pub slot_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentIdRequest {
    pub appointment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub appointment_id: String,
    pub slot_date: String,
    pub slot_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorDashboard {
    pub appointments: i64,
    pub patients: i64,
    pub earnings: i64,
    pub latest_appointments: Vec<Appointment>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum BookingError {
    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Doctor not available")]
    DoctorNotAvailable,

    #[error("User not found")]
    UserNotFound,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Slot not available!")]
    SlotUnavailable,

    #[error("Not authorized to modify this appointment")]
    Unauthorized,

    #[error("Appointment cannot change state from {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Database error: {0}")]
    Database(String),
}
