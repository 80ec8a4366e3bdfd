// libs/booking-cell/src/models.rs
use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Compiled once; the pattern is a constant.
fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap())
}

// ==============================================================================
// CORE BOOKING MODELS
// ==============================================================================

/// One booked visit. Appointments are appended to the ledger at
/// creation and only ever mutated through status transitions; they
/// are never physically deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub provider_id: String,
    pub patient: PatientDetails,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub reason: VisitReason,
    /// Whether the patient opted in to SMS at booking time. Honored
    /// by every later notification about this appointment.
    pub sms_opt_in: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// The scheduled start as an absolute instant.
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.date.and_time(self.time).and_utc()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitReason {
    GeneralConsultation,
    FollowUpVisit,
    Emergency,
    LabTest,
    Other,
}

impl fmt::Display for VisitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisitReason::GeneralConsultation => write!(f, "general consultation"),
            VisitReason::FollowUpVisit => write!(f, "follow-up visit"),
            VisitReason::Emergency => write!(f, "emergency"),
            VisitReason::LabTest => write!(f, "lab test"),
            VisitReason::Other => write!(f, "other"),
        }
    }
}

/// Contact details collected by the booking wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl PatientDetails {
    pub fn new(name: &str, email: &str, phone: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            phone: phone.trim().to_string(),
        }
    }

    /// Field-level validation of the details step: non-empty name and
    /// phone, syntactically plausible email.
    pub fn validate(&self) -> Result<(), BookingError> {
        if self.name.is_empty() {
            return Err(BookingError::Validation {
                field: "name",
                message: "Name is required".to_string(),
            });
        }

        if !email_regex().is_match(&self.email) || self.email.len() > 254 {
            return Err(BookingError::Validation {
                field: "email",
                message: "A valid email address is required".to_string(),
            });
        }

        if self.phone.is_empty() {
            return Err(BookingError::Validation {
                field: "phone",
                message: "Phone number is required".to_string(),
            });
        }

        Ok(())
    }
}

// ==============================================================================
// WORKFLOW MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStep {
    SelectingSlot,
    EnteringDetails,
    Confirming,
    Completed,
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStep::SelectingSlot => write!(f, "selecting_slot"),
            WorkflowStep::EnteringDetails => write!(f, "entering_details"),
            WorkflowStep::Confirming => write!(f, "confirming"),
            WorkflowStep::Completed => write!(f, "completed"),
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    /// A required wizard field is missing or malformed. Surfaced to
    /// the caller as a field-level message, never logged as a system
    /// error.
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// Another booking holds the same provider/date/time tuple.
    #[error("The selected slot is no longer available")]
    SlotConflict,

    /// A commit for this workflow instance is already in flight.
    #[error("Booking submission already in progress")]
    SubmissionInProgress,

    /// A forward transition was requested from the wrong step.
    #[error("Operation not permitted in workflow step {0}")]
    InvalidStep(WorkflowStep),
}
