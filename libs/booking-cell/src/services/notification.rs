// libs/booking-cell/src/services/notification.rs
use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tokio::time::Duration;
use tracing::{info, warn};

use shared_config::ClinicConfig;

use crate::models::Appointment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Confirmation,
    Reminder,
    Followup,
    Cancellation,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Confirmation => write!(f, "confirmation"),
            NotificationKind::Reminder => write!(f, "reminder"),
            NotificationKind::Followup => write!(f, "followup"),
            NotificationKind::Cancellation => write!(f, "cancellation"),
        }
    }
}

/// Structured payload handed to the dispatcher collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub to: String,
    pub name: String,
    pub phone: Option<String>,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub provider_name: Option<String>,
    pub location: Option<String>,
    pub kind: NotificationKind,
}

impl NotificationPayload {
    pub fn for_appointment(
        appointment: &Appointment,
        kind: NotificationKind,
        config: &ClinicConfig,
    ) -> Self {
        Self {
            to: appointment.patient.email.clone(),
            name: appointment.patient.name.clone(),
            phone: Some(appointment.patient.phone.clone()),
            appointment_date: appointment.date,
            appointment_time: appointment.time,
            provider_name: None,
            location: Some(config.clinic_location.clone()),
            kind,
        }
    }

    pub fn email_subject(&self) -> String {
        let date = self.appointment_date.format("%A, %B %-d, %Y");
        match self.kind {
            NotificationKind::Confirmation => format!("Appointment Confirmed for {}", date),
            NotificationKind::Reminder => format!("Reminder: Upcoming Appointment on {}", date),
            NotificationKind::Followup => "How was your recent visit?".to_string(),
            NotificationKind::Cancellation => format!("Appointment on {} Cancelled", date),
        }
    }

    pub fn sms_message(&self) -> String {
        let provider = self.provider_name.as_deref().unwrap_or("Doctor");
        match self.kind {
            NotificationKind::Confirmation => format!(
                "Appt confirmed: {} on {} at {}. Reply STOP to opt-out.",
                provider, self.appointment_date, self.appointment_time
            ),
            NotificationKind::Reminder => format!(
                "REMINDER: Your appt is at {} on {}. Please arrive 15 mins early.",
                self.appointment_time, self.appointment_date
            ),
            NotificationKind::Followup => {
                "How was your recent visit? We would love your feedback.".to_string()
            }
            NotificationKind::Cancellation => format!(
                "Your appt on {} at {} has been cancelled.",
                self.appointment_date, self.appointment_time
            ),
        }
    }
}

/// Outbound boundary to whatever actually delivers email and SMS.
/// The core treats every dispatch as best-effort.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send_email(&self, payload: &NotificationPayload) -> Result<()>;
    async fn send_sms(&self, destination: &str, message: &str) -> Result<()>;
}

/// Reference dispatcher: simulates gateway latency and logs the
/// delivery instead of sending anything.
pub struct ConsoleDispatcher {
    email_delay_ms: u64,
    sms_delay_ms: u64,
}

impl ConsoleDispatcher {
    pub fn new() -> Self {
        Self {
            email_delay_ms: 1000,
            sms_delay_ms: 500,
        }
    }

    pub fn with_delays(email_delay_ms: u64, sms_delay_ms: u64) -> Self {
        Self {
            email_delay_ms,
            sms_delay_ms,
        }
    }
}

impl Default for ConsoleDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationDispatcher for ConsoleDispatcher {
    async fn send_email(&self, payload: &NotificationPayload) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(self.email_delay_ms)).await;
        info!(
            "Sending {} email to {}: {}",
            payload.kind,
            payload.to,
            payload.email_subject()
        );
        Ok(())
    }

    async fn send_sms(&self, destination: &str, message: &str) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(self.sms_delay_ms)).await;
        info!("Sending SMS to {}: {}", destination, message);
        Ok(())
    }
}

/// Fan a payload out as an email plus, when opted in, an SMS. Dispatch
/// failures are logged and swallowed; they never affect booking state.
pub async fn send_appointment_notification(
    dispatcher: &dyn NotificationDispatcher,
    payload: &NotificationPayload,
    send_sms: bool,
) {
    if let Err(e) = dispatcher.send_email(payload).await {
        warn!(
            "Failed to send {} email to {}: {}",
            payload.kind, payload.to, e
        );
    }

    if send_sms {
        if let Some(phone) = &payload.phone {
            if let Err(e) = dispatcher.send_sms(phone, &payload.sms_message()).await {
                warn!("Failed to send {} SMS to {}: {}", payload.kind, phone, e);
            }
        }
    }
}
