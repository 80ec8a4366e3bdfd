// libs/booking-cell/src/services/workflow.rs
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use tokio::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use availability_cell::services::store::AvailabilityStore;
use shared_config::ClinicConfig;

use crate::models::{Appointment, BookingError, PatientDetails, VisitReason, WorkflowStep};
use crate::services::ledger::BookingLedger;
use crate::services::notification::{
    send_appointment_notification, NotificationDispatcher, NotificationKind, NotificationPayload,
};
use crate::services::scheduler::NotificationScheduler;

/// Shared entry point for the presentation layer: composed slot
/// queries, workflow creation and appointment cancellation. Holds the
/// two shared mutable resources plus the outbound collaborators.
pub struct BookingService {
    pub(crate) availability: Arc<AvailabilityStore>,
    pub(crate) ledger: Arc<BookingLedger>,
    pub(crate) dispatcher: Arc<dyn NotificationDispatcher>,
    pub(crate) scheduler: Arc<NotificationScheduler>,
    pub(crate) config: ClinicConfig,
}

impl BookingService {
    pub fn new(
        availability: Arc<AvailabilityStore>,
        ledger: Arc<BookingLedger>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: ClinicConfig,
    ) -> Self {
        Self {
            availability,
            ledger,
            dispatcher,
            scheduler: Arc::new(NotificationScheduler::new()),
            config,
        }
    }

    pub fn availability(&self) -> &Arc<AvailabilityStore> {
        &self.availability
    }

    pub fn ledger(&self) -> &Arc<BookingLedger> {
        &self.ledger
    }

    pub fn scheduler(&self) -> &Arc<NotificationScheduler> {
        &self.scheduler
    }

    /// Bookable slots for a provider on a date: the generated
    /// schedule minus already-taken slots.
    pub async fn available_slots(
        &self,
        provider_id: &str,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Vec<NaiveTime> {
        let record = self.availability.get_or_create(provider_id).await;
        self.ledger.available_slots(&record, date, now).await
    }

    /// Begin a fresh booking wizard for one appointment attempt.
    pub fn start_workflow(self: &Arc<Self>, provider_id: &str) -> BookingWorkflow {
        BookingWorkflow::new(Arc::clone(self), provider_id)
    }

    /// Cancel a booked appointment: transition the ledger entry, then
    /// abort any pending reminder/follow-up and send a best-effort
    /// cancellation notice. Idempotent like the ledger itself.
    pub async fn cancel_appointment(&self, appointment_id: Uuid) -> bool {
        if !self.ledger.cancel(appointment_id).await {
            return false;
        }

        let cancelled = self.scheduler.cancel_for(appointment_id).await;
        debug!(
            "Cancelled {} pending notifications while cancelling appointment {}",
            cancelled, appointment_id
        );

        if let Some(appointment) = self.ledger.get(appointment_id).await {
            let payload = NotificationPayload::for_appointment(
                &appointment,
                NotificationKind::Cancellation,
                &self.config,
            );
            send_appointment_notification(
                self.dispatcher.as_ref(),
                &payload,
                appointment.sms_opt_in,
            )
            .await;
        }

        info!("Appointment {} cancelled", appointment_id);
        true
    }
}

/// The multi-step booking wizard. One instance per booking attempt;
/// after `Completed`, `reset` (or a fresh instance) is required to
/// book again.
///
/// Steps move strictly forward
/// (SelectingSlot -> EnteringDetails -> Confirming -> Completed) with
/// one-step back-transitions; every forward transition validates its
/// own inputs before advancing.
pub struct BookingWorkflow {
    service: Arc<BookingService>,
    provider_id: String,
    step: WorkflowStep,
    selected_date: Option<NaiveDate>,
    selected_time: Option<NaiveTime>,
    details: Option<PatientDetails>,
    reason: Option<VisitReason>,
    send_sms: bool,
    submitting: bool,
}

impl BookingWorkflow {
    fn new(service: Arc<BookingService>, provider_id: &str) -> Self {
        Self {
            service,
            provider_id: provider_id.to_string(),
            step: WorkflowStep::SelectingSlot,
            selected_date: None,
            selected_time: None,
            details: None,
            reason: None,
            send_sms: true,
            submitting: false,
        }
    }

    pub fn step(&self) -> WorkflowStep {
        self.step
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn selected_date(&self) -> Option<NaiveDate> {
        self.selected_date
    }

    pub fn selected_time(&self) -> Option<NaiveTime> {
        self.selected_time
    }

    /// Slots the patient can currently pick for this provider.
    pub async fn available_slots(&self, date: NaiveDate, now: DateTime<Utc>) -> Vec<NaiveTime> {
        self.service
            .available_slots(&self.provider_id, date, now)
            .await
    }

    /// SelectingSlot -> EnteringDetails. Both a date and a time are
    /// required and the time must still be available; otherwise the
    /// workflow stays in SelectingSlot with a field-level error.
    pub async fn select_slot(
        &mut self,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        self.require_step(WorkflowStep::SelectingSlot)?;

        let date = date.ok_or(BookingError::Validation {
            field: "date",
            message: "Please select a date for your appointment".to_string(),
        })?;
        let time = time.ok_or(BookingError::Validation {
            field: "time",
            message: "Please select a time for your appointment".to_string(),
        })?;

        let open = self.available_slots(date, now).await;
        if !open.contains(&time) {
            return Err(BookingError::Validation {
                field: "time",
                message: format!("{} on {} is not available", time, date),
            });
        }

        self.selected_date = Some(date);
        self.selected_time = Some(time);
        self.step = WorkflowStep::EnteringDetails;
        debug!(
            "Workflow for provider {} selected {} at {}",
            self.provider_id, date, time
        );
        Ok(())
    }

    /// EnteringDetails -> Confirming. Validates contact details and
    /// the visit reason field-by-field.
    pub fn enter_details(
        &mut self,
        details: PatientDetails,
        reason: Option<VisitReason>,
        send_sms: bool,
    ) -> Result<(), BookingError> {
        self.require_step(WorkflowStep::EnteringDetails)?;

        details.validate()?;
        let reason = reason.ok_or(BookingError::Validation {
            field: "reason",
            message: "Please select a reason for your visit".to_string(),
        })?;

        self.details = Some(details);
        self.reason = Some(reason);
        self.send_sms = send_sms;
        self.step = WorkflowStep::Confirming;
        Ok(())
    }

    /// One step backwards, keeping the data entered so far.
    pub fn back(&mut self) {
        self.step = match self.step {
            WorkflowStep::EnteringDetails => WorkflowStep::SelectingSlot,
            WorkflowStep::Confirming => WorkflowStep::EnteringDetails,
            other => other,
        };
    }

    /// Confirming -> Completed: the final commit. On a slot conflict
    /// the workflow returns to SelectingSlot with the selection
    /// cleared so the patient picks again from a refreshed list.
    pub async fn confirm(&mut self, now: DateTime<Utc>) -> Result<Appointment, BookingError> {
        self.require_step(WorkflowStep::Confirming)?;
        if self.submitting {
            return Err(BookingError::SubmissionInProgress);
        }

        self.submitting = true;
        let result = self.commit(now).await;
        self.submitting = false;
        result
    }

    /// Clear everything back to SelectingSlot for another booking.
    pub fn reset(&mut self) {
        self.step = WorkflowStep::SelectingSlot;
        self.selected_date = None;
        self.selected_time = None;
        self.details = None;
        self.reason = None;
        self.send_sms = true;
        self.submitting = false;
    }

    async fn commit(&mut self, now: DateTime<Utc>) -> Result<Appointment, BookingError> {
        // Gating guarantees these are present by the Confirming step.
        let date = self.selected_date.ok_or(BookingError::Validation {
            field: "date",
            message: "Please select a date for your appointment".to_string(),
        })?;
        let time = self.selected_time.ok_or(BookingError::Validation {
            field: "time",
            message: "Please select a time for your appointment".to_string(),
        })?;
        let details = self.details.clone().ok_or(BookingError::Validation {
            field: "name",
            message: "Please enter your contact details".to_string(),
        })?;
        let reason = self.reason.ok_or(BookingError::Validation {
            field: "reason",
            message: "Please select a reason for your visit".to_string(),
        })?;

        // Simulated gateway latency before the commit lands.
        let delay = self.service.config.booking_confirm_delay_ms;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let appointment = match self
            .service
            .ledger
            .create(&self.provider_id, details, date, time, reason, self.send_sms)
            .await
        {
            Ok(appointment) => appointment,
            Err(BookingError::SlotConflict) => {
                warn!(
                    "Slot {} at {} was taken while confirming; returning to selection",
                    date, time
                );
                self.selected_time = None;
                self.step = WorkflowStep::SelectingSlot;
                return Err(BookingError::SlotConflict);
            }
            Err(other) => return Err(other),
        };

        self.step = WorkflowStep::Completed;
        info!(
            "Workflow completed: appointment {} for provider {}",
            appointment.id, self.provider_id
        );

        let confirmation = NotificationPayload::for_appointment(
            &appointment,
            NotificationKind::Confirmation,
            &self.service.config,
        );
        send_appointment_notification(
            self.service.dispatcher.as_ref(),
            &confirmation,
            self.send_sms,
        )
        .await;

        self.schedule_deferred(&appointment, NotificationKind::Reminder, now)
            .await;
        self.schedule_deferred(&appointment, NotificationKind::Followup, now)
            .await;

        Ok(appointment)
    }

    /// Queue the reminder (24h before by default) or follow-up (24h
    /// after) through the cancellable scheduler. Past-due trigger
    /// times are skipped.
    async fn schedule_deferred(
        &self,
        appointment: &Appointment,
        kind: NotificationKind,
        now: DateTime<Utc>,
    ) {
        let starts_at = appointment.starts_at();
        let fire_at = match kind {
            NotificationKind::Reminder => {
                starts_at - ChronoDuration::hours(self.service.config.reminder_lead_hours)
            }
            NotificationKind::Followup => {
                starts_at + ChronoDuration::hours(self.service.config.followup_delay_hours)
            }
            _ => return,
        };

        let payload = NotificationPayload::for_appointment(appointment, kind, &self.service.config);
        let dispatcher = Arc::clone(&self.service.dispatcher);
        let send_sms = self.send_sms;

        self.service
            .scheduler
            .schedule(appointment.id, fire_at, now, async move {
                send_appointment_notification(dispatcher.as_ref(), &payload, send_sms).await;
            })
            .await;
    }

    fn require_step(&self, expected: WorkflowStep) -> Result<(), BookingError> {
        if self.step != expected {
            return Err(BookingError::InvalidStep(self.step));
        }
        Ok(())
    }
}
