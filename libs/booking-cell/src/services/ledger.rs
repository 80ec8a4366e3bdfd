// libs/booking-cell/src/services/ledger.rs
use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use availability_cell::models::AvailabilityRecord;
use availability_cell::services::generate_slots;
use shared_storage::SnapshotStore;

use crate::models::{Appointment, AppointmentStatus, BookingError, PatientDetails, VisitReason};

const SNAPSHOT_KEY: &str = "appointments";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub appointments: Vec<Appointment>,
}

/// Append-only, creation-ordered record of appointments. The ledger
/// exclusively owns the appointment list for the process lifetime;
/// everything else sees clones.
#[derive(Default)]
pub struct BookingLedger {
    appointments: RwLock<Vec<Appointment>>,
}

impl BookingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Book a slot. The conflict check and the append happen under
    /// one write lock, so two racing calls for the same
    /// (provider, date, time) tuple resolve to exactly one success
    /// and one `SlotConflict`.
    pub async fn create(
        &self,
        provider_id: &str,
        patient: PatientDetails,
        date: NaiveDate,
        time: NaiveTime,
        reason: VisitReason,
        sms_opt_in: bool,
    ) -> Result<Appointment, BookingError> {
        let mut appointments = self.appointments.write().await;

        let taken = appointments.iter().any(|a| {
            a.provider_id == provider_id
                && a.date == date
                && a.time == time
                && a.status == AppointmentStatus::Scheduled
        });
        if taken {
            warn!(
                "Slot conflict for provider {} on {} at {}",
                provider_id, date, time
            );
            return Err(BookingError::SlotConflict);
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            provider_id: provider_id.to_string(),
            patient,
            date,
            time,
            status: AppointmentStatus::Scheduled,
            reason,
            sms_opt_in,
            created_at: now,
            updated_at: now,
        };

        info!(
            "Appointment {} booked with provider {} on {} at {}",
            appointment.id, provider_id, date, time
        );
        appointments.push(appointment.clone());
        Ok(appointment)
    }

    /// Transition a scheduled appointment to cancelled. Idempotent:
    /// unknown ids and already-settled appointments return false.
    pub async fn cancel(&self, appointment_id: Uuid) -> bool {
        self.transition(appointment_id, AppointmentStatus::Cancelled)
            .await
    }

    pub async fn complete(&self, appointment_id: Uuid) -> bool {
        self.transition(appointment_id, AppointmentStatus::Completed)
            .await
    }

    pub async fn mark_no_show(&self, appointment_id: Uuid) -> bool {
        self.transition(appointment_id, AppointmentStatus::NoShow)
            .await
    }

    /// The slot start times already held by scheduled appointments on
    /// a provider's date. Cancelled, completed and no-show entries do
    /// not block a slot.
    pub async fn booked_slots(&self, provider_id: &str, date: NaiveDate) -> HashSet<NaiveTime> {
        self.appointments
            .read()
            .await
            .iter()
            .filter(|a| {
                a.provider_id == provider_id
                    && a.date == date
                    && a.status == AppointmentStatus::Scheduled
            })
            .map(|a| a.time)
            .collect()
    }

    /// The externally visible "get available slots" query: generated
    /// slots minus booked ones, computed against a single consistent
    /// read of the ledger.
    pub async fn available_slots(
        &self,
        record: &AvailabilityRecord,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Vec<NaiveTime> {
        let booked = self.booked_slots(&record.provider_id, date).await;
        generate_slots(record, date, now)
            .into_iter()
            .filter(|slot| !booked.contains(slot))
            .collect()
    }

    pub async fn get(&self, appointment_id: Uuid) -> Option<Appointment> {
        self.appointments
            .read()
            .await
            .iter()
            .find(|a| a.id == appointment_id)
            .cloned()
    }

    pub async fn list_by_provider(&self, provider_id: &str) -> Vec<Appointment> {
        self.appointments
            .read()
            .await
            .iter()
            .filter(|a| a.provider_id == provider_id)
            .cloned()
            .collect()
    }

    pub async fn list_by_patient(&self, patient_email: &str) -> Vec<Appointment> {
        self.appointments
            .read()
            .await
            .iter()
            .filter(|a| a.patient.email == patient_email)
            .cloned()
            .collect()
    }

    pub async fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            appointments: self.appointments.read().await.clone(),
        }
    }

    pub async fn restore(&self, snapshot: LedgerSnapshot) {
        let mut appointments = self.appointments.write().await;
        *appointments = snapshot.appointments;
        info!("Restored {} appointments", appointments.len());
    }

    pub async fn persist(&self, store: &dyn SnapshotStore) -> Result<()> {
        let snapshot = self.snapshot().await;
        store
            .save(SNAPSHOT_KEY, serde_json::to_value(&snapshot)?)
            .await
    }

    pub async fn hydrate(&self, store: &dyn SnapshotStore) -> Result<()> {
        if let Some(document) = store.load(SNAPSHOT_KEY).await? {
            let snapshot: LedgerSnapshot = serde_json::from_value(document)?;
            self.restore(snapshot).await;
        }
        Ok(())
    }

    async fn transition(&self, appointment_id: Uuid, to: AppointmentStatus) -> bool {
        let mut appointments = self.appointments.write().await;
        match appointments.iter_mut().find(|a| a.id == appointment_id) {
            Some(appointment) if appointment.status == AppointmentStatus::Scheduled => {
                appointment.status = to;
                appointment.updated_at = Utc::now();
                info!("Appointment {} transitioned to {}", appointment_id, to);
                true
            }
            Some(appointment) => {
                debug!(
                    "Ignoring {} transition for appointment {} in status {}",
                    to, appointment_id, appointment.status
                );
                false
            }
            None => {
                debug!("Unknown appointment {}", appointment_id);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    fn patient() -> PatientDetails {
        PatientDetails::new("Asha Rao", "asha@example.com", "+91 98450 00000")
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn double_booking_the_same_slot_is_rejected() {
        let ledger = BookingLedger::new();
        ledger
            .create("doc-1", patient(), date(), t(10, 0), VisitReason::GeneralConsultation, true)
            .await
            .unwrap();

        let second = ledger
            .create("doc-1", patient(), date(), t(10, 0), VisitReason::Emergency, true)
            .await;
        assert_matches!(second, Err(BookingError::SlotConflict));

        let scheduled: Vec<_> = ledger
            .list_by_provider("doc-1")
            .await
            .into_iter()
            .filter(|a| a.status == AppointmentStatus::Scheduled)
            .collect();
        assert_eq!(scheduled.len(), 1);
    }

    #[tokio::test]
    async fn cancelled_appointments_do_not_block_the_slot() {
        let ledger = BookingLedger::new();
        let appointment = ledger
            .create("doc-1", patient(), date(), t(10, 0), VisitReason::LabTest, true)
            .await
            .unwrap();

        assert!(ledger.cancel(appointment.id).await);
        assert!(ledger.booked_slots("doc-1", date()).await.is_empty());

        // Rebooking the freed slot succeeds.
        ledger
            .create("doc-1", patient(), date(), t(10, 0), VisitReason::LabTest, true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancel_is_idempotent_for_unknown_and_settled_ids() {
        let ledger = BookingLedger::new();
        assert!(!ledger.cancel(Uuid::new_v4()).await);

        let appointment = ledger
            .create("doc-1", patient(), date(), t(9, 30), VisitReason::Other, true)
            .await
            .unwrap();
        assert!(ledger.cancel(appointment.id).await);
        assert!(!ledger.cancel(appointment.id).await);
    }

    #[tokio::test]
    async fn completed_appointments_are_terminal() {
        let ledger = BookingLedger::new();
        let appointment = ledger
            .create("doc-1", patient(), date(), t(11, 0), VisitReason::FollowUpVisit, true)
            .await
            .unwrap();

        assert!(ledger.complete(appointment.id).await);
        assert!(!ledger.mark_no_show(appointment.id).await);

        let stored = ledger.get(appointment.id).await.unwrap();
        assert_eq!(stored.status, AppointmentStatus::Completed);
        assert!(stored.updated_at >= stored.created_at);
    }

    #[tokio::test]
    async fn read_views_filter_by_provider_and_patient() {
        let ledger = BookingLedger::new();
        ledger
            .create("doc-1", patient(), date(), t(9, 0), VisitReason::GeneralConsultation, true)
            .await
            .unwrap();
        let other = PatientDetails::new("Ravi Kumar", "ravi@example.com", "+91 98450 11111");
        ledger
            .create("doc-2", other, date(), t(9, 0), VisitReason::GeneralConsultation, true)
            .await
            .unwrap();

        assert_eq!(ledger.list_by_provider("doc-1").await.len(), 1);
        assert_eq!(ledger.list_by_patient("ravi@example.com").await.len(), 1);
        assert!(ledger.list_by_patient("nobody@example.com").await.is_empty());
    }

    #[tokio::test]
    async fn snapshot_restore_round_trips() {
        let ledger = BookingLedger::new();
        let appointment = ledger
            .create("doc-1", patient(), date(), t(9, 0), VisitReason::GeneralConsultation, true)
            .await
            .unwrap();

        let snapshot = ledger.snapshot().await;
        let restored = BookingLedger::new();
        restored.restore(snapshot).await;

        assert!(restored.get(appointment.id).await.is_some());
        assert_eq!(
            restored.booked_slots("doc-1", date()).await.len(),
            1
        );
    }
}
