// libs/availability-cell/src/services/store.rs
use std::collections::HashMap;

use anyhow::Result;
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use shared_storage::SnapshotStore;

use crate::models::{
    day_index, AvailabilityError, AvailabilityRecord, DateException, TimeWindow,
};

const SNAPSHOT_KEY: &str = "provider_availabilities";

/// Serialized form of the whole store, for the persistence port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilitySnapshot {
    pub providers: Vec<AvailabilityRecord>,
}

/// Owns every provider's `AvailabilityRecord` for the process
/// lifetime. Unknown providers are synthesized with defaults on first
/// reference; records are never deleted. All mutations are visible to
/// the next read as soon as the call returns.
#[derive(Default)]
pub struct AvailabilityStore {
    records: RwLock<HashMap<String, AvailabilityRecord>>,
}

impl AvailabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the provider's record, creating the default schedule
    /// (Mon-Fri 09:00-17:00, weekends off, 30-minute slots) if the
    /// provider has never been seen. Never fails.
    pub async fn get_or_create(&self, provider_id: &str) -> AvailabilityRecord {
        let mut records = self.records.write().await;
        records
            .entry(provider_id.to_string())
            .or_insert_with(|| {
                info!("Seeding default availability for provider {}", provider_id);
                AvailabilityRecord::default_for(provider_id)
            })
            .clone()
    }

    /// Toggle a weekday on or off. Turning a day on seeds it with the
    /// default 09:00-17:00 window if it has none; turning it off
    /// clears its windows.
    pub async fn set_working_day(&self, provider_id: &str, weekday: Weekday, is_working: bool) {
        debug!(
            "Setting {} working={} for provider {}",
            weekday, is_working, provider_id
        );

        self.with_record(provider_id, |record| {
            let day = &mut record.weekly_schedule[day_index(weekday)];
            day.is_working = is_working;
            if is_working {
                if day.windows.is_empty() {
                    day.windows.push(TimeWindow::default_working_hours());
                }
            } else {
                day.windows.clear();
            }
        })
        .await;
    }

    pub async fn add_window(
        &self,
        provider_id: &str,
        weekday: Weekday,
        window: TimeWindow,
    ) -> Result<(), AvailabilityError> {
        let window = TimeWindow::new(window.start, window.end)?;

        self.with_record(provider_id, |record| {
            record.weekly_schedule[day_index(weekday)].windows.push(window);
        })
        .await;

        debug!(
            "Added window {}-{} on {} for provider {}",
            window.start, window.end, weekday, provider_id
        );
        Ok(())
    }

    pub async fn update_window(
        &self,
        provider_id: &str,
        weekday: Weekday,
        index: usize,
        window: TimeWindow,
    ) -> Result<(), AvailabilityError> {
        let window = TimeWindow::new(window.start, window.end)?;

        self.with_record(provider_id, |record| {
            let windows = &mut record.weekly_schedule[day_index(weekday)].windows;
            match windows.get_mut(index) {
                Some(slot) => {
                    *slot = window;
                    Ok(())
                }
                None => Err(AvailabilityError::WindowNotFound { weekday, index }),
            }
        })
        .await
    }

    pub async fn remove_window(
        &self,
        provider_id: &str,
        weekday: Weekday,
        index: usize,
    ) -> Result<(), AvailabilityError> {
        self.with_record(provider_id, |record| {
            let windows = &mut record.weekly_schedule[day_index(weekday)].windows;
            if index >= windows.len() {
                return Err(AvailabilityError::WindowNotFound { weekday, index });
            }
            windows.remove(index);
            Ok(())
        })
        .await
    }

    /// Mark a calendar date fully unavailable (vacation, sick day).
    pub async fn mark_date_unavailable(
        &self,
        provider_id: &str,
        date: NaiveDate,
        reason: Option<String>,
    ) -> Result<(), AvailabilityError> {
        let result = self
            .with_record(provider_id, |record| {
                if record.is_exception_date(date) {
                    return Err(AvailabilityError::DuplicateException(date));
                }
                record.exception_dates.push(DateException { date, reason });
                Ok(())
            })
            .await;

        if result.is_ok() {
            info!("Provider {} marked {} unavailable", provider_id, date);
        }
        result
    }

    /// No-op if the date was never marked unavailable.
    pub async fn clear_date_unavailable(&self, provider_id: &str, date: NaiveDate) {
        self.with_record(provider_id, |record| {
            record.exception_dates.retain(|entry| entry.date != date);
        })
        .await;
        debug!("Provider {} cleared exception for {}", provider_id, date);
    }

    pub async fn set_slot_duration(
        &self,
        provider_id: &str,
        minutes: i64,
    ) -> Result<(), AvailabilityError> {
        if minutes <= 0 {
            return Err(AvailabilityError::InvalidSlotDuration(minutes));
        }

        self.with_record(provider_id, |record| {
            record.slot_duration_minutes = minutes;
        })
        .await;
        Ok(())
    }

    pub async fn snapshot(&self) -> AvailabilitySnapshot {
        let records = self.records.read().await;
        let mut providers: Vec<AvailabilityRecord> = records.values().cloned().collect();
        providers.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));
        AvailabilitySnapshot { providers }
    }

    pub async fn restore(&self, snapshot: AvailabilitySnapshot) {
        let mut records = self.records.write().await;
        records.clear();
        for record in snapshot.providers {
            records.insert(record.provider_id.clone(), record);
        }
        info!("Restored availability for {} providers", records.len());
    }

    /// Write the current state through the persistence port.
    pub async fn persist(&self, store: &dyn SnapshotStore) -> Result<()> {
        let snapshot = self.snapshot().await;
        store
            .save(SNAPSHOT_KEY, serde_json::to_value(&snapshot)?)
            .await
    }

    /// Replace the current state from the persistence port, if a
    /// snapshot has been saved before.
    pub async fn hydrate(&self, store: &dyn SnapshotStore) -> Result<()> {
        if let Some(document) = store.load(SNAPSHOT_KEY).await? {
            let snapshot: AvailabilitySnapshot = serde_json::from_value(document)?;
            self.restore(snapshot).await;
        }
        Ok(())
    }

    async fn with_record<R>(
        &self,
        provider_id: &str,
        mutate: impl FnOnce(&mut AvailabilityRecord) -> R,
    ) -> R {
        let mut records = self.records.write().await;
        let record = records
            .entry(provider_id.to_string())
            .or_insert_with(|| AvailabilityRecord::default_for(provider_id));
        mutate(record)
    }
}
