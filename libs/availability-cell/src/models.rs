// libs/availability-cell/src/models.rs
use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

pub const DAYS_PER_WEEK: usize = 7;

/// Map a weekday onto the schedule array (0 = Sunday, 6 = Saturday).
pub fn day_index(weekday: Weekday) -> usize {
    match weekday {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

/// A contiguous start-end interval of provider-local wall-clock time
/// during which appointments are accepted. Must satisfy start < end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, AvailabilityError> {
        if start >= end {
            return Err(AvailabilityError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Default 9-to-5 window seeded onto newly working days.
    pub fn default_working_hours() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub is_working: bool,
    pub windows: Vec<TimeWindow>,
}

impl DaySchedule {
    pub fn working_default() -> Self {
        Self {
            is_working: true,
            windows: vec![TimeWindow::default_working_hours()],
        }
    }

    pub fn off() -> Self {
        Self {
            is_working: false,
            windows: Vec::new(),
        }
    }
}

/// A calendar date on which the provider is fully unavailable
/// regardless of the recurring weekly schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateException {
    pub date: NaiveDate,
    pub reason: Option<String>,
}

/// Per-provider recurring schedule plus exception dates.
///
/// Owned exclusively by the `AvailabilityStore` for the process
/// lifetime; consumers get clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    pub provider_id: String,
    /// Indexed Sunday = 0 through Saturday = 6.
    pub weekly_schedule: [DaySchedule; DAYS_PER_WEEK],
    pub exception_dates: Vec<DateException>,
    pub slot_duration_minutes: i64,
}

impl AvailabilityRecord {
    pub const DEFAULT_SLOT_DURATION_MINUTES: i64 = 30;

    /// Default record for a provider seen for the first time:
    /// Mon-Fri 09:00-17:00, weekends off, 30-minute slots.
    pub fn default_for(provider_id: &str) -> Self {
        let weekly_schedule = std::array::from_fn(|index| {
            // Sunday (0) and Saturday (6) are off by default.
            if index == 0 || index == 6 {
                DaySchedule::off()
            } else {
                DaySchedule::working_default()
            }
        });

        Self {
            provider_id: provider_id.to_string(),
            weekly_schedule,
            exception_dates: Vec::new(),
            slot_duration_minutes: Self::DEFAULT_SLOT_DURATION_MINUTES,
        }
    }

    pub fn schedule_for(&self, weekday: Weekday) -> &DaySchedule {
        &self.weekly_schedule[day_index(weekday)]
    }

    pub fn is_exception_date(&self, date: NaiveDate) -> bool {
        self.exception_dates.iter().any(|entry| entry.date == date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AvailabilityError {
    #[error("Window start {start} must be before end {end}")]
    InvalidWindow { start: NaiveTime, end: NaiveTime },

    #[error("Date {0} is already marked unavailable")]
    DuplicateException(NaiveDate),

    #[error("No window at index {index} on {weekday}")]
    WindowNotFound { weekday: Weekday, index: usize },

    #[error("Slot duration must be positive, got {0}")]
    InvalidSlotDuration(i64),
}
