// libs/availability-cell/src/services/slots.rs
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use tracing::{debug, warn};

use crate::models::{day_index, AvailabilityRecord};

/// Calculate the bookable slot start times for a provider on a date.
///
/// Pure function: for a fixed record, date and `now` the result is
/// always the same ordered sequence.
///
/// Boundary policies, pinned deliberately:
/// - a slot is emitted while its start is before the window end
///   (half-open inclusion; the final slot may nominally run past the
///   window close, matching the behavior the schedule owners signed
///   off on);
/// - a slot on the requested date is kept only when its start is
///   strictly after `now`, so a slot beginning exactly at `now` is
///   already considered missed.
pub fn generate_slots(
    record: &AvailabilityRecord,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Vec<NaiveTime> {
    // An exception date wins over the weekly schedule outright.
    if record.is_exception_date(date) {
        debug!("Provider {} has {} marked unavailable", record.provider_id, date);
        return Vec::new();
    }

    let day = record.schedule_for(date.weekday());
    if !day.is_working || day.windows.is_empty() {
        return Vec::new();
    }

    if record.slot_duration_minutes <= 0 {
        warn!(
            "Provider {} has non-positive slot duration {}, generating no slots",
            record.provider_id, record.slot_duration_minutes
        );
        return Vec::new();
    }

    let step = Duration::minutes(record.slot_duration_minutes);
    let mut slots = Vec::new();

    for window in &day.windows {
        let mut current = window.start;
        while current < window.end {
            if date.and_time(current).and_utc() > now {
                slots.push(current);
            }

            // NaiveTime addition wraps at midnight; a wrapped step
            // means the window is exhausted.
            let (next, wrapped) = current.overflowing_add_signed(step);
            if wrapped != 0 {
                break;
            }
            current = next;
        }
    }

    debug!(
        "Generated {} slots for provider {} on {}",
        slots.len(),
        record.provider_id,
        date
    );
    slots
}
