use std::env;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Runtime configuration for the scheduling cells, read from the
/// environment with sensible fallbacks so the library stays usable in
/// tests and demo deployments without any setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicConfig {
    pub clinic_name: String,
    pub clinic_location: String,
    /// Hours before the appointment at which the reminder fires.
    pub reminder_lead_hours: i64,
    /// Hours after the appointment at which the follow-up fires.
    pub followup_delay_hours: i64,
    /// Simulated network latency applied before a booking commit.
    pub booking_confirm_delay_ms: u64,
}

impl ClinicConfig {
    pub fn from_env() -> Self {
        Self {
            clinic_name: env::var("CLINIC_NAME").unwrap_or_else(|_| {
                warn!("CLINIC_NAME not set, using default");
                "Sri Ananth Hospital".to_string()
            }),
            clinic_location: env::var("CLINIC_LOCATION").unwrap_or_else(|_| {
                warn!("CLINIC_LOCATION not set, using default");
                "Sri Ananth Hospital, Bangalore".to_string()
            }),
            reminder_lead_hours: parse_env_i64("REMINDER_LEAD_HOURS", 24),
            followup_delay_hours: parse_env_i64("FOLLOWUP_DELAY_HOURS", 24),
            booking_confirm_delay_ms: parse_env_i64("BOOKING_CONFIRM_DELAY_MS", 1000) as u64,
        }
    }
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            clinic_name: "Sri Ananth Hospital".to_string(),
            clinic_location: "Sri Ananth Hospital, Bangalore".to_string(),
            reminder_lead_hours: 24,
            followup_delay_hours: 24,
            booking_confirm_delay_ms: 1000,
        }
    }
}

fn parse_env_i64(key: &str, default: i64) -> i64 {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} is not a valid integer, using default {}", key, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_env_fallbacks() {
        let config = ClinicConfig::default();
        assert_eq!(config.reminder_lead_hours, 24);
        assert_eq!(config.followup_delay_hours, 24);
        assert_eq!(config.booking_confirm_delay_ms, 1000);
        assert!(!config.clinic_location.is_empty());
    }
}
