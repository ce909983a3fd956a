//! The learned hour-of-day household usage profile (§3, §4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One hour's worth of learned load/export means, split by weekday vs. weekend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HourProfile {
    pub weekday_import_kw: f64,
    pub weekend_import_kw: f64,
    pub weekday_export_kw: f64,
    pub weekend_export_kw: f64,
}

/// A 24-hour x (weekday/weekend) load and export profile, persisted as the single source of
/// truth for "what does this household usually do at this hour" (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageProfile {
    pub hours: [HourProfile; 24],
    pub base_load_kw: f64,
    pub solar_peak_kw: f64,
    pub peak_import_hour: u32,
    pub peak_export_hour: u32,
    pub days_analysed: u32,
    pub last_updated: DateTime<Utc>,
}

impl UsageProfile {
    pub fn predicted_import_kw(&self, hour: u32, is_weekday: bool) -> f64 {
        let h = &self.hours[(hour % 24) as usize];
        if is_weekday { h.weekday_import_kw } else { h.weekend_import_kw }
    }

    pub fn predicted_export_kw(&self, hour: u32, is_weekday: bool) -> f64 {
        let h = &self.hours[(hour % 24) as usize];
        if is_weekday { h.weekday_export_kw } else { h.weekend_export_kw }
    }

    /// Freshness per §4.3: the profile is stale once it is more than 24h old.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        (now - self.last_updated) > chrono::Duration::hours(24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> UsageProfile {
        let mut hours = [HourProfile::default(); 24];
        hours[18] = HourProfile {
            weekday_import_kw: 3.0,
            weekend_import_kw: 1.5,
            weekday_export_kw: 0.2,
            weekend_export_kw: 0.1,
        };
        UsageProfile {
            hours,
            base_load_kw: 0.3,
            solar_peak_kw: 4.0,
            peak_import_hour: 18,
            peak_export_hour: 12,
            days_analysed: 14,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn lookups_split_weekday_weekend() {
        let p = sample_profile();
        assert!((p.predicted_import_kw(18, true) - 3.0).abs() < 1e-9);
        assert!((p.predicted_import_kw(18, false) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn stale_after_24_hours() {
        let mut p = sample_profile();
        p.last_updated = Utc::now() - chrono::Duration::hours(25);
        assert!(p.is_stale(Utc::now()));
        p.last_updated = Utc::now() - chrono::Duration::hours(1);
        assert!(!p.is_stale(Utc::now()));
    }
}
