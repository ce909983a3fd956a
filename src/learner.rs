//! Usage Learner (C3, §4.3): distills historical 5-minute usage into an hour-of-day,
//! weekday/weekend load and export profile.

use chrono::{DateTime, Datelike, Timelike, Utc};
use std::collections::HashMap;
use thiserror::Error;

use crate::clients::retailer::UsageRow;
use crate::config::LearnerConfig;
use crate::domain::{HourProfile, UsageProfile};

#[derive(Debug, Error, PartialEq)]
pub enum LearnerError {
    #[error("not enough usage history: need at least {required} days, have {have}")]
    InsufficientHistory { required: u32, have: u32 },
}

#[derive(Default)]
struct Accumulator {
    sum_kwh: f64,
    count: u32,
}

impl Accumulator {
    fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.sum_kwh / self.count as f64 }
    }
}

/// Nearest-rank percentile over an unsorted slice (copies and sorts internally).
fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let rank = (pct / 100.0 * (sorted.len() as f64 - 1.0)).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

pub struct UsageLearner {
    config: LearnerConfig,
}

impl UsageLearner {
    pub fn new(config: LearnerConfig) -> Self {
        Self { config }
    }

    /// Builds a `UsageProfile` from raw historical usage rows (§4.3). `rows` is expected to span
    /// `days_back` days; the caller is responsible for fetching that range from the retailer.
    pub fn learn(&self, rows: &[UsageRow], now: DateTime<Utc>) -> Result<UsageProfile, LearnerError> {
        let days_seen: std::collections::HashSet<chrono::NaiveDate> =
            rows.iter().map(|r| r.timestamp.date_naive()).collect();
        let days_analysed = days_seen.len() as u32;
        if days_analysed < self.config.min_days_required {
            return Err(LearnerError::InsufficientHistory {
                required: self.config.min_days_required,
                have: days_analysed,
            });
        }

        // Keyed by (hour, is_weekday); separate accumulators for import (general) and export
        // (feedIn) channels.
        let mut import_acc: HashMap<(u32, bool), Accumulator> = HashMap::new();
        let mut export_acc: HashMap<(u32, bool), Accumulator> = HashMap::new();

        for row in rows {
            let hour = row.timestamp.hour();
            let is_weekday = row.timestamp.weekday().number_from_monday() < 6;
            let interval_minutes = (row.end_time - row.timestamp).num_minutes().max(1) as f64;
            let kw = row.kwh * (60.0 / interval_minutes);
            match row.channel_type.as_str() {
                "general" => {
                    let acc = import_acc.entry((hour, is_weekday)).or_default();
                    acc.sum_kwh += kw;
                    acc.count += 1;
                }
                "feedIn" => {
                    let acc = export_acc.entry((hour, is_weekday)).or_default();
                    acc.sum_kwh += kw;
                    acc.count += 1;
                }
                _ => {}
            }
        }

        let mut hours = [HourProfile::default(); 24];
        for h in 0..24u32 {
            hours[h as usize] = HourProfile {
                weekday_import_kw: import_acc.get(&(h, true)).map(Accumulator::mean).unwrap_or(0.0),
                weekend_import_kw: import_acc.get(&(h, false)).map(Accumulator::mean).unwrap_or(0.0),
                weekday_export_kw: export_acc.get(&(h, true)).map(Accumulator::mean).unwrap_or(0.0),
                weekend_export_kw: export_acc.get(&(h, false)).map(Accumulator::mean).unwrap_or(0.0),
            };
        }

        let all_import_means: Vec<f64> = hours.iter().flat_map(|h| [h.weekday_import_kw, h.weekend_import_kw]).filter(|v| *v > 0.0).collect();
        let all_export_means: Vec<f64> = hours.iter().flat_map(|h| [h.weekday_export_kw, h.weekend_export_kw]).collect();

        let base_load_kw = percentile(&all_import_means, self.config.base_load_percentile);
        let solar_peak_kw = percentile(&all_export_means, self.config.solar_peak_percentile);

        let peak_import_hour = hours
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.weekday_import_kw.partial_cmp(&b.1.weekday_import_kw).unwrap())
            .map(|(h, _)| h as u32)
            .unwrap_or(0);
        let peak_export_hour = hours
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.weekday_export_kw.partial_cmp(&b.1.weekday_export_kw).unwrap())
            .map(|(h, _)| h as u32)
            .unwrap_or(0);

        Ok(UsageProfile {
            hours,
            base_load_kw,
            solar_peak_kw,
            peak_import_hour,
            peak_export_hour,
            days_analysed,
            last_updated: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(day: u32, hour: u32, channel: &str, kwh: f64) -> UsageRow {
        let ts = Utc.with_ymd_and_hms(2026, 1, day, hour, 0, 0).unwrap();
        UsageRow {
            timestamp: ts,
            end_time: ts + chrono::Duration::minutes(5),
            channel_type: channel.into(),
            channel_id: "c1".into(),
            kwh,
            cost_cents: 0.0,
            per_kwh_cents: 0.0,
            spot_per_kwh_cents: None,
            spike_status: "none".into(),
            descriptor: "neutral".into(),
            renewables_pct: 0.0,
            quality: "billable".into(),
            soc: None,
        }
    }

    #[test]
    fn learns_hour_18_evening_profile_from_14_days() {
        // 2026-01-01 is a Thursday: days 1..7 are weekdays Thu..Wed (5 weekdays, 2 weekend),
        // repeated twice across 14 days. 3.0kW weekday import, 1.5kW weekend import at hour 18.
        let mut rows = Vec::new();
        for day in 1..=14u32 {
            let ts = Utc.with_ymd_and_hms(2026, 1, day, 18, 0, 0).unwrap();
            let is_weekday = ts.weekday().number_from_monday() < 6;
            let kwh_per_5min = if is_weekday { 3.0 / 12.0 } else { 1.5 / 12.0 };
            rows.push(row(day, 18, "general", kwh_per_5min));
        }
        let learner = UsageLearner::new(LearnerConfig::default());
        let profile = learner.learn(&rows, Utc::now()).unwrap();
        assert!((profile.hours[18].weekday_import_kw - 3.0).abs() < 1e-6);
        assert!((profile.hours[18].weekend_import_kw - 1.5).abs() < 1e-6);
        assert_eq!(profile.peak_import_hour, 18);
    }

    #[test]
    fn rejects_insufficient_history() {
        let rows = vec![row(1, 18, "general", 0.25)];
        let learner = UsageLearner::new(LearnerConfig::default());
        assert_eq!(
            learner.learn(&rows, Utc::now()).unwrap_err(),
            LearnerError::InsufficientHistory { required: 7, have: 1 }
        );
    }
}
