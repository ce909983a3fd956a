//! The day-ahead plan produced by the Planner (C6, §3, §4.6).

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{BatteryAction, PriceDescriptor};

/// Descriptor transitions that force a replan even within the same hour and inside the 30-minute
/// freshness window (§4.6: "a fresh tick sees a descriptor change from/to spike/extremely_low").
fn is_spike_or_extremely_low(descriptor: PriceDescriptor) -> bool {
    matches!(descriptor, PriceDescriptor::Spike | PriceDescriptor::ExtremelyLow)
}

/// A single scheduled action covering a half-open `[start_time, end_time)` local-time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledAction {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// The window's position in the sorted sequence of windows the plan was built from, used to
    /// enforce "charge strictly before sell" without relying on list order (§9 design note).
    pub start_timestamp: DateTime<Utc>,
    pub action: BatteryAction,
    pub reason: String,
    pub import_price: Option<f64>,
    pub export_price: Option<f64>,
    pub expected_value_cents: f64,
    pub priority: u8,
}

impl ScheduledAction {
    pub fn covers(&self, hour: u32, minute: u32) -> bool {
        let t = NaiveTime::from_hms_opt(hour, minute, 0).unwrap();
        if self.start_time <= self.end_time {
            self.start_time <= t && t < self.end_time
        } else {
            // wraps past midnight
            t >= self.start_time || t < self.end_time
        }
    }
}

/// Aggregate counts attached to a `DayPlan`, useful for logging and the scenario tests of §8.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub arbitrage_pairs: u32,
    pub total_expected_cents: f64,
    pub charge_windows: u32,
    pub sell_windows: u32,
    pub self_consume_windows: u32,
    pub solar_charge_windows: u32,
}

/// The ordered day-ahead schedule, as built by the Planner from a 48-hour window set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayPlan {
    pub created_at: DateTime<Utc>,
    pub built_for_hour: u32,
    pub schedule: Vec<ScheduledAction>,
    pub summary: PlanSummary,
}

impl DayPlan {
    pub fn empty(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            built_for_hour: created_at.format("%H").to_string().parse().unwrap_or(0),
            schedule: Vec::new(),
            summary: PlanSummary::default(),
        }
    }

    /// Returns the scheduled action, if any, whose window covers `(hour, minute)`.
    pub fn action_for_time(&self, hour: u32, minute: u32) -> Option<&ScheduledAction> {
        self.schedule.iter().find(|a| a.covers(hour, minute))
    }

    /// Plan is stale per §4.6: built for a different hour, older than 30 minutes, or this tick
    /// saw the price descriptor transition into or out of `spike`/`extremely_low`.
    pub fn is_stale(&self, now: DateTime<Utc>, previous_descriptor: PriceDescriptor, current_descriptor: PriceDescriptor) -> bool {
        let built_hour = self.created_at.format("%H").to_string().parse::<u32>().unwrap_or(0);
        let current_hour: u32 = now.format("%H").to_string().parse().unwrap_or(0);
        let descriptor_transitioned = is_spike_or_extremely_low(previous_descriptor) != is_spike_or_extremely_low(current_descriptor);
        built_hour != current_hour || (now - self.created_at) > chrono::Duration::minutes(30) || descriptor_transitioned
    }
}
