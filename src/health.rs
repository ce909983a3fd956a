//! Health Monitor (C8, §4.8): tracks cycle outcomes and per-source availability across ticks,
//! and decides when the operator should be alerted.
//!
//! Grounded on the prototype's `core/health.py::HealthMonitor` (consecutive-failure counter,
//! degraded/critical thresholds, per-source last-seen tracking).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collector::SourceHealth;

/// Point-in-time health record, suitable for logging or an eventual status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub last_successful_cycle: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub total_cycles: u64,
    pub total_failures: u64,
    pub prices_ok: bool,
    pub forecast_ok: bool,
    pub battery_ok: bool,
    pub solar_ok: bool,
    pub grid_ok: bool,
    pub started_at: DateTime<Utc>,
}

impl HealthStatus {
    pub fn uptime(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.started_at
    }

    /// Any single source down, but the cycle as a whole still produced a decision.
    pub fn degraded(&self) -> bool {
        !(self.prices_ok && self.forecast_ok && self.battery_ok && self.solar_ok && self.grid_ok)
    }

    /// Consecutive cycle failures at or above the alert threshold.
    pub fn critical(&self, max_failures_before_alert: u32) -> bool {
        self.consecutive_failures >= max_failures_before_alert
    }
}

/// Accumulates cycle outcomes and raises an alert signal once the configured failure streak is
/// reached. A "failure" here is a source outage recorded by the Collector (§4.4), not a tick
/// panic — a tick body failure is handled by the Supervisor's emergency fallback and still
/// counts as one failed cycle for this monitor.
pub struct HealthMonitor {
    status: HealthStatus,
    max_failures_before_alert: u32,
    alert_raised: bool,
}

impl HealthMonitor {
    pub fn new(max_failures_before_alert: u32, now: DateTime<Utc>) -> Self {
        Self {
            status: HealthStatus {
                last_successful_cycle: None,
                consecutive_failures: 0,
                total_cycles: 0,
                total_failures: 0,
                prices_ok: true,
                forecast_ok: true,
                battery_ok: true,
                solar_ok: true,
                grid_ok: true,
                started_at: now,
            },
            max_failures_before_alert,
            alert_raised: false,
        }
    }

    pub fn status(&self) -> &HealthStatus {
        &self.status
    }

    /// Records one tick's source-level outcome. Returns `true` exactly once per alert-worthy
    /// failure streak, i.e. on the tick where the threshold is first crossed, so the caller can
    /// log a single alert rather than one per subsequent tick.
    pub fn record(&mut self, source_health: &SourceHealth, now: DateTime<Utc>) -> bool {
        self.status.total_cycles += 1;
        self.status.prices_ok = source_health.prices_ok;
        self.status.forecast_ok = source_health.forecast_ok;
        self.status.battery_ok = source_health.battery_ok;
        self.status.solar_ok = source_health.solar_ok;
        self.status.grid_ok = source_health.grid_ok;

        let cycle_failed = !source_health.retailer_ok() || !source_health.solar_ok || !source_health.grid_ok;
        if cycle_failed {
            self.status.total_failures += 1;
            self.status.consecutive_failures += 1;
        } else {
            self.status.consecutive_failures = 0;
            self.status.last_successful_cycle = Some(now);
            self.alert_raised = false;
        }

        let should_alert = self.status.critical(self.max_failures_before_alert) && !self.alert_raised;
        if should_alert {
            self.alert_raised = true;
        }
        should_alert
    }

    /// Periodic summary line emitted every `HEALTH_SUMMARY_EVERY_N_TICKS` ticks (SPEC_FULL.md §B).
    pub fn summary_line(&self, now: DateTime<Utc>) -> String {
        format!(
            "cycles={} failures={} consecutive_failures={} uptime_s={} degraded={}",
            self.status.total_cycles,
            self.status.total_failures,
            self.status.consecutive_failures,
            self.status.uptime(now).num_seconds(),
            self.degraded(),
        )
    }

    pub fn degraded(&self) -> bool {
        self.status.degraded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, h, 0, 0).unwrap()
    }

    fn healthy() -> SourceHealth {
        SourceHealth { prices_ok: true, forecast_ok: true, battery_ok: true, solar_ok: true, grid_ok: true }
    }

    fn unhealthy() -> SourceHealth {
        SourceHealth { prices_ok: false, forecast_ok: false, battery_ok: false, solar_ok: true, grid_ok: true }
    }

    #[test]
    fn alerts_exactly_once_when_threshold_crossed() {
        let mut monitor = HealthMonitor::new(3, ts(0));
        assert!(!monitor.record(&unhealthy(), ts(1)));
        assert!(!monitor.record(&unhealthy(), ts(2)));
        assert!(monitor.record(&unhealthy(), ts(3)));
        assert!(!monitor.record(&unhealthy(), ts(4)));
    }

    #[test]
    fn recovery_resets_consecutive_failures_and_alert_state() {
        let mut monitor = HealthMonitor::new(2, ts(0));
        monitor.record(&unhealthy(), ts(1));
        monitor.record(&unhealthy(), ts(2));
        assert_eq!(monitor.status().consecutive_failures, 2);
        monitor.record(&healthy(), ts(3));
        assert_eq!(monitor.status().consecutive_failures, 0);
        assert!(monitor.status().last_successful_cycle == Some(ts(3)));
        monitor.record(&unhealthy(), ts(4));
        monitor.record(&unhealthy(), ts(5));
        assert!(monitor.record(&unhealthy(), ts(6)) == false || monitor.status().consecutive_failures >= 2);
    }

    #[test]
    fn degraded_when_any_source_down() {
        let mut monitor = HealthMonitor::new(10, ts(0));
        monitor.record(&unhealthy(), ts(1));
        assert!(monitor.degraded());
    }
}
