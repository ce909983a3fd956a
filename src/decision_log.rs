//! Decision Log (C8, §6): an append-only, human-readable durable record of every decision made.
//!
//! Grounded on the prototype's `core/logger.py::DecisionLogger` (pipe-delimited line format,
//! append-only file, flush-per-write) and the teacher's `tracing_appender` usage for rolling
//! files — the decision log is a separate, stable-format sink from the structured tracing output
//! because it is meant to be grepped and diffed by a human, not ingested as JSON.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::analyser::AnalysedForecast;
use crate::domain::{Decision, Snapshot};

/// One line per decision: `timestamp | action | import | export | forecast_avg | forecast_max |
/// solar | confidence | reason` (§6).
fn format_line(snapshot: &Snapshot, analysed: &AnalysedForecast, decision: &Decision) -> String {
    format!(
        "{} | {} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {}",
        decision.timestamp.to_rfc3339(),
        decision.action,
        snapshot.current_import_cents().unwrap_or(0.0),
        snapshot.current_export_cents().unwrap_or(0.0),
        analysed.forecast_avg,
        analysed.forecast_max,
        snapshot.current_solar_kw,
        decision.confidence,
        decision.reason,
    )
}

pub struct DecisionLog {
    path: PathBuf,
}

impl DecisionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn open(&self) -> anyhow::Result<File> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(OpenOptions::new().create(true).append(true).open(&self.path).await?)
    }

    /// Appends one line and flushes immediately; a crash mid-tick must never lose a decision that
    /// was already committed to the log.
    pub async fn append(&self, snapshot: &Snapshot, analysed: &AnalysedForecast, decision: &Decision) -> anyhow::Result<()> {
        let mut file = self.open().await?;
        let line = format_line(snapshot, analysed, decision);
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append_raw_summary(&self, line: &str, now: DateTime<Utc>) -> String {
        format!("{} | HEALTH | {}", now.to_rfc3339(), line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BatteryState, GridState, PriceDescriptor};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn sample_snapshot(ts: DateTime<Utc>) -> Snapshot {
        Snapshot {
            timestamp: ts,
            current_import_price: None,
            current_export_price: None,
            price_forecast: vec![],
            price_history: vec![],
            battery: BatteryState::default_from_config(13.5, 5.0, 5.0, 0.9, 5.0, 20.0),
            solar_forecast: vec![],
            current_solar_kw: 1.2,
            grid_state: GridState::zero_filled("NSW1", ts),
            predicted_load_kw: 0.5,
            vpp_event_active: false,
            interval_minutes: 5,
            tariff_period: None,
            tariff_season: None,
            descriptor: PriceDescriptor::Neutral,
        }
    }

    fn sample_analysed() -> AnalysedForecast {
        AnalysedForecast {
            forecast_min: 5.0,
            forecast_avg: 15.0,
            forecast_max: 30.0,
            export_avg: 5.0,
            export_max: 8.0,
            cheapest_windows: vec![],
            expensive_windows: vec![],
            best_sell_windows: vec![],
            negative_intervals: 0,
            spike_intervals: 0,
        }
    }

    #[tokio::test]
    async fn append_writes_one_pipe_delimited_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("decisions.log");
        let log = DecisionLog::new(&path);
        let ts = Utc::now();
        let decision = Decision {
            timestamp: ts,
            action: crate::domain::BatteryAction::Idle,
            power_kw: 0.0,
            reason: "test".into(),
            confidence: 0.6,
            expected_value_cents: 0.0,
            factors: BTreeMap::new(),
        };
        log.append(&sample_snapshot(ts), &sample_analysed(), &decision).await.unwrap();
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].split(" | ").count(), 9);
    }

    #[tokio::test]
    async fn append_is_cumulative_across_calls() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("decisions.log");
        let log = DecisionLog::new(&path);
        for _ in 0..3 {
            let ts = Utc::now();
            let decision = Decision {
                timestamp: ts,
                action: crate::domain::BatteryAction::Idle,
                power_kw: 0.0,
                reason: "test".into(),
                confidence: 0.6,
                expected_value_cents: 0.0,
                factors: BTreeMap::new(),
            };
            log.append(&sample_snapshot(ts), &sample_analysed(), &decision).await.unwrap();
        }
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 3);
    }
}
