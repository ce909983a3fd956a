//! Forecast Analyser (C5, §4.5): pure reductions over the forecast price series, plus the
//! 30-minute window builder consumed by the Planner.
//!
//! Grounded on the prototype's `monitor.py::analyse_forecast` (min/avg/max, top-5 windows,
//! negative/spike counts) and `strategy/planner.py::_build_windows` (30-minute grouping,
//! first-interval-wins tariff, arithmetic-mean pricing).

use chrono::{DateTime, Duration, Utc};
use ordered_float::OrderedFloat;
use std::collections::BTreeMap;

use crate::domain::{PriceChannel, PriceInterval, SpikeStatus, TariffPeriod};

#[derive(Debug, Clone)]
pub struct AnalysedForecast {
    pub forecast_min: f64,
    pub forecast_avg: f64,
    pub forecast_max: f64,
    pub export_avg: f64,
    pub export_max: f64,
    pub cheapest_windows: Vec<PriceInterval>,
    pub expensive_windows: Vec<PriceInterval>,
    pub best_sell_windows: Vec<PriceInterval>,
    pub negative_intervals: u32,
    pub spike_intervals: u32,
}

/// A 30-minute aggregation of six 5-minute forecast intervals (§4.5, §GLOSSARY).
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub slot_key: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub import_cents: f64,
    pub export_cents: f64,
    pub tariff_period: Option<TariffPeriod>,
    pub spike_risk: bool,
    /// Populated by the planner once windows are annotated (§4.6 step 1); `None` until then.
    pub solar_kw: Option<f64>,
    pub load_kw: Option<f64>,
    pub expected_export_kw: Option<f64>,
}

/// Analyses the forward (forecast-only) price series for one tick (§4.5).
pub fn analyse_forecast(price_forecast: &[PriceInterval]) -> AnalysedForecast {
    let general: Vec<&PriceInterval> = price_forecast.iter().filter(|p| p.channel == PriceChannel::General).collect();
    let feed_in: Vec<&PriceInterval> = price_forecast.iter().filter(|p| p.channel == PriceChannel::FeedIn).collect();

    let forecast_min = general.iter().map(|p| p.per_kwh_cents).fold(f64::INFINITY, f64::min);
    let forecast_max = general.iter().map(|p| p.per_kwh_cents).fold(f64::NEG_INFINITY, f64::max);
    let forecast_avg = if general.is_empty() {
        30.0
    } else {
        general.iter().map(|p| p.per_kwh_cents).sum::<f64>() / general.len() as f64
    };
    let forecast_min = if forecast_min.is_finite() { forecast_min } else { 30.0 };
    let forecast_max = if forecast_max.is_finite() { forecast_max } else { 30.0 };

    let export_abs: Vec<f64> = feed_in.iter().map(|p| p.per_kwh_cents.abs()).collect();
    let export_avg = if export_abs.is_empty() { 5.0 } else { export_abs.iter().sum::<f64>() / export_abs.len() as f64 };
    let export_max = export_abs.iter().cloned().fold(0.0, f64::max);

    let mut by_import = general.clone();
    by_import.sort_by_key(|p| OrderedFloat(p.per_kwh_cents));
    let cheapest_windows: Vec<PriceInterval> = by_import.iter().take(5).map(|p| (**p).clone()).collect();
    let expensive_windows: Vec<PriceInterval> = by_import.iter().rev().take(5).map(|p| (**p).clone()).collect();

    let mut by_export = feed_in.clone();
    by_export.sort_by_key(|p| std::cmp::Reverse(OrderedFloat(p.per_kwh_cents.abs())));
    let best_sell_windows: Vec<PriceInterval> = by_export.iter().take(5).map(|p| (**p).clone()).collect();

    let negative_intervals = general.iter().filter(|p| p.per_kwh_cents <= 0.0).count() as u32;
    let spike_intervals = general.iter().filter(|p| p.spike_status != SpikeStatus::None).count() as u32;

    AnalysedForecast {
        forecast_min,
        forecast_avg,
        forecast_max,
        export_avg,
        export_max,
        cheapest_windows,
        expensive_windows,
        best_sell_windows,
        negative_intervals,
        spike_intervals,
    }
}

fn slot_start(ts: DateTime<Utc>) -> DateTime<Utc> {
    let minute = (ts.format("%M").to_string().parse::<u32>().unwrap_or(0) / 30) * 30;
    ts.date_naive()
        .and_hms_opt(ts.format("%H").to_string().parse().unwrap_or(0), minute, 0)
        .unwrap()
        .and_utc()
}

/// Groups 5-minute general and feed-in intervals into 30-minute windows (§4.5). The tariff tag
/// comes from the *first* general interval seen for a slot; pricing is the arithmetic mean over
/// that slot's constituent intervals.
pub fn build_30min_windows(general: &[PriceInterval], feed_in: &[PriceInterval]) -> Vec<Window> {
    let mut import_by_slot: BTreeMap<DateTime<Utc>, Vec<&PriceInterval>> = BTreeMap::new();
    for p in general {
        import_by_slot.entry(slot_start(p.timestamp)).or_default().push(p);
    }
    let mut export_by_slot: BTreeMap<DateTime<Utc>, Vec<&PriceInterval>> = BTreeMap::new();
    for p in feed_in {
        export_by_slot.entry(slot_start(p.timestamp)).or_default().push(p);
    }

    let mut all_slots: Vec<DateTime<Utc>> = import_by_slot.keys().chain(export_by_slot.keys()).cloned().collect();
    all_slots.sort();
    all_slots.dedup();

    all_slots
        .into_iter()
        .map(|slot| {
            let imports = import_by_slot.get(&slot).cloned().unwrap_or_default();
            let exports = export_by_slot.get(&slot).cloned().unwrap_or_default();
            let import_cents = if imports.is_empty() {
                0.0
            } else {
                imports.iter().map(|p| p.per_kwh_cents).sum::<f64>() / imports.len() as f64
            };
            let export_cents = if exports.is_empty() {
                0.0
            } else {
                exports.iter().map(|p| p.per_kwh_cents).sum::<f64>() / exports.len() as f64
            };
            let tariff_period = imports.first().and_then(|p| p.tariff);
            let spike_risk = imports.iter().any(|p| p.spike_status != SpikeStatus::None)
                || exports.iter().any(|p| p.spike_status != SpikeStatus::None);
            Window {
                slot_key: slot.format("%H:%M").to_string(),
                start: slot,
                end: slot + Duration::minutes(30),
                import_cents,
                export_cents,
                tariff_period,
                spike_risk,
                solar_kw: None,
                load_kw: None,
                expected_export_kw: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IntervalType, PriceDescriptor};
    use chrono::TimeZone;

    fn interval(minute: u32, cents: f64, channel: PriceChannel) -> PriceInterval {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 2, minute, 0).unwrap();
        PriceInterval {
            timestamp: ts,
            end_time: ts + Duration::minutes(5),
            per_kwh_cents: cents,
            spot_per_kwh_cents: cents,
            channel,
            spike_status: SpikeStatus::None,
            descriptor: PriceDescriptor::Neutral,
            renewables_pct: 0.0,
            tariff: Some(TariffPeriod::OffPeak),
            duration_minutes: 5,
            interval_type: IntervalType::Forecast,
            is_estimate: false,
        }
    }

    #[test]
    fn window_import_cents_is_arithmetic_mean() {
        let general: Vec<PriceInterval> = [0, 5, 10, 15, 20, 25]
            .iter()
            .map(|m| interval(*m, *m as f64, PriceChannel::General))
            .collect();
        let windows = build_30min_windows(&general, &[]);
        assert_eq!(windows.len(), 1);
        let expected_mean = (0.0 + 5.0 + 10.0 + 15.0 + 20.0 + 25.0) / 6.0;
        assert!((windows[0].import_cents - expected_mean).abs() < 1e-9);
    }

    #[test]
    fn analyse_is_idempotent() {
        let forecast = vec![interval(0, 10.0, PriceChannel::General), interval(30, -2.0, PriceChannel::General)];
        let a = analyse_forecast(&forecast);
        let b = analyse_forecast(&forecast);
        assert_eq!(a.negative_intervals, b.negative_intervals);
        assert!((a.forecast_avg - b.forecast_avg).abs() < 1e-12);
    }

    #[test]
    fn negative_intervals_counted() {
        let forecast = vec![interval(0, -1.0, PriceChannel::General), interval(5, 5.0, PriceChannel::General)];
        let analysed = analyse_forecast(&forecast);
        assert_eq!(analysed.negative_intervals, 1);
    }
}
