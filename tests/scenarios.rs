//! End-to-end scenario tests driving the Supervisor through the public crate API, covering the
//! cascade scenarios from §8 that are not already exercised by `supervisor.rs`'s own unit tests
//! at a finer grain (here we go through `gridpilot::supervisor::decide` with a fully built
//! `Snapshot`, the same shape the Engine would hand it each tick).

use chrono::{TimeZone, Utc};
use gridpilot::analyser::analyse_forecast;
use gridpilot::config::{BatteryConfig, StrategyConfig};
use gridpilot::domain::{
    BatteryState, GridState, IntervalType, PriceChannel, PriceDescriptor, PriceInterval, SpikeStatus, Snapshot,
};
use gridpilot::supervisor::decide;

fn interval(hour: u32, minute: u32, cents: f64, channel: PriceChannel, spike: SpikeStatus) -> PriceInterval {
    let ts = Utc.with_ymd_and_hms(2026, 3, 10, hour, minute, 0).unwrap();
    PriceInterval {
        timestamp: ts,
        end_time: ts + chrono::Duration::minutes(5),
        per_kwh_cents: cents,
        spot_per_kwh_cents: cents,
        channel,
        spike_status: spike,
        descriptor: PriceDescriptor::Neutral,
        renewables_pct: 40.0,
        tariff: None,
        duration_minutes: 5,
        interval_type: IntervalType::Current,
        is_estimate: false,
    }
}

fn snapshot(hour: u32, minute: u32, import_cents: Option<f64>, export_cents: f64, spike: SpikeStatus, soc_pct: f64, vpp: bool) -> Snapshot {
    let ts = Utc.with_ymd_and_hms(2026, 3, 10, hour, minute, 0).unwrap();
    let battery = BatteryState::new(soc_pct, 13.5 * soc_pct / 100.0, 13.5, 5.0, 5.0, 0.9, 5.0, 20.0).unwrap();
    Snapshot {
        timestamp: ts,
        current_import_price: import_cents.map(|c| interval(hour, minute, c, PriceChannel::General, spike)),
        current_export_price: Some(interval(hour, minute, export_cents, PriceChannel::FeedIn, SpikeStatus::None)),
        price_forecast: vec![],
        price_history: vec![],
        battery,
        solar_forecast: vec![],
        current_solar_kw: 0.0,
        grid_state: GridState::zero_filled("NSW1", ts),
        predicted_load_kw: 1.2,
        vpp_event_active: vpp,
        interval_minutes: 5,
        tariff_period: None,
        tariff_season: None,
        descriptor: PriceDescriptor::Neutral,
    }
}

#[test]
fn negative_import_price_triggers_grid_charge() {
    let snap = snapshot(3, 0, Some(-1.5), 4.0, SpikeStatus::None, 55.0, false);
    let analysed = analyse_forecast(&snap.price_forecast);
    let decision = decide(&snap, &analysed, None, &StrategyConfig::default(), &BatteryConfig::default());
    assert_eq!(decision.action, gridpilot::domain::BatteryAction::ChargeGrid);
    assert!(decision.confidence >= 0.99 - 1e-9);
    assert!(decision.reason.contains("NEGATIVE"));
}

#[test]
fn actual_spike_triggers_house_discharge_over_plan() {
    let snap = snapshot(18, 15, Some(210.0), 12.0, SpikeStatus::Actual, 65.0, false);
    let analysed = analyse_forecast(&snap.price_forecast);
    let decision = decide(&snap, &analysed, None, &StrategyConfig::default(), &BatteryConfig::default());
    assert_eq!(decision.action, gridpilot::domain::BatteryAction::DischargeHouse);
    assert!((decision.confidence - 0.99).abs() < 1e-9);
}

#[test]
fn vpp_event_outranks_actual_spike() {
    let snap = snapshot(18, 15, Some(210.0), 12.0, SpikeStatus::Actual, 90.0, true);
    let analysed = analyse_forecast(&snap.price_forecast);
    let decision = decide(&snap, &analysed, None, &StrategyConfig::default(), &BatteryConfig::default());
    assert_eq!(decision.action, gridpilot::domain::BatteryAction::DischargeGrid);
    assert!((decision.confidence - 0.95).abs() < 1e-9);
}

#[test]
fn missing_retailer_data_falls_back_by_time_of_day() {
    let snap = snapshot(17, 0, None, 5.0, SpikeStatus::None, 60.0, false);
    let analysed = analyse_forecast(&snap.price_forecast);
    let decision = decide(&snap, &analysed, None, &StrategyConfig::default(), &BatteryConfig::default());
    assert!(decision.is_fallback());
    assert!(decision.confidence <= 0.5);
}
