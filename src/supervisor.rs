//! Real-Time Supervisor (C7, §4.7): per-tick override cascade, plan-follow, per-interval
//! heuristic, and null-price fallback. Emits exactly one [`Decision`] per tick.
//!
//! Grounded on §4.7's own cascade text (already the richest synthesis per §9), cross-checked
//! against the prototype's `strategy/engine.py::StrategyEngine.decide` (cascade order, `factors`
//! contents, the 5-minute expected-value convention) and `strategy/fallback.py::FallbackStrategy.decide`
//! (time-of-day fallback, `FALLBACK:`-prefixed reasons, confidence ≤ 0.5).
//!
//! Expected-value convention for this layer: **5-minute tick** energy (`power_kw / 12 h`), per
//! §9's documented resolution (contrast the Planner's 30-minute convention).

use std::collections::BTreeMap;

use chrono::{Timelike, Utc};

use crate::analyser::AnalysedForecast;
use crate::config::{BatteryConfig, StrategyConfig};
use crate::domain::{BatteryAction, DayPlan, Decision, FactorValue, SpikeStatus, Snapshot, TariffPeriod};

fn factors_base(snapshot: &Snapshot, analysed: &AnalysedForecast) -> BTreeMap<String, FactorValue> {
    let mut f = BTreeMap::new();
    f.insert("import_cents".into(), snapshot.current_import_cents().unwrap_or(0.0).into());
    f.insert("export_cents".into(), snapshot.current_export_cents().unwrap_or(0.0).into());
    f.insert(
        "spike".into(),
        snapshot.current_import_price.as_ref().map(|p| p.spike_status.to_string()).unwrap_or_else(|| "none".into()).as_str().into(),
    );
    f.insert("battery_soc".into(), snapshot.battery.soc_pct.into());
    f.insert("solar_kw".into(), snapshot.current_solar_kw.into());
    f.insert("load_kw".into(), snapshot.predicted_load_kw.into());
    f.insert("peak_forecast_cents".into(), analysed.forecast_max.into());
    f.insert("avg_forecast_cents".into(), analysed.forecast_avg.into());
    f.insert("solar_remaining_kwh".into(), snapshot.battery.headroom_kwh().into());
    f.insert("aemo_price_mwh".into(), snapshot.grid_state.wholesale_price_aud_per_mwh.into());
    f.insert("vpp_active".into(), snapshot.vpp_event_active.into());
    f
}

fn decision(
    snapshot: &Snapshot,
    analysed: &AnalysedForecast,
    action: BatteryAction,
    power_kw: f64,
    reason: impl Into<String>,
    confidence: f64,
) -> Decision {
    // 5-minute tick convention (§9): expected value is the cents moved this interval.
    let price = match action {
        BatteryAction::ChargeGrid | BatteryAction::ChargeSolar => snapshot.current_import_cents().unwrap_or(0.0),
        BatteryAction::DischargeGrid => snapshot.current_export_cents().unwrap_or(0.0),
        BatteryAction::DischargeHouse => snapshot.current_import_cents().unwrap_or(0.0),
        BatteryAction::Idle => 0.0,
    };
    let expected_value_cents = price * power_kw / 12.0;
    Decision {
        timestamp: snapshot.timestamp,
        action,
        power_kw,
        reason: reason.into(),
        confidence,
        expected_value_cents,
        factors: factors_base(snapshot, analysed),
    }
}

fn fallback_decision(snapshot: &Snapshot, battery: &BatteryConfig) -> Decision {
    let hour = snapshot.timestamp.hour();
    let (action, power_kw, confidence, reason) = if (16..21).contains(&hour) && snapshot.battery.usable_kwh() > 0.0 {
        (BatteryAction::DischargeHouse, battery.max_discharge_kw, 0.5, "FALLBACK: evening peak, self-consume from battery")
    } else if (9..16).contains(&hour) && snapshot.battery.headroom_kwh() > 0.0 {
        (BatteryAction::ChargeSolar, battery.max_charge_kw * 0.5, 0.3, "FALLBACK: daytime, assume solar available")
    } else {
        (BatteryAction::Idle, 0.0, 0.3, "FALLBACK: no price data, preserving battery")
    };
    let mut factors = BTreeMap::new();
    factors.insert("battery_soc".to_string(), snapshot.battery.soc_pct.into());
    factors.insert("hour".to_string(), (hour as f64).into());
    Decision {
        timestamp: snapshot.timestamp,
        action,
        power_kw,
        reason: reason.to_string(),
        confidence,
        expected_value_cents: 0.0,
        factors,
    }
}

/// Chooses exactly one decision for this tick (§4.7, §8's cascade totality property).
pub fn decide(
    snapshot: &Snapshot,
    analysed: &AnalysedForecast,
    plan: Option<&DayPlan>,
    strategy: &StrategyConfig,
    battery_config: &BatteryConfig,
) -> Decision {
    if snapshot.current_import_price.is_none() {
        return fallback_decision(snapshot, battery_config);
    }

    let battery = &snapshot.battery;
    let import_cents = snapshot.current_import_cents().unwrap_or(0.0);
    let export_cents = snapshot.current_export_cents().unwrap_or(0.0);
    let spike = snapshot.current_import_price.as_ref().map(|p| p.spike_status).unwrap_or(SpikeStatus::None);

    // --- Override cascade (§4.7), first match wins. ---
    if snapshot.vpp_event_active && battery.usable_kwh() > 0.0 {
        return decision(snapshot, analysed, BatteryAction::DischargeGrid, battery.max_discharge_kw, "VPP EVENT OVERRIDE: exporting for bonus revenue", 0.95);
    }
    if spike == SpikeStatus::Actual && battery.usable_kwh() > 0.0 {
        let power = snapshot.predicted_load_kw.min(battery.max_discharge_kw);
        return decision(snapshot, analysed, BatteryAction::DischargeHouse, power, "ACTUAL SPIKE OVERRIDE: self-consuming to avoid spike price", 0.99);
    }
    if spike == SpikeStatus::Potential && battery.soc_pct < strategy.spike_reserve_soc_pct {
        return decision(snapshot, analysed, BatteryAction::ChargeGrid, battery.max_charge_kw, "POTENTIAL SPIKE WARNING: building reserve", 0.7);
    }
    if import_cents <= 0.0 && battery.headroom_kwh() > 0.0 {
        return decision(snapshot, analysed, BatteryAction::ChargeGrid, battery.max_charge_kw, "NEGATIVE PRICE OVERRIDE: charging on negative import price", 0.99);
    }
    if export_cents > 500.0 && battery.usable_kwh() > 0.0 {
        return decision(snapshot, analysed, BatteryAction::DischargeGrid, battery.max_discharge_kw, "EXTREME EXPORT OVERRIDE: exceptional sell price", 0.95);
    }

    // --- Plan follow. ---
    let hour = snapshot.timestamp.hour();
    let minute = snapshot.timestamp.minute();
    if let Some(plan) = plan {
        if let Some(scheduled) = plan.action_for_time(hour, minute) {
            let power = match scheduled.action {
                BatteryAction::ChargeGrid | BatteryAction::ChargeSolar => battery.max_charge_kw,
                BatteryAction::DischargeGrid => battery.max_discharge_kw,
                BatteryAction::DischargeHouse => snapshot.predicted_load_kw.min(battery.max_discharge_kw),
                BatteryAction::Idle => 0.0,
            };
            return decision(snapshot, analysed, scheduled.action, power, format!("PLAN: {}", scheduled.reason), 0.8);
        }
    }

    // --- Per-interval heuristic. ---
    let cycle_cost_per_kwh = battery.cycle_cost_per_kwh();
    let effective_buy = import_cents / battery.round_trip_efficiency + cycle_cost_per_kwh;

    let descriptor_is_cheap = matches!(snapshot.descriptor, crate::domain::PriceDescriptor::ExtremelyLow | crate::domain::PriceDescriptor::VeryLow);
    if descriptor_is_cheap && battery.headroom_kwh() > 0.0 && (analysed.forecast_max - effective_buy) >= 5.0 {
        return decision(snapshot, analysed, BatteryAction::ChargeGrid, battery.max_charge_kw, "Cheap price descriptor with profitable margin to forecast peak", 0.8);
    }
    if import_cents < strategy.charge_price_threshold_cents && battery.headroom_kwh() > 0.0 && (analysed.forecast_max - effective_buy) >= 8.0 {
        return decision(snapshot, analysed, BatteryAction::ChargeGrid, battery.max_charge_kw, "Below charge price threshold with margin to forecast peak", 0.75);
    }
    if export_cents > strategy.sell_price_threshold_cents && battery.usable_kwh() > 0.0 {
        let higher_later = snapshot
            .price_forecast
            .iter()
            .filter(|p| p.channel == crate::domain::PriceChannel::General)
            .take(36) // next 3h of 5-minute intervals
            .any(|p| p.per_kwh_cents > export_cents * 1.3);
        if !higher_later {
            return decision(snapshot, analysed, BatteryAction::DischargeGrid, battery.max_discharge_kw, "Above sell price threshold, no better price expected soon", 0.85);
        }
    }
    if snapshot.current_solar_kw - snapshot.predicted_load_kw > 0.3 && battery.headroom_kwh() > 0.0 {
        return decision(snapshot, analysed, BatteryAction::ChargeSolar, battery.max_charge_kw, "Solar generation exceeds house load", 0.9);
    }
    let tariff_is_peak = snapshot.tariff_period == Some(TariffPeriod::Peak);
    if (tariff_is_peak || import_cents > analysed.forecast_avg * 1.2) && battery.usable_kwh() > 0.0 {
        let power = snapshot.predicted_load_kw.min(battery.max_discharge_kw);
        let savings = import_cents * power / 12.0;
        let degradation = cycle_cost_per_kwh * power / 12.0;
        if savings - degradation > 0.0 {
            return decision(snapshot, analysed, BatteryAction::DischargeHouse, power, "Self-consume: peak tariff or above-average import price", 0.7);
        }
    }

    decision(
        snapshot,
        analysed,
        BatteryAction::Idle,
        0.0,
        format!("No favourable action: import {:.1}c export {:.1}c SOC {:.0}%", import_cents, export_cents, battery.soc_pct),
        0.6,
    )
}

/// Builds a conservative default `Decision` used when the whole tick body fails (§7: "transient
/// tick failure" — attempt a fallback decision from a default battery state).
pub fn emergency_fallback(snapshot: &Snapshot, battery_config: &BatteryConfig) -> Decision {
    fallback_decision(snapshot, battery_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BatteryState, GridState, IntervalType, PriceChannel, PriceDescriptor, PriceInterval};
    use chrono::TimeZone;

    fn battery(soc_pct: f64) -> BatteryState {
        let capacity = 13.5;
        BatteryState::new(soc_pct, capacity * soc_pct / 100.0, capacity, 5.0, 5.0, 0.9, 5.0, 20.0).unwrap()
    }

    fn base_snapshot(import_cents: Option<f64>, export_cents: f64, spike: SpikeStatus, soc_pct: f64) -> Snapshot {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let current_import_price = import_cents.map(|c| PriceInterval {
            timestamp: ts,
            end_time: ts + chrono::Duration::minutes(5),
            per_kwh_cents: c,
            spot_per_kwh_cents: c,
            channel: PriceChannel::General,
            spike_status: spike,
            descriptor: PriceDescriptor::Neutral,
            renewables_pct: 0.0,
            tariff: None,
            duration_minutes: 5,
            interval_type: IntervalType::Current,
            is_estimate: false,
        });
        Snapshot {
            timestamp: ts,
            current_import_price,
            current_export_price: Some(PriceInterval {
                timestamp: ts,
                end_time: ts + chrono::Duration::minutes(5),
                per_kwh_cents: export_cents,
                spot_per_kwh_cents: export_cents,
                channel: PriceChannel::FeedIn,
                spike_status: SpikeStatus::None,
                descriptor: PriceDescriptor::Neutral,
                renewables_pct: 0.0,
                tariff: None,
                duration_minutes: 5,
                interval_type: IntervalType::Current,
                is_estimate: false,
            }),
            price_forecast: vec![],
            price_history: vec![],
            battery: battery(soc_pct),
            solar_forecast: vec![],
            current_solar_kw: 0.0,
            grid_state: GridState::zero_filled("NSW1", ts),
            predicted_load_kw: 1.0,
            vpp_event_active: false,
            interval_minutes: 5,
            tariff_period: None,
            tariff_season: None,
            descriptor: PriceDescriptor::Neutral,
        }
    }

    fn empty_analysed() -> AnalysedForecast {
        AnalysedForecast {
            forecast_min: 10.0,
            forecast_avg: 20.0,
            forecast_max: 30.0,
            export_avg: 5.0,
            export_max: 10.0,
            cheapest_windows: vec![],
            expensive_windows: vec![],
            best_sell_windows: vec![],
            negative_intervals: 0,
            spike_intervals: 0,
        }
    }

    fn strategy() -> StrategyConfig {
        StrategyConfig::default()
    }

    fn battery_cfg() -> BatteryConfig {
        BatteryConfig::default()
    }

    #[test]
    fn scenario_1_negative_price_charges() {
        let snap = base_snapshot(Some(-2.0), 5.0, SpikeStatus::None, 60.0);
        let d = decide(&snap, &empty_analysed(), None, &strategy(), &battery_cfg());
        assert_eq!(d.action, BatteryAction::ChargeGrid);
        assert_eq!(d.power_kw, snap.battery.max_charge_kw);
        assert!((d.confidence - 0.99).abs() < 1e-9);
        assert!(d.reason.contains("NEGATIVE"));
    }

    #[test]
    fn scenario_2_actual_spike_discharges_house() {
        let snap = base_snapshot(Some(180.0), 10.0, SpikeStatus::Actual, 70.0);
        let d = decide(&snap, &empty_analysed(), None, &strategy(), &battery_cfg());
        assert_eq!(d.action, BatteryAction::DischargeHouse);
        assert!((d.power_kw - snap.predicted_load_kw.min(snap.battery.max_discharge_kw)).abs() < 1e-9);
        assert!((d.confidence - 0.99).abs() < 1e-9);
    }

    #[test]
    fn scenario_3_vpp_beats_spike_by_cascade_order() {
        let mut snap = base_snapshot(Some(180.0), 10.0, SpikeStatus::Actual, 80.0);
        snap.vpp_event_active = true;
        let d = decide(&snap, &empty_analysed(), None, &strategy(), &battery_cfg());
        assert_eq!(d.action, BatteryAction::DischargeGrid);
        assert!((d.confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn scenario_5_no_retailer_data_falls_back() {
        let mut snap = base_snapshot(None, 5.0, SpikeStatus::None, 50.0);
        snap.timestamp = Utc.with_ymd_and_hms(2026, 1, 1, 17, 0, 0).unwrap();
        let d = decide(&snap, &empty_analysed(), None, &strategy(), &battery_cfg());
        assert!(d.is_fallback());
        assert!(d.confidence <= 0.5);
        assert_eq!(d.action, BatteryAction::DischargeHouse);
    }

    #[test]
    fn cascade_is_total_idle_has_zero_power() {
        let snap = base_snapshot(Some(15.0), 5.0, SpikeStatus::None, 50.0);
        let d = decide(&snap, &empty_analysed(), None, &strategy(), &battery_cfg());
        if d.action == BatteryAction::Idle {
            assert_eq!(d.power_kw, 0.0);
        }
    }
}
