//! Day-Ahead Planner (C6, §4.6): builds a `DayPlan` by matching charge windows to sell windows
//! for arbitrage, then overlaying self-consume and solar-charge windows.
//!
//! Grounded on the prototype's `strategy/planner.py::build_day_plan` — the richest/canonical
//! variant per §9 (supersedes `planner.py`'s own simpler `should_override` and `monitor.py`'s
//! `gridpilot_recommendation`, neither of which is the planner itself).
//!
//! Expected-value convention for this layer: **30-minute window** energy (`power_kw * 0.5h`),
//! per §9's documented resolution of the ambiguous source behaviour (the Supervisor, by
//! contrast, uses the 5-minute convention — see `supervisor.rs`).

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Utc};
use ordered_float::OrderedFloat;

use crate::analyser::Window;
use crate::config::BatteryConfig;
use crate::domain::{BatteryAction, DayPlan, PlanSummary, ScheduledAction, SolarForecast, TariffPeriod, UsageProfile};

const MIN_ARBITRAGE_MARGIN_CENTS: f64 = 5.0;

fn charge_penalty(tariff: Option<TariffPeriod>) -> f64 {
    match tariff {
        Some(TariffPeriod::OffPeak) | None => 0.0,
        Some(TariffPeriod::Shoulder) => 3.0,
        Some(TariffPeriod::Peak) => 10.0,
    }
}

fn self_consume_bonus(tariff: Option<TariffPeriod>) -> f64 {
    match tariff {
        Some(TariffPeriod::OffPeak) | None => 0.0,
        Some(TariffPeriod::Shoulder) => 5.0,
        Some(TariffPeriod::Peak) => 15.0,
    }
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn solar_kw_for_hour(solar_forecast: &[SolarForecast], at: DateTime<Utc>) -> f64 {
    solar_forecast
        .iter()
        .min_by_key(|s| (s.timestamp - at).num_minutes().abs())
        .map(|s| s.generation_kw)
        .unwrap_or(0.0)
}

fn make_action(
    window: &Window,
    action: BatteryAction,
    reason: String,
    expected_value_cents: f64,
    priority: u8,
) -> ScheduledAction {
    ScheduledAction {
        start_time: window.start.time(),
        end_time: window.end.time(),
        start_timestamp: window.start,
        action,
        reason,
        import_price: Some(window.import_cents),
        export_price: Some(window.export_cents),
        expected_value_cents,
        priority,
    }
}

/// Builds the day-ahead plan from a set of 30-minute windows (§4.6). `windows` need not be
/// pre-sorted; this function sorts a working copy by start time.
pub fn build_day_plan(
    mut windows: Vec<Window>,
    profile: &UsageProfile,
    solar_forecast: &[SolarForecast],
    battery: &BatteryConfig,
    now: DateTime<Utc>,
) -> DayPlan {
    windows.sort_by_key(|w| w.start);

    // Step 1: annotate.
    for w in windows.iter_mut() {
        let is_weekday = w.start.weekday().number_from_monday() < 6;
        let hour = w.start.format("%H").to_string().parse::<u32>().unwrap_or(0);
        w.solar_kw = Some(solar_kw_for_hour(solar_forecast, w.start));
        w.load_kw = Some(profile.predicted_import_kw(hour, is_weekday));
        w.expected_export_kw = Some(profile.predicted_export_kw(hour, is_weekday));
    }

    if windows.is_empty() {
        return DayPlan::empty(now);
    }

    let cycle_cost_per_kwh = if battery.capacity_kwh > 0.0 {
        battery.cycle_cost_cents / battery.capacity_kwh
    } else {
        0.0
    };
    let efficiency = battery.round_trip_efficiency;

    // Step 2: candidate pools.
    let mut charge_candidates: Vec<usize> = windows
        .iter()
        .enumerate()
        .filter(|(_, w)| w.import_cents > 0.0)
        .map(|(i, _)| i)
        .collect();
    charge_candidates.sort_by_key(|&i| {
        OrderedFloat(windows[i].import_cents / efficiency + cycle_cost_per_kwh + charge_penalty(windows[i].tariff_period))
    });

    let mut sell_candidates: Vec<usize> = windows
        .iter()
        .enumerate()
        .filter(|(_, w)| w.export_cents > 0.0)
        .map(|(i, _)| i)
        .collect();
    sell_candidates.sort_by_key(|&i| std::cmp::Reverse(OrderedFloat(windows[i].export_cents)));

    let mut used: HashSet<usize> = HashSet::new();
    let mut schedule: Vec<ScheduledAction> = Vec::new();
    let mut arbitrage_pairs = 0u32;
    let mut remaining = battery.capacity_kwh * (1.0 - battery.min_soc_pct / 100.0);

    // Step 3: arbitrage matching.
    'sell_loop: for &s in &sell_candidates {
        if remaining <= 0.0 {
            break;
        }
        if used.contains(&s) {
            continue;
        }
        for &c in &charge_candidates {
            if used.contains(&c) || windows[c].start >= windows[s].start {
                continue;
            }
            let effective_buy = windows[c].import_cents / efficiency + cycle_cost_per_kwh;
            let margin = windows[s].export_cents - effective_buy;
            if margin >= MIN_ARBITRAGE_MARGIN_CENTS {
                let window_kwh = (battery.max_charge_kw * 0.5).min(remaining);
                schedule.push(make_action(
                    &windows[c],
                    BatteryAction::ChargeGrid,
                    format!("Arbitrage charge: buy at {:.2}c, sell later at {:.2}c (margin {:.2}c)", windows[c].import_cents, windows[s].export_cents, margin),
                    margin * window_kwh,
                    1,
                ));
                schedule.push(make_action(
                    &windows[s],
                    BatteryAction::DischargeGrid,
                    format!("Arbitrage sell: bought earlier at {:.2}c, selling at {:.2}c (margin {:.2}c)", windows[c].import_cents, windows[s].export_cents, margin),
                    windows[s].export_cents * window_kwh,
                    1,
                ));
                used.insert(c);
                used.insert(s);
                remaining -= window_kwh;
                arbitrage_pairs += 1;
                continue 'sell_loop;
            }
        }
    }

    // Step 4: self-consume overlay.
    let all_import_cents: Vec<f64> = windows.iter().map(|w| w.import_cents).collect();
    let median_import = median(&all_import_cents);
    let mut self_consume_candidates: Vec<usize> = windows
        .iter()
        .enumerate()
        .filter(|(i, w)| !used.contains(i) && w.load_kw.unwrap_or(0.0) - w.solar_kw.unwrap_or(0.0) > 0.0)
        .map(|(i, _)| i)
        .collect();
    self_consume_candidates.sort_by_key(|&i| std::cmp::Reverse(OrderedFloat(windows[i].import_cents + self_consume_bonus(windows[i].tariff_period))));

    let mut self_consume_windows = 0u32;
    for &i in &self_consume_candidates {
        let w = &windows[i];
        let qualifies = matches!(w.tariff_period, Some(TariffPeriod::Peak) | Some(TariffPeriod::Shoulder))
            || w.import_cents > median_import
            || w.spike_risk;
        if qualifies {
            schedule.push(make_action(
                w,
                BatteryAction::DischargeHouse,
                format!("Self-consume: house load exceeds solar at {:.2}c import", w.import_cents),
                w.import_cents * (battery.max_discharge_kw * 0.5).min(remaining.max(0.0)),
                2,
            ));
            used.insert(i);
            self_consume_windows += 1;
        }
    }

    // Step 5: solar-charge overlay.
    let mut solar_charge_windows = 0u32;
    for (i, w) in windows.iter().enumerate() {
        if used.contains(&i) {
            continue;
        }
        let solar = w.solar_kw.unwrap_or(0.0);
        let load = w.load_kw.unwrap_or(0.0);
        if solar > load + 0.3 {
            let excess = solar - load;
            let sized = excess.min(battery.max_charge_kw);
            schedule.push(make_action(
                w,
                BatteryAction::ChargeSolar,
                format!("Solar excess charge: {:.2}kW solar vs {:.2}kW load", solar, load),
                w.export_cents * sized * 0.5,
                3,
            ));
            solar_charge_windows += 1;
        }
    }

    // Step 6: sort and summarise.
    schedule.sort_by_key(|a| a.start_timestamp);
    let sell_windows = schedule.iter().filter(|a| a.action == BatteryAction::DischargeGrid).count() as u32;
    let charge_windows = schedule.iter().filter(|a| a.action == BatteryAction::ChargeGrid).count() as u32;
    let total_expected_cents = schedule.iter().map(|a| a.expected_value_cents).sum();

    DayPlan {
        created_at: now,
        built_for_hour: now.format("%H").to_string().parse().unwrap_or(0),
        schedule,
        summary: PlanSummary {
            arbitrage_pairs,
            total_expected_cents,
            charge_windows,
            sell_windows,
            self_consume_windows,
            solar_charge_windows,
        },
    }
}
