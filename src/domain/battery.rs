//! Battery state of charge and its derived/invariant-checked quantities (§3).

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum BatteryStateError {
    #[error("soc_kwh {soc_kwh} out of range [0, {capacity_kwh}]")]
    SocOutOfRange { soc_kwh: f64, capacity_kwh: f64 },
    #[error("min_soc_pct {0} must be in [0, 100)")]
    MinSocOutOfRange(f64),
    #[error("round_trip_efficiency {0} must be in (0, 1]")]
    EfficiencyOutOfRange(f64),
}

/// The battery's state of charge and physical characteristics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryState {
    pub soc_pct: f64,
    pub soc_kwh: f64,
    pub capacity_kwh: f64,
    pub max_charge_kw: f64,
    pub max_discharge_kw: f64,
    pub round_trip_efficiency: f64,
    pub cycle_cost_cents: f64,
    pub min_soc_pct: f64,
}

impl BatteryState {
    /// Validates the invariants from §3 before returning a `BatteryState`.
    pub fn new(
        soc_pct: f64,
        soc_kwh: f64,
        capacity_kwh: f64,
        max_charge_kw: f64,
        max_discharge_kw: f64,
        round_trip_efficiency: f64,
        cycle_cost_cents: f64,
        min_soc_pct: f64,
    ) -> Result<Self, BatteryStateError> {
        if !(0.0..=capacity_kwh).contains(&soc_kwh) {
            return Err(BatteryStateError::SocOutOfRange { soc_kwh, capacity_kwh });
        }
        if !(0.0..100.0).contains(&min_soc_pct) {
            return Err(BatteryStateError::MinSocOutOfRange(min_soc_pct));
        }
        if !(round_trip_efficiency > 0.0 && round_trip_efficiency <= 1.0) {
            return Err(BatteryStateError::EfficiencyOutOfRange(round_trip_efficiency));
        }
        Ok(Self {
            soc_pct,
            soc_kwh,
            capacity_kwh,
            max_charge_kw,
            max_discharge_kw,
            round_trip_efficiency,
            cycle_cost_cents,
            min_soc_pct,
        })
    }

    /// A conservative default battery state (50% SOC), used when the retailer does not publish
    /// a battery channel and the collector must synthesise one from config (§4.4).
    pub fn default_from_config(
        capacity_kwh: f64,
        max_charge_kw: f64,
        max_discharge_kw: f64,
        round_trip_efficiency: f64,
        cycle_cost_cents: f64,
        min_soc_pct: f64,
    ) -> Self {
        Self::new(
            50.0,
            capacity_kwh * 0.5,
            capacity_kwh,
            max_charge_kw,
            max_discharge_kw,
            round_trip_efficiency,
            cycle_cost_cents,
            min_soc_pct,
        )
        .expect("default battery state is always within invariants")
    }

    /// Energy that can be discharged before hitting the configured minimum SOC reserve.
    pub fn usable_kwh(&self) -> f64 {
        (self.soc_kwh - self.capacity_kwh * self.min_soc_pct / 100.0).max(0.0)
    }

    /// Energy that can still be charged before the battery is full.
    pub fn headroom_kwh(&self) -> f64 {
        self.capacity_kwh - self.soc_kwh
    }

    /// Amortised degradation cost, in cents per kWh cycled, derived from `cycle_cost_cents`
    /// (a per-full-cycle cost) and the battery's capacity.
    pub fn cycle_cost_per_kwh(&self) -> f64 {
        if self.capacity_kwh <= 0.0 {
            0.0
        } else {
            self.cycle_cost_cents / self.capacity_kwh
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn battery(soc_kwh: f64) -> BatteryState {
        BatteryState::new(soc_kwh / 13.5 * 100.0, soc_kwh, 13.5, 5.0, 5.0, 0.9, 5.0, 20.0).unwrap()
    }

    #[test]
    fn usable_and_headroom_respect_invariant() {
        let b = battery(10.0);
        assert!(b.soc_kwh >= 0.0 && b.soc_kwh <= b.capacity_kwh);
        assert!(b.usable_kwh() + b.headroom_kwh() <= b.capacity_kwh + 1e-9);
    }

    #[test]
    fn usable_kwh_is_zero_below_reserve() {
        let b = battery(1.0); // well below the 20% * 13.5 = 2.7 kWh reserve
        assert_eq!(b.usable_kwh(), 0.0);
    }

    #[test]
    fn rejects_soc_out_of_range() {
        assert!(BatteryState::new(200.0, 20.0, 13.5, 5.0, 5.0, 0.9, 5.0, 20.0).is_err());
    }

    #[test]
    fn rejects_invalid_efficiency() {
        assert!(BatteryState::new(50.0, 6.75, 13.5, 5.0, 5.0, 1.5, 5.0, 20.0).is_err());
        assert!(BatteryState::new(50.0, 6.75, 13.5, 5.0, 5.0, 0.0, 5.0, 20.0).is_err());
    }

    #[test]
    fn default_from_config_is_half_soc() {
        let b = BatteryState::default_from_config(13.5, 5.0, 5.0, 0.9, 5.0, 20.0);
        assert_eq!(b.soc_pct, 50.0);
        assert!((b.soc_kwh - 6.75).abs() < 1e-9);
    }
}
