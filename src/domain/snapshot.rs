//! The immutable per-tick system snapshot produced by the Data Collector (C4, §4.4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::battery::BatteryState;
use super::types::{GridState, PriceDescriptor, PriceInterval, SolarForecast, TariffPeriod, TariffSeason};

/// Everything the Analyser, Planner, and Supervisor need to make a decision at tick `timestamp`.
/// Built once by the Collector and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub current_import_price: Option<PriceInterval>,
    pub current_export_price: Option<PriceInterval>,
    /// Future (forecast) intervals only, both channels.
    pub price_forecast: Vec<PriceInterval>,
    /// Today's settled (actual) intervals, both channels.
    pub price_history: Vec<PriceInterval>,
    pub battery: BatteryState,
    pub solar_forecast: Vec<SolarForecast>,
    pub current_solar_kw: f64,
    pub grid_state: GridState,
    pub predicted_load_kw: f64,
    pub vpp_event_active: bool,
    pub interval_minutes: u32,
    pub tariff_period: Option<TariffPeriod>,
    pub tariff_season: Option<TariffSeason>,
    pub descriptor: PriceDescriptor,
}

impl Snapshot {
    pub fn current_import_cents(&self) -> Option<f64> {
        self.current_import_price.as_ref().map(|p| p.per_kwh_cents)
    }

    pub fn current_export_cents(&self) -> Option<f64> {
        self.current_export_price.as_ref().map(|p| p.per_kwh_cents)
    }
}
