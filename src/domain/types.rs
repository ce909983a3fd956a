//! Core enumerations and wire-level interval types (§3 of the design spec).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The action the supervisor commands the battery to take for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BatteryAction {
    ChargeGrid,
    ChargeSolar,
    DischargeGrid,
    DischargeHouse,
    Idle,
}

/// Whether a price spike is forecast, happening now, or absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SpikeStatus {
    #[default]
    None,
    Potential,
    Actual,
}

/// Unknown values on the wire degrade to `None` rather than failing the parse.
impl SpikeStatus {
    pub fn from_wire(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

/// Which metered channel a price or usage interval belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "camelCase")]
pub enum PriceChannel {
    #[default]
    #[serde(rename = "general")]
    #[strum(serialize = "general")]
    General,
    #[serde(rename = "feedIn")]
    #[strum(serialize = "feedIn")]
    FeedIn,
    #[serde(rename = "controlledLoad")]
    #[strum(serialize = "controlledLoad")]
    ControlledLoad,
}

impl PriceChannel {
    pub fn from_wire(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

/// Coarse price-level classification used by the per-interval heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PriceDescriptor {
    Negative,
    ExtremelyLow,
    VeryLow,
    Low,
    #[default]
    Neutral,
    High,
    Spike,
}

impl PriceDescriptor {
    pub fn from_wire(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

/// Retail tariff time-of-use period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "camelCase")]
pub enum TariffPeriod {
    #[serde(rename = "offPeak")]
    #[strum(serialize = "offPeak")]
    OffPeak,
    Shoulder,
    Peak,
}

/// Calendar season, for tariff schedules that vary seasonally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TariffSeason {
    Summer,
    Autumn,
    Winter,
    Spring,
}

/// Whether an interval is a settled actual, the live current interval, or a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "PascalCase")]
pub enum IntervalType {
    #[serde(rename = "ActualInterval")]
    #[strum(serialize = "ActualInterval")]
    Actual,
    #[serde(rename = "CurrentInterval")]
    #[strum(serialize = "CurrentInterval")]
    Current,
    #[default]
    #[serde(rename = "ForecastInterval")]
    #[strum(serialize = "ForecastInterval")]
    Forecast,
}

impl IntervalType {
    pub fn from_wire(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

/// A 5-minute retail price interval, for either the general (import) or feed-in (export) channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceInterval {
    pub timestamp: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub per_kwh_cents: f64,
    pub spot_per_kwh_cents: f64,
    pub channel: PriceChannel,
    pub spike_status: SpikeStatus,
    pub descriptor: PriceDescriptor,
    pub renewables_pct: f64,
    pub tariff: Option<TariffPeriod>,
    pub duration_minutes: u32,
    pub interval_type: IntervalType,
    pub is_estimate: bool,
}

impl PriceInterval {
    pub fn is_forecast(&self) -> bool {
        self.interval_type == IntervalType::Forecast
    }

    pub fn is_current(&self) -> bool {
        self.interval_type == IntervalType::Current
    }
}

/// Data quality of a historical usage reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UsageQuality {
    #[default]
    Billable,
    Estimated,
}

/// A 5-minute historical usage interval, as billed or estimated by the retailer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageInterval {
    pub timestamp: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub channel: PriceChannel,
    pub channel_id: String,
    pub kwh: f64,
    pub cost_cents: f64,
    pub per_kwh_cents: f64,
    pub spot_per_kwh_cents: f64,
    pub spike_status: SpikeStatus,
    pub descriptor: PriceDescriptor,
    pub renewables_pct: f64,
    pub tariff: Option<TariffPeriod>,
    pub quality: UsageQuality,
}

/// An hourly solar generation forecast point, derived from weather data (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolarForecast {
    pub timestamp: DateTime<Utc>,
    pub generation_kw: f64,
    pub cloud_cover_pct: f64,
    pub temperature_c: f64,
}

/// A wholesale-market region summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridState {
    pub timestamp: DateTime<Utc>,
    pub region: String,
    pub demand_mw: f64,
    pub wholesale_price_aud_per_mwh: f64,
    pub renewables_pct: f64,
    pub interconnector_flow_mw: f64,
}

impl GridState {
    /// A zero-filled placeholder used when the wholesale market source is unavailable.
    pub fn zero_filled(region: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            region: region.to_string(),
            demand_mw: 0.0,
            wholesale_price_aud_per_mwh: 0.0,
            renewables_pct: 0.0,
            interconnector_flow_mw: 0.0,
        }
    }
}

/// Converts direct solar irradiance (W/m²) to generated kW using a fixed affine panel model.
///
/// `kW ≈ irradiance · A_eff · η / 1000` (§4.2). Negative or missing irradiance never produces
/// negative generation.
pub fn irradiance_to_kw(irradiance_w_m2: f64, effective_area_m2: f64, panel_efficiency: f64) -> f64 {
    (irradiance_w_m2.max(0.0) * effective_area_m2 * panel_efficiency / 1000.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spike_status_unknown_value_degrades_to_none() {
        assert_eq!(SpikeStatus::from_wire("bogus"), SpikeStatus::None);
        assert_eq!(SpikeStatus::from_wire("actual"), SpikeStatus::Actual);
    }

    #[test]
    fn price_channel_unknown_value_degrades_to_general() {
        assert_eq!(PriceChannel::from_wire("something_else"), PriceChannel::General);
        assert_eq!(PriceChannel::from_wire("feedIn"), PriceChannel::FeedIn);
    }

    #[test]
    fn descriptor_unknown_value_degrades_to_neutral() {
        assert_eq!(PriceDescriptor::from_wire("???"), PriceDescriptor::Neutral);
        assert_eq!(PriceDescriptor::from_wire("spike"), PriceDescriptor::Spike);
    }

    #[test]
    fn irradiance_model_matches_defaults() {
        // 800 W/m^2 * 20 m^2 * 0.15 / 1000 = 2.4 kW
        let kw = irradiance_to_kw(800.0, 20.0, 0.15);
        assert!((kw - 2.4).abs() < 1e-9);
    }

    #[test]
    fn irradiance_model_never_negative() {
        assert_eq!(irradiance_to_kw(-50.0, 20.0, 0.15), 0.0);
    }

    #[test]
    fn interval_type_wire_names_round_trip() {
        assert_eq!(IntervalType::from_wire("ActualInterval"), IntervalType::Actual);
        assert_eq!(IntervalType::from_wire("ForecastInterval"), IntervalType::Forecast);
        assert_eq!(IntervalType::from_wire("unknown"), IntervalType::Forecast);
    }
}
