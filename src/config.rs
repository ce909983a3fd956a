//! Process-wide configuration (§6, SPEC_FULL.md §A.1), loaded once at startup via `figment` and
//! validated with `validator` before anything else runs.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

fn default_capacity_kwh() -> f64 {
    13.5
}
fn default_max_charge_kw() -> f64 {
    5.0
}
fn default_max_discharge_kw() -> f64 {
    5.0
}
fn default_efficiency() -> f64 {
    0.9
}
fn default_min_soc_pct() -> f64 {
    20.0
}
fn default_cycle_cost_cents() -> f64 {
    5.0
}
fn default_charge_threshold() -> f64 {
    8.0
}
fn default_sell_threshold() -> f64 {
    25.0
}
fn default_spike_reserve_soc_pct() -> f64 {
    40.0
}
fn default_max_failures_before_alert() -> u32 {
    3
}
fn default_effective_area_m2() -> f64 {
    20.0
}
fn default_panel_efficiency() -> f64 {
    0.15
}
fn default_days_back() -> u32 {
    30
}
fn default_base_load_percentile() -> f64 {
    10.0
}
fn default_solar_peak_percentile() -> f64 {
    90.0
}
fn default_min_days_required() -> u32 {
    7
}
fn default_decision_interval_seconds() -> u64 {
    300
}
fn default_client_timeout_seconds() -> u64 {
    15
}
fn default_retry_deadline_seconds() -> u64 {
    270
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_dir() -> String {
    "./logs".to_string()
}
fn default_decision_log_path() -> String {
    "./data/decisions.log".to_string()
}
fn default_usage_profile_path() -> String {
    "./data/usage_profile.json".to_string()
}
fn default_retailer_base_url() -> String {
    "https://api.amber.com.au/v1".to_string()
}
fn default_weather_base_url() -> String {
    "https://api.open-meteo.com/v1".to_string()
}
fn default_wholesale_url() -> String {
    "https://visualisations.aemo.com.au/aemo/apps/api/report/ELEC_NEM_SUMMARY".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RetailerConfig {
    #[validate(length(min = 1, message = "retailer API token must not be empty"))]
    pub api_token: String,
    #[validate(length(min = 1, message = "retailer site id must not be empty"))]
    pub site_id: String,
    #[serde(default = "default_retailer_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self { base_url: default_weather_base_url() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_battery_config"))]
pub struct BatteryConfig {
    #[serde(default = "default_capacity_kwh")]
    #[validate(range(min = 0.1, message = "capacity_kwh must be positive"))]
    pub capacity_kwh: f64,
    #[serde(default = "default_max_charge_kw")]
    #[validate(range(min = 0.0))]
    pub max_charge_kw: f64,
    #[serde(default = "default_max_discharge_kw")]
    #[validate(range(min = 0.0))]
    pub max_discharge_kw: f64,
    #[serde(default = "default_efficiency")]
    #[validate(range(min = 0.01, max = 1.0))]
    pub round_trip_efficiency: f64,
    #[serde(default = "default_min_soc_pct")]
    #[validate(range(min = 0.0, max = 99.99))]
    pub min_soc_pct: f64,
    #[serde(default = "default_cycle_cost_cents")]
    #[validate(range(min = 0.0))]
    pub cycle_cost_cents: f64,
}

fn validate_battery_config(cfg: &BatteryConfig) -> Result<(), ValidationError> {
    if cfg.max_charge_kw <= 0.0 || cfg.max_discharge_kw <= 0.0 {
        let mut err = ValidationError::new("battery_power");
        err.message = Some("max_charge_kw and max_discharge_kw must both be positive".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LocationConfig {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(length(min = 1))]
    pub wholesale_region: String,
    #[serde(default = "default_wholesale_url")]
    pub wholesale_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StrategyConfig {
    #[serde(default = "default_charge_threshold")]
    pub charge_price_threshold_cents: f64,
    #[serde(default = "default_sell_threshold")]
    pub sell_price_threshold_cents: f64,
    #[serde(default = "default_spike_reserve_soc_pct")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub spike_reserve_soc_pct: f64,
    #[serde(default = "default_max_failures_before_alert")]
    pub max_failures_before_alert: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SolarModelConfig {
    #[serde(default = "default_effective_area_m2")]
    #[validate(range(min = 0.0))]
    pub effective_area_m2: f64,
    #[serde(default = "default_panel_efficiency")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub panel_efficiency: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LearnerConfig {
    #[serde(default = "default_days_back")]
    pub days_back: u32,
    #[serde(default = "default_base_load_percentile")]
    pub base_load_percentile: f64,
    #[serde(default = "default_solar_peak_percentile")]
    pub solar_peak_percentile: f64,
    #[serde(default = "default_min_days_required")]
    pub min_days_required: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TickConfig {
    #[serde(default = "default_decision_interval_seconds")]
    #[validate(range(min = 1))]
    pub decision_interval_seconds: u64,
    #[serde(default = "default_client_timeout_seconds")]
    pub client_timeout_seconds: u64,
    #[serde(default = "default_retry_deadline_seconds")]
    pub retry_deadline_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_decision_log_path")]
    pub decision_log_path: String,
    #[serde(default = "default_usage_profile_path")]
    pub usage_profile_path: String,
}

impl Default for SolarModelConfig {
    fn default() -> Self {
        Self {
            effective_area_m2: default_effective_area_m2(),
            panel_efficiency: default_panel_efficiency(),
        }
    }
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            days_back: default_days_back(),
            base_load_percentile: default_base_load_percentile(),
            solar_peak_percentile: default_solar_peak_percentile(),
            min_days_required: default_min_days_required(),
        }
    }
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            decision_interval_seconds: default_decision_interval_seconds(),
            client_timeout_seconds: default_client_timeout_seconds(),
            retry_deadline_seconds: default_retry_deadline_seconds(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            decision_log_path: default_decision_log_path(),
            usage_profile_path: default_usage_profile_path(),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            charge_price_threshold_cents: default_charge_threshold(),
            sell_price_threshold_cents: default_sell_threshold(),
            spike_reserve_soc_pct: default_spike_reserve_soc_pct(),
            max_failures_before_alert: default_max_failures_before_alert(),
        }
    }
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_kwh: default_capacity_kwh(),
            max_charge_kw: default_max_charge_kw(),
            max_discharge_kw: default_max_discharge_kw(),
            round_trip_efficiency: default_efficiency(),
            min_soc_pct: default_min_soc_pct(),
            cycle_cost_cents: default_cycle_cost_cents(),
        }
    }
}

/// Top-level application configuration. Validated as a whole by `AppConfig::load`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub retailer: RetailerConfig,
    #[serde(default)]
    #[validate(nested)]
    pub battery: BatteryConfig,
    #[validate(nested)]
    pub location: LocationConfig,
    #[serde(default)]
    #[validate(nested)]
    pub weather: WeatherConfig,
    #[serde(default)]
    #[validate(nested)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    #[validate(nested)]
    pub solar_model: SolarModelConfig,
    #[serde(default)]
    #[validate(nested)]
    pub learner: LearnerConfig,
    #[serde(default)]
    #[validate(nested)]
    pub tick: TickConfig,
    #[serde(default)]
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Loads configuration from `config/default.toml`, an optional `config/local.toml`, and
    /// `GRIDPILOT__`-prefixed environment variables (highest precedence), after loading a `.env`
    /// file if present. Fails fast (Fatal, §7) on missing credentials or invalid values.
    pub fn load() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        let cfg: AppConfig = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Toml::file("config/local.toml"))
            .merge(Env::prefixed("GRIDPILOT__").split("__"))
            .extract()
            .map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?;
        cfg.validate()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            retailer: RetailerConfig {
                api_token: "token".into(),
                site_id: "site-1".into(),
                base_url: default_retailer_base_url(),
            },
            battery: BatteryConfig::default(),
            location: LocationConfig {
                latitude: -33.8,
                longitude: 151.2,
                wholesale_region: "NSW1".into(),
                wholesale_url: default_wholesale_url(),
            },
            weather: WeatherConfig::default(),
            strategy: StrategyConfig::default(),
            solar_model: SolarModelConfig::default(),
            learner: LearnerConfig::default(),
            tick: TickConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn empty_retailer_token_fails_validation() {
        let mut cfg = valid_config();
        cfg.retailer.api_token.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_max_charge_kw_fails_schema_validation() {
        let mut cfg = valid_config();
        cfg.battery.max_charge_kw = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn out_of_range_efficiency_fails_validation() {
        let mut cfg = valid_config();
        cfg.battery.round_trip_efficiency = 1.5;
        assert!(cfg.validate().is_err());
    }
}
