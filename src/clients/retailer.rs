//! Retailer prices/usage adapter (C1, §4.2). Grounded on the prototype's `api/amber.py`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::domain::{BatteryState, PriceChannel, PriceDescriptor, PriceInterval, SpikeStatus, TariffPeriod};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request timed out")]
    Timeout,
    #[error("http error: {0}")]
    Http(reqwest::StatusCode),
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Retailer price feed: current-tick prices and the forward forecast.
#[async_trait]
pub trait RetailerPriceClient: Send + Sync {
    async fn current_prices(&self) -> Result<Vec<PriceInterval>, ClientError>;
    async fn price_forecast(&self, next_hours: u32) -> Result<Vec<PriceInterval>, ClientError>;
    async fn close(&self);
}

/// Retailer historical usage feed, used by the Usage Learner and for battery SOC extraction.
#[async_trait]
pub trait RetailerUsageClient: Send + Sync {
    async fn usage(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<UsageRow>, ClientError>;
    async fn close(&self);
}

/// A raw historical usage row, deliberately looser than `UsageInterval` because the battery
/// channel's `soc` field (when present) has no home in the typed domain model.
#[derive(Debug, Clone, Deserialize)]
pub struct UsageRow {
    pub timestamp: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(rename = "channelType", default)]
    pub channel_type: String,
    #[serde(rename = "channelIdentifier", default)]
    pub channel_id: String,
    #[serde(rename = "kwh", default)]
    pub kwh: f64,
    #[serde(rename = "cost", default)]
    pub cost_cents: f64,
    #[serde(rename = "perKwh", default)]
    pub per_kwh_cents: f64,
    #[serde(rename = "spotPerKwh")]
    pub spot_per_kwh_cents: Option<f64>,
    #[serde(rename = "spikeStatus", default)]
    pub spike_status: String,
    #[serde(rename = "descriptor", default)]
    pub descriptor: String,
    #[serde(rename = "renewables", default)]
    pub renewables_pct: f64,
    #[serde(rename = "quality", default)]
    pub quality: String,
    pub soc: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawPriceInterval {
    #[serde(rename = "startTime")]
    start_time: DateTime<Utc>,
    #[serde(rename = "endTime")]
    end_time: Option<DateTime<Utc>>,
    #[serde(rename = "perKwh")]
    per_kwh: f64,
    #[serde(rename = "spotPerKwh")]
    spot_per_kwh: Option<f64>,
    #[serde(rename = "channelType", default)]
    channel_type: String,
    #[serde(rename = "spikeStatus", default)]
    spike_status: String,
    #[serde(rename = "descriptor", default)]
    descriptor: String,
    #[serde(rename = "renewables", default)]
    renewables: f64,
    #[serde(rename = "tariffPeriod")]
    tariff_period: Option<String>,
    #[serde(rename = "type", default)]
    interval_type: String,
    #[serde(rename = "estimate", default)]
    is_estimate: bool,
}

fn parse_tariff(raw: Option<&str>) -> Option<TariffPeriod> {
    raw.and_then(|s| s.parse().ok())
}

fn parse_price(raw: RawPriceInterval) -> PriceInterval {
    let end_time = raw.end_time.unwrap_or(raw.start_time + chrono::Duration::minutes(5));
    PriceInterval {
        timestamp: raw.start_time,
        end_time,
        per_kwh_cents: raw.per_kwh,
        spot_per_kwh_cents: raw.spot_per_kwh.unwrap_or(raw.per_kwh),
        channel: PriceChannel::from_wire(&raw.channel_type),
        spike_status: SpikeStatus::from_wire(&raw.spike_status),
        descriptor: PriceDescriptor::from_wire(&raw.descriptor),
        renewables_pct: raw.renewables,
        tariff: parse_tariff(raw.tariff_period.as_deref()),
        duration_minutes: 5,
        interval_type: crate::domain::IntervalType::from_wire(&raw.interval_type),
        is_estimate: raw.is_estimate,
    }
}

/// Thin HTTP adapter over the retailer's prices/usage API (§6). Stateless beyond its client and
/// credentials; every call is independently retried by the caller via [`crate::retry`].
pub struct RetailerClient {
    http: reqwest::Client,
    base_url: String,
    site_id: String,
}

impl RetailerClient {
    pub fn new(base_url: impl Into<String>, api_token: &str, site_id: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                if let Ok(value) = reqwest::header::HeaderValue::from_str(&format!("Bearer {api_token}")) {
                    headers.insert(reqwest::header::AUTHORIZATION, value);
                }
                headers
            })
            .build()
            .expect("retailer http client config is valid");
        Self {
            http,
            base_url: base_url.into(),
            site_id: site_id.into(),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { ClientError::Timeout } else { ClientError::Transport(e.to_string()) })?;
        if !resp.status().is_success() {
            return Err(ClientError::Http(resp.status()));
        }
        resp.json::<T>().await.map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Derives SOC from the latest battery-channel usage row, defaulting to 50% if absent.
    pub fn extract_soc(rows: &[UsageRow]) -> f64 {
        rows.iter()
            .rev()
            .find(|r| r.channel_type == "battery" && r.soc.is_some())
            .and_then(|r| r.soc)
            .unwrap_or(50.0)
    }
}

#[async_trait]
impl RetailerPriceClient for RetailerClient {
    async fn current_prices(&self) -> Result<Vec<PriceInterval>, ClientError> {
        let raw: Vec<RawPriceInterval> = self
            .get_json(&format!("/sites/{}/prices/current", self.site_id), &[])
            .await?;
        Ok(raw.into_iter().map(parse_price).collect())
    }

    async fn price_forecast(&self, next_hours: u32) -> Result<Vec<PriceInterval>, ClientError> {
        let raw: Vec<RawPriceInterval> = self
            .get_json(
                &format!("/sites/{}/prices", self.site_id),
                &[("resolution", "30".to_string()), ("next", next_hours.to_string())],
            )
            .await?;
        Ok(raw.into_iter().map(parse_price).collect())
    }

    async fn close(&self) {}
}

#[async_trait]
impl RetailerUsageClient for RetailerClient {
    async fn usage(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<UsageRow>, ClientError> {
        self.get_json(
            &format!("/sites/{}/usage", self.site_id),
            &[
                ("startDate", start.format("%Y-%m-%d").to_string()),
                ("endDate", end.format("%Y-%m-%d").to_string()),
                ("resolution", "5".to_string()),
            ],
        )
        .await
    }

    async fn close(&self) {}
}

pub fn battery_state_from_usage(rows: &[UsageRow], battery: &BatteryState) -> BatteryState {
    let soc_pct = RetailerClient::extract_soc(rows);
    BatteryState::new(
        soc_pct,
        battery.capacity_kwh * soc_pct / 100.0,
        battery.capacity_kwh,
        battery.max_charge_kw,
        battery.max_discharge_kw,
        battery.round_trip_efficiency,
        battery.cycle_cost_cents,
        battery.min_soc_pct,
    )
    .unwrap_or(*battery)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_soc_finds_latest_battery_row() {
        let rows = vec![
            UsageRow {
                timestamp: Utc::now(),
                end_time: Utc::now(),
                channel_type: "battery".into(),
                channel_id: "b1".into(),
                kwh: 0.0,
                cost_cents: 0.0,
                per_kwh_cents: 0.0,
                spot_per_kwh_cents: None,
                spike_status: "none".into(),
                descriptor: "neutral".into(),
                renewables_pct: 0.0,
                quality: "billable".into(),
                soc: Some(61.5),
            },
            UsageRow {
                timestamp: Utc::now(),
                end_time: Utc::now(),
                channel_type: "battery".into(),
                channel_id: "b1".into(),
                kwh: 0.0,
                cost_cents: 0.0,
                per_kwh_cents: 0.0,
                spot_per_kwh_cents: None,
                spike_status: "none".into(),
                descriptor: "neutral".into(),
                renewables_pct: 0.0,
                quality: "billable".into(),
                soc: Some(63.0),
            },
        ];
        assert_eq!(RetailerClient::extract_soc(&rows), 63.0);
    }

    #[test]
    fn extract_soc_defaults_to_50_when_absent() {
        assert_eq!(RetailerClient::extract_soc(&[]), 50.0);
    }

    #[test]
    fn unknown_channel_type_degrades_to_general() {
        let raw = RawPriceInterval {
            start_time: Utc::now(),
            end_time: None,
            per_kwh: 10.0,
            spot_per_kwh: None,
            channel_type: "weird".into(),
            spike_status: "none".into(),
            descriptor: "neutral".into(),
            renewables: 0.0,
            tariff_period: None,
            interval_type: "ForecastInterval".into(),
            is_estimate: false,
        };
        let parsed = parse_price(raw);
        assert_eq!(parsed.channel, PriceChannel::General);
        assert!(parsed.tariff.is_none());
    }
}
