//! Weather/solar forecast adapter (C1, §4.2). Grounded on the prototype's `api/weather.py`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::clients::retailer::ClientError;
use crate::domain::{irradiance_to_kw, SolarForecast};

#[async_trait]
pub trait WeatherClient: Send + Sync {
    async fn solar_forecast(&self, hours: u32) -> Result<Vec<SolarForecast>, ClientError>;
    async fn close(&self);
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<String>,
    #[serde(default)]
    direct_radiation: Vec<f64>,
    #[serde(default)]
    cloud_cover: Vec<f64>,
    #[serde(default)]
    temperature_2m: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    hourly: HourlyBlock,
}

pub struct OpenMeteoClient {
    http: reqwest::Client,
    base_url: String,
    latitude: f64,
    longitude: f64,
    effective_area_m2: f64,
    panel_efficiency: f64,
}

impl OpenMeteoClient {
    pub fn new(base_url: impl Into<String>, latitude: f64, longitude: f64, effective_area_m2: f64, panel_efficiency: f64, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder().timeout(timeout).build().expect("weather http client config is valid"),
            base_url: base_url.into(),
            latitude,
            longitude,
            effective_area_m2,
            panel_efficiency,
        }
    }
}

#[async_trait]
impl WeatherClient for OpenMeteoClient {
    async fn solar_forecast(&self, hours: u32) -> Result<Vec<SolarForecast>, ClientError> {
        let url = format!("{}/forecast", self.base_url);
        let resp = self
            .http
            .get(url)
            .query(&[
                ("latitude", self.latitude.to_string()),
                ("longitude", self.longitude.to_string()),
                ("hourly", "direct_radiation,cloud_cover,temperature_2m".to_string()),
                ("forecast_hours", hours.to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await
            .map_err(|e| if e.is_timeout() { ClientError::Timeout } else { ClientError::Transport(e.to_string()) })?;
        if !resp.status().is_success() {
            return Err(ClientError::Http(resp.status()));
        }
        let body: OpenMeteoResponse = resp.json().await.map_err(|e| ClientError::Decode(e.to_string()))?;

        let mut out = Vec::with_capacity(body.hourly.time.len());
        for (i, t) in body.hourly.time.iter().enumerate() {
            let timestamp: DateTime<Utc> = match chrono::NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M") {
                Ok(naive) => naive.and_utc(),
                Err(_) => continue,
            };
            let irradiance = body.hourly.direct_radiation.get(i).copied().unwrap_or(0.0);
            out.push(SolarForecast {
                timestamp,
                generation_kw: irradiance_to_kw(irradiance, self.effective_area_m2, self.panel_efficiency),
                cloud_cover_pct: body.hourly.cloud_cover.get(i).copied().unwrap_or(0.0),
                temperature_c: body.hourly.temperature_2m.get(i).copied().unwrap_or(0.0),
            });
        }
        Ok(out)
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn irradiance_conversion_zero_when_no_sun() {
        assert_eq!(irradiance_to_kw(0.0, 20.0, 0.15), 0.0);
    }
}
