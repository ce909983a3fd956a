//! Wholesale market region-summary adapter (C1, §4.2). Grounded on the prototype's `api/aemo.py`.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;

use crate::clients::retailer::ClientError;
use crate::domain::GridState;

#[async_trait]
pub trait WholesaleClient: Send + Sync {
    async fn grid_state(&self) -> Result<GridState, ClientError>;
    async fn close(&self);
}

#[derive(Debug, Deserialize)]
struct RegionEntry {
    #[serde(rename = "REGIONID")]
    region_id: String,
    #[serde(rename = "TOTALDEMAND", default)]
    total_demand: f64,
    #[serde(rename = "PRICE", default)]
    price: f64,
    #[serde(rename = "NETINTERCHANGE", default)]
    net_interchange: f64,
    #[serde(rename = "SOLAR", default)]
    solar: f64,
    #[serde(rename = "WIND", default)]
    wind: f64,
}

fn calc_renewables_pct(entry: &RegionEntry) -> f64 {
    let total = entry.total_demand.max(1.0);
    (entry.solar + entry.wind) / total * 100.0
}

/// NEM dispatch summary client. On any failure the caller substitutes
/// [`GridState::zero_filled`] (§4.4) — this client just reports the error.
pub struct NemSummaryClient {
    http: reqwest::Client,
    url: String,
    region: String,
}

impl NemSummaryClient {
    pub fn new(url: impl Into<String>, region: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder().timeout(timeout).build().expect("wholesale http client config is valid"),
            url: url.into(),
            region: region.into(),
        }
    }
}

#[async_trait]
impl WholesaleClient for NemSummaryClient {
    async fn grid_state(&self) -> Result<GridState, ClientError> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { ClientError::Timeout } else { ClientError::Transport(e.to_string()) })?;
        if !resp.status().is_success() {
            return Err(ClientError::Http(resp.status()));
        }
        let rows: Vec<RegionEntry> = resp.json().await.map_err(|e| ClientError::Decode(e.to_string()))?;
        let entry = rows
            .iter()
            .find(|r| r.region_id == self.region)
            .ok_or_else(|| ClientError::Decode(format!("region {} not present in response", self.region)))?;
        Ok(GridState {
            timestamp: Utc::now(),
            region: entry.region_id.clone(),
            demand_mw: entry.total_demand,
            wholesale_price_aud_per_mwh: entry.price,
            renewables_pct: calc_renewables_pct(entry),
            interconnector_flow_mw: entry.net_interchange,
        })
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renewables_pct_handles_zero_demand() {
        let entry = RegionEntry {
            region_id: "NSW1".into(),
            total_demand: 0.0,
            price: 50.0,
            net_interchange: 0.0,
            solar: 10.0,
            wind: 10.0,
        };
        assert_eq!(calc_renewables_pct(&entry), 2000.0); // 20 / 1 * 100, matches the prototype's max(total, 1) guard
    }
}
