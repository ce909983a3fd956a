use std::sync::Arc;
use std::time::Duration;

use gridpilot::clients::retailer::{RetailerPriceClient, RetailerUsageClient};
use gridpilot::clients::{RetailerClient, WeatherClient, WholesaleClient};
use gridpilot::clients::weather::OpenMeteoClient;
use gridpilot::clients::wholesale::NemSummaryClient;
use gridpilot::collector::DataCollector;
use gridpilot::config::AppConfig;
use gridpilot::domain::UsageProfile;
use gridpilot::engine::Engine;
use gridpilot::learner::UsageLearner;
use gridpilot::telemetry::{init_tracing, shutdown_signal};
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    let config = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("fatal: {e:#}");
            std::process::exit(1);
        }
    };

    let _guard = match init_tracing(&config.telemetry) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("fatal: failed to initialise logging: {e:#}");
            std::process::exit(1);
        }
    };

    info!("gridpilot starting up");

    let timeout = Duration::from_secs(config.tick.client_timeout_seconds);
    let retailer_client = Arc::new(RetailerClient::new(
        config.retailer.base_url.as_str(),
        &config.retailer.api_token,
        config.retailer.site_id.clone(),
        timeout,
    ));
    let weather_client: Arc<dyn WeatherClient> = Arc::new(OpenMeteoClient::new(
        config.weather.base_url.as_str(),
        config.location.latitude,
        config.location.longitude,
        config.solar_model.effective_area_m2,
        config.solar_model.panel_efficiency,
        timeout,
    ));
    let wholesale_client: Arc<dyn WholesaleClient> = Arc::new(NemSummaryClient::new(
        config.location.wholesale_url.as_str(),
        config.location.wholesale_region.clone(),
        timeout,
    ));

    let price_client: Arc<dyn RetailerPriceClient> = retailer_client.clone();
    let usage_client: Arc<dyn RetailerUsageClient> = retailer_client.clone();

    let collector = DataCollector::new(
        price_client,
        usage_client.clone(),
        weather_client,
        wholesale_client,
        config.battery.clone(),
        config.location.clone(),
        config.tick.clone(),
        config.solar_model.clone(),
    );

    let learner = UsageLearner::new(config.learner.clone());
    let profile = load_or_learn_profile(&config, &learner, usage_client.as_ref()).await;

    let engine = Engine::new(config, collector, learner, usage_client, profile);
    engine.run_forever(shutdown_signal()).await;

    info!("gridpilot shut down cleanly");
}

/// Loads a persisted usage profile if present and fresh; otherwise attempts one learn pass before
/// the tick loop starts, falling back to `None` (time-of-day fallback load table) on failure.
async fn load_or_learn_profile(config: &AppConfig, learner: &UsageLearner, usage_client: &dyn RetailerUsageClient) -> Option<UsageProfile> {
    if let Ok(bytes) = tokio::fs::read(&config.telemetry.usage_profile_path).await {
        if let Ok(profile) = serde_json::from_slice::<UsageProfile>(&bytes) {
            if !profile.is_stale(chrono::Utc::now()) {
                info!(path = %config.telemetry.usage_profile_path, "loaded usage profile from disk");
                return Some(profile);
            }
        }
    }

    let now = chrono::Utc::now();
    let start = now.date_naive() - chrono::Duration::days(config.learner.days_back as i64);
    let end = now.date_naive();
    match usage_client.usage(start, end).await {
        Ok(rows) => match learner.learn(&rows, now) {
            Ok(profile) => {
                if let Ok(json) = serde_json::to_vec_pretty(&profile) {
                    if let Some(parent) = std::path::Path::new(&config.telemetry.usage_profile_path).parent() {
                        let _ = tokio::fs::create_dir_all(parent).await;
                    }
                    let _ = tokio::fs::write(&config.telemetry.usage_profile_path, json).await;
                }
                Some(profile)
            }
            Err(e) => {
                warn!(error = %e, "no usage profile yet, starting with time-of-day fallback loads");
                None
            }
        },
        Err(e) => {
            warn!(error = %e, "initial usage fetch failed, starting with time-of-day fallback loads");
            None
        }
    }
}
