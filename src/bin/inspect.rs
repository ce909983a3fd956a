//! Dry-run inspection binary (SPEC_FULL.md §B): runs exactly one collect → analyse → plan →
//! decide cycle and prints a human-readable report, without touching the decision log or the
//! persisted usage profile. Useful for verifying credentials and configuration before running
//! the long-lived service.

use std::sync::Arc;
use std::time::Duration;

use gridpilot::clients::retailer::{RetailerPriceClient, RetailerUsageClient};
use gridpilot::clients::weather::OpenMeteoClient;
use gridpilot::clients::wholesale::NemSummaryClient;
use gridpilot::clients::{RetailerClient, WeatherClient, WholesaleClient};
use gridpilot::collector::DataCollector;
use gridpilot::config::AppConfig;
use gridpilot::analyser::{analyse_forecast, build_30min_windows};
use gridpilot::learner::UsageLearner;
use gridpilot::planner::build_day_plan;
use gridpilot::supervisor;

#[tokio::main]
async fn main() {
    let config = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("fatal: {e:#}");
            std::process::exit(1);
        }
    };

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
    let now = chrono::Utc::now();
    let start = now.date_naive() - chrono::Duration::days(config.learner.days_back as i64);
    let profile = match usage_client.usage(start, now.date_naive()).await {
        Ok(rows) => learner.learn(&rows, now).ok(),
        Err(_) => None,
    };

    println!("== gridpilot dry run ==");
    println!("usage profile: {}", if profile.is_some() { "learned" } else { "unavailable, using time-of-day fallback" });

    let (snapshot, health) = collector.collect(profile.as_ref()).await;
    println!(
        "sources: prices={} forecast={} battery={} solar={} grid={}",
        health.prices_ok, health.forecast_ok, health.battery_ok, health.solar_ok, health.grid_ok
    );

    let analysed = analyse_forecast(&snapshot.price_forecast);
    println!(
        "forecast: min={:.2}c avg={:.2}c max={:.2}c negative_intervals={} spike_intervals={}",
        analysed.forecast_min, analysed.forecast_avg, analysed.forecast_max, analysed.negative_intervals, analysed.spike_intervals
    );

    let plan = profile.as_ref().map(|p| {
        let general: Vec<_> = snapshot.price_forecast.iter().filter(|i| i.channel == gridpilot::domain::PriceChannel::General).cloned().collect();
        let feed_in: Vec<_> = snapshot.price_forecast.iter().filter(|i| i.channel == gridpilot::domain::PriceChannel::FeedIn).cloned().collect();
        let windows = build_30min_windows(&general, &feed_in);
        build_day_plan(windows, p, &snapshot.solar_forecast, &config.battery, now)
    });

    if let Some(plan) = &plan {
        println!(
            "plan: {} scheduled actions, {} arbitrage pairs, {:.2}c total expected value",
            plan.schedule.len(),
            plan.summary.arbitrage_pairs,
            plan.summary.total_expected_cents
        );
        for action in &plan.schedule {
            println!("  {} - {} {:?} ({})", action.start_time, action.end_time, action.action, action.reason);
        }
    } else {
        println!("plan: none (no usage profile yet)");
    }

    let decision = supervisor::decide(&snapshot, &analysed, plan.as_ref(), &config.strategy, &config.battery);
    println!(
        "decision: {:?} at {:.2}kW, confidence {:.2}, reason: {}",
        decision.action, decision.power_kw, decision.confidence, decision.reason
    );

    collector.close().await;
}
