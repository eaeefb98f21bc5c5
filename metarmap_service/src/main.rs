//! `metarmap` binary: loads the configuration and runs the refresh loop
//! against the AviationWeather.gov feed until the process is killed.
//!
//! The config path comes from `METARMAP_CONFIG` (a `.env` file is honored),
//! falling back to `metarmap.toml` in the working directory.

use std::env;
use std::process;

use metarmap_service::config::{self, Config};
use metarmap_service::display::ConsoleDisplay;
use metarmap_service::ingest::awc::AwcClient;
use metarmap_service::logging::{self, Component};
use metarmap_service::refresh::RefreshLoop;
use metarmap_service::scheduler::Scheduler;
use metarmap_service::stations;
use metarmap_service::strip::{LogStrip, SharedStrip};

fn log_settings(config: &Config) {
    let msg = format!(
        "{} positions ({} stations), refresh every {:?}, blink period {:?}, wind threshold {}kt",
        config.positions.len(),
        stations::station_count(&config.positions),
        config.refresh.period,
        config.blink.period,
        config.wind.blink_threshold_kt
    );
    logging::info(Component::System, None, &msg);

    let msg = format!(
        "display rotation {}, dwell {:?}, fast highlight {}, stale policy {:?}, feed {}",
        if config.rotation.enabled { "on" } else { "off" },
        config.rotation.dwell,
        config.rotation.fast_highlight,
        config.refresh.stale_policy,
        config.feed.base_url
    );
    logging::info(Component::System, None, &msg);
}

fn main() {
    dotenv::dotenv().ok();
    let config_path = env::var("METARMAP_CONFIG").unwrap_or_else(|_| config::DEFAULT_CONFIG_PATH.to_string());

    let config = match config::load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", config_path, e);
            process::exit(1);
        }
    };

    logging::init_logger(
        config.logging.level,
        config.logging.file.as_deref(),
        config.logging.console_timestamps,
    );
    logging::info(Component::System, None, &format!("Loaded configuration from {}", config_path));
    log_settings(&config);

    let invalid = stations::invalid_station_ids(&config.positions);
    if !invalid.is_empty() {
        logging::warn(
            Component::System,
            None,
            &format!("station ids that do not look like ICAO codes: {}", invalid.join(",")),
        );
    }

    let source = match AwcClient::new(&config.feed, config.refresh.fetch_timeout) {
        Ok(client) => client,
        Err(e) => {
            logging::error(Component::Awc, None, &format!("could not build HTTP client: {}", e));
            process::exit(1);
        }
    };

    // Swap LogStrip for a hardware LedSink to drive a physical strip.
    let strip = SharedStrip::new(LogStrip::new(config.positions.len()));
    if strip.is_empty() {
        logging::error(Component::Leds, None, "indicator strip has no lights");
        process::exit(1);
    }
    let scheduler = Scheduler::new(strip, config.blink, config.colors.off);
    let display = config.rotation.enabled.then(ConsoleDisplay::new);

    logging::info(Component::System, None, "Starting refresh loop");
    RefreshLoop::new(config, source, scheduler, display).run_forever()
}
