#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for route safety analysis.
//!
//! Uses `indicatif-log-bridge` (via [`route_safety_cli_utils::init_logger`])
//! so log lines and the classification progress bar share the terminal.
//! Results are printed to stdout as JSON.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use route_safety_ai::classifier::LlmHazardClassifier;
use route_safety_ai::providers::create_provider_from_env;
use route_safety_cli_utils::IndicatifProgress;
use route_safety_corridor::geometry::check_proximity;
use route_safety_corridor::polyline::decode;
use route_safety_corridor::scan::scan_concurrent;
use route_safety_corridor_models::{GeoPoint, HazardRecord};
use route_safety_directions::google::GoogleDirections;
use route_safety_planner::config::ScanConfig;
use route_safety_planner::{Collaborators, RouteRequest, analyze};
use route_safety_source::nyc_311::{self, Nyc311Source};

#[derive(Parser)]
#[command(
    name = "route_safety",
    about = "Score walking routes against recent public complaints"
)]
struct Cli {
    /// TOML file overriding the built-in scan defaults
    #[arg(long, global = true, env = "ROUTE_SAFETY_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Commands,
}

/// Flags that take precedence over the configuration file.
#[derive(Args)]
struct ConfigOverrides {
    /// Corridor half-width in decimal degrees
    #[arg(long, global = true)]
    tolerance: Option<f64>,
    /// Classifications in flight at once
    #[arg(long, global = true)]
    concurrency: Option<usize>,
    /// Days of complaints to fetch
    #[arg(long, global = true)]
    lookback_days: Option<u32>,
    /// Maximum complaints to fetch
    #[arg(long, global = true)]
    limit: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Find walking and transit routes and score the walking route
    Analyze {
        /// Start location (address or place name)
        #[arg(long)]
        start: String,
        /// End location (address or place name)
        #[arg(long)]
        end: String,
        /// Category whose scores count toward the total (repeatable);
        /// defaults to the configured set
        #[arg(long = "unsafe")]
        unsafe_categories: Vec<String>,
    },
    /// Test one point against an encoded route
    Check {
        /// Encoded polyline
        #[arg(long)]
        path: String,
        /// Hazard latitude
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Hazard longitude
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },
    /// Classify and score hazards from a JSON file against an encoded route
    Scan {
        /// Encoded polyline
        #[arg(long)]
        path: String,
        /// JSON array of complaint records (311 field names)
        #[arg(long)]
        hazards: PathBuf,
        /// Category whose scores count toward the total (repeatable)
        #[arg(long = "unsafe")]
        unsafe_categories: Vec<String>,
    },
    /// Decode an encoded polyline into points
    Decode {
        /// Encoded polyline
        path: String,
    },
}

impl ConfigOverrides {
    fn apply(&self, config: &mut ScanConfig) {
        if let Some(tolerance) = self.tolerance {
            config.tolerance = tolerance;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(days) = self.lookback_days {
            config.lookback_days = days;
        }
        if let Some(limit) = self.limit {
            config.limit = limit;
        }
    }
}

fn categories(names: Vec<String>) -> Option<BTreeSet<String>> {
    if names.is_empty() {
        None
    } else {
        Some(names.into_iter().collect())
    }
}

/// Reads a JSON array of complaint rows, dropping rows that are not
/// objects the same way the live feed does.
fn parse_hazards(text: &str) -> Result<Vec<HazardRecord>, serde_json::Error> {
    let rows: Vec<serde_json::Value> = serde_json::from_str(text)?;
    Ok(nyc_311::parse_rows(rows))
}

fn print_json(value: &impl serde::Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = route_safety_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = ScanConfig::load(cli.config.as_deref())?;
    cli.overrides.apply(&mut config);
    config.validate()?;

    match cli.command {
        Commands::Analyze {
            start,
            end,
            unsafe_categories,
        } => {
            let collaborators = Collaborators {
                routing: Arc::new(GoogleDirections::from_env()?),
                hazards: Arc::new(Nyc311Source::from_env(config.dataset_url.clone())?),
                classifier: Arc::new(LlmHazardClassifier::new(create_provider_from_env()?)),
            };
            let request = RouteRequest {
                start,
                end,
                unsafe_categories: categories(unsafe_categories),
            };
            let progress = IndicatifProgress::classify_bar(&multi, "Classifying hazards");

            let analysis = analyze(&collaborators, &config, &request, Some(&progress)).await?;
            print_json(&analysis)?;
        }
        Commands::Check { path, lat, lon } => {
            let hazard = GeoPoint::new(lat, lon)?;
            let proximity = check_proximity(&path, hazard, config.tolerance)?;
            print_json(&serde_json::json!({
                "latitude": lat,
                "longitude": lon,
                "tolerance": config.tolerance,
                "distance": proximity.distance,
                "is_near": proximity.is_near,
            }))?;
        }
        Commands::Scan {
            path,
            hazards,
            unsafe_categories,
        } => {
            let text = std::fs::read_to_string(&hazards)?;
            let records = parse_hazards(&text)?;
            log::info!("Loaded {} hazards from {}", records.len(), hazards.display());

            let classifier = LlmHazardClassifier::new(create_provider_from_env()?);
            let options = config.scan_options(categories(unsafe_categories).as_ref());
            let progress = IndicatifProgress::classify_bar(&multi, "Classifying hazards");

            let result =
                scan_concurrent(&path, &records, &options, &classifier, Some(&progress)).await;
            print_json(&result)?;
        }
        Commands::Decode { path } => {
            let points = decode(&path)?;
            print_json(&points)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_shape_rows_do_not_reject_the_file() {
        let text = r#"[
            {"complaint_type": "Street Condition", "descriptor": "Pothole",
             "latitude": "40.75", "longitude": "-73.98"},
            {"complaint_type": null, "descriptor": 12,
             "latitude": 40.7, "longitude": -73.9},
            "stray text"
        ]"#;

        let records = parse_hazards(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].descriptor, "Pothole");
        assert_eq!(records[1].complaint_type, "");
        assert_eq!(records[1].descriptor, "12");
    }

    #[test]
    fn non_array_file_is_an_error() {
        assert!(parse_hazards(r#"{"complaint_type": "Noise"}"#).is_err());
    }
}
