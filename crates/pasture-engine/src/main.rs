//! Pasture engine binary.
//!
//! Drives a single pasture population through a run of simulated days. It
//! loads the run configuration, builds the population in its starting
//! state, and each day generates weather, updates a bucket soil, applies
//! the management calendar and advances the population.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `PASTURE_CONFIG` or `pasture-config.yaml`
//! 3. Build the population, weather generator and soil
//! 4. Run the configured number of days
//! 5. Log the final state

mod error;
mod soil;
mod weather;

use std::path::PathBuf;

use pasture_core::config::ManagementAction;
use pasture_core::{DailySummary, PastureConfig, Population, RemovalRequest};
use pasture_types::StatusGroup;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::soil::BucketSoil;
use crate::weather::WeatherGenerator;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG: &str = "pasture-config.yaml";

/// Starting soil water as a share of capacity.
const INITIAL_SOIL_WATER: f64 = 0.5;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or a simulated day
/// fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    info!("pasture-engine starting");

    let config = load_config()?;
    info!(
        species = config.species.name,
        days = config.run.days,
        start_day = config.run.start_day,
        latitude = config.run.latitude,
        seed = config.run.seed,
        "Configuration loaded"
    );

    let mut population = config.build_population()?;
    let mut weather = WeatherGenerator::new(&config.run);
    let mut soil = BucketSoil::new(&config.soil.layers, INITIAL_SOIL_WATER, config.run.nitrate)?;
    if soil.layer_count() != population.layer_count() {
        return Err(EngineError::Driver {
            message: format!(
                "soil has {} layers but the population expects {}",
                soil.layer_count(),
                population.layer_count()
            ),
        }
        .into());
    }

    let mut unbalanced_days = 0_u64;
    for day in 1..=config.run.days {
        let today = weather.generate(day);
        soil.infiltrate(today.rain);
        let evap = soil.evaporate(today.pot_et);
        population.begin_day(soil.daily_inputs(&today, config.run.co2, evap));

        let grazing = apply_management(&config, &mut population, day)?;
        population
            .compute_rates()
            .map_err(|source| EngineError::Day { day, source })?;
        let removal = RemovalRequest::spread(&population.available_herbage(), grazing);
        let summary = population
            .update_state(&removal)
            .map_err(|source| EngineError::Day { day, source })?;
        soil.extract(&population.canopy().total_transpiration());

        if !summary.is_balanced() {
            unbalanced_days = unbalanced_days.saturating_add(1);
        }
        log_summary(&summary, today.day_of_year, today.rain, soil.total_water());
    }

    info!(
        days = config.run.days,
        unbalanced_days,
        stage = %population.phenology().stage,
        green = population.herbage(StatusGroup::Green).dm,
        dry = population.herbage(StatusGroup::Dry).dm,
        roots = population.roots(StatusGroup::All).dm,
        seed = population.seed_mass(),
        drainage = soil.drainage(),
        "Run complete"
    );
    Ok(())
}

/// Load the run configuration.
///
/// The path comes from `PASTURE_CONFIG` if set. A missing default file
/// falls back to the built-in configuration.
fn load_config() -> Result<PastureConfig, EngineError> {
    if let Ok(path) = std::env::var("PASTURE_CONFIG") {
        return Ok(PastureConfig::from_file(&PathBuf::from(path))?);
    }
    let path = PathBuf::from(DEFAULT_CONFIG);
    if path.exists() {
        Ok(PastureConfig::from_file(&path)?)
    } else {
        info!("Config file not found, using defaults");
        Ok(PastureConfig::default())
    }
}

/// Apply the management events scheduled for `day`. Returns the herbage
/// to graze today (g/m^2).
fn apply_management(config: &PastureConfig, population: &mut Population, day: u64) -> Result<f64, EngineError> {
    let mut grazing = 0.0;
    for action in config.events_on(day) {
        match *action {
            ManagementAction::Sow { dm } => population
                .sow(dm)
                .map_err(|source| EngineError::Day { day, source })?,
            ManagementAction::SprayTop => {
                if !population.spray_top() {
                    warn!(day, stage = %population.phenology().stage, "Spray-topping had no effect");
                }
            }
            ManagementAction::Kill { herbage, seed } => population.kill(herbage, seed),
            ManagementAction::Graze { dm } => grazing += dm.max(0.0),
        }
    }
    Ok(grazing)
}

fn log_summary(summary: &DailySummary, day_of_year: u32, rain: f64, soil_water: f64) {
    for event in &summary.events {
        info!(day = summary.day, event = ?event, "Development event");
    }
    info!(
        day = summary.day,
        day_of_year,
        rain,
        soil_water,
        stage = %summary.stage,
        cohorts = summary.cohort_count,
        green = summary.green,
        dry = summary.dry,
        roots = summary.roots,
        seed = summary.seed,
        net_growth = summary.net_growth(),
        grazed = summary.flows.grazed.dm,
        n_uptake = summary.n_uptake(),
        "Day complete"
    );
}
