//! Cohort engine, phenology, seed bank and population orchestration for a
//! GRAZPLAN-style pasture population.
//!
//! A [`Population`] owns an ordered list of [`Cohort`]s, one per
//! developmental status, together with the population-wide phenology state
//! and the soil seed bank. Each simulated day the host supplies a
//! [`DailyInputs`] record and an optional [`RemovalRequest`], then calls
//! [`Population::compute_rates`] followed by [`Population::update_state`].
//!
//! # Modules
//!
//! - [`params`] -- Species parameter tag store and the typed parameter set
//! - [`environment`] -- Soil profile, daily weather and soil drivers, removal
//!   requests
//! - [`cohort`] -- Per-status pools, growth, nutrient rationing and the daily
//!   mass-balance update
//! - [`phenology`] -- Developmental stage state machine with defoliation
//!   setback
//! - [`seeds`] -- Soil seed bank flows
//! - [`population`] -- Daily orchestration, cohort lifecycle, canopy,
//!   removal, management and the daily summary
//! - [`config`] -- YAML configuration for a complete run
//! - [`error`] -- Error types
//!
//! [`Population`]: population::Population
//! [`Population::compute_rates`]: population::Population::compute_rates
//! [`Population::update_state`]: population::Population::update_state
//! [`Cohort`]: cohort::Cohort
//! [`DailyInputs`]: environment::DailyInputs
//! [`RemovalRequest`]: environment::RemovalRequest

pub mod cohort;
pub mod config;
pub mod environment;
pub mod error;
pub mod params;
pub mod phenology;
pub mod population;
pub mod seeds;

// Re-export the types a host needs at crate root.
pub use config::PastureConfig;
pub use environment::{DailyInputs, RemovalRequest, SoilLayer, SoilNutrients, SoilProfile};
pub use error::{CohortError, ConfigError, ParamError, PopulationError};
pub use params::{ParamSet, SpeciesParams};
pub use phenology::Phenology;
pub use population::{DailySummary, Population};
pub use seeds::SeedBank;
