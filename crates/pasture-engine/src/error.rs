//! Error types for the pasture engine binary.
//!
//! [`EngineError`] wraps every failure mode of a run so that `main` can
//! propagate with `?`.

/// Top-level error for the pasture engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or population construction failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: pasture_core::ConfigError,
    },

    /// A simulated day failed.
    #[error("day {day}: {source}")]
    Day {
        /// Run day on which the failure happened.
        day: u64,
        /// The underlying population error.
        source: pasture_core::PopulationError,
    },

    /// The weather or soil driver was misconfigured.
    #[error("driver error: {message}")]
    Driver {
        /// Description of the driver failure.
        message: String,
    },
}
