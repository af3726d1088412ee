//! Error types for the pasture-core crate.
//!
//! Configuration mistakes (unknown or unassigned parameters, malformed
//! literals) and structural misuse of cohorts are reported as typed errors.
//! Numerical edge cases such as zero denominators are not errors; they are
//! absorbed by safe division and round-off zeroing.

use pasture_ledger::LedgerError;
use pasture_types::Status;

/// Errors raised by the species parameter store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    /// The tag does not name any species parameter.
    #[error("invalid parameter reference: {tag}")]
    InvalidReference {
        /// The unrecognised tag.
        tag: String,
    },

    /// The tag is valid but no value has been assigned to it.
    #[error("parameter {tag} has no value")]
    UndefinedValue {
        /// The unassigned tag.
        tag: String,
    },

    /// A literal could not be parsed as the parameter's type.
    #[error("cannot parse {literal:?} as a value for {tag}")]
    ParseFailure {
        /// The tag being assigned.
        tag: String,
        /// The text that failed to parse.
        literal: String,
    },
}

/// Errors raised by cohort operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CohortError {
    /// Two cohorts of different status were asked to merge.
    #[error("cannot merge a {source_status} cohort into a {target_status} cohort")]
    InconsistentMerge {
        /// Status of the cohort receiving the merge.
        target_status: Status,
        /// Status of the cohort being merged in.
        source_status: Status,
    },

    /// No cohort exists at the given position.
    #[error("no cohort at position {index}")]
    MissingCohort {
        /// The requested position in the cohort list.
        index: usize,
    },

    /// A pool was driven negative during the mass-balance step.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors raised by population-level operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PopulationError {
    /// A parameter lookup or assignment failed.
    #[error(transparent)]
    Param(#[from] ParamError),

    /// A cohort operation failed.
    #[error(transparent)]
    Cohort(#[from] CohortError),

    /// Pool arithmetic failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The soil profile has no layers, or a layer has non-positive thickness.
    #[error("invalid soil profile: {reason}")]
    InvalidSoil {
        /// What is wrong with the profile.
        reason: String,
    },
}

/// Errors raised while loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for this schema.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML error.
        source: serde_yml::Error,
    },

    /// A species parameter in the file was rejected.
    #[error("species parameters: {0}")]
    Param(#[from] ParamError),

    /// The soil or population could not be built.
    #[error("population: {0}")]
    Population(#[from] PopulationError),

    /// A value in the file is outside its valid range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}
