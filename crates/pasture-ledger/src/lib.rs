//! Conserved pool arithmetic for the pasture population engine.
//!
//! Every movement of plant material in the engine goes through this crate.
//! A movement carries dry mass together with the nutrient and ash
//! alkalinity it contains, so that nothing is created or destroyed except
//! through the explicit source and sink flows (assimilation, uptake,
//! fixation, respiration, grazing, residue, leaching and gaseous loss).
//!
//! # Modules
//!
//! - [`math`] -- Guarded division and the ramp/sigmoid response functions
//! - [`pool`] -- [`PoolOps`]: add, move, resize and round-off on [`DmPool`]s
//! - [`flux`] -- [`FluxBudget`]: bounding competing outflows from one pool
//! - [`conservation`] -- Daily mass-balance audit over a set of pools
//!
//! # Usage
//!
//! ```
//! use pasture_ledger::PoolOps;
//! use pasture_types::{DmPool, Element, ElementSet};
//!
//! let ops = PoolOps::new(ElementSet::N);
//! let mut herbage = DmPool::with_dm(100.0);
//! herbage.nu[Element::N] = 3.0;
//! let mut eaten = DmPool::ZERO;
//!
//! ops.move_dm(&mut herbage, &mut eaten, 25.0);
//! assert!((eaten.nu[Element::N] - 0.75).abs() < 1e-12);
//! assert!((herbage.dm - 75.0).abs() < 1e-12);
//! ```
//!
//! [`DmPool`]: pasture_types::DmPool

pub mod conservation;
pub mod flux;
pub mod math;
pub mod pool;

// Re-export primary types at crate root.
pub use conservation::{ConservationResult, MassAudit, Quantity};
pub use flux::FluxBudget;
pub use pool::PoolOps;

use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by pool arithmetic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    /// A pool was driven materially negative by a mass-balance step.
    #[error("mass balance error: pool holds {dm} g/m^2 of dry matter")]
    MassBalance {
        /// The negative dry mass found in the pool.
        dm: f64,
    },
}

// ---------------------------------------------------------------------------
// Anomaly type
// ---------------------------------------------------------------------------

/// A mass-balance violation found by the daily audit.
///
/// Each entry of `imbalances` maps a conserved quantity to the pair
/// (`expected_closing`, `actual_closing`) for that quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct MassAnomaly {
    /// Simulation day on which the imbalance was found.
    pub day: u64,
    /// Per-quantity (`expected`, `actual`) closing stocks that disagreed.
    pub imbalances: BTreeMap<Quantity, (f64, f64)>,
    /// Human-readable description of the anomaly.
    pub message: String,
}

impl core::fmt::Display for MassAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}
