//! Bounding competing outflows from a single pool.
//!
//! A pool's outflows for the day are computed one after another. Each is
//! limited to what earlier outflows have left, so their sum can never
//! exceed the pool's dry mass.

use pasture_types::DmPool;

/// Running total of the outflows already claimed from one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FluxBudget {
    claimed: f64,
}

impl FluxBudget {
    /// A budget with nothing yet claimed.
    pub const fn new() -> Self {
        Self { claimed: 0.0 }
    }

    /// A budget that starts with `prior` already claimed, for a loss (such
    /// as respiration) that is taken from the pool by another route.
    pub const fn with_prior(prior: f64) -> Self {
        Self { claimed: prior }
    }

    /// The dry mass claimed so far.
    pub const fn claimed(&self) -> f64 {
        self.claimed
    }

    /// Claim `flux` from `source`, limited to what is left unclaimed and
    /// floored at zero.
    pub fn limited_flux(&mut self, source: &DmPool, flux: f64) -> f64 {
        let granted = flux.min(source.dm - self.claimed).max(0.0);
        self.claimed += granted;
        granted
    }

    /// Claim the fraction `propn` of `source`.
    pub fn limited_propn(&mut self, source: &DmPool, propn: f64) -> f64 {
        self.limited_flux(source, propn * source.dm)
    }
}
