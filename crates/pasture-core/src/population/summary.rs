//! Boundary flows of one day and the summary reported to the host.

use pasture_ledger::{ConservationResult, MassAudit, PoolOps};
use pasture_types::{DevelopEvent, DevelopStage, DmPool, Element, ElementTable, ShootTable};

use crate::cohort::sum_pools;

/// Material that crossed the population's boundary today, plus the
/// internal flows worth reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct DayFlows {
    /// Net growth added to herbage, roots and seed.
    pub growth: DmPool,
    /// Seed sown.
    pub sown: DmPool,
    /// Herbage removed by grazing or cutting.
    pub grazed: DmPool,
    /// Seed removed by grazing.
    pub seed_eaten: DmPool,
    /// Herbage incorporated into the soil, per shoot part.
    pub shoot_residue: ShootTable<DmPool>,
    /// Dead roots per soil layer.
    pub root_residue: Vec<DmPool>,
    /// Dead and discarded seed.
    pub seed_residue: DmPool,
    /// Dry matter respired by dry herbage (g/m^2).
    pub respired: f64,
    /// Nutrient leached out of litter.
    pub leachate: DmPool,
    /// Nitrogen lost as gas from shoots above their maximum concentration.
    pub gaseous_loss: DmPool,
    /// Phosphorus and sulphur washed out of shoots above their maximum
    /// concentration.
    pub excess_leached: DmPool,
    /// Seed set today.
    pub new_seed: DmPool,
    /// Seed that germinated.
    pub germinated: DmPool,
    /// Assimilation of the green cohorts (g/m^2).
    pub assimilation: f64,
    /// Nutrient taken up from the soil, per element.
    pub uptake: ElementTable<f64>,
    /// Nitrogen fixed.
    pub fixed: f64,
}

impl DayFlows {
    /// No flows, over `layer_count` soil layers.
    pub fn new(layer_count: usize) -> Self {
        Self {
            growth: DmPool::ZERO,
            sown: DmPool::ZERO,
            grazed: DmPool::ZERO,
            seed_eaten: DmPool::ZERO,
            shoot_residue: ShootTable::filled(DmPool::ZERO),
            root_residue: vec![DmPool::ZERO; layer_count],
            seed_residue: DmPool::ZERO,
            respired: 0.0,
            leachate: DmPool::ZERO,
            gaseous_loss: DmPool::ZERO,
            excess_leached: DmPool::ZERO,
            new_seed: DmPool::ZERO,
            germinated: DmPool::ZERO,
            assimilation: 0.0,
            uptake: ElementTable::filled(0.0),
            fixed: 0.0,
        }
    }

    /// Add dead roots per layer.
    pub(crate) fn add_root_residue(&mut self, ops: PoolOps, residue: &[DmPool]) {
        for (total, pool) in self.root_residue.iter_mut().zip(residue) {
            ops.add_allowing_loss(total, pool);
        }
    }

    /// Above-ground residue, both parts together.
    pub fn shoot_residue_total(&self) -> DmPool {
        sum_pools(self.shoot_residue.values())
    }

    /// Below-ground residue over the whole profile.
    pub fn root_residue_total(&self) -> DmPool {
        sum_pools(self.root_residue.iter())
    }

    /// Post the day's boundary flows to the mass audit.
    pub(crate) fn post_to(&self, audit: &mut MassAudit) {
        audit.credit(&self.growth);
        audit.credit(&self.sown);
        for pool in [
            &self.grazed,
            &self.seed_eaten,
            &self.shoot_residue_total(),
            &self.root_residue_total(),
            &self.seed_residue,
            &self.leachate,
            &self.gaseous_loss,
            &self.excess_leached,
        ] {
            audit.debit(pool);
        }
        audit.debit_dm(self.respired);
    }
}

/// What happened to the population on one day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    /// Simulation day.
    pub day: u64,
    /// Developmental stage at the end of the day.
    pub stage: DevelopStage,
    /// Phenological events fired during the day.
    pub events: Vec<DevelopEvent>,
    /// Number of cohorts at the end of the day.
    pub cohort_count: usize,
    /// Green herbage (g/m^2).
    pub green: f64,
    /// Dry herbage, standing and litter (g/m^2).
    pub dry: f64,
    /// Roots (g/m^2).
    pub roots: f64,
    /// Seed in the bank (g/m^2).
    pub seed: f64,
    /// Nitrogen concentration of green herbage (g/g); zero when nitrogen
    /// is not tracked.
    pub green_n_conc: f64,
    /// The day's boundary and reported flows.
    pub flows: DayFlows,
    /// Result of the daily mass audit.
    pub conservation: ConservationResult,
}

impl DailySummary {
    /// Net growth over the day (g/m^2).
    pub fn net_growth(&self) -> f64 {
        self.flows.growth.dm
    }

    /// Nitrogen taken up from the soil (g/m^2).
    pub fn n_uptake(&self) -> f64 {
        self.flows.uptake[Element::N]
    }

    /// Returns `true` when every tracked quantity balanced.
    pub fn is_balanced(&self) -> bool {
        matches!(self.conservation, ConservationResult::Balanced)
    }
}
