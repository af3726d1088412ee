//! Soil seed bank.
//!
//! Seed is held per hardness, ripeness and soil layer. New seed enters as
//! soft unripe seed at the surface and stays unripe through an innate
//! dormancy period; afterwards it either ripens or is discarded. Soft
//! unripe seed can harden, hard ripe seed softens in the surface layer, and
//! soft ripe surface seed germinates once a germination index has
//! accumulated. Seed in wet soil dies.
//!
//! Flows out of each pool are bounded with a [`FluxBudget`] in a fixed
//! order (grazing, death, germination, softening, ripening, discarding,
//! hardening) and then executed together.

use serde::{Deserialize, Serialize};

use pasture_ledger::math::{div0, ramp};
use pasture_ledger::{FluxBudget, LedgerError, PoolOps};
use pasture_types::{DevelopStage, DmPool, Hardness, HardnessTable, Ripeness, RipenessTable};

use crate::environment::{DailyInputs, layer_value};
use crate::params::SpeciesParams;

/// Relative soil water above which seed starts to die.
const WET_SOIL_ASW: f64 = 0.5;

/// Seed pools of one soil layer.
pub type SeedLayer = HardnessTable<RipenessTable<DmPool>>;

/// Daily seed-bank rates, all as proportions of the source pool per day.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedRates {
    /// Hardening of soft unripe seed.
    pub harden: f64,
    /// Ripening of unripe seed.
    pub ripen: f64,
    /// Discarding of unripe seed.
    pub discard: f64,
    /// Softening of hard ripe seed, per layer.
    pub soften: Vec<f64>,
    /// Death of seed, per layer and hardness.
    pub death: Vec<HardnessTable<f64>>,
    /// Germination of soft ripe seed, per layer.
    pub germinate: Vec<f64>,
}

impl SeedRates {
    /// Rates that move nothing, for a bank of `layer_count` layers.
    pub fn none(layer_count: usize) -> Self {
        Self {
            harden: 0.0,
            ripen: 0.0,
            discard: 0.0,
            soften: vec![0.0; layer_count],
            death: vec![HardnessTable::filled(0.0); layer_count],
            germinate: vec![0.0; layer_count],
        }
    }
}

/// Material that left the seed bank during a daily update.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedOutcome {
    /// Seed that germinated, to become seedlings.
    pub germinated: DmPool,
    /// Seed removed by grazing.
    pub eaten: DmPool,
    /// Dead and discarded seed, per soil layer.
    pub residue: Vec<DmPool>,
}

/// The soil seed bank of one population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedBank {
    layers: Vec<SeedLayer>,
    /// Accumulated germination index of the surface layer.
    pub germination_index: f64,
    /// Days into the innate dormancy of newly set seed, or `None` outside
    /// that period.
    pub innate_dormancy_days: Option<u32>,
}

impl SeedBank {
    /// An empty bank with `layer_count` layers.
    pub fn new(layer_count: usize) -> Self {
        Self {
            layers: vec![HardnessTable::filled(RipenessTable::filled(DmPool::ZERO)); layer_count],
            germination_index: 0.0,
            innate_dormancy_days: None,
        }
    }

    /// Number of seed layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// The seed pool of one hardness, ripeness and layer.
    pub fn pool(&self, hardness: Hardness, ripeness: Ripeness, layer: usize) -> DmPool {
        self.layers
            .get(layer)
            .map_or(DmPool::ZERO, |pools| pools[hardness][ripeness])
    }

    /// Seed mass of one ripeness summed over hardness in `layer` (g/m^2).
    pub fn mass(&self, ripeness: Ripeness, layer: usize) -> f64 {
        Hardness::ALL
            .iter()
            .map(|hardness| self.pool(*hardness, ripeness, layer).dm)
            .sum()
    }

    /// Total seed mass in the bank (g/m^2).
    pub fn total_mass(&self) -> f64 {
        self.layers
            .iter()
            .flat_map(|layer| layer.values())
            .flat_map(|ripeness| ripeness.values())
            .map(|pool| pool.dm)
            .sum()
    }

    /// All seed in the bank as one pool.
    pub fn total(&self, ops: PoolOps) -> DmPool {
        let mut total = DmPool::ZERO;
        for pool in self
            .layers
            .iter()
            .flat_map(|layer| layer.values())
            .flat_map(|ripeness| ripeness.values())
        {
            ops.add(&mut total, pool);
        }
        total
    }

    /// Whether unripe seed sits in the surface layer.
    fn has_unripe_surface_seed(&self) -> bool {
        self.mass(Ripeness::Unripe, 0) > 0.0
    }

    // -----------------------------------------------------------------------
    // Additions and removals outside the daily update
    // -----------------------------------------------------------------------

    /// Set the dry mass of one pool, holding its concentrations, and
    /// re-evaluate the innate dormancy period.
    pub fn set_mass(
        &mut self,
        ops: PoolOps,
        hardness: Hardness,
        ripeness: Ripeness,
        layer: usize,
        dm: f64,
        stage: DevelopStage,
    ) {
        if let Some(pools) = self.layers.get_mut(layer) {
            let pool = &mut pools[hardness][ripeness];
            if pool.dm > 0.0 {
                ops.resize(pool, dm.max(0.0));
            } else {
                *pool = DmPool::with_dm(dm.max(0.0));
            }
        }
        if !self.has_unripe_surface_seed() {
            self.innate_dormancy_days = None;
        } else if stage == DevelopStage::Senescent && self.innate_dormancy_days.is_none() {
            self.innate_dormancy_days = Some(0);
        }
    }

    /// Add sown seed to the soft ripe surface pool.
    pub fn sow(&mut self, ops: PoolOps, seed: &DmPool) {
        if let Some(surface) = self.layers.first_mut() {
            ops.add(&mut surface[Hardness::Soft][Ripeness::Ripe], seed);
        }
    }

    /// Add `seed` to one pool.
    pub fn add(
        &mut self,
        ops: PoolOps,
        hardness: Hardness,
        ripeness: Ripeness,
        layer: usize,
        seed: &DmPool,
    ) {
        if let Some(pools) = self.layers.get_mut(layer) {
            ops.add(&mut pools[hardness][ripeness], seed);
        }
    }

    /// Remove the proportion `propn` of all surface seed.
    pub fn remove_surface(&mut self, ops: PoolOps, propn: f64) -> DmPool {
        let mut removed = DmPool::ZERO;
        if let Some(surface) = self.layers.first_mut() {
            for pool in surface.values_mut().flat_map(|ripeness| ripeness.values_mut()) {
                let taken = ops.split_off(pool, propn.clamp(0.0, 1.0) * pool.dm);
                ops.add(&mut removed, &taken);
            }
        }
        removed
    }

    /// Start the innate dormancy of the seed just set.
    pub fn start_innate_dormancy(&mut self) {
        self.innate_dormancy_days = Some(0);
        tracing::info!("seed entered innate dormancy");
    }

    // -----------------------------------------------------------------------
    // Daily rates
    // -----------------------------------------------------------------------

    /// Compute today's seed-bank rates, advancing the innate dormancy clock
    /// and the germination index.
    pub fn compute_rates(&mut self, params: &SpeciesParams, inputs: &DailyInputs) -> SeedRates {
        let seed = &params.seed;
        let germn = &params.germination;
        let mut rates = SeedRates::none(self.layer_count());
        rates.harden = seed[1];

        if let Some(days) = self.innate_dormancy_days {
            let days = days.saturating_add(1);
            if f64::from(days) >= seed[2] {
                self.innate_dormancy_days = None;
                rates.ripen = germn[8];
                rates.discard = 1.0 - germn[8];
                tracing::info!(days, "innate seed dormancy ended");
            } else {
                self.innate_dormancy_days = Some(days);
            }
        }

        let surface_soften = if seed[3] > 0.0 {
            seed[3] * (inputs.max_temp - seed[4]).max(0.0)
        } else {
            seed[3].abs() * (seed[4] - inputs.mean_temp).max(0.0)
        };
        if let Some(soften) = rates.soften.first_mut() {
            *soften = surface_soften;
        }

        for (layer, death) in rates.death.iter_mut().enumerate() {
            if layer_value(&inputs.rel_asw, layer) > WET_SOIL_ASW {
                *death = params.seed_death;
            }
        }

        let soft_ripe = self.pool(Hardness::Soft, Ripeness::Ripe, 0).dm;
        let surface_germination = if soft_ripe <= 0.0 || inputs.surface_asw() < germn[1] {
            self.germination_index = 0.0;
            0.0
        } else {
            let warm = ramp(inputs.mean_temp, germn[2], germn[3]);
            let not_hot = ramp(inputs.mean_temp, germn[5], germn[4]);
            self.germination_index += warm.min(not_hot);
            ramp(self.germination_index, germn[6], germn[7])
        };
        if let Some(germinate) = rates.germinate.first_mut() {
            *germinate = surface_germination;
        }
        rates
    }

    // -----------------------------------------------------------------------
    // Daily update
    // -----------------------------------------------------------------------

    /// Execute the day's seed flows.
    ///
    /// # Order of operations
    ///
    /// 1. Per layer, bound every outflow against what earlier outflows left
    /// 2. Reset the germination index in proportion to newly ripened seed
    /// 3. Execute grazing, death, hardening, ripening, discarding,
    ///    softening and germination
    /// 4. Add the day's new seed to the soft unripe surface pool
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if a pool was driven below the mass-balance
    /// floor.
    pub fn update(
        &mut self,
        ops: PoolOps,
        rates: &SeedRates,
        grazed: &RipenessTable<f64>,
        new_seeds: &DmPool,
    ) -> Result<SeedOutcome, LedgerError> {
        let mut outcome = SeedOutcome {
            germinated: DmPool::ZERO,
            eaten: DmPool::ZERO,
            residue: vec![DmPool::ZERO; self.layer_count()],
        };

        for (layer, pools) in self.layers.iter_mut().enumerate() {
            let mut budgets: SeedBudgets = HardnessTable::filled(RipenessTable::filled(FluxBudget::new()));
            let death = rates.death.get(layer).copied().unwrap_or_default();

            let mut eaten = HardnessTable::filled(RipenessTable::filled(0.0));
            let mut dying = HardnessTable::filled(RipenessTable::filled(0.0));
            for hardness in Hardness::ALL {
                for ripeness in Ripeness::ALL {
                    let pool = &pools[hardness][ripeness];
                    let budget = &mut budgets[hardness][ripeness];
                    if layer == 0 {
                        let share = div0(
                            pool.dm,
                            pools[Hardness::Soft][ripeness].dm + pools[Hardness::Hard][ripeness].dm,
                        );
                        eaten[hardness][ripeness] = budget.limited_flux(pool, grazed[ripeness] * share);
                    }
                    dying[hardness][ripeness] = budget.limited_propn(pool, death[hardness]);
                }
            }

            let germinated = budgets[Hardness::Soft][Ripeness::Ripe].limited_propn(
                &pools[Hardness::Soft][Ripeness::Ripe],
                layer_value(&rates.germinate, layer),
            );
            let softened = budgets[Hardness::Hard][Ripeness::Ripe].limited_propn(
                &pools[Hardness::Hard][Ripeness::Ripe],
                layer_value(&rates.soften, layer),
            );
            let ripened = HardnessTable::from_fn(|hardness| {
                budgets[hardness][Ripeness::Unripe]
                    .limited_propn(&pools[hardness][Ripeness::Unripe], rates.ripen)
            });
            let discarded = HardnessTable::from_fn(|hardness| {
                budgets[hardness][Ripeness::Unripe]
                    .limited_propn(&pools[hardness][Ripeness::Unripe], rates.discard)
            });
            let hardened = budgets[Hardness::Soft][Ripeness::Unripe]
                .limited_propn(&pools[Hardness::Soft][Ripeness::Unripe], rates.harden);

            if layer == 0 && self.germination_index > 0.0 && ripened[Hardness::Soft] > 0.0 {
                let remaining = pools[Hardness::Soft][Ripeness::Ripe].dm - germinated;
                self.germination_index = div0(remaining, remaining + ripened[Hardness::Soft]);
            }

            let mut layer_residue = DmPool::ZERO;
            for hardness in Hardness::ALL {
                for ripeness in Ripeness::ALL {
                    let pool = &mut pools[hardness][ripeness];
                    let taken = ops.split_off(pool, eaten[hardness][ripeness]);
                    ops.add(&mut outcome.eaten, &taken);
                    let died = ops.split_off(pool, dying[hardness][ripeness]);
                    ops.add(&mut layer_residue, &died);
                }
            }

            let moved = ops.split_off(&mut pools[Hardness::Soft][Ripeness::Unripe], hardened);
            ops.add(&mut pools[Hardness::Hard][Ripeness::Unripe], &moved);
            for hardness in Hardness::ALL {
                let moved = ops.split_off(&mut pools[hardness][Ripeness::Unripe], ripened[hardness]);
                ops.add(&mut pools[hardness][Ripeness::Ripe], &moved);
                let discard = ops.split_off(&mut pools[hardness][Ripeness::Unripe], discarded[hardness]);
                ops.add(&mut layer_residue, &discard);
            }
            let moved = ops.split_off(&mut pools[Hardness::Hard][Ripeness::Ripe], softened);
            ops.add(&mut pools[Hardness::Soft][Ripeness::Ripe], &moved);
            let sprouted = ops.split_off(&mut pools[Hardness::Soft][Ripeness::Ripe], germinated);
            ops.add(&mut outcome.germinated, &sprouted);

            if let Some(residue) = outcome.residue.get_mut(layer) {
                *residue = layer_residue;
            }
        }

        if let Some(surface) = self.layers.first_mut() {
            ops.add(&mut surface[Hardness::Soft][Ripeness::Unripe], new_seeds);
        }
        for pool in self
            .layers
            .iter_mut()
            .flat_map(|layer| layer.values_mut())
            .flat_map(|ripeness| ripeness.values_mut())
        {
            ops.zero_round_off(pool)?;
        }

        if outcome.germinated.dm > 0.0 {
            tracing::debug!(germinated = outcome.germinated.dm, "seed germinated");
        }
        Ok(outcome)
    }
}

type SeedBudgets = HardnessTable<RipenessTable<FluxBudget>>;
