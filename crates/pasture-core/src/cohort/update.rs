//! The flux-limited daily mass balance of one cohort.
//!
//! # Order of operations
//!
//! 1. State variables advance: rooting depth, frost hardening, seedling
//!    stress and the establishment index.
//! 2. Every outflow of every pool is bounded against what the flows
//!    before it have left. Shoots: respiration (dry herbage only), stem
//!    translocation, grazing, death or fall, digestibility decline. Roots:
//!    translocation, death, then aging or renewal.
//! 3. The stem reserve shrinks with the grazed stem. Nutrient is withdrawn
//!    from the pools and allocated to today's growth.
//! 4. Shoot flows run from the least digestible class upward, so material
//!    moving down a class is never moved twice in one day.
//! 5. Root flows run layer by layer: losses, death, aging and renewal,
//!    then growth.
//! 6. Pools left holding only a round-off residue are emptied.
//!
//! Material leaving for another cohort or leaving the pasture is returned
//! in a [`CohortOutcome`]; the population applies it.

use pasture_ledger::math::weight_average;
use pasture_ledger::{FluxBudget, PoolOps};
use pasture_types::dmd::CLASS_WIDTH;
use pasture_types::{
    AgeTable, ClassTable, DmPool, DmdClass, Part, RootAge, ShootPart, ShootTable, Status,
};

use super::{Cohort, CohortContext, sum_pools};
use crate::environment::layer_value;
use crate::error::CohortError;

/// What one cohort's daily update sends out of the cohort.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortOutcome {
    /// Herbage removed by grazing, per shoot part and class.
    pub grazed: ShootTable<ClassTable<DmPool>>,
    /// Herbage dying, falling or broken down into the next status, per
    /// shoot part and class.
    pub overflow: ShootTable<ClassTable<DmPool>>,
    /// Specific area of the overflowing herbage (m^2/g).
    pub overflow_area: ShootTable<ClassTable<f64>>,
    /// Status receiving `overflow`; `None` when it left as shoot residue.
    pub overflow_to: Option<Status>,
    /// Herbage incorporated into the soil, per shoot part.
    pub shoot_residue: ShootTable<DmPool>,
    /// Dead roots per soil layer.
    pub root_residue: Vec<DmPool>,
    /// Dry mass respired by dry herbage (g/m^2).
    pub respired: f64,
    /// Nutrient leached out of litter.
    pub leachate: DmPool,
    /// Seed produced today.
    pub new_seeds: DmPool,
    /// Net material the cohort gained from outside the pasture: growth
    /// added to its pools and to seed, less the dry mass and nutrient that
    /// growth drew from the cohort itself.
    pub inflow: DmPool,
}

impl CohortOutcome {
    fn new(status: Status, layer_count: usize) -> Self {
        Self {
            grazed: ShootTable::filled(ClassTable::filled(DmPool::ZERO)),
            overflow: ShootTable::filled(ClassTable::filled(DmPool::ZERO)),
            overflow_area: ShootTable::filled(ClassTable::filled(0.0)),
            overflow_to: status.overflow_destination(),
            shoot_residue: ShootTable::filled(DmPool::ZERO),
            root_residue: vec![DmPool::ZERO; layer_count],
            respired: 0.0,
            leachate: DmPool::ZERO,
            new_seeds: DmPool::ZERO,
            inflow: DmPool::ZERO,
        }
    }

    /// All grazed herbage.
    pub fn grazed_total(&self) -> DmPool {
        sum_pools(self.grazed.values().flat_map(|classes| classes.values()))
    }

    /// All herbage passed to the next status.
    pub fn overflow_total(&self) -> DmPool {
        sum_pools(self.overflow.values().flat_map(|classes| classes.values()))
    }

    /// Herbage incorporated into the soil, both parts together.
    pub fn shoot_residue_total(&self) -> DmPool {
        sum_pools(self.shoot_residue.values())
    }

    /// Dead roots over the whole profile.
    pub fn root_residue_total(&self) -> DmPool {
        sum_pools(self.root_residue.iter())
    }
}

/// Bounded outflows of one herbage pool.
#[derive(Debug, Clone, Copy, Default)]
struct ShootFluxes {
    respired: f64,
    transloc: f64,
    grazed: f64,
    over: f64,
    down: f64,
}

/// Bounded outflows of the root pools of one layer.
#[derive(Debug, Clone, Copy, Default)]
struct LayerRootFluxes {
    transloc: AgeTable<f64>,
    dying: AgeTable<f64>,
    aging: f64,
    renewed: f64,
}

impl Cohort {
    /// Apply today's rates to the cohort's pools.
    ///
    /// `grazed_propn` is the fraction of each herbage pool removed today.
    ///
    /// # Errors
    ///
    /// Returns [`CohortError::Ledger`] when a pool has been driven below
    /// the mass-balance floor.
    pub(crate) fn update_state(
        &mut self,
        ctx: &CohortContext<'_>,
        grazed_propn: &ShootTable<ClassTable<f64>>,
    ) -> Result<CohortOutcome, CohortError> {
        let ops = ctx.ops;
        let layer_count = self.layer_count();
        let mut outcome = CohortOutcome::new(self.status, layer_count);

        // 1. State variables
        self.advance_state_variables();

        // 2. Flux limits
        let shoot_fluxes = self.bound_shoot_fluxes(ctx, grazed_propn);
        let root_fluxes = self.bound_root_fluxes();
        for class in DmdClass::ALL {
            self.rates.stem_transloc[class] = shoot_fluxes[ShootPart::Stem][class].transloc;
        }

        // 3. Stem reserve and nutrient
        let grazed_stem = shoot_fluxes[ShootPart::Stem].map(|_, fluxes| fluxes.grazed);
        self.remove_stem_reserve_by_class(&grazed_stem);
        if !ops.elements().is_empty() {
            let flows = self.update_nutrient_flows(ctx);
            self.allocate_nutrient_flows(ctx, &flows.supply);
            ops.subtract(&mut outcome.inflow, &flows.withdrawn);
            outcome.leachate = flows.leachate;
        }

        // 4. Shoots
        for part in ShootPart::ALL {
            for class in DmdClass::ALL.into_iter().rev() {
                let fluxes = shoot_fluxes[part][class];
                self.execute_shoot_flows(ops, part, class, &fluxes, &mut outcome);
            }
        }

        // 5. Roots
        for (layer, fluxes) in root_fluxes.iter().enumerate() {
            self.execute_root_flows(ctx, layer, fluxes, &mut outcome);
        }

        let seed = self.rates.seed_growth;
        if seed.dm > 0.0 {
            outcome.new_seeds = seed;
            ops.add_allowing_loss(&mut outcome.inflow, &seed);
        }

        // 6. Round-off
        for pool in self.herbage.values_mut().flat_map(|classes| classes.values_mut()) {
            ops.zero_round_off(pool)?;
        }
        for pool in self.roots.values_mut().flat_map(|layers| layers.iter_mut()) {
            ops.zero_round_off(pool)?;
        }
        Ok(outcome)
    }

    fn advance_state_variables(&mut self) {
        let growth = self.rates.part_growth;
        if self.status.is_green() {
            if growth[Part::Root] > 0.0 {
                self.root_depth +=
                    layer_value(&self.rates.root_extension, self.rates.max_root_layer);
            }
            self.frost_factor += self.rates.delta_frost;
        }

        if self.status == Status::Seedling {
            self.seedling_stress += self.rates.delta_stress;
            let herbage = self.herbage_total().dm;
            self.establish_index = if herbage > 0.0 {
                let shoot_growth = (growth[Part::Leaf] + growth[Part::Stem]).max(0.0);
                self.establish_index * (1.0 + shoot_growth / herbage)
            } else {
                1.0
            };
        } else {
            self.seedling_stress = 0.0;
            self.establish_index = 0.0;
        }
    }

    /// Bound the outflows of every herbage pool. Green respiration has
    /// already been netted off growth, so it only reduces what the other
    /// flows may claim.
    fn bound_shoot_fluxes(
        &self,
        ctx: &CohortContext<'_>,
        grazed_propn: &ShootTable<ClassTable<f64>>,
    ) -> ShootTable<ClassTable<ShootFluxes>> {
        let green = self.status.is_green();
        ShootTable::from_fn(|part| {
            let lowest = self.lowest_class(ctx.params, part);
            ClassTable::from_fn(|class| {
                let pool = &self.herbage[part][class];
                let respire = (-self.rates.shoot_growth[part][class].dm).max(0.0);
                let stem_transloc = if part == ShootPart::Stem {
                    self.rates.stem_transloc[class]
                } else {
                    0.0
                };

                let mut fluxes = ShootFluxes::default();
                let mut budget = if green {
                    FluxBudget::with_prior(respire)
                } else {
                    FluxBudget::new()
                };
                if !green {
                    fluxes.respired = budget.limited_flux(pool, respire);
                }
                if part == ShootPart::Stem {
                    fluxes.transloc = budget.limited_flux(pool, stem_transloc);
                }
                fluxes.grazed = budget.limited_propn(pool, grazed_propn[part][class]);
                fluxes.over = budget.limited_propn(pool, self.rates.shoot_loss[part][class]);
                fluxes.down = budget
                    .limited_propn(pool, self.rates.dmd_decline[part][class] / CLASS_WIDTH);

                // Losing digestible matter leaves the remainder less digestible.
                if green && class < lowest {
                    let dig_flux = (1.0 - class.dmd()) / CLASS_WIDTH;
                    fluxes.down += budget.limited_flux(pool, (respire + stem_transloc) * dig_flux);
                }
                if self.status.is_litter() && class >= lowest {
                    fluxes.over += fluxes.down;
                    fluxes.down = 0.0;
                }
                fluxes
            })
        })
    }

    /// Bound the outflows of every root pool. Aging and renewal share the
    /// budget of the pool they drain.
    fn bound_root_fluxes(&self) -> Vec<LayerRootFluxes> {
        (0..self.layer_count())
            .map(|layer| {
                let pools = AgeTable::from_fn(|age| {
                    self.roots[age].get(layer).copied().unwrap_or(DmPool::ZERO)
                });
                let mut fluxes = LayerRootFluxes::default();
                let mut budgets = AgeTable::filled(FluxBudget::new());
                for age in RootAge::ALL {
                    let respire = self.rates.root_growth[age]
                        .get(layer)
                        .map_or(0.0, |growth| (-growth.dm).max(0.0));
                    let budget = &mut budgets[age];
                    *budget = FluxBudget::with_prior(respire);
                    fluxes.transloc[age] = budget
                        .limited_flux(&pools[age], layer_value(&self.rates.root_transloc[age], layer));
                    fluxes.dying[age] = budget.limited_propn(&pools[age], self.rates.root_loss[age]);
                }
                fluxes.aging = budgets[RootAge::Effective]
                    .limited_propn(&pools[RootAge::Effective], self.rates.root_aging);
                fluxes.renewed =
                    budgets[RootAge::Old].limited_propn(&pools[RootAge::Old], self.rates.root_reloc);
                fluxes
            })
            .collect()
    }

    fn execute_shoot_flows(
        &mut self,
        ops: PoolOps,
        part: ShootPart,
        class: DmdClass,
        fluxes: &ShootFluxes,
        outcome: &mut CohortOutcome,
    ) {
        // Respiration keeps the herbage area.
        if fluxes.respired > 0.0 {
            let pool = &mut self.herbage[part][class];
            let area = self.specific_area[part][class] * pool.dm;
            pool.dm -= fluxes.respired;
            if pool.dm > 0.0 {
                self.specific_area[part][class] = area / pool.dm;
            }
            outcome.respired += fluxes.respired;
        }

        // Translocated nutrient has already been withdrawn.
        if fluxes.transloc > 0.0 {
            self.herbage[part][class].dm -= fluxes.transloc;
            outcome.inflow.dm -= fluxes.transloc;
        }

        outcome.grazed[part][class] = ops.split_off(&mut self.herbage[part][class], fluxes.grazed);

        if let Some(lower) = class.lower() {
            self.move_herbage(ops, part, class, lower, fluxes.down);
        }

        let area = self.specific_area[part][class];
        let over = ops.split_off(&mut self.herbage[part][class], fluxes.over);
        if over.dm > 0.0 {
            if outcome.overflow_to.is_some() {
                outcome.overflow[part][class] = over;
                outcome.overflow_area[part][class] = area;
            } else {
                ops.add(&mut outcome.shoot_residue[part], &over);
            }
        }

        if self.status.is_green() {
            let growth = self.rates.shoot_growth[part][class];
            let area = self.rates.new_specific_area[part];
            self.add_herbage(ops, part, class, &growth, area);
            ops.add_allowing_loss(&mut outcome.inflow, &growth);
        }
    }

    fn execute_root_flows(
        &mut self,
        ctx: &CohortContext<'_>,
        layer: usize,
        fluxes: &LayerRootFluxes,
        outcome: &mut CohortOutcome,
    ) {
        let ops = ctx.ops;
        let growth = AgeTable::from_fn(|age| {
            self.rates.root_growth[age].get(layer).copied().unwrap_or(DmPool::ZERO)
        });

        for age in RootAge::ALL {
            if let Some(pool) = self.roots[age].get_mut(layer) {
                if growth[age].dm < 0.0 {
                    ops.add_allowing_loss(pool, &growth[age]);
                    ops.add_allowing_loss(&mut outcome.inflow, &growth[age]);
                }
                pool.dm -= fluxes.transloc[age];
                outcome.inflow.dm -= fluxes.transloc[age];
            }

            let dead = self.dead_root_pool(ctx, age, layer, fluxes.dying[age]);
            if let Some(pool) = self.roots[age].get_mut(layer) {
                ops.subtract(pool, &dead);
            }
            if let Some(residue) = outcome.root_residue.get_mut(layer) {
                ops.add_allowing_loss(residue, &dead);
            }
        }

        self.move_root(ops, layer, RootAge::Effective, RootAge::Old, fluxes.aging);
        self.move_root(ops, layer, RootAge::Old, RootAge::Effective, fluxes.renewed);

        for age in RootAge::ALL.into_iter().filter(|&age| growth[age].dm >= 0.0) {
            if let Some(pool) = self.roots[age].get_mut(layer) {
                ops.add_allowing_loss(pool, &growth[age]);
                ops.add_allowing_loss(&mut outcome.inflow, &growth[age]);
            }
        }
    }

    /// Move `dm` of herbage to another class of the same part, carrying
    /// its specific area.
    fn move_herbage(&mut self, ops: PoolOps, part: ShootPart, from: DmdClass, to: DmdClass, dm: f64) {
        if dm <= 0.0 {
            return;
        }
        self.specific_area[part][to] = weight_average(
            self.specific_area[part][to],
            self.herbage[part][to].dm,
            self.specific_area[part][from],
            dm,
        );
        let moved = ops.split_off(&mut self.herbage[part][from], dm);
        ops.add_allowing_loss(&mut self.herbage[part][to], &moved);
    }

    /// Add `pool` (which may be a loss) to one herbage class. Gains of
    /// tissue with specific area `area` update the class's specific area.
    pub(crate) fn add_herbage(
        &mut self,
        ops: PoolOps,
        part: ShootPart,
        class: DmdClass,
        pool: &DmPool,
        area: f64,
    ) {
        if pool.dm > 0.0 {
            self.specific_area[part][class] = weight_average(
                self.specific_area[part][class],
                self.herbage[part][class].dm,
                area,
                pool.dm,
            );
        }
        ops.add_allowing_loss(&mut self.herbage[part][class], pool);
    }

    fn move_root(&mut self, ops: PoolOps, layer: usize, from: RootAge, to: RootAge, dm: f64) {
        if dm <= 0.0 {
            return;
        }
        let Some(moved) = self.roots[from]
            .get_mut(layer)
            .map(|pool| ops.split_off(pool, dm))
        else {
            return;
        };
        if let Some(pool) = self.roots[to].get_mut(layer) {
            ops.add_allowing_loss(pool, &moved);
        }
    }

    /// Take in the herbage another cohort passed down to this status.
    pub(crate) fn receive_overflow(&mut self, ops: PoolOps, outcome: &CohortOutcome) {
        for part in ShootPart::ALL {
            for class in DmdClass::ALL {
                let pool = outcome.overflow[part][class];
                self.add_herbage(ops, part, class, &pool, outcome.overflow_area[part][class]);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::cohort::tests::{Fixture, close, sward};
    use pasture_types::{Element, ElementSet};

    fn grazing(class: DmdClass, propn: f64) -> ShootTable<ClassTable<f64>> {
        let mut table = ShootTable::filled(ClassTable::filled(0.0));
        for part in ShootPart::ALL {
            table[part][class] = propn;
        }
        table
    }

    fn no_grazing() -> ShootTable<ClassTable<f64>> {
        ShootTable::filled(ClassTable::filled(0.0))
    }

    #[test]
    fn grazing_removes_the_requested_fraction_of_each_class() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(ElementSet::N);
        let mut cohort = sward(&ctx);
        let class = DmdClass::new(3).unwrap();
        let leaf_n = cohort.herbage[ShootPart::Leaf][class].nu[Element::N];

        let outcome = cohort.update_state(&ctx, &grazing(class, 0.3)).unwrap();

        assert!(close(outcome.grazed_total().dm, 30.0));
        assert!(close(cohort.herbage[ShootPart::Leaf][class].dm, 42.0));
        assert!(close(cohort.herbage[ShootPart::Stem][class].dm, 28.0));
        assert!(close(outcome.grazed[ShootPart::Leaf][class].nu[Element::N], 0.3 * leaf_n));
        assert_eq!(outcome.overflow_to, Some(Status::Dead));
    }

    #[test]
    fn competing_outflows_never_overdraw_a_pool() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(ElementSet::None);
        let mut cohort = sward(&ctx);
        let class = DmdClass::new(3).unwrap();
        for part in ShootPart::ALL {
            cohort.rates.shoot_loss[part][class] = 0.8;
            cohort.rates.dmd_decline[part][class] = CLASS_WIDTH;
        }

        let outcome = cohort.update_state(&ctx, &grazing(class, 0.5)).unwrap();

        for pool in cohort.herbage.values().flat_map(|classes| classes.values()) {
            assert!(pool.dm >= 0.0);
        }
        assert!(close(outcome.grazed_total().dm, 50.0));
        assert!(close(outcome.overflow_total().dm, 50.0));
        assert!(cohort.herbage_total().dm.abs() < 1e-9);
    }

    #[test]
    fn dry_respiration_keeps_the_herbage_area() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(ElementSet::None);
        let mut cohort = Cohort::new(Status::Dead, 3);
        let class = DmdClass::new(5).unwrap();
        cohort.herbage[ShootPart::Leaf][class] = DmPool::with_dm(10.0);
        cohort.specific_area[ShootPart::Leaf][class] = 0.01;
        cohort.rates.shoot_growth[ShootPart::Leaf][class] = DmPool::with_dm(-2.0);

        let outcome = cohort.update_state(&ctx, &no_grazing()).unwrap();

        assert!(close(outcome.respired, 2.0));
        assert!(close(cohort.herbage[ShootPart::Leaf][class].dm, 8.0));
        assert!(close(cohort.area_index(ShootPart::Leaf), 0.1));
        assert_eq!(outcome.overflow_to, Some(Status::Litter1));
    }

    #[test]
    fn fine_litter_is_incorporated_as_residue() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(ElementSet::None);
        let mut cohort = Cohort::new(Status::Litter2, 3);
        let class = DmdClass::new(8).unwrap();
        cohort.herbage[ShootPart::Stem][class] = DmPool::with_dm(10.0);
        cohort.rates.shoot_loss[ShootPart::Stem] = ClassTable::filled(0.1);

        let outcome = cohort.update_state(&ctx, &no_grazing()).unwrap();

        assert_eq!(outcome.overflow_to, None);
        assert!(close(outcome.shoot_residue[ShootPart::Stem].dm, 1.0));
        assert!(close(outcome.shoot_residue_total().dm, 1.0));
        assert!(close(outcome.overflow_total().dm, 0.0));
        assert!(close(cohort.herbage_total().dm, 9.0));
    }

    #[test]
    fn dying_roots_become_root_residue() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(ElementSet::N);
        let mut cohort = sward(&ctx);
        cohort.rates.root_loss[RootAge::Effective] = 0.1;
        let effective = cohort.root_age_total(RootAge::Effective).dm;
        let roots = cohort.roots_total().dm;

        let outcome = cohort.update_state(&ctx, &no_grazing()).unwrap();

        let residue = outcome.root_residue_total();
        assert!(close(residue.dm, 0.1 * effective));
        assert!(residue.nu[Element::N] > 0.0);
        assert!(close(cohort.roots_total().dm + residue.dm, roots));
    }

    #[test]
    fn aging_moves_effective_roots_to_old() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(ElementSet::None);
        let mut cohort = sward(&ctx);
        cohort.rates.root_aging = 0.5;
        let effective = cohort.root_age_total(RootAge::Effective).dm;
        let old = cohort.root_age_total(RootAge::Old).dm;

        cohort.update_state(&ctx, &no_grazing()).unwrap();

        assert!(close(cohort.root_age_total(RootAge::Effective).dm, 0.5 * effective));
        assert!(close(cohort.root_age_total(RootAge::Old).dm, old + 0.5 * effective));
    }

    #[test]
    fn digestibility_decline_moves_herbage_down_one_class() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(ElementSet::None);
        let mut cohort = sward(&ctx);
        let class = DmdClass::new(3).unwrap();
        let lower = class.lower().unwrap();
        cohort.rates.dmd_decline[ShootPart::Leaf][class] = 0.25 * CLASS_WIDTH;

        cohort.update_state(&ctx, &no_grazing()).unwrap();

        assert!(close(cohort.herbage[ShootPart::Leaf][class].dm, 45.0));
        assert!(close(cohort.herbage[ShootPart::Leaf][lower].dm, 15.0));
        assert!(close(cohort.specific_area[ShootPart::Leaf][lower], 0.02));
    }

    #[test]
    fn outcome_accounts_for_every_change_in_mass() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(ElementSet::N);
        let mut cohort = sward(&ctx);
        let class = DmdClass::new(3).unwrap();
        let young = DmdClass::new(2).unwrap();
        cohort.rates.shoot_growth[ShootPart::Leaf][young] = Cohort::new_tissue(&ctx, Part::Leaf, 5.0);
        cohort.rates.shoot_loss[ShootPart::Stem][class] = 0.1;
        cohort.rates.root_loss[RootAge::Old] = 0.2;
        let before = sum_pools([&cohort.herbage_total(), &cohort.roots_total()]);

        let outcome = cohort.update_state(&ctx, &grazing(class, 0.2)).unwrap();

        let after = sum_pools([&cohort.herbage_total(), &cohort.roots_total()]);
        let out = sum_pools([
            &outcome.grazed_total(),
            &outcome.overflow_total(),
            &outcome.root_residue_total(),
            &outcome.shoot_residue_total(),
            &outcome.new_seeds,
            &outcome.leachate,
        ]);
        assert!((after.dm + out.dm + outcome.respired - before.dm - outcome.inflow.dm).abs() < 1e-9);
        assert!(
            (after.nu[Element::N] + out.nu[Element::N]
                - before.nu[Element::N]
                - outcome.inflow.nu[Element::N])
                .abs()
                < 1e-9
        );
    }

    #[test]
    fn received_overflow_carries_its_area() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(ElementSet::None);
        let mut source = sward(&ctx);
        let class = DmdClass::new(3).unwrap();
        source.rates.shoot_loss[ShootPart::Leaf][class] = 0.5;
        let outcome = source.update_state(&ctx, &no_grazing()).unwrap();

        let mut dead = Cohort::new(Status::Dead, 3);
        dead.herbage[ShootPart::Leaf][class] = DmPool::with_dm(30.0);
        dead.specific_area[ShootPart::Leaf][class] = 0.01;
        dead.receive_overflow(ctx.ops, &outcome);

        assert!(close(dead.herbage[ShootPart::Leaf][class].dm, 60.0));
        assert!(close(dead.specific_area[ShootPart::Leaf][class], 0.015));
    }
}
