//! Management events: sowing, spray-topping and killing.
//!
//! These run between [`Population::begin_day`] and
//! [`Population::compute_rates`], so whatever they add or remove is posted
//! to the same day's mass audit.

use pasture_ledger::math::weight_average;
use pasture_types::{ClassTable, DmPool, Part, ShootPart, ShootTable, Status, StatusGroup};

use super::Population;
use crate::cohort::Cohort;
use crate::error::PopulationError;

impl Population {
    /// Sow `dm` g/m^2 of seed.
    ///
    /// Species with a seed bank receive it as soft ripe surface seed; the
    /// others establish it directly as young plants.
    ///
    /// # Errors
    ///
    /// Returns [`PopulationError`] if adding the new plants required a
    /// cohort merge that failed.
    pub fn sow(&mut self, dm: f64) -> Result<(), PopulationError> {
        if dm <= 0.0 {
            return Ok(());
        }
        let view = self.day_view();
        let ctx = view.cohort(Status::Seedling);
        let ops = ctx.ops;
        let seed = Cohort::new_tissue(&ctx, Part::Seed, dm);
        ops.add(&mut self.flows.sown, &seed);
        if self.site.params.has_seeds {
            self.seeds.sow(ops, &seed);
        } else {
            self.add_seedlings(&seed)?;
        }
        tracing::info!(dm, "seed sown");
        Ok(())
    }

    /// Halt reproductive development of a grass sward. Returns `true` if
    /// the sward was in a stage that can be spray-topped.
    pub fn spray_top(&mut self) -> bool {
        let topped = self.phenology.spray_top(&self.site.params);
        if topped {
            tracing::info!(stage = %self.phenology.stage, "sward spray-topped");
        }
        topped
    }

    /// Kill the proportion `propn_herbage` of the green plants and
    /// `propn_seed` of the surface seed.
    ///
    /// Killed shoots become standing dead in the same part and class.
    /// Killed roots and seed go to the residue sinks.
    pub fn kill(&mut self, propn_herbage: f64, propn_seed: f64) {
        let propn_herbage = propn_herbage.clamp(0.0, 1.0);
        let propn_seed = propn_seed.clamp(0.0, 1.0);
        let ops = self.site.ops;
        self.find_or_make(Status::Dead);

        let mut killed: ShootTable<ClassTable<(DmPool, f64)>> =
            ShootTable::filled(ClassTable::filled((DmPool::ZERO, 0.0)));
        for cohort in self
            .cohorts
            .iter_mut()
            .filter(|cohort| cohort.status.is_green())
        {
            cohort.remove_stem_reserve(propn_herbage * cohort.shoot(ShootPart::Stem).dm);
            for part in ShootPart::ALL {
                for (class, pool) in cohort.herbage[part].iter_mut() {
                    let area = cohort.specific_area[part][class];
                    let taken = ops.split_off(pool, propn_herbage * pool.dm);
                    let (total, total_area) = &mut killed[part][class];
                    *total_area = weight_average(*total_area, total.dm, area, taken.dm);
                    ops.add(total, &taken);
                }
            }
            for layers in cohort.roots.values_mut() {
                for (layer, pool) in layers.iter_mut().enumerate() {
                    let taken = ops.split_off(pool, propn_herbage * pool.dm);
                    if let Some(residue) = self.flows.root_residue.get_mut(layer) {
                        ops.add_allowing_loss(residue, &taken);
                    }
                }
            }
        }

        if let Some(dead) = self
            .cohorts
            .iter_mut()
            .find(|cohort| cohort.status == Status::Dead)
        {
            for (part, classes) in killed.iter() {
                for (class, (pool, area)) in classes.iter() {
                    if pool.dm > 0.0 {
                        dead.add_herbage(ops, part, class, pool, *area);
                    }
                }
            }
        }

        let seed = self.seeds.remove_surface(ops, propn_seed);
        ops.add_allowing_loss(&mut self.flows.seed_residue, &seed);
        tracing::info!(
            propn_herbage,
            propn_seed,
            green = self.herbage(StatusGroup::Green).dm,
            "sward killed"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::cohort::tests::{close, params, soil};
    use crate::population::tests::sward_population;
    use pasture_ledger::ConservationResult;
    use pasture_types::{DevelopStage, DmdClass, ElementSet, Hardness, Ripeness};

    #[test]
    fn sown_seed_enters_the_surface_seed_bank() {
        let mut population = Population::new(params(), soil(), ElementSet::N);
        population.begin_day(population.inputs().clone());
        population.sow(5.0).unwrap();
        let pool = population.seeds().pool(Hardness::Soft, Ripeness::Ripe, 0);
        assert!(close(pool.dm, 5.0));
        assert!(close(population.flows().sown.dm, 5.0));
        assert!(population.flows().sown.nu[pasture_types::Element::N] > 0.0);
    }

    #[test]
    fn sowing_nothing_changes_nothing() {
        let mut population = Population::new(params(), soil(), ElementSet::None);
        population.sow(0.0).unwrap();
        population.sow(-3.0).unwrap();
        assert!(close(population.seed_mass(), 0.0));
    }

    #[test]
    fn spray_topping_needs_a_growing_grass() {
        let mut population = sward_population(ElementSet::None);
        assert!(population.spray_top());
        assert_eq!(population.phenology().stage, DevelopStage::SprayTopped);
        assert!(!population.spray_top());
    }

    #[test]
    fn killed_shoots_become_standing_dead() {
        let mut population = sward_population(ElementSet::N);
        population.begin_day(population.inputs().clone());
        let before = population.stock();
        population.kill(0.5, 1.0);

        let class = DmdClass::new(3).unwrap();
        assert!(close(population.herbage(StatusGroup::Green).dm, 50.0));
        let dead = population.herbage_by_class(StatusGroup::Dry);
        assert!(close(dead[class].dm, 50.0));
        assert!(close(population.flows().root_residue_total().dm, 25.0));
        assert!(close(population.roots(StatusGroup::Green).dm, 25.0));

        let after = population.stock();
        assert!(close(before.dm - after.dm, 25.0));
        let mut audit = pasture_ledger::MassAudit::open(ElementSet::N, before);
        population.flows().post_to(&mut audit);
        assert_eq!(audit.verify(1, &after), ConservationResult::Balanced);
    }

    #[test]
    fn killing_everything_leaves_no_green_herbage() {
        let mut population = sward_population(ElementSet::None);
        population.set_seed(Hardness::Hard, Ripeness::Ripe, 0, 8.0);
        population.begin_day(population.inputs().clone());
        population.kill(1.0, 1.0);
        assert!(close(population.herbage(StatusGroup::Green).dm, 0.0));
        assert!(close(population.seed_mass(), 0.0));
        assert!(close(population.flows().seed_residue.dm, 8.0));
    }
}
