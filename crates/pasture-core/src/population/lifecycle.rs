//! Cohort creation, merging, deletion and status changes.
//!
//! The cohort list stays sorted by status through every change here. A new
//! cohort goes in front of any existing cohort of the same status; status
//! changes re-sort the list stably and then merge duplicate established or
//! senescing cohorts.

use pasture_ledger::math::weight_average;
use pasture_types::constants::{COHORT_ROOT_DIFF, VERY_SMALL};
use pasture_types::{DevelopStage, DmPool, DmdClass, RootAge, ShootPart, ShootTable, Status, StatusGroup};

use super::{DayView, Population};
use crate::cohort::Cohort;
use crate::environment::layer_value;
use crate::error::{CohortError, PopulationError};
use crate::phenology::PhenologyAction;

impl Population {
    /// Position of the first cohort of `status`.
    pub(crate) fn find_cohort(&self, status: Status) -> Option<usize> {
        self.cohorts.iter().position(|cohort| cohort.status == status)
    }

    /// Insert an empty cohort of `status` and return its position.
    pub(crate) fn make_new_cohort(&mut self, status: Status) -> usize {
        let index = self
            .cohorts
            .iter()
            .position(|cohort| cohort.status >= status)
            .unwrap_or(self.cohorts.len());
        let mut cohort = Cohort::new(status, self.layer_count());
        match status {
            Status::Seedling => cohort.establish_index = 1.0,
            Status::Established | Status::Senescing => cohort.root_depth = self.site.max_root_depth,
            _ => {}
        }
        self.cohorts.insert(index, cohort);
        tracing::info!(%status, index, cohorts = self.cohorts.len(), "cohort created");
        index
    }

    /// Position of the first cohort of `status`, creating one if needed.
    pub(crate) fn find_or_make(&mut self, status: Status) -> usize {
        match self.find_cohort(status) {
            Some(index) => index,
            None => self.make_new_cohort(status),
        }
    }

    /// Merge the cohort at `source` into the one at `target` and remove it.
    ///
    /// # Errors
    ///
    /// Returns [`CohortError::MissingCohort`] for a position past the end
    /// and [`CohortError::InconsistentMerge`] when the statuses differ. The
    /// cohort list is unchanged on error.
    pub(crate) fn merge_cohorts(&mut self, target: usize, source: usize) -> Result<(), PopulationError> {
        if target == source {
            return Ok(());
        }
        let ops = self.site.ops;
        let donor = self
            .cohorts
            .get(source)
            .cloned()
            .ok_or(CohortError::MissingCohort { index: source })?;
        let cohort = self
            .cohorts
            .get_mut(target)
            .ok_or(CohortError::MissingCohort { index: target })?;
        cohort.merge(ops, &donor)?;
        self.cohorts.remove(source);
        tracing::info!(status = %donor.status, target, source, "cohorts merged");
        Ok(())
    }

    /// Merge every established or senescing cohort into the first of its
    /// status.
    pub(crate) fn merge_duplicates(&mut self) -> Result<(), PopulationError> {
        for &status in StatusGroup::EstSenc.members() {
            let positions: Vec<usize> = self
                .cohorts
                .iter()
                .enumerate()
                .filter(|(_, cohort)| cohort.status == status)
                .map(|(index, _)| index)
                .collect();
            if let Some((&first, rest)) = positions.split_first() {
                for &index in rest.iter().rev() {
                    self.merge_cohorts(first, index)?;
                }
            }
        }
        Ok(())
    }

    /// Remove green cohorts of `group` that have lost their herbage.
    ///
    /// A cohort that still holds roots is kept with its herbage zeroed (a
    /// summer-dormant perennial). Remnants go to the residue sinks. Dry
    /// cohorts are never removed.
    pub(crate) fn clear_empty_cohorts(&mut self, group: StatusGroup) {
        let ops = self.site.ops;
        let layers = self.layer_count();
        for index in (0..self.cohorts.len()).rev() {
            let Some(cohort) = self.cohorts.get_mut(index) else {
                continue;
            };
            let status = cohort.status;
            if !status.is_green() || !group.contains(status) || cohort.herbage_total().dm >= 0.1 * VERY_SMALL {
                continue;
            }
            for (part, classes) in cohort.herbage.iter_mut() {
                for pool in classes.values_mut() {
                    let remnant = std::mem::replace(pool, DmPool::ZERO);
                    ops.add_allowing_loss(&mut self.flows.shoot_residue[part], &remnant);
                }
            }
            if cohort.roots_total().dm < VERY_SMALL {
                let remnant: Vec<DmPool> = (0..layers).map(|layer| cohort.root_layer_total(layer)).collect();
                self.flows.add_root_residue(ops, &remnant);
                self.cohorts.remove(index);
                tracing::info!(%status, index, "empty cohort deleted");
            }
        }
    }

    /// Move every root of the cohort at `source` to the one at `target`.
    pub(crate) fn transfer_roots(&mut self, source: usize, target: usize) {
        if source == target {
            return;
        }
        let ops = self.site.ops;
        let Some(donor) = self.cohorts.get(source).cloned() else {
            return;
        };
        if let Some(cohort) = self.cohorts.get_mut(target) {
            cohort.add_roots(ops, &donor);
            if let Some(donor) = self.cohorts.get_mut(source) {
                donor.clear_roots();
            }
        }
    }

    /// Seedlings that met the establishment criterion become established.
    pub(crate) fn establish_seedlings(&mut self) -> Result<(), PopulationError> {
        let params = &self.site.params;
        let mut changed = false;
        for cohort in self.cohorts.iter_mut().filter(|cohort| cohort.establishes_today(params)) {
            cohort.status = Status::Established;
            cohort.establish_index = 0.0;
            cohort.seedling_stress = 0.0;
            changed = true;
            tracing::info!(herbage = cohort.herbage_total().dm, "seedlings established");
        }
        if changed {
            self.cohorts.sort_by_key(|cohort| cohort.status);
            self.merge_duplicates()?;
        }
        Ok(())
    }

    /// Carry out the cohort-level work of phenology changes.
    pub(crate) fn apply_phenology_actions(&mut self, actions: &[PhenologyAction]) -> Result<(), PopulationError> {
        for action in actions {
            match *action {
                PhenologyAction::Senesce => self.senesce_established()?,
                PhenologyAction::StartCycle { de_harden } => self.start_cycle(de_harden),
                PhenologyAction::StartSeedDormancy => self.seeds.start_innate_dormancy(),
            }
        }
        Ok(())
    }

    fn senesce_established(&mut self) -> Result<(), PopulationError> {
        if self.site.params.death[3] <= 0.0 {
            return Ok(());
        }
        let mut changed = false;
        for cohort in self.cohorts.iter_mut().filter(|cohort| cohort.status == Status::Established) {
            cohort.status = Status::Senescing;
            changed = true;
        }
        if changed {
            self.cohorts.sort_by_key(|cohort| cohort.status);
            self.merge_duplicates()?;
            tracing::info!("established plants began senescing");
        }
        Ok(())
    }

    /// A perennial's senescing roots pass to an established cohort at the
    /// start of each cycle.
    fn start_cycle(&mut self, de_harden: bool) {
        if !self.site.params.annual {
            let target = match self.find_cohort(Status::Established) {
                Some(index) => index,
                None => {
                    let index = self.make_new_cohort(Status::Established);
                    if let Some(cohort) = self.cohorts.get_mut(index) {
                        cohort.root_depth = 0.0;
                    }
                    index
                }
            };
            let sources: Vec<usize> = self
                .cohorts
                .iter()
                .enumerate()
                .filter(|(_, cohort)| cohort.status == Status::Senescing)
                .map(|(index, _)| index)
                .collect();
            for source in sources {
                self.transfer_roots(source, target);
            }
            self.clear_empty_cohorts(StatusGroup::EstSenc);
        }
        if de_harden {
            for cohort in &mut self.cohorts {
                cohort.frost_factor = 0.0;
            }
        }
    }

    /// Turn `seed` (germinated or sown) into young plants.
    ///
    /// Seedlings join the youngest seedling cohort unless its roots are
    /// already more than [`COHORT_ROOT_DIFF`] mm deep. Species without a
    /// seed bank add straight to the established plants. A flush of
    /// seedlings large against the existing sward restarts the cycle.
    pub(crate) fn add_seedlings(&mut self, seed: &DmPool) -> Result<(), PopulationError> {
        if seed.dm <= 0.0 {
            return Ok(());
        }
        let status = if self.site.params.has_seeds {
            Status::Seedling
        } else {
            Status::Established
        };
        let old_green = self.herbage(StatusGroup::Green).dm;
        let old_seedlings: f64 = self
            .cohorts
            .iter()
            .filter(|cohort| cohort.status == Status::Seedling)
            .map(|cohort| cohort.herbage_total().dm)
            .sum();

        let existing = self.find_cohort(status).filter(|&index| {
            status != Status::Seedling
                || self
                    .cohorts
                    .get(index)
                    .is_some_and(|cohort| cohort.root_depth <= COHORT_ROOT_DIFF)
        });
        let (index, is_new) = match existing {
            Some(index) => (index, false),
            None => (self.make_new_cohort(status), true),
        };

        let view = DayView::new(&self.site, &self.phenology, &self.extinction);
        let ctx = view.cohort(status);
        let cohort = self
            .cohorts
            .get_mut(index)
            .ok_or(CohortError::MissingCohort { index })?;
        if is_new {
            cohort.root_depth = 0.0;
            cohort.compute_root_extension(&ctx);
            cohort.root_depth = layer_value(&cohort.rates.root_extension, 0).max(1.0);
        }

        let alloc = &ctx.params.alloc;
        let root_fract = alloc[1] / (1.0 + alloc[1]);
        let leaf_fract = alloc[4] * (1.0 - root_fract);
        let part_fract = ShootTable::from_fn(|part| match part {
            ShootPart::Leaf => leaf_fract,
            ShootPart::Stem => 1.0 - root_fract - leaf_fract,
        });
        let new_dm = seed.dm * (1.0 - root_fract);

        let weight = cohort.herbage_total().dm;
        cohort.frost_factor = weight_average(cohort.frost_factor, weight, 0.0, new_dm);
        if status == Status::Seedling {
            cohort.seedling_stress = weight_average(cohort.seedling_stress, weight, 0.0, new_dm);
            cohort.establish_index = weight_average(cohort.establish_index, weight, 1.0, new_dm);
        }

        let ops = ctx.ops;
        for part in ShootPart::ALL {
            let area = Cohort::new_specific_area(&ctx, part);
            for class in DmdClass::ALL {
                let share = part_fract[part] * cohort.new_shoot_fraction(ctx.params, part, class);
                if share > 0.0 {
                    let pool = ops.fraction(seed, share);
                    cohort.add_herbage(ops, part, class, &pool, area);
                }
            }
        }
        let roots = ops.fraction(seed, root_fract);
        if let Some(surface) = cohort.roots[RootAge::Effective].first_mut() {
            ops.add(surface, &roots);
        }
        tracing::info!(%status, dm = seed.dm, "seedlings added");

        let params = &self.site.params;
        let phenology = &mut self.phenology;
        let restart = match phenology.stage {
            DevelopStage::Vernalizing => {
                phenology.vern_index = weight_average(phenology.vern_index, old_green, 0.0, new_dm);
                false
            }
            DevelopStage::Vegetative if !params.vern_reqd => {
                phenology.deg_days = weight_average(phenology.deg_days, old_green, 0.0, new_dm);
                false
            }
            stage => {
                stage.is_dormant()
                    || stage == DevelopStage::Senescent
                    || new_dm > old_green
                    || (params.vern_reqd && old_seedlings + new_dm > old_green - old_seedlings)
            }
        };
        if restart {
            let action = phenology.start_new_cycle(params, true, true);
            self.apply_phenology_actions(&[action])?;
        }
        Ok(())
    }
}
