//! The two daily phases of the population.
//!
//! # Rates
//!
//! 1. Temperature memory of the phenology
//! 2. Root extension and the specific area of new tissue
//! 3. Respiration and allocation
//! 4. Light interception, water uptake and potential assimilation
//! 5. Potential translocation and potential net growth
//! 6. Standing-dead moisture, loss and decline rates, frost hardening
//! 7. Nutrient supply, element by element
//! 8. Actual net growth, with nutrient rates rescaled to it
//! 9. Phenology, and the status changes it requires
//! 10. Seed-bank rates, fixing the stem reserve when flowering starts
//!
//! # State
//!
//! 1. Removal proportions and the defoliation setback
//! 2. Extinction coefficients follow growth and removal
//! 3. Cohort mass balances, from old litter back to seedlings, so herbage
//!    passed down a status lands in a cohort that has already moved
//! 4. Seed bank, then germinated seed becomes seedlings
//! 5. Excess nutrient losses and senesced root nutrient
//! 6. Establishment, clearing of empty cohorts and merging
//! 7. Mass audit and the daily summary

use pasture_ledger::ConservationResult;
use pasture_types::{
    ClassTable, Element, GrowthLimit, Part, ShootPart, ShootTable, Status, StatusGroup, StatusTable,
};

use super::canopy::compute_pot_assimilation;
use super::nutrients::compute_nutrient_rates;
use super::removal::RemovalProportions;
use super::{DailySummary, DayView, Population};
use crate::cohort::CohortOutcome;
use crate::environment::RemovalRequest;
use crate::error::PopulationError;
use crate::phenology::PhenologyDrivers;

impl Population {
    /// Compute today's rates from the stored drivers.
    ///
    /// # Errors
    ///
    /// Returns [`PopulationError`] if a status change required a cohort
    /// merge that failed.
    pub fn compute_rates(&mut self) -> Result<(), PopulationError> {
        self.phenology
            .update_temperature_memory(&self.site.params, &self.site.inputs);

        let litter_mass = self.herbage(StatusGroup::Litter).dm;
        let pasture_area = self.area_index(StatusGroup::All);
        {
            let view = DayView::new(&self.site, &self.phenology, &self.extinction);
            let inputs = &self.site.inputs;

            for cohort in self.cohorts.iter_mut().filter(|c| c.status.is_green()) {
                let ctx = view.cohort(cohort.status);
                cohort.compute_root_extension(&ctx);
                cohort.compute_new_specific_area(&ctx);
            }
            for cohort in self.cohorts.iter_mut().filter(|c| c.status.is_green()) {
                let ctx = view.cohort(cohort.status);
                cohort.compute_respiration(&ctx);
                cohort.compute_allocation(&ctx);
            }

            self.canopy.set_monoculture_light(&self.cohorts, &self.extinction);
            self.canopy
                .compute_water_uptake(&self.cohorts, &self.site.params, inputs);
            compute_pot_assimilation(&view, &mut self.canopy, &mut self.cohorts);

            for cohort in self.cohorts.iter_mut().filter(|c| c.status.is_green()) {
                let ctx = view.cohort(cohort.status);
                cohort.compute_pot_translocation(&ctx);
                cohort.compute_pot_net_growth();
            }

            let moisture_change = inputs.interception.mul_add(inputs.precipitation, -inputs.surface_evap);
            for cohort in &mut self.cohorts {
                let ctx = view.cohort(cohort.status);
                cohort.dead_moisture_balance(&ctx, moisture_change, pasture_area);
                cohort.compute_flow_rates(&ctx, litter_mass);
                cohort.compute_frost_hardening(&ctx);
            }

            let elements = self.site.ops.elements();
            for &element in elements.elements() {
                compute_nutrient_rates(&view, &mut self.cohorts, element);
            }

            for cohort in self.cohorts.iter_mut().filter(|c| c.status.is_green()) {
                let ctx = view.cohort(cohort.status);
                cohort.compute_net_growth(&ctx);
                for &element in elements.elements() {
                    cohort.rescale_nutrient_rates(&ctx, element);
                }
                tracing::debug!(
                    status = %cohort.status,
                    assimilation = cohort.assimilation(),
                    leaf = cohort.net_growth()[Part::Leaf],
                    stem = cohort.net_growth()[Part::Stem],
                    root = cohort.net_growth()[Part::Root],
                    "cohort rates"
                );
            }
        }
        self.record_rate_flows();

        let drivers = PhenologyDrivers {
            water_limit: self.canopy.growth_limits(Status::Established)[GrowthLimit::SoilMoisture],
            root_asw: self.root_weighted_asw(Status::Senescing),
            green_herbage: self.herbage(StatusGroup::Green).dm,
            green_roots: self.roots(StatusGroup::Green).dm,
        };
        let before = self.phenology.stage;
        let actions = self
            .phenology
            .advance(&self.site.params, &self.site.inputs, &drivers);
        if self.phenology.stage != before {
            tracing::info!(from = %before, to = %self.phenology.stage, day = self.day, "phenological stage changed");
        }
        self.apply_phenology_actions(&actions)?;

        if self.site.params.has_seeds {
            if self.phenology.flowering_length >= 0.0 && self.phenology.flowering_time <= 0.0 {
                let params = &self.site.params;
                for cohort in self.cohorts.iter_mut().filter(|c| c.status.is_green()) {
                    cohort.set_stem_reserve(params);
                }
            }
            self.seed_rates = self
                .seeds
                .compute_rates(&self.site.params, &self.site.inputs);
        }
        Ok(())
    }

    /// Copy today's assimilation, uptake and fixation into the day's flows.
    fn record_rate_flows(&mut self) {
        let green = || self.cohorts.iter().filter(|c| c.status.is_green());
        self.flows.assimilation = green().map(|c| c.assimilation()).sum();
        for &element in self.site.ops.elements().elements() {
            self.flows.uptake[element] = green().map(|c| c.nutrient_info()[element].uptake_sum).sum();
        }
        if self.site.ops.elements().contains(Element::N) {
            self.flows.fixed = green().map(|c| c.nutrient_info()[Element::N].fixed).sum();
        }
    }

    /// Apply today's rates, execute `removal`, and close the day's mass
    /// audit.
    ///
    /// # Errors
    ///
    /// Returns [`PopulationError`] if a pool was driven below the
    /// mass-balance floor or a cohort merge failed. An imbalance in the
    /// audit is not an error; it is logged and reported in the summary.
    pub fn update_state(&mut self, removal: &RemovalRequest) -> Result<DailySummary, PopulationError> {
        let ops = self.site.ops;

        // 1. Removal and setback
        let propns = self.removal_proportions(&removal.herbage);
        let removed = removed_by_status(self, &propns);
        let green_removed: f64 = Status::GREEN.iter().map(|&status| removed[status]).sum();
        if green_removed > 0.0 {
            // Rates only so far; nothing has been taken yet.
            let shoot_dm = self.herbage(StatusGroup::Green).dm;
            if let Some(action) = self.phenology.setback(
                &self.site.params,
                green_removed,
                shoot_dm,
                self.site.inputs.mean_temp,
            ) {
                tracing::info!(removed = green_removed, "defoliation restarted the cycle");
                self.apply_phenology_actions(&[action])?;
            }
        }

        // 2. Extinction coefficients
        self.update_extinction(&removed);

        // 3. Cohort mass balances
        for index in (0..self.cohorts.len()).rev() {
            let outcome = {
                let view = DayView::new(&self.site, &self.phenology, &self.extinction);
                let Some(cohort) = self.cohorts.get_mut(index) else {
                    continue;
                };
                let ctx = view.cohort(cohort.status);
                let outcome = cohort.update_state(&ctx, &propns[cohort.status])?;
                tracing::debug!(
                    status = %cohort.status,
                    herbage = cohort.herbage_total().dm,
                    roots = cohort.roots_total().dm,
                    grazed = outcome.grazed_total().dm,
                    overflow = outcome.overflow_total().dm,
                    "cohort updated"
                );
                outcome
            };
            self.absorb_outcome(&outcome);
        }

        // 4. Seed bank
        let new_seed = self.flows.new_seed;
        if self.site.params.has_seeds {
            let outcome = self.seeds.update(ops, &self.seed_rates, &removal.seed, &new_seed)?;
            ops.add(&mut self.flows.seed_eaten, &outcome.eaten);
            for residue in &outcome.residue {
                ops.add_allowing_loss(&mut self.flows.seed_residue, residue);
            }
            ops.add(&mut self.flows.germinated, &outcome.germinated);
            if outcome.germinated.dm > 0.0 {
                tracing::info!(dm = outcome.germinated.dm, "seed germinated");
                self.add_seedlings(&outcome.germinated)?;
            }
        } else {
            ops.add_allowing_loss(&mut self.flows.seed_residue, &new_seed);
        }

        // 5. Nutrient losses
        self.lose_excess_nutrients();
        self.transfer_senesced_nutrients();

        // 6. Status changes and tidying
        self.establish_seedlings()?;
        self.clear_empty_cohorts(StatusGroup::Green);
        self.merge_duplicates()?;

        // 7. Audit
        Ok(self.close_day())
    }

    /// Move the extinction coefficient of each green status towards its
    /// minimum as the sward grows, and towards its maximum as it is
    /// defoliated.
    fn update_extinction(&mut self, removed: &StatusTable<f64>) {
        let light = &self.site.params.light;
        let (k_min, k_max) = (light[7].min(light[8]), light[7].max(light[8]));
        for status in Status::GREEN {
            let cohorts = || self.cohorts.iter().filter(move |c| c.status == status);
            let shoot_dm: f64 = cohorts().map(|c| c.herbage_total().dm).sum();
            let k = self.extinction[status];
            let change = if shoot_dm > 0.0 {
                let growth: f64 = cohorts()
                    .map(|c| {
                        ShootPart::ALL
                            .iter()
                            .map(|part| c.net_growth()[part.part()])
                            .sum::<f64>()
                    })
                    .sum();
                let rgr = growth / shoot_dm;
                let removal = removed[status] / shoot_dm;
                removal
                    .mul_add(k_max - k, -(rgr * (k - k_min)))
                    .clamp(k_min - k, k_max - k)
            } else {
                k_min - k
            };
            self.extinction[status] = (k + change).clamp(k_min, k_max);
        }
    }

    /// Pass a cohort's outflows on: overflow to the next status, the rest
    /// to the day's flows.
    fn absorb_outcome(&mut self, outcome: &CohortOutcome) {
        let ops = self.site.ops;
        if let Some(destination) = outcome.overflow_to {
            if outcome.overflow_total().dm > 0.0 {
                let index = self.find_or_make(destination);
                if let Some(target) = self.cohorts.get_mut(index) {
                    target.receive_overflow(ops, outcome);
                }
            }
        }
        let flows = &mut self.flows;
        ops.add(&mut flows.grazed, &outcome.grazed_total());
        for (part, pool) in outcome.shoot_residue.iter() {
            ops.add_allowing_loss(&mut flows.shoot_residue[part], pool);
        }
        flows.add_root_residue(ops, &outcome.root_residue);
        flows.respired += outcome.respired;
        ops.add_allowing_loss(&mut flows.leachate, &outcome.leachate);
        ops.add_allowing_loss(&mut flows.growth, &outcome.inflow);
        ops.add(&mut flows.new_seed, &outcome.new_seeds);
    }

    fn lose_excess_nutrients(&mut self) {
        let ops = self.site.ops;
        let view = DayView::new(&self.site, &self.phenology, &self.extinction);
        for cohort in &mut self.cohorts {
            let ctx = view.cohort(cohort.status);
            let loss = cohort.lose_excess_nutrients(&ctx);
            ops.add_allowing_loss(&mut self.flows.gaseous_loss, &loss.gaseous);
            ops.add_allowing_loss(&mut self.flows.excess_leached, &loss.leached);
        }
    }

    fn transfer_senesced_nutrients(&mut self) {
        let (Some(target), Some(source)) = (
            self.find_cohort(Status::Established),
            self.find_cohort(Status::Senescing),
        ) else {
            return;
        };
        if target >= source {
            return;
        }
        let view = DayView::new(&self.site, &self.phenology, &self.extinction);
        let ctx = view.cohort(Status::Senescing);
        let (head, tail) = self.cohorts.split_at_mut(source);
        if let (Some(established), Some(senescing)) = (head.get_mut(target), tail.first_mut()) {
            senescing.transfer_senesced_nutrients(&ctx, established);
        }
    }

    /// Post the day's flows, verify conservation and build the summary.
    fn close_day(&mut self) -> DailySummary {
        self.flows.post_to(&mut self.audit);
        let closing = self.stock();
        let conservation = self.audit.verify(self.day, &closing);
        if let ConservationResult::Anomaly(anomaly) = &conservation {
            tracing::warn!(day = self.day, imbalances = ?anomaly.imbalances, "{}", anomaly.message);
        }
        let green = self.herbage(StatusGroup::Green);
        let summary = DailySummary {
            day: self.day,
            stage: self.phenology.stage,
            events: self.phenology.fired_events(),
            cohort_count: self.cohorts.len(),
            green: green.dm,
            dry: self.herbage(StatusGroup::Dry).dm,
            roots: self.roots(StatusGroup::All).dm,
            seed: self.seeds.total_mass(),
            green_n_conc: if self.site.ops.elements().contains(Element::N) {
                green.concentration(Element::N)
            } else {
                0.0
            },
            flows: self.flows.clone(),
            conservation,
        };
        tracing::debug!(
            day = summary.day,
            green = summary.green,
            dry = summary.dry,
            growth = summary.net_growth(),
            balanced = summary.is_balanced(),
            "day closed"
        );
        summary
    }
}

/// Herbage each status loses to today's removal (g/m^2).
fn removed_by_status(population: &Population, propns: &RemovalProportions) -> StatusTable<f64> {
    let mut removed = StatusTable::filled(0.0);
    for cohort in &population.cohorts {
        let by_part: &ShootTable<ClassTable<f64>> = &propns[cohort.status];
        removed[cohort.status] += by_part
            .iter()
            .flat_map(|(part, classes)| {
                classes
                    .iter()
                    .map(move |(class, propn)| propn * cohort.herbage[part][class].dm)
            })
            .sum::<f64>();
    }
    removed
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::cohort::tests::{close, params, soil};
    use crate::population::tests::sward_population;
    use pasture_types::{DevelopStage, DmdClass, ElementSet, Hardness, Ripeness};

    fn run_day(population: &mut Population, removal: &RemovalRequest) -> DailySummary {
        let inputs = population.inputs().clone();
        population.step(inputs, removal).unwrap()
    }

    #[test]
    fn a_quiet_day_balances() {
        let mut population = sward_population(ElementSet::N);
        let summary = run_day(&mut population, &RemovalRequest::default());
        assert!(summary.is_balanced(), "{:?}", summary.conservation);
        assert_eq!(summary.day, 1);
        assert!(summary.flows.assimilation >= 0.0);
        assert!(summary.green > 0.0);
    }

    #[test]
    fn grazing_takes_what_was_asked_for() {
        let mut population = sward_population(ElementSet::N);
        let class = DmdClass::new(3).unwrap();
        let mut removal = RemovalRequest::default();
        removal.herbage[class] = 10.0;
        let summary = run_day(&mut population, &removal);
        assert!((summary.flows.grazed.dm - 10.0).abs() < 1e-6);
        assert!(summary.is_balanced(), "{:?}", summary.conservation);
    }

    #[test]
    fn removal_raises_the_extinction_coefficient() {
        let mut population = sward_population(ElementSet::None);
        let start = population.extinction(Status::Established);
        let class = DmdClass::new(3).unwrap();
        let mut removal = RemovalRequest::default();
        removal.herbage[class] = 30.0;
        run_day(&mut population, &removal);
        let light = population.params().light;
        let k = population.extinction(Status::Established);
        assert!(k >= light[7] - 1e-12 && k <= light[8] + 1e-12);
        if light[8] > light[7] {
            assert!(k >= start);
        }
    }

    #[test]
    fn setback_scores_removal_against_the_standing_sward() {
        let mut grazed = sward_population(ElementSet::None);
        let mut ungrazed = sward_population(ElementSet::None);
        let class = DmdClass::new(3).unwrap();
        let mut removal = RemovalRequest::default();
        // Everything above the stubble, scored as 60 / 160: short of the
        // sensitive horizon.
        removal.herbage[class] = 60.0;
        let summary = run_day(&mut grazed, &removal);
        run_day(&mut ungrazed, &RemovalRequest::default());

        assert!((summary.flows.grazed.dm - 60.0).abs() < 1e-6);
        assert!(ungrazed.phenology().deg_days > 0.0);
        assert!(close(grazed.phenology().deg_days, ungrazed.phenology().deg_days));
        assert_eq!(grazed.phenology().stage, DevelopStage::Vegetative);
    }

    #[test]
    fn dead_herbage_falls_into_litter() {
        let mut population = sward_population(ElementSet::None);
        let class = DmdClass::new(8).unwrap();
        population.set_herbage(Status::Dead, ShootPart::Leaf, class, 80.0);
        assert!(close(population.herbage(StatusGroup::Litter).dm, 0.0));

        let inputs = population.inputs().clone();
        population.begin_day(inputs);
        population.compute_rates().unwrap();
        let dead = population.find_cohort(Status::Dead).unwrap();
        let fall_rate = population.cohorts()[dead].rates.shoot_loss[ShootPart::Leaf][class];
        assert!(fall_rate > 0.0);
        let summary = population.update_state(&RemovalRequest::default()).unwrap();

        // Standing dead also respires and gains from today's green death.
        let litter = population.herbage(StatusGroup::Litter).dm;
        let fall = fall_rate * 80.0;
        assert!(litter > 0.9 * fall, "litter {litter} fall {fall}");
        assert!(litter < 1.25 * fall, "litter {litter} fall {fall}");
        assert!(summary.is_balanced(), "{:?}", summary.conservation);
    }

    #[test]
    fn empty_population_stays_empty_and_balanced() {
        let mut population = Population::new(params(), soil(), ElementSet::N);
        let summary = run_day(&mut population, &RemovalRequest::default());
        assert!(summary.is_balanced());
        assert!(close(summary.green, 0.0));
        assert!(close(population.stock().dm, 0.0));
    }

    #[test]
    fn germinating_seed_becomes_seedlings() {
        let mut population = Population::new(params(), soil(), ElementSet::None);
        population.set_seed(Hardness::Soft, Ripeness::Ripe, 0, 40.0);
        let mut inputs = population.inputs().clone();
        inputs.rel_asw = vec![1.0; population.layer_count()];
        inputs.mean_temp = 15.0;
        let (mut germinated, mut seed_lost) = (0.0, 0.0);
        for _ in 0..30 {
            let summary = population.step(inputs.clone(), &RemovalRequest::default()).unwrap();
            assert!(summary.is_balanced(), "{:?}", summary.conservation);
            if germinated <= 0.0 && summary.flows.germinated.dm > 0.0 {
                assert!(population.find_cohort(Status::Seedling).is_some());
            }
            germinated += summary.flows.germinated.dm;
            seed_lost += summary.flows.seed_residue.dm;
        }
        assert!(germinated > 0.5 * 40.0);
        assert!((population.seed_mass() + germinated + seed_lost - 40.0).abs() < 1e-6);
    }
}
