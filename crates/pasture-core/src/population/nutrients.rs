//! Population-level nutrient rates for one element.
//!
//! Green statuses are served in order (seedlings, established, senescing).
//! Within a status each cohort first meets its demand from translocation,
//! recycling and fixation, then takes up soil nutrient in proportion to its
//! share of the population's maximum demand, then relocates from older
//! tissue. Dry cohorts only lose nutrient, litter by leaching.

use pasture_ledger::math::div0;
use pasture_types::{Element, Status};

use super::DayView;
use crate::cohort::Cohort;

/// Compute the supply side of today's nutrient budget for `element`.
pub(crate) fn compute_nutrient_rates(view: &DayView<'_>, cohorts: &mut [Cohort], element: Element) {
    for cohort in cohorts.iter_mut().filter(|cohort| cohort.status.is_green()) {
        let ctx = view.cohort(cohort.status);
        cohort.compute_nutrient_demand(&ctx, element);
    }
    let total_demand: f64 = cohorts
        .iter()
        .filter(|cohort| cohort.status.is_green())
        .map(|cohort| cohort.nutrient_info()[element].demand.max_total())
        .sum();

    for status in Status::GREEN {
        let ctx = view.cohort(status);
        for cohort in cohorts.iter_mut().filter(|cohort| cohort.status == status) {
            cohort.reset_nutrient_supply(element);
            cohort.translocate_nutrients(element);
            if element == Element::N {
                cohort.recycle_nutrients(&ctx, element);
                if ctx.params.legume {
                    cohort.fix_nitrogen(&ctx);
                }
            }
        }
        for cohort in cohorts.iter_mut().filter(|cohort| cohort.status == status) {
            let share = div0(cohort.nutrient_info()[element].demand.max_total(), total_demand);
            cohort.uptake_nutrients(&ctx, element, share);
        }
        for cohort in cohorts.iter_mut().filter(|cohort| cohort.status == status) {
            cohort.relocate_nutrients(&ctx, element);
        }
    }

    for cohort in cohorts.iter_mut().filter(|cohort| !cohort.status.is_green()) {
        let ctx = view.cohort(cohort.status);
        cohort.reset_nutrient_supply(element);
        cohort.leach_nutrients(&ctx, element);
    }
    tracing::debug!(%element, total_demand, "nutrient rates computed");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::cohort::tests::close;
    use crate::environment::SoilNutrients;
    use crate::population::Population;
    use crate::population::tests::sward_population;
    use pasture_types::{DmdClass, ElementSet, Nutrient, Part, ShootPart, StatusGroup};

    fn fed_population(available: f64) -> Population {
        let mut population = sward_population(ElementSet::N);
        let layers = population.layer_count();
        let mut inputs = population.inputs().clone();
        let mut nutrients = SoilNutrients::empty(layers);
        nutrients.supply[Nutrient::No3] = vec![vec![available; layers]];
        inputs.nutrients = nutrients;
        population.begin_day(inputs);
        population
    }

    /// Cohorts of `population` growing `leaf_growth` g/m^2 of leaf per
    /// status, with no other source of nutrient today.
    fn growing_cohorts(
        population: &Population,
        view: &DayView<'_>,
        leaf_growth: &[(Status, f64)],
    ) -> Vec<Cohort> {
        let mut cohorts = population.cohorts().to_vec();
        for &(status, growth) in leaf_growth {
            let cohort = cohorts.iter_mut().find(|c| c.status == status).unwrap();
            cohort.compute_root_extension(&view.cohort(status));
            cohort.rates.pot_part_growth[Part::Leaf] = growth;
        }
        cohorts
    }

    fn uptake_of(cohorts: &[Cohort], status: Status) -> (f64, f64) {
        let info = &cohorts.iter().find(|c| c.status == status).unwrap().nutrient_info()[Element::N];
        (info.uptake_sum, info.demand.max_total())
    }

    #[test]
    fn single_cohort_takes_the_whole_available_supply_up_to_demand() {
        // Roots reach 300 mm: two layers of 1 mg each.
        let population = fed_population(1.0e-3);
        let view = population.day_view();
        let mut cohorts = growing_cohorts(&population, &view, &[(Status::Established, 10.0)]);
        compute_nutrient_rates(&view, &mut cohorts, Element::N);
        let (uptake, demand) = uptake_of(&cohorts, Status::Established);
        assert!(demand > 0.5 - 1e-9);
        assert!(close(uptake, 2.0e-3));

        let population = fed_population(10.0);
        let view = population.day_view();
        let mut cohorts = growing_cohorts(&population, &view, &[(Status::Established, 10.0)]);
        compute_nutrient_rates(&view, &mut cohorts, Element::N);
        let (uptake, demand) = uptake_of(&cohorts, Status::Established);
        assert!(close(uptake, demand));
    }

    #[test]
    fn scarce_supply_is_shared_by_maximum_demand() {
        let mut population = fed_population(1.0e-3);
        let class = DmdClass::new(3).unwrap();
        population.set_herbage(Status::Seedling, ShootPart::Leaf, class, 20.0);
        population.set_roots(Status::Seedling, 10.0, 300.0);
        let view = population.day_view();
        let mut cohorts = growing_cohorts(
            &population,
            &view,
            &[(Status::Seedling, 2.0), (Status::Established, 10.0)],
        );
        compute_nutrient_rates(&view, &mut cohorts, Element::N);

        let (seedling_uptake, seedling_demand) = uptake_of(&cohorts, Status::Seedling);
        let (established_uptake, established_demand) = uptake_of(&cohorts, Status::Established);
        let total_demand = seedling_demand + established_demand;
        assert!(seedling_demand > 0.0);
        assert!(close(seedling_uptake + established_uptake, 2.0e-3));
        assert!(close(seedling_uptake, 2.0e-3 * seedling_demand / total_demand));
        assert!(close(established_uptake, 2.0e-3 * established_demand / total_demand));
    }

    #[test]
    fn uptake_never_exceeds_what_the_soil_holds() {
        let mut population = fed_population(0.01);
        population.compute_rates().unwrap();
        let uptake: f64 = population
            .nutrient_uptake(Nutrient::No3)
            .iter()
            .flatten()
            .sum();
        // One sub-area, three layers.
        assert!(uptake <= 0.03 + 1e-12);
        assert!(population.herbage(StatusGroup::Green).nu[Element::N] > 0.0);
    }

    #[test]
    fn litter_is_leached_by_rain() {
        let mut population = sward_population(ElementSet::N);
        let class = DmdClass::new(10).unwrap();
        population.set_herbage(Status::Litter1, ShootPart::Leaf, class, 50.0);
        let mut inputs = population.inputs().clone();
        inputs.precipitation = 20.0;
        population.begin_day(inputs);
        let view = population.day_view();
        let mut cohorts = population.cohorts().to_vec();
        let litter = cohorts.iter_mut().find(|c| c.status == Status::Litter1).unwrap();
        let pool = &mut litter.herbage[ShootPart::Leaf][class];
        let excess = pool.nu[Element::N];
        pool.nu[Element::N] += excess;
        compute_nutrient_rates(&view, &mut cohorts, Element::N);
        let litter = cohorts.iter().find(|c| c.status == Status::Litter1).unwrap();
        let leached = litter.nutrient_info()[Element::N].leached[ShootPart::Leaf][class];
        let propn = 1.0 - (-0.05_f64 * 20.0).exp();
        assert!((leached - propn * excess).abs() < 1e-9);
        let green = cohorts.iter().find(|c| c.status == Status::Established).unwrap();
        let green_leached = &green.nutrient_info()[Element::N].leached;
        assert!(
            green_leached
                .values()
                .flat_map(|classes| classes.values())
                .all(|&amount| close(amount, 0.0))
        );
    }
}
