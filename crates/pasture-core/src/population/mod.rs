//! The pasture population: an ordered list of cohorts sharing one phenology
//! and one seed bank.
//!
//! A host drives the population one day at a time:
//!
//! 1. [`Population::begin_day`] -- store the day's drivers, open the mass
//!    audit
//! 2. management, if any is scheduled ([`Population::sow`],
//!    [`Population::spray_top`], [`Population::kill`])
//! 3. [`Population::compute_rates`]
//! 4. [`Population::update_state`], which returns the [`DailySummary`]
//!
//! [`Population::step`] runs the three daily calls in order.
//!
//! Cohorts are kept sorted by status. There is at most one cohort of each
//! status between days; the dry statuses always have one.

mod canopy;
mod daily;
mod lifecycle;
mod management;
mod nutrients;
mod removal;
mod summary;

pub use canopy::CanopyState;
pub use removal::DIET_CLASS_COUNT;
pub use summary::{DailySummary, DayFlows};

use pasture_ledger::math::div0;
use pasture_ledger::{MassAudit, PoolOps};
use pasture_types::{
    ClassTable, DevelopStage, DmPool, DmdClass, ElementSet, Hardness, Nutrient, Part, Ripeness,
    ShootPart, Status, StatusGroup, StatusTable,
};

use crate::cohort::{Cohort, CohortContext, sum_pools};
use crate::environment::{DailyInputs, SoilProfile, layer_value};
use crate::error::PopulationError;
use crate::params::SpeciesParams;
use crate::phenology::Phenology;
use crate::seeds::{SeedBank, SeedRates};

// ---------------------------------------------------------------------------
// Site and day view
// ---------------------------------------------------------------------------

/// The fixed description of where the population grows, together with the
/// current day's drivers.
#[derive(Debug, Clone)]
pub(crate) struct Site {
    pub params: SpeciesParams,
    pub soil: SoilProfile,
    pub root_restriction: Vec<f64>,
    pub max_root_depth: f64,
    pub ops: PoolOps,
    pub inputs: DailyInputs,
}

/// Everything a cohort context needs, gathered once per phase so that the
/// cohort list can be borrowed mutably alongside it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DayView<'a> {
    pub site: &'a Site,
    pub stage: DevelopStage,
    pub deg_days: f64,
    pub seed_set_propn: f64,
    pub lagged_temp: f64,
    pub extinction: StatusTable<f64>,
}

impl<'a> DayView<'a> {
    pub(crate) fn new(site: &'a Site, phenology: &Phenology, extinction: &StatusTable<f64>) -> Self {
        Self {
            site,
            stage: phenology.stage,
            deg_days: phenology.deg_days,
            seed_set_propn: phenology.seed_set_propn(&site.params),
            lagged_temp: phenology.lagged_temp_or(site.inputs.mean_day_temp),
            extinction: *extinction,
        }
    }

    /// The context for a cohort of `status`.
    pub(crate) fn cohort(&self, status: Status) -> CohortContext<'a> {
        CohortContext {
            params: &self.site.params,
            ops: self.site.ops,
            soil: &self.site.soil,
            inputs: &self.site.inputs,
            stage: self.stage,
            deg_days: self.deg_days,
            seed_set_propn: self.seed_set_propn,
            max_root_depth: self.site.max_root_depth,
            root_restriction: &self.site.root_restriction,
            lagged_temp: self.lagged_temp,
            extinction: self.extinction[status],
        }
    }
}

// ---------------------------------------------------------------------------
// Population
// ---------------------------------------------------------------------------

/// A single-species pasture population.
#[derive(Debug, Clone)]
pub struct Population {
    site: Site,
    cohorts: Vec<Cohort>,
    phenology: Phenology,
    seeds: SeedBank,
    seed_rates: SeedRates,
    extinction: StatusTable<f64>,
    canopy: CanopyState,
    flows: DayFlows,
    audit: MassAudit,
    day: u64,
}

impl Population {
    /// A population with no plant material, at the start of a growth cycle.
    ///
    /// The standing dead and both litter cohorts always exist; green cohorts
    /// appear when material is added. The maximum rooting depth defaults to
    /// what `k-r-1` of root travel reaches through the profile.
    pub fn new(params: SpeciesParams, soil: SoilProfile, elements: ElementSet) -> Self {
        let layer_count = soil.layer_count();
        let root_restriction = soil.root_restriction(&params.root);
        let max_root_depth = soil.default_max_root_depth(params.root[1], &root_restriction);
        let ops = PoolOps::new(elements);
        let extinction = StatusTable::from_fn(|status| match status {
            Status::Seedling | Status::Established | Status::Senescing => params.light[7],
            Status::Dead => params.light[9],
            Status::Litter1 | Status::Litter2 => params.light[10],
        });
        let mut phenology = Phenology::new(&params);
        phenology.clear_events();

        Self {
            cohorts: [Status::Dead, Status::Litter1, Status::Litter2]
                .into_iter()
                .map(|status| Cohort::new(status, layer_count))
                .collect(),
            phenology,
            seeds: SeedBank::new(layer_count),
            seed_rates: SeedRates::none(layer_count),
            extinction,
            canopy: CanopyState::new(layer_count),
            flows: DayFlows::new(layer_count),
            audit: MassAudit::open(elements, DmPool::ZERO),
            day: 0,
            site: Site {
                inputs: DailyInputs::new(layer_count),
                params,
                soil,
                root_restriction,
                max_root_depth,
                ops,
            },
        }
    }

    /// Override the maximum rooting depth (mm).
    #[must_use]
    pub fn with_max_root_depth(mut self, depth: f64) -> Self {
        self.site.max_root_depth = depth.clamp(0.0, self.site.soil.depth());
        self
    }

    pub(crate) fn day_view(&self) -> DayView<'_> {
        DayView::new(&self.site, &self.phenology, &self.extinction)
    }

    // -----------------------------------------------------------------------
    // Daily entry points
    // -----------------------------------------------------------------------

    /// Start a new day: store its drivers, forget yesterday's events and
    /// flows, and open the mass audit on the current stock.
    pub fn begin_day(&mut self, inputs: DailyInputs) {
        self.day = self.day.saturating_add(1);
        self.site.inputs = inputs;
        self.phenology.clear_events();
        self.flows = DayFlows::new(self.layer_count());
        self.audit = MassAudit::open(self.site.ops.elements(), self.stock());
    }

    /// Run one whole day: [`begin_day`](Self::begin_day),
    /// [`compute_rates`](Self::compute_rates) and
    /// [`update_state`](Self::update_state).
    pub fn step(
        &mut self,
        inputs: DailyInputs,
        removal: &crate::environment::RemovalRequest,
    ) -> Result<DailySummary, PopulationError> {
        self.begin_day(inputs);
        self.compute_rates()?;
        self.update_state(removal)
    }

    // -----------------------------------------------------------------------
    // Read-only views
    // -----------------------------------------------------------------------

    /// Species parameters.
    pub const fn params(&self) -> &SpeciesParams {
        &self.site.params
    }

    /// Soil profile.
    pub const fn soil(&self) -> &SoilProfile {
        &self.site.soil
    }

    /// Number of soil layers.
    pub fn layer_count(&self) -> usize {
        self.site.soil.layer_count()
    }

    /// The nutrient elements tracked.
    pub const fn elements(&self) -> ElementSet {
        self.site.ops.elements()
    }

    /// The drivers of the current day.
    pub const fn inputs(&self) -> &DailyInputs {
        &self.site.inputs
    }

    /// Maximum rooting depth (mm).
    pub const fn max_root_depth(&self) -> f64 {
        self.site.max_root_depth
    }

    /// Days run so far.
    pub const fn day(&self) -> u64 {
        self.day
    }

    /// The cohorts, sorted by status.
    pub fn cohorts(&self) -> &[Cohort] {
        &self.cohorts
    }

    /// Number of cohorts.
    pub fn cohort_count(&self) -> usize {
        self.cohorts.len()
    }

    /// Phenological state.
    pub const fn phenology(&self) -> &Phenology {
        &self.phenology
    }

    /// The soil seed bank.
    pub const fn seeds(&self) -> &SeedBank {
        &self.seeds
    }

    /// Light interception and water use computed by the last
    /// [`compute_rates`](Self::compute_rates).
    pub const fn canopy(&self) -> &CanopyState {
        &self.canopy
    }

    /// Extinction coefficient of a status.
    pub fn extinction(&self, status: Status) -> f64 {
        self.extinction[status]
    }

    /// Flows accumulated so far today.
    pub const fn flows(&self) -> &DayFlows {
        &self.flows
    }

    /// Packed phenology code.
    pub fn phenology_code(&self) -> f64 {
        self.phenology.code()
    }

    /// Restore the phenology from a packed code.
    pub fn set_phenology_code(&mut self, code: f64) {
        self.phenology.set_code(code);
        self.phenology.set_horizon(&self.site.params);
    }

    fn members(&self, group: StatusGroup) -> impl Iterator<Item = &Cohort> {
        self.cohorts
            .iter()
            .filter(move |cohort| group.contains(cohort.status))
    }

    /// Herbage of a status group.
    pub fn herbage(&self, group: StatusGroup) -> DmPool {
        let totals: Vec<DmPool> = self.members(group).map(Cohort::herbage_total).collect();
        sum_pools(totals.iter())
    }

    /// Herbage of one shoot part in a status group.
    pub fn herbage_part(&self, group: StatusGroup, part: ShootPart) -> DmPool {
        let totals: Vec<DmPool> = self.members(group).map(|cohort| cohort.shoot(part)).collect();
        sum_pools(totals.iter())
    }

    /// Herbage of a status group by digestibility class.
    pub fn herbage_by_class(&self, group: StatusGroup) -> ClassTable<DmPool> {
        ClassTable::from_fn(|class: DmdClass| {
            let totals: Vec<DmPool> = self
                .members(group)
                .map(|cohort| cohort.class_total(class))
                .collect();
            sum_pools(totals.iter())
        })
    }

    /// Roots of a status group.
    pub fn roots(&self, group: StatusGroup) -> DmPool {
        let totals: Vec<DmPool> = self.members(group).map(Cohort::roots_total).collect();
        sum_pools(totals.iter())
    }

    /// Roots of a status group in each soil layer.
    pub fn roots_by_layer(&self, group: StatusGroup) -> Vec<DmPool> {
        (0..self.layer_count())
            .map(|layer| {
                let totals: Vec<DmPool> = self
                    .members(group)
                    .map(|cohort| cohort.root_layer_total(layer))
                    .collect();
                sum_pools(totals.iter())
            })
            .collect()
    }

    /// Deepest rooting depth of the green cohorts (mm).
    pub fn root_depth(&self) -> f64 {
        self.members(StatusGroup::Green)
            .map(|cohort| cohort.root_depth)
            .fold(0.0, f64::max)
    }

    /// Area index of a status group.
    pub fn area_index(&self, group: StatusGroup) -> f64 {
        self.members(group).map(Cohort::total_area_index).sum()
    }

    /// Projected area of a status group under its extinction coefficients.
    pub fn proj_area(&self, group: StatusGroup) -> f64 {
        self.members(group)
            .map(|cohort| cohort.proj_area(self.extinction[cohort.status]))
            .sum()
    }

    /// Nutrient concentration of a status group's herbage.
    pub fn herbage_concentration(&self, group: StatusGroup, element: pasture_types::Element) -> f64 {
        self.herbage(group).concentration(element)
    }

    /// Mean digestibility of a status group's herbage.
    pub fn herbage_dmd(&self, group: StatusGroup) -> f64 {
        let by_class = self.herbage_by_class(group);
        let digestible: f64 = by_class.iter().map(|(class, pool)| class.dmd() * pool.dm).sum();
        div0(digestible, self.herbage(group).dm)
    }

    /// Seed in the bank (g/m^2).
    pub fn seed_mass(&self) -> f64 {
        self.seeds.total_mass()
    }

    /// Every pool the population holds: herbage, roots and seed.
    pub fn stock(&self) -> DmPool {
        let mut stock = DmPool::ZERO;
        let ops = self.site.ops;
        for cohort in &self.cohorts {
            ops.add(&mut stock, &cohort.herbage_total());
            ops.add(&mut stock, &cohort.roots_total());
        }
        ops.add(&mut stock, &self.seeds.total(ops));
        stock
    }

    /// Today's uptake of one nutrient form by all cohorts, per sub-area and
    /// layer (g/m^2), for the host to take out of the soil.
    pub fn nutrient_uptake(&self, form: Nutrient) -> Vec<Vec<f64>> {
        let areas = self.site.inputs.nutrients.rel_areas.len();
        let layers = self.layer_count();
        let mut total = vec![vec![0.0; layers]; areas];
        for cohort in &self.cohorts {
            for (area_total, area) in total.iter_mut().zip(cohort.nutrient_uptake(form)) {
                for (sum, amount) in area_total.iter_mut().zip(area) {
                    *sum += amount;
                }
            }
        }
        total
    }

    // -----------------------------------------------------------------------
    // Initial state
    // -----------------------------------------------------------------------

    /// Set the herbage of one status, part and class, creating the cohort
    /// if needed. Green herbage is given its maximum nutrient
    /// concentration, dry herbage its minimum.
    pub fn set_herbage(&mut self, status: Status, part: ShootPart, class: DmdClass, dm: f64) {
        let index = self.find_or_make(status);
        let view = DayView::new(&self.site, &self.phenology, &self.extinction);
        let ctx = view.cohort(status);
        let Some(cohort) = self.cohorts.get_mut(index) else {
            return;
        };
        let dm = dm.max(0.0);
        let mut pool = DmPool::with_dm(dm);
        for &element in ctx.ops.elements().elements() {
            let conc = if status.is_green() {
                Cohort::max_shoot_conc(&ctx, element, part, class)
            } else {
                Cohort::min_shoot_conc(&ctx, element, part, class)
            };
            pool.nu[element] = conc * dm;
        }
        if ctx.tracks(pasture_types::Element::N) {
            pool.ash_alk = dm * ctx.params.ash_alk[part.part()];
        }
        cohort.herbage[part][class] = pool;
        cohort.specific_area[part][class] = if dm > 0.0 {
            Cohort::new_specific_area(&ctx, part)
        } else {
            0.0
        };
    }

    /// Lay `dm` of roots of a green status out to `depth` mm.
    pub fn set_roots(&mut self, status: Status, dm: f64, depth: f64) {
        if !status.is_green() {
            return;
        }
        let index = self.find_or_make(status);
        let view = DayView::new(&self.site, &self.phenology, &self.extinction);
        let ctx = view.cohort(status);
        if let Some(cohort) = self.cohorts.get_mut(index) {
            let pool = Cohort::new_tissue(&ctx, Part::Root, dm.max(0.0));
            cohort.set_default_roots(&ctx, &pool, depth.clamp(0.0, ctx.max_root_depth));
        }
    }

    /// Set the seed of one hardness and ripeness in one layer.
    pub fn set_seed(&mut self, hardness: Hardness, ripeness: Ripeness, layer: usize, dm: f64) {
        let view = DayView::new(&self.site, &self.phenology, &self.extinction);
        let ctx = view.cohort(Status::Seedling);
        let stage = self.phenology.stage;
        if self.seeds.pool(hardness, ripeness, layer).dm <= 0.0 {
            // A fresh pool takes the concentrations of new seed.
            let seed = Cohort::new_tissue(&ctx, Part::Seed, dm.max(0.0));
            self.seeds.add(ctx.ops, hardness, ripeness, layer, &seed);
        }
        self.seeds
            .set_mass(ctx.ops, hardness, ripeness, layer, dm, stage);
    }

    /// Available soil water weighted by the effective roots of `status`.
    pub(crate) fn root_weighted_asw(&self, status: Status) -> f64 {
        let propn = canopy::effective_root_propn(&self.cohorts, status, self.layer_count());
        propn
            .iter()
            .enumerate()
            .map(|(layer, share)| share * layer_value(&self.site.inputs.rel_asw, layer))
            .sum()
    }
}
