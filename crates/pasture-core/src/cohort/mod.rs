//! A cohort: the plant material of one developmental status.
//!
//! Herbage is held per shoot part and digestibility class, roots per age
//! class and soil layer. The daily work is split across submodules:
//!
//! - `growth` -- root extension, respiration, allocation, translocation and
//!   net growth
//! - `flows` -- death, fall, decay and digestibility decline rates; dead
//!   moisture; frost hardening
//! - `nutrients` -- per-element demand, supply, rationing and allocation
//! - `update` -- the flux-limited daily mass balance
//!
//! Cohort methods never reach back into the population. Everything they
//! need about the day, the soil and the species arrives in a
//! [`CohortContext`].

mod flows;
mod growth;
mod nutrients;
mod update;

pub use nutrients::{NutrientInfo, PartDemand, ration_supply};
pub use update::CohortOutcome;

use pasture_ledger::PoolOps;
use pasture_ledger::math::{div0, weight_average};
use pasture_types::constants::REF_CO2;
use pasture_types::dmd::CLASS_WIDTH;
use pasture_types::{
    AgeTable, ClassTable, DevelopStage, DmPool, DmdClass, Element, ElementTable, GrowthLimit,
    LimitTable, Part, PartTable, RootAge, ShootPart, ShootTable, Status,
};

use crate::environment::{DailyInputs, SoilProfile, layer_value};
use crate::error::CohortError;
use crate::params::SpeciesParams;

/// Sum a sequence of pools, field by field.
pub(crate) fn sum_pools<'a>(pools: impl IntoIterator<Item = &'a DmPool>) -> DmPool {
    pools.into_iter().fold(DmPool::ZERO, |mut total, pool| {
        total.dm += pool.dm;
        for element in Element::ALL {
            total.nu[element] += pool.nu[element];
        }
        total.ash_alk += pool.ash_alk;
        total
    })
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Read-only view of everything a cohort needs from its owner for one day.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CohortContext<'a> {
    pub params: &'a SpeciesParams,
    pub ops: PoolOps,
    pub soil: &'a SoilProfile,
    pub inputs: &'a DailyInputs,
    pub stage: DevelopStage,
    pub deg_days: f64,
    pub seed_set_propn: f64,
    pub max_root_depth: f64,
    pub root_restriction: &'a [f64],
    pub lagged_temp: f64,
    /// Extinction coefficient of the cohort's status.
    pub extinction: f64,
}

impl CohortContext<'_> {
    pub(crate) fn tracks(&self, element: Element) -> bool {
        self.ops.elements().contains(element)
    }

    /// Relative available soil water of `layer`.
    pub(crate) fn asw(&self, layer: usize) -> f64 {
        layer_value(&self.inputs.rel_asw, layer)
    }

    /// Relative specific-area response to CO2.
    pub(crate) fn co2_specific_area(&self) -> f64 {
        if self.inputs.co2 > 0.0 {
            1.0 - self.params.light[6] * (self.inputs.co2 / REF_CO2 - 1.0)
        } else {
            1.0
        }
    }

    /// Relative response of nutrient concentrations of `part` to CO2.
    pub(crate) fn co2_nutr_conc(&self, element: Element, part: Part) -> f64 {
        if self.inputs.co2 <= 0.0 {
            return 1.0;
        }
        let mut scale =
            1.0 - self.params.nutr_co2[element][part] * (self.inputs.co2 / REF_CO2 - 1.0);
        if part == Part::Leaf {
            scale *= self.co2_specific_area();
        }
        scale
    }
}

// ---------------------------------------------------------------------------
// Daily rates
// ---------------------------------------------------------------------------

/// Rates computed by `compute_rates` and consumed by the mass balance.
#[derive(Debug, Clone, Default)]
pub(crate) struct CohortRates {
    pub root_extension: Vec<f64>,
    pub max_root_layer: usize,
    pub new_specific_area: ShootTable<f64>,
    pub maint_resp_rate: PartTable<f64>,
    pub maint_resp: PartTable<f64>,
    pub growth_resp_rate: f64,
    pub growth_resp: f64,
    pub new_root_distn: Vec<f64>,
    pub pot_assim: f64,
    pub assimilation: f64,
    pub pot_root_transloc: AgeTable<Vec<f64>>,
    pub root_transloc: AgeTable<Vec<f64>>,
    pub pot_root_transloc_sum: f64,
    pub root_transloc_sum: f64,
    pub pot_stem_transloc: ClassTable<f64>,
    pub stem_transloc: ClassTable<f64>,
    pub pot_stem_transloc_sum: f64,
    pub stem_transloc_sum: f64,
    pub pot_part_growth: PartTable<f64>,
    pub part_growth: PartTable<f64>,
    pub shoot_growth: ShootTable<ClassTable<DmPool>>,
    pub root_growth: AgeTable<Vec<DmPool>>,
    pub seed_growth: DmPool,
    pub shoot_loss: ShootTable<ClassTable<f64>>,
    pub dmd_decline: ShootTable<ClassTable<f64>>,
    pub root_loss: AgeTable<f64>,
    pub root_aging: f64,
    pub root_reloc: f64,
    pub delta_frost: f64,
    pub delta_stress: f64,
}

impl CohortRates {
    pub(crate) fn new(layer_count: usize) -> Self {
        Self {
            root_extension: vec![0.0; layer_count],
            new_root_distn: vec![0.0; layer_count],
            pot_root_transloc: AgeTable::from_fn(|_| vec![0.0; layer_count]),
            root_transloc: AgeTable::from_fn(|_| vec![0.0; layer_count]),
            root_growth: AgeTable::from_fn(|_| vec![DmPool::ZERO; layer_count]),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Totals
// ---------------------------------------------------------------------------

/// Aggregates of a cohort's pools over every dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortTotals {
    /// Herbage per digestibility class, leaf and stem together.
    pub by_class: ClassTable<DmPool>,
    /// Herbage per shoot part.
    pub by_part: ShootTable<DmPool>,
    /// All herbage.
    pub herbage: DmPool,
    /// Roots per soil layer, both ages together.
    pub roots_by_layer: Vec<DmPool>,
    /// Roots per age class.
    pub roots_by_age: AgeTable<DmPool>,
    /// All roots.
    pub roots: DmPool,
    /// Mass-weighted specific area of each shoot part (m^2/g).
    pub specific_area: ShootTable<f64>,
}

// ---------------------------------------------------------------------------
// Cohort
// ---------------------------------------------------------------------------

/// The pools and state of one developmental status.
#[derive(Debug, Clone)]
pub struct Cohort {
    /// Developmental status.
    pub status: Status,
    /// Herbage by shoot part and digestibility class (g/m^2).
    pub herbage: ShootTable<ClassTable<DmPool>>,
    /// Specific area of each herbage pool (m^2/g).
    pub specific_area: ShootTable<ClassTable<f64>>,
    /// Roots by age class and soil layer (g/m^2).
    pub roots: AgeTable<Vec<DmPool>>,
    /// Rooting depth (mm).
    pub root_depth: f64,
    /// Frost hardening, added to the frost-death threshold (deg C).
    pub frost_factor: f64,
    /// Accumulated establishment stress of a seedling cohort.
    pub seedling_stress: f64,
    /// Establishment index of a seedling cohort.
    pub establish_index: f64,
    /// Stem reserve available for translocation to seed (g/m^2).
    pub stem_reserve: f64,
    /// Water held by standing dead herbage (mm).
    pub dead_moisture: ShootTable<f64>,
    /// Relative moisture of standing dead herbage over the last day.
    pub rel_moisture: ShootTable<f64>,
    /// Fraction of net growth allocated to each part.
    pub allocation: PartTable<f64>,
    /// Relative growth limitation by each factor (1 = unlimited).
    pub limit_factors: LimitTable,
    /// Target root:shoot ratio.
    pub r2s_target: f64,
    pub(crate) rates: CohortRates,
    pub(crate) nutrients: ElementTable<NutrientInfo>,
}

impl Cohort {
    /// An empty cohort of `status` in a profile of `layer_count` layers.
    pub fn new(status: Status, layer_count: usize) -> Self {
        Self {
            status,
            herbage: ShootTable::filled(ClassTable::filled(DmPool::ZERO)),
            specific_area: ShootTable::filled(ClassTable::filled(0.0)),
            roots: AgeTable::from_fn(|_| vec![DmPool::ZERO; layer_count]),
            root_depth: 0.0,
            frost_factor: 0.0,
            seedling_stress: 0.0,
            establish_index: 0.0,
            stem_reserve: 0.0,
            dead_moisture: ShootTable::filled(0.0),
            rel_moisture: ShootTable::filled(0.0),
            allocation: PartTable::filled(0.0),
            limit_factors: LimitTable::filled(1.0),
            r2s_target: 0.0,
            rates: CohortRates::new(layer_count),
            nutrients: ElementTable::from_fn(|_| NutrientInfo::new(layer_count)),
        }
    }

    /// Number of soil layers the root pools span.
    pub fn layer_count(&self) -> usize {
        self.roots[RootAge::Effective].len()
    }

    /// Per-element nutrient ledger for the current day.
    pub const fn nutrient_info(&self) -> &ElementTable<NutrientInfo> {
        &self.nutrients
    }

    /// Net growth of each part over the last computed day (g/m^2).
    pub const fn net_growth(&self) -> &PartTable<f64> {
        &self.rates.part_growth
    }

    /// Assimilation over the last computed day (g/m^2).
    pub const fn assimilation(&self) -> f64 {
        self.rates.assimilation
    }

    /// Seed produced by the last computed day's growth.
    pub const fn seed_growth(&self) -> &DmPool {
        &self.rates.seed_growth
    }

    // -----------------------------------------------------------------------
    // Totals
    // -----------------------------------------------------------------------

    /// All herbage of one shoot part.
    pub fn shoot(&self, part: ShootPart) -> DmPool {
        sum_pools(self.herbage[part].values())
    }

    /// All herbage.
    pub fn herbage_total(&self) -> DmPool {
        sum_pools(
            self.herbage
                .values()
                .flat_map(|classes| classes.values()),
        )
    }

    /// Herbage of one digestibility class, leaf and stem together.
    pub fn class_total(&self, class: DmdClass) -> DmPool {
        sum_pools(self.herbage.values().map(|classes| &classes[class]))
    }

    /// All roots of one age class.
    pub fn root_age_total(&self, age: RootAge) -> DmPool {
        sum_pools(self.roots[age].iter())
    }

    /// Roots of both ages in one layer.
    pub fn root_layer_total(&self, layer: usize) -> DmPool {
        sum_pools(self.roots.values().filter_map(|layers| layers.get(layer)))
    }

    /// All roots.
    pub fn roots_total(&self) -> DmPool {
        sum_pools(self.roots.values().flat_map(|layers| layers.iter()))
    }

    /// Dry mass of a whole part; seed is never held in a cohort.
    pub fn part_dm(&self, part: Part) -> f64 {
        match part.shoot() {
            Some(shoot) => self.shoot(shoot).dm,
            None if part == Part::Root => self.roots_total().dm,
            None => 0.0,
        }
    }

    /// Every aggregate of the cohort's pools.
    pub fn totals(&self) -> CohortTotals {
        let by_part = ShootTable::from_fn(|part| self.shoot(part));
        let specific_area = ShootTable::from_fn(|part| {
            div0(
                self.herbage[part]
                    .iter()
                    .map(|(class, pool)| pool.dm * self.specific_area[part][class])
                    .sum(),
                by_part[part].dm,
            )
        });
        let roots_by_layer = (0..self.layer_count())
            .map(|layer| self.root_layer_total(layer))
            .collect();
        let roots_by_age = AgeTable::from_fn(|age| self.root_age_total(age));
        CohortTotals {
            by_class: ClassTable::from_fn(|class| self.class_total(class)),
            by_part,
            herbage: sum_pools(by_part.values()),
            roots_by_layer,
            roots: sum_pools(roots_by_age.values()),
            roots_by_age,
            specific_area,
        }
    }

    /// Fraction of a part's mass held in each class (shoot) or pool (root),
    /// used to spread losses.
    pub(crate) fn class_fraction(&self, part: ShootPart, class: DmdClass) -> f64 {
        div0(self.herbage[part][class].dm, self.shoot(part).dm)
    }

    // -----------------------------------------------------------------------
    // Canopy
    // -----------------------------------------------------------------------

    /// Green area index of a shoot part.
    pub fn area_index(&self, part: ShootPart) -> f64 {
        self.herbage[part]
            .iter()
            .map(|(class, pool)| pool.dm * self.specific_area[part][class])
            .sum()
    }

    /// Area index of leaf and stem together.
    pub fn total_area_index(&self) -> f64 {
        ShootPart::ALL
            .into_iter()
            .map(|part| self.area_index(part))
            .sum()
    }

    /// Projected area of the shoots under extinction coefficient `k`.
    pub fn proj_area(&self, k: f64) -> f64 {
        k * self.total_area_index()
    }

    /// Give every non-empty pool without a specific area the one new tissue
    /// would receive today.
    pub(crate) fn initialise_specific_areas(&mut self, new_area: &ShootTable<f64>) {
        for part in ShootPart::ALL {
            for class in DmdClass::ALL {
                if self.specific_area[part][class] <= 0.0 && self.herbage[part][class].dm > 0.0 {
                    self.specific_area[part][class] = new_area[part];
                }
            }
        }
    }

    /// Current root:shoot ratio, or `default` while there is no herbage.
    pub fn root_to_shoot(&self, default: f64) -> f64 {
        let herbage = self.herbage_total().dm;
        if herbage > 0.0 {
            self.roots_total().dm / herbage
        } else {
            default
        }
    }

    // -----------------------------------------------------------------------
    // Digestibility classes
    // -----------------------------------------------------------------------

    /// Most digestible class new tissue of `part` enters.
    pub(crate) fn highest_class(&self, params: &SpeciesParams, part: ShootPart) -> DmdClass {
        if self.status.is_green() {
            DmdClass::from_dmd(params.mature[part][1], true)
        } else {
            DmdClass::HIGHEST
        }
    }

    /// Least digestible class `part` can reach while green.
    pub(crate) fn lowest_class(&self, params: &SpeciesParams, part: ShootPart) -> DmdClass {
        if self.status.is_green() {
            let floor = params.mature[part][2].min(params.mature[part][3]);
            DmdClass::from_dmd(floor, true)
        } else {
            DmdClass::LOWEST
        }
    }

    /// Share of new shoot tissue that enters each class. New tissue enters at
    /// the maturation parameter's DMD, which straddles the boundary between
    /// the new-herbage class and the one below it.
    pub(crate) fn new_shoot_fraction(
        &self,
        params: &SpeciesParams,
        part: ShootPart,
        class: DmdClass,
    ) -> f64 {
        let entry_dmd = params.mature[part][1];
        let new_class = DmdClass::from_dmd(entry_dmd, true);
        let spill = ((new_class.dmd() - entry_dmd) / CLASS_WIDTH).max(0.0);
        let below = new_class.lower();
        if class == new_class {
            if below.is_some() { 1.0 - spill } else { 1.0 }
        } else if below == Some(class) {
            spill
        } else {
            0.0
        }
    }

    /// Share of a shoot part's net growth that `class` receives: the new
    /// shoot fraction for growth, the class's share of the part for loss.
    pub(crate) fn shoot_growth_share(
        &self,
        params: &SpeciesParams,
        part: ShootPart,
        class: DmdClass,
        growth: f64,
    ) -> f64 {
        if growth > 0.0 {
            return self.new_shoot_fraction(params, part, class);
        }
        if self.shoot(part).dm > 0.0 {
            self.class_fraction(part, class)
        } else if class == self.highest_class(params, part) {
            1.0
        } else {
            0.0
        }
    }

    /// Share of a root pool in the cohort's root mass.
    pub(crate) fn root_fraction(&self, age: RootAge, layer: usize) -> f64 {
        let pool = self.roots[age].get(layer).map_or(0.0, |pool| pool.dm);
        div0(pool, self.roots_total().dm)
    }

    /// Concentration of `class` relative to the concentration at the
    /// highest digestibility: a quadratic in relative digestibility through
    /// the mid-point and floor concentrations.
    pub(crate) fn dmd_to_rel_conc(
        params: &SpeciesParams,
        element: Element,
        part: ShootPart,
        class: DmdClass,
    ) -> f64 {
        let q = &params.mature[part];
        let rel_dmd = div0(class.dmd() - q[3], q[1] - q[3]).clamp(0.0, 1.0);
        let reference = params.nutr_conc[2][element][part.part()];
        let mid = div0(params.nutr_conc[3][element][part.part()], reference);
        let min = div0(params.nutr_conc[4][element][part.part()], reference);
        let a = 2.0f64.mul_add(min, (-4.0f64).mul_add(mid, 2.0));
        let b = (-3.0f64).mul_add(min, 4.0f64.mul_add(mid, -1.0));
        (a * rel_dmd).mul_add(rel_dmd, b.mul_add(rel_dmd, min))
    }

    /// Maximum nutrient concentration of a shoot class.
    pub(crate) fn max_shoot_conc(
        ctx: &CohortContext<'_>,
        element: Element,
        part: ShootPart,
        class: DmdClass,
    ) -> f64 {
        ctx.params.nutr_conc[1][element][part.part()]
            * ctx.co2_nutr_conc(element, part.part())
            * Self::dmd_to_rel_conc(ctx.params, element, part, class)
    }

    /// Minimum nutrient concentration of a shoot class.
    pub(crate) fn min_shoot_conc(
        ctx: &CohortContext<'_>,
        element: Element,
        part: ShootPart,
        class: DmdClass,
    ) -> f64 {
        ctx.params.nutr_conc[2][element][part.part()]
            * ctx.co2_nutr_conc(element, part.part())
            * Self::dmd_to_rel_conc(ctx.params, element, part, class)
    }

    /// Maximum nutrient concentration of roots.
    pub(crate) fn max_root_conc(ctx: &CohortContext<'_>, element: Element) -> f64 {
        ctx.params.nutr_conc[1][element][Part::Root] * ctx.co2_nutr_conc(element, Part::Root)
    }

    /// Minimum nutrient concentration of roots.
    pub(crate) fn min_root_conc(ctx: &CohortContext<'_>, element: Element) -> f64 {
        ctx.params.nutr_conc[2][element][Part::Root] * ctx.co2_nutr_conc(element, Part::Root)
    }

    /// A pool of freshly grown tissue of `part` at maximum concentration.
    pub(crate) fn new_tissue(ctx: &CohortContext<'_>, part: Part, dm: f64) -> DmPool {
        let mut pool = DmPool::with_dm(dm);
        for &element in ctx.ops.elements().elements() {
            pool.nu[element] = dm * ctx.params.nutr_conc[1][element][part];
        }
        if ctx.tracks(Element::N) {
            pool.ash_alk = dm * ctx.params.ash_alk[part];
        }
        pool
    }

    // -----------------------------------------------------------------------
    // Roots
    // -----------------------------------------------------------------------

    /// Proportion of a new root system that is effective.
    pub(crate) fn default_effective_fraction(params: &SpeciesParams) -> f64 {
        let (ageing, dying) = (params.root_loss[1], params.root_loss[2]);
        if ageing + dying > 0.0 {
            dying / (ageing + dying)
        } else {
            1.0
        }
    }

    /// Lay `root_pool` out over the profile to depth `depth`, splitting it
    /// between effective and old roots in their default proportion.
    pub(crate) fn set_default_roots(
        &mut self,
        ctx: &CohortContext<'_>,
        root_pool: &DmPool,
        depth: f64,
    ) {
        self.root_depth = depth;
        let full_water = vec![1.0; self.layer_count()];
        let distn = growth::root_distribution(ctx, depth, &full_water);
        let eff = Self::default_effective_fraction(ctx.params);
        for (age, layers) in self.roots.iter_mut() {
            let share = match age {
                RootAge::Effective => eff,
                RootAge::Old => 1.0 - eff,
            };
            for (layer, pool) in layers.iter_mut().enumerate() {
                *pool = ctx
                    .ops
                    .fraction(root_pool, layer_value(&distn, layer) * share);
            }
        }
    }

    /// Add another cohort's roots, and the day's root rates that go with
    /// them, to this cohort's. The deeper rooting depth is kept.
    pub(crate) fn add_roots(&mut self, ops: PoolOps, other: &Self) {
        self.root_depth = self.root_depth.max(other.root_depth);
        self.rates.max_root_layer = self.rates.max_root_layer.max(other.rates.max_root_layer);
        for age in RootAge::ALL {
            let own = &mut self.rates;
            for (rate, extra) in own.root_transloc[age].iter_mut().zip(&other.rates.root_transloc[age]) {
                *rate += extra;
            }
            for (growth, extra) in own.root_growth[age].iter_mut().zip(&other.rates.root_growth[age]) {
                ops.add_allowing_loss(growth, extra);
            }
        }
        self.rates.root_transloc_sum += other.rates.root_transloc_sum;

        let own_eff = self.root_age_total(RootAge::Effective).dm;
        let other_eff = other.root_age_total(RootAge::Effective).dm;
        let own_old = self.root_age_total(RootAge::Old).dm;
        let other_old = other.root_age_total(RootAge::Old).dm;
        self.rates.root_aging =
            weight_average(self.rates.root_aging, own_eff, other.rates.root_aging, other_eff);
        self.rates.root_reloc =
            weight_average(self.rates.root_reloc, own_old, other.rates.root_reloc, other_old);
        self.rates.root_loss[RootAge::Effective] = weight_average(
            self.rates.root_loss[RootAge::Effective],
            own_eff,
            other.rates.root_loss[RootAge::Effective],
            other_eff,
        );
        self.rates.root_loss[RootAge::Old] = weight_average(
            self.rates.root_loss[RootAge::Old],
            own_old,
            other.rates.root_loss[RootAge::Old],
            other_old,
        );

        for (age, layers) in self.roots.iter_mut() {
            for (pool, extra) in layers.iter_mut().zip(&other.roots[age]) {
                ops.add(pool, extra);
            }
        }
    }

    /// Empty the root pools and their daily rates.
    pub(crate) fn clear_roots(&mut self) {
        let layer_count = self.layer_count();
        self.root_depth = 0.0;
        self.roots = AgeTable::from_fn(|_| vec![DmPool::ZERO; layer_count]);
        let rates = &mut self.rates;
        rates.max_root_layer = 0;
        rates.root_transloc = AgeTable::from_fn(|_| vec![0.0; layer_count]);
        rates.root_transloc_sum = 0.0;
        rates.root_growth = AgeTable::from_fn(|_| vec![DmPool::ZERO; layer_count]);
        rates.root_aging = 0.0;
        rates.root_reloc = 0.0;
        rates.root_loss = AgeTable::filled(0.0);
    }

    // -----------------------------------------------------------------------
    // Merging
    // -----------------------------------------------------------------------

    /// Merge `other` into this cohort.
    ///
    /// Pools are added. Specific areas become class-mass-weighted means; the
    /// frost, establishment and growth-limit state become shoot-weighted
    /// means. Stem reserve, respiration and the light share are summed.
    ///
    /// # Errors
    ///
    /// Returns [`CohortError::InconsistentMerge`] when the statuses differ.
    /// Neither cohort is modified in that case.
    pub fn merge(&mut self, ops: PoolOps, other: &Self) -> Result<(), CohortError> {
        if other.status != self.status {
            return Err(CohortError::InconsistentMerge {
                target_status: self.status,
                source_status: other.status,
            });
        }

        let own_shoot = self.herbage_total().dm;
        let other_shoot = other.herbage_total().dm;

        for part in ShootPart::ALL {
            self.rel_moisture[part] = weight_average(
                self.rel_moisture[part],
                self.shoot(part).dm,
                other.rel_moisture[part],
                other.shoot(part).dm,
            );
            self.dead_moisture[part] += other.dead_moisture[part];
            for class in DmdClass::ALL {
                self.specific_area[part][class] = weight_average(
                    self.specific_area[part][class],
                    self.herbage[part][class].dm,
                    other.specific_area[part][class],
                    other.herbage[part][class].dm,
                );
                ops.add(&mut self.herbage[part][class], &other.herbage[part][class]);
            }
        }

        self.add_roots(ops, other);

        self.frost_factor =
            weight_average(self.frost_factor, own_shoot, other.frost_factor, other_shoot);
        match self.status {
            Status::Seedling => {
                self.establish_index = weight_average(
                    self.establish_index,
                    own_shoot,
                    other.establish_index,
                    other_shoot,
                );
                self.seedling_stress = weight_average(
                    self.seedling_stress,
                    own_shoot,
                    other.seedling_stress,
                    other_shoot,
                );
            }
            Status::Established | Status::Senescing => {
                self.stem_reserve += other.stem_reserve;
            }
            _ => {}
        }

        if self.status.is_green() {
            let rates = &mut self.rates;
            rates.stem_transloc_sum += other.rates.stem_transloc_sum;
            rates.growth_resp += other.rates.growth_resp;
            for part in Part::ALL {
                rates.maint_resp[part] += other.rates.maint_resp[part];
                self.allocation[part] = weight_average(
                    self.allocation[part],
                    own_shoot,
                    other.allocation[part],
                    other_shoot,
                );
            }
            self.r2s_target += other.r2s_target;
            for limit in GrowthLimit::ALL {
                self.limit_factors[limit] = if limit == GrowthLimit::Gai {
                    self.limit_factors[limit] + other.limit_factors[limit]
                } else {
                    weight_average(
                        self.limit_factors[limit],
                        own_shoot,
                        other.limit_factors[limit],
                        other_shoot,
                    )
                };
            }
        }
        Ok(())
    }

    /// Returns `true` when the cohort holds no herbage and no roots.
    pub fn is_empty(&self) -> bool {
        self.herbage_total().dm <= 0.0 && self.roots_total().dm <= 0.0
    }

    /// Set the growth-limit factor for a nutrient element.
    pub(crate) fn set_nutrient_limit(&mut self, element: Element, value: f64) {
        self.limit_factors[GrowthLimit::for_element(element)] = value;
    }
}
