//! Per-element nutrient demand, supply, rationing and allocation.
//!
//! For each tracked element a green cohort first works out how much it
//! wants (maximum demand) and how much it needs to grow unhindered
//! (critical demand). Supply is then gathered in a fixed order:
//!
//! 1. translocation out of roots and stem, at the potential rates
//! 2. recycling of nitrogen released as herbage loses digestibility
//! 3. fixation (legumes only)
//! 4. uptake from the soil, shared between cohorts by maximum demand
//! 5. relocation out of older herbage (and roots, for seed) to meet any
//!    critical shortfall
//!
//! Once net growth is known, surplus supply is clawed back and the rest is
//! rationed between parts with critical seed demand first.

use pasture_ledger::math::{div0, ramp};
use pasture_types::dmd::CLASS_WIDTH;
use pasture_types::{
    AgeTable, ClassTable, DmPool, DmdClass, Element, Nutrient, NutrientTable, Part, PartTable,
    RootAge, ShootPart, ShootTable, Status,
};

use super::{Cohort, CohortContext};
use crate::environment::layer_value;

/// Surplus of supply over maximum demand left alone by rescaling.
const RESCALE_EPSILON: f64 = 1.0e-7;

/// Rate at which rain leaches mobile nutrient out of litter (per mm).
const LEACH_RATE: f64 = 0.05;

// ---------------------------------------------------------------------------
// Demand and rationing
// ---------------------------------------------------------------------------

/// Maximum and critical demand of each part for one element (g/m^2).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PartDemand {
    /// Demand that would bring existing and new tissue to maximum
    /// concentration.
    pub max: PartTable<f64>,
    /// Demand below which growth is nutrient-limited.
    pub crit: PartTable<f64>,
}

impl PartDemand {
    /// Maximum demand summed over parts.
    pub fn max_total(&self) -> f64 {
        self.max.sum()
    }

    /// Critical demand summed over parts.
    pub fn crit_total(&self) -> f64 {
        self.crit.sum()
    }
}

/// Split `supply` of one element between parts.
///
/// Critical seed demand is met first. If the supply falls short of the
/// total critical demand, what remains is shared in proportion to the
/// critical demand of leaf, stem and root. Otherwise every part gets its
/// critical demand and the excess is shared in proportion to each part's
/// gap between maximum and critical demand. With no demand at all (growth
/// is negative but translocation still runs), stem takes up to the stem
/// translocation supply and root takes the rest.
///
/// The parts always sum to `supply`.
pub fn ration_supply(
    supply: f64,
    demand: &PartDemand,
    stem_transloc_supply: f64,
) -> PartTable<f64> {
    let mut ration = PartTable::filled(0.0);
    if supply <= 0.0 {
        return ration;
    }

    let max_total = demand.max_total();
    let crit_total = demand.crit_total();
    if max_total <= 0.0 {
        ration[Part::Stem] = supply.min(stem_transloc_supply);
        ration[Part::Root] = supply - ration[Part::Stem];
    } else if supply < crit_total {
        ration[Part::Seed] = supply.min(demand.crit[Part::Seed]);
        let rel_supply = div0(
            supply - ration[Part::Seed],
            crit_total - demand.crit[Part::Seed],
        );
        for part in [Part::Leaf, Part::Stem, Part::Root] {
            ration[part] = rel_supply * demand.crit[part];
        }
    } else {
        let excess = supply - crit_total;
        for part in Part::ALL {
            let propn = if max_total > crit_total {
                (demand.max[part] - demand.crit[part]) / (max_total - crit_total)
            } else {
                div0(demand.crit[part], crit_total)
            };
            ration[part] = propn.mul_add(excess, demand.crit[part]);
        }
    }
    ration
}

// ---------------------------------------------------------------------------
// Per-element ledger
// ---------------------------------------------------------------------------

/// One day's demand and supply of one element for a cohort.
///
/// Shoot quantities are per part and class, root quantities per layer,
/// uptake per soil nutrient form, sub-area and layer. All amounts are
/// g/m^2.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NutrientInfo {
    /// Maximum concentration of each shoot pool.
    pub max_shoot_conc: ShootTable<ClassTable<f64>>,
    /// Minimum concentration of each shoot pool.
    pub min_shoot_conc: ShootTable<ClassTable<f64>>,
    /// Maximum and critical demand per part.
    pub demand: PartDemand,
    /// Total supply gathered so far.
    pub supplied: f64,
    /// Supply arriving with root translocation.
    pub root_transloc_supply: f64,
    /// Supply arriving with stem translocation.
    pub stem_transloc_supply: f64,
    /// Nutrient moving with root translocation, per age and layer.
    pub root_transloc: AgeTable<Vec<f64>>,
    /// Nutrient moving with stem translocation, per class.
    pub stem_transloc: ClassTable<f64>,
    /// Nutrient released by digestibility decline, per shoot pool.
    pub recycled: ShootTable<ClassTable<f64>>,
    /// Total recycled.
    pub recycled_sum: f64,
    /// Nitrogen fixed.
    pub fixed: f64,
    /// Uptake per soil nutrient form, sub-area and layer.
    pub uptake: NutrientTable<Vec<Vec<f64>>>,
    /// Total uptake.
    pub uptake_sum: f64,
    /// Nutrient relocated out of each shoot pool.
    pub relocated: ShootTable<ClassTable<f64>>,
    /// Total relocated from shoots.
    pub relocated_sum: f64,
    /// Nutrient relocated out of effective roots, per layer.
    pub relocated_root: Vec<f64>,
    /// Total relocated from roots.
    pub relocated_root_sum: f64,
    /// Nutrient leached out of each shoot pool.
    pub leached: ShootTable<ClassTable<f64>>,
    /// Nitrogen lost as gas.
    pub gaseous_loss: f64,
    /// Supply rationed to each part.
    pub part_supply: PartTable<f64>,
}

impl NutrientInfo {
    /// An empty ledger for a profile of `layer_count` layers.
    pub fn new(layer_count: usize) -> Self {
        Self {
            root_transloc: AgeTable::from_fn(|_| vec![0.0; layer_count]),
            relocated_root: vec![0.0; layer_count],
            ..Self::default()
        }
    }

    fn reset_supply(&mut self, layer_count: usize) {
        *self = Self {
            max_shoot_conc: self.max_shoot_conc,
            min_shoot_conc: self.min_shoot_conc,
            demand: self.demand,
            ..Self::new(layer_count)
        };
    }

    fn excess(&self) -> f64 {
        self.supplied - self.demand.max_total()
    }

    /// Withdraw supply until it no longer exceeds maximum demand, working
    /// backwards through the sources in the order they were gathered.
    fn claw_back(&mut self) {
        if let Some(scale) = reduce(self.excess(), &mut self.relocated_root_sum, &mut self.supplied) {
            for amount in &mut self.relocated_root {
                *amount *= scale;
            }
        }
        if let Some(scale) = reduce(self.excess(), &mut self.relocated_sum, &mut self.supplied) {
            scale_shoot_table(&mut self.relocated, scale);
        }
        if let Some(scale) = reduce(self.excess(), &mut self.uptake_sum, &mut self.supplied) {
            for amount in self
                .uptake
                .values_mut()
                .flat_map(|areas| areas.iter_mut())
                .flat_map(|layers| layers.iter_mut())
            {
                *amount *= scale;
            }
        }
        reduce(self.excess(), &mut self.fixed, &mut self.supplied);
        if let Some(scale) = reduce(self.excess(), &mut self.recycled_sum, &mut self.supplied) {
            scale_shoot_table(&mut self.recycled, scale);
        }
    }
}

/// Take up to `excess` out of the source total `sum` (and out of
/// `supplied`), returning the factor every component of the source must be
/// scaled by. `None` when there is nothing to take.
fn reduce(excess: f64, sum: &mut f64, supplied: &mut f64) -> Option<f64> {
    if excess <= RESCALE_EPSILON || *sum <= 0.0 {
        return None;
    }
    let delta = excess.min(*sum);
    let scale = 1.0 - delta / *sum;
    *sum -= delta;
    *supplied -= delta;
    Some(scale)
}

fn scale_shoot_table(table: &mut ShootTable<ClassTable<f64>>, scale: f64) {
    for amount in table.values_mut().flat_map(|classes| classes.values_mut()) {
        *amount *= scale;
    }
}

fn shoot_table_sum(table: &ShootTable<ClassTable<f64>>) -> f64 {
    table.values().map(|classes| classes.sum()).sum()
}

// ---------------------------------------------------------------------------
// Flows out of the rate calculation
// ---------------------------------------------------------------------------

/// Nutrient gathered for today's growth by the mass-balance step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct NutrientFlows {
    /// Nutrient available to today's net growth.
    pub supply: DmPool,
    /// The part of `supply` withdrawn from the cohort's own pools.
    pub withdrawn: DmPool,
    /// Nutrient leached out of litter.
    pub leachate: DmPool,
}

/// Nutrient shed by shoots that are not growing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct ExcessLoss {
    /// Nitrogen volatilised.
    pub gaseous: DmPool,
    /// Phosphorus and sulphur washed out.
    pub leached: DmPool,
}

impl Cohort {
    /// Inclusive class bounds each shoot part can occupy.
    fn class_bounds(&self, ctx: &CohortContext<'_>) -> ShootTable<(DmdClass, DmdClass)> {
        ShootTable::from_fn(|part| {
            (
                self.highest_class(ctx.params, part),
                self.lowest_class(ctx.params, part),
            )
        })
    }

    /// Number of layers, from the top, the roots currently reach.
    fn rooted_layers(&self) -> usize {
        self.rates
            .max_root_layer
            .saturating_add(1)
            .min(self.layer_count())
    }

    /// Nutrient that moves with translocation at the given per-pool rates.
    fn transloc_nutrient(
        &self,
        element: Element,
        root_rates: &AgeTable<Vec<f64>>,
        stem_rates: &ClassTable<f64>,
    ) -> (AgeTable<Vec<f64>>, ClassTable<f64>) {
        let root = AgeTable::from_fn(|age| {
            self.roots[age]
                .iter()
                .zip(&root_rates[age])
                .map(|(pool, rate)| rate * pool.concentration(element))
                .collect::<Vec<_>>()
        });
        let stem = ClassTable::from_fn(|class| {
            stem_rates[class] * self.herbage[ShootPart::Stem][class].concentration(element)
        });
        (root, stem)
    }

    // -----------------------------------------------------------------------
    // Demand
    // -----------------------------------------------------------------------

    /// Maximum and critical demand of each part, and today's concentration
    /// limits of each shoot pool.
    ///
    /// Existing tissue counts towards demand in proportion to how much of it
    /// is new: a part already above its maximum concentration needs less, one
    /// below it needs more.
    pub(crate) fn compute_nutrient_demand(&mut self, ctx: &CohortContext<'_>, element: Element) {
        if !self.status.is_green() {
            return;
        }
        let params = ctx.params;
        let new_tissue = &params.maturation_for(ctx.stage).new_tissue;
        let bounds = self.class_bounds(ctx);

        let mut current_dm = PartTable::filled(0.0);
        let mut current_nu = PartTable::filled(0.0);
        for part in ShootPart::ALL {
            let (highest, lowest) = bounds[part];
            for class in DmdClass::range(highest, lowest) {
                let pool = &self.herbage[part][class];
                let share = new_tissue[part][class];
                current_dm[part.part()] += share * pool.dm;
                current_nu[part.part()] += share * pool.nu[element];
            }
        }
        let effective = self.root_age_total(RootAge::Effective);
        current_dm[Part::Root] = effective.dm;
        current_nu[Part::Root] = effective.nu[element];

        let pot_growth = self.rates.pot_part_growth;
        let mut demand = PartDemand::default();
        for part in Part::ALL {
            let max_conc = params.max_conc(element, part);
            let imbalance = max_conc.mul_add(-current_dm[part], current_nu[part]);
            let growth_max = (max_conc * pot_growth[part]).max(0.0);
            let growth_crit = (params.crit_conc(element, part) * pot_growth[part]).max(0.0);
            demand.max[part] = (growth_max - imbalance).max(0.0);
            demand.crit[part] = (growth_crit - imbalance.max(0.0))
                .max(0.0)
                .min(demand.max[part]);
        }

        let info = &mut self.nutrients[element];
        info.demand = demand;
        info.max_shoot_conc = ShootTable::from_fn(|part| {
            ClassTable::from_fn(|class| Self::max_shoot_conc(ctx, element, part, class))
        });
        info.min_shoot_conc = ShootTable::from_fn(|part| {
            ClassTable::from_fn(|class| Self::min_shoot_conc(ctx, element, part, class))
        });
    }

    /// Clear yesterday's supply, keeping today's demand.
    pub(crate) fn reset_nutrient_supply(&mut self, element: Element) {
        let layer_count = self.layer_count();
        self.nutrients[element].reset_supply(layer_count);
    }

    // -----------------------------------------------------------------------
    // Supply
    // -----------------------------------------------------------------------

    /// Add the nutrient carried by potential translocation to the supply.
    pub(crate) fn translocate_nutrients(&mut self, element: Element) {
        let (root, stem) = self.transloc_nutrient(
            element,
            &self.rates.pot_root_transloc,
            &self.rates.pot_stem_transloc,
        );
        let info = &mut self.nutrients[element];
        info.root_transloc_supply = root.values().flat_map(|layers| layers.iter()).sum();
        info.stem_transloc_supply = stem.sum();
        info.root_transloc = root;
        info.stem_transloc = stem;
        info.supplied += info.root_transloc_supply + info.stem_transloc_supply;
    }

    /// Nutrient released as herbage moves down a digestibility class.
    ///
    /// Tissue keeps its position between the minimum and maximum
    /// concentrations as it declines, so the difference between its
    /// concentration and that position in the class below is released.
    /// Anything above the maximum concentration is fully mobile. Recycling
    /// never supplies more than the unmet maximum demand.
    pub(crate) fn recycle_nutrients(&mut self, ctx: &CohortContext<'_>, element: Element) {
        let bounds = self.class_bounds(ctx);
        let info = &mut self.nutrients[element];
        let demand_left = (info.demand.max_total() - info.supplied).max(0.0);

        let mut recycled = ShootTable::filled(ClassTable::filled(0.0));
        for part in ShootPart::ALL {
            let (highest, lowest) = bounds[part];
            let min = &info.min_shoot_conc[part];
            let max = &info.max_shoot_conc[part];
            for class in DmdClass::range(highest, lowest) {
                let pool = &self.herbage[part][class];
                let conc = pool.concentration(element).max(min[class]);
                let released = &mut recycled[part][class];

                if let Some(lower) = class.lower().filter(|_| class < lowest) {
                    let flux = (self.rates.dmd_decline[part][class] / CLASS_WIDTH).min(1.0)
                        * pool.nu[element];
                    if flux > 0.0 && conc > 0.0 {
                        let rel_conc = ramp(conc, min[class], max[class]);
                        let lower_conc = rel_conc.mul_add(max[lower] - min[lower], min[lower]);
                        *released = (flux * (1.0 - lower_conc / conc)).max(0.0);
                    }
                }
                if conc > max[class] {
                    *released += max[class].mul_add(-pool.dm, pool.nu[element]);
                }
            }
        }

        let mut recycled_sum = shoot_table_sum(&recycled);
        if demand_left < recycled_sum {
            scale_shoot_table(&mut recycled, div0(demand_left, recycled_sum));
            recycled_sum = demand_left;
        }
        info.recycled = recycled;
        info.recycled_sum = recycled_sum;
        info.supplied += recycled_sum;
    }

    /// Symbiotic nitrogen fixation against the unmet maximum demand.
    ///
    /// Nodule activity per unit of effective root falls linearly with depth
    /// to a fraction of the rooting depth and is zero below it. In each
    /// rooted layer fixation is limited by the drier of soil water and
    /// nitrate inhibition. Seedlings fix in proportion to their progress
    /// towards establishment.
    pub(crate) fn fix_nitrogen(&mut self, ctx: &CohortContext<'_>) {
        let params = ctx.params;
        let fix = &params.n_fix;
        let soil = ctx.soil;
        let nodule_depth = fix[1] * self.root_depth;

        let mut nodules: Vec<f64> = self.roots[RootAge::Effective]
            .iter()
            .take(self.rooted_layers())
            .enumerate()
            .map(|(layer, pool)| {
                let depth = soil.mid_depth(layer);
                let density = if depth < nodule_depth {
                    1.0 - (1.0 - fix[2]) * depth / nodule_depth
                } else {
                    0.0
                };
                density * pool.dm
            })
            .collect();
        let nodule_sum: f64 = nodules.iter().sum();
        if nodule_sum > 0.0 {
            for share in &mut nodules {
                *share /= nodule_sum;
            }
        }

        let propn_fixing = match self.status {
            Status::Seedling => {
                div0(self.establish_index - 1.0, params.seedling[1] - 1.0).clamp(0.0, 1.0)
            }
            Status::Established => 1.0,
            _ => 0.0,
        };

        let nutrients = &ctx.inputs.nutrients;
        let limit: f64 = nodules
            .iter()
            .enumerate()
            .map(|(layer, share)| {
                let water = ramp(ctx.asw(layer), 0.0, fix[3]);
                let nitrate: f64 = nutrients
                    .rel_areas
                    .iter()
                    .enumerate()
                    .map(|(area, rel_area)| {
                        rel_area * ramp(nutrients.nitrate_ppm(area, layer), fix[5], fix[4])
                    })
                    .sum();
                share * water.min(nitrate)
            })
            .sum();

        let info = &mut self.nutrients[Element::N];
        let demand_left = (info.demand.max_total() - info.supplied).max(0.0);
        info.fixed = demand_left * propn_fixing * limit;
        info.supplied += info.fixed;
    }

    /// Uptake from the soil in the rooted layers, per sub-area, capped at
    /// the unmet maximum demand of that sub-area. `share` is this cohort's
    /// fraction of the available soil supply.
    pub(crate) fn uptake_nutrients(&mut self, ctx: &CohortContext<'_>, element: Element, share: f64) {
        let soil = &ctx.inputs.nutrients;
        let layer_count = self.layer_count();
        let rooted = self.rooted_layers();
        let forms: Vec<Nutrient> = Nutrient::ALL
            .into_iter()
            .filter(|form| form.element() == element)
            .collect();

        let info = &mut self.nutrients[element];
        let demand_left = (info.demand.max_total() - info.supplied).max(0.0);
        let mut uptake =
            NutrientTable::from_fn(|_| vec![vec![0.0; layer_count]; soil.rel_areas.len()]);
        let mut uptake_sum = 0.0;
        for (area, rel_area) in soil.rel_areas.iter().enumerate() {
            let area_demand = rel_area * demand_left;
            let mut area_sum = 0.0;
            for &form in &forms {
                if let Some(layers) = uptake[form].get_mut(area) {
                    for (layer, amount) in layers.iter_mut().enumerate().take(rooted) {
                        *amount = share * soil.available(form, area, layer);
                        area_sum += *amount;
                    }
                }
            }
            if area_sum > area_demand {
                let scale = div0(area_demand, area_sum);
                for &form in &forms {
                    if let Some(layers) = uptake[form].get_mut(area) {
                        for amount in layers.iter_mut() {
                            *amount *= scale;
                        }
                    }
                }
                area_sum = area_demand;
            }
            uptake_sum += area_sum;
        }

        info.uptake = uptake;
        info.uptake_sum = uptake_sum;
        info.supplied += uptake_sum;
    }

    /// Move mobile nutrient out of older tissue to meet any critical demand
    /// still unmet.
    ///
    /// Herbage is drawn on from the least digestible class upwards, leaf
    /// before stem. Only the share of a class that is not new tissue is
    /// available. If seed still has a critical demand, effective roots are
    /// drawn on last.
    pub(crate) fn relocate_nutrients(&mut self, ctx: &CohortContext<'_>, element: Element) {
        let params = ctx.params;
        let new_tissue = &params.maturation_for(ctx.stage).new_tissue;
        let bounds = self.class_bounds(ctx);
        let min_root_conc = Self::min_root_conc(ctx, element);
        let relocate = params.nutr_relocate[element];
        let rooted = self.rooted_layers();

        let info = &mut self.nutrients[element];
        let mut demand_left = (info.demand.crit_total() - info.supplied).max(0.0);

        let mut relocated = ShootTable::filled(ClassTable::filled(0.0));
        for class in DmdClass::ALL.into_iter().rev() {
            for part in ShootPart::ALL {
                let (highest, lowest) = bounds[part];
                if class < highest || class > lowest {
                    continue;
                }
                let pool = &self.herbage[part][class];
                let mobile = info.min_shoot_conc[part][class]
                    .mul_add(-pool.dm, pool.nu[element])
                    .max(0.0)
                    * (1.0 - new_tissue[part][class]);
                let amount = demand_left.min(relocate * mobile).max(0.0);
                relocated[part][class] = amount;
                demand_left -= amount;
            }
        }
        info.relocated_sum = shoot_table_sum(&relocated);
        info.relocated = relocated;
        info.supplied += info.relocated_sum;

        if info.demand.crit[Part::Seed] > 0.0 && demand_left > 0.0 {
            let mut from_roots: Vec<f64> = self.roots[RootAge::Effective]
                .iter()
                .enumerate()
                .map(|(layer, pool)| {
                    if layer < rooted {
                        relocate * min_root_conc.mul_add(-pool.dm, pool.nu[element]).max(0.0)
                    } else {
                        0.0
                    }
                })
                .collect();
            let mut root_sum: f64 = from_roots.iter().sum();
            if root_sum > demand_left {
                let scale = demand_left / root_sum;
                for amount in &mut from_roots {
                    *amount *= scale;
                }
                root_sum = demand_left;
            }
            info.relocated_root = from_roots;
            info.relocated_root_sum = root_sum;
            info.supplied += root_sum;
        }
    }

    /// Rain washes mobile nutrient (everything above the minimum
    /// concentration) out of litter.
    pub(crate) fn leach_nutrients(&mut self, ctx: &CohortContext<'_>, element: Element) {
        let rain = ctx.inputs.precipitation;
        if !self.status.is_litter() || rain <= 0.0 {
            return;
        }
        let propn = 1.0 - (-LEACH_RATE * rain).exp();
        for part in ShootPart::ALL {
            for class in DmdClass::ALL {
                let pool = &self.herbage[part][class];
                let min_conc = Self::min_shoot_conc(ctx, element, part, class);
                let mobile = min_conc.mul_add(-pool.dm, pool.nu[element]).max(0.0);
                self.nutrients[element].leached[part][class] = propn * mobile;
            }
        }
    }

    /// Cut demand back to the growth actually achieved and claw back any
    /// supply now in excess of demand. Translocated nutrient is never given
    /// back.
    pub(crate) fn rescale_nutrient_rates(&mut self, ctx: &CohortContext<'_>, element: Element) {
        let params = ctx.params;
        let shortfall = PartTable::from_fn(|part| {
            self.rates.pot_part_growth[part] - self.rates.part_growth[part]
        });

        let info = &mut self.nutrients[element];
        for part in Part::ALL {
            info.demand.max[part] = params
                .max_conc(element, part)
                .mul_add(-shortfall[part], info.demand.max[part])
                .max(0.0);
            info.demand.crit[part] = params
                .crit_conc(element, part)
                .mul_add(-shortfall[part], info.demand.crit[part])
                .max(0.0);
        }

        info.claw_back();
    }

    // -----------------------------------------------------------------------
    // Limits
    // -----------------------------------------------------------------------

    /// Relative growth allowed by the supply of `element`.
    ///
    /// The fraction of critical demand supplied scales net production; the
    /// returned factor scales gross production, so maintenance respiration
    /// is protected.
    pub(crate) fn nutr_limit(&self, ctx: &CohortContext<'_>, element: Element) -> f64 {
        let info = &self.nutrients[element];
        let crit = info.demand.crit_total();
        let npp_scale = if ctx.tracks(element) && crit > 0.0 {
            (info.supplied / crit).clamp(0.0, 1.0)
        } else {
            1.0
        };

        let rates = &self.rates;
        let gross = rates.pot_assim + rates.pot_root_transloc_sum + rates.pot_stem_transloc_sum;
        let maint = rates.maint_resp.sum();
        if npp_scale < 1.0 && gross > maint {
            (1.0 - npp_scale).mul_add(maint / gross, npp_scale)
        } else {
            1.0
        }
    }

    /// Relative stem translocation allowed by the critical seed demand for
    /// `element`.
    pub(crate) fn stem_nutr_limit(&self, ctx: &CohortContext<'_>, element: Element) -> f64 {
        let info = &self.nutrients[element];
        let crit_seed = info.demand.crit[Part::Seed];
        if ctx.tracks(element) && self.rates.pot_stem_transloc_sum > 0.0 && crit_seed > 0.0 {
            (info.supplied / crit_seed).min(1.0)
        } else {
            1.0
        }
    }

    // -----------------------------------------------------------------------
    // Mass balance
    // -----------------------------------------------------------------------

    /// Withdraw today's recycled, relocated and translocated nutrient from
    /// the cohort's pools into the growth supply, and leached nutrient from
    /// litter into the leachate.
    pub(crate) fn update_nutrient_flows(&mut self, ctx: &CohortContext<'_>) -> NutrientFlows {
        let ops = ctx.ops;
        let mut flows = NutrientFlows::default();
        for &element in ops.elements().elements() {
            let info = &self.nutrients[element];
            if self.status.is_green() {
                let mut withdrawn = 0.0;
                for part in ShootPart::ALL {
                    for class in DmdClass::ALL {
                        let mut amount = info.recycled[part][class] + info.relocated[part][class];
                        if part == ShootPart::Stem {
                            amount += info.stem_transloc[class];
                        }
                        withdrawn +=
                            ops.take_nutrient(&mut self.herbage[part][class], element, amount);
                    }
                }
                for (age, layers) in self.roots.iter_mut() {
                    for (layer, pool) in layers.iter_mut().enumerate() {
                        let mut amount = layer_value(&info.root_transloc[age], layer);
                        if age == RootAge::Effective {
                            amount += layer_value(&info.relocated_root, layer);
                        }
                        withdrawn += ops.take_nutrient(pool, element, amount);
                    }
                }
                flows.withdrawn.nu[element] = withdrawn;
                flows.supply.nu[element] = info.fixed + info.uptake_sum + withdrawn;
            } else if self.status.is_litter() {
                for part in ShootPart::ALL {
                    for class in DmdClass::ALL {
                        flows.leachate.nu[element] += ops.take_nutrient(
                            &mut self.herbage[part][class],
                            element,
                            info.leached[part][class],
                        );
                    }
                }
            }
        }
        flows
    }

    /// Share of root net growth each root pool receives.
    pub(crate) fn root_growth_shares(&self) -> AgeTable<Vec<f64>> {
        let growth = self.rates.part_growth[Part::Root];
        let root_dm = self.roots_total().dm;
        let layer_count = self.layer_count();
        AgeTable::from_fn(|age| {
            (0..layer_count)
                .map(|layer| {
                    if growth > 0.0 {
                        match age {
                            RootAge::Effective => layer_value(&self.rates.new_root_distn, layer),
                            RootAge::Old => 0.0,
                        }
                    } else if root_dm > 0.0 {
                        self.root_fraction(age, layer)
                    } else if age == RootAge::Effective && layer == 0 {
                        1.0
                    } else {
                        0.0
                    }
                })
                .collect()
        })
    }

    /// Ration `supply` between parts and spread each part's ration over its
    /// classes or pools the same way its dry matter was spread. New tissue
    /// carries ash alkalinity in proportion to its dry matter.
    pub(crate) fn allocate_nutrient_flows(&mut self, ctx: &CohortContext<'_>, supply: &DmPool) {
        let params = ctx.params;
        let growth = self.rates.part_growth;
        let shoot_shares = ShootTable::from_fn(|part| {
            ClassTable::from_fn(|class| {
                self.shoot_growth_share(params, part, class, growth[part.part()])
            })
        });
        let root_shares = self.root_growth_shares();

        for &element in ctx.ops.elements().elements() {
            let info = &self.nutrients[element];
            let ration = ration_supply(supply.nu[element], &info.demand, info.stem_transloc_supply);
            for part in ShootPart::ALL {
                for class in DmdClass::ALL {
                    self.rates.shoot_growth[part][class].nu[element] =
                        shoot_shares[part][class] * ration[part.part()];
                }
            }
            for (age, layers) in self.rates.root_growth.iter_mut() {
                for (layer, pool) in layers.iter_mut().enumerate() {
                    pool.nu[element] = layer_value(&root_shares[age], layer) * ration[Part::Root];
                }
            }
            self.rates.seed_growth.nu[element] = ration[Part::Seed];
            self.nutrients[element].part_supply = ration;
        }

        if ctx.tracks(Element::N) {
            let ash = &params.ash_alk;
            for (part, classes) in self.rates.shoot_growth.iter_mut() {
                for pool in classes.values_mut() {
                    pool.ash_alk = ash[part.part()] * pool.dm.max(0.0);
                }
            }
            for pool in self
                .rates
                .root_growth
                .values_mut()
                .flat_map(|layers| layers.iter_mut())
            {
                pool.ash_alk = ash[Part::Root] * pool.dm.max(0.0);
            }
            let seed = &mut self.rates.seed_growth;
            seed.ash_alk = ash[Part::Seed] * seed.dm.max(0.0);
        }
    }

    /// Shed nutrient above the maximum concentration from shoots that did
    /// not grow today: nitrogen as gas, phosphorus and sulphur by leaching.
    pub(crate) fn lose_excess_nutrients(&mut self, ctx: &CohortContext<'_>) -> ExcessLoss {
        let mut loss = ExcessLoss::default();
        if !self.status.is_green() {
            return loss;
        }
        for &element in ctx.ops.elements().elements() {
            for part in ShootPart::ALL {
                if self.rates.part_growth[part.part()] > 0.0 {
                    continue;
                }
                for class in DmdClass::ALL {
                    let max_conc = Self::max_shoot_conc(ctx, element, part, class);
                    let pool = &mut self.herbage[part][class];
                    if pool.nu[element] <= 0.0 {
                        continue;
                    }
                    let surplus = max_conc.mul_add(-pool.dm, pool.nu[element]);
                    let lost = ctx.ops.take_nutrient(pool, element, surplus);
                    let info = &mut self.nutrients[element];
                    if element == Element::N {
                        loss.gaseous.nu[element] += lost;
                        info.gaseous_loss += lost;
                    } else {
                        loss.leached.nu[element] += lost;
                        info.leached[part][class] += lost;
                    }
                }
            }
        }
        loss
    }

    /// Hand nutrient stranded in emptied root pools of a senescing perennial
    /// cohort to the established cohort, which received the root dry matter.
    pub(crate) fn transfer_senesced_nutrients(&mut self, ctx: &CohortContext<'_>, target: &mut Self) {
        if ctx.params.annual || self.status != Status::Senescing {
            return;
        }
        for &element in ctx.ops.elements().elements() {
            for (age, layers) in self.roots.iter_mut() {
                for (layer, pool) in layers.iter_mut().enumerate() {
                    if pool.nu[element] <= 0.0 || pool.dm > 0.0 {
                        continue;
                    }
                    if let Some(dest) = target.roots[age].get_mut(layer) {
                        dest.nu[element] += pool.nu[element];
                        pool.nu[element] = 0.0;
                    }
                }
            }
        }
    }

    /// The material that leaves a root pool when `dm` of it dies.
    ///
    /// Dying roots take their proportional share of nutrient, or all of the
    /// nutrient above the maximum concentration if that is more. Ash
    /// alkalinity follows nitrogen.
    pub(crate) fn dead_root_pool(
        &self,
        ctx: &CohortContext<'_>,
        age: RootAge,
        layer: usize,
        dm: f64,
    ) -> DmPool {
        let Some(root) = self.roots[age].get(layer) else {
            return DmPool::ZERO;
        };
        let mut dead = DmPool::with_dm(dm.min(root.dm).max(0.0));
        if root.dm <= 0.0 || dead.dm <= 0.0 {
            return dead;
        }
        for &element in ctx.ops.elements().elements() {
            let share = root.nu[element] * (dead.dm / root.dm).min(1.0);
            let excess = ctx
                .params
                .max_conc(element, Part::Root)
                .mul_add(-root.dm, root.nu[element])
                .max(0.0);
            dead.nu[element] = share.max(excess).min(root.nu[element].max(0.0));
        }
        if ctx.tracks(Element::N) && root.nu[Element::N] > 0.0 {
            dead.ash_alk = root.ash_alk * dead.nu[Element::N] / root.nu[Element::N];
        }
        dead
    }

    /// Ash alkalinity produced by today's growth, spread over layers in
    /// proportion to effective root mass weighted by the soil pH response.
    pub(crate) fn cation_uptake(&self, ctx: &CohortContext<'_>) -> Vec<f64> {
        let params = ctx.params;
        let ash = &params.ash_alk;
        let growth = &self.rates.part_growth;
        let produced = ash[Part::Leaf] * growth[Part::Leaf]
            + ash[Part::Stem] * (growth[Part::Stem] - self.rates.stem_transloc_sum)
            + ash[Part::Root] * (growth[Part::Root] - self.rates.root_transloc_sum)
            + ash[Part::Seed] * growth[Part::Seed];

        let effective = self.root_age_total(RootAge::Effective).dm;
        let fractions: Vec<f64> = self.roots[RootAge::Effective]
            .iter()
            .map(|pool| div0(pool.dm, effective))
            .collect();
        let scaled: Vec<f64> = fractions
            .iter()
            .enumerate()
            .map(|(layer, fraction)| {
                fraction
                    * ramp(
                        layer_value(&ctx.inputs.ph, layer),
                        params.ash_alk_ph[0],
                        params.ash_alk_ph[1],
                    )
            })
            .collect();
        let scaled_sum: f64 = scaled.iter().sum();
        let weights = if scaled_sum > 0.0 {
            scaled.iter().map(|value| value / scaled_sum).collect()
        } else {
            fractions
        };
        weights.iter().map(|weight| produced * weight).collect()
    }

    /// Today's uptake of one soil nutrient form, per sub-area and layer.
    pub fn nutrient_uptake(&self, form: Nutrient) -> &[Vec<f64>] {
        &self.nutrients[form.element()].uptake[form]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::cohort::tests::{Fixture, close, sward};
    use pasture_types::ElementSet;

    fn demand(max: [f64; 4], crit: [f64; 4]) -> PartDemand {
        PartDemand {
            max: PartTable::from_fn(|part| max[part.index()]),
            crit: PartTable::from_fn(|part| crit[part.index()]),
        }
    }

    #[test]
    fn excess_over_critical_demand_is_shared_by_headroom() {
        let demand = demand([5.0, 2.5, 2.5, 0.0], [2.0, 1.0, 1.0, 0.0]);
        let ration = ration_supply(6.0, &demand, 0.0);
        assert!(close(ration[Part::Leaf], 3.0));
        assert!(close(ration[Part::Stem], 1.5));
        assert!(close(ration[Part::Root], 1.5));
        assert!(close(ration[Part::Seed], 0.0));
        assert!(close(ration.sum(), 6.0));
    }

    #[test]
    fn no_part_exceeds_its_maximum_demand() {
        let demand = demand([4.0, 1.0, 2.0, 1.0], [1.0, 0.5, 0.5, 0.5]);
        for supply in [2.5, 5.0, 8.0] {
            let ration = ration_supply(supply, &demand, 0.0);
            assert!(close(ration.sum(), supply));
            for part in Part::ALL {
                assert!(ration[part] <= demand.max[part] + 1e-12, "{part:?} at {supply}");
            }
        }
    }

    #[test]
    fn seed_comes_first_when_supply_is_short() {
        let demand = demand([4.0, 2.0, 2.0, 2.0], [2.0, 1.0, 1.0, 1.0]);
        let ration = ration_supply(3.0, &demand, 0.0);
        assert!(close(ration[Part::Seed], 1.0));
        assert!(close(ration[Part::Leaf], 1.0));
        assert!(close(ration[Part::Stem], 0.5));
        assert!(close(ration[Part::Root], 0.5));
    }

    #[test]
    fn supply_without_demand_returns_to_stem_and_root() {
        let ration = ration_supply(1.0, &PartDemand::default(), 0.3);
        assert!(close(ration[Part::Stem], 0.3));
        assert!(close(ration[Part::Root], 0.7));
        assert!(close(ration_supply(0.0, &PartDemand::default(), 0.3).sum(), 0.0));
    }

    #[test]
    fn demand_of_tissue_at_maximum_concentration_follows_growth() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(ElementSet::N);
        let mut cohort = sward(&ctx);
        cohort.rates.pot_part_growth[Part::Leaf] = 4.0;
        cohort.rates.pot_part_growth[Part::Root] = -1.0;
        cohort.compute_nutrient_demand(&ctx, Element::N);

        let info = &cohort.nutrients[Element::N];
        // Leaf: c1 = 0.05, c2 = 0.025.
        assert!(close(info.demand.max[Part::Leaf], 0.2));
        assert!(close(info.demand.crit[Part::Leaf], 0.1));
        assert!(close(info.demand.max[Part::Root], 0.0));
        assert!(info.demand.crit_total() <= info.demand.max_total());
    }

    #[test]
    fn relocation_only_meets_critical_shortfall() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(ElementSet::N);
        let mut cohort = sward(&ctx);
        cohort.rates.pot_part_growth[Part::Leaf] = 10.0;
        cohort.compute_nutrient_demand(&ctx, Element::N);
        cohort.reset_nutrient_supply(Element::N);
        cohort.relocate_nutrients(&ctx, Element::N);

        let info = &cohort.nutrients[Element::N];
        let crit = info.demand.crit_total();
        assert!(info.relocated_sum > 0.0);
        assert!(info.relocated_sum <= crit + 1e-12);
        assert!(close(info.supplied, info.relocated_sum));
    }

    #[test]
    fn uptake_is_capped_by_demand_and_scaled_by_share() {
        let mut fixture = Fixture::new();
        fixture.inputs.nutrients.supply[Nutrient::No3] = vec![vec![1.0, 1.0, 1.0]];
        let ctx = fixture.ctx(ElementSet::N);
        let mut cohort = sward(&ctx);
        cohort.compute_root_extension(&ctx);
        cohort.rates.pot_part_growth[Part::Leaf] = 10.0;
        cohort.compute_nutrient_demand(&ctx, Element::N);
        cohort.reset_nutrient_supply(Element::N);

        // Max demand is 0.5 g; soil offers far more.
        cohort.uptake_nutrients(&ctx, Element::N, 1.0);
        assert!(close(cohort.nutrients[Element::N].uptake_sum, 0.5));

        cohort.reset_nutrient_supply(Element::N);
        cohort.uptake_nutrients(&ctx, Element::N, 0.1);
        // Roots reach 300 mm, the bottom of the second layer.
        assert_eq!(cohort.rates.max_root_layer, 1);
        assert!(close(cohort.nutrients[Element::N].uptake_sum, 0.2));
        assert!(close(cohort.nutrient_uptake(Nutrient::No3)[0][0], 0.1));
    }

    #[test]
    fn rescaling_gives_back_relocation_before_uptake() {
        let mut info = NutrientInfo::new(3);
        info.demand.max[Part::Leaf] = 1.0;
        info.uptake_sum = 0.8;
        info.uptake[Nutrient::No3] = vec![vec![0.8, 0.0, 0.0]];
        info.relocated_sum = 0.5;
        info.relocated[ShootPart::Leaf][DmdClass::LOWEST] = 0.5;
        info.supplied = 1.3;

        info.claw_back();
        assert!(close(info.supplied, 1.0));
        assert!(close(info.relocated_sum, 0.2));
        assert!(close(info.relocated[ShootPart::Leaf][DmdClass::LOWEST], 0.2));
        assert!(close(info.uptake_sum, 0.8));
    }

    #[test]
    fn clawback_stops_short_of_translocated_nutrient() {
        let mut info = NutrientInfo::new(3);
        info.demand.max[Part::Leaf] = 0.5;
        info.root_transloc_supply = 0.6;
        info.stem_transloc_supply = 0.2;
        info.recycled_sum = 0.3;
        info.recycled[ShootPart::Stem][DmdClass::LOWEST] = 0.3;
        info.fixed = 0.2;
        info.uptake_sum = 0.1;
        info.uptake[Nutrient::No3] = vec![vec![0.1, 0.0, 0.0]];
        info.supplied = 1.4;

        info.claw_back();
        // Uptake, fixation and recycling are all given back; that still
        // leaves 0.3 over demand.
        assert!(close(info.uptake_sum, 0.0));
        assert!(close(info.fixed, 0.0));
        assert!(close(info.recycled_sum, 0.0));
        assert!(close(info.recycled[ShootPart::Stem][DmdClass::LOWEST], 0.0));
        assert!(close(info.root_transloc_supply, 0.6));
        assert!(close(info.stem_transloc_supply, 0.2));
        assert!(close(info.supplied, 0.8));
    }

    #[test]
    fn rescaling_keeps_the_translocation_supply() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(ElementSet::N);
        let mut cohort = sward(&ctx);
        cohort.rates.pot_part_growth[Part::Leaf] = 10.0;
        cohort.rates.part_growth[Part::Leaf] = 2.0;
        let info = &mut cohort.nutrients[Element::N];
        info.demand.max[Part::Leaf] = 0.05;
        info.root_transloc_supply = 0.3;
        info.supplied = 0.3;

        cohort.rescale_nutrient_rates(&ctx, Element::N);
        let info = &cohort.nutrients[Element::N];
        assert!(close(info.demand.max[Part::Leaf], 0.0));
        assert!(close(info.root_transloc_supply, 0.3));
        assert!(close(info.supplied, 0.3));
    }

    #[test]
    fn full_critical_supply_does_not_limit_growth() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(ElementSet::N);
        let mut cohort = sward(&ctx);
        cohort.rates.pot_assim = 10.0;
        cohort.rates.maint_resp[Part::Leaf] = 2.0;
        cohort.nutrients[Element::N].demand.crit[Part::Leaf] = 0.4;

        cohort.nutrients[Element::N].supplied = 0.4;
        assert!(close(cohort.nutr_limit(&ctx, Element::N), 1.0));

        // Half the critical demand: 0.5 + 0.5 * 2 / 10.
        cohort.nutrients[Element::N].supplied = 0.2;
        assert!(close(cohort.nutr_limit(&ctx, Element::N), 0.6));
        // Untracked elements never limit.
        assert!(close(cohort.nutr_limit(&ctx, Element::P), 1.0));
    }

    #[test]
    fn withdrawn_nutrient_leaves_the_cohort_pools() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(ElementSet::N);
        let mut cohort = sward(&ctx);
        cohort.rates.pot_part_growth[Part::Leaf] = 10.0;
        cohort.compute_nutrient_demand(&ctx, Element::N);
        cohort.reset_nutrient_supply(Element::N);
        cohort.relocate_nutrients(&ctx, Element::N);
        let before =
            cohort.herbage_total().nu[Element::N] + cohort.roots_total().nu[Element::N];

        let flows = cohort.update_nutrient_flows(&ctx);
        let after = cohort.herbage_total().nu[Element::N] + cohort.roots_total().nu[Element::N];
        assert!(flows.withdrawn.nu[Element::N] > 0.0);
        assert!(close(before - after, flows.withdrawn.nu[Element::N]));
        assert!(close(flows.supply.nu[Element::N], flows.withdrawn.nu[Element::N]));
    }

    #[test]
    fn rain_leaches_litter_down_to_minimum_concentration() {
        let mut fixture = Fixture::new();
        fixture.inputs.precipitation = 20.0;
        let ctx = fixture.ctx(ElementSet::N);
        let mut litter = sward(&ctx);
        litter.status = Status::Litter1;
        litter.leach_nutrients(&ctx, Element::N);
        let flows = litter.update_nutrient_flows(&ctx);
        let leached = flows.leachate.nu[Element::N];
        assert!(leached > 0.0);
        assert!(flows.supply.nu[Element::N].abs() < 1e-12);

        let class = DmdClass::new(3).unwrap();
        for part in ShootPart::ALL {
            let pool = &litter.herbage[part][class];
            let floor = Cohort::min_shoot_conc(&ctx, Element::N, part, class) * pool.dm;
            assert!(pool.nu[Element::N] >= floor);
        }
    }

    #[test]
    fn dying_roots_take_surplus_nutrient() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(ElementSet::N);
        let mut cohort = sward(&ctx);
        let pool = &mut cohort.roots[RootAge::Effective][0];
        let dm = pool.dm;
        // Double the maximum concentration of 0.02.
        pool.nu[Element::N] = 0.04 * dm;
        pool.ash_alk = 1.0;

        let dead = cohort.dead_root_pool(&ctx, RootAge::Effective, 0, 0.1 * dm);
        assert!(close(dead.nu[Element::N], 0.02 * dm));
        assert!(close(dead.ash_alk, 0.5));
    }
}
