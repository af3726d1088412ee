//! Root extension, respiration, allocation, translocation and net growth.
//!
//! These run only for green cohorts, in the order the population calls
//! them: extension and specific area first, then respiration and
//! allocation, then (once potential assimilation is known) translocation
//! and potential growth, and finally net growth after nutrient demand has
//! been rationed.

use pasture_ledger::math::{div0, q10, ramp, sig};
use pasture_types::constants::{
    DEFAULT_P_TO_N, DEFAULT_S_TO_N, N_TO_PROTEIN, REF_RADN, VERY_LARGE,
};
use pasture_types::{
    AgeTable, ClassTable, DevelopStage, DmPool, Element, GrowthLimit, LimitTable, Part,
    PartTable, RootAge, ShootPart, ShootTable, Status,
};

use super::{Cohort, CohortContext};
use crate::environment::layer_value;

/// Root extension relative to its unrestricted rate in `layer`.
fn rel_root_extension(ctx: &CohortContext<'_>, layer: usize, asw: f64) -> f64 {
    layer_value(ctx.root_restriction, layer) * ramp(asw, 0.0, ctx.params.root[4])
}

/// Distribution of roots over the profile for a rooting depth of `depth`.
///
/// Root density decays exponentially to 1% at `depth`; each layer's share
/// is scaled by its relative extension under the water content `asw`.
/// The result sums to one. With no roots, everything is in the top layer.
pub(crate) fn root_distribution(ctx: &CohortContext<'_>, depth: f64, asw: &[f64]) -> Vec<f64> {
    let soil = ctx.soil;
    let mut distn = vec![0.0; soil.layer_count()];
    if depth > 0.0 {
        for (layer, share) in distn.iter_mut().enumerate() {
            let upper = 0.01_f64.powf((soil.top(layer) / depth).min(1.0));
            let lower = 0.01_f64.powf((soil.bottom(layer) / depth).min(1.0));
            *share = (upper - lower) * rel_root_extension(ctx, layer, layer_value(asw, layer));
        }
        let sum: f64 = distn.iter().sum();
        if sum > 0.0 {
            for share in &mut distn {
                *share /= sum;
            }
            return distn;
        }
    }
    if let Some(top) = distn.first_mut() {
        *top = 1.0;
    }
    distn
}

/// Nutrient-to-nitrogen ratio assumed when an element is not tracked.
const fn default_ratio(element: Element) -> f64 {
    match element {
        Element::N => 1.0,
        Element::P => DEFAULT_P_TO_N,
        Element::S => DEFAULT_S_TO_N,
    }
}

impl Cohort {
    // -----------------------------------------------------------------------
    // Concentrations
    // -----------------------------------------------------------------------

    /// Nutrient concentration of a shoot part. Untracked elements are
    /// inferred from the crude protein of each class.
    pub(crate) fn shoot_conc(&self, ctx: &CohortContext<'_>, part: ShootPart, element: Element) -> f64 {
        if ctx.tracks(element) {
            return self.shoot(part).concentration(element);
        }
        let protein = div0(
            self.herbage[part]
                .iter()
                .map(|(class, pool)| pool.dm * ctx.params.crude_protein[class])
                .sum(),
            self.shoot(part).dm,
        );
        protein / N_TO_PROTEIN * default_ratio(element)
    }

    /// Nutrient concentration of the roots; the maximum when untracked.
    pub(crate) fn root_conc(&self, ctx: &CohortContext<'_>, element: Element) -> f64 {
        if ctx.tracks(element) {
            self.roots_total().concentration(element)
        } else {
            ctx.params.nutr_conc[1][element][Part::Root]
        }
    }

    // -----------------------------------------------------------------------
    // Roots and specific area
    // -----------------------------------------------------------------------

    /// Daily root extension in each layer down to the deepest rooted one,
    /// capped so the rooting front stops at the maximum depth.
    pub(crate) fn compute_root_extension(&mut self, ctx: &CohortContext<'_>) {
        let layers = self.layer_count();
        self.rates.root_extension = vec![0.0; layers];
        if !self.status.is_green() {
            return;
        }

        let soil = ctx.soil;
        let max_layer = (0..layers)
            .find(|&layer| self.root_depth <= soil.bottom(layer))
            .unwrap_or_else(|| layers.saturating_sub(1));
        let warmth = (ctx.inputs.mean_temp - ctx.params.root[3]).max(0.0);
        let headroom = (ctx.max_root_depth - self.root_depth).max(0.0);
        for (layer, extension) in self
            .rates
            .root_extension
            .iter_mut()
            .enumerate()
            .take(max_layer.saturating_add(1))
        {
            *extension = ctx.params.root[2] * warmth * rel_root_extension(ctx, layer, ctx.asw(layer));
            if layer == max_layer {
                *extension = extension.min(headroom);
            }
        }
        self.rates.max_root_layer = max_layer;
    }

    /// Specific area (m^2/g) of new shoot tissue under today's temperature,
    /// radiation and CO2.
    pub(crate) fn new_specific_area(ctx: &CohortContext<'_>, part: ShootPart) -> f64 {
        let light = &ctx.params.light;
        let reference = match part {
            ShootPart::Leaf => light[1],
            ShootPart::Stem => light[2],
        };
        let radiation = div0(REF_RADN + light[3], ctx.inputs.radiation + light[3]);
        let warmth = (1.0 - light[5]).mul_add(ramp(ctx.inputs.mean_temp, 0.0, light[4]), light[5]);
        reference * ctx.co2_specific_area() * radiation * warmth
    }

    /// Compute today's new-tissue specific areas and give them to any pool
    /// that has none yet.
    pub(crate) fn compute_new_specific_area(&mut self, ctx: &CohortContext<'_>) {
        let new_area = ShootTable::from_fn(|part| Self::new_specific_area(ctx, part));
        self.rates.new_specific_area = new_area;
        if ctx.inputs.radiation > 0.0 {
            self.initialise_specific_areas(&new_area);
        }
    }

    // -----------------------------------------------------------------------
    // Respiration and allocation
    // -----------------------------------------------------------------------

    /// Maintenance respiration rates and amounts per part, and the growth
    /// respiration rate. Rates follow tissue nitrogen and a Q10 temperature
    /// response, slowed during dormancy.
    pub(crate) fn compute_respiration(&mut self, ctx: &CohortContext<'_>) {
        let params = ctx.params;
        let temp_factor = q10(ctx.inputs.mean_temp, 1.0, params.respire[2]);
        let specific = params.respire[1] * temp_factor;
        let mut rate = PartTable::filled(0.0);
        rate[Part::Leaf] = specific * self.shoot_conc(ctx, ShootPart::Leaf, Element::N);
        rate[Part::Stem] = specific * self.shoot_conc(ctx, ShootPart::Stem, Element::N);
        rate[Part::Root] = specific
            * self
                .root_conc(ctx, Element::N)
                .min(params.nutr_conc[1][Element::N][Part::Root]);
        if ctx.stage.is_dormant() {
            for value in rate.values_mut() {
                *value *= params.respire[3];
            }
        }

        let maint = PartTable::from_fn(|part| rate[part] * self.part_dm(part));
        self.rates.maint_resp_rate = rate;
        self.rates.maint_resp = maint;
        self.rates.growth_resp_rate = params.respire[4];
    }

    /// Allocation of assimilate between parts, and of new root growth
    /// between layers.
    ///
    /// The shoot share closes the gap between the current and target
    /// root:shoot ratios. Leaf gets less of the shoot share as the canopy
    /// intercepts less light than its projected area implies.
    pub(crate) fn compute_allocation(&mut self, ctx: &CohortContext<'_>) {
        if !self.status.is_green() {
            return;
        }
        let params = ctx.params;
        let stage = ctx.stage;

        let seed_alloc = if params.has_seeds
            && self.status == Status::Established
            && matches!(stage, DevelopStage::Reproductive | DevelopStage::Senescent)
        {
            params.alloc[3] * ctx.seed_set_propn
        } else {
            0.0
        };

        let ratio = self.root_to_shoot(params.alloc[1]);
        self.r2s_target = if stage == DevelopStage::Senescent
            || (self.status == Status::Senescing
                && self.root_age_total(RootAge::Effective).dm <= 0.0)
        {
            0.0
        } else if stage == DevelopStage::Reproductive {
            (params.alloc[2] - params.alloc[1])
                .mul_add(sig(ctx.deg_days, 0.0, params.develop[6]), params.alloc[1])
        } else {
            params.alloc[1]
        };

        let target_sq = self.r2s_target.powi(2);
        let shoot_alloc = if self.r2s_target > 0.0 {
            div0(ratio, ratio + target_sq)
        } else {
            1.0
        };
        let proj_area = self.proj_area(ctx.extinction);
        let leaf_scale = if proj_area > 0.0 {
            (self.limit_factors[GrowthLimit::Gai] / proj_area).min(1.0)
        } else {
            1.0
        };
        let leaf_to_shoot = (div0(ratio + target_sq, ratio + params.alloc[1].powi(2))
            * leaf_scale
                .mul_add(params.alloc[4], (1.0 - leaf_scale) * params.alloc[5])
                .max(0.0))
        .min(1.0);

        let vegetative = 1.0 - seed_alloc;
        self.allocation[Part::Leaf] = vegetative * shoot_alloc * leaf_to_shoot;
        self.allocation[Part::Stem] = vegetative * shoot_alloc * (1.0 - leaf_to_shoot);
        self.allocation[Part::Root] = vegetative * (1.0 - shoot_alloc);
        self.allocation[Part::Seed] = seed_alloc;

        self.rates.new_root_distn = self.new_root_distribution(ctx);
    }

    /// Split of new effective roots between layers. A layer whose rooting
    /// front will pass its lower boundary today hands part of its share to
    /// the layer below.
    fn new_root_distribution(&self, ctx: &CohortContext<'_>) -> Vec<f64> {
        let soil = ctx.soil;
        let layers = soil.layer_count();
        let sink = root_distribution(ctx, self.root_depth, &ctx.inputs.rel_asw);
        let sink_sum: f64 = sink.iter().sum();

        let next_layer: Vec<f64> = (0..layers)
            .map(|layer| {
                let thickness = soil.thickness(layer);
                let occupied = div0(self.root_depth - soil.top(layer), thickness).clamp(0.0, 1.0);
                let extend = div0(layer_value(&self.rates.root_extension, layer), thickness);
                let advance = extend - (1.0 - occupied);
                if layer < self.rates.max_root_layer && occupied > 0.0 && extend > 0.0 && advance > 1e-8 {
                    (0.5 * (advance.powi(2) - (extend - 1.0).max(0.0).powi(2)) / (occupied * extend))
                        .clamp(0.0, 1.0)
                } else {
                    0.0
                }
            })
            .collect();

        (0..layers)
            .map(|layer| {
                let from_above = layer.checked_sub(1).map_or(0.0, |above| {
                    layer_value(&next_layer, above) * layer_value(&sink, above)
                });
                div0(
                    (1.0 - layer_value(&next_layer, layer)).mul_add(layer_value(&sink, layer), from_above),
                    sink_sum,
                )
            })
            .collect()
    }

    /// Store the cohort's share of potential assimilation and the growth
    /// limits it was computed under.
    pub(crate) fn set_pot_assimilation(&mut self, value: f64, limits: &LimitTable) {
        self.rates.pot_assim = value;
        self.limit_factors = *limits;
    }

    // -----------------------------------------------------------------------
    // Translocation and growth
    // -----------------------------------------------------------------------

    /// Potential translocation out of roots and out of stem into seed.
    ///
    /// Perennial plants draw on root reserves while their root:shoot ratio
    /// exceeds its target and growth is not severely limited. Seeding plants
    /// move a share of the stem reserve to seed over a fixed thermal-time
    /// window after flowering.
    pub(crate) fn compute_pot_translocation(&mut self, ctx: &CohortContext<'_>) {
        let params = ctx.params;
        let limits = &self.limit_factors;
        let limit = limits[GrowthLimit::LowTemperature]
            .min(limits[GrowthLimit::SoilMoisture])
            .min(limits[GrowthLimit::Waterlogging]);
        let herbage = self.herbage_total().dm;
        let ratio = self.root_to_shoot(params.alloc[1]);

        let mut root_rate = 0.0;
        if !params.annual
            && self.status == Status::Established
            && matches!(
                ctx.stage,
                DevelopStage::Vernalizing | DevelopStage::Vegetative | DevelopStage::Reproductive
            )
            && (ratio > self.r2s_target || herbage <= 0.0)
            && limit > params.transloc[1]
        {
            root_rate = params.transloc[2];
            if herbage > 0.0 {
                root_rate = root_rate.min(div0(1.0 - div0(self.r2s_target, ratio), 1.0 + self.r2s_target));
            }
        }
        let root_rate = root_rate.max(0.0);
        let pot_root = AgeTable::from_fn(|age| {
            self.roots[age].iter().map(|pool| root_rate * pool.dm).collect::<Vec<_>>()
        });
        self.rates.pot_root_transloc_sum = pot_root.values().flat_map(|layers| layers.iter()).sum();
        self.rates.pot_root_transloc = pot_root;

        let mut stem_rate = 0.0;
        if params.has_seeds
            && matches!(self.status, Status::Established | Status::Senescing)
            && params.transloc[4] > 0.0
            && matches!(
                ctx.stage,
                DevelopStage::Reproductive | DevelopStage::SprayTopped | DevelopStage::Senescent
            )
            && ctx.deg_days >= params.develop[6]
        {
            let end = params.develop[6] + params.transloc[4];
            let mut today = (ctx.inputs.mean_temp - params.develop[3]).max(0.0);
            if ctx.deg_days + today > end {
                today = (end - ctx.deg_days).max(0.0);
            }
            stem_rate = ctx.seed_set_propn * (today / params.transloc[4]) * self.stem_reserve;
            if ctx.deg_days >= end {
                self.stem_reserve = 0.0;
            }
        }

        let digestible =
            ClassTable::from_fn(|class| self.herbage[ShootPart::Stem][class].dm * class.dmd());
        let digestible_sum = digestible.sum();
        self.rates.pot_stem_transloc = if stem_rate > 0.0 {
            digestible.map(|_, &ddm| ddm.min(div0(ddm, digestible_sum) * stem_rate))
        } else {
            ClassTable::filled(0.0)
        };
        self.rates.pot_stem_transloc_sum = self.rates.pot_stem_transloc.sum();
    }

    /// Potential net growth of each part before nutrient limitation.
    pub(crate) fn compute_pot_net_growth(&mut self) {
        let rates = &self.rates;
        let available = rates.pot_assim + rates.pot_root_transloc_sum - rates.maint_resp.sum();
        let growth_resp = rates.growth_resp_rate;
        let stem_transloc = rates.pot_stem_transloc_sum;
        let allocation = self.allocation;
        self.rates.pot_part_growth = PartTable::from_fn(|part| {
            let mut growth = available * allocation[part];
            if part == Part::Seed {
                growth += stem_transloc;
            }
            if growth > 0.0 {
                growth * (1.0 - growth_resp)
            } else {
                growth
            }
        });
    }

    /// Final assimilation, translocation and net growth of every part and
    /// pool, after nutrient limitation and (when dormant) the meristem
    /// sink limit.
    ///
    /// # Order of operations
    ///
    /// 1. Assimilation is the potential scaled by the tightest nutrient
    ///    limit, capped by the dormant sink.
    /// 2. Maintenance of seed is paid first, from assimilate then root
    ///    translocation.
    /// 3. Remaining leaf, stem and root maintenance is paid pro rata from
    ///    assimilate; leaf and stem deficits then from translocation.
    /// 4. What is left is allocated, and growth respiration is charged on
    ///    positive growth.
    /// 5. Part growth is spread over classes and layers.
    pub(crate) fn compute_net_growth(&mut self, ctx: &CohortContext<'_>) {
        if !self.status.is_green() {
            return;
        }
        let params = ctx.params;
        let growth_resp_rate = self.rates.growth_resp_rate;
        let maint = self.rates.maint_resp;

        // 1. Nutrient and sink limits
        let sink_assim = if ctx.stage.is_dormant() {
            let sink_npp: f64 = ShootPart::ALL
                .into_iter()
                .map(|part| params.meristem[1] * self.shoot(part).dm)
                .sum();
            let shoot_alloc = self.allocation[Part::Leaf] + self.allocation[Part::Stem];
            if shoot_alloc > 0.0 {
                (div0(sink_npp, 1.0 - growth_resp_rate) + maint[Part::Leaf] + maint[Part::Stem])
                    / shoot_alloc
            } else {
                0.0
            }
        } else {
            VERY_LARGE
        };

        let mut limit_nu = 1.0_f64;
        for element in Element::ALL {
            let limit = self.nutr_limit(ctx, element);
            self.set_nutrient_limit(element, limit);
            limit_nu = limit_nu.min(limit);
        }
        self.rates.assimilation = (limit_nu * self.rates.pot_assim).min(sink_assim).max(0.0);
        self.rates.root_transloc = self
            .rates
            .pot_root_transloc
            .map(|_, layers| layers.iter().map(|rate| limit_nu * rate).collect());
        self.rates.root_transloc_sum = self
            .rates
            .root_transloc
            .values()
            .flat_map(|layers| layers.iter())
            .sum();

        let stem_limit = Element::ALL
            .into_iter()
            .map(|element| self.stem_nutr_limit(ctx, element))
            .fold(1.0_f64, f64::min);
        self.rates.stem_transloc = self.rates.pot_stem_transloc.map(|_, &rate| stem_limit * rate);
        self.rates.stem_transloc_sum = self.rates.stem_transloc.sum();

        // 2. Seed maintenance
        let mut growth = maint.map(|_, &resp| -resp);
        growth[Part::Seed] += self.rates.stem_transloc_sum;
        let mut assim_left = self.rates.assimilation;
        let mut trans_left = self.rates.root_transloc_sum;
        for pool in [&mut assim_left, &mut trans_left] {
            let required = (-growth[Part::Seed]).max(0.0);
            growth[Part::Seed] += assign_growth(required, pool);
        }

        // 3. Other maintenance
        let required = (-(growth[Part::Leaf] + growth[Part::Stem] + growth[Part::Root])).max(0.0);
        if required > 0.0 {
            let paid = assign_growth(required, &mut assim_left);
            for part in [Part::Leaf, Part::Stem, Part::Root] {
                growth[part] += (paid / required) * (-growth[part]);
            }
        }
        let required = (-(growth[Part::Leaf] + growth[Part::Stem])).max(0.0);
        if required > 0.0 {
            let paid = assign_growth(required, &mut trans_left);
            for part in [Part::Leaf, Part::Stem] {
                growth[part] += (paid / required) * (-growth[part]);
            }
        }

        // 4. Allocation of what is left
        let mut growth_resp = 0.0;
        for part in Part::ALL {
            if assim_left > 0.0 {
                growth[part] += self.allocation[part] * assim_left;
            }
            if part != Part::Root && trans_left > 0.0 {
                growth[part] +=
                    div0(self.allocation[part], 1.0 - self.allocation[Part::Root]) * trans_left;
            }
            let resp = growth_resp_rate * growth[part].max(0.0);
            growth[part] -= resp;
            growth_resp += resp;
        }
        self.rates.growth_resp = growth_resp;
        self.rates.part_growth = growth;

        // 5. Distribution over classes and layers
        self.distribute_growth(ctx);
    }

    /// Spread each part's net growth over classes (shoots) and pools
    /// (roots). Nutrients are filled in later by the nutrient allocation.
    fn distribute_growth(&mut self, ctx: &CohortContext<'_>) {
        let params = ctx.params;
        let growth = self.rates.part_growth;
        let shoot_growth = ShootTable::from_fn(|part| {
            ClassTable::from_fn(|class| {
                let part_growth = growth[part.part()];
                DmPool::with_dm(part_growth * self.shoot_growth_share(params, part, class, part_growth))
            })
        });

        let root_growth = growth[Part::Root];
        let root_pools = self.root_growth_shares().map(|_, shares| {
            shares
                .iter()
                .map(|share| DmPool::with_dm(root_growth * share))
                .collect::<Vec<_>>()
        });

        self.rates.shoot_growth = shoot_growth;
        self.rates.root_growth = root_pools;
        self.rates.seed_growth = DmPool::with_dm(growth[Part::Seed]);
    }

    // -----------------------------------------------------------------------
    // Stem reserve
    // -----------------------------------------------------------------------

    /// Fix the stem reserve available for translocation to seed at the
    /// start of flowering.
    pub(crate) fn set_stem_reserve(&mut self, params: &crate::params::SpeciesParams) {
        self.stem_reserve = match self.status {
            Status::Seedling | Status::Established => {
                params.transloc[3] * self.shoot(ShootPart::Stem).dm
            }
            _ => 0.0,
        };
    }

    /// Reduce the stem reserve in proportion to the digestible stem removed
    /// from each class.
    pub(crate) fn remove_stem_reserve_by_class(&mut self, removed: &ClassTable<f64>) {
        let removed_ddm: f64 = removed.iter().map(|(class, dm)| class.dmd() * dm).sum();
        let total_ddm: f64 = self.herbage[ShootPart::Stem]
            .iter()
            .map(|(class, pool)| class.dmd() * pool.dm)
            .sum();
        if total_ddm > 0.0 {
            self.stem_reserve *= (1.0 - removed_ddm / total_ddm).max(0.0);
        }
    }

    /// Reduce the stem reserve for `dm` of stem removed evenly across
    /// classes.
    pub(crate) fn remove_stem_reserve(&mut self, dm: f64) {
        let removed =
            ClassTable::from_fn(|class| dm * self.class_fraction(ShootPart::Stem, class));
        self.remove_stem_reserve_by_class(&removed);
    }
}

/// Pay up to `required` out of `remaining`, returning the amount paid.
fn assign_growth(required: f64, remaining: &mut f64) -> f64 {
    let paid = required.max(0.0).min(*remaining).max(0.0);
    *remaining -= paid;
    paid
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::cohort::tests::{Fixture, close, sward};
    use pasture_types::{DmdClass, ElementSet};

    #[test]
    fn root_distribution_sums_to_one_within_rooting_depth() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(ElementSet::None);
        let distn = root_distribution(&ctx, 250.0, &[1.0, 1.0, 1.0]);
        assert!(close(distn.iter().sum::<f64>(), 1.0));
        assert!(distn[0] > distn[1]);
        assert!(distn[2].abs() < 1e-12);

        let bare = root_distribution(&ctx, 0.0, &[1.0, 1.0, 1.0]);
        assert_eq!(bare, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn dry_layers_receive_no_roots() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(ElementSet::None);
        let distn = root_distribution(&ctx, 250.0, &[1.0, 0.0, 1.0]);
        assert!(close(distn[0], 1.0));
        assert!(distn[1].abs() < 1e-12);
    }

    #[test]
    fn extension_stops_at_the_maximum_depth() {
        let mut fixture = Fixture::new();
        fixture.inputs.mean_temp = 20.0;
        let mut ctx = fixture.ctx(ElementSet::None);
        ctx.max_root_depth = 301.0;
        let mut cohort = sward(&ctx);
        cohort.compute_root_extension(&ctx);
        assert_eq!(cohort.rates.max_root_layer, 1);
        // r2 * (T - r3) = 2 * 18 = 36 mm/d in unrestricted layers
        assert!(close(cohort.rates.root_extension[0], 36.0));
        assert!(close(cohort.rates.root_extension[1], 1.0));
        assert!(cohort.rates.root_extension[2].abs() < 1e-12);
    }

    #[test]
    fn allocation_sums_to_one() {
        let fixture = Fixture::new();
        for stage in [DevelopStage::Vegetative, DevelopStage::Reproductive] {
            let mut ctx = fixture.ctx(ElementSet::None);
            ctx.stage = stage;
            ctx.deg_days = 150.0;
            ctx.seed_set_propn = 0.5;
            let mut cohort = sward(&ctx);
            cohort.limit_factors[GrowthLimit::Gai] = 0.4;
            cohort.compute_root_extension(&ctx);
            cohort.compute_allocation(&ctx);
            let total: f64 = cohort.allocation.sum();
            assert!(close(total, 1.0), "{stage:?}: {total}");
            assert!(cohort.allocation.values().all(|share| *share >= 0.0));
            assert!(close(cohort.rates.new_root_distn.iter().sum::<f64>(), 1.0));
        }
    }

    #[test]
    fn seed_only_receives_assimilate_after_flowering() {
        let fixture = Fixture::new();
        let mut ctx = fixture.ctx(ElementSet::None);
        ctx.seed_set_propn = 1.0;
        let mut cohort = sward(&ctx);
        cohort.compute_allocation(&ctx);
        assert!(cohort.allocation[Part::Seed].abs() < 1e-12);

        ctx.stage = DevelopStage::Reproductive;
        cohort.compute_allocation(&ctx);
        assert!(close(cohort.allocation[Part::Seed], fixture.params.alloc[3]));
    }

    #[test]
    fn dormancy_slows_maintenance_respiration() {
        let fixture = Fixture::new();
        let mut ctx = fixture.ctx(ElementSet::N);
        let mut cohort = sward(&ctx);
        cohort.compute_respiration(&ctx);
        let active = cohort.rates.maint_resp.sum();
        assert!(active > 0.0);
        assert!(cohort.rates.maint_resp[Part::Seed].abs() < 1e-12);

        ctx.stage = DevelopStage::Dormant;
        cohort.compute_respiration(&ctx);
        assert!(close(
            cohort.rates.maint_resp.sum(),
            active * fixture.params.respire[3]
        ));
    }

    #[test]
    fn net_growth_without_nutrients_conserves_assimilate() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(ElementSet::None);
        let mut cohort = sward(&ctx);
        cohort.compute_root_extension(&ctx);
        cohort.compute_new_specific_area(&ctx);
        cohort.compute_respiration(&ctx);
        cohort.compute_allocation(&ctx);
        cohort.set_pot_assimilation(10.0, &LimitTable::filled(1.0));
        cohort.compute_pot_translocation(&ctx);
        cohort.compute_pot_net_growth();
        cohort.compute_net_growth(&ctx);

        let maint = cohort.rates.maint_resp.sum();
        let net = cohort.rates.part_growth.sum();
        let respired = maint + cohort.rates.growth_resp;
        assert!(close(net, cohort.rates.assimilation - respired));

        let shoot: f64 = ShootPart::ALL
            .into_iter()
            .flat_map(|part| cohort.rates.shoot_growth[part].values().map(|p| p.dm).collect::<Vec<_>>())
            .sum();
        let roots: f64 = cohort
            .rates
            .root_growth
            .values()
            .flat_map(|layers| layers.iter().map(|p| p.dm))
            .sum();
        assert!(close(shoot + roots + cohort.rates.seed_growth.dm, net));
    }

    #[test]
    fn new_shoot_tissue_straddles_its_entry_boundary() {
        let fixture = Fixture::new();
        let cohort = Cohort::new(Status::Established, 3);
        let class1 = DmdClass::new(1).unwrap();
        let class2 = DmdClass::new(2).unwrap();
        let leaf1 = cohort.new_shoot_fraction(&fixture.params, ShootPart::Leaf, class1);
        let leaf2 = cohort.new_shoot_fraction(&fixture.params, ShootPart::Leaf, class2);
        // Leaf enters at 0.80, on the boundary of classes 1 and 2.
        assert!(close(leaf1, 0.5));
        assert!(close(leaf2, 0.5));

        let total: f64 = DmdClass::ALL
            .into_iter()
            .map(|class| cohort.new_shoot_fraction(&fixture.params, ShootPart::Stem, class))
            .sum();
        assert!(close(total, 1.0));
    }

    #[test]
    fn grazing_stem_shrinks_the_reserve() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(ElementSet::None);
        let mut cohort = sward(&ctx);
        cohort.set_stem_reserve(&fixture.params);
        assert!(close(cohort.stem_reserve, 0.3 * 40.0));
        cohort.remove_stem_reserve(10.0);
        assert!(close(cohort.stem_reserve, 0.3 * 40.0 * 0.75));
    }
}
