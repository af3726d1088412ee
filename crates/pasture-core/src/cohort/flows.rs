//! Death, fall, decay and digestibility decline.
//!
//! Green cohorts lose shoots to background death, frost and seedling
//! stress, and lose or relocate roots as they age. Dry cohorts decay by
//! microbial respiration; standing dead falls to litter, coarse litter is
//! broken down and fine litter is incorporated into the soil.

use pasture_ledger::math::{div0, q10, ramp, sig};
use pasture_types::constants::FROST_THRESHOLD;
use pasture_types::dmd::CLASS_WIDTH;
use pasture_types::{
    AgeTable, ClassTable, DmPool, DmdClass, GrowthLimit, Part, RootAge, ShootPart,
    ShootTable, Status,
};

use super::{Cohort, CohortContext};

/// Reference temperature of the dry-herbage decay response (deg C).
const DECAY_REF_TEMP: f64 = 20.0;

impl Cohort {
    /// Compute today's loss and decline rates.
    ///
    /// `litter_mass` is the herbage held in both litter cohorts; thick
    /// litter shades itself from the weather.
    pub(crate) fn compute_flow_rates(&mut self, ctx: &CohortContext<'_>, litter_mass: f64) {
        self.rates.shoot_loss = ShootTable::filled(ClassTable::filled(0.0));
        self.rates.dmd_decline = ShootTable::filled(ClassTable::filled(0.0));
        if self.status.is_green() {
            self.compute_green_flows(ctx);
        } else {
            self.compute_decay(ctx, litter_mass);
            self.compute_dry_losses(ctx, litter_mass);
        }
    }

    fn compute_green_flows(&mut self, ctx: &CohortContext<'_>) {
        let params = ctx.params;
        let inputs = ctx.inputs;
        let deg_days = (inputs.mean_temp - params.mature[ShootPart::Leaf][6]).max(0.0);
        let tables = params.maturation_for(ctx.stage);
        let senescing = self.status == Status::Senescing;

        let frost_temp = inputs.min_temp - FROST_THRESHOLD;
        let frost_death = if frost_temp <= 0.0 {
            sig(
                frost_temp,
                params.death[4] - self.frost_factor,
                params.death[5] - self.frost_factor,
            )
        } else {
            0.0
        };

        let seedling_death = if self.status == Status::Seedling {
            let day_stress = 1.0
                - self.limit_factors[GrowthLimit::SoilMoisture]
                    * div0(self.limit_factors[GrowthLimit::Gai], self.proj_area(ctx.extinction));
            self.rates.delta_stress = params.death[9] * (day_stress - self.seedling_stress);
            ramp(self.seedling_stress, params.death[7], params.death[8])
        } else {
            self.rates.delta_stress = 0.0;
            0.0
        };

        for part in ShootPart::ALL {
            let lowest = self.lowest_class(params, part);
            for class in DmdClass::ALL {
                let mut base = tables.base_death[part][class] * deg_days;
                if senescing {
                    base += params.death[3] * deg_days;
                }
                let loss = if class >= lowest || senescing {
                    base + frost_death + seedling_death
                } else {
                    frost_death + seedling_death
                };
                self.rates.shoot_loss[part][class] = loss.min(1.0);
            }
        }

        // Roots
        let root_loss = &params.root_loss;
        self.rates.root_aging = q10(ctx.lagged_temp, root_loss[1], root_loss[4]);
        let dying = q10(ctx.lagged_temp, root_loss[2], root_loss[4]);
        if !params.annual || !senescing {
            if root_loss[1] > 0.0 {
                self.rates.root_reloc = root_loss[3] * dying;
                self.rates.root_loss[RootAge::Effective] = seedling_death;
                self.rates.root_loss[RootAge::Old] = seedling_death + dying - self.rates.root_reloc;
            } else {
                self.rates.root_reloc = 0.0;
                self.rates.root_loss[RootAge::Effective] = seedling_death + dying;
                self.rates.root_loss[RootAge::Old] = 1.0;
            }
        } else {
            let ratio = self.root_to_shoot(params.alloc[1]);
            let eff = if ratio > params.alloc[2] {
                dying.max(1.0 - params.alloc[2] / ratio)
            } else {
                dying
            };
            self.rates.root_reloc = 0.0;
            self.rates.root_loss = AgeTable::filled(eff);
        }

        for part in ShootPart::ALL {
            let classes = DmdClass::range(self.highest_class(params, part), self.lowest_class(params, part));
            for class in classes {
                self.rates.dmd_decline[part][class] =
                    (tables.dmd_rate[part][class] * deg_days).min(CLASS_WIDTH);
            }
        }
    }

    /// Microbial decay of dry herbage. Digestible and indigestible matter
    /// respire at different rates, so the remaining tissue loses
    /// digestibility as it decays.
    fn compute_decay(&mut self, ctx: &CohortContext<'_>, litter_mass: f64) {
        let decay = &ctx.params.decay;
        let temp = ctx.inputs.mean_temp;
        let temp_factor = if temp > 0.0 {
            (decay[2] / (temp + decay[3]) * (temp - DECAY_REF_TEMP)).exp()
        } else {
            0.0
        };
        let thatch = thatch_factor(litter_mass, decay[9]);
        let litter_moisture = sig(ctx.inputs.surface_asw(), decay[6], decay[7]);

        for part in ShootPart::ALL {
            let dead_moisture = (1.0 - decay[4]).mul_add(self.rel_moisture[part], decay[4]);
            let moisture = if self.status == Status::Dead {
                dead_moisture
            } else {
                (1.0 - thatch).mul_add(dead_moisture, thatch * litter_moisture)
            };
            let digestible = decay[1] * temp_factor.min(moisture);
            let indigestible = decay[8] * digestible;
            for class in DmdClass::ALL {
                let dmd = class.dmd();
                let microbe = digestible.mul_add(dmd, indigestible * (1.0 - dmd));
                self.rates.shoot_growth[part][class] =
                    DmPool::with_dm(-microbe * self.herbage[part][class].dm);
                self.rates.dmd_decline[part][class] = if class < DmdClass::LOWEST {
                    (digestible - microbe) * dmd
                } else {
                    0.0
                };
            }
        }
    }

    /// Fall of standing dead, comminution of coarse litter and
    /// incorporation of fine litter.
    fn compute_dry_losses(&mut self, ctx: &CohortContext<'_>, litter_mass: f64) {
        let params = ctx.params;
        let inputs = ctx.inputs;
        let rate = ShootTable::from_fn(|part| match self.status {
            Status::Dead => {
                let fall = &params.fall;
                let rain = if fall[3][part] > 0.0 {
                    1.0 - (-inputs.precipitation / fall[3][part]).exp()
                } else {
                    1.0
                };
                fall[1][part]
                    * fall[4][part].mul_add(inputs.trampling, fall[2][part].mul_add(rain, 1.0))
            }
            Status::Litter1 => {
                let breakdown = &params.breakdown;
                let thatch = thatch_factor(litter_mass, breakdown[5][ShootPart::Leaf]);
                breakdown[1][part]
                    * breakdown[2][ShootPart::Leaf].mul_add(inputs.trampling, thatch)
            }
            Status::Litter2 if inputs.mean_temp >= 0.0 => {
                let breakdown = &params.breakdown;
                let (low, high) = (breakdown[3][ShootPart::Leaf], breakdown[4][ShootPart::Leaf]);
                (high - low).mul_add(ramp(inputs.surface_asw(), 0.0, 1.0), low)
            }
            _ => 0.0,
        });
        for part in ShootPart::ALL {
            self.rates.shoot_loss[part] = ClassTable::filled(rate[part]);
        }
    }

    /// Water balance of standing dead herbage, which sets how fast it
    /// decays. `moisture_change` is the net wetting of the canopy today
    /// (mm) and `pasture_area` the area index of the whole sward.
    pub(crate) fn dead_moisture_balance(
        &mut self,
        ctx: &CohortContext<'_>,
        moisture_change: f64,
        pasture_area: f64,
    ) {
        if self.status != Status::Dead {
            return;
        }
        for part in ShootPart::ALL {
            let max_moisture = ctx.params.decay[5] * 0.001 * self.shoot(part).dm;
            let start = self.dead_moisture[part].min(max_moisture);
            let rate = moisture_change * div0(self.area_index(part), pasture_area);
            let end = (start + rate).min(max_moisture).max(0.0);
            let mean = end - div0((end - start).powi(2), 2.0 * rate);
            self.dead_moisture[part] = end;
            self.rel_moisture[part] = div0(mean, max_moisture);
        }
    }

    /// Change in frost hardening: new growth dilutes it, a frost builds it.
    pub(crate) fn compute_frost_hardening(&mut self, ctx: &CohortContext<'_>) {
        let new_growth = self.rates.part_growth[Part::Leaf] + self.rates.part_growth[Part::Stem];
        let mut delta =
            -self.frost_factor * div0(new_growth, self.herbage_total().dm + new_growth);
        if ctx.inputs.min_temp - FROST_THRESHOLD <= 0.0 {
            delta += ctx.params.death[6];
        }
        self.rates.delta_frost = delta;
    }

    /// Returns `true` when a seedling cohort has accumulated enough
    /// establishment index to become established.
    pub fn establishes_today(&self, params: &crate::params::SpeciesParams) -> bool {
        self.status == Status::Seedling && self.establish_index >= params.seedling[1]
    }
}

/// Fraction of litter exposed to the weather: one below `threshold`
/// g/m^2, shrinking as the layer thickens.
fn thatch_factor(litter_mass: f64, threshold: f64) -> f64 {
    if litter_mass <= threshold {
        1.0
    } else {
        threshold / litter_mass
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::cohort::tests::{Fixture, close, sward};
    use pasture_types::ElementSet;

    #[test]
    fn frost_kills_shoots_only_below_the_threshold() {
        let mut fixture = Fixture::new();
        let class = DmdClass::new(3).unwrap();

        let ctx = fixture.ctx(ElementSet::None);
        let mut cohort = sward(&ctx);
        cohort.compute_flow_rates(&ctx, 0.0);
        let mild = cohort.rates.shoot_loss[ShootPart::Leaf][class];

        fixture.inputs.min_temp = -6.0;
        let ctx = fixture.ctx(ElementSet::None);
        cohort.compute_flow_rates(&ctx, 0.0);
        let frosty = cohort.rates.shoot_loss[ShootPart::Leaf][class];
        assert!(frosty > mild);
        assert!(frosty <= 1.0);
    }

    #[test]
    fn hardening_raises_the_frost_threshold() {
        let mut fixture = Fixture::new();
        fixture.inputs.min_temp = -6.0;
        let ctx = fixture.ctx(ElementSet::None);
        let class = DmdClass::new(3).unwrap();

        let mut soft = sward(&ctx);
        soft.compute_flow_rates(&ctx, 0.0);
        let mut hard = sward(&ctx);
        hard.frost_factor = 5.0;
        hard.compute_flow_rates(&ctx, 0.0);
        assert!(
            hard.rates.shoot_loss[ShootPart::Leaf][class]
                < soft.rates.shoot_loss[ShootPart::Leaf][class]
        );

        hard.compute_frost_hardening(&ctx);
        assert!(close(hard.rates.delta_frost, fixture.params.death[6]));
    }

    #[test]
    fn green_digestibility_never_declines_past_a_class() {
        let mut fixture = Fixture::new();
        fixture.inputs.mean_temp = 40.0;
        let ctx = fixture.ctx(ElementSet::None);
        let mut cohort = sward(&ctx);
        cohort.compute_flow_rates(&ctx, 0.0);
        for part in ShootPart::ALL {
            for class in DmdClass::ALL {
                assert!(cohort.rates.dmd_decline[part][class] <= CLASS_WIDTH);
            }
        }
    }

    #[test]
    fn dead_herbage_falls_faster_in_rain() {
        let mut fixture = Fixture::new();
        let class = DmdClass::new(8).unwrap();
        let mut dead = Cohort::new(Status::Dead, 3);
        dead.herbage[ShootPart::Leaf][class] = DmPool::with_dm(50.0);

        let ctx = fixture.ctx(ElementSet::None);
        dead.compute_flow_rates(&ctx, 0.0);
        let dry_day = dead.rates.shoot_loss[ShootPart::Leaf][class];
        assert!(close(dry_day, fixture.params.fall[1][ShootPart::Leaf]));

        fixture.inputs.precipitation = 20.0;
        let ctx = fixture.ctx(ElementSet::None);
        dead.compute_flow_rates(&ctx, 0.0);
        assert!(dead.rates.shoot_loss[ShootPart::Leaf][class] > dry_day);
    }

    #[test]
    fn decay_removes_digestible_matter_first() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(ElementSet::None);
        let class = DmdClass::new(8).unwrap();
        let mut litter = Cohort::new(Status::Litter1, 3);
        litter.herbage[ShootPart::Leaf][class] = DmPool::with_dm(50.0);
        litter.compute_flow_rates(&ctx, 50.0);

        assert!(litter.rates.shoot_growth[ShootPart::Leaf][class].dm < 0.0);
        assert!(litter.rates.dmd_decline[ShootPart::Leaf][class] > 0.0);
        assert!(litter.rates.dmd_decline[ShootPart::Leaf][DmdClass::LOWEST].abs() < 1e-12);
    }

    #[test]
    fn frozen_soil_stops_incorporation() {
        let mut fixture = Fixture::new();
        fixture.inputs.mean_temp = -1.0;
        let ctx = fixture.ctx(ElementSet::None);
        let mut litter = Cohort::new(Status::Litter2, 3);
        litter.compute_flow_rates(&ctx, 0.0);
        assert!(litter.rates.shoot_loss[ShootPart::Stem][DmdClass::HIGHEST].abs() < 1e-12);
    }

    #[test]
    fn dead_moisture_stays_within_capacity() {
        let mut fixture = Fixture::new();
        fixture.inputs.precipitation = 30.0;
        let ctx = fixture.ctx(ElementSet::None);
        let class = DmdClass::new(8).unwrap();
        let mut dead = Cohort::new(Status::Dead, 3);
        dead.herbage[ShootPart::Leaf][class] = DmPool::with_dm(100.0);
        dead.specific_area[ShootPart::Leaf][class] = 0.01;

        dead.dead_moisture_balance(&ctx, 30.0, 1.0);
        let capacity = fixture.params.decay[5] * 0.1;
        assert!(close(dead.dead_moisture[ShootPart::Leaf], capacity));
        assert!(dead.rel_moisture[ShootPart::Leaf] > 0.0);
        assert!(dead.rel_moisture[ShootPart::Leaf] <= 1.0);

        dead.dead_moisture_balance(&ctx, -30.0, 1.0);
        assert!(dead.dead_moisture[ShootPart::Leaf].abs() < 1e-12);
    }

    #[test]
    fn seedlings_establish_once_their_index_is_reached() {
        let fixture = Fixture::new();
        let mut seedling = Cohort::new(Status::Seedling, 3);
        seedling.establish_index = fixture.params.seedling[1] - 0.1;
        assert!(!seedling.establishes_today(&fixture.params));
        seedling.establish_index = fixture.params.seedling[1];
        assert!(seedling.establishes_today(&fixture.params));
        let established = Cohort::new(Status::Established, 3);
        assert!(!established.establishes_today(&fixture.params));
    }
}
