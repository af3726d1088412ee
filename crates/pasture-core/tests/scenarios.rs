//! Worked examples of the core kernels through the public API.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

mod common;

use pasture_core::cohort::{PartDemand, ration_supply};
use pasture_core::seeds::SeedRates;
use pasture_core::{Phenology, SeedBank};
use pasture_ledger::{FluxBudget, PoolOps};
use pasture_types::{
    DevelopStage, DmPool, ElementSet, Hardness, Part, PartTable, Ripeness, RipenessTable, ShootPart,
    ShootTable,
};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn proportional_removal_takes_thirty_percent_of_each_part() {
    let ops = PoolOps::new(ElementSet::None);
    let mut shoots: ShootTable<DmPool> = ShootTable::filled(DmPool::ZERO);
    shoots[ShootPart::Leaf] = DmPool::with_dm(60.0);
    shoots[ShootPart::Stem] = DmPool::with_dm(40.0);

    let mut grazed = DmPool::ZERO;
    for pool in shoots.values_mut() {
        let mut budget = FluxBudget::new();
        let flux = budget.limited_propn(pool, 0.3);
        ops.move_dm(pool, &mut grazed, flux);
    }

    assert!(close(grazed.dm, 30.0));
    assert!(close(shoots[ShootPart::Leaf].dm, 42.0));
    assert!(close(shoots[ShootPart::Stem].dm, 28.0));
}

#[test]
fn rationing_shares_supply_without_seed_demand() {
    let mut demand = PartDemand::default();
    demand.max = PartTable::filled(0.0);
    demand.max[Part::Leaf] = 5.0;
    demand.max[Part::Stem] = 3.0;
    demand.max[Part::Root] = 2.0;
    demand.crit[Part::Leaf] = 2.0;
    demand.crit[Part::Stem] = 1.0;
    demand.crit[Part::Root] = 1.0;
    assert!(close(demand.max_total(), 10.0));
    assert!(close(demand.crit_total(), 4.0));

    let ration = ration_supply(6.0, &demand, 0.0);
    assert!(close(ration.sum(), 6.0));
    assert!(close(ration[Part::Seed], 0.0));
    for part in Part::ALL {
        assert!(ration[part] >= demand.crit[part] - 1e-12);
        assert!(ration[part] <= demand.max[part] + 1e-12);
    }
    // The excess over critical demand follows each part's headroom.
    assert!(close(ration[Part::Leaf], 3.0));
    assert!(close(ration[Part::Stem], 1.0 + 2.0 * 2.0 / 6.0));
    assert!(close(ration[Part::Root], 1.0 + 2.0 / 6.0));
}

#[test]
fn short_supply_is_shared_by_critical_demand() {
    let mut demand = PartDemand::default();
    demand.max[Part::Leaf] = 5.0;
    demand.max[Part::Stem] = 3.0;
    demand.max[Part::Root] = 2.0;
    demand.crit[Part::Leaf] = 2.0;
    demand.crit[Part::Stem] = 1.0;
    demand.crit[Part::Root] = 1.0;
    let ration = ration_supply(2.0, &demand, 0.0);
    assert!(close(ration.sum(), 2.0));
    assert!(close(ration[Part::Leaf], 1.0));
    assert!(close(ration[Part::Stem], 0.5));
    assert!(close(ration[Part::Root], 0.5));
}

#[test]
fn full_setback_clears_vegetative_progress() {
    let params = common::annual_grass();
    let mut phenology = Phenology::new(&params);
    assert_eq!(phenology.stage, DevelopStage::Vegetative);
    phenology.deg_days = 50.0;
    phenology.horizon = [0.2, 0.8];

    phenology.reset_development(&params, 1.0);

    assert!(close(phenology.deg_days, 0.0));
    assert!(close(phenology.horizon[0], 0.0));
    assert!(close(phenology.horizon[1], params.develop[22]));
}

#[test]
fn partial_setback_scales_the_index_down() {
    let params = common::annual_grass();
    let mut phenology = Phenology::new(&params);
    phenology.deg_days = 80.0;
    phenology.reset_development(&params, 0.25);
    assert!(close(phenology.deg_days, 60.0));
}

#[test]
fn a_tenth_of_soft_ripe_seed_germinates() {
    let ops = PoolOps::new(ElementSet::None);
    let mut bank = SeedBank::new(3);
    bank.set_mass(ops, Hardness::Soft, Ripeness::Ripe, 0, 50.0, DevelopStage::Vegetative);

    let mut rates = SeedRates::none(3);
    rates.germinate[0] = 0.1;
    let outcome = bank
        .update(ops, &rates, &RipenessTable::filled(0.0), &DmPool::ZERO)
        .unwrap();

    assert!(close(outcome.germinated.dm, 5.0));
    assert!(close(bank.pool(Hardness::Soft, Ripeness::Ripe, 0).dm, 45.0));
    assert!(close(outcome.eaten.dm, 0.0));
    assert!(outcome.residue.iter().all(|pool| close(pool.dm, 0.0)));
}
