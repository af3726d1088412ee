//! Shared fixtures for the integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use pasture_core::{ParamSet, Population, SoilLayer, SoilProfile, SpeciesParams};
use pasture_types::{DmdClass, ElementSet, ShootPart, Status};

/// Tag values of an annual grass with a seed bank and no vernalisation
/// requirement.
pub const ANNUAL_GRASS: &[(&str, &str)] = &[
    ("annual", "true"),
    ("grass", "true"),
    ("k-v-3", "2"),
    ("k-v-5", "1000"),
    ("k-v-6", "300"),
    ("k-v-7", "20"),
    ("k-v-8", "1"),
    ("k-v-9", "900"),
    ("k-v-10", "1"),
    ("k-v-15", "0.5"),
    ("k-v-20", "10"),
    ("k-v-21", "600"),
    ("k-v-22", "0.3"),
    ("k-v-23", "0.5"),
    ("k-v-24", "0.3"),
    ("k-v-25", "0.5"),
    ("k-i-1", "0.025"),
    ("k-i-2", "0.008"),
    ("k-i-3", "10"),
    ("k-i-4", "10"),
    ("k-i-5", "0.6"),
    ("k-i-7", "0.6"),
    ("k-i-8", "0.9"),
    ("k-wu-1", "0.5"),
    ("k-wu-2", "0.5"),
    ("k-wu-5", "100"),
    ("k-wu-6", "0.4"),
    ("k-ru-1", "1.6"),
    ("k-ru-2", "1"),
    ("k-ru-3", "0.5"),
    ("k-bt-1", "5"),
    ("k-t-1", "2"),
    ("k-t-2", "12"),
    ("k-w-1", "0.7"),
    ("k-wl-1", "0.85"),
    ("k-wl-2", "10"),
    ("k-mr-1", "0.005"),
    ("k-tl-1", "0.3"),
    ("k-tl-2", "0.02"),
    ("k-tl-3", "0.3"),
    ("k-tl-4", "300"),
    ("k-re-1", "0.5"),
    ("k-re-2", "2"),
    ("k-re-3", "0.3"),
    ("k-re-4", "0.25"),
    ("k-a-1", "0.5"),
    ("k-a-2", "0.2"),
    ("k-a-3", "0.4"),
    ("k-a-4", "0.8"),
    ("k-a-5", "0.5"),
    ("k-r-1", "1000"),
    ("k-r-2", "2"),
    ("k-r-3", "2"),
    ("k-r-4", "0.3"),
    ("k-r-5", "1.75"),
    ("k-r-6", "1.5"),
    ("k-r-7", "1"),
    ("k-r-8", "0.2"),
    ("k-r-9", "50"),
    ("k-d-1", "400"),
    ("k-d-2", "0.001"),
    ("k-d-3", "0.002"),
    ("k-d-4", "-3"),
    ("k-d-5", "-12"),
    ("k-d-6", "1"),
    ("k-d-7", "0.5"),
    ("k-d-8", "1"),
    ("k-d-9", "0.3"),
    ("k-dr-1", "0.01"),
    ("k-dr-2", "0.01"),
    ("k-dr-3", "0.5"),
    ("k-dr-4", "2"),
    ("k-f1-leaf", "0.03"),
    ("k-f1-stem", "0.02"),
    ("k-f2-2", "1"),
    ("k-f2-3", "20"),
    ("k-f2-4", "0.5"),
    ("k-br1-leaf", "0.05"),
    ("k-br1-stem", "0.04"),
    ("k-br2-2", "0.5"),
    ("k-br2-3", "0.01"),
    ("k-br2-4", "0.05"),
    ("k-q-leaf-1", "0.8"),
    ("k-q-leaf-2", "0.5"),
    ("k-q-leaf-3", "0.4"),
    ("k-q-leaf-4", "200"),
    ("k-q-leaf-5", "0.004"),
    ("k-q-leaf-6", "2"),
    ("k-q-stem-1", "0.75"),
    ("k-q-stem-2", "0.45"),
    ("k-q-stem-3", "0.35"),
    ("k-q-stem-5", "0.005"),
    ("k-q-stem-6", "2"),
    ("k-y-1", "0.02"),
    ("k-y-2", "3"),
    ("k-y-3", "20"),
    ("k-y-4", "0.2"),
    ("k-y-5", "2"),
    ("k-y-6", "0.1"),
    ("k-y-7", "0.6"),
    ("k-y-8", "0.2"),
    ("k-s-1", "0"),
    ("k-s-2", "60"),
    ("k-s-3", "0.001"),
    ("k-s-4", "30"),
    ("k-s-5-soft", "0.01"),
    ("k-s-5-hard", "0.001"),
    ("k-g-1", "0.5"),
    ("k-g-2", "2"),
    ("k-g-3", "8"),
    ("k-g-4", "25"),
    ("k-g-5", "35"),
    ("k-g-6", "1"),
    ("k-g-7", "3"),
    ("k-g-8", "0.9"),
    ("k-z-1", "3"),
    ("k-conc-n-leaf-1", "0.05"),
    ("k-conc-n-leaf-2", "0.025"),
    ("k-conc-n-leaf-3", "0.02"),
    ("k-conc-n-leaf-4", "0.012"),
    ("k-conc-n-stem-1", "0.035"),
    ("k-conc-n-stem-2", "0.018"),
    ("k-conc-n-stem-3", "0.014"),
    ("k-conc-n-stem-4", "0.008"),
    ("k-conc-n-root-1", "0.02"),
    ("k-conc-n-root-2", "0.012"),
    ("k-conc-n-seed-1", "0.04"),
    ("k-conc-n-seed-2", "0.03"),
    ("k-reloc-n", "0.1"),
    ("k-aa-1", "0.001"),
    ("k-aa-2", "0.0008"),
    ("k-aa-3", "0.0005"),
    ("k-aa-4", "0.0004"),
    ("k-hr", "1"),
];

pub fn annual_grass() -> SpeciesParams {
    let mut set = ParamSet::new("annual grass");
    set.set_all(ANNUAL_GRASS.iter().copied()).unwrap();
    SpeciesParams::from_params(&set).unwrap()
}

/// Three layers of 100, 200 and 300 mm.
pub fn soil() -> SoilProfile {
    let layer = |thickness| SoilLayer {
        thickness,
        bulk_density: 1.3,
        sand: 0.3,
    };
    SoilProfile::new(vec![layer(100.0), layer(200.0), layer(300.0)]).unwrap()
}

/// An established sward of 60 g leaf and 40 g stem in class 3 with 50 g
/// of roots to 300 mm, over standing dead and litter.
pub fn sward(elements: ElementSet) -> Population {
    let mut population = Population::new(annual_grass(), soil(), elements);
    let green = DmdClass::new(3).unwrap();
    population.set_herbage(Status::Established, ShootPart::Leaf, green, 60.0);
    population.set_herbage(Status::Established, ShootPart::Stem, green, 40.0);
    population.set_roots(Status::Established, 50.0, 300.0);
    let dead = DmdClass::new(8).unwrap();
    population.set_herbage(Status::Dead, ShootPart::Leaf, dead, 20.0);
    population.set_herbage(Status::Dead, ShootPart::Stem, dead, 30.0);
    let litter = DmdClass::new(10).unwrap();
    population.set_herbage(Status::Litter1, ShootPart::Leaf, litter, 15.0);
    population.set_herbage(Status::Litter2, ShootPart::Stem, litter, 10.0);
    population
}
