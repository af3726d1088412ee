//! Typed species parameters derived from a [`ParamSet`].
//!
//! Parameter families are stored as arrays indexed by the tag number, so
//! `develop[6]` is the value of `k-v-6`. Slot 0 of every array is unused.
//! Unassigned optional tags read as zero; the tags in [`REQUIRED_TAGS`]
//! must be assigned.

use serde::{Deserialize, Serialize};

use pasture_types::dmd::CLASS_WIDTH;
use pasture_types::{
    ClassTable, DevelopStage, DmdClass, Element, ElementTable, HardnessTable, Part, PartTable,
    ReproTrigger, ShootPart, ShootTable,
};

use super::tags::ParamSet;
use crate::error::ParamError;

/// Tags without which a species cannot be simulated.
pub const REQUIRED_TAGS: [&str; 20] = [
    "k-v-3",
    "k-i-1",
    "k-i-2",
    "k-i-7",
    "k-i-8",
    "k-ru-1",
    "k-re-1",
    "k-re-2",
    "k-a-1",
    "k-a-4",
    "k-r-1",
    "k-r-2",
    "k-q-leaf-1",
    "k-q-leaf-2",
    "k-q-leaf-3",
    "k-q-leaf-5",
    "k-q-stem-1",
    "k-q-stem-2",
    "k-q-stem-3",
    "k-q-stem-5",
];

/// Thermal time standing in for "never" in the maturation tables.
const NEVER_DEG_DAYS: f64 = 9.9e9;

/// Lower DMD margin below which a class is never reached by maturation.
const MATURITY_EPS: f64 = 1.0e-6;

/// A pair of values for the vegetative and reproductive stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StagePair<T> {
    /// Value outside the reproductive stage.
    pub vegetative: T,
    /// Value during the reproductive stage.
    pub reproductive: T,
}

impl<T> StagePair<T> {
    /// The value that applies during `stage`.
    pub const fn for_stage(&self, stage: DevelopStage) -> &T {
        match stage {
            DevelopStage::Reproductive => &self.reproductive,
            _ => &self.vegetative,
        }
    }
}

/// Per-class rates derived from the maturation parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MaturationTables {
    /// Background death rate per degree-day.
    pub base_death: ShootTable<ClassTable<f64>>,
    /// Rate of digestibility decline per degree-day.
    pub dmd_rate: ShootTable<ClassTable<f64>>,
    /// Proportion of each class that counts as new tissue when computing
    /// nutrient demand.
    pub new_tissue: ShootTable<ClassTable<f64>>,
}

/// The complete, derived parameter set for one pasture species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesParams {
    /// Species name.
    pub name: String,
    /// Grass (as opposed to forb or legume).
    pub grass: bool,
    /// Nitrogen-fixing legume.
    pub legume: bool,
    /// Annual life cycle.
    pub annual: bool,
    /// C4 photosynthetic pathway.
    pub is_c4: bool,
    /// Reproduction requires increasing day length.
    pub long_day: bool,
    /// Reproduction requires decreasing day length.
    pub short_day: bool,

    /// The species maintains a seed bank.
    pub has_seeds: bool,
    /// The species must vernalise before vegetative growth.
    pub vern_reqd: bool,
    /// The species enters summer dormancy.
    pub summer_dormant: bool,
    /// The species enters winter dormancy.
    pub winter_dormant: bool,
    /// Defoliation can set back phenology.
    pub has_setback: bool,
    /// What ends the vegetative stage.
    pub repro_trigger: ReproTrigger,

    /// Development, `k-v-*`.
    pub develop: [f64; 31],
    /// Light interception and specific area, `k-i-*`.
    pub light: [f64; 11],
    /// Water use, `k-wu-*`.
    pub water_use: [f64; 7],
    /// Radiation use, `k-ru-*`.
    pub radn_use: [f64; 7],
    /// Transpiration efficiency, `k-bt-*`.
    pub transp_eff: [f64; 3],
    /// Low-temperature limit, `k-t-*`.
    pub low_temp: [f64; 3],
    /// Soil-moisture limit, `k-w-1`.
    pub water: [f64; 2],
    /// Waterlogging limit, `k-wl-*`.
    pub water_log: [f64; 3],
    /// Meristem limit during dormancy, `k-mr-1`.
    pub meristem: [f64; 2],
    /// Translocation, `k-tl-*`.
    pub transloc: [f64; 5],
    /// Respiration, `k-re-*`.
    pub respire: [f64; 5],
    /// Allocation, `k-a-*`.
    pub alloc: [f64; 6],
    /// Root growth, `k-r-*`.
    pub root: [f64; 11],
    /// Shoot death, `k-d-*`.
    pub death: [f64; 10],
    /// Root loss, `k-dr-*`.
    pub root_loss: [f64; 5],
    /// Fall of standing dead, `k-f1-*` and `k-f2-*`.
    pub fall: [ShootTable<f64>; 5],
    /// Litter breakdown, `k-br1-*` and `k-br2-*`.
    pub breakdown: [ShootTable<f64>; 6],
    /// Maturation, `k-q-{part}-*`.
    pub mature: ShootTable<[f64; 7]>,
    /// Decay of dry herbage, `k-y-*`.
    pub decay: [f64; 10],
    /// Seed bank, `k-s-1..4`.
    pub seed: [f64; 5],
    /// Seed death rate in wet soil, `k-s-5-*`.
    pub seed_death: HardnessTable<f64>,
    /// Germination, `k-g-*`.
    pub germination: [f64; 9],
    /// Establishment index threshold, `k-z-1`.
    pub seedling: [f64; 2],
    /// Nutrient concentrations, `k-conc-{elem}-{part}-1..4`.
    pub nutr_conc: [ElementTable<PartTable<f64>>; 5],
    /// CO2 response of nutrient concentration, `k-conc-{elem}-{part}-5`.
    pub nutr_co2: ElementTable<PartTable<f64>>,
    /// Nitrogen fixation, `k-fix-*`.
    pub n_fix: [f64; 6],
    /// Relocatable fraction of tissue nutrient, `k-reloc-*`.
    pub nutr_relocate: ElementTable<f64>,
    /// Ash alkalinity of new tissue, `k-aa-1..4`.
    pub ash_alk: PartTable<f64>,
    /// Soil pH ramp weighting cation uptake by layer, `k-aa-5` and `k-aa-6`.
    pub ash_alk_ph: [f64; 2],
    /// Crude protein content by digestibility class, `k-cp-*`.
    pub crude_protein: ClassTable<f64>,
    /// Height to herbage mass ratio, `k-hr`.
    pub height_ratio: f64,
    /// Rates derived from the maturation parameters.
    pub maturation: StagePair<MaturationTables>,
}

fn numbered<const N: usize>(set: &ParamSet, family: &str) -> Result<[f64; N], ParamError> {
    let mut values = [0.0; N];
    for (idx, slot) in values.iter_mut().enumerate().skip(1) {
        *slot = set.real_or(&format!("k-{family}-{idx}"), 0.0)?;
    }
    Ok(values)
}

fn shoot_name(part: ShootPart) -> &'static str {
    match part {
        ShootPart::Leaf => "leaf",
        ShootPart::Stem => "stem",
    }
}

fn part_name(part: Part) -> &'static str {
    match part {
        Part::Leaf => "leaf",
        Part::Stem => "stem",
        Part::Root => "root",
        Part::Seed => "seed",
    }
}

fn element_name(element: Element) -> &'static str {
    match element {
        Element::N => "n",
        Element::P => "p",
        Element::S => "s",
    }
}

/// Per-part values `k-{family}-leaf` and `k-{family}-stem`.
fn per_shoot(set: &ParamSet, family: &str) -> Result<ShootTable<f64>, ParamError> {
    let mut table = ShootTable::filled(0.0);
    for part in ShootPart::ALL {
        table[part] = set.real_or(&format!("k-{family}-{}", shoot_name(part)), 0.0)?;
    }
    Ok(table)
}

/// Shared values `k-{family}-{first..N-1}` applied to both shoot parts.
fn shared_shoot<const N: usize>(
    set: &ParamSet,
    family: &str,
    first: usize,
) -> Result<[ShootTable<f64>; N], ParamError> {
    let mut values = [ShootTable::filled(0.0); N];
    for (idx, slot) in values.iter_mut().enumerate().skip(first) {
        *slot = ShootTable::filled(set.real_or(&format!("k-{family}-{idx}"), 0.0)?);
    }
    Ok(values)
}

/// Build the maturation tables for one stage and shoot part.
///
/// `low_dmd` is the digestibility that tissue approaches with age;
/// `onset` is the thermal time before decline starts (leaf value for
/// both parts when deciding new tissue).
fn maturation_for_part(
    mature: &[f64; 7],
    low_dmd: f64,
    leaf_onset: f64,
    death: &[f64; 10],
) -> (ClassTable<f64>, ClassTable<f64>, ClassTable<f64>) {
    let high_dmd = mature[1];
    let onset = mature[4];
    let rate = mature[5];
    let death_dmd = (high_dmd - low_dmd).mul_add((-rate * death[1]).exp(), low_dmd);

    let mut base_death = ClassTable::filled(0.0);
    let mut dmd_rate = ClassTable::filled(0.0);
    let mut new_tissue = ClassTable::filled(0.0);

    let mut prev_cumulative = 0.0;
    for class in DmdClass::ALL {
        let upper = class.upper_limit();
        let lower = class.lower_limit();
        base_death[class] = death[2] * ((death_dmd - lower) / (upper - lower)).clamp(0.0, 1.0);

        // Thermal time from emergence until tissue falls below this class.
        let cumulative = if lower >= high_dmd {
            0.0
        } else if lower < low_dmd + MATURITY_EPS || rate <= 0.0 {
            NEVER_DEG_DAYS
        } else {
            onset - ((lower - low_dmd) / (high_dmd - low_dmd)).ln() / rate
        };

        new_tissue[class] = if cumulative == 0.0 || prev_cumulative >= leaf_onset {
            0.0
        } else if cumulative <= leaf_onset {
            1.0
        } else {
            (leaf_onset - prev_cumulative) / (cumulative - prev_cumulative)
        };

        let residence = if cumulative < NEVER_DEG_DAYS {
            cumulative - prev_cumulative
        } else {
            cumulative
        };
        dmd_rate[class] = if residence == 0.0 {
            1.0
        } else if residence < NEVER_DEG_DAYS {
            CLASS_WIDTH / residence
        } else {
            0.0
        };
        prev_cumulative = cumulative;
    }
    (base_death, dmd_rate, new_tissue)
}

fn maturation_tables(
    mature: &ShootTable<[f64; 7]>,
    death: &[f64; 10],
    reproductive: bool,
) -> MaturationTables {
    let mut tables = MaturationTables::default();
    let leaf_onset = mature[ShootPart::Leaf][4];
    for part in ShootPart::ALL {
        let low_dmd = if reproductive {
            mature[part][3]
        } else {
            mature[part][2]
        };
        let (base_death, dmd_rate, new_tissue) =
            maturation_for_part(&mature[part], low_dmd, leaf_onset, death);
        tables.base_death[part] = base_death;
        tables.dmd_rate[part] = dmd_rate;
        tables.new_tissue[part] = new_tissue;
    }
    tables
}

impl SpeciesParams {
    /// Derive the typed parameter set from a tag store.
    ///
    /// # Order of operations
    ///
    /// 1. Check that every required tag is assigned
    /// 2. Read flags and numbered families
    /// 3. Derive life-history switches from which tags are defined
    /// 4. Apply defaults for optional dry-herbage and thatch parameters
    /// 5. Build the per-stage maturation tables
    pub fn from_params(set: &ParamSet) -> Result<Self, ParamError> {
        // 1. Required tags
        for tag in REQUIRED_TAGS {
            set.real(tag)?;
        }

        // 2. Flags and families
        let annual = set.flag("annual")?;
        let mut develop: [f64; 31] = numbered(set, "v")?;
        let mut light: [f64; 11] = numbered(set, "i")?;
        let mut breakdown: [ShootTable<f64>; 6] = shared_shoot(set, "br2", 2)?;
        breakdown[1] = per_shoot(set, "br1")?;
        let mut fall: [ShootTable<f64>; 5] = shared_shoot(set, "f2", 2)?;
        fall[1] = per_shoot(set, "f1")?;
        let mut decay: [f64; 10] = numbered(set, "y")?;

        let mut mature = ShootTable::filled([0.0; 7]);
        for part in ShootPart::ALL {
            for (idx, slot) in mature[part].iter_mut().enumerate().skip(1) {
                *slot = set.real_or(&format!("k-q-{}-{idx}", shoot_name(part)), 0.0)?;
            }
        }

        let mut nutr_conc = [ElementTable::filled(PartTable::filled(0.0)); 5];
        let mut nutr_co2 = ElementTable::filled(PartTable::filled(0.0));
        for element in Element::ALL {
            for part in Part::ALL {
                let prefix = format!("k-conc-{}-{}", element_name(element), part_name(part));
                for (idx, table) in nutr_conc.iter_mut().enumerate().skip(1) {
                    table[element][part] = set.real_or(&format!("{prefix}-{idx}"), 0.0)?;
                }
                nutr_co2[element][part] = set.real_or(&format!("{prefix}-5"), 0.0)?;
            }
        }

        let mut nutr_relocate = ElementTable::filled(0.0);
        for element in Element::ALL {
            nutr_relocate[element] =
                set.real_or(&format!("k-reloc-{}", element_name(element)), 0.0)?;
        }

        let aa: [f64; 7] = numbered(set, "aa")?;
        let ash_alk = PartTable::from_fn(|part| match part {
            Part::Leaf => aa[1],
            Part::Stem => aa[2],
            Part::Root => aa[3],
            Part::Seed => aa[4],
        });

        let cp: [f64; 13] = numbered(set, "cp")?;
        let crude_protein = ClassTable::from_fn(|class: DmdClass| {
            cp.get(usize::from(class.number())).copied().unwrap_or(0.0)
        });

        // 3. Life-history switches
        let repro_trigger = if set.is_defined("k-v-4") {
            if develop[4] >= 0.0 {
                ReproTrigger::LongDay
            } else {
                ReproTrigger::ShortDay
            }
        } else {
            ReproTrigger::DegreeDays
        };
        if !set.is_defined("k-v-9") {
            develop[9] = 9.0e99;
            develop[21] = 9.9e99;
        } else if !set.is_defined("k-v-21") {
            develop[21] = 9.9e99;
        }

        // 4. Defaults
        if !set.is_defined("k-i-9") {
            light[9] = 0.5;
        }
        if !set.is_defined("k-i-10") {
            light[10] = 0.5;
        }
        if !set.is_defined("k-br2-5") {
            breakdown[5][ShootPart::Leaf] = 100.0;
        }
        if !set.is_defined("k-y-9") {
            decay[9] = 200.0;
        }
        mature[ShootPart::Stem][4] = 0.0;

        // 5. Maturation tables
        let death: [f64; 10] = numbered(set, "d")?;
        let maturation = StagePair {
            vegetative: maturation_tables(&mature, &death, false),
            reproductive: maturation_tables(&mature, &death, true),
        };

        Ok(Self {
            name: set.name.clone(),
            grass: set.flag("grass")?,
            legume: set.flag("legume")?,
            annual,
            is_c4: set.flag("isc4")?,
            long_day: set.flag("longday")?,
            short_day: set.flag("shortday")?,
            has_seeds: annual || set.is_defined("k-s-1"),
            vern_reqd: set.is_defined("k-v-1"),
            summer_dormant: set.is_defined("k-v-11"),
            winter_dormant: set.is_defined("k-v-26"),
            has_setback: set.is_defined("k-v-22"),
            repro_trigger,
            develop,
            light,
            water_use: numbered(set, "wu")?,
            radn_use: numbered(set, "ru")?,
            transp_eff: numbered(set, "bt")?,
            low_temp: numbered(set, "t")?,
            water: numbered(set, "w")?,
            water_log: numbered(set, "wl")?,
            meristem: numbered(set, "mr")?,
            transloc: numbered(set, "tl")?,
            respire: numbered(set, "re")?,
            alloc: numbered(set, "a")?,
            root: numbered(set, "r")?,
            death,
            root_loss: numbered(set, "dr")?,
            fall,
            breakdown,
            mature,
            decay,
            seed: numbered(set, "s")?,
            seed_death: HardnessTable::from_fn(|hardness| {
                let name = match hardness {
                    pasture_types::Hardness::Soft => "k-s-5-soft",
                    pasture_types::Hardness::Hard => "k-s-5-hard",
                };
                set.real_or(name, 0.0).unwrap_or(0.0)
            }),
            germination: numbered(set, "g")?,
            seedling: numbered(set, "z")?,
            nutr_conc,
            nutr_co2,
            n_fix: numbered(set, "fix")?,
            nutr_relocate,
            ash_alk,
            ash_alk_ph: [aa[5], aa[6]],
            crude_protein,
            height_ratio: set.real_or("k-hr", 1.0)?,
            maturation,
        })
    }

    /// The maturation tables that apply during `stage`.
    pub const fn maturation_for(&self, stage: DevelopStage) -> &MaturationTables {
        self.maturation.for_stage(stage)
    }

    /// Maximum nutrient concentration parameter of a part.
    pub fn max_conc(&self, element: Element, part: Part) -> f64 {
        self.nutr_conc[1][element][part]
    }

    /// Critical nutrient concentration parameter of a part.
    pub fn crit_conc(&self, element: Element, part: Part) -> f64 {
        self.nutr_conc[2][element][part]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// A complete annual grass used by tests across the crate.
    pub(crate) fn annual_grass() -> ParamSet {
        let mut set = ParamSet::new("annual grass");
        let entries = [
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
        set.set_all(entries).unwrap();
        set
    }

    #[test]
    fn derives_life_history_switches() {
        let params = SpeciesParams::from_params(&annual_grass()).unwrap();
        assert!(params.has_seeds);
        assert!(!params.vern_reqd);
        assert!(!params.summer_dormant);
        assert!(params.has_setback);
        assert_eq!(params.repro_trigger, ReproTrigger::DegreeDays);
        assert!((params.light[9] - 0.5).abs() < 1e-12);
        assert!((params.decay[9] - 200.0).abs() < 1e-12);
        assert!((params.breakdown[5][ShootPart::Leaf] - 100.0).abs() < 1e-12);
        assert!((params.fall[3][ShootPart::Stem] - 20.0).abs() < 1e-12);
    }

    #[test]
    fn day_length_trigger_follows_sign_of_k_v_4() {
        let mut set = annual_grass();
        set.set_real("k-v-4", -11.5).unwrap();
        let params = SpeciesParams::from_params(&set).unwrap();
        assert_eq!(params.repro_trigger, ReproTrigger::ShortDay);
        set.set_real("k-v-4", 13.0).unwrap();
        let params = SpeciesParams::from_params(&set).unwrap();
        assert_eq!(params.repro_trigger, ReproTrigger::LongDay);
    }

    #[test]
    fn missing_required_tag_is_reported() {
        let mut set = ParamSet::new("bare");
        set.set_real("k-v-3", 2.0).unwrap();
        let err = SpeciesParams::from_params(&set).unwrap_err();
        assert!(matches!(err, ParamError::UndefinedValue { .. }));
    }

    #[test]
    fn maturation_tables_are_bounded() {
        let params = SpeciesParams::from_params(&annual_grass()).unwrap();
        for stage in [DevelopStage::Vegetative, DevelopStage::Reproductive] {
            let tables = params.maturation_for(stage);
            for part in ShootPart::ALL {
                for class in DmdClass::ALL {
                    let propn = tables.new_tissue[part][class];
                    assert!((0.0..=1.0).contains(&propn));
                    assert!(tables.dmd_rate[part][class] >= 0.0);
                    assert!(tables.base_death[part][class] <= params.death[2] + 1e-12);
                }
            }
        }
    }

    #[test]
    fn young_classes_decline_faster_than_classes_near_the_floor() {
        let params = SpeciesParams::from_params(&annual_grass()).unwrap();
        let rates = params.maturation_for(DevelopStage::Vegetative).dmd_rate[ShootPart::Leaf];
        let class3 = DmdClass::new(3).unwrap();
        let class6 = DmdClass::new(6).unwrap();
        assert!(rates[class3] > rates[class6]);
        // Leaf never falls below its vegetative floor of 0.5.
        assert!(rates[DmdClass::new(7).unwrap()].abs() < 1e-12);
    }
}
