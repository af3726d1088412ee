//! Configuration loading and typed config structures for a pasture run.
//!
//! The canonical configuration lives in `pasture-config.yaml` at the project
//! root. Every section has defaults, so an empty file describes a bare
//! three-layer soil with no plants and no species parameters; a usable run
//! needs at least the `species` section.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use pasture_types::{DevelopStage, DmdClass, ElementSet, Hardness, Ripeness, ShootPart, Status};

use crate::environment::{SoilLayer, SoilProfile};
use crate::error::ConfigError;
use crate::params::{ParamSet, SpeciesParams};
use crate::phenology::encode_phenology;
use crate::population::Population;

/// Top-level run configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PastureConfig {
    /// Species name and parameters.
    #[serde(default)]
    pub species: SpeciesConfig,

    /// Soil layers.
    #[serde(default)]
    pub soil: SoilConfig,

    /// Nutrient elements tracked alongside dry matter.
    #[serde(default)]
    pub elements: ElementSet,

    /// Starting state of the population.
    #[serde(default)]
    pub initial: InitialConfig,

    /// Length of the run and its weather.
    #[serde(default)]
    pub run: RunConfig,

    /// Scheduled management events.
    #[serde(default)]
    pub management: Vec<ManagementEvent>,
}

impl PastureConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// The species parameters as a tag store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Param`] for an unknown tag or a value of the
    /// wrong kind.
    pub fn param_set(&self) -> Result<ParamSet, ConfigError> {
        let mut set = ParamSet::new(self.species.name.clone());
        for (tag, literal) in &self.species.params {
            match literal {
                ParamLiteral::Flag(value) => set.set_flag(tag, *value)?,
                ParamLiteral::Number(value) => set.set_real(tag, *value)?,
                ParamLiteral::Text(text) => set.set_text(tag, text)?,
            }
        }
        Ok(set)
    }

    /// Build the soil profile.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Population`] if the layers are unusable.
    pub fn soil_profile(&self) -> Result<SoilProfile, ConfigError> {
        let layers = self
            .soil
            .layers
            .iter()
            .map(|layer| SoilLayer {
                thickness: layer.thickness,
                bulk_density: layer.bulk_density,
                sand: layer.sand,
            })
            .collect();
        Ok(SoilProfile::new(layers)?)
    }

    /// Build the population in its configured starting state.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the species parameters, soil or initial
    /// state are invalid.
    pub fn build_population(&self) -> Result<Population, ConfigError> {
        let params = SpeciesParams::from_params(&self.param_set()?)?;
        let soil = self.soil_profile()?;
        let mut population = Population::new(params, soil, self.elements);
        if let Some(depth) = self.soil.max_root_depth {
            population = population.with_max_root_depth(depth);
        }

        let initial = &self.initial;
        if let Some(code) = initial.phenology_code {
            population.set_phenology_code(code);
        } else if let Some(stage) = initial.stage {
            population.set_phenology_code(encode_phenology(stage, 0.0));
        }
        for entry in &initial.herbage {
            let class = DmdClass::new(entry.class).ok_or_else(|| ConfigError::Invalid {
                reason: format!("digestibility class {} is out of range", entry.class),
            })?;
            population.set_herbage(entry.status, entry.part, class, entry.dm);
        }
        for entry in &initial.roots {
            if !entry.status.is_green() {
                return Err(ConfigError::Invalid {
                    reason: format!("roots cannot be given to {} herbage", entry.status),
                });
            }
            population.set_roots(entry.status, entry.dm, entry.depth);
        }
        for entry in &initial.seed {
            if entry.layer >= population.layer_count() {
                return Err(ConfigError::Invalid {
                    reason: format!("seed layer {} is below the profile", entry.layer),
                });
            }
            population.set_seed(entry.hardness, entry.ripeness, entry.layer, entry.dm);
        }
        tracing::info!(
            species = %self.species.name,
            layers = population.layer_count(),
            cohorts = population.cohort_count(),
            stage = %population.phenology().stage,
            "population built"
        );
        Ok(population)
    }

    /// Management events scheduled for `day`, in file order.
    pub fn events_on(&self, day: u64) -> impl Iterator<Item = &ManagementAction> {
        self.management
            .iter()
            .filter(move |event| event.day == day)
            .map(|event| &event.action)
    }
}

/// Species name and parameter assignments.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpeciesConfig {
    /// Species name, for logs.
    #[serde(default = "default_species_name")]
    pub name: String,

    /// Parameter tag to value.
    #[serde(default)]
    pub params: BTreeMap<String, ParamLiteral>,
}

impl Default for SpeciesConfig {
    fn default() -> Self {
        Self {
            name: default_species_name(),
            params: BTreeMap::new(),
        }
    }
}

/// A parameter value as written in YAML.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParamLiteral {
    /// `true` or `false`.
    Flag(bool),
    /// A number.
    Number(f64),
    /// Anything else, parsed by the tag store.
    Text(String),
}

/// Soil layers, surface first.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SoilConfig {
    /// The layers.
    #[serde(default = "default_layers")]
    pub layers: Vec<SoilLayerConfig>,

    /// Maximum rooting depth (mm); derived from the species and the
    /// profile when absent.
    #[serde(default)]
    pub max_root_depth: Option<f64>,
}

impl Default for SoilConfig {
    fn default() -> Self {
        Self {
            layers: default_layers(),
            max_root_depth: None,
        }
    }
}

/// One soil layer.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SoilLayerConfig {
    /// Thickness (mm).
    pub thickness: f64,

    /// Bulk density (Mg/m^3).
    #[serde(default = "default_bulk_density")]
    pub bulk_density: f64,

    /// Sand content (g/g).
    #[serde(default = "default_sand")]
    pub sand: f64,

    /// Soil pH.
    #[serde(default = "default_ph")]
    pub ph: f64,

    /// Water held between wilting point and field capacity (mm per mm of
    /// soil).
    #[serde(default = "default_water_capacity")]
    pub water_capacity: f64,
}

/// Starting state of the population.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InitialConfig {
    /// Packed phenology code; takes precedence over `stage`.
    #[serde(default)]
    pub phenology_code: Option<f64>,

    /// Developmental stage, entered at its start.
    #[serde(default)]
    pub stage: Option<DevelopStage>,

    /// Herbage by status, part and digestibility class.
    #[serde(default)]
    pub herbage: Vec<HerbageEntry>,

    /// Roots of green statuses.
    #[serde(default)]
    pub roots: Vec<RootEntry>,

    /// Seed in the bank.
    #[serde(default)]
    pub seed: Vec<SeedEntry>,
}

/// Starting herbage of one status, part and class.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct HerbageEntry {
    /// Status holding the herbage.
    pub status: Status,
    /// Shoot part.
    pub part: ShootPart,
    /// Digestibility class, 1 (highest) to 12.
    pub class: u8,
    /// Mass (g/m^2).
    pub dm: f64,
}

/// Starting roots of one green status.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RootEntry {
    /// Status holding the roots.
    pub status: Status,
    /// Mass (g/m^2).
    pub dm: f64,
    /// Rooting depth (mm).
    pub depth: f64,
}

/// Starting seed of one hardness, ripeness and layer.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SeedEntry {
    /// Seed hardness.
    pub hardness: Hardness,
    /// Seed ripeness.
    pub ripeness: Ripeness,
    /// Soil layer, 0 at the surface.
    #[serde(default)]
    pub layer: usize,
    /// Mass (g/m^2).
    pub dm: f64,
}

/// Length of the run and the synthetic weather that drives it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    /// Days to simulate.
    #[serde(default = "default_days")]
    pub days: u64,

    /// Day of year of the first simulated day (1-366).
    #[serde(default = "default_start_day")]
    pub start_day: u32,

    /// Latitude (degrees; negative south).
    #[serde(default = "default_latitude")]
    pub latitude: f64,

    /// Random seed for the weather generator.
    #[serde(default = "default_weather_seed")]
    pub seed: u64,

    /// Annual mean temperature (deg C).
    #[serde(default = "default_mean_temp")]
    pub mean_temp: f64,

    /// Half the difference between the warmest and coldest mean daily
    /// temperatures (deg C).
    #[serde(default = "default_temp_amplitude")]
    pub temp_amplitude: f64,

    /// Probability of rain on any day.
    #[serde(default = "default_rain_probability")]
    pub rain_probability: f64,

    /// Mean rainfall on a wet day (mm).
    #[serde(default = "default_wet_day_rain")]
    pub wet_day_rain: f64,

    /// Atmospheric CO2 (ppm).
    #[serde(default = "default_co2")]
    pub co2: f64,

    /// Soil nitrate available per layer each day (g/m^2).
    #[serde(default = "default_nitrate")]
    pub nitrate: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            days: default_days(),
            start_day: default_start_day(),
            latitude: default_latitude(),
            seed: default_weather_seed(),
            mean_temp: default_mean_temp(),
            temp_amplitude: default_temp_amplitude(),
            rain_probability: default_rain_probability(),
            wet_day_rain: default_wet_day_rain(),
            co2: default_co2(),
            nitrate: default_nitrate(),
        }
    }
}

/// A management action on a given day of the run.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ManagementEvent {
    /// Run day, counting from 1.
    pub day: u64,
    /// What to do.
    pub action: ManagementAction,
}

/// Management actions.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ManagementAction {
    /// Sow seed.
    Sow {
        /// Seed (g/m^2).
        dm: f64,
    },
    /// Spray-top a grass sward.
    SprayTop,
    /// Kill part of the sward.
    Kill {
        /// Proportion of green herbage and roots killed.
        #[serde(default = "default_one")]
        herbage: f64,
        /// Proportion of surface seed killed.
        #[serde(default = "default_one")]
        seed: f64,
    },
    /// Remove herbage across the available classes.
    Graze {
        /// Herbage removed (g/m^2).
        dm: f64,
    },
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_species_name() -> String {
    String::from("pasture")
}

fn default_layers() -> Vec<SoilLayerConfig> {
    [100.0, 200.0, 300.0]
        .into_iter()
        .map(|thickness| SoilLayerConfig {
            thickness,
            bulk_density: default_bulk_density(),
            sand: default_sand(),
            ph: default_ph(),
            water_capacity: default_water_capacity(),
        })
        .collect()
}

const fn default_bulk_density() -> f64 {
    1.3
}

const fn default_sand() -> f64 {
    0.3
}

const fn default_ph() -> f64 {
    6.0
}

const fn default_water_capacity() -> f64 {
    0.15
}

const fn default_days() -> u64 {
    365
}

const fn default_start_day() -> u32 {
    60
}

const fn default_latitude() -> f64 {
    -35.0
}

const fn default_weather_seed() -> u64 {
    42
}

const fn default_mean_temp() -> f64 {
    14.0
}

const fn default_temp_amplitude() -> f64 {
    7.0
}

const fn default_rain_probability() -> f64 {
    0.3
}

const fn default_wet_day_rain() -> f64 {
    6.0
}

const fn default_co2() -> f64 {
    350.0
}

const fn default_nitrate() -> f64 {
    0.5
}

const fn default_one() -> f64 {
    1.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::ParamError;
    use pasture_types::StatusGroup;

    #[test]
    fn parse_empty_yaml() {
        let config = PastureConfig::parse("{}").unwrap();
        assert_eq!(config, PastureConfig::default());
        assert_eq!(config.soil.layers.len(), 3);
        assert_eq!(config.elements, ElementSet::None);
        assert_eq!(config.run.days, 365);
        assert!(config.management.is_empty());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r"
species:
  name: annual ryegrass
  params:
    annual: true
    k-hr: 1.5
    k-v-3: '2'
soil:
  layers:
    - thickness: 150
      bulk_density: 1.4
    - thickness: 250
  max_root_depth: 350
elements: nps
initial:
  stage: reproductive
  herbage:
    - { status: established, part: leaf, class: 3, dm: 60 }
  roots:
    - { status: established, dm: 50, depth: 300 }
  seed:
    - { hardness: hard, ripeness: ripe, dm: 20 }
run:
  days: 30
  seed: 7
management:
  - day: 5
    action: { kind: sow, dm: 4 }
  - day: 10
    action: { kind: kill, herbage: 0.5 }
  - day: 10
    action: { kind: spray_top }
";
        let config = PastureConfig::parse(yaml).unwrap();
        assert_eq!(config.species.name, "annual ryegrass");
        assert_eq!(config.species.params["annual"], ParamLiteral::Flag(true));
        assert_eq!(config.species.params["k-hr"], ParamLiteral::Number(1.5));
        assert_eq!(config.species.params["k-v-3"], ParamLiteral::Text(String::from("2")));
        assert_eq!(config.soil.layers.len(), 2);
        assert!((config.soil.layers[1].bulk_density - 1.3).abs() < 1e-12);
        assert_eq!(config.soil.max_root_depth, Some(350.0));
        assert_eq!(config.elements, ElementSet::Nps);
        assert_eq!(config.initial.stage, Some(DevelopStage::Reproductive));
        assert_eq!(config.initial.herbage[0].status, Status::Established);
        assert_eq!(config.initial.seed[0].layer, 0);
        assert_eq!(config.run.days, 30);
        assert_eq!(config.run.seed, 7);
        let day_ten: Vec<_> = config.events_on(10).collect();
        assert_eq!(
            day_ten,
            vec![
                &ManagementAction::Kill {
                    herbage: 0.5,
                    seed: 1.0
                },
                &ManagementAction::SprayTop
            ]
        );
        assert_eq!(config.events_on(5).count(), 1);
        assert_eq!(config.events_on(6).count(), 0);
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let err = PastureConfig::parse("run: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
        let err = PastureConfig::parse("management:\n  - day: 1\n    action: { kind: plough }\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn unknown_parameter_tags_are_reported() {
        let config = PastureConfig::parse("species:\n  params:\n    k-nonsense-1: 3\n").unwrap();
        let err = config.param_set().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Param(ParamError::InvalidReference { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = PastureConfig::from_file(Path::new("/nonexistent/pasture-config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    fn annual_grass_config(extra: &str) -> PastureConfig {
        let set = crate::params::species::tests::annual_grass();
        let mut yaml = String::from("species:\n  name: annual grass\n  params:\n");
        for (tag, value) in set.iter() {
            let line = match value {
                crate::params::ParamValue::Real(real) => format!("    {tag}: {real}\n"),
                crate::params::ParamValue::Flag(flag) => format!("    {tag}: {flag}\n"),
            };
            yaml.push_str(&line);
        }
        yaml.push_str(extra);
        PastureConfig::parse(&yaml).unwrap()
    }

    #[test]
    fn builds_the_configured_population() {
        let config = annual_grass_config(
            "elements: n\ninitial:\n  herbage:\n    - { status: established, part: leaf, class: 3, dm: 60 }\n    - { status: dead, part: stem, class: 9, dm: 25 }\n  roots:\n    - { status: established, dm: 40, depth: 250 }\n  seed:\n    - { hardness: soft, ripeness: ripe, dm: 12 }\n",
        );
        let population = config.build_population().unwrap();
        assert_eq!(population.elements(), ElementSet::N);
        assert!((population.herbage(StatusGroup::Green).dm - 60.0).abs() < 1e-9);
        assert!((population.herbage(StatusGroup::Dry).dm - 25.0).abs() < 1e-9);
        assert!((population.roots(StatusGroup::Green).dm - 40.0).abs() < 1e-9);
        assert!((population.seed_mass() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_initial_state_is_rejected() {
        let config = annual_grass_config(
            "initial:\n  herbage:\n    - { status: established, part: leaf, class: 13, dm: 60 }\n",
        );
        assert!(matches!(
            config.build_population().unwrap_err(),
            ConfigError::Invalid { .. }
        ));
        let config = annual_grass_config("initial:\n  roots:\n    - { status: dead, dm: 10, depth: 100 }\n");
        assert!(matches!(
            config.build_population().unwrap_err(),
            ConfigError::Invalid { .. }
        ));
    }
}
