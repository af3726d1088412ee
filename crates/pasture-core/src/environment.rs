//! Soil geometry and the daily drivers supplied by the host.
//!
//! The population never reads weather or soil state directly. Each day the
//! host fills a [`DailyInputs`] record (weather, per-layer soil moisture,
//! soil nutrient availability) and optionally a [`RemovalRequest`]; the
//! static soil description lives in a [`SoilProfile`] fixed at construction.
//!
//! Layers are indexed from zero at the surface. Depths are in mm, masses in
//! g/m^2.

use serde::{Deserialize, Serialize};

use pasture_types::{ClassTable, NutrientTable, RipenessTable};

use crate::error::PopulationError;

/// Value of a per-layer series, or zero past its end.
pub(crate) fn layer_value(values: &[f64], layer: usize) -> f64 {
    values.get(layer).copied().unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Soil profile
// ---------------------------------------------------------------------------

/// One soil layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoilLayer {
    /// Layer thickness (mm).
    pub thickness: f64,
    /// Bulk density (Mg/m^3).
    pub bulk_density: f64,
    /// Sand content (g/g).
    pub sand: f64,
}

/// The layered soil the roots grow into.
#[derive(Debug, Clone, PartialEq)]
pub struct SoilProfile {
    layers: Vec<SoilLayer>,
    bottoms: Vec<f64>,
}

impl SoilProfile {
    /// Build a profile from its layers, surface first.
    ///
    /// # Errors
    ///
    /// Returns [`PopulationError::InvalidSoil`] if there are no layers or a
    /// layer has a non-positive or non-finite thickness.
    pub fn new(layers: Vec<SoilLayer>) -> Result<Self, PopulationError> {
        if layers.is_empty() {
            return Err(PopulationError::InvalidSoil {
                reason: String::from("no soil layers"),
            });
        }
        if let Some((idx, layer)) = layers
            .iter()
            .enumerate()
            .find(|(_, layer)| !(layer.thickness.is_finite() && layer.thickness > 0.0))
        {
            return Err(PopulationError::InvalidSoil {
                reason: format!("layer {idx} has thickness {}", layer.thickness),
            });
        }
        let bottoms = layers
            .iter()
            .scan(0.0, |depth, layer| {
                *depth += layer.thickness;
                Some(*depth)
            })
            .collect();
        Ok(Self { layers, bottoms })
    }

    /// Number of layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// The layers, surface first.
    pub fn layers(&self) -> &[SoilLayer] {
        &self.layers
    }

    /// Thickness of `layer` (mm).
    pub fn thickness(&self, layer: usize) -> f64 {
        self.layers.get(layer).map_or(0.0, |l| l.thickness)
    }

    /// Depth of the top of `layer` (mm).
    pub fn top(&self, layer: usize) -> f64 {
        layer
            .checked_sub(1)
            .map_or(0.0, |above| layer_value(&self.bottoms, above))
    }

    /// Depth of the bottom of `layer` (mm).
    pub fn bottom(&self, layer: usize) -> f64 {
        layer_value(&self.bottoms, layer)
    }

    /// Depth of the middle of `layer` (mm).
    pub fn mid_depth(&self, layer: usize) -> f64 {
        0.5 * (self.top(layer) + self.bottom(layer))
    }

    /// Total profile depth (mm).
    pub fn depth(&self) -> f64 {
        self.bottoms.last().copied().unwrap_or(0.0)
    }

    /// Index of the deepest layer whose top lies above `depth`.
    pub fn layer_at(&self, depth: f64) -> usize {
        let last = self.layer_count().saturating_sub(1);
        self.bottoms
            .iter()
            .position(|bottom| depth <= *bottom)
            .unwrap_or(last)
            .min(last)
    }

    /// Relative root extension allowed by each layer's bulk density.
    ///
    /// The threshold bulk density moves from `k-r-6` (no sand) to `k-r-5`
    /// (pure sand); above it extension falls by `k-r-7` per Mg/m^3, floored
    /// at `k-r-8`.
    pub fn root_restriction(&self, root: &[f64; 11]) -> Vec<f64> {
        self.layers
            .iter()
            .map(|layer| {
                let threshold = (root[5] - root[6]).mul_add(layer.sand, root[6]);
                if layer.bulk_density <= threshold {
                    1.0
                } else {
                    root[8].max(root[7].mul_add(-(layer.bulk_density - threshold), 1.0))
                }
            })
            .collect()
    }

    /// Default maximum rooting depth: `max_root_length` of unrestricted
    /// root travel, slowed layer by layer by `restriction` and rounded to
    /// the nearest 10 mm. Roots that never run out reach the profile base.
    pub fn default_max_root_depth(&self, max_root_length: f64, restriction: &[f64]) -> f64 {
        let mut left = max_root_length;
        let mut max_depth = 0.0;
        for (idx, layer) in self.layers.iter().enumerate() {
            if left <= 0.0 {
                break;
            }
            let scale = layer_value(restriction, idx);
            if scale * left <= layer.thickness {
                max_depth = scale.mul_add(left, self.top(idx));
                left = 0.0;
            } else if scale > 0.0 {
                left -= layer.thickness / scale;
            }
        }
        if left > 0.0 {
            self.depth()
        } else {
            10.0 * (max_depth / 10.0).round()
        }
    }
}

// ---------------------------------------------------------------------------
// Daily drivers
// ---------------------------------------------------------------------------

/// Soil nutrient availability for one day.
///
/// The soil surface is split into sub-areas of relative size `rel_areas`;
/// `supply[form][area][layer]` is the mass of each nutrient form the roots
/// can reach (g/m^2 of that sub-area).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoilNutrients {
    /// Relative size of each sub-area; sums to one.
    pub rel_areas: Vec<f64>,
    /// Available mass per nutrient form, sub-area and layer.
    pub supply: NutrientTable<Vec<Vec<f64>>>,
    /// Soil nitrate concentration per sub-area and layer (ppm).
    pub no3_ppm: Vec<Vec<f64>>,
}

impl SoilNutrients {
    /// A single sub-area with nothing available in `layer_count` layers.
    pub fn empty(layer_count: usize) -> Self {
        Self {
            rel_areas: vec![1.0],
            supply: NutrientTable::from_fn(|_| vec![vec![0.0; layer_count]]),
            no3_ppm: vec![vec![0.0; layer_count]],
        }
    }

    /// Available mass of a nutrient form in one sub-area and layer.
    pub fn available(&self, form: pasture_types::Nutrient, area: usize, layer: usize) -> f64 {
        self.supply[form]
            .get(area)
            .map_or(0.0, |layers| layer_value(layers, layer))
    }

    /// Nitrate concentration in one sub-area and layer.
    pub fn nitrate_ppm(&self, area: usize, layer: usize) -> f64 {
        self.no3_ppm
            .get(area)
            .map_or(0.0, |layers| layer_value(layers, layer))
    }
}

/// Weather and soil state for one day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyInputs {
    /// Maximum air temperature (deg C).
    pub max_temp: f64,
    /// Minimum air temperature (deg C).
    pub min_temp: f64,
    /// Mean air temperature (deg C).
    pub mean_temp: f64,
    /// Mean daytime air temperature (deg C).
    pub mean_day_temp: f64,
    /// Rainfall (mm).
    pub precipitation: f64,
    /// Potential evapotranspiration (mm).
    pub pot_et: f64,
    /// Evaporation from free water on surfaces (mm).
    pub surface_evap: f64,
    /// Vapour pressure deficit (kPa).
    pub vpd: f64,
    /// Solar radiation (MJ/m^2).
    pub radiation: f64,
    /// Wind speed at 2 m (m/s).
    pub wind_speed: f64,
    /// Day length (hours).
    pub day_length: f64,
    /// Whether day length is increasing.
    pub day_length_increasing: bool,
    /// Atmospheric CO2 (ppm).
    pub co2: f64,
    /// Fraction of rainfall intercepted by the canopy.
    pub interception: f64,
    /// Trampling rate by livestock (relative).
    pub trampling: f64,
    /// Relative available soil water per layer (0-1).
    pub rel_asw: Vec<f64>,
    /// Water-filled pore space per layer (0-1).
    pub wfps: Vec<f64>,
    /// Soil pH per layer.
    pub ph: Vec<f64>,
    /// Water demand of the whole sward (mm).
    pub pasture_water_demand: f64,
    /// Soil nutrient availability.
    pub nutrients: SoilNutrients,
}

impl DailyInputs {
    /// A mild, moist day for a profile of `layer_count` layers.
    pub fn new(layer_count: usize) -> Self {
        Self {
            max_temp: 20.0,
            min_temp: 8.0,
            mean_temp: 14.0,
            mean_day_temp: 17.0,
            precipitation: 0.0,
            pot_et: 4.0,
            surface_evap: 0.0,
            vpd: 1.0,
            radiation: 18.0,
            wind_speed: 2.0,
            day_length: 12.0,
            day_length_increasing: true,
            co2: pasture_types::constants::REF_CO2,
            interception: 0.0,
            trampling: 0.0,
            rel_asw: vec![0.8; layer_count],
            wfps: vec![0.5; layer_count],
            ph: vec![pasture_types::constants::DEFAULT_PH; layer_count],
            pasture_water_demand: 3.0,
            nutrients: SoilNutrients::empty(layer_count),
        }
    }

    /// Relative available water of the surface layer.
    pub fn surface_asw(&self) -> f64 {
        layer_value(&self.rel_asw, 0)
    }
}

/// Herbage and seed to remove today by grazing or cutting.
///
/// Herbage is requested per digestibility class across all available
/// statuses and parts; seed per ripeness from the surface layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RemovalRequest {
    /// Herbage to remove from each digestibility class (g/m^2).
    pub herbage: ClassTable<f64>,
    /// Seed to remove by ripeness (g/m^2).
    pub seed: RipenessTable<f64>,
}

impl RemovalRequest {
    /// Returns `true` if nothing is to be removed.
    pub fn is_empty(&self) -> bool {
        self.herbage.sum() <= 0.0 && self.seed.sum() <= 0.0
    }

    /// Remove `dm` g/m^2 of herbage spread over the classes in proportion
    /// to what is `available` in each.
    pub fn spread(available: &ClassTable<f64>, dm: f64) -> Self {
        let total = available.sum();
        let herbage = if total > 0.0 && dm > 0.0 {
            let propn = (dm / total).min(1.0);
            available.map(|_, avail| avail.max(0.0) * propn)
        } else {
            ClassTable::filled(0.0)
        };
        Self {
            herbage,
            seed: RipenessTable::filled(0.0),
        }
    }
}
