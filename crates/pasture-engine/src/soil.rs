//! A layered bucket model of soil water and nitrate.
//!
//! Rain fills layers from the top down; what a layer cannot hold drains to
//! the one below and out of the profile from the bottom. Soil evaporation
//! draws on the surface layer and transpiration on each layer as the
//! population reports it.

use pasture_core::config::SoilLayerConfig;
use pasture_core::{DailyInputs, SoilNutrients};
use pasture_types::Nutrient;

use crate::error::EngineError;
use crate::weather::Weather;

/// Share of potential ET the bare surface can evaporate from a wet soil.
const SURFACE_EVAP_PROPN: f64 = 0.25;

/// Water holding of one layer.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bucket {
    /// Plant-available capacity (mm).
    capacity: f64,
    /// Current available water (mm).
    water: f64,
    /// Total pore space (mm).
    porosity: f64,
    /// Soil mass (kg/m^2).
    soil_mass: f64,
    ph: f64,
}

impl Bucket {
    fn rel_water(&self) -> f64 {
        if self.capacity > 0.0 {
            (self.water / self.capacity).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Soil water state of the whole profile.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketSoil {
    layers: Vec<Bucket>,
    nitrate: f64,
    drainage: f64,
}

impl BucketSoil {
    /// Build the buckets from the configured layers, starting at
    /// `initial_propn` of capacity, with `nitrate` g/m^2 of nitrate in
    /// reach of roots in every layer each day.
    pub fn new(layers: &[SoilLayerConfig], initial_propn: f64, nitrate: f64) -> Result<Self, EngineError> {
        if layers.is_empty() {
            return Err(EngineError::Driver {
                message: String::from("soil has no layers"),
            });
        }
        let layers = layers
            .iter()
            .map(|layer| {
                if layer.water_capacity < 0.0 || layer.water_capacity > 1.0 {
                    return Err(EngineError::Driver {
                        message: format!("water capacity {} is not a fraction", layer.water_capacity),
                    });
                }
                let capacity = layer.thickness * layer.water_capacity;
                Ok(Bucket {
                    capacity,
                    water: capacity * initial_propn.clamp(0.0, 1.0),
                    porosity: layer.thickness * (1.0 - layer.bulk_density / 2.65).max(0.05),
                    soil_mass: layer.thickness * layer.bulk_density,
                    ph: layer.ph,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            layers,
            nitrate: nitrate.max(0.0),
            drainage: 0.0,
        })
    }

    /// Number of layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Available water in the whole profile (mm).
    pub fn total_water(&self) -> f64 {
        self.layers.iter().map(|layer| layer.water).sum()
    }

    /// Water drained from the bottom of the profile so far (mm).
    pub const fn drainage(&self) -> f64 {
        self.drainage
    }

    /// Infiltrate `rain` mm from the top down.
    pub fn infiltrate(&mut self, rain: f64) {
        let mut incoming = rain.max(0.0);
        for layer in &mut self.layers {
            let room = (layer.capacity - layer.water).max(0.0);
            let stored = incoming.min(room);
            layer.water += stored;
            incoming -= stored;
        }
        self.drainage += incoming;
    }

    /// Evaporate from the surface layer. Returns the evaporation (mm).
    pub fn evaporate(&mut self, pot_et: f64) -> f64 {
        self.layers.first_mut().map_or(0.0, |surface| {
            let evap = (SURFACE_EVAP_PROPN * pot_et * surface.rel_water()).min(surface.water);
            surface.water -= evap;
            evap
        })
    }

    /// Remove transpiration by layer (mm).
    pub fn extract(&mut self, transpiration: &[f64]) {
        for (layer, taken) in self.layers.iter_mut().zip(transpiration) {
            layer.water = (layer.water - taken.max(0.0)).max(0.0);
        }
    }

    /// Population drivers for a day with `weather`, given yesterday's
    /// water state.
    pub fn daily_inputs(&self, weather: &Weather, co2: f64, surface_evap: f64) -> DailyInputs {
        let count = self.layer_count();
        let mut inputs = DailyInputs::new(count);
        inputs.max_temp = weather.max_temp;
        inputs.min_temp = weather.min_temp;
        inputs.mean_temp = weather.mean_temp();
        inputs.mean_day_temp = weather.mean_day_temp();
        inputs.precipitation = weather.rain;
        inputs.pot_et = weather.pot_et;
        inputs.surface_evap = surface_evap;
        inputs.vpd = weather.vpd;
        inputs.radiation = weather.radiation;
        inputs.day_length = weather.day_length;
        inputs.day_length_increasing = weather.day_length_increasing;
        inputs.co2 = co2;
        inputs.pasture_water_demand = weather.pot_et;
        inputs.rel_asw = self.layers.iter().map(Bucket::rel_water).collect();
        inputs.wfps = self
            .layers
            .iter()
            .map(|layer| if layer.porosity > 0.0 { (layer.water / layer.porosity).clamp(0.0, 1.0) } else { 0.0 })
            .collect();
        inputs.ph = self.layers.iter().map(|layer| layer.ph).collect();
        inputs.nutrients = self.nutrients();
        inputs
    }

    fn nutrients(&self) -> SoilNutrients {
        let mut nutrients = SoilNutrients::empty(self.layer_count());
        nutrients.supply[Nutrient::No3] = vec![vec![self.nitrate; self.layer_count()]];
        // g/m^2 over kg/m^2 of soil is g/kg; ppm is a thousand times that.
        nutrients.no3_ppm = vec![
            self.layers
                .iter()
                .map(|layer| if layer.soil_mass > 0.0 { 1000.0 * self.nitrate / layer.soil_mass } else { 0.0 })
                .collect(),
        ];
        nutrients
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn layer(thickness: f64) -> SoilLayerConfig {
        SoilLayerConfig {
            thickness,
            bulk_density: 1.3,
            sand: 0.3,
            ph: 6.0,
            water_capacity: 0.15,
        }
    }

    fn profile() -> BucketSoil {
        BucketSoil::new(&[layer(100.0), layer(200.0)], 0.0, 0.5).unwrap()
    }

    fn weather() -> Weather {
        Weather {
            day_of_year: 100,
            max_temp: 22.0,
            min_temp: 8.0,
            rain: 0.0,
            radiation: 18.0,
            pot_et: 4.0,
            vpd: 1.2,
            day_length: 11.5,
            day_length_increasing: false,
        }
    }

    #[test]
    fn rain_fills_the_top_layer_first() {
        let mut soil = profile();
        soil.infiltrate(10.0);
        let inputs = soil.daily_inputs(&weather(), 350.0, 0.0);
        assert!((inputs.rel_asw[0] - 10.0 / 15.0).abs() < 1e-9);
        assert!(inputs.rel_asw[1].abs() < 1e-9);
    }

    #[test]
    fn excess_rain_drains_through() {
        let mut soil = profile();
        soil.infiltrate(100.0);
        assert!((soil.total_water() - 45.0).abs() < 1e-9);
        assert!((soil.drainage() - 55.0).abs() < 1e-9);
    }

    #[test]
    fn evaporation_and_extraction_never_overdraw() {
        let mut soil = profile();
        soil.infiltrate(2.0);
        let evap = soil.evaporate(40.0);
        assert!(evap <= 2.0 + 1e-12);
        soil.extract(&[50.0, 50.0]);
        assert!(soil.total_water().abs() < 1e-12);
    }

    #[test]
    fn inputs_carry_the_weather_and_soil_state() {
        let soil = profile();
        let inputs = soil.daily_inputs(&weather(), 420.0, 0.3);
        assert!((inputs.mean_temp - 15.0).abs() < 1e-9);
        assert!((inputs.co2 - 420.0).abs() < 1e-9);
        assert_eq!(inputs.rel_asw.len(), 2);
        assert!((inputs.ph[1] - 6.0).abs() < 1e-9);
        assert!((inputs.nutrients.available(Nutrient::No3, 0, 1) - 0.5).abs() < 1e-9);
        assert!(inputs.nutrients.nitrate_ppm(0, 0) > 0.0);
    }

    #[test]
    fn empty_profile_is_rejected() {
        assert!(BucketSoil::new(&[], 0.5, 0.0).is_err());
        let mut bad = layer(100.0);
        bad.water_capacity = 1.5;
        assert!(BucketSoil::new(&[bad], 0.5, 0.0).is_err());
    }
}
