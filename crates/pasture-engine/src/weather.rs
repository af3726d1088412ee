//! Synthetic daily weather.
//!
//! Temperature follows a seasonal cosine peaking in mid-summer for the
//! configured hemisphere, with day-to-day noise. Day length comes from the
//! solar declination at the site latitude. Rain falls on a wet day with a
//! fixed probability and an exponentially distributed amount.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pasture_core::config::RunConfig;

/// Days in the simulated year.
const YEAR_DAYS: f64 = 365.0;

/// Half the diurnal temperature range (deg C).
const HALF_DIURNAL_RANGE: f64 = 6.0;

/// Largest daily deviation of mean temperature from the seasonal curve.
const TEMP_NOISE: f64 = 2.5;

/// Clear-sky radiation per hour of daylight (MJ/m^2/h).
const RADIATION_PER_HOUR: f64 = 1.8;

/// Priestley-Taylor style conversion from radiation to potential ET (mm/MJ).
const ET_PER_RADIATION: f64 = 0.22;

/// One day's weather.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weather {
    /// Day of the year, 1 to 365.
    pub day_of_year: u32,
    /// Maximum temperature (deg C).
    pub max_temp: f64,
    /// Minimum temperature (deg C).
    pub min_temp: f64,
    /// Rainfall (mm).
    pub rain: f64,
    /// Solar radiation (MJ/m^2).
    pub radiation: f64,
    /// Potential evapotranspiration (mm).
    pub pot_et: f64,
    /// Vapour pressure deficit (kPa).
    pub vpd: f64,
    /// Hours of daylight.
    pub day_length: f64,
    /// Whether day length is increasing.
    pub day_length_increasing: bool,
}

impl Weather {
    /// Mean of the maximum and minimum temperature.
    pub const fn mean_temp(&self) -> f64 {
        0.5 * (self.max_temp + self.min_temp)
    }

    /// Mean temperature during daylight hours.
    pub fn mean_day_temp(&self) -> f64 {
        0.75f64.mul_add(self.max_temp, 0.25 * self.min_temp)
    }
}

/// Seeded generator of daily weather for one site.
#[derive(Debug, Clone)]
pub struct WeatherGenerator {
    rng: StdRng,
    latitude: f64,
    mean_temp: f64,
    temp_amplitude: f64,
    rain_probability: f64,
    wet_day_rain: f64,
    start_day: u32,
}

impl WeatherGenerator {
    /// Create a generator from the run settings. The same seed always
    /// yields the same sequence.
    pub fn new(run: &RunConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(run.seed),
            latitude: run.latitude,
            mean_temp: run.mean_temp,
            temp_amplitude: run.temp_amplitude,
            rain_probability: run.rain_probability.clamp(0.0, 1.0),
            wet_day_rain: run.wet_day_rain.max(0.0),
            start_day: run.start_day,
        }
    }

    /// Day of the year for run day `day` (counting from 1).
    pub fn day_of_year(&self, day: u64) -> u32 {
        let offset = u64::from(self.start_day)
            .saturating_add(day)
            .saturating_sub(2)
            .checked_rem(365)
            .unwrap_or(0);
        u32::try_from(offset).map_or(1, |doy| doy.saturating_add(1))
    }

    /// Weather for run day `day`.
    pub fn generate(&mut self, day: u64) -> Weather {
        let day_of_year = self.day_of_year(day);
        let doy = f64::from(day_of_year);

        let warmest = if self.latitude < 0.0 { 15.0 } else { 196.0 };
        let seasonal = self
            .temp_amplitude
            .mul_add((2.0 * PI * (doy - warmest) / YEAR_DAYS).cos(), self.mean_temp);
        let mean = seasonal + self.rng.random_range(-TEMP_NOISE..=TEMP_NOISE);

        let wet = self.rng.random_bool(self.rain_probability);
        let rain = if wet {
            // Exponential amount with the configured mean.
            let u: f64 = self.rng.random_range(f64::EPSILON..1.0);
            -self.wet_day_rain * u.ln()
        } else {
            0.0
        };

        let hours = day_length(self.latitude, doy);
        let cloud = if wet { 0.55 } else { 1.0 };
        let radiation = RADIATION_PER_HOUR * hours * cloud;
        let max_temp = mean + HALF_DIURNAL_RANGE * cloud;
        let min_temp = mean - HALF_DIURNAL_RANGE * cloud;
        let pot_et = (ET_PER_RADIATION * radiation * (1.0 + 0.02 * mean.max(0.0))).max(0.0);

        Weather {
            day_of_year,
            max_temp,
            min_temp,
            rain,
            radiation,
            pot_et,
            vpd: vapour_pressure_deficit(max_temp, min_temp),
            day_length: hours,
            day_length_increasing: day_length(self.latitude, doy + 1.0) > hours,
        }
    }
}

/// Hours of daylight at `latitude` (degrees) on day of year `doy`.
pub fn day_length(latitude: f64, doy: f64) -> f64 {
    let declination = 23.45_f64.to_radians() * (2.0 * PI * (284.0 + doy) / YEAR_DAYS).sin();
    let cos_hour = (-latitude.to_radians().tan() * declination.tan()).clamp(-1.0, 1.0);
    2.0 * cos_hour.acos().to_degrees() / 15.0
}

/// Saturated vapour pressure at `temp` (kPa).
fn saturated_vp(temp: f64) -> f64 {
    0.6108 * (17.27 * temp / (temp + 237.3)).exp()
}

/// Daytime deficit, taking the minimum temperature as the dew point.
fn vapour_pressure_deficit(max_temp: f64, min_temp: f64) -> f64 {
    let day_vp = 0.75f64.mul_add(saturated_vp(max_temp), 0.25 * saturated_vp(min_temp));
    (day_vp - saturated_vp(min_temp)).max(0.0)
}
