//! Light interception, water use and potential assimilation of the green
//! canopy.
//!
//! The established and senescing plants form one canopy layer over the
//! seedlings. Each green status intercepts light in proportion to its
//! projected area, transpires its share of the pasture water demand from
//! the layers its effective roots occupy, and converts the intercepted
//! light into potential assimilation under the lesser of a radiation-use
//! and a transpiration-efficiency limit.

use pasture_ledger::math::{div0, sig};
use pasture_types::constants::{REF_CO2, REF_CO2_TEMP, REF_RADN_FLUX, TOLERANCE, VERY_LARGE, VERY_SMALL};
use pasture_types::{GrowthLimit, LimitTable, RootAge, ShootPart, Status, StatusTable};

use super::DayView;
use crate::cohort::Cohort;
use crate::environment::{DailyInputs, layer_value};
use crate::params::SpeciesParams;

/// Light and water shares of the green statuses for one day.
#[derive(Debug, Clone, PartialEq)]
pub struct CanopyState {
    light: StatusTable<f64>,
    water_demand: StatusTable<f64>,
    transpiration: StatusTable<Vec<f64>>,
    limits: StatusTable<LimitTable>,
}

impl CanopyState {
    /// A canopy intercepting nothing, over `layer_count` soil layers.
    pub(crate) fn new(layer_count: usize) -> Self {
        Self {
            light: StatusTable::filled(0.0),
            water_demand: StatusTable::filled(0.0),
            transpiration: StatusTable::from_fn(|_| vec![0.0; layer_count]),
            limits: StatusTable::filled(LimitTable::filled(1.0)),
        }
    }

    /// Fraction of incident light intercepted by a green status.
    pub fn light_propn(&self, status: Status) -> f64 {
        self.light[status]
    }

    /// Water demand of a green status (mm).
    pub fn water_demand(&self, status: Status) -> f64 {
        self.water_demand[status]
    }

    /// Transpiration of a green status from each soil layer (mm).
    pub fn transpiration(&self, status: Status) -> &[f64] {
        &self.transpiration[status]
    }

    /// Transpiration of all green statuses from each soil layer (mm), for
    /// the host to take out of the soil water balance.
    pub fn total_transpiration(&self) -> Vec<f64> {
        let layers = self.transpiration[Status::Seedling].len();
        (0..layers)
            .map(|layer| {
                Status::GREEN
                    .iter()
                    .map(|&status| layer_value(&self.transpiration[status], layer))
                    .sum()
            })
            .collect()
    }

    /// Growth limits of a green status before nutrient limitation.
    pub fn growth_limits(&self, status: Status) -> &LimitTable {
        &self.limits[status]
    }

    /// Split the light between the established and senescing canopy and
    /// the seedlings beneath it.
    pub(crate) fn set_monoculture_light(&mut self, cohorts: &[Cohort], extinction: &StatusTable<f64>) {
        let area = StatusTable::from_fn(|status| status_proj_area(cohorts, extinction, status));
        let upper_area = area[Status::Established] + area[Status::Senescing];
        let upper_light = 1.0 - (-upper_area).exp();
        self.light = StatusTable::filled(0.0);
        self.light[Status::Established] = upper_light * div0(area[Status::Established], upper_area);
        self.light[Status::Senescing] = upper_light * div0(area[Status::Senescing], upper_area);
        self.light[Status::Seedling] = (1.0 - upper_light) * (1.0 - (-area[Status::Seedling]).exp());
    }

    /// Share out the pasture water demand by intercepted light and take it
    /// up from the soil layers.
    pub(crate) fn compute_water_uptake(
        &mut self,
        cohorts: &[Cohort],
        params: &SpeciesParams,
        inputs: &DailyInputs,
    ) {
        let total_light: f64 = Status::GREEN.iter().map(|&status| self.light[status]).sum();
        let layers = inputs.rel_asw.len();
        for status in Status::GREEN {
            let demand = div0(self.light[status], total_light) * inputs.pasture_water_demand;
            self.water_demand[status] = demand;
            self.transpiration[status] = if demand > 0.0 {
                let root_propn = effective_root_propn(cohorts, status, layers);
                water_uptake(params, inputs, &root_propn, demand)
            } else {
                vec![0.0; layers]
            };
        }
    }
}

/// Projected area of the cohorts of one status.
pub(crate) fn status_proj_area(cohorts: &[Cohort], extinction: &StatusTable<f64>, status: Status) -> f64 {
    cohorts
        .iter()
        .filter(|cohort| cohort.status == status)
        .map(|cohort| cohort.proj_area(extinction[status]))
        .sum()
}

/// Share of the effective roots of one status held in each layer.
pub(crate) fn effective_root_propn(cohorts: &[Cohort], status: Status, layer_count: usize) -> Vec<f64> {
    let members: Vec<&Cohort> = cohorts.iter().filter(|cohort| cohort.status == status).collect();
    let total: f64 = members
        .iter()
        .map(|cohort| cohort.root_age_total(RootAge::Effective).dm)
        .sum();
    (0..layer_count)
        .map(|layer| {
            let in_layer: f64 = members
                .iter()
                .filter_map(|cohort| cohort.roots[RootAge::Effective].get(layer))
                .map(|pool| pool.dm)
                .sum();
            div0(in_layer, total)
        })
        .collect()
}

/// Uptake of `demand` mm of water by roots spread as `root_propn`.
///
/// Layers drier than the transpiration threshold supply in proportion to
/// their relative available water. Part of the resulting deficit is made
/// up from the layers that are not limiting.
pub(crate) fn water_uptake(
    params: &SpeciesParams,
    inputs: &DailyInputs,
    root_propn: &[f64],
    demand: f64,
) -> Vec<f64> {
    let threshold = params.water_use[1];
    let mut deficit = demand;
    let mut distribute = vec![0.0; root_propn.len()];
    let mut uptake: Vec<f64> = root_propn
        .iter()
        .zip(distribute.iter_mut())
        .enumerate()
        .map(|(layer, (propn, spread))| {
            let ratio = div0(layer_value(&inputs.rel_asw, layer), threshold).clamp(0.0, 1.0);
            if ratio >= 1.0 {
                *spread = *propn;
            }
            let amount = demand * propn * ratio;
            deficit -= amount;
            amount
        })
        .collect();

    let extra = params.water_use[2] * deficit;
    let spread_total: f64 = distribute.iter().sum();
    if extra > VERY_SMALL && spread_total > 0.0 {
        for (amount, spread) in uptake.iter_mut().zip(&distribute) {
            *amount += extra * spread / spread_total;
        }
    }
    uptake
}

/// Relative radiation-use efficiency at the day's CO2 concentration.
fn co2_radn_use_eff(params: &SpeciesParams, inputs: &DailyInputs) -> f64 {
    let co2 = inputs.co2;
    if co2 <= 0.0 || (co2 - REF_CO2).abs() < TOLERANCE {
        return 1.0;
    }
    let radn_use = &params.radn_use;
    let temp = inputs.mean_day_temp;
    let comp_point = (radn_use[5] - radn_use[4]).mul_add(
        temp / REF_CO2_TEMP * div0(radn_use[6] - REF_CO2_TEMP, radn_use[6] - temp),
        radn_use[4],
    );
    div0(
        (co2 - comp_point) * 2.0f64.mul_add(comp_point, REF_CO2),
        2.0f64.mul_add(comp_point, co2) * (REF_CO2 - comp_point),
    )
}

/// Relative transpiration efficiency at the day's CO2 concentration.
fn co2_transp_eff(params: &SpeciesParams, inputs: &DailyInputs) -> f64 {
    if inputs.co2 <= 0.0 {
        return 1.0;
    }
    let change = inputs.co2 / REF_CO2 - 1.0;
    div0(1.0 + change, params.water_use[6].mul_add(change, 1.0))
}

/// Potential assimilation of each green status, shared among its cohorts
/// by projected area. Records each status's growth limits.
pub(crate) fn compute_pot_assimilation(view: &DayView<'_>, canopy: &mut CanopyState, cohorts: &mut [Cohort]) {
    let params = &view.site.params;
    let inputs = &view.site.inputs;
    let layers = view.site.soil.layer_count();

    let green_area: f64 = Status::GREEN
        .iter()
        .map(|&status| status_proj_area(cohorts, &view.extinction, status))
        .sum();
    let stem_area: f64 = cohorts
        .iter()
        .filter(|cohort| cohort.status.is_green())
        .map(|cohort| view.extinction[cohort.status] * cohort.area_index(ShootPart::Stem))
        .sum();
    let rue_scale = (params.radn_use[2] + REF_RADN_FLUX)
        / (params.radn_use[2] + div0(inputs.radiation, inputs.day_length))
        * (1.0 - params.radn_use[3]).mul_add(-div0(stem_area, green_area), 1.0);
    let free_evap = if inputs.pot_et > 0.0 {
        (inputs.surface_evap / inputs.pot_et).min(1.0)
    } else {
        0.0
    };

    for status in Status::GREEN {
        let mut limits = LimitTable::filled(1.0);
        limits[GrowthLimit::LowTemperature] = sig(view.lagged_temp, params.low_temp[1], params.low_temp[2]);

        let pot_tr = canopy.water_demand[status];
        let act_tr: f64 = canopy.transpiration[status].iter().sum();
        if pot_tr > 0.0 {
            limits[GrowthLimit::SoilMoisture] = div0(act_tr / pot_tr, params.water[1]).min(1.0);
        }

        let root_propn = effective_root_propn(cohorts, status, layers);
        limits[GrowthLimit::Waterlogging] = root_propn
            .iter()
            .enumerate()
            .map(|(layer, propn)| {
                let excess = (layer_value(&inputs.wfps, layer) - params.water_log[1]).max(0.0);
                propn * (-params.water_log[2] * excess).exp()
            })
            .sum();

        let low_t = limits[GrowthLimit::LowTemperature];
        let water_limit = limits[GrowthLimit::SoilMoisture].min(limits[GrowthLimit::Waterlogging]);
        let rue = params.radn_use[1] * rue_scale * co2_radn_use_eff(params, inputs) * low_t.min(water_limit);
        let rue_assim = rue * canopy.light[status] * inputs.radiation;

        let te_assim = if inputs.vpd > 0.0 {
            let maint: f64 = cohorts
                .iter()
                .filter(|cohort| cohort.status == status)
                .map(|cohort| cohort.rates.maint_resp.sum())
                .sum();
            let te = params.transp_eff[1] / inputs.vpd
                * rue_scale
                * co2_transp_eff(params, inputs)
                * low_t.min(limits[GrowthLimit::Waterlogging]);
            div0(te * act_tr, 1.0 - params.respire[4]) + maint
        } else {
            VERY_LARGE
        };

        let pot_assim = free_evap.mul_add(rue_assim, (1.0 - free_evap) * rue_assim.min(te_assim));
        if rue_assim > 0.0 {
            limits[GrowthLimit::Vpd] = pot_assim / rue_assim;
        }
        canopy.limits[status] = limits;

        let status_area = status_proj_area(cohorts, &view.extinction, status);
        for cohort in cohorts.iter_mut().filter(|cohort| cohort.status == status) {
            let share = div0(cohort.proj_area(view.extinction[status]), status_area);
            let mut cohort_limits = limits;
            cohort_limits[GrowthLimit::Gai] = share * canopy.light[status];
            cohort.set_pot_assimilation(share * pot_assim, &cohort_limits);
        }
    }
}
