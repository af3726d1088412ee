//! Multi-day runs of a whole population with grazing and management.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

mod common;

use std::path::PathBuf;

use pasture_core::config::ManagementAction;
use pasture_core::{DailyInputs, PastureConfig, Population, RemovalRequest, SoilNutrients};
use pasture_types::{ElementSet, Nutrient, StatusGroup};

fn inputs_for(population: &Population, day: u64) -> DailyInputs {
    let layers = population.layer_count();
    let mut inputs = DailyInputs::new(layers);
    // A week-long wet and dry cycle.
    if day % 7 == 0 {
        inputs.precipitation = 12.0;
        inputs.interception = 0.1;
    }
    let mut nutrients = SoilNutrients::empty(layers);
    nutrients.supply[Nutrient::No3] = vec![vec![0.5; layers]];
    inputs.nutrients = nutrients;
    inputs
}

#[test]
fn every_day_of_a_grazed_run_balances() {
    let mut population = common::sward(ElementSet::N);
    for day in 1..=60_u64 {
        let inputs = inputs_for(&population, day);
        population.begin_day(inputs);
        match day {
            10 => population.sow(4.0).unwrap(),
            45 => population.kill(0.3, 0.0),
            _ => {}
        }
        population.compute_rates().unwrap();
        let removal = if day % 5 == 0 {
            RemovalRequest::spread(&population.available_herbage(), 5.0)
        } else {
            RemovalRequest::default()
        };
        let summary = population.update_state(&removal).unwrap();

        assert_eq!(summary.day, day);
        assert!(summary.is_balanced(), "day {day}: {:?}", summary.conservation);
        assert!(summary.green >= 0.0);
        assert!(summary.dry >= 0.0);
        assert!(summary.seed >= 0.0);
    }
    assert!(population.herbage(StatusGroup::All).dm > 0.0);
}

#[test]
fn grazing_removes_no_more_than_is_available() {
    let mut population = common::sward(ElementSet::None);
    population.begin_day(inputs_for(&population, 1));
    population.compute_rates().unwrap();
    let available: f64 = population.available_herbage().sum();
    let removal = RemovalRequest::spread(&population.available_herbage(), 10_000.0);
    let summary = population.update_state(&removal).unwrap();
    assert!(summary.is_balanced());
    assert!(summary.flows.grazed.dm <= available + 1e-9);
    assert!(summary.flows.grazed.dm > 0.0);
}

#[test]
fn spray_topped_sward_keeps_balancing() {
    let mut population = common::sward(ElementSet::N);
    assert!(population.spray_top());
    for day in 1..=20_u64 {
        let inputs = inputs_for(&population, day);
        let summary = population.step(inputs, &RemovalRequest::default()).unwrap();
        assert!(summary.is_balanced(), "day {day}: {:?}", summary.conservation);
    }
}

#[test]
fn killed_sward_decays_without_regrowth() {
    let mut population = common::sward(ElementSet::None);
    population.begin_day(inputs_for(&population, 1));
    population.kill(1.0, 1.0);
    population.compute_rates().unwrap();
    let summary = population.update_state(&RemovalRequest::default()).unwrap();
    assert!(summary.is_balanced());
    assert!(summary.green.abs() < 1e-9);

    for day in 2..=10_u64 {
        let inputs = inputs_for(&population, day);
        let summary = population.step(inputs, &RemovalRequest::default()).unwrap();
        assert!(summary.is_balanced());
        assert!(summary.green.abs() < 1e-9);
    }
}

#[test]
fn shipped_configuration_runs_its_management_calendar() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../pasture-config.yaml");
    let config = PastureConfig::from_file(&path).unwrap();
    let mut population = config.build_population().unwrap();
    assert!(population.herbage(StatusGroup::Green).dm > 0.0);

    for day in 1..=config.run.days.min(30) {
        let inputs = inputs_for(&population, day);
        population.begin_day(inputs);
        let mut grazed = 0.0;
        for action in config.events_on(day) {
            match *action {
                ManagementAction::Sow { dm } => population.sow(dm).unwrap(),
                ManagementAction::SprayTop => {
                    population.spray_top();
                }
                ManagementAction::Kill { herbage, seed } => population.kill(herbage, seed),
                ManagementAction::Graze { dm } => grazed += dm,
            }
        }
        population.compute_rates().unwrap();
        let removal = RemovalRequest::spread(&population.available_herbage(), grazed);
        let summary = population.update_state(&removal).unwrap();
        assert!(summary.is_balanced(), "day {day}: {:?}", summary.conservation);
    }
}
