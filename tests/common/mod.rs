//! Common test utilities for pipeline testing
//!
//! Synthetic accident records and training settings shared by the
//! integration tests.

#![allow(dead_code)]

use aviation_severity::config::{ForestParams, TrainingConfig};
use aviation_severity::models::RawRecord;

const COUNTRIES: [&str; 3] = ["United States", "Canada", "Mexico"];
const WEATHER: [&str; 2] = ["VMC", "IMC"];
const PHASES: [&str; 4] = ["CRUISE", "LANDING", "TAKEOFF", "APPROACH"];
const ENGINE_TYPES: [&str; 3] = ["Reciprocating", "Turbo Fan", "Turbo Prop"];

/// Records where IMC landings are the deadliest combination
pub fn generate_records(n: usize) -> Vec<RawRecord> {
    (0..n)
        .map(|i| {
            let weather = WEATHER[i % WEATHER.len()];
            let phase = PHASES[(i / 2) % PHASES.len()];
            let fatal = match (weather, phase) {
                ("IMC", "LANDING") => 3,
                ("IMC", _) => 1,
                _ => 0,
            };
            let serious = (i % 3 == 0) as u32;
            let minor = (i % 5 == 0) as u32;

            record(i, weather, phase, fatal, serious, minor)
        })
        .collect()
}

/// Records whose injuries are always 2 fatal, 1 serious, 0 minor
pub fn constant_score_records(n: usize) -> Vec<RawRecord> {
    (0..n)
        .map(|i| {
            record(i, WEATHER[i % 2], PHASES[i % 4], 2, 1, 0)
        })
        .collect()
}

fn record(i: usize, weather: &str, phase: &str, fatal: u32, serious: u32, minor: u32) -> RawRecord {
    let label = if fatal > 0 {
        format!("Fatal({})", fatal)
    } else if serious + minor > 0 {
        "Non-Fatal".to_string()
    } else {
        "Incident".to_string()
    };

    RawRecord::new()
        .with_event_date(format!("{:02}/{:02}/{}", 1 + i % 12, 1 + i % 28, 1985 + i % 35))
        .with_country(COUNTRIES[i % COUNTRIES.len()])
        .with_weather_condition(weather)
        .with_flight_phase(phase)
        .with_aircraft_category("Airplane")
        .with_engine_type(ENGINE_TYPES[(i / 3) % ENGINE_TYPES.len()])
        .with_far_description("Part 91")
        .with_number_of_engines(if i % 4 == 0 { "2" } else { "1" })
        .with_amateur_built("No")
        .with_injuries(fatal.to_string(), serious.to_string(), minor.to_string())
        .with_injury_severity(label)
}

/// Small forests keep the suite fast in debug builds
pub fn fast_training_config() -> TrainingConfig {
    let params = ForestParams {
        n_trees: 16,
        max_depth: 8,
        min_samples_split: 2,
        min_samples_leaf: 1,
    };
    TrainingConfig {
        classifier: params.clone(),
        regressor: params,
        ..TrainingConfig::default()
    }
}
