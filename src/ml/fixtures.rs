//! Deterministic synthetic accident records for unit tests.

use crate::config::{ForestParams, TrainingConfig};
use crate::ml::bundle::ModelBundle;
use crate::ml::pipeline::TrainingPipeline;
use crate::models::RawRecord;

const COUNTRIES: [&str; 4] = ["United States", "Canada", "Brazil", "France"];
const WEATHER: [&str; 3] = ["VMC", "IMC", "UNK"];
const PHASES: [&str; 5] = ["CRUISE", "LANDING", "TAKEOFF", "APPROACH", "MANEUVERING"];
const ENGINES: [&str; 4] = ["Reciprocating", "Turbo Fan", "Turbo Prop", "Turbo Jet"];

/// `n` complete records whose injuries depend on weather and phase
pub fn synthetic_records(n: usize) -> Vec<RawRecord> {
    (0..n).map(synthetic_record).collect()
}

pub fn synthetic_record(i: usize) -> RawRecord {
    let weather = WEATHER[i % WEATHER.len()];
    let phase = PHASES[(i / 3) % PHASES.len()];

    let fatal = match (weather, phase) {
        ("IMC", _) => 1 + i % 3,
        (_, "MANEUVERING") => 1,
        _ => 0,
    };
    let serious = usize::from(i % 4 == 1);
    let minor = i % 2;

    let label = if fatal > 0 {
        format!("Fatal({})", fatal)
    } else if serious + minor > 0 {
        "Non-Fatal".to_string()
    } else {
        "Incident".to_string()
    };

    RawRecord::new()
        .with_event_date(format!("{}-{:02}-{:02}", 1990 + i % 30, 1 + i % 12, 1 + i % 28))
        .with_country(COUNTRIES[(i / 7) % COUNTRIES.len()])
        .with_weather_condition(weather)
        .with_flight_phase(phase)
        .with_aircraft_category("Airplane")
        .with_engine_type(ENGINES[(i / 2) % ENGINES.len()])
        .with_far_description(if i % 5 == 0 { "Part 121" } else { "Part 91" })
        .with_number_of_engines((1 + i % 2).to_string())
        .with_amateur_built(if i % 9 == 0 { "Yes" } else { "No" })
        .with_injuries(fatal.to_string(), serious.to_string(), minor.to_string())
        .with_injury_severity(label)
}

/// Training settings small enough for fast unit tests
pub fn small_training_config() -> TrainingConfig {
    let params = ForestParams {
        n_trees: 10,
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

/// A freshly trained bundle with its own id
pub fn trained_bundle() -> ModelBundle {
    TrainingPipeline::new(small_training_config())
        .run(&synthetic_records(160))
        .expect("synthetic records are trainable")
        .bundle
}
