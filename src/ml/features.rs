use crate::error::{AppError, Result};
use crate::ml::severity::SeverityScorer;
use crate::models::RawRecord;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Number of model features
pub const N_FEATURES: usize = 8;

/// Model feature names, in vector order
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "Year",
    "Month",
    "DayOfWeek",
    "NumberOfEngines",
    "Country_encoded",
    "WeatherCondition_encoded",
    "FlightPhase_encoded",
    "EngineType_encoded",
];

/// Sentinel standing in for missing and out-of-vocabulary categories
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Accepted `Event Date` layouts, tried in order
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%Y/%m/%d", "%d-%b-%Y", "%d-%b-%y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];

/// Frozen mapping from category strings to integer codes.
///
/// Codes follow the lexicographic order of the vocabulary. The vocabulary is
/// fixed at construction and always contains [`UNKNOWN_CATEGORY`]: missing,
/// blank and unseen values all encode to that code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    column: String,
    vocabulary: BTreeMap<String, u32>,
}

impl CategoricalEncoder {
    /// Build the vocabulary from every value observed in a column
    pub fn fit<'a, I>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut classes: BTreeSet<String> = values
            .into_iter()
            .map(|value| canonical(value).to_string())
            .collect();
        classes.insert(UNKNOWN_CATEGORY.to_string());

        let vocabulary = classes
            .into_iter()
            .enumerate()
            .map(|(code, class)| (class, code as u32))
            .collect();

        Self {
            column: column.to_string(),
            vocabulary,
        }
    }

    /// Encode a value; never fails
    pub fn encode(&self, value: Option<&str>) -> u32 {
        self.vocabulary
            .get(canonical(value))
            .copied()
            .unwrap_or_else(|| self.unknown_code())
    }

    /// Code assigned to missing or unseen values
    pub fn unknown_code(&self) -> u32 {
        self.vocabulary.get(UNKNOWN_CATEGORY).copied().unwrap_or(0)
    }

    pub fn contains(&self, value: &str) -> bool {
        self.vocabulary.contains_key(value)
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty()
    }

    /// Vocabulary in code order
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.vocabulary.keys().map(String::as_str)
    }
}

fn canonical(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => UNKNOWN_CATEGORY,
    }
}

/// One encoder per categorical column of the dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoders {
    pub country: CategoricalEncoder,
    pub weather_condition: CategoricalEncoder,
    pub flight_phase: CategoricalEncoder,
    pub aircraft_category: CategoricalEncoder,
    pub engine_type: CategoricalEncoder,
    pub far_description: CategoricalEncoder,
}

impl CategoricalEncoders {
    /// Fit every encoder on the full batch
    pub fn fit(records: &[RawRecord]) -> Self {
        Self {
            country: CategoricalEncoder::fit(
                "Country",
                records.iter().map(|r| r.country.as_deref()),
            ),
            weather_condition: CategoricalEncoder::fit(
                "Weather Condition",
                records.iter().map(|r| r.weather_condition.as_deref()),
            ),
            flight_phase: CategoricalEncoder::fit(
                "Broad Phase of Flight",
                records.iter().map(|r| r.flight_phase.as_deref()),
            ),
            aircraft_category: CategoricalEncoder::fit(
                "Aircraft Category",
                records.iter().map(|r| r.aircraft_category.as_deref()),
            ),
            engine_type: CategoricalEncoder::fit(
                "Engine Type",
                records.iter().map(|r| r.engine_type.as_deref()),
            ),
            far_description: CategoricalEncoder::fit(
                "FAR Description",
                records.iter().map(|r| r.far_description.as_deref()),
            ),
        }
    }

    pub fn encode(&self, record: &RawRecord) -> EncodedCategories {
        EncodedCategories {
            country: self.country.encode(record.country.as_deref()),
            weather_condition: self
                .weather_condition
                .encode(record.weather_condition.as_deref()),
            flight_phase: self.flight_phase.encode(record.flight_phase.as_deref()),
            aircraft_category: self
                .aircraft_category
                .encode(record.aircraft_category.as_deref()),
            engine_type: self.engine_type.encode(record.engine_type.as_deref()),
            far_description: self
                .far_description
                .encode(record.far_description.as_deref()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoricalEncoder> {
        [
            &self.country,
            &self.weather_condition,
            &self.flight_phase,
            &self.aircraft_category,
            &self.engine_type,
            &self.far_description,
        ]
        .into_iter()
    }
}

/// Integer codes of a record's categorical columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedCategories {
    pub country: u32,
    pub weather_condition: u32,
    pub flight_phase: u32,
    pub aircraft_category: u32,
    pub engine_type: u32,
    pub far_description: u32,
}

/// Calendar features derived from the event date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDate {
    pub year: i32,
    pub month: u32,
    /// Monday = 0
    pub day_of_week: u32,
    pub quarter: u32,
}

impl EventDate {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day_of_week: date.weekday().num_days_from_monday(),
            quarter: (date.month() - 1) / 3 + 1,
        }
    }

    /// Parse any of the accepted layouts; `None` when unparseable
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
            .or_else(|| {
                DATETIME_FORMATS
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                    .map(|dt| dt.date())
            })
            .or_else(|| {
                DateTime::parse_from_rfc3339(raw)
                    .ok()
                    .map(|dt| dt.date_naive())
            })
            .map(Self::from_date)
    }
}

/// Fixed-order numeric input of the trained models
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub year: f64,
    pub month: f64,
    pub day_of_week: f64,
    pub number_of_engines: f64,
    pub country: f64,
    pub weather_condition: f64,
    pub flight_phase: f64,
    pub engine_type: f64,
}

impl FeatureVector {
    /// Values in [`FEATURE_NAMES`] order
    pub fn to_array(&self) -> [f64; N_FEATURES] {
        [
            self.year,
            self.month,
            self.day_of_week,
            self.number_of_engines,
            self.country,
            self.weather_condition,
            self.flight_phase,
            self.engine_type,
        ]
    }
}

/// Stack feature vectors into an `n × N_FEATURES` matrix
pub fn feature_matrix(rows: &[FeatureVector]) -> Result<Array2<f64>> {
    let values: Vec<f64> = rows.iter().flat_map(|row| row.to_array()).collect();
    Array2::from_shape_vec((rows.len(), N_FEATURES), values)
        .map_err(|e| AppError::Internal(format!("Failed to build feature matrix: {}", e)))
}

/// A raw record augmented with derived and encoded columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformedRecord {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day_of_week: Option<u32>,
    pub quarter: Option<u32>,
    pub number_of_engines: Option<f64>,
    pub categories: EncodedCategories,
    pub is_amateur_built: u8,
    pub severity_score: f64,
    pub injury_severity: Option<String>,
}

impl TransformedRecord {
    /// Model features, or `None` when a required value is missing
    pub fn features(&self) -> Option<FeatureVector> {
        Some(FeatureVector {
            year: f64::from(self.year?),
            month: f64::from(self.month?),
            day_of_week: f64::from(self.day_of_week?),
            number_of_engines: self.number_of_engines?,
            country: f64::from(self.categories.country),
            weather_condition: f64::from(self.categories.weather_condition),
            flight_phase: f64::from(self.categories.flight_phase),
            engine_type: f64::from(self.categories.engine_type),
        })
    }
}

/// Turns raw records into model-ready rows; owns the categorical encoders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureTransformer {
    encoders: Option<CategoricalEncoders>,
}

impl FeatureTransformer {
    /// Create an unfitted transformer
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap encoders restored from a model bundle
    pub fn from_encoders(encoders: CategoricalEncoders) -> Self {
        Self {
            encoders: Some(encoders),
        }
    }

    /// Fit the encoders on `records` (first call only) and transform them.
    ///
    /// Once fitted, the vocabulary is frozen: later calls encode with the
    /// existing encoders, as `transform` does.
    pub fn fit_transform(&mut self, records: &[RawRecord]) -> Vec<TransformedRecord> {
        let encoders = self.encoders.get_or_insert_with(|| {
            let encoders = CategoricalEncoders::fit(records);
            for encoder in encoders.iter() {
                debug!(column = encoder.column(), classes = encoder.len(), "Fitted categorical encoder");
            }
            encoders
        });

        records.iter().map(|r| apply(encoders, r)).collect()
    }

    /// Transform a batch with the frozen encoders
    pub fn transform(&self, records: &[RawRecord]) -> Result<Vec<TransformedRecord>> {
        let encoders = self.fitted()?;
        Ok(records.iter().map(|r| apply(encoders, r)).collect())
    }

    /// Transform a single record with the frozen encoders
    pub fn transform_one(&self, record: &RawRecord) -> Result<TransformedRecord> {
        Ok(apply(self.fitted()?, record))
    }

    pub fn encoders(&self) -> Option<&CategoricalEncoders> {
        self.encoders.as_ref()
    }

    pub fn into_encoders(self) -> Option<CategoricalEncoders> {
        self.encoders
    }

    pub fn is_fitted(&self) -> bool {
        self.encoders.is_some()
    }

    fn fitted(&self) -> Result<&CategoricalEncoders> {
        self.encoders.as_ref().ok_or_else(|| {
            AppError::NotFitted("FeatureTransformer must be fitted before transform".to_string())
        })
    }
}

fn apply(encoders: &CategoricalEncoders, record: &RawRecord) -> TransformedRecord {
    let date = record.event_date.as_deref().and_then(EventDate::parse);

    TransformedRecord {
        year: date.map(|d| d.year),
        month: date.map(|d| d.month),
        day_of_week: date.map(|d| d.day_of_week),
        quarter: date.map(|d| d.quarter),
        number_of_engines: record.engines(),
        categories: encoders.encode(record),
        is_amateur_built: u8::from(record.amateur_built.as_deref() == Some("Yes")),
        severity_score: SeverityScorer::score(record),
        injury_severity: record.severity_label().map(str::to_string),
    }
}
