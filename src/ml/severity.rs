use crate::models::{coerce_number, RawRecord};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

pub const FATAL_WEIGHT: f64 = 3.0;
pub const SERIOUS_WEIGHT: f64 = 2.0;
pub const MINOR_WEIGHT: f64 = 1.0;

/// Weighted injury score: 3 × fatal + 2 × serious + 1 × minor.
pub struct SeverityScorer;

impl SeverityScorer {
    /// Score a record's injury counts. Missing or malformed counts count as zero.
    pub fn score(record: &RawRecord) -> f64 {
        Self::score_counts(
            injury_count(record.fatal_injuries.as_deref()),
            injury_count(record.serious_injuries.as_deref()),
            injury_count(record.minor_injuries.as_deref()),
        )
    }

    pub fn score_batch(records: &[RawRecord]) -> Vec<f64> {
        records.iter().map(Self::score).collect()
    }

    /// Score already-numeric counts; negative and non-finite inputs are zeroed
    pub fn score_counts(fatal: f64, serious: f64, minor: f64) -> f64 {
        FATAL_WEIGHT * sanitize(fatal) + SERIOUS_WEIGHT * sanitize(serious) + MINOR_WEIGHT * sanitize(minor)
    }
}

fn injury_count(raw: Option<&str>) -> f64 {
    coerce_number(raw).map(sanitize).unwrap_or(0.0)
}

fn sanitize(count: f64) -> f64 {
    if count.is_finite() && count > 0.0 {
        count
    } else {
        0.0
    }
}

/// Coarse severity ranges used for the target-distribution report
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum SeverityBand {
    #[strum(serialize = "0 (No Injuries)")]
    NoInjuries,
    #[strum(serialize = "1-5 (Minor)")]
    Minor,
    #[strum(serialize = "6-15 (Moderate)")]
    Moderate,
    #[strum(serialize = "16-30 (Serious)")]
    Serious,
    #[strum(serialize = "31+ (Severe)")]
    Severe,
}

impl SeverityBand {
    pub fn from_score(score: f64) -> Self {
        if score <= 0.0 {
            SeverityBand::NoInjuries
        } else if score <= 5.0 {
            SeverityBand::Minor
        } else if score <= 15.0 {
            SeverityBand::Moderate
        } else if score <= 30.0 {
            SeverityBand::Serious
        } else {
            SeverityBand::Severe
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandCount {
    pub band: SeverityBand,
    pub count: usize,
}

/// Count records per severity band; every band is listed, in ascending order
pub fn score_distribution(records: &[RawRecord]) -> Vec<BandCount> {
    use strum::IntoEnumIterator;

    let scores = SeverityScorer::score_batch(records);
    SeverityBand::iter()
        .map(|band| BandCount {
            band,
            count: scores
                .iter()
                .filter(|score| SeverityBand::from_score(**score) == band)
                .count(),
        })
        .collect()
}
