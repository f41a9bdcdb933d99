use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use validator::Validate;

/// Sparse flight-context input for a single prediction.
///
/// Every key is optional; missing keys take the configured
/// [`PredictionDefaults`](crate::config::PredictionDefaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PredictionRequest {
    /// Operator name (informational, not a model feature)
    #[validate(length(max = 128))]
    pub airline: Option<String>,

    /// Aircraft make/model (informational, not a model feature)
    #[validate(length(max = 128))]
    pub aircraft_type: Option<String>,

    /// Origin airport code (informational, not a model feature)
    #[validate(length(max = 16))]
    pub departure_airport: Option<String>,

    /// Destination airport code (informational, not a model feature)
    #[validate(length(max = 16))]
    pub arrival_airport: Option<String>,

    /// "VMC" or "IMC" in the source dataset
    #[validate(length(max = 64))]
    pub weather_condition: Option<String>,

    /// Broad phase of flight, e.g. "CRUISE", "LANDING"
    #[validate(length(max = 64))]
    pub flight_phase: Option<String>,

    #[validate(range(max = 16))]
    #[serde(default, deserialize_with = "lenient_integer")]
    pub number_of_engines: Option<u32>,

    #[validate(length(max = 64))]
    pub engine_type: Option<String>,

    #[validate(range(min = 1, max = 12))]
    #[serde(default, deserialize_with = "lenient_integer")]
    pub month: Option<u32>,

    /// Monday = 0
    #[validate(range(max = 6))]
    #[serde(default, deserialize_with = "lenient_integer")]
    pub day_of_week: Option<u32>,

    #[validate(range(min = 1900, max = 2200))]
    #[serde(default, deserialize_with = "lenient_integer")]
    pub year: Option<i32>,

    #[validate(length(max = 128))]
    pub country: Option<String>,
}

/// Accept a number or a numeric string. Anything that does not parse to an
/// integer in range for `T` is treated as missing.
fn lenient_integer<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let parsed = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().and_then(whole_number)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole_number))
        }
        _ => None,
    };
    Ok(parsed.and_then(|n| T::try_from(n).ok()))
}

fn whole_number(v: f64) -> Option<i64> {
    (v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64).then(|| v as i64)
}

/// Three-tier risk classification derived from the severity score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl RiskLevel {
    /// Score above 10 is high, above 5 is medium, anything else low
    pub fn from_score(score: f64) -> Self {
        if score > 10.0 {
            RiskLevel::High
        } else if score > 5.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Outcome of a prediction call. Always well-formed, even when degraded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub severity_class: String,

    /// Predicted severity score, rounded to two decimals
    pub severity_score: f64,

    pub risk_level: RiskLevel,

    /// 0..=100
    pub risk_score: u8,

    pub delay_prediction: i64,

    /// Maximum class probability as a percentage
    pub confidence: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictionResult {
    pub const NOT_LOADED: &'static str = "Models not loaded";

    /// Build a result from the raw model outputs
    pub fn from_outputs(severity_class: impl Into<String>, score: f64, max_probability: f64) -> Self {
        let score = if score.is_finite() { score.max(0.0) } else { 0.0 };

        Self {
            severity_class: severity_class.into(),
            severity_score: round2(score),
            risk_level: RiskLevel::from_score(score),
            risk_score: (score * 10.0).round().clamp(0.0, 100.0) as u8,
            delay_prediction: (score * 5.0).round() as i64,
            confidence: round2(max_probability * 100.0),
            error: None,
        }
    }

    /// Result returned when no model bundle is available
    pub fn not_loaded() -> Self {
        Self {
            severity_class: "Unknown".to_string(),
            ..Self::degraded(Self::NOT_LOADED)
        }
    }

    /// Result returned when feature construction or inference fails
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            severity_class: "Error".to_string(),
            ..Self::degraded(error)
        }
    }

    fn degraded(error: impl Into<String>) -> Self {
        Self {
            severity_class: String::new(),
            severity_score: 0.0,
            risk_level: RiskLevel::Unknown,
            risk_score: 0,
            delay_prediction: 0,
            confidence: 0.0,
            error: Some(error.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_thresholds() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(5.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(5.01), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(10.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(10.5), RiskLevel::High);
    }

    #[test]
    fn test_from_outputs_medium_scenario() {
        // fatal=2, serious=1, minor=0 -> 2*3 + 1*2 = 8
        let result = PredictionResult::from_outputs("Fatal(2)", 8.0, 0.734);

        assert_eq!(result.severity_score, 8.0);
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert_eq!(result.risk_score, 80);
        assert_eq!(result.delay_prediction, 40);
        assert_eq!(result.confidence, 73.4);
        assert!(!result.is_degraded());
    }

    #[test]
    fn test_risk_score_is_capped() {
        let result = PredictionResult::from_outputs("Fatal(9)", 27.456, 1.0);
        assert_eq!(result.risk_score, 100);
        assert_eq!(result.severity_score, 27.46);
        assert_eq!(result.delay_prediction, 137);
        assert_eq!(result.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_not_loaded_shape() {
        let result = PredictionResult::not_loaded();
        assert_eq!(result.severity_class, "Unknown");
        assert_eq!(result.severity_score, 0.0);
        assert_eq!(result.risk_level, RiskLevel::Unknown);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.error.as_deref(), Some("Models not loaded"));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["risk_level"], "Unknown");
        assert_eq!(json["error"], "Models not loaded");
    }

    #[test]
    fn test_error_omitted_when_absent() {
        let json = serde_json::to_value(PredictionResult::from_outputs("Incident", 0.0, 0.5)).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["risk_level"], "Low");
    }

    #[test]
    fn test_request_validation() {
        let ok = PredictionRequest {
            month: Some(12),
            day_of_week: Some(6),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let bad_month = PredictionRequest {
            month: Some(13),
            ..Default::default()
        };
        assert!(bad_month.validate().is_err());

        let bad_day = PredictionRequest {
            day_of_week: Some(7),
            ..Default::default()
        };
        assert!(bad_day.validate().is_err());
    }

    #[test]
    fn test_request_from_sparse_json() {
        let request: PredictionRequest =
            serde_json::from_str(r#"{"weather_condition": "IMC", "number_of_engines": 1}"#).unwrap();
        assert_eq!(request.weather_condition.as_deref(), Some("IMC"));
        assert_eq!(request.number_of_engines, Some(1));
        assert!(request.month.is_none());
    }

    #[test]
    fn test_request_accepts_numeric_strings() {
        let json = r#"{
            "airline": "",
            "aircraft_type": "",
            "departure_airport": "",
            "arrival_airport": "",
            "weather_condition": "VMC",
            "flight_phase": "CRUISE",
            "number_of_engines": "2",
            "engine_type": "Jet",
            "month": "6",
            "day_of_week": 3,
            "year": "2008"
        }"#;
        let request: PredictionRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.number_of_engines, Some(2));
        assert_eq!(request.month, Some(6));
        assert_eq!(request.day_of_week, Some(3));
        assert_eq!(request.year, Some(2008));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_unparseable_numbers_are_missing() {
        let request: PredictionRequest = serde_json::from_str(
            r#"{"number_of_engines": "two", "month": "", "day_of_week": -1, "year": 2008.5}"#,
        )
        .unwrap();

        assert!(request.number_of_engines.is_none());
        assert!(request.month.is_none());
        assert!(request.day_of_week.is_none());
        assert!(request.year.is_none());
    }

    #[test]
    fn test_blank_categories_pass_validation() {
        let request = PredictionRequest {
            weather_condition: Some(String::new()),
            flight_phase: Some("  ".to_string()),
            country: Some(String::new()),
            ..Default::default()
        };
        assert!(request.validate().is_ok());
    }
}
