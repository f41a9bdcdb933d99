use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One row of the accident dataset, as handed over by the loading layer.
///
/// Every column is optional and kept in its raw textual form. Numeric and
/// date columns are coerced lazily; values that fail to parse are treated as
/// missing rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "Event Date", default, deserialize_with = "lenient_string")]
    pub event_date: Option<String>,

    #[serde(rename = "Country", default, deserialize_with = "lenient_string")]
    pub country: Option<String>,

    #[serde(rename = "Weather Condition", default, deserialize_with = "lenient_string")]
    pub weather_condition: Option<String>,

    #[serde(rename = "Broad Phase of Flight", default, deserialize_with = "lenient_string")]
    pub flight_phase: Option<String>,

    #[serde(rename = "Aircraft Category", default, deserialize_with = "lenient_string")]
    pub aircraft_category: Option<String>,

    #[serde(rename = "Engine Type", default, deserialize_with = "lenient_string")]
    pub engine_type: Option<String>,

    /// Regulation (FAR part) the flight operated under
    #[serde(rename = "FAR Description", default, deserialize_with = "lenient_string")]
    pub far_description: Option<String>,

    #[serde(rename = "Number of Engines", default, deserialize_with = "lenient_string")]
    pub number_of_engines: Option<String>,

    #[serde(rename = "Amateur Built", default, deserialize_with = "lenient_string")]
    pub amateur_built: Option<String>,

    #[serde(rename = "Total Fatal Injuries", default, deserialize_with = "lenient_string")]
    pub fatal_injuries: Option<String>,

    #[serde(rename = "Total Serious Injuries", default, deserialize_with = "lenient_string")]
    pub serious_injuries: Option<String>,

    #[serde(rename = "Total Minor Injuries", default, deserialize_with = "lenient_string")]
    pub minor_injuries: Option<String>,

    #[serde(rename = "Total Uninjured", default, deserialize_with = "lenient_string")]
    pub uninjured: Option<String>,

    /// Classification target, e.g. "Fatal(2)", "Non-Fatal", "Incident"
    #[serde(rename = "Injury Severity", default, deserialize_with = "lenient_string")]
    pub injury_severity: Option<String>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_date(mut self, date: impl Into<String>) -> Self {
        self.event_date = Some(date.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_weather_condition(mut self, weather: impl Into<String>) -> Self {
        self.weather_condition = Some(weather.into());
        self
    }

    pub fn with_flight_phase(mut self, phase: impl Into<String>) -> Self {
        self.flight_phase = Some(phase.into());
        self
    }

    pub fn with_aircraft_category(mut self, category: impl Into<String>) -> Self {
        self.aircraft_category = Some(category.into());
        self
    }

    pub fn with_engine_type(mut self, engine_type: impl Into<String>) -> Self {
        self.engine_type = Some(engine_type.into());
        self
    }

    pub fn with_far_description(mut self, description: impl Into<String>) -> Self {
        self.far_description = Some(description.into());
        self
    }

    pub fn with_number_of_engines(mut self, engines: impl Into<String>) -> Self {
        self.number_of_engines = Some(engines.into());
        self
    }

    pub fn with_amateur_built(mut self, flag: impl Into<String>) -> Self {
        self.amateur_built = Some(flag.into());
        self
    }

    /// Set the fatal / serious / minor injury counts
    pub fn with_injuries(
        mut self,
        fatal: impl Into<String>,
        serious: impl Into<String>,
        minor: impl Into<String>,
    ) -> Self {
        self.fatal_injuries = Some(fatal.into());
        self.serious_injuries = Some(serious.into());
        self.minor_injuries = Some(minor.into());
        self
    }

    pub fn with_injury_severity(mut self, severity: impl Into<String>) -> Self {
        self.injury_severity = Some(severity.into());
        self
    }

    /// Number of engines, if present and numeric
    pub fn engines(&self) -> Option<f64> {
        coerce_number(self.number_of_engines.as_deref())
    }

    /// Classification label, if present and non-blank
    pub fn severity_label(&self) -> Option<&str> {
        self.injury_severity
            .as_deref()
            .filter(|label| !label.trim().is_empty())
    }
}

/// Parse a raw cell as a finite number; anything else is missing.
pub fn coerce_number(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Accept strings, numbers, booleans or null for a textual column.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(if b { "Yes" } else { "No" }.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_dataset_columns() {
        let json = r#"{
            "Event Date": "2008-12-31",
            "Country": "United States",
            "Weather Condition": "VMC",
            "Number of Engines": 2,
            "Total Fatal Injuries": 1,
            "Total Serious Injuries": "",
            "Total Minor Injuries": null,
            "Amateur Built": "No",
            "Injury Severity": "Fatal(1)"
        }"#;

        let record: RawRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.event_date.as_deref(), Some("2008-12-31"));
        assert_eq!(record.number_of_engines.as_deref(), Some("2"));
        assert_eq!(record.fatal_injuries.as_deref(), Some("1"));
        assert_eq!(record.serious_injuries.as_deref(), Some(""));
        assert!(record.minor_injuries.is_none());
        assert!(record.flight_phase.is_none());
        assert_eq!(record.severity_label(), Some("Fatal(1)"));
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number(Some("2")), Some(2.0));
        assert_eq!(coerce_number(Some(" 1.5 ")), Some(1.5));
        assert_eq!(coerce_number(Some("two")), None);
        assert_eq!(coerce_number(Some("")), None);
        assert_eq!(coerce_number(Some("NaN")), None);
        assert_eq!(coerce_number(None), None);
    }

    #[test]
    fn test_blank_label_is_missing() {
        let record = RawRecord::new().with_injury_severity("   ");
        assert!(record.severity_label().is_none());
    }
}
