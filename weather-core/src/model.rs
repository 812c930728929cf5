use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Offset between the Celsius and Kelvin scales.
pub const CELSIUS_OFFSET: f64 = 273.15;

/// A (country, city) query key, passed to providers untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    country: String,
    city: String,
}

impl Location {
    pub fn new(country: impl Into<String>, city: impl Into<String>) -> Self {
        Self { country: country.into(), city: city.into() }
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    /// `"city,country"`, the query form both supported APIs accept.
    pub fn query_string(&self) -> String {
        format!("{},{}", self.city, self.country)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.country, self.city)
    }
}

/// A temperature measurement in Kelvin, the only unit the aggregator deals in.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Kelvin(pub f64);

impl Kelvin {
    pub fn from_celsius(celsius: f64) -> Self {
        Self(celsius + CELSIUS_OFFSET)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn to_celsius(self) -> f64 {
        self.0 - CELSIUS_OFFSET
    }
}

impl fmt::Display for Kelvin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} K", self.0)
    }
}

/// Outcome of one successful aggregate query.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult {
    pub temperature: Kelvin,
    /// Number of providers whose measurement went into the mean.
    pub contributors: usize,
    pub elapsed: Duration,
    pub queried_at: DateTime<Utc>,
}

/// The payload handed back to whoever asked, ready for JSON encoding.
#[derive(Debug, Clone, Serialize)]
pub struct WeatherReport {
    pub city: String,
    pub temp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_c: Option<f64>,
    pub took: String,
    pub providers: usize,
    pub queried_at: DateTime<Utc>,
}

impl WeatherReport {
    pub fn new(location: &Location, result: &AggregateResult, include_celsius: bool) -> Self {
        Self {
            city: location.city().to_string(),
            temp: result.temperature.value(),
            temp_c: include_celsius.then(|| result.temperature.to_celsius()),
            took: format_elapsed(result.elapsed),
            providers: result.contributors,
            queried_at: result.queried_at,
        }
    }
}

/// Human-readable duration such as `1.52ms` or `2.003s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{elapsed:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn celsius_converts_to_kelvin() {
        let k = Kelvin::from_celsius(16.85);
        assert!((k.value() - 290.0).abs() < 0.01);
        assert!((k.to_celsius() - 16.85).abs() < 1e-9);
    }

    #[test]
    fn location_keeps_input_verbatim() {
        let loc = Location::new("gb", "London");
        assert_eq!(loc.country(), "gb");
        assert_eq!(loc.city(), "London");
        assert_eq!(loc.query_string(), "London,gb");
        assert_eq!(loc.to_string(), "gb/London");
    }

    #[test]
    fn report_serializes_with_optional_celsius() {
        let result = AggregateResult {
            temperature: Kelvin(290.0),
            contributors: 2,
            elapsed: Duration::from_millis(12),
            queried_at: Utc::now(),
        };
        let loc = Location::new("de", "Berlin");

        let with_c = serde_json::to_value(WeatherReport::new(&loc, &result, true)).unwrap();
        assert_eq!(with_c["city"], "Berlin");
        assert_eq!(with_c["temp"], 290.0);
        assert!((with_c["temp_c"].as_f64().unwrap() - 16.85).abs() < 1e-9);
        assert_eq!(with_c["took"], "12ms");
        assert_eq!(with_c["providers"], 2);

        let without_c = serde_json::to_value(WeatherReport::new(&loc, &result, false)).unwrap();
        assert!(without_c.get("temp_c").is_none());
    }
}
