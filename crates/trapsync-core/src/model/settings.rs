//! User display preferences.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    #[default]
    MonthDayYear,
    ShortMonthDayYear,
    DayMonthYear,
    ShortDayMonthYear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFormat {
    #[default]
    Time24Hour,
    Time24HourSeconds,
    Time12HourAmPm,
    Time12HourSecondsAmPm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationFormat {
    #[default]
    LatLong,
    Utm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnits {
    Feet,
    #[default]
    Meters,
}

/// The settings document. Unknown or missing fields fall back to defaults so
/// older remote documents still load.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub date_format: DateFormat,
    pub time_format: TimeFormat,
    pub location_format: LocationFormat,
    pub distance_units: DistanceUnits,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_document_fills_defaults() {
        let s: Settings = serde_json::from_str(r#"{"distance_units":"feet"}"#).unwrap();
        assert_eq!(s.distance_units, DistanceUnits::Feet);
        assert_eq!(s.date_format, DateFormat::MonthDayYear);
        assert_eq!(s.location_format, LocationFormat::LatLong);
    }
}
