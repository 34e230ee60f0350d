//! Species and location catalog entries.

use serde::{Deserialize, Serialize};

/// Icon shown for a species that has none of its own.
pub const DEFAULT_SPECIES_ICON: &str = "https://i.imgur.com/4qz5mI0.png";

fn default_icon() -> String {
    DEFAULT_SPECIES_ICON.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    pub name: String,
    pub scientific_name: String,
    #[serde(default = "default_icon")]
    pub icon_url: String,
    /// Single-key shortcut used while tagging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_binding: Option<char>,
}

impl Species {
    pub fn new(name: impl Into<String>, scientific_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scientific_name: scientific_name.into(),
            icon_url: default_icon(),
            key_binding: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.scientific_name.trim().is_empty()
    }
}

/// Elevation value meaning "not entered".
pub const UNSET_ELEVATION: f64 = -20000.0;

/// A camera-trap site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    /// Meters above sea level.
    pub elevation: f64,
}

impl Location {
    pub fn new(name: impl Into<String>, id: impl Into<String>, lat: f64, lng: f64, elevation: f64) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            lat,
            lng,
            elevation,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
            && !self.id.is_empty()
            && (-85.0..=85.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
            && self.elevation != UNSET_ELEVATION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn species_icon_defaults_when_missing() {
        let s: Species =
            serde_json::from_str(r#"{"name":"Ocelot","scientific_name":"Leopardus pardalis"}"#).unwrap();
        assert_eq!(s.icon_url, DEFAULT_SPECIES_ICON);
        assert_eq!(s.key_binding, None);
        assert!(s.is_valid());
        assert!(!Species::new(" ", "x").is_valid());
    }

    #[test]
    fn location_bounds() {
        assert!(Location::new("Ridge", "R1", 31.9, -110.8, 1400.0).is_valid());
        assert!(!Location::new("Pole", "P", 89.0, 0.0, 0.0).is_valid());
        assert!(!Location::new("Ridge", "R1", 31.9, -181.0, 10.0).is_valid());
        assert!(!Location::new("Ridge", "R1", 31.9, -110.8, UNSET_ELEVATION).is_valid());
        assert!(!Location::new("", "R1", 0.0, 0.0, 0.0).is_valid());
    }
}
