//! Unit configuration loaded from `units.toml`.

use std::path::Path;

use serde::Deserialize;

use district_stats_snapshot::is_valid_unit_id;

use crate::ScrapeError;

/// Unit list shipped with the binary, used when no file is configured.
pub const DEFAULT_UNITS_TOML: &str = include_str!("../units.toml");

const fn enabled_default() -> bool {
    true
}

/// One configured collection target.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UnitConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
struct UnitsFile {
    #[serde(default)]
    units: Vec<UnitConfig>,
}

/// The configured collection targets.
#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    units: Vec<UnitConfig>,
}

impl UnitRegistry {
    /// Parses a `units.toml` document.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Registry`] if the document is malformed.
    pub fn from_toml_str(s: &str) -> Result<Self, ScrapeError> {
        let file: UnitsFile = toml::from_str(s)?;
        Ok(Self { units: file.units })
    }

    /// Loads `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ScrapeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// The bundled default unit list.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Registry`] if the bundled file is malformed.
    pub fn bundled() -> Result<Self, ScrapeError> {
        Self::from_toml_str(DEFAULT_UNITS_TOML)
    }

    /// Every configured unit, including disabled ones.
    #[must_use]
    pub fn units(&self) -> &[UnitConfig] {
        &self.units
    }

    #[must_use]
    pub fn get(&self, unit_id: &str) -> Option<&UnitConfig> {
        self.units.iter().find(|u| u.id == unit_id)
    }

    /// Enabled unit IDs, sorted and de-duplicated. Invalid IDs are dropped
    /// with a warning.
    #[must_use]
    pub fn unit_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .units
            .iter()
            .filter(|u| u.enabled)
            .filter(|u| {
                let valid = is_valid_unit_id(&u.id);
                if !valid {
                    log::warn!("Ignoring invalid unit ID {:?} in unit configuration", u.id);
                }
                valid
            })
            .map(|u| u.id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_valid_ids_only() {
        let registry = UnitRegistry::from_toml_str(
            r#"
            [[units]]
            id = "42"
            name = "District 42"
            region = "05"

            [[units]]
            id = "7"
            enabled = false

            [[units]]
            id = "../etc"

            [[units]]
            id = "1"

            [[units]]
            id = "42"
            "#,
        )
        .unwrap();

        assert_eq!(registry.unit_ids(), vec!["1", "42"]);
        assert_eq!(registry.units().len(), 5);
        assert_eq!(registry.get("42").map(|u| u.region.as_str()), Some("05"));
        assert!(registry.get("99").is_none());
    }

    #[test]
    fn bundled_units_parse() {
        let registry = UnitRegistry::bundled().unwrap();
        assert!(!registry.unit_ids().is_empty());
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(matches!(
            UnitRegistry::from_toml_str("[[units]]\nid = 42"),
            Err(ScrapeError::Registry(_))
        ));
        assert!(UnitRegistry::from_toml_str("").unwrap().unit_ids().is_empty());
    }
}
