//! Pool presets
//!
//! A preset lists pools to install in one go, typically at start-up. Presets
//! are plain data and load from RON or JSON:
//!
//! ```ron
//! (
//!     presets: [
//!         (prototype: "bullet", settings: (capacity: 128, preload: 64)),
//!         (prototype: "spark", settings: (overflow: Recycle)),
//!         (prototype: "debris", enabled: false),
//!     ],
//! )
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{PoolError, PoolResult, PoolSettings};
use crate::pool::handle::PrototypeKey;

/// One pool to install
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolPreset {
    /// Prototype the pool instantiates
    pub prototype: PrototypeKey,
    /// Disabled entries are skipped
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Pool settings; preload is clamped to the capacity
    #[serde(default)]
    pub settings: PoolSettings,
}

fn enabled_by_default() -> bool {
    true
}

impl PoolPreset {
    /// Create an enabled entry
    #[must_use]
    pub fn new(prototype: impl Into<PrototypeKey>, settings: PoolSettings) -> Self {
        Self {
            prototype: prototype.into(),
            enabled: true,
            settings,
        }
    }

    /// Disable the entry
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A list of pools to install together
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolsPreset {
    /// Entries, installed in order
    #[serde(default)]
    pub presets: Vec<PoolPreset>,
}

impl PoolsPreset {
    /// Parse a preset from a RON string
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a valid preset
    pub fn from_ron_str(source: &str) -> PoolResult<Self> {
        ron::from_str(source).map_err(|e| PoolError::Config(e.to_string()))
    }

    /// Serialize the preset to pretty RON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn to_ron_string(&self) -> PoolResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| PoolError::Config(e.to_string()))
    }

    /// Load a preset from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_ron(path: impl AsRef<Path>) -> PoolResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| PoolError::Config(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Parse a preset from a JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a valid preset
    pub fn from_json_str(source: &str) -> PoolResult<Self> {
        serde_json::from_str(source).map_err(|e| PoolError::Config(e.to_string()))
    }

    /// Load a preset from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_json(path: impl AsRef<Path>) -> PoolResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| PoolError::Config(e.to_string()))?;
        Self::from_json_str(&content)
    }

    /// Number of enabled entries
    #[must_use]
    pub fn enabled_count(&self) -> usize {
        self.presets.iter().filter(|p| p.enabled).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OverflowPolicy;

    #[test]
    fn test_preset_from_ron() {
        let preset = PoolsPreset::from_ron_str(
            r#"(
                presets: [
                    (prototype: "bullet", settings: (capacity: 128, preload: 64)),
                    (prototype: "spark", settings: (overflow: Recycle)),
                    (prototype: "debris", enabled: false),
                ],
            )"#,
        )
        .unwrap();

        assert_eq!(preset.presets.len(), 3);
        assert_eq!(preset.enabled_count(), 2);
        assert_eq!(preset.presets[0].prototype.as_str(), "bullet");
        assert_eq!(preset.presets[0].settings.capacity, 128);
        assert_eq!(preset.presets[1].settings.overflow, OverflowPolicy::Recycle);
        assert_eq!(preset.presets[1].settings.capacity, 32);
    }

    #[test]
    fn test_preset_ron_round_trip() {
        let preset = PoolsPreset {
            presets: vec![PoolPreset::new("orb", PoolSettings::default().with_capacity(5))],
        };

        let ron = preset.to_ron_string().unwrap();
        assert_eq!(PoolsPreset::from_ron_str(&ron).unwrap(), preset);
    }

    #[test]
    fn test_preset_from_json() {
        let preset = PoolsPreset::from_json_str(
            r#"{"presets": [{"prototype": "orb", "settings": {"persistent": true}}]}"#,
        )
        .unwrap();

        assert!(preset.presets[0].enabled);
        assert!(preset.presets[0].settings.persistent);
    }

    #[test]
    fn test_preset_invalid() {
        assert!(matches!(
            PoolsPreset::from_ron_str("(presets: [(enabled: true)])"),
            Err(PoolError::Config(_))
        ));
    }
}
