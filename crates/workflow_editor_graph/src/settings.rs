// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canvas settings and configuration.
//!
//! Settings are stored as pretty RON. Missing fields fall back to their
//! defaults so older files keep loading.

use crate::geometry::{GeometryConfig, Point};
use crate::port::{DataType, PortTypeRegistry};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE_NAME: &str = "canvas.ron";

/// Editor canvas configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasSettings {
    /// Format version
    pub version: u32,
    /// Node box and anchor dimensions
    pub geometry: GeometryConfig,
    /// Snap dragged nodes to the grid when released
    pub snap_to_grid: bool,
    /// Grid size for snapping
    pub snap_size: f32,
    /// Where the first auto-placed node goes
    pub spawn_origin: Point,
    /// Offset between consecutive auto-placed nodes
    pub spawn_step: Point,
    /// Extra accepted `(output, input)` type pairs
    pub coercions: Vec<(DataType, DataType)>,
    /// Segments used when flattening edges for drawing
    pub curve_segments: usize,
}

impl Default for CanvasSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            geometry: GeometryConfig::default(),
            snap_to_grid: false,
            snap_size: 20.0,
            spawn_origin: Point::new(100.0, 100.0),
            spawn_step: Point::new(40.0, 40.0),
            coercions: Vec::new(),
            curve_segments: 32,
        }
    }
}

impl CanvasSettings {
    /// Build the port type registry these settings describe
    pub fn registry(&self) -> PortTypeRegistry {
        PortTypeRegistry::with_coercions(self.coercions.iter().cloned())
    }

    /// Default slot for the `n`-th auto-placed node
    pub fn spawn_position(&self, n: usize) -> Point {
        let n = n as f32;
        Point::new(
            self.spawn_origin.x + n * self.spawn_step.x,
            self.spawn_origin.y + n * self.spawn_step.y,
        )
        .clamp_non_negative()
    }

    /// Parse settings from RON text
    pub fn from_ron_str(text: &str) -> Result<Self, SettingsError> {
        let settings: CanvasSettings = ron::from_str(text)?;

        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(SettingsError::UnsupportedVersion(settings.version));
        }

        Ok(settings)
    }

    /// Serialize to pretty RON
    pub fn to_ron_string(&self) -> Result<String, SettingsError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_ron_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded canvas settings");
        Ok(settings)
    }

    /// Load settings, falling back to defaults if the file is missing or bad
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(SettingsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "Using default canvas settings: {e}");
                Self::default()
            }
        }
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let content = self.to_ron_string()?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Settings load/save error
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// RON text could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Settings could not be serialized
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Written by a newer version
    #[error("Settings version {0} is newer than supported version {max}", max = SETTINGS_FORMAT_VERSION)]
    UnsupportedVersion(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = CanvasSettings::default();
        assert_eq!(settings.version, SETTINGS_FORMAT_VERSION);
        assert!(!settings.snap_to_grid);
        assert_eq!(settings.geometry.node_width, 180.0);
    }

    #[test]
    fn test_serialization() {
        let mut settings = CanvasSettings::default();
        settings.snap_to_grid = true;
        settings.coercions.push((DataType::Number, DataType::String));

        let text = settings.to_ron_string().unwrap();
        let loaded = CanvasSettings::from_ron_str(&text).unwrap();
        assert_eq!(loaded, settings);
        assert!(loaded
            .registry()
            .is_compatible(&DataType::Number, &DataType::String));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let loaded = CanvasSettings::from_ron_str("(snap_to_grid: true)").unwrap();
        assert!(loaded.snap_to_grid);
        assert_eq!(loaded.snap_size, 20.0);
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let err = CanvasSettings::from_ron_str("(version: 99)").unwrap_err();
        assert!(matches!(err, SettingsError::UnsupportedVersion(99)));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);

        assert_eq!(CanvasSettings::load_or_default(&path), CanvasSettings::default());

        let mut settings = CanvasSettings::default();
        settings.snap_size = 10.0;
        settings.save(&path).unwrap();
        assert_eq!(CanvasSettings::load(&path).unwrap().snap_size, 10.0);
    }

    #[test]
    fn test_spawn_positions_cascade() {
        let settings = CanvasSettings::default();
        assert_eq!(settings.spawn_position(0), Point::new(100.0, 100.0));
        assert_eq!(settings.spawn_position(2), Point::new(180.0, 180.0));
    }
}
