//! Calibrator configuration
//!
//! Stored as a RON file. Missing fields fall back to their defaults.

use crate::error::TuningError;
use crate::proj::{Brush, Color};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibratorConfig {
    /// Warp grid columns for new tunings
    pub grid_columns: usize,
    /// Warp grid rows for new tunings
    pub grid_rows: usize,
    /// Brush radius in mask pixels
    pub brush_radius: f32,
    /// Brush feather (0 = hard edge)
    pub brush_feather: f32,
    /// Brush opacity
    pub brush_opacity: f32,
    /// Border around the projector image in the tuning view (fraction of image size)
    pub border: f32,
    /// Letterbox the tuning view instead of stretching it
    pub keep_aspect_ratio: bool,
    /// Resolution of tunings without an assigned screen
    pub standard_screen_width: u32,
    pub standard_screen_height: u32,
    /// Identification colors assigned to new tunings in order
    pub palette: Vec<Color>,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        Self {
            grid_columns: 6,
            grid_rows: 6,
            brush_radius: 50.0,
            brush_feather: 0.0,
            brush_opacity: 1.0,
            border: 0.0,
            keep_aspect_ratio: true,
            standard_screen_width: 1920,
            standard_screen_height: 1080,
            palette: vec![
                Color::rgb(0xFF, 0xFF, 0xFF),
                Color::rgb(0xFF, 0x3B, 0x30),
                Color::rgb(0x34, 0xC7, 0x59),
                Color::rgb(0x00, 0x7A, 0xFF),
                Color::rgb(0xFF, 0xCC, 0x00),
                Color::rgb(0xAF, 0x52, 0xDE),
                Color::rgb(0x5A, 0xC8, 0xFA),
                Color::rgb(0xFF, 0x95, 0x00),
            ],
        }
    }
}

impl CalibratorConfig {
    pub fn standard_screen(&self) -> (u32, u32) {
        (self.standard_screen_width, self.standard_screen_height)
    }

    /// Brush configured for new tunings
    pub fn brush(&self) -> Brush {
        let mut brush = Brush::new(self.brush_radius);
        brush.set_feather(self.brush_feather);
        brush.set_opacity(self.brush_opacity);
        brush
    }

    /// Palette color for the n-th tuning, cycling through the palette
    pub fn palette_color(&self, index: usize) -> Color {
        if self.palette.is_empty() {
            return Color::WHITE;
        }
        self.palette[index % self.palette.len()]
    }

    /// Parse a config from RON text
    pub fn from_ron(text: &str) -> Result<Self, TuningError> {
        Ok(ron::from_str(text)?)
    }

    /// Serialize as pretty-printed RON
    pub fn to_ron(&self) -> Result<String, TuningError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Load a config from a RON file
    pub fn load(path: &Path) -> Result<Self, TuningError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_ron(&text)?;
        log::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Save the config as a RON file
    pub fn save(&self, path: &Path) -> Result<(), TuningError> {
        std::fs::write(path, self.to_ron()?)?;
        log::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ron_round_trip() {
        let mut config = CalibratorConfig::default();
        config.grid_columns = 9;
        config.border = 0.1;
        config.palette.truncate(2);

        let text = config.to_ron().unwrap();
        assert_eq!(CalibratorConfig::from_ron(&text).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = CalibratorConfig::from_ron("(grid_rows: 3, keep_aspect_ratio: false)").unwrap();
        assert_eq!(config.grid_rows, 3);
        assert_eq!(config.grid_columns, 6);
        assert!(!config.keep_aspect_ratio);
        assert_eq!(config.standard_screen(), (1920, 1080));
    }

    #[test]
    fn test_palette_cycles() {
        let config = CalibratorConfig::default();
        assert_eq!(config.palette_color(0), Color::WHITE);
        assert_eq!(config.palette_color(8), Color::WHITE);
        assert_eq!(config.palette_color(1), Color::rgb(0xFF, 0x3B, 0x30));

        let empty = CalibratorConfig {
            palette: Vec::new(),
            ..Default::default()
        };
        assert_eq!(empty.palette_color(3), Color::WHITE);
    }

    #[test]
    fn test_invalid_ron_is_an_error() {
        assert!(matches!(
            CalibratorConfig::from_ron("(grid_rows: \"many\")"),
            Err(TuningError::ConfigParse(_))
        ));
    }
}
