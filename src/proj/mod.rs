//! Per-projector calibration
//!
//! A [`Tuning`] bundles everything needed to calibrate one projector: its
//! projection model, the warp grid for geometric correction and the blend
//! mask for luminance blending.

mod blend;
mod color;
mod projector;
mod setup;
mod warp;

pub use blend::{interpolate_stroke, BlendMask, Brush, StrokeBuffer};
pub use color::Color;
pub use projector::Projector;
pub use setup::{ProjectorSetup, SetupRef};
pub use warp::{PointRef, WarpGrid, WarpInterpolation, WarpPoint};

use crate::config::CalibratorConfig;
use crate::display::ScreenInfo;
use crate::error::TuningError;
use glam::Vec2;
use std::rc::Rc;

/// Calibration state of one projector
///
/// Equality is structural over color, projector, warp grid and blend mask.
/// The setup link compares by identity: two tunings are only equal if they
/// reference the very same setup object (or both have none).
#[derive(Debug, Clone, PartialEq)]
pub struct Tuning {
    color: Color,
    projector: Projector,
    setup: Option<SetupRef>,
    warp_grid: WarpGrid,
    blend_mask: BlendMask,
}

impl Default for Tuning {
    fn default() -> Self {
        Self::new(Color::WHITE)
    }
}

impl Tuning {
    /// Create an unbound tuning with default grid and mask
    pub fn new(color: Color) -> Self {
        let projector = Projector::default();
        let (width, height) = projector.resolution();
        Self {
            color,
            projector,
            setup: None,
            warp_grid: WarpGrid::default(),
            blend_mask: BlendMask::new(width, height),
        }
    }

    /// Create a tuning with grid dimensions, brush and fallback resolution from a config
    pub fn with_config(color: Color, config: &CalibratorConfig) -> Self {
        let projector = Projector::new(config.standard_screen());
        let (width, height) = projector.resolution();
        let mut blend_mask = BlendMask::new(width, height);
        blend_mask.set_brush(config.brush());
        Self {
            color,
            projector,
            setup: None,
            warp_grid: WarpGrid::new(config.grid_columns, config.grid_rows),
            blend_mask,
        }
    }

    /// Assemble a tuning from its parts, e.g. when reading a stream
    pub fn from_parts(
        color: Color,
        projector: Projector,
        warp_grid: WarpGrid,
        blend_mask: BlendMask,
    ) -> Self {
        Self {
            color,
            projector,
            setup: None,
            warp_grid,
            blend_mask,
        }
    }

    /// Identification color of the tuning
    pub fn color(&self) -> Color {
        self.color
    }

    /// Set the identification color
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    /// Bind the projector to a (sub-)screen, or unbind it with `None`
    pub fn set_screen(
        &mut self,
        screen: Option<ScreenInfo>,
        sub_screen_index: u32,
    ) -> Result<(), TuningError> {
        self.projector.set_screen(screen, sub_screen_index)?;
        let (width, height) = self.resolution();
        self.blend_mask.ensure_resolution(width, height);
        Ok(())
    }

    pub fn screen(&self) -> Option<&ScreenInfo> {
        self.projector.screen()
    }

    pub fn sub_screen_index(&self) -> u32 {
        self.projector.sub_screen_index()
    }

    /// True if the projector is bound to a screen
    pub fn has_screen(&self) -> bool {
        self.projector.screen().is_some()
    }

    /// Update the resolution used while no screen is assigned
    pub fn set_standard_screen(&mut self, size: (u32, u32)) {
        self.projector.set_fallback_resolution(size);
    }

    /// Output width in pixels; the standard screen width without a screen
    pub fn width(&self) -> u32 {
        self.projector.resolution().0
    }

    /// Output height in pixels; the standard screen height without a screen
    pub fn height(&self) -> u32 {
        self.projector.resolution().1
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.projector.resolution()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.projector.aspect_ratio()
    }

    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    pub fn projector_mut(&mut self) -> &mut Projector {
        &mut self.projector
    }

    /// Weak link to the session-owned setup, if any
    pub fn setup(&self) -> Option<&SetupRef> {
        self.setup.as_ref()
    }

    /// Link a session-owned setup and apply its pose to the projector
    pub fn set_setup(&mut self, setup: &Rc<ProjectorSetup>) {
        setup.apply(&mut self.projector);
        self.setup = Some(SetupRef::new(setup));
    }

    /// Drop the setup link; the projector pose is kept
    pub fn clear_setup(&mut self) {
        self.setup = None;
    }

    pub fn warp_grid(&self) -> &WarpGrid {
        &self.warp_grid
    }

    pub fn warp_grid_mut(&mut self) -> &mut WarpGrid {
        &mut self.warp_grid
    }

    pub fn blend_mask(&self) -> &BlendMask {
        &self.blend_mask
    }

    pub fn blend_mask_mut(&mut self) -> &mut BlendMask {
        &mut self.blend_mask
    }

    /// Paint a stroke segment given in projector-local coordinates
    ///
    /// The mask raster is first brought to the current output resolution.
    /// `leftover` is measured in mask pixels.
    pub fn paint_stroke(&mut self, from: Vec2, to: Vec2, leftover: f32) -> f32 {
        let (width, height) = self.resolution();
        self.blend_mask.ensure_resolution(width, height);
        let from = self.blend_mask.pixel_pos(from);
        let to = self.blend_mask.pixel_pos(to);
        self.blend_mask.draw_line(from, to, leftover)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::ScreenRect;

    #[test]
    fn test_default_tuning() {
        let tuning = Tuning::default();
        assert_eq!(tuning.color(), Color::WHITE);
        assert!(!tuning.has_screen());
        assert_eq!(tuning.resolution(), (1920, 1080));
        assert_eq!(tuning.blend_mask().resolution(), (1920, 1080));
        assert!(tuning.warp_grid().is_identity());
    }

    #[test]
    fn test_standard_screen_fallback() {
        let mut tuning = Tuning::default();
        tuning.set_standard_screen((1280, 720));
        assert_eq!((tuning.width(), tuning.height()), (1280, 720));

        let screen = ScreenInfo::tiled("tiled", ScreenRect::new(0, 0, 3072, 768), 3);
        tuning.set_screen(Some(screen), 2).unwrap();
        assert_eq!((tuning.width(), tuning.height()), (1024, 768));

        tuning.set_screen(None, 0).unwrap();
        assert_eq!((tuning.width(), tuning.height()), (1280, 720));
    }

    #[test]
    fn test_screen_change_resizes_mask_before_paint() {
        let mut tuning = Tuning::default();
        tuning.paint_stroke(Vec2::new(-0.25, 0.0), Vec2::new(0.25, 0.0), 0.0);
        assert!(!tuning.blend_mask().strokes().is_clear());

        let screen = ScreenInfo::new("small", ScreenRect::new(0, 0, 640, 480));
        tuning.set_screen(Some(screen), 0).unwrap();
        assert_eq!(tuning.blend_mask().resolution(), (640, 480));
        assert!(tuning.blend_mask().strokes().is_clear());

        // Fallback change without a setter on the mask is caught on the next paint
        tuning.set_screen(None, 0).unwrap();
        tuning.set_standard_screen((800, 600));
        tuning.paint_stroke(Vec2::new(0.45, 0.45), Vec2::new(0.6, 0.6), 0.0);
        assert_eq!(tuning.blend_mask().resolution(), (800, 600));
    }

    #[test]
    fn test_equality_is_structural() {
        let mut a = Tuning::new(Color::rgb(255, 0, 0));
        let mut b = a.clone();
        assert_eq!(a, b);

        b.warp_grid_mut().select_all();
        assert_ne!(a, b);
        a.warp_grid_mut().select_all();
        assert_eq!(a, b);

        b.set_color(Color::rgb(0, 255, 0));
        assert_ne!(a, b);
    }

    #[test]
    fn test_equality_compares_setup_by_identity() {
        let setup_a = Rc::new(ProjectorSetup::default());
        let setup_b = Rc::new(ProjectorSetup::default());

        let mut a = Tuning::default();
        let mut b = Tuning::default();
        a.set_setup(&setup_a);
        b.set_setup(&setup_b);
        assert_ne!(a, b);

        b.set_setup(&setup_a);
        assert_eq!(a, b);
    }
}
