//! Display geometry consumed by the calibration core
//!
//! Screen enumeration is owned by the host application; the core only queries
//! geometry through the read-only [`ScreenSetup`] oracle.

use serde::{Deserialize, Serialize};

/// Rectangle of an output in the virtual desktop, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScreenRect {
    /// Create a rectangle from position and size
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// Snapshot of a physical output
///
/// Tiled outputs (e.g. a triple-head splitter) expose `sub_screens` equal
/// slices side by side; a projector is bound to one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenInfo {
    /// Stable identifier (connector or monitor name)
    pub id: String,
    /// Geometry of the whole output
    pub rect: ScreenRect,
    /// Number of horizontal sub-screens (at least 1)
    pub sub_screens: u32,
}

impl ScreenInfo {
    /// Create an untiled output
    pub fn new(id: impl Into<String>, rect: ScreenRect) -> Self {
        Self {
            id: id.into(),
            rect,
            sub_screens: 1,
        }
    }

    /// Create a tiled output split into `sub_screens` columns
    pub fn tiled(id: impl Into<String>, rect: ScreenRect, sub_screens: u32) -> Self {
        Self {
            id: id.into(),
            rect,
            sub_screens: sub_screens.max(1),
        }
    }

    /// Width of one sub-screen in pixels
    pub fn sub_screen_width(&self) -> u32 {
        self.rect.width / self.sub_screens.max(1)
    }

    /// Height of one sub-screen in pixels
    pub fn sub_screen_height(&self) -> u32 {
        self.rect.height
    }

    /// Size of one sub-screen in pixels
    pub fn sub_screen_size(&self) -> (u32, u32) {
        (self.sub_screen_width(), self.sub_screen_height())
    }
}

/// Read-only oracle over the connected displays
pub trait ScreenSetup {
    /// Resolution used by tunings that have no screen assigned
    fn standard_screen(&self) -> (u32, u32);

    /// Look up a screen by identifier
    fn screen(&self, id: &str) -> Option<ScreenInfo>;

    /// All known screens
    fn screens(&self) -> Vec<ScreenInfo>;
}

/// Fixed list of screens
///
/// Used headless and in tests; a windowing host provides its own oracle.
#[derive(Debug, Clone)]
pub struct StaticScreenSetup {
    standard: (u32, u32),
    screens: Vec<ScreenInfo>,
}

impl Default for StaticScreenSetup {
    fn default() -> Self {
        Self::new((1920, 1080))
    }
}

impl StaticScreenSetup {
    /// Create an oracle without screens and the given standard screen
    pub fn new(standard: (u32, u32)) -> Self {
        Self {
            standard,
            screens: Vec::new(),
        }
    }

    /// Builder variant of `add_screen`
    pub fn with_screen(mut self, screen: ScreenInfo) -> Self {
        self.add_screen(screen);
        self
    }

    /// Add or replace a screen with the same id
    pub fn add_screen(&mut self, screen: ScreenInfo) {
        if let Some(existing) = self.screens.iter_mut().find(|s| s.id == screen.id) {
            *existing = screen;
        } else {
            self.screens.push(screen);
        }
    }

    pub fn remove_screen(&mut self, id: &str) -> Option<ScreenInfo> {
        let pos = self.screens.iter().position(|s| s.id == id)?;
        Some(self.screens.remove(pos))
    }

    pub fn set_standard_screen(&mut self, size: (u32, u32)) {
        self.standard = size;
    }
}

impl ScreenSetup for StaticScreenSetup {
    fn standard_screen(&self) -> (u32, u32) {
        self.standard
    }

    fn screen(&self, id: &str) -> Option<ScreenInfo> {
        self.screens.iter().find(|s| s.id == id).cloned()
    }

    fn screens(&self) -> Vec<ScreenInfo> {
        self.screens.clone()
    }
}
