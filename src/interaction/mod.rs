//! Pointer interaction with a tuning
//!
//! The controller turns raw pointer events from a tuning view into warp grid
//! edits or blend mask strokes, depending on the session mode.

pub mod view;

pub use view::{screen_pos, view_delta, view_rect, ViewRect};

use crate::config::CalibratorConfig;
use crate::error::TuningError;
use crate::session::{Mode, Session};
use glam::Vec2;

/// Button that triggered a pointer event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Right,
    Middle,
}

/// Keyboard modifiers held during a pointer event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// Add to the warp selection instead of replacing it
    pub control: bool,
}

/// A pointer event in view pixels (origin top-left, y down)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub pos: Vec2,
    pub button: PointerButton,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    /// Create an event without modifiers
    pub fn new(pos: Vec2, button: PointerButton) -> Self {
        Self {
            pos,
            button,
            modifiers: Modifiers::default(),
        }
    }

    /// Same event with control held
    pub fn with_control(mut self) -> Self {
        self.modifiers.control = true;
        self
    }
}

/// Pointer state machine for one tuning view
#[derive(Debug, Clone)]
pub struct TuningController {
    index: usize,
    view_size: Vec2,
    border: f32,
    keep_aspect_ratio: bool,
    view_only: bool,
    mouse_down: bool,
    /// Mode the current drag or stroke started in
    drag_mode: Option<Mode>,
    mouse_position: Vec2,
    /// Distance since the last brush stamp, in mask pixels
    leftover: f32,
    /// Tuning whose brush a right-button press inverted
    inverted: Option<usize>,
}

impl TuningController {
    /// Create a controller for tuning `index` with border and aspect from the config
    pub fn new(index: usize, config: &CalibratorConfig) -> Self {
        Self {
            index,
            view_size: Vec2::new(1.0, 1.0),
            border: config.border,
            keep_aspect_ratio: config.keep_aspect_ratio,
            view_only: false,
            mouse_down: false,
            drag_mode: None,
            mouse_position: Vec2::ZERO,
            leftover: 0.0,
            inverted: None,
        }
    }

    pub fn tuning_index(&self) -> usize {
        self.index
    }

    /// Switch to another tuning; ends any drag in progress
    ///
    /// A brush inverted by the ended stroke is restored on the next event.
    pub fn set_tuning_index(&mut self, index: usize) {
        self.end_drag();
        self.index = index;
    }

    pub fn view_size(&self) -> Vec2 {
        self.view_size
    }

    /// Set the widget size in pixels (each axis at least 1)
    pub fn set_view_size(&mut self, width: f32, height: f32) {
        self.view_size = Vec2::new(width.max(1.0), height.max(1.0));
    }

    pub fn border(&self) -> f32 {
        self.border
    }

    /// Set the border around the image in the view (fraction of image size)
    pub fn set_border(&mut self, border: f32) {
        self.border = border.max(0.0);
    }

    pub fn keep_aspect_ratio(&self) -> bool {
        self.keep_aspect_ratio
    }

    pub fn set_keep_aspect_ratio(&mut self, keep_aspect_ratio: bool) {
        self.keep_aspect_ratio = keep_aspect_ratio;
    }

    pub fn view_only(&self) -> bool {
        self.view_only
    }

    /// Ignore presses and releases; moves still track the cursor
    pub fn set_view_only(&mut self, view_only: bool) {
        self.view_only = view_only;
        if view_only {
            self.end_drag();
        }
    }

    /// Tuning whose brush is inverted until the right button is released
    pub fn inverted_tuning(&self) -> Option<usize> {
        self.inverted
    }

    /// End the current drag and restore an inverted brush right away
    pub fn cancel_drag(&mut self, session: &mut Session) -> Result<(), TuningError> {
        self.end_drag();
        self.restore_brush(session)
    }

    pub fn is_dragging(&self) -> bool {
        self.mouse_down
    }

    pub fn mouse_position(&self) -> Vec2 {
        self.mouse_position
    }

    pub fn leftover(&self) -> f32 {
        self.leftover
    }

    /// Visible region of the current tuning
    pub fn view_rect(&self, session: &Session) -> Result<ViewRect, TuningError> {
        let tuning = session
            .tuning(self.index)
            .ok_or(TuningError::NoSuchTuning(self.index))?;
        Ok(view_rect(
            tuning.aspect_ratio(),
            self.view_size.x / self.view_size.y,
            self.border,
            self.keep_aspect_ratio,
        ))
    }

    /// Pointer position in projector-local coordinates
    pub fn screen_pos(&self, session: &Session, pos: Vec2) -> Result<Vec2, TuningError> {
        Ok(screen_pos(pos, self.view_size, &self.view_rect(session)?))
    }

    /// Handle a button press: pick a warp point or start a blend stroke
    pub fn pointer_pressed(
        &mut self,
        session: &mut Session,
        event: PointerEvent,
    ) -> Result<(), TuningError> {
        self.restore_brush(session)?;
        if self.view_only {
            return Ok(());
        }
        let rect = self.view_rect(session)?;
        self.mouse_position = event.pos;
        self.mouse_down = true;
        let mode = session.mode();
        self.drag_mode = Some(mode);

        match mode {
            Mode::Warp => {
                let pos = screen_pos(event.pos, self.view_size, &rect);
                session.with_tuning_mut(self.index, |tuning, _| {
                    let grid = tuning.warp_grid_mut();
                    let selected_count = grid.get_selected().len();
                    let Some(point) = grid.select_nearest(pos) else {
                        return;
                    };
                    let was_selected = grid.is_selected(point);
                    if !event.modifiers.control {
                        grid.select_none();
                    }
                    // Keep a multi-selection together so it can be dragged
                    grid.set_selected(point, !was_selected || selected_count > 1);
                })?;
            }
            Mode::Blend => {
                if event.button == PointerButton::Right {
                    session.with_tuning_mut(self.index, |tuning, _| toggle_invert(tuning))?;
                    self.inverted = Some(self.index);
                }
                self.leftover = 0.0;
                log::debug!("Blend stroke started on tuning {}", self.index);
            }
            Mode::ScreenSetup | Mode::ProjectionSetup | Mode::Export => {}
        }
        Ok(())
    }

    /// Handle a pointer move: drag the warp selection or continue the stroke
    pub fn pointer_moved(
        &mut self,
        session: &mut Session,
        event: PointerEvent,
    ) -> Result<(), TuningError> {
        if self.mouse_down && !self.view_only {
            let mode = session.mode();
            if self.drag_mode != Some(mode) {
                log::debug!("Mode changed to {} during drag, ending it", mode);
                self.cancel_drag(session)?;
            } else {
                let rect = self.view_rect(session)?;
                match mode {
                    Mode::Warp => {
                        let delta =
                            view_delta(event.pos - self.mouse_position, self.view_size, &rect);
                        session.with_tuning_mut(self.index, |tuning, _| {
                            tuning.warp_grid_mut().move_selected(delta)
                        })?;
                    }
                    Mode::Blend => {
                        let from = screen_pos(self.mouse_position, self.view_size, &rect);
                        let to = screen_pos(event.pos, self.view_size, &rect);
                        let leftover = self.leftover;
                        self.leftover = session.with_tuning_mut(self.index, |tuning, _| {
                            tuning.paint_stroke(from, to, leftover)
                        })?;
                    }
                    Mode::ScreenSetup | Mode::ProjectionSetup | Mode::Export => {}
                }
            }
        }
        self.mouse_position = event.pos;
        Ok(())
    }

    /// Handle a button release: end the drag or stroke
    pub fn pointer_released(
        &mut self,
        session: &mut Session,
        event: PointerEvent,
    ) -> Result<(), TuningError> {
        // Holding the right button inverts the brush for one stroke only
        self.restore_brush(session)?;
        if self.view_only {
            return Ok(());
        }
        self.mouse_down = false;
        self.drag_mode = None;
        if session.mode() == Mode::Blend {
            self.leftover = 0.0;
        }
        log::debug!("Pointer {:?} released on tuning {}", event.button, self.index);
        Ok(())
    }

    /// Toggle back the brush inverted at press, whatever happened since
    fn restore_brush(&mut self, session: &mut Session) -> Result<(), TuningError> {
        let Some(index) = self.inverted.take() else {
            return Ok(());
        };
        if index >= session.len() {
            log::debug!("Inverted tuning {} no longer exists", index);
            return Ok(());
        }
        session.with_tuning_mut(index, |tuning, _| toggle_invert(tuning))
    }

    fn end_drag(&mut self) {
        self.mouse_down = false;
        self.drag_mode = None;
        self.leftover = 0.0;
    }
}

fn toggle_invert(tuning: &mut crate::proj::Tuning) {
    let brush = tuning.blend_mask_mut().brush_mut();
    let invert = brush.invert();
    brush.set_invert(!invert);
}
