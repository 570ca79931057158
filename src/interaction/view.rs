//! Mapping between the tuning view and projector-local coordinates
//!
//! View coordinates are widget pixels with the origin top-left and y down.
//! Projector-local coordinates have the origin at the image center, y up,
//! and the projector image spans -0.5..=0.5 on both axes.

use glam::{Mat4, Vec2};

/// Visible region of the projector plane in projector-local units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewRect {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

impl ViewRect {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    /// Orthographic projection for drawing the overlay into the view
    pub fn ortho_matrix(&self) -> Mat4 {
        Mat4::orthographic_rh_gl(self.left, self.right, self.bottom, self.top, -1.0, 1.0)
    }
}

/// Region of the projector plane shown in a viewport
///
/// With `keep_aspect_ratio` the shorter axis is stretched so the projector
/// image keeps its proportions; otherwise the base rectangle is used and the
/// image is distorted to fill the viewport.
pub fn view_rect(
    projector_aspect: f32,
    viewport_aspect: f32,
    border: f32,
    keep_aspect_ratio: bool,
) -> ViewRect {
    let b = border * 0.5;
    let mut rect = ViewRect {
        left: -0.5 - b,
        right: 0.5 + b,
        bottom: -0.5 - b,
        top: 0.5 + b,
    };
    let usable = projector_aspect.is_finite()
        && viewport_aspect.is_finite()
        && projector_aspect > 0.0
        && viewport_aspect > 0.0;
    if !keep_aspect_ratio || !usable {
        return rect;
    }

    if projector_aspect > viewport_aspect {
        let scale = projector_aspect / viewport_aspect;
        rect.top *= scale;
        rect.bottom *= scale;
    } else {
        let scale = viewport_aspect / projector_aspect;
        rect.left *= scale;
        rect.right *= scale;
    }
    rect
}

/// Convert a view pixel position to projector-local coordinates
pub fn screen_pos(pos: Vec2, view_size: Vec2, rect: &ViewRect) -> Vec2 {
    let u = pos.x / view_size.x;
    let v = pos.y / view_size.y;
    Vec2::new(rect.left + u * rect.width(), rect.top - v * rect.height())
}

/// Convert a pointer movement in view pixels to a projector-local delta
pub fn view_delta(delta: Vec2, view_size: Vec2, rect: &ViewRect) -> Vec2 {
    Vec2::new(
        delta.x / view_size.x * rect.width(),
        -delta.y / view_size.y * rect.height(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_letterbox_vertically() {
        let rect = view_rect(1920.0 / 1080.0, 800.0 / 600.0, 0.0, true);
        assert!(approx(rect.left, -0.5));
        assert!(approx(rect.right, 0.5));
        assert!(approx(rect.top, 0.6667));
        assert!(approx(rect.bottom, -0.6667));
    }

    #[test]
    fn test_letterbox_horizontally() {
        let rect = view_rect(4.0 / 3.0, 16.0 / 9.0, 0.0, true);
        assert!(approx(rect.top, 0.5));
        assert!(approx(rect.right, 0.5 * (16.0 / 9.0) / (4.0 / 3.0)));
        assert!(approx(rect.left, -rect.right));
    }

    #[test]
    fn test_border_and_stretch() {
        let rect = view_rect(1920.0 / 1080.0, 1.0, 0.2, false);
        assert!(approx(rect.left, -0.6));
        assert!(approx(rect.right, 0.6));
        assert!(approx(rect.top, 0.6));
        assert!(approx(rect.bottom, -0.6));

        let degenerate = view_rect(1.5, f32::INFINITY, 0.0, true);
        assert!(approx(degenerate.top, 0.5));
    }

    #[test]
    fn test_screen_pos_axes() {
        let rect = view_rect(1.0, 1.0, 0.0, true);
        let size = Vec2::new(400.0, 400.0);

        let center = screen_pos(Vec2::new(200.0, 200.0), size, &rect);
        assert!(approx(center.x, 0.0) && approx(center.y, 0.0));

        // Top-left pixel corner maps to (-0.5, +0.5): y flips
        let top_left = screen_pos(Vec2::ZERO, size, &rect);
        assert!(approx(top_left.x, -0.5) && approx(top_left.y, 0.5));

        let bottom_right = screen_pos(size, size, &rect);
        assert!(approx(bottom_right.x, 0.5) && approx(bottom_right.y, -0.5));
    }

    #[test]
    fn test_screen_pos_with_letterbox() {
        let rect = view_rect(1920.0 / 1080.0, 800.0 / 600.0, 0.0, true);
        let p = screen_pos(Vec2::new(800.0, 0.0), Vec2::new(800.0, 600.0), &rect);
        assert!(approx(p.x, 0.5));
        assert!(approx(p.y, 0.6667));
    }

    #[test]
    fn test_view_delta_matches_screen_pos() {
        let rect = view_rect(1.6, 1.2, 0.1, true);
        let size = Vec2::new(640.0, 480.0);
        let a = Vec2::new(100.0, 50.0);
        let b = Vec2::new(160.0, 20.0);

        let expected = screen_pos(b, size, &rect) - screen_pos(a, size, &rect);
        let delta = view_delta(b - a, size, &rect);
        assert!(approx(delta.x, expected.x));
        assert!(approx(delta.y, expected.y));
    }
}
