//! Blend mask for luminance blending of overlapping projectors
//!
//! The mask combines soft edge ramps with a paintable stroke buffer. The
//! stroke buffer has the projector's output resolution; a value of 0 leaves
//! the pixel untouched and 255 blacks it out completely.

use glam::Vec2;
use image::{GrayImage, Luma};
use std::fmt;

/// Brush spacing as a fraction of the brush radius
const SPACING_FACTOR: f32 = 0.2;
/// Lower bound for the automatic brush spacing, in pixels
const MIN_SPACING: f32 = 0.5;

/// Paint tool for the stroke buffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    /// Radius in mask pixels
    radius: f32,
    /// Fraction of the radius that fades out (0 = hard disk)
    feather: f32,
    /// Stamp strength in 0..=1
    opacity: f32,
    /// Erase instead of paint
    invert: bool,
}

impl Default for Brush {
    fn default() -> Self {
        Self::new(50.0)
    }
}

impl Brush {
    /// Create a hard, opaque paint brush with the given radius
    pub fn new(radius: f32) -> Self {
        Self {
            radius: radius.max(0.0),
            feather: 0.0,
            opacity: 1.0,
            invert: false,
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Set the radius in mask pixels (at least 0)
    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius.max(0.0);
    }

    pub fn feather(&self) -> f32 {
        self.feather
    }

    /// Set the feather fraction (clamped to 0..=1)
    pub fn set_feather(&mut self, feather: f32) {
        self.feather = feather.clamp(0.0, 1.0);
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Set the stamp strength (clamped to 0..=1)
    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    pub fn invert(&self) -> bool {
        self.invert
    }

    /// Switch between painting and erasing
    pub fn set_invert(&mut self, invert: bool) {
        self.invert = invert;
    }

    /// Distance between two stamps along a stroke
    ///
    /// Never larger than the radius, so consecutive stamps always overlap.
    pub fn spacing(&self) -> f32 {
        (self.radius * SPACING_FACTOR)
            .max(MIN_SPACING)
            .min(self.radius)
            .max(1e-3)
    }

    /// Stamp intensity at distance `dist` from the stamp center
    pub fn intensity(&self, dist: f32) -> f32 {
        if dist > self.radius {
            return 0.0;
        }
        let inner = self.radius * (1.0 - self.feather);
        let falloff = if dist <= inner || self.radius <= inner {
            1.0
        } else {
            1.0 - (dist - inner) / (self.radius - inner)
        };
        falloff * self.opacity
    }
}

/// Stamp centers along `from -> to`, continuing a stroke that has travelled
/// `leftover` units since its last stamp
///
/// Returns the stamp positions and the distance travelled past the last one.
pub fn interpolate_stroke(from: Vec2, to: Vec2, leftover: f32, spacing: f32) -> (Vec<Vec2>, f32) {
    let leftover = leftover.clamp(0.0, spacing);
    let length = from.distance(to);
    let total = leftover + length;
    let count = (total / spacing).floor() as usize;
    if count == 0 || length <= 0.0 {
        return (Vec::new(), total);
    }

    let dir = (to - from) / length;
    let first = spacing - leftover;
    let stamps = (0..count)
        .map(|k| from + dir * (first + k as f32 * spacing))
        .collect();
    (stamps, total - count as f32 * spacing)
}

/// Paintable raster at output resolution
#[derive(Clone, PartialEq)]
pub struct StrokeBuffer {
    image: GrayImage,
}

impl fmt::Debug for StrokeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let painted = self.image.as_raw().iter().filter(|&&v| v > 0).count();
        f.debug_struct("StrokeBuffer")
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .field("painted", &painted)
            .finish()
    }
}

impl StrokeBuffer {
    /// Create a clear raster
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::new(width, height),
        }
    }

    /// Wrap raw row-major pixels; `None` if the length does not match
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        GrayImage::from_raw(width, height, data).map(|image| Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    /// Raster value at `x`, `y`, `None` outside
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        (x < self.width() && y < self.height()).then(|| self.image.get_pixel(x, y)[0])
    }

    /// Reset every pixel to 0
    pub fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = Luma([0]);
        }
    }

    pub fn is_clear(&self) -> bool {
        self.image.as_raw().iter().all(|&v| v == 0)
    }

    /// Apply one brush stamp centered at `center` (pixel coordinates)
    pub fn stamp(&mut self, brush: &Brush, center: Vec2) {
        let r = brush.radius();
        let (width, height) = (self.width() as i64, self.height() as i64);
        let x0 = ((center.x - r).floor() as i64).max(0);
        let x1 = ((center.x + r).ceil() as i64).min(width - 1);
        let y0 = ((center.y - r).floor() as i64).max(0);
        let y1 = ((center.y + r).ceil() as i64).min(height - 1);

        for y in y0..=y1 {
            for x in x0..=x1 {
                let pixel_center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let intensity = brush.intensity(pixel_center.distance(center));
                if intensity <= 0.0 {
                    continue;
                }
                let value = (intensity * 255.0).round() as u8;
                let pixel = self.image.get_pixel_mut(x as u32, y as u32);
                pixel[0] = if brush.invert() {
                    pixel[0].min(255 - value)
                } else {
                    pixel[0].max(value)
                };
            }
        }
    }
}

/// Edge ramps plus brush-painted strokes
#[derive(Debug, Clone, PartialEq)]
pub struct BlendMask {
    /// Edge ramp widths as a fraction of the output size
    top_width: f32,
    bottom_width: f32,
    left_width: f32,
    right_width: f32,
    gamma: f32,
    brush: Brush,
    strokes: StrokeBuffer,
}

impl Default for BlendMask {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl BlendMask {
    /// Create a mask without edge ramps and a clear raster
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            top_width: 0.0,
            bottom_width: 0.0,
            left_width: 0.0,
            right_width: 0.0,
            gamma: 2.0,
            brush: Brush::default(),
            strokes: StrokeBuffer::new(width, height),
        }
    }

    pub fn brush(&self) -> &Brush {
        &self.brush
    }

    pub fn brush_mut(&mut self) -> &mut Brush {
        &mut self.brush
    }

    pub fn set_brush(&mut self, brush: Brush) {
        self.brush = brush;
    }

    pub fn strokes(&self) -> &StrokeBuffer {
        &self.strokes
    }

    /// Replace the raster, e.g. after loading
    pub fn set_strokes(&mut self, strokes: StrokeBuffer) {
        self.strokes = strokes;
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.strokes.width(), self.strokes.height())
    }

    /// Reset the raster if it does not match the output resolution
    ///
    /// Returns true if the raster was replaced.
    pub fn ensure_resolution(&mut self, width: u32, height: u32) -> bool {
        if self.resolution() == (width, height) {
            return false;
        }
        log::debug!(
            "Blend mask resolution {:?} -> {:?}, resetting strokes",
            self.resolution(),
            (width, height)
        );
        self.strokes = StrokeBuffer::new(width, height);
        true
    }

    pub fn clear_strokes(&mut self) {
        self.strokes.clear();
    }

    pub fn top_width(&self) -> f32 {
        self.top_width
    }

    pub fn bottom_width(&self) -> f32 {
        self.bottom_width
    }

    pub fn left_width(&self) -> f32 {
        self.left_width
    }

    pub fn right_width(&self) -> f32 {
        self.right_width
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    /// Set edge ramp widths (each clamped to 0..=0.5)
    pub fn set_edges(&mut self, top: f32, bottom: f32, left: f32, right: f32) {
        self.top_width = top.clamp(0.0, 0.5);
        self.bottom_width = bottom.clamp(0.0, 0.5);
        self.left_width = left.clamp(0.0, 0.5);
        self.right_width = right.clamp(0.0, 0.5);
    }

    /// Set the edge ramp gamma (at least 0.1)
    pub fn set_gamma(&mut self, gamma: f32) {
        self.gamma = gamma.max(0.1);
    }

    /// Edge ramp factor for raster coordinates (u right, v down) in 0..=1
    pub fn edge_value(&self, u: f32, v: f32) -> f32 {
        let ramp = |t: f32, width: f32| {
            if width <= 0.0 || t >= width {
                1.0
            } else {
                (t.max(0.0) / width).powf(self.gamma)
            }
        };
        ramp(u, self.left_width)
            * ramp(1.0 - u, self.right_width)
            * ramp(v, self.top_width)
            * ramp(1.0 - v, self.bottom_width)
    }

    /// Final visibility (0..=1) of raster pixel (x, y)
    pub fn value_at(&self, x: u32, y: u32) -> f32 {
        let (width, height) = self.resolution();
        let Some(stroke) = self.strokes.get(x, y) else {
            return 0.0;
        };
        let u = (x as f32 + 0.5) / width as f32;
        let v = (y as f32 + 0.5) / height as f32;
        self.edge_value(u, v) * (1.0 - stroke as f32 / 255.0)
    }

    /// Convert projector-local coordinates (center origin, y up) to raster pixels
    pub fn pixel_pos(&self, pos: Vec2) -> Vec2 {
        let (width, height) = self.resolution();
        Vec2::new((pos.x + 0.5) * width as f32, (0.5 - pos.y) * height as f32)
    }

    /// Stamp a single dab at a pixel position
    pub fn stamp(&mut self, center: Vec2) {
        let brush = self.brush;
        self.strokes.stamp(&brush, center);
    }

    /// Paint a stroke segment in raster pixels
    ///
    /// `leftover` is the distance travelled since the last stamp of the
    /// current stroke (0 for a fresh stroke); the returned value must be fed
    /// into the next call of the same stroke.
    pub fn draw_line(&mut self, from: Vec2, to: Vec2, leftover: f32) -> f32 {
        let brush = self.brush;
        let (stamps, leftover) = interpolate_stroke(from, to, leftover, brush.spacing());
        for center in stamps {
            self.strokes.stamp(&brush, center);
        }
        leftover
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_spacing_never_exceeds_radius() {
        for radius in [0.1, 0.4, 1.0, 3.0, 50.0, 400.0] {
            let brush = Brush::new(radius);
            assert!(brush.spacing() <= radius + f32::EPSILON, "radius {}", radius);
            assert!(brush.spacing() > 0.0);
        }
        assert!(approx(Brush::new(50.0).spacing(), 10.0));
    }

    #[test]
    fn test_stroke_stamp_count() {
        let from = Vec2::new(0.0, 0.0);
        let to = Vec2::new(60.0, 80.0);
        for leftover in [0.0, 2.5, 5.0, 9.0] {
            let (stamps, rest) = interpolate_stroke(from, to, leftover, 10.0);
            let expected = ((100.0 + leftover) / 10.0_f32).floor() as usize;
            assert_eq!(stamps.len(), expected, "leftover {}", leftover);

            // first offset + remaining spacings + leftover out covers the segment
            let first = 10.0 - leftover;
            let covered = first + (stamps.len() - 1) as f32 * 10.0 + rest;
            assert!(approx(covered, 100.0), "leftover {}: {}", leftover, covered);
            assert!(approx(stamps[0].distance(from), first));
        }
    }

    #[test]
    fn test_stroke_spacing_uniform_across_segments() {
        // The same stroke split into irregular segments stamps at the same places
        let points = [0.0, 3.0, 4.5, 27.0, 28.0, 61.0, 100.0].map(|x| Vec2::new(x, 0.0));
        let mut leftover = 0.0;
        let mut stamps = Vec::new();
        for pair in points.windows(2) {
            let (s, rest) = interpolate_stroke(pair[0], pair[1], leftover, 10.0);
            stamps.extend(s);
            leftover = rest;
        }
        let (whole, rest) = interpolate_stroke(points[0], points[6], 0.0, 10.0);

        assert_eq!(stamps.len(), whole.len());
        for (a, b) in stamps.iter().zip(&whole) {
            assert!(approx(a.x, b.x));
        }
        assert!(approx(leftover, rest));
    }

    #[test]
    fn test_short_segment_carries_distance() {
        let (stamps, rest) = interpolate_stroke(Vec2::ZERO, Vec2::new(4.0, 0.0), 3.0, 10.0);
        assert!(stamps.is_empty());
        assert!(approx(rest, 7.0));

        let (stamps, rest) = interpolate_stroke(Vec2::ZERO, Vec2::ZERO, 0.0, 10.0);
        assert!(stamps.is_empty());
        assert_eq!(rest, 0.0);
    }

    #[test]
    fn test_hard_stamp_paints_disk() {
        let mut buffer = StrokeBuffer::new(32, 32);
        buffer.stamp(&Brush::new(4.0), Vec2::new(16.0, 16.0));

        assert_eq!(buffer.get(16, 16), Some(255));
        assert_eq!(buffer.get(13, 16), Some(255));
        assert_eq!(buffer.get(16, 21), Some(0));
        assert_eq!(buffer.get(0, 0), Some(0));
    }

    #[test]
    fn test_invert_erases() {
        let mut mask = BlendMask::new(64, 64);
        mask.stamp(Vec2::new(32.0, 32.0));
        assert_eq!(mask.strokes().get(32, 32), Some(255));

        mask.brush_mut().set_invert(true);
        mask.stamp(Vec2::new(32.0, 32.0));
        assert!(mask.strokes().is_clear());
    }

    #[test]
    fn test_feathered_stamp_falls_off() {
        let mut brush = Brush::new(10.0);
        brush.set_feather(1.0);
        assert_eq!(brush.intensity(0.0), 1.0);
        assert!(approx(brush.intensity(5.0), 0.5));
        assert_eq!(brush.intensity(10.5), 0.0);

        let mut a = StrokeBuffer::new(40, 40);
        let mut b = StrokeBuffer::new(40, 40);
        a.stamp(&brush, Vec2::new(20.0, 20.0));
        b.stamp(&brush, Vec2::new(20.0, 20.0));
        assert_eq!(a, b);
        // Re-stamping the same spot is idempotent
        b.stamp(&brush, Vec2::new(20.0, 20.0));
        assert_eq!(a, b);
    }

    #[test]
    fn test_stamp_clips_at_border() {
        let mut buffer = StrokeBuffer::new(8, 8);
        buffer.stamp(&Brush::new(6.0), Vec2::new(-2.0, 9.0));
        buffer.stamp(&Brush::new(6.0), Vec2::new(500.0, -500.0));
        assert_eq!(buffer.get(0, 7), Some(255));
    }

    #[test]
    fn test_ensure_resolution_resets() {
        let mut mask = BlendMask::new(64, 32);
        mask.stamp(Vec2::new(10.0, 10.0));
        assert!(!mask.ensure_resolution(64, 32));
        assert!(!mask.strokes().is_clear());

        assert!(mask.ensure_resolution(128, 48));
        assert_eq!(mask.resolution(), (128, 48));
        assert!(mask.strokes().is_clear());
    }

    #[test]
    fn test_edge_ramps() {
        let mut mask = BlendMask::new(100, 100);
        assert_eq!(mask.edge_value(0.0, 0.5), 1.0);

        mask.set_edges(0.0, 0.0, 0.2, 0.0);
        mask.set_gamma(1.0);
        assert!(approx(mask.edge_value(0.1, 0.5), 0.5));
        assert_eq!(mask.edge_value(0.5, 0.5), 1.0);
        assert_eq!(mask.edge_value(0.0, 0.5), 0.0);

        mask.stamp(Vec2::new(50.0, 50.0));
        assert_eq!(mask.value_at(50, 50), 0.0);
        assert_eq!(mask.value_at(90, 90), 1.0);
    }

    #[test]
    fn test_pixel_pos() {
        let mask = BlendMask::new(200, 100);
        assert_eq!(mask.pixel_pos(Vec2::new(-0.5, 0.5)), Vec2::new(0.0, 0.0));
        assert_eq!(mask.pixel_pos(Vec2::ZERO), Vec2::new(100.0, 50.0));
        assert_eq!(mask.pixel_pos(Vec2::new(0.5, -0.5)), Vec2::new(200.0, 100.0));
    }
}
