//! Warp grid for geometric correction
//!
//! A fixed lattice of control points over the projector image plane. Point
//! coordinates are projector-local: origin at the image center, y up, the
//! undistorted image spanning -0.5..=0.5 on both axes.

use glam::Vec2;

/// Interpolation between control points when sampling the warp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WarpInterpolation {
    #[default]
    Linear,
    /// Catmull-Rom through the control points
    Bicubic,
}

impl WarpInterpolation {
    pub fn tag(self) -> u8 {
        match self {
            WarpInterpolation::Linear => 0,
            WarpInterpolation::Bicubic => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(WarpInterpolation::Linear),
            1 => Some(WarpInterpolation::Bicubic),
            _ => None,
        }
    }
}

/// Stable handle to a control point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointRef {
    pub row: usize,
    pub col: usize,
}

impl PointRef {
    /// Create a handle for the point at `row`, `col`
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// A displaceable control point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpPoint {
    pub pos: Vec2,
    pub selected: bool,
}

impl WarpPoint {
    /// Create an unselected point
    pub fn new(pos: Vec2) -> Self {
        Self {
            pos,
            selected: false,
        }
    }
}

/// Grid of control points, stored row-major (row 0 at the bottom)
#[derive(Debug, Clone, PartialEq)]
pub struct WarpGrid {
    columns: usize,
    rows: usize,
    points: Vec<WarpPoint>,
    interpolation: WarpInterpolation,
}

impl Default for WarpGrid {
    fn default() -> Self {
        Self::new(6, 6)
    }
}

impl WarpGrid {
    /// Create an undistorted grid; dimensions are fixed afterwards
    pub fn new(columns: usize, rows: usize) -> Self {
        let mut points = Vec::with_capacity(columns * rows);
        for row in 0..rows {
            for col in 0..columns {
                points.push(WarpPoint::new(lattice_pos(col, row, columns, rows)));
            }
        }
        Self {
            columns,
            rows,
            points,
            interpolation: WarpInterpolation::default(),
        }
    }

    /// Rebuild a grid from stored points (row-major). `None` if the count mismatches.
    pub fn from_points(columns: usize, rows: usize, points: Vec<WarpPoint>) -> Option<Self> {
        if points.len() != columns * rows {
            return None;
        }
        Some(Self {
            columns,
            rows,
            points,
            interpolation: WarpInterpolation::default(),
        })
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[WarpPoint] {
        &self.points
    }

    pub fn interpolation(&self) -> WarpInterpolation {
        self.interpolation
    }

    pub fn set_interpolation(&mut self, interpolation: WarpInterpolation) {
        self.interpolation = interpolation;
    }

    fn index(&self, p: PointRef) -> Option<usize> {
        (p.row < self.rows && p.col < self.columns).then(|| p.row * self.columns + p.col)
    }

    fn point_ref(&self, index: usize) -> PointRef {
        PointRef::new(index / self.columns, index % self.columns)
    }

    /// Point at `p`, `None` outside the grid
    pub fn point(&self, p: PointRef) -> Option<&WarpPoint> {
        self.index(p).map(|i| &self.points[i])
    }

    pub fn point_mut(&mut self, p: PointRef) -> Option<&mut WarpPoint> {
        self.index(p).map(move |i| &mut self.points[i])
    }

    /// Control point closest to `pos`
    ///
    /// Ties resolve to the first point in row-major order. There is no
    /// capture radius: any position yields a point unless the grid is empty.
    pub fn select_nearest(&self, pos: Vec2) -> Option<PointRef> {
        let mut best: Option<(usize, f32)> = None;
        for (i, point) in self.points.iter().enumerate() {
            let dist = point.pos.distance_squared(pos);
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((i, dist));
            }
        }
        best.map(|(i, _)| self.point_ref(i))
    }

    /// Deselect every point
    pub fn select_none(&mut self) {
        for point in &mut self.points {
            point.selected = false;
        }
    }

    /// Select every point
    pub fn select_all(&mut self) {
        for point in &mut self.points {
            point.selected = true;
        }
    }

    pub fn is_selected(&self, p: PointRef) -> bool {
        self.point(p).map_or(false, |point| point.selected)
    }

    /// Returns false if `p` is outside the grid
    pub fn set_selected(&mut self, p: PointRef, selected: bool) -> bool {
        match self.point_mut(p) {
            Some(point) => {
                point.selected = selected;
                true
            }
            None => false,
        }
    }

    /// Selected points in row-major order
    pub fn get_selected(&self) -> Vec<PointRef> {
        self.points
            .iter()
            .enumerate()
            .filter(|(_, point)| point.selected)
            .map(|(i, _)| self.point_ref(i))
            .collect()
    }

    /// Displace every selected point; positions are not clamped
    pub fn move_selected(&mut self, delta: Vec2) {
        for point in self.points.iter_mut().filter(|p| p.selected) {
            point.pos += delta;
        }
    }

    /// Move all points back onto the lattice; selection is kept
    pub fn reset(&mut self) {
        for row in 0..self.rows {
            for col in 0..self.columns {
                self.points[row * self.columns + col].pos =
                    lattice_pos(col, row, self.columns, self.rows);
            }
        }
    }

    /// True if every point sits on its undistorted lattice position
    pub fn is_identity(&self) -> bool {
        self.points.iter().enumerate().all(|(i, point)| {
            let p = self.point_ref(i);
            point.pos.abs_diff_eq(lattice_pos(p.col, p.row, self.columns, self.rows), 1e-6)
        })
    }

    /// Warped position for texture coordinate (u, v) in 0..=1
    pub fn sample(&self, u: f32, v: f32) -> Vec2 {
        if self.is_empty() {
            return Vec2::new(u - 0.5, v - 0.5);
        }
        let fx = u.clamp(0.0, 1.0) * self.columns.saturating_sub(1) as f32;
        let fy = v.clamp(0.0, 1.0) * self.rows.saturating_sub(1) as f32;
        let ix = (fx.floor() as usize).min(self.columns.saturating_sub(2));
        let iy = (fy.floor() as usize).min(self.rows.saturating_sub(2));
        let tx = fx - ix as f32;
        let ty = fy - iy as f32;

        match self.interpolation {
            WarpInterpolation::Linear => {
                let p00 = self.clamped(ix as isize, iy as isize);
                let p10 = self.clamped(ix as isize + 1, iy as isize);
                let p01 = self.clamped(ix as isize, iy as isize + 1);
                let p11 = self.clamped(ix as isize + 1, iy as isize + 1);
                p00.lerp(p10, tx).lerp(p01.lerp(p11, tx), ty)
            }
            WarpInterpolation::Bicubic => {
                let mut rows = [Vec2::ZERO; 4];
                for (k, row) in rows.iter_mut().enumerate() {
                    let y = iy as isize + k as isize - 1;
                    *row = catmull_rom(
                        self.extended(ix as isize - 1, y),
                        self.extended(ix as isize, y),
                        self.extended(ix as isize + 1, y),
                        self.extended(ix as isize + 2, y),
                        tx,
                    );
                }
                catmull_rom(rows[0], rows[1], rows[2], rows[3], ty)
            }
        }
    }

    fn clamped(&self, col: isize, row: isize) -> Vec2 {
        let col = col.clamp(0, self.columns as isize - 1) as usize;
        let row = row.clamp(0, self.rows as isize - 1) as usize;
        self.points[row * self.columns + col].pos
    }

    /// Point lookup that extrapolates linearly past the border
    fn extended(&self, col: isize, row: isize) -> Vec2 {
        let (n, m) = (self.columns as isize, self.rows as isize);
        if n < 2 || m < 2 {
            return self.clamped(col, row);
        }
        if col < 0 {
            return 2.0 * self.extended(0, row) - self.extended(1, row);
        }
        if col >= n {
            return 2.0 * self.extended(n - 1, row) - self.extended(n - 2, row);
        }
        if row < 0 {
            return 2.0 * self.extended(col, 0) - self.extended(col, 1);
        }
        if row >= m {
            return 2.0 * self.extended(col, m - 1) - self.extended(col, m - 2);
        }
        self.points[row as usize * self.columns + col as usize].pos
    }
}

fn lattice_pos(col: usize, row: usize, columns: usize, rows: usize) -> Vec2 {
    let axis = |i: usize, n: usize| {
        if n > 1 {
            i as f32 / (n - 1) as f32 - 0.5
        } else {
            0.0
        }
    };
    Vec2::new(axis(col, columns), axis(row, rows))
}

fn catmull_rom(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2, t: f32) -> Vec2 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (p2 - p0) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (3.0 * p1 - p0 - 3.0 * p2 + p3) * t3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lattice_layout() {
        let grid = WarpGrid::new(3, 2);
        assert_eq!(grid.points().len(), 6);
        assert_eq!(grid.point(PointRef::new(0, 0)).unwrap().pos, Vec2::new(-0.5, -0.5));
        assert_eq!(grid.point(PointRef::new(0, 1)).unwrap().pos, Vec2::new(0.0, -0.5));
        assert_eq!(grid.point(PointRef::new(1, 2)).unwrap().pos, Vec2::new(0.5, 0.5));
        assert!(grid.point(PointRef::new(2, 0)).is_none());
        assert!(grid.is_identity());
    }

    #[test]
    fn test_select_nearest_minimizes_distance() {
        let grid = WarpGrid::new(5, 5);
        let probes = [
            Vec2::new(0.1, 0.1),
            Vec2::new(-0.4, 0.3),
            Vec2::new(0.49, -0.49),
            Vec2::new(10.0, 10.0),
        ];
        for probe in probes {
            let nearest = grid.select_nearest(probe).unwrap();
            let best = grid.point(nearest).unwrap().pos.distance(probe);
            for point in grid.points() {
                assert!(best <= point.pos.distance(probe));
            }
        }
        // Far away still yields a point
        assert_eq!(grid.select_nearest(Vec2::new(10.0, 10.0)), Some(PointRef::new(4, 4)));
    }

    #[test]
    fn test_select_nearest_tie_is_row_major_first() {
        let grid = WarpGrid::new(2, 2);
        // Equidistant to all four corners
        assert_eq!(grid.select_nearest(Vec2::ZERO), Some(PointRef::new(0, 0)));
        // Equidistant to the two top points
        assert_eq!(grid.select_nearest(Vec2::new(0.0, 0.5)), Some(PointRef::new(1, 0)));
    }

    #[test]
    fn test_select_nearest_empty_grid() {
        let grid = WarpGrid::new(0, 0);
        assert!(grid.is_empty());
        assert_eq!(grid.select_nearest(Vec2::ZERO), None);
        assert!(grid.get_selected().is_empty());
    }

    #[test]
    fn test_get_selected_row_major() {
        let mut grid = WarpGrid::new(3, 3);
        grid.set_selected(PointRef::new(2, 0), true);
        grid.set_selected(PointRef::new(0, 2), true);
        grid.set_selected(PointRef::new(1, 1), true);
        assert_eq!(
            grid.get_selected(),
            vec![PointRef::new(0, 2), PointRef::new(1, 1), PointRef::new(2, 0)]
        );

        grid.select_none();
        assert!(grid.get_selected().is_empty());
        grid.select_all();
        assert_eq!(grid.get_selected().len(), 9);
        assert!(!grid.set_selected(PointRef::new(3, 0), true));
    }

    #[test]
    fn test_move_selected_is_unclamped() {
        let mut grid = WarpGrid::new(2, 2);
        let p = PointRef::new(1, 1);
        grid.set_selected(p, true);
        grid.move_selected(Vec2::new(0.75, 0.25));
        grid.move_selected(Vec2::new(0.75, 0.25));

        assert_eq!(grid.point(p).unwrap().pos, Vec2::new(2.0, 1.0));
        assert_eq!(grid.point(PointRef::new(0, 0)).unwrap().pos, Vec2::new(-0.5, -0.5));
        assert!(!grid.is_identity());

        grid.reset();
        assert!(grid.is_identity());
        assert!(grid.is_selected(p));
    }

    #[test]
    fn test_sample_identity() {
        for interpolation in [WarpInterpolation::Linear, WarpInterpolation::Bicubic] {
            let mut grid = WarpGrid::new(4, 4);
            grid.set_interpolation(interpolation);
            for (u, v) in [(0.0, 0.0), (0.5, 0.5), (0.3, 0.8), (1.0, 1.0)] {
                let p = grid.sample(u, v);
                assert!((p.x - (u - 0.5)).abs() < 1e-5, "{:?} {} {}", interpolation, u, v);
                assert!((p.y - (v - 0.5)).abs() < 1e-5, "{:?} {} {}", interpolation, u, v);
            }
        }
    }

    #[test]
    fn test_sample_passes_through_control_points() {
        let mut grid = WarpGrid::new(3, 3);
        grid.set_selected(PointRef::new(1, 1), true);
        grid.move_selected(Vec2::new(0.1, -0.2));
        grid.set_interpolation(WarpInterpolation::Bicubic);

        let center = grid.sample(0.5, 0.5);
        assert!((center - Vec2::new(0.1, -0.2)).length() < 1e-5);
    }
}
