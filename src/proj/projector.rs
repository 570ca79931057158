//! Projector lens, pose and projection matrix

use crate::display::ScreenInfo;
use crate::error::TuningError;
use glam::{Mat4, Vec3, Vec4};

const NEAR_PLANE: f32 = 0.01;
const FAR_PLANE: f32 = 1000.0;

/// Physical projector bound to a (sub-)screen
///
/// The projection matrix is rebuilt eagerly whenever the screen, the
/// sub-screen index, the lens or the pose change.
#[derive(Debug, Clone, PartialEq)]
pub struct Projector {
    screen: Option<ScreenInfo>,
    sub_screen_index: u32,
    /// Resolution used while no screen is assigned
    fallback_resolution: (u32, u32),
    /// Horizontal field of view in degrees
    fov: f32,
    /// Vertical lens shift as a fraction of the half image height
    keystone: f32,
    yaw: f32,
    pitch: f32,
    roll: f32,
    position: Vec3,
    projection_matrix: Mat4,
}

impl Default for Projector {
    fn default() -> Self {
        Self::new((1920, 1080))
    }
}

impl Projector {
    /// Create an unbound projector with default lens and pose
    pub fn new(fallback_resolution: (u32, u32)) -> Self {
        let mut projector = Self {
            screen: None,
            sub_screen_index: 0,
            fallback_resolution,
            fov: 45.0,
            keystone: 0.0,
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            position: Vec3::ZERO,
            projection_matrix: Mat4::IDENTITY,
        };
        projector.update();
        projector
    }

    /// Assign a screen and sub-screen slot
    ///
    /// Without a screen only sub-screen index 0 is valid.
    pub fn set_screen(
        &mut self,
        screen: Option<ScreenInfo>,
        sub_screen_index: u32,
    ) -> Result<(), TuningError> {
        let count = screen.as_ref().map_or(1, |s| s.sub_screens.max(1));
        if sub_screen_index >= count {
            return Err(TuningError::SubScreenOutOfRange {
                screen: screen.map(|s| s.id).unwrap_or_else(|| "<none>".to_string()),
                index: sub_screen_index,
                count,
            });
        }
        self.screen = screen;
        self.sub_screen_index = sub_screen_index;
        self.update();
        Ok(())
    }

    pub fn screen(&self) -> Option<&ScreenInfo> {
        self.screen.as_ref()
    }

    pub fn sub_screen_index(&self) -> u32 {
        self.sub_screen_index
    }

    pub fn fallback_resolution(&self) -> (u32, u32) {
        self.fallback_resolution
    }

    /// Set the resolution used while no screen is assigned
    pub fn set_fallback_resolution(&mut self, resolution: (u32, u32)) {
        self.fallback_resolution = resolution;
        self.update();
    }

    /// Output resolution: the sub-screen size, or the fallback without a screen
    pub fn resolution(&self) -> (u32, u32) {
        match &self.screen {
            Some(screen) => screen.sub_screen_size(),
            None => self.fallback_resolution,
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.resolution();
        if height == 0 {
            return 1.0;
        }
        width as f32 / height as f32
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    /// Set horizontal field of view in degrees (clamped to 1..=179)
    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov.clamp(1.0, 179.0);
        self.update();
    }

    /// Throw distance divided by image width
    pub fn throw_ratio(&self) -> f32 {
        0.5 / (self.fov.to_radians() * 0.5).tan()
    }

    /// Set the lens by throw ratio instead of field of view
    pub fn set_throw_ratio(&mut self, throw_ratio: f32) {
        let throw_ratio = throw_ratio.max(f32::EPSILON);
        self.set_fov((0.5 / throw_ratio).atan().to_degrees() * 2.0);
    }

    pub fn keystone(&self) -> f32 {
        self.keystone
    }

    /// Set vertical lens shift as a fraction of the half image height
    pub fn set_keystone(&mut self, keystone: f32) {
        self.keystone = keystone;
        self.update();
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn roll(&self) -> f32 {
        self.roll
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Set orientation in degrees and position in scene units
    pub fn set_pose(&mut self, yaw: f32, pitch: f32, roll: f32, position: Vec3) {
        self.yaw = yaw;
        self.pitch = pitch;
        self.roll = roll;
        self.position = position;
        self.update();
    }

    /// Model matrix of the projector in the scene
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_z(self.yaw.to_radians())
            * Mat4::from_rotation_y(-self.pitch.to_radians())
            * Mat4::from_rotation_x(self.roll.to_radians())
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    fn update(&mut self) {
        let half_width = NEAR_PLANE * (self.fov.to_radians() * 0.5).tan();
        let half_height = half_width / self.aspect_ratio();
        let shift = self.keystone * half_height;

        let frustum = frustum(
            -half_width,
            half_width,
            -half_height + shift,
            half_height + shift,
            NEAR_PLANE,
            FAR_PLANE,
        );
        // Projectors look down +X with Z up
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::X, Vec3::Z);
        self.projection_matrix = frustum * view * self.matrix().inverse();
    }
}

/// OpenGL-style off-axis perspective frustum
fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    Mat4::from_cols(
        Vec4::new(2.0 * near / (right - left), 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 * near / (top - bottom), 0.0, 0.0),
        Vec4::new(
            (right + left) / (right - left),
            (top + bottom) / (top - bottom),
            -(far + near) / (far - near),
            -1.0,
        ),
        Vec4::new(0.0, 0.0, -2.0 * far * near / (far - near), 0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::ScreenRect;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_forward_axis_maps_to_center() {
        let projector = Projector::default();
        let ndc = projector.projection_matrix().project_point3(Vec3::new(5.0, 0.0, 0.0));
        assert!(approx(ndc.x, 0.0));
        assert!(approx(ndc.y, 0.0));
    }

    #[test]
    fn test_horizontal_fov_edge() {
        let projector = Projector::default();
        let half = (projector.fov().to_radians() * 0.5).tan();

        // +Y is to the left when looking down +X with Z up
        let right = projector.projection_matrix().project_point3(Vec3::new(1.0, -half, 0.0));
        assert!(approx(right.x, 1.0));

        let top = half / projector.aspect_ratio();
        let up = projector.projection_matrix().project_point3(Vec3::new(1.0, 0.0, top));
        assert!(approx(up.y, 1.0));
    }

    #[test]
    fn test_yaw_rotates_view() {
        let mut projector = Projector::default();
        projector.set_pose(90.0, 0.0, 0.0, Vec3::ZERO);
        let ndc = projector.projection_matrix().project_point3(Vec3::new(0.0, 3.0, 0.0));
        assert!(approx(ndc.x, 0.0));
        assert!(approx(ndc.y, 0.0));
    }

    #[test]
    fn test_matrix_tracks_screen() {
        let mut projector = Projector::default();
        let before = projector.projection_matrix();

        let screen = ScreenInfo::new("square", ScreenRect::new(0, 0, 1024, 1024));
        projector.set_screen(Some(screen.clone()), 0).unwrap();
        assert_eq!(projector.resolution(), (1024, 1024));
        assert_ne!(projector.projection_matrix(), before);

        let mut fresh = Projector::default();
        fresh.set_screen(Some(screen), 0).unwrap();
        assert_eq!(fresh.projection_matrix(), projector.projection_matrix());
    }

    #[test]
    fn test_sub_screen_index_validated() {
        let mut projector = Projector::default();
        let screen = ScreenInfo::tiled("th2go", ScreenRect::new(0, 0, 3840, 1080), 2);

        assert!(projector.set_screen(Some(screen.clone()), 1).is_ok());
        assert_eq!(projector.resolution(), (1920, 1080));

        let err = projector.set_screen(Some(screen), 2).unwrap_err();
        assert!(matches!(err, TuningError::SubScreenOutOfRange { index: 2, count: 2, .. }));
        // Failed assignment keeps the previous state
        assert_eq!(projector.sub_screen_index(), 1);

        assert!(projector.set_screen(None, 1).is_err());
    }

    #[test]
    fn test_throw_ratio_round_trip() {
        let mut projector = Projector::default();
        projector.set_throw_ratio(1.2);
        assert!(approx(projector.throw_ratio(), 1.2));
    }
}
