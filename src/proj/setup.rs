//! Projector setups: pose templates shared across tunings
//!
//! A setup is owned by the session; a tuning only keeps a [`SetupRef`] to it.

use super::Projector;
use glam::{Mat4, Vec3};
use std::rc::{Rc, Weak};

/// Template that positions a projector in the scene
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectorSetup {
    /// Free orientation and position
    Free {
        yaw: f32,
        pitch: f32,
        roll: f32,
        position: Vec3,
    },
    /// Projector on a ring around the dome center, facing outwards
    Peripheral {
        yaw: f32,
        distance_center: f32,
        tower_height: f32,
        shift: f32,
        pitch: f32,
        roll: f32,
    },
}

impl Default for ProjectorSetup {
    fn default() -> Self {
        ProjectorSetup::Free {
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            position: Vec3::ZERO,
        }
    }
}

impl ProjectorSetup {
    pub fn type_name(&self) -> &'static str {
        match self {
            ProjectorSetup::Free { .. } => "FreeSetup",
            ProjectorSetup::Peripheral { .. } => "PeripheralSetup",
        }
    }

    /// Write this setup's pose into a projector
    pub fn apply(&self, projector: &mut Projector) {
        match *self {
            ProjectorSetup::Free {
                yaw,
                pitch,
                roll,
                position,
            } => projector.set_pose(yaw, pitch, roll, position),
            ProjectorSetup::Peripheral {
                yaw,
                distance_center,
                tower_height,
                shift,
                pitch,
                roll,
            } => {
                let position = Mat4::from_rotation_z(yaw.to_radians())
                    .transform_point3(Vec3::new(distance_center, shift, tower_height));
                projector.set_pose(yaw, pitch, roll, position);
            }
        }
    }
}

/// Non-owning link from a tuning to a session-owned setup
///
/// Two references are equal only if they point at the same setup object.
#[derive(Debug, Clone, Default)]
pub struct SetupRef(Weak<ProjectorSetup>);

impl SetupRef {
    pub fn new(setup: &Rc<ProjectorSetup>) -> Self {
        Self(Rc::downgrade(setup))
    }

    /// The setup if it is still alive
    pub fn upgrade(&self) -> Option<Rc<ProjectorSetup>> {
        self.0.upgrade()
    }
}

impl PartialEq for SetupRef {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}
