use std::f32::consts::FRAC_PI_4;

use crate::{Mat4, Vec3, vec3};

/// Distance travelled along the facing direction per frame a move key is held.
pub const MOVE_STEP: f32 = 0.05;
/// Yaw change in degrees per frame a turn key is held.
pub const YAW_STEP_DEG: f32 = 3.0;

/// Perspective projection parameters (right-handed, depth in [0, 1]).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    pub fov_y_rad: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Projection {
    #[inline]
    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_rad,
            self.aspect.max(1e-6),
            self.z_near,
            self.z_far,
        )
    }
}

impl Default for Projection {
    /// 45° vertical fov on a 1200x800 viewport.
    fn default() -> Self {
        Self {
            fov_y_rad: FRAC_PI_4,
            aspect: 1200.0 / 800.0,
            z_near: 0.1,
            z_far: 100.0,
        }
    }
}

/// Arrow-key state sampled once per frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CameraInput {
    pub forward: bool,
    pub backward: bool,
    pub turn_left: bool,
    pub turn_right: bool,
}

/// Horizontal facing for a yaw angle. The camera never pitches.
#[inline]
pub fn facing(yaw_deg: f32) -> Vec3 {
    let yaw = yaw_deg.to_radians();
    vec3(yaw.cos(), 0.0, yaw.sin())
}

/// First-person camera driven by fixed per-frame steps.
#[derive(Clone, Copy, Debug)]
pub struct CameraState {
    pub position: Vec3,
    pub direction: Vec3,
    pub up: Vec3,
    /// Accumulated yaw in degrees; not wrapped.
    pub yaw_deg: f32,
    pub projection: Projection,
}

impl CameraState {
    pub fn new(position: Vec3, direction: Vec3, yaw_deg: f32) -> Self {
        Self {
            position,
            direction,
            up: Vec3::Y,
            yaw_deg,
            projection: Projection::default(),
        }
    }

    /// Apply one frame of input. Movement uses the facing from the previous
    /// frame; the facing is then recomputed from the updated yaw.
    pub fn update(&mut self, input: CameraInput) {
        if input.forward {
            self.position += self.direction * MOVE_STEP;
        }
        if input.backward {
            self.position -= self.direction * MOVE_STEP;
        }
        if input.turn_left {
            self.yaw_deg -= YAW_STEP_DEG;
        }
        if input.turn_right {
            self.yaw_deg += YAW_STEP_DEG;
        }
        self.direction = facing(self.yaw_deg);
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.direction, self.up)
    }

    #[inline]
    pub fn proj(&self) -> Mat4 {
        self.projection.matrix()
    }

    #[inline]
    pub fn proj_view(&self) -> Mat4 {
        self.proj() * self.view()
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self::new(vec3(0.5, 0.4, 0.5), vec3(0.0, 0.0, -1.0), 0.0)
    }
}
