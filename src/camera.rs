use crate::config::CameraConfig;
use crate::math::{add, scale, Vec3};

/// Pitch limit in radians, keeps the orbit away from the poles
pub const PITCH_LIMIT: f64 = 1.5;
/// Closest allowed orbit distance
pub const MIN_RADIUS: f64 = 200.0;
/// Farthest allowed orbit distance
pub const MAX_RADIUS: f64 = 20_000.0;

/// Orbit camera pose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    /// Yaw around the vertical axis (radians)
    pub theta: f64,
    /// Pitch (radians), clamped to [-1.5, 1.5]
    pub phi: f64,
    /// Distance from the target, clamped to [200, 20000]
    pub radius: f64,
    /// World point the camera orbits
    pub target: Vec3,
}

impl CameraPose {
    pub fn new(theta: f64, phi: f64, radius: f64, target: Vec3) -> Self {
        CameraPose {
            theta,
            phi: phi.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            radius: radius.clamp(MIN_RADIUS, MAX_RADIUS),
            target,
        }
    }

    /// Unit vector pointing to the right of the view, in world space
    pub fn right(&self) -> Vec3 {
        let (sin_t, cos_t) = self.theta.sin_cos();
        [cos_t, 0.0, -sin_t]
    }

    /// Unit vector pointing up the view, in world space
    pub fn up(&self) -> Vec3 {
        let (sin_t, cos_t) = self.theta.sin_cos();
        let (sin_p, cos_p) = self.phi.sin_cos();
        [sin_t * sin_p, cos_p, cos_t * sin_p]
    }
}

impl From<&CameraConfig> for CameraPose {
    fn from(config: &CameraConfig) -> Self {
        CameraPose::new(config.theta, config.phi, config.radius, config.target)
    }
}

/// What a pointer drag is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Orbit,
    Pan,
}

/// Turns pointer drags and wheel steps into camera pose changes
///
/// Only ever touches the [`CameraPose`] it is handed; physics state and
/// frame-local draw data are out of its reach.
#[derive(Debug, Clone)]
pub struct CameraController {
    /// Radians of orbit per pixel of drag
    orbit_sensitivity: f64,
    /// Pan distance per pixel is `radius / pan_divisor`
    pan_divisor: f64,
    /// Multiplicative zoom per wheel step
    zoom_step: f64,
    /// Active drag, if any
    drag: Option<DragMode>,
    /// Last pointer position during a drag
    last_pos: [f64; 2],
    /// Pose restored by [`CameraController::reset`]
    home: CameraPose,
}

impl CameraController {
    pub fn new(config: &CameraConfig) -> Self {
        CameraController {
            orbit_sensitivity: config.orbit_sensitivity,
            pan_divisor: config.pan_divisor.max(1.0),
            zoom_step: config.zoom_step.max(1.0),
            drag: None,
            last_pos: [0.0, 0.0],
            home: CameraPose::from(config),
        }
    }

    /// Currently active drag
    pub fn drag_mode(&self) -> Option<DragMode> {
        self.drag
    }

    /// Starts a drag at the given pointer position
    pub fn begin_drag(&mut self, mode: DragMode, x: f64, y: f64) {
        self.drag = Some(mode);
        self.last_pos = [x, y];
    }

    /// Continues the active drag, applying the pointer delta to the pose
    pub fn drag_to(&mut self, pose: &mut CameraPose, x: f64, y: f64) {
        let Some(mode) = self.drag else {
            return;
        };
        let dx = x - self.last_pos[0];
        let dy = y - self.last_pos[1];
        self.last_pos = [x, y];
        match mode {
            DragMode::Orbit => self.orbit(pose, dx, dy),
            DragMode::Pan => self.pan(pose, dx, dy),
        }
    }

    /// Ends any active drag
    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    /// Orbits the camera by a pointer delta in pixels
    pub fn orbit(&self, pose: &mut CameraPose, dx: f64, dy: f64) {
        pose.theta += dx * self.orbit_sensitivity;
        pose.phi = (pose.phi + dy * self.orbit_sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Pans the orbit target in the view plane so the scene follows the pointer
    pub fn pan(&self, pose: &mut CameraPose, dx: f64, dy: f64) {
        let speed = pose.radius / self.pan_divisor;
        let offset = add(&scale(&pose.right(), -dx * speed), &scale(&pose.up(), dy * speed));
        pose.target = add(&pose.target, &offset);
    }

    /// Zooms by wheel steps; positive steps move the camera closer
    pub fn zoom(&self, pose: &mut CameraPose, steps: f64) {
        pose.radius = (pose.radius / self.zoom_step.powf(steps)).clamp(MIN_RADIUS, MAX_RADIUS);
    }

    /// Restores the configured starting pose
    pub fn reset(&mut self, pose: &mut CameraPose) {
        *pose = self.home;
        self.drag = None;
    }
}
