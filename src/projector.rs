use crate::camera::CameraPose;
use crate::math::{multiply_matrices, multiply_matrix_vector, rotation_x, rotation_y, sub, Vec3};
use crate::vertex::ScreenPoint;

/// Drawing surface size in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Viewport { width, height }
    }

    pub fn center(&self) -> [f64; 2] {
        [self.width / 2.0, self.height / 2.0]
    }

    /// True if the point lies inside the viewport grown by `margin` on every side
    pub fn contains(&self, x: f64, y: f64, margin: f64) -> bool {
        x >= -margin && x <= self.width + margin && y >= -margin && y <= self.height + margin
    }
}

/// World-to-screen perspective projection for one camera pose
///
/// The rotation is precomputed once per frame; every point is still projected
/// on its own because any of them may be culled.
#[derive(Debug, Clone, Copy)]
pub struct Projector {
    rotation: [[f64; 3]; 3],
    target: Vec3,
    radius: f64,
    fov: f64,
    center: [f64; 2],
}

impl Projector {
    pub fn new(pose: &CameraPose, viewport: Viewport, fov: f64) -> Self {
        // Yaw first, then pitch
        let rotation = multiply_matrices(&rotation_x(-pose.phi), &rotation_y(-pose.theta));
        Projector {
            rotation,
            target: pose.target,
            radius: pose.radius,
            fov,
            center: viewport.center(),
        }
    }

    /// Camera-space coordinates of a world point; the camera looks down -z
    pub fn to_camera(&self, point: &Vec3) -> Vec3 {
        let rotated = multiply_matrix_vector(&self.rotation, &sub(point, &self.target));
        [rotated[0], rotated[1], rotated[2] - self.radius]
    }

    /// Projects a world point, or `None` if it is at or behind the camera plane
    pub fn project(&self, point: &Vec3) -> Option<ScreenPoint> {
        let [x, y, z_cam] = self.to_camera(point);
        if z_cam >= 0.0 {
            return None;
        }
        let k = self.fov / (self.fov - z_cam);
        Some(ScreenPoint::new(
            self.center[0] + x * k,
            self.center[1] - y * k,
            z_cam,
        ))
    }

    /// Projects every point, failing if any of them is culled
    pub fn project_all(&self, points: &[Vec3]) -> Option<Vec<ScreenPoint>> {
        points.iter().map(|p| self.project(p)).collect()
    }
}

/// Projects a single point for the given pose and viewport
pub fn project(point: &Vec3, pose: &CameraPose, viewport: Viewport, fov: f64) -> Option<ScreenPoint> {
    Projector::new(pose, viewport, fov).project(point)
}
