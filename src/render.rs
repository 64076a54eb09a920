use crate::geometry::BoxGeometry;
use crate::graphics::{Rgb, Surface};
use crate::math::{apply_lighting, calculate_light_intensity, calculate_normal, Vec3};
use crate::projector::Projector;
use crate::vertex::ScreenPoint;

/// Direction light arrives from when shading solid faces
pub const LIGHT_DIRECTION: Vec3 = [0.4, 1.0, 0.6];

/// One face of a solid, already shaded
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub points: Vec<ScreenPoint>,
    pub color: Rgb,
    /// Mean camera depth of the face
    pub depth: f64,
}

/// Drawable primitive with projected vertices
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Line { from: ScreenPoint, to: ScreenPoint },
    Polygon { points: Vec<ScreenPoint> },
    /// Faces sorted back to front
    Solid { faces: Vec<Face> },
}

/// A queued draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawInstruction {
    pub depth: f64,
    pub shape: Shape,
    pub color: Rgb,
}

impl DrawInstruction {
    /// Projects a segment; depth is the mean of its endpoints
    pub fn line(projector: &Projector, from: &Vec3, to: &Vec3, color: Rgb) -> Option<Self> {
        let from = projector.project(from)?;
        let to = projector.project(to)?;
        Some(DrawInstruction {
            depth: (from.depth + to.depth) / 2.0,
            shape: Shape::Line { from, to },
            color,
        })
    }

    /// Projects a filled polygon; depth is the mean of its vertices
    pub fn polygon(projector: &Projector, points: &[Vec3], color: Rgb) -> Option<Self> {
        let points = projector.project_all(points)?;
        Some(DrawInstruction {
            depth: ScreenPoint::mean_depth(&points),
            shape: Shape::Polygon { points },
            color,
        })
    }

    /// A single dot drawn as a small square
    pub fn dot(projector: &Projector, center: &Vec3, half_size: f64, color: Rgb) -> Option<Self> {
        let c = projector.project(center)?;
        let corner = |dx: f64, dy: f64| ScreenPoint::new(c.x + dx, c.y + dy, c.depth);
        Some(DrawInstruction {
            depth: c.depth,
            shape: Shape::Polygon {
                points: vec![
                    corner(-half_size, -half_size),
                    corner(half_size, -half_size),
                    corner(half_size, half_size),
                    corner(-half_size, half_size),
                ],
            },
            color,
        })
    }

    /// Projects a shaded box whose faces are sorted by centroid depth
    pub fn solid_box(projector: &Projector, geometry: &BoxGeometry, color: Rgb) -> Option<Self> {
        let corners = geometry.corners();
        let projected = projector.project_all(&corners)?;
        let mut faces: Vec<Face> = BoxGeometry::FACES
            .iter()
            .map(|&[a, b, c, d]| {
                let normal = calculate_normal(&corners[a], &corners[b], &corners[c]);
                let points = vec![projected[a], projected[b], projected[c], projected[d]];
                Face {
                    depth: ScreenPoint::mean_depth(&points),
                    color: apply_lighting(color, calculate_light_intensity(&normal, &LIGHT_DIRECTION)),
                    points,
                }
            })
            .collect();
        faces.sort_by(|a, b| a.depth.total_cmp(&b.depth));
        Some(DrawInstruction {
            depth: ScreenPoint::mean_depth(&projected),
            shape: Shape::Solid { faces },
            color,
        })
    }

    /// Executes the instruction on a surface
    pub fn paint(&self, surface: &mut impl Surface) {
        match &self.shape {
            Shape::Line { from, to } => surface.draw_line(from, to, self.color),
            Shape::Polygon { points } => surface.fill_polygon(points, self.color),
            Shape::Solid { faces } => {
                for face in faces {
                    surface.fill_polygon(&face.points, face.color);
                }
            }
        }
    }
}

/// Per-frame depth-sorted draw queue (painter's algorithm)
///
/// Instructions are rebuilt every frame, sorted back to front and executed
/// against a [`Surface`].
#[derive(Debug, Default)]
pub struct RenderQueue {
    items: Vec<DrawInstruction>,
}

impl RenderQueue {
    pub fn new() -> Self {
        RenderQueue::default()
    }

    pub fn enqueue(&mut self, instruction: DrawInstruction) {
        self.items.push(instruction);
    }

    /// Enqueues an instruction if its geometry survived culling
    pub fn push(&mut self, instruction: Option<DrawInstruction>) {
        if let Some(instruction) = instruction {
            self.enqueue(instruction);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Paints everything back to front, then empties the queue.
    ///
    /// Returns the number of instructions executed.
    pub fn flush(&mut self, surface: &mut impl Surface) -> usize {
        // Most negative depth is farthest from the camera
        self.items.sort_by(|a, b| a.depth.total_cmp(&b.depth));
        let count = self.items.len();
        for instruction in self.items.drain(..) {
            instruction.paint(surface);
        }
        count
    }
}
