/// A projected point with its camera-space depth
///
/// `depth` is the camera-space z of the source point. It is always negative for a
/// visible point and is only used to order draw commands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
    pub depth: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64, depth: f64) -> Self {
        ScreenPoint { x, y, depth }
    }

    /// Screen position as an `[x, y]` pair for the rasterizer
    pub fn position(&self) -> [f64; 2] {
        [self.x, self.y]
    }

    /// Average depth of a set of projected points
    pub fn mean_depth(points: &[ScreenPoint]) -> f64 {
        if points.is_empty() {
            return 0.0;
        }
        points.iter().map(|p| p.depth).sum::<f64>() / points.len() as f64
    }
}
