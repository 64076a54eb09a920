use crate::math::{add, lerp, lerp_point, multiply_matrix_vector, rotation_x, scale, Vec3};
use std::f64::consts::TAU;

/// Height at which transmission twist stops growing (cm)
pub const TWIST_REFERENCE_HEIGHT: f64 = 1600.0;
/// Twist at full torque and full deployment (radians)
pub const MAX_TWIST: f64 = 0.9;
/// Tilt from vertical when lying on the ground (radians)
pub const GROUNDED_TILT: f64 = 1.50;
/// Tilt from vertical in flight (radians)
pub const FLYING_TILT: f64 = 0.60;
/// Base lift-off in flight (cm)
pub const FLYING_BASE_OFFSET: f64 = 200.0;
/// Length scale of the retracted structure
pub const GROUNDED_LENGTH_SCALE: f64 = 0.35;
/// Distance of the lifter kite beyond the bearing (cm)
pub const KITE_DISTANCE: f64 = 1400.0;
/// Lifter kite half length and half span (cm)
pub const KITE_HALF_SIZE: (f64, f64) = (450.0, 300.0);
/// Peak lateral kite sway (cm)
pub const KITE_SWAY: f64 = 120.0;
/// Angular chord of a blade at its inner and outer tip (radians)
pub const BLADE_CHORD: (f64, f64) = (0.18, 0.08);
/// Segments used for ring and disk outlines
pub const RIM_SEGMENTS: usize = 24;

/// Function of a layer in the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerRole {
    Hub,
    TransmissionRing,
    RotorHubRing,
    RotorPlane,
    Bearing,
}

/// Static description of one layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructureLayerSpec {
    /// Height along the structure axis before length scaling (cm)
    pub base_height: f64,
    pub radius: f64,
    pub role: LayerRole,
}

impl StructureLayerSpec {
    pub const fn new(base_height: f64, radius: f64, role: LayerRole) -> Self {
        StructureLayerSpec {
            base_height,
            radius,
            role,
        }
    }
}

/// Layer stack from the ground station up to the bearing
pub const DEFAULT_LAYERS: [StructureLayerSpec; 7] = [
    StructureLayerSpec::new(0.0, 160.0, LayerRole::Hub),
    StructureLayerSpec::new(400.0, 380.0, LayerRole::TransmissionRing),
    StructureLayerSpec::new(800.0, 520.0, LayerRole::TransmissionRing),
    StructureLayerSpec::new(1200.0, 660.0, LayerRole::TransmissionRing),
    StructureLayerSpec::new(1600.0, 780.0, LayerRole::RotorHubRing),
    StructureLayerSpec::new(2000.0, 1000.0, LayerRole::RotorPlane),
    StructureLayerSpec::new(2300.0, 140.0, LayerRole::Bearing),
];

/// Per-frame values that drive the geometry
#[derive(Debug, Clone, Copy)]
pub struct GeometryParams {
    /// Accumulated rotor angle (radians)
    pub rotation: f64,
    /// Regen torque demand (%)
    pub torque: f64,
    /// Deployment in [0, 1]
    pub deployment: f64,
    pub blade_count: u32,
    /// Outer blade length (cm)
    pub outer_length: f64,
    /// Inner blade length (cm)
    pub inner_length: f64,
    /// Current electrical output
    pub kw: u32,
    /// Simulated time (seconds)
    pub time: f64,
}

/// One layer placed in the world
#[derive(Debug, Clone)]
pub struct Layer {
    pub role: LayerRole,
    pub center: Vec3,
    pub radius: f64,
    /// One point per blade position, used by struts
    pub points: Vec<Vec3>,
    /// Closed outline for rings and disks
    pub rim: Vec<Vec3>,
}

/// A quadrilateral sail with cross ribs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KitePanel {
    /// Corners in order: inner leading, outer leading, outer trailing, inner trailing
    pub corners: [Vec3; 4],
    pub ribs: u32,
}

impl KitePanel {
    /// Rib segments running between the first and last edge
    pub fn rib_segments(&self) -> Vec<[Vec3; 2]> {
        let [a, b, c, d] = self.corners;
        (1..=self.ribs)
            .map(|i| {
                let t = i as f64 / (self.ribs + 1) as f64;
                [lerp_point(&a, &b, t), lerp_point(&d, &c, t)]
            })
            .collect()
    }

    pub fn centroid(&self) -> Vec3 {
        let sum = self.corners.iter().fold([0.0; 3], |acc, p| add(&acc, p));
        scale(&sum, 0.25)
    }
}

/// A rotor blade spanning the rotor plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blade {
    pub inner_tip: Vec3,
    pub outer_tip: Vec3,
    pub panel: KitePanel,
}

/// Axis-aligned box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxGeometry {
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl BoxGeometry {
    /// Quads as corner indices into [`BoxGeometry::corners`]
    pub const FACES: [[usize; 4]; 6] = [
        [0, 1, 2, 3],
        [5, 4, 7, 6],
        [4, 0, 3, 7],
        [1, 5, 6, 2],
        [4, 5, 1, 0],
        [3, 2, 6, 7],
    ];

    pub fn corners(&self) -> [Vec3; 8] {
        let [cx, cy, cz] = self.center;
        let [hx, hy, hz] = self.half_extents;
        [
            [cx - hx, cy - hy, cz - hz],
            [cx + hx, cy - hy, cz - hz],
            [cx + hx, cy + hy, cz - hz],
            [cx - hx, cy + hy, cz - hz],
            [cx - hx, cy - hy, cz + hz],
            [cx + hx, cy - hy, cz + hz],
            [cx + hx, cy + hy, cz + hz],
            [cx - hx, cy + hy, cz + hz],
        ]
    }

    /// Centre of the top face
    pub fn top(&self) -> Vec3 {
        [self.center[0], self.center[1] + self.half_extents[1], self.center[2]]
    }
}

/// Everything the scene draws for one frame
#[derive(Debug, Clone)]
pub struct StructureGeometry {
    pub layers: Vec<Layer>,
    pub blades: Vec<Blade>,
    pub kite: KitePanel,
    pub kite_center: Vec3,
    /// Bearing to kite
    pub tether: [Vec3; 2],
    /// Hub to battery
    pub cable: [Vec3; 2],
    pub battery: BoxGeometry,
    /// Position of the power-flow pulse along the cable, when producing
    pub power_pulse: Option<Vec3>,
}

impl StructureGeometry {
    /// First layer with the given role
    pub fn layer(&self, role: LayerRole) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.role == role)
    }
}

/// Builds world-space geometry of the turbine for one frame
#[derive(Debug, Clone)]
pub struct GeometryBuilder {
    layers: Vec<StructureLayerSpec>,
    battery: BoxGeometry,
}

impl Default for GeometryBuilder {
    fn default() -> Self {
        GeometryBuilder::new(DEFAULT_LAYERS.to_vec())
    }
}

/// Angular offset of a layer from transmission wind-up
pub fn twist_angle(torque: f64, deployment: f64, height: f64) -> f64 {
    let height_factor = (height / TWIST_REFERENCE_HEIGHT).clamp(0.0, 1.0);
    torque / 100.0 * MAX_TWIST * deployment * height_factor
}

fn polar(radius: f64, angle: f64, height: f64) -> Vec3 {
    let (sin, cos) = angle.sin_cos();
    [radius * cos, height, radius * sin]
}

impl GeometryBuilder {
    pub fn new(layers: Vec<StructureLayerSpec>) -> Self {
        GeometryBuilder {
            layers,
            battery: BoxGeometry {
                center: [-900.0, 60.0, -500.0],
                half_extents: [150.0, 60.0, 90.0],
            },
        }
    }

    pub fn build(&self, params: &GeometryParams) -> StructureGeometry {
        let d = params.deployment.clamp(0.0, 1.0);
        let tilt = rotation_x(lerp(GROUNDED_TILT, FLYING_TILT, d));
        let length_scale = lerp(GROUNDED_LENGTH_SCALE, 1.0, d);
        let base = [0.0, lerp(0.0, FLYING_BASE_OFFSET, d), 0.0];
        let place = |local: &Vec3| add(&multiply_matrix_vector(&tilt, local), &base);

        let n = params.blade_count.max(1);
        let step = TAU / n as f64;

        let mut layers = Vec::with_capacity(self.layers.len());
        let mut blades = Vec::new();
        for spec in &self.layers {
            let height = spec.base_height * length_scale;
            let phase = params.rotation + twist_angle(params.torque, d, height);
            let points = (0..n)
                .map(|i| place(&polar(spec.radius, i as f64 * step + phase, height)))
                .collect();
            let rim = (0..RIM_SEGMENTS)
                .map(|i| place(&polar(spec.radius, i as f64 * TAU / RIM_SEGMENTS as f64 + phase, height)))
                .collect();

            if spec.role == LayerRole::RotorPlane {
                let inner_radius = (spec.radius - params.inner_length).max(0.0);
                let outer_radius = spec.radius + params.outer_length;
                for i in 0..n {
                    let angle = i as f64 * step + phase;
                    let (inner_chord, outer_chord) = (BLADE_CHORD.0 / 2.0, BLADE_CHORD.1 / 2.0);
                    blades.push(Blade {
                        inner_tip: place(&polar(inner_radius, angle, height)),
                        outer_tip: place(&polar(outer_radius, angle, height)),
                        panel: KitePanel {
                            corners: [
                                place(&polar(inner_radius, angle + inner_chord, height)),
                                place(&polar(outer_radius, angle + outer_chord, height)),
                                place(&polar(outer_radius, angle - outer_chord, height)),
                                place(&polar(inner_radius, angle - inner_chord, height)),
                            ],
                            ribs: 3,
                        },
                    });
                }
            }

            layers.push(Layer {
                role: spec.role,
                center: place(&[0.0, height, 0.0]),
                radius: spec.radius,
                points,
                rim,
            });
        }

        let top_height = self
            .layers
            .iter()
            .map(|spec| spec.base_height)
            .fold(0.0, f64::max)
            * length_scale;
        let bearing = place(&[0.0, top_height, 0.0]);
        let axis = multiply_matrix_vector(&tilt, &[0.0, 1.0, 0.0]);
        let sway = (params.time * 0.7).sin() * KITE_SWAY * d;
        let kite_center = add(&add(&bearing, &scale(&axis, KITE_DISTANCE)), &[sway, 0.0, 0.0]);
        let (half_length, half_span) = KITE_HALF_SIZE;
        let kite = KitePanel {
            corners: [
                add(&kite_center, &scale(&axis, half_length)),
                add(&kite_center, &[half_span, 0.0, 0.0]),
                add(&kite_center, &scale(&axis, -half_length)),
                add(&kite_center, &[-half_span, 0.0, 0.0]),
            ],
            ribs: 3,
        };

        let hub = place(&[0.0, 0.0, 0.0]);
        let cable = [hub, self.battery.top()];
        let power_pulse = (params.kw > 0).then(|| {
            let phase = (params.time * (0.3 + params.kw as f64 / 30.0)).fract();
            lerp_point(&cable[0], &cable[1], phase)
        });

        StructureGeometry {
            layers,
            blades,
            kite,
            kite_center,
            tether: [bearing, kite_center],
            cable,
            battery: self.battery,
            power_pulse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{length, sub};
    use approx::assert_abs_diff_eq;

    fn params(deployment: f64) -> GeometryParams {
        GeometryParams {
            rotation: 0.3,
            torque: 50.0,
            deployment,
            blade_count: 6,
            outer_length: 380.0,
            inner_length: 230.0,
            kw: 12,
            time: 2.0,
        }
    }

    #[test]
    fn test_one_point_per_blade_on_every_layer() {
        let geometry = GeometryBuilder::default().build(&params(1.0));
        assert_eq!(geometry.layers.len(), DEFAULT_LAYERS.len());
        for layer in &geometry.layers {
            assert_eq!(layer.points.len(), 6);
            assert_eq!(layer.rim.len(), RIM_SEGMENTS);
            for point in &layer.points {
                assert_abs_diff_eq!(length(&sub(point, &layer.center)), layer.radius, epsilon = 1e-9);
            }
        }
        assert_eq!(geometry.blades.len(), 6);
    }

    #[test]
    fn test_blade_tips_follow_blade_lengths() {
        let geometry = GeometryBuilder::default().build(&params(1.0));
        let rotor = geometry.layer(LayerRole::RotorPlane).unwrap();
        for blade in &geometry.blades {
            assert_abs_diff_eq!(length(&sub(&blade.inner_tip, &rotor.center)), 770.0, epsilon = 1e-9);
            assert_abs_diff_eq!(length(&sub(&blade.outer_tip, &rotor.center)), 1380.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_twist_grows_with_height_then_saturates() {
        assert_eq!(twist_angle(0.0, 1.0, 1000.0), 0.0);
        assert_eq!(twist_angle(100.0, 0.0, 1000.0), 0.0);
        let low = twist_angle(80.0, 1.0, 400.0);
        let mid = twist_angle(80.0, 1.0, 1200.0);
        assert!(low < mid);
        assert_eq!(twist_angle(80.0, 1.0, 1600.0), twist_angle(80.0, 1.0, 2400.0));
        assert_abs_diff_eq!(twist_angle(100.0, 1.0, 5000.0), MAX_TWIST, epsilon = 1e-12);
    }

    #[test]
    fn test_grounded_structure_lies_low_and_short() {
        let builder = GeometryBuilder::default();
        let flying = builder.build(&params(1.0));
        let grounded = builder.build(&params(0.0));
        let top = |g: &StructureGeometry| g.layer(LayerRole::Bearing).unwrap().center;
        assert!(top(&grounded)[1] < top(&flying)[1]);
        assert!(length(&top(&grounded)) < length(&top(&flying)));
        assert_abs_diff_eq!(grounded.layer(LayerRole::Hub).unwrap().center[1], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(flying.layer(LayerRole::Hub).unwrap().center[1], FLYING_BASE_OFFSET, epsilon = 1e-9);
    }

    #[test]
    fn test_kite_sway_vanishes_on_the_ground() {
        let builder = GeometryBuilder::default();
        let grounded = builder.build(&params(0.0));
        assert_abs_diff_eq!(grounded.kite_center[0], 0.0, epsilon = 1e-9);
        let flying = builder.build(&params(1.0));
        assert_abs_diff_eq!(flying.kite_center[0], (2.0f64 * 0.7).sin() * KITE_SWAY, epsilon = 1e-9);
        assert_eq!(flying.tether[1], flying.kite_center);
    }

    #[test]
    fn test_power_pulse_only_when_producing() {
        let builder = GeometryBuilder::default();
        assert!(builder.build(&params(1.0)).power_pulse.is_some());
        let idle = GeometryParams { kw: 0, ..params(1.0) };
        assert!(builder.build(&idle).power_pulse.is_none());
    }

    #[test]
    fn test_rotation_turns_every_layer() {
        let builder = GeometryBuilder::default();
        let a = builder.build(&params(1.0));
        let b = builder.build(&GeometryParams { rotation: 0.3 + TAU / 6.0, ..params(1.0) });
        // A sixth of a turn maps blade i onto blade i + 1
        for (layer_a, layer_b) in a.layers.iter().zip(&b.layers) {
            for k in 0..3 {
                assert_abs_diff_eq!(layer_a.points[1][k], layer_b.points[0][k], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_box_faces_cover_every_corner() {
        let mut seen = [0; 8];
        for face in BoxGeometry::FACES {
            for index in face {
                seen[index] += 1;
            }
        }
        assert!(seen.iter().all(|&count| count == 3));
    }

    #[test]
    fn test_panel_ribs_lie_between_edges() {
        let panel = KitePanel {
            corners: [[0.0, 0.0, 0.0], [4.0, 0.0, 0.0], [4.0, 2.0, 0.0], [0.0, 2.0, 0.0]],
            ribs: 3,
        };
        let ribs = panel.rib_segments();
        assert_eq!(ribs.len(), 3);
        assert_eq!(ribs[1], [[2.0, 0.0, 0.0], [2.0, 2.0, 0.0]]);
        assert_eq!(panel.centroid(), [2.0, 1.0, 0.0]);
    }
}
