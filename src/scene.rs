use crate::geometry::{KitePanel, LayerRole, StructureGeometry};
use crate::graphics::Rgb;
use crate::physics::Status;
use crate::projector::Projector;
use crate::render::{DrawInstruction, RenderQueue};

pub const BACKGROUND: Rgb = Rgb(8, 12, 22);
const RING: Rgb = Rgb(150, 160, 180);
const STRUT: Rgb = Rgb(90, 100, 120);
const DISK: Rgb = Rgb(70, 75, 90);
const RIB: Rgb = Rgb(235, 235, 240);
const KITE: Rgb = Rgb(230, 90, 60);
const TETHER: Rgb = Rgb(120, 120, 130);
const CABLE: Rgb = Rgb(40, 40, 45);
const BATTERY: Rgb = Rgb(60, 160, 90);
const GLOW_IDLE: Rgb = Rgb(80, 70, 20);
const GLOW_FULL: Rgb = Rgb(255, 230, 90);

/// Blade sail color for a status
pub fn blade_color(status: Status) -> Rgb {
    match status {
        Status::Grounded => Rgb(110, 110, 115),
        Status::Runaway => Rgb(220, 40, 40),
        Status::Stall => Rgb(70, 120, 220),
        Status::Overspeed => Rgb(235, 160, 40),
        Status::Optimal => Rgb(40, 200, 180),
    }
}

/// Enqueues every visual element of the turbine
pub fn build_scene(
    queue: &mut RenderQueue,
    geometry: &StructureGeometry,
    projector: &Projector,
    status: Status,
    kw: u32,
) {
    for layer in &geometry.layers {
        match layer.role {
            LayerRole::Hub | LayerRole::Bearing => {
                queue.push(DrawInstruction::polygon(projector, &layer.rim, DISK));
            }
            LayerRole::TransmissionRing | LayerRole::RotorHubRing | LayerRole::RotorPlane => {
                let count = layer.rim.len();
                for i in 0..count {
                    let next = (i + 1) % count;
                    queue.push(DrawInstruction::line(projector, &layer.rim[i], &layer.rim[next], RING));
                }
            }
        }
    }

    // Tensile struts between neighbouring layers
    for pair in geometry.layers.windows(2) {
        for (lower, upper) in pair[0].points.iter().zip(&pair[1].points) {
            queue.push(DrawInstruction::line(projector, lower, upper, STRUT));
        }
    }

    let sail = blade_color(status);
    for blade in &geometry.blades {
        push_panel(queue, projector, &blade.panel, sail);
    }

    queue.push(DrawInstruction::line(projector, &geometry.tether[0], &geometry.tether[1], TETHER));
    push_panel(queue, projector, &geometry.kite, KITE);

    queue.push(DrawInstruction::line(projector, &geometry.cable[0], &geometry.cable[1], CABLE));
    queue.push(DrawInstruction::solid_box(projector, &geometry.battery, BATTERY));

    if let Some(pulse) = geometry.power_pulse {
        let glow = GLOW_IDLE.mix(GLOW_FULL, kw as f64 / 30.0);
        queue.push(DrawInstruction::dot(projector, &pulse, 1.0, glow));
    }
}

/// A sail and its ribs; ribs sit just in front so they are drawn over the sail
fn push_panel(queue: &mut RenderQueue, projector: &Projector, panel: &KitePanel, color: Rgb) {
    let Some(sail) = DrawInstruction::polygon(projector, &panel.corners, color) else {
        return;
    };
    let depth = sail.depth;
    queue.enqueue(sail);
    for [a, b] in panel.rib_segments() {
        if let Some(mut rib) = DrawInstruction::line(projector, &a, &b, RIB) {
            rib.depth = depth + 1e-3;
            queue.enqueue(rib);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraPose;
    use crate::config::CameraConfig;
    use crate::geometry::{GeometryBuilder, GeometryParams};
    use crate::projector::Viewport;
    use crate::render::tests::RecordingSurface;

    fn geometry(kw: u32) -> StructureGeometry {
        GeometryBuilder::default().build(&GeometryParams {
            rotation: 0.0,
            torque: 40.0,
            deployment: 1.0,
            blade_count: 6,
            outer_length: 380.0,
            inner_length: 230.0,
            kw,
            time: 1.0,
        })
    }

    fn projector() -> Projector {
        let config = CameraConfig::default();
        Projector::new(&CameraPose::from(&config), Viewport::new(200.0, 100.0), config.fov)
    }

    #[test]
    fn test_default_view_enqueues_every_element() {
        let mut queue = RenderQueue::new();
        build_scene(&mut queue, &geometry(10), &projector(), Status::Optimal, 10);
        // 3 transmission rings + rotor hub ring + rotor plane rims, 2 disks,
        // 6 layers of struts, 6 blades and a kite with 3 ribs each,
        // tether, cable, battery and the power pulse
        let rims = 5 * crate::geometry::RIM_SEGMENTS;
        let expected = rims + 2 + 6 * 6 + 7 * 4 + 1 + 1 + 1 + 1;
        assert_eq!(queue.len(), expected);
    }

    #[test]
    fn test_ribs_paint_after_their_sail() {
        let mut queue = RenderQueue::new();
        let g = geometry(0);
        push_panel(&mut queue, &projector(), &g.kite, KITE);
        let mut surface = RecordingSurface::default();
        queue.flush(&mut surface);
        assert_eq!(surface.colors, vec![KITE, RIB, RIB, RIB]);
    }

    #[test]
    fn test_no_pulse_without_power() {
        let mut with_power = RenderQueue::new();
        build_scene(&mut with_power, &geometry(10), &projector(), Status::Optimal, 10);
        let mut without = RenderQueue::new();
        build_scene(&mut without, &geometry(0), &projector(), Status::Optimal, 0);
        assert_eq!(with_power.len(), without.len() + 1);
    }

    #[test]
    fn test_status_drives_blade_color() {
        assert_ne!(blade_color(Status::Runaway), blade_color(Status::Optimal));
        assert_ne!(blade_color(Status::Stall), blade_color(Status::Overspeed));
    }
}
