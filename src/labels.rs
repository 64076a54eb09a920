use crate::geometry::{LayerRole, StructureGeometry};
use crate::math::{add, Vec3};
use crate::physics::Status;
use crate::projector::{Projector, Viewport};
use crate::vertex::ScreenPoint;

/// Sideways distance of the anchor beyond the reference radius (cm)
pub const ANCHOR_OUTSET: f64 = 250.0;
/// Height of the anchor above the reference layer (cm)
pub const ANCHOR_LIFT: f64 = 300.0;
/// Screen offset used when the anchor itself is culled (pixels)
pub const FALLBACK_OFFSET: [f64; 2] = [6.0, -4.0];
/// Viewport margin used by the overlay when suppressing labels (pixels)
pub const VISIBILITY_MARGIN: f64 = 2.0;

/// A callout for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct LabelAnchor {
    /// Where the leader line points
    pub target: ScreenPoint,
    /// Where the text sits
    pub anchor: ScreenPoint,
    pub primary: String,
    pub secondary: Option<String>,
    pub status: Option<Status>,
}

impl LabelAnchor {
    /// Overlay-side visibility test on the anchor position
    pub fn is_visible(&self, viewport: Viewport, margin: f64) -> bool {
        viewport.contains(self.anchor.x, self.anchor.y, margin)
    }
}

/// What a label points at and says
#[derive(Debug, Clone)]
pub struct LabelSpec {
    pub target: Vec3,
    pub reference_center: Vec3,
    pub reference_radius: f64,
    pub primary: String,
    pub secondary: Option<String>,
    pub status: Option<Status>,
}

/// Live values written into the callouts
#[derive(Debug, Clone, Copy)]
pub struct LabelContext {
    pub outer_length: f64,
    pub inner_length: f64,
    pub kw: u32,
    pub tsr: f64,
    pub status: Status,
}

/// Projects a label; `None` only when the target itself is culled
pub fn project_label(projector: &Projector, spec: LabelSpec) -> Option<LabelAnchor> {
    let target = projector.project(&spec.target)?;
    let anchor_world = add(
        &spec.reference_center,
        &[spec.reference_radius + ANCHOR_OUTSET, ANCHOR_LIFT, 0.0],
    );
    let anchor = projector.project(&anchor_world).unwrap_or(ScreenPoint::new(
        target.x + FALLBACK_OFFSET[0],
        target.y + FALLBACK_OFFSET[1],
        target.depth,
    ));
    Some(LabelAnchor {
        target,
        anchor,
        primary: spec.primary,
        secondary: spec.secondary,
        status: spec.status,
    })
}

/// Blade, rotor and status callouts for the current geometry
pub fn turbine_labels(
    projector: &Projector,
    geometry: &StructureGeometry,
    context: &LabelContext,
) -> Vec<LabelAnchor> {
    let mut specs = Vec::with_capacity(3);

    if let (Some(rotor), Some(blade)) = (geometry.layer(LayerRole::RotorPlane), geometry.blades.first()) {
        specs.push(LabelSpec {
            target: blade.outer_tip,
            reference_center: rotor.center,
            reference_radius: rotor.radius + context.outer_length,
            primary: format!("Blade outer {:.0} cm", context.outer_length),
            secondary: Some(format!("inner {:.0} cm", context.inner_length)),
            status: None,
        });
    }
    if let Some(hub) = geometry.layer(LayerRole::RotorHubRing) {
        specs.push(LabelSpec {
            target: hub.center,
            reference_center: hub.center,
            reference_radius: hub.radius,
            primary: format!("Rotor {} kW", context.kw),
            secondary: None,
            status: None,
        });
    }
    if let Some(bearing) = geometry.layer(LayerRole::Bearing) {
        specs.push(LabelSpec {
            target: bearing.center,
            reference_center: bearing.center,
            reference_radius: bearing.radius,
            primary: context.status.to_string(),
            secondary: Some(format!("TSR {:.1}", context.tsr)),
            status: Some(context.status),
        });
    }

    specs
        .into_iter()
        .filter_map(|spec| project_label(projector, spec))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraPose;
    use crate::config::CameraConfig;
    use crate::geometry::{GeometryBuilder, GeometryParams};

    fn geometry() -> StructureGeometry {
        GeometryBuilder::default().build(&GeometryParams {
            rotation: 0.2,
            torque: 50.0,
            deployment: 1.0,
            blade_count: 6,
            outer_length: 380.0,
            inner_length: 230.0,
            kw: 19,
            time: 0.0,
        })
    }

    fn context() -> LabelContext {
        LabelContext {
            outer_length: 380.0,
            inner_length: 230.0,
            kw: 19,
            tsr: 4.96,
            status: Status::Optimal,
        }
    }

    fn spec(target: Vec3, center: Vec3) -> LabelSpec {
        LabelSpec {
            target,
            reference_center: center,
            reference_radius: 100.0,
            primary: "x".into(),
            secondary: None,
            status: None,
        }
    }

    #[test]
    fn test_default_view_emits_all_labels() {
        let config = CameraConfig::default();
        let projector = Projector::new(&CameraPose::from(&config), Viewport::new(200.0, 100.0), config.fov);
        let labels = turbine_labels(&projector, &geometry(), &context());
        assert_eq!(labels.len(), 3);
        assert_eq!(labels[0].primary, "Blade outer 380 cm");
        assert_eq!(labels[0].secondary.as_deref(), Some("inner 230 cm"));
        assert_eq!(labels[1].primary, "Rotor 19 kW");
        assert_eq!(labels[2].primary, "OPTIMAL");
        assert_eq!(labels[2].secondary.as_deref(), Some("TSR 5.0"));
        assert_eq!(labels[2].status, Some(Status::Optimal));
    }

    #[test]
    fn test_culled_target_yields_no_label() {
        let pose = CameraPose::new(0.0, 0.0, 1000.0, [0.0, 0.0, 0.0]);
        let projector = Projector::new(&pose, Viewport::new(200.0, 100.0), 400.0);
        assert!(project_label(&projector, spec([0.0, 0.0, 2000.0], [0.0, 0.0, 0.0])).is_none());
    }

    #[test]
    fn test_culled_anchor_falls_back_next_to_target() {
        let pose = CameraPose::new(0.0, 0.0, 1000.0, [0.0, 0.0, 0.0]);
        let projector = Projector::new(&pose, Viewport::new(200.0, 100.0), 400.0);
        let label = project_label(&projector, spec([0.0, 0.0, 0.0], [0.0, 0.0, 3000.0])).unwrap();
        assert_eq!(label.anchor.x, label.target.x + FALLBACK_OFFSET[0]);
        assert_eq!(label.anchor.y, label.target.y + FALLBACK_OFFSET[1]);
    }

    #[test]
    fn test_labels_are_emitted_even_off_screen() {
        // Projector never suppresses; the overlay does
        let pose = CameraPose::new(0.0, 0.0, 1000.0, [0.0, 0.0, 0.0]);
        let projector = Projector::new(&pose, Viewport::new(20.0, 10.0), 400.0);
        let label = project_label(&projector, spec([0.0, 0.0, 0.0], [5000.0, 0.0, 0.0])).unwrap();
        assert!(!label.is_visible(Viewport::new(20.0, 10.0), VISIBILITY_MARGIN));
    }
}
