use crate::config::Config;
use crate::geometry::{GeometryBuilder, GeometryParams};
use crate::graphics::Surface;
use crate::labels::{turbine_labels, LabelAnchor, LabelContext};
use crate::physics::{PhysicsEngine, Status, TickReport};
use crate::projector::{Projector, Viewport};
use crate::render::RenderQueue;
use crate::scene::{build_scene, BACKGROUND};
use crate::state::{AppState, SimulationInputs};
use tracing::{debug, info};

/// Rounded, UI-facing snapshot of the rotor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telemetry {
    pub rpm: i64,
    /// TSR rounded to one decimal
    pub tsr: f64,
    pub kw: u32,
    pub status: Status,
    pub is_runaway: bool,
    pub is_grounded: bool,
    pub autopilot: bool,
    pub deployment: f64,
}

impl Telemetry {
    pub fn capture(engine: &PhysicsEngine, inputs: &SimulationInputs) -> Self {
        let state = engine.state();
        Telemetry {
            rpm: state.rpm.round() as i64,
            tsr: (state.tsr * 10.0).round() / 10.0,
            kw: state.kw,
            status: engine.status(inputs.wind_speed),
            is_runaway: state.is_runaway,
            is_grounded: engine.is_grounded(inputs.wind_speed),
            autopilot: inputs.autopilot,
            deployment: engine.deployment(),
        }
    }
}

/// Samples telemetry on a fixed period, decoupled from the frame rate
#[derive(Debug, Clone)]
pub struct TelemetrySampler {
    period: f64,
    elapsed: f64,
}

impl TelemetrySampler {
    pub fn new(period: f64) -> Self {
        TelemetrySampler {
            period: period.max(0.0),
            elapsed: 0.0,
        }
    }

    /// Returns a fresh snapshot once per period.
    ///
    /// Leftover time carries into the next period so the cadence stays fixed
    /// whatever the frame step; a zero period samples every frame.
    pub fn sample(
        &mut self,
        dt: f64,
        engine: &PhysicsEngine,
        inputs: &SimulationInputs,
    ) -> Option<Telemetry> {
        self.elapsed += dt;
        if self.elapsed + 1e-9 < self.period {
            return None;
        }
        self.elapsed = if self.period > 0.0 {
            (self.elapsed - self.period).max(0.0)
        } else {
            0.0
        };
        Some(Telemetry::capture(engine, inputs))
    }
}

/// What one frame produced for the overlay
#[derive(Debug, Clone)]
pub struct FrameOutput {
    pub labels: Vec<LabelAnchor>,
    pub viewport: Viewport,
    /// Draw instructions executed
    pub drawn: usize,
    /// Physics tick details, `None` while paused
    pub report: Option<TickReport>,
    /// Set when a new telemetry sample was taken this frame
    pub sampled: bool,
}

/// Composes physics, geometry, projection, the draw queue and labels
///
/// One frame runs, in order: deployment, physics, geometry, draw queue,
/// flush, labels.
pub struct SimulationLoop {
    engine: PhysicsEngine,
    builder: GeometryBuilder,
    queue: RenderQueue,
    sampler: TelemetrySampler,
    telemetry: Telemetry,
    fov: f64,
    time: f64,
    frames: u64,
    running: bool,
}

impl SimulationLoop {
    /// Starts on the ground; the wind decides whether it deploys
    pub fn new(config: &Config, inputs: &SimulationInputs) -> Self {
        let engine = PhysicsEngine::new(config.tuning.clone(), 0.0);
        let telemetry = Telemetry::capture(&engine, inputs);
        SimulationLoop {
            engine,
            builder: GeometryBuilder::default(),
            queue: RenderQueue::new(),
            sampler: TelemetrySampler::new(config.timing.telemetry_period_ms as f64 / 1000.0),
            telemetry,
            fov: config.camera.fov,
            time: 0.0,
            frames: 0,
            running: true,
        }
    }

    pub fn engine(&self) -> &PhysicsEngine {
        &self.engine
    }

    /// Latest throttled snapshot
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Requests a stop; takes effect at the next frame boundary
    pub fn stop(&mut self) {
        if self.running {
            info!(frames = self.frames, "simulation stopping");
        }
        self.running = false;
    }

    /// Runs one full frame against the surface
    pub fn frame(&mut self, state: &mut AppState, dt: f64, surface: &mut impl Surface) -> FrameOutput {
        let report = if state.paused {
            None
        } else {
            self.engine.advance_deployment(state.inputs.wind_speed, dt);
            let report = self.engine.step(&mut state.inputs, dt);
            self.time += dt;
            Some(report)
        };

        let physics = *self.engine.state();
        let geometry = self.builder.build(&GeometryParams {
            rotation: self.engine.rotation(),
            torque: state.inputs.torque,
            deployment: self.engine.deployment(),
            blade_count: state.inputs.blade_count,
            outer_length: state.inputs.outer_length,
            inner_length: state.inputs.inner_length,
            kw: physics.kw,
            time: self.time,
        });

        // Size is read every frame so a resize takes effect immediately
        let (width, height) = surface.size();
        let viewport = Viewport::new(width as f64, height as f64);
        let projector = Projector::new(&state.camera, viewport, self.fov);

        surface.clear(BACKGROUND);
        build_scene(&mut self.queue, &geometry, &projector, self.telemetry.status, physics.kw);
        let drawn = self.queue.flush(surface);

        let labels = if state.show_labels {
            turbine_labels(
                &projector,
                &geometry,
                &LabelContext {
                    outer_length: state.inputs.outer_length,
                    inner_length: state.inputs.inner_length,
                    kw: physics.kw,
                    tsr: physics.tsr,
                    status: self.telemetry.status,
                },
            )
        } else {
            Vec::new()
        };

        let sampled = match self.sampler.sample(dt, &self.engine, &state.inputs) {
            Some(sample) => {
                if sample.status != self.telemetry.status {
                    info!(from = %self.telemetry.status, to = %sample.status, "status changed");
                }
                debug!(
                    rpm = sample.rpm,
                    tsr = sample.tsr,
                    kw = sample.kw,
                    status = %sample.status,
                    deployment = sample.deployment,
                    "telemetry"
                );
                self.telemetry = sample;
                true
            }
            None => false,
        };

        self.frames += 1;
        FrameOutput {
            labels,
            viewport,
            drawn,
            report,
            sampled,
        }
    }
}
