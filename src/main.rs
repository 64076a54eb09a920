mod camera;
mod config;
mod error;
mod geometry;
mod graphics;
mod labels;
mod math;
mod physics;
mod projector;
mod render;
mod scene;
mod simulation;
mod state;
mod vertex;
mod widget;

use crate::config::{Cli, Config};
use crate::error::AppError;
use crate::graphics::Canvas;
use crate::simulation::{SimulationLoop, Telemetry};
use crate::state::AppState;
use crate::widget::{TerminalSession, TurbineView};
use clap::Parser;
use std::fs::File;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Terminal size used when no terminal can be queried
const FALLBACK_SIZE: (u16, u16) = (80, 24);

/// Installs the tracing subscriber.
///
/// The interactive renderer owns the terminal, so logs go to a file there;
/// headless runs log to stderr.
fn init_logging(cli: &Cli) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.debug { "debug" } else { "info" }));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if cli.headless {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    } else {
        let file = File::create(&cli.log_file)?;
        registry
            .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .try_init()
    };
    result.map_err(|e| AppError::Logging(e.to_string()))
}

fn format_telemetry(telemetry: &Telemetry) -> String {
    format!(
        "rpm={} tsr={:.1} kw={} status={} runaway={} grounded={} autopilot={}",
        telemetry.rpm,
        telemetry.tsr,
        telemetry.kw,
        telemetry.status,
        telemetry.is_runaway,
        telemetry.is_grounded,
        telemetry.autopilot
    )
}

/// Runs the full pipeline against an off-screen canvas at the fixed frame step
fn run_headless(config: &Config, frames: u64, state: &mut AppState, sim: &mut SimulationLoop) -> Telemetry {
    let (columns, rows) = termsize::get()
        .map(|size| (size.cols, size.rows))
        .unwrap_or(FALLBACK_SIZE);
    let mut canvas = Canvas::new(columns as usize, rows as usize * 2);
    let dt = config.timing.frame_dt();
    info!(frames, columns, rows, "running headless");

    for _ in 0..frames {
        if !sim.is_running() {
            break;
        }
        sim.frame(state, dt, &mut canvas);
    }
    *sim.telemetry()
}

fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config = Config::load(&cli)?;
    info!(
        wind = config.inputs.wind_speed,
        torque = config.inputs.torque,
        autopilot = config.inputs.autopilot,
        blades = config.inputs.blade_count,
        outer = config.inputs.outer_length,
        inner = config.inputs.inner_length,
        fps = config.timing.fps,
        "starting"
    );

    let mut state = AppState::new(&config, cli.debug);
    let mut sim = SimulationLoop::new(&config, &state.inputs);

    if cli.headless {
        let telemetry = run_headless(&config, cli.frames, &mut state, &mut sim);
        println!("{}", format_telemetry(&telemetry));
    } else {
        let mut session = TerminalSession::start()?;
        let mut view = TurbineView::new(&config);
        view.run(&mut session, &mut sim, &mut state, config.timing.fps)?;
    }

    info!(frames = sim.frames(), "shutdown");
    Ok(())
}
