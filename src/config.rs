use crate::error::AppError;
use crate::math::Vec3;
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Command line options
#[derive(Parser, Debug, Default)]
#[command(version, about = "A console-based kite turbine rotor simulation and 3D viewer")]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Initial wind speed in m/s (0-25)
    #[arg(long)]
    pub wind: Option<f64>,

    /// Initial regen torque demand in percent (0-100)
    #[arg(long)]
    pub torque: Option<f64>,

    /// Start with the autopilot engaged
    #[arg(long)]
    pub autopilot: bool,

    /// Number of blades (5-12)
    #[arg(long)]
    pub blades: Option<u32>,

    /// Outer blade length in cm (100-1500)
    #[arg(long)]
    pub outer: Option<f64>,

    /// Inner blade length in cm (0-800)
    #[arg(long)]
    pub inner: Option<f64>,

    /// Frames per second
    #[arg(long)]
    pub fps: Option<u32>,

    /// Run without a terminal UI
    #[arg(long)]
    pub headless: bool,

    /// Number of frames to simulate in headless mode
    #[arg(long, default_value_t = 600)]
    pub frames: u64,

    /// Log file for interactive mode
    #[arg(long, default_value = "kite-turbine.log")]
    pub log_file: PathBuf,

    /// Enable debug logging and the debug HUD
    #[arg(short, long)]
    pub debug: bool,
}

/// Full runtime configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub inputs: InputsConfig,
    pub camera: CameraConfig,
    pub tuning: TuningConfig,
    pub timing: TimingConfig,
}

/// Initial values of the externally settable simulation inputs
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputsConfig {
    pub wind_speed: f64,
    pub torque: f64,
    pub autopilot: bool,
    pub blade_count: u32,
    pub outer_length: f64,
    pub inner_length: f64,
}

impl Default for InputsConfig {
    fn default() -> Self {
        InputsConfig {
            wind_speed: 12.0,
            torque: 50.0,
            autopilot: false,
            blade_count: 6,
            outer_length: 380.0,
            inner_length: 230.0,
        }
    }
}

/// Initial camera pose, focal constant and input sensitivities
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub theta: f64,
    pub phi: f64,
    pub radius: f64,
    pub target: Vec3,
    /// Focal constant of the perspective divide
    pub fov: f64,
    pub orbit_sensitivity: f64,
    pub pan_divisor: f64,
    pub zoom_step: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        CameraConfig {
            theta: 0.6,
            phi: 0.35,
            radius: 12_000.0,
            target: [0.0, 1600.0, 0.0],
            fov: 400.0,
            orbit_sensitivity: 0.01,
            pan_divisor: 800.0,
            zoom_step: 1.1,
        }
    }
}

/// Empirical constants of the rotor model
///
/// None of these have a physical derivation; they reproduce the interactive
/// behaviour of the turbine and are kept configurable for that reason.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    pub base_optimal_tsr: f64,
    pub reference_blade_count: f64,
    pub reference_outer_length: f64,
    pub reference_inner_length: f64,
    /// Optimal TSR lost per extra blade
    pub blade_count_sensitivity: f64,
    /// Optimal TSR gained per unit of hollow ratio
    pub hollow_sensitivity: f64,
    /// Optimal TSR gained per metre of outer blade
    pub outer_length_sensitivity: f64,
    pub min_optimal_tsr: f64,
    /// `maxTsr - optimalTsr`
    pub tsr_spread: f64,
    pub autopilot_gain: f64,
    pub autopilot_max_torque: f64,
    pub autopilot_ease: f64,
    pub load_reference_wind: f64,
    pub load_reference_torque: f64,
    pub braking_slope: f64,
    pub inertia: f64,
    pub runaway_entry_tsr: f64,
    pub runaway_pinned_tsr: f64,
    pub runaway_clear_wind: f64,
    pub max_kw: f64,
    pub rated_rpm: f64,
    pub power_per_extra_blade: f64,
    pub rotor_plane_radius: f64,
    pub overspeed_risk_factor: f64,
    pub compression_torque: f64,
    pub compression_wind: f64,
    pub stall_factor: f64,
    pub overspeed_factor: f64,
    pub grounded_wind: f64,
    pub deploy_rate: f64,
    pub deploy_snap: f64,
    /// +1 or -1, direction positive torque turns the rotor
    pub spin_direction: f64,
}

impl Default for TuningConfig {
    fn default() -> Self {
        TuningConfig {
            base_optimal_tsr: 4.0,
            reference_blade_count: 6.0,
            reference_outer_length: 380.0,
            reference_inner_length: 230.0,
            blade_count_sensitivity: 0.25,
            hollow_sensitivity: 0.5,
            outer_length_sensitivity: 0.1,
            min_optimal_tsr: 1.0,
            tsr_spread: 2.0,
            autopilot_gain: 2.0,
            autopilot_max_torque: 80.0,
            autopilot_ease: 0.1,
            load_reference_wind: 12.0,
            load_reference_torque: 100.0,
            braking_slope: 2.0,
            inertia: 0.05,
            runaway_entry_tsr: 5.8,
            runaway_pinned_tsr: 6.2,
            runaway_clear_wind: 18.0,
            max_kw: 30.0,
            rated_rpm: 32.0,
            power_per_extra_blade: 0.05,
            rotor_plane_radius: 1000.0,
            overspeed_risk_factor: 1.3,
            compression_torque: 85.0,
            compression_wind: 10.0,
            stall_factor: 0.6,
            overspeed_factor: 1.25,
            grounded_wind: 3.0,
            deploy_rate: 0.8,
            deploy_snap: 0.001,
            spin_direction: 1.0,
        }
    }
}

/// Frame and telemetry cadence
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub fps: u32,
    pub telemetry_period_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            fps: 30,
            telemetry_period_ms: 250,
        }
    }
}

impl TimingConfig {
    /// Fixed simulation step in seconds
    pub fn frame_dt(&self) -> f64 {
        1.0 / self.fps.max(1) as f64
    }
}

impl Config {
    /// Builds the configuration from an optional TOML file plus command line overrides
    pub fn load(cli: &Cli) -> Result<Self, AppError> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| AppError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses configuration text
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(wind) = cli.wind {
            self.inputs.wind_speed = wind;
        }
        if let Some(torque) = cli.torque {
            self.inputs.torque = torque;
        }
        if cli.autopilot {
            self.inputs.autopilot = true;
        }
        if let Some(blades) = cli.blades {
            self.inputs.blade_count = blades;
        }
        if let Some(outer) = cli.outer {
            self.inputs.outer_length = outer;
        }
        if let Some(inner) = cli.inner {
            self.inputs.inner_length = inner;
        }
        if let Some(fps) = cli.fps {
            self.timing.fps = fps;
        }
    }

    /// Rejects non-finite numbers and tuning bounds the model cannot run with.
    ///
    /// Input ranges are applied later by clamping, never rejected here.
    fn validate(&self) -> Result<(), AppError> {
        let mut fields = vec![
            ("inputs.wind_speed", self.inputs.wind_speed),
            ("inputs.torque", self.inputs.torque),
            ("inputs.outer_length", self.inputs.outer_length),
            ("inputs.inner_length", self.inputs.inner_length),
        ];
        fields.extend(self.camera.fields());
        fields.extend(self.tuning.fields());
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(AppError::InvalidConfig { field, value });
            }
        }

        // Lower bounds; the first three are upper ends of clamp ranges starting at 0
        let minimums = [
            ("tuning.max_kw", self.tuning.max_kw, 0.0),
            ("tuning.autopilot_max_torque", self.tuning.autopilot_max_torque, 0.0),
            ("tuning.rotor_plane_radius", self.tuning.rotor_plane_radius, 0.0),
        ];
        for (field, value, min) in minimums {
            if value < min {
                return Err(AppError::InvalidConfig { field, value });
            }
        }
        let positives = [
            ("camera.fov", self.camera.fov),
            ("tuning.load_reference_wind", self.tuning.load_reference_wind),
            ("tuning.rated_rpm", self.tuning.rated_rpm),
        ];
        for (field, value) in positives {
            if value <= 0.0 {
                return Err(AppError::InvalidConfig { field, value });
            }
        }
        Ok(())
    }
}

impl CameraConfig {
    /// Every float setting with its config path
    fn fields(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("camera.theta", self.theta),
            ("camera.phi", self.phi),
            ("camera.radius", self.radius),
            ("camera.target", self.target[0]),
            ("camera.target", self.target[1]),
            ("camera.target", self.target[2]),
            ("camera.fov", self.fov),
            ("camera.orbit_sensitivity", self.orbit_sensitivity),
            ("camera.pan_divisor", self.pan_divisor),
            ("camera.zoom_step", self.zoom_step),
        ]
    }
}

impl TuningConfig {
    /// Every constant with its config path
    fn fields(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("tuning.base_optimal_tsr", self.base_optimal_tsr),
            ("tuning.reference_blade_count", self.reference_blade_count),
            ("tuning.reference_outer_length", self.reference_outer_length),
            ("tuning.reference_inner_length", self.reference_inner_length),
            ("tuning.blade_count_sensitivity", self.blade_count_sensitivity),
            ("tuning.hollow_sensitivity", self.hollow_sensitivity),
            ("tuning.outer_length_sensitivity", self.outer_length_sensitivity),
            ("tuning.min_optimal_tsr", self.min_optimal_tsr),
            ("tuning.tsr_spread", self.tsr_spread),
            ("tuning.autopilot_gain", self.autopilot_gain),
            ("tuning.autopilot_max_torque", self.autopilot_max_torque),
            ("tuning.autopilot_ease", self.autopilot_ease),
            ("tuning.load_reference_wind", self.load_reference_wind),
            ("tuning.load_reference_torque", self.load_reference_torque),
            ("tuning.braking_slope", self.braking_slope),
            ("tuning.inertia", self.inertia),
            ("tuning.runaway_entry_tsr", self.runaway_entry_tsr),
            ("tuning.runaway_pinned_tsr", self.runaway_pinned_tsr),
            ("tuning.runaway_clear_wind", self.runaway_clear_wind),
            ("tuning.max_kw", self.max_kw),
            ("tuning.rated_rpm", self.rated_rpm),
            ("tuning.power_per_extra_blade", self.power_per_extra_blade),
            ("tuning.rotor_plane_radius", self.rotor_plane_radius),
            ("tuning.overspeed_risk_factor", self.overspeed_risk_factor),
            ("tuning.compression_torque", self.compression_torque),
            ("tuning.compression_wind", self.compression_wind),
            ("tuning.stall_factor", self.stall_factor),
            ("tuning.overspeed_factor", self.overspeed_factor),
            ("tuning.grounded_wind", self.grounded_wind),
            ("tuning.deploy_rate", self.deploy_rate),
            ("tuning.deploy_snap", self.deploy_snap),
            ("tuning.spin_direction", self.spin_direction),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml("[inputs]\nwind_speed = 20.0\n").unwrap();
        assert_eq!(config.inputs.wind_speed, 20.0);
        assert_eq!(config.inputs.blade_count, 6);
        assert_eq!(config.tuning.runaway_pinned_tsr, 6.2);
        assert_eq!(config.timing.fps, 30);
    }

    #[test]
    fn test_cli_overrides_file_values() {
        let cli = Cli {
            wind: Some(7.5),
            blades: Some(9),
            autopilot: true,
            ..Cli::default()
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.inputs.wind_speed, 7.5);
        assert_eq!(config.inputs.blade_count, 9);
        assert!(config.inputs.autopilot);
    }

    #[test]
    fn test_non_finite_values_are_rejected() {
        let cli = Cli {
            torque: Some(f64::NAN),
            ..Cli::default()
        };
        assert!(matches!(
            Config::load(&cli),
            Err(AppError::InvalidConfig { field: "inputs.torque", .. })
        ));
    }

    #[test]
    fn test_non_finite_tuning_file_is_rejected() {
        let path = std::env::temp_dir().join(format!("kite-turbine-nan-{}.toml", std::process::id()));
        std::fs::write(&path, "[tuning]\nmax_kw = nan\n").unwrap();
        let cli = Cli {
            config: Some(path.clone()),
            ..Cli::default()
        };
        let result = Config::load(&cli);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            result,
            Err(AppError::InvalidConfig { field: "tuning.max_kw", .. })
        ));
    }

    #[test]
    fn test_every_float_setting_is_checked() {
        let mut config = Config::default();
        config.camera.target[1] = f64::INFINITY;
        assert!(matches!(
            config.validate(),
            Err(AppError::InvalidConfig { field: "camera.target", .. })
        ));

        let mut config = Config::default();
        config.tuning.spin_direction = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(AppError::InvalidConfig { field: "tuning.spin_direction", .. })
        ));
    }

    #[test]
    fn test_inverted_clamp_bounds_are_rejected() {
        for text in ["max_kw = -1.0", "autopilot_max_torque = -5.0", "rated_rpm = 0.0"] {
            let config = Config::from_toml(&format!("[tuning]\n{text}\n")).unwrap();
            assert!(
                matches!(config.validate(), Err(AppError::InvalidConfig { .. })),
                "{text}"
            );
        }
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_bad_toml_is_a_parse_error() {
        assert!(Config::from_toml("[inputs\nwind_speed = 1").is_err());
    }

    #[test]
    fn test_frame_dt_never_divides_by_zero() {
        let timing = TimingConfig { fps: 0, telemetry_period_ms: 250 };
        assert_eq!(timing.frame_dt(), 1.0);
    }
}
