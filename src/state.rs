use crate::camera::CameraPose;
use crate::config::{Config, InputsConfig};

/// Wind speed range (m/s)
pub const WIND_RANGE: (f64, f64) = (0.0, 25.0);
/// Manual torque demand range (%)
pub const TORQUE_RANGE: (f64, f64) = (0.0, 100.0);
/// Blade count range
pub const BLADE_COUNT_RANGE: (u32, u32) = (5, 12);
/// Outer blade length range (cm)
pub const OUTER_LENGTH_RANGE: (f64, f64) = (100.0, 1500.0);
/// Inner blade length range (cm)
pub const INNER_LENGTH_RANGE: (f64, f64) = (0.0, 800.0);

/// Externally settable simulation inputs
///
/// Every setter clamps to the documented range instead of rejecting the value.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationInputs {
    /// Wind speed (m/s)
    pub wind_speed: f64,
    /// Regen braking demand (%)
    pub torque: f64,
    /// Proportional TSR controller engaged
    pub autopilot: bool,
    /// Number of blades
    pub blade_count: u32,
    /// Outer blade length (cm)
    pub outer_length: f64,
    /// Inner blade length (cm)
    pub inner_length: f64,
}

impl SimulationInputs {
    pub fn set_wind_speed(&mut self, value: f64) {
        self.wind_speed = value.clamp(WIND_RANGE.0, WIND_RANGE.1);
    }

    pub fn set_torque(&mut self, value: f64) {
        self.torque = value.clamp(TORQUE_RANGE.0, TORQUE_RANGE.1);
    }

    pub fn set_blade_count(&mut self, value: u32) {
        self.blade_count = value.clamp(BLADE_COUNT_RANGE.0, BLADE_COUNT_RANGE.1);
    }

    /// Adds a signed step to the blade count, staying in range
    pub fn step_blade_count(&mut self, delta: i32) {
        let next = (self.blade_count as i64 + delta as i64).max(0) as u32;
        self.set_blade_count(next);
    }

    pub fn set_outer_length(&mut self, value: f64) {
        self.outer_length = value.clamp(OUTER_LENGTH_RANGE.0, OUTER_LENGTH_RANGE.1);
    }

    pub fn set_inner_length(&mut self, value: f64) {
        self.inner_length = value.clamp(INNER_LENGTH_RANGE.0, INNER_LENGTH_RANGE.1);
    }

    /// Ratio of inner to outer blade length
    pub fn hollow_ratio(&self) -> f64 {
        if self.outer_length > 0.0 {
            self.inner_length / self.outer_length
        } else {
            0.0
        }
    }
}

impl Default for SimulationInputs {
    fn default() -> Self {
        SimulationInputs::from(&InputsConfig::default())
    }
}

impl From<&InputsConfig> for SimulationInputs {
    fn from(config: &InputsConfig) -> Self {
        let mut inputs = SimulationInputs {
            wind_speed: 0.0,
            torque: 0.0,
            autopilot: config.autopilot,
            blade_count: BLADE_COUNT_RANGE.0,
            outer_length: OUTER_LENGTH_RANGE.0,
            inner_length: INNER_LENGTH_RANGE.0,
        };
        inputs.set_wind_speed(config.wind_speed);
        inputs.set_torque(config.torque);
        inputs.set_blade_count(config.blade_count);
        inputs.set_outer_length(config.outer_length);
        inputs.set_inner_length(config.inner_length);
        inputs
    }
}

/// Application state shared by the input handlers and the frame loop
#[derive(Debug, Clone)]
pub struct AppState {
    /// Simulation inputs
    pub inputs: SimulationInputs,
    /// Orbit camera pose
    pub camera: CameraPose,
    /// Physics paused; the camera stays live
    pub paused: bool,
    /// Draw label callouts
    pub show_labels: bool,
    /// Enable debug HUD
    pub debug: bool,
}

impl AppState {
    pub fn new(config: &Config, debug: bool) -> Self {
        AppState {
            inputs: SimulationInputs::from(&config.inputs),
            camera: CameraPose::from(&config.camera),
            paused: false,
            show_labels: true,
            debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inputs_are_clamped_not_rejected() {
        let mut inputs = SimulationInputs::default();
        inputs.set_wind_speed(40.0);
        inputs.set_torque(-3.0);
        inputs.set_outer_length(5.0);
        inputs.set_inner_length(9000.0);
        assert_eq!(inputs.wind_speed, 25.0);
        assert_eq!(inputs.torque, 0.0);
        assert_eq!(inputs.outer_length, 100.0);
        assert_eq!(inputs.inner_length, 800.0);
    }

    #[test]
    fn test_blade_count_steps_stay_in_range() {
        let mut inputs = SimulationInputs::default();
        inputs.step_blade_count(-20);
        assert_eq!(inputs.blade_count, 5);
        inputs.step_blade_count(40);
        assert_eq!(inputs.blade_count, 12);
    }

    #[test]
    fn test_config_values_are_clamped_on_load() {
        let config = InputsConfig {
            wind_speed: 99.0,
            blade_count: 2,
            ..InputsConfig::default()
        };
        let inputs = SimulationInputs::from(&config);
        assert_eq!(inputs.wind_speed, 25.0);
        assert_eq!(inputs.blade_count, 5);
    }
}
