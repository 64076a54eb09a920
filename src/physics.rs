use crate::config::TuningConfig;
use crate::state::SimulationInputs;
use std::f64::consts::TAU;
use std::fmt;
use tracing::{info, warn};

/// Deployment below this value counts as grounded
pub const DEPLOYED_THRESHOLD: f64 = 0.5;

/// Blade-geometry dependent aerodynamic coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AeroCoefficients {
    pub optimal_tsr: f64,
    pub max_tsr: f64,
}

impl AeroCoefficients {
    /// Shifts the optimal TSR by blade count, hollow ratio and outer length
    pub fn from_inputs(tuning: &TuningConfig, inputs: &SimulationInputs) -> Self {
        let reference_hollow = if tuning.reference_outer_length > 0.0 {
            tuning.reference_inner_length / tuning.reference_outer_length
        } else {
            0.0
        };
        let optimal_tsr = (tuning.base_optimal_tsr
            - tuning.blade_count_sensitivity * (inputs.blade_count as f64 - tuning.reference_blade_count)
            + tuning.hollow_sensitivity * (inputs.hollow_ratio() - reference_hollow)
            + tuning.outer_length_sensitivity
                * (inputs.outer_length - tuning.reference_outer_length)
                / 100.0)
            .max(tuning.min_optimal_tsr);
        AeroCoefficients {
            optimal_tsr,
            max_tsr: optimal_tsr + tuning.tsr_spread,
        }
    }
}

/// Scalar rotor state, rebuilt every tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsState {
    pub rpm: f64,
    /// Tip speed ratio, never negative
    pub tsr: f64,
    /// Electrical output, integer in [0, 30]
    pub kw: u32,
    pub optimal_tsr: f64,
    pub max_tsr: f64,
    pub overspeed_risk: bool,
    pub compression_risk: bool,
    /// Latched runaway flag
    pub is_runaway: bool,
}

impl Default for PhysicsState {
    fn default() -> Self {
        PhysicsState {
            rpm: 0.0,
            tsr: 0.0,
            kw: 0,
            optimal_tsr: 4.0,
            max_tsr: 6.0,
            overspeed_risk: false,
            compression_risk: false,
            is_runaway: false,
        }
    }
}

/// Continuous ground-to-flight transition in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deployment {
    value: f64,
}

impl Deployment {
    pub fn new(value: f64) -> Self {
        Deployment {
            value: value.clamp(0.0, 1.0),
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Target is 0 at or below the grounding wind speed, 1 above it
    pub fn target(wind_speed: f64, tuning: &TuningConfig) -> f64 {
        if wind_speed <= tuning.grounded_wind {
            0.0
        } else {
            1.0
        }
    }

    /// Eases toward the target and snaps once within the epsilon.
    ///
    /// Returns the target when it was reached on this call.
    pub fn advance(&mut self, wind_speed: f64, dt: f64, tuning: &TuningConfig) -> Option<f64> {
        let target = Self::target(wind_speed, tuning);
        if self.value == target {
            return None;
        }
        self.value += (target - self.value) * dt * tuning.deploy_rate;
        self.value = self.value.clamp(0.0, 1.0);
        if (target - self.value).abs() < tuning.deploy_snap {
            self.value = target;
            return Some(target);
        }
        None
    }

    pub fn is_deployed(&self) -> bool {
        self.value >= DEPLOYED_THRESHOLD
    }
}

/// Operating status shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Grounded,
    Runaway,
    Stall,
    Overspeed,
    Optimal,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Grounded => "GROUNDED",
            Status::Runaway => "RUNAWAY",
            Status::Stall => "STALL",
            Status::Overspeed => "OVERSPEED",
            Status::Optimal => "OPTIMAL",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values the status rules look at
#[derive(Debug, Clone, Copy)]
pub struct StatusInputs {
    pub deployment: f64,
    pub wind_speed: f64,
    pub tsr: f64,
    pub optimal_tsr: f64,
    pub is_runaway: bool,
}

type StatusGuard = fn(&StatusInputs, &TuningConfig) -> bool;

fn grounded_rule(s: &StatusInputs, t: &TuningConfig) -> bool {
    s.deployment < DEPLOYED_THRESHOLD || s.wind_speed <= t.grounded_wind
}

fn runaway_rule(s: &StatusInputs, _: &TuningConfig) -> bool {
    s.is_runaway
}

fn stall_rule(s: &StatusInputs, t: &TuningConfig) -> bool {
    s.tsr < s.optimal_tsr * t.stall_factor
}

fn overspeed_rule(s: &StatusInputs, t: &TuningConfig) -> bool {
    s.tsr > s.optimal_tsr * t.overspeed_factor
}

/// Guarded rules in precedence order; the first match wins
const STATUS_RULES: [(StatusGuard, Status); 4] = [
    (grounded_rule, Status::Grounded),
    (runaway_rule, Status::Runaway),
    (stall_rule, Status::Stall),
    (overspeed_rule, Status::Overspeed),
];

/// Classifies the rotor, falling back to [`Status::Optimal`]
pub fn classify(inputs: &StatusInputs, tuning: &TuningConfig) -> Status {
    STATUS_RULES
        .iter()
        .find(|(guard, _)| guard(inputs, tuning))
        .map(|(_, status)| *status)
        .unwrap_or(Status::Optimal)
}

/// Intermediate values of one physics tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub target_tsr: f64,
    pub required_torque: f64,
    pub brake_ratio: f64,
    pub runaway_entered: bool,
    pub runaway_cleared: bool,
    pub autopilot_disabled: bool,
}

/// Advances rotor state and owns the deployment transition
///
/// A discrete-time approximation of rotor speed under wind, regen torque and
/// an optional proportional autopilot. The operating mode is never stored: it
/// is derived from the continuous state by [`classify`], except for the
/// runaway latch which needs memory for its hysteresis.
#[derive(Debug, Clone)]
pub struct PhysicsEngine {
    tuning: TuningConfig,
    state: PhysicsState,
    deployment: Deployment,
    /// Accumulated rotor angle (radians, wrapped to one turn)
    rotation: f64,
}

impl PhysicsEngine {
    pub fn new(tuning: TuningConfig, initial_deployment: f64) -> Self {
        PhysicsEngine {
            tuning,
            state: PhysicsState::default(),
            deployment: Deployment::new(initial_deployment),
            rotation: 0.0,
        }
    }

    pub fn state(&self) -> &PhysicsState {
        &self.state
    }

    pub fn deployment(&self) -> f64 {
        self.deployment.value()
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn tuning(&self) -> &TuningConfig {
        &self.tuning
    }

    /// Moves the deployment toward its wind-determined target
    pub fn advance_deployment(&mut self, wind_speed: f64, dt: f64) {
        if let Some(target) = self.deployment.advance(wind_speed, dt, &self.tuning) {
            if target >= 1.0 {
                info!("structure fully deployed");
            } else {
                info!("structure grounded");
            }
        }
    }

    /// True when the structure is down or the wind is too weak to fly
    pub fn is_grounded(&self, wind_speed: f64) -> bool {
        !self.deployment.is_deployed() || wind_speed <= self.tuning.grounded_wind
    }

    /// Quadratic load curve, floored at 1 so it can be divided by
    pub fn required_torque(&self, wind_speed: f64) -> f64 {
        let ratio = wind_speed / self.tuning.load_reference_wind;
        (ratio * ratio * self.tuning.load_reference_torque).max(1.0)
    }

    /// Advances the rotor by one tick
    ///
    /// May write `inputs.torque` (autopilot) and `inputs.autopilot` (safety lockout).
    pub fn step(&mut self, inputs: &mut SimulationInputs, dt: f64) -> TickReport {
        let t = &self.tuning;
        let coefficients = AeroCoefficients::from_inputs(t, inputs);
        self.state.optimal_tsr = coefficients.optimal_tsr;
        self.state.max_tsr = coefficients.max_tsr;
        let wind = inputs.wind_speed;

        let mut autopilot_disabled = self.enforce_autopilot_lockout(inputs);

        // Autopilot: error = tsr - optimal, so overspeed raises braking torque
        if inputs.autopilot {
            let error = self.state.tsr - coefficients.optimal_tsr;
            let correction = error * t.autopilot_gain;
            let target_torque = (inputs.torque + correction).clamp(0.0, t.autopilot_max_torque);
            inputs.torque += (target_torque - inputs.torque) * t.autopilot_ease;
        }

        let required_torque = self.required_torque(wind);
        let brake_ratio = inputs.torque / required_torque;

        let mut runaway_cleared = false;
        if self.state.is_runaway && wind <= t.runaway_clear_wind {
            self.state.is_runaway = false;
            runaway_cleared = true;
            info!(wind, "runaway cleared");
        }

        let mut runaway_entered = false;
        let target_tsr = if !self.deployment.is_deployed() {
            0.0
        } else if self.state.is_runaway {
            t.runaway_pinned_tsr
        } else {
            let target = if brake_ratio >= 1.0 {
                (coefficients.optimal_tsr - (brake_ratio - 1.0) * t.braking_slope).max(0.0)
            } else {
                coefficients.optimal_tsr
                    + (1.0 - brake_ratio) * (coefficients.max_tsr - coefficients.optimal_tsr)
            };
            if target > t.runaway_entry_tsr && self.state.kw as f64 >= t.max_kw {
                self.state.is_runaway = true;
                runaway_entered = true;
                warn!(wind, torque = inputs.torque, target, "runaway entered");
                t.runaway_pinned_tsr
            } else {
                target
            }
        };

        self.state.tsr = (self.state.tsr + (target_tsr - self.state.tsr) * t.inertia).max(0.0);

        let radius_m = (t.rotor_plane_radius + inputs.outer_length) / 100.0;
        let tip_speed = self.state.tsr * wind;
        self.state.rpm = tip_speed * 60.0 / (TAU * radius_m);

        let power_factor =
            1.0 + (inputs.blade_count as f64 - t.reference_blade_count) * t.power_per_extra_blade;
        let kw = (inputs.torque / 100.0) * (self.state.rpm / t.rated_rpm) * t.max_kw * power_factor;
        self.state.kw = kw.floor().clamp(0.0, t.max_kw) as u32;

        self.state.overspeed_risk = self.state.tsr > coefficients.optimal_tsr * t.overspeed_risk_factor;
        self.state.compression_risk = inputs.torque > t.compression_torque && wind > t.compression_wind;

        let angular_rate = self.state.rpm * TAU / 60.0 * t.spin_direction;
        self.rotation = (self.rotation + angular_rate * dt).rem_euclid(TAU);

        if runaway_entered {
            autopilot_disabled |= self.enforce_autopilot_lockout(inputs);
        }

        TickReport {
            target_tsr,
            required_torque,
            brake_ratio,
            runaway_entered,
            runaway_cleared,
            autopilot_disabled,
        }
    }

    /// Status for the UI, evaluated independently of the tick
    pub fn status(&self, wind_speed: f64) -> Status {
        classify(
            &StatusInputs {
                deployment: self.deployment.value(),
                wind_speed,
                tsr: self.state.tsr,
                optimal_tsr: self.state.optimal_tsr,
                is_runaway: self.state.is_runaway,
            },
            &self.tuning,
        )
    }

    /// Switches the autopilot off while a safety state is active
    fn enforce_autopilot_lockout(&self, inputs: &mut SimulationInputs) -> bool {
        if inputs.autopilot && (self.state.is_runaway || self.is_grounded(inputs.wind_speed)) {
            inputs.autopilot = false;
            warn!(
                runaway = self.state.is_runaway,
                deployment = self.deployment.value(),
                "autopilot force-disabled"
            );
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const DT: f64 = 1.0 / 30.0;

    fn flying_engine() -> PhysicsEngine {
        PhysicsEngine::new(TuningConfig::default(), 1.0)
    }

    fn inputs(wind: f64, torque: f64) -> SimulationInputs {
        SimulationInputs {
            wind_speed: wind,
            torque,
            autopilot: false,
            blade_count: 6,
            outer_length: 380.0,
            inner_length: 230.0,
        }
    }

    #[test]
    fn test_reference_geometry_coefficients() {
        let c = AeroCoefficients::from_inputs(&TuningConfig::default(), &inputs(12.0, 50.0));
        assert_abs_diff_eq!(c.optimal_tsr, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c.max_tsr, 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_more_blades_lower_optimal_tsr() {
        let tuning = TuningConfig::default();
        let mut more = inputs(12.0, 50.0);
        more.blade_count = 10;
        let c = AeroCoefficients::from_inputs(&tuning, &more);
        assert_abs_diff_eq!(c.optimal_tsr, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nominal_scenario_tracks_brake_ratio_target() {
        let mut engine = flying_engine();
        let mut i = inputs(12.0, 50.0);
        let report = engine.step(&mut i, DT);
        assert_abs_diff_eq!(report.required_torque, 100.0, epsilon = 1e-12);
        assert_abs_diff_eq!(report.brake_ratio, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(report.target_tsr, 5.0, epsilon = 1e-12);
        // First-order approach at 5 % per tick from rest
        assert_abs_diff_eq!(engine.state().tsr, 0.25, epsilon = 1e-12);

        let before = engine.state().tsr;
        engine.step(&mut i, DT);
        assert_abs_diff_eq!(engine.state().tsr, before + (5.0 - before) * 0.05, epsilon = 1e-12);

        for _ in 0..400 {
            engine.step(&mut i, DT);
        }
        assert_abs_diff_eq!(engine.state().tsr, 5.0, epsilon = 1e-3);
        assert_eq!(engine.status(12.0), Status::Optimal);
    }

    #[test]
    fn test_over_braking_lowers_target_to_floor() {
        let mut engine = flying_engine();
        let mut i = inputs(6.0, 100.0);
        let report = engine.step(&mut i, DT);
        // required = 25, ratio = 4, 4.0 - 3 * 2 < 0
        assert_abs_diff_eq!(report.required_torque, 25.0, epsilon = 1e-12);
        assert_eq!(report.target_tsr, 0.0);
    }

    #[test]
    fn test_required_torque_is_floored() {
        let engine = flying_engine();
        assert_eq!(engine.required_torque(0.0), 1.0);
        assert_eq!(engine.required_torque(0.5), 1.0);
    }

    #[test]
    fn test_weak_wind_grounds_and_forces_zero_target() {
        let mut engine = flying_engine();
        let mut i = inputs(2.0, 100.0);
        i.autopilot = true;
        let mut forced = false;
        for _ in 0..600 {
            engine.advance_deployment(i.wind_speed, DT);
            let report = engine.step(&mut i, DT);
            if engine.deployment() < DEPLOYED_THRESHOLD {
                assert_eq!(report.target_tsr, 0.0);
                forced = true;
            }
        }
        assert!(forced);
        assert_eq!(engine.deployment(), 0.0);
        assert_eq!(engine.status(2.0), Status::Grounded);
        assert!(!i.autopilot);
    }

    #[test]
    fn test_deployment_snaps_to_target() {
        let tuning = TuningConfig::default();
        let mut deployment = Deployment::new(0.0);
        let mut reached = None;
        for _ in 0..2000 {
            if let Some(target) = deployment.advance(10.0, DT, &tuning) {
                reached = Some(target);
                break;
            }
        }
        assert_eq!(reached, Some(1.0));
        assert_eq!(deployment.value(), 1.0);
        assert_eq!(deployment.advance(10.0, DT, &tuning), None);
    }

    #[test]
    fn test_kw_and_tsr_stay_in_bounds() {
        for wind in [0.0, 3.5, 8.0, 12.0, 18.5, 25.0] {
            for torque in [0.0, 15.0, 50.0, 85.0, 100.0] {
                let mut engine = flying_engine();
                let mut i = inputs(wind, torque);
                for _ in 0..300 {
                    engine.advance_deployment(wind, DT);
                    engine.step(&mut i, DT);
                    assert!(engine.state().kw <= 30);
                    assert!(engine.state().tsr >= 0.0);
                }
            }
        }
    }

    #[test]
    fn test_runaway_needs_high_target_and_saturated_power() {
        // wind 25, torque 40: target ~5.82 > 5.8
        let mut unsaturated = flying_engine();
        unsaturated.state.kw = 29;
        let report = unsaturated.step(&mut inputs(25.0, 40.0), DT);
        assert!(report.target_tsr > 5.8);
        assert!(!report.runaway_entered);
        assert!(!unsaturated.state().is_runaway);

        let mut saturated = flying_engine();
        saturated.state.kw = 30;
        let report = saturated.step(&mut inputs(25.0, 40.0), DT);
        assert!(report.runaway_entered);
        assert_eq!(report.target_tsr, 6.2);

        // Saturated power but a low target does not trip
        let mut low_target = flying_engine();
        low_target.state.kw = 30;
        let report = low_target.step(&mut inputs(25.0, 100.0), DT);
        assert!(!report.runaway_entered);
    }

    #[test]
    fn test_runaway_latches_until_wind_drops() {
        let mut engine = flying_engine();
        engine.state.kw = 30;
        let mut i = inputs(25.0, 40.0);
        assert!(engine.step(&mut i, DT).runaway_entered);

        i.set_torque(100.0);
        i.set_wind_speed(18.5);
        for _ in 0..100 {
            let report = engine.step(&mut i, DT);
            assert!(engine.state().is_runaway);
            assert_eq!(report.target_tsr, 6.2);
        }
        assert_eq!(engine.status(18.5), Status::Runaway);

        i.set_wind_speed(18.0);
        let report = engine.step(&mut i, DT);
        assert!(report.runaway_cleared);
        assert!(!engine.state().is_runaway);
    }

    #[test]
    fn test_autopilot_is_disabled_during_runaway() {
        let mut engine = flying_engine();
        engine.state.kw = 30;
        let mut i = inputs(25.0, 40.0);
        i.autopilot = true;
        engine.state.tsr = 4.0;
        let report = engine.step(&mut i, DT);
        assert!(report.runaway_entered);
        assert!(report.autopilot_disabled);
        assert!(!i.autopilot);
    }

    #[test]
    fn test_autopilot_eases_torque_by_a_tenth_of_the_gap() {
        let mut engine = flying_engine();
        engine.state.tsr = 5.0;
        let mut i = inputs(12.0, 50.0);
        i.autopilot = true;
        engine.step(&mut i, DT);
        // error 1.0, correction 2.0, target torque 52.0
        assert_abs_diff_eq!(i.torque, 50.2, epsilon = 1e-12);
        assert!(i.autopilot);
    }

    #[test]
    fn test_autopilot_target_torque_is_clamped() {
        let mut engine = flying_engine();
        engine.state.tsr = 6.0;
        let mut i = inputs(12.0, 79.0);
        i.autopilot = true;
        engine.step(&mut i, DT);
        assert_abs_diff_eq!(i.torque, 79.1, epsilon = 1e-12);

        let mut engine = flying_engine();
        engine.state.tsr = 0.0;
        let mut i = inputs(12.0, 1.0);
        i.autopilot = true;
        engine.step(&mut i, DT);
        assert_abs_diff_eq!(i.torque, 0.9, epsilon = 1e-12);
    }

    #[test]
    fn test_status_precedence() {
        let tuning = TuningConfig::default();
        let base = StatusInputs {
            deployment: 1.0,
            wind_speed: 12.0,
            tsr: 4.0,
            optimal_tsr: 4.0,
            is_runaway: false,
        };
        assert_eq!(classify(&base, &tuning), Status::Optimal);
        assert_eq!(
            classify(&StatusInputs { deployment: 0.3, is_runaway: true, ..base }, &tuning),
            Status::Grounded
        );
        assert_eq!(classify(&StatusInputs { wind_speed: 3.0, ..base }, &tuning), Status::Grounded);
        assert_eq!(
            classify(&StatusInputs { is_runaway: true, tsr: 0.1, ..base }, &tuning),
            Status::Runaway
        );
        assert_eq!(classify(&StatusInputs { tsr: 2.3, ..base }, &tuning), Status::Stall);
        assert_eq!(classify(&StatusInputs { tsr: 5.1, ..base }, &tuning), Status::Overspeed);
        assert_eq!(classify(&StatusInputs { tsr: 5.0, ..base }, &tuning), Status::Optimal);
    }

    #[test]
    fn test_risk_flags() {
        let mut engine = flying_engine();
        engine.state.tsr = 5.3;
        let mut i = inputs(12.0, 90.0);
        engine.step(&mut i, DT);
        assert!(engine.state().compression_risk);
        // Heavy braking pulls TSR down, but one tick keeps it above 1.3 * optimal
        assert!(engine.state().overspeed_risk);

        let mut calm = inputs(9.0, 90.0);
        engine.step(&mut calm, DT);
        assert!(!engine.state().compression_risk);
    }

    #[test]
    fn test_rotation_advances_with_rpm() {
        let mut engine = flying_engine();
        engine.state.tsr = 4.0;
        let mut i = inputs(12.0, 50.0);
        engine.step(&mut i, DT);
        let expected = engine.state().rpm * TAU / 60.0 * DT;
        assert_abs_diff_eq!(engine.rotation(), expected, epsilon = 1e-12);
        assert!(engine.rotation() > 0.0);
    }
}
