use std::time::Instant;

use shared_definitions::controller::PidTuneConfig;

use super::integrator::Integrator;

/// PID loop driving a measurement towards `setpoint` (zero unless changed).
///
/// The first update after construction or [`PID::reset`] has no previous
/// sample, so only the proportional term contributes to it.
pub struct PID {
    setpoint: f64,
    proportional_multiplier: f64,
    integral_multiplier: f64,
    derivative_multiplier: f64,
    previous_error: Option<f64>,
    previous_update: Option<Instant>,
    error_integrator: Integrator,
}

impl PID {
    pub fn new(
        proportional_multiplier: f64,
        integral_multiplier: f64,
        derivative_multiplier: f64,
    ) -> Self {
        PID {
            setpoint: 0.0_f64,
            proportional_multiplier,
            integral_multiplier,
            derivative_multiplier,
            previous_error: None,
            previous_update: None,
            error_integrator: Integrator::new(),
        }
    }

    pub fn from_tune(config: &PidTuneConfig) -> Self {
        let mut pid = Self::new(
            config.proportional_multiplier,
            config.integral_multiplier,
            config.derivative_multiplier,
        );
        pid.error_integrator = Integrator::with_limit(config.max_accumulated_error);
        pid
    }

    pub fn with_setpoint(mut self, setpoint: f64) -> Self {
        self.setpoint = setpoint;
        self
    }

    /// Timed against the previous call with a monotonic clock.
    pub fn update(&mut self, measured_state: f64) -> f64 {
        let now = Instant::now();
        let iteration_length = self
            .previous_update
            .map(|previous| now.duration_since(previous).as_secs_f64());
        self.previous_update = Some(now);
        self.step(measured_state, iteration_length)
    }

    pub fn update_with_interval(&mut self, measured_state: f64, iteration_length: f64) -> f64 {
        self.previous_update = Some(Instant::now());
        self.step(measured_state, Some(iteration_length))
    }

    fn step(&mut self, measured_state: f64, iteration_length: Option<f64>) -> f64 {
        let error = self.setpoint - measured_state;

        let mut change_rate = 0.0_f64;
        if let Some(interval) = iteration_length.filter(|interval| *interval > 0.0) {
            self.error_integrator.add_new_value(error, interval);
            if let Some(previous_error) = self.previous_error {
                change_rate = (error - previous_error) / interval;
            }
        }
        self.previous_error = Some(error);

        let proportional_output = error * self.proportional_multiplier;
        let integral_output = self.error_integrator.get_current_value() * self.integral_multiplier;
        let derivative_output = change_rate * self.derivative_multiplier;

        proportional_output + integral_output + derivative_output
    }

    pub fn reset(&mut self) {
        self.error_integrator.reset();
        self.previous_error = None;
        self.previous_update = None;
    }

    pub fn accumulated_error(&self) -> f64 {
        self.error_integrator.get_current_value()
    }

    pub fn has_history(&self) -> bool {
        self.previous_error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn error_is_negated_measurement() {
        let mut pid = PID::new(2.0, 0.0, 0.0);
        assert_relative_eq!(pid.update(0.5), -1.0);
    }

    #[test]
    fn first_update_is_proportional_only() {
        let mut pid = PID::new(1.0, 10.0, 10.0);
        assert_relative_eq!(pid.update(0.25), -0.25);
        assert_eq!(pid.accumulated_error(), 0.0);
    }

    #[test]
    fn terms_combine_with_explicit_interval() {
        let mut pid = PID::new(1.0, 2.0, 0.5);
        // integral = -1 * 0.1
        assert_relative_eq!(pid.update_with_interval(1.0, 0.1), -1.0 - 0.2);
        // integral = -0.1 - 3 * 0.1 = -0.4, derivative = (-3 - -1) / 0.1 = -20
        assert_relative_eq!(pid.update_with_interval(3.0, 0.1), -3.0 - 0.8 - 10.0, epsilon = 1e-9);
    }

    #[test]
    fn reset_restores_first_call_behavior() {
        let mut pid = PID::new(3.0, 5.0, 0.7);
        let first = pid.update_with_interval(0.4, 0.05);
        pid.update_with_interval(-0.2, 0.05);
        pid.update_with_interval(0.9, 0.05);

        pid.reset();
        assert!(!pid.has_history());
        assert_eq!(pid.accumulated_error(), 0.0);
        assert_relative_eq!(pid.update_with_interval(0.4, 0.05), first);
    }

    #[test]
    fn reset_restores_first_call_with_clock() {
        let mut pid = PID::new(3.0, 5.0, 0.7);
        let first = pid.update(0.4);
        pid.update(0.4);
        pid.reset();
        assert_relative_eq!(pid.update(0.4), first);
    }

    #[test]
    fn integral_windup_is_bounded() {
        let mut pid = PID::from_tune(&PidTuneConfig {
            proportional_multiplier: 0.0,
            integral_multiplier: 1.0,
            derivative_multiplier: 0.0,
            max_accumulated_error: 0.5,
        });
        for _ in 0..1000 {
            pid.update_with_interval(-10.0, 0.05);
        }
        assert_relative_eq!(pid.accumulated_error(), 0.5);
    }

    #[test]
    fn setpoint_shifts_error() {
        let mut pid = PID::new(1.0, 0.0, 0.0).with_setpoint(2.0);
        assert_relative_eq!(pid.update(0.5), 1.5);
    }

    /// Lateral drift of a hovering vehicle whose neutral roll is off by 12
    /// steps. The camera sees the ground move opposite to the vehicle.
    #[test]
    fn holds_simulated_vehicle_still() {
        const DT: f64 = 0.15;
        const DAMPING: f64 = 50.0;
        const FORCE_PER_STEP: f64 = 0.01;
        const TRUE_CENTER: i32 = 140;
        const ROLL_TRIM: i32 = 128;

        let mut pid = PID::from_tune(&PidTuneConfig {
            proportional_multiplier: 300.0,
            integral_multiplier: 300.0,
            derivative_multiplier: 1.0,
            max_accumulated_error: 0.2,
        });

        let mut vehicle_velocity = 0.03_f64;
        let mut roll = ROLL_TRIM;
        let mut late_peak = 0.0_f64;
        for tick in 0..100 {
            let image_velocity = -vehicle_velocity;
            let correction = pid.update_with_interval(image_velocity, DT);
            roll = (ROLL_TRIM - correction.round() as i32).clamp(1, 255);

            let acceleration = (roll - TRUE_CENTER) as f64 * FORCE_PER_STEP
                - DAMPING * vehicle_velocity * vehicle_velocity.abs();
            vehicle_velocity += acceleration * DT;

            if tick >= 80 {
                late_peak = late_peak.max(vehicle_velocity.abs());
            }
        }

        assert!(late_peak < 0.005, "vehicle still drifting at {late_peak}");
        assert!((roll - TRUE_CENTER).abs() <= 2, "roll settled at {roll}");
    }
}
