/// Running integral with a symmetric bound on the accumulated value.
pub struct Integrator {
    current_value: f64,
    limit: f64,
}

impl Integrator {
    pub fn new() -> Self {
        Self::with_limit(f64::INFINITY)
    }

    pub fn with_limit(limit: f64) -> Self {
        Integrator {
            current_value: 0.0_f64,
            limit: limit.abs(),
        }
    }

    pub fn add_new_value(&mut self, value: f64, interval_seconds: f64) -> f64 {
        self.current_value =
            (self.current_value + value * interval_seconds).clamp(-self.limit, self.limit);
        self.current_value
    }

    pub fn get_current_value(&self) -> f64 {
        self.current_value
    }

    pub fn reset(&mut self) {
        self.current_value = 0.0_f64;
    }
}

impl Default for Integrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn accumulates_value_times_interval() {
        let mut integrator = Integrator::new();
        integrator.add_new_value(2.0, 0.5);
        integrator.add_new_value(-1.0, 0.25);
        assert_relative_eq!(integrator.get_current_value(), 0.75);
    }

    #[test]
    fn saturates_at_limit() {
        let mut integrator = Integrator::with_limit(1.0);
        for _ in 0..100 {
            integrator.add_new_value(5.0, 0.1);
        }
        assert_relative_eq!(integrator.get_current_value(), 1.0);

        integrator.add_new_value(-5.0, 0.1);
        assert_relative_eq!(integrator.get_current_value(), 0.5);

        integrator.reset();
        assert_eq!(integrator.get_current_value(), 0.0);
    }
}
