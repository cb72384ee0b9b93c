/// Gaussian bump repeated every `period` units: `f(x) = exp(-(x - 0.5)^2 /
/// (2 * 0.07^2))` evaluated on the fractional position inside the period.
/// Peaks at 1.0 mid-period and is practically zero near the edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicGaussian {
    period: f64,
}

impl Default for PeriodicGaussian {
    fn default() -> Self {
        Self { period: 1.0 }
    }
}

impl PeriodicGaussian {
    #[must_use]
    pub fn new(period: f64) -> Self {
        Self { period }
    }

    #[must_use]
    pub fn period(&self) -> f64 {
        self.period
    }

    #[must_use]
    pub fn fract_value(x_value: f64) -> f64 {
        (-(x_value - 0.5).powi(2) / 0.0098).exp()
    }

    #[must_use]
    pub fn value(&self, x_value: f64) -> f64 {
        Self::fract_value((x_value / self.period).rem_euclid(1.0))
    }
}
