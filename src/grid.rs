//! Wavenumber grids.

use std::ops::Range;

use crate::error::{LblError, Result};

/// Largest relative deviation of a step from the mean step for a grid to
/// count as uniformly sampled.
const UNIFORM_TOLERANCE: f64 = 1e-6;

/// How the grid is sampled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GridSpacing {
    /// Constant step in wavenumber, cm⁻¹
    Linear {
        /// Step in cm⁻¹
        step: f64,
    },
    /// Constant step in `ln ν` (ESLOG), i.e. constant resolving power
    Log {
        /// Step in `ln ν`
        step: f64,
    },
    /// Neither of the above
    Irregular,
}

/// Strictly increasing wavenumber grid in cm⁻¹ with at least two points.
#[derive(Debug, Clone, PartialEq)]
pub struct WavenumberGrid {
    values: Vec<f64>,
    spacing: GridSpacing,
}

impl WavenumberGrid {
    /// Evenly spaced grid from `start` to `end` inclusive.
    pub fn linear(start: f64, end: f64, num: usize) -> Result<Self> {
        Self::check_endpoints(start, end, num)?;
        let step = (end - start) / (num - 1) as f64;
        let values = (0..num).map(|i| start + step * i as f64).collect();
        Ok(Self {
            values,
            spacing: GridSpacing::Linear { step },
        })
    }

    /// Grid evenly spaced in `ln ν` from `start` to `end` inclusive.
    pub fn log_uniform(start: f64, end: f64, num: usize) -> Result<Self> {
        Self::check_endpoints(start, end, num)?;
        if start <= 0.0 {
            return Err(LblError::InvalidParameter {
                name: "start",
                reason: "log-uniform grids need positive wavenumbers",
            });
        }
        let (ln_start, ln_end) = (start.ln(), end.ln());
        let step = (ln_end - ln_start) / (num - 1) as f64;
        let values = (0..num).map(|i| (ln_start + step * i as f64).exp()).collect();
        Ok(Self {
            values,
            spacing: GridSpacing::Log { step },
        })
    }

    /// Wrap arbitrary values, detecting linear or logarithmic sampling.
    pub fn from_values(values: Vec<f64>) -> Result<Self> {
        if values.len() < 2 {
            return Err(LblError::GridTooShort { len: values.len() });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(LblError::InvalidParameter {
                name: "wavenumber grid",
                reason: "values must be finite",
            });
        }
        if let Some(index) = (1..values.len()).find(|&i| !(values[i] > values[i - 1])) {
            return Err(LblError::NonMonotonicGrid { index });
        }

        let spacing = if let Ok(step) = uniform_step(values.iter().copied()) {
            GridSpacing::Linear { step }
        } else if values[0] > 0.0 {
            match uniform_step(values.iter().map(|v| v.ln())) {
                Ok(step) => GridSpacing::Log { step },
                Err(_) => GridSpacing::Irregular,
            }
        } else {
            GridSpacing::Irregular
        };

        Ok(Self { values, spacing })
    }

    fn check_endpoints(start: f64, end: f64, num: usize) -> Result<()> {
        if num < 2 {
            return Err(LblError::GridTooShort { len: num });
        }
        if !(start.is_finite() && end.is_finite() && end > start) {
            return Err(LblError::InvalidParameter {
                name: "grid endpoints",
                reason: "need finite start < end",
            });
        }
        Ok(())
    }

    /// Grid values in cm⁻¹.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the grid has no points. Constructors require at least two.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sampling of the grid.
    pub fn spacing(&self) -> GridSpacing {
        self.spacing
    }

    /// Resolving power `R = ν/Δν` of a log-uniform grid.
    pub fn resolution(&self) -> Option<f64> {
        match self.spacing {
            GridSpacing::Log { step } => Some(1.0 / step),
            _ => None,
        }
    }

    /// Step of a linear grid, or [`LblError::NonUniformGrid`].
    pub fn require_linear(&self) -> Result<f64> {
        match self.spacing {
            GridSpacing::Linear { step } => Ok(step),
            _ => uniform_step(self.values.iter().copied()),
        }
    }

    /// Indices of the grid points inside the closed interval `[lo, hi]`.
    pub fn index_range(&self, lo: f64, hi: f64) -> Range<usize> {
        let start = self.values.partition_point(|&v| v < lo);
        let end = self.values.partition_point(|&v| v <= hi);
        start..end.max(start)
    }

    /// Trapezoidal integral of `values` sampled on this grid.
    pub fn integrate(&self, values: &[f64]) -> Result<f64> {
        if values.len() != self.len() {
            return Err(LblError::InconsistentInputs {
                what: "integrand length",
                expected: self.len(),
                found: values.len(),
            });
        }
        Ok(self
            .values
            .windows(2)
            .zip(values.windows(2))
            .map(|(nu, f)| 0.5 * (nu[1] - nu[0]) * (f[0] + f[1]))
            .sum())
    }

    /// Corresponding wavelengths in Å, in descending order.
    pub fn wavelengths_angstrom(&self) -> Vec<f64> {
        self.values.iter().map(|nu| 1.0e8 / nu).collect()
    }
}

/// Mean step of an increasing sequence if every step is within
/// [`UNIFORM_TOLERANCE`] of it.
fn uniform_step(values: impl Iterator<Item = f64> + Clone) -> Result<f64> {
    let steps = values.clone().zip(values.skip(1)).map(|(a, b)| b - a);
    let (count, sum) = steps.clone().fold((0usize, 0.0), |(n, s), d| (n + 1, s + d));
    let mean = sum / count as f64;
    let deviation = steps.map(|d| ((d - mean) / mean).abs()).fold(0.0, f64::max);
    if deviation <= UNIFORM_TOLERANCE {
        Ok(mean)
    } else {
        Err(LblError::NonUniformGrid { deviation })
    }
}
