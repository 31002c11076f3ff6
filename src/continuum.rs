//! Collision-induced absorption (CIA) continuum.
//!
//! A CIA table holds `log10` of the binary absorption coefficient in cm⁵ on a
//! (temperature, wavenumber) grid. Values are interpolated bilinearly in
//! `log10` space. Wavenumbers outside the tabulated band have no continuum
//! absorption; temperatures outside the tabulated range follow the table's
//! [`ExtrapolationPolicy`].
//!
//! The H⁻ continuum of hot atmospheres is provided analytically by
//! [`HMinusContinuum`].

mod hminus;

use log::debug;
use ndarray::Array2;

use crate::error::{LblError, Result};
use crate::grid::WavenumberGrid;
use crate::interp::{bracket, lerp, validate_abscissa, ExtrapolationPolicy};

pub use self::hminus::{bound_free_cross_section, HMinusContinuum};

/// Source of continuum absorption for one colliding pair.
pub trait ContinuumProvider: Sync {
    /// Label of the colliding pair, e.g. `H2-H2`.
    fn pair(&self) -> &str;

    /// Absorption coefficient in cm⁵ at `temperature` (K) for every point of
    /// `grid`.
    fn absorption_coefficient(&self, temperature: f64, grid: &WavenumberGrid) -> Result<Vec<f64>>;
}

/// Tabulated CIA coefficients of one colliding pair.
#[derive(Debug, Clone)]
pub struct CiaTable {
    pair: String,
    temperatures: Vec<f64>,
    wavenumbers: Vec<f64>,
    /// `log10` coefficient in cm⁵, shape (temperatures, wavenumbers)
    log_coefficient: Array2<f64>,
    policy: ExtrapolationPolicy,
}

impl CiaTable {
    /// Build a table. `log_coefficient` has one row per temperature and one
    /// column per wavenumber; both axes must be strictly increasing.
    pub fn new(
        pair: impl Into<String>,
        temperatures: Vec<f64>,
        wavenumbers: Vec<f64>,
        log_coefficient: Array2<f64>,
    ) -> Result<Self> {
        validate_abscissa(&temperatures, "CIA temperatures")?;
        validate_abscissa(&wavenumbers, "CIA wavenumbers")?;
        if let Some(&t) = temperatures.iter().find(|&&t| !(t > 0.0)) {
            return Err(LblError::NonPositiveTemperature(t));
        }
        let (rows, cols) = log_coefficient.dim();
        if rows != temperatures.len() {
            return Err(LblError::InconsistentInputs {
                what: "CIA table rows",
                expected: temperatures.len(),
                found: rows,
            });
        }
        if cols != wavenumbers.len() {
            return Err(LblError::InconsistentInputs {
                what: "CIA table columns",
                expected: wavenumbers.len(),
                found: cols,
            });
        }
        // -inf is a legitimate log10 of zero absorption
        if log_coefficient.iter().any(|v| v.is_nan() || *v == f64::INFINITY) {
            return Err(LblError::InvalidParameter {
                name: "CIA table",
                reason: "log coefficients must not be NaN or +inf",
            });
        }
        Ok(Self {
            pair: pair.into(),
            temperatures,
            wavenumbers,
            log_coefficient,
            policy: ExtrapolationPolicy::Reject,
        })
    }

    /// Choose how to handle temperatures outside the table.
    pub fn with_policy(mut self, policy: ExtrapolationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Tabulated temperature range in K.
    pub fn temperature_range(&self) -> (f64, f64) {
        (self.temperatures[0], self.temperatures[self.temperatures.len() - 1])
    }

    /// Tabulated wavenumber range in cm⁻¹.
    pub fn wavenumber_range(&self) -> (f64, f64) {
        (self.wavenumbers[0], self.wavenumbers[self.wavenumbers.len() - 1])
    }

    fn log_at(&self, row: usize, column: usize, fraction: f64) -> f64 {
        log_lerp(
            self.log_coefficient[[row, column]],
            self.log_coefficient[[row, column + 1]],
            fraction,
        )
    }
}

/// Linear interpolation of `log10` values where `-inf` (no absorption)
/// dominates anything it is blended with.
fn log_lerp(a: f64, b: f64, fraction: f64) -> f64 {
    if fraction == 0.0 {
        a
    } else if fraction == 1.0 {
        b
    } else if a == f64::NEG_INFINITY || b == f64::NEG_INFINITY {
        f64::NEG_INFINITY
    } else {
        lerp(a, b, fraction)
    }
}

impl ContinuumProvider for CiaTable {
    fn pair(&self) -> &str {
        &self.pair
    }

    fn absorption_coefficient(&self, temperature: f64, grid: &WavenumberGrid) -> Result<Vec<f64>> {
        if !(temperature > 0.0 && temperature.is_finite()) {
            return Err(LblError::NonPositiveTemperature(temperature));
        }
        let t = bracket(&self.temperatures, temperature, self.policy).map_err(|range| {
            LblError::ContinuumOutOfRange {
                pair: self.pair.clone(),
                temperature,
                min: range.min,
                max: range.max,
            }
        })?;

        let (nu_min, nu_max) = self.wavenumber_range();
        let coefficient: Vec<f64> = grid
            .values()
            .iter()
            .map(|&nu| {
                if nu < nu_min || nu > nu_max {
                    return 0.0;
                }
                let n = match bracket(&self.wavenumbers, nu, ExtrapolationPolicy::Reject) {
                    Ok(n) => n,
                    Err(_) => return 0.0,
                };
                let low = self.log_at(t.index, n.index, n.fraction);
                let high = self.log_at(t.index + 1, n.index, n.fraction);
                10f64.powf(log_lerp(low, high, t.fraction))
            })
            .collect();

        debug!(
            "{} CIA at {} K: {} of {} bins inside the table band",
            self.pair,
            temperature,
            grid.values().iter().filter(|&&nu| nu >= nu_min && nu <= nu_max).count(),
            grid.len()
        );
        Ok(coefficient)
    }
}
