//! Thermal source function.

use std::f64::consts::PI;

use ndarray::{Array1, Array2, Axis};

use crate::constants::{C, C2, H};
use crate::error::{LblError, Result};
use crate::grid::WavenumberGrid;

/// `π B_ν(T)` in erg/s/cm²/cm⁻¹ for a temperature in K and a wavenumber in
/// cm⁻¹.
///
/// This is the hemispheric flux of a blackbody. Returns 0 for non-positive
/// wavenumbers or temperatures.
pub fn pi_planck(temperature: f64, wavenumber: f64) -> f64 {
    if !(temperature > 0.0 && wavenumber > 0.0) {
        return 0.0;
    }
    let x = C2 * wavenumber / temperature;
    // Exponent past f64 range: no emission
    if x > 700.0 {
        return 0.0;
    }
    PI * 2.0 * H * C * C * wavenumber.powi(3) / x.exp_m1()
}

/// Temperature in K of the blackbody whose [`pi_planck`] at `wavenumber`
/// equals `flux`. Returns 0 for non-positive flux or wavenumber.
pub fn brightness_temperature(flux: f64, wavenumber: f64) -> f64 {
    if !(flux > 0.0 && wavenumber > 0.0) {
        return 0.0;
    }
    let scale = PI * 2.0 * H * C * C * wavenumber.powi(3);
    C2 * wavenumber / (scale / flux).ln_1p()
}

/// Source function of one temperature over a grid.
pub fn source_vector(temperature: f64, grid: &WavenumberGrid) -> Result<Array1<f64>> {
    if !(temperature > 0.0 && temperature.is_finite()) {
        return Err(LblError::NonPositiveTemperature(temperature));
    }
    Ok(grid.values().iter().map(|&nu| pi_planck(temperature, nu)).collect())
}

/// Source function of every layer, shape (`temperatures.len()`, `grid.len()`).
pub fn source_matrix(temperatures: &[f64], grid: &WavenumberGrid) -> Result<Array2<f64>> {
    if let Some(&t) = temperatures.iter().find(|&&t| !(t > 0.0 && t.is_finite())) {
        return Err(LblError::NonPositiveTemperature(t));
    }
    let mut out = Array2::zeros((temperatures.len(), grid.len()));
    for (mut row, &t) in out.axis_iter_mut(Axis(0)).zip(temperatures) {
        for (value, &nu) in row.iter_mut().zip(grid.values()) {
            *value = pi_planck(t, nu);
        }
    }
    Ok(out)
}
