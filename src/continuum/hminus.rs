//! H⁻ bound-free and free-free continuum.
//!
//! Fits of John (1988, A&A 193, 189). Both processes scale with the electron
//! pressure `P_e = n_e k_B T` and the neutral hydrogen density, so the
//! absorption coefficient per unit length is `κ(λ, T) k_B T n_e n_H` and the
//! continuum plugs into [`OpticalDepthBuilder::add_cia`] with the electron
//! and atomic hydrogen mixing ratios.
//!
//! [`OpticalDepthBuilder::add_cia`]: crate::opacity::OpticalDepthBuilder::add_cia

use log::debug;

use super::ContinuumProvider;
use crate::constants::K_B;
use crate::error::{LblError, Result};
use crate::grid::WavenumberGrid;

/// Photodetachment threshold in μm.
const LAMBDA_0: f64 = 1.6419;

/// `h c / k_B` in μm K.
const ALPHA: f64 = 1.439e4;

/// Bound-free cross-section fit coefficients.
const BOUND_FREE: [f64; 6] = [152.519, 49.534, -118.858, 92.536, -34.194, 4.982];

/// Free-free fit coefficients `[A, B, C, D, E, F]` for `n = 1..6`, above
/// 0.3645 μm.
const FREE_FREE_LONG: [[f64; 6]; 6] = [
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [2483.346, 285.827, -2054.291, 2827.776, -1341.537, 208.952],
    [-3449.889, -1158.382, 8746.523, -11485.632, 5303.609, -812.939],
    [2200.040, 2427.719, -13651.105, 16755.524, -7510.494, 1132.738],
    [-696.271, -1841.400, 8624.970, -10051.530, 4400.067, -655.020],
    [88.283, 444.517, -1863.864, 2095.288, -901.788, 132.985],
];

/// Free-free fit coefficients between 0.1823 and 0.3645 μm.
const FREE_FREE_SHORT: [[f64; 6]; 6] = [
    [518.1021, -734.8666, 1021.1775, -479.0721, 93.1373, -6.4285],
    [473.2636, 1443.4137, -1977.3395, 922.3575, -178.9275, 12.3600],
    [-482.2089, -737.1616, 1096.8827, -521.1341, 101.7963, -7.0571],
    [115.5291, 169.6374, -245.6490, 114.2430, -21.9972, 1.5097],
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
];

/// Bound-free cross section of H⁻ in cm² at wavelength `lambda` (μm); zero
/// beyond the photodetachment threshold.
pub fn bound_free_cross_section(lambda: f64) -> f64 {
    if !(lambda > 0.0 && lambda < LAMBDA_0) {
        return 0.0;
    }
    let x = 1.0 / lambda - 1.0 / LAMBDA_0;
    let sqrt_x = x.sqrt();
    // Σ C_n x^((n-1)/2), highest power first
    let f = BOUND_FREE.iter().rev().fold(0.0, |acc, &c| acc * sqrt_x + c);
    1e-18 * lambda.powi(3) * x * sqrt_x * f
}

/// Bound-free absorption per H atom per unit electron pressure, cm⁴/dyn.
fn bound_free(lambda: f64, temperature: f64) -> f64 {
    let sigma = bound_free_cross_section(lambda);
    if sigma == 0.0 {
        return 0.0;
    }
    0.750 * temperature.powf(-2.5) * (ALPHA / (LAMBDA_0 * temperature)).exp()
        * -(-ALPHA / (lambda * temperature)).exp_m1()
        * sigma
}

/// Free-free absorption per H atom per unit electron pressure, cm⁴/dyn.
fn free_free(lambda: f64, temperature: f64) -> f64 {
    let table = if lambda > 0.3645 {
        &FREE_FREE_LONG
    } else if lambda >= 0.1823 {
        &FREE_FREE_SHORT
    } else {
        return 0.0;
    };
    let theta = 5040.0 / temperature;
    let inv = 1.0 / lambda;
    let sum: f64 = table
        .iter()
        .enumerate()
        .map(|(i, &[a, b, c, d, e, f])| {
            let n = (i + 1) as f64;
            let poly = lambda * lambda * a + b + inv * (c + inv * (d + inv * (e + inv * f)));
            theta.powf(0.5 * (n + 1.0)) * poly
        })
        .sum();
    (1e-29 * sum).max(0.0)
}

/// H⁻ continuum as an (electron, atomic hydrogen) pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct HMinusContinuum;

impl HMinusContinuum {
    /// Bound-free plus free-free absorption per H atom per unit electron
    /// pressure in cm⁴/dyn at wavelength `lambda` (μm).
    pub fn kappa(&self, lambda: f64, temperature: f64) -> f64 {
        bound_free(lambda, temperature) + free_free(lambda, temperature)
    }
}

impl ContinuumProvider for HMinusContinuum {
    fn pair(&self) -> &str {
        "e-H"
    }

    fn absorption_coefficient(&self, temperature: f64, grid: &WavenumberGrid) -> Result<Vec<f64>> {
        if !(temperature > 0.0 && temperature.is_finite()) {
            return Err(LblError::NonPositiveTemperature(temperature));
        }
        let kt = K_B * temperature;
        let coefficient: Vec<f64> = grid
            .values()
            .iter()
            .map(|&nu| self.kappa(1e4 / nu, temperature) * kt)
            .collect();
        debug!(
            "H- continuum at {} K: {} of {} bins below the photodetachment threshold",
            temperature,
            grid.values().iter().filter(|&&nu| 1e4 / nu < LAMBDA_0).count(),
            grid.len()
        );
        Ok(coefficient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bound_free_cross_section_values() {
        // Peak of about 4e-17 cm² near 0.85 μm
        assert_relative_eq!(bound_free_cross_section(1.0), 3.79e-17, max_relative = 1e-2);
        let peak = (50..160)
            .map(|i| bound_free_cross_section(i as f64 * 0.01))
            .fold(0.0, f64::max);
        assert!(peak > 3.8e-17 && peak < 4.5e-17);
        assert_eq!(bound_free_cross_section(LAMBDA_0), 0.0);
        assert_eq!(bound_free_cross_section(2.0), 0.0);
    }

    #[test]
    fn free_free_grows_into_the_infrared() {
        let t = 5040.0;
        let (two, three) = (free_free(2.0, t), free_free(3.0, t));
        assert!(two > 0.0);
        // Roughly λ²
        assert!(three / two > 1.8 && three / two < 2.6);
        // Hotter gas absorbs less per unit electron pressure
        assert!(free_free(2.0, 8000.0) < two);
        assert_eq!(free_free(0.1, t), 0.0);
    }

    #[test]
    fn coefficient_on_a_grid() {
        let hminus = HMinusContinuum;
        // 2 μm and 1 μm
        let grid = WavenumberGrid::from_values(vec![5000.0, 10000.0]).unwrap();
        let t = 5040.0;
        let alpha = hminus.absorption_coefficient(t, &grid).unwrap();

        assert_relative_eq!(alpha[0], free_free(2.0, t) * K_B * t, max_relative = 1e-12);
        assert_relative_eq!(
            alpha[1],
            (bound_free(1.0, t) + free_free(1.0, t)) * K_B * t,
            max_relative = 1e-12
        );
        // Bound-free dominates below the threshold
        assert!(bound_free(1.0, t) > 5.0 * free_free(1.0, t));
        assert_eq!(hminus.pair(), "e-H");
        assert!(hminus.absorption_coefficient(0.0, &grid).is_err());
    }
}
