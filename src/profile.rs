//! Normalized line shapes.
//!
//! All profiles here integrate to 1 over the wavenumber offset `x` (cm⁻¹) and
//! so have units of 1/cm⁻¹. Widths follow these conventions:
//!
//! - `sigma` is the Gaussian standard deviation (Doppler broadening)
//! - `gamma` is the Lorentzian half width at half maximum (pressure broadening)

use std::f64::consts::{FRAC_1_PI, LN_2, PI, SQRT_2};

use ndarray::{Array2, Axis};
use num_complex::Complex64;

use crate::error::{LblError, Result};
use crate::special::wofz;

/// Below `sigma = LORENTZ_LIMIT * gamma` the Voigt profile is evaluated as a
/// pure Lorentzian; the Faddeeva argument would otherwise overflow.
const LORENTZ_LIMIT: f64 = 1e-12;

/// Gaussian profile with standard deviation `sigma`.
pub fn gaussian(x: f64, sigma: f64) -> f64 {
    if sigma <= 0.0 {
        return 0.0;
    }
    let u = x / sigma;
    (-0.5 * u * u).exp() / (sigma * (2.0 * PI).sqrt())
}

/// Lorentzian profile with half width at half maximum `gamma`.
pub fn lorentzian(x: f64, gamma: f64) -> f64 {
    if gamma <= 0.0 {
        return 0.0;
    }
    FRAC_1_PI * gamma / (x * x + gamma * gamma)
}

/// Voigt profile, the real part of the Faddeeva function at
/// `z = (x + i gamma) / (sigma √2)` scaled by `1 / (sigma √(2π))`.
///
/// Reduces to [`gaussian`] for `gamma = 0` and to [`lorentzian`] for
/// `sigma = 0`. With both widths zero the profile is a delta function; 0 is
/// returned. The result is never negative.
#[inline]
pub fn voigt(x: f64, sigma: f64, gamma: f64) -> f64 {
    debug_assert!(sigma >= 0.0 && gamma >= 0.0, "negative line width");
    if sigma <= LORENTZ_LIMIT * gamma {
        return lorentzian(x, gamma);
    }
    if gamma == 0.0 {
        // Exact in the far wings, where the rational approximation of w(z)
        // on the real axis bottoms out at its absolute error
        return gaussian(x, sigma);
    }
    let inv = 1.0 / (sigma * SQRT_2);
    let w = wofz(Complex64::new(x * inv, gamma * inv));
    (w.re * inv / PI.sqrt()).max(0.0)
}

/// Evaluate one line's Voigt profile at many offsets.
///
/// `offsets` are wavenumber offsets from the line center; `out` receives the
/// profile values and must have the same length.
pub fn voigt_batch(offsets: &[f64], sigma: f64, gamma: f64, out: &mut [f64]) -> Result<()> {
    if offsets.len() != out.len() {
        return Err(LblError::InconsistentInputs {
            what: "Voigt output length",
            expected: offsets.len(),
            found: out.len(),
        });
    }
    for (out, &x) in out.iter_mut().zip(offsets) {
        *out = voigt(x, sigma, gamma);
    }
    Ok(())
}

/// Broadcast many lines against a full wavenumber grid.
///
/// Returns a (`num_lines`, `num_bins`) matrix where row `i` is the profile of
/// line `i` with center `centers[i]` and widths `sigma[i]`, `gamma[i]`. This
/// is the dense form and costs `num_lines * num_bins` evaluations; the
/// cross-section assembler uses windowed accumulation instead.
pub fn voigt_matrix(
    grid: &[f64],
    centers: &[f64],
    sigma: &[f64],
    gamma: &[f64],
) -> Result<Array2<f64>> {
    let num_lines = centers.len();
    for (what, len) in [("sigma length", sigma.len()), ("gamma length", gamma.len())] {
        if len != num_lines {
            return Err(LblError::InconsistentInputs {
                what,
                expected: num_lines,
                found: len,
            });
        }
    }

    let mut out = Array2::zeros((num_lines, grid.len()));
    for (((mut row, &center), &sigma), &gamma) in out
        .axis_iter_mut(Axis(0))
        .zip(centers)
        .zip(sigma)
        .zip(gamma)
    {
        for (value, &nu) in row.iter_mut().zip(grid) {
            *value = voigt(nu - center, sigma, gamma);
        }
    }
    Ok(out)
}

/// Full width at half maximum of the Voigt profile.
///
/// Olivero & Longbothum (1977), `0.5346 fL + sqrt(0.2166 fL² + fG²)`, accurate
/// to about 0.02%.
pub fn voigt_fwhm(sigma: f64, gamma: f64) -> f64 {
    let f_l = 2.0 * gamma;
    let f_g = 2.0 * sigma * (2.0 * LN_2).sqrt();
    0.5346 * f_l + (0.2166 * f_l * f_l + f_g * f_g).sqrt()
}

/// Half width at half maximum of the Voigt profile.
pub fn voigt_hwhm(sigma: f64, gamma: f64) -> f64 {
    0.5 * voigt_fwhm(sigma, gamma)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn pure_doppler_matches_gaussian() {
        let sigma = 0.02;
        for i in -40..=40 {
            let x = i as f64 * 0.002;
            assert_relative_eq!(voigt(x, sigma, 0.0), gaussian(x, sigma), max_relative = 1e-5);
        }
    }

    #[test]
    fn pure_doppler_far_wings() {
        let sigma = 0.003;
        for i in 0..=300 {
            let x = i as f64 * 0.1 * sigma;
            assert_relative_eq!(voigt(x, sigma, 0.0), gaussian(x, sigma), max_relative = 1e-5);
            assert_relative_eq!(voigt(-x, sigma, 0.0), gaussian(x, sigma), max_relative = 1e-5);
        }
        let mut out = vec![0.0; 3];
        voigt_batch(&[5.0 * sigma, 10.0 * sigma, 29.0 * sigma], sigma, 0.0, &mut out).unwrap();
        for (value, u) in out.iter().zip([5.0, 10.0, 29.0]) {
            assert_relative_eq!(*value, gaussian(u * sigma, sigma), max_relative = 1e-5);
        }
    }

    #[test]
    fn pure_lorentz_limit() {
        let gamma = 0.05;
        for i in -20..=20 {
            let x = i as f64 * 0.03;
            assert_eq!(voigt(x, 0.0, gamma), lorentzian(x, gamma));
            assert_relative_eq!(voigt(x, 1e-9, gamma), lorentzian(x, gamma), max_relative = 1e-5);
        }
    }

    #[test]
    fn converges_monotonically_in_gamma() {
        let sigma = 0.01;
        let x = 0.0;
        let doppler = voigt(x, sigma, 0.0);
        let mut last_err = f64::INFINITY;
        for gamma in [1e-2, 1e-3, 1e-4, 1e-5, 1e-6] {
            let err = (voigt(x, sigma, gamma) - doppler).abs();
            assert!(err < last_err);
            last_err = err;
        }
        assert!(last_err / doppler < 1e-4);
    }

    #[test]
    fn converges_monotonically_in_sigma() {
        let gamma = 0.01;
        let x = 0.005;
        let lorentz = lorentzian(x, gamma);
        let mut last_err = f64::INFINITY;
        for sigma in [1e-2, 1e-3, 1e-4, 1e-5] {
            let err = (voigt(x, sigma, gamma) - lorentz).abs();
            assert!(err < last_err);
            last_err = err;
        }
        assert!(last_err / lorentz < 1e-4);
    }

    #[test]
    fn non_negative_everywhere() {
        for &(sigma, gamma) in &[(0.01, 0.0), (0.01, 1e-6), (1e-4, 0.1), (0.5, 0.5)] {
            for i in -2000..=2000 {
                let x = i as f64 * 0.01;
                let v = voigt(x, sigma, gamma);
                assert!(v >= 0.0 && v.is_finite(), "{x} {sigma} {gamma}");
            }
        }
        assert_eq!(voigt(0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn profile_is_normalized() {
        let (sigma, gamma) = (0.1, 0.02);
        let dx = 0.001;
        let sum: f64 = (-200_000..=200_000)
            .map(|i| voigt(i as f64 * dx, sigma, gamma) * dx)
            .sum();
        // Lorentzian tails beyond |x| = 200 carry 2γ/(π 200) of the area
        assert_abs_diff_eq!(sum, 1.0, epsilon = 2e-4);
    }

    #[test]
    fn batch_and_matrix_match_scalar() {
        let grid: Vec<f64> = (0..50).map(|i| 99.9 + i as f64 * 0.004).collect();
        let centers = [100.0, 100.05];
        let sigma = [0.01, 0.02];
        let gamma = [0.003, 0.0];

        let m = voigt_matrix(&grid, &centers, &sigma, &gamma).unwrap();
        assert_eq!(m.dim(), (2, 50));

        let offsets: Vec<f64> = grid.iter().map(|nu| nu - centers[1]).collect();
        let mut row = vec![0.0; grid.len()];
        voigt_batch(&offsets, sigma[1], gamma[1], &mut row).unwrap();
        for (a, b) in m.row(1).iter().zip(&row) {
            assert_eq!(a, b);
        }
        assert_eq!(m[[0, 25]], voigt(grid[25] - 100.0, 0.01, 0.003));

        assert!(voigt_matrix(&grid, &centers, &sigma[..1], &gamma).is_err());
        assert!(voigt_batch(&offsets, 0.01, 0.0, &mut row[..3]).is_err());
    }

    #[test]
    fn fwhm_limits() {
        let sigma = 0.3;
        assert_relative_eq!(
            voigt_fwhm(sigma, 0.0),
            2.0 * sigma * (2.0 * LN_2).sqrt(),
            max_relative = 1e-12
        );
        assert_relative_eq!(voigt_fwhm(0.0, 0.2), 0.4, max_relative = 2e-4);
        assert_relative_eq!(voigt_hwhm(0.0, 0.2), 0.2, max_relative = 2e-4);
    }
}
