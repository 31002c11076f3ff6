//! Exponential integral `E1` and the two-stream transmission function `2E3`.

/// Arguments above this underflow `exp(-x)` to zero.
const UNDERFLOW: f64 = 745.0;

/// Exponential integral `E1(x)` for `x > 0`.
///
/// Uses the polynomial and rational approximations 5.1.53 and 5.1.56 of
/// Abramowitz & Stegun, with absolute errors below 2e-7 and relative errors
/// below 5e-5 respectively.
pub fn e1(x: f64) -> f64 {
    #![allow(clippy::excessive_precision)]
    if x <= 0.0 {
        return f64::INFINITY;
    }
    if x >= UNDERFLOW {
        return 0.0;
    }

    if x <= 1.0 {
        const A: [f64; 6] = [
            -0.57721566,
            0.99999193,
            -0.24991055,
            0.05519968,
            -0.00976004,
            0.00107857,
        ];
        let poly = A.iter().rev().fold(0.0, |acc, &a| acc * x + a);
        poly - x.ln()
    } else {
        const A1: f64 = 2.334733;
        const A2: f64 = 0.250621;
        const B1: f64 = 3.330657;
        const B2: f64 = 1.681534;
        let ratio = (x * x + A1 * x + A2) / (x * x + B1 * x + B2);
        ratio * (-x).exp() / x
    }
}

/// Transmission function `2 E3(x)` of the two-stream approximation without
/// scattering, `(1 - x) exp(-x) + x² E1(x)`.
///
/// Equals 1 at `x = 0` and tends to 0 for large `x`, including infinity.
pub fn trans2e3(x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    if x >= UNDERFLOW {
        return 0.0;
    }
    let t = (1.0 - x) * (-x).exp() + x * x * e1(x);
    t.clamp(0.0, 1.0)
}
