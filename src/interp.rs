//! Piecewise-linear lookup in tabulated curves.

use log::warn;

use crate::error::{LblError, Result};

/// How to evaluate a tabulated curve outside its abscissa range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtrapolationPolicy {
    /// Fail with an out-of-range error
    #[default]
    Reject,
    /// Hold the nearest tabulated value
    Clamp,
    /// Extend the first or last segment linearly
    Linear,
}

/// Where an abscissa falls in a table: segment `index..=index + 1` and the
/// fractional position in it. `fraction` lies outside `[0, 1]` only when
/// extrapolating linearly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Bracket {
    pub index: usize,
    pub fraction: f64,
}

/// Error raised when `x` lies outside `[min, max]` under
/// [`ExtrapolationPolicy::Reject`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct OutOfRange {
    pub min: f64,
    pub max: f64,
}

/// Check that a table abscissa is strictly increasing with at least two points.
pub(crate) fn validate_abscissa(xs: &[f64], name: &'static str) -> Result<()> {
    if xs.len() < 2 {
        return Err(LblError::InvalidParameter {
            name,
            reason: "needs at least two tabulated points",
        });
    }
    if xs.windows(2).any(|w| !(w[1] > w[0])) || xs.iter().any(|x| !x.is_finite()) {
        return Err(LblError::InvalidParameter {
            name,
            reason: "must be finite and strictly increasing",
        });
    }
    Ok(())
}

/// Locate `x` in the strictly increasing table `xs` (at least two points).
pub(crate) fn bracket(
    xs: &[f64],
    x: f64,
    policy: ExtrapolationPolicy,
) -> std::result::Result<Bracket, OutOfRange> {
    let last = xs.len() - 1;
    let (min, max) = (xs[0], xs[last]);

    if !(x >= min && x <= max) {
        match policy {
            ExtrapolationPolicy::Reject => return Err(OutOfRange { min, max }),
            ExtrapolationPolicy::Clamp => {
                warn!("clamping table lookup at {x} to [{min}, {max}]");
                return Ok(if x < min || x.is_nan() {
                    Bracket {
                        index: 0,
                        fraction: 0.0,
                    }
                } else {
                    Bracket {
                        index: last - 1,
                        fraction: 1.0,
                    }
                });
            }
            ExtrapolationPolicy::Linear => {
                warn!("extrapolating table lookup at {x} beyond [{min}, {max}]");
                let index = if x < min { 0 } else { last - 1 };
                let fraction = (x - xs[index]) / (xs[index + 1] - xs[index]);
                return Ok(Bracket { index, fraction });
            }
        }
    }

    // Number of points <= x, minus one, kept inside the last segment
    let index = xs.partition_point(|&v| v <= x).saturating_sub(1).min(last - 1);
    let fraction = (x - xs[index]) / (xs[index + 1] - xs[index]);
    Ok(Bracket { index, fraction })
}

/// Linear interpolation between two values.
#[inline]
pub(crate) fn lerp(a: f64, b: f64, fraction: f64) -> f64 {
    a + (b - a) * fraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const XS: [f64; 4] = [100.0, 200.0, 400.0, 800.0];

    #[test]
    fn brackets_interior_and_nodes() {
        let b = bracket(&XS, 300.0, ExtrapolationPolicy::Reject).unwrap();
        assert_eq!(b.index, 1);
        assert_relative_eq!(b.fraction, 0.5);

        let b = bracket(&XS, 800.0, ExtrapolationPolicy::Reject).unwrap();
        assert_eq!(b.index, 2);
        assert_relative_eq!(b.fraction, 1.0);

        let b = bracket(&XS, 100.0, ExtrapolationPolicy::Reject).unwrap();
        assert_eq!(b.index, 0);
        assert_relative_eq!(b.fraction, 0.0);
    }

    #[test]
    fn out_of_range_policies() {
        assert_eq!(
            bracket(&XS, 50.0, ExtrapolationPolicy::Reject),
            Err(OutOfRange { min: 100.0, max: 800.0 })
        );
        assert!(bracket(&XS, f64::NAN, ExtrapolationPolicy::Reject).is_err());

        let clamped = bracket(&XS, 1000.0, ExtrapolationPolicy::Clamp).unwrap();
        assert_eq!((clamped.index, clamped.fraction), (2, 1.0));

        let linear = bracket(&XS, 50.0, ExtrapolationPolicy::Linear).unwrap();
        assert_eq!(linear.index, 0);
        assert_relative_eq!(linear.fraction, -0.5);
    }

    #[test]
    fn abscissa_validation() {
        assert!(validate_abscissa(&XS, "t").is_ok());
        assert!(validate_abscissa(&[1.0], "t").is_err());
        assert!(validate_abscissa(&[1.0, 1.0], "t").is_err());
    }
}
