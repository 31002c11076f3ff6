//! Partition functions `Q(T)`.
//!
//! The core never computes partition functions itself; it asks an injected
//! [`PartitionFunction`] for `Q(T)` per isotope.

use std::collections::BTreeMap;

use crate::error::{LblError, Result};
use crate::interp::{bracket, lerp, validate_abscissa, ExtrapolationPolicy};

/// Source of isotope-specific partition functions.
pub trait PartitionFunction: Sync {
    /// Partition function of `isotope_id` at `temperature` in K.
    fn qt(&self, isotope_id: u16, temperature: f64) -> Result<f64>;
}

/// Adapter for a plain closure `Fn(isotope_id, temperature) -> Q`.
#[derive(Debug, Clone, Copy)]
pub struct FnPartitionFunction<F>(pub F);

impl<F> PartitionFunction for FnPartitionFunction<F>
where
    F: Fn(u16, f64) -> f64 + Sync,
{
    fn qt(&self, isotope_id: u16, temperature: f64) -> Result<f64> {
        Ok((self.0)(isotope_id, temperature))
    }
}

/// One tabulated `Q(T)` curve.
#[derive(Debug, Clone)]
pub struct PartitionCurve {
    temperatures: Vec<f64>,
    values: Vec<f64>,
}

impl PartitionCurve {
    /// Build a curve from strictly increasing temperatures and positive
    /// partition function values.
    pub fn new(temperatures: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        validate_abscissa(&temperatures, "partition temperatures")?;
        if values.len() != temperatures.len() {
            return Err(LblError::InconsistentInputs {
                what: "partition function values",
                expected: temperatures.len(),
                found: values.len(),
            });
        }
        if values.iter().any(|&q| !(q > 0.0 && q.is_finite())) {
            return Err(LblError::InvalidParameter {
                name: "partition function values",
                reason: "must be positive",
            });
        }
        Ok(Self {
            temperatures,
            values,
        })
    }

    /// Tabulated temperature range in K.
    pub fn range(&self) -> (f64, f64) {
        (self.temperatures[0], self.temperatures[self.temperatures.len() - 1])
    }
}

/// Tabulated partition functions for several isotopes, interpolated linearly
/// in temperature.
#[derive(Debug, Clone, Default)]
pub struct TabulatedPartitionFunction {
    curves: BTreeMap<u16, PartitionCurve>,
    policy: ExtrapolationPolicy,
}

impl TabulatedPartitionFunction {
    /// Empty table that rejects out-of-range temperatures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose how to handle temperatures outside a curve's range.
    pub fn with_policy(mut self, policy: ExtrapolationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Add or replace the curve of an isotope.
    pub fn with_curve(mut self, isotope_id: u16, curve: PartitionCurve) -> Self {
        self.curves.insert(isotope_id, curve);
        self
    }
}

impl PartitionFunction for TabulatedPartitionFunction {
    fn qt(&self, isotope_id: u16, temperature: f64) -> Result<f64> {
        if !(temperature > 0.0) {
            return Err(LblError::NonPositiveTemperature(temperature));
        }
        let curve = self
            .curves
            .get(&isotope_id)
            .ok_or(LblError::UnknownIsotope(isotope_id))?;

        let b = bracket(&curve.temperatures, temperature, self.policy).map_err(|range| {
            LblError::PartitionOutOfRange {
                isotope: isotope_id,
                temperature,
                min: range.min,
                max: range.max,
            }
        })?;
        let q = lerp(curve.values[b.index], curve.values[b.index + 1], b.fraction);

        if q > 0.0 {
            Ok(q)
        } else {
            let (min, max) = curve.range();
            Err(LblError::PartitionOutOfRange {
                isotope: isotope_id,
                temperature,
                min,
                max,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn co_table(policy: ExtrapolationPolicy) -> TabulatedPartitionFunction {
        let curve = PartitionCurve::new(vec![100.0, 200.0, 300.0], vec![36.0, 72.0, 108.0]).unwrap();
        TabulatedPartitionFunction::new()
            .with_policy(policy)
            .with_curve(1, curve)
    }

    #[test]
    fn interpolates_inside_range() {
        let q = co_table(ExtrapolationPolicy::Reject);
        assert_relative_eq!(q.qt(1, 150.0).unwrap(), 54.0);
        assert_relative_eq!(q.qt(1, 300.0).unwrap(), 108.0);
        assert_eq!(q.qt(2, 150.0), Err(LblError::UnknownIsotope(2)));
        assert_eq!(q.qt(1, 0.0), Err(LblError::NonPositiveTemperature(0.0)));
    }

    #[test]
    fn honours_policy_outside_range() {
        assert!(matches!(
            co_table(ExtrapolationPolicy::Reject).qt(1, 400.0),
            Err(LblError::PartitionOutOfRange { isotope: 1, .. })
        ));
        assert_relative_eq!(co_table(ExtrapolationPolicy::Clamp).qt(1, 400.0).unwrap(), 108.0);
        assert_relative_eq!(co_table(ExtrapolationPolicy::Linear).qt(1, 400.0).unwrap(), 144.0);

        // Linear extrapolation through zero is refused
        let steep = PartitionCurve::new(vec![100.0, 200.0], vec![10.0, 72.0]).unwrap();
        let q = TabulatedPartitionFunction::new()
            .with_policy(ExtrapolationPolicy::Linear)
            .with_curve(1, steep);
        assert!(matches!(q.qt(1, 50.0), Err(LblError::PartitionOutOfRange { .. })));
    }

    #[test]
    fn closure_adapter() {
        let q = FnPartitionFunction(|_iso: u16, t: f64| 0.36 * t);
        assert_relative_eq!(q.qt(7, 296.0).unwrap(), 106.56, max_relative = 1e-12);
    }

    #[test]
    fn curve_validation() {
        assert!(PartitionCurve::new(vec![100.0, 200.0], vec![1.0]).is_err());
        assert!(PartitionCurve::new(vec![200.0, 100.0], vec![1.0, 2.0]).is_err());
        assert!(PartitionCurve::new(vec![100.0, 200.0], vec![1.0, 0.0]).is_err());
    }
}
