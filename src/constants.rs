//! Physical constants in CGS units.
#![allow(clippy::excessive_precision)]

/// Boltzmann constant (erg/K)
pub const K_B: f64 = 1.380649e-16;

/// Planck constant (erg s)
pub const H: f64 = 6.62607015e-27;

/// Speed of light (cm/s)
pub const C: f64 = 2.99792458e10;

/// Atomic mass unit (g)
pub const M_U: f64 = 1.66053906660e-24;

/// Second radiation constant `hc/k_B` (cm K)
pub const C2: f64 = H * C / K_B;

/// HITRAN reference temperature (K)
pub const T_REF: f64 = 296.0;

/// One standard atmosphere in bar, the reference pressure of HITRAN widths
pub const P_REF_BAR: f64 = 1.01325;

/// Conversion from bar to dyn/cm²
pub const BAR_TO_CGS: f64 = 1.0e6;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn second_radiation_constant() {
        assert_relative_eq!(C2, 1.438776877, max_relative = 1e-9);
    }
}
