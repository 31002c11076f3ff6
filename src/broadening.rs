//! Temperature and pressure dependent line parameters.
//!
//! For a line and a layer this resolves the thermal Doppler width, the
//! pressure (Lorentz) width, the pressure shift of the line center, and the
//! line strength corrected from the reference temperature to the layer
//! temperature.

use std::f64::consts::FRAC_1_SQRT_2;

use smallvec::SmallVec;

use crate::atmosphere::AtmosphereLayer;
use crate::constants::{C, C2, K_B, M_U, P_REF_BAR, T_REF};
use crate::error::{LblError, Result};
use crate::linelist::{LineList, SpectralLine};
use crate::partition::PartitionFunction;

/// Broadening of one line in one layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BroadeningParameters {
    /// Doppler half width at 1/e of maximum, `ν₀ sqrt(2 k_B T / m) / c`, cm⁻¹
    pub doppler_width: f64,
    /// Lorentz half width at half maximum, cm⁻¹
    pub lorentz_width: f64,
    /// Pressure shift of the line center, cm⁻¹
    pub line_shift: f64,
}

impl BroadeningParameters {
    /// Gaussian standard deviation for the Voigt evaluator, `doppler_width / √2`.
    pub fn sigma(&self) -> f64 {
        self.doppler_width * FRAC_1_SQRT_2
    }
}

/// Resolves line parameters at layer conditions relative to a reference
/// temperature (K) and pressure (bar).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BroadeningResolver {
    reference_temperature: f64,
    reference_pressure: f64,
}

impl Default for BroadeningResolver {
    /// HITRAN reference conditions, 296 K and 1 atm.
    fn default() -> Self {
        Self {
            reference_temperature: T_REF,
            reference_pressure: P_REF_BAR,
        }
    }
}

impl BroadeningResolver {
    /// Resolver for the given reference temperature (K) and pressure (bar).
    pub fn new(reference_temperature: f64, reference_pressure: f64) -> Result<Self> {
        if !(reference_temperature > 0.0 && reference_temperature.is_finite()) {
            return Err(LblError::NonPositiveTemperature(reference_temperature));
        }
        if !(reference_pressure > 0.0 && reference_pressure.is_finite()) {
            return Err(LblError::NonPositivePressure(reference_pressure));
        }
        Ok(Self {
            reference_temperature,
            reference_pressure,
        })
    }

    /// Reference temperature in K.
    pub fn reference_temperature(&self) -> f64 {
        self.reference_temperature
    }

    /// Reference pressure in bar.
    pub fn reference_pressure(&self) -> f64 {
        self.reference_pressure
    }

    /// Thermal Doppler half width (1/e) in cm⁻¹ for a line at `center`
    /// (cm⁻¹), temperature in K and molar mass in g/mol.
    pub fn doppler_width(&self, center: f64, temperature: f64, molar_mass: f64) -> f64 {
        center * (2.0 * K_B * temperature / (M_U * molar_mass)).sqrt() / C
    }

    /// Pressure broadened HWHM in cm⁻¹.
    pub fn lorentz_width(&self, line: &SpectralLine, layer: &AtmosphereLayer) -> f64 {
        let gamma_ref = line.air_broadening_width_ref * (1.0 - layer.vmr_self)
            + line.self_broadening_width_ref * layer.vmr_self;
        gamma_ref
            * (layer.pressure / self.reference_pressure)
            * (self.reference_temperature / layer.temperature).powf(line.temperature_exponent)
    }

    /// Pressure shift of the line center in cm⁻¹.
    pub fn line_shift(&self, line: &SpectralLine, layer: &AtmosphereLayer) -> f64 {
        line.pressure_shift * layer.pressure / self.reference_pressure
    }

    /// All broadening parameters of one line in one layer.
    pub fn resolve(
        &self,
        line: &SpectralLine,
        layer: &AtmosphereLayer,
        molar_mass: f64,
    ) -> Result<BroadeningParameters> {
        layer.validate()?;
        Ok(BroadeningParameters {
            doppler_width: self.doppler_width(line.center_wavenumber, layer.temperature, molar_mass),
            lorentz_width: self.lorentz_width(line, layer),
            line_shift: self.line_shift(line, layer),
        })
    }

    /// Line strength at `temperature` given the partition function ratio
    /// `q_ratio = Q(T_ref) / Q(T)`.
    ///
    /// Applies the Boltzmann population factor of the lower state and the
    /// stimulated emission correction.
    pub fn line_strength(&self, line: &SpectralLine, temperature: f64, q_ratio: f64) -> f64 {
        let t_ref = self.reference_temperature;
        let boltzmann =
            (-C2 * line.lower_state_energy * (1.0 / temperature - 1.0 / t_ref)).exp();
        // (1 - exp(-c2 ν/T)) / (1 - exp(-c2 ν/T_ref))
        let stimulated = (-C2 * line.center_wavenumber / temperature).exp_m1()
            / (-C2 * line.center_wavenumber / t_ref).exp_m1();
        line.reference_line_strength * q_ratio * boltzmann * stimulated
    }

    /// Partition function ratio `Q(T_ref) / Q(T)` for an isotope.
    pub fn partition_ratio(
        &self,
        partition: &dyn PartitionFunction,
        isotope_id: u16,
        temperature: f64,
    ) -> Result<f64> {
        if !(temperature > 0.0 && temperature.is_finite()) {
            return Err(LblError::NonPositiveTemperature(temperature));
        }
        let q_ref = partition.qt(isotope_id, self.reference_temperature)?;
        let q = partition.qt(isotope_id, temperature)?;
        if !(q > 0.0 && q_ref > 0.0) {
            return Err(LblError::InvalidParameter {
                name: "partition function",
                reason: "must be positive",
            });
        }
        Ok(q_ref / q)
    }

    /// Line strength at `temperature`, querying the partition function.
    pub fn line_strength_at(
        &self,
        line: &SpectralLine,
        temperature: f64,
        partition: &dyn PartitionFunction,
    ) -> Result<f64> {
        let q_ratio = self.partition_ratio(partition, line.isotope_id, temperature)?;
        Ok(self.line_strength(line, temperature, q_ratio))
    }

    /// Resolve every line of `lines` in one layer.
    ///
    /// The partition function is queried once per isotope.
    pub fn resolve_layer(
        &self,
        lines: &LineList,
        layer: &AtmosphereLayer,
        partition: &dyn PartitionFunction,
    ) -> Result<ResolvedLines> {
        layer.validate()?;

        // (isotope, Q ratio, molar mass); line lists rarely have many isotopes
        let mut isotopes: SmallVec<[(u16, f64, f64); 8]> = SmallVec::new();

        let mut resolved = ResolvedLines::with_capacity(lines.len());
        for line in lines.lines() {
            let (q_ratio, molar_mass) =
                match isotopes.iter().find(|(id, _, _)| *id == line.isotope_id) {
                    Some(&(_, q_ratio, molar_mass)) => (q_ratio, molar_mass),
                    None => {
                        let q_ratio =
                            self.partition_ratio(partition, line.isotope_id, layer.temperature)?;
                        let molar_mass = lines.molar_mass(line.isotope_id)?;
                        isotopes.push((line.isotope_id, q_ratio, molar_mass));
                        (q_ratio, molar_mass)
                    }
                };

            let params = BroadeningParameters {
                doppler_width: self.doppler_width(line.center_wavenumber, layer.temperature, molar_mass),
                lorentz_width: self.lorentz_width(line, layer),
                line_shift: self.line_shift(line, layer),
            };
            resolved.center.push(line.center_wavenumber + params.line_shift);
            resolved
                .strength
                .push(self.line_strength(line, layer.temperature, q_ratio));
            resolved.sigma.push(params.sigma());
            resolved.gamma.push(params.lorentz_width);
        }
        Ok(resolved)
    }
}

/// Lines resolved for one layer, stored column-wise for batched evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedLines {
    /// Shifted line centers in cm⁻¹
    pub center: Vec<f64>,
    /// Temperature-corrected line strengths, cm/molecule
    pub strength: Vec<f64>,
    /// Gaussian standard deviations in cm⁻¹
    pub sigma: Vec<f64>,
    /// Lorentz HWHM in cm⁻¹
    pub gamma: Vec<f64>,
}

impl ResolvedLines {
    /// Empty columns with room for `capacity` lines.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            center: Vec::with_capacity(capacity),
            strength: Vec::with_capacity(capacity),
            sigma: Vec::with_capacity(capacity),
            gamma: Vec::with_capacity(capacity),
        }
    }

    /// Wrap precomputed columns, e.g. lines broadened by a custom model.
    pub fn new(center: Vec<f64>, strength: Vec<f64>, sigma: Vec<f64>, gamma: Vec<f64>) -> Result<Self> {
        let resolved = Self {
            center,
            strength,
            sigma,
            gamma,
        };
        resolved.validate()?;
        Ok(resolved)
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.center.len()
    }

    /// Whether there are no lines.
    pub fn is_empty(&self) -> bool {
        self.center.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let n = self.center.len();
        for (what, len) in [
            ("strength column", self.strength.len()),
            ("sigma column", self.sigma.len()),
            ("gamma column", self.gamma.len()),
        ] {
            if len != n {
                return Err(LblError::InconsistentInputs {
                    what,
                    expected: n,
                    found: len,
                });
            }
        }
        for index in 0..n {
            let reason = if !self.center[index].is_finite() {
                Some("center must be finite")
            } else if !(self.strength[index] >= 0.0 && self.strength[index].is_finite()) {
                Some("strength must be non-negative")
            } else if !(self.sigma[index] >= 0.0 && self.gamma[index] >= 0.0) {
                Some("widths must be non-negative")
            } else if !(self.sigma[index].is_finite() && self.gamma[index].is_finite()) {
                Some("widths must be finite")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(LblError::InvalidLine { index, reason });
            }
        }
        Ok(())
    }
}
