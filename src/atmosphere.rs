//! Layered atmosphere profiles.
//!
//! Layers are ordered from the top of the atmosphere to the bottom, so
//! pressure increases strictly with the layer index. Pressures are in bar,
//! temperatures in K, gravity in cm/s², radii and heights in cm.
//!
//! Layer `i` spans the pressures `[P_i - dP_i, P_i]`: its lower boundary sits
//! at the layer pressure.

use crate::constants::{BAR_TO_CGS, K_B, M_U};
use crate::error::{LblError, Result};

/// Thermodynamic state of one layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtmosphereLayer {
    /// Layer pressure in bar
    pub pressure: f64,
    /// Layer temperature in K
    pub temperature: f64,
    /// Volume mixing ratio of the absorbing molecule, used for self broadening
    pub vmr_self: f64,
}

impl AtmosphereLayer {
    /// Create a validated layer.
    pub fn new(pressure: f64, temperature: f64, vmr_self: f64) -> Result<Self> {
        let layer = Self {
            pressure,
            temperature,
            vmr_self,
        };
        layer.validate()?;
        Ok(layer)
    }

    /// Check the layer invariants: positive pressure and temperature, and a
    /// mixing ratio in `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if !(self.pressure > 0.0 && self.pressure.is_finite()) {
            return Err(LblError::NonPositivePressure(self.pressure));
        }
        if !(self.temperature > 0.0 && self.temperature.is_finite()) {
            return Err(LblError::NonPositiveTemperature(self.temperature));
        }
        if !(0.0..=1.0).contains(&self.vmr_self) {
            return Err(LblError::InvalidParameter {
                name: "vmr_self",
                reason: "must be within [0, 1]",
            });
        }
        Ok(())
    }

    /// Total number density in cm⁻³ from the ideal gas law.
    pub fn number_density(&self) -> f64 {
        self.pressure * BAR_TO_CGS / (K_B * self.temperature)
    }
}

/// Check that pressures increase strictly from top to bottom.
pub(crate) fn validate_pressure_order(layers: &[AtmosphereLayer]) -> Result<()> {
    if layers.is_empty() {
        return Err(LblError::EmptyAtmosphere);
    }
    for layer in layers {
        layer.validate()?;
    }
    match (1..layers.len()).find(|&i| !(layers[i].pressure > layers[i - 1].pressure)) {
        Some(index) => Err(LblError::NonMonotonicPressure { index }),
        None => Ok(()),
    }
}

/// Log-spaced layer pressures from `pressure_top` to `pressure_bottom` (bar)
/// and the pressure thickness of each layer.
///
/// The thickness is `dP_i = (1 - k) P_i` with `k = 10^(-Δlog10 P)`, i.e. the
/// difference to the next layer up.
pub fn pressure_layers_logspace(
    pressure_top: f64,
    pressure_bottom: f64,
    num_layers: usize,
) -> Result<(Vec<f64>, Vec<f64>)> {
    if !(pressure_top > 0.0) {
        return Err(LblError::NonPositivePressure(pressure_top));
    }
    if !(pressure_bottom > pressure_top && pressure_bottom.is_finite()) {
        return Err(LblError::InvalidParameter {
            name: "pressure_bottom",
            reason: "must be finite and above the top pressure",
        });
    }
    if num_layers < 2 {
        return Err(LblError::InvalidParameter {
            name: "num_layers",
            reason: "needs at least two layers",
        });
    }

    let (log_top, log_bottom) = (pressure_top.log10(), pressure_bottom.log10());
    let dlog = (log_bottom - log_top) / (num_layers - 1) as f64;
    let k = 10f64.powf(-dlog);

    let pressure: Vec<f64> = (0..num_layers)
        .map(|i| 10f64.powf(log_top + dlog * i as f64))
        .collect();
    let dp = pressure.iter().map(|p| (1.0 - k) * p).collect();
    Ok((pressure, dp))
}

/// Power-law temperature profile `T = t0 * P^alpha` (P in bar), clipped to
/// `[t_low, t_high]`.
pub fn powerlaw_temperature(pressure: &[f64], t0: f64, alpha: f64, t_low: f64, t_high: f64) -> Vec<f64> {
    pressure
        .iter()
        .map(|p| (t0 * p.powf(alpha)).clamp(t_low, t_high))
        .collect()
}

/// Gray radiative-equilibrium profile with internal heating only,
/// `T⁴ = 3/4 T_int⁴ (2/3 + τ)` with `τ = κ P / g`.
///
/// `gravity` in cm/s², `kappa` the thermal opacity in cm²/g.
pub fn gray_temperature(pressure: &[f64], gravity: f64, kappa: f64, t_int: f64) -> Result<Vec<f64>> {
    check_profile_parameters(gravity, kappa, t_int, 0.0)?;
    Ok(pressure
        .iter()
        .map(|p| {
            let tau = p * BAR_TO_CGS * kappa / gravity;
            (0.75 * t_int.powi(4) * (2.0 / 3.0 + tau)).powf(0.25)
        })
        .collect())
}

/// Irradiated gray profile of Guillot (2010), eq. 29.
///
/// `gamma` is the ratio of visible to thermal opacity (above 1 gives a
/// thermal inversion) and `f` the redistribution factor: 1 at the
/// substellar point, 1/2 for a dayside average, 1/4 for the whole planet.
pub fn guillot_temperature(
    pressure: &[f64],
    gravity: f64,
    kappa: f64,
    gamma: f64,
    t_int: f64,
    t_irr: f64,
    f: f64,
) -> Result<Vec<f64>> {
    check_profile_parameters(gravity, kappa, t_int, t_irr)?;
    if !(gamma > 0.0 && gamma.is_finite()) {
        return Err(LblError::InvalidParameter {
            name: "gamma",
            reason: "must be positive",
        });
    }
    if !(0.0..=1.0).contains(&f) {
        return Err(LblError::InvalidParameter {
            name: "f",
            reason: "must be within [0, 1]",
        });
    }

    let sqrt3 = 3f64.sqrt();
    Ok(pressure
        .iter()
        .map(|p| {
            let tau = p * BAR_TO_CGS * kappa / gravity;
            let irradiated = 2.0 / 3.0
                + (1.0 / gamma + (gamma - 1.0 / gamma) * (-gamma * tau * sqrt3).exp()) / sqrt3;
            (0.75 * t_int.powi(4) * (2.0 / 3.0 + tau) + 0.75 * t_irr.powi(4) * f * irradiated)
                .powf(0.25)
        })
        .collect())
}

fn check_profile_parameters(gravity: f64, kappa: f64, t_int: f64, t_irr: f64) -> Result<()> {
    if !(gravity > 0.0 && gravity.is_finite()) {
        return Err(LblError::InvalidParameter {
            name: "gravity",
            reason: "must be positive",
        });
    }
    if !(kappa >= 0.0 && kappa.is_finite()) {
        return Err(LblError::InvalidParameter {
            name: "kappa",
            reason: "must be non-negative",
        });
    }
    if !(t_int > 0.0 && t_int.is_finite()) {
        return Err(LblError::NonPositiveTemperature(t_int));
    }
    if !(t_irr >= 0.0 && t_irr.is_finite()) {
        return Err(LblError::NonPositiveTemperature(t_irr));
    }
    Ok(())
}

/// Radii and heights of the layers of an [`Atmosphere`] in hydrostatic
/// equilibrium under gravity falling off as `1/r²`.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerGeometry {
    /// Boundary radii in cm, top to bottom; `num_layers + 1` values, the
    /// last being the reference radius at the bottom
    boundary_radius: Vec<f64>,
    /// Gravity at the lower boundary of each layer in cm/s²
    gravity: Vec<f64>,
}

impl LayerGeometry {
    /// Number of layers.
    pub fn num_layers(&self) -> usize {
        self.gravity.len()
    }

    /// Boundary radii in cm, top to bottom (`num_layers + 1` values).
    pub fn boundary_radius(&self) -> &[f64] {
        &self.boundary_radius
    }

    /// Radius of the lower boundary of each layer in cm.
    pub fn lower_radius(&self) -> &[f64] {
        &self.boundary_radius[1..]
    }

    /// Radius of the upper boundary of each layer in cm.
    pub fn upper_radius(&self) -> &[f64] {
        &self.boundary_radius[..self.gravity.len()]
    }

    /// Geometric thickness of each layer in cm.
    pub fn height(&self) -> Vec<f64> {
        self.boundary_radius.windows(2).map(|w| w[0] - w[1]).collect()
    }

    /// Gravity at the lower boundary of each layer in cm/s².
    pub fn gravity(&self) -> &[f64] {
        &self.gravity
    }
}

/// A full atmosphere: layers plus what is needed to turn cross sections into
/// optical depths.
#[derive(Debug, Clone)]
pub struct Atmosphere {
    layers: Vec<AtmosphereLayer>,
    /// Pressure thickness of each layer in bar
    dp: Vec<f64>,
    /// Gravity of each layer in cm/s²
    gravity: Vec<f64>,
    /// Mean molecular weight in u
    mean_molecular_weight: f64,
}

impl Atmosphere {
    /// Build from validated parts.
    ///
    /// `layers` must be ordered top to bottom with strictly increasing
    /// pressure, and `dp` must hold one positive thickness per layer.
    pub fn new(
        layers: Vec<AtmosphereLayer>,
        dp: Vec<f64>,
        gravity: f64,
        mean_molecular_weight: f64,
    ) -> Result<Self> {
        validate_pressure_order(&layers)?;
        if dp.len() != layers.len() {
            return Err(LblError::InconsistentInputs {
                what: "layer thickness",
                expected: layers.len(),
                found: dp.len(),
            });
        }
        if dp.iter().any(|&d| !(d > 0.0 && d.is_finite())) {
            return Err(LblError::InvalidParameter {
                name: "dp",
                reason: "layer thickness must be positive",
            });
        }
        if !(gravity > 0.0 && gravity.is_finite()) {
            return Err(LblError::InvalidParameter {
                name: "gravity",
                reason: "must be positive",
            });
        }
        if !(mean_molecular_weight > 0.0 && mean_molecular_weight.is_finite()) {
            return Err(LblError::InvalidParameter {
                name: "mean_molecular_weight",
                reason: "must be positive",
            });
        }
        let gravity = vec![gravity; layers.len()];
        Ok(Self {
            layers,
            dp,
            gravity,
            mean_molecular_weight,
        })
    }

    /// Replace the constant gravity by one value per layer (cm/s²), e.g. the
    /// hydrostatic profile of [`Atmosphere::geometry`].
    pub fn with_gravity_profile(mut self, gravity: Vec<f64>) -> Result<Self> {
        if gravity.len() != self.layers.len() {
            return Err(LblError::InconsistentInputs {
                what: "gravity profile",
                expected: self.layers.len(),
                found: gravity.len(),
            });
        }
        if gravity.iter().any(|&g| !(g > 0.0 && g.is_finite())) {
            return Err(LblError::InvalidParameter {
                name: "gravity",
                reason: "must be positive",
            });
        }
        self.gravity = gravity;
        Ok(self)
    }

    /// Log-spaced atmosphere between two pressures with the given temperature
    /// and self mixing-ratio profiles (one value per layer, top to bottom).
    pub fn logspace(
        pressure_top: f64,
        pressure_bottom: f64,
        temperature: &[f64],
        vmr_self: &[f64],
        gravity: f64,
        mean_molecular_weight: f64,
    ) -> Result<Self> {
        let num_layers = temperature.len();
        if vmr_self.len() != num_layers {
            return Err(LblError::InconsistentInputs {
                what: "mixing ratio profile",
                expected: num_layers,
                found: vmr_self.len(),
            });
        }
        let (pressure, dp) = pressure_layers_logspace(pressure_top, pressure_bottom, num_layers)?;
        let layers = pressure
            .iter()
            .zip(temperature)
            .zip(vmr_self)
            .map(|((&p, &t), &vmr)| AtmosphereLayer::new(p, t, vmr))
            .collect::<Result<Vec<_>>>()?;
        Self::new(layers, dp, gravity, mean_molecular_weight)
    }

    /// Layers, top to bottom.
    pub fn layers(&self) -> &[AtmosphereLayer] {
        &self.layers
    }

    /// Number of layers.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Pressure thickness of each layer in bar.
    pub fn pressure_thickness(&self) -> &[f64] {
        &self.dp
    }

    /// Layer temperatures in K.
    pub fn temperatures(&self) -> Vec<f64> {
        self.layers.iter().map(|l| l.temperature).collect()
    }

    /// Temperature of the bottom layer in K.
    pub fn bottom_temperature(&self) -> f64 {
        self.layers[self.layers.len() - 1].temperature
    }

    /// Gravity of each layer in cm/s².
    pub fn gravity(&self) -> &[f64] {
        &self.gravity
    }

    /// Mean molecular weight in u.
    pub fn mean_molecular_weight(&self) -> f64 {
        self.mean_molecular_weight
    }

    /// Column number density (molecules/cm²) of a species per layer, from
    /// hydrostatic equilibrium: `VMR dP / (μ m_u g)`.
    pub fn column_density(&self, vmr: &[f64]) -> Result<Vec<f64>> {
        self.check_profile(vmr, "mixing ratio profile")?;
        let scale = BAR_TO_CGS / (self.mean_molecular_weight * M_U);
        Ok(self
            .dp
            .iter()
            .zip(&self.gravity)
            .zip(vmr)
            .map(|((dp, g), x)| x * dp * scale / g)
            .collect())
    }

    /// Geometric thickness of each layer in cm, `k_B T dP / (P μ m_u g)`.
    pub fn path_length(&self) -> Vec<f64> {
        let scale = K_B / (self.mean_molecular_weight * M_U);
        self.layers
            .iter()
            .zip(&self.dp)
            .zip(&self.gravity)
            .map(|((layer, dp), g)| scale * layer.temperature * dp / (layer.pressure * g))
            .collect()
    }

    /// Hydrostatic layer radii and gravity for a planet of radius
    /// `radius_bottom` (cm) at the lower boundary of the bottom layer, where
    /// gravity is `gravity_bottom` (cm/s²).
    ///
    /// Each layer is isothermal and gravity falls off as `g_0 (R_0 / r)²`, so
    /// the upper boundary follows exactly from
    /// `1/r_top = 1/r_bot - ln(P_bot / P_top) k_B T / (μ m_u g_0 R_0²)`.
    /// The atmosphere's own gravity is not used.
    pub fn geometry(&self, radius_bottom: f64, gravity_bottom: f64) -> Result<LayerGeometry> {
        if !(radius_bottom > 0.0 && radius_bottom.is_finite()) {
            return Err(LblError::InvalidParameter {
                name: "radius_bottom",
                reason: "must be positive",
            });
        }
        if !(gravity_bottom > 0.0 && gravity_bottom.is_finite()) {
            return Err(LblError::InvalidParameter {
                name: "gravity_bottom",
                reason: "must be positive",
            });
        }

        let gm = gravity_bottom * radius_bottom * radius_bottom;
        let scale = K_B / (self.mean_molecular_weight * M_U * gm);
        let num_layers = self.layers.len();
        let mut boundary_radius = vec![0.0; num_layers + 1];
        boundary_radius[num_layers] = radius_bottom;

        for i in (0..num_layers).rev() {
            let (layer, dp) = (&self.layers[i], self.dp[i]);
            let p_top = layer.pressure - dp;
            if !(p_top > 0.0) {
                return Err(LblError::InvalidParameter {
                    name: "dp",
                    reason: "layer thickness must stay below the layer pressure",
                });
            }
            let inv_top = 1.0 / boundary_radius[i + 1]
                - (layer.pressure / p_top).ln() * scale * layer.temperature;
            if !(inv_top > 0.0) {
                return Err(LblError::InvalidParameter {
                    name: "gravity_bottom",
                    reason: "too weak to bind the atmosphere",
                });
            }
            boundary_radius[i] = 1.0 / inv_top;
        }

        let gravity = boundary_radius[1..].iter().map(|r| gm / (r * r)).collect();
        Ok(LayerGeometry {
            boundary_radius,
            gravity,
        })
    }

    pub(crate) fn check_profile(&self, profile: &[f64], what: &'static str) -> Result<()> {
        if profile.len() != self.layers.len() {
            return Err(LblError::InconsistentInputs {
                what,
                expected: self.layers.len(),
                found: profile.len(),
            });
        }
        if profile.iter().any(|&x| !(x >= 0.0 && x.is_finite())) {
            return Err(LblError::InvalidParameter {
                name: what,
                reason: "must be non-negative and finite",
            });
        }
        Ok(())
    }
}
