//! Radiative transfer through a layered atmosphere without scattering.
//!
//! Layers are ordered top to bottom. For each bin, with layer transmission
//! `t_i` and layer source `S_i` (`π B_ν(T_i)`), the emergent flux at the top is
//!
//! ```text
//! F = Σ_i S_i (1 - t_i) Π_{j<i} t_j + F_surface Π_j t_j
//! ```
//!
//! evaluated as a recursion from the surface upwards. Transmission is
//! `exp(-Δτ/μ)` for the direct scheme and `2E3(Δτ)` for the two-stream
//! scheme. An opaque layer (`Δτ = inf`) has zero transmission.
//!
//! Every term is non-increasing in each `Δτ_i` as long as the source does not
//! decrease with depth, so adding absorbers never brightens the spectrum in
//! that case. The transmitted part `F_surface Π t_j` is always non-increasing.


use log::{debug, info};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::atmosphere::Atmosphere;
use crate::error::{LblError, Result};
use crate::grid::WavenumberGrid;
use crate::opacity::OpticalDepthMatrix;
use crate::planck::{brightness_temperature, source_matrix, source_vector};
use crate::special::trans2e3;

/// Formulation of the layer transmission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransferScheme {
    /// Pure absorption along a single ray with direction cosine `mu`
    Direct {
        /// Cosine of the viewing angle, in `(0, 1]`
        mu: f64,
    },
    /// Hemispheric flux with `2E3` layer transmission
    TwoStream,
}

impl Default for TransferScheme {
    fn default() -> Self {
        Self::Direct { mu: 1.0 }
    }
}

impl TransferScheme {
    /// Check the viewing angle.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Direct { mu } if !(mu > 0.0 && mu <= 1.0) => Err(LblError::InvalidParameter {
                name: "mu",
                reason: "must be within (0, 1]",
            }),
            _ => Ok(()),
        }
    }

    /// Transmission of a layer with optical depth `dtau`.
    #[inline]
    pub fn transmission(&self, dtau: f64) -> f64 {
        match *self {
            Self::Direct { mu } => {
                if dtau == f64::INFINITY {
                    0.0
                } else {
                    (-dtau / mu).exp()
                }
            }
            Self::TwoStream => trans2e3(dtau),
        }
    }
}

/// Conditions at the top and bottom of the atmosphere.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundaryConditions {
    /// Source at the bottom boundary in erg/s/cm²/cm⁻¹, one value per bin.
    /// `None` means no surface emission.
    pub surface_source: Option<Array1<f64>>,
    /// Flux incident on the top of the atmosphere, one value per bin.
    /// `None` means zero.
    pub top_incident: Option<Array1<f64>>,
    /// Lambertian surface albedo in `[0, 1]`
    pub surface_albedo: f64,
}

impl BoundaryConditions {
    /// No surface emission, nothing incident from above, black surface.
    pub fn none() -> Self {
        Self::default()
    }

    /// Blackbody surface at `temperature`.
    pub fn blackbody_surface(temperature: f64, grid: &WavenumberGrid) -> Result<Self> {
        Ok(Self {
            surface_source: Some(source_vector(temperature, grid)?),
            ..Self::default()
        })
    }

    /// Set the flux incident on the top of the atmosphere.
    pub fn with_top_incident(mut self, flux: Array1<f64>) -> Self {
        self.top_incident = Some(flux);
        self
    }

    /// Set the surface albedo.
    pub fn with_surface_albedo(mut self, albedo: f64) -> Self {
        self.surface_albedo = albedo;
        self
    }

    fn validate(&self, num_bins: usize) -> Result<()> {
        if !(0.0..=1.0).contains(&self.surface_albedo) {
            return Err(LblError::InvalidParameter {
                name: "surface_albedo",
                reason: "must be within [0, 1]",
            });
        }
        for (what, values) in [
            ("surface source length", &self.surface_source),
            ("top incident flux length", &self.top_incident),
        ] {
            let Some(values) = values else { continue };
            if values.len() != num_bins {
                return Err(LblError::InconsistentInputs {
                    what,
                    expected: num_bins,
                    found: values.len(),
                });
            }
            if values.iter().any(|&v| !(v >= 0.0 && v.is_finite())) {
                return Err(LblError::InvalidParameter {
                    name: what,
                    reason: "boundary fluxes must be non-negative and finite",
                });
            }
        }
        Ok(())
    }
}

/// Spectrum leaving the top of the atmosphere, aligned with the grid.
///
/// Units are those of the source function, erg/s/cm²/cm⁻¹ (for the direct
/// scheme this is π times the intensity).
#[derive(Debug, Clone, PartialEq)]
pub struct EmergentSpectrum {
    values: Array1<f64>,
}

impl EmergentSpectrum {
    /// Values per bin.
    pub fn values(&self) -> ArrayView1<'_, f64> {
        self.values.view()
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no bins.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Brightness temperature of each bin in K.
    pub fn brightness_temperature(&self, grid: &WavenumberGrid) -> Result<Array1<f64>> {
        if grid.len() != self.values.len() {
            return Err(LblError::InconsistentInputs {
                what: "grid length",
                expected: self.values.len(),
                found: grid.len(),
            });
        }
        Ok(self
            .values
            .iter()
            .zip(grid.values())
            .map(|(&flux, &nu)| brightness_temperature(flux, nu))
            .collect())
    }

    /// Take the values.
    pub fn into_inner(self) -> Array1<f64> {
        self.values
    }
}

/// Results of one transfer solve.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferOutputs {
    /// Flux leaving the top of the atmosphere
    pub emergent: EmergentSpectrum,
    /// Total transmission of the column, `Π t_i`
    pub transmission: Array1<f64>,
    /// Flux arriving at the bottom boundary from above
    pub downwelling: Array1<f64>,
}

/// Per-bin result: (emergent, transmission, downwelling).
type BinOutputs = (f64, f64, f64);

/// Radiative-transfer integrator for one scheme.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RadiativeTransfer {
    scheme: TransferScheme,
}

impl RadiativeTransfer {
    /// Create an integrator with a validated scheme.
    pub fn new(scheme: TransferScheme) -> Result<Self> {
        scheme.validate()?;
        Ok(Self { scheme })
    }

    /// Scheme in use.
    pub fn scheme(&self) -> TransferScheme {
        self.scheme
    }

    /// Solve with an explicit source matrix of shape (layers, bins).
    pub fn solve(
        &self,
        dtau: &OpticalDepthMatrix,
        source: ArrayView2<'_, f64>,
        boundary: &BoundaryConditions,
    ) -> Result<TransferOutputs> {
        let (num_layers, num_bins) = (dtau.num_layers(), dtau.num_bins());
        if source.nrows() != num_layers {
            return Err(LblError::InconsistentInputs {
                what: "source layers",
                expected: num_layers,
                found: source.nrows(),
            });
        }
        if source.ncols() != num_bins {
            return Err(LblError::InconsistentInputs {
                what: "source bins",
                expected: num_bins,
                found: source.ncols(),
            });
        }
        if source.iter().any(|&s| !(s >= 0.0 && s.is_finite())) {
            return Err(LblError::InvalidParameter {
                name: "source",
                reason: "must be non-negative and finite",
            });
        }
        boundary.validate(num_bins)?;
        info!(
            "Radiative transfer ({:?}) over {} layers, {} bins",
            self.scheme, num_layers, num_bins
        );

        let dtau = dtau.view();
        let per_bin: Vec<BinOutputs> = (0..num_bins)
            .into_par_iter()
            .map(|j| {
                let top = boundary.top_incident.as_ref().map_or(0.0, |f| f[j]);
                let surface = boundary.surface_source.as_ref().map_or(0.0, |f| f[j]);
                self.column(
                    dtau.column(j),
                    source.column(j),
                    top,
                    surface,
                    boundary.surface_albedo,
                )
            })
            .collect();

        let opaque = per_bin.iter().filter(|(_, tran, _)| *tran == 0.0).count();
        debug!("{opaque} of {num_bins} bins are opaque");

        let emergent = per_bin.iter().map(|b| b.0).collect();
        let transmission = per_bin.iter().map(|b| b.1).collect();
        let downwelling = per_bin.iter().map(|b| b.2).collect();
        Ok(TransferOutputs {
            emergent: EmergentSpectrum { values: emergent },
            transmission,
            downwelling,
        })
    }

    /// Solve with layer sources from the atmosphere temperatures.
    pub fn solve_atmosphere(
        &self,
        atmosphere: &Atmosphere,
        grid: &WavenumberGrid,
        dtau: &OpticalDepthMatrix,
        boundary: &BoundaryConditions,
    ) -> Result<TransferOutputs> {
        if dtau.num_layers() != atmosphere.num_layers() {
            return Err(LblError::InconsistentInputs {
                what: "optical depth layers",
                expected: atmosphere.num_layers(),
                found: dtau.num_layers(),
            });
        }
        let source = source_matrix(&atmosphere.temperatures(), grid)?;
        self.solve(dtau, source.view(), boundary)
    }

    /// Transfer through one column of layers for one bin.
    fn column(
        &self,
        dtau: ArrayView1<'_, f64>,
        source: ArrayView1<'_, f64>,
        top: f64,
        surface: f64,
        albedo: f64,
    ) -> BinOutputs {
        let tran: SmallVec<[f64; 64]> = dtau.iter().map(|&d| self.scheme.transmission(d)).collect();

        // Downward from the top to the surface
        let down = tran
            .iter()
            .zip(source)
            .fold(top, |flux, (&t, &s)| flux * t + s * (1.0 - t));

        // Upward from the surface to the top
        let surface_up = (1.0 - albedo) * surface + albedo * down;
        let up = tran
            .iter()
            .zip(source)
            .rev()
            .fold(surface_up, |flux, (&t, &s)| flux * t + s * (1.0 - t));

        (up, tran.iter().product(), down)
    }
}

/// Emergent spectrum of an atmosphere with a blackbody surface at the bottom
/// layer temperature, nothing incident from above, and a black surface.
pub fn emission_spectrum(
    atmosphere: &Atmosphere,
    grid: &WavenumberGrid,
    dtau: &OpticalDepthMatrix,
    scheme: TransferScheme,
) -> Result<EmergentSpectrum> {
    let boundary = BoundaryConditions::blackbody_surface(atmosphere.bottom_temperature(), grid)?;
    let outputs = RadiativeTransfer::new(scheme)?.solve_atmosphere(atmosphere, grid, dtau, &boundary)?;
    Ok(outputs.emergent)
}
