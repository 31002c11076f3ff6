//! Transmission spectra of a transiting planet.
//!
//! Starlight grazing the limb crosses the layers along chords. A chord with
//! impact parameter `b` at the lower boundary of layer `i` runs through that
//! layer and every layer above it; its length inside layer `j` is
//!
//! ```text
//! l_ij = 2 (sqrt(r_top_j² - b²) - sqrt(r_bot_j² - b²))
//! ```
//!
//! With a uniform extinction `Δτ_j / h_j` inside each layer, the chord
//! optical depth is `Σ_j (l_ij / h_j) Δτ_j`. The effective (transit) radius
//! then follows from
//!
//! ```text
//! R_p² = R_0² + 2 ∫_{R_0}^{R_top} (1 - exp(-τ(b))) b db
//! ```
//!
//! integrated with the trapezoid rule over the layer boundaries, where `R_0`
//! is the radius at the bottom of the atmosphere.

use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView2};
use rayon::prelude::*;

use crate::atmosphere::LayerGeometry;
use crate::error::{LblError, Result};
use crate::opacity::OpticalDepthMatrix;

/// `r² - b²` without cancellation for `r` close to `b`.
fn squared_chord(r: f64, b: f64) -> f64 {
    ((r - b) * (r + b)).max(0.0)
}

/// Chord path lengths in units of layer height, shape (layers, layers).
///
/// Row `i` is the chord tangent to the lower boundary of layer `i`, column
/// `j` the layer it crosses. Layers below the tangent point are not crossed,
/// so the matrix is lower triangular.
pub fn chord_geometric_matrix(geometry: &LayerGeometry) -> Array2<f64> {
    let n = geometry.num_layers();
    let (upper, lower) = (geometry.upper_radius(), geometry.lower_radius());
    let height = geometry.height();

    Array2::from_shape_fn((n, n), |(i, j)| {
        if j > i {
            return 0.0;
        }
        let b = lower[i];
        let path = 2.0 * (squared_chord(upper[j], b).sqrt() - squared_chord(lower[j], b).sqrt());
        path / height[j]
    })
}

/// Optical depth along each chord, shape (layers, bins).
///
/// `cgm` comes from [`chord_geometric_matrix`]. An opaque layer makes every
/// chord through it opaque.
pub fn chord_optical_depth(cgm: ArrayView2<'_, f64>, dtau: &OpticalDepthMatrix) -> Result<Array2<f64>> {
    let (num_layers, num_bins) = (dtau.num_layers(), dtau.num_bins());
    if cgm.dim() != (num_layers, num_layers) {
        return Err(LblError::InconsistentInputs {
            what: "chord matrix layers",
            expected: num_layers,
            found: cgm.nrows(),
        });
    }

    let dtau = dtau.view();
    let mut data = vec![0.0; num_layers * num_bins];
    data.par_chunks_mut(num_bins)
        .enumerate()
        .for_each(|(i, row)| {
            for (j, &w) in cgm.row(i).iter().enumerate() {
                // Zero-length crossings must not turn an opaque layer into NaN
                if w > 0.0 {
                    for (tau, &d) in row.iter_mut().zip(dtau.row(j)) {
                        *tau += w * d;
                    }
                }
            }
        });

    let found = data.len();
    Array2::from_shape_vec((num_layers, num_bins), data).map_err(|_| LblError::InconsistentInputs {
        what: "chord optical depth size",
        expected: num_layers * num_bins,
        found,
    })
}

/// Squared transit radius per bin, in cm².
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionSpectrum {
    radius_squared: Array1<f64>,
}

impl TransmissionSpectrum {
    /// Squared transit radius in cm².
    pub fn radius_squared(&self) -> &Array1<f64> {
        &self.radius_squared
    }

    /// Transit radius in cm.
    pub fn radius(&self) -> Array1<f64> {
        self.radius_squared.mapv(f64::sqrt)
    }

    /// Transit depth `R_p² / R_s²` for a star of radius `stellar_radius` (cm).
    pub fn transit_depth(&self, stellar_radius: f64) -> Result<Array1<f64>> {
        if !(stellar_radius > 0.0 && stellar_radius.is_finite()) {
            return Err(LblError::InvalidParameter {
                name: "stellar_radius",
                reason: "must be positive",
            });
        }
        let inv = 1.0 / (stellar_radius * stellar_radius);
        Ok(self.radius_squared.mapv(|r2| r2 * inv))
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.radius_squared.len()
    }

    /// Whether the spectrum has no bins.
    pub fn is_empty(&self) -> bool {
        self.radius_squared.is_empty()
    }

    /// Consume into the squared radii.
    pub fn into_inner(self) -> Array1<f64> {
        self.radius_squared
    }
}

/// Transmission spectrum of an atmosphere with layer geometry `geometry`
/// and layer optical depths `dtau` (radial, top to bottom).
pub fn transmission_spectrum(geometry: &LayerGeometry, dtau: &OpticalDepthMatrix) -> Result<TransmissionSpectrum> {
    if geometry.num_layers() != dtau.num_layers() {
        return Err(LblError::InconsistentInputs {
            what: "geometry layers",
            expected: dtau.num_layers(),
            found: geometry.num_layers(),
        });
    }
    info!(
        "Transmission spectrum over {} layers, {} bins",
        dtau.num_layers(),
        dtau.num_bins()
    );

    let cgm = chord_geometric_matrix(geometry);
    let tau = chord_optical_depth(cgm.view(), dtau)?;
    let radius = geometry.boundary_radius();
    let bottom = radius[radius.len() - 1];

    let radius_squared: Vec<f64> = (0..dtau.num_bins())
        .into_par_iter()
        .map(|k| {
            // Absorbed fraction at each boundary; the top boundary is clear
            let absorbed = |b: usize| if b == 0 { 0.0 } else { -(-tau[[b - 1, k]]).exp_m1() };
            let area: f64 = (0..radius.len() - 1)
                .map(|b| {
                    let (outer, inner) = (radius[b], radius[b + 1]);
                    (absorbed(b) * outer + absorbed(b + 1) * inner) * (outer - inner)
                })
                .sum();
            bottom * bottom + area
        })
        .collect();

    let opaque = tau.iter().filter(|t| t.is_infinite()).count();
    debug!("{opaque} chord optical depths are infinite");

    Ok(TransmissionSpectrum {
        radius_squared: Array1::from(radius_squared),
    })
}
