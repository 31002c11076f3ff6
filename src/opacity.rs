//! Layer optical depths.
//!
//! Line and continuum absorption are converted to optical depth per layer and
//! summed here, before any radiative transfer. Rows are layers (top to
//! bottom), columns are grid bins.

use log::debug;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::atmosphere::Atmosphere;
use crate::continuum::ContinuumProvider;
use crate::error::{LblError, Result};
use crate::grid::WavenumberGrid;
use crate::xsection::CrossSectionMatrix;

/// Optical depth Δτ of each layer in each bin.
///
/// Values are non-negative; `+inf` (opaque) is allowed, NaN is not.
#[derive(Debug, Clone, PartialEq)]
pub struct OpticalDepthMatrix {
    data: Array2<f64>,
}

impl OpticalDepthMatrix {
    /// Wrap a (`num_layers`, `num_bins`) array.
    pub fn new(data: Array2<f64>) -> Result<Self> {
        if data.nrows() == 0 {
            return Err(LblError::EmptyAtmosphere);
        }
        if data.iter().any(|&x| !(x >= 0.0)) {
            return Err(LblError::InvalidParameter {
                name: "optical depth",
                reason: "must be non-negative and not NaN",
            });
        }
        Ok(Self { data })
    }

    /// Read-only view of the whole matrix.
    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    /// Optical depths of one layer.
    pub fn row(&self, layer: usize) -> ArrayView1<'_, f64> {
        self.data.row(layer)
    }

    /// Number of layers.
    pub fn num_layers(&self) -> usize {
        self.data.nrows()
    }

    /// Number of grid bins.
    pub fn num_bins(&self) -> usize {
        self.data.ncols()
    }

    /// Total optical depth of the column in each bin.
    pub fn column(&self) -> Array1<f64> {
        self.data.sum_axis(Axis(0))
    }

    /// Take the underlying array.
    pub fn into_inner(self) -> Array2<f64> {
        self.data
    }
}

/// Accumulates optical depth contributions for one atmosphere and grid.
#[derive(Debug, Clone)]
pub struct OpticalDepthBuilder<'a> {
    atmosphere: &'a Atmosphere,
    grid: &'a WavenumberGrid,
    dtau: Array2<f64>,
}

impl<'a> OpticalDepthBuilder<'a> {
    /// Start from zero optical depth.
    pub fn new(atmosphere: &'a Atmosphere, grid: &'a WavenumberGrid) -> Self {
        Self {
            atmosphere,
            grid,
            dtau: Array2::zeros((atmosphere.num_layers(), grid.len())),
        }
    }

    fn check_shape(&self, what: &'static str, rows: usize, cols: usize) -> Result<()> {
        if rows != self.dtau.nrows() {
            return Err(LblError::InconsistentInputs {
                what,
                expected: self.dtau.nrows(),
                found: rows,
            });
        }
        if cols != self.dtau.ncols() {
            return Err(LblError::InconsistentInputs {
                what,
                expected: self.dtau.ncols(),
                found: cols,
            });
        }
        Ok(())
    }

    /// Add line absorption: `Δτ = σ VMR dP / (μ m_u g)`.
    ///
    /// `vmr` is the mixing ratio of the absorbing molecule per layer.
    pub fn add_lines(mut self, cross_sections: &CrossSectionMatrix, vmr: &[f64]) -> Result<Self> {
        self.check_shape(
            "cross-section matrix shape",
            cross_sections.num_layers(),
            cross_sections.num_bins(),
        )?;
        let column = self.atmosphere.column_density(vmr)?;
        for ((mut dtau, xs), n) in self
            .dtau
            .axis_iter_mut(Axis(0))
            .zip(cross_sections.view().axis_iter(Axis(0)))
            .zip(column)
        {
            dtau.scaled_add(n, &xs);
        }
        Ok(self)
    }

    /// Add pair continuum absorption (CIA, or H⁻ with the electron and atomic
    /// hydrogen mixing ratios) with mixing ratios `vmr1` and `vmr2`:
    /// `Δτ = α n₁ n₂ Δz` with `Δz` the layer path length.
    pub fn add_cia(
        mut self,
        continuum: &dyn ContinuumProvider,
        vmr1: &[f64],
        vmr2: &[f64],
    ) -> Result<Self> {
        self.atmosphere.check_profile(vmr1, "first CIA mixing ratio profile")?;
        self.atmosphere.check_profile(vmr2, "second CIA mixing ratio profile")?;
        let path = self.atmosphere.path_length();

        for (i, (layer, mut dtau)) in self
            .atmosphere
            .layers()
            .iter()
            .zip(self.dtau.axis_iter_mut(Axis(0)))
            .enumerate()
        {
            let alpha = continuum.absorption_coefficient(layer.temperature, self.grid)?;
            let n = layer.number_density();
            let scale = vmr1[i] * vmr2[i] * n * n * path[i];
            dtau.scaled_add(scale, &ArrayView1::from(alpha.as_slice()));
        }
        debug!("added {} CIA to {} layers", continuum.pair(), self.atmosphere.num_layers());
        Ok(self)
    }

    /// Add a precomputed optical depth contribution, e.g. clouds or Rayleigh
    /// scattering treated as absorption.
    pub fn add_optical_depth(mut self, other: &OpticalDepthMatrix) -> Result<Self> {
        self.check_shape("optical depth shape", other.num_layers(), other.num_bins())?;
        self.dtau += &other.view();
        Ok(self)
    }

    /// Finish, validating the summed optical depths.
    pub fn build(self) -> Result<OpticalDepthMatrix> {
        OpticalDepthMatrix::new(self.dtau)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::K_B;
    use crate::continuum::{CiaTable, HMinusContinuum};
    use approx::assert_relative_eq;
    use ndarray::array;

    fn atmosphere() -> Atmosphere {
        Atmosphere::logspace(1e-3, 1.0, &[800.0, 1000.0, 1200.0], &[0.0; 3], 2478.57, 2.33).unwrap()
    }

    #[test]
    fn line_optical_depth_scales_with_column() {
        let atm = atmosphere();
        let grid = WavenumberGrid::linear(4000.0, 4001.0, 2).unwrap();
        let xs = CrossSectionMatrix::from_array(Array2::from_elem((3, 2), 1e-22)).unwrap();
        let vmr = [1e-4; 3];
        let dtau = OpticalDepthBuilder::new(&atm, &grid)
            .add_lines(&xs, &vmr)
            .unwrap()
            .build()
            .unwrap();
        let column = atm.column_density(&vmr).unwrap();
        for i in 0..3 {
            assert_relative_eq!(dtau.row(i)[1], 1e-22 * column[i], max_relative = 1e-12);
        }
        assert_relative_eq!(
            dtau.column()[0],
            1e-22 * column.iter().sum::<f64>(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn cia_optical_depth() {
        let atm = atmosphere();
        let grid = WavenumberGrid::linear(4000.0, 4200.0, 3).unwrap();
        let cia = CiaTable::new(
            "H2-H2",
            vec![500.0, 1500.0],
            vec![4000.0, 4200.0],
            array![[-45.0, -45.0], [-45.0, -45.0]],
        )
        .unwrap();
        let vmr = [0.85; 3];
        let dtau = OpticalDepthBuilder::new(&atm, &grid)
            .add_cia(&cia, &vmr, &vmr)
            .unwrap()
            .build()
            .unwrap();

        let layer = atm.layers()[2];
        let n = layer.number_density();
        let expected = 1e-45 * (0.85 * n).powi(2) * K_B * layer.temperature
            * atm.pressure_thickness()[2]
            / (layer.pressure * atm.mean_molecular_weight() * crate::constants::M_U * atm.gravity()[2]);
        assert_relative_eq!(dtau.row(2)[1], expected, max_relative = 1e-10);
    }

    #[test]
    fn hminus_optical_depth_uses_electron_pressure() {
        let atm = Atmosphere::logspace(1e-2, 1.0, &[2500.0, 3000.0, 3500.0], &[0.0; 3], 2478.57, 2.33)
            .unwrap();
        // 1 μm and 2 μm
        let grid = WavenumberGrid::from_values(vec![5000.0, 10000.0]).unwrap();
        let (vmr_e, vmr_h) = ([1e-6; 3], [0.1; 3]);
        let dtau = OpticalDepthBuilder::new(&atm, &grid)
            .add_cia(&HMinusContinuum, &vmr_e, &vmr_h)
            .unwrap()
            .build()
            .unwrap();

        let path = atm.path_length();
        for (i, layer) in atm.layers().iter().enumerate() {
            let n = layer.number_density();
            let electron_pressure = 1e-6 * n * K_B * layer.temperature;
            for (j, lambda) in [2.0, 1.0].into_iter().enumerate() {
                let expected = HMinusContinuum.kappa(lambda, layer.temperature)
                    * electron_pressure
                    * 0.1
                    * n
                    * path[i];
                assert_relative_eq!(dtau.row(i)[j], expected, max_relative = 1e-10);
            }
            assert!(dtau.row(i)[1] > dtau.row(i)[0]);
        }
    }

    #[test]
    fn contributions_add() {
        let atm = atmosphere();
        let grid = WavenumberGrid::linear(4000.0, 4001.0, 2).unwrap();
        let extra = OpticalDepthMatrix::new(Array2::from_elem((3, 2), 0.25)).unwrap();
        let dtau = OpticalDepthBuilder::new(&atm, &grid)
            .add_optical_depth(&extra)
            .unwrap()
            .add_optical_depth(&extra)
            .unwrap()
            .build()
            .unwrap();
        assert!(dtau.view().iter().all(|&x| x == 0.5));

        let wrong = OpticalDepthMatrix::new(Array2::zeros((2, 2))).unwrap();
        assert!(matches!(
            OpticalDepthBuilder::new(&atm, &grid).add_optical_depth(&wrong),
            Err(LblError::InconsistentInputs { .. })
        ));
    }

    #[test]
    fn rejects_nan_but_allows_opaque() {
        assert!(OpticalDepthMatrix::new(array![[f64::INFINITY, 0.0]]).is_ok());
        assert!(OpticalDepthMatrix::new(array![[f64::NAN, 0.0]]).is_err());
        assert!(OpticalDepthMatrix::new(array![[-1.0, 0.0]]).is_err());
    }
}
