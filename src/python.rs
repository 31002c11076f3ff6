//! Python interface.
//!
//! NOTE: this module is only the interface between Rust and Python. The real
//! work happens in the other modules, which do not use `pyo3`.

use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use log::{debug, info};
use ndarray::{Array1, Array2, Axis};
use numpy::prelude::*;
use numpy::{PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2, ToPyArray};
use pyo3::exceptions::{PyKeyboardInterrupt, PyMemoryError, PyValueError};
use pyo3::prelude::*;
use rayon::prelude::*;

use crate::atmosphere::{Atmosphere, AtmosphereLayer};
use crate::error::{LblError, Result};
use crate::grid::WavenumberGrid;
use crate::linelist::{LineList, LineListSource, SpectralLine};
use crate::opacity::OpticalDepthBuilder;
use crate::partition::{PartitionCurve, TabulatedPartitionFunction};
use crate::profile;
use crate::rtransfer::{BoundaryConditions, RadiativeTransfer, TransferScheme};
use crate::transit::transmission_spectrum;
use crate::xsection::{AssemblerConfig, CrossSectionAssembler};

/// Columns of the `lines` array
const LINE_COLUMNS: usize = 7;

impl From<LblError> for PyErr {
    fn from(e: LblError) -> Self {
        match e {
            LblError::MemoryBudgetExceeded { .. } => PyMemoryError::new_err(e.to_string()),
            LblError::Cancelled => PyKeyboardInterrupt::new_err(e.to_string()),
            _ => PyValueError::new_err(e.to_string()),
        }
    }
}

/// Emission spectra for a batch of atmospheres.
///
/// Each array is dimensioned as (`num_points`, `num_bins`).
#[pyclass]
struct EmissionResults {
    emergent: Array2<f64>,
    transmission: Array2<f64>,
}

/// Implement all the "getters" for the Python properties
#[pymethods]
impl EmissionResults {
    #[getter]
    fn emergent<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        self.emergent.to_pyarray(py)
    }

    #[getter]
    fn transmission<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f64>> {
        self.transmission.to_pyarray(py)
    }
}

impl EmissionResults {
    fn new(num_points: usize, num_bins: usize) -> Self {
        Self {
            emergent: Array2::zeros([num_points, num_bins]),
            transmission: Array2::zeros([num_points, num_bins]),
        }
    }
}

/// Build the line list and partition functions from numpy inputs.
///
/// `lines` has shape (`num_lines`, 7) with columns: center (cm⁻¹), reference
/// strength (cm/molecule), lower state energy (cm⁻¹), air width, self width
/// (cm⁻¹/atm), temperature exponent, pressure shift (cm⁻¹/atm).
fn line_inputs(
    lines: &PyReadonlyArray2<'_, f64>,
    isotope_id: &PyReadonlyArray1<'_, u16>,
    isotopes: &PyReadonlyArray1<'_, u16>,
    molar_mass: &PyReadonlyArray1<'_, f64>,
    partition_temperature: &PyReadonlyArray1<'_, f64>,
    partition_values: &PyReadonlyArray2<'_, f64>,
) -> PyResult<(LineList, TabulatedPartitionFunction)> {
    let num_lines = lines.shape()[0];
    if lines.shape()[1] != LINE_COLUMNS {
        return Err(LblError::InconsistentInputs {
            what: "line columns",
            expected: LINE_COLUMNS,
            found: lines.shape()[1],
        }
        .into());
    }
    if isotope_id.len() != num_lines {
        return Err(LblError::InconsistentInputs {
            what: "isotope id length",
            expected: num_lines,
            found: isotope_id.len(),
        }
        .into());
    }
    let num_isotopes = isotopes.len();
    if molar_mass.len() != num_isotopes {
        return Err(LblError::InconsistentInputs {
            what: "molar mass length",
            expected: num_isotopes,
            found: molar_mass.len(),
        }
        .into());
    }
    if partition_values.dims() != [num_isotopes, partition_temperature.len()] {
        return Err(LblError::InconsistentInputs {
            what: "partition table rows",
            expected: num_isotopes,
            found: partition_values.shape()[0],
        }
        .into());
    }

    let table = lines.as_array();
    let isotope_id = isotope_id.as_slice()?;
    let records = table
        .axis_iter(Axis(0))
        .zip(isotope_id)
        .map(|(row, &iso)| {
            SpectralLine::new(row[0], row[1], row[2], row[3], row[4], row[5], iso)
                .with_pressure_shift(row[6])
        })
        .collect();

    let isotopes = isotopes.as_slice()?;
    let masses = isotopes.iter().copied().zip(molar_mass.as_slice()?.iter().copied());
    let line_list = LineList::new(LineListSource::Hitran, records, masses)?;

    let temperature = partition_temperature.as_slice()?;
    let mut partition = TabulatedPartitionFunction::new();
    for (&iso, values) in isotopes.iter().zip(partition_values.as_array().axis_iter(Axis(0))) {
        let curve = PartitionCurve::new(temperature.to_vec(), values.to_vec())?;
        partition = partition.with_curve(iso, curve);
    }

    debug!("{num_lines} lines over {num_isotopes} isotopes");
    Ok((line_list, partition))
}

fn assembler_config(wing_cutoff: f64, strength_threshold: f64) -> AssemblerConfig {
    AssemblerConfig {
        wing_cutoff,
        strength_threshold,
        ..AssemblerConfig::default()
    }
}

/// Voigt profile at offsets `x` (cm⁻¹) for Gaussian standard deviation
/// `sigma` and Lorentz HWHM `gamma`.
#[pyfunction]
fn voigt<'py>(
    py: Python<'py>,
    x: PyReadonlyArray1<'py, f64>,
    sigma: f64,
    gamma: f64,
) -> PyResult<Bound<'py, PyArray1<f64>>> {
    if !(sigma >= 0.0 && gamma >= 0.0) {
        return Err(LblError::InvalidParameter {
            name: "sigma/gamma",
            reason: "widths must be non-negative",
        }
        .into());
    }
    let x = x.as_slice()?;
    let mut out = vec![0.0; x.len()];
    profile::voigt_batch(x, sigma, gamma, &mut out)?;
    Ok(Array1::from(out).to_pyarray(py))
}

/// Cross sections (cm²/molecule) of one atmosphere profile.
///
/// `pressure` (bar), `temperature` (K) and `vmr_self` have shape
/// (`num_layers`, ) and are ordered top to bottom. The line inputs are as for
/// `compute_emission`. The result has shape (`num_layers`, `num_bins`).
#[pyfunction]
#[pyo3(signature = (nu_grid, lines, isotope_id, isotopes, molar_mass, partition_temperature, partition_values, pressure, temperature, vmr_self, wing_cutoff=25.0, strength_threshold=0.0))]
#[allow(clippy::too_many_arguments)]
fn compute_xsmatrix<'py>(
    py: Python<'py>,
    nu_grid: PyReadonlyArray1<'py, f64>,
    lines: PyReadonlyArray2<'py, f64>,
    isotope_id: PyReadonlyArray1<'py, u16>,
    isotopes: PyReadonlyArray1<'py, u16>,
    molar_mass: PyReadonlyArray1<'py, f64>,
    partition_temperature: PyReadonlyArray1<'py, f64>,
    partition_values: PyReadonlyArray2<'py, f64>,
    pressure: PyReadonlyArray1<'py, f64>,
    temperature: PyReadonlyArray1<'py, f64>,
    vmr_self: PyReadonlyArray1<'py, f64>,
    wing_cutoff: f64,
    strength_threshold: f64,
) -> PyResult<Bound<'py, PyArray2<f64>>> {
    let grid = WavenumberGrid::from_values(nu_grid.as_slice()?.to_vec())?;
    let (line_list, partition) = line_inputs(
        &lines,
        &isotope_id,
        &isotopes,
        &molar_mass,
        &partition_temperature,
        &partition_values,
    )?;

    let pressure = pressure.as_slice()?;
    let temperature = temperature.as_slice()?;
    let vmr_self = vmr_self.as_slice()?;
    if temperature.len() != pressure.len() || vmr_self.len() != pressure.len() {
        return Err(LblError::InconsistentInputs {
            what: "profile length",
            expected: pressure.len(),
            found: temperature.len().max(vmr_self.len()),
        }
        .into());
    }
    let layers = pressure
        .iter()
        .zip(temperature)
        .zip(vmr_self)
        .map(|((&p, &t), &x)| AtmosphereLayer::new(p, t, x))
        .collect::<Result<Vec<_>>>()?;

    let config = assembler_config(wing_cutoff, strength_threshold);
    let matrix = py.allow_threads(|| {
        CrossSectionAssembler::new(&line_list, &grid, config)?.xsmatrix(&layers, &partition)
    })?;
    Ok(matrix.view().to_pyarray(py))
}

/// Squared transit radius (cm²) of one atmosphere profile.
///
/// The line inputs are as for `compute_emission`. Layers are log-spaced from
/// `pressure_top` to `pressure_bottom` (bar) with `temperature` (K) and `vmr`
/// given top to bottom. `radius_bottom` (cm) and `gravity_bottom` (cm/s²)
/// hold at the bottom of the atmosphere; gravity above follows from
/// hydrostatic equilibrium. The result has shape (`num_bins`, ).
#[pyfunction]
#[pyo3(signature = (nu_grid, lines, isotope_id, isotopes, molar_mass, partition_temperature, partition_values, pressure_top, pressure_bottom, temperature, vmr, mean_molecular_weight, radius_bottom, gravity_bottom, wing_cutoff=25.0, strength_threshold=0.0))]
#[allow(clippy::too_many_arguments)]
fn compute_transmission<'py>(
    py: Python<'py>,
    nu_grid: PyReadonlyArray1<'py, f64>,
    lines: PyReadonlyArray2<'py, f64>,
    isotope_id: PyReadonlyArray1<'py, u16>,
    isotopes: PyReadonlyArray1<'py, u16>,
    molar_mass: PyReadonlyArray1<'py, f64>,
    partition_temperature: PyReadonlyArray1<'py, f64>,
    partition_values: PyReadonlyArray2<'py, f64>,
    pressure_top: f64,
    pressure_bottom: f64,
    temperature: PyReadonlyArray1<'py, f64>,
    vmr: PyReadonlyArray1<'py, f64>,
    mean_molecular_weight: f64,
    radius_bottom: f64,
    gravity_bottom: f64,
    wing_cutoff: f64,
    strength_threshold: f64,
) -> PyResult<Bound<'py, PyArray1<f64>>> {
    let grid = WavenumberGrid::from_values(nu_grid.as_slice()?.to_vec())?;
    let (line_list, partition) = line_inputs(
        &lines,
        &isotope_id,
        &isotopes,
        &molar_mass,
        &partition_temperature,
        &partition_values,
    )?;
    let temperature = temperature.as_slice()?;
    let vmr = vmr.as_slice()?;
    let atmosphere = Atmosphere::logspace(
        pressure_top,
        pressure_bottom,
        temperature,
        vmr,
        gravity_bottom,
        mean_molecular_weight,
    )?;

    let config = assembler_config(wing_cutoff, strength_threshold);
    let spectrum = py.allow_threads(|| -> Result<_> {
        let geometry = atmosphere.geometry(radius_bottom, gravity_bottom)?;
        let atmosphere = atmosphere.with_gravity_profile(geometry.gravity().to_vec())?;
        let xs = CrossSectionAssembler::new(&line_list, &grid, config)?
            .xsmatrix(atmosphere.layers(), &partition)?;
        let dtau = OpticalDepthBuilder::new(&atmosphere, &grid)
            .add_lines(&xs, vmr)?
            .build()?;
        transmission_spectrum(&geometry, &dtau)
    })?;
    Ok(spectrum.radius_squared().to_pyarray(py))
}

/// Compute thermal emission spectra for a batch of atmospheres.
///
/// `nu_grid` is the wavenumber grid in cm⁻¹, shape (`num_bins`, ).
///
/// `lines` has shape (`num_lines`, 7) with columns: center (cm⁻¹),
/// reference strength (cm/molecule), lower state energy (cm⁻¹), air width and
/// self width (cm⁻¹/atm), temperature exponent, pressure shift (cm⁻¹/atm).
/// `isotope_id` gives the isotope of each line.
///
/// `isotopes` and `molar_mass` (g/mol) have shape (`num_isotopes`, ); the
/// partition functions are tabulated as `partition_values` with shape
/// (`num_isotopes`, `num_temps`) over `partition_temperature` (K).
///
/// The atmosphere has log-spaced layers from `pressure_top` to
/// `pressure_bottom` (bar). `temperature` (K) and `vmr` of the absorber have
/// shape (`num_points`, `num_layers`), top to bottom. The surface radiates as
/// a blackbody at the bottom layer temperature.
///
/// The returned spectra are each dimensioned as (`num_points`, `num_bins`).
///
/// The number of worker threads is controlled by `num_threads`. It must be a
/// positive integer, or `None` to automatically choose the number of threads.
#[pyfunction]
#[pyo3(signature = (nu_grid, lines, isotope_id, isotopes, molar_mass, partition_temperature, partition_values, pressure_top, pressure_bottom, temperature, vmr, gravity, mean_molecular_weight, wing_cutoff=25.0, strength_threshold=0.0, two_stream=true, num_threads=None))]
#[allow(clippy::too_many_arguments)]
fn compute_emission(
    py: Python<'_>,
    nu_grid: PyReadonlyArray1<'_, f64>,
    lines: PyReadonlyArray2<'_, f64>,
    isotope_id: PyReadonlyArray1<'_, u16>,
    isotopes: PyReadonlyArray1<'_, u16>,
    molar_mass: PyReadonlyArray1<'_, f64>,
    partition_temperature: PyReadonlyArray1<'_, f64>,
    partition_values: PyReadonlyArray2<'_, f64>,
    pressure_top: f64,
    pressure_bottom: f64,
    temperature: PyReadonlyArray2<'_, f64>,
    vmr: PyReadonlyArray2<'_, f64>,
    gravity: f64,
    mean_molecular_weight: f64,
    wing_cutoff: f64,
    strength_threshold: f64,
    two_stream: bool,
    num_threads: Option<usize>,
) -> PyResult<EmissionResults> {
    let [num_points, num_layers] = [temperature.shape()[0], temperature.shape()[1]];
    if vmr.dims() != [num_points, num_layers] {
        return Err(LblError::InconsistentInputs {
            what: "mixing ratio rows",
            expected: num_points,
            found: vmr.shape()[0],
        }
        .into());
    }
    debug!("input shapes are consistent");

    let grid = WavenumberGrid::from_values(nu_grid.as_slice()?.to_vec())?;
    let num_bins = grid.len();
    let (line_list, partition) = line_inputs(
        &lines,
        &isotope_id,
        &isotopes,
        &molar_mass,
        &partition_temperature,
        &partition_values,
    )?;
    let assembler = CrossSectionAssembler::new(
        &line_list,
        &grid,
        assembler_config(wing_cutoff, strength_threshold),
    )?;
    let scheme = if two_stream {
        TransferScheme::TwoStream
    } else {
        TransferScheme::Direct { mu: 1.0 }
    };
    let rt = RadiativeTransfer::new(scheme)?;

    let temperature = temperature.as_array();
    let vmr = vmr.as_array();

    let mut results = Vec::new();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.unwrap_or(0))
        .build()
        .map_err(|e| PyValueError::new_err(e.to_string()))?;

    // How many points have finished, and whether to stop early
    let num_completed = AtomicUsize::new(0);
    let cancelled = AtomicBool::new(false);

    info!("Computing emission for {num_points} profiles, {num_layers} layers, {num_bins} bins");

    pool.in_place_scope(|s| -> PyResult<()> {
        s.spawn(|_| {
            (0..num_points)
                .into_par_iter()
                .map(|point| -> Result<_> {
                    if cancelled.load(Ordering::Relaxed) {
                        return Err(LblError::Cancelled);
                    }

                    let temps = temperature.index_axis(Axis(0), point).to_vec();
                    let mixing = vmr.index_axis(Axis(0), point).to_vec();
                    let atmosphere = Atmosphere::logspace(
                        pressure_top,
                        pressure_bottom,
                        &temps,
                        &mixing,
                        gravity,
                        mean_molecular_weight,
                    )?;

                    let xs = assembler.xsmatrix(atmosphere.layers(), &partition)?;
                    let dtau = OpticalDepthBuilder::new(&atmosphere, &grid)
                        .add_lines(&xs, &mixing)?
                        .build()?;
                    let boundary =
                        BoundaryConditions::blackbody_surface(atmosphere.bottom_temperature(), &grid)?;
                    rt.solve_atmosphere(&atmosphere, &grid, &dtau, &boundary)
                })
                .inspect(|_| {
                    num_completed.fetch_add(1, Ordering::Relaxed);
                })
                .collect_into_vec(&mut results);
        });

        // The work happens in the pool; here in the main thread, report
        // progress and check for early cancellation
        while !cancelled.load(Ordering::Relaxed) {
            if let Err(e) = py.check_signals() {
                cancelled.store(true, Ordering::Relaxed);
                return Err(e);
            }

            let num_completed = num_completed.load(Ordering::Relaxed);
            let progress = num_completed as f64 / num_points.max(1) as f64 * 100.;
            info!("Completed {num_completed}/{num_points} profiles ({progress:0.2}%)");

            if num_completed == num_points {
                break;
            }

            py.allow_threads(|| {
                std::thread::sleep(Duration::from_millis(500));
            });
        }

        Ok(())
    })?;

    debug!("copying emission output");
    let mut output = EmissionResults::new(num_points, num_bins);
    results
        .into_iter()
        .enumerate()
        .try_for_each(|(index, outputs)| -> Result<()> {
            let outputs = outputs?;
            output
                .emergent
                .index_axis_mut(Axis(0), index)
                .assign(&outputs.emergent.values());
            output
                .transmission
                .index_axis_mut(Axis(0), index)
                .assign(&outputs.transmission);
            Ok(())
        })?;

    Ok(output)
}

/// A Python module implemented in Rust.
#[pymodule]
fn lbl_rtm(m: &Bound<'_, PyModule>) -> PyResult<()> {
    pyo3_log::init();

    m.add_function(wrap_pyfunction!(compute_emission, m)?)?;
    m.add_function(wrap_pyfunction!(compute_transmission, m)?)?;
    m.add_function(wrap_pyfunction!(compute_xsmatrix, m)?)?;
    m.add_function(wrap_pyfunction!(voigt, m)?)?;
    m.add_class::<EmissionResults>()?;
    Ok(())
}
