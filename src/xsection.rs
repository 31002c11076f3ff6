//! Cross-section assembly.
//!
//! For each layer, every line is resolved at the layer conditions and its
//! Voigt profile, scaled by the temperature-corrected line strength, is added
//! to the grid bins within `wing_cutoff` Voigt half widths of the shifted line
//! center. Lines whose peak contribution is below `strength_threshold` times
//! the strongest peak in the layer are dropped.
//!
//! # Memory
//!
//! For `L` layers, `B` grid bins, `N` lines and `T` worker threads, assembly
//! holds:
//!
//! - the output, `8 L B` bytes (vector mode: `8 B`)
//! - resolved line columns for each layer in flight, about `48 N` bytes per
//!   layer, with `min(L, T)` layers in flight
//! - two block buffers of `block_size` values per thread
//!
//! The dense `N x B` line-by-bin matrix is never materialized; the number of
//! profile evaluations is bounded by the sum over kept lines of their window
//! widths in bins. [`CrossSectionAssembler::estimate_memory`] reports this
//! before anything is allocated, and a configured `memory_budget` is checked
//! against it.
//!
//! The output is deterministic: each bin sums its lines in order of
//! increasing line center regardless of how work is split across threads.

mod cache;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::Range;

use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;

use crate::atmosphere::{validate_pressure_order, AtmosphereLayer};
use crate::broadening::{BroadeningResolver, ResolvedLines};
use crate::constants::{P_REF_BAR, T_REF};
use crate::error::{LblError, Result};
use crate::grid::WavenumberGrid;
use crate::linelist::LineList;
use crate::partition::PartitionFunction;
use crate::profile::{voigt, voigt_batch, voigt_hwhm};

pub use self::cache::CrossSectionCache;
use self::cache::LayerKey;

/// Bytes of resolved line data held per line per layer in flight.
const BYTES_PER_RESOLVED_LINE: usize = 48;

/// How the grid bins inside a line's wing window are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WindowLookup {
    /// Binary search on the grid values; works on any grid
    #[default]
    Search,
    /// Direct index arithmetic; requires a uniformly spaced linear grid
    UniformIndex,
}

/// Tunable accuracy/cost parameters of the assembler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblerConfig {
    /// Half width of each line's evaluation window, in Voigt half widths
    /// (HWHM). Larger values lose less of the Lorentz wings and cost more.
    pub wing_cutoff: f64,
    /// Lines whose peak cross section is below this fraction of the strongest
    /// peak in the layer are dropped. Zero keeps every line.
    pub strength_threshold: f64,
    /// Refuse assembly whose estimated footprint exceeds this many bytes
    pub memory_budget: Option<usize>,
    /// How line windows are mapped to grid bins
    pub window_lookup: WindowLookup,
    /// Reference temperature of the line list in K
    pub reference_temperature: f64,
    /// Reference pressure of the broadening widths in bar
    pub reference_pressure: f64,
    /// Number of grid bins per parallel work item
    pub block_size: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            wing_cutoff: 25.0,
            strength_threshold: 0.0,
            memory_budget: None,
            window_lookup: WindowLookup::Search,
            reference_temperature: T_REF,
            reference_pressure: P_REF_BAR,
            block_size: 1024,
        }
    }
}

impl AssemblerConfig {
    /// Check the parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.wing_cutoff > 0.0 && self.wing_cutoff.is_finite()) {
            return Err(LblError::InvalidParameter {
                name: "wing_cutoff",
                reason: "must be positive and finite",
            });
        }
        if !(0.0..1.0).contains(&self.strength_threshold) {
            return Err(LblError::InvalidParameter {
                name: "strength_threshold",
                reason: "must be within [0, 1)",
            });
        }
        if self.block_size == 0 {
            return Err(LblError::InvalidParameter {
                name: "block_size",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

/// Estimated memory footprint of an assembly call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryEstimate {
    /// Bytes of the output cross sections
    pub output_bytes: usize,
    /// Bytes of per-layer and per-thread scratch space
    pub scratch_bytes: usize,
}

impl MemoryEstimate {
    /// Total estimated bytes.
    pub fn total(&self) -> usize {
        self.output_bytes.saturating_add(self.scratch_bytes)
    }
}

/// Cross sections in cm²/molecule, one row per layer and one column per grid
/// bin.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossSectionMatrix {
    data: Array2<f64>,
}

impl CrossSectionMatrix {
    /// Wrap a (`num_layers`, `num_bins`) array of non-negative cross sections.
    pub fn from_array(data: Array2<f64>) -> Result<Self> {
        if data.iter().any(|&x| !(x >= 0.0 && x.is_finite())) {
            return Err(LblError::InvalidParameter {
                name: "cross section",
                reason: "must be non-negative and finite",
            });
        }
        Ok(Self { data })
    }

    /// Read-only view of the whole matrix.
    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    /// Cross sections of one layer.
    pub fn row(&self, layer: usize) -> ArrayView1<'_, f64> {
        self.data.row(layer)
    }

    /// Number of layers (rows).
    pub fn num_layers(&self) -> usize {
        self.data.nrows()
    }

    /// Number of grid bins (columns).
    pub fn num_bins(&self) -> usize {
        self.data.ncols()
    }

    /// Take the underlying array.
    pub fn into_inner(self) -> Array2<f64> {
        self.data
    }
}

/// A kept line with its evaluation window.
#[derive(Debug, Clone, Copy)]
struct LineWindow {
    center: f64,
    strength: f64,
    sigma: f64,
    gamma: f64,
    half_width: f64,
}

/// Assembles cross sections of one line list on one grid.
#[derive(Debug, Clone)]
pub struct CrossSectionAssembler<'a> {
    lines: &'a LineList,
    grid: &'a WavenumberGrid,
    config: AssemblerConfig,
    resolver: BroadeningResolver,
    /// Grid step, when window lookup uses index arithmetic
    uniform_step: Option<f64>,
}

impl<'a> CrossSectionAssembler<'a> {
    /// Prepare an assembler.
    ///
    /// With [`WindowLookup::UniformIndex`] the grid must be uniformly spaced
    /// in wavenumber, otherwise [`LblError::NonUniformGrid`] is returned.
    pub fn new(lines: &'a LineList, grid: &'a WavenumberGrid, config: AssemblerConfig) -> Result<Self> {
        config.validate()?;
        let resolver = BroadeningResolver::new(config.reference_temperature, config.reference_pressure)?;
        let uniform_step = match config.window_lookup {
            WindowLookup::Search => None,
            WindowLookup::UniformIndex => Some(grid.require_linear()?),
        };
        Ok(Self {
            lines,
            grid,
            config,
            resolver,
            uniform_step,
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Resolver used for line parameters.
    pub fn resolver(&self) -> &BroadeningResolver {
        &self.resolver
    }

    /// Estimated footprint of assembling `num_layers` layers.
    pub fn estimate_memory(&self, num_layers: usize) -> MemoryEstimate {
        let threads = rayon::current_num_threads().max(1);
        let in_flight = num_layers.min(threads);
        let output_bytes = num_layers
            .saturating_mul(self.grid.len())
            .saturating_mul(std::mem::size_of::<f64>());
        let line_bytes = in_flight
            .saturating_mul(self.lines.len())
            .saturating_mul(BYTES_PER_RESOLVED_LINE);
        let block_bytes = threads
            .saturating_mul(self.config.block_size)
            .saturating_mul(2 * std::mem::size_of::<f64>());
        MemoryEstimate {
            output_bytes,
            scratch_bytes: line_bytes.saturating_add(block_bytes),
        }
    }

    fn check_budget(&self, num_layers: usize) -> Result<()> {
        let estimate = self.estimate_memory(num_layers);
        debug!(
            "estimated assembly footprint: {} bytes output, {} bytes scratch",
            estimate.output_bytes, estimate.scratch_bytes
        );
        match self.config.memory_budget {
            Some(budget) if estimate.total() > budget => Err(LblError::MemoryBudgetExceeded {
                required: estimate.total(),
                budget,
            }),
            _ => Ok(()),
        }
    }

    /// Cross sections of a single layer (vector mode).
    pub fn xsvector(&self, layer: &AtmosphereLayer, partition: &dyn PartitionFunction) -> Result<Array1<f64>> {
        layer.validate()?;
        self.check_budget(1)?;
        info!(
            "Assembling cross sections for {} lines on {} bins at {} bar, {} K",
            self.lines.len(),
            self.grid.len(),
            layer.pressure,
            layer.temperature
        );

        let mut out = vec![0.0; self.grid.len()];
        self.fill_layer(layer, partition, &mut out)?;
        Ok(Array1::from(out))
    }

    /// Cross sections of every layer (matrix mode).
    ///
    /// `layers` must be ordered top to bottom with strictly increasing
    /// pressure.
    pub fn xsmatrix(
        &self,
        layers: &[AtmosphereLayer],
        partition: &dyn PartitionFunction,
    ) -> Result<CrossSectionMatrix> {
        validate_pressure_order(layers)?;
        self.check_budget(layers.len())?;
        info!(
            "Assembling cross sections for {} lines, {} layers, {} bins",
            self.lines.len(),
            layers.len(),
            self.grid.len()
        );

        let num_bins = self.grid.len();
        let mut data = vec![0.0; layers.len() * num_bins];
        data.par_chunks_mut(num_bins)
            .zip(layers)
            .try_for_each(|(row, layer)| self.fill_layer(layer, partition, row))?;

        self.into_matrix(layers.len(), data)
    }

    /// Matrix mode with memoization of per-layer results in `cache`.
    ///
    /// The cache binds to this assembler's line list, grid and configuration
    /// on first use and returns [`LblError::CacheMismatch`] if reused with
    /// different ones. Layers are looked up by their state and by the
    /// partition function values `partition` gives at that state.
    pub fn xsmatrix_cached(
        &self,
        cache: &mut CrossSectionCache,
        layers: &[AtmosphereLayer],
        partition: &dyn PartitionFunction,
    ) -> Result<CrossSectionMatrix> {
        validate_pressure_order(layers)?;
        cache.bind(self.fingerprint())?;

        let keys = layers
            .iter()
            .map(|layer| self.layer_key(layer, partition))
            .collect::<Result<Vec<_>>>()?;
        let missing: Vec<(&AtmosphereLayer, &LayerKey)> = layers
            .iter()
            .zip(&keys)
            .filter(|(_, key)| !cache.contains(key))
            .collect();
        debug!(
            "cross-section cache: {} of {} layers cached",
            layers.len() - missing.len(),
            layers.len()
        );
        self.check_budget(missing.len().max(1))?;

        let computed = missing
            .par_iter()
            .map(|&(layer, key)| {
                let mut out = vec![0.0; self.grid.len()];
                self.fill_layer(layer, partition, &mut out)?;
                Ok((key.clone(), Array1::from(out)))
            })
            .collect::<Result<Vec<_>>>()?;
        for (key, xs) in computed {
            cache.insert(key, xs);
        }

        let num_bins = self.grid.len();
        let mut data = Vec::with_capacity(layers.len() * num_bins);
        for key in &keys {
            let row = cache.get(key).ok_or(LblError::CacheMismatch)?;
            data.extend(row.iter().copied());
        }
        self.into_matrix(layers.len(), data)
    }

    /// Cross sections from already resolved lines, bypassing the broadening
    /// resolver.
    pub fn xsvector_resolved(&self, resolved: &ResolvedLines) -> Result<Array1<f64>> {
        resolved.validate()?;
        self.check_budget(1)?;
        let mut out = vec![0.0; self.grid.len()];
        self.accumulate(resolved, &mut out)?;
        Ok(Array1::from(out))
    }

    fn into_matrix(&self, num_layers: usize, data: Vec<f64>) -> Result<CrossSectionMatrix> {
        let found = data.len();
        let data = Array2::from_shape_vec((num_layers, self.grid.len()), data).map_err(|_| {
            LblError::InconsistentInputs {
                what: "cross-section matrix size",
                expected: num_layers * self.grid.len(),
                found,
            }
        })?;
        Ok(CrossSectionMatrix { data })
    }

    fn fill_layer(
        &self,
        layer: &AtmosphereLayer,
        partition: &dyn PartitionFunction,
        out: &mut [f64],
    ) -> Result<()> {
        let resolved = self.resolver.resolve_layer(self.lines, layer, partition)?;
        self.accumulate(&resolved, out)
    }

    /// Apply the masking policy and build the evaluation windows, sorted by
    /// line center.
    fn windows(&self, resolved: &ResolvedLines) -> Vec<LineWindow> {
        let peaks: Vec<f64> = (0..resolved.len())
            .map(|i| resolved.strength[i] * voigt(0.0, resolved.sigma[i], resolved.gamma[i]))
            .collect();
        let max_peak = peaks.iter().copied().fold(0.0, f64::max);
        let cut = self.config.strength_threshold * max_peak;

        let mut windows: Vec<LineWindow> = (0..resolved.len())
            .filter(|&i| peaks[i] > 0.0 && peaks[i] >= cut)
            .map(|i| LineWindow {
                center: resolved.center[i],
                strength: resolved.strength[i],
                sigma: resolved.sigma[i],
                gamma: resolved.gamma[i],
                half_width: self.config.wing_cutoff * voigt_hwhm(resolved.sigma[i], resolved.gamma[i]),
            })
            .collect();
        debug!(
            "masking kept {} of {} lines (threshold {:e})",
            windows.len(),
            resolved.len(),
            self.config.strength_threshold
        );

        windows.sort_by(|a, b| a.center.total_cmp(&b.center));
        windows
    }

    /// Grid bins covered by a line's window.
    fn window_bins(&self, window: &LineWindow) -> Range<usize> {
        let (lo, hi) = (window.center - window.half_width, window.center + window.half_width);
        match self.uniform_step {
            None => self.grid.index_range(lo, hi),
            Some(step) => {
                let num_bins = self.grid.len();
                let origin = self.grid.values()[0];
                let start = ((lo - origin) / step).ceil().max(0.0);
                let end = ((hi - origin) / step).floor() + 1.0;
                let start = (start as usize).min(num_bins);
                let end = (end.max(0.0) as usize).min(num_bins);
                start..end.max(start)
            }
        }
    }

    /// Add the profiles of `resolved` lines into `out`, one grid block at a
    /// time.
    fn accumulate(&self, resolved: &ResolvedLines, out: &mut [f64]) -> Result<()> {
        let windows = self.windows(resolved);
        if windows.is_empty() {
            return Ok(());
        }
        let max_half_width = windows.iter().map(|w| w.half_width).fold(0.0, f64::max);
        let grid = self.grid.values();
        let block_size = self.config.block_size;

        out.par_chunks_mut(block_size)
            .enumerate()
            .try_for_each(|(block, chunk)| -> Result<()> {
                let start = block * block_size;
                let end = start + chunk.len();
                let (lo, hi) = (grid[start], grid[end - 1]);

                let first = windows.partition_point(|w| w.center < lo - max_half_width);
                let last = windows.partition_point(|w| w.center <= hi + max_half_width);

                let mut offsets = Vec::with_capacity(chunk.len());
                let mut profile = Vec::with_capacity(chunk.len());
                for window in &windows[first..last] {
                    let bins = self.window_bins(window);
                    let (s, e) = (bins.start.max(start), bins.end.min(end));
                    if s >= e {
                        continue;
                    }

                    offsets.clear();
                    offsets.extend(grid[s..e].iter().map(|nu| nu - window.center));
                    profile.resize(e - s, 0.0);
                    voigt_batch(&offsets, window.sigma, window.gamma, &mut profile)?;

                    for (value, p) in chunk[s - start..e - start].iter_mut().zip(&profile) {
                        *value += window.strength * p;
                    }
                }
                Ok(())
            })
    }

    /// Cache key of `layer`, including the partition function ratio of
    /// every isotope the lines use.
    fn layer_key(&self, layer: &AtmosphereLayer, partition: &dyn PartitionFunction) -> Result<LayerKey> {
        layer.validate()?;
        let q_ratios = self
            .lines
            .line_isotopes()
            .iter()
            .map(|&isotope_id| {
                let ratio = self
                    .resolver
                    .partition_ratio(partition, isotope_id, layer.temperature)?;
                Ok((isotope_id, ratio))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(LayerKey::new(layer, q_ratios))
    }

    /// Hash of everything a cached cross section depends on besides the
    /// layer state and partition function.
    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for nu in self.grid.values() {
            nu.to_bits().hash(&mut hasher);
        }
        for line in self.lines.lines() {
            for value in [
                line.center_wavenumber,
                line.reference_line_strength,
                line.lower_state_energy,
                line.air_broadening_width_ref,
                line.self_broadening_width_ref,
                line.temperature_exponent,
                line.pressure_shift,
            ] {
                value.to_bits().hash(&mut hasher);
            }
            line.isotope_id.hash(&mut hasher);
        }
        for isotope_id in self.lines.isotopes() {
            isotope_id.hash(&mut hasher);
            if let Ok(mass) = self.lines.molar_mass(isotope_id) {
                mass.to_bits().hash(&mut hasher);
            }
        }
        for value in [
            self.config.wing_cutoff,
            self.config.strength_threshold,
            self.config.reference_temperature,
            self.config.reference_pressure,
        ] {
            value.to_bits().hash(&mut hasher);
        }
        self.config.window_lookup.hash(&mut hasher);
        hasher.finish()
    }
}

/// Assemble the cross-section matrix of `lines` on `grid` for every layer.
pub fn assemble(
    lines: &LineList,
    grid: &WavenumberGrid,
    layers: &[AtmosphereLayer],
    partition: &dyn PartitionFunction,
    config: AssemblerConfig,
) -> Result<CrossSectionMatrix> {
    CrossSectionAssembler::new(lines, grid, config)?.xsmatrix(layers, partition)
}
