//! Error types.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LblError>;

/// Possible opacity and radiative-transfer errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LblError {
    /// The wavenumber grid is not strictly increasing
    #[error("wavenumber grid is not strictly increasing at index {index}")]
    NonMonotonicGrid {
        /// First index where `grid[index] <= grid[index - 1]`
        index: usize,
    },
    /// The wavenumber grid has fewer than two points
    #[error("wavenumber grid needs at least 2 points, got {len}")]
    GridTooShort {
        /// Number of points supplied
        len: usize,
    },
    /// A uniform grid was required but the sampling is irregular
    #[error("wavenumber grid is not uniformly sampled (relative spacing deviation {deviation:e})")]
    NonUniformGrid {
        /// Largest relative deviation from the mean spacing
        deviation: f64,
    },
    /// A temperature was zero, negative, or not finite
    #[error("temperature must be positive and finite, got {0} K")]
    NonPositiveTemperature(f64),
    /// A pressure was zero, negative, or not finite
    #[error("pressure must be positive and finite, got {0} bar")]
    NonPositivePressure(f64),
    /// Layer pressures are not strictly increasing from top to bottom
    #[error("layer pressures must increase strictly from top to bottom (layer {index})")]
    NonMonotonicPressure {
        /// First layer index that breaks the ordering
        index: usize,
    },
    /// Array inputs do not have the expected shapes
    #[error("inconsistent {what}: expected {expected}, found {found}")]
    InconsistentInputs {
        /// Which input was inspected
        what: &'static str,
        /// Expected length
        expected: usize,
        /// Actual length
        found: usize,
    },
    /// A spectral line violates the line-list invariants
    #[error("invalid spectral line {index}: {reason}")]
    InvalidLine {
        /// Row in the line list
        index: usize,
        /// Which invariant failed
        reason: &'static str,
    },
    /// A configuration or physical parameter is out of range
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Which constraint failed
        reason: &'static str,
    },
    /// No molar mass or partition function is known for an isotope
    #[error("unknown isotope id {0}")]
    UnknownIsotope(u16),
    /// The atmosphere has no layers
    #[error("atmosphere has no layers")]
    EmptyAtmosphere,
    /// The Faddeeva kernel was evaluated below the real axis
    #[error("Faddeeva argument {x} + {y}i lies in the lower half-plane")]
    LowerHalfPlane {
        /// Real part of the argument
        x: f64,
        /// Imaginary part of the argument
        y: f64,
    },
    /// A partition function was requested outside its tabulated range
    #[error("partition function for isotope {isotope} requested at {temperature} K, outside [{min}, {max}] K")]
    PartitionOutOfRange {
        /// Isotope id
        isotope: u16,
        /// Requested temperature
        temperature: f64,
        /// Lowest tabulated temperature
        min: f64,
        /// Highest tabulated temperature
        max: f64,
    },
    /// A continuum table was requested outside its tabulated temperature range
    #[error("CIA table {pair} requested at {temperature} K, outside [{min}, {max}] K")]
    ContinuumOutOfRange {
        /// Colliding pair label, e.g. `H2-H2`
        pair: String,
        /// Requested temperature
        temperature: f64,
        /// Lowest tabulated temperature
        min: f64,
        /// Highest tabulated temperature
        max: f64,
    },
    /// The requested computation would exceed the configured memory budget
    #[error("cross-section assembly needs ~{required} bytes, budget is {budget} bytes")]
    MemoryBudgetExceeded {
        /// Estimated bytes
        required: usize,
        /// Configured budget in bytes
        budget: usize,
    },
    /// A cache was reused with a different line list or grid
    #[error("cross-section cache was built for a different line list or grid")]
    CacheMismatch,
    /// A batch computation was interrupted before finishing
    #[error("computation was cancelled")]
    Cancelled,
}
