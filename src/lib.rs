//! Line-by-line molecular opacity and radiative transfer
//!
//! The pipeline runs from a normalized line list to an emergent spectrum:
//!
//! 1. [`broadening`] resolves each [`linelist::SpectralLine`] at the
//!    conditions of an [`atmosphere::AtmosphereLayer`]
//! 2. [`xsection`] accumulates Voigt profiles ([`profile`], built on the
//!    Faddeeva kernel in [`special`]) into cross sections on a
//!    [`grid::WavenumberGrid`]
//! 3. [`opacity`] turns cross sections and collision-induced absorption
//!    ([`continuum`]) into layer optical depths
//! 4. [`rtransfer`] integrates thermal emission ([`planck`]) through the
//!    layers, and [`transit`] turns the same optical depths into a
//!    transmission spectrum along limb chords
//!
//! Everything is a pure function of its inputs. Parallelism uses the global
//! `rayon` pool. The `python` feature adds a `pyo3` extension module.

pub mod atmosphere;
pub mod broadening;
pub mod constants;
pub mod continuum;
pub mod error;
pub mod grid;
pub mod linelist;
pub mod opacity;
pub mod partition;
pub mod planck;
pub mod profile;
pub mod rtransfer;
pub mod special;
pub mod transit;
pub mod xsection;

mod interp;
#[cfg(feature = "python")]
mod python;

pub use crate::atmosphere::{Atmosphere, AtmosphereLayer, LayerGeometry};
pub use crate::broadening::{BroadeningParameters, BroadeningResolver, ResolvedLines};
pub use crate::continuum::{CiaTable, ContinuumProvider, HMinusContinuum};
pub use crate::error::{LblError, Result};
pub use crate::grid::{GridSpacing, WavenumberGrid};
pub use crate::interp::ExtrapolationPolicy;
pub use crate::linelist::{LineList, LineListSource, SpectralLine};
pub use crate::opacity::{OpticalDepthBuilder, OpticalDepthMatrix};
pub use crate::partition::{
    FnPartitionFunction, PartitionCurve, PartitionFunction, TabulatedPartitionFunction,
};
pub use crate::rtransfer::{
    BoundaryConditions, EmergentSpectrum, RadiativeTransfer, TransferOutputs, TransferScheme,
};
pub use crate::transit::{transmission_spectrum, TransmissionSpectrum};
pub use crate::xsection::{
    AssemblerConfig, CrossSectionAssembler, CrossSectionCache, CrossSectionMatrix, MemoryEstimate,
    WindowLookup,
};
