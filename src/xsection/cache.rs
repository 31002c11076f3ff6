//! Explicit memo of per-layer cross sections.

use std::collections::HashMap;

use ndarray::Array1;
use smallvec::SmallVec;

use crate::atmosphere::AtmosphereLayer;
use crate::error::{LblError, Result};

/// Exact bit patterns of everything a layer contributes to its cross
/// section: (pressure, temperature, vmr_self) and the partition function
/// ratio `Q(T_ref) / Q(T)` of each isotope in the line list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct LayerKey {
    state: [u64; 3],
    partition: SmallVec<[(u16, u64); 8]>,
}

impl LayerKey {
    /// Key of `layer` given `(isotope, Q ratio)` pairs in isotope order.
    pub(crate) fn new(layer: &AtmosphereLayer, q_ratios: impl IntoIterator<Item = (u16, f64)>) -> Self {
        Self {
            state: [
                layer.pressure.to_bits(),
                layer.temperature.to_bits(),
                layer.vmr_self.to_bits(),
            ],
            partition: q_ratios
                .into_iter()
                .map(|(isotope_id, ratio)| (isotope_id, ratio.to_bits()))
                .collect(),
        }
    }
}

/// Memo of per-layer cross sections, keyed by the exact layer state and the
/// partition function values at that state.
///
/// A cache is tied to the line list, grid and assembler configuration of the
/// first assembler that uses it; [`clear`](Self::clear) releases it. Reusing
/// it with another partition function is safe: layers whose `Q` ratios differ
/// are recomputed.
#[derive(Debug, Clone, Default)]
pub struct CrossSectionCache {
    fingerprint: Option<u64>,
    entries: HashMap<LayerKey, Array1<f64>>,
}

impl CrossSectionCache {
    /// Empty, unbound cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached layers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries and the binding to an assembler.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.fingerprint = None;
    }

    pub(crate) fn bind(&mut self, fingerprint: u64) -> Result<()> {
        match self.fingerprint {
            None => {
                self.fingerprint = Some(fingerprint);
                Ok(())
            }
            Some(bound) if bound == fingerprint => Ok(()),
            Some(_) => Err(LblError::CacheMismatch),
        }
    }

    pub(crate) fn contains(&self, key: &LayerKey) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn get(&self, key: &LayerKey) -> Option<&Array1<f64>> {
        self.entries.get(key)
    }

    pub(crate) fn insert(&mut self, key: LayerKey, cross_section: Array1<f64>) {
        self.entries.insert(key, cross_section);
    }
}
