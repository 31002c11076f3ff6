//! Normalized spectral line table.
//!
//! Parsing HITRAN/HITEMP fixed-width files or ExoMol state/transition files
//! happens upstream; whatever the source, it ends up here as one
//! [`SpectralLine`] per transition plus the molar mass of every isotope.

use std::collections::BTreeMap;

use crate::error::{LblError, Result};

/// Which database a line list was ingested from.
///
/// This is informational only: nothing past ingestion depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineListSource {
    /// HITRAN
    Hitran,
    /// HITEMP, the high-temperature extension of HITRAN
    Hitemp,
    /// ExoMol. These lists carry no self-broadening, so the air (or
    /// H2/He) width is used for both coefficients.
    ExoMol,
}

/// A single transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralLine {
    /// Line center in cm⁻¹
    pub center_wavenumber: f64,
    /// Line strength at the reference temperature, cm/molecule
    pub reference_line_strength: f64,
    /// Lower state energy in cm⁻¹
    pub lower_state_energy: f64,
    /// Air (foreign) broadened HWHM at the reference conditions, cm⁻¹/atm
    pub air_broadening_width_ref: f64,
    /// Self broadened HWHM at the reference conditions, cm⁻¹/atm
    pub self_broadening_width_ref: f64,
    /// Temperature exponent of the broadening width
    pub temperature_exponent: f64,
    /// Air pressure shift of the line center, cm⁻¹/atm
    pub pressure_shift: f64,
    /// Isotope identifier, local to the molecule
    pub isotope_id: u16,
}

impl SpectralLine {
    /// Create a line without a pressure shift.
    pub fn new(
        center_wavenumber: f64,
        reference_line_strength: f64,
        lower_state_energy: f64,
        air_broadening_width_ref: f64,
        self_broadening_width_ref: f64,
        temperature_exponent: f64,
        isotope_id: u16,
    ) -> Self {
        Self {
            center_wavenumber,
            reference_line_strength,
            lower_state_energy,
            air_broadening_width_ref,
            self_broadening_width_ref,
            temperature_exponent,
            pressure_shift: 0.0,
            isotope_id,
        }
    }

    /// Set the air pressure shift in cm⁻¹/atm.
    pub fn with_pressure_shift(mut self, pressure_shift: f64) -> Self {
        self.pressure_shift = pressure_shift;
        self
    }

    fn validate(&self, index: usize) -> Result<()> {
        let invalid = |reason| Err(LblError::InvalidLine { index, reason });

        if !(self.center_wavenumber > 0.0 && self.center_wavenumber.is_finite()) {
            return invalid("center wavenumber must be positive");
        }
        if !(self.reference_line_strength >= 0.0 && self.reference_line_strength.is_finite()) {
            return invalid("line strength must be non-negative");
        }
        if !(self.air_broadening_width_ref >= 0.0
            && self.air_broadening_width_ref.is_finite()
            && self.self_broadening_width_ref >= 0.0
            && self.self_broadening_width_ref.is_finite())
        {
            return invalid("broadening widths must be finite and non-negative");
        }
        if !(self.lower_state_energy.is_finite()
            && self.temperature_exponent.is_finite()
            && self.pressure_shift.is_finite())
        {
            return invalid("line parameters must be finite");
        }
        Ok(())
    }
}

/// Read-only line table shared by the broadening resolver and the
/// cross-section assembler.
#[derive(Debug, Clone)]
pub struct LineList {
    source: LineListSource,
    lines: Vec<SpectralLine>,
    /// Molar mass in g/mol (equivalently, molecular mass in u) per isotope
    molar_masses: BTreeMap<u16, f64>,
    /// Sorted isotope ids that at least one line uses
    line_isotopes: Vec<u16>,
}

impl LineList {
    /// Validate and wrap a line table.
    ///
    /// Every line must satisfy the line invariants and every isotope used by
    /// a line must have a positive molar mass.
    pub fn new(
        source: LineListSource,
        lines: Vec<SpectralLine>,
        molar_masses: impl IntoIterator<Item = (u16, f64)>,
    ) -> Result<Self> {
        let molar_masses: BTreeMap<u16, f64> = molar_masses.into_iter().collect();
        if molar_masses.values().any(|&m| !(m > 0.0 && m.is_finite())) {
            return Err(LblError::InvalidParameter {
                name: "molar_mass",
                reason: "must be positive",
            });
        }

        for (index, line) in lines.iter().enumerate() {
            line.validate(index)?;
            if !molar_masses.contains_key(&line.isotope_id) {
                return Err(LblError::UnknownIsotope(line.isotope_id));
            }
        }

        let mut line_isotopes: Vec<u16> = lines.iter().map(|line| line.isotope_id).collect();
        line_isotopes.sort_unstable();
        line_isotopes.dedup();

        Ok(Self {
            source,
            lines,
            molar_masses,
            line_isotopes,
        })
    }

    /// Database the lines were ingested from.
    pub fn source(&self) -> LineListSource {
        self.source
    }

    /// All lines, in ingestion order.
    pub fn lines(&self) -> &[SpectralLine] {
        &self.lines
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the table has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Molar mass of an isotope in g/mol.
    pub fn molar_mass(&self, isotope_id: u16) -> Result<f64> {
        self.molar_masses
            .get(&isotope_id)
            .copied()
            .ok_or(LblError::UnknownIsotope(isotope_id))
    }

    /// Isotopes present in the table.
    pub fn isotopes(&self) -> impl Iterator<Item = u16> + '_ {
        self.molar_masses.keys().copied()
    }

    /// Isotopes used by at least one line, in increasing order.
    pub fn line_isotopes(&self) -> &[u16] {
        &self.line_isotopes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn co_line(center: f64) -> SpectralLine {
        SpectralLine::new(center, 1e-20, 100.0, 0.07, 0.08, 0.7, 1)
    }

    #[test]
    fn accepts_valid_lines() {
        let list = LineList::new(
            LineListSource::Hitran,
            vec![co_line(2000.0), co_line(2001.0).with_pressure_shift(-0.003)],
            [(1, 27.995)],
        )
        .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.source(), LineListSource::Hitran);
        assert_eq!(list.lines()[1].pressure_shift, -0.003);
        assert_eq!(list.molar_mass(1).unwrap(), 27.995);
        assert!(matches!(list.molar_mass(2), Err(LblError::UnknownIsotope(2))));
        assert_eq!(list.isotopes().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn rejects_invalid_lines() {
        let bad_center = LineList::new(LineListSource::ExoMol, vec![co_line(0.0)], [(1, 28.0)]);
        assert!(matches!(bad_center, Err(LblError::InvalidLine { index: 0, .. })));

        let mut negative = co_line(2000.0);
        negative.reference_line_strength = -1.0;
        let bad_strength =
            LineList::new(LineListSource::Hitemp, vec![co_line(10.0), negative], [(1, 28.0)]);
        assert!(matches!(bad_strength, Err(LblError::InvalidLine { index: 1, .. })));

        let missing_mass = LineList::new(LineListSource::Hitran, vec![co_line(10.0)], [(2, 28.0)]);
        assert_eq!(missing_mass.unwrap_err(), LblError::UnknownIsotope(1));
    }

    #[test]
    fn rejects_infinite_widths() {
        let mut air = co_line(2000.0);
        air.air_broadening_width_ref = f64::INFINITY;
        let mut own = co_line(2000.0);
        own.self_broadening_width_ref = f64::INFINITY;
        for (index, lines) in [(0, vec![air]), (1, vec![co_line(10.0), own])] {
            assert_eq!(
                LineList::new(LineListSource::Hitran, lines, [(1, 28.0)]).unwrap_err(),
                LblError::InvalidLine {
                    index,
                    reason: "broadening widths must be finite and non-negative"
                }
            );
        }
    }

    #[test]
    fn line_isotopes_are_sorted_and_used() {
        let mut rare = co_line(2002.0);
        rare.isotope_id = 3;
        let list = LineList::new(
            LineListSource::Hitemp,
            vec![rare, co_line(2000.0), co_line(2001.0)],
            [(1, 27.995), (2, 28.998), (3, 29.0)],
        )
        .unwrap();
        assert_eq!(list.line_isotopes(), &[1, 3]);
        assert_eq!(list.isotopes().count(), 3);
    }
}
