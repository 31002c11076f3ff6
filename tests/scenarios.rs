//! End-to-end scenarios through the public API.

use std::f64::consts::{FRAC_2_PI, SQRT_2};

use approx::assert_relative_eq;
use ndarray::array;

use lbl_rtm::constants::{C, K_B, M_U, P_REF_BAR, T_REF};
use lbl_rtm::profile::{voigt_fwhm, voigt_hwhm};
use lbl_rtm::rtransfer::emission_spectrum;
use lbl_rtm::transit::transmission_spectrum;
use lbl_rtm::{
    AssemblerConfig, Atmosphere, AtmosphereLayer, BoundaryConditions, CiaTable,
    CrossSectionAssembler, FnPartitionFunction, LineList, LineListSource, OpticalDepthBuilder,
    RadiativeTransfer, SpectralLine, TransferScheme, WavenumberGrid,
};

const CENTER: f64 = 2000.0;
const STRENGTH: f64 = 1e-20;
const DOPPLER_WIDTH: f64 = 0.01;
const LORENTZ_WIDTH: f64 = 0.005;

/// Molar mass that gives `DOPPLER_WIDTH` at `CENTER` and the reference
/// temperature.
fn scenario_molar_mass() -> f64 {
    2.0 * K_B * T_REF * (CENTER / (C * DOPPLER_WIDTH)).powi(2) / M_U
}

/// One line whose width at the reference conditions is exactly
/// `LORENTZ_WIDTH`.
fn scenario_lines() -> LineList {
    let line = SpectralLine::new(CENTER, STRENGTH, 500.0, LORENTZ_WIDTH, LORENTZ_WIDTH, 0.7, 1);
    LineList::new(LineListSource::Hitran, vec![line], [(1, scenario_molar_mass())]).unwrap()
}

fn constant_partition() -> FnPartitionFunction<impl Fn(u16, f64) -> f64 + Sync> {
    FnPartitionFunction(|_iso: u16, _t: f64| 100.0)
}

fn reference_layer() -> AtmosphereLayer {
    AtmosphereLayer::new(P_REF_BAR, T_REF, 0.0).unwrap()
}

#[test]
fn single_line_peak() {
    let grid = WavenumberGrid::linear(1999.0, 2001.0, 2001).unwrap();
    let lines = scenario_lines();
    let assembler = CrossSectionAssembler::new(&lines, &grid, AssemblerConfig::default()).unwrap();
    let xs = assembler.xsvector(&reference_layer(), &constant_partition()).unwrap();

    let (peak_index, peak) = xs
        .iter()
        .enumerate()
        .fold((0, 0.0), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
    assert_eq!(peak_index, 1000);
    assert_relative_eq!(grid.values()[peak_index], CENTER, max_relative = 1e-12);
    for k in 1..200 {
        assert_relative_eq!(xs[1000 - k], xs[1000 + k], max_relative = 1e-8);
    }

    let sigma = DOPPLER_WIDTH / SQRT_2;
    let fwhm = xs.iter().filter(|&&v| v >= 0.5 * peak).count() as f64 * 0.001;
    assert_relative_eq!(fwhm, voigt_fwhm(sigma, LORENTZ_WIDTH), max_relative = 0.05);
}

#[test]
fn integrated_strength_within_cutoff_bound() {
    let grid = WavenumberGrid::linear(1990.0, 2010.0, 20001).unwrap();
    let lines = scenario_lines();
    let layer = reference_layer();
    let pf = constant_partition();

    // Window wider than the grid: only the Lorentz tail beyond ±10 cm⁻¹ is lost
    let wide = AssemblerConfig {
        wing_cutoff: 2000.0,
        ..Default::default()
    };
    let xs = CrossSectionAssembler::new(&lines, &grid, wide)
        .unwrap()
        .xsvector(&layer, &pf)
        .unwrap();
    let integral = grid.integrate(xs.as_slice().unwrap()).unwrap();
    assert_relative_eq!(integral, STRENGTH, max_relative = 1e-3);

    // 25 half widths: the loss is the Lorentz mass outside the window
    let xs = CrossSectionAssembler::new(&lines, &grid, AssemblerConfig::default())
        .unwrap()
        .xsvector(&layer, &pf)
        .unwrap();
    let integral = grid.integrate(xs.as_slice().unwrap()).unwrap();
    let window = 25.0 * voigt_hwhm(DOPPLER_WIDTH / SQRT_2, LORENTZ_WIDTH);
    let tail = 1.0 - FRAC_2_PI * (window / LORENTZ_WIDTH).atan();
    let deficit = 1.0 - integral / STRENGTH;
    assert!(deficit > 0.0);
    assert_relative_eq!(deficit, tail, max_relative = 0.1);
}

fn hot_jupiter_lines() -> LineList {
    let lines = (0..40)
        .map(|i| {
            let center = 4000.0 + 0.37 * i as f64;
            let strength = 1e-21 * (1.0 + (i % 7) as f64);
            // Equal air and self widths keep the shape independent of the mixing ratio
            SpectralLine::new(center, strength, 300.0 + 50.0 * i as f64, 0.07, 0.07, 0.6, 1)
        })
        .collect();
    LineList::new(LineListSource::Hitemp, lines, [(1, 18.01)]).unwrap()
}

fn hot_jupiter_atmosphere(vmr: f64) -> Atmosphere {
    let temps = [900.0, 1000.0, 1150.0, 1300.0, 1500.0, 1700.0];
    Atmosphere::logspace(1e-4, 10.0, &temps, &[vmr; 6], 2478.57, 2.33).unwrap()
}

#[test]
fn assembly_is_idempotent() {
    let grid = WavenumberGrid::linear(3999.0, 4016.0, 3401).unwrap();
    let lines = hot_jupiter_lines();
    let atm = hot_jupiter_atmosphere(1e-3);
    let pf = FnPartitionFunction(|_iso: u16, t: f64| 0.2 * t.powf(1.5));

    let first = CrossSectionAssembler::new(&lines, &grid, AssemblerConfig::default())
        .unwrap()
        .xsmatrix(atm.layers(), &pf)
        .unwrap();
    let second = CrossSectionAssembler::new(&lines, &grid, AssemblerConfig::default())
        .unwrap()
        .xsmatrix(atm.layers(), &pf)
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn more_absorber_never_brightens_emission() {
    let grid = WavenumberGrid::linear(3999.0, 4016.0, 1701).unwrap();
    let lines = hot_jupiter_lines();
    let pf = FnPartitionFunction(|_iso: u16, t: f64| 0.2 * t.powf(1.5));
    let assembler = CrossSectionAssembler::new(&lines, &grid, AssemblerConfig::default()).unwrap();

    for scheme in [TransferScheme::TwoStream, TransferScheme::Direct { mu: 0.6 }] {
        let spectra: Vec<_> = [1e-5, 1e-4, 1e-3]
            .into_iter()
            .map(|vmr| {
                let atm = hot_jupiter_atmosphere(vmr);
                let xs = assembler.xsmatrix(atm.layers(), &pf).unwrap();
                let dtau = OpticalDepthBuilder::new(&atm, &grid)
                    .add_lines(&xs, &[vmr; 6])
                    .unwrap()
                    .build()
                    .unwrap();
                emission_spectrum(&atm, &grid, &dtau, scheme).unwrap()
            })
            .collect();
        for pair in spectra.windows(2) {
            for (more, less) in pair[1].values().iter().zip(pair[0].values()) {
                assert!(more <= less);
            }
        }
    }
}

#[test]
fn empty_top_layer_matches_bottom_only() {
    let grid = WavenumberGrid::linear(3999.0, 4016.0, 1701).unwrap();
    let lines = hot_jupiter_lines();
    let pf = FnPartitionFunction(|_iso: u16, t: f64| 0.2 * t.powf(1.5));
    let assembler = CrossSectionAssembler::new(&lines, &grid, AssemblerConfig::default()).unwrap();

    let top = AtmosphereLayer::new(0.01, 900.0, 0.0).unwrap();
    let bottom = AtmosphereLayer::new(1.0, 1400.0, 0.0).unwrap();
    let two = Atmosphere::new(vec![top, bottom], vec![0.01, 0.99], 2478.57, 2.33).unwrap();
    let one = Atmosphere::new(vec![bottom], vec![0.99], 2478.57, 2.33).unwrap();

    let boundary = BoundaryConditions::blackbody_surface(1400.0, &grid).unwrap();
    let solve = |atm: &Atmosphere, vmr: &[f64]| {
        let xs = assembler.xsmatrix(atm.layers(), &pf).unwrap();
        let dtau = OpticalDepthBuilder::new(atm, &grid)
            .add_lines(&xs, vmr)
            .unwrap()
            .build()
            .unwrap();
        RadiativeTransfer::new(TransferScheme::TwoStream)
            .unwrap()
            .solve_atmosphere(atm, &grid, &dtau, &boundary)
            .unwrap()
    };

    let layered = solve(&two, &[0.0, 1e-3]);
    let single = solve(&one, &[1e-3]);
    assert_eq!(layered.emergent, single.emergent);
    assert_eq!(layered.transmission, single.transmission);
}

#[test]
fn line_and_continuum_optical_depths_add() {
    let grid = WavenumberGrid::linear(3999.0, 4016.0, 341).unwrap();
    let lines = hot_jupiter_lines();
    let pf = FnPartitionFunction(|_iso: u16, t: f64| 0.2 * t.powf(1.5));
    let atm = hot_jupiter_atmosphere(1e-3);
    let cia = CiaTable::new(
        "H2-H2",
        vec![500.0, 1000.0, 2000.0],
        vec![3900.0, 4100.0],
        array![[-46.5, -46.0], [-46.0, -45.5], [-45.5, -45.0]],
    )
    .unwrap();
    let h2 = [0.84; 6];
    let xs = CrossSectionAssembler::new(&lines, &grid, AssemblerConfig::default())
        .unwrap()
        .xsmatrix(atm.layers(), &pf)
        .unwrap();

    let lines_only = OpticalDepthBuilder::new(&atm, &grid)
        .add_lines(&xs, &[1e-3; 6])
        .unwrap()
        .build()
        .unwrap();
    let cia_only = OpticalDepthBuilder::new(&atm, &grid)
        .add_cia(&cia, &h2, &h2)
        .unwrap()
        .build()
        .unwrap();
    let both = OpticalDepthBuilder::new(&atm, &grid)
        .add_lines(&xs, &[1e-3; 6])
        .unwrap()
        .add_cia(&cia, &h2, &h2)
        .unwrap()
        .build()
        .unwrap();

    assert!(cia_only.view().iter().all(|&x| x > 0.0));
    for ((a, b), c) in lines_only.view().iter().zip(cia_only.view()).zip(both.view()) {
        assert_relative_eq!(a + b, *c, max_relative = 1e-12);
    }

    // Continuum only ever dims the spectrum
    let with_cia = emission_spectrum(&atm, &grid, &both, TransferScheme::TwoStream).unwrap();
    let without = emission_spectrum(&atm, &grid, &lines_only, TransferScheme::TwoStream).unwrap();
    for (a, b) in with_cia.values().iter().zip(without.values()) {
        assert!(a <= b);
    }
}

#[test]
fn transit_radius_peaks_on_lines() {
    let grid = WavenumberGrid::linear(3999.0, 4016.0, 1701).unwrap();
    let lines = hot_jupiter_lines();
    let pf = FnPartitionFunction(|_iso: u16, t: f64| 0.2 * t.powf(1.5));
    let assembler = CrossSectionAssembler::new(&lines, &grid, AssemblerConfig::default()).unwrap();

    let temperature = [1200.0; 30];
    let vmr = [1e-3; 30];
    let (radius, gravity) = (7.1492e9, 2478.57);
    let atm = Atmosphere::logspace(1e-8, 10.0, &temperature, &vmr, gravity, 2.33).unwrap();
    let geometry = atm.geometry(radius, gravity).unwrap();
    let atm = atm.with_gravity_profile(geometry.gravity().to_vec()).unwrap();

    let xs = assembler.xsmatrix(atm.layers(), &pf).unwrap();
    let dtau = OpticalDepthBuilder::new(&atm, &grid)
        .add_lines(&xs, &vmr)
        .unwrap()
        .build()
        .unwrap();
    let spectrum = transmission_spectrum(&geometry, &dtau).unwrap();
    let transit = spectrum.radius();

    // The strongest line of the list sits at 4000 + 0.37 * 6
    let center = grid.index_range(4002.22, 4002.22).start;
    let continuum = grid.index_range(4015.5, 4015.5).start;
    assert!(transit[center] > transit[continuum]);
    assert!(transit.iter().all(|&r| r >= radius && r < geometry.boundary_radius()[0]));

    // More absorber raises the transit radius everywhere
    let richer = OpticalDepthBuilder::new(&atm, &grid)
        .add_lines(&xs, &[1e-2; 30])
        .unwrap()
        .build()
        .unwrap();
    let raised = transmission_spectrum(&geometry, &richer).unwrap().radius();
    for (a, b) in raised.iter().zip(transit.iter()) {
        assert!(a >= b);
    }
}
