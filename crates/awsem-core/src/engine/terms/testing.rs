//! Fixtures shared by the term tests: a jittered bundle of helices, parameter sets close to
//! the production coefficient file, and a finite-difference check of evaluated forces.

use super::FragmentSource;
use crate::core::backbone::virtual_atoms::BackboneFrame;
use crate::core::forcefield::coefficients::{
    AmhGoParams, BurialParams, ChainParams, ChiParams, CoefficientSet, ContactRestraintParams,
    DsspParams, ExcludedParams, GoCensoring, HelixParams, PApParams, RamaBasin, RamaParams,
    RepulsionProfile, SS_WEIGHT_BASINS, ShakeParams, SolventBarrierParams,
    VectorFragmentParams, VirtualSiteCoefficients, WaterParams, WaterWell,
};
use crate::core::forcefield::gamma::{BurialGamma, WaterGamma};
use crate::core::forcefield::params::ForceField;
use crate::core::forcefield::statistics::{HBondStatistics, SsWeights};
use crate::core::forcefield::term::EnergyVector;
use crate::core::models::forces::ForceBuffer;
use crate::core::models::ids::ParticleId;
use crate::core::models::particle::{Particle, ParticleKind};
use crate::core::models::residue::RESIDUE_TYPE_COUNT;
use crate::core::models::sequence::Sequence;
use crate::core::models::system::{ParticleSystem, SimulationBox};
use crate::core::topology::builder::build_topology;
use crate::core::topology::residue::ResidueTopology;
use crate::engine::comm::SerialComm;
use crate::engine::evaluator::Evaluator;
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const HELIX_RADIUS: f64 = 2.3;
const HELIX_RISE: f64 = 1.5;
/// 100 degrees per residue.
const HELIX_TURN: f64 = 1.745_329_251_994_329_5;
const CHAIN_SPACING: f64 = 10.0;
const JITTER: f64 = 0.25;

const FD_STEP: f64 = 1e-5;
const FD_TOLERANCE: f64 = 1e-4;

/// One ideal-ish helix per chain, axes parallel to z and `CHAIN_SPACING` apart, with every
/// coordinate jittered by a seeded generator. Glycines get no Cβ.
pub(crate) fn helix_bundle(sequence: &Sequence, seed: u64) -> ParticleSystem {
    helix_bundle_owned(sequence, seed, |_| true)
}

pub(crate) fn helix_bundle_owned(
    sequence: &Sequence,
    seed: u64,
    owned: impl Fn(usize) -> bool,
) -> ParticleSystem {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut system = ParticleSystem::new(SimulationBox::open());
    for i in 0..sequence.len() {
        let chain = sequence.chain_index(i).unwrap();
        let span = sequence.chain_span(i).unwrap();
        let k = (i - span.start) as f64;
        let angle = k * HELIX_TURN;
        let radial = Vector3::new(angle.cos(), angle.sin(), 0.0);
        let tangent = Vector3::new(-angle.sin(), angle.cos(), 0.0);
        let axis = Vector3::new(chain as f64 * CHAIN_SPACING, 0.0, 0.0);

        let ca = Point3::from(axis + HELIX_RADIUS * radial + Vector3::new(0.0, 0.0, k * HELIX_RISE));
        let cb = ca + 1.3 * radial + Vector3::new(0.0, 0.0, -0.8);
        let o = ca + 0.8 * radial + 1.2 * tangent + Vector3::new(0.0, 0.0, 1.6);

        let tag = i as isize + 1;
        for (kind, position) in [
            (ParticleKind::Alpha, ca),
            (ParticleKind::Beta, cb),
            (ParticleKind::Oxygen, o),
        ] {
            let jitter = Vector3::from_fn(|_, _| rng.gen_range(-JITTER..JITTER));
            if kind == ParticleKind::Beta && sequence.residues()[i].is_glycine() {
                continue;
            }
            let particle = Particle::new(kind, tag, chain as isize + 1, position + jitter);
            system.add_particle(if owned(i) { particle } else { particle.as_ghost() });
        }
    }
    system
}

/// Attaches synthetic but non-uniform tables for every active section.
pub(crate) fn forcefield(coefficients: CoefficientSet, sequence: &Sequence) -> ForceField {
    let water_gamma = coefficients.water.as_ref().map(|water| {
        let mut table = [[(0.0, 0.0); RESIDUE_TYPE_COUNT]; RESIDUE_TYPE_COUNT];
        for (a, row) in table.iter_mut().enumerate() {
            for (b, cell) in row.iter_mut().enumerate() {
                let s = (a + b) as f64;
                let direct = -0.3 + 0.02 * s;
                let mediated = if (a + b) % 7 == 0 { direct } else { 0.4 - 0.015 * s };
                *cell = (direct, mediated);
            }
        }
        WaterGamma::from_wells(vec![table; water.wells.len()])
    });
    let burial_gamma = coefficients.burial.map(|_| {
        let mut values = [[0.0; 3]; RESIDUE_TYPE_COUNT];
        for (t, row) in values.iter_mut().enumerate() {
            *row = [0.5 - 0.05 * t as f64, -0.3 + 0.02 * t as f64, 0.1];
        }
        BurialGamma::from_values(values)
    });
    let hbond = coefficients.dssp.map(|_| HBondStatistics::uniform(0.3, 0.2));
    let ss_weights = coefficients.ss_weight.map(|_| {
        SsWeights::from_rows(
            (0..sequence.len())
                .map(|i| {
                    let mut row = [0.0; SS_WEIGHT_BASINS];
                    for (j, value) in row.iter_mut().enumerate() {
                        *value = match (i + j) % 3 {
                            0 => 0.0,
                            1 => 0.5,
                            _ => 1.0,
                        };
                    }
                    row
                })
                .collect(),
        )
    });

    ForceField {
        coefficients,
        water_gamma,
        burial_gamma,
        hbond,
        ss_weights,
        fragment_gamma: None,
        go_model: None,
        contact_restraints: None,
    }
}

/// The production virtual-site weights rescaled so that each triple sums to exactly one.
/// Only then do the virtual sites translate rigidly with the real atoms, which makes the net
/// force of a step vanish.
pub(crate) fn affine_virtual_sites() -> VirtualSiteCoefficients {
    let d = VirtualSiteCoefficients::default();
    let unit = |a: f64, b: f64, c: f64| {
        let sum = a + b + c;
        (a / sum, b / sum, 1.0 - a / sum - b / sum)
    };
    let (an, bn, cn) = unit(d.an, d.bn, d.cn);
    let (ap, bp, cp) = unit(d.ap, d.bp, d.cp);
    let (ah, bh, ch) = unit(d.ah, d.bh, d.ch);
    VirtualSiteCoefficients {
        an,
        bn,
        cn,
        ap,
        bp,
        cp,
        ah,
        bh,
        ch,
    }
}

pub(crate) fn chain_params() -> ChainParams {
    ChainParams {
        k: [60.0, 60.0, 60.0],
        r_ncb0: 2.4627,
        r_cpcb0: 2.5033,
        r_ncp0: 2.4250,
    }
}

pub(crate) fn chi_params() -> ChiParams {
    ChiParams { k: 60.0, chi0: -0.71 }
}

pub(crate) fn excluded_params() -> ExcludedParams {
    ExcludedParams {
        k_carbon: 20.0,
        r_carbon: 4.5,
        k_oxygen: 20.0,
        r_oxygen: 3.5,
        profile: RepulsionProfile::Harmonic,
    }
}

fn basin(w: f64, sigma: f64, phiw: f64, phi0: f64, psiw: f64, psi0: f64) -> RamaBasin {
    RamaBasin {
        w,
        sigma,
        phiw: phiw * sigma,
        phi0,
        psiw: psiw * sigma,
        psi0,
    }
}

pub(crate) fn rama_params() -> RamaParams {
    RamaParams {
        k: 2.0,
        basins: vec![
            basin(2.6, 15.398, 0.15, 1.74, 0.65, -2.138),
            basin(2.6, 49.0521, 0.25, 1.265, 0.45, 0.318),
            basin(2.0, 49.0954, 0.65, -1.041, 0.25, -0.78),
        ],
    }
}

pub(crate) fn rama_proline_basins() -> Vec<RamaBasin> {
    vec![
        basin(4.3, 105.52, 1.0, 1.153, 0.15, -2.4),
        basin(4.3, 109.09, 1.0, 0.95, 0.15, 0.218),
    ]
}

pub(crate) fn dssp_params() -> DsspParams {
    let mut hbscl = [[0.0; 9]; 4];
    hbscl[0][..2].copy_from_slice(&[0.5, 0.5]);
    hbscl[1][..7].copy_from_slice(&[1.37, 0.4, 3.49, 1.30, 1.32, 1.22, 0.6]);
    hbscl[2].copy_from_slice(&[1.36, 0.3, 3.50, 1.30, 1.32, 1.22, 3.47, 0.33, 1.01]);
    hbscl[3].copy_from_slice(&[1.36, 0.3, 3.50, 1.30, 1.32, 1.22, 3.47, 0.33, 1.01]);
    DsspParams {
        k: 1.0,
        hbscl,
        sigma_ho: 0.76,
        sigma_no: 0.68,
        ho_zero: 2.06,
        no_zero: 2.98,
        cut: 9.5,
        pref: [0.5, 0.5],
        d_nu0: 8.0,
    }
}

/// Short sequence windows so that a 16-residue chain has medium, long and parallel pairs.
pub(crate) fn p_ap_params() -> PApParams {
    PApParams {
        k_global: 1.5,
        k_betapred: 0.5,
        k: [1.0, 0.4, 0.4],
        cut: 8.0,
        pref: 0.7,
        i_med_min: 3,
        i_med_max: 6,
        i_diff: 2,
    }
}

pub(crate) fn water_params() -> WaterParams {
    WaterParams {
        k: 1.0,
        kappa: 5.0,
        kappa_sigma: 7.0,
        threshold: 2.6,
        contact_cutoff: 5,
        wells: vec![
            WaterWell {
                rmin: 4.5,
                rmax: 6.5,
                enabled: true,
            },
            WaterWell {
                rmin: 6.5,
                rmax: 9.5,
                enabled: true,
            },
        ],
    }
}

pub(crate) fn burial_params() -> BurialParams {
    BurialParams {
        k: 1.0,
        kappa: 4.0,
        ro: [(0.0, 3.0), (3.0, 6.0), (6.0, 9.0)],
    }
}

pub(crate) fn helix_params() -> HelixParams {
    let mut h4prob = [0.0; RESIDUE_TYPE_COUNT];
    for (t, p) in h4prob.iter_mut().enumerate() {
        *p = 0.5 + 0.02 * t as f64;
    }
    HelixParams {
        k: 1.5,
        gamma_p: 2.0,
        gamma_w: -1.0,
        kappa: 7.0,
        kappa_sigma: 7.0,
        threshold: 3.0,
        i_diff: 4,
        cutoff: 8.0,
        rmin: 4.5,
        rmax: 6.5,
        h4prob,
        pro_acceptor_flag: true,
        h4prob_pro_acceptor: 0.1,
        sigma_ho: 0.76,
        sigma_no: 0.68,
        ho_zero: 2.06,
        no_zero: 2.98,
    }
}

pub(crate) fn shake_params() -> ShakeParams {
    ShakeParams {
        k: 30.0,
        r_alpha_alpha: 3.8,
        r_alpha_oxygen: 2.4,
        r_oxygen_alpha: 2.8,
    }
}

pub(crate) fn amh_go_params() -> AmhGoParams {
    AmhGoParams {
        k: 1.0,
        p: 2.0,
        rc: 8.0,
        censoring: GoCensoring::Off,
    }
}

pub(crate) fn contact_restraint_params() -> ContactRestraintParams {
    ContactRestraintParams {
        k: 1.5,
        sigma: 2.0,
        file: "cr.dat".into(),
    }
}

pub(crate) fn vector_fragment_params() -> VectorFragmentParams {
    VectorFragmentParams { k: 1.0, sigma: 0.3 }
}

/// Wells placed like the direct and water-mediated contacts; intra-chain pairs from
/// separation 3.
pub(crate) fn solvent_barrier_params() -> SolventBarrierParams {
    let mut rshift = [0.0; RESIDUE_TYPE_COUNT];
    for (t, shift) in rshift.iter_mut().enumerate() {
        *shift = 0.1 + 0.01 * t as f64;
    }
    SolventBarrierParams {
        k1: 0.5,
        rmin1: 4.5,
        rmax1: 6.5,
        k2: 0.7,
        rmin2: 6.5,
        rmax2: 9.5,
        kappa: 5.0,
        min_sep: 3,
        radius_correction: false,
        rshift,
    }
}

/// One serial evaluation of `system`.
pub(crate) fn evaluate(
    system: &ParticleSystem,
    sequence: &Sequence,
    forcefield: &ForceField,
    fragments: Option<&FragmentSource>,
) -> (EnergyVector, ForceBuffer) {
    let mut evaluator = Evaluator::new(
        sequence.clone(),
        forcefield.clone(),
        fragments.cloned(),
        Box::new(SerialComm),
    )
    .unwrap();
    evaluator.update_topology(system).unwrap();
    let mut forces = ForceBuffer::new();
    let step = evaluator.compute(system, 0, &mut forces).unwrap();
    (step.energies, forces)
}

fn total_energy(
    system: &ParticleSystem,
    sequence: &Sequence,
    forcefield: &ForceField,
    fragments: Option<&FragmentSource>,
) -> f64 {
    evaluate(system, sequence, forcefield, fragments).0.total()
}

/// Compares every force component on an owned particle with the central difference of the
/// total energy.
pub(crate) fn assert_forces_match_gradient(
    system: &ParticleSystem,
    sequence: &Sequence,
    forcefield: &ForceField,
    fragments: Option<&FragmentSource>,
) {
    let (_, forces) = evaluate(system, sequence, forcefield, fragments);
    let ids: Vec<ParticleId> = system
        .particles_iter()
        .filter(|(_, p)| p.is_owned())
        .map(|(id, _)| id)
        .collect();

    for id in ids {
        for axis in 0..3 {
            let mut plus = system.clone();
            plus.particle_mut(id).unwrap().position[axis] += FD_STEP;
            let mut minus = system.clone();
            minus.particle_mut(id).unwrap().position[axis] -= FD_STEP;

            let numerical = -(total_energy(&plus, sequence, forcefield, fragments)
                - total_energy(&minus, sequence, forcefield, fragments))
                / (2.0 * FD_STEP);
            let analytical = forces.get(id)[axis];
            assert!(
                (numerical - analytical).abs() < FD_TOLERANCE * (1.0 + numerical.abs()),
                "particle {:?} axis {axis}: analytical {analytical}, numerical {numerical}",
                system.particle(id).unwrap().kind,
            );
        }
    }
}

/// The topology and backbone frame the evaluator would build for `system`.
pub(crate) fn backbone(system: &ParticleSystem, sequence: &Sequence) -> (ResidueTopology, BackboneFrame) {
    let topology = build_topology(system, sequence).unwrap();
    let frame = BackboneFrame::build(
        system,
        &topology,
        sequence,
        &VirtualSiteCoefficients::default(),
    );
    (topology, frame)
}
