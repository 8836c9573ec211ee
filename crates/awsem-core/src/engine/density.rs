//! Local-contact densities and the coefficients derived from them.
//!
//! The two reductions of a step are encoded in types: [`ReducedDensity`] and [`ReducedXi`]
//! can only be obtained from their local partials through a [`Communicator`], so no
//! density-dependent force can see a partial sum.

use super::accumulator::{Partial, fold_items};
use super::comm::{CommError, Communicator};
use super::context::StepContext;
use super::error::EngineError;
use super::neighbors::PairList;
use crate::core::forcefield::coefficients::CoefficientSet;
use crate::core::forcefield::params::ForceField;
use crate::core::forcefield::potentials::{WellWindow, burial_window, density_switch};
use crate::core::forcefield::term::TermKind;
use crate::core::models::sequence::Sequence;
use tracing::{debug, instrument};

/// Smallest same-chain sequence separation that contributes to a density.
pub const DENSITY_MIN_SEPARATION: usize = 2;

/// Whether the pair `(i, j)` contributes to each other's densities.
#[inline]
pub fn is_density_pair(sequence: &Sequence, i: usize, j: usize) -> bool {
    !sequence.same_chain(i, j) || i.abs_diff(j) >= DENSITY_MIN_SEPARATION
}

/// The wells that define the two density channels; a channel is `None` when no active
/// term reads it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DensityWindows {
    pub water: Option<WellWindow>,
    pub helix: Option<WellWindow>,
}

impl DensityWindows {
    pub fn from_coefficients(coefficients: &CoefficientSet) -> Self {
        Self {
            water: coefficients.water.as_ref().map(|w| w.window(0)),
            helix: coefficients.helix.as_ref().map(|h| h.window()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.water.is_none() && self.helix.is_none()
    }

    fn term(&self) -> TermKind {
        if self.water.is_some() {
            TermKind::Water
        } else {
            TermKind::Helix
        }
    }
}

/// Density partial sums of the pairs visited by this process.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDensity {
    water: Vec<f64>,
    helix: Vec<f64>,
}

impl Partial for LocalDensity {
    fn merge(mut self, other: Self) -> Self {
        add_into(&mut self.water, &other.water);
        add_into(&mut self.helix, &other.helix);
        self
    }
}

impl LocalDensity {
    fn zeros(residue_count: usize) -> Self {
        Self {
            water: vec![0.0; residue_count],
            helix: vec![0.0; residue_count],
        }
    }

    /// Adds θ(r) of every qualifying pair to both of its residues.
    #[instrument(skip_all, name = "density_pass")]
    pub fn accumulate(
        ctx: &StepContext,
        windows: &DensityWindows,
        pairs: &PairList,
    ) -> Result<Self, EngineError> {
        let n = ctx.sequence.len();
        if windows.is_empty() {
            return Ok(Self::zeros(n));
        }
        let term = windows.term();
        fold_items(
            pairs.as_slice(),
            || Self::zeros(n),
            |acc, &(i, j)| {
                if !is_density_pair(ctx.sequence, i, j) {
                    return Ok(());
                }
                let xi = ctx.representative(i, term)?;
                let xj = ctx.representative(j, term)?;
                let rsq = (xi - xj).norm_squared();
                for (window, values) in [
                    (windows.water, &mut acc.water),
                    (windows.helix, &mut acc.helix),
                ] {
                    if let Some(window) = window {
                        if window.contains_sq(rsq) {
                            let theta = window.theta(rsq.sqrt());
                            values[i] += theta;
                            values[j] += theta;
                        }
                    }
                }
                Ok(())
            },
        )
    }

    /// Sums the partials of every process. This is the first barrier of a step.
    pub fn reduce(self, comm: &dyn Communicator) -> Result<ReducedDensity, CommError> {
        let n = self.water.len();
        let mut buffer = self.water;
        buffer.extend(self.helix);
        comm.all_reduce_sum(&mut buffer)?;
        let helix = buffer.split_off(n);
        Ok(ReducedDensity {
            water: buffer,
            helix,
        })
    }
}

/// Globally reduced densities. Only [`LocalDensity::reduce`] produces one.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedDensity {
    water: Vec<f64>,
    helix: Vec<f64>,
}

impl ReducedDensity {
    #[inline]
    pub fn water(&self, residue: usize) -> f64 {
        self.water[residue]
    }

    #[inline]
    pub fn helix(&self, residue: usize) -> f64 {
        self.helix[residue]
    }

    pub fn len(&self) -> usize {
        self.water.len()
    }

    pub fn is_empty(&self) -> bool {
        self.water.is_empty()
    }
}

/// Per-residue quantities derived from the reduced densities: the water and helix
/// switches with their derivatives, and the burial slope `−dE_burial/dρ`.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityField {
    rho: ReducedDensity,
    water: Vec<(f64, f64)>,
    helix: Vec<(f64, f64)>,
    burial_slope: Vec<f64>,
}

impl DensityField {
    pub fn new(rho: ReducedDensity, forcefield: &ForceField, sequence: &Sequence) -> Self {
        let n = rho.len();
        let c = &forcefield.coefficients;

        let water = match &c.water {
            Some(w) => (0..n)
                .map(|i| density_switch(rho.water(i), w.threshold, w.kappa_sigma))
                .collect(),
            None => vec![(0.0, 0.0); n],
        };
        let helix = match &c.helix {
            Some(h) => (0..n)
                .map(|i| density_switch(rho.helix(i), h.threshold, h.kappa_sigma))
                .collect(),
            None => vec![(0.0, 0.0); n],
        };
        let burial_slope = match (&c.burial, &forcefield.burial_gamma) {
            (Some(b), Some(gamma)) => (0..n)
                .map(|i| {
                    let aa = sequence.residues()[i];
                    let sum: f64 = b
                        .ro
                        .iter()
                        .enumerate()
                        .map(|(l, &(lo, hi))| {
                            gamma.get(aa, l) * burial_window(rho.water(i), lo, hi, b.kappa).1
                        })
                        .sum();
                    0.5 * b.k * sum
                })
                .collect(),
            _ => vec![0.0; n],
        };

        debug!(residues = n, "Density field derived");
        Self {
            rho,
            water,
            helix,
            burial_slope,
        }
    }

    pub fn rho(&self) -> &ReducedDensity {
        &self.rho
    }

    /// `(σ, dσ/dρ)` of the water channel.
    #[inline]
    pub fn water_switch(&self, residue: usize) -> (f64, f64) {
        self.water[residue]
    }

    /// `(σ, dσ/dρ)` of the helix channel.
    #[inline]
    pub fn helix_switch(&self, residue: usize) -> (f64, f64) {
        self.helix[residue]
    }

    #[inline]
    pub fn burial_slope(&self, residue: usize) -> f64 {
        self.burial_slope[residue]
    }
}

/// Partial sums of the density-derivative coefficients.
///
/// `water[k]` collects `−dE_water/dρ_k`. `helix_acceptor[i]` and `helix_donor[i]` hold
/// `dE_helix/dρ` of the hydrogen bond that starts at `i`, with respect to the density of
/// the acceptor `i` and of the donor `i + d`.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalXi {
    water: Vec<f64>,
    helix_acceptor: Vec<f64>,
    helix_donor: Vec<f64>,
}

impl Partial for LocalXi {
    fn merge(mut self, other: Self) -> Self {
        add_into(&mut self.water, &other.water);
        add_into(&mut self.helix_acceptor, &other.helix_acceptor);
        add_into(&mut self.helix_donor, &other.helix_donor);
        self
    }
}

impl LocalXi {
    pub fn zeros(residue_count: usize) -> Self {
        Self {
            water: vec![0.0; residue_count],
            helix_acceptor: vec![0.0; residue_count],
            helix_donor: vec![0.0; residue_count],
        }
    }

    #[inline]
    pub fn add_water(&mut self, residue: usize, value: f64) {
        self.water[residue] += value;
    }

    #[inline]
    pub fn add_helix(&mut self, acceptor: usize, wrt_acceptor: f64, wrt_donor: f64) {
        self.helix_acceptor[acceptor] += wrt_acceptor;
        self.helix_donor[acceptor] += wrt_donor;
    }

    /// Sums the partials of every process. This is the second barrier of a step.
    pub fn reduce(self, comm: &dyn Communicator) -> Result<ReducedXi, CommError> {
        let n = self.water.len();
        let mut buffer = self.water;
        buffer.extend(self.helix_acceptor);
        buffer.extend(self.helix_donor);
        comm.all_reduce_sum(&mut buffer)?;
        let helix_donor = buffer.split_off(2 * n);
        let helix_acceptor = buffer.split_off(n);
        Ok(ReducedXi {
            water: buffer,
            helix_acceptor,
            helix_donor,
        })
    }
}

/// Globally reduced xi coefficients. Only [`LocalXi::reduce`] produces one.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedXi {
    water: Vec<f64>,
    helix_acceptor: Vec<f64>,
    helix_donor: Vec<f64>,
}

impl ReducedXi {
    #[inline]
    pub fn water(&self, residue: usize) -> f64 {
        self.water[residue]
    }

    /// `dE_helix/dρ_k` summed over the two hydrogen bonds that read the density of `k`:
    /// the one `k` accepts and the one it donates (`k − d` to `k`).
    #[inline]
    pub fn helix(&self, residue: usize, i_diff: usize) -> f64 {
        let mut value = self.helix_acceptor[residue];
        if let Some(acceptor) = residue.checked_sub(i_diff) {
            value += self.helix_donor[acceptor];
        }
        value
    }
}

fn add_into(lhs: &mut [f64], rhs: &[f64]) {
    for (a, b) in lhs.iter_mut().zip(rhs) {
        *a += b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backbone::virtual_atoms::BackboneFrame;
    use crate::core::forcefield::coefficients::{
        BurialParams, HelixParams, VirtualSiteCoefficients, WaterParams, WaterWell,
    };
    use crate::core::forcefield::gamma::BurialGamma;
    use crate::core::models::particle::{Particle, ParticleKind};
    use crate::core::models::residue::RESIDUE_TYPE_COUNT;
    use crate::core::models::system::{ParticleSystem, SimulationBox};
    use crate::core::topology::builder::build_topology;
    use crate::engine::comm::{LocalGroup, SerialComm};
    use nalgebra::Point3;
    use std::thread;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    fn water_params() -> WaterParams {
        WaterParams {
            k: 1.0,
            kappa: 5.0,
            kappa_sigma: 7.0,
            threshold: 2.6,
            contact_cutoff: 10,
            wells: vec![WaterWell {
                rmin: 4.5,
                rmax: 6.5,
                enabled: true,
            }],
        }
    }

    fn helix_params() -> HelixParams {
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
            h4prob: [0.8; RESIDUE_TYPE_COUNT],
            pro_acceptor_flag: false,
            h4prob_pro_acceptor: 0.0,
            sigma_ho: 0.76,
            sigma_no: 0.68,
            ho_zero: 2.06,
            no_zero: 2.98,
        }
    }

    /// Residues on a zigzag line, each Cβ sitting 5.5 Å from the Cβ two residues away.
    fn zigzag(sequence: &Sequence, owned: impl Fn(usize) -> bool) -> ParticleSystem {
        let mut system = ParticleSystem::new(SimulationBox::open());
        for i in 0..sequence.len() {
            let chain = sequence.chain_index(i).unwrap() as isize + 1;
            let x = i as f64 * 2.75;
            let y = if i % 2 == 0 { 0.0 } else { 1.0 };
            let tag = i as isize + 1;
            for (kind, position) in [
                (ParticleKind::Alpha, Point3::new(x, y, 0.0)),
                (ParticleKind::Beta, Point3::new(x, y, 1.5)),
                (ParticleKind::Oxygen, Point3::new(x + 1.0, y, -1.0)),
            ] {
                let particle = Particle::new(kind, tag, chain, position);
                system.add_particle(if owned(i) { particle } else { particle.as_ghost() });
            }
        }
        system
    }

    fn local_density(system: &ParticleSystem, sequence: &Sequence, windows: &DensityWindows) -> LocalDensity {
        let topology = build_topology(system, sequence).unwrap();
        let frame = BackboneFrame::build(
            system,
            &topology,
            sequence,
            &VirtualSiteCoefficients::default(),
        );
        let ctx = StepContext::new(&frame, &topology, sequence);
        LocalDensity::accumulate(&ctx, windows, &PairList::all_pairs(&topology)).unwrap()
    }

    #[test]
    fn density_pair_requires_separation_of_two_on_the_same_chain() {
        let sequence = Sequence::parse("AAAA AA").unwrap();
        assert!(!is_density_pair(&sequence, 0, 1));
        assert!(is_density_pair(&sequence, 0, 2));
        assert!(is_density_pair(&sequence, 3, 4));
    }

    #[test]
    fn serial_density_counts_each_pair_for_both_residues() {
        let sequence = Sequence::parse("AAAAA").unwrap();
        let windows = DensityWindows {
            water: Some(water_params().window(0)),
            helix: None,
        };
        let system = zigzag(&sequence, |_| true);

        let rho = local_density(&system, &sequence, &windows)
            .reduce(&SerialComm)
            .unwrap();

        let well = water_params().window(0);
        let theta = well.theta(5.5);
        // Residue 2 has partners 0 and 4 at 5.5 Å; everything farther is outside the window.
        assert!(f64_approx_equal(rho.water(2), 2.0 * theta));
        assert!(f64_approx_equal(rho.water(0), theta));
        assert!(f64_approx_equal(rho.helix(2), 0.0));
    }

    #[test]
    fn reduced_density_across_ranks_matches_serial() {
        let sequence = Sequence::parse("AAAAAAAA").unwrap();
        let windows = DensityWindows {
            water: Some(water_params().window(0)),
            helix: Some(helix_params().window()),
        };
        let serial = local_density(&zigzag(&sequence, |_| true), &sequence, &windows)
            .reduce(&SerialComm)
            .unwrap();

        let handles = LocalGroup::create(2);
        let reduced: Vec<ReducedDensity> = thread::scope(|scope| {
            let workers: Vec<_> = handles
                .iter()
                .map(|comm| {
                    let sequence = &sequence;
                    let windows = &windows;
                    scope.spawn(move || {
                        let rank = comm.rank();
                        let system = zigzag(sequence, |i| (i < 4) == (rank == 0));
                        local_density(&system, sequence, windows)
                            .reduce(comm)
                            .unwrap()
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        for rho in reduced {
            for i in 0..sequence.len() {
                assert!(f64_approx_equal(rho.water(i), serial.water(i)));
                assert!(f64_approx_equal(rho.helix(i), serial.helix(i)));
            }
        }
    }

    #[test]
    fn density_field_applies_switches_and_burial_slope() {
        let sequence = Sequence::parse("AAAAA").unwrap();
        let water = water_params();
        let burial = BurialParams {
            k: 1.0,
            kappa: 4.0,
            ro: [(0.0, 3.0), (3.0, 6.0), (6.0, 9.0)],
        };
        let forcefield = ForceField {
            coefficients: CoefficientSet {
                water: Some(water.clone()),
                burial: Some(burial),
                ..CoefficientSet::default()
            },
            water_gamma: None,
            burial_gamma: Some(BurialGamma::from_values([[1.0, -0.5, 0.25]; RESIDUE_TYPE_COUNT])),
            hbond: None,
            ss_weights: None,
            fragment_gamma: None,
            go_model: None,
            contact_restraints: None,
        };
        let windows = DensityWindows::from_coefficients(&forcefield.coefficients);
        let rho = local_density(&zigzag(&sequence, |_| true), &sequence, &windows)
            .reduce(&SerialComm)
            .unwrap();
        let rho2 = rho.water(2);

        let field = DensityField::new(rho, &forcefield, &sequence);

        let (sigma, dsigma) = field.water_switch(2);
        let expected = density_switch(rho2, water.threshold, water.kappa_sigma);
        assert!(f64_approx_equal(sigma, expected.0));
        assert!(f64_approx_equal(dsigma, expected.1));

        let slope: f64 = [(1.0, (0.0, 3.0)), (-0.5, (3.0, 6.0)), (0.25, (6.0, 9.0))]
            .iter()
            .map(|&(g, (lo, hi))| g * burial_window(rho2, lo, hi, 4.0).1)
            .sum();
        assert!(f64_approx_equal(field.burial_slope(2), 0.5 * slope));
    }

    #[test]
    fn helix_xi_combines_acceptor_and_donor_slots() {
        let mut xi = LocalXi::zeros(8);
        xi.add_helix(1, 0.5, 0.25);
        xi.add_helix(5, 2.0, 1.0);
        let reduced = xi.reduce(&SerialComm).unwrap();
        // Residue 5 accepts from its own bond and donates to the bond starting at 1.
        assert!(f64_approx_equal(reduced.helix(5, 4), 2.0 + 0.25));
        assert!(f64_approx_equal(reduced.helix(1, 4), 0.5));
        assert!(f64_approx_equal(reduced.water(3), 0.0));
    }
}
