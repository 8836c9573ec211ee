//! Associative-memory Go bias towards a native structure.
//!
//! Every Cα and Cβ atom `a` of a Local residue collects
//! `E_a = Σ γ exp(−(r − r_native)² / 2σ²)` over the native contacts it forms, with
//! `σ² = |i − j|^0.3`, and pays `−k E_a^p / (2 a_norm)`. Contacts are taken with every
//! present residue, across chains regardless of separation.

use super::{PotentialTerm, Scope, Target, central_force};
use crate::core::backbone::sites::Site;
use crate::core::forcefield::coefficients::AmhGoParams;
use crate::core::forcefield::go::{GoModel, contact_sites};
use crate::core::forcefield::term::TermKind;
use crate::engine::accumulator::Accumulator;
use crate::engine::context::StepContext;
use crate::engine::error::EngineError;
use nalgebra::Vector3;

/// `exp(−dr²/2σ²)` falls below 1e-6 past `dr² = 12 ln 10 σ²`.
const GAUSSIAN_SPAN_SQ: f64 = 27.6;
const SIGMA_EXPONENT: f64 = 0.3;

struct Contact {
    j: usize,
    site: Site,
    dx: Vector3<f64>,
    /// `E_ij (r − r_native) / (σ² r)`.
    slope: f64,
}

pub struct AmhGoTerm {
    params: AmhGoParams,
    model: GoModel,
}

impl AmhGoTerm {
    pub fn new(params: AmhGoParams, model: GoModel) -> Self {
        Self { params, model }
    }

    /// Sums the contacts of site `a` of residue `i` into `contacts`, returning `E_a`.
    fn collect(
        &self,
        ctx: &StepContext,
        i: usize,
        a: Site,
        contacts: &mut Vec<Contact>,
    ) -> Result<f64, EngineError> {
        let xi = ctx.site(i, a, TermKind::AmhGo)?;
        let type_i = ctx.residue_type(i);
        let native = self.model.native();
        let mut energy = 0.0;

        for residue in ctx.topology.present_iter() {
            let j = residue.index;
            let separation = i.abs_diff(j);
            if j == i
                || (separation < self.model.min_sep() && ctx.sequence.same_chain(i, j))
                || self.model.is_censored(i, j)
            {
                continue;
            }
            let type_j = ctx.residue_type(j);
            let sigma_sq = (separation as f64).powf(SIGMA_EXPONENT);
            for &b in contact_sites(type_j.is_glycine()) {
                let r_native = native.get(i, a, j, b);
                if r_native >= self.params.rc {
                    continue;
                }
                let dx = xi - ctx.site(j, b, TermKind::AmhGo)?;
                let r = dx.norm();
                let dr = r - r_native;
                if dr * dr >= GAUSSIAN_SPAN_SQ * sigma_sq {
                    continue;
                }
                let gamma = self.model.gamma().gamma(separation, type_i, type_j);
                let e_ij = gamma * (-dr * dr / (2.0 * sigma_sq)).exp();
                energy += e_ij;
                contacts.push(Contact {
                    j,
                    site: b,
                    dx,
                    slope: e_ij * dr / (sigma_sq * r),
                });
            }
        }
        Ok(energy)
    }
}

impl PotentialTerm for AmhGoTerm {
    fn kind(&self) -> TermKind {
        TermKind::AmhGo
    }

    fn scope(&self) -> Scope {
        Scope::PerResidue
    }

    fn is_admissible(&self, ctx: &StepContext, target: Target) -> Result<bool, EngineError> {
        Ok(matches!(target, Target::Residue(i) if ctx.topology.is_local(i)))
    }

    fn energy_and_force(
        &self,
        ctx: &StepContext,
        target: Target,
        acc: &mut Accumulator,
    ) -> Result<(), EngineError> {
        let Target::Residue(i) = target else {
            return Ok(());
        };
        let p = self.params.p;
        let scale = -0.5 * self.params.k / self.model.norm();
        let mut contacts = Vec::new();

        for &a in contact_sites(ctx.residue_type(i).is_glycine()) {
            contacts.clear();
            let e_a = self.collect(ctx, i, a, &mut contacts)?;
            if contacts.is_empty() {
                continue;
            }
            acc.add_energy(TermKind::AmhGo, scale * e_a.powf(p));
            let factor = scale * p * e_a.powf(p - 1.0);
            for contact in &contacts {
                central_force(
                    acc,
                    (i, a),
                    (contact.j, contact.site),
                    contact.dx,
                    factor * contact.slope,
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backbone::virtual_atoms::BackboneFrame;
    use crate::core::forcefield::coefficients::CoefficientSet;
    use crate::core::forcefield::gamma::FragmentGamma;
    use crate::core::forcefield::go::NativeDistances;
    use crate::core::forcefield::params::ForceField;
    use crate::core::io::gro::{GroTemplate, TemplateResidue};
    use crate::core::models::sequence::Sequence;
    use crate::core::models::system::ParticleSystem;
    use crate::engine::terms::testing;
    use nalgebra::Point3;
    use std::collections::HashSet;

    const TOLERANCE: f64 = 1e-9;
    const GAMMA: &str = "[[classes]]\nmin = 2\nmax = 4\n\n[[classes]]\nmin = 5\n\n\
                         [[gammas]]\nclass = 1\ni = \"*\"\nj = \"*\"\ngamma = 0.6\n";

    fn template(
        frame: &BackboneFrame,
        sequence: &Sequence,
        shift: impl Fn(Point3<f64>) -> Point3<f64>,
    ) -> GroTemplate {
        GroTemplate {
            title: "native".into(),
            residues: (0..sequence.len())
                .map(|i| TemplateResidue {
                    residue_type: sequence.residues()[i],
                    alpha: shift(frame.get(i, Site::Alpha).unwrap()),
                    beta: frame.get(i, Site::Beta).map(&shift),
                })
                .collect(),
        }
    }

    /// A native structure close to, but not at, the current coordinates.
    fn sheared_native(system: &ParticleSystem, sequence: &Sequence) -> GroTemplate {
        let (_, frame) = testing::backbone(system, sequence);
        template(&frame, sequence, |p| p + Vector3::new(0.05 * p.z, -0.03 * p.x, 0.02 * p.y))
    }

    fn forcefield(
        sequence: &Sequence,
        params: AmhGoParams,
        native: &GroTemplate,
        censored: HashSet<(usize, usize)>,
    ) -> ForceField {
        let model = GoModel::new(
            &params,
            FragmentGamma::parse("amh-go.gamma", GAMMA).unwrap(),
            NativeDistances::from_template(native),
            censored,
            sequence,
        )
        .unwrap();
        let mut forcefield = testing::forcefield(
            CoefficientSet {
                amh_go: Some(params),
                ..CoefficientSet::default()
            },
            sequence,
        );
        forcefield.go_model = Some(model);
        forcefield
    }

    #[test]
    fn forces_match_energy_gradient_and_sum_to_zero() {
        let sequence = Sequence::parse("MKTAYGLV AKEG").unwrap();
        let system = testing::helix_bundle(&sequence, 71);
        let native = sheared_native(&system, &sequence);
        let forcefield = forcefield(&sequence, testing::amh_go_params(), &native, HashSet::new());
        testing::assert_forces_match_gradient(&system, &sequence, &forcefield, None);

        let (energies, forces) = testing::evaluate(&system, &sequence, &forcefield, None);
        assert!(energies.get(TermKind::AmhGo) < 0.0);
        assert!(forces.net().norm() < TOLERANCE);
    }

    #[test]
    fn non_quadratic_exponent_matches_energy_gradient() {
        let sequence = Sequence::parse("MKTAYGLVKE").unwrap();
        let system = testing::helix_bundle(&sequence, 72);
        let params = AmhGoParams {
            p: 1.5,
            ..testing::amh_go_params()
        };
        let native = sheared_native(&system, &sequence);
        let forcefield = forcefield(&sequence, params, &native, HashSet::new());
        testing::assert_forces_match_gradient(&system, &sequence, &forcefield, None);
    }

    #[test]
    fn structure_at_the_native_minimum_feels_no_force() {
        let sequence = Sequence::parse("AKLVEG").unwrap();
        let system = testing::helix_bundle(&sequence, 73);
        let (_, frame) = testing::backbone(&system, &sequence);
        let native = template(&frame, &sequence, |p| p);
        let forcefield = forcefield(&sequence, testing::amh_go_params(), &native, HashSet::new());

        let (energies, forces) = testing::evaluate(&system, &sequence, &forcefield, None);

        assert!(energies.get(TermKind::AmhGo) < 0.0);
        for (id, f) in forces.iter() {
            assert!(f.norm() < TOLERANCE, "residual force on {id:?}: {f}");
        }
    }

    #[test]
    fn energy_follows_the_normalized_power_of_each_atom_sum() {
        let sequence = Sequence::parse("GAKLAG").unwrap();
        let system = testing::helix_bundle(&sequence, 75);
        let (_, frame) = testing::backbone(&system, &sequence);
        let native = template(&frame, &sequence, |p| p);
        let forcefield = forcefield(&sequence, testing::amh_go_params(), &native, HashSet::new());
        let model = forcefield.go_model.clone().unwrap();
        let (energies, _) = testing::evaluate(&system, &sequence, &forcefield, None);

        // At the native structure every contact sits at the bottom of its well and adds γ.
        let p = testing::amh_go_params();
        let residues = sequence.residues();
        let mut expected = 0.0;
        for i in 0..residues.len() {
            for &a in contact_sites(residues[i].is_glycine()) {
                let mut e_a = 0.0;
                for j in (0..residues.len()).filter(|&j| i.abs_diff(j) >= model.min_sep()) {
                    for &b in contact_sites(residues[j].is_glycine()) {
                        if model.native().get(i, a, j, b) < p.rc {
                            e_a += model.gamma().gamma(i.abs_diff(j), residues[i], residues[j]);
                        }
                    }
                }
                expected += -0.5 * p.k * e_a.powf(p.p) / model.norm();
            }
        }
        assert!(expected < 0.0);
        assert!((energies.get(TermKind::AmhGo) - expected).abs() < TOLERANCE);
    }

    #[test]
    fn censored_pairs_contribute_nothing() {
        let sequence = Sequence::parse("AKLVE").unwrap();
        let system = testing::helix_bundle(&sequence, 74);
        let native = sheared_native(&system, &sequence);
        let all: HashSet<(usize, usize)> = (0..5)
            .flat_map(|i| (i + 1..5).map(move |j| (i, j)))
            .collect();

        let open = forcefield(&sequence, testing::amh_go_params(), &native, HashSet::new());
        let censored = forcefield(&sequence, testing::amh_go_params(), &native, all);
        let (e_open, _) = testing::evaluate(&system, &sequence, &open, None);
        let (e_censored, f_censored) = testing::evaluate(&system, &sequence, &censored, None);

        assert!(e_open.get(TermKind::AmhGo) < 0.0);
        assert_eq!(e_censored.get(TermKind::AmhGo), 0.0);
        assert!(f_censored.iter().all(|(_, f)| f.norm() < TOLERANCE));
    }
}
