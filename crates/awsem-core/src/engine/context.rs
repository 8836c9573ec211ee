use super::density::{DensityField, ReducedXi};
use super::error::EngineError;
use crate::core::backbone::sites::Site;
use crate::core::backbone::virtual_atoms::BackboneFrame;
use crate::core::forcefield::term::TermKind;
use crate::core::models::residue::AminoAcid;
use crate::core::models::sequence::Sequence;
use crate::core::topology::residue::ResidueTopology;
use nalgebra::Point3;

/// Read-only view of one step shared by every term evaluation.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    pub frame: &'a BackboneFrame,
    pub topology: &'a ResidueTopology,
    pub sequence: &'a Sequence,
    pub density: Option<&'a DensityField>,
    pub xi: Option<&'a ReducedXi>,
}

impl<'a> StepContext<'a> {
    pub fn new(
        frame: &'a BackboneFrame,
        topology: &'a ResidueTopology,
        sequence: &'a Sequence,
    ) -> Self {
        Self {
            frame,
            topology,
            sequence,
            density: None,
            xi: None,
        }
    }

    pub fn with_density(mut self, density: &'a DensityField) -> Self {
        self.density = Some(density);
        self
    }

    pub fn with_xi(mut self, xi: &'a ReducedXi) -> Self {
        self.xi = Some(xi);
        self
    }

    #[inline]
    pub fn residue_type(&self, residue: usize) -> AminoAcid {
        self.sequence.residues()[residue]
    }

    /// The position of `site` on `residue`, or a `MissingAtom` error naming `term`.
    #[inline]
    pub fn site(
        &self,
        residue: usize,
        site: Site,
        term: TermKind,
    ) -> Result<Point3<f64>, EngineError> {
        self.frame
            .get(residue, site)
            .ok_or(EngineError::MissingAtom {
                residue,
                site,
                term,
            })
    }

    /// The site standing for the side chain in contact terms: Cβ, or Cα for glycine.
    #[inline]
    pub fn representative_site(&self, residue: usize) -> Site {
        if self.residue_type(residue).is_glycine() {
            Site::Alpha
        } else {
            Site::Beta
        }
    }

    pub fn representative(
        &self,
        residue: usize,
        term: TermKind,
    ) -> Result<Point3<f64>, EngineError> {
        self.site(residue, self.representative_site(residue), term)
    }

    /// Whether a residue is Local or Remote here.
    #[inline]
    pub fn is_present(&self, residue: usize) -> bool {
        self.topology.present(residue).is_some()
    }

    pub fn density_field(&self, term: TermKind) -> Result<&'a DensityField, EngineError> {
        self.density.ok_or_else(|| {
            EngineError::Internal(format!("{term} evaluated before the density reduction"))
        })
    }

    pub fn reduced_xi(&self, term: TermKind) -> Result<&'a ReducedXi, EngineError> {
        self.xi.ok_or_else(|| {
            EngineError::Internal(format!("{term} evaluated before the xi reduction"))
        })
    }
}
