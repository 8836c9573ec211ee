use crate::core::backbone::sites::Site;
use crate::core::backbone::virtual_atoms::BackboneFrame;
use crate::core::topology::residue::ResidueTopology;
use kiddo::{KdTree, SquaredEuclidean};
use tracing::{debug, instrument};

/// Upper bound on the distance between a residue's Cα and any other site of it (Cβ, O, or a
/// virtual atom). The Cα search radius is widened by twice this amount so that no site pair
/// inside a term's cutoff is missed.
pub const SITE_SPREAD: f64 = 2.5;

/// Half list of residue pairs `(i, j)` with `i < j` and `i` Local.
///
/// Every unordered pair is owned by the process that owns its lower residue, so a pair is
/// visited exactly once across all processes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairList {
    pairs: Vec<(usize, usize)>,
}

impl PairList {
    /// Collects the pairs whose Cα atoms lie within `cutoff + 2 * SITE_SPREAD`.
    #[instrument(skip_all, name = "pair_list")]
    pub fn build(frame: &BackboneFrame, topology: &ResidueTopology, cutoff: f64) -> Self {
        let mut indices = Vec::new();
        let mut points = Vec::new();
        for residue in topology.present_iter() {
            if let Some(ca) = frame.get(residue.index, Site::Alpha) {
                indices.push(residue.index);
                points.push([ca.x, ca.y, ca.z]);
            }
        }
        if points.is_empty() {
            return Self::default();
        }

        let tree: KdTree<f64, 3> = (&points).into();
        let radius = cutoff + 2.0 * SITE_SPREAD;
        let radius_sq = radius * radius;

        let mut pairs = Vec::new();
        for (slot, &i) in indices.iter().enumerate() {
            if !topology.is_local(i) {
                continue;
            }
            for neighbor in tree.within_unsorted::<SquaredEuclidean>(&points[slot], radius_sq) {
                let j = indices[neighbor.item as usize];
                if j > i {
                    pairs.push((i, j));
                }
            }
        }
        pairs.sort_unstable();
        debug!(pairs = pairs.len(), radius, "Residue pair list built");
        Self { pairs }
    }

    /// Every present pair with a Local lower residue, regardless of distance.
    pub fn all_pairs(topology: &ResidueTopology) -> Self {
        let present: Vec<usize> = topology.present_iter().map(|r| r.index).collect();
        let mut pairs = Vec::new();
        for (a, &i) in present.iter().enumerate() {
            if !topology.is_local(i) {
                continue;
            }
            pairs.extend(present[a + 1..].iter().map(|&j| (i, j)));
        }
        Self { pairs }
    }

    pub fn as_slice(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
