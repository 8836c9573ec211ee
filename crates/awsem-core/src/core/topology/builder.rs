use super::residue::{Classification, Residue, ResidueTopology};
use crate::core::models::ids::ParticleId;
use crate::core::models::particle::ParticleKind;
use crate::core::models::sequence::Sequence;
use crate::core::models::system::ParticleSystem;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Particle has sequence tag {tag}, expected 1..={residue_count}")]
    InvalidSequenceTag { tag: isize, residue_count: usize },
    #[error("Residue {residue}: chain tag {chain_tag} does not exist in the sequence")]
    UnknownChain { residue: usize, chain_tag: isize },
    #[error("Residue {residue}: particles carry different chain tags")]
    ChainMismatch { residue: usize },
    #[error("Residue {residue} lies outside chain {chain}")]
    OutsideChain { residue: usize, chain: usize },
    #[error("Residue {residue}: more than one {kind} particle")]
    DuplicateParticle { residue: usize, kind: ParticleKind },
    #[error("Residue {residue}: missing {kind} atom")]
    MissingAtom { residue: usize, kind: ParticleKind },
    #[error("Residue {residue}: neighbor residue {neighbor} is absent or unusable")]
    IncompleteNeighbor { residue: usize, neighbor: usize },
}

#[derive(Clone, Copy)]
struct Slot {
    id: ParticleId,
    owned: bool,
    chain_tag: isize,
}

#[derive(Default)]
struct Slots {
    alpha: Option<Slot>,
    beta: Option<Slot>,
    oxygen: Option<Slot>,
}

impl Slots {
    fn slot_mut(&mut self, kind: ParticleKind) -> &mut Option<Slot> {
        match kind {
            ParticleKind::Alpha => &mut self.alpha,
            ParticleKind::Beta => &mut self.beta,
            ParticleKind::Oxygen => &mut self.oxygen,
        }
    }

    fn iter(&self) -> impl Iterator<Item = &Slot> {
        [&self.alpha, &self.beta, &self.oxygen].into_iter().flatten()
    }

    /// Chain tag taken from Cα, else Cβ, else O.
    fn chain_tag(&self) -> Option<isize> {
        self.iter().next().map(|slot| slot.chain_tag)
    }

    fn alpha_owned(&self) -> bool {
        self.alpha.is_some_and(|slot| slot.owned)
    }
}

/// Derives the residue index from the particles visible to this process and classifies
/// every residue as Local, Remote or Off.
#[instrument(skip_all, name = "topology_build")]
pub fn build_topology(
    system: &ParticleSystem,
    sequence: &Sequence,
) -> Result<ResidueTopology, TopologyError> {
    let n = sequence.len();
    let mut slots: Vec<Option<Slots>> = (0..n).map(|_| None).collect();

    for (id, particle) in system.particles_iter() {
        let tag = particle.sequence_tag;
        if tag < 1 || tag as usize > n {
            return Err(TopologyError::InvalidSequenceTag {
                tag,
                residue_count: n,
            });
        }
        let residue = (tag - 1) as usize;
        let entry = slots[residue].get_or_insert_with(Slots::default);
        let slot = entry.slot_mut(particle.kind);
        if slot.is_some() {
            return Err(TopologyError::DuplicateParticle {
                residue,
                kind: particle.kind,
            });
        }
        *slot = Some(Slot {
            id,
            owned: particle.is_owned(),
            chain_tag: particle.chain_tag,
        });
    }

    let mut chains = vec![0usize; n];
    for (residue, entry) in slots.iter().enumerate() {
        let Some(entry) = entry else { continue };
        let Some(chain_tag) = entry.chain_tag() else {
            continue;
        };
        if entry.iter().any(|slot| slot.chain_tag != chain_tag) {
            return Err(TopologyError::ChainMismatch { residue });
        }
        if chain_tag < 1 || chain_tag as usize > sequence.chain_count() {
            return Err(TopologyError::UnknownChain { residue, chain_tag });
        }
        let chain = (chain_tag - 1) as usize;
        if !sequence.chains()[chain].contains(residue) {
            return Err(TopologyError::OutsideChain { residue, chain });
        }
        chains[residue] = chain;
    }

    let mut classes: Vec<Option<Classification>> = vec![None; n];
    for i in 0..n {
        let Some(entry) = &slots[i] else { continue };
        let residue_type = sequence.residues()[i];
        let needs_beta = !residue_type.is_glycine();
        let missing_beta = needs_beta && entry.beta.is_none();
        let missing_oxygen = entry.oxygen.is_none();
        let first = sequence.is_first(i);
        let previous = if first { None } else { classes[i - 1] };

        let class = match entry.alpha {
            None => Classification::Off,
            Some(Slot { owned: true, .. }) => {
                if missing_beta {
                    return Err(TopologyError::MissingAtom {
                        residue: i,
                        kind: ParticleKind::Beta,
                    });
                }
                if missing_oxygen {
                    return Err(TopologyError::MissingAtom {
                        residue: i,
                        kind: ParticleKind::Oxygen,
                    });
                }
                if !first && matches!(previous, None | Some(Classification::Off)) {
                    return Err(TopologyError::IncompleteNeighbor {
                        residue: i,
                        neighbor: i - 1,
                    });
                }
                Classification::Local
            }
            Some(Slot { owned: false, .. }) => {
                let next_owned = !sequence.is_last(i)
                    && slots[i + 1].as_ref().is_some_and(Slots::alpha_owned);
                if previous == Some(Classification::Local) {
                    Classification::Remote
                } else if next_owned {
                    if missing_oxygen {
                        return Err(TopologyError::MissingAtom {
                            residue: i,
                            kind: ParticleKind::Oxygen,
                        });
                    }
                    Classification::Remote
                } else if missing_oxygen || missing_beta {
                    Classification::Off
                } else {
                    Classification::Remote
                }
            }
        };

        if class == Classification::Off
            && previous == Some(Classification::Local)
            && !sequence.is_last(i - 1)
        {
            return Err(TopologyError::IncompleteNeighbor {
                residue: i - 1,
                neighbor: i,
            });
        }
        classes[i] = Some(class);
    }

    // A Local residue that is not last needs i+1 to be known here at all.
    for i in 0..n {
        if classes[i] == Some(Classification::Local)
            && !sequence.is_last(i)
            && classes[i + 1].is_none()
        {
            return Err(TopologyError::IncompleteNeighbor {
                residue: i,
                neighbor: i + 1,
            });
        }
    }

    let residues: Vec<Option<Residue>> = slots
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let entry = entry?;
            Some(Residue {
                index: i,
                residue_type: sequence.residues()[i],
                chain: chains[i],
                classification: classes[i]?,
                alpha: entry.alpha.map(|slot| slot.id),
                beta: entry.beta.map(|slot| slot.id),
                oxygen: entry.oxygen.map(|slot| slot.id),
            })
        })
        .collect();

    let topology = ResidueTopology::from_residues(residues);
    debug!(
        residues = topology.len(),
        local = topology.local_indices().len(),
        "Residue topology built"
    );
    Ok(topology)
}
