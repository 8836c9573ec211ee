use super::traits::{StructureFile, slice_and_trim};
use crate::core::models::particle::{Particle, ParticleKind};
use crate::core::models::system::{ParticleSystem, SimulationBox};
use nalgebra::Point3;
use std::collections::HashMap;
use std::io::{self, BufRead};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Line is too short for an ATOM record (must be at least 54 chars)")]
    LineTooShort,
    #[error("ENDMDL without a matching MODEL")]
    UnmatchedEndModel,
}

/// A single coarse-grained pseudo-atom read from an `ATOM` record.
#[derive(Debug, Clone, PartialEq)]
pub struct PdbAtom {
    pub kind: ParticleKind,
    pub residue_name: String,
    /// Consecutive 1-based residue number over the whole model.
    pub sequence_tag: isize,
    /// 1-based ordinal of the chain identifier in order of first appearance.
    pub chain_tag: isize,
    pub position: Point3<f64>,
}

/// One model of a PDB file, reduced to its CA, CB and O atoms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdbFrame {
    pub atoms: Vec<PdbAtom>,
    pub residue_count: usize,
}

impl PdbFrame {
    /// Hands every atom to a fresh particle system as an owned particle.
    pub fn to_particle_system(&self, sim_box: SimulationBox) -> ParticleSystem {
        let mut system = ParticleSystem::new(sim_box);
        for atom in &self.atoms {
            system.add_particle(Particle::new(
                atom.kind,
                atom.sequence_tag,
                atom.chain_tag,
                atom.position,
            ));
        }
        system
    }
}

#[derive(Default)]
struct FrameBuilder {
    frame: PdbFrame,
    chain_ordinals: HashMap<char, isize>,
    current_residue: Option<(char, String)>,
}

impl FrameBuilder {
    fn is_empty(&self) -> bool {
        self.current_residue.is_none()
    }

    fn push(
        &mut self,
        chain_id: char,
        residue_key: &str,
        residue_name: &str,
        kind: Option<ParticleKind>,
        position: Point3<f64>,
    ) {
        let next_ordinal = self.chain_ordinals.len() as isize + 1;
        let chain_tag = *self.chain_ordinals.entry(chain_id).or_insert(next_ordinal);

        let is_new_residue = match &self.current_residue {
            Some((c, key)) => *c != chain_id || key != residue_key,
            None => true,
        };
        if is_new_residue {
            self.frame.residue_count += 1;
            self.current_residue = Some((chain_id, residue_key.to_string()));
        }

        if let Some(kind) = kind {
            self.frame.atoms.push(PdbAtom {
                kind,
                residue_name: residue_name.to_string(),
                sequence_tag: self.frame.residue_count as isize,
                chain_tag,
                position,
            });
        }
    }

    fn finish(self) -> PdbFrame {
        self.frame
    }
}

/// Reads the CA, CB and O pseudo-atoms of every model in a PDB file.
///
/// Residues are numbered consecutively from 1 in file order regardless of the
/// residue numbers in the file; a residue starts whenever the chain identifier,
/// residue number or insertion code changes.
pub struct PdbFile;

impl StructureFile for PdbFile {
    type Output = Vec<PdbFrame>;
    type Error = PdbError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self::Output, Self::Error> {
        let mut frames = Vec::new();
        let mut current = FrameBuilder::default();
        let mut in_model = false;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;

            match slice_and_trim(&line, 0, 6) {
                "MODEL" => {
                    if !current.is_empty() {
                        frames.push(std::mem::take(&mut current).finish());
                    }
                    in_model = true;
                }
                "ENDMDL" => {
                    if !in_model {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::UnmatchedEndModel,
                        });
                    }
                    frames.push(std::mem::take(&mut current).finish());
                    in_model = false;
                }
                "ATOM" => {
                    if line.len() < 54 {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::LineTooShort,
                        });
                    }
                    let atom_name = slice_and_trim(&line, 12, 16);
                    let residue_name = slice_and_trim(&line, 17, 20);
                    let chain_id = line.get(21..22).and_then(|s| s.chars().next()).unwrap_or(' ');
                    let residue_key = line.get(22..27).unwrap_or("");
                    let x = parse_coordinate(&line, line_num, 30, 38, "31-38")?;
                    let y = parse_coordinate(&line, line_num, 38, 46, "39-46")?;
                    let z = parse_coordinate(&line, line_num, 46, 54, "47-54")?;

                    current.push(
                        chain_id,
                        residue_key,
                        residue_name,
                        atom_name.parse().ok(),
                        Point3::new(x, y, z),
                    );
                }
                "END" => break,
                _ => {}
            }
        }

        if !current.is_empty() {
            frames.push(current.finish());
        }
        frames.retain(|frame| !frame.atoms.is_empty());
        if frames.is_empty() {
            return Err(PdbError::MissingRecord("ATOM records with CA/CB/O".into()));
        }
        Ok(frames)
    }
}

fn parse_coordinate(
    line: &str,
    line_num: usize,
    start: usize,
    end: usize,
    columns: &str,
) -> Result<f64, PdbError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidFloat {
            columns: columns.into(),
            value: value.into(),
        },
    })
}
