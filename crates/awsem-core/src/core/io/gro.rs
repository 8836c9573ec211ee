use super::traits::{StructureFile, slice_and_trim};
use crate::core::models::residue::{AminoAcid, ParseAminoAcidError};
use nalgebra::Point3;
use std::io::{self, BufRead};
use thiserror::Error;

const NM_TO_ANGSTROM: f64 = 10.0;

#[derive(Debug, Error)]
pub enum GroError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: GroParseErrorKind },
    #[error("Header declares {expected} atoms but the file holds {found}")]
    AtomCount { expected: usize, found: usize },
    #[error("Template residue {residue} has no CA atom")]
    MissingAlpha { residue: usize },
}

#[derive(Debug, Error)]
pub enum GroParseErrorKind {
    #[error("Invalid atom count '{0}'")]
    InvalidAtomCount(String),
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error(transparent)]
    UnknownResidue(#[from] ParseAminoAcidError),
}

/// One residue of a fragment-memory template.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateResidue {
    pub residue_type: AminoAcid,
    pub alpha: Point3<f64>,
    /// Absent for glycine templates without a CB record.
    pub beta: Option<Point3<f64>>,
}

/// The Cα/Cβ trace of a template structure in Angstroms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroTemplate {
    pub title: String,
    pub residues: Vec<TemplateResidue>,
}

impl GroTemplate {
    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }
}

/// Reads GRO-format templates, keeping the CA and CB atoms of each residue.
pub struct GroFile;

struct PendingResidue {
    number: i64,
    name: String,
    residue_type: AminoAcid,
    alpha: Option<Point3<f64>>,
    beta: Option<Point3<f64>>,
}

impl PendingResidue {
    fn finish(self, ordinal: usize) -> Result<TemplateResidue, GroError> {
        let alpha = self
            .alpha
            .ok_or(GroError::MissingAlpha { residue: ordinal })?;
        Ok(TemplateResidue {
            residue_type: self.residue_type,
            alpha,
            beta: self.beta,
        })
    }
}

impl StructureFile for GroFile {
    type Output = GroTemplate;
    type Error = GroError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self::Output, Self::Error> {
        let mut lines = reader.lines();
        let title = lines.next().transpose()?.unwrap_or_default();
        let count_line = lines.next().transpose()?.unwrap_or_default();
        let expected: usize = count_line.trim().parse().map_err(|_| GroError::Parse {
            line: 2,
            kind: GroParseErrorKind::InvalidAtomCount(count_line.trim().to_string()),
        })?;

        let mut template = GroTemplate {
            title: title.trim().to_string(),
            residues: Vec::new(),
        };
        let mut pending: Option<PendingResidue> = None;

        for atom_idx in 0..expected {
            let line_num = atom_idx + 3;
            let Some(line) = lines.next().transpose()? else {
                return Err(GroError::AtomCount {
                    expected,
                    found: atom_idx,
                });
            };

            let number_str = slice_and_trim(&line, 0, 5);
            let number: i64 = number_str.parse().map_err(|_| GroError::Parse {
                line: line_num,
                kind: GroParseErrorKind::InvalidInt {
                    columns: "1-5".into(),
                    value: number_str.into(),
                },
            })?;
            let residue_name = slice_and_trim(&line, 5, 10);
            let atom_name = slice_and_trim(&line, 10, 15);

            let is_same_residue = pending
                .as_ref()
                .is_some_and(|p| p.number == number && p.name == residue_name);
            if !is_same_residue {
                if let Some(done) = pending.take() {
                    let ordinal = template.residues.len() + 1;
                    template.residues.push(done.finish(ordinal)?);
                }
                let residue_type =
                    AminoAcid::from_name(residue_name).map_err(|e| GroError::Parse {
                        line: line_num,
                        kind: e.into(),
                    })?;
                pending = Some(PendingResidue {
                    number,
                    name: residue_name.to_string(),
                    residue_type,
                    alpha: None,
                    beta: None,
                });
            }

            if atom_name != "CA" && atom_name != "CB" {
                continue;
            }
            let position = Point3::new(
                parse_nm(&line, line_num, 20, 28, "21-28")?,
                parse_nm(&line, line_num, 28, 36, "29-36")?,
                parse_nm(&line, line_num, 36, 44, "37-44")?,
            ) * NM_TO_ANGSTROM;

            if let Some(current) = pending.as_mut() {
                match atom_name {
                    "CA" => current.alpha = Some(position),
                    _ => current.beta = Some(position),
                }
            }
        }

        if let Some(done) = pending.take() {
            let ordinal = template.residues.len() + 1;
            template.residues.push(done.finish(ordinal)?);
        }
        Ok(template)
    }
}

fn parse_nm(
    line: &str,
    line_num: usize,
    start: usize,
    end: usize,
    columns: &str,
) -> Result<f64, GroError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| GroError::Parse {
        line: line_num,
        kind: GroParseErrorKind::InvalidFloat {
            columns: columns.into(),
            value: value.into(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TOLERANCE: f64 = 1e-9;

    fn gro_line(res_nr: i32, res_name: &str, atom: &str, atom_nr: i32, xyz: [f64; 3]) -> String {
        format!(
            "{:>5}{:<5}{:>5}{:>5}{:>8.3}{:>8.3}{:>8.3}",
            res_nr, res_name, atom, atom_nr, xyz[0], xyz[1], xyz[2]
        )
    }

    fn sample() -> String {
        [
            "template".to_string(),
            "    5".to_string(),
            gro_line(1, "ALA", "CA", 1, [0.1, 0.2, 0.3]),
            gro_line(1, "ALA", "CB", 2, [0.2, 0.2, 0.3]),
            gro_line(1, "ALA", "O", 3, [0.0, 0.0, 0.0]),
            gro_line(2, "GLY", "CA", 4, [0.5, 0.2, 0.3]),
            gro_line(2, "GLY", "O", 5, [0.6, 0.2, 0.3]),
            "   1.0   1.0   1.0".to_string(),
        ]
        .join("\n")
    }

    #[test]
    fn read_from_converts_nanometres_to_angstroms() {
        let template = GroFile::read_from(&mut Cursor::new(sample())).unwrap();
        assert_eq!(template.len(), 2);
        let alpha = template.residues[0].alpha;
        assert!((alpha.x - 1.0).abs() < TOLERANCE);
        assert!((alpha.y - 2.0).abs() < TOLERANCE);
        assert!((alpha.z - 3.0).abs() < TOLERANCE);
    }

    #[test]
    fn read_from_records_residue_types_and_missing_glycine_beta() {
        let template = GroFile::read_from(&mut Cursor::new(sample())).unwrap();
        assert_eq!(template.residues[0].residue_type, AminoAcid::Alanine);
        assert!(template.residues[0].beta.is_some());
        assert_eq!(template.residues[1].residue_type, AminoAcid::Glycine);
        assert!(template.residues[1].beta.is_none());
    }

    #[test]
    fn read_from_rejects_short_atom_list() {
        let text = [
            "template".to_string(),
            "3".to_string(),
            gro_line(1, "ALA", "CA", 1, [0.1, 0.2, 0.3]),
        ]
        .join("\n");
        let err = GroFile::read_from(&mut Cursor::new(text)).unwrap_err();
        assert!(matches!(
            err,
            GroError::AtomCount {
                expected: 3,
                found: 1
            }
        ));
    }

    #[test]
    fn read_from_rejects_unknown_residue_names() {
        let text = [
            "template".to_string(),
            "1".to_string(),
            gro_line(1, "XXX", "CA", 1, [0.1, 0.2, 0.3]),
        ]
        .join("\n");
        let err = GroFile::read_from(&mut Cursor::new(text)).unwrap_err();
        assert!(matches!(
            err,
            GroError::Parse {
                line: 3,
                kind: GroParseErrorKind::UnknownResidue(_)
            }
        ));
    }

    #[test]
    fn read_from_requires_alpha_carbon_per_residue() {
        let text = [
            "template".to_string(),
            "1".to_string(),
            gro_line(1, "ALA", "CB", 1, [0.1, 0.2, 0.3]),
        ]
        .join("\n");
        let err = GroFile::read_from(&mut Cursor::new(text)).unwrap_err();
        assert!(matches!(err, GroError::MissingAlpha { residue: 1 }));
    }
}
