use super::params::{ParamLoadError, read_tokens};
use crate::core::io::tokens::Tokens;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// One restrained residue pair: a Gaussian well of depth `weight` centered on `r0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactRestraint {
    /// Already multiplied by the section strength.
    pub weight: f64,
    pub r0: f64,
}

/// Restraints keyed by residue pair `(i, j)` with `i < j`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactRestraints {
    pairs: HashMap<(usize, usize), ContactRestraint>,
    max_r0: f64,
}

impl ContactRestraints {
    pub fn load(path: &Path, strength: f64, residue_count: usize) -> Result<Self, ParamLoadError> {
        let mut tokens = read_tokens(path)?;
        let restraints = Self::parse(&mut tokens, strength, residue_count)?;
        info!(
            path = %path.display(),
            restraints = restraints.len(),
            max_r0 = restraints.max_r0,
            "Loaded contact restraints"
        );
        Ok(restraints)
    }

    /// Reads `i j weight r0` records with 1-based residue numbers in either order.
    pub fn parse(
        tokens: &mut Tokens,
        strength: f64,
        residue_count: usize,
    ) -> Result<Self, ParamLoadError> {
        let mut restraints = Self::default();
        let mut record = 0;
        while !tokens.is_exhausted() {
            record += 1;
            let what = format!("restraint {record}");
            let a = tokens.next_usize(&what)?;
            let b = tokens.next_usize(&what)?;
            let weight = tokens.next_f64(&what)? * strength;
            let r0 = tokens.next_f64(&what)?;

            let (i, j) = (a.min(b), a.max(b));
            if i == 0 || j > residue_count {
                return Err(ParamLoadError::Invalid {
                    origin: tokens.origin().to_string(),
                    what,
                    message: format!(
                        "residues {a} and {b} must lie in 1..={residue_count}"
                    ),
                });
            }
            let key = (i - 1, j - 1);
            if restraints.pairs.contains_key(&key) {
                warn!(i = a, j = b, "Duplicate contact restraint ignored; the first one is kept");
                continue;
            }
            restraints.pairs.insert(key, ContactRestraint { weight, r0 });
            restraints.max_r0 = restraints.max_r0.max(r0);
        }
        Ok(restraints)
    }

    pub fn get(&self, i: usize, j: usize) -> Option<&ContactRestraint> {
        self.pairs.get(&(i.min(j), i.max(j)))
    }

    pub fn max_r0(&self) -> f64 {
        self.max_r0
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str, n: usize) -> Result<ContactRestraints, ParamLoadError> {
        ContactRestraints::parse(&mut Tokens::from_text("cr.dat", text), 2.0, n)
    }

    #[test]
    fn records_are_symmetric_zero_based_and_scaled() {
        let restraints = parse("5 2 1.5 8.0\n1 3 0.5 12.0\n", 5).unwrap();

        assert_eq!(restraints.len(), 2);
        let r = restraints.get(1, 4).unwrap();
        assert_eq!(r.weight, 3.0);
        assert_eq!(r.r0, 8.0);
        assert_eq!(restraints.get(4, 1), Some(r));
        assert_eq!(restraints.max_r0(), 12.0);
        assert!(restraints.get(0, 1).is_none());
    }

    #[test]
    fn first_duplicate_wins() {
        let restraints = parse("1 3 1.0 8.0\n3 1 4.0 6.0\n", 4).unwrap();

        assert_eq!(restraints.len(), 1);
        assert_eq!(restraints.get(0, 2).unwrap().r0, 8.0);
    }

    #[test]
    fn out_of_range_residue_is_rejected() {
        let err = parse("1 6 1.0 8.0\n", 5).unwrap_err();

        assert!(err.to_string().contains("restraint 1"));
        assert!(matches!(parse("0 2 1.0 8.0\n", 5), Err(ParamLoadError::Invalid { .. })));
    }

    #[test]
    fn truncated_record_is_a_token_error() {
        let err = parse("1 3 1.0\n", 5).unwrap_err();

        assert!(matches!(err, ParamLoadError::Token(_)));
    }
}
