use super::residue::{AminoAcid, ParseAminoAcidError};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Chain {chain} position {position}: {source}")]
    UnknownResidue {
        chain: usize,
        position: usize,
        #[source]
        source: ParseAminoAcidError,
    },
    #[error("Sequence file contains no chains")]
    Empty,
}

/// The contiguous run of global residue indices that makes up one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSpan {
    pub start: usize,
    pub len: usize,
}

impl ChainSpan {
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end()
    }
}

/// The full residue sequence of the simulated system, all chains concatenated.
///
/// Global residue index `i` corresponds to the host's sequence tag `i + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    residues: Vec<AminoAcid>,
    chains: Vec<ChainSpan>,
    chain_of: Vec<usize>,
}

impl Sequence {
    pub fn from_chains<I, S>(chains: I) -> Result<Self, SequenceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut residues = Vec::new();
        let mut spans = Vec::new();
        let mut chain_of = Vec::new();

        for (chain_idx, chain) in chains.into_iter().enumerate() {
            let start = residues.len();
            for (position, letter) in chain.as_ref().chars().enumerate() {
                let aa = AminoAcid::from_letter(letter).map_err(|source| {
                    SequenceError::UnknownResidue {
                        chain: chain_idx + 1,
                        position: position + 1,
                        source,
                    }
                })?;
                residues.push(aa);
                chain_of.push(chain_idx);
            }
            spans.push(ChainSpan {
                start,
                len: residues.len() - start,
            });
        }

        if residues.is_empty() {
            return Err(SequenceError::Empty);
        }

        Ok(Self {
            residues,
            chains: spans,
            chain_of,
        })
    }

    /// Parses whitespace-separated chains; tokens starting with `#` are skipped.
    pub fn parse(text: &str) -> Result<Self, SequenceError> {
        Self::from_chains(
            text.split_whitespace()
                .filter(|token| !token.starts_with('#')),
        )
    }

    pub fn read_from(reader: &mut impl BufRead) -> Result<Self, SequenceError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::parse(&text)
    }

    pub fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self, SequenceError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    pub fn residue_type(&self, index: usize) -> Option<AminoAcid> {
        self.residues.get(index).copied()
    }

    pub fn residues(&self) -> &[AminoAcid] {
        &self.residues
    }

    pub fn chains(&self) -> &[ChainSpan] {
        &self.chains
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    /// The 0-based chain ordinal of a residue.
    pub fn chain_index(&self, index: usize) -> Option<usize> {
        self.chain_of.get(index).copied()
    }

    pub fn chain_span(&self, index: usize) -> Option<ChainSpan> {
        self.chain_index(index).map(|c| self.chains[c])
    }

    pub fn is_first(&self, index: usize) -> bool {
        self.chain_span(index).is_some_and(|span| span.start == index)
    }

    pub fn is_last(&self, index: usize) -> bool {
        self.chain_span(index)
            .is_some_and(|span| span.end() == index + 1)
    }

    pub fn same_chain(&self, a: usize, b: usize) -> bool {
        match (self.chain_index(a), self.chain_index(b)) {
            (Some(ca), Some(cb)) => ca == cb,
            _ => false,
        }
    }

    /// The exclusive end of the chain containing `index`.
    pub fn chain_end(&self, index: usize) -> Option<usize> {
        self.chain_span(index).map(|span| span.end())
    }

    pub fn to_letters(&self) -> Vec<String> {
        self.chains
            .iter()
            .map(|span| {
                self.residues[span.start..span.end()]
                    .iter()
                    .map(|aa| aa.letter())
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_concatenates_chains_in_file_order() {
        let seq = Sequence::parse("ACDG\nKLM\n").unwrap();
        assert_eq!(seq.len(), 7);
        assert_eq!(seq.chain_count(), 2);
        assert_eq!(seq.chains()[1], ChainSpan { start: 4, len: 3 });
        assert_eq!(seq.residue_type(3), Some(AminoAcid::Glycine));
        assert_eq!(seq.residue_type(4), Some(AminoAcid::Lysine));
    }

    #[test]
    fn parse_skips_comment_tokens() {
        let seq = Sequence::parse("#header\nAAA").unwrap();
        assert_eq!(seq.chain_count(), 1);
        assert_eq!(seq.len(), 3);
    }

    #[test]
    fn terminus_queries_respect_chain_boundaries() {
        let seq = Sequence::parse("AAA GG").unwrap();
        assert!(seq.is_first(0));
        assert!(seq.is_last(2));
        assert!(seq.is_first(3));
        assert!(seq.is_last(4));
        assert!(!seq.is_first(1));
        assert!(!seq.is_last(3));
        assert!(seq.same_chain(0, 2));
        assert!(!seq.same_chain(2, 3));
        assert_eq!(seq.chain_end(1), Some(3));
        assert!(!seq.is_first(99));
    }

    #[test]
    fn parse_reports_chain_and_position_of_unknown_letter() {
        let err = Sequence::parse("AAA AXA").unwrap_err();
        match err {
            SequenceError::UnknownResidue {
                chain, position, ..
            } => {
                assert_eq!(chain, 2);
                assert_eq!(position, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_empty_input() {
        assert!(matches!(
            Sequence::parse("  #comment\n"),
            Err(SequenceError::Empty)
        ));
    }

    #[test]
    fn parse_skips_only_the_comment_token_itself() {
        let seq = Sequence::parse("#chainA MKV\n").unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.chain_count(), 1);
    }

    #[test]
    fn read_from_reads_whole_stream() {
        let mut cursor = Cursor::new("MKV\n");
        let seq = Sequence::read_from(&mut cursor).unwrap();
        assert_eq!(seq.to_letters(), vec!["MKV".to_string()]);
    }
}
