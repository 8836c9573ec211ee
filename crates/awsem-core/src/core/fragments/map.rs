use super::memory::MemoryLibrary;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Memory {memory}: window {start}..{end} extends past the {residue_count} target residues")]
pub struct MapError {
    pub memory: usize,
    pub start: usize,
    pub end: usize,
    pub residue_count: usize,
}

/// For each target residue, the memories whose window can anchor an interaction there.
///
/// Memory `m` covering `[pos, pos + len)` is listed at every `i` in `pos..pos + len - min_sep`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentMap {
    entries: Vec<Vec<usize>>,
}

impl FragmentMap {
    pub fn build(
        library: &MemoryLibrary,
        residue_count: usize,
        min_sep: usize,
    ) -> Result<Self, MapError> {
        let mut entries = vec![Vec::new(); residue_count];
        for (m, memory) in library.iter().enumerate() {
            let end = memory.target_end();
            if end > residue_count {
                return Err(MapError {
                    memory: m,
                    start: memory.target_start,
                    end,
                    residue_count,
                });
            }
            for i in memory.target_start..end.saturating_sub(min_sep) {
                entries[i].push(m);
            }
        }
        Ok(Self { entries })
    }

    pub fn memories_at(&self, residue: usize) -> &[usize] {
        self.entries.get(residue).map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
