use super::error::EngineError;
use super::evaluator::StepEnergies;
use crate::core::forcefield::term::TermKind;
use csv::{Writer, WriterBuilder};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tab-separated per-step energy table: `Step`, one column per active term in registry
/// order, then `VTotal`. Rows are flushed as they are written.
pub struct EnergyLog {
    path: PathBuf,
    columns: Vec<TermKind>,
    writer: Writer<File>,
}

impl EnergyLog {
    pub fn create(path: &Path, columns: Vec<TermKind>) -> Result<Self, EngineError> {
        let writer = WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(path)
            .map_err(|source| log_error(path, source))?;
        let mut log = Self {
            path: path.to_path_buf(),
            columns,
            writer,
        };

        let mut header = Vec::with_capacity(log.columns.len() + 2);
        header.push("Step");
        header.extend(log.columns.iter().map(|kind| kind.label()));
        header.push("VTotal");
        log.writer
            .write_record(&header)
            .map_err(|source| log_error(&log.path, source))?;
        log.flush()?;

        debug!(path = %path.display(), columns = log.columns.len(), "Opened energy log");
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&mut self, step: &StepEnergies) -> Result<(), EngineError> {
        let mut record = Vec::with_capacity(self.columns.len() + 2);
        record.push(step.step.to_string());
        record.extend(
            self.columns
                .iter()
                .map(|&kind| format!("{:.6}", step.energies.get(kind))),
        );
        record.push(format!("{:.6}", step.total()));
        self.writer
            .write_record(&record)
            .map_err(|source| log_error(&self.path, source))?;
        self.flush()
    }

    fn flush(&mut self) -> Result<(), EngineError> {
        self.writer
            .flush()
            .map_err(|source| log_error(&self.path, csv::Error::from(source)))
    }
}

fn log_error(path: &Path, source: csv::Error) -> EngineError {
    EngineError::EnergyLog {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::term::EnergyVector;
    use std::fs;
    use tempfile::tempdir;

    fn step(step: u64, values: &[(TermKind, f64)]) -> StepEnergies {
        let mut energies = EnergyVector::new();
        for &(kind, value) in values {
            energies.accumulate(kind, value);
        }
        StepEnergies { step, energies }
    }

    #[test]
    fn header_lists_active_terms_between_step_and_total() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("energy.log");
        EnergyLog::create(&path, vec![TermKind::Chain, TermKind::Dssp, TermKind::FragmentMemory])
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Step\tChain\tDSSP\tFrag_Mem\tVTotal\n");
    }

    #[test]
    fn each_step_appends_one_row_with_six_decimals() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("energy.log");
        let mut log = EnergyLog::create(&path, vec![TermKind::Chain, TermKind::Water]).unwrap();

        log.write(&step(0, &[(TermKind::Chain, 1.5), (TermKind::Water, -0.25)]))
            .unwrap();
        log.write(&step(10, &[(TermKind::Chain, 2.0)])).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "0\t1.500000\t-0.250000\t1.250000");
        assert_eq!(lines[2], "10\t2.000000\t0.000000\t2.000000");
    }

    #[test]
    fn unwritable_path_is_reported_with_its_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("energy.log");

        let result = EnergyLog::create(&path, vec![TermKind::Chain]);

        match result {
            Err(EngineError::EnergyLog { path: reported, .. }) => {
                assert!(reported.ends_with("energy.log"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("log created under a missing directory"),
        }
    }
}
