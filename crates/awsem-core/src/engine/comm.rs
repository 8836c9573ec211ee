//! Cross-process reductions.
//!
//! The step has two global barriers (after the density pass and after the derived-coefficient
//! pass) plus the final energy reduction. All three go through [`Communicator::all_reduce_sum`].

use std::sync::{Arc, Barrier, Mutex};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommError {
    #[error("Rank {rank} contributed {found} values to a reduction of {expected}")]
    LengthMismatch {
        rank: usize,
        expected: usize,
        found: usize,
    },
    #[error("A peer rank panicked during a reduction")]
    Poisoned,
}

pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Replaces `values` on every rank by the elementwise sum over all ranks.
    fn all_reduce_sum(&self, values: &mut [f64]) -> Result<(), CommError>;

    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

/// A single process: every reduction is the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_reduce_sum(&self, _values: &mut [f64]) -> Result<(), CommError> {
        Ok(())
    }
}

#[derive(Debug)]
struct GroupState {
    sum: Vec<f64>,
    contributors: usize,
}

#[derive(Debug)]
struct Shared {
    size: usize,
    barrier: Barrier,
    state: Mutex<GroupState>,
}

/// Threads of one process acting as ranks. Each thread holds its own handle; a reduction
/// blocks until every handle of the group has joined it.
#[derive(Debug, Clone)]
pub struct LocalGroup {
    rank: usize,
    shared: Arc<Shared>,
}

impl LocalGroup {
    /// One handle per rank, in rank order.
    pub fn create(size: usize) -> Vec<LocalGroup> {
        let shared = Arc::new(Shared {
            size,
            barrier: Barrier::new(size),
            state: Mutex::new(GroupState {
                sum: Vec::new(),
                contributors: 0,
            }),
        });
        (0..size)
            .map(|rank| LocalGroup {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl Communicator for LocalGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn all_reduce_sum(&self, values: &mut [f64]) -> Result<(), CommError> {
        let shared = &self.shared;

        let contributed = {
            let mut state = shared.state.lock().map_err(|_| CommError::Poisoned)?;
            if state.contributors == 0 {
                state.sum.clear();
                state.sum.resize(values.len(), 0.0);
            }
            state.contributors += 1;
            if state.sum.len() == values.len() {
                for (acc, v) in state.sum.iter_mut().zip(values.iter()) {
                    *acc += v;
                }
                Ok(())
            } else {
                Err(CommError::LengthMismatch {
                    rank: self.rank,
                    expected: state.sum.len(),
                    found: values.len(),
                })
            }
        };

        // Sum complete.
        shared.barrier.wait();
        if contributed.is_ok() {
            let state = shared.state.lock().map_err(|_| CommError::Poisoned)?;
            values.copy_from_slice(&state.sum);
        }

        // Everyone has read the sum.
        if shared.barrier.wait().is_leader() {
            let mut state = shared.state.lock().map_err(|_| CommError::Poisoned)?;
            state.contributors = 0;
        }
        // Reset visible before the next reduction starts.
        shared.barrier.wait();

        contributed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn serial_reduction_is_identity() {
        let comm = SerialComm;
        let mut values = [1.0, -2.5, 3.0];
        comm.all_reduce_sum(&mut values).unwrap();
        assert_eq!(values, [1.0, -2.5, 3.0]);
        assert!(comm.is_root());
        assert_eq!(comm.size(), 1);
    }

    #[test]
    fn local_group_sums_across_all_ranks() {
        let handles = LocalGroup::create(3);
        let results: Vec<Vec<f64>> = thread::scope(|scope| {
            let workers: Vec<_> = handles
                .iter()
                .map(|comm| {
                    scope.spawn(move || {
                        let r = comm.rank() as f64;
                        let mut values = vec![r, 10.0 * r, 1.0];
                        comm.all_reduce_sum(&mut values).unwrap();
                        values
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });
        for values in results {
            assert_eq!(values, vec![3.0, 30.0, 3.0]);
        }
    }

    #[test]
    fn local_group_supports_consecutive_reductions_of_different_lengths() {
        let handles = LocalGroup::create(2);
        let results: Vec<(Vec<f64>, Vec<f64>)> = thread::scope(|scope| {
            let workers: Vec<_> = handles
                .iter()
                .map(|comm| {
                    scope.spawn(move || {
                        let mut first = vec![1.0; 4];
                        comm.all_reduce_sum(&mut first).unwrap();
                        let mut second = vec![comm.rank() as f64 + 1.0; 2];
                        comm.all_reduce_sum(&mut second).unwrap();
                        (first, second)
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });
        for (first, second) in results {
            assert_eq!(first, vec![2.0; 4]);
            assert_eq!(second, vec![3.0; 2]);
        }
    }

    #[test]
    fn local_group_reports_length_mismatch() {
        let handles = LocalGroup::create(2);
        let results: Vec<Result<(), CommError>> = thread::scope(|scope| {
            let workers: Vec<_> = handles
                .iter()
                .map(|comm| {
                    scope.spawn(move || {
                        let mut values = vec![1.0; comm.rank() + 1];
                        comm.all_reduce_sum(&mut values)
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    }
}
