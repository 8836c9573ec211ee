use super::error::EngineError;
use crate::core::backbone::sites::{Site, SiteForces};
use crate::core::forcefield::term::{EnergyVector, TermKind};
use nalgebra::Vector3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A partial result of one worker that can be combined with another.
pub trait Partial: Send + Sized {
    fn merge(self, other: Self) -> Self;
}

/// Energies and site forces collected by one worker of a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    pub energies: EnergyVector,
    pub forces: SiteForces,
}

impl Accumulator {
    pub fn new(residue_count: usize) -> Self {
        Self {
            energies: EnergyVector::new(),
            forces: SiteForces::new(residue_count),
        }
    }

    #[inline]
    pub fn add_energy(&mut self, kind: TermKind, value: f64) {
        self.energies.accumulate(kind, value);
    }

    #[inline]
    pub fn add_force(&mut self, residue: usize, site: Site, force: Vector3<f64>) {
        self.forces.add(residue, site, force);
    }

    /// Adds `force` to site `a` and its opposite to site `b`.
    #[inline]
    pub fn add_pair_force(
        &mut self,
        a: (usize, Site),
        b: (usize, Site),
        force: Vector3<f64>,
    ) {
        self.forces.add(a.0, a.1, force);
        self.forces.add(b.0, b.1, -force);
    }
}

impl Partial for Accumulator {
    fn merge(mut self, other: Self) -> Self {
        self.energies += other.energies;
        self.forces += &other.forces;
        self
    }
}

/// Folds `visit` over `items` into per-worker partials and merges them.
///
/// The first error raised by any worker aborts the fold.
pub fn fold_items<I, T, Init, Visit>(items: &[I], init: Init, visit: Visit) -> Result<T, EngineError>
where
    I: Sync,
    T: Partial,
    Init: Fn() -> T + Sync + Send,
    Visit: Fn(&mut T, &I) -> Result<(), EngineError> + Sync + Send,
{
    #[cfg(not(feature = "parallel"))]
    let result = items.iter().try_fold(init(), |mut acc, item| {
        visit(&mut acc, item)?;
        Ok(acc)
    });

    #[cfg(feature = "parallel")]
    let result = items
        .par_iter()
        .try_fold(&init, |mut acc, item| {
            visit(&mut acc, item)?;
            Ok(acc)
        })
        .try_reduce(&init, |a, b| Ok(a.merge(b)));

    result
}
