use super::ids::ParticleId;
use nalgebra::Vector3;
use slotmap::SecondaryMap;

/// The host's force accumulator, keyed by particle.
///
/// The engine only ever adds into it; clearing between steps is the host's business.
#[derive(Debug, Clone, Default)]
pub struct ForceBuffer {
    forces: SecondaryMap<ParticleId, Vector3<f64>>,
}

impl ForceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&mut self, id: ParticleId, force: Vector3<f64>) {
        match self.forces.get_mut(id) {
            Some(slot) => *slot += force,
            None => {
                self.forces.insert(id, force);
            }
        }
    }

    pub fn get(&self, id: ParticleId) -> Vector3<f64> {
        self.forces.get(id).copied().unwrap_or_else(Vector3::zeros)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParticleId, &Vector3<f64>)> {
        self.forces.iter()
    }

    pub fn clear(&mut self) {
        self.forces.clear();
    }

    /// Sum of all forces; zero for any translation-invariant potential.
    pub fn net(&self) -> Vector3<f64> {
        self.forces.values().fold(Vector3::zeros(), |acc, f| acc + f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::particle::{Particle, ParticleKind};
    use crate::core::models::system::{ParticleSystem, SimulationBox};
    use nalgebra::Point3;

    #[test]
    fn add_accumulates_into_the_same_slot() {
        let mut system = ParticleSystem::new(SimulationBox::open());
        let id = system.add_particle(Particle::new(ParticleKind::Alpha, 1, 1, Point3::origin()));
        let mut forces = ForceBuffer::new();
        forces.add(id, Vector3::new(1.0, 0.0, 0.0));
        forces.add(id, Vector3::new(0.5, -1.0, 2.0));
        assert_eq!(forces.get(id), Vector3::new(1.5, -1.0, 2.0));
    }

    #[test]
    fn untouched_particle_reads_zero_force() {
        let mut system = ParticleSystem::new(SimulationBox::open());
        let id = system.add_particle(Particle::new(ParticleKind::Beta, 1, 1, Point3::origin()));
        let forces = ForceBuffer::new();
        assert_eq!(forces.get(id), Vector3::zeros());
        assert_eq!(forces.net(), Vector3::zeros());
    }
}
