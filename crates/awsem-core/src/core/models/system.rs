use super::ids::ParticleId;
use super::particle::Particle;
use nalgebra::{Point3, Vector3};
use slotmap::SlotMap;

/// The simulation cell as described by the host: edge lengths and which
/// dimensions are periodic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationBox {
    pub lengths: Vector3<f64>,
    pub periodic: [bool; 3],
}

impl Default for SimulationBox {
    fn default() -> Self {
        Self::open()
    }
}

impl SimulationBox {
    /// A box with no periodic dimension; image counters are ignored.
    pub fn open() -> Self {
        Self {
            lengths: Vector3::zeros(),
            periodic: [false; 3],
        }
    }

    pub fn periodic(lengths: Vector3<f64>) -> Self {
        Self {
            lengths,
            periodic: [true; 3],
        }
    }

    /// Maps a wrapped position back to its continuous trajectory using the image counters.
    pub fn unwrap(&self, position: &Point3<f64>, image: &[i32; 3]) -> Point3<f64> {
        let mut unwrapped = *position;
        for dim in 0..3 {
            if self.periodic[dim] {
                unwrapped[dim] += image[dim] as f64 * self.lengths[dim];
            }
        }
        unwrapped
    }
}

/// The host's particle store for one process: owned particles plus the ghost halo.
#[derive(Debug, Clone, Default)]
pub struct ParticleSystem {
    particles: SlotMap<ParticleId, Particle>,
    sim_box: SimulationBox,
}

impl ParticleSystem {
    pub fn new(sim_box: SimulationBox) -> Self {
        Self {
            particles: SlotMap::with_key(),
            sim_box,
        }
    }

    pub fn add_particle(&mut self, particle: Particle) -> ParticleId {
        self.particles.insert(particle)
    }

    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.particles.get(id)
    }

    pub fn particle_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        self.particles.get_mut(id)
    }

    pub fn particles_iter(&self) -> impl Iterator<Item = (ParticleId, &Particle)> {
        self.particles.iter()
    }

    pub fn particles_iter_mut(&mut self) -> impl Iterator<Item = (ParticleId, &mut Particle)> {
        self.particles.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn sim_box(&self) -> &SimulationBox {
        &self.sim_box
    }

    pub fn set_sim_box(&mut self, sim_box: SimulationBox) {
        self.sim_box = sim_box;
    }

    /// The particle's position with periodic wrapping undone.
    pub fn unwrapped_position(&self, id: ParticleId) -> Option<Point3<f64>> {
        self.particles
            .get(id)
            .map(|p| self.sim_box.unwrap(&p.position, &p.image))
    }
}
