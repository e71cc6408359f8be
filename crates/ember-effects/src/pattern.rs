//! Pattern generator seam
//!
//! Pattern math (explosion, spiral, wave, ring, fountain shapes) lives
//! outside the engine. The engine only needs concrete spawn points back.

use crate::definition::EffectDefinition;
use ember_core::Vec3;

/// One concrete spawn produced by a pattern generator
#[derive(Debug, Clone, Copy)]
pub struct SpawnPoint {
    pub position: Vec3,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl SpawnPoint {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }
}

/// Turns an effect definition plus an origin into concrete spawn points.
///
/// Implementations are host-provided and stateless in spirit; `&mut self`
/// allows an internal RNG. `count` already reflects any per-request
/// override, and `scale` is the quality-tier scale modifier.
pub trait PatternGenerator {
    fn generate(
        &mut self,
        definition: &EffectDefinition,
        origin: Vec3,
        count: u32,
        scale: f32,
    ) -> Vec<SpawnPoint>;
}
