//! Particle factory seam
//!
//! The host owns the actual visual objects (entities, models, collision
//! groups). The pool drives them through this trait and absorbs failures,
//! so a broken host call never aborts a tick.

use ember_core::{ParticleId, Result, Vec3};

/// Creates and manipulates the visual object behind one particle handle.
pub trait ParticleFactory {
    /// Construct the underlying visual object for a handle
    fn construct(&mut self, id: ParticleId) -> Result<()>;

    /// Activate the object in place at `position`
    fn activate(
        &mut self,
        id: ParticleId,
        position: Vec3,
        velocity: Vec3,
        angular_velocity: Vec3,
    ) -> Result<()>;

    /// Deactivate the object but keep it for reuse
    fn park(&mut self, id: ParticleId) -> Result<()>;

    /// Destroy the underlying object for good
    fn despawn(&mut self, id: ParticleId) -> Result<()>;
}

/// Factory that does nothing, for hosts without bindings and for tests.
#[derive(Default)]
pub struct NullFactory;

impl ParticleFactory for NullFactory {
    fn construct(&mut self, _id: ParticleId) -> Result<()> {
        Ok(())
    }

    fn activate(
        &mut self,
        _id: ParticleId,
        _position: Vec3,
        _velocity: Vec3,
        _angular_velocity: Vec3,
    ) -> Result<()> {
        Ok(())
    }

    fn park(&mut self, _id: ParticleId) -> Result<()> {
        Ok(())
    }

    fn despawn(&mut self, _id: ParticleId) -> Result<()> {
        Ok(())
    }
}
