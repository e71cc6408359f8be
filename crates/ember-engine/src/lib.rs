//! Ember Engine - particle lifecycle and adaptive performance
//!
//! Provides the frame-driven core of the Ember particle system:
//! - Reusable handle pool with deferred settle/park transitions
//! - Densely packed attribute store for transient per-particle data
//! - Priority effect queue with batching and staleness eviction
//! - Distance-based LOD tiers and an adaptive quality controller

pub mod clock;
pub mod engine;
pub mod factory;
pub mod lod;
pub mod perf;
pub mod pool;
pub mod queue;
pub mod rand;
pub mod store;

pub use clock::FrameClock;
pub use engine::{EngineConfig, ParticleEngine, SpawnOptions};
pub use factory::{NullFactory, ParticleFactory};
pub use lod::{LodTier, SpatialLod};
pub use perf::{PerfConfig, PerfMetrics, PerformanceController, QualityLevel, QualityTier};
pub use pool::{ParticleConfig, ParticleHandle, PoolConfig, PoolStats, ResourcePool};
pub use queue::{EffectQueue, EffectRequest, QueueConfig, QueueStats, SpawnOverrides};
pub use store::{AttributeStore, SlotFlags};
