//! Ember Effects - effect definitions and their registry
//!
//! Provides:
//! - Typed effect definitions parsed from TOML tables
//! - An explicit host-owned registry resolving definitions by name
//! - The pattern-generator seam the lifecycle engine calls into

pub mod definition;
pub mod pattern;
pub mod registry;

pub use definition::{AnimationMode, EffectDefinition, PhysicsMode};
pub use pattern::{PatternGenerator, SpawnPoint};
pub use registry::EffectRegistry;
