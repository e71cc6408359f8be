//! Spatial LOD: update-rate tiers by distance to reference points
//!
//! Particles near a reference position (usually the camera or player)
//! update every tick; further out they update on a divisor, and beyond
//! the radius they freeze entirely. With no reference points registered
//! the classifier fails open to the highest tier.

use ember_core::Vec3;

/// Update-rate tier for one particle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LodTier {
    /// Within 30% of the radius: update every tick
    High,
    /// Within 60%: update every 3rd tick
    Medium,
    /// Within 100%: update every 5th tick
    Low,
    /// Beyond the radius: frozen
    Skip,
}

impl LodTier {
    /// Tick divisor for this tier. Zero means never update.
    pub fn update_divisor(&self) -> u32 {
        match self {
            LodTier::High => 1,
            LodTier::Medium => 3,
            LodTier::Low => 5,
            LodTier::Skip => 0,
        }
    }
}

/// Distance-based tier classifier.
pub struct SpatialLod {
    reference_positions: Vec<Vec3>,
    update_radius: f32,
}

impl SpatialLod {
    pub fn new(update_radius: f32) -> Self {
        Self {
            reference_positions: Vec::new(),
            update_radius,
        }
    }

    pub fn set_update_radius(&mut self, radius: f32) {
        self.update_radius = radius;
    }

    pub fn update_radius(&self) -> f32 {
        self.update_radius
    }

    /// Replace the reference set. Called once per frame by the host.
    pub fn set_reference_positions(&mut self, positions: Vec<Vec3>) {
        self.reference_positions = positions;
    }

    pub fn reference_positions(&self) -> &[Vec3] {
        &self.reference_positions
    }

    /// Tier for `position`, judged against the nearest reference point.
    pub fn classify(&self, position: Vec3) -> LodTier {
        if self.reference_positions.is_empty() {
            return LodTier::High;
        }

        let nearest_sq = self
            .reference_positions
            .iter()
            .map(|r| r.distance_squared(&position))
            .fold(f32::INFINITY, f32::min);

        let radius = self.update_radius;
        if nearest_sq <= (radius * 0.3) * (radius * 0.3) {
            LodTier::High
        } else if nearest_sq <= (radius * 0.6) * (radius * 0.6) {
            LodTier::Medium
        } else if nearest_sq <= radius * radius {
            LodTier::Low
        } else {
            LodTier::Skip
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_by_distance() {
        let mut lod = SpatialLod::new(100.0);
        lod.set_reference_positions(vec![Vec3::ZERO]);

        assert_eq!(lod.classify(Vec3::new(10.0, 0.0, 0.0)), LodTier::High);
        assert_eq!(lod.classify(Vec3::new(45.0, 0.0, 0.0)), LodTier::Medium);
        assert_eq!(lod.classify(Vec3::new(80.0, 0.0, 0.0)), LodTier::Low);
        assert_eq!(lod.classify(Vec3::new(150.0, 0.0, 0.0)), LodTier::Skip);
    }

    #[test]
    fn boundary_distances_stay_in_lower_tier() {
        let mut lod = SpatialLod::new(100.0);
        lod.set_reference_positions(vec![Vec3::ZERO]);

        assert_eq!(lod.classify(Vec3::new(30.0, 0.0, 0.0)), LodTier::High);
        assert_eq!(lod.classify(Vec3::new(60.0, 0.0, 0.0)), LodTier::Medium);
        assert_eq!(lod.classify(Vec3::new(100.0, 0.0, 0.0)), LodTier::Low);
    }

    #[test]
    fn nearest_reference_wins() {
        let mut lod = SpatialLod::new(100.0);
        lod.set_reference_positions(vec![
            Vec3::new(-500.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
        ]);
        assert_eq!(lod.classify(Vec3::new(15.0, 0.0, 0.0)), LodTier::High);
    }

    #[test]
    fn no_references_fails_open_to_high() {
        let lod = SpatialLod::new(100.0);
        assert_eq!(lod.classify(Vec3::new(9999.0, 0.0, 0.0)), LodTier::High);
    }

    #[test]
    fn divisors_match_tiers() {
        assert_eq!(LodTier::High.update_divisor(), 1);
        assert_eq!(LodTier::Medium.update_divisor(), 3);
        assert_eq!(LodTier::Low.update_divisor(), 5);
        assert_eq!(LodTier::Skip.update_divisor(), 0);
    }
}
