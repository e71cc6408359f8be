//! Effect definitions (parsed from TOML) and their typed config dimensions

use ember_core::Vec3;

/// How a particle responds to forces over its lifetime
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhysicsMode {
    /// Position is driven by initial velocity only
    Disabled,
    /// Gravity and damping are applied each update
    Ballistic { gravity: Vec3, damping: f32 },
}

/// How a particle's visual scale evolves over its lifetime
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationMode {
    /// Scale stays at the definition's base value
    Static,
    /// Scale interpolates linearly from `start` to `end`
    Scaling { start: f32, end: f32 },
}

/// Configuration for one named effect, resolved through the registry
#[derive(Debug, Clone)]
pub struct EffectDefinition {
    /// Name of the pattern generator that produces spawn points
    pub pattern: String,
    pub count: u32,
    /// Half-angle spread in degrees, forwarded to the pattern generator
    pub spread: f32,
    pub speed_min: f32,
    pub speed_max: f32,
    pub lifetime_min: f32,
    pub lifetime_max: f32,
    pub scale: f32,
    pub physics: PhysicsMode,
    pub animation: AnimationMode,
    /// Default queue priority for spawn requests of this effect
    pub priority: i32,
}

impl Default for EffectDefinition {
    fn default() -> Self {
        Self {
            pattern: "burst".to_string(),
            count: 8,
            spread: 45.0,
            speed_min: 1.0,
            speed_max: 3.0,
            lifetime_min: 0.5,
            lifetime_max: 1.5,
            scale: 1.0,
            physics: PhysicsMode::Ballistic {
                gravity: Vec3::new(0.0, -9.81, 0.0),
                damping: 0.0,
            },
            animation: AnimationMode::Static,
            priority: 0,
        }
    }
}

impl EffectDefinition {
    /// Parse an EffectDefinition from a TOML component table
    pub fn from_toml(table: &toml::value::Table) -> Self {
        let mut def = Self::default();

        if let Some(v) = table.get("pattern") {
            if let Some(s) = v.as_str() {
                def.pattern = s.to_string();
            }
        }
        if let Some(v) = table.get("count") {
            let n = v.as_integer().unwrap_or(8).max(0) as u32;
            def.count = n.min(10000);
        }
        if let Some(v) = table.get("spread") {
            def.spread = toml_f32(v, def.spread);
        }
        if let Some(v) = table.get("speed_min") {
            def.speed_min = toml_f32(v, def.speed_min);
        }
        if let Some(v) = table.get("speed_max") {
            def.speed_max = toml_f32(v, def.speed_max);
        }
        if let Some(v) = table.get("lifetime_min") {
            def.lifetime_min = toml_f32(v, def.lifetime_min);
        }
        if let Some(v) = table.get("lifetime_max") {
            def.lifetime_max = toml_f32(v, def.lifetime_max);
        }
        if let Some(v) = table.get("scale") {
            def.scale = toml_f32(v, def.scale);
        }
        if let Some(v) = table.get("priority") {
            def.priority = v.as_integer().unwrap_or(0) as i32;
        }

        // Physics mode
        let physics_str = table
            .get("physics")
            .and_then(|v| v.as_str())
            .unwrap_or("ballistic");
        let gravity = table
            .get("gravity")
            .map(|v| toml_vec3(v, [0.0, -9.81, 0.0]))
            .unwrap_or([0.0, -9.81, 0.0]);
        let damping = table.get("damping").map(|v| toml_f32(v, 0.0)).unwrap_or(0.0);

        def.physics = match physics_str {
            "disabled" | "none" => PhysicsMode::Disabled,
            _ => PhysicsMode::Ballistic {
                gravity: Vec3::from_array(gravity),
                damping,
            },
        };

        // Animation mode
        let animation_str = table
            .get("animation")
            .and_then(|v| v.as_str())
            .unwrap_or("static");
        let scale_start = table
            .get("scale_start")
            .map(|v| toml_f32(v, def.scale))
            .unwrap_or(def.scale);
        let scale_end = table
            .get("scale_end")
            .map(|v| toml_f32(v, 0.0))
            .unwrap_or(0.0);

        def.animation = match animation_str {
            "scaling" => AnimationMode::Scaling {
                start: scale_start,
                end: scale_end,
            },
            _ => AnimationMode::Static,
        };

        def
    }
}

// ── TOML helpers (handle integer/float coercion) ──

fn toml_f32(v: &toml::Value, default: f32) -> f32 {
    v.as_float()
        .map(|f| f as f32)
        .or_else(|| v.as_integer().map(|i| i as f32))
        .unwrap_or(default)
}

fn toml_vec3(v: &toml::Value, default: [f32; 3]) -> [f32; 3] {
    if let Some(arr) = v.as_array() {
        if arr.len() >= 3 {
            return [
                toml_f32(&arr[0], default[0]),
                toml_f32(&arr[1], default[1]),
                toml_f32(&arr[2], default[2]),
            ];
        }
    }
    default
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_definition_is_sane() {
        let def = EffectDefinition::default();
        assert!(def.count > 0);
        assert!(def.lifetime_max >= def.lifetime_min);
        assert!(def.speed_max >= def.speed_min);
        assert!(def.scale > 0.0);
    }

    #[test]
    fn parse_from_toml() {
        let toml_str = r#"
pattern = "explosion"
count = 24
spread = 180.0
speed_min = 2.0
speed_max = 6.0
physics = "ballistic"
gravity = [0, -4, 0]
damping = 0.5
animation = "scaling"
scale_start = 1.5
scale_end = 0.0
priority = 10
"#;
        let table: toml::value::Table = toml::from_str(toml_str).unwrap();
        let def = EffectDefinition::from_toml(&table);
        assert_eq!(def.pattern, "explosion");
        assert_eq!(def.count, 24);
        assert_eq!(def.priority, 10);
        assert!((def.speed_max - 6.0).abs() < 0.01);
        match def.physics {
            PhysicsMode::Ballistic { gravity, damping } => {
                assert!((gravity.y - (-4.0)).abs() < 0.01);
                assert!((damping - 0.5).abs() < 0.01);
            }
            PhysicsMode::Disabled => panic!("Expected Ballistic physics"),
        }
        match def.animation {
            AnimationMode::Scaling { start, end } => {
                assert!((start - 1.5).abs() < 0.01);
                assert!(end.abs() < 0.01);
            }
            AnimationMode::Static => panic!("Expected Scaling animation"),
        }
    }

    #[test]
    fn parse_disabled_physics() {
        let table: toml::value::Table = toml::from_str("physics = \"disabled\"").unwrap();
        let def = EffectDefinition::from_toml(&table);
        assert_eq!(def.physics, PhysicsMode::Disabled);
    }

    #[test]
    fn toml_integer_float_coercion() {
        // TOML `gravity = [0, -10, 0]` gives integers, not floats
        let table: toml::value::Table = toml::from_str("gravity = [0, -10, 0]").unwrap();
        let def = EffectDefinition::from_toml(&table);
        match def.physics {
            PhysicsMode::Ballistic { gravity, .. } => {
                assert!(gravity.x.abs() < 0.01);
                assert!((gravity.y - (-10.0)).abs() < 0.01);
            }
            PhysicsMode::Disabled => panic!("Expected Ballistic physics"),
        }
    }

    #[test]
    fn count_is_clamped() {
        let table: toml::value::Table = toml::from_str("count = 500000").unwrap();
        let def = EffectDefinition::from_toml(&table);
        assert_eq!(def.count, 10000);
    }
}
