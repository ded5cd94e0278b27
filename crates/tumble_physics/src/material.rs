//! Surface material properties for contact response

use serde::{Serialize, Deserialize};

/// Surface material attached to a shape
///
/// Elasticity controls how much of the approach speed survives a bounce
/// (0.0 = dead stop, 1.0 = perfect bounce). Friction is the Coulomb
/// coefficient limiting the tangential contact impulse.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Coefficient of restitution, clamped to [0, 1]
    pub elasticity: f32,
    /// Coulomb friction coefficient, >= 0
    pub friction: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            elasticity: 0.0,
            friction: 0.5,
        }
    }
}

impl Material {
    /// Frictionless, perfectly elastic surface
    pub const BOUNCY: Self = Self {
        elasticity: 1.0,
        friction: 0.0,
    };

    /// Wood-like surface: some grip, a little bounce
    pub const WOOD: Self = Self {
        elasticity: 0.2,
        friction: 0.5,
    };

    /// Ice-like surface: almost no grip
    pub const ICE: Self = Self {
        elasticity: 0.1,
        friction: 0.05,
    };

    /// Rubber-like surface: high grip, lively bounce
    pub const RUBBER: Self = Self {
        elasticity: 0.8,
        friction: 0.9,
    };

    /// Create a material with the given elasticity and friction
    ///
    /// Elasticity is clamped to [0, 1]; friction is clamped to be
    /// non-negative.
    pub fn new(elasticity: f32, friction: f32) -> Self {
        Self {
            elasticity: elasticity.clamp(0.0, 1.0),
            friction: friction.max(0.0),
        }
    }

    /// Combine the materials of two touching shapes
    ///
    /// Both coefficients combine by product, so a contact is only
    /// perfectly elastic when both surfaces are, and frictionless as soon
    /// as either surface is.
    pub fn combine(&self, other: &Self) -> Self {
        Self {
            elasticity: self.elasticity * other.elasticity,
            friction: self.friction * other.friction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_material() {
        let material = Material::default();
        assert_eq!(material.elasticity, 0.0);
        assert_eq!(material.friction, 0.5);
    }

    #[test]
    fn test_new_clamps_values() {
        let material = Material::new(1.5, -0.5);
        assert_eq!(material.elasticity, 1.0);
        assert_eq!(material.friction, 0.0);

        let material = Material::new(-1.0, 2.0);
        assert_eq!(material.elasticity, 0.0);
        assert_eq!(material.friction, 2.0); // friction may exceed 1
    }

    #[test]
    fn test_combine_is_product() {
        let a = Material::new(0.5, 0.4);
        let b = Material::new(0.5, 0.5);
        let combined = a.combine(&b);
        assert!((combined.elasticity - 0.25).abs() < 1e-6);
        assert!((combined.friction - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_combine_preserves_perfect_bounce() {
        let combined = Material::BOUNCY.combine(&Material::BOUNCY);
        assert_eq!(combined.elasticity, 1.0);
        assert_eq!(combined.friction, 0.0);
    }

    #[test]
    fn test_combine_is_commutative() {
        let a = Material::new(0.3, 0.5);
        let b = Material::new(0.7, 0.2);
        assert_eq!(a.combine(&b), b.combine(&a));
    }
}
