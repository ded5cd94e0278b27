//! Error types for body construction and space registration

use std::fmt;

/// Error type for physics operations
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// Malformed shape construction (self-intersecting polygon, too few
    /// vertices, non-finite geometry). Fatal to the construction call,
    /// does not touch any space.
    InvalidGeometry(String),
    /// Remove or lookup referencing an entity that is not registered.
    /// Recoverable; the caller decides.
    NotFound(&'static str),
    /// Zero, negative, or non-finite mass/moment for a dynamic body.
    DegenerateMass { mass: f32, moment: f32 },
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicsError::InvalidGeometry(msg) => write!(f, "invalid geometry: {}", msg),
            PhysicsError::NotFound(what) => write!(f, "{} is not registered in this space", what),
            PhysicsError::DegenerateMass { mass, moment } => {
                write!(f, "degenerate mass for dynamic body: mass={}, moment={}", mass, moment)
            }
        }
    }
}

impl std::error::Error for PhysicsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = PhysicsError::InvalidGeometry("polygon needs at least 3 vertices".into());
        assert!(err.to_string().contains("at least 3 vertices"));

        let err = PhysicsError::NotFound("body");
        assert_eq!(err.to_string(), "body is not registered in this space");

        let err = PhysicsError::DegenerateMass { mass: 0.0, moment: 1.0 };
        assert!(err.to_string().contains("mass=0"));
    }

    #[test]
    fn test_is_std_error() {
        fn assert_error<E: std::error::Error>(_: &E) {}
        assert_error(&PhysicsError::NotFound("shape"));
    }
}
