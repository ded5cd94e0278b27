//! 2D rigid-body physics for Tumble
//!
//! This crate provides the complete simulation core:
//! - Collision shapes (circles, convex polygons, thick segments)
//! - Narrow-phase collision detection with single-point contacts
//! - Rigid body dynamics with gravity, forces, and sleeping
//! - A sequential-impulse solver with restitution and friction
//! - Pivot joints and screen-boundary segment management

pub mod body;
pub mod collision;
pub mod error;
pub mod joint;
pub mod material;
pub mod shapes;
pub mod solver;
pub mod space;
pub mod window;

// Re-export commonly used types
pub use body::{Body, BodyKey, BodyKind};
pub use collision::Contact;
pub use error::PhysicsError;
pub use joint::{ConstraintKey, PivotJoint};
pub use material::Material;
pub use shapes::{
    moment_for_box, moment_for_circle, moment_for_poly, moment_for_segment, Aabb, Categories,
    Geometry, Shape, ShapeFilter, ShapeKey,
};
pub use space::{Space, SpaceConfig};
pub use window::BodyWindow;
