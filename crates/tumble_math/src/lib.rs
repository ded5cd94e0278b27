//! 2D Mathematics Library
//!
//! This crate provides the 2D vector type for the tumble physics engine.
//!
//! ## Core Types
//!
//! - [`Vec2`] - 2D vector with x, y components

mod vec2;

pub use vec2::Vec2;
