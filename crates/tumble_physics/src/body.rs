//! Rigid body types for 2D simulation

use crate::error::PhysicsError;
use slotmap::new_key_type;
use tumble_math::Vec2;

// Define generational key type for rigid bodies
new_key_type! {
    /// Key to a rigid body in a space
    ///
    /// Uses generational indexing to prevent the ABA problem where a handle
    /// could point to a reused slot. If a body is removed and its slot reused,
    /// old keys will return None instead of pointing to the wrong body.
    pub struct BodyKey;
}

/// Whether a body is moved by the simulation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    /// Integrated and solved every step
    Dynamic,
    /// Infinite mass and moment; never moved by forces or impulses
    Static,
}

/// A 2D rigid body: mass, pose, velocity, and force accumulators
///
/// Forces accumulated with [`Body::apply_force`] are consumed and reset by
/// [`Body::integrate_forces`] once per step; they are per-step inputs, not
/// persistent fields.
#[derive(Clone, Debug)]
pub struct Body {
    kind: BodyKind,
    mass: f32,
    inv_mass: f32,
    moment: f32,
    inv_moment: f32,
    /// World position of the center of mass
    pub position: Vec2,
    /// Orientation in radians
    pub angle: f32,
    /// Linear velocity (units per second)
    pub velocity: Vec2,
    /// Angular velocity (radians per second)
    pub angular_velocity: f32,
    force: Vec2,
    torque: f32,
    sleeping: bool,
    idle_time: f32,
}

impl Body {
    /// Create a dynamic body with the given mass and moment of inertia
    ///
    /// Fails with [`PhysicsError::DegenerateMass`] when either value is
    /// zero, negative, or non-finite. Use the `moment_for_*` helpers in
    /// [`crate::shapes`] to compute moments from geometry.
    pub fn new(mass: f32, moment: f32) -> Result<Self, PhysicsError> {
        if !(mass.is_finite() && moment.is_finite()) || mass <= 0.0 || moment <= 0.0 {
            return Err(PhysicsError::DegenerateMass { mass, moment });
        }
        Ok(Self {
            kind: BodyKind::Dynamic,
            mass,
            inv_mass: 1.0 / mass,
            moment,
            inv_moment: 1.0 / moment,
            position: Vec2::ZERO,
            angle: 0.0,
            velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            force: Vec2::ZERO,
            torque: 0.0,
            sleeping: false,
            idle_time: 0.0,
        })
    }

    /// Create a static body (infinite mass, never moves)
    pub fn new_static() -> Self {
        Self {
            kind: BodyKind::Static,
            mass: 0.0,
            inv_mass: 0.0,
            moment: 0.0,
            inv_moment: 0.0,
            position: Vec2::ZERO,
            angle: 0.0,
            velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            force: Vec2::ZERO,
            torque: 0.0,
            sleeping: false,
            idle_time: 0.0,
        }
    }

    /// Set the position of this body
    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    /// Set the orientation of this body in radians
    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    /// Set the velocity of this body
    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn is_static(&self) -> bool {
        self.kind == BodyKind::Static
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Inverse mass; zero for static bodies
    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    pub fn moment(&self) -> f32 {
        self.moment
    }

    /// Inverse moment of inertia; zero for static bodies
    pub fn inv_moment(&self) -> f32 {
        self.inv_moment
    }

    /// Unit vector for the current orientation
    pub fn rotation(&self) -> Vec2 {
        Vec2::for_angle(self.angle)
    }

    /// Whether the body is currently excluded from simulation
    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    /// Return the body to active simulation
    pub fn wake(&mut self) {
        self.sleeping = false;
        self.idle_time = 0.0;
    }

    /// Accumulate a force applied at `offset` from the center of mass
    ///
    /// The offset contributes `offset x force` of torque. Nothing changes
    /// until the next [`Body::integrate_forces`]. No-op on static bodies;
    /// wakes a sleeping dynamic body.
    pub fn apply_force(&mut self, force: Vec2, offset: Vec2) {
        if self.is_static() {
            return;
        }
        self.wake();
        self.force += force;
        self.torque += offset.cross(force);
    }

    /// Accumulate an instantaneous momentum change at `offset`
    ///
    /// Unlike a force, the velocity changes immediately.
    pub fn apply_impulse(&mut self, impulse: Vec2, offset: Vec2) {
        if self.is_static() {
            return;
        }
        self.wake();
        self.velocity += impulse * self.inv_mass;
        self.angular_velocity += offset.cross(impulse) * self.inv_moment;
    }

    /// Integrate accumulated forces and gravity into velocity
    ///
    /// Resets the force and torque accumulators afterwards. Skipped for
    /// static and sleeping bodies.
    pub fn integrate_forces(&mut self, gravity: Vec2, dt: f32) {
        if self.is_static() || self.sleeping {
            return;
        }
        self.velocity += (gravity + self.force * self.inv_mass) * dt;
        self.angular_velocity += self.torque * self.inv_moment * dt;
        self.force = Vec2::ZERO;
        self.torque = 0.0;
    }

    /// Integrate velocity into position and orientation
    ///
    /// Skipped for static and sleeping bodies.
    pub fn integrate_velocity(&mut self, dt: f32) {
        if self.is_static() || self.sleeping {
            return;
        }
        self.position += self.velocity * dt;
        self.angle += self.angular_velocity * dt;
    }

    /// Track idle time against the sleep thresholds
    ///
    /// Returns true when the body transitioned to sleeping this call.
    /// Angular velocity in rad/s is gated by the same `idle_speed`
    /// threshold as linear speed, not scaled by a characteristic length;
    /// see `SpaceConfig::idle_speed_threshold`.
    pub(crate) fn update_sleep(&mut self, idle_speed: f32, time_threshold: f32, dt: f32) -> bool {
        if self.is_static() || self.sleeping {
            return false;
        }
        let idle = self.velocity.length_squared() <= idle_speed * idle_speed
            && self.angular_velocity.abs() <= idle_speed.max(f32::EPSILON);
        if !idle {
            self.idle_time = 0.0;
            return false;
        }
        self.idle_time += dt;
        if self.idle_time >= time_threshold {
            self.sleeping = true;
            self.velocity = Vec2::ZERO;
            self.angular_velocity = 0.0;
            return true;
        }
        false
    }
}
