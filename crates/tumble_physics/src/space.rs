//! The simulation space that owns bodies, shapes, and constraints

use slotmap::SlotMap;
use tumble_math::Vec2;

use crate::body::{Body, BodyKey};
use crate::collision::{collide, Contact};
use crate::error::PhysicsError;
use crate::joint::{ConstraintKey, PivotJoint};
use crate::material::Material;
use crate::shapes::{Shape, ShapeFilter, ShapeKey};
use crate::solver::ContactConstraint;

/// Configuration for a simulation space
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SpaceConfig {
    /// Acceleration applied to every dynamic body each step
    pub gravity: Vec2,
    /// Solver iterations per step
    pub iterations: u32,
    /// Seconds a body must stay idle before it falls asleep
    ///
    /// Infinite by default, which disables sleeping entirely.
    pub sleep_time_threshold: f32,
    /// Speed below which a body counts as idle
    ///
    /// Zero selects an automatic threshold of one gravity-step worth of
    /// velocity. Angular velocity (rad/s) is compared against this same
    /// value rather than scaled by a body radius, so bodies spinning
    /// faster than `idle_speed_threshold` rad/s never sleep.
    pub idle_speed_threshold: f32,
    /// Penetration depth tolerated before positional correction kicks in
    pub collision_slop: f32,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::ZERO,
            iterations: 30,
            sleep_time_threshold: f32::INFINITY,
            idle_speed_threshold: 0.0,
            collision_slop: 0.1,
        }
    }
}

/// A 2D physics space
///
/// Owns every body, shape, and constraint through generational slot maps,
/// so handles to removed entities simply resolve to `None` instead of
/// aliasing a newer entity.
pub struct Space {
    bodies: SlotMap<BodyKey, Body>,
    shapes: SlotMap<ShapeKey, Shape>,
    constraints: SlotMap<ConstraintKey, PivotJoint>,
    /// Shape keys in insertion order; collision pairs and point queries
    /// walk this list so results never depend on slot reuse
    shape_order: Vec<ShapeKey>,
    /// Built-in immovable body that boundary segments attach to
    static_body: BodyKey,
    /// Segments installed by the last `set_bounds` call
    bounds: Vec<ShapeKey>,
    pub config: SpaceConfig,
}

impl Space {
    pub fn new() -> Self {
        Self::with_config(SpaceConfig::default())
    }

    pub fn with_config(config: SpaceConfig) -> Self {
        let mut bodies = SlotMap::with_key();
        let static_body = bodies.insert(Body::new_static());
        Self {
            bodies,
            shapes: SlotMap::with_key(),
            constraints: SlotMap::with_key(),
            shape_order: Vec::new(),
            static_body,
            bounds: Vec::new(),
            config,
        }
    }

    /// The space's built-in static body
    pub fn static_body(&self) -> BodyKey {
        self.static_body
    }

    /// Add a body and return its key
    pub fn add_body(&mut self, body: Body) -> BodyKey {
        self.bodies.insert(body)
    }

    /// Remove a body along with every shape and constraint attached to it
    pub fn remove_body(&mut self, key: BodyKey) -> Result<Body, PhysicsError> {
        if key == self.static_body {
            return Err(PhysicsError::NotFound("body"));
        }
        let body = self.bodies.remove(key).ok_or(PhysicsError::NotFound("body"))?;
        self.shape_order.retain(|&sk| self.shapes[sk].body != key);
        self.shapes.retain(|_, shape| shape.body != key);
        self.constraints
            .retain(|_, joint| joint.body_a != key && joint.body_b != key);
        Ok(body)
    }

    /// Add a shape; its owning body must already live in this space
    pub fn add_shape(&mut self, shape: Shape) -> Result<ShapeKey, PhysicsError> {
        if !self.bodies.contains_key(shape.body) {
            return Err(PhysicsError::NotFound("body"));
        }
        let key = self.shapes.insert(shape);
        self.shape_order.push(key);
        Ok(key)
    }

    pub fn remove_shape(&mut self, key: ShapeKey) -> Result<Shape, PhysicsError> {
        let shape = self.shapes.remove(key).ok_or(PhysicsError::NotFound("shape"))?;
        self.shape_order.retain(|&sk| sk != key);
        Ok(shape)
    }

    /// Add a pivot joint; both bodies must live in this space
    pub fn add_constraint(&mut self, joint: PivotJoint) -> Result<ConstraintKey, PhysicsError> {
        if !self.bodies.contains_key(joint.body_a) || !self.bodies.contains_key(joint.body_b) {
            return Err(PhysicsError::NotFound("body"));
        }
        Ok(self.constraints.insert(joint))
    }

    pub fn remove_constraint(&mut self, key: ConstraintKey) -> Result<PivotJoint, PhysicsError> {
        self.constraints
            .remove(key)
            .ok_or(PhysicsError::NotFound("constraint"))
    }

    pub fn body(&self, key: BodyKey) -> Option<&Body> {
        self.bodies.get(key)
    }

    pub fn body_mut(&mut self, key: BodyKey) -> Option<&mut Body> {
        self.bodies.get_mut(key)
    }

    pub fn shape(&self, key: ShapeKey) -> Option<&Shape> {
        self.shapes.get(key)
    }

    /// Replace a registered shape's collision filter
    ///
    /// Geometry is immutable once a shape is constructed; the filter and
    /// material are the only mutable parts. To change geometry, remove
    /// the shape and add a new one.
    pub fn set_filter(&mut self, key: ShapeKey, filter: ShapeFilter) -> Result<(), PhysicsError> {
        let shape = self.shapes.get_mut(key).ok_or(PhysicsError::NotFound("shape"))?;
        shape.filter = filter;
        Ok(())
    }

    /// Replace a registered shape's material
    pub fn set_material(&mut self, key: ShapeKey, material: Material) -> Result<(), PhysicsError> {
        let shape = self.shapes.get_mut(key).ok_or(PhysicsError::NotFound("shape"))?;
        shape.material = material;
        Ok(())
    }

    /// Number of bodies, including the built-in static body
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn body_keys(&self) -> impl Iterator<Item = BodyKey> + '_ {
        self.bodies.keys()
    }

    /// Shape keys in insertion order
    pub fn shape_keys(&self) -> impl Iterator<Item = ShapeKey> + '_ {
        self.shape_order.iter().copied()
    }

    /// The topmost shape containing `point`, if any
    ///
    /// When shapes overlap the most recently added one wins, matching the
    /// draw order of a renderer that paints shapes in insertion order.
    pub fn point_query_first(&self, point: Vec2) -> Option<ShapeKey> {
        self.shape_order.iter().rev().copied().find(|&key| {
            let shape = &self.shapes[key];
            let body = &self.bodies[shape.body];
            shape.contains(body.position, body.rotation(), point)
        })
    }

    /// Install four boundary segments along the edges of an axis-aligned
    /// rectangle, replacing any previous bounds
    ///
    /// The segments attach to the built-in static body and use `radius`
    /// of thickness. Idempotent for identical arguments.
    pub fn set_bounds(
        &mut self,
        min: Vec2,
        max: Vec2,
        radius: f32,
        material: Material,
    ) -> Result<(), PhysicsError> {
        if !min.is_finite() || !max.is_finite() || min.x >= max.x || min.y >= max.y {
            return Err(PhysicsError::InvalidGeometry(format!(
                "bounds rectangle must be finite and non-empty, got {:?}..{:?}",
                min, max
            )));
        }
        // validate everything before tearing down the old walls, so a
        // failed call leaves the space as it was
        if !radius.is_finite() || radius < 0.0 {
            return Err(PhysicsError::InvalidGeometry(format!(
                "bounds radius must be finite and non-negative, got {}",
                radius
            )));
        }
        for key in std::mem::take(&mut self.bounds) {
            // ignore stale keys from bounds a caller removed manually
            let _ = self.remove_shape(key);
        }
        let bl = min;
        let br = Vec2::new(max.x, min.y);
        let tr = max;
        let tl = Vec2::new(min.x, max.y);
        for (a, b) in [(bl, br), (br, tr), (tr, tl), (tl, bl)] {
            let shape = Shape::segment(self.static_body, a, b, radius)?.with_material(material);
            let key = self.add_shape(shape)?;
            self.bounds.push(key);
        }
        log::debug!("installed bounds {:?}..{:?} radius {}", min, max, radius);
        Ok(())
    }

    /// Advance the simulation by `dt` seconds
    ///
    /// One step runs force integration, collision detection, the impulse
    /// solver, velocity integration, and sleep bookkeeping, in that order.
    ///
    /// # Panics
    ///
    /// Panics if any body's state becomes non-finite, which indicates the
    /// caller fed the space a bad force, dt, or mass.
    pub fn step(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        for (_, body) in &mut self.bodies {
            body.integrate_forces(self.config.gravity, dt);
        }

        let contacts = self.find_contacts();
        log::trace!("step dt={} contacts={}", dt, contacts.len());

        // A sleeping body touched by a moving one must rejoin the solve.
        // Contact with static geometry alone does not wake anything, or
        // resting bodies could never stay asleep.
        let is_active = |body: &Body| !body.is_static() && !body.is_sleeping();
        for contact in &contacts {
            if is_active(&self.bodies[contact.body_a]) {
                self.bodies[contact.body_b].wake();
            }
            if is_active(&self.bodies[contact.body_b]) {
                self.bodies[contact.body_a].wake();
            }
        }

        // contacts between sleeping and static bodies stay untouched
        let mut constraints: Vec<ContactConstraint> = contacts
            .iter()
            .filter(|c| is_active(&self.bodies[c.body_a]) || is_active(&self.bodies[c.body_b]))
            .map(|c| ContactConstraint::new(c, &self.bodies, &self.shapes))
            .collect();

        let inv_dt = 1.0 / dt;
        for _ in 0..self.config.iterations {
            for constraint in &mut constraints {
                constraint.solve_velocity(&mut self.bodies);
            }
            for (_, joint) in &self.constraints {
                joint.solve_velocity(&mut self.bodies, inv_dt);
            }
        }
        for constraint in &constraints {
            constraint.solve_position(&mut self.bodies, self.config.collision_slop);
        }

        let idle_speed = if self.config.idle_speed_threshold > 0.0 {
            self.config.idle_speed_threshold
        } else {
            self.config.gravity.length() * dt
        };
        for (key, body) in &mut self.bodies {
            body.integrate_velocity(dt);
            if !body.position.is_finite() || !body.velocity.is_finite() {
                panic!("body {:?} reached a non-finite state", key);
            }
            if body.update_sleep(idle_speed, self.config.sleep_time_threshold, dt) {
                log::debug!("body {:?} fell asleep", key);
            }
        }
    }

    /// Broad phase plus narrow phase over every eligible shape pair
    fn find_contacts(&self) -> Vec<Contact> {
        let mut contacts = Vec::new();
        for (i, &key_a) in self.shape_order.iter().enumerate() {
            let shape_a = &self.shapes[key_a];
            let body_a = &self.bodies[shape_a.body];
            let pose_a = (body_a.position, body_a.rotation());
            let aabb_a = shape_a.aabb(pose_a.0, pose_a.1);
            for &key_b in &self.shape_order[i + 1..] {
                let shape_b = &self.shapes[key_b];
                if shape_a.body == shape_b.body {
                    continue;
                }
                let body_b = &self.bodies[shape_b.body];
                if body_a.is_static() && body_b.is_static() {
                    continue;
                }
                if body_a.is_sleeping() && body_b.is_sleeping() {
                    continue;
                }
                if shape_a.filter.rejects(&shape_b.filter) {
                    continue;
                }
                let pose_b = (body_b.position, body_b.rotation());
                if !aabb_a.overlaps(&shape_b.aabb(pose_b.0, pose_b.1)) {
                    continue;
                }
                if let Some(contact) = collide(key_a, shape_a, pose_a, key_b, shape_b, pose_b) {
                    contacts.push(contact);
                }
            }
        }
        contacts
    }
}

impl Default for Space {
    fn default() -> Self {
        Self::new()
    }
}
