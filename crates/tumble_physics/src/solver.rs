//! Sequential-impulse contact solver
//!
//! Contacts are preconditioned into [`ContactConstraint`]s once per step,
//! then relaxed over a fixed number of velocity iterations with
//! accumulated, clamped impulses. Penetration is resolved afterwards by a
//! separate positional pass so restitution stays untouched by overlap
//! recovery.

use slotmap::SlotMap;
use tumble_math::Vec2;

use crate::body::{Body, BodyKey};
use crate::collision::Contact;
use crate::shapes::{Shape, ShapeKey};

/// Fraction of the remaining penetration corrected per step
const CORRECTION_PERCENT: f32 = 0.2;

/// Velocity-level state for one contact, valid for a single step
pub(crate) struct ContactConstraint {
    body_a: BodyKey,
    body_b: BodyKey,
    /// Contact offset from each body's center of mass
    r_a: Vec2,
    r_b: Vec2,
    normal: Vec2,
    depth: f32,
    /// Inverse effective mass along the normal and tangent
    normal_mass: f32,
    tangent_mass: f32,
    /// Restitution target velocity, captured before any impulses
    bounce: f32,
    friction: f32,
    jn_acc: f32,
    jt_acc: f32,
}

/// Relative velocity of the contact point on B with respect to A
fn relative_velocity(a: &Body, b: &Body, r_a: Vec2, r_b: Vec2) -> Vec2 {
    b.velocity + r_b.perp() * b.angular_velocity - a.velocity - r_a.perp() * a.angular_velocity
}

impl ContactConstraint {
    pub(crate) fn new(
        contact: &Contact,
        bodies: &SlotMap<BodyKey, Body>,
        shapes: &SlotMap<ShapeKey, Shape>,
    ) -> Self {
        let a = &bodies[contact.body_a];
        let b = &bodies[contact.body_b];
        let material = shapes[contact.shape_a]
            .material
            .combine(&shapes[contact.shape_b].material);

        let r_a = contact.point - a.position;
        let r_b = contact.point - b.position;
        let normal = contact.normal;
        let tangent = normal.perp();

        let rn_a = r_a.cross(normal);
        let rn_b = r_b.cross(normal);
        let kn = a.inv_mass() + b.inv_mass()
            + a.inv_moment() * rn_a * rn_a
            + b.inv_moment() * rn_b * rn_b;
        let rt_a = r_a.cross(tangent);
        let rt_b = r_b.cross(tangent);
        let kt = a.inv_mass() + b.inv_mass()
            + a.inv_moment() * rt_a * rt_a
            + b.inv_moment() * rt_b * rt_b;

        // approaching speed at the moment of impact drives the bounce
        let vn = relative_velocity(a, b, r_a, r_b).dot(normal);
        let bounce = material.elasticity * (-vn).max(0.0);

        ContactConstraint {
            body_a: contact.body_a,
            body_b: contact.body_b,
            r_a,
            r_b,
            normal,
            depth: contact.depth,
            normal_mass: if kn > 0.0 { 1.0 / kn } else { 0.0 },
            tangent_mass: if kt > 0.0 { 1.0 / kt } else { 0.0 },
            bounce,
            friction: material.friction,
            jn_acc: 0.0,
            jt_acc: 0.0,
        }
    }

    /// One velocity iteration over this contact
    pub(crate) fn solve_velocity(&mut self, bodies: &mut SlotMap<BodyKey, Body>) {
        let Some([a, b]) = bodies.get_disjoint_mut([self.body_a, self.body_b]) else {
            return;
        };

        // normal impulse, accumulated and clamped to be non-attracting
        let vn = relative_velocity(a, b, self.r_a, self.r_b).dot(self.normal);
        let dj = self.normal_mass * (self.bounce - vn);
        let old = self.jn_acc;
        self.jn_acc = (old + dj).max(0.0);
        let impulse = self.normal * (self.jn_acc - old);
        a.apply_impulse(-impulse, self.r_a);
        b.apply_impulse(impulse, self.r_b);

        // friction impulse, clamped by the Coulomb cone
        let tangent = self.normal.perp();
        let vt = relative_velocity(a, b, self.r_a, self.r_b).dot(tangent);
        let djt = self.tangent_mass * -vt;
        let max_jt = self.friction * self.jn_acc;
        let old_t = self.jt_acc;
        self.jt_acc = (old_t + djt).clamp(-max_jt, max_jt);
        let impulse = tangent * (self.jt_acc - old_t);
        a.apply_impulse(-impulse, self.r_a);
        b.apply_impulse(impulse, self.r_b);
    }

    /// Push overlapping bodies apart without touching their velocities
    ///
    /// Overlap up to `slop` is tolerated so resting contacts stay stable.
    pub(crate) fn solve_position(&self, bodies: &mut SlotMap<BodyKey, Body>, slop: f32) {
        let Some([a, b]) = bodies.get_disjoint_mut([self.body_a, self.body_b]) else {
            return;
        };
        let total_inv_mass = a.inv_mass() + b.inv_mass();
        if total_inv_mass == 0.0 {
            return;
        }
        let excess = (self.depth - slop).max(0.0);
        if excess == 0.0 {
            return;
        }
        let correction = self.normal * (excess / total_inv_mass * CORRECTION_PERCENT);
        a.position -= correction * a.inv_mass();
        b.position += correction * b.inv_mass();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use crate::material::Material;
    use crate::shapes::Shape;

    const EPSILON: f32 = 1e-4;

    struct Fixture {
        bodies: SlotMap<BodyKey, Body>,
        shapes: SlotMap<ShapeKey, Shape>,
    }

    /// two unit-radius circles moving head-on along the x axis
    fn head_on(elasticity: f32, speed: f32) -> (Fixture, Contact) {
        let mut bodies = SlotMap::with_key();
        let a = bodies.insert(
            Body::new(1.0, 1.0)
                .unwrap()
                .with_position(Vec2::new(-0.9, 0.0))
                .with_velocity(Vec2::new(speed, 0.0)),
        );
        let b = bodies.insert(
            Body::new(1.0, 1.0)
                .unwrap()
                .with_position(Vec2::new(0.9, 0.0))
                .with_velocity(Vec2::new(-speed, 0.0)),
        );
        let mut shapes = SlotMap::with_key();
        let material = Material::new(elasticity, 0.0);
        let sa = shapes.insert(Shape::circle(a, 1.0, Vec2::ZERO).unwrap().with_material(material));
        let sb = shapes.insert(Shape::circle(b, 1.0, Vec2::ZERO).unwrap().with_material(material));
        let contact = Contact {
            shape_a: sa,
            shape_b: sb,
            body_a: a,
            body_b: b,
            point: Vec2::ZERO,
            normal: Vec2::X,
            depth: 0.2,
        };
        (Fixture { bodies, shapes }, contact)
    }

    #[test]
    fn test_elastic_head_on_swaps_velocities() {
        let (mut fx, contact) = head_on(1.0, 5.0);
        let mut constraint = ContactConstraint::new(&contact, &fx.bodies, &fx.shapes);
        for _ in 0..10 {
            constraint.solve_velocity(&mut fx.bodies);
        }
        let vs: Vec<Vec2> = fx.bodies.values().map(|b| b.velocity).collect();
        assert!((vs[0].x + 5.0).abs() < EPSILON, "va {:?}", vs[0]);
        assert!((vs[1].x - 5.0).abs() < EPSILON, "vb {:?}", vs[1]);
    }

    #[test]
    fn test_inelastic_head_on_stops_both() {
        let (mut fx, contact) = head_on(0.0, 5.0);
        let mut constraint = ContactConstraint::new(&contact, &fx.bodies, &fx.shapes);
        for _ in 0..10 {
            constraint.solve_velocity(&mut fx.bodies);
        }
        for body in fx.bodies.values() {
            assert!(body.velocity.length() < EPSILON);
        }
    }

    #[test]
    fn test_separating_contact_gets_no_impulse() {
        let (mut fx, contact) = head_on(1.0, -5.0);
        let before: Vec<Vec2> = fx.bodies.values().map(|b| b.velocity).collect();
        let mut constraint = ContactConstraint::new(&contact, &fx.bodies, &fx.shapes);
        constraint.solve_velocity(&mut fx.bodies);
        let after: Vec<Vec2> = fx.bodies.values().map(|b| b.velocity).collect();
        assert_eq!(before, after);
        assert_eq!(constraint.jn_acc, 0.0);
    }

    #[test]
    fn test_position_pass_splits_by_mass() {
        let mut bodies = SlotMap::with_key();
        let light = bodies.insert(Body::new(1.0, 1.0).unwrap());
        let heavy = bodies.insert(Body::new(4.0, 4.0).unwrap().with_position(Vec2::new(1.0, 0.0)));
        let mut shapes = SlotMap::with_key();
        let sa = shapes.insert(Shape::circle(light, 1.0, Vec2::ZERO).unwrap());
        let sb = shapes.insert(Shape::circle(heavy, 1.0, Vec2::ZERO).unwrap());
        let contact = Contact {
            shape_a: sa,
            shape_b: sb,
            body_a: light,
            body_b: heavy,
            point: Vec2::new(0.5, 0.0),
            normal: Vec2::X,
            depth: 1.0,
        };
        let constraint = ContactConstraint::new(&contact, &bodies, &shapes);
        constraint.solve_position(&mut bodies, 0.0);

        // corrected 0.2 total, split 4:1 toward the lighter body
        let light_dx = bodies[light].position.x;
        let heavy_dx = bodies[heavy].position.x - 1.0;
        assert!((light_dx + 0.16).abs() < EPSILON, "light {}", light_dx);
        assert!((heavy_dx - 0.04).abs() < EPSILON, "heavy {}", heavy_dx);
        // velocities are untouched by the positional pass
        assert_eq!(bodies[light].velocity, Vec2::ZERO);
        assert_eq!(bodies[heavy].velocity, Vec2::ZERO);
    }

    #[test]
    fn test_position_pass_ignores_overlap_within_slop() {
        let (mut fx, contact) = head_on(0.0, 0.0);
        let constraint = ContactConstraint::new(&contact, &fx.bodies, &fx.shapes);
        constraint.solve_position(&mut fx.bodies, 0.5);
        assert!((fx.bodies.values().next().unwrap().position.x + 0.9).abs() < EPSILON);
    }

    #[test]
    fn test_static_body_never_moves() {
        let mut bodies = SlotMap::with_key();
        let floor = bodies.insert(Body::new_static());
        let ball = bodies.insert(
            Body::new(1.0, 1.0)
                .unwrap()
                .with_position(Vec2::new(0.0, 0.9))
                .with_velocity(Vec2::new(0.0, -3.0)),
        );
        let mut shapes = SlotMap::with_key();
        let sf = shapes.insert(
            Shape::segment(floor, Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0), 0.0).unwrap(),
        );
        let sb = shapes.insert(Shape::circle(ball, 1.0, Vec2::ZERO).unwrap());
        let contact = Contact {
            shape_a: sf,
            shape_b: sb,
            body_a: floor,
            body_b: ball,
            point: Vec2::ZERO,
            normal: Vec2::Y,
            depth: 0.1,
        };
        let mut constraint = ContactConstraint::new(&contact, &bodies, &shapes);
        for _ in 0..10 {
            constraint.solve_velocity(&mut bodies);
        }
        constraint.solve_position(&mut bodies, 0.0);
        assert_eq!(bodies[floor].position, Vec2::ZERO);
        assert_eq!(bodies[floor].velocity, Vec2::ZERO);
        // inelastic floor contact kills the approach velocity
        assert!(bodies[ball].velocity.y.abs() < 0.1);
    }

    #[test]
    fn test_friction_clamped_by_normal_impulse() {
        let mut bodies = SlotMap::with_key();
        let floor = bodies.insert(Body::new_static());
        let slider = bodies.insert(
            Body::new(1.0, 1.0)
                .unwrap()
                .with_position(Vec2::new(0.0, 1.0))
                .with_velocity(Vec2::new(10.0, -1.0)),
        );
        let mut shapes = SlotMap::with_key();
        let material = Material::new(0.0, 0.5);
        let sf = shapes.insert(
            Shape::segment(floor, Vec2::new(-50.0, 0.0), Vec2::new(50.0, 0.0), 0.0)
                .unwrap()
                .with_material(Material::new(0.0, 1.0)),
        );
        let sb = shapes.insert(
            Shape::circle(slider, 1.0, Vec2::ZERO).unwrap().with_material(material),
        );
        let contact = Contact {
            shape_a: sf,
            shape_b: sb,
            body_a: floor,
            body_b: slider,
            point: Vec2::ZERO,
            normal: Vec2::Y,
            depth: 0.01,
        };
        let mut constraint = ContactConstraint::new(&contact, &bodies, &shapes);
        for _ in 0..10 {
            constraint.solve_velocity(&mut bodies);
        }
        // normal impulse stops the 1 unit/s descent, so friction can
        // remove at most mu * jn = 0.5 of the tangential speed
        assert!(constraint.jn_acc > 0.0);
        assert!(constraint.jt_acc.abs() <= constraint.friction * constraint.jn_acc + EPSILON);
        assert!(bodies[slider].velocity.x > 9.0);
    }
}
