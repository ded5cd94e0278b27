//! Point-to-point constraints
//!
//! A [`PivotJoint`] pins a local anchor on each body to the same world
//! point, letting the pair rotate freely around it. Solved at the
//! velocity level with a 2x2 effective-mass matrix plus a soft positional
//! bias that pulls drifted anchors back together.

use slotmap::{new_key_type, SlotMap};
use tumble_math::Vec2;

use crate::body::{Body, BodyKey};
use crate::error::PhysicsError;

new_key_type! {
    /// Handle to a constraint stored in a space
    pub struct ConstraintKey;
}

/// Stabilization gain for anchor drift, as a fraction per step
const BIAS_FACTOR: f32 = 0.2;

/// Pins `anchor_a` on body A to `anchor_b` on body B
///
/// Anchors are in each body's local frame.
#[derive(Clone, Copy, Debug)]
pub struct PivotJoint {
    pub body_a: BodyKey,
    pub body_b: BodyKey,
    pub anchor_a: Vec2,
    pub anchor_b: Vec2,
}

impl PivotJoint {
    pub fn new(
        body_a: BodyKey,
        body_b: BodyKey,
        anchor_a: Vec2,
        anchor_b: Vec2,
    ) -> Result<Self, PhysicsError> {
        if !anchor_a.is_finite() || !anchor_b.is_finite() {
            return Err(PhysicsError::InvalidGeometry(format!(
                "pivot anchors must be finite, got {:?} and {:?}",
                anchor_a, anchor_b
            )));
        }
        Ok(PivotJoint {
            body_a,
            body_b,
            anchor_a,
            anchor_b,
        })
    }

    /// Pin both bodies at a shared world-space point
    pub fn at_world_point(
        bodies: &SlotMap<BodyKey, Body>,
        body_a: BodyKey,
        body_b: BodyKey,
        point: Vec2,
    ) -> Result<Self, PhysicsError> {
        let a = bodies.get(body_a).ok_or(PhysicsError::NotFound("body"))?;
        let b = bodies.get(body_b).ok_or(PhysicsError::NotFound("body"))?;
        let inv_rot_a = Vec2::new(a.rotation().x, -a.rotation().y);
        let inv_rot_b = Vec2::new(b.rotation().x, -b.rotation().y);
        Self::new(
            body_a,
            body_b,
            (point - a.position).rotated_by(inv_rot_a),
            (point - b.position).rotated_by(inv_rot_b),
        )
    }

    /// One velocity iteration: cancel relative anchor velocity plus a
    /// bias proportional to positional drift
    pub(crate) fn solve_velocity(&self, bodies: &mut SlotMap<BodyKey, Body>, inv_dt: f32) {
        let Some([a, b]) = bodies.get_disjoint_mut([self.body_a, self.body_b]) else {
            return;
        };

        let r_a = self.anchor_a.rotated_by(a.rotation());
        let r_b = self.anchor_b.rotated_by(b.rotation());
        let drift = (b.position + r_b) - (a.position + r_a);
        let bias = drift * (BIAS_FACTOR * inv_dt);

        let rel_vel = b.velocity + r_b.perp() * b.angular_velocity
            - a.velocity
            - r_a.perp() * a.angular_velocity;
        let rhs = -(rel_vel + bias);

        // K = [m_sum + Ia ray^2 + Ib rby^2,  -Ia rax ray - Ib rbx rby ]
        //     [ ...symmetric...,             m_sum + Ia rax^2 + Ib rbx^2]
        let m_sum = a.inv_mass() + b.inv_mass();
        let k11 = m_sum + a.inv_moment() * r_a.y * r_a.y + b.inv_moment() * r_b.y * r_b.y;
        let k12 = -a.inv_moment() * r_a.x * r_a.y - b.inv_moment() * r_b.x * r_b.y;
        let k22 = m_sum + a.inv_moment() * r_a.x * r_a.x + b.inv_moment() * r_b.x * r_b.x;
        let det = k11 * k22 - k12 * k12;
        if det.abs() <= f32::EPSILON {
            return;
        }
        let impulse = Vec2::new(
            (k22 * rhs.x - k12 * rhs.y) / det,
            (k11 * rhs.y - k12 * rhs.x) / det,
        );

        a.apply_impulse(-impulse, r_a);
        b.apply_impulse(impulse, r_b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;

    const EPSILON: f32 = 1e-3;

    #[test]
    fn test_rejects_non_finite_anchor() {
        let mut bodies: SlotMap<BodyKey, Body> = SlotMap::with_key();
        let a = bodies.insert(Body::new(1.0, 1.0).unwrap());
        let b = bodies.insert(Body::new(1.0, 1.0).unwrap());
        let result = PivotJoint::new(a, b, Vec2::new(f32::NAN, 0.0), Vec2::ZERO);
        assert!(matches!(result, Err(PhysicsError::InvalidGeometry(_))));
    }

    #[test]
    fn test_world_point_anchors() {
        let mut bodies: SlotMap<BodyKey, Body> = SlotMap::with_key();
        let a = bodies.insert(Body::new(1.0, 1.0).unwrap().with_position(Vec2::new(1.0, 0.0)));
        let b = bodies.insert(Body::new(1.0, 1.0).unwrap().with_position(Vec2::new(3.0, 0.0)));
        let joint = PivotJoint::at_world_point(&bodies, a, b, Vec2::new(2.0, 0.0)).unwrap();
        assert_eq!(joint.anchor_a, Vec2::new(1.0, 0.0));
        assert_eq!(joint.anchor_b, Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn test_cancels_relative_anchor_velocity() {
        let mut bodies: SlotMap<BodyKey, Body> = SlotMap::with_key();
        let a = bodies.insert(Body::new(1.0, 1.0).unwrap());
        let b = bodies.insert(
            Body::new(1.0, 1.0)
                .unwrap()
                .with_position(Vec2::new(2.0, 0.0))
                .with_velocity(Vec2::new(0.0, 4.0)),
        );
        let joint = PivotJoint::at_world_point(&bodies, a, b, Vec2::new(1.0, 0.0)).unwrap();
        for _ in 0..20 {
            joint.solve_velocity(&mut bodies, 60.0);
        }
        let r_a = joint.anchor_a;
        let r_b = joint.anchor_b;
        let va = bodies[a].velocity + r_a.perp() * bodies[a].angular_velocity;
        let vb = bodies[b].velocity + r_b.perp() * bodies[b].angular_velocity;
        assert!((va - vb).length() < EPSILON, "va {:?} vb {:?}", va, vb);
    }

    #[test]
    fn test_missing_body_is_ignored() {
        let mut bodies: SlotMap<BodyKey, Body> = SlotMap::with_key();
        let a = bodies.insert(Body::new(1.0, 1.0).unwrap());
        let b = bodies.insert(Body::new(1.0, 1.0).unwrap());
        let joint = PivotJoint::new(a, b, Vec2::ZERO, Vec2::ZERO).unwrap();
        bodies.remove(b);
        joint.solve_velocity(&mut bodies, 60.0);
        assert_eq!(bodies[a].velocity, Vec2::ZERO);
    }
}
