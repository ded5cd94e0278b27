//! Collision shapes and the queries the detector needs from them
//!
//! A shape is bound to exactly one body and its geometry is immutable in
//! the body's local frame; world-space queries take the owning body's pose.

use bitflags::bitflags;
use slotmap::new_key_type;
use tumble_math::Vec2;

use crate::body::BodyKey;
use crate::error::PhysicsError;
use crate::material::Material;

new_key_type! {
    /// Key to a shape registered in a space
    pub struct ShapeKey;
}

bitflags! {
    /// Category bits for collision filtering
    ///
    /// A shape belongs to one or more categories and declares which
    /// categories it collides with via a mask. Applications define their
    /// own bits with `Categories::from_bits_retain`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Categories: u32 {
        const NONE = 0;
        const ALL = u32::MAX;
    }
}

/// Collision filter determining which shape pairs reach the narrow phase
///
/// Two shapes collide when neither shares a non-zero `group` with the other
/// and both shapes' categories intersect the other's mask. The default
/// filter collides with everything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShapeFilter {
    /// Shapes in the same non-zero group never collide (e.g. parts of one
    /// ragdoll)
    pub group: u32,
    /// Which categories this shape belongs to
    pub categories: Categories,
    /// Which categories this shape collides with
    pub mask: Categories,
}

impl Default for ShapeFilter {
    fn default() -> Self {
        Self {
            group: 0,
            categories: Categories::ALL,
            mask: Categories::ALL,
        }
    }
}

impl ShapeFilter {
    pub fn new(group: u32, categories: Categories, mask: Categories) -> Self {
        Self { group, categories, mask }
    }

    /// True when this filter forbids collision with `other`
    pub fn rejects(&self, other: &Self) -> bool {
        if self.group != 0 && self.group == other.group {
            return true;
        }
        !self.categories.intersects(other.mask) || !other.categories.intersects(self.mask)
    }
}

/// An axis-aligned bounding box in world space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: min.min_components(max),
            max: min.max_components(max),
        }
    }

    /// Smallest box containing all the given points
    ///
    /// Returns a degenerate point box when called with a single point.
    pub fn from_points(points: &[Vec2]) -> Self {
        let mut min = points[0];
        let mut max = points[0];
        for p in &points[1..] {
            min = min.min_components(*p);
            max = max.max_components(*p);
        }
        Self { min, max }
    }

    /// Grow the box by `amount` on every side
    pub fn expanded(&self, amount: f32) -> Self {
        let d = Vec2::new(amount, amount);
        Self {
            min: self.min - d,
            max: self.max + d,
        }
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.max.x > other.min.x
            && self.min.x < other.max.x
            && self.max.y > other.min.y
            && self.min.y < other.max.y
    }
}

/// Geometric primitive of a shape, in the owning body's local frame
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Circle {
        radius: f32,
        /// Center offset from the body origin
        offset: Vec2,
    },
    /// Convex polygon, vertices wound counter-clockwise
    Polygon { verts: Vec<Vec2> },
    /// Thick line segment; `radius` is the half-thickness used for
    /// contact stability
    Segment { a: Vec2, b: Vec2, radius: f32 },
}

/// A collision shape bound to one body
#[derive(Clone, Debug)]
pub struct Shape {
    /// The owning body; the shape never outlives it
    pub body: BodyKey,
    pub geometry: Geometry,
    pub material: Material,
    pub filter: ShapeFilter,
}

impl Shape {
    /// Circle of the given radius centered at `offset` in body space
    pub fn circle(body: BodyKey, radius: f32, offset: Vec2) -> Result<Self, PhysicsError> {
        if !radius.is_finite() || radius <= 0.0 || !offset.is_finite() {
            return Err(PhysicsError::InvalidGeometry(format!(
                "circle radius must be positive and finite, got {}",
                radius
            )));
        }
        Ok(Self {
            body,
            geometry: Geometry::Circle { radius, offset },
            material: Material::default(),
            filter: ShapeFilter::default(),
        })
    }

    /// Convex polygon from local-frame vertices
    ///
    /// Clockwise input is rewound to counter-clockwise. Fails when fewer
    /// than 3 vertices are given or the vertices do not describe a convex
    /// polygon (which also covers self-intersecting point sets).
    pub fn polygon(body: BodyKey, verts: Vec<Vec2>) -> Result<Self, PhysicsError> {
        let verts = validate_polygon(verts)?;
        Ok(Self {
            body,
            geometry: Geometry::Polygon { verts },
            material: Material::default(),
            filter: ShapeFilter::default(),
        })
    }

    /// Axis-aligned `width` x `height` rectangle centered on the body origin
    pub fn box_shape(body: BodyKey, width: f32, height: f32) -> Result<Self, PhysicsError> {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(PhysicsError::InvalidGeometry(format!(
                "box dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        let (hw, hh) = (width * 0.5, height * 0.5);
        Self::polygon(
            body,
            vec![
                Vec2::new(-hw, -hh),
                Vec2::new(hw, -hh),
                Vec2::new(hw, hh),
                Vec2::new(-hw, hh),
            ],
        )
    }

    /// Thick segment between two local-frame endpoints
    pub fn segment(body: BodyKey, a: Vec2, b: Vec2, radius: f32) -> Result<Self, PhysicsError> {
        if !(a.is_finite() && b.is_finite() && radius.is_finite()) || radius < 0.0 {
            return Err(PhysicsError::InvalidGeometry(
                "segment endpoints and radius must be finite, radius non-negative".into(),
            ));
        }
        if (b - a).length_squared() == 0.0 {
            return Err(PhysicsError::InvalidGeometry(
                "segment endpoints must be distinct".into(),
            ));
        }
        Ok(Self {
            body,
            geometry: Geometry::Segment { a, b, radius },
            material: Material::default(),
            filter: ShapeFilter::default(),
        })
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_filter(mut self, filter: ShapeFilter) -> Self {
        self.filter = filter;
        self
    }

    /// World bounding box for the given body pose
    ///
    /// Recomputed from the pose each step by the broad phase.
    pub fn aabb(&self, pos: Vec2, rot: Vec2) -> Aabb {
        match &self.geometry {
            Geometry::Circle { radius, offset } => {
                let center = pos + offset.rotated_by(rot);
                Aabb::new(center, center).expanded(*radius)
            }
            Geometry::Polygon { verts } => {
                let world: Vec<Vec2> = verts.iter().map(|v| pos + v.rotated_by(rot)).collect();
                Aabb::from_points(&world)
            }
            Geometry::Segment { a, b, radius } => {
                let pts = [pos + a.rotated_by(rot), pos + b.rotated_by(rot)];
                Aabb::from_points(&pts).expanded(*radius)
            }
        }
    }

    /// Exact point-membership test for the given body pose
    pub fn contains(&self, pos: Vec2, rot: Vec2, point: Vec2) -> bool {
        match &self.geometry {
            Geometry::Circle { radius, offset } => {
                let center = pos + offset.rotated_by(rot);
                (point - center).length_squared() <= radius * radius
            }
            Geometry::Polygon { verts } => {
                // CCW winding: the point must lie on the left of every edge
                let n = verts.len();
                for i in 0..n {
                    let v1 = pos + verts[i].rotated_by(rot);
                    let v2 = pos + verts[(i + 1) % n].rotated_by(rot);
                    if (v2 - v1).cross(point - v1) < 0.0 {
                        return false;
                    }
                }
                true
            }
            Geometry::Segment { a, b, radius } => {
                let a = pos + a.rotated_by(rot);
                let b = pos + b.rotated_by(rot);
                let closest = closest_point_on_segment(a, b, point);
                (point - closest).length_squared() <= radius * radius
            }
        }
    }
}

/// Closest point to `point` on the segment from `a` to `b`
pub(crate) fn closest_point_on_segment(a: Vec2, b: Vec2, point: Vec2) -> Vec2 {
    let seg = b - a;
    let len_sq = seg.length_squared();
    if len_sq <= f32::EPSILON {
        return a;
    }
    let t = ((point - a).dot(seg) / len_sq).clamp(0.0, 1.0);
    a + seg * t
}

fn validate_polygon(mut verts: Vec<Vec2>) -> Result<Vec<Vec2>, PhysicsError> {
    if verts.len() < 3 {
        return Err(PhysicsError::InvalidGeometry(format!(
            "polygon needs at least 3 vertices, got {}",
            verts.len()
        )));
    }
    if verts.iter().any(|v| !v.is_finite()) {
        return Err(PhysicsError::InvalidGeometry(
            "polygon vertices must be finite".into(),
        ));
    }

    // Signed area via the shoelace formula; negative means clockwise input.
    let n = verts.len();
    let mut doubled_area = 0.0;
    for i in 0..n {
        doubled_area += verts[i].cross(verts[(i + 1) % n]);
    }
    if doubled_area.abs() < f32::EPSILON {
        return Err(PhysicsError::InvalidGeometry(
            "polygon has zero area".into(),
        ));
    }
    if doubled_area < 0.0 {
        verts.reverse();
    }

    // Convexity: every turn must be a left turn once wound CCW. A
    // self-intersecting point set always fails this.
    for i in 0..n {
        let a = verts[i];
        let b = verts[(i + 1) % n];
        let c = verts[(i + 2) % n];
        if (b - a).cross(c - b) < 0.0 {
            return Err(PhysicsError::InvalidGeometry(
                "polygon vertices are not convex".into(),
            ));
        }
    }
    Ok(verts)
}

/// Moment of inertia for a circle (or annulus) of the given mass
///
/// `inner` is 0 for a solid circle; `offset` is the center's distance from
/// the body origin.
pub fn moment_for_circle(mass: f32, inner: f32, outer: f32, offset: Vec2) -> f32 {
    mass * (0.5 * (inner * inner + outer * outer) + offset.length_squared())
}

/// Moment of inertia for a solid `width` x `height` box centered on the origin
pub fn moment_for_box(mass: f32, width: f32, height: f32) -> f32 {
    mass * (width * width + height * height) / 12.0
}

/// Moment of inertia for a thin segment between two local points
pub fn moment_for_segment(mass: f32, a: Vec2, b: Vec2) -> f32 {
    let length = (b - a).length();
    let center = (a + b) * 0.5;
    mass * (length * length / 12.0 + center.length_squared())
}

/// Moment of inertia for a convex polygon about the body origin
pub fn moment_for_poly(mass: f32, verts: &[Vec2]) -> f32 {
    let n = verts.len();
    let mut num = 0.0;
    let mut den = 0.0;
    for i in 0..n {
        let v1 = verts[i];
        let v2 = verts[(i + 1) % n];
        let cross = v1.cross(v2);
        num += cross * (v1.dot(v1) + v1.dot(v2) + v2.dot(v2));
        den += cross;
    }
    if den.abs() < f32::EPSILON {
        return 0.0;
    }
    mass * num / (6.0 * den)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    const EPSILON: f32 = 1e-4;

    fn dummy_key() -> BodyKey {
        let mut map: SlotMap<BodyKey, ()> = SlotMap::with_key();
        map.insert(())
    }

    #[test]
    fn test_circle_construction() {
        let body = dummy_key();
        assert!(Shape::circle(body, 10.0, Vec2::ZERO).is_ok());
        assert!(Shape::circle(body, 0.0, Vec2::ZERO).is_err());
        assert!(Shape::circle(body, -1.0, Vec2::ZERO).is_err());
        assert!(Shape::circle(body, f32::NAN, Vec2::ZERO).is_err());
    }

    #[test]
    fn test_polygon_requires_three_vertices() {
        let body = dummy_key();
        let result = Shape::polygon(body, vec![Vec2::ZERO, Vec2::X]);
        assert!(matches!(result, Err(PhysicsError::InvalidGeometry(_))));
    }

    #[test]
    fn test_polygon_rejects_non_convex() {
        let body = dummy_key();
        // A dart: the 4th vertex pokes into the triangle
        let result = Shape::polygon(
            body,
            vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(4.0, 0.0),
                Vec2::new(4.0, 4.0),
                Vec2::new(3.0, 1.0),
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_polygon_rewinds_clockwise_input() {
        let body = dummy_key();
        // clockwise square
        let shape = Shape::polygon(
            body,
            vec![
                Vec2::new(-1.0, -1.0),
                Vec2::new(-1.0, 1.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(1.0, -1.0),
            ],
        )
        .unwrap();
        if let Geometry::Polygon { verts } = &shape.geometry {
            let mut area = 0.0;
            for i in 0..verts.len() {
                area += verts[i].cross(verts[(i + 1) % verts.len()]);
            }
            assert!(area > 0.0, "vertices should be counter-clockwise");
        } else {
            panic!("expected polygon geometry");
        }
    }

    #[test]
    fn test_box_shape_is_centered_rectangle() {
        let body = dummy_key();
        let shape = Shape::box_shape(body, 4.0, 2.0).unwrap();
        let aabb = shape.aabb(Vec2::ZERO, Vec2::X);
        assert_eq!(aabb.min, Vec2::new(-2.0, -1.0));
        assert_eq!(aabb.max, Vec2::new(2.0, 1.0));
    }

    #[test]
    fn test_segment_construction() {
        let body = dummy_key();
        assert!(Shape::segment(body, Vec2::ZERO, Vec2::X, 1.0).is_ok());
        assert!(Shape::segment(body, Vec2::ZERO, Vec2::ZERO, 1.0).is_err());
        assert!(Shape::segment(body, Vec2::ZERO, Vec2::X, -1.0).is_err());
    }

    #[test]
    fn test_circle_aabb_tracks_pose() {
        let body = dummy_key();
        let shape = Shape::circle(body, 2.0, Vec2::new(1.0, 0.0)).unwrap();
        // body rotated 90 degrees: the offset swings to +y
        let rot = Vec2::for_angle(std::f32::consts::FRAC_PI_2);
        let aabb = shape.aabb(Vec2::new(10.0, 0.0), rot);
        assert!((aabb.min.x - 8.0).abs() < EPSILON);
        assert!((aabb.max.x - 12.0).abs() < EPSILON);
        assert!((aabb.min.y - -1.0).abs() < EPSILON);
        assert!((aabb.max.y - 3.0).abs() < EPSILON);
    }

    #[test]
    fn test_segment_aabb_includes_thickness() {
        let body = dummy_key();
        let shape = Shape::segment(body, Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), 2.0).unwrap();
        let aabb = shape.aabb(Vec2::ZERO, Vec2::X);
        assert_eq!(aabb.min, Vec2::new(-2.0, -2.0));
        assert_eq!(aabb.max, Vec2::new(12.0, 2.0));
    }

    #[test]
    fn test_aabb_overlap() {
        let a = Aabb::new(Vec2::ZERO, Vec2::new(2.0, 2.0));
        let b = Aabb::new(Vec2::new(1.0, 1.0), Vec2::new(3.0, 3.0));
        let c = Aabb::new(Vec2::new(5.0, 5.0), Vec2::new(6.0, 6.0));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_contains_circle() {
        let body = dummy_key();
        let shape = Shape::circle(body, 5.0, Vec2::ZERO).unwrap();
        assert!(shape.contains(Vec2::new(10.0, 10.0), Vec2::X, Vec2::new(13.0, 13.0)));
        assert!(!shape.contains(Vec2::new(10.0, 10.0), Vec2::X, Vec2::new(14.0, 14.0)));
    }

    #[test]
    fn test_contains_polygon_respects_rotation() {
        let body = dummy_key();
        let shape = Shape::box_shape(body, 4.0, 2.0).unwrap();
        let rot = Vec2::for_angle(std::f32::consts::FRAC_PI_2);
        // after a 90 degree turn the long axis is vertical
        assert!(shape.contains(Vec2::ZERO, rot, Vec2::new(0.0, 1.9)));
        assert!(!shape.contains(Vec2::ZERO, rot, Vec2::new(1.9, 0.0)));
    }

    #[test]
    fn test_contains_segment_uses_radius() {
        let body = dummy_key();
        let shape = Shape::segment(body, Vec2::ZERO, Vec2::new(10.0, 0.0), 1.0).unwrap();
        assert!(shape.contains(Vec2::ZERO, Vec2::X, Vec2::new(5.0, 0.9)));
        assert!(!shape.contains(Vec2::ZERO, Vec2::X, Vec2::new(5.0, 1.1)));
    }

    #[test]
    fn test_filter_group_suppresses_collision() {
        let a = ShapeFilter::new(7, Categories::ALL, Categories::ALL);
        let b = ShapeFilter::new(7, Categories::ALL, Categories::ALL);
        let c = ShapeFilter::default();
        assert!(a.rejects(&b));
        assert!(!a.rejects(&c));
    }

    #[test]
    fn test_filter_mask_must_match_both_ways() {
        let cat_a = Categories::from_bits_retain(1 << 0);
        let cat_b = Categories::from_bits_retain(1 << 1);
        let a = ShapeFilter::new(0, cat_a, cat_b);
        let b = ShapeFilter::new(0, cat_b, cat_b);
        // b does not accept category a
        assert!(a.rejects(&b));
        let b = ShapeFilter::new(0, cat_b, cat_a);
        assert!(!a.rejects(&b));
    }

    #[test]
    fn test_moment_for_box_matches_formula() {
        let m = moment_for_box(100.0, 200.0, 100.0);
        assert!((m - 100.0 * (200.0f32 * 200.0 + 100.0 * 100.0) / 12.0).abs() < 1e-2);
    }

    #[test]
    fn test_moment_for_poly_box_agrees_with_moment_for_box() {
        let verts = [
            Vec2::new(-2.0, -1.0),
            Vec2::new(2.0, -1.0),
            Vec2::new(2.0, 1.0),
            Vec2::new(-2.0, 1.0),
        ];
        let from_poly = moment_for_poly(6.0, &verts);
        let from_box = moment_for_box(6.0, 4.0, 2.0);
        assert!((from_poly - from_box).abs() < EPSILON);
    }

    #[test]
    fn test_moment_for_circle_with_offset() {
        let centered = moment_for_circle(2.0, 0.0, 3.0, Vec2::ZERO);
        assert!((centered - 9.0).abs() < EPSILON);
        let offset = moment_for_circle(2.0, 0.0, 3.0, Vec2::new(4.0, 0.0));
        assert!((offset - (9.0 + 32.0)).abs() < EPSILON);
    }
}
