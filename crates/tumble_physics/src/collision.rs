//! Narrow-phase collision detection
//!
//! Each shape-kind pair dispatches to an exact intersection test that
//! produces at most one [`Contact`] carrying the minimum-translation
//! normal and penetration depth. Normals always point from shape A toward
//! shape B.

use tumble_math::Vec2;

use crate::body::BodyKey;
use crate::shapes::{closest_point_on_segment, Geometry, Shape, ShapeKey};

/// A transient contact between two overlapping shapes
///
/// Rebuilt from scratch every step; never stored across steps.
#[derive(Clone, Copy, Debug)]
pub struct Contact {
    pub shape_a: ShapeKey,
    pub shape_b: ShapeKey,
    pub body_a: BodyKey,
    pub body_b: BodyKey,
    /// Representative contact point in world space
    pub point: Vec2,
    /// Unit normal pointing from shape A toward shape B
    pub normal: Vec2,
    /// Penetration depth, positive while overlapping
    pub depth: f32,
}

/// Shape geometry resolved into world space for one step
enum WorldGeom {
    Circle { center: Vec2, radius: f32 },
    Poly { verts: Vec<Vec2> },
    Seg { a: Vec2, b: Vec2, radius: f32 },
}

fn to_world(geometry: &Geometry, pos: Vec2, rot: Vec2) -> WorldGeom {
    match geometry {
        Geometry::Circle { radius, offset } => WorldGeom::Circle {
            center: pos + offset.rotated_by(rot),
            radius: *radius,
        },
        Geometry::Polygon { verts } => WorldGeom::Poly {
            verts: verts.iter().map(|v| pos + v.rotated_by(rot)).collect(),
        },
        Geometry::Segment { a, b, radius } => WorldGeom::Seg {
            a: pos + a.rotated_by(rot),
            b: pos + b.rotated_by(rot),
            radius: *radius,
        },
    }
}

/// Raw narrow-phase result before it is tied to shape/body keys
struct RawContact {
    point: Vec2,
    normal: Vec2,
    depth: f32,
}

/// Run the narrow phase for one candidate pair
///
/// `pose_*` is the owning body's `(position, rotation)` pair. Returns
/// `None` for non-touching pairs and for segment-segment pairs, which
/// never collide.
#[allow(clippy::too_many_arguments)]
pub(crate) fn collide(
    key_a: ShapeKey,
    shape_a: &Shape,
    pose_a: (Vec2, Vec2),
    key_b: ShapeKey,
    shape_b: &Shape,
    pose_b: (Vec2, Vec2),
) -> Option<Contact> {
    let a = to_world(&shape_a.geometry, pose_a.0, pose_a.1);
    let b = to_world(&shape_b.geometry, pose_b.0, pose_b.1);

    // Dispatch keyed by the unordered kind pair; flipped arguments negate
    // the normal so it still points from A toward B.
    let raw = match (&a, &b) {
        (WorldGeom::Circle { center: ca, radius: ra }, WorldGeom::Circle { center: cb, radius: rb }) => {
            circle_circle(*ca, *ra, *cb, *rb)
        }
        (WorldGeom::Circle { center, radius }, WorldGeom::Poly { verts }) => {
            circle_poly(*center, *radius, verts)
        }
        (WorldGeom::Poly { verts }, WorldGeom::Circle { center, radius }) => {
            circle_poly(*center, *radius, verts).map(flip)
        }
        (WorldGeom::Circle { center, radius }, WorldGeom::Seg { a, b, radius: rs }) => {
            circle_segment(*center, *radius, *a, *b, *rs)
        }
        (WorldGeom::Seg { a, b, radius: rs }, WorldGeom::Circle { center, radius }) => {
            circle_segment(*center, *radius, *a, *b, *rs).map(flip)
        }
        (WorldGeom::Poly { verts: va }, WorldGeom::Poly { verts: vb }) => poly_poly(va, vb),
        (WorldGeom::Seg { a, b, radius }, WorldGeom::Poly { verts }) => {
            seg_poly(*a, *b, *radius, verts)
        }
        (WorldGeom::Poly { verts }, WorldGeom::Seg { a, b, radius }) => {
            seg_poly(*a, *b, *radius, verts).map(flip)
        }
        // Segments never collide with each other (they are boundary
        // geometry attached to static bodies).
        (WorldGeom::Seg { .. }, WorldGeom::Seg { .. }) => None,
    }?;

    Some(Contact {
        shape_a: key_a,
        shape_b: key_b,
        body_a: shape_a.body,
        body_b: shape_b.body,
        point: raw.point,
        normal: raw.normal,
        depth: raw.depth,
    })
}

fn flip(mut raw: RawContact) -> RawContact {
    raw.normal = -raw.normal;
    raw
}

fn circle_circle(ca: Vec2, ra: f32, cb: Vec2, rb: f32) -> Option<RawContact> {
    let delta = cb - ca;
    let dist_sq = delta.length_squared();
    let min_dist = ra + rb;
    if dist_sq >= min_dist * min_dist {
        return None;
    }
    let dist = dist_sq.sqrt();
    // coincident centers: pick an arbitrary but fixed separation axis
    let normal = if dist > 1e-6 { delta / dist } else { Vec2::Y };
    Some(RawContact {
        point: ca + normal * ra,
        normal,
        depth: min_dist - dist,
    })
}

fn circle_segment(center: Vec2, radius: f32, a: Vec2, b: Vec2, seg_radius: f32) -> Option<RawContact> {
    let closest = closest_point_on_segment(a, b, center);
    let delta = closest - center;
    let dist_sq = delta.length_squared();
    let min_dist = radius + seg_radius;
    if dist_sq >= min_dist * min_dist {
        return None;
    }
    let dist = dist_sq.sqrt();
    let normal = if dist > 1e-6 {
        delta / dist
    } else {
        // center exactly on the segment axis
        (b - a).normalized().perp()
    };
    Some(RawContact {
        point: center + normal * radius,
        normal,
        depth: min_dist - dist,
    })
}

/// Outward edge normals of a CCW-wound polygon
fn poly_normals(verts: &[Vec2]) -> Vec<Vec2> {
    let n = verts.len();
    let mut normals = Vec::with_capacity(n);
    for i in 0..n {
        let edge = verts[(i + 1) % n] - verts[i];
        // CCW winding puts the interior on the left, so the outward
        // normal is the clockwise perpendicular
        normals.push((-edge.perp()).normalized());
    }
    normals
}

fn poly_centroid(verts: &[Vec2]) -> Vec2 {
    let mut sum = Vec2::ZERO;
    for v in verts {
        sum += *v;
    }
    sum / verts.len() as f32
}

fn project_poly(verts: &[Vec2], axis: Vec2) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for v in verts {
        let p = v.dot(axis);
        min = min.min(p);
        max = max.max(p);
    }
    (min, max)
}

/// Overlap of two projection intervals; negative means separated
fn interval_overlap(a: (f32, f32), b: (f32, f32)) -> f32 {
    (a.1 - b.0).min(b.1 - a.0)
}

fn circle_poly(center: Vec2, radius: f32, verts: &[Vec2]) -> Option<RawContact> {
    let mut axes = poly_normals(verts);

    // The vertex-region axis: from the circle center toward the closest
    // polygon vertex. Without it SAT misses corner contacts.
    let mut closest = verts[0];
    let mut closest_dist_sq = f32::INFINITY;
    for v in verts {
        let d = (*v - center).length_squared();
        if d < closest_dist_sq {
            closest_dist_sq = d;
            closest = *v;
        }
    }
    let vertex_axis = (closest - center).normalized();
    if vertex_axis != Vec2::ZERO {
        axes.push(vertex_axis);
    }

    let mut min_overlap = f32::INFINITY;
    let mut min_axis = Vec2::ZERO;
    for axis in axes {
        let c = center.dot(axis);
        let overlap = interval_overlap((c - radius, c + radius), project_poly(verts, axis));
        if overlap <= 0.0 {
            return None;
        }
        if overlap < min_overlap {
            min_overlap = overlap;
            min_axis = axis;
        }
    }

    // orient from the circle (A) toward the polygon (B)
    let mut normal = min_axis;
    if (poly_centroid(verts) - center).dot(normal) < 0.0 {
        normal = -normal;
    }
    Some(RawContact {
        point: center + normal * radius,
        normal,
        depth: min_overlap,
    })
}

fn poly_poly(va: &[Vec2], vb: &[Vec2]) -> Option<RawContact> {
    let mut min_overlap = f32::INFINITY;
    let mut min_axis = Vec2::ZERO;
    for axis in poly_normals(va).into_iter().chain(poly_normals(vb)) {
        let overlap = interval_overlap(project_poly(va, axis), project_poly(vb, axis));
        if overlap <= 0.0 {
            return None;
        }
        if overlap < min_overlap {
            min_overlap = overlap;
            min_axis = axis;
        }
    }

    let mut normal = min_axis;
    if (poly_centroid(vb) - poly_centroid(va)).dot(normal) < 0.0 {
        normal = -normal;
    }

    // Representative point: midway between the support points of each
    // polygon along the contact normal.
    let support_a = support_point(va, normal);
    let support_b = support_point(vb, -normal);
    Some(RawContact {
        point: (support_a + support_b) * 0.5,
        normal,
        depth: min_overlap,
    })
}

/// Vertex furthest along `dir`
fn support_point(verts: &[Vec2], dir: Vec2) -> Vec2 {
    let mut best = verts[0];
    let mut best_proj = best.dot(dir);
    for v in &verts[1..] {
        let proj = v.dot(dir);
        if proj > best_proj {
            best_proj = proj;
            best = *v;
        }
    }
    best
}

/// Segment treated as a degenerate one-edge polygon inflated by its radius
fn seg_poly(a: Vec2, b: Vec2, seg_radius: f32, verts: &[Vec2]) -> Option<RawContact> {
    let mut axes = poly_normals(verts);
    let seg_normal = (b - a).normalized().perp();
    if seg_normal != Vec2::ZERO {
        axes.push(seg_normal);
    }
    // endpoint-region axes, the segment analogue of the circle's
    // closest-vertex axis
    for end in [a, b] {
        let mut closest = verts[0];
        let mut closest_dist_sq = f32::INFINITY;
        for v in verts {
            let d = (*v - end).length_squared();
            if d < closest_dist_sq {
                closest_dist_sq = d;
                closest = *v;
            }
        }
        let axis = (closest - end).normalized();
        if axis != Vec2::ZERO {
            axes.push(axis);
        }
    }

    let mut min_overlap = f32::INFINITY;
    let mut min_axis = Vec2::ZERO;
    for axis in axes {
        let (pa, pb) = (a.dot(axis), b.dot(axis));
        let seg_interval = (pa.min(pb) - seg_radius, pa.max(pb) + seg_radius);
        let overlap = interval_overlap(seg_interval, project_poly(verts, axis));
        if overlap <= 0.0 {
            return None;
        }
        if overlap < min_overlap {
            min_overlap = overlap;
            min_axis = axis;
        }
    }

    let mid = (a + b) * 0.5;
    let mut normal = min_axis;
    if (poly_centroid(verts) - mid).dot(normal) < 0.0 {
        normal = -normal;
    }

    // deepest polygon vertex toward the segment, pushed back out to the
    // segment surface
    let deepest = support_point(verts, -normal);
    let on_seg = closest_point_on_segment(a, b, deepest);
    Some(RawContact {
        point: on_seg + normal * seg_radius,
        normal,
        depth: min_overlap,
    })
}
