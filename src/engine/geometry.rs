use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// World or local space ray. `direction` is not required to be unit length
/// once a ray has been moved into a node's local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    pub fn is_valid(&self) -> bool {
        self.origin.is_finite() && self.direction.is_finite() && self.direction != Vec3::ZERO
    }

    /// Moves the ray into another space without renormalising, so a parameter
    /// `t` found in the target space maps back to the same point.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        Self {
            origin: matrix.transform_point3(self.origin),
            direction: matrix.transform_vector3(self.direction),
        }
    }

    /// Intersection with an infinite plane, `None` when parallel or behind.
    pub fn intersect_plane(&self, point: Vec3, normal: Vec3) -> Option<Vec3> {
        let denom = normal.dot(self.direction);
        if denom.abs() < 1e-8 {
            return None;
        }
        let t = (point - self.origin).dot(normal) / denom;
        (t >= 0.0).then(|| self.at(t))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_half_extents(half: Vec3) -> Self {
        Self::new(-half, half)
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        points.iter().fold(Self::EMPTY, |acc, p| acc.including(*p))
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn including(&self, point: Vec3) -> Self {
        Self::new(self.min.min(point), self.max.max(point))
    }

    pub fn union(&self, other: &Aabb) -> Self {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            (self.min + self.max) * 0.5
        }
    }

    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    pub fn transformed(&self, matrix: &Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        self.corners()
            .iter()
            .fold(Self::EMPTY, |acc, c| acc.including(matrix.transform_point3(*c)))
    }

    /// Slab test. Returns the entry parameter, or the exit parameter when the
    /// ray starts inside the box.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        if self.is_empty() {
            return None;
        }
        let inv = ray.direction.recip();
        let t1 = (self.min - ray.origin) * inv;
        let t2 = (self.max - ray.origin) * inv;
        let tmin = t1.min(t2).max_element();
        let tmax = t1.max(t2).min_element();
        if tmax < 0.0 || tmin > tmax || tmin.is_nan() || tmax.is_nan() {
            return None;
        }
        Some(if tmin >= 0.0 { tmin } else { tmax })
    }
}

/// Geometry primitives supplied by the scene graph. Analytic shapes are
/// centred on the local origin; planes lie in the local XY plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeometryShape {
    Box {
        size: Vec3,
    },
    Sphere {
        radius: f32,
        width_segments: u32,
        height_segments: u32,
    },
    Plane {
        width: f32,
        height: f32,
    },
    Cylinder {
        radius_top: f32,
        radius_bottom: f32,
        height: f32,
        radial_segments: u32,
    },
    Line {
        points: Vec<Vec3>,
        dashed: bool,
    },
    Edges {
        source: Box<GeometryShape>,
    },
    TriangleMesh {
        positions: Vec<Vec3>,
        indices: Vec<u32>,
    },
}

impl GeometryShape {
    pub fn sphere(radius: f32) -> Self {
        Self::Sphere {
            radius,
            width_segments: 32,
            height_segments: 16,
        }
    }

    pub fn cuboid(size: Vec3) -> Self {
        Self::Box { size }
    }

    pub fn line(start: Vec3, end: Vec3, dashed: bool) -> Self {
        Self::Line {
            points: vec![start, end],
            dashed,
        }
    }

    pub fn edges_of(source: &GeometryShape) -> Self {
        Self::Edges {
            source: Box::new(source.clone()),
        }
    }

    pub fn bounds(&self) -> Aabb {
        match self {
            Self::Box { size } => Aabb::from_half_extents(*size * 0.5),
            Self::Sphere { radius, .. } => Aabb::from_half_extents(Vec3::splat(*radius)),
            Self::Plane { width, height } => {
                Aabb::from_half_extents(Vec3::new(width * 0.5, height * 0.5, 0.0))
            }
            Self::Cylinder {
                radius_top,
                radius_bottom,
                height,
                ..
            } => {
                let r = radius_top.max(*radius_bottom);
                Aabb::from_half_extents(Vec3::new(r, height * 0.5, r))
            }
            Self::Line { points, .. } => Aabb::from_points(points),
            Self::Edges { source } => source.bounds(),
            Self::TriangleMesh { positions, .. } => Aabb::from_points(positions),
        }
    }

    pub fn vertex_count(&self) -> usize {
        match self {
            Self::Box { .. } => 24,
            Self::Sphere {
                width_segments,
                height_segments,
                ..
            } => ((width_segments + 1) * (height_segments + 1)) as usize,
            Self::Plane { .. } => 4,
            Self::Cylinder {
                radius_top,
                radius_bottom,
                radial_segments,
                ..
            } => {
                let r = *radial_segments as usize;
                let caps = [radius_top, radius_bottom]
                    .iter()
                    .filter(|radius| ***radius > 0.0)
                    .count();
                (r + 1) * 2 + caps * (r + r + 1)
            }
            Self::Line { points, .. } => points.len(),
            Self::Edges { source } => source.edge_count() * 2,
            Self::TriangleMesh { positions, .. } => positions.len(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        match self {
            Self::Box { .. } => 12,
            Self::Sphere {
                width_segments,
                height_segments,
                ..
            } => (2 * width_segments * height_segments.saturating_sub(1)) as usize,
            Self::Plane { .. } => 2,
            Self::Cylinder {
                radius_top,
                radius_bottom,
                radial_segments,
                ..
            } => {
                let r = *radial_segments as usize;
                let caps = [radius_top, radius_bottom]
                    .iter()
                    .filter(|radius| ***radius > 0.0)
                    .count();
                r * 2 + caps * r
            }
            Self::Line { .. } | Self::Edges { .. } => 0,
            Self::TriangleMesh { indices, .. } => indices.len() / 3,
        }
    }

    fn edge_count(&self) -> usize {
        match self {
            Self::Box { .. } => 12,
            Self::Plane { .. } => 4,
            Self::Line { points, .. } => points.len().saturating_sub(1),
            Self::Edges { source } => source.edge_count(),
            // Analytic curved shapes and meshes: every triangle edge, shared once.
            _ => self.triangle_count() * 3 / 2,
        }
    }

    /// Whether the shape takes part in hit-testing at all.
    pub fn is_surface(&self) -> bool {
        !matches!(self, Self::Line { .. } | Self::Edges { .. })
    }

    /// Local-space intersection. Returns the ray parameter of the nearest hit
    /// in front of the origin.
    pub fn intersect_local(&self, ray: &Ray) -> Option<f32> {
        match self {
            Self::Sphere { radius, .. } => intersect_sphere(ray, *radius),
            Self::Plane { width, height } => intersect_quad(ray, *width, *height),
            Self::Box { .. } => self.bounds().intersect_ray(ray),
            Self::Cylinder {
                radius_top,
                radius_bottom,
                height,
                ..
            } => intersect_cylinder(ray, *radius_top, *radius_bottom, *height),
            Self::TriangleMesh { positions, indices } => intersect_triangles(ray, positions, indices),
            Self::Line { .. } | Self::Edges { .. } => None,
        }
    }
}

fn intersect_sphere(ray: &Ray, radius: f32) -> Option<f32> {
    let a = ray.direction.length_squared();
    if a <= f32::EPSILON {
        return None;
    }
    let b = ray.origin.dot(ray.direction);
    let c = ray.origin.length_squared() - radius * radius;
    let discriminant = b * b - a * c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    let t1 = (-b - root) / a;
    let t2 = (-b + root) / a;
    if t1 >= 0.0 {
        Some(t1)
    } else if t2 >= 0.0 {
        Some(t2)
    } else {
        None
    }
}

fn intersect_quad(ray: &Ray, width: f32, height: f32) -> Option<f32> {
    if ray.direction.z.abs() < 1e-8 {
        return None;
    }
    let t = -ray.origin.z / ray.direction.z;
    if t < 0.0 {
        return None;
    }
    let p = ray.at(t);
    (p.x.abs() <= width * 0.5 && p.y.abs() <= height * 0.5).then_some(t)
}

/// Y-axis frustum centred on the origin: the sloped wall plus each cap with
/// a non-zero radius. Covers cylinders and cones alike.
fn intersect_cylinder(ray: &Ray, radius_top: f32, radius_bottom: f32, height: f32) -> Option<f32> {
    if height <= 0.0 {
        return None;
    }
    let half = height * 0.5;
    let slope = (radius_top - radius_bottom) / height;
    let (o, d) = (ray.origin, ray.direction);
    let radius_here = (radius_top + radius_bottom) * 0.5 + slope * o.y;

    let a = d.x * d.x + d.z * d.z - slope * slope * d.y * d.y;
    let b = 2.0 * (o.x * d.x + o.z * d.z - slope * radius_here * d.y);
    let c = o.x * o.x + o.z * o.z - radius_here * radius_here;
    let mut wall = [None, None];
    if a.abs() > 1e-8 {
        let discriminant = b * b - 4.0 * a * c;
        if discriminant >= 0.0 {
            let root = discriminant.sqrt();
            wall = [Some((-b - root) / (2.0 * a)), Some((-b + root) / (2.0 * a))];
        }
    } else if b.abs() > 1e-8 {
        wall[0] = Some(-c / b);
    }
    let wall = wall
        .into_iter()
        .flatten()
        .filter(|t| *t >= 0.0 && ray.at(*t).y.abs() <= half);

    let caps = [(half, radius_top), (-half, radius_bottom)]
        .into_iter()
        .filter(|(_, radius)| *radius > 0.0 && d.y.abs() > 1e-8)
        .filter_map(|(y, radius)| {
            let t = (y - o.y) / d.y;
            let p = ray.at(t);
            (t >= 0.0 && p.x * p.x + p.z * p.z <= radius * radius).then_some(t)
        });

    wall.chain(caps).min_by(f32::total_cmp)
}

/// Double-sided Möller–Trumbore over an indexed triangle list.
fn intersect_triangles(ray: &Ray, positions: &[Vec3], indices: &[u32]) -> Option<f32> {
    let mut nearest: Option<f32> = None;
    for tri in indices.chunks_exact(3) {
        let (Some(a), Some(b), Some(c)) = (
            positions.get(tri[0] as usize),
            positions.get(tri[1] as usize),
            positions.get(tri[2] as usize),
        ) else {
            continue;
        };
        let edge1 = *b - *a;
        let edge2 = *c - *a;
        let h = ray.direction.cross(edge2);
        let det = edge1.dot(h);
        if det.abs() < 1e-10 {
            continue;
        }
        let f = 1.0 / det;
        let s = ray.origin - *a;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            continue;
        }
        let q = s.cross(edge1);
        let v = f * ray.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            continue;
        }
        let t = f * edge2.dot(q);
        if t > 1e-8 && nearest.map_or(true, |best| t < best) {
            nearest = Some(t);
        }
    }
    nearest
}
