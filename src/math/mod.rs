pub mod intersect_3d;

/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3,
    pub max: Point3,
}

impl Aabb {
    /// Bounding box of a set of points, or `None` when the set is empty.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut aabb = Self {
            min: *first,
            max: *first,
        };
        for p in iter {
            aabb.include(p);
        }
        Some(aabb)
    }

    /// Grows the box so it contains `p`.
    pub fn include(&mut self, p: &Point3) {
        for k in 0..3 {
            self.min[k] = self.min[k].min(p[k]);
            self.max[k] = self.max[k].max(p[k]);
        }
    }

    /// Closed-interval overlap test on all three axes.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        (0..3).all(|k| self.min[k] <= other.max[k] && other.min[k] <= self.max[k])
    }

    #[must_use]
    pub fn center(&self) -> Point3 {
        nalgebra::center(&self.min, &self.max)
    }

    #[must_use]
    pub fn extent(&self) -> Vector3 {
        self.max - self.min
    }

    /// Box enlarged by `margin` on every side.
    #[must_use]
    pub fn expanded(&self, margin: f64) -> Self {
        let pad = Vector3::repeat(margin);
        Self {
            min: self.min - pad,
            max: self.max + pad,
        }
    }
}

/// Angle at `apex` between the rays towards `a` and `b`, in radians.
///
/// Returns 0 when either ray has zero length.
#[must_use]
pub fn opening_angle(apex: &Point3, a: &Point3, b: &Point3) -> f64 {
    let u = a - apex;
    let v = b - apex;
    let denom = u.norm() * v.norm();
    if denom < TOLERANCE * TOLERANCE {
        return 0.0;
    }
    (u.dot(&v) / denom).clamp(-1.0, 1.0).acos()
}
