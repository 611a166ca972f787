use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Sub};

/// A point or direction in 3-space.
///
/// Distances are carried in the same unit the sensors report (millimetres);
/// the math does not care. Serializes as `{"x":…,"y":…,"z":…}` to match the
/// wire format positions are published in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length.
    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Distance to another point.
    pub fn distance(&self, other: Vec3) -> f64 {
        (*self - other).length()
    }

    /// Unit vector in the same direction. Zero-length input is returned
    /// unchanged rather than producing NaNs.
    pub fn normalized(&self) -> Vec3 {
        let len = self.length();
        if len > f64::EPSILON {
            *self / len
        } else {
            *self
        }
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f64> for Vec3 {
    type Output = Vec3;

    fn div(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

/// A distance constraint: the set of points at `radius` from `center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f64,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f64) -> Self {
        Self { center, radius }
    }
}

/// Arithmetic mean of a set of points; `Vec3::ZERO` for an empty set.
pub fn centroid<I>(points: I) -> Vec3
where
    I: IntoIterator<Item = Vec3>,
{
    let mut count = 0usize;
    let mut sum = Vec3::ZERO;
    for p in points {
        count += 1;
        sum = sum + p;
    }
    if count == 0 {
        sum
    } else {
        sum / count as f64
    }
}
