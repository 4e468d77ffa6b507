//! Plane geometry shared by the output modes: points and center-positioned areas.
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// A 2D point or vector in floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Rotate around the origin by `degrees` with the standard 2D rotation matrix.
    /// With Y pointing down (screen space) positive angles turn clockwise.
    pub fn rotated(self, degrees: f64) -> Point {
        if degrees == 0.0 {
            return self;
        }
        let (sin, cos) = degrees.to_radians().sin_cos();
        Point {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }

    /// Component-wise multiplication.
    pub fn scale(self, factor: Point) -> Point {
        Point {
            x: self.x * factor.x,
            y: self.y * factor.y,
        }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<Point> for Point {
    type Output = Point;
    fn div(self, rhs: Point) -> Point {
        Point::new(self.x / rhs.x, self.y / rhs.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A rectangle described by its size, its **center** position and a rotation in degrees.
///
/// Used both for the tablet input area (millimeters) and the display output area (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Area {
    pub width: f64,
    pub height: f64,
    pub position: Point,
    pub rotation: f64,
}

impl Area {
    /// Build an area; negative sizes are clamped to zero.
    pub fn new(width: f64, height: f64, position: Point, rotation: f64) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
            position,
            rotation,
        }
    }

    /// An unrotated area covering `(0, 0)..(width, height)`.
    pub fn full(width: f64, height: f64) -> Self {
        Self::new(width, height, Point::new(width / 2.0, height / 2.0), 0.0)
    }

    pub fn size(&self) -> Point {
        Point::new(self.width, self.height)
    }

    /// Whether a point expressed relative to this area's center (already
    /// un-rotated) lies within the area.
    pub fn contains_relative(&self, relative: Point) -> bool {
        relative.x.abs() <= self.width / 2.0 && relative.y.abs() <= self.height / 2.0
    }

    /// Clamp an absolute point to this area's unrotated bounds.
    ///
    /// Never panics: a NaN bound leaves that side unclamped.
    pub fn clamp(&self, point: Point) -> Point {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        Point {
            x: point
                .x
                .max(self.position.x - half_w)
                .min(self.position.x + half_w),
            y: point
                .y
                .max(self.position.y - half_h)
                .min(self.position.y + half_h),
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}x{}@{}:{}°]",
            self.width, self.height, self.position, self.rotation
        )
    }
}
