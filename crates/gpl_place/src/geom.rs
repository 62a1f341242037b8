//! Planar geometry primitives in database units.

use serde::{Deserialize, Serialize};

/// A point in the placement plane.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Creates a point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns `true` if both coordinates are finite.
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl std::ops::Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Width and height of an object.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Size {
    /// Extent along x.
    pub width: f64,
    /// Extent along y.
    pub height: f64,
}

impl Size {
    /// Creates a size.
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Area covered by this size.
    pub fn area(self) -> f64 {
        self.width * self.height
    }
}

/// An axis-aligned rectangle given by its lower-left and upper-right corners.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Lower x bound.
    pub lx: f64,
    /// Lower y bound.
    pub ly: f64,
    /// Upper x bound.
    pub ux: f64,
    /// Upper y bound.
    pub uy: f64,
}

impl Rect {
    /// Creates a rectangle from its corners.
    pub const fn new(lx: f64, ly: f64, ux: f64, uy: f64) -> Self {
        Self { lx, ly, ux, uy }
    }

    /// Creates a rectangle of the given size centered on `center`.
    pub fn centered(center: Point, size: Size) -> Self {
        let hw = 0.5 * size.width;
        let hh = 0.5 * size.height;
        Self::new(center.x - hw, center.y - hh, center.x + hw, center.y + hh)
    }

    /// Width of the rectangle.
    pub fn width(&self) -> f64 {
        self.ux - self.lx
    }

    /// Height of the rectangle.
    pub fn height(&self) -> f64 {
        self.uy - self.ly
    }

    /// Area of the rectangle.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Center point.
    pub fn center(&self) -> Point {
        Point::new(0.5 * (self.lx + self.ux), 0.5 * (self.ly + self.uy))
    }

    /// Returns `true` if the rectangle has positive width and height.
    pub fn is_valid(&self) -> bool {
        self.ux > self.lx && self.uy > self.ly
    }

    /// Returns `true` if `other` lies entirely inside this rectangle.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.lx >= self.lx && other.ly >= self.ly && other.ux <= self.ux && other.uy <= self.uy
    }

    /// Area of the intersection with `other`, zero when disjoint.
    pub fn overlap_area(&self, other: &Rect) -> f64 {
        let w = self.ux.min(other.ux) - self.lx.max(other.lx);
        let h = self.uy.min(other.uy) - self.ly.max(other.ly);
        if w <= 0.0 || h <= 0.0 {
            0.0
        } else {
            w * h
        }
    }

    /// Half-perimeter of the rectangle.
    pub fn half_perimeter(&self) -> f64 {
        self.width() + self.height()
    }
}

/// A running bounding box over a set of points.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BoundingBox {
    lx: f64,
    ly: f64,
    ux: f64,
    uy: f64,
}

impl BoundingBox {
    pub(crate) fn empty() -> Self {
        Self {
            lx: f64::INFINITY,
            ly: f64::INFINITY,
            ux: f64::NEG_INFINITY,
            uy: f64::NEG_INFINITY,
        }
    }

    pub(crate) fn include(&mut self, p: Point) {
        self.lx = self.lx.min(p.x);
        self.ly = self.ly.min(p.y);
        self.ux = self.ux.max(p.x);
        self.uy = self.uy.max(p.y);
    }

    /// Returns `None` when no point was included.
    pub(crate) fn finish(self) -> Option<Rect> {
        if self.lx > self.ux {
            None
        } else {
            Some(Rect::new(self.lx, self.ly, self.ux, self.uy))
        }
    }
}
