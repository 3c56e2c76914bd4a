use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;

    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn scaled(self, factor: f64) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("rect size must be finite and non-negative, got {width}x{height}")]
    InvalidSize { width: f64, height: f64 },
    #[error("rect center must be finite, got ({x}, {y})")]
    InvalidCenter { x: f64, y: f64 },
}

/// Axis-aligned box described by its center. The y axis grows downward, so
/// `top()` is the smaller y edge.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub center: Vec2,
    pub size: Size,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            center: Vec2::new(x, y),
            size: Size::new(width, height),
        }
    }

    /// Checked constructor for boxes that come from outside the simulation.
    pub fn try_new(center: Vec2, size: Size) -> Result<Self, GeometryError> {
        if !center.is_finite() {
            return Err(GeometryError::InvalidCenter {
                x: center.x,
                y: center.y,
            });
        }
        let valid_extent = |value: f64| value.is_finite() && value >= 0.0;
        if !valid_extent(size.width) || !valid_extent(size.height) {
            return Err(GeometryError::InvalidSize {
                width: size.width,
                height: size.height,
            });
        }
        Ok(Self { center, size })
    }

    pub fn left(&self) -> f64 {
        self.center.x - self.size.width / 2.0
    }

    pub fn right(&self) -> f64 {
        self.left() + self.size.width
    }

    pub fn top(&self) -> f64 {
        self.center.y - self.size.height / 2.0
    }

    pub fn bottom(&self) -> f64 {
        self.top() + self.size.height
    }

    pub fn translated(&self, offset: Vec2) -> Rect {
        Rect {
            center: self.center + offset,
            size: self.size,
        }
    }

    /// Signed penetration of `self` into `other`, or `None` when the boxes
    /// only touch or are apart.
    ///
    /// Each axis reports whichever of the two edge differences has the
    /// smaller magnitude; on an exact tie the second difference
    /// (`left - other.right`, `top - other.bottom`) wins.
    pub fn penetration(&self, other: &Rect) -> Option<Vec2> {
        let diff_x1 = self.right() - other.left();
        let diff_x2 = self.left() - other.right();
        let diff_y1 = self.bottom() - other.top();
        let diff_y2 = self.top() - other.bottom();

        if diff_x1 > 0.0 && diff_x2 < 0.0 && diff_y1 > 0.0 && diff_y2 < 0.0 {
            Some(Vec2::new(
                smaller_magnitude(diff_x1, diff_x2),
                smaller_magnitude(diff_y1, diff_y2),
            ))
        } else {
            None
        }
    }
}

fn smaller_magnitude(first: f64, second: f64) -> f64 {
    if first.abs() < second.abs() {
        first
    } else {
        second
    }
}
