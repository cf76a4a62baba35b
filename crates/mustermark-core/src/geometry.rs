//! Rectangles, words and affine matrices in PDF user space
//!
//! PDF user space has its origin at the bottom-left corner of the page, so a
//! rectangle's `top` is numerically greater than or equal to its `bottom`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Smallest rectangle containing all given points
    pub fn from_points(points: &[(f64, f64)]) -> Self {
        let mut rect = Rect::new(f64::MAX, f64::MIN, f64::MIN, f64::MAX);
        for &(x, y) in points {
            rect.left = rect.left.min(x);
            rect.right = rect.right.max(x);
            rect.bottom = rect.bottom.min(y);
            rect.top = rect.top.max(y);
        }
        rect
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.min(other.left),
            top: self.top.max(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.min(other.bottom),
        }
    }

    /// Whether `other` lies inside this rectangle, allowing `tolerance`
    /// points of slack on every side.
    pub fn covers(&self, other: &Rect, tolerance: f64) -> bool {
        self.left <= other.left + tolerance
            && self.bottom <= other.bottom + tolerance
            && self.right + tolerance >= other.right
            && self.top + tolerance >= other.top
    }
}

/// A word extracted from a page together with its bounding box
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Word {
    pub rect: Rect,
    pub text: String,
}

/// Affine transformation `[a b c d e f]` as used by PDF operators such as
/// `cm` and `Tm`. Points are row vectors: `p' = p × M`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }
}
