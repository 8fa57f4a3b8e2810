//! Geometry value types: points, rectangles, affine matrices
//!
//! These never own pixel data. Operations take them by value and clip them
//! against buffer extents before touching any bytes.

use serde::{Deserialize, Serialize};

/// A pixel position, used as the destination offset for copy-style operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned pixel region. Width and height may be zero or negative,
/// in which case the rectangle is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rectangle {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle at the origin covering `width` x `height`
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    #[inline]
    pub fn left(&self) -> i32 {
        self.x
    }

    #[inline]
    pub fn top(&self) -> i32 {
        self.y
    }

    /// Exclusive right edge
    #[inline]
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge
    #[inline]
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Overlap of two rectangles, or `None` when they do not intersect.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self::new(x0, y0, x1 - x0, y1 - y0))
    }

    /// Clip against a `width` x `height` buffer anchored at the origin.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<Self> {
        self.intersection(&Self::from_size(width, height))
    }

    pub fn area(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.width as u64 * self.height as u64
        }
    }
}

/// 2D affine transform `[a c tx; b d ty]`.
///
/// Maps `(x, y)` to `(a*x + c*y + tx, b*x + d*y + ty)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, tx: f64, ty: f64) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    pub fn rotation(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// `self` followed by `other`
    pub fn concat(&self, other: &Self) -> Self {
        Self {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            tx: self.tx * other.a + self.ty * other.c + other.tx,
            ty: self.tx * other.b + self.ty * other.d + other.ty,
        }
    }

    #[inline]
    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.tx,
            self.b * x + self.d * y + self.ty,
        )
    }

    /// Same matrix with the translation dropped.
    pub fn linear(&self) -> Self {
        Self {
            tx: 0.0,
            ty: 0.0,
            ..*self
        }
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// Inverse transform, or `None` for a singular matrix.
    pub fn invert(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() < f64::EPSILON {
            return None;
        }
        let inv = 1.0 / det;
        Some(Self {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            tx: (self.c * self.ty - self.d * self.tx) * inv,
            ty: (self.b * self.tx - self.a * self.ty) * inv,
        })
    }
}

/// A source/destination pair of equally sized, fully in-bounds regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyRegion {
    pub src_x: u32,
    pub src_y: u32,
    pub dst_x: u32,
    pub dst_y: u32,
    pub width: u32,
    pub height: u32,
}

impl CopyRegion {
    /// Clip `src_rect` (in a `src_w` x `src_h` source) placed at `dest` in a
    /// `dst_w` x `dst_h` destination. Both sides are trimmed so every read and
    /// every write lands inside its buffer. `None` when nothing overlaps.
    pub fn clip(
        src_w: u32,
        src_h: u32,
        src_rect: Rectangle,
        dst_w: u32,
        dst_h: u32,
        dest: Point,
    ) -> Option<Self> {
        let src = src_rect.clip_to(src_w, src_h)?;

        // Destination origin follows whatever was trimmed off the source.
        let mut dx = i64::from(dest.x) + i64::from(src.x) - i64::from(src_rect.x);
        let mut dy = i64::from(dest.y) + i64::from(src.y) - i64::from(src_rect.y);
        let mut sx = i64::from(src.x);
        let mut sy = i64::from(src.y);
        let mut w = i64::from(src.width);
        let mut h = i64::from(src.height);

        if dx < 0 {
            sx -= dx;
            w += dx;
            dx = 0;
        }
        if dy < 0 {
            sy -= dy;
            h += dy;
            dy = 0;
        }
        w = w.min(i64::from(dst_w) - dx);
        h = h.min(i64::from(dst_h) - dy);
        if w <= 0 || h <= 0 {
            return None;
        }

        Some(Self {
            src_x: sx as u32,
            src_y: sy as u32,
            dst_x: dx as u32,
            dst_y: dy as u32,
            width: w as u32,
            height: h as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_rect_intersection() {
        let a = Rectangle::new(0, 0, 10, 10);
        let b = Rectangle::new(5, 5, 10, 10);
        assert_eq!(a.intersection(&b), Some(Rectangle::new(5, 5, 5, 5)));
        assert_eq!(a.intersection(&Rectangle::new(10, 0, 5, 5)), None);
        assert_eq!(
            Rectangle::new(-4, -4, 8, 8).clip_to(3, 3),
            Some(Rectangle::new(0, 0, 3, 3))
        );
    }

    #[test]
    fn test_rect_empty_and_contains() {
        assert!(Rectangle::new(0, 0, 0, 5).is_empty());
        assert!(Rectangle::new(0, 0, -1, 5).is_empty());
        let r = Rectangle::new(2, 3, 4, 5);
        assert!(r.contains(2, 3));
        assert!(!r.contains(6, 3));
        assert_eq!(r.area(), 20);
    }

    #[test]
    fn test_matrix_invert_round_trip() {
        let m = Matrix::new(2.0, 0.5, -0.25, 1.5, 10.0, -4.0);
        let inv = m.invert().unwrap();
        let (x, y) = m.transform_point(3.0, 7.0);
        let (bx, by) = inv.transform_point(x, y);
        assert!((bx - 3.0).abs() < 1e-9);
        assert!((by - 7.0).abs() < 1e-9);
        assert!(Matrix::scaling(0.0, 1.0).invert().is_none());
    }

    #[test]
    fn test_matrix_concat_order() {
        let m = Matrix::scaling(2.0, 2.0).concat(&Matrix::translation(5.0, 0.0));
        assert_eq!(m.transform_point(1.0, 1.0), (7.0, 2.0));
    }

    #[test]
    fn test_copy_region_inside() {
        let r = CopyRegion::clip(10, 10, Rectangle::new(1, 1, 4, 4), 10, 10, Point::new(3, 3));
        assert_eq!(
            r,
            Some(CopyRegion {
                src_x: 1,
                src_y: 1,
                dst_x: 3,
                dst_y: 3,
                width: 4,
                height: 4
            })
        );
    }

    #[test]
    fn test_copy_region_clips_both_sides() {
        // Source rect hangs off the top-left of the source; destination hangs off the right.
        let r = CopyRegion::clip(8, 8, Rectangle::new(-2, -2, 6, 6), 5, 5, Point::new(1, 1)).unwrap();
        assert_eq!((r.src_x, r.src_y), (0, 0));
        assert_eq!((r.dst_x, r.dst_y), (3, 3));
        assert_eq!((r.width, r.height), (2, 2));

        let r = CopyRegion::clip(8, 8, Rectangle::new(0, 0, 8, 8), 8, 8, Point::new(-3, 0)).unwrap();
        assert_eq!((r.src_x, r.dst_x, r.width), (3, 0, 5));

        assert!(CopyRegion::clip(8, 8, Rectangle::new(0, 0, 8, 8), 8, 8, Point::new(8, 0)).is_none());
    }
}
