//! Grid Coordinates
//!
//! Integer cell coordinates and rectangular regions on the game grid.
//! One unit is one cell; rectangles use inclusive bounds, so a box with
//! `width = 1` spans two columns.

use std::fmt;
use std::ops::Add;
use serde::{Serialize, Deserialize};

/// A single grid cell (or a movement delta between cells).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct GridPoint {
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
}

impl GridPoint {
    /// Origin cell.
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Create a new point.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Offset this point by a delta.
    #[inline]
    pub fn offset(self, delta: GridPoint) -> Self {
        Self {
            x: self.x.saturating_add(delta.x),
            y: self.y.saturating_add(delta.y),
        }
    }
}

impl Add for GridPoint {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        self.offset(other)
    }
}

impl fmt::Debug for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl fmt::Display for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Axis-aligned rectangle on the grid.
///
/// Covers `x..=x + width` and `y..=y + height`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridBox {
    /// Left column
    pub x: i32,
    /// Top row
    pub y: i32,
    /// Horizontal extent (inclusive)
    pub width: i32,
    /// Vertical extent (inclusive)
    pub height: i32,
}

impl GridBox {
    /// Create a new box.
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Right-most covered column.
    #[inline]
    pub fn max_x(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Bottom-most covered row.
    #[inline]
    pub fn max_y(&self) -> i32 {
        self.y.saturating_add(self.height)
    }
}
