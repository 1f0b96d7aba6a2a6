//! Collision Detection
//!
//! Pure grid collision tests. A player occupies exactly one cell, so every
//! check is "does this cell hit that target", where the target is either
//! another cell or an inclusive rectangle.

use crate::core::grid::{GridBox, GridPoint};

/// Anything a grid cell can collide with.
pub trait Hitbox {
    /// Does `point` fall on this target?
    fn hit_by(&self, point: GridPoint) -> bool;
}

impl Hitbox for GridPoint {
    #[inline]
    fn hit_by(&self, point: GridPoint) -> bool {
        points_equal(point, *self)
    }
}

impl Hitbox for GridBox {
    #[inline]
    fn hit_by(&self, point: GridPoint) -> bool {
        point_in_box(point, self)
    }
}

impl<T: Hitbox + ?Sized> Hitbox for &T {
    #[inline]
    fn hit_by(&self, point: GridPoint) -> bool {
        (**self).hit_by(point)
    }
}

/// Check if a point lies inside a box, bounds inclusive on both axes.
#[inline]
pub fn point_in_box(point: GridPoint, region: &GridBox) -> bool {
    point.x >= region.x
        && point.x <= region.max_x()
        && point.y >= region.y
        && point.y <= region.max_y()
}

/// Check if two points are the same cell.
#[inline]
pub fn points_equal(a: GridPoint, b: GridPoint) -> bool {
    a.x == b.x && a.y == b.y
}

/// Check a cell against any target.
///
/// Boxes use inclusive containment, points use equality. This is the one
/// test behind both player-vs-zone and player-vs-player checks.
#[inline]
pub fn collides<T: Hitbox + ?Sized>(point: GridPoint, target: &T) -> bool {
    target.hit_by(point)
}

/// Index of the first target hit by `point`, in slice order.
pub fn first_hit<T: Hitbox>(point: GridPoint, targets: &[T]) -> Option<usize> {
    targets.iter().position(|target| collides(point, target))
}
