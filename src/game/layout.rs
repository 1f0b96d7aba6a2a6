//! Grid Layout
//!
//! Static geometry of a session: grid size, the question zone, the answer
//! zones (index-aligned with answer slots) and walls.

use serde::{Serialize, Deserialize};

use crate::core::grid::{GridBox, GridPoint};
use crate::game::collision::{collides, first_hit};
use crate::game::engine::EngineError;

/// Static grid geometry.
///
/// Field names follow the stored `state.json` document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    /// Grid width in cells
    pub width: i32,
    /// Grid height in cells
    pub height: i32,
    /// Area where the question is projected; never walkable
    #[serde(rename = "questionPosition")]
    pub question_zone: GridBox,
    /// Answer zones, one per answer slot
    #[serde(rename = "answersPositions")]
    pub answer_zones: Vec<GridBox>,
    /// Obstacles
    #[serde(default)]
    pub walls: Vec<GridBox>,
}

impl Layout {
    /// Create a layout without walls or answer zones.
    pub fn new(width: i32, height: i32, question_zone: GridBox) -> Self {
        Self {
            width,
            height,
            question_zone,
            answer_zones: Vec::new(),
            walls: Vec::new(),
        }
    }

    /// Builder: set answer zones.
    pub fn with_answer_zones(mut self, zones: Vec<GridBox>) -> Self {
        self.answer_zones = zones;
        self
    }

    /// Builder: set walls.
    pub fn with_walls(mut self, walls: Vec<GridBox>) -> Self {
        self.walls = walls;
        self
    }

    /// Check the grid has a usable size.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(EngineError::InvalidGrid {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Is the cell inside `[0, width) × [0, height)`?
    #[inline]
    pub fn in_bounds(&self, point: GridPoint) -> bool {
        point.x >= 0 && point.x < self.width && point.y >= 0 && point.y < self.height
    }

    /// Is the cell blocked by the question zone or a wall?
    pub fn is_blocked(&self, point: GridPoint) -> bool {
        collides(point, &self.question_zone)
            || self.walls.iter().any(|wall| collides(point, wall))
    }

    /// Index of the first answer zone containing the cell.
    pub fn answer_zone_at(&self, point: GridPoint) -> Option<usize> {
        first_hit(point, &self.answer_zones)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Layout {
        Layout::new(10, 10, GridBox::new(4, 4, 1, 1))
            .with_answer_zones(vec![GridBox::new(0, 0, 1, 1), GridBox::new(8, 8, 1, 1)])
            .with_walls(vec![GridBox::new(0, 5, 2, 0)])
    }

    #[test]
    fn test_bounds_are_half_open() {
        let layout = sample();
        assert!(layout.in_bounds(GridPoint::new(0, 0)));
        assert!(layout.in_bounds(GridPoint::new(9, 9)));
        assert!(!layout.in_bounds(GridPoint::new(10, 0)));
        assert!(!layout.in_bounds(GridPoint::new(0, -1)));
    }

    #[test]
    fn test_blocked_cells() {
        let layout = sample();
        assert!(layout.is_blocked(GridPoint::new(5, 5)));
        assert!(layout.is_blocked(GridPoint::new(2, 5)));
        assert!(!layout.is_blocked(GridPoint::new(3, 5)));
        assert!(!layout.is_blocked(GridPoint::new(0, 0)));
    }

    #[test]
    fn test_answer_zone_at() {
        let layout = sample();
        assert_eq!(layout.answer_zone_at(GridPoint::new(1, 1)), Some(0));
        assert_eq!(layout.answer_zone_at(GridPoint::new(9, 8)), Some(1));
        assert_eq!(layout.answer_zone_at(GridPoint::new(3, 3)), None);
    }

    #[test]
    fn test_validate() {
        assert!(sample().validate().is_ok());
        assert!(matches!(
            Layout::new(0, 5, GridBox::default()).validate(),
            Err(EngineError::InvalidGrid { width: 0, height: 5 })
        ));
    }

    #[test]
    fn test_state_document_parses() {
        let json = r#"{
            "width": 20,
            "height": 12,
            "questionPosition": {"x": 8, "y": 0, "width": 4, "height": 2},
            "answersPositions": [
                {"x": 0, "y": 10, "width": 3, "height": 1},
                {"x": 17, "y": 10, "width": 2, "height": 1}
            ],
            "walls": [{"x": 5, "y": 5, "width": 0, "height": 3}]
        }"#;

        let layout: Layout = serde_json::from_str(json).unwrap();
        assert_eq!(layout.width, 20);
        assert_eq!(layout.question_zone, GridBox::new(8, 0, 4, 2));
        assert_eq!(layout.answer_zones.len(), 2);
        assert_eq!(layout.walls.len(), 1);
    }
}
