//! Hit testing: point → key lookup.
//!
//! Walks the placed keys back to front (last painted = topmost) to find
//! which key is under a canvas position. Thumb clusters overlap their
//! neighbors on some boards, so order matters.

use crate::placement::KeyboardPlacement;
use kk_core::KeyId;
use kurbo::Point;

/// Find the topmost key at `point`, or `None` over the background.
pub fn hit_test_key(placement: &KeyboardPlacement, point: Point) -> Option<KeyId> {
    placement
        .keys()
        .iter()
        .rev()
        .find(|k| k.rect.contains(point))
        .map(|k| k.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::PlacementConfig;
    use kk_core::{KeyboardModel, PhysicalKey, Point as GridPoint, Size as GridSize};

    fn placement() -> KeyboardPlacement {
        let model = KeyboardModel::new(
            "h",
            "H",
            GridSize::new(2.0, 2.0),
            GridSize::new(4.0, 4.0),
            vec![
                PhysicalKey::new("h", GridPoint::new(1.0, 1.0), GridSize::new(4.0, 4.0)),
                // Overlaps the bottom-right quarter of the first key.
                PhysicalKey::new("h", GridPoint::new(3.0, 3.0), GridSize::new(2.0, 2.0)),
            ],
        )
        .unwrap();
        KeyboardPlacement::new(&model, Point::ZERO, 10.0, &PlacementConfig::default())
    }

    #[test]
    fn topmost_key_wins() {
        let p = placement();
        assert_eq!(hit_test_key(&p, Point::new(5.0, 5.0)), Some(KeyId::intern("h-1-1")));
        assert_eq!(hit_test_key(&p, Point::new(35.0, 35.0)), Some(KeyId::intern("h-3-3")));
    }

    #[test]
    fn background_misses() {
        assert_eq!(hit_test_key(&placement(), Point::new(100.0, 100.0)), None);
    }
}
