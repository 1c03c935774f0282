//! Conversion between canonical table coordinates and display pixels.
//!
//! Everything stored in the core is in table units. The renderer scales on
//! the way out and input handling unscales on the way in.

use crate::card::Card;
use kurbo::{Affine, Point, Size};
use serde::{Deserialize, Serialize};

/// Uniform display scale for the table. Never enlarges past 1:1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayScale {
    pub ratio: f64,
}

impl Default for DisplayScale {
    fn default() -> Self {
        Self { ratio: 1.0 }
    }
}

impl DisplayScale {
    /// Scale with an explicit ratio.
    pub fn new(ratio: f64) -> Self {
        Self { ratio }
    }

    /// Largest ratio that fits the table in the viewport, leaving room
    /// below it for a controls strip of `controls_height` pixels.
    pub fn fit(viewport: Size, table: Size, controls_height: f64) -> Self {
        let width_ratio = viewport.width.min(table.width) / table.width;
        let padded_height = table.height + 4.0 * controls_height;
        let height_ratio = viewport.height.min(padded_height) / padded_height;
        Self {
            ratio: width_ratio.min(height_ratio).min(1.0),
        }
    }

    /// Table-to-screen transform.
    pub fn transform(&self) -> Affine {
        Affine::scale(self.ratio)
    }

    /// Screen-to-table transform.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.ratio)
    }

    /// Table point to display pixels.
    pub fn scale(&self, point: Point) -> Point {
        Point::new(point.x * self.ratio, point.y * self.ratio)
    }

    /// Display pixels to table point.
    pub fn unscale(&self, point: Point) -> Point {
        Point::new(point.x / self.ratio, point.y / self.ratio)
    }

    /// Display size of something measured in table units.
    pub fn scale_size(&self, size: Size) -> Size {
        size * self.ratio
    }

    /// Copy of `card` positioned in display pixels. Rotation is unchanged.
    pub fn scale_card(&self, card: &Card) -> Card {
        let mut scaled = *card;
        scaled.set_origin(self.scale(card.origin()));
        scaled
    }

    pub fn unscale_card(&self, card: &Card) -> Card {
        let mut unscaled = *card;
        unscaled.set_origin(self.unscale(card.origin()));
        unscaled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{CardId, Face, Suit};
    use proptest::prelude::*;

    const TABLE: Size = Size::new(1024.0, 768.0);

    #[test]
    fn test_fit_large_viewport_is_unscaled() {
        let scale = DisplayScale::fit(Size::new(2000.0, 2000.0), TABLE, 30.0);
        assert!((scale.ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fit_narrow_viewport() {
        let scale = DisplayScale::fit(Size::new(512.0, 2000.0), TABLE, 30.0);
        assert!((scale.ratio - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fit_short_viewport_accounts_for_controls() {
        // 768 + 4 * 33 = 900
        let scale = DisplayScale::fit(Size::new(2000.0, 450.0), TABLE, 33.0);
        assert!((scale.ratio - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_transform_matches_scale() {
        let scale = DisplayScale::new(0.75);
        let p = Point::new(100.0, 40.0);
        let a = scale.transform() * p;
        let b = scale.scale(p);
        assert!((a.x - b.x).abs() < 1e-12 && (a.y - b.y).abs() < 1e-12);
        let back = scale.inverse_transform() * a;
        assert!((back.x - p.x).abs() < 1e-9 && (back.y - p.y).abs() < 1e-9);
    }

    #[test]
    fn test_card_scaling_keeps_rotation() {
        let scale = DisplayScale::new(0.5);
        let mut card = Card::new(CardId::new(Suit::Hearts, Face::Ace));
        card.x = 200.0;
        card.y = 100.0;
        card.rot = 33.0;
        let scaled = scale.scale_card(&card);
        assert_eq!(scaled.origin(), Point::new(100.0, 50.0));
        assert_eq!(scaled.rot, 33.0);
        assert_eq!(scale.unscale_card(&scaled), card);
    }

    proptest! {
        #[test]
        fn prop_scale_round_trip(
            x in -1.0e4f64..1.0e4,
            y in -1.0e4f64..1.0e4,
            ratio in 0.01f64..4.0,
        ) {
            let scale = DisplayScale::new(ratio);
            let p = Point::new(x, y);
            let there_and_back = scale.unscale(scale.scale(p));
            prop_assert!((there_and_back.x - x).abs() < 1e-9);
            prop_assert!((there_and_back.y - y).abs() < 1e-9);
            let back_and_there = scale.scale(scale.unscale(p));
            prop_assert!((back_and_there.x - x).abs() < 1e-9);
            prop_assert!((back_and_there.y - y).abs() < 1e-9);
        }
    }
}
