//! Rotated-rectangle math for card layout and hit-testing.
//!
//! Cards are anchored at their top-left corner and rotated about that
//! corner, as a canvas `translate` + `rotate` would draw them. Angles are
//! degrees at this API; rotation is clockwise on screen because y grows
//! downward.

use kurbo::{Affine, Point, Size, Vec2};
use std::sync::LazyLock;

/// Card width in table units.
pub const CARD_WIDTH: f64 = 150.0;
/// Card height in table units.
pub const CARD_HEIGHT: f64 = 210.0;
/// Size of every card on the table.
pub const CARD_SIZE: Size = Size::new(CARD_WIDTH, CARD_HEIGHT);

/// Diagonal angle and half-diagonal for `CARD_SIZE`.
static CARD_POLAR: LazyLock<(f64, f64)> = LazyLock::new(|| polar_params(CARD_SIZE));

fn polar_params(size: Size) -> (f64, f64) {
    let diag_angle = (size.height / size.width).atan();
    let radius = (size.width / 2.0).hypot(size.height / 2.0);
    (diag_angle, radius)
}

/// Center of a corner-anchored rectangle plus the polar parameters needed to
/// go from the center back to the corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectPose {
    pub mid: Point,
    /// Angle of the diagonal in radians, ignoring rotation.
    pub diag_angle: f64,
    /// Distance from the center to any corner.
    pub radius: f64,
}

/// Corner position plus rotation, the way cards store their placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub origin: Point,
    pub rot: f64,
}

pub fn rect_pose(origin: Point, size: Size, rot_deg: f64) -> RectPose {
    let (diag_angle, radius) = if size == CARD_SIZE {
        *CARD_POLAR
    } else {
        polar_params(size)
    };
    // Same point as radius * (cos, sin)(rot + diag_angle), but exact when
    // the rotation is a multiple of 90 degrees.
    let (sin, cos) = rot_deg.to_radians().sin_cos();
    let (hw, hh) = (size.width / 2.0, size.height / 2.0);
    let mid = origin + Vec2::new(hw * cos - hh * sin, hw * sin + hh * cos);
    RectPose {
        mid,
        diag_angle,
        radius,
    }
}

/// True center of a corner-anchored rectangle.
pub fn rect_center(origin: Point, size: Size, rot_deg: f64) -> Point {
    rect_pose(origin, size, rot_deg).mid
}

/// Rotate a rectangle about its own center by `delta_deg`.
pub fn rotate_around_center(origin: Point, size: Size, rot_deg: f64, delta_deg: f64) -> Placement {
    let pose = rect_pose(origin, size, rot_deg);
    let rot = rot_deg + delta_deg;
    let origin = pose.mid - Vec2::from_angle(rot.to_radians() + pose.diag_angle) * pose.radius;
    Placement { origin, rot }
}

/// Corner position that puts the center of an unrotated rectangle at `center`.
pub fn origin_for_center(center: Point, size: Size) -> Point {
    center - size.to_vec2() / 2.0
}

/// Whether `point` lies strictly inside the rotated rectangle.
///
/// The point is rotated back into the rectangle's unrotated frame about its
/// center. Points on an edge are outside.
pub fn point_in_rotated_rect(origin: Point, size: Size, rot_deg: f64, point: Point) -> bool {
    let mid = rect_center(origin, size, rot_deg);
    let local = Affine::rotate_about(-rot_deg.to_radians(), mid) * point;
    let half_w = size.width / 2.0;
    let half_h = size.height / 2.0;
    mid.x - half_w < local.x
        && local.x < mid.x + half_w
        && mid.y - half_h < local.y
        && local.y < mid.y + half_h
}
