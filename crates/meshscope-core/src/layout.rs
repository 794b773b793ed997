//! Deterministic star layout.
//!
//! The leader sits at the configured center. Every other node is placed on
//! a circle around it at `order * spacing` degrees, where `order` is the
//! number of nodes registered before it (the leader included). Positions are
//! a pure function of arrival order, so replaying the same sequence of
//! addresses reproduces the same picture.

use meshscope_types::Point;

use crate::config::LayoutConfig;

/// Full turn in degrees.
const FULL_TURN_DEG: f64 = 360.0;

/// Angle between consecutive slots, in degrees.
///
/// Uses the configured `spacing_deg` when present, otherwise divides the
/// circle evenly into `max_slots` slots.
pub fn spacing_deg(layout: &LayoutConfig, max_slots: usize) -> f64 {
    layout
        .spacing_deg
        .unwrap_or_else(|| FULL_TURN_DEG / to_f64(max_slots.max(1)))
}

/// Compute the position of a node.
///
/// Once more than `max_slots` nodes exist the angle wraps around and later
/// nodes land exactly on earlier ones.
pub fn assign(order: usize, is_leader: bool, layout: &LayoutConfig, max_slots: usize) -> Point {
    if is_leader {
        return layout.center;
    }
    let angle = (to_f64(order) * spacing_deg(layout, max_slots)).to_radians();
    Point::new(
        layout.radius.mul_add(angle.cos(), layout.center.x),
        layout.radius.mul_add(angle.sin(), layout.center.y),
    )
}

fn to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}
