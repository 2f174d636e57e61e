//! Static reference marker drawn in every mode: a bipyramid at the origin
//! with an equatorial ring, as a line list.

use std::f64::consts::TAU;

use crate::geometry::GeometryBuffers;

pub const RING_SEGMENTS: u32 = 32;
const APEX: f32 = 0.3;
const HALF_WIDTH: f32 = 0.15;
const RING_RADIUS: f64 = 0.5;

/// Builds the marker geometry. Vertices only carry positions.
pub fn crystal() -> GeometryBuffers {
    let mut buffers = GeometryBuffers::new();

    // apexes on the y axis, square waist in the xz plane
    buffers.push_vertex([0.0, APEX, 0.0]);
    buffers.push_vertex([0.0, -APEX, 0.0]);
    for [x, z] in [[HALF_WIDTH, 0.0], [0.0, HALF_WIDTH], [-HALF_WIDTH, 0.0], [0.0, -HALF_WIDTH]] {
        buffers.push_vertex([x, 0.0, z]);
    }
    for waist in 2..6u32 {
        let next = 2 + (waist - 1) % 4;
        for index in [0, waist, 1, waist, waist, next] {
            buffers.push_index(index);
        }
    }

    let first = buffers.vertex_count() as u32;
    for k in 0..RING_SEGMENTS {
        let angle = k as f64 * TAU / RING_SEGMENTS as f64;
        buffers.push_vertex([
            (RING_RADIUS * angle.cos()) as f32,
            0.0,
            (RING_RADIUS * angle.sin()) as f32,
        ]);
        buffers.push_index(first + k);
        buffers.push_index(first + (k + 1) % RING_SEGMENTS);
    }

    buffers
}
