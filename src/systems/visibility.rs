//! Visibility polygon engine.
//!
//! Computes the region visible from a viewer pose: a polygon bounded by the
//! two view-cone edges, the view-distance arc, and whatever wall geometry
//! still blocks vision. Walls participate only through their intact spans —
//! the bounding rectangles of contiguous vision-blocking slices — so partial
//! destruction literally shrinks the wall and opens internal corners at
//! every destroyed/intact boundary.
//!
//! The returned vertex list starts at the viewer position; the remaining
//! vertices wind in increasing angle relative to the heading.

use crate::config;
use crate::systems::walls::{ray_rect, Rect, WallStore};

/// Angular nudge cast on either side of every corner so rays slip just past
/// it and expose the geometry behind.
const CORNER_EPS: f64 = 1e-4;
/// Corner dedup tolerance in world units.
const CORNER_KEY_SCALE: f64 = 10.0;

pub fn visibility_polygon(vx: f64, vy: f64, heading: f64, walls: &WallStore) -> Vec<(f64, f64)> {
    visibility_polygon_with(
        vx,
        vy,
        heading,
        config::VIEW_HALF_ANGLE,
        config::VIEW_DISTANCE,
        walls,
    )
}

pub fn visibility_polygon_with(
    vx: f64,
    vy: f64,
    heading: f64,
    half_angle: f64,
    range: f64,
    walls: &WallStore,
) -> Vec<(f64, f64)> {
    let spans: Vec<Rect> = walls.iter().flat_map(|w| w.intact_spans()).collect();

    let offsets = candidate_offsets(vx, vy, heading, half_angle, range, &spans);

    // Ray cast per candidate angle, nearest blocking span or the arc
    let mut hits: Vec<(f64, (f64, f64), bool)> = Vec::with_capacity(offsets.len());
    for &off in &offsets {
        let (point, on_arc) = cast(vx, vy, heading + off, range, &spans);
        hits.push((off, point, on_arc));
    }

    // Assemble, interpolating the arc between consecutive arc hits
    let mut polygon = Vec::with_capacity(hits.len() + 8);
    polygon.push((vx, vy));

    let mut prev: Option<(f64, bool)> = None;
    for (off, point, on_arc) in hits {
        if let Some((prev_off, true)) = prev {
            if on_arc {
                let gap = off - prev_off;
                if gap > config::VIEW_ARC_STEP {
                    let samples = (gap / config::VIEW_ARC_STEP).ceil() as usize;
                    for k in 1..samples {
                        let a = heading + prev_off + gap * k as f64 / samples as f64;
                        polygon.push((vx + range * a.cos(), vy + range * a.sin()));
                    }
                }
            }
        }
        polygon.push(point);
        prev = Some((off, on_arc));
    }

    polygon
}

// ─── Candidate angles ────────────────────────────────────────────────

fn candidate_offsets(
    vx: f64,
    vy: f64,
    heading: f64,
    half_angle: f64,
    range: f64,
    spans: &[Rect],
) -> Vec<f64> {
    let mut offsets = vec![-half_angle, half_angle];

    // Reduced-wall corners, deduplicated with 0.1-unit tolerance
    let mut seen = std::collections::HashSet::new();
    for span in spans {
        for (cx, cy) in span.corners() {
            let key = (
                (cx * CORNER_KEY_SCALE).round() as i64,
                (cy * CORNER_KEY_SCALE).round() as i64,
            );
            if !seen.insert(key) {
                continue;
            }
            let dx = cx - vx;
            let dy = cy - vy;
            if dx * dx + dy * dy > range * range {
                continue;
            }
            let off = angle_offset(dy.atan2(dx), heading);
            if off.abs() > half_angle {
                continue;
            }
            offsets.push(off);
            for nudged in [off - CORNER_EPS, off + CORNER_EPS] {
                if nudged.abs() <= half_angle {
                    offsets.push(nudged);
                }
            }
        }
    }

    // Points where a span edge crosses the view arc
    for span in spans {
        let corners = span.corners();
        for i in 0..4 {
            let (ax, ay) = corners[i];
            let (bx, by) = corners[(i + 1) % 4];
            for (px, py) in circle_segment_hits(vx, vy, range, ax, ay, bx, by) {
                let off = angle_offset((py - vy).atan2(px - vx), heading);
                if off.abs() <= half_angle {
                    offsets.push(off);
                }
            }
        }
    }

    // Sort by offset from the heading; raw atan2 comparison would break on
    // the ±π seam
    offsets.sort_by(|a, b| a.partial_cmp(b).unwrap());
    offsets.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
    offsets
}

/// Difference between an absolute angle and the heading, normalized to
/// (-π, π].
fn angle_offset(angle: f64, heading: f64) -> f64 {
    let tau = std::f64::consts::TAU;
    let mut d = (angle - heading) % tau;
    if d <= -std::f64::consts::PI {
        d += tau;
    } else if d > std::f64::consts::PI {
        d -= tau;
    }
    d
}

// ─── Ray casting ─────────────────────────────────────────────────────

/// Nearest span hit along the ray, or the arc point at `range`.
fn cast(vx: f64, vy: f64, angle: f64, range: f64, spans: &[Rect]) -> ((f64, f64), bool) {
    let dx = angle.cos();
    let dy = angle.sin();

    let mut best = range;
    for span in spans {
        if let Some((t_enter, _, _)) = ray_rect(vx, vy, dx, dy, span) {
            let t = t_enter.max(0.0);
            if t < best {
                best = t;
            }
        }
    }

    let point = (vx + dx * best, vy + dy * best);
    // Same arc test consumers use: within 0.1 units of the view distance
    let on_arc = (best - range).abs() < 0.1;
    (point, on_arc)
}

/// Intersections of the circle centered on the viewer with one segment.
fn circle_segment_hits(
    cx: f64,
    cy: f64,
    r: f64,
    ax: f64,
    ay: f64,
    bx: f64,
    by: f64,
) -> Vec<(f64, f64)> {
    let dx = bx - ax;
    let dy = by - ay;
    let fx = ax - cx;
    let fy = ay - cy;

    let a = dx * dx + dy * dy;
    if a < 1e-12 {
        return Vec::new();
    }
    let b = 2.0 * (fx * dx + fy * dy);
    let c = fx * fx + fy * fy - r * r;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return Vec::new();
    }

    let sqrt_d = disc.sqrt();
    let mut hits = Vec::new();
    for u in [(-b - sqrt_d) / (2.0 * a), (-b + sqrt_d) / (2.0 * a)] {
        if (0.0..=1.0).contains(&u) {
            hits.push((ax + dx * u, ay + dy * u));
        }
    }
    hits
}
