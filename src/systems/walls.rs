//! Destructible wall store.
//!
//! Walls are axis-aligned rectangles divided into 5 equal slices along the
//! long axis. The slice is the unit of destruction: each one carries its own
//! health, and the material decides at which health fraction it stops
//! blocking vision. Projectiles and hitscans are blocked by any slice with
//! health > 0 regardless of material.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config;
use crate::msg::events::GameEvent;
use crate::msg::types::WallState;

// ─── Materials ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Material {
    Concrete,
    Wood,
    Metal,
    Glass,
}

impl Material {
    /// Fraction of max health *below* which a slice stops blocking vision.
    /// Concrete and metal only transmit once fully destroyed.
    pub fn vision_threshold(self) -> f64 {
        match self {
            Self::Concrete => 0.0,
            Self::Wood => 0.25,
            Self::Metal => 0.0,
            Self::Glass => 0.75,
        }
    }
}

// ─── Geometry primitives ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.x + self.w && py >= self.y && py <= self.y + self.h
    }

    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.x, self.y),
            (self.x + self.w, self.y),
            (self.x + self.w, self.y + self.h),
            (self.x, self.y + self.h),
        ]
    }
}

/// Slab test: intersect the ray `origin + t*dir` with a rectangle.
/// Returns `(t_enter, normal_x, normal_y)` where the normal is the outward
/// normal of the entered face. `t_enter` is negative when the origin lies
/// inside the rectangle.
pub fn ray_rect(ox: f64, oy: f64, dx: f64, dy: f64, rect: &Rect) -> Option<(f64, f64, f64)> {
    let mut t_min = f64::NEG_INFINITY;
    let mut t_max = f64::INFINITY;
    let mut nx = 0.0;
    let mut ny = 0.0;

    if dx.abs() < 1e-12 {
        if ox < rect.x || ox > rect.x + rect.w {
            return None;
        }
    } else {
        let inv = 1.0 / dx;
        let mut t1 = (rect.x - ox) * inv;
        let mut t2 = (rect.x + rect.w - ox) * inv;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        if t1 > t_min {
            t_min = t1;
            nx = -dx.signum();
            ny = 0.0;
        }
        t_max = t_max.min(t2);
    }

    if dy.abs() < 1e-12 {
        if oy < rect.y || oy > rect.y + rect.h {
            return None;
        }
    } else {
        let inv = 1.0 / dy;
        let mut t1 = (rect.y - oy) * inv;
        let mut t2 = (rect.y + rect.h - oy) * inv;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        if t1 > t_min {
            t_min = t1;
            nx = 0.0;
            ny = -dy.signum();
        }
        t_max = t_max.min(t2);
    }

    if t_min > t_max || t_max < 0.0 {
        return None;
    }
    Some((t_min, nx, ny))
}

// ─── Wall ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone)]
pub struct Wall {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub material: Material,
    pub max_health: f64,
    pub slice_health: [f64; config::WALL_SLICES],
}

impl Wall {
    pub fn new(id: u32, x: f64, y: f64, width: f64, height: f64, material: Material) -> Self {
        Self {
            id,
            x,
            y,
            width,
            height,
            material,
            max_health: config::WALL_MAX_HEALTH,
            slice_health: [config::WALL_MAX_HEALTH; config::WALL_SLICES],
        }
    }

    pub fn orientation(&self) -> Orientation {
        if self.width > self.height {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        }
    }

    /// (origin, length) of the long axis the slices are laid along.
    fn long_axis(&self) -> (f64, f64) {
        match self.orientation() {
            Orientation::Horizontal => (self.x, self.width),
            Orientation::Vertical => (self.y, self.height),
        }
    }

    /// Slice index containing a world point, clamped to [0, 4].
    pub fn slice_index_at(&self, px: f64, py: f64) -> usize {
        let (origin, len) = self.long_axis();
        let p = match self.orientation() {
            Orientation::Horizontal => px,
            Orientation::Vertical => py,
        };
        let idx = ((p - origin) * config::WALL_SLICES as f64 / len).floor() as i64;
        idx.clamp(0, config::WALL_SLICES as i64 - 1) as usize
    }

    /// Long-axis position of slice boundary `i`, valid for i in 0..=5.
    pub fn slice_boundary(&self, i: usize) -> f64 {
        let (origin, len) = self.long_axis();
        origin + i as f64 * len / config::WALL_SLICES as f64
    }

    pub fn slice_rect(&self, i: usize) -> Rect {
        let step = match self.orientation() {
            Orientation::Horizontal => self.width / config::WALL_SLICES as f64,
            Orientation::Vertical => self.height / config::WALL_SLICES as f64,
        };
        match self.orientation() {
            Orientation::Horizontal => Rect {
                x: self.x + i as f64 * step,
                y: self.y,
                w: step,
                h: self.height,
            },
            Orientation::Vertical => Rect {
                x: self.x,
                y: self.y + i as f64 * step,
                w: self.width,
                h: step,
            },
        }
    }

    pub fn slice_destroyed(&self, i: usize) -> bool {
        self.slice_health[i] <= 0.0
    }

    /// A slice with any health left blocks both projectiles and hitscans.
    pub fn slice_blocks_projectile(&self, i: usize) -> bool {
        self.slice_health[i] > 0.0
    }

    /// Vision passes once health drops below the material threshold, and
    /// always through destroyed slices.
    pub fn slice_transmits_vision(&self, i: usize) -> bool {
        let h = self.slice_health[i];
        h <= 0.0 || h < self.material.vision_threshold() * self.max_health
    }

    pub fn slice_blocks_vision(&self, i: usize) -> bool {
        !self.slice_transmits_vision(i)
    }

    pub fn destruction_mask(&self) -> [u8; config::WALL_SLICES] {
        let mut mask = [0u8; config::WALL_SLICES];
        for (i, m) in mask.iter_mut().enumerate() {
            *m = self.slice_destroyed(i) as u8;
        }
        mask
    }

    /// Bounding rectangles of the contiguous runs of vision-blocking slices.
    /// Partial destruction literally shrinks the wall: a destroyed or
    /// see-through slice splits the wall into separate spans, each with its
    /// own corners.
    pub fn intact_spans(&self) -> Vec<Rect> {
        let mut spans = Vec::new();
        let mut run_start: Option<usize> = None;

        for i in 0..config::WALL_SLICES {
            if self.slice_blocks_vision(i) {
                run_start.get_or_insert(i);
            } else if let Some(start) = run_start.take() {
                spans.push(self.span_rect(start, i));
            }
        }
        if let Some(start) = run_start {
            spans.push(self.span_rect(start, config::WALL_SLICES));
        }
        spans
    }

    /// Rectangle covering slices `start..end` (end exclusive).
    fn span_rect(&self, start: usize, end: usize) -> Rect {
        match self.orientation() {
            Orientation::Horizontal => {
                let x0 = self.slice_boundary(start);
                Rect {
                    x: x0,
                    y: self.y,
                    w: self.slice_boundary(end) - x0,
                    h: self.height,
                }
            }
            Orientation::Vertical => {
                let y0 = self.slice_boundary(start);
                Rect {
                    x: self.x,
                    y: y0,
                    w: self.width,
                    h: self.slice_boundary(end) - y0,
                }
            }
        }
    }

    pub fn to_state(&self) -> WallState {
        WallState {
            id: self.id,
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            material: self.material,
            max_health: self.max_health,
            slice_health: self.slice_health.to_vec(),
            destruction_mask: self.destruction_mask(),
        }
    }
}

// ─── Store ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SliceDamageResult {
    pub new_health: f64,
    pub destroyed: bool,
}

/// A projectile/hitscan ray hit on a wall slice.
#[derive(Debug, Clone)]
pub struct RayWallHit {
    pub wall_id: u32,
    pub slice: usize,
    /// Distance along the (unit) ray direction.
    pub t: f64,
    /// Outward normal of the struck face.
    pub nx: f64,
    pub ny: f64,
}

/// Owns every wall in the match. BTreeMap keeps iteration — and therefore
/// event emission — in a stable order.
pub struct WallStore {
    walls: BTreeMap<u32, Wall>,
}

impl WallStore {
    pub fn new(walls: Vec<Wall>) -> Self {
        Self {
            walls: walls.into_iter().map(|w| (w.id, w)).collect(),
        }
    }

    pub fn get(&self, wall_id: u32) -> Option<&Wall> {
        self.walls.get(&wall_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Wall> {
        self.walls.values()
    }

    pub fn len(&self) -> usize {
        self.walls.len()
    }

    pub fn wall_states(&self) -> Vec<WallState> {
        self.walls.values().map(|w| w.to_state()).collect()
    }

    /// Apply damage to one slice. Clamps health at zero, emits `WallDamaged`
    /// (plus `WallDestroyed` on the transition to zero), and is a silent
    /// no-op on unknown walls, bad indices, and already-destroyed slices.
    pub fn damage_slice(
        &mut self,
        wall_id: u32,
        slice: usize,
        damage: f64,
        events: &mut Vec<GameEvent>,
    ) -> Option<SliceDamageResult> {
        let wall = self.walls.get_mut(&wall_id)?;
        if slice >= config::WALL_SLICES || wall.slice_destroyed(slice) {
            return None;
        }

        let new_health = (wall.slice_health[slice] - damage).max(0.0);
        wall.slice_health[slice] = new_health;
        let destroyed = new_health <= 0.0;

        events.push(GameEvent::WallDamaged {
            wall_id,
            slice_index: slice,
            new_health,
            is_destroyed: destroyed,
        });
        if destroyed {
            events.push(GameEvent::WallDestroyed {
                wall_id,
                slice_index: slice,
            });
        }

        Some(SliceDamageResult {
            new_health,
            destroyed,
        })
    }

    /// Closest projectile-blocking slice along `origin + t*dir`, with dir a
    /// unit vector and hits limited to `t` in (0, max_t].
    pub fn cast_projectile_ray(
        &self,
        ox: f64,
        oy: f64,
        dx: f64,
        dy: f64,
        max_t: f64,
    ) -> Option<RayWallHit> {
        let mut best: Option<RayWallHit> = None;

        for wall in self.walls.values() {
            for slice in 0..config::WALL_SLICES {
                if !wall.slice_blocks_projectile(slice) {
                    continue;
                }
                let rect = wall.slice_rect(slice);
                if let Some((t, nx, ny)) = ray_rect(ox, oy, dx, dy, &rect) {
                    if t <= 1e-9 || t > max_t {
                        continue;
                    }
                    if best.as_ref().map(|b| t < b.t).unwrap_or(true) {
                        best = Some(RayWallHit {
                            wall_id: wall.id,
                            slice,
                            t,
                            nx,
                            ny,
                        });
                    }
                }
            }
        }
        best
    }

    /// True when any projectile-blocking slice lies strictly between the
    /// two points. Used for explosion occlusion.
    pub fn segment_blocked(&self, ax: f64, ay: f64, bx: f64, by: f64) -> bool {
        let dx = bx - ax;
        let dy = by - ay;
        let len = (dx * dx + dy * dy).sqrt();
        if len < 1e-9 {
            return false;
        }
        self.cast_projectile_ray(ax, ay, dx / len, dy / len, len - 1e-6)
            .is_some()
    }
}
