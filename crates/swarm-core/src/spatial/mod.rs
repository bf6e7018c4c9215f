//! Spatial Grid
//!
//! Uniform-cell index over the bounded world, rebuilt from scratch every tick.
//! Entries are a read-only snapshot of agent state for the rest of the tick.

use bevy_ecs::prelude::*;

use crate::components::SwarmClass;

/// Keeps clamped coordinates strictly below the upper world bound
pub const BOUNDARY_EPSILON: f32 = 0.001;

/// Squared heading length below which an agent has no facing direction
const HEADING_EPSILON_SQ: f32 = 1e-8;

/// Alive / infected / sex bits copied into each entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryFlags(u8);

impl EntryFlags {
    pub const ALIVE: EntryFlags = EntryFlags(1 << 0);
    pub const INFECTED: EntryFlags = EntryFlags(1 << 1);
    pub const MALE: EntryFlags = EntryFlags(1 << 2);

    pub fn empty() -> Self {
        EntryFlags(0)
    }

    pub fn from_state(alive: bool, infected: bool, male: bool) -> Self {
        let mut flags = EntryFlags::empty();
        if alive {
            flags = flags | EntryFlags::ALIVE;
        }
        if infected {
            flags = flags | EntryFlags::INFECTED;
        }
        if male {
            flags = flags | EntryFlags::MALE;
        }
        flags
    }

    pub fn contains(self, other: EntryFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_alive(self) -> bool {
        self.contains(EntryFlags::ALIVE)
    }

    pub fn is_infected(self) -> bool {
        self.contains(EntryFlags::INFECTED)
    }

    pub fn is_male(self) -> bool {
        self.contains(EntryFlags::MALE)
    }
}

impl std::ops::BitOr for EntryFlags {
    type Output = EntryFlags;

    fn bitor(self, rhs: EntryFlags) -> EntryFlags {
        EntryFlags(self.0 | rhs.0)
    }
}

/// Snapshot of one agent as seen by neighbor queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridEntry {
    pub entity: Entity,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub class: SwarmClass,
    pub flags: EntryFlags,
}

/// Index of an entry in the grid's per-tick arena.
///
/// Only meaningful until the next `clear()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryHandle(u32);

/// One query result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub handle: EntryHandle,
    pub dist_sq: f32,
}

/// Uniform grid covering `[0, world_width) x [0, world_height)`
#[derive(Resource, Debug, Clone)]
pub struct SpatialGrid {
    world_width: f32,
    world_height: f32,
    cell_size: f32,
    cols: usize,
    rows: usize,
    /// Entry indices per cell, row-major (`col + cols * row`)
    cells: Vec<Vec<u32>>,
    entries: Vec<GridEntry>,
}

impl SpatialGrid {
    pub fn new(world_width: f32, world_height: f32, cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        let cols = ((world_width / cell_size).ceil() as usize).max(1);
        let rows = ((world_height / cell_size).ceil() as usize).max(1);
        Self {
            world_width,
            world_height,
            cell_size,
            cols,
            rows,
            cells: vec![Vec::new(); cols * rows],
            entries: Vec::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the grid still matches the given world and cell size
    pub fn matches(&self, world_width: f32, world_height: f32, cell_size: f32) -> bool {
        self.world_width == world_width
            && self.world_height == world_height
            && self.cell_size == cell_size
    }

    /// Empty every cell. Invalidates all handles.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
        self.entries.clear();
    }

    /// Insert an agent snapshot. Coordinates are clamped into the world first.
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        &mut self,
        entity: Entity,
        x: f32,
        y: f32,
        vx: f32,
        vy: f32,
        class: SwarmClass,
        flags: EntryFlags,
    ) {
        let x = x.max(0.0).min(self.world_width - BOUNDARY_EPSILON);
        let y = y.max(0.0).min(self.world_height - BOUNDARY_EPSILON);
        let col = (x / self.cell_size) as usize;
        let row = (y / self.cell_size) as usize;
        if col >= self.cols || row >= self.rows {
            return;
        }
        let index = self.entries.len() as u32;
        self.entries.push(GridEntry {
            entity,
            x,
            y,
            vx,
            vy,
            class,
            flags,
        });
        self.cells[col + self.cols * row].push(index);
    }

    pub fn entry(&self, handle: EntryHandle) -> &GridEntry {
        &self.entries[handle.0 as usize]
    }

    pub fn entries(&self) -> &[GridEntry] {
        &self.entries
    }

    /// All entries within `radius` of `(x, y)`, unsorted.
    pub fn query_neighbors(&self, x: f32, y: f32, radius: f32, out: &mut Vec<Neighbor>) {
        out.clear();
        self.scan(x, y, radius, out, |_, _, _| true);
    }

    /// Like `query_neighbors`, but only entries inside the cone of
    /// `±half_angle` around the heading `(heading_vx, heading_vy)`.
    ///
    /// A near-zero heading has no cone and accepts everything in range.
    #[allow(clippy::too_many_arguments)]
    pub fn query_neighbors_fov(
        &self,
        x: f32,
        y: f32,
        radius: f32,
        out: &mut Vec<Neighbor>,
        half_angle: f32,
        heading_vx: f32,
        heading_vy: f32,
    ) {
        out.clear();
        let heading_sq = heading_vx * heading_vx + heading_vy * heading_vy;
        if heading_sq < HEADING_EPSILON_SQ {
            self.scan(x, y, radius, out, |_, _, _| true);
            return;
        }

        let cos_half = half_angle.cos();
        let cos_sq_heading = cos_half * cos_half * heading_sq;
        let wide = cos_half < 0.0;
        self.scan(x, y, radius, out, |dx, dy, dist_sq| {
            if dist_sq == 0.0 {
                return true;
            }
            let dot = heading_vx * dx + heading_vy * dy;
            let bound = cos_sq_heading * dist_sq;
            if wide {
                dot >= 0.0 || dot * dot <= bound
            } else {
                dot >= 0.0 && dot * dot >= bound
            }
        });
    }

    fn scan<F>(&self, x: f32, y: f32, radius: f32, out: &mut Vec<Neighbor>, mut accept: F)
    where
        F: FnMut(f32, f32, f32) -> bool,
    {
        if !(radius >= 0.0) || self.entries.is_empty() {
            return;
        }
        let radius_sq = radius * radius;
        let col = (x / self.cell_size).floor() as i64;
        let row = (y / self.cell_size).floor() as i64;
        let range = (radius / self.cell_size).ceil() as i64;

        let col_min = col.saturating_sub(range).max(0);
        let col_max = col.saturating_add(range).min(self.cols as i64 - 1);
        let row_min = row.saturating_sub(range).max(0);
        let row_max = row.saturating_add(range).min(self.rows as i64 - 1);
        if col_min > col_max || row_min > row_max {
            return;
        }

        for check_row in row_min..=row_max {
            for check_col in col_min..=col_max {
                let cell = &self.cells[check_col as usize + self.cols * check_row as usize];
                for &index in cell {
                    let entry = &self.entries[index as usize];
                    let dx = entry.x - x;
                    let dy = entry.y - y;
                    let dist_sq = dx * dx + dy * dy;
                    if dist_sq <= radius_sq && accept(dx, dy, dist_sq) {
                        out.push(Neighbor {
                            handle: EntryHandle(index),
                            dist_sq,
                        });
                    }
                }
            }
        }
    }
}
