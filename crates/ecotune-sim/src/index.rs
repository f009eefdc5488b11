//! Spatial indexing for organism neighborhood queries on a toroidal world.

use ordered_float::OrderedFloat;
use thiserror::Error;

use crate::arena::Position;

/// Errors emitted by spatial index implementations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., non-positive cell size).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Common behaviour exposed by neighborhood indices.
pub trait NeighborhoodIndex {
    /// Rebuild internal structures from organism positions.
    fn rebuild(&mut self, positions: &[Position]) -> Result<(), IndexError>;

    /// Visit neighbors of `index` within the provided squared radius, excluding `index` itself.
    fn neighbors_within(
        &self,
        index: usize,
        radius_sq: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    );
}

/// Shortest signed offset from `from` to `to` along an axis that wraps at `extent`.
#[inline]
#[must_use]
pub fn toroidal_delta(from: f32, to: f32, extent: f32) -> f32 {
    let mut delta = (to - from) % extent;
    let half = extent * 0.5;
    if delta > half {
        delta -= extent;
    } else if delta < -half {
        delta += extent;
    }
    delta
}

/// Squared toroidal distance between two positions.
#[inline]
#[must_use]
pub fn toroidal_distance_sq(a: Position, b: Position, width: f32, height: f32) -> f32 {
    let dx = toroidal_delta(a.x, b.x, width);
    let dy = toroidal_delta(a.y, b.y, height);
    dx * dx + dy * dy
}

/// Uniform bucket grid rebuilt with a counting sort every tick.
#[derive(Debug, Clone)]
pub struct UniformGridIndex {
    cell_size: f32,
    width: f32,
    height: f32,
    cols: usize,
    rows: usize,
    /// `cell_starts[c]..cell_starts[c + 1]` indexes `entries` for cell `c`.
    cell_starts: Vec<usize>,
    entries: Vec<usize>,
    positions: Vec<Position>,
}

impl UniformGridIndex {
    /// Create a grid covering a `width x height` torus.
    pub fn new(cell_size: f32, width: f32, height: f32) -> Result<Self, IndexError> {
        if cell_size <= 0.0 || !cell_size.is_finite() {
            return Err(IndexError::InvalidConfig("cell_size must be positive"));
        }
        if width <= 0.0 || height <= 0.0 {
            return Err(IndexError::InvalidConfig("world extent must be positive"));
        }
        let cols = (width / cell_size).ceil().max(1.0) as usize;
        let rows = (height / cell_size).ceil().max(1.0) as usize;
        Ok(Self {
            cell_size,
            width,
            height,
            cols,
            rows,
            cell_starts: vec![0; cols * rows + 1],
            entries: Vec::new(),
            positions: Vec::new(),
        })
    }

    #[must_use]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Number of indexed positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[inline]
    fn cell_coords(&self, position: Position) -> (usize, usize) {
        let cx = (position.x / self.cell_size).floor() as i64;
        let cy = (position.y / self.cell_size).floor() as i64;
        (
            cx.rem_euclid(self.cols as i64) as usize,
            cy.rem_euclid(self.rows as i64) as usize,
        )
    }

    /// Wrapped cell offsets covering `span` cells either side, or every cell when the span
    /// reaches around the whole axis.
    fn axis_cells(center: usize, span: usize, count: usize) -> impl Iterator<Item = usize> {
        let full = 2 * span + 1 >= count;
        let (start, len) = if full {
            (0, count)
        } else {
            (center + count - span, 2 * span + 1)
        };
        (0..len).map(move |offset| if full { offset } else { (start + offset) % count })
    }
}

impl NeighborhoodIndex for UniformGridIndex {
    fn rebuild(&mut self, positions: &[Position]) -> Result<(), IndexError> {
        self.positions.clear();
        self.positions.extend_from_slice(positions);

        let cells = self.cols * self.rows;
        self.cell_starts.clear();
        self.cell_starts.resize(cells + 1, 0);
        let mut keys = Vec::with_capacity(positions.len());
        for &position in positions {
            let (x, y) = self.cell_coords(position);
            let key = y * self.cols + x;
            keys.push(key);
            self.cell_starts[key + 1] += 1;
        }
        for cell in 0..cells {
            self.cell_starts[cell + 1] += self.cell_starts[cell];
        }

        self.entries.clear();
        self.entries.resize(positions.len(), 0);
        let mut cursor = self.cell_starts[..cells].to_vec();
        for (idx, key) in keys.into_iter().enumerate() {
            self.entries[cursor[key]] = idx;
            cursor[key] += 1;
        }
        Ok(())
    }

    fn neighbors_within(
        &self,
        index: usize,
        radius_sq: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    ) {
        let Some(&center) = self.positions.get(index) else {
            return;
        };
        if radius_sq < 0.0 {
            return;
        }
        let span = (radius_sq.sqrt() / self.cell_size).ceil() as usize;
        let (cx, cy) = self.cell_coords(center);
        for row in Self::axis_cells(cy, span, self.rows) {
            for col in Self::axis_cells(cx, span, self.cols) {
                let cell = row * self.cols + col;
                for &other in &self.entries[self.cell_starts[cell]..self.cell_starts[cell + 1]] {
                    if other == index {
                        continue;
                    }
                    let dist_sq = toroidal_distance_sq(
                        center,
                        self.positions[other],
                        self.width,
                        self.height,
                    );
                    if dist_sq <= radius_sq {
                        visitor(other, OrderedFloat(dist_sq));
                    }
                }
            }
        }
    }
}
