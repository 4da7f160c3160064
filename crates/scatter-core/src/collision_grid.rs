//! Uniform grid used to greedily place non-overlapping label boxes.
//!
//! The grid covers the canvas in device pixels and is rebuilt every frame.
//! Committed boxes are never removed, so labels inserted earlier always win.

/// Axis-aligned rectangle in device-pixel screen space (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lo_x: f32,
    pub hi_x: f32,
    pub lo_y: f32,
    pub hi_y: f32,
}

impl BoundingBox {
    pub fn new(lo_x: f32, lo_y: f32, hi_x: f32, hi_y: f32) -> Self {
        Self {
            lo_x,
            hi_x,
            lo_y,
            hi_y,
        }
    }

    pub fn width(&self) -> f32 {
        self.hi_x - self.lo_x
    }

    pub fn height(&self) -> f32 {
        self.hi_y - self.lo_y
    }

    /// Closed-interval overlap test; boxes sharing an edge intersect.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(self.lo_x > other.hi_x
            || self.lo_y > other.hi_y
            || self.hi_x < other.lo_x
            || self.hi_y < other.lo_y)
    }
}

pub struct CollisionGrid {
    bound: BoundingBox,
    cell_width: f32,
    cell_height: f32,
    num_horiz_cells: usize,
    num_vert_cells: usize,
    /// Row-major cells, each holding the boxes committed over it.
    cells: Vec<Vec<BoundingBox>>,
}

impl CollisionGrid {
    /// Creates an empty grid over `bound` with the given cell size in pixels.
    pub fn new(bound: BoundingBox, cell_width: f32, cell_height: f32) -> Self {
        let cell_width = cell_width.max(1.0);
        let cell_height = cell_height.max(1.0);
        let num_horiz_cells = ((bound.width() / cell_width).ceil() as usize).max(1);
        let num_vert_cells = ((bound.height() / cell_height).ceil() as usize).max(1);
        Self {
            bound,
            cell_width,
            cell_height,
            num_horiz_cells,
            num_vert_cells,
            cells: vec![Vec::new(); num_horiz_cells * num_vert_cells],
        }
    }

    /// Tries to place `bbox`. Fails without touching the grid when it falls
    /// outside the grid bounds or overlaps a committed box. On success the box
    /// is committed unless `test_only` is set.
    pub fn insert(&mut self, bbox: BoundingBox, test_only: bool) -> bool {
        if !self.bound.intersects(&bbox) {
            return false;
        }

        let (min_x, max_x) = (self.cell_x(bbox.lo_x), self.cell_x(bbox.hi_x));
        let (min_y, max_y) = (self.cell_y(bbox.lo_y), self.cell_y(bbox.hi_y));

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let cell = &self.cells[y * self.num_horiz_cells + x];
                if cell.iter().any(|committed| committed.intersects(&bbox)) {
                    return false;
                }
            }
        }

        if test_only {
            return true;
        }

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                self.cells[y * self.num_horiz_cells + x].push(bbox);
            }
        }
        true
    }

    fn cell_x(&self, x: f32) -> usize {
        let cell = ((x - self.bound.lo_x) / self.cell_width).floor();
        (cell.max(0.0) as usize).min(self.num_horiz_cells - 1)
    }

    fn cell_y(&self, y: f32) -> usize {
        let cell = ((y - self.bound.lo_y) / self.cell_height).floor();
        (cell.max(0.0) as usize).min(self.num_vert_cells - 1)
    }

    #[cfg(test)]
    fn registered(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }
}
