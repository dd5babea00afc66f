//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! 2-D map synchronization for search windows.
use std::sync::atomic::{AtomicU8, Ordering};

use crate::config::TileOverlap;
use crate::platform::store_fence;

/// The cell value of a unit that has not been published.
pub const MAP_INCOMPLETE: u8 = 0;

/// The cell value of a unit whose data is ready to be consumed.
pub const MAP_COMPLETE: u8 = 1;

/// A rectangle of units in tile-relative coordinates. `x` and `y` are
/// negative if the rectangle extends into the top/left overlap border.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SearchWindow {
    pub x: i32,
    pub y: i32,
    pub width: usize,
    pub height: usize,
}

/// Check whether every cell of a rectangle is [`MAP_COMPLETE`].
///
/// The rectangle starts at `cells[start]` and consists of `height` runs of
/// `width` cells, each run `stride` cells apart.
///
/// # Panics
///
/// Panics if the rectangle does not fit in `cells`.
pub fn region_is_complete(
    cells: &[AtomicU8],
    start: usize,
    width: usize,
    height: usize,
    stride: usize,
) -> bool {
    (0..height).all(|i| {
        let run = &cells[start + i * stride..][..width];
        run.iter().all(|c| c.load(Ordering::Acquire) == MAP_COMPLETE)
    })
}

#[derive(Debug)]
pub(crate) struct MapState {
    width: usize,
    height: usize,
    overlap: TileOverlap,
    stride: usize,

    /// Row-major, including the overlap border.
    cells: Box<[AtomicU8]>,
}

impl MapState {
    pub fn new(vertical_units: usize, horizontal_units: u32, overlap: TileOverlap) -> Self {
        let width = horizontal_units as usize;
        let stride = width + overlap.left as usize + overlap.right as usize;
        let rows = vertical_units + overlap.top as usize + overlap.bottom as usize;
        Self {
            width,
            height: vertical_units,
            overlap,
            stride,
            cells: (0..stride * rows)
                .map(|_| AtomicU8::new(MAP_INCOMPLETE))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn reset(&self) {
        for x in self.cells.iter() {
            x.store(MAP_INCOMPLETE, Ordering::Relaxed);
        }
    }

    /// Convert tile-relative coordinates into an index into `cells`.
    fn cell_index(&self, x: i32, y: i32) -> usize {
        let (left, top) = (self.overlap.left as i64, self.overlap.top as i64);
        let (bx, by) = (x as i64 + left, y as i64 + top);
        assert!(
            bx >= 0 && (bx as usize) < self.stride,
            "x = {} is outside the tile and its overlap",
            x
        );
        assert!(
            by >= 0 && (by as usize) < self.cells.len() / self.stride,
            "y = {} is outside the tile and its overlap",
            y
        );
        by as usize * self.stride + bx as usize
    }

    pub fn cell(&self, x: i32, y: i32) -> u8 {
        self.cells[self.cell_index(x, y)].load(Ordering::Acquire)
    }

    pub fn publish(&self, x: i32, y: i32, value: u8) {
        let index = self.cell_index(x, y);
        store_fence();
        self.cells[index].store(value, Ordering::Relaxed);
    }

    /// Publish the cells `x_start..x_end` of row `y`.
    pub fn publish_run(&self, y: i32, x_start: i32, x_end: i32, value: u8) {
        if x_start >= x_end {
            return;
        }
        let first = self.cell_index(x_start, y);
        let last = self.cell_index(x_end - 1, y);
        store_fence();
        for cell in self.cells[first..=last].iter() {
            cell.store(value, Ordering::Relaxed);
        }
    }

    /// Compute the window a consumer at `(x, y)` with the given search range
    /// depends on.
    ///
    /// On each side the window extends `min(search, distance to the tile
    /// edge)` units. On sides with overlap, the full search range is used,
    /// limited only by the stored border.
    pub fn search_window(&self, x: i32, y: i32, search_x: u32, search_y: u32) -> SearchWindow {
        assert!(
            x >= 0 && (x as usize) < self.width,
            "x = {} is outside the tile",
            x
        );
        assert!(
            y >= 0 && (y as usize) < self.height,
            "y = {} is outside the tile",
            y
        );
        let (ux, uy) = (x as usize, y as usize);

        fn extent(search: u32, to_edge: usize, overlap: u32) -> usize {
            let search = search as usize;
            if overlap > 0 {
                search.min(to_edge + overlap as usize)
            } else {
                search.min(to_edge)
            }
        }

        let o = &self.overlap;
        let top = extent(search_y, uy, o.top);
        let left = extent(search_x, ux, o.left);
        let right = extent(search_x, self.width - 1 - ux, o.right);
        let bottom = extent(search_y, self.height - 1 - uy, o.bottom);

        SearchWindow {
            x: x - left as i32,
            y: y - top as i32,
            width: left + 1 + right,
            height: top + 1 + bottom,
        }
    }

    pub fn window_is_complete(&self, window: &SearchWindow) -> bool {
        if window.width == 0 || window.height == 0 {
            return true;
        }
        // Validate both corners; the scan stays inside them
        let start = self.cell_index(window.x, window.y);
        self.cell_index(
            window.x + window.width as i32 - 1,
            window.y + window.height as i32 - 1,
        );
        region_is_complete(&self.cells, start, window.width, window.height, self.stride)
    }
}
