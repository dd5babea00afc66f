//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Construction-time configuration of a dependency manager.
use log::debug;

use crate::error::{ConfigError, Result};

/// Specifies the synchronization discipline of a
/// [`DependencyManager`](crate::DependencyManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// A full barrier across all threads. Every thread consumes one epoch
    /// per [`publish_frame_done`](crate::DependencyManager::publish_frame_done).
    FrameBarrier,

    /// Row-granular progress, any number of threads may wait on the same
    /// row.
    RowToFrame,

    /// Row-granular progress with at most one waiting thread per row at any
    /// point of time (wavefront parallelism).
    RowToRow,

    /// A 2-D map of completed units, checked as rectangular search windows.
    Map,
}

/// The number of extra units available outside a tile on each of its edges.
///
/// Only used by [`Mode::Map`]. A nonzero value on an edge means a neighboring
/// tile publishes that many rows (or columns) of overlap into this map, so a
/// search window may extend beyond the tile boundary on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TileOverlap {
    pub top: u32,
    pub left: u32,
    pub right: u32,
    pub bottom: u32,
}

impl TileOverlap {
    /// Construct a `TileOverlap` from the edge order top, left, right, bottom.
    pub fn from_array(x: [u32; 4]) -> Self {
        Self {
            top: x[0],
            left: x[1],
            right: x[2],
            bottom: x[3],
        }
    }

    /// Get the edges in the order top, left, right, bottom.
    pub fn to_array(&self) -> [u32; 4] {
        [self.top, self.left, self.right, self.bottom]
    }

    pub fn is_none(&self) -> bool {
        self.to_array() == [0; 4]
    }
}

/// The configuration of a [`DependencyManager`](crate::DependencyManager).
///
/// All options are fixed at construction. There is no run-time
/// reconfiguration; build a new manager instead.
///
///     use depmgr::{Config, Mode};
///
///     let config = Config::new(Mode::RowToRow, 17, 30, 4)
///         .with_tile_columns(2)
///         .with_semaphores(false);
///     assert_eq!(config.tile_columns, 2);
///
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Config {
    pub mode: Mode,

    /// The number of unit rows (e.g., CTB rows in a frame or a tile).
    pub vertical_units: usize,

    /// The number of units in a row. Row-based modes count progress in this
    /// unit, which does not have to be CTBs (pixels are fine).
    pub horizontal_units: u32,

    /// The number of column tiles sharing the manager. Values below one are
    /// corrected to one.
    pub tile_columns: usize,

    /// The number of worker threads publishing or consuming through the
    /// manager.
    pub thread_count: usize,

    /// Block on per-thread semaphores when `true`; spin-poll the progress
    /// table otherwise.
    pub semaphore_enabled: bool,

    pub tile_overlap: TileOverlap,
}

impl Config {
    pub fn new(mode: Mode, vertical_units: usize, horizontal_units: u32, thread_count: usize) -> Self {
        Self {
            mode,
            vertical_units,
            horizontal_units,
            tile_columns: 1,
            thread_count,
            semaphore_enabled: true,
            tile_overlap: TileOverlap::default(),
        }
    }

    pub fn frame_barrier(thread_count: usize) -> Self {
        Self::new(Mode::FrameBarrier, 1, 1, thread_count)
    }

    pub fn row_to_row(vertical_units: usize, horizontal_units: u32, thread_count: usize) -> Self {
        Self::new(Mode::RowToRow, vertical_units, horizontal_units, thread_count)
    }

    pub fn row_to_frame(vertical_units: usize, horizontal_units: u32, thread_count: usize) -> Self {
        Self::new(Mode::RowToFrame, vertical_units, horizontal_units, thread_count)
    }

    pub fn map(vertical_units: usize, horizontal_units: u32, thread_count: usize) -> Self {
        Self::new(Mode::Map, vertical_units, horizontal_units, thread_count)
    }

    pub fn with_tile_columns(self, tile_columns: usize) -> Self {
        Self {
            tile_columns,
            ..self
        }
    }

    pub fn with_semaphores(self, semaphore_enabled: bool) -> Self {
        Self {
            semaphore_enabled,
            ..self
        }
    }

    pub fn with_tile_overlap(self, tile_overlap: TileOverlap) -> Self {
        Self {
            tile_overlap,
            ..self
        }
    }

    /// Check the configuration and return a normalized copy of it.
    pub fn validate(&self) -> Result<Config> {
        let mut config = self.clone();

        if config.thread_count == 0 {
            return Err(ConfigError::ZeroThreadCount);
        }

        if config.tile_columns < 1 {
            debug!(
                "tile_columns = {} corrected to 1 ({:?})",
                config.tile_columns, config.mode
            );
            config.tile_columns = 1;
        }

        let empty = ConfigError::EmptyGrid {
            vertical_units: config.vertical_units,
            horizontal_units: config.horizontal_units,
        };
        let too_large = ConfigError::GridTooLarge {
            vertical_units: config.vertical_units,
            horizontal_units: config.horizontal_units,
        };

        match config.mode {
            Mode::FrameBarrier => {}
            Mode::RowToRow | Mode::RowToFrame => {
                if config.vertical_units == 0 || config.horizontal_units == 0 {
                    return Err(empty);
                }
                config
                    .vertical_units
                    .checked_mul(config.tile_columns)
                    .and_then(|x| x.checked_mul(config.thread_count))
                    .ok_or(too_large)?;
            }
            Mode::Map => {
                if config.vertical_units == 0 || config.horizontal_units == 0 {
                    return Err(empty);
                }
                // Map coordinates are signed and tile-relative
                let o = config.tile_overlap;
                let width = (config.horizontal_units as u64) + o.left as u64 + o.right as u64;
                let height = (config.vertical_units as u64) + o.top as u64 + o.bottom as u64;
                if width > i32::max_value() as u64
                    || height > i32::max_value() as u64
                    || width.checked_mul(height).map_or(true, |x| x > isize::max_value() as u64)
                {
                    return Err(too_large);
                }
            }
        }

        if config.mode != Mode::Map && !config.tile_overlap.is_none() {
            return Err(ConfigError::UnexpectedTileOverlap { mode: config.mode });
        }

        Ok(config)
    }
}
