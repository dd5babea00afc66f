//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use log::debug;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::config::{Config, Mode};
use crate::error::{ConfigError, Result};
use crate::frame::FrameBarrierState;
use crate::map::{MapState, SearchWindow};
use crate::platform::Semaphore;
use crate::row::{RowState, WaiterLayout};
use crate::sizing::{
    SizeRequirements, EPOCH_COUNTER_SIZE, MAP_CELL_SIZE, PROGRESS_CELL_SIZE,
    SEMAPHORE_HANDLE_SIZE, WAITER_SLOT_SIZE,
};
use crate::wait::{SemaphoreRegistry, WaitStrategy};

/// Tracks the progress of one producer/consumer relationship between the
/// worker threads of an encoder pipeline, and wakes up consumers when
/// something they might be waiting for was published.
///
/// See [the crate-level documentation](index.html) for an overview.
///
/// # Panics
///
/// Every publish/check method belongs to one or more [`Mode`]s, and panics if
/// called on a manager of another mode. They also panic if a thread id, row,
/// tile column, or map coordinate is out of range.
#[derive(Debug)]
pub struct DependencyManager {
    config: Config,
    strategy: WaitStrategy,
    semaphores: SemaphoreRegistry,
    state: SyncState,
}

#[derive(Debug)]
enum SyncState {
    FrameBarrier(FrameBarrierState),
    RowToFrame(RowState),
    RowToRow(RowState),
    Map(MapState),
}

impl DependencyManager {
    /// Construct a `DependencyManager` in the reset state.
    ///
    /// The tables are allocated here and owned by the manager. Semaphores
    /// are bound later by [`register_semaphores`](Self::register_semaphores).
    pub fn new(config: Config) -> Result<Self> {
        let config = config.validate()?;

        let state = match config.mode {
            Mode::FrameBarrier => SyncState::FrameBarrier(FrameBarrierState::new(config.thread_count)),
            Mode::RowToRow => SyncState::RowToRow(RowState::new(
                config.vertical_units,
                config.horizontal_units,
                config.tile_columns,
                config.thread_count,
                WaiterLayout::PerRow,
            )),
            Mode::RowToFrame => SyncState::RowToFrame(RowState::new(
                config.vertical_units,
                config.horizontal_units,
                config.tile_columns,
                config.thread_count,
                WaiterLayout::PerThread,
            )),
            Mode::Map => SyncState::Map(MapState::new(
                config.vertical_units,
                config.horizontal_units,
                config.tile_overlap,
            )),
        };

        debug!(
            "new {:?} manager: {}x{} units, {} tile column(s), {} thread(s), semaphores {}",
            config.mode,
            config.vertical_units,
            config.horizontal_units,
            config.tile_columns,
            config.thread_count,
            if config.semaphore_enabled { "on" } else { "off" }
        );

        Ok(Self {
            strategy: WaitStrategy::from_semaphore_enabled(config.semaphore_enabled),
            config,
            semaphores: SemaphoreRegistry::default(),
            state,
        })
    }

    /// Bind the per-thread semaphores. `handles[t]` belongs to thread `t`.
    ///
    /// Must be called before any thread blocks in a `check_*` method. A
    /// manager with semaphores disabled never blocks and does not need them.
    pub fn register_semaphores(&mut self, handles: Vec<Arc<dyn Semaphore>>) -> Result<()> {
        if handles.len() != self.config.thread_count {
            return Err(ConfigError::SemaphoreCount {
                expected: self.config.thread_count,
                actual: handles.len(),
            });
        }
        debug!(
            "{} semaphore(s) registered to {:?} manager",
            handles.len(),
            self.config.mode
        );
        self.semaphores.bind(handles);
        Ok(())
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    /// Get the validated configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn wait_strategy(&self) -> WaitStrategy {
        self.strategy
    }

    /// Get the number of registered semaphores.
    pub fn num_semaphores(&self) -> usize {
        self.semaphores.len()
    }

    /// Report the memory used by this manager. Equals
    /// [`size_requirements`](crate::size_requirements) of its configuration.
    pub fn memory_footprint(&self) -> SizeRequirements {
        let (progress_table_size, waiter_table_size) = match &self.state {
            SyncState::FrameBarrier(s) => (s.counter_count() * EPOCH_COUNTER_SIZE, 0),
            SyncState::RowToFrame(s) | SyncState::RowToRow(s) => (
                s.progress_len() * PROGRESS_CELL_SIZE,
                s.waiters_len() * WAITER_SLOT_SIZE,
            ),
            SyncState::Map(s) => (s.len() * MAP_CELL_SIZE, 0),
        };
        SizeRequirements {
            state_size: std::mem::size_of::<Self>(),
            progress_table_size,
            waiter_table_size,
            semaphore_table_size: self.config.thread_count * SEMAPHORE_HANDLE_SIZE,
        }
    }

    /// Return to the "nothing published yet" state.
    ///
    /// Called at the start of every frame (every tile in `Map` mode). Must
    /// complete before any consumer starts checking dependencies for that
    /// frame.
    pub fn reset(&self) {
        match &self.state {
            SyncState::FrameBarrier(s) => s.reset(),
            SyncState::RowToFrame(s) | SyncState::RowToRow(s) => s.reset(),
            SyncState::Map(s) => s.reset(),
        }
        debug!("{:?} manager reset", self.config.mode);
    }

    #[cold]
    #[inline(never)]
    fn mode_mismatch(&self, operation: &str) -> ! {
        panic!(
            "{} is not supported by a dependency manager in {:?} mode",
            operation, self.config.mode
        );
    }

    fn check_thread_id(&self, thread_id: usize) {
        assert!(
            thread_id < self.config.thread_count,
            "thread id {} is out of range (0..{})",
            thread_id,
            self.config.thread_count
        );
    }

    fn frame_state(&self, operation: &str) -> &FrameBarrierState {
        match &self.state {
            SyncState::FrameBarrier(s) => s,
            _ => self.mode_mismatch(operation),
        }
    }

    fn row_state(&self, operation: &str) -> &RowState {
        match &self.state {
            SyncState::RowToFrame(s) | SyncState::RowToRow(s) => s,
            _ => self.mode_mismatch(operation),
        }
    }

    fn map_state(&self, operation: &str) -> &MapState {
        match &self.state {
            SyncState::Map(s) => s,
            _ => self.mode_mismatch(operation),
        }
    }

    // ---------------------------------------------------------------------
    // Frame barrier

    /// Open one more epoch for every thread and wake all of them.
    ///
    /// Called once per epoch by whichever thread finds the stage complete,
    /// not by every thread.
    pub fn publish_frame_done(&self) {
        let state = self.frame_state("publish_frame_done");
        state.publish();
        if self.strategy == WaitStrategy::Block {
            self.semaphores.post_all();
        }
    }

    /// Consume the next epoch of every thread without waiting for it, so that
    /// the next [`check_frame_done`](Self::check_frame_done) waits for a
    /// further [`publish_frame_done`](Self::publish_frame_done).
    ///
    /// A pipeline that opens the barrier right after [`reset`](Self::reset)
    /// uses this to make the barrier hold when it is first reached.
    pub fn skip_frame_done(&self) {
        self.frame_state("skip_frame_done").skip();
    }

    /// Wait until an epoch is available for `thread_id`, and consume it.
    pub fn check_frame_done(&self, thread_id: usize) {
        let state = self.frame_state("check_frame_done");
        self.check_thread_id(thread_id);
        self.strategy
            .wait_until(&self.semaphores, thread_id, None, || state.try_consume(thread_id));
    }

    // ---------------------------------------------------------------------
    // Row-to-row and row-to-frame

    /// Publish that `row` of `tile_column` has produced `horizontal_offset`
    /// units.
    ///
    /// The stored progress never decreases; publishing a smaller value than
    /// the current one has no effect on the table. Publishing a value of at
    /// least `horizontal_units` marks the row complete and wakes every thread.
    pub fn publish_row(&self, tile_column: usize, row: usize, horizontal_offset: u32) {
        let state = self.row_state("publish_row");
        state.publish(
            tile_column,
            row,
            horizontal_offset,
            &self.semaphores,
            self.strategy == WaitStrategy::Block,
        );
    }

    /// Wait until `dep_row` of `tile_column` has published at least
    /// `cur_offset + dep_offset` units.
    ///
    /// In `RowToRow` mode at most one thread may wait on a given row at a
    /// time. `RowToFrame` has no such restriction.
    pub fn check_row(
        &self,
        cur_offset: u32,
        dep_offset: u32,
        dep_row: usize,
        tile_column: usize,
        thread_id: usize,
    ) {
        let state = self.row_state("check_row");
        self.check_thread_id(thread_id);

        let required = cur_offset.saturating_add(dep_offset);
        let progress = state.progress_cell(tile_column, dep_row);
        let slot = state.waiter_slot(tile_column, dep_row, thread_id);

        self.strategy.wait_until(&self.semaphores, thread_id, Some(slot), || {
            progress.load(Ordering::Acquire) >= required
        });
    }

    /// Get the published progress of `row` of `tile_column`.
    pub fn row_progress(&self, tile_column: usize, row: usize) -> u32 {
        self.row_state("row_progress").progress(tile_column, row)
    }

    // ---------------------------------------------------------------------
    // 2-D map

    /// Store `value` into the cell at tile-relative `(offset_x, offset_y)`
    /// and wake every thread.
    ///
    /// Negative coordinates (and coordinates past the tile's right/bottom
    /// edge) address the overlap border.
    pub fn publish_map(&self, offset_x: i32, offset_y: i32, value: u8) {
        self.map_state("publish_map").publish(offset_x, offset_y, value);
        if self.strategy == WaitStrategy::Block {
            self.semaphores.post_all();
        }
    }

    /// Store `value` into the cells `x_start..x_end` of row `offset_y` and
    /// wake every thread once.
    pub fn publish_map_row(&self, offset_y: i32, x_start: i32, x_end: i32, value: u8) {
        self.map_state("publish_map_row")
            .publish_run(offset_y, x_start, x_end, value);
        if self.strategy == WaitStrategy::Block {
            self.semaphores.post_all();
        }
    }

    /// Compute the window [`check_map`](Self::check_map) waits on.
    pub fn map_search_window(
        &self,
        offset_x: i32,
        offset_y: i32,
        search_x: u32,
        search_y: u32,
    ) -> SearchWindow {
        self.map_state("map_search_window")
            .search_window(offset_x, offset_y, search_x, search_y)
    }

    /// Check without blocking whether every cell of a tile-relative rectangle
    /// is complete.
    pub fn map_region_is_complete(&self, x: i32, y: i32, width: usize, height: usize) -> bool {
        self.map_state("map_region_is_complete")
            .window_is_complete(&SearchWindow {
                x,
                y,
                width,
                height,
            })
    }

    /// Get the value of a cell.
    pub fn map_cell(&self, offset_x: i32, offset_y: i32) -> u8 {
        self.map_state("map_cell").cell(offset_x, offset_y)
    }

    /// Wait until the search window around `(offset_x, offset_y)` is
    /// complete.
    ///
    /// The window spans `search_x` units left and right and `search_y` units
    /// up and down, clipped to the tile except on edges with overlap.
    pub fn check_map(
        &self,
        thread_id: usize,
        offset_x: i32,
        offset_y: i32,
        search_x: u32,
        search_y: u32,
    ) {
        let state = self.map_state("check_map");
        self.check_thread_id(thread_id);

        let window = state.search_window(offset_x, offset_y, search_x, search_y);

        self.strategy.wait_until(&self.semaphores, thread_id, None, || {
            state.window_is_complete(&window)
        });
    }
}
