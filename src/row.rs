//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Row-granular progress tracking, shared by the row-to-row and row-to-frame
//! disciplines.
use std::sync::atomic::{AtomicU32, Ordering};

use crate::platform::{full_fence, store_fence};
use crate::wait::{new_waiter_table, SemaphoreRegistry, WaiterSlot};

/// Specifies how waiting threads are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaiterLayout {
    /// One slot per (tile column, row). At most one thread may wait on a
    /// given row at a time; a second registration overwrites the first.
    PerRow,

    /// One slot per (row, thread). Any number of threads may wait on a row.
    PerThread,
}

#[derive(Debug)]
pub(crate) struct RowState {
    vertical_units: usize,
    horizontal_units: u32,
    tile_columns: usize,
    thread_count: usize,
    layout: WaiterLayout,

    /// Published progress, indexed by `tile_column * vertical_units + row`.
    progress: Box<[AtomicU32]>,

    waiters: Box<[WaiterSlot]>,
}

impl RowState {
    pub fn new(
        vertical_units: usize,
        horizontal_units: u32,
        tile_columns: usize,
        thread_count: usize,
        layout: WaiterLayout,
    ) -> Self {
        let num_waiters = match layout {
            WaiterLayout::PerRow => vertical_units * tile_columns,
            WaiterLayout::PerThread => vertical_units * thread_count,
        };
        Self {
            vertical_units,
            horizontal_units,
            tile_columns,
            thread_count,
            layout,
            progress: (0..vertical_units * tile_columns)
                .map(|_| AtomicU32::new(0))
                .collect(),
            waiters: new_waiter_table(num_waiters),
        }
    }

    pub fn progress_len(&self) -> usize {
        self.progress.len()
    }

    pub fn waiters_len(&self) -> usize {
        self.waiters.len()
    }

    pub fn reset(&self) {
        for x in self.progress.iter() {
            x.store(0, Ordering::Relaxed);
        }
        for x in self.waiters.iter() {
            x.clear();
        }
    }

    fn cell_index(&self, tile_column: usize, row: usize) -> usize {
        assert!(
            tile_column < self.tile_columns,
            "tile column {} is out of range (0..{})",
            tile_column,
            self.tile_columns
        );
        assert!(
            row < self.vertical_units,
            "row {} is out of range (0..{})",
            row,
            self.vertical_units
        );
        tile_column * self.vertical_units + row
    }

    pub fn progress(&self, tile_column: usize, row: usize) -> u32 {
        self.progress[self.cell_index(tile_column, row)].load(Ordering::Acquire)
    }

    /// Publish `horizontal_offset` as the progress of `row`. `wake` is `false`
    /// when consumers spin and no thread ever registers as a waiter.
    pub fn publish(
        &self,
        tile_column: usize,
        row: usize,
        horizontal_offset: u32,
        semaphores: &SemaphoreRegistry,
        wake: bool,
    ) {
        let index = self.cell_index(tile_column, row);

        // The unit's data must be visible before its progress is
        store_fence();
        self.progress[index].fetch_max(horizontal_offset, Ordering::Relaxed);

        if !wake {
            return;
        }

        full_fence();

        match self.layout {
            WaiterLayout::PerRow => {
                if let Some(thread_id) = self.waiters[index].take() {
                    semaphores.post(thread_id);
                }
            }
            WaiterLayout::PerThread => {
                let slots = &self.waiters[row * self.thread_count..][..self.thread_count];
                for slot in slots.iter() {
                    if let Some(thread_id) = slot.take() {
                        semaphores.post(thread_id);
                    }
                }
            }
        }

        if horizontal_offset >= self.horizontal_units {
            // The row is complete. Wake everyone in case a registration was
            // overwritten by another thread waiting on the same row.
            semaphores.post_all();
        }
    }

    /// Get the slot `thread_id` registers in while waiting on `dep_row`.
    pub fn waiter_slot(&self, tile_column: usize, dep_row: usize, thread_id: usize) -> &WaiterSlot {
        let index = self.cell_index(tile_column, dep_row);
        match self.layout {
            WaiterLayout::PerRow => &self.waiters[index],
            WaiterLayout::PerThread => {
                assert!(
                    thread_id < self.thread_count,
                    "thread id {} is out of range (0..{})",
                    thread_id,
                    self.thread_count
                );
                &self.waiters[dep_row * self.thread_count + thread_id]
            }
        }
    }

    /// Get the progress cell consumers poll for `dep_row`.
    pub fn progress_cell(&self, tile_column: usize, dep_row: usize) -> &AtomicU32 {
        &self.progress[self.cell_index(tile_column, dep_row)]
    }
}
