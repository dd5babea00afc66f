//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use std::mem::size_of;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8};
use std::sync::Arc;

use crate::config::{Config, Mode};
use crate::manager::DependencyManager;
use crate::platform::Semaphore;
use crate::wait::WaiterSlot;

/// The memory, in bytes, a [`DependencyManager`] occupies for a given
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SizeRequirements {
    /// The manager object itself.
    pub state_size: usize,

    pub progress_table_size: usize,

    pub waiter_table_size: usize,

    /// The per-thread semaphore handles.
    pub semaphore_table_size: usize,
}

impl SizeRequirements {
    pub fn total(&self) -> usize {
        self.state_size + self.progress_table_size + self.waiter_table_size + self.semaphore_table_size
    }
}

pub(crate) const PROGRESS_CELL_SIZE: usize = size_of::<AtomicU32>();
pub(crate) const EPOCH_COUNTER_SIZE: usize = size_of::<AtomicU64>();
pub(crate) const MAP_CELL_SIZE: usize = size_of::<AtomicU8>();
pub(crate) const WAITER_SLOT_SIZE: usize = size_of::<WaiterSlot>();
pub(crate) const SEMAPHORE_HANDLE_SIZE: usize = size_of::<Arc<dyn Semaphore>>();

/// Compute the memory requirements of a manager built from `config`.
///
/// This is a pure function. Pipelines use it to budget memory for all of
/// their managers before creating any of them. The result equals
/// [`DependencyManager::memory_footprint`] of a manager constructed from the
/// same (valid) configuration.
///
///  - `FrameBarrier`: two 64-bit epoch counters per thread, no waiter table.
///  - `RowToRow`: one progress cell and one waiter slot per (tile column,
///    row).
///  - `RowToFrame`: one progress cell per (tile column, row), one waiter slot
///    per (row, thread).
///  - `Map`: one byte per unit, including the overlap border. No waiter
///    table because every publish wakes all threads.
pub fn size_requirements(config: &Config) -> SizeRequirements {
    let vertical_units = config.vertical_units;
    let tile_columns = config.tile_columns.max(1);
    let thread_count = config.thread_count;

    let (progress_table_size, waiter_table_size) = match config.mode {
        Mode::FrameBarrier => (2 * thread_count * EPOCH_COUNTER_SIZE, 0),
        Mode::RowToRow => (
            vertical_units * tile_columns * PROGRESS_CELL_SIZE,
            vertical_units * tile_columns * WAITER_SLOT_SIZE,
        ),
        Mode::RowToFrame => (
            vertical_units * tile_columns * PROGRESS_CELL_SIZE,
            vertical_units * thread_count * WAITER_SLOT_SIZE,
        ),
        Mode::Map => {
            let o = config.tile_overlap;
            let width = config.horizontal_units as usize + o.left as usize + o.right as usize;
            let height = vertical_units + o.top as usize + o.bottom as usize;
            (width * height * MAP_CELL_SIZE, 0)
        }
    };

    SizeRequirements {
        state_size: size_of::<DependencyManager>(),
        progress_table_size,
        waiter_table_size,
        semaphore_table_size: thread_count * SEMAPHORE_HANDLE_SIZE,
    }
}
