//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Cross-thread progress tracking for wavefront-parallel video encoding.
//!
//! ## System Model
//!
//!  - A **unit** is the smallest piece of work whose completion is tracked
//!    (e.g., a coding tree block). Units are arranged in a grid of
//!    `vertical_units` rows of `horizontal_units` units each.
//!  - A **producer** is a worker thread that publishes how far it has
//!    progressed. A **consumer** is a worker thread that must not proceed until
//!    some producer has progressed far enough.
//!  - Every worker thread has a dense **thread id** and owns one
//!    [`Semaphore`], on which it blocks while waiting.
//!
//! A [`DependencyManager`] implements one of the following disciplines,
//! chosen by [`Mode`]:
//!
//!  - **`FrameBarrier`**: a stage completes as a whole. Consumers wait until
//!    [`publish_frame_done`] is called, consuming exactly one epoch per call.
//!  - **`RowToRow`**: a consumer of row `r` waits until row `r - 1` (or any
//!    other row) has published at least a given horizontal offset. At most one
//!    thread waits on a given row at a time.
//!  - **`RowToFrame`**: the same progress table, but any number of threads may
//!    wait on the same row.
//!  - **`Map`**: every unit is published individually into a 2-D map.
//!    Consumers wait until a rectangular search window (possibly reaching into
//!    the overlap border of neighboring tiles) is complete.
//!
//! Publishing a value makes all data the producer wrote before it visible to
//! a consumer that observes the value.
//!
//! ## Examples
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use depmgr::{semaphore_set, Config, DependencyManager};
//!
//! const ROWS: usize = 4;
//! const UNITS: u32 = 8;
//!
//! let mut dm = DependencyManager::new(Config::row_to_row(ROWS, UNITS, ROWS)).unwrap();
//! dm.register_semaphores(semaphore_set(ROWS)).unwrap();
//! let dm = Arc::new(dm);
//!
//! let workers: Vec<_> = (0..ROWS)
//!     .map(|row| {
//!         let dm = Arc::clone(&dm);
//!         thread::spawn(move || {
//!             for x in 0..UNITS {
//!                 if row > 0 {
//!                     // Wait for the top-right neighbor
//!                     dm.check_row((x + 2).min(UNITS), 0, row - 1, 0, row);
//!                 }
//!                 dm.publish_row(0, row, x + 1);
//!             }
//!         })
//!     })
//!     .collect();
//!
//! for worker in workers {
//!     worker.join().unwrap();
//! }
//! assert_eq!(dm.row_progress(0, ROWS - 1), UNITS);
//! ```
//!
//! [`publish_frame_done`]: DependencyManager::publish_frame_done
mod config;
mod error;
mod frame;
mod manager;
mod map;
mod platform;
mod row;
mod sizing;
mod wait;

pub use crate::config::{Config, Mode, TileOverlap};
pub use crate::error::{ConfigError, Result};
pub use crate::manager::DependencyManager;
pub use crate::map::{region_is_complete, SearchWindow, MAP_COMPLETE, MAP_INCOMPLETE};
pub use crate::platform::{full_fence, semaphore_set, store_fence, BinarySemaphore, Semaphore};
pub use crate::sizing::{size_requirements, SizeRequirements};
pub use crate::wait::WaitStrategy;
