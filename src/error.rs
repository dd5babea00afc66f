//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use thiserror::Error;

use crate::config::Mode;

/// An error detected while validating a [`Config`](crate::Config) or binding
/// resources to a [`DependencyManager`](crate::DependencyManager).
///
/// Only configuration problems are reported through this type. They are
/// checked once, at construction, and never on the publish/check paths.
/// API contract violations on those paths (a thread id out of range, an
/// operation that does not belong to the manager's mode) are logic errors
/// and escalate to `panic!`.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConfigError {
    /// The manager must serve at least one worker thread.
    #[error("thread count must be at least one")]
    ZeroThreadCount,

    /// One of the grid dimensions is zero.
    #[error("grid of {vertical_units}x{horizontal_units} units is empty")]
    EmptyGrid {
        vertical_units: usize,
        horizontal_units: u32,
    },

    /// The progress table would not be addressable.
    #[error("grid of {vertical_units}x{horizontal_units} units is too large")]
    GridTooLarge {
        vertical_units: usize,
        horizontal_units: u32,
    },

    /// A tile overlap was given to a mode that has no notion of it.
    #[error("tile overlap is only meaningful in Map mode, not in {mode:?} mode")]
    UnexpectedTileOverlap { mode: Mode },

    /// `register_semaphores` was given a handle count different from the
    /// configured thread count.
    #[error("expected {expected} semaphore handles, got {actual}")]
    SemaphoreCount { expected: usize, actual: usize },
}

pub type Result<T> = ::std::result::Result<T, ConfigError>;
