//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! The primitives the dependency manager requires from the platform.
//!
//! The manager itself never creates threads or semaphores. The thread pool
//! creates one [`Semaphore`] per worker thread and hands the set over with
//! [`DependencyManager::register_semaphores`]. [`BinarySemaphore`] is the
//! default implementation.
//!
//! [`DependencyManager::register_semaphores`]: crate::DependencyManager::register_semaphores
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;

/// A blocking semaphore dedicated to one worker thread.
pub trait Semaphore: Send + Sync + fmt::Debug {
    /// Block the calling thread until a permit is available and take it.
    fn wait(&self);

    /// Make a permit available.
    fn post(&self);
}

/// A [`Semaphore`] that holds at most one pending permit.
///
/// Posting an already-posted semaphore is a no-op, so a burst of broadcasts
/// only causes a single spurious wake-up of the owning thread.
#[derive(Debug)]
pub struct BinarySemaphore {
    permit: Mutex<bool>,
    cond: Condvar,
}

impl BinarySemaphore {
    /// Construct a `BinarySemaphore`. A nonzero `initial_count` starts it in
    /// the posted state.
    pub fn new(initial_count: u32) -> Self {
        Self {
            permit: Mutex::new(initial_count > 0),
            cond: Condvar::new(),
        }
    }

    /// Take the permit if there is one. Never blocks.
    pub fn try_wait(&self) -> bool {
        let mut permit = self.permit.lock();
        let taken = *permit;
        *permit = false;
        taken
    }
}

impl Default for BinarySemaphore {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Semaphore for BinarySemaphore {
    fn wait(&self) {
        let mut permit = self.permit.lock();
        while !*permit {
            self.cond.wait(&mut permit);
        }
        *permit = false;
    }

    fn post(&self) {
        let mut permit = self.permit.lock();
        if !*permit {
            *permit = true;
            self.cond.notify_one();
        }
    }
}

/// Create `thread_count` fresh [`BinarySemaphore`]s, ready to be passed to
/// `register_semaphores`.
pub fn semaphore_set(thread_count: usize) -> Vec<Arc<dyn Semaphore>> {
    (0..thread_count)
        .map(|_| Arc::new(BinarySemaphore::new(0)) as Arc<dyn Semaphore>)
        .collect()
}

/// Order all preceding stores before any following store.
///
/// Producers issue this before updating a progress table so that a consumer
/// observing the new progress value also observes the produced data.
#[inline]
pub fn store_fence() {
    fence(Ordering::Release);
}

/// A full (sequentially consistent) fence.
///
/// Used on both sides of the waiter registration handshake.
#[inline]
pub fn full_fence() {
    fence(Ordering::SeqCst);
}
