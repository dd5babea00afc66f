//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Consumer-side waiting: the semaphore registry, waiter slots, and the two
//! wait strategies.
use crossbeam::utils::Backoff;
use log::trace;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::platform::{full_fence, Semaphore};

/// Specifies how a consumer waits for progress it has not observed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitStrategy {
    /// Register as a waiter and block on the thread's semaphore.
    Block,

    /// Busy-poll the progress table. Meant for configurations with few
    /// threads, where wake-up latency matters more than burnt cycles.
    Spin,
}

impl WaitStrategy {
    pub(crate) fn from_semaphore_enabled(semaphore_enabled: bool) -> Self {
        if semaphore_enabled {
            WaitStrategy::Block
        } else {
            WaitStrategy::Spin
        }
    }

    /// Return when `ready` returns `true`.
    ///
    /// With `Block`, `slot` (if any) is claimed for `thread_id` before every
    /// wait and `ready` is evaluated once more after a full fence. The
    /// publisher stores its progress, fences, and then reads the slot, so at
    /// least one of the two sides observes the other.
    pub(crate) fn wait_until(
        self,
        semaphores: &SemaphoreRegistry,
        thread_id: usize,
        slot: Option<&WaiterSlot>,
        mut ready: impl FnMut() -> bool,
    ) {
        if ready() {
            return;
        }

        match self {
            WaitStrategy::Spin => {
                let backoff = Backoff::new();
                while !ready() {
                    backoff.snooze();
                }
            }
            WaitStrategy::Block => loop {
                if let Some(slot) = slot {
                    slot.register(thread_id);
                }
                full_fence();

                if ready() {
                    if let Some(slot) = slot {
                        slot.unregister(thread_id);
                    }
                    return;
                }

                trace!("thread {} blocks", thread_id);
                semaphores.wait(thread_id);
                trace!("thread {} woke up", thread_id);
            },
        }
    }
}

/// Records which thread, if any, is blocked on a dependency row.
#[derive(Debug)]
pub(crate) struct WaiterSlot(AtomicUsize);

const NO_WAITER: usize = usize::max_value();

impl WaiterSlot {
    pub fn new() -> Self {
        WaiterSlot(AtomicUsize::new(NO_WAITER))
    }

    pub fn register(&self, thread_id: usize) {
        self.0.store(thread_id, Ordering::Relaxed);
    }

    /// Withdraw the registration of `thread_id`. No-op if the slot has been
    /// taken or overwritten in the meantime.
    pub fn unregister(&self, thread_id: usize) {
        let _ = self
            .0
            .compare_exchange(thread_id, NO_WAITER, Ordering::Relaxed, Ordering::Relaxed);
    }

    /// Remove and return the registered thread.
    pub fn take(&self) -> Option<usize> {
        match self.0.swap(NO_WAITER, Ordering::Relaxed) {
            NO_WAITER => None,
            x => Some(x),
        }
    }

    pub fn clear(&self) {
        self.0.store(NO_WAITER, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub fn get(&self) -> Option<usize> {
        match self.0.load(Ordering::Relaxed) {
            NO_WAITER => None,
            x => Some(x),
        }
    }
}

pub(crate) fn new_waiter_table(len: usize) -> Box<[WaiterSlot]> {
    (0..len).map(|_| WaiterSlot::new()).collect()
}

/// The per-thread semaphore handles, indexed by thread id.
#[derive(Debug, Default)]
pub(crate) struct SemaphoreRegistry {
    handles: Vec<Arc<dyn Semaphore>>,
}

impl SemaphoreRegistry {
    pub fn bind(&mut self, handles: Vec<Arc<dyn Semaphore>>) {
        self.handles = handles;
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Post the semaphore of `thread_id`. No-op if none is registered.
    pub fn post(&self, thread_id: usize) {
        if let Some(handle) = self.handles.get(thread_id) {
            handle.post();
        }
    }

    pub fn post_all(&self) {
        for handle in self.handles.iter() {
            handle.post();
        }
    }

    /// # Panics
    ///
    /// Panics if no semaphore is registered for `thread_id`. Blocking
    /// without one would never return.
    pub fn wait(&self, thread_id: usize) {
        match self.handles.get(thread_id) {
            Some(handle) => handle.wait(),
            None => panic!(
                "no semaphore is registered for thread {} (call register_semaphores first)",
                thread_id
            ),
        }
    }
}
