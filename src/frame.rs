//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Frame-barrier synchronization.
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-thread epoch counters.
///
/// `current[t]` counts the epochs published for thread `t`, `previous[t]` the
/// epochs thread `t` has consumed. Only thread `t` advances `previous[t]`
/// (apart from `skip` and `reset`, which run while no consumer is active).
#[derive(Debug)]
pub(crate) struct FrameBarrierState {
    current: Box<[AtomicU64]>,
    previous: Box<[AtomicU64]>,
}

impl FrameBarrierState {
    pub fn new(thread_count: usize) -> Self {
        let zeros = || (0..thread_count).map(|_| AtomicU64::new(0)).collect();
        Self {
            current: zeros(),
            previous: zeros(),
        }
    }

    pub fn counter_count(&self) -> usize {
        self.current.len() + self.previous.len()
    }

    pub fn reset(&self) {
        for x in self.current.iter().chain(self.previous.iter()) {
            x.store(0, Ordering::Relaxed);
        }
    }

    /// Open one more epoch for every thread.
    pub fn publish(&self) {
        for x in self.current.iter() {
            x.fetch_add(1, Ordering::Release);
        }
    }

    /// Mark one more epoch as consumed for every thread, so that the next
    /// check waits for a further `publish`.
    pub fn skip(&self) {
        for x in self.previous.iter() {
            x.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Consume one epoch for `thread_id` if one is pending.
    pub fn try_consume(&self, thread_id: usize) -> bool {
        let current = self.current[thread_id].load(Ordering::Acquire);
        let previous = self.previous[thread_id].load(Ordering::Relaxed);
        if current > previous {
            self.previous[thread_id].store(previous + 1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    fn pending(&self, thread_id: usize) -> u64 {
        self.current[thread_id].load(Ordering::Relaxed)
            - self.previous[thread_id].load(Ordering::Relaxed)
    }
}
