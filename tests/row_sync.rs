//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use rand::prelude::*;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use depmgr::{semaphore_set, Config, DependencyManager, Mode};

fn new_manager(config: Config) -> Arc<DependencyManager> {
    let thread_count = config.thread_count;
    let mut dm = DependencyManager::new(config).unwrap();
    dm.register_semaphores(semaphore_set(thread_count)).unwrap();
    Arc::new(dm)
}

/// Run `check` on another thread and report whether it returned within
/// `timeout`.
fn returns_within<F>(timeout: Duration, check: F) -> (bool, mpsc::Receiver<()>)
where
    F: FnOnce() + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        check();
        let _ = tx.send(());
    });
    let returned = rx.recv_timeout(timeout).is_ok();
    (returned, rx)
}

#[test]
fn full_row_then_partial_row() {
    let dm = new_manager(Config::row_to_row(4, 4, 2));

    dm.publish_row(0, 0, 4);
    {
        let dm = Arc::clone(&dm);
        let (returned, _) = returns_within(Duration::from_secs(10), move || {
            dm.check_row(0, 2, 0, 0, 0);
        });
        assert!(returned);
    }

    dm.publish_row(0, 1, 2);
    let (returned, rx) = {
        let dm = Arc::clone(&dm);
        returns_within(Duration::from_millis(200), move || {
            dm.check_row(0, 3, 1, 0, 1);
        })
    };
    assert!(!returned, "consumer must block until offset 3 is published");

    dm.publish_row(0, 1, 3);
    rx.recv_timeout(Duration::from_secs(10))
        .expect("consumer was not woken up");
}

#[test]
fn progress_is_monotonic() {
    let dm = new_manager(Config::row_to_row(2, 16, 1));
    let mut max = 0u32;
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..100 {
        let x = rng.gen_range(0..=16);
        dm.publish_row(0, 1, x);
        max = max.max(x);
        assert_eq!(dm.row_progress(0, 1), max);
    }
    assert_eq!(dm.row_progress(0, 0), 0);
}

#[test]
fn tile_columns_do_not_interfere() {
    let dm = new_manager(Config::row_to_row(3, 8, 2).with_tile_columns(3));
    dm.publish_row(2, 1, 8);
    assert_eq!(dm.row_progress(2, 1), 8);
    assert_eq!(dm.row_progress(0, 1), 0);
    assert_eq!(dm.row_progress(1, 1), 0);

    // Row 1 of tile column 2 is complete, row 1 of tile column 1 is not
    dm.check_row(8, 0, 1, 2, 0);
    let (returned, _) = {
        let dm = Arc::clone(&dm);
        returns_within(Duration::from_millis(100), move || {
            dm.check_row(1, 0, 1, 1, 1);
        })
    };
    assert!(!returned);
    dm.publish_row(1, 1, 8);
}

/// N wavefront rows, each on its own thread, with randomized pacing. Every
/// row waits on the top-right neighbor of each unit before producing it.
fn wavefront(mode: Mode, semaphore_enabled: bool, rows: usize, units: u32, seed: u64) {
    let config = Config::new(mode, rows, units, rows).with_semaphores(semaphore_enabled);
    let dm = new_manager(config);

    let workers: Vec<_> = (0..rows)
        .map(|row| {
            let dm = Arc::clone(&dm);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed + row as u64);
                for x in 0..units {
                    if row > 0 {
                        let dep = 2u32.min(units - x);
                        dm.check_row(x, dep, row - 1, 0, row);
                        assert!(dm.row_progress(0, row - 1) >= x + dep);
                    }
                    if rng.gen_ratio(1, 4) {
                        thread::yield_now();
                    }
                    dm.publish_row(0, row, x + 1);
                }
            })
        })
        .collect();

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for worker in workers {
            worker.join().unwrap();
        }
        let _ = tx.send(());
    });
    rx.recv_timeout(Duration::from_secs(60))
        .expect("wavefront did not complete (missed wake-up?)");

    for row in 0..rows {
        assert_eq!(dm.row_progress(0, row), units);
    }
}

#[test]
fn wavefront_blocking() {
    for seed in 0..8 {
        wavefront(Mode::RowToRow, true, 6, 40, seed * 100);
    }
}

#[test]
fn wavefront_spinning() {
    wavefront(Mode::RowToRow, false, 3, 40, 7);
}

#[test]
fn wavefront_row_to_frame() {
    wavefront(Mode::RowToFrame, true, 5, 30, 42);
}

#[test]
fn row_to_frame_many_waiters_on_one_row() {
    const THREADS: usize = 6;
    let dm = new_manager(Config::row_to_frame(4, 10, THREADS));

    let (tx, rx) = mpsc::channel();
    for thread_id in 1..THREADS {
        let dm = Arc::clone(&dm);
        let tx = tx.clone();
        thread::spawn(move || {
            dm.check_row(thread_id as u32, 0, 2, 0, thread_id);
            tx.send(thread_id).unwrap();
        });
    }
    drop(tx);

    // Nothing published yet
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    // Release the consumers one at a time, with partial progress
    let mut woken = Vec::new();
    for offset in 1..THREADS as u32 {
        dm.publish_row(0, 2, offset);
        let thread_id = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("consumer was not woken up");
        woken.push(thread_id);
    }
    woken.sort();
    assert_eq!(woken, (1..THREADS).collect::<Vec<_>>());
}

#[test]
fn reset_satisfies_zero_dependency() {
    for &mode in &[Mode::RowToRow, Mode::RowToFrame] {
        for &semaphore_enabled in &[true, false] {
            let dm = new_manager(Config::new(mode, 3, 5, 2).with_semaphores(semaphore_enabled));
            dm.publish_row(0, 1, 5);
            dm.reset();
            assert_eq!(dm.row_progress(0, 1), 0);
            dm.check_row(0, 0, 1, 0, 1);
            dm.reset();
            dm.check_row(0, 0, 2, 0, 0);
        }
    }
}

#[test]
#[should_panic]
fn row_out_of_range() {
    let dm = new_manager(Config::row_to_row(3, 5, 1));
    dm.publish_row(0, 3, 1);
}

#[test]
#[should_panic]
fn thread_id_out_of_range() {
    let dm = new_manager(Config::row_to_frame(3, 5, 2));
    dm.check_row(0, 0, 0, 0, 2);
}
