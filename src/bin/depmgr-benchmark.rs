//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Measures the overhead of wavefront synchronization by encoding a simulated
//! frame with varying thread counts.
use std::hint::black_box;
use std::time;

use depmgr::{semaphore_set, Config, DependencyManager};

/// The dimensions of a 1080p frame in 16x16 units.
const ROWS: usize = 68;
const UNITS: u32 = 120;

/// The top-right dependency of a unit.
const DEP_OFFSET: u32 = 2;

fn duration_to_secs(d: time::Duration) -> f64 {
    d.as_secs() as f64 + d.subsec_nanos() as f64 * 1.0e-9
}

fn estimate_unit_size<T: FnMut()>(mut x: T) -> u64 {
    // Find an iteration count large enough that timer overhead is negligible
    let mut unit_size = 1u64;
    loop {
        let start = time::Instant::now();
        for _ in 0..unit_size {
            x();
        }
        if duration_to_secs(start.elapsed()) > 0.2 {
            break;
        }
        unit_size *= 2;
    }
    unit_size
}

/// Returns the wall-clock time of a single iteration.
#[inline(never)]
fn benchmark_single<T: FnMut()>(mut x: T, unit_size: u64) -> f64 {
    let start = time::Instant::now();
    let mut total_iter = 0;

    while start.elapsed().as_millis() < 500 {
        for _ in 0..unit_size {
            x();
        }
        total_iter += unit_size;
    }

    duration_to_secs(start.elapsed()) / total_iter as f64
}

/// Returns the mean iteration time and its standard deviation.
fn benchmark<T: FnMut()>(mut x: T) -> (f64, f64) {
    let unit_size = estimate_unit_size(&mut x);

    let mut total = 0.0;
    let mut total_sq = 0.0;
    let count = 5usize;

    for _ in 0..count {
        let t = benchmark_single(&mut x, unit_size);
        total += t;
        total_sq += t * t;
    }

    total /= count as f64;
    total_sq /= count as f64;
    let variance = (total_sq - total * total).max(0.0);

    (total, variance.sqrt())
}

/// Stand-in for the work of encoding a unit.
fn encode_unit(work: u32) {
    let mut acc = 0u32;
    for i in 0..work {
        acc = black_box(acc.wrapping_mul(31).wrapping_add(i));
    }
    black_box(acc);
}

/// Process one frame. Thread `t` encodes rows `t`, `t + thread_count`, ...
fn encode_frame(dm: &DependencyManager, thread_count: usize, work: u32) {
    dm.reset();
    let result = crossbeam::scope(|scope| {
        for thread_id in 0..thread_count {
            scope.spawn(move |_| {
                for row in (thread_id..ROWS).step_by(thread_count) {
                    for x in 0..UNITS {
                        if row > 0 {
                            let dep = DEP_OFFSET.min(UNITS - x);
                            dm.check_row(x, dep, row - 1, 0, thread_id);
                        }
                        encode_unit(work);
                        dm.publish_row(0, row, x + 1);
                    }
                }
            });
        }
    });
    if result.is_err() {
        panic!("a worker thread panicked");
    }
}

fn run_single_benchmark(thread_count: usize, semaphore_enabled: bool, work: u32) {
    let config = Config::row_to_row(ROWS, UNITS, thread_count).with_semaphores(semaphore_enabled);
    let mut dm = match DependencyManager::new(config) {
        Ok(dm) => dm,
        Err(e) => {
            eprintln!("invalid configuration: {}", e);
            return;
        }
    };
    if let Err(e) = dm.register_semaphores(semaphore_set(thread_count)) {
        eprintln!("could not register semaphores: {}", e);
        return;
    }

    let (frame_time, sd) = benchmark(|| encode_frame(&dm, thread_count, work));
    let units_per_sec = (ROWS as f64 * UNITS as f64) / frame_time;
    println!(
        "{}, threads = {: >2}, work = {: >5}, t = {: >9.2} us, sd = {: >8.2} us, units/s = {: >12.0}",
        if semaphore_enabled { "block" } else { "spin " },
        thread_count,
        work,
        frame_time * 1.0e6,
        sd * 1.0e6,
        units_per_sec
    );
}

fn main() {
    println!("Running benchmark...");
    for &work in &[0, 1000] {
        for &thread_count in &[1, 2, 4, 8] {
            run_single_benchmark(thread_count, true, work);
        }
        for &thread_count in &[1, 2] {
            run_single_benchmark(thread_count, false, work);
        }
    }
}
