//
// Copyright 2019 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use std::sync::Arc;

use depmgr::{
    semaphore_set, size_requirements, BinarySemaphore, Config, ConfigError, DependencyManager,
    Mode, Semaphore, TileOverlap, WaitStrategy,
};

fn configs() -> Vec<Config> {
    vec![
        Config::frame_barrier(5),
        Config::row_to_row(17, 30, 4).with_tile_columns(3),
        Config::row_to_frame(17, 30 * 64, 6),
        Config::map(9, 15, 3).with_tile_overlap(TileOverlap::from_array([1, 2, 3, 4])),
        Config::map(1, 1, 1),
    ]
}

#[test]
fn size_requirements_match_footprint() {
    for config in configs() {
        let expected = size_requirements(&config);
        let dm = DependencyManager::new(config.clone()).unwrap();
        assert_eq!(dm.memory_footprint(), expected, "{:?}", config);
        assert!(expected.total() >= expected.progress_table_size);
    }
}

#[test]
fn size_requirements_grow_with_threads() {
    let a = size_requirements(&Config::row_to_frame(10, 10, 2));
    let b = size_requirements(&Config::row_to_frame(10, 10, 3));
    assert!(b.waiter_table_size > a.waiter_table_size);
    assert!(b.semaphore_table_size > a.semaphore_table_size);
    assert_eq!(a.progress_table_size, b.progress_table_size);
}

#[test]
fn construction_errors() {
    assert_eq!(
        DependencyManager::new(Config::row_to_row(4, 4, 0)).unwrap_err(),
        ConfigError::ZeroThreadCount
    );
    assert_eq!(
        DependencyManager::new(Config::row_to_frame(4, 0, 1)).unwrap_err(),
        ConfigError::EmptyGrid {
            vertical_units: 4,
            horizontal_units: 0
        }
    );
    assert_eq!(
        DependencyManager::new(
            Config::frame_barrier(2).with_tile_overlap(TileOverlap::from_array([0, 0, 0, 1]))
        )
        .unwrap_err(),
        ConfigError::UnexpectedTileOverlap {
            mode: Mode::FrameBarrier
        }
    );
    assert!(matches!(
        DependencyManager::new(Config::map(4, u32::max_value(), 1)).unwrap_err(),
        ConfigError::GridTooLarge { .. }
    ));
}

#[test]
fn error_messages() {
    let e = ConfigError::SemaphoreCount {
        expected: 4,
        actual: 3,
    };
    assert_eq!(e.to_string(), "expected 4 semaphore handles, got 3");
}

#[test]
fn semaphore_count_checked() {
    let mut dm = DependencyManager::new(Config::row_to_row(4, 4, 3)).unwrap();
    assert_eq!(
        dm.register_semaphores(semaphore_set(2)).unwrap_err(),
        ConfigError::SemaphoreCount {
            expected: 3,
            actual: 2
        }
    );
    assert_eq!(dm.num_semaphores(), 0);
    dm.register_semaphores(semaphore_set(3)).unwrap();
    assert_eq!(dm.num_semaphores(), 3);
}

#[test]
fn custom_semaphores_are_posted() {
    let sems: Vec<_> = (0..2).map(|_| Arc::new(BinarySemaphore::default())).collect();
    let mut dm = DependencyManager::new(Config::frame_barrier(2)).unwrap();
    dm.register_semaphores(sems.iter().map(|s| s.clone() as Arc<dyn Semaphore>).collect())
        .unwrap();

    dm.publish_frame_done();
    assert!(sems.iter().all(|s| s.try_wait()));
}

#[test]
fn spin_strategy_never_posts() {
    let sems: Vec<_> = (0..2).map(|_| Arc::new(BinarySemaphore::default())).collect();
    let mut dm =
        DependencyManager::new(Config::map(2, 2, 2).with_semaphores(false)).unwrap();
    dm.register_semaphores(sems.iter().map(|s| s.clone() as Arc<dyn Semaphore>).collect())
        .unwrap();
    assert_eq!(dm.wait_strategy(), WaitStrategy::Spin);

    dm.publish_map(0, 0, 1);
    assert!(sems.iter().all(|s| !s.try_wait()));
}

#[test]
fn accessors() {
    let dm = DependencyManager::new(Config::row_to_row(4, 4, 2).with_tile_columns(0)).unwrap();
    assert_eq!(dm.mode(), Mode::RowToRow);
    assert_eq!(dm.config().tile_columns, 1);
    assert_eq!(dm.wait_strategy(), WaitStrategy::Block);
}

#[test]
fn reset_then_zero_dependency_returns() {
    for config in configs() {
        let config = config.with_semaphores(false);
        let dm = DependencyManager::new(config.clone()).unwrap();
        dm.reset();
        match config.mode {
            Mode::RowToRow | Mode::RowToFrame => {
                dm.check_row(0, 0, 0, 0, 0);
                dm.reset();
                dm.check_row(0, 0, config.vertical_units - 1, 0, 0);
            }
            Mode::Map => {
                // The window of a zero search range is the unit itself
                dm.publish_map(0, 0, depmgr::MAP_COMPLETE);
                dm.check_map(0, 0, 0, 0, 0);
                dm.reset();
                assert_eq!(dm.map_cell(0, 0), depmgr::MAP_INCOMPLETE);
            }
            Mode::FrameBarrier => {
                // A reset barrier holds until the next publish
                dm.publish_frame_done();
                dm.check_frame_done(0);
            }
        }
    }
}

#[test]
#[should_panic(expected = "not supported")]
fn row_operation_on_frame_barrier() {
    let dm = DependencyManager::new(Config::frame_barrier(1)).unwrap();
    dm.publish_row(0, 0, 1);
}

#[test]
#[should_panic(expected = "not supported")]
fn map_operation_on_row_to_row() {
    let dm = DependencyManager::new(Config::row_to_row(2, 2, 1)).unwrap();
    dm.check_map(0, 0, 0, 1, 1);
}

#[test]
#[should_panic(expected = "not supported")]
fn frame_operation_on_map() {
    let dm = DependencyManager::new(Config::map(2, 2, 1)).unwrap();
    dm.skip_frame_done();
}

#[test]
#[should_panic(expected = "register_semaphores")]
fn block_without_semaphores() {
    let dm = DependencyManager::new(Config::frame_barrier(1)).unwrap();
    dm.check_frame_done(0);
}
