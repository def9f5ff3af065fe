use raster_block_cache::{BandLayout, BlockCacheError, BlockIndex3D, BlockManager, ManagerConfig};

fn single_band(max_ram: usize, x: usize, y: usize, size: usize) -> ManagerConfig {
    ManagerConfig::new(max_ram, vec![BandLayout::new(x, y, size)]).with_max_disk_file_size(10_000)
}

/// Fill a block with a pattern unique to its coordinate
fn stamp(manager: &mut BlockManager, band: usize, row: usize, col: usize, tag: u8) {
    let block = manager.get_block_pointer(band, row, col).unwrap();
    for (i, byte) in block.iter_mut().enumerate() {
        *byte = tag.wrapping_add(i as u8);
    }
}

fn has_stamp(manager: &mut BlockManager, band: usize, row: usize, col: usize, tag: u8) -> bool {
    let block = manager.get_block_pointer(band, row, col).unwrap();
    block
        .iter()
        .enumerate()
        .all(|(i, &byte)| byte == tag.wrapping_add(i as u8))
}

// =========================================================================
// Scenario from the component contract
// =========================================================================

#[test]
fn test_two_block_scenario() {
    let mut manager = BlockManager::new();
    manager
        .initialize_with_vectors(2, &[2], &[2], &[100], 10_000)
        .unwrap();

    manager.get_block_pointer(0, 0, 0).unwrap();
    manager.get_block_pointer(0, 0, 1).unwrap();
    manager.get_block_pointer(0, 1, 0).unwrap();
    assert!(!manager.is_resident(0, 0, 0).unwrap());

    manager.get_block_pointer(0, 0, 0).unwrap();
    assert!(manager.is_resident(0, 0, 0).unwrap());
    assert!(!manager.is_resident(0, 0, 1).unwrap());
}

// =========================================================================
// Invariants
// =========================================================================

#[test]
fn test_resident_count_never_exceeds_budget() {
    let cfg = ManagerConfig::new(
        3,
        vec![BandLayout::new(3, 2, 32), BandLayout::new(2, 2, 16)],
    )
    .with_max_disk_file_size(100);
    let mut manager = BlockManager::with_config(&cfg).unwrap();

    for step in 0..40usize {
        let band = step % 2;
        let rows = manager.blocks_y(band).unwrap();
        let cols = manager.blocks_x(band).unwrap();
        manager
            .get_block_pointer(band, (step / 2) % rows, (step * 7) % cols)
            .unwrap();
        assert!(manager.resident_count() <= 3);

        if step == 10 {
            manager.add_left_blocks(1, 1).unwrap();
        }
        if step == 20 {
            manager.add_bottom_bands(1).unwrap();
        }
    }
}

#[test]
fn test_round_trip_through_disk() {
    let mut manager = BlockManager::with_config(&single_band(2, 3, 3, 64)).unwrap();

    for row in 0..3 {
        for col in 0..3 {
            stamp(&mut manager, 0, row, col, (row * 3 + col) as u8 * 20);
        }
    }
    for row in 0..3 {
        for col in 0..3 {
            assert!(has_stamp(&mut manager, 0, row, col, (row * 3 + col) as u8 * 20));
        }
    }
}

#[test]
fn test_strict_fifo_eviction() {
    let k = 4;
    let mut manager = BlockManager::with_config(&single_band(k, k + 1, 1, 8)).unwrap();

    for col in 0..k {
        manager.get_block_pointer(0, 0, col).unwrap();
    }
    // Re-touching the first block must not save it
    manager.get_block_pointer(0, 0, 0).unwrap();

    manager.get_block_pointer(0, 0, k).unwrap();
    assert!(!manager.is_resident(0, 0, 0).unwrap());
    for col in 1..=k {
        assert!(manager.is_resident(0, 0, col).unwrap());
    }
}

// =========================================================================
// Growth keeps data
// =========================================================================

#[test]
fn test_add_top_blocks_preserves_content() {
    let mut manager = BlockManager::with_config(&single_band(2, 2, 2, 16)).unwrap();
    for row in 0..2 {
        for col in 0..2 {
            stamp(&mut manager, 0, row, col, (row * 2 + col) as u8 + 1);
        }
    }

    let added = manager.add_top_blocks(2, 0).unwrap();
    assert_eq!(added.len(), 4);
    assert!(added.iter().all(|c| c.row < 2));

    for row in 0..2 {
        for col in 0..2 {
            assert!(has_stamp(&mut manager, 0, row + 2, col, (row * 2 + col) as u8 + 1));
        }
    }
}

#[test]
fn test_every_edge_preserves_content() {
    let cfg = ManagerConfig::new(3, vec![BandLayout::new(2, 2, 8), BandLayout::new(2, 2, 8)])
        .with_max_disk_file_size(24);
    let mut manager = BlockManager::with_config(&cfg).unwrap();

    for band in 0..2 {
        for row in 0..2 {
            for col in 0..2 {
                stamp(&mut manager, band, row, col, (band * 4 + row * 2 + col) as u8);
            }
        }
    }

    manager.add_left_blocks(1, 1).unwrap();
    manager.add_right_blocks(2, 0).unwrap();
    manager.add_bottom_blocks(1, 1).unwrap();
    let added = manager.add_top_bands(1).unwrap();
    assert_eq!(added.first(), Some(&BlockIndex3D::new(0, 0, 0)));
    // New band copies band 0's shape: 2 rows x 4 cols
    assert_eq!(added.len(), 8);

    // Band 0 is now band 1, untouched positions
    for row in 0..2 {
        for col in 0..2 {
            assert!(has_stamp(&mut manager, 1, row, col, (row * 2 + col) as u8));
        }
    }
    // Band 1 is now band 2, columns shifted by one
    for row in 0..2 {
        for col in 0..2 {
            assert!(has_stamp(&mut manager, 2, row, col + 1, (4 + row * 2 + col) as u8));
        }
    }

    // New blocks are usable too
    stamp(&mut manager, 0, 1, 3, 77);
    stamp(&mut manager, 2, 2, 0, 88);
    assert!(has_stamp(&mut manager, 0, 1, 3, 77));
    assert!(has_stamp(&mut manager, 2, 2, 0, 88));
}

#[test]
fn test_growth_on_fully_resident_grid() {
    let mut manager = BlockManager::with_config(&single_band(4, 2, 2, 8)).unwrap();
    stamp(&mut manager, 0, 1, 1, 50);

    manager.add_top_blocks(1, 0).unwrap();
    manager.add_left_blocks(1, 0).unwrap();
    assert_eq!(manager.blocks_y(0), Some(3));
    assert_eq!(manager.blocks_x(0), Some(3));

    for row in 0..3 {
        for col in 0..3 {
            manager.get_block_pointer(0, row, col).unwrap();
        }
    }
    assert!(has_stamp(&mut manager, 0, 2, 2, 50));
}

// =========================================================================
// Configuration errors
// =========================================================================

#[test]
fn test_initialize_rejections() {
    let mut manager = BlockManager::new();

    let cases: Vec<(Vec<usize>, Vec<usize>, Vec<usize>, u64)> = vec![
        (vec![], vec![], vec![], 1000),
        (vec![2, 2], vec![2], vec![10, 10], 1000),
        (vec![2], vec![2], vec![10, 10], 1000),
        (vec![2], vec![2], vec![0], 1000),
        (vec![2], vec![2], vec![1001], 1000),
    ];

    for (x, y, sizes, max_file) in cases {
        let err = manager
            .initialize_with_vectors(2, &x, &y, &sizes, max_file)
            .unwrap_err();
        assert!(matches!(err, BlockCacheError::Config(_)), "{:?}", err);
        assert!(!manager.is_initialized());
        assert_eq!(manager.disk_file_count(), 0);
    }
}

#[test]
fn test_reinitialize_matches_fresh_instance() {
    let cfg = single_band(2, 3, 1, 8);

    let mut reused = BlockManager::with_config(&cfg).unwrap();
    stamp(&mut reused, 0, 0, 2, 5);
    reused.add_top_bands(1).unwrap();
    reused.free();
    reused.initialize(&cfg).unwrap();

    let fresh = BlockManager::with_config(&cfg).unwrap();
    assert_eq!(reused.band_count(), fresh.band_count());
    assert_eq!(reused.resident_count(), fresh.resident_count());
    assert_eq!(reused.next_victim(), fresh.next_victim());
    assert_eq!(reused.disk_file_count(), fresh.disk_file_count());
    assert_eq!(reused.stats(), fresh.stats());
}
