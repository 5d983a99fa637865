//! Tests for the incremental decoder cache.
//!
//! Tests cover:
//! - Append along the time axis
//! - Reindexing with repeated and dropped parents
//! - Shape validation
//! - Statistics and memory accounting

use nmt_core::memory::{CacheEntry, CacheError, CacheStore};

/// Store with `rows` rows, `layers` layers and `steps` positions, where each
/// state is `[row, layer, step]` of the row it was appended to.
fn tagged_store(rows: usize, layers: usize, steps: usize) -> CacheStore {
    let mut store = CacheStore::new(rows, layers);
    for step in 0..steps {
        for layer in 0..layers {
            let states = (0..rows)
                .map(|row| vec![row as f32, layer as f32, step as f32])
                .collect();
            store.append(layer, states).unwrap();
        }
    }
    store
}

fn origin(entry: &CacheEntry) -> f32 {
    entry.layer(0)[0][0]
}

#[test]
fn test_new_store_is_empty() {
    let store = CacheStore::new(6, 3);
    assert_eq!(store.rows(), 6);
    assert_eq!(store.num_layers(), 3);
    assert_eq!(store.seq_len(), 0);
    assert!(store.is_consistent());
    assert_eq!(store.memory_bytes(), 0);
}

#[test]
fn test_append_extends_time_axis() {
    let store = tagged_store(4, 2, 3);
    assert_eq!(store.seq_len(), 3);
    for row in 0..4 {
        let entry = store.entry(row).unwrap();
        assert_eq!(entry.layer(1).len(), 3);
        assert_eq!(entry.last(1), Some(&[row as f32, 1.0, 2.0][..]));
    }
    assert_eq!(store.stats().appends, 6);
}

#[test]
fn test_reindex_follows_parents() {
    let mut store = tagged_store(4, 2, 2);
    store.reindex(&[2, 2, 0, 3]).unwrap();

    let origins: Vec<f32> = store.entries().iter().map(origin).collect();
    assert_eq!(origins, vec![2.0, 2.0, 0.0, 3.0]);
    assert!(store.is_consistent());
    assert_eq!(store.seq_len(), 2);
}

#[test]
fn test_reindexed_duplicates_are_independent() {
    let mut store = tagged_store(2, 1, 1);
    store.reindex(&[0, 0]).unwrap();
    store.append(0, vec![vec![10.0], vec![20.0]]).unwrap();

    assert_eq!(store.entry(0).unwrap().last(0), Some(&[10.0][..]));
    assert_eq!(store.entry(1).unwrap().last(0), Some(&[20.0][..]));
    assert_eq!(store.entry(0).unwrap().layer(0)[0], store.entry(1).unwrap().layer(0)[0]);
    assert_eq!(store.stats().copied_entries, 1);
}

#[test]
fn test_identity_reindex_copies_nothing() {
    let mut store = tagged_store(3, 2, 2);
    let before = store.clone();
    store.reindex(&[0, 1, 2]).unwrap();
    assert_eq!(store.entries(), before.entries());
    assert_eq!(store.stats().copied_entries, 0);
    assert_eq!(store.stats().reindexes, 1);
}

#[test]
fn test_append_rejects_bad_shapes() {
    let mut store = CacheStore::new(2, 2);
    assert_eq!(
        store.append(2, vec![vec![0.0], vec![0.0]]),
        Err(CacheError::LayerOutOfRange { layer: 2, num_layers: 2 })
    );
    assert_eq!(
        store.append(0, vec![vec![0.0]]),
        Err(CacheError::RowCountMismatch { expected: 2, actual: 1 })
    );
}

#[test]
fn test_reindex_rejects_bad_parents() {
    let mut store = tagged_store(3, 1, 1);
    assert_eq!(
        store.reindex(&[0, 1]),
        Err(CacheError::RowCountMismatch { expected: 3, actual: 2 })
    );
    assert_eq!(
        store.reindex(&[0, 1, 3]),
        Err(CacheError::ParentOutOfRange { parent: 3, rows: 3 })
    );
    // Failed reindexes leave the store untouched.
    let origins: Vec<f32> = store.entries().iter().map(origin).collect();
    assert_eq!(origins, vec![0.0, 1.0, 2.0]);
}

#[test]
fn test_partial_step_is_inconsistent() {
    let mut store = tagged_store(2, 2, 1);
    store.append(0, vec![vec![1.0], vec![1.0]]).unwrap();
    assert!(!store.is_consistent());
    store.append(1, vec![vec![1.0], vec![1.0]]).unwrap();
    assert!(store.is_consistent());
    assert_eq!(store.seq_len(), 2);
}

#[test]
fn test_memory_bytes_counts_floats() {
    let store = tagged_store(2, 2, 3);
    assert_eq!(store.memory_bytes(), 2 * 2 * 3 * 3 * std::mem::size_of::<f32>());
}

#[test]
fn test_entry_push_step() {
    let mut entry = CacheEntry::new(2);
    assert!(entry.is_empty());
    entry.push_step(vec![vec![1.0], vec![2.0]]).unwrap();
    assert_eq!(entry.seq_len(), 1);
    assert_eq!(entry.last(1), Some(&[2.0][..]));
    assert!(matches!(
        entry.push_step(vec![vec![1.0]]),
        Err(CacheError::LayerCountMismatch { expected: 2, actual: 1 })
    ));
}
