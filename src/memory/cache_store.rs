//! Per-layer incremental decoder cache.
//!
//! One [`CacheEntry`] per flattened hypothesis row, each holding the per-layer
//! state of every decoded position (attention inputs or recurrent hidden
//! state). The store is append-only along the time axis and is gathered
//! along the row axis with the same parent permutation as the beam state.
//!
//! Reindexing deep-copies entries: two surviving hypotheses that share a
//! parent get independent histories.

/// Cached state of one hypothesis, indexed `[layer][position]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheEntry {
    layers: Vec<Vec<Vec<f32>>>,
}

impl CacheEntry {
    /// Create an empty (zero-length) entry.
    pub fn new(num_layers: usize) -> Self {
        Self {
            layers: vec![Vec::new(); num_layers],
        }
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Number of positions cached (0 for a fresh entry).
    pub fn seq_len(&self) -> usize {
        self.layers.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.seq_len() == 0
    }

    /// All cached positions of one layer.
    pub fn layer(&self, layer: usize) -> &[Vec<f32>] {
        self.layers.get(layer).map_or(&[], Vec::as_slice)
    }

    /// Most recent state of one layer.
    pub fn last(&self, layer: usize) -> Option<&[f32]> {
        self.layers.get(layer)?.last().map(Vec::as_slice)
    }

    /// Append one position to every layer.
    pub fn push_step(&mut self, states: Vec<Vec<f32>>) -> Result<(), CacheError> {
        if states.len() != self.layers.len() {
            return Err(CacheError::LayerCountMismatch {
                expected: self.layers.len(),
                actual: states.len(),
            });
        }
        for (layer, state) in self.layers.iter_mut().zip(states) {
            layer.push(state);
        }
        Ok(())
    }

    fn push(&mut self, layer: usize, state: Vec<f32>) {
        self.layers[layer].push(state);
    }

    fn is_consistent(&self) -> bool {
        let len = self.seq_len();
        self.layers.iter().all(|l| l.len() == len)
    }

    fn memory_bytes(&self) -> usize {
        self.layers
            .iter()
            .flat_map(|l| l.iter())
            .map(|s| s.len() * std::mem::size_of::<f32>())
            .sum()
    }
}

/// Statistics for one cache store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Layer appends (one per layer per step).
    pub appends: u64,
    /// Row gathers performed.
    pub reindexes: u64,
    /// Entries deep-copied because their parent was selected more than once.
    pub copied_entries: u64,
}

/// Cache store for all hypotheses of one decode call.
#[derive(Debug, Clone)]
pub struct CacheStore {
    num_layers: usize,
    entries: Vec<CacheEntry>,
    stats: CacheStats,
}

impl CacheStore {
    /// Create a store of `rows` empty entries.
    pub fn new(rows: usize, num_layers: usize) -> Self {
        Self {
            num_layers,
            entries: vec![CacheEntry::new(num_layers); rows],
            stats: CacheStats::default(),
        }
    }

    pub fn rows(&self) -> usize {
        self.entries.len()
    }

    pub fn num_layers(&self) -> usize {
        self.num_layers
    }

    /// Number of positions cached per row.
    pub fn seq_len(&self) -> usize {
        self.entries.first().map_or(0, CacheEntry::seq_len)
    }

    pub fn entry(&self, row: usize) -> Option<&CacheEntry> {
        self.entries.get(row)
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    /// Extend one layer by one position, one state per row.
    pub fn append(&mut self, layer: usize, states: Vec<Vec<f32>>) -> Result<(), CacheError> {
        if layer >= self.num_layers {
            return Err(CacheError::LayerOutOfRange {
                layer,
                num_layers: self.num_layers,
            });
        }
        if states.len() != self.entries.len() {
            return Err(CacheError::RowCountMismatch {
                expected: self.entries.len(),
                actual: states.len(),
            });
        }
        let expected_len = self.entries.first().map_or(0, |e| e.layer(layer).len());
        if self.entries.iter().any(|e| e.layer(layer).len() != expected_len) {
            return Err(CacheError::RaggedAppend { layer });
        }

        for (entry, state) in self.entries.iter_mut().zip(states) {
            entry.push(layer, state);
        }
        self.stats.appends += 1;
        Ok(())
    }

    /// Gather rows so that new row `i` is a private copy of old row `parents[i]`.
    pub fn reindex(&mut self, parents: &[usize]) -> Result<(), CacheError> {
        let rows = self.entries.len();
        if parents.len() != rows {
            return Err(CacheError::RowCountMismatch {
                expected: rows,
                actual: parents.len(),
            });
        }
        if let Some(&parent) = parents.iter().find(|&&p| p >= rows) {
            return Err(CacheError::ParentOutOfRange { parent, rows });
        }

        // The last selection of each parent takes ownership; earlier ones clone.
        let mut last_use = vec![usize::MAX; rows];
        for (i, &p) in parents.iter().enumerate() {
            last_use[p] = i;
        }

        let mut old = std::mem::take(&mut self.entries);
        let mut gathered = Vec::with_capacity(rows);
        for (i, &p) in parents.iter().enumerate() {
            if last_use[p] == i {
                gathered.push(std::mem::take(&mut old[p]));
            } else {
                gathered.push(old[p].clone());
                self.stats.copied_entries += 1;
            }
        }

        self.entries = gathered;
        self.stats.reindexes += 1;
        tracing::trace!(rows, seq_len = self.seq_len(), "cache reindexed");
        Ok(())
    }

    /// True if every row has the same length on every layer.
    pub fn is_consistent(&self) -> bool {
        let len = self.seq_len();
        self.entries
            .iter()
            .all(|e| e.num_layers() == self.num_layers && e.is_consistent() && e.seq_len() == len)
    }

    /// Bytes held by cached states.
    pub fn memory_bytes(&self) -> usize {
        self.entries.iter().map(CacheEntry::memory_bytes).sum()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

/// Errors for cache store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("Layer {layer} out of range for {num_layers} layers")]
    LayerOutOfRange { layer: usize, num_layers: usize },

    #[error("Expected {expected} rows, got {actual}")]
    RowCountMismatch { expected: usize, actual: usize },

    #[error("Expected {expected} layer states, got {actual}")]
    LayerCountMismatch { expected: usize, actual: usize },

    #[error("Parent row {parent} out of range for {rows} rows")]
    ParentOutOfRange { parent: usize, rows: usize },

    #[error("Layer {layer} has rows of different lengths")]
    RaggedAppend { layer: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_store() -> CacheStore {
        let mut store = CacheStore::new(3, 2);
        for step in 0..2 {
            for layer in 0..2 {
                let states = (0..3)
                    .map(|row| vec![(row * 100 + layer * 10 + step) as f32])
                    .collect();
                store.append(layer, states).unwrap();
            }
        }
        store
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = CacheStore::new(4, 3);
        assert_eq!(store.rows(), 4);
        assert_eq!(store.num_layers(), 3);
        assert_eq!(store.seq_len(), 0);
        assert!(store.is_consistent());
        assert_eq!(store.memory_bytes(), 0);
    }

    #[test]
    fn test_append_extends_time_axis() {
        let store = filled_store();
        assert_eq!(store.seq_len(), 2);
        assert!(store.is_consistent());
        assert_eq!(store.entry(1).unwrap().layer(1), &[vec![110.0], vec![111.0]]);
        assert_eq!(store.entry(2).unwrap().last(0), Some(&[201.0][..]));
        assert_eq!(store.stats().appends, 4);
    }

    #[test]
    fn test_append_rejects_bad_shapes() {
        let mut store = CacheStore::new(2, 1);
        assert_eq!(
            store.append(1, vec![vec![0.0], vec![0.0]]),
            Err(CacheError::LayerOutOfRange { layer: 1, num_layers: 1 })
        );
        assert_eq!(
            store.append(0, vec![vec![0.0]]),
            Err(CacheError::RowCountMismatch { expected: 2, actual: 1 })
        );
    }

    #[test]
    fn test_reindex_gathers_rows() {
        let mut store = filled_store();
        store.reindex(&[2, 2, 0]).unwrap();

        assert_eq!(store.entry(0).unwrap().layer(0), &[vec![200.0], vec![201.0]]);
        assert_eq!(store.entry(1).unwrap().layer(0), &[vec![200.0], vec![201.0]]);
        assert_eq!(store.entry(2).unwrap().layer(1), &[vec![10.0], vec![11.0]]);
        assert_eq!(store.stats().reindexes, 1);
        assert_eq!(store.stats().copied_entries, 1);
    }

    #[test]
    fn test_reindexed_rows_do_not_alias() {
        let mut store = filled_store();
        store.reindex(&[1, 1, 1]).unwrap();
        store
            .append(0, vec![vec![-1.0], vec![-2.0], vec![-3.0]])
            .unwrap();

        assert_eq!(store.entry(0).unwrap().last(0), Some(&[-1.0][..]));
        assert_eq!(store.entry(1).unwrap().last(0), Some(&[-2.0][..]));
        assert_eq!(store.entry(2).unwrap().last(0), Some(&[-3.0][..]));
        assert_eq!(store.entry(0).unwrap().layer(0).len(), 3);
    }

    #[test]
    fn test_reindex_rejects_bad_permutation() {
        let mut store = filled_store();
        assert_eq!(
            store.reindex(&[0, 1]),
            Err(CacheError::RowCountMismatch { expected: 3, actual: 2 })
        );
        assert_eq!(
            store.reindex(&[0, 1, 3]),
            Err(CacheError::ParentOutOfRange { parent: 3, rows: 3 })
        );
    }

    #[test]
    fn test_entry_push_step() {
        let mut entry = CacheEntry::new(2);
        assert!(entry.is_empty());
        entry.push_step(vec![vec![1.0], vec![2.0]]).unwrap();
        assert_eq!(entry.seq_len(), 1);
        assert!(entry.push_step(vec![vec![1.0]]).is_err());
    }
}
