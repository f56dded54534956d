use crate::models::Document;

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub document: Document,
}

/// Brute-force flat store. Every query is an exact scan over all entries.
#[derive(Debug, Default)]
pub struct FlatVectorStore {
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl FlatVectorStore {
    /// Callers are expected to have validated every vector against `dimension`.
    pub fn new(dimension: usize, entries: Vec<IndexEntry>) -> Self {
        debug_assert!(entries.iter().all(|e| e.vector.len() == dimension));
        Self { dimension, entries }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// At most `k` entries ordered by ascending squared Euclidean distance; ties keep
    /// insertion order.
    pub fn nearest(&self, query: &[f32], k: usize) -> Vec<(&IndexEntry, f32)> {
        if k == 0 {
            return Vec::new();
        }
        let mut scored: Vec<(&IndexEntry, f32)> = self
            .entries
            .iter()
            .map(|e| (e, squared_l2(query, &e.vector)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        scored
    }
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            vector,
            document: Document {
                path: path.to_string(),
                content: String::new(),
                size: 0,
            },
        }
    }

    #[test]
    fn nearest_orders_by_distance_and_truncates() {
        let store = FlatVectorStore::new(
            2,
            vec![
                entry("far", vec![10.0, 10.0]),
                entry("near", vec![1.0, 0.0]),
                entry("mid", vec![3.0, 0.0]),
            ],
        );
        let hits = store.nearest(&[0.0, 0.0], 2);
        let got: Vec<(&str, f32)> = hits
            .iter()
            .map(|(e, d)| (e.document.path.as_str(), *d))
            .collect();
        assert_eq!(got, vec![("near", 1.0), ("mid", 9.0)]);
    }

    #[test]
    fn k_larger_than_store_returns_everything() {
        let store = FlatVectorStore::new(1, vec![entry("a", vec![0.0]), entry("b", vec![2.0])]);
        assert_eq!(store.nearest(&[1.0], 10).len(), 2);
        assert!(store.nearest(&[1.0], 0).is_empty());
    }

    #[test]
    fn ties_keep_insertion_order() {
        let store = FlatVectorStore::new(
            1,
            vec![entry("first", vec![1.0]), entry("second", vec![-1.0])],
        );
        let hits = store.nearest(&[0.0], 2);
        assert_eq!(hits[0].0.document.path, "first");
        assert_eq!(hits[1].0.document.path, "second");
    }
}
