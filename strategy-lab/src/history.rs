use crate::matrix::EvaluationMatrix;
use std::collections::VecDeque;
use std::sync::Arc;

/// Bounded log of matrix snapshots, oldest first.
///
/// Snapshots are shared `Arc`s, so recording one never copies the matrix.
#[derive(Debug, Clone)]
pub struct MatrixHistory {
    capacity: usize,
    snapshots: VecDeque<Arc<EvaluationMatrix>>,
}

impl MatrixHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            snapshots: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Appends a snapshot unless it is the one recorded last.
    pub fn record(&mut self, snapshot: Arc<EvaluationMatrix>) {
        if let Some(latest) = self.snapshots.back() {
            if Arc::ptr_eq(latest, &snapshot) {
                return;
            }
        }
        if self.snapshots.len() == self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
    }

    pub fn latest(&self) -> Option<&Arc<EvaluationMatrix>> {
        self.snapshots.back()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EvaluationMatrix>> {
        self.snapshots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{Category, SharedMatrix};

    #[test]
    fn test_history_keeps_the_most_recent_snapshots() {
        let shared = SharedMatrix::new();
        let mut history = MatrixHistory::new(2);

        for note in [0.1, 0.2, 0.3] {
            shared.set_eval(Category::RealTime, "fluct", note.into(), None);
            history.record(shared.snapshot());
        }
        // Same snapshot twice is recorded once.
        history.record(shared.snapshot());

        assert_eq!(history.len(), 2);
        let versions: Vec<u64> = history.iter().map(|m| m.version()).collect();
        assert_eq!(versions, vec![2, 3]);
        assert_eq!(history.latest().unwrap().version(), 3);
    }
}
