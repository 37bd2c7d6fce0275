use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};
use trading::TimeFrame;

/// Family of signal producers a note belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Ta,
    Social,
    RealTime,
    Strategies,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Ta => "TA",
            Category::Social => "SOCIAL",
            Category::RealTime => "REAL_TIME",
            Category::Strategies => "STRATEGIES",
        };
        f.write_str(name)
    }
}

/// What a producer reported: a note in [-1, 1], or nothing yet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NoteValue {
    Value(f64),
    Pending,
}

impl NoteValue {
    /// The note when it can be used for aggregation.
    pub fn valid(&self) -> Option<f64> {
        match self {
            NoteValue::Value(v) if v.is_finite() && (-1.0..=1.0).contains(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for NoteValue {
    fn from(value: f64) -> Self {
        NoteValue::Value(value)
    }
}

type NotesByTimeFrame = BTreeMap<Option<TimeFrame>, NoteValue>;

/// Notes of one (exchange, symbol): category -> producer -> time frame -> note.
///
/// Readers distinguish "no opinion" (`None`) from a neutral `Some(0.0)`.
#[derive(Debug, Clone, Default)]
pub struct EvaluationMatrix {
    notes: BTreeMap<Category, BTreeMap<String, NotesByTimeFrame>>,
    eval_types: HashMap<String, String>,
    version: u64,
}

impl EvaluationMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a note, replacing the previous one. Returns whether it changed.
    pub fn set_eval(
        &mut self,
        category: Category,
        name: &str,
        value: NoteValue,
        time_frame: Option<TimeFrame>,
    ) -> bool {
        let slot = self
            .notes
            .entry(category)
            .or_default()
            .entry(name.to_string())
            .or_default()
            .entry(time_frame);

        let changed = match slot {
            std::collections::btree_map::Entry::Occupied(mut entry) => {
                if *entry.get() == value {
                    false
                } else {
                    entry.insert(value);
                    true
                }
            }
            std::collections::btree_map::Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        };
        if changed {
            self.version += 1;
        }
        changed
    }

    pub fn get_eval_note(
        &self,
        category: Category,
        name: &str,
        time_frame: Option<TimeFrame>,
    ) -> Option<f64> {
        self.notes
            .get(&category)?
            .get(name)?
            .get(&time_frame)?
            .valid()
    }

    /// Valid notes of a category as `(producer, time frame, note)`.
    pub fn get_notes(&self, category: Category) -> Vec<(&str, Option<TimeFrame>, f64)> {
        let Some(producers) = self.notes.get(&category) else {
            return Vec::new();
        };
        producers
            .iter()
            .flat_map(|(name, by_tf)| {
                by_tf
                    .iter()
                    .filter_map(move |(tf, note)| note.valid().map(|v| (name.as_str(), *tf, v)))
            })
            .collect()
    }

    pub fn set_evaluator_eval_type(&mut self, name: &str, eval_type: &str) {
        self.eval_types
            .insert(name.to_string(), eval_type.to_string());
    }

    pub fn eval_type(&self, name: &str) -> Option<&str> {
        self.eval_types.get(name).map(String::as_str)
    }

    /// Incremented on every note change.
    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Matrix shared between concurrent producers and the aggregator.
///
/// Writers mutate through `Arc::make_mut`, so a snapshot handed out earlier
/// keeps its values and never observes a partial write.
#[derive(Debug, Clone, Default)]
pub struct SharedMatrix {
    inner: Arc<RwLock<Arc<EvaluationMatrix>>>,
}

impl SharedMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_eval(
        &self,
        category: Category,
        name: &str,
        value: NoteValue,
        time_frame: Option<TimeFrame>,
    ) -> bool {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        Arc::make_mut(&mut guard).set_eval(category, name, value, time_frame)
    }

    pub fn set_evaluator_eval_type(&self, name: &str, eval_type: &str) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        Arc::make_mut(&mut guard).set_evaluator_eval_type(name, eval_type);
    }

    pub fn snapshot(&self) -> Arc<EvaluationMatrix> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }

    pub fn version(&self) -> u64 {
        self.snapshot().version()
    }
}
