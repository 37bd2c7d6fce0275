use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use trading::TimeFrame;

/// Tracks completed evaluation cycles per time frame of one (exchange, symbol).
///
/// The symbol is primed once every managed time frame completed at least one
/// cycle; before that the decider must not trade off cold-start defaults.
#[derive(Debug, Clone)]
pub struct Readiness {
    completed: Arc<Mutex<HashMap<TimeFrame, u64>>>,
}

impl Readiness {
    pub fn new(time_frames: &[TimeFrame]) -> Self {
        let completed = time_frames.iter().map(|tf| (*tf, 0)).collect();
        Self {
            completed: Arc::new(Mutex::new(completed)),
        }
    }

    pub fn mark_completed(&self, time_frame: TimeFrame) {
        let mut completed = self.completed.lock().unwrap_or_else(|e| e.into_inner());
        *completed.entry(time_frame).or_insert(0) += 1;
    }

    pub fn completed(&self, time_frame: TimeFrame) -> u64 {
        let completed = self.completed.lock().unwrap_or_else(|e| e.into_inner());
        completed.get(&time_frame).copied().unwrap_or(0)
    }

    pub fn is_primed(&self) -> bool {
        let completed = self.completed.lock().unwrap_or_else(|e| e.into_inner());
        !completed.is_empty() && completed.values().all(|count| *count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primed_only_when_every_time_frame_completed() {
        let readiness = Readiness::new(&[TimeFrame::OneHour, TimeFrame::FourHours]);
        assert!(!readiness.is_primed());

        readiness.mark_completed(TimeFrame::OneHour);
        readiness.mark_completed(TimeFrame::OneHour);
        assert!(!readiness.is_primed());
        assert_eq!(readiness.completed(TimeFrame::OneHour), 2);

        readiness.mark_completed(TimeFrame::FourHours);
        assert!(readiness.is_primed());
    }

    #[test]
    fn test_empty_readiness_is_never_primed() {
        assert!(!Readiness::new(&[]).is_primed());
    }
}
