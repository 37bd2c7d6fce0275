use crate::matrix::{Category, EvaluationMatrix, SharedMatrix};
use crate::producers::instant_fluctuations;
use log::debug;
use trading_core::config::CategoryWeights;

/// Blends the notes of an `EvaluationMatrix` into one score in [-1, 1].
pub trait StrategyAggregator: Send + Sync {
    fn name(&self) -> &str;

    fn aggregate(&self, matrix: &EvaluationMatrix) -> f64;
}

/// Aggregates a consistent snapshot and stores the result under STRATEGIES.
pub fn finalize(matrix: &SharedMatrix, strategy: &dyn StrategyAggregator) -> f64 {
    let snapshot = matrix.snapshot();
    let score = strategy.aggregate(&snapshot);
    matrix.set_eval(Category::Strategies, strategy.name(), score.into(), None);
    debug!(
        "{}: final note {:.4} (matrix v{})",
        strategy.name(),
        score,
        snapshot.version()
    );
    score
}

pub const MIXED: &str = "mixed";

/// Pertinence-weighted mean of the TA, SOCIAL and REAL_TIME categories.
///
/// TA notes weigh by their time frame relevance. A category without any
/// valid note counts as neutral (0) instead of being left out.
#[derive(Debug, Clone, Default)]
pub struct MixedStrategy {
    weights: CategoryWeights,
}

impl MixedStrategy {
    pub fn new(weights: CategoryWeights) -> Self {
        Self { weights }
    }

    fn ta_mean(matrix: &EvaluationMatrix) -> f64 {
        let (sum, relevance) = matrix.get_notes(Category::Ta).into_iter().fold(
            (0.0, 0.0),
            |(sum, relevance), (_, tf, note)| {
                let weight = tf.map(|tf| tf.relevance()).unwrap_or(1.0);
                (sum + note * weight, relevance + weight)
            },
        );
        if relevance > 0.0 {
            sum / relevance
        } else {
            0.0
        }
    }

    fn plain_mean(matrix: &EvaluationMatrix, category: Category) -> f64 {
        let notes = matrix.get_notes(category);
        if notes.is_empty() {
            return 0.0;
        }
        notes.iter().map(|(_, _, note)| note).sum::<f64>() / notes.len() as f64
    }
}

impl StrategyAggregator for MixedStrategy {
    fn name(&self) -> &str {
        MIXED
    }

    fn aggregate(&self, matrix: &EvaluationMatrix) -> f64 {
        let w = &self.weights;
        let total = w.total();
        if total <= 0.0 {
            return 0.0;
        }
        let blended = (Self::ta_mean(matrix) * w.ta
            + Self::plain_mean(matrix, Category::Social) * w.social
            + Self::plain_mean(matrix, Category::RealTime) * w.real_time)
            / total;
        blended.clamp(-1.0, 1.0)
    }
}

pub const INSTANT_SOCIAL_REACTION: &str = "instant_social_reaction";

/// Fast reaction to price jumps and social buzz; TA is ignored.
///
/// Averages the instant fluctuation note and the social notes, each side
/// weighted by its category weight. Unlike `MixedStrategy` a side without
/// any valid note is left out, so a lone note drives the whole score.
#[derive(Debug, Clone, Default)]
pub struct InstantSocialReactionStrategy {
    weights: CategoryWeights,
}

impl InstantSocialReactionStrategy {
    pub fn new(weights: CategoryWeights) -> Self {
        Self { weights }
    }

    fn mean(notes: impl Iterator<Item = f64>) -> Option<f64> {
        let (sum, count) = notes.fold((0.0, 0usize), |(sum, count), note| (sum + note, count + 1));
        (count > 0).then(|| sum / count as f64)
    }
}

impl StrategyAggregator for InstantSocialReactionStrategy {
    fn name(&self) -> &str {
        INSTANT_SOCIAL_REACTION
    }

    fn aggregate(&self, matrix: &EvaluationMatrix) -> f64 {
        let instant = Self::mean(
            matrix
                .get_notes(Category::RealTime)
                .into_iter()
                .filter(|(name, _, _)| *name == instant_fluctuations::NAME)
                .map(|(_, _, note)| note),
        );
        let social = Self::mean(
            matrix
                .get_notes(Category::Social)
                .into_iter()
                .map(|(_, _, note)| note),
        );

        let (sum, weight) = [
            (instant, self.weights.real_time),
            (social, self.weights.social),
        ]
        .into_iter()
        .filter_map(|(mean, weight)| mean.map(|m| (m, weight)))
        .filter(|(_, weight)| *weight > 0.0)
        .fold((0.0, 0.0), |(sum, total), (mean, weight)| {
            (sum + mean * weight, total + weight)
        });
        if weight <= 0.0 {
            return 0.0;
        }
        (sum / weight).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests;
