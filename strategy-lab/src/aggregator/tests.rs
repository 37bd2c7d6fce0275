use super::*;
use crate::matrix::NoteValue;
use trading::TimeFrame;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_empty_matrix_is_neutral() {
    let strategy = MixedStrategy::default();
    assert_eq!(strategy.aggregate(&EvaluationMatrix::new()), 0.0);
}

#[test]
fn test_empty_categories_count_as_neutral() {
    let mut matrix = EvaluationMatrix::new();
    matrix.set_eval(Category::RealTime, "fluct", NoteValue::Value(-0.9), None);

    // (0 + 0 - 0.9) / 3
    let score = MixedStrategy::default().aggregate(&matrix);
    assert!(close(score, -0.3));
}

#[test]
fn test_ta_weighs_larger_time_frames_more() {
    let mut matrix = EvaluationMatrix::new();
    matrix.set_eval(Category::Ta, "rsi", NoteValue::Value(1.0), Some(TimeFrame::OneMinute));
    matrix.set_eval(Category::Ta, "rsi", NoteValue::Value(-1.0), Some(TimeFrame::OneDay));

    let weights = CategoryWeights {
        ta: 1.0,
        social: 0.0,
        real_time: 0.0,
    };
    let score = MixedStrategy::new(weights).aggregate(&matrix);

    let short = TimeFrame::OneMinute.relevance();
    let long = TimeFrame::OneDay.relevance();
    assert!(close(score, (short - long) / (short + long)));
    assert!(score < 0.0);
}

#[test]
fn test_pending_notes_are_ignored() {
    let mut matrix = EvaluationMatrix::new();
    matrix.set_eval(Category::Social, "news", NoteValue::Value(0.6), None);
    matrix.set_eval(Category::Social, "forum", NoteValue::Pending, None);

    let weights = CategoryWeights {
        ta: 0.0,
        social: 1.0,
        real_time: 0.0,
    };
    assert!(close(MixedStrategy::new(weights).aggregate(&matrix), 0.6));
}

#[test]
fn test_finalize_writes_the_strategy_note() {
    let shared = SharedMatrix::new();
    shared.set_eval(Category::RealTime, "fluct", NoteValue::Value(0.9), None);

    let score = finalize(&shared, &MixedStrategy::default());

    assert!(close(score, 0.3));
    let stored = shared
        .snapshot()
        .get_eval_note(Category::Strategies, MIXED, None)
        .unwrap();
    assert!(close(stored, 0.3));
}

#[test]
fn test_instant_social_reaction_leaves_out_silent_sides() {
    let mut matrix = EvaluationMatrix::new();
    matrix.set_eval(Category::RealTime, "instant_fluctuations", NoteValue::Value(0.8), None);
    matrix.set_eval(Category::RealTime, "order_book", NoteValue::Value(-1.0), None);
    matrix.set_eval(Category::Ta, "rsi", NoteValue::Value(-1.0), Some(TimeFrame::OneHour));

    // Only the instant note counts: no social note, other real-time and TA notes ignored.
    let strategy = InstantSocialReactionStrategy::default();
    assert!(close(strategy.aggregate(&matrix), 0.8));
    // The mixed blend still dilutes it with the empty categories.
    assert!(MixedStrategy::default().aggregate(&matrix) < 0.0);
}

#[test]
fn test_instant_social_reaction_weighs_both_sides() {
    let mut matrix = EvaluationMatrix::new();
    matrix.set_eval(Category::RealTime, "instant_fluctuations", NoteValue::Value(0.9), None);
    matrix.set_eval(Category::Social, "news", NoteValue::Value(-0.2), None);
    matrix.set_eval(Category::Social, "forum", NoteValue::Value(-0.4), None);
    matrix.set_eval(Category::Social, "tweets", NoteValue::Pending, None);

    // Equal weights: (0.9 + (-0.3)) / 2
    let strategy = InstantSocialReactionStrategy::default();
    assert!(close(strategy.aggregate(&matrix), 0.3));

    let weights = CategoryWeights {
        ta: 1.0,
        social: 2.0,
        real_time: 1.0,
    };
    // (0.9 * 1 + (-0.3) * 2) / 3
    let weighted = InstantSocialReactionStrategy::new(weights).aggregate(&matrix);
    assert!(close(weighted, 0.1));
    assert_eq!(InstantSocialReactionStrategy::default().aggregate(&EvaluationMatrix::new()), 0.0);
}
