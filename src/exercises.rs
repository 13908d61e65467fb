//! Per-exercise pose classifiers.
//!
//! Every classifier is a pure function of one frame and its thresholds.
//! Incomplete frames never panic; they map to the exercise's fallback label.

pub mod abduction_adduction;
pub mod finger_lifts;
pub mod open_close;
pub mod pinch;
pub mod thumb_opposition;

use crate::config::Thresholds;
use crate::gestures::{Exercise, Finger, Label};
use crate::landmarks::Frame;

/// Classify one frame. `expected` is only consulted by thumb opposition.
pub fn detect(exercise: Exercise, frame: &Frame, th: &Thresholds, expected: Finger) -> Label {
    match exercise {
        Exercise::OpenClose => open_close::detect_state(frame, &th.open_close),
        Exercise::Pinch => pinch::detect_state(frame, &th.pinch),
        Exercise::AbductionAdduction => {
            abduction_adduction::detect_state(frame, &th.abduction_adduction)
        }
        Exercise::FingerLifts => finger_lifts::detect_state(frame, &th.finger_lifts),
        Exercise::ThumbOpposition => {
            thumb_opposition::detect_state(frame, expected, &th.thumb_opposition)
        }
    }
}

/// Built-in feedback text for a classified frame.
pub fn feedback(exercise: Exercise, label: Label, changed: bool, expected: Finger) -> String {
    match exercise {
        Exercise::OpenClose => open_close::feedback(label, changed).to_string(),
        Exercise::Pinch => pinch::feedback(label, changed).to_string(),
        Exercise::AbductionAdduction => abduction_adduction::feedback(label).to_string(),
        Exercise::FingerLifts => finger_lifts::feedback(label),
        Exercise::ThumbOpposition => thumb_opposition::feedback(label, expected),
    }
}

/// Open/close and pinch stay quiet on frames that did not change state.
pub fn speaks_on_change_only(exercise: Exercise) -> bool {
    matches!(exercise, Exercise::OpenClose | Exercise::Pinch)
}

/// The closed label set each classifier may produce.
pub fn label_set(exercise: Exercise) -> Vec<Label> {
    match exercise {
        Exercise::OpenClose | Exercise::Pinch => {
            vec![Label::Open, Label::Closed, Label::Transition]
        }
        Exercise::AbductionAdduction => vec![
            Label::Spread,
            Label::Closed,
            Label::Transitioning,
            Label::Unknown,
        ],
        Exercise::FingerLifts => {
            let mut v: Vec<Label> = Finger::SEQUENCE.into_iter().map(Label::Up).collect();
            v.extend([Label::None, Label::Transition, Label::Unknown]);
            v
        }
        Exercise::ThumbOpposition => {
            let mut v: Vec<Label> = Finger::SEQUENCE.into_iter().map(Label::Touch).collect();
            v.extend([Label::Release, Label::Transition, Label::Unknown]);
            v
        }
    }
}
