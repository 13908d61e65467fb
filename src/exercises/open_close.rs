//! Whole-hand open/close: average 3D fingertip-to-wrist distance.

use crate::config::OpenCloseThresholds;
use crate::gestures::Label;
use crate::landmarks::{Frame, INDEX_TIP, MIDDLE_TIP, PINKY_TIP, RING_TIP, WRIST, distance3};

const FINGERTIPS: [usize; 4] = [INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

pub fn detect_state(frame: &Frame, th: &OpenCloseThresholds) -> Label {
    if !frame.is_complete() {
        return Label::Transition;
    }
    let pts = frame.points();
    let wrist = &pts[WRIST];
    let avg = FINGERTIPS
        .iter()
        .map(|&i| distance3(wrist, &pts[i]))
        .sum::<f32>()
        / FINGERTIPS.len() as f32;

    if avg > th.open {
        Label::Open
    } else if avg < th.closed {
        Label::Closed
    } else {
        Label::Transition
    }
}

/// Only speaks when the state machine accepted a change.
pub fn feedback(label: Label, changed: bool) -> &'static str {
    if !changed {
        return "";
    }
    match label {
        Label::Open => "Great! Hand fully open.",
        Label::Closed => "Great! Hand fully closed.",
        Label::Transition => "Keep going...",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::make_frame;

    fn th() -> OpenCloseThresholds {
        OpenCloseThresholds {
            open: 0.25,
            closed: 0.15,
        }
    }

    fn hand_with_reach(reach: f32) -> Frame {
        make_frame(&[
            (WRIST, 0.5, 0.9, 0.0),
            (INDEX_TIP, 0.5, 0.9 - reach, 0.0),
            (MIDDLE_TIP, 0.5, 0.9 - reach, 0.0),
            (RING_TIP, 0.5, 0.9, reach),
            (PINKY_TIP, 0.5 + reach, 0.9, 0.0),
        ])
    }

    #[test]
    fn test_open_closed_transition() {
        assert_eq!(detect_state(&hand_with_reach(0.30), &th()), Label::Open);
        assert_eq!(detect_state(&hand_with_reach(0.10), &th()), Label::Closed);
        assert_eq!(detect_state(&hand_with_reach(0.20), &th()), Label::Transition);
    }

    #[test]
    fn test_depth_counts_toward_reach() {
        // all reach along z only
        let f = make_frame(&[
            (WRIST, 0.5, 0.5, 0.0),
            (INDEX_TIP, 0.5, 0.5, 0.3),
            (MIDDLE_TIP, 0.5, 0.5, 0.3),
            (RING_TIP, 0.5, 0.5, 0.3),
            (PINKY_TIP, 0.5, 0.5, 0.3),
        ]);
        assert_eq!(detect_state(&f, &th()), Label::Open);
    }

    #[test]
    fn test_short_frame_falls_back() {
        let f = Frame::new(vec![Default::default(); 20]);
        assert_eq!(detect_state(&f, &th()), Label::Transition);
    }

    #[test]
    fn test_feedback_silent_without_change() {
        assert_eq!(feedback(Label::Open, false), "");
        assert!(!feedback(Label::Open, true).is_empty());
    }
}
