//! Single-finger lifts. A finger's score is how far its tip sits above its
//! PIP joint, palm-normalised (image y grows downward). The highest-scoring
//! finger decides the label.

use crate::config::LiftThresholds;
use crate::gestures::{Finger, Label};
use crate::landmarks::{Frame, palm_size};

/// Highest-scoring finger, if any finger scores above zero.
pub fn raised_finger(frame: &Frame) -> Option<(Finger, f32)> {
    if !frame.is_complete() {
        return None;
    }
    let pts = frame.points();
    let palm = palm_size(pts);

    let mut best: Option<(Finger, f32)> = None;
    for finger in Finger::SEQUENCE {
        let score = (pts[finger.pip()].y - pts[finger.tip()].y) / palm;
        if score > best.map_or(0.0, |(_, s)| s) {
            best = Some((finger, score));
        }
    }
    best
}

pub fn detect_state(frame: &Frame, th: &LiftThresholds) -> Label {
    if !frame.is_complete() {
        return Label::Unknown;
    }
    match raised_finger(frame) {
        Some((finger, score)) if score >= th.up => Label::Up(finger),
        Some((_, score)) if score > th.down => Label::Transition,
        _ => Label::None,
    }
}

pub fn feedback(label: Label) -> String {
    match label {
        Label::Up(finger) => format!("Good! Lift the {} finger.", finger.as_str().to_lowercase()),
        Label::None => "Keep your hand flat, then lift one finger.".to_string(),
        Label::Transition | Label::Transitioning => "Slow and steady.".to_string(),
        _ => "Hand not detected.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{MIDDLE_MCP, WRIST, make_frame};

    fn th() -> LiftThresholds {
        LiftThresholds {
            up: 0.055,
            down: 0.035,
        }
    }

    /// Palm of 0.4; every PIP at y=0.4, each tip raised by the given amount.
    fn hand(lifts: [f32; 4]) -> Frame {
        let mut set = vec![(WRIST, 0.5, 0.9, 0.0), (MIDDLE_MCP, 0.5, 0.5, 0.0)];
        for (finger, lift) in Finger::SEQUENCE.iter().zip(lifts) {
            set.push((finger.pip(), 0.5, 0.4, 0.0));
            set.push((finger.tip(), 0.5, 0.4 - lift, 0.0));
        }
        make_frame(&set)
    }

    #[test]
    fn test_highest_finger_wins() {
        let f = hand([0.03, 0.01, 0.06, 0.0]);
        assert_eq!(detect_state(&f, &th()), Label::Up(Finger::Ring));
    }

    #[test]
    fn test_flat_hand_is_none() {
        assert_eq!(detect_state(&hand([0.0; 4]), &th()), Label::None);
        // curled fingers score negative
        assert_eq!(detect_state(&hand([-0.05; 4]), &th()), Label::None);
        assert_eq!(raised_finger(&hand([-0.05; 4])), None);
    }

    #[test]
    fn test_between_bands_is_transition() {
        // 0.018 / 0.4 == 0.045
        assert_eq!(detect_state(&hand([0.018, 0.0, 0.0, 0.0]), &th()), Label::Transition);
    }

    #[test]
    fn test_short_frame_is_unknown() {
        assert_eq!(detect_state(&Frame::default(), &th()), Label::Unknown);
        assert_eq!(feedback(Label::Unknown), "Hand not detected.");
    }

    #[test]
    fn test_feedback_names_finger() {
        assert_eq!(feedback(Label::Up(Finger::Pinky)), "Good! Lift the pinky finger.");
    }
}
