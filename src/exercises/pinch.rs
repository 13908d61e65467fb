//! Thumb-to-index pinch: raw 3D tip distance, not palm-normalised.

use crate::config::OpenCloseThresholds;
use crate::gestures::Label;
use crate::landmarks::{Frame, INDEX_TIP, THUMB_TIP, distance3};

pub fn detect_state(frame: &Frame, th: &OpenCloseThresholds) -> Label {
    if !frame.is_complete() {
        return Label::Transition;
    }
    let pts = frame.points();
    let d = distance3(&pts[THUMB_TIP], &pts[INDEX_TIP]);

    if d > th.open {
        Label::Open
    } else if d < th.closed {
        Label::Closed
    } else {
        Label::Transition
    }
}

pub fn feedback(label: Label, changed: bool) -> &'static str {
    if !changed {
        return "";
    }
    match label {
        Label::Open => "Good! Fingers apart.",
        Label::Closed => "Perfect pinch!",
        Label::Transition => "Keep going...",
        _ => "",
    }
}
