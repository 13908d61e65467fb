//! Thumb opposition: thumb tip against each fingertip in turn.
//!
//! The classifier does not track progress. The caller passes the finger the
//! sequence currently expects; fingers are probed in INDEX..PINKY order and
//! the first one within touch range decides the label.

use log::debug;

use crate::config::ContactThresholds;
use crate::gestures::{Finger, Label};
use crate::landmarks::{Frame, THUMB_TIP, distance2, palm_size};

/// Per-target contact with a hysteresis band between touch and release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    Touch,
    Between,
    Release,
}

/// Palm-normalised thumb-tip to fingertip distance.
pub fn tip_gap(frame: &Frame, finger: Finger) -> Option<f32> {
    if !frame.is_complete() {
        return None;
    }
    let pts = frame.points();
    Some(distance2(&pts[THUMB_TIP], &pts[finger.tip()]) / palm_size(pts))
}

pub fn contact(frame: &Frame, finger: Finger, th: &ContactThresholds) -> Option<Contact> {
    let d = tip_gap(frame, finger)?;
    Some(if d <= th.touch {
        Contact::Touch
    } else if d >= th.release {
        Contact::Release
    } else {
        Contact::Between
    })
}

/// First finger in sequence order that the thumb is touching.
pub fn touched_finger(frame: &Frame, th: &ContactThresholds) -> Option<Finger> {
    Finger::SEQUENCE
        .into_iter()
        .find(|&f| contact(frame, f, th) == Some(Contact::Touch))
}

/// Compose TOUCH_<expected> / TRANSITION (wrong finger) / RELEASE (nothing touched).
pub fn detect_state(frame: &Frame, expected: Finger, th: &ContactThresholds) -> Label {
    if !frame.is_complete() {
        return Label::Unknown;
    }
    debug!(
        "thumb_opposition: expecting {} ({:?})",
        expected.as_str(),
        contact(frame, expected, th)
    );
    match touched_finger(frame, th) {
        Some(f) if f == expected => Label::Touch(f),
        Some(_) => Label::Transition,
        None => Label::Release,
    }
}

pub fn feedback(label: Label, expected: Finger) -> String {
    match label {
        Label::Touch(_) => format!("Good! Thumb to {} finger.", expected.as_str().to_lowercase()),
        Label::Release => "Release, then go to the next finger.".to_string(),
        Label::Unknown => "Hand not detected.".to_string(),
        _ => "Move slowly and touch each finger in order.".to_string(),
    }
}
