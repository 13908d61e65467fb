//! Finger spread: mean of the adjacent fingertip gaps (index-middle,
//! middle-ring, ring-pinky) in the image plane, palm-normalised. The thumb
//! is left out because it is often out of plane.

use crate::config::SpreadThresholds;
use crate::gestures::Label;
use crate::landmarks::{Frame, INDEX_TIP, MIDDLE_TIP, PINKY_TIP, RING_TIP, distance2, palm_size};

const GAPS: [(usize, usize); 3] = [(INDEX_TIP, MIDDLE_TIP), (MIDDLE_TIP, RING_TIP), (RING_TIP, PINKY_TIP)];

/// Average normalised gap; 0.0 for an incomplete frame.
pub fn finger_spread(frame: &Frame) -> f32 {
    if !frame.is_complete() {
        return 0.0;
    }
    let pts = frame.points();
    let palm = palm_size(pts);
    GAPS.iter()
        .map(|&(a, b)| distance2(&pts[a], &pts[b]) / palm)
        .sum::<f32>()
        / GAPS.len() as f32
}

pub fn detect_state(frame: &Frame, th: &SpreadThresholds) -> Label {
    if !frame.is_complete() {
        return Label::Unknown;
    }
    let gap = finger_spread(frame);
    if gap >= th.spread {
        Label::Spread
    } else if gap <= th.closed {
        Label::Closed
    } else {
        Label::Transitioning
    }
}

pub fn feedback(label: Label) -> &'static str {
    match label {
        Label::Spread => "Nice! Fingers spread wide.",
        Label::Closed => "Good! Fingers together.",
        Label::Transitioning => "Almost there!",
        _ => "Hand not found.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{MIDDLE_MCP, WRIST, make_frame};

    fn th() -> SpreadThresholds {
        SpreadThresholds {
            spread: 0.34,
            closed: 0.20,
        }
    }

    /// Palm of 0.4 with fingertips `gap` apart along x.
    fn hand(gap: f32) -> Frame {
        make_frame(&[
            (WRIST, 0.5, 0.9, 0.0),
            (MIDDLE_MCP, 0.5, 0.5, 0.0),
            (INDEX_TIP, 0.3, 0.2, 0.0),
            (MIDDLE_TIP, 0.3 + gap, 0.2, 0.0),
            (RING_TIP, 0.3 + 2.0 * gap, 0.2, 0.0),
            (PINKY_TIP, 0.3 + 3.0 * gap, 0.2, 0.0),
        ])
    }

    #[test]
    fn test_spread_is_palm_normalised() {
        let s = finger_spread(&hand(0.1));
        assert!((s - 0.25).abs() < 1e-4, "spread {s}");
    }

    #[test]
    fn test_states() {
        assert_eq!(detect_state(&hand(0.16), &th()), Label::Spread);
        assert_eq!(detect_state(&hand(0.06), &th()), Label::Closed);
        assert_eq!(detect_state(&hand(0.10), &th()), Label::Transitioning);
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        // 0.08 / 0.4 == 0.20 exactly at the closed bound
        let f = hand(0.08);
        let s = finger_spread(&f);
        let th = SpreadThresholds {
            spread: 0.34,
            closed: s,
        };
        assert_eq!(detect_state(&f, &th), Label::Closed);
    }

    #[test]
    fn test_depth_is_ignored() {
        let mut f = hand(0.06);
        let pts: Vec<_> = f
            .points()
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let mut p = *p;
                p.z = i as f32 * 0.5;
                p
            })
            .collect();
        f = Frame::new(pts);
        assert_eq!(detect_state(&f, &th()), Label::Closed);
    }

    #[test]
    fn test_short_frame_is_unknown() {
        assert_eq!(detect_state(&Frame::default(), &th()), Label::Unknown);
        assert_eq!(feedback(Label::Unknown), "Hand not found.");
    }
}
