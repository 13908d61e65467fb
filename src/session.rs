//! A client session: one repetition tracker per exercise plus the profile
//! its frames are classified with. Sessions share nothing with each other.

use log::debug;
use serde::Serialize;

use crate::config::Profile;
use crate::exercises;
use crate::gestures::{Exercise, Finger, Label};
use crate::landmarks::Frame;
use crate::tracker::{RepTracker, Update};

/// Result returned for every analysed frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub state: Label,
    pub repetitions: u32,
    pub feedback: String,
    pub state_changed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExerciseSummary {
    pub exercise_type: &'static str,
    pub state: Label,
    pub previous_state: Label,
    pub repetitions: u32,
    /// Next thumb-opposition target; absent for the other exercises.
    pub next_target: Option<&'static str>,
}

#[derive(Debug)]
pub struct Session {
    profile: Profile,
    tracker: RepTracker,
}

impl Session {
    pub fn new(profile: Profile) -> Self {
        let tracker = RepTracker::new(profile.timing.min_state_ms);
        Self { profile, tracker }
    }

    /// Swap thresholds after a profile reload; counts are kept.
    pub fn set_profile(&mut self, profile: Profile) {
        self.tracker.set_min_state_ms(profile.timing.min_state_ms);
        self.profile = profile;
    }

    pub fn tracker(&self) -> &RepTracker {
        &self.tracker
    }

    pub fn analyze(&mut self, exercise: Exercise, frame: &Frame) -> Analysis {
        let (label, expected) = self.classify(exercise, frame);
        let update = self.tracker.update(exercise, label);
        self.respond(exercise, label, expected, update)
    }

    /// Same as `analyze` with the frame stamped at `now_ms`.
    pub fn analyze_at(&mut self, exercise: Exercise, frame: &Frame, now_ms: u64) -> Analysis {
        let (label, expected) = self.classify(exercise, frame);
        let update = self.tracker.update_at(exercise, label, now_ms);
        self.respond(exercise, label, expected, update)
    }

    // the thumb target is read before the update so feedback names the
    // finger this frame was judged against
    fn classify(&self, exercise: Exercise, frame: &Frame) -> (Label, Finger) {
        let expected = self.tracker.expected_finger();
        if !frame.is_complete() {
            debug!("{exercise}: incomplete frame ({} points)", frame.len());
        }
        let label = exercises::detect(exercise, frame, &self.profile.thresholds, expected);
        (label, expected)
    }

    fn respond(
        &self,
        exercise: Exercise,
        label: Label,
        expected: Finger,
        update: Update,
    ) -> Analysis {
        let feedback = if exercises::speaks_on_change_only(exercise) && !update.changed {
            String::new()
        } else {
            match self.profile.feedback_override(exercise, label.as_str()) {
                Some(text) => text.to_string(),
                None => exercises::feedback(exercise, label, update.changed, expected),
            }
        };

        Analysis {
            state: label,
            repetitions: update.repetitions,
            feedback,
            state_changed: update.changed,
        }
    }

    pub fn reset(&mut self, exercise: Exercise) {
        self.tracker.reset(exercise);
    }

    pub fn summary(&self) -> Vec<ExerciseSummary> {
        Exercise::ALL
            .into_iter()
            .map(|e| {
                let st = self.tracker.state(e);
                ExerciseSummary {
                    exercise_type: e.as_str(),
                    state: st.current,
                    previous_state: st.previous,
                    repetitions: st.repetitions,
                    next_target: st.sequence.map(|seq| seq.expected().as_str()),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_profile;
    use crate::landmarks::{
        INDEX_PIP, INDEX_TIP, LANDMARK_COUNT, Landmark, MIDDLE_MCP, MIDDLE_TIP, PINKY_TIP, RING_TIP,
        THUMB_TIP, WRIST, make_frame,
    };

    fn open_hand() -> Frame {
        make_frame(&[
            (WRIST, 0.5, 0.9, 0.0),
            (MIDDLE_MCP, 0.5, 0.7, 0.0),
            (INDEX_TIP, 0.35, 0.5, 0.0),
            (MIDDLE_TIP, 0.45, 0.45, 0.0),
            (RING_TIP, 0.55, 0.5, 0.0),
            (PINKY_TIP, 0.65, 0.55, 0.0),
            (THUMB_TIP, 0.2, 0.7, 0.0),
        ])
    }

    fn fist() -> Frame {
        make_frame(&[
            (WRIST, 0.5, 0.9, 0.0),
            (MIDDLE_MCP, 0.5, 0.7, 0.0),
            (INDEX_TIP, 0.48, 0.8, 0.0),
            (MIDDLE_TIP, 0.5, 0.8, 0.0),
            (RING_TIP, 0.52, 0.8, 0.0),
            (PINKY_TIP, 0.54, 0.82, 0.0),
            (THUMB_TIP, 0.47, 0.8, 0.0),
        ])
    }

    /// Thumb resting on `finger`'s tip, other tips well apart.
    fn thumb_on(finger: Option<Finger>) -> Frame {
        let tips = [
            (Finger::Index, 0.2),
            (Finger::Middle, 0.4),
            (Finger::Ring, 0.6),
            (Finger::Pinky, 0.8),
        ];
        let mut set = vec![(WRIST, 0.5, 0.9, 0.0), (MIDDLE_MCP, 0.5, 0.5, 0.0)];
        for (f, x) in tips {
            set.push((f.tip(), x, 0.2, 0.0));
        }
        let thumb = match finger {
            Some(f) => tips.iter().find(|(t, _)| *t == f).map_or(0.5, |(_, x)| *x),
            None => 0.5,
        };
        let y = if finger.is_some() { 0.21 } else { 0.8 };
        set.push((THUMB_TIP, thumb, y, 0.0));
        make_frame(&set)
    }

    #[test]
    fn test_open_close_cycle_through_classifier() {
        let mut s = Session::new(Profile::default());
        let a = s.analyze_at(Exercise::OpenClose, &fist(), 300);
        assert_eq!(a.state, Label::Closed);
        assert!(a.state_changed);
        assert_eq!(a.repetitions, 0);
        assert!(!a.feedback.is_empty());

        let a = s.analyze_at(Exercise::OpenClose, &open_hand(), 600);
        assert_eq!(a.state, Label::Open);
        assert_eq!(a.repetitions, 1);

        // repeated open frame: no change, no feedback
        let a = s.analyze_at(Exercise::OpenClose, &open_hand(), 900);
        assert!(!a.state_changed);
        assert_eq!(a.feedback, "");
    }

    #[test]
    fn test_thumb_opposition_full_sequence() {
        let mut s = Session::new(Profile::default());
        let mut t = 0;
        for finger in Finger::SEQUENCE {
            let a = s.analyze_at(Exercise::ThumbOpposition, &thumb_on(Some(finger)), t);
            assert_eq!(a.state, Label::Touch(finger));
            assert!(a.state_changed);
            assert!(a.feedback.contains(&finger.as_str().to_lowercase()), "{}", a.feedback);
            let a = s.analyze_at(Exercise::ThumbOpposition, &thumb_on(None), t + 1);
            assert_eq!(a.state, Label::Release);
            assert!(a.state_changed);
            t += 2;
        }
        assert_eq!(s.tracker().repetition_count(Exercise::ThumbOpposition), 1);
    }

    #[test]
    fn test_thumb_on_wrong_finger_reports_transition() {
        let mut s = Session::new(Profile::default());
        let a = s.analyze_at(Exercise::ThumbOpposition, &thumb_on(Some(Finger::Ring)), 0);
        assert_eq!(a.state, Label::Transition);
        assert!(!a.state_changed);
        assert_eq!(s.tracker().expected_finger(), Finger::Index);
    }

    #[test]
    fn test_short_frame_affects_nothing() {
        let mut s = Session::new(Profile::default());
        let short = Frame::new(vec![Landmark::default(); LANDMARK_COUNT - 1]);
        for e in Exercise::ALL {
            let before = s.tracker().state(e).clone();
            let a = s.analyze_at(e, &short, 10_000);
            assert!(!a.state_changed, "{e}");
            assert_eq!(s.tracker().state(e), &before);
        }
    }

    #[test]
    fn test_feedback_override_is_used() {
        let p = parse_profile("[feedback.abduction_adduction]\nUNKNOWN = \"Show me your hand\"\n")
            .expect("profile parses");
        let mut s = Session::new(p);
        let a = s.analyze_at(Exercise::AbductionAdduction, &Frame::default(), 0);
        assert_eq!(a.feedback, "Show me your hand");
    }

    #[test]
    fn test_reset_and_summary() {
        let mut s = Session::new(Profile::default());
        s.analyze_at(Exercise::Pinch, &fist(), 300);
        s.analyze_at(Exercise::Pinch, &open_hand(), 600);
        let pinch = |s: &Session| {
            s.summary()
                .into_iter()
                .find(|x| x.exercise_type == "pinch")
                .map(|x| (x.state, x.repetitions))
        };
        assert_eq!(pinch(&s), Some((Label::Open, 1)));
        s.reset(Exercise::Pinch);
        assert_eq!(pinch(&s), Some((Label::Open, 0)));
    }

    #[test]
    fn test_profile_swap_keeps_counts() {
        let mut s = Session::new(Profile::default());
        s.analyze_at(Exercise::OpenClose, &fist(), 300);
        s.analyze_at(Exercise::OpenClose, &open_hand(), 600);
        let mut p = Profile::default();
        p.timing.min_state_ms = 1_000;
        s.set_profile(p);
        assert_eq!(s.tracker().repetition_count(Exercise::OpenClose), 1);
        // longer hold now applies
        assert!(!s.analyze_at(Exercise::OpenClose, &fist(), 1_200).state_changed);
        assert!(s.analyze_at(Exercise::OpenClose, &fist(), 1_600).state_changed);
    }

    #[test]
    fn test_analysis_serializes_wire_shape() {
        let mut s = Session::new(Profile::default());
        let a = s.analyze_at(Exercise::FingerLifts, &Frame::default(), 0);
        let v = serde_json::to_value(&a).expect("serializes");
        assert_eq!(v["state"], "UNKNOWN");
        assert_eq!(v["repetitions"], 0);
        assert_eq!(v["state_changed"], false);
        assert_eq!(v["feedback"], "Hand not detected.");
    }

    #[test]
    fn test_wall_clock_analyze_counts_lifts() {
        // finger_lifts has no hold time, so real timestamps are enough
        let mut s = Session::new(Profile::default());
        let lifted = make_frame(&[
            (WRIST, 0.5, 0.9, 0.0),
            (MIDDLE_MCP, 0.5, 0.6, 0.0),
            (INDEX_PIP, 0.4, 0.5, 0.0),
            (INDEX_TIP, 0.4, 0.3, 0.0),
        ]);
        let a = s.analyze(Exercise::FingerLifts, &lifted);
        assert_eq!(a.state, Label::Up(Finger::Index));
        assert!(a.state_changed);
        let flat = make_frame(&[(WRIST, 0.5, 0.9, 0.0), (MIDDLE_MCP, 0.5, 0.6, 0.0)]);
        let a = s.analyze(Exercise::FingerLifts, &flat);
        assert_eq!(a.state, Label::None);
        assert_eq!(a.repetitions, 1);
    }
}
