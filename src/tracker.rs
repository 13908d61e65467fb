//! Per-exercise repetition state machines.
//!
//! Three rule sets:
//! - debounced (open_close, pinch, abduction_adduction): a new label is
//!   accepted only once `min_state_ms` has passed since the last accepted
//!   change; the exercise's closing edge counts a rep.
//! - finger_lifts: edge-triggered on content, an `*_UP` -> NONE edge counts.
//! - thumb_opposition: INDEX, MIDDLE, RING, PINKY touched in order with a
//!   release between touches; completing PINKY counts a rep.
//!
//! TRANSITION / TRANSITIONING and UNKNOWN never change a debounced or
//! finger-lift record.

use log::{debug, info};
use std::time::Instant;

use crate::gestures::{Exercise, Finger, Label};

pub const MIN_STATE_DURATION_MS: u64 = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceProgress {
    /// 0=INDEX .. 3=PINKY
    pub cursor: usize,
    pub touching: bool,
}

impl SequenceProgress {
    pub fn expected(&self) -> Finger {
        Finger::at(self.cursor)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseState {
    pub current: Label,
    pub previous: Label,
    pub repetitions: u32,
    pub last_change_ms: u64,
    /// Only thumb opposition carries sequence progress.
    pub sequence: Option<SequenceProgress>,
}

impl ExerciseState {
    fn with_label(exercise: Exercise, label: Label, now_ms: u64) -> Self {
        Self {
            current: label,
            previous: label,
            repetitions: 0,
            last_change_ms: now_ms,
            sequence: match exercise {
                Exercise::ThumbOpposition => Some(SequenceProgress::default()),
                _ => None,
            },
        }
    }

    fn commit(&mut self, label: Label, now_ms: u64) {
        self.previous = self.current;
        self.current = label;
        self.last_change_ms = now_ms;
    }
}

/// Outcome of feeding one label to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Update {
    pub changed: bool,
    pub repetitions: u32,
}

/// Registry of one state machine per exercise, owned by a single session.
#[derive(Debug)]
pub struct RepTracker {
    states: [ExerciseState; 5],
    min_state_ms: u64,
    start_instant: Instant,
}

impl Default for RepTracker {
    fn default() -> Self {
        Self::new(MIN_STATE_DURATION_MS)
    }
}

impl RepTracker {
    pub fn new(min_state_ms: u64) -> Self {
        Self {
            states: Exercise::ALL.map(|e| ExerciseState::with_label(e, e.initial_label(), 0)),
            min_state_ms,
            start_instant: Instant::now(),
        }
    }

    pub fn set_min_state_ms(&mut self, ms: u64) {
        self.min_state_ms = ms;
    }

    /// Milliseconds since the tracker was created (monotonic).
    pub fn now_ms(&self) -> u64 {
        self.start_instant.elapsed().as_millis() as u64
    }

    pub fn state(&self, exercise: Exercise) -> &ExerciseState {
        &self.states[exercise.index()]
    }

    pub fn current_label(&self, exercise: Exercise) -> Label {
        self.state(exercise).current
    }

    pub fn repetition_count(&self, exercise: Exercise) -> u32 {
        self.state(exercise).repetitions
    }

    /// Finger the thumb-opposition sequence is waiting for.
    pub fn expected_finger(&self) -> Finger {
        self.state(Exercise::ThumbOpposition)
            .sequence
            .unwrap_or_default()
            .expected()
    }

    pub fn update(&mut self, exercise: Exercise, label: Label) -> Update {
        let now = self.now_ms();
        self.update_at(exercise, label, now)
    }

    pub fn update_at(&mut self, exercise: Exercise, label: Label, now_ms: u64) -> Update {
        let min_state_ms = self.min_state_ms;
        let st = &mut self.states[exercise.index()];
        let changed = match exercise {
            Exercise::ThumbOpposition => update_sequence(st, label, now_ms),
            Exercise::FingerLifts => update_lifts(st, label, now_ms),
            _ => update_debounced(st, exercise, label, now_ms, min_state_ms),
        };
        Update {
            changed,
            repetitions: st.repetitions,
        }
    }

    pub fn reset(&mut self, exercise: Exercise) {
        let now = self.now_ms();
        self.reset_at(exercise, now);
    }

    pub fn reset_at(&mut self, exercise: Exercise, now_ms: u64) {
        self.states[exercise.index()] =
            ExerciseState::with_label(exercise, exercise.reset_label(), now_ms);
        info!("state reset for {exercise}");
    }
}

/// Transition that completes one cycle of a debounced exercise.
fn closing_edge(exercise: Exercise) -> Option<(Label, Label)> {
    match exercise {
        Exercise::OpenClose | Exercise::Pinch => Some((Label::Closed, Label::Open)),
        Exercise::AbductionAdduction => Some((Label::Closed, Label::Spread)),
        _ => None,
    }
}

fn update_debounced(
    st: &mut ExerciseState,
    exercise: Exercise,
    label: Label,
    now_ms: u64,
    min_state_ms: u64,
) -> bool {
    let label = label.normalized();
    if label.is_transition() || label == Label::Unknown || label == st.current {
        return false;
    }

    let held = now_ms.saturating_sub(st.last_change_ms);
    if held < min_state_ms {
        debug!(
            "{exercise}: dropped {} -> {} after {held}ms",
            st.current, label
        );
        return false;
    }

    if closing_edge(exercise) == Some((st.current, label)) {
        st.repetitions += 1;
        info!("{exercise}: repetition counted, total {}", st.repetitions);
    }
    debug!("{exercise}: {} -> {}", st.current, label);
    st.commit(label, now_ms);
    true
}

fn update_lifts(st: &mut ExerciseState, label: Label, now_ms: u64) -> bool {
    let label = label.normalized();
    if label.is_transition() || label == Label::Unknown {
        return false;
    }

    if st.current.is_up() && label == Label::None {
        st.repetitions += 1;
        info!("finger_lifts: repetition counted, total {}", st.repetitions);
    }

    if label == st.current {
        return false;
    }
    debug!("finger_lifts: {} -> {}", st.current, label);
    st.commit(label, now_ms);
    true
}

fn update_sequence(st: &mut ExerciseState, label: Label, now_ms: u64) -> bool {
    let mut seq = st.sequence.unwrap_or_default();
    let accepted = match label {
        Label::Touch(finger) => {
            if finger != seq.expected() || seq.touching {
                false
            } else {
                seq.touching = true;
                seq.cursor = (seq.cursor + 1) % Finger::SEQUENCE.len();
                if seq.cursor == 0 {
                    st.repetitions += 1;
                    info!(
                        "thumb_opposition: repetition counted, total {}",
                        st.repetitions
                    );
                }
                true
            }
        }
        Label::Release | Label::Transition | Label::Transitioning => {
            if seq.touching {
                seq.touching = false;
                true
            } else {
                false
            }
        }
        _ => false,
    };

    if accepted {
        debug!(
            "thumb_opposition: {} -> {} (next {})",
            st.current,
            label,
            seq.expected().as_str()
        );
        st.sequence = Some(seq);
        st.commit(label, now_ms);
    }
    accepted
}
