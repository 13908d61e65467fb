use serde::{Serialize, Serializer};
use std::{fmt, str::FromStr};

use crate::error::RehabError;
use crate::landmarks::{
    INDEX_PIP, INDEX_TIP, MIDDLE_PIP, MIDDLE_TIP, PINKY_PIP, PINKY_TIP, RING_PIP, RING_TIP,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exercise {
    OpenClose,
    Pinch,
    AbductionAdduction,
    ThumbOpposition,
    FingerLifts,
}

impl Exercise {
    pub const ALL: [Exercise; 5] = [
        Exercise::OpenClose,
        Exercise::Pinch,
        Exercise::AbductionAdduction,
        Exercise::ThumbOpposition,
        Exercise::FingerLifts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenClose => "open_close",
            Self::Pinch => "pinch",
            Self::AbductionAdduction => "abduction_adduction",
            Self::ThumbOpposition => "thumb_opposition",
            Self::FingerLifts => "finger_lifts",
        }
    }

    /// Position in `ALL`.
    pub fn index(&self) -> usize {
        match self {
            Self::OpenClose => 0,
            Self::Pinch => 1,
            Self::AbductionAdduction => 2,
            Self::ThumbOpposition => 3,
            Self::FingerLifts => 4,
        }
    }

    /// Label a fresh session starts from (each exercise's natural rest pose).
    pub fn initial_label(&self) -> Label {
        match self {
            Self::OpenClose | Self::Pinch => Label::Open,
            Self::AbductionAdduction => Label::Closed,
            Self::ThumbOpposition => Label::Tracking,
            Self::FingerLifts => Label::None,
        }
    }

    /// Label restored by an explicit reset. Only the sequential exercise
    /// returns to its own rest label; every other exercise goes back to OPEN.
    pub fn reset_label(&self) -> Label {
        match self {
            Self::ThumbOpposition => Label::Tracking,
            _ => Label::Open,
        }
    }
}

impl fmt::Display for Exercise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exercise {
    type Err = RehabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Exercise::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| RehabError::UnknownExercise(s.to_string()))
    }
}

/// The four long fingers, in thumb-opposition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const SEQUENCE: [Finger; 4] = [Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "INDEX",
            Self::Middle => "MIDDLE",
            Self::Ring => "RING",
            Self::Pinky => "PINKY",
        }
    }

    pub fn tip(&self) -> usize {
        match self {
            Self::Index => INDEX_TIP,
            Self::Middle => MIDDLE_TIP,
            Self::Ring => RING_TIP,
            Self::Pinky => PINKY_TIP,
        }
    }

    pub fn pip(&self) -> usize {
        match self {
            Self::Index => INDEX_PIP,
            Self::Middle => MIDDLE_PIP,
            Self::Ring => RING_PIP,
            Self::Pinky => PINKY_PIP,
        }
    }

    /// Finger at a sequence cursor; the cursor wraps.
    pub fn at(cursor: usize) -> Finger {
        Self::SEQUENCE[cursor % Self::SEQUENCE.len()]
    }
}

/// Discrete pose label produced by a classifier for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Open,
    Closed,
    Transition,
    Transitioning,
    Spread,
    Touch(Finger),
    Release,
    Up(Finger),
    /// No finger raised (finger lifts rest pose).
    None,
    /// Insufficient or malformed frame.
    Unknown,
    /// Thumb-opposition rest label before the first touch.
    Tracking,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
            Self::Transition => "TRANSITION",
            Self::Transitioning => "TRANSITIONING",
            Self::Spread => "SPREAD",
            Self::Touch(Finger::Index) => "TOUCH_INDEX",
            Self::Touch(Finger::Middle) => "TOUCH_MIDDLE",
            Self::Touch(Finger::Ring) => "TOUCH_RING",
            Self::Touch(Finger::Pinky) => "TOUCH_PINKY",
            Self::Release => "RELEASE",
            Self::Up(Finger::Index) => "INDEX_UP",
            Self::Up(Finger::Middle) => "MIDDLE_UP",
            Self::Up(Finger::Ring) => "RING_UP",
            Self::Up(Finger::Pinky) => "PINKY_UP",
            Self::None => "NONE",
            Self::Unknown => "UNKNOWN",
            Self::Tracking => "TRACKING",
        }
    }

    /// TRANSITIONING and TRANSITION mean the same thing to the state machine.
    pub fn normalized(self) -> Label {
        match self {
            Self::Transitioning => Self::Transition,
            other => other,
        }
    }

    pub fn is_transition(&self) -> bool {
        matches!(self, Self::Transition | Self::Transitioning)
    }

    pub fn is_up(&self) -> bool {
        matches!(self, Self::Up(_))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}
