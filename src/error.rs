//! Error types shared by the classifier core, config loader and daemon.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RehabError {
    #[error("unknown exercise type: {0}")]
    UnknownExercise(String),

    #[error("no landmarks provided")]
    MissingLandmarks,

    #[error("invalid profile: {0}")]
    InvalidProfile(String),
}

pub type Result<T> = std::result::Result<T, RehabError>;
