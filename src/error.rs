use thiserror::Error;

/// Outcome of a backend call that did not produce a usable body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("backend returned status {0}")]
    Status(u16),
    // A legitimate answer for route lookups, not a failure.
    #[error("not found")]
    NotFound,
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("select a destination on the map first")]
    MissingDestination,
    #[error("choose a vehicle type")]
    MissingVehicleType,
    #[error("vehicle type cannot be dispatched")]
    UnsupportedVehicleType,
}

/// Errors surfaced to the operator by dispatch and reset actions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("a dispatch is already in progress")]
    Busy,
    #[error("the simulation was reset before the dispatch completed")]
    ResetMeanwhile,
    #[error("dispatch failed: {0}")]
    Failed(#[from] FetchError),
}
