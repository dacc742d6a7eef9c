//! Error surface of the state container.

use std::fmt;

use thiserror::Error;

/// Synchronous usage errors raised at the container's public surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Capability was requested before the presentation bridge was attached.
    #[error("state container must be wrapped in a provider before use")]
    BridgeMissing,

    /// An update call carried no mutators.
    #[error("update requires at least one mutator")]
    EmptyUpdate,
}

/// Failure of a single mutation step.
///
/// Steps fail either because the mutator itself returned an error, or
/// because diagnostic patch computation could not serialize the state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutateError {
    /// The mutator function reported a failure.
    #[error("mutator failed: {0}")]
    Mutator(String),

    /// Patch computation failed while diagnostic mode was enabled.
    #[error("patch computation failed: {0}")]
    Diagnostics(String),
}

impl MutateError {
    /// Build a mutator failure from any displayable cause.
    pub fn mutator(cause: impl fmt::Display) -> Self {
        Self::Mutator(cause.to_string())
    }

    /// Build a diagnostics failure from any displayable cause.
    pub fn diagnostics(cause: impl fmt::Display) -> Self {
        Self::Diagnostics(cause.to_string())
    }
}

/// Terminal outcome of an awaited update that did not produce a state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateError {
    /// The step this completion was attached to failed to apply.
    #[error(transparent)]
    Failed(#[from] MutateError),

    /// The container was dropped before the step was applied.
    #[error("update was abandoned before it was applied")]
    Abandoned,
}

#[cfg(test)]
mod tests {
    use super::{MutateError, StoreError, UpdateError};

    #[test]
    fn bridge_missing_message_is_documented() {
        assert_eq!(
            StoreError::BridgeMissing.to_string(),
            "state container must be wrapped in a provider before use"
        );
    }

    #[test]
    fn empty_update_message() {
        assert_eq!(
            StoreError::EmptyUpdate.to_string(),
            "update requires at least one mutator"
        );
    }

    #[test]
    fn update_error_is_transparent_over_mutate_error() {
        let err = UpdateError::from(MutateError::mutator("count out of range"));
        assert_eq!(err.to_string(), "mutator failed: count out of range");
    }

    #[test]
    fn diagnostics_error_names_the_cause() {
        let err = MutateError::diagnostics("map key is not a string");
        assert_eq!(
            err.to_string(),
            "patch computation failed: map key is not a string"
        );
    }
}
