// SPDX-License-Identifier: GPL-3.0-only
//! Session error taxonomy
//!
//! None of these are fatal. The coordinator logs them, or surfaces them to
//! the host as [`navkit_shared::HostEvent::Error`], and keeps running.

use navkit_shared::RouterFailure;

use crate::session::state::SessionState;

#[derive(Debug, thiserror::Error)]
pub enum NavError {
    #[error("Location permission not granted")]
    PermissionDenied,

    #[error("Route request failed: {}", join_reasons(.reasons))]
    RouteRequestFailed { reasons: Vec<RouterFailure> },

    #[error("Route request canceled")]
    RouteRequestCanceled,

    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Render surface not ready: style not loaded")]
    RenderSurfaceNotReady,

    #[error("Discarding stale result for generation {generation} (current: {current:?})")]
    StaleAsyncResult {
        generation: u64,
        current: Option<u64>,
    },

    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },

    #[error("Session already terminated")]
    SessionTerminated,

    #[error(transparent)]
    Validation(#[from] navkit_shared::validation::ValidationError),
}

fn join_reasons(reasons: &[RouterFailure]) -> String {
    if reasons.is_empty() {
        return "no reason given".to_string();
    }
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::state::GuidanceMode;

    #[test]
    fn test_route_failure_message_joins_reasons() {
        let error = NavError::RouteRequestFailed {
            reasons: vec![
                RouterFailure::new("No route found").with_code("NoRoute"),
                RouterFailure::new("timeout"),
            ],
        };
        assert_eq!(
            error.to_string(),
            "Route request failed: NoRoute: No route found; timeout"
        );
        let empty = NavError::RouteRequestFailed { reasons: vec![] };
        assert_eq!(empty.to_string(), "Route request failed: no reason given");
    }

    #[test]
    fn test_invalid_transition_message() {
        let error = NavError::InvalidTransition {
            from: SessionState::Ready,
            to: SessionState::Guiding(GuidanceMode::Real),
        };
        assert_eq!(
            error.to_string(),
            "Invalid session transition: ready -> guiding(real)"
        );
    }
}
