// SPDX-License-Identifier: GPL-3.0-only
//! Session lifecycle state and the UI projection derived from it

use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::camera::viewport::NavigationCameraState;
use crate::error::NavError;

/// Where fixes come from while guiding. Fixed at activation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GuidanceMode {
    #[default]
    Real,
    Simulated,
}

impl GuidanceMode {
    #[must_use]
    pub fn from_simulate(simulate: bool) -> Self {
        if simulate {
            GuidanceMode::Simulated
        } else {
            GuidanceMode::Real
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Uninitialized,
    AwaitingPermission,
    Ready,
    /// `rerouting` is set when the request replaces a route that is still
    /// being guided.
    RouteRequested {
        rerouting: bool,
    },
    Guiding(GuidanceMode),
    Terminated,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::AwaitingPermission => write!(f, "awaiting_permission"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::RouteRequested { rerouting: false } => write!(f, "route_requested"),
            SessionState::RouteRequested { rerouting: true } => write!(f, "rerouting"),
            SessionState::Guiding(mode) => write!(f, "guiding({mode})"),
            SessionState::Terminated => write!(f, "terminated"),
        }
    }
}

impl SessionState {
    /// Whether `self -> next` is a legal lifecycle step.
    #[must_use]
    pub fn can_transition_to(&self, next: &SessionState) -> bool {
        use SessionState::{
            AwaitingPermission, Guiding, Ready, RouteRequested, Terminated, Uninitialized,
        };

        match (self, next) {
            (Terminated, _) => false,
            (_, Terminated) => true,
            (Uninitialized, AwaitingPermission | Ready) => true,
            (AwaitingPermission, Ready) => true,
            (Ready, RouteRequested { rerouting: false }) => true,
            // A newer request supersedes a pending one
            (RouteRequested { rerouting: a }, RouteRequested { rerouting: b }) => a == b,
            (RouteRequested { .. }, Ready | Guiding(_)) => true,
            (Guiding(_), RouteRequested { rerouting: true } | Ready) => true,
            _ => false,
        }
    }

    /// Apply `next` if legal.
    ///
    /// # Errors
    /// Returns [`NavError::InvalidTransition`] and leaves `self` unchanged when
    /// the step is not legal.
    pub fn transition(&mut self, next: SessionState) -> Result<(), NavError> {
        if !self.can_transition_to(&next) {
            return Err(NavError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        matches!(self, SessionState::Terminated)
    }

    /// Ready, RouteRequested or Guiding: the session can accept fixes and
    /// issue route requests.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionState::Ready | SessionState::RouteRequested { .. } | SessionState::Guiding(_)
        )
    }

    /// Guiding, or recomputing a route that is still being guided.
    #[must_use]
    pub fn is_guiding(&self) -> bool {
        matches!(
            self,
            SessionState::Guiding(_) | SessionState::RouteRequested { rerouting: true }
        )
    }
}

/// Which navigation chrome the host should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct UiVisibility {
    pub show_buttons: bool,
    pub show_maneuver_card: bool,
    pub show_progress_banner: bool,
}

/// Pure projection of the session state onto UI visibility.
#[must_use]
pub fn derive_ui_visibility(state: &SessionState) -> UiVisibility {
    let guiding = state.is_guiding();
    UiVisibility {
        show_buttons: guiding,
        show_maneuver_card: guiding,
        show_progress_banner: guiding,
    }
}

/// Everything the host needs to lay out its chrome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct UiSnapshot {
    pub state: SessionState,
    pub visibility: UiVisibility,
    pub show_recenter: bool,
    pub muted: bool,
}

impl UiSnapshot {
    #[must_use]
    pub fn derive(state: SessionState, camera: NavigationCameraState, muted: bool) -> Self {
        let visibility = derive_ui_visibility(&state);
        Self {
            state,
            visibility,
            show_recenter: visibility.show_buttons && camera.shows_recenter(),
            muted,
        }
    }
}
