// SPDX-License-Identifier: GPL-3.0-only
//! The session inbox
//!
//! Every producer (host, location provider, routing, speech, player, map
//! surface) reaches the coordinator by posting a [`SessionEvent`] through a
//! [`SessionHandle`]. Collaborators are handed a [`Completion`] that posts
//! their result the same way, so all state mutation happens on the
//! coordinator task in arrival order.

use log::debug;
use navkit_shared::{Coordinate, Position, RouteOutcome};
use tokio::sync::mpsc;

use crate::camera::padding::Orientation;
use crate::voice::{SpeechAnnouncement, SpeechResult};

#[derive(Debug)]
pub enum SessionEvent {
    // Host inputs
    Activate,
    SetOrigin(Option<Coordinate>),
    SetDestination(Option<Coordinate>),
    SetSimulate(bool),
    SetMute(bool),
    ToggleMute,
    SetEndOfRouteFeedback(bool),
    SetOrientation(Orientation),
    Recenter,
    ShowOverview,
    CancelNavigation,
    Teardown,

    // Location provider
    LocationFix {
        epoch: u64,
        position: Position,
    },
    ProviderLost {
        epoch: u64,
        reason: String,
    },

    // Routing
    RoutesResolved {
        generation: u64,
        outcome: RouteOutcome,
    },

    // Voice
    SynthesisFinished {
        epoch: u64,
        result: SpeechResult,
    },
    PlaybackFinished {
        epoch: u64,
        announcement: SpeechAnnouncement,
    },

    // Map surface
    StyleLoaded(Result<(), String>),
    CameraTransitionFinished {
        transition: u64,
    },
    MapGesture,
}

impl SessionEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Activate => "activate",
            SessionEvent::SetOrigin(_) => "set_origin",
            SessionEvent::SetDestination(_) => "set_destination",
            SessionEvent::SetSimulate(_) => "set_simulate",
            SessionEvent::SetMute(_) => "set_mute",
            SessionEvent::ToggleMute => "toggle_mute",
            SessionEvent::SetEndOfRouteFeedback(_) => "set_end_of_route_feedback",
            SessionEvent::SetOrientation(_) => "set_orientation",
            SessionEvent::Recenter => "recenter",
            SessionEvent::ShowOverview => "show_overview",
            SessionEvent::CancelNavigation => "cancel_navigation",
            SessionEvent::Teardown => "teardown",
            SessionEvent::LocationFix { .. } => "location_fix",
            SessionEvent::ProviderLost { .. } => "provider_lost",
            SessionEvent::RoutesResolved { .. } => "routes_resolved",
            SessionEvent::SynthesisFinished { .. } => "synthesis_finished",
            SessionEvent::PlaybackFinished { .. } => "playback_finished",
            SessionEvent::StyleLoaded(_) => "style_loaded",
            SessionEvent::CameraTransitionFinished { .. } => "camera_transition_finished",
            SessionEvent::MapGesture => "map_gesture",
        }
    }
}

/// One-shot callback a collaborator invokes with its result.
///
/// Completing after the session is gone is harmless: the event is dropped.
pub struct Completion<T> {
    callback: Box<dyn FnOnce(T) + Send + 'static>,
}

impl<T> Completion<T> {
    pub fn new(callback: impl FnOnce(T) + Send + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    pub fn complete(self, value: T) {
        (self.callback)(value);
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}

/// Cloneable sender side of the session inbox.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }

    /// Post an event. Returns `false` once the session has shut down.
    pub fn post(&self, event: SessionEvent) -> bool {
        let name = event.name();
        if self.tx.send(event).is_err() {
            debug!("Session inbox closed, dropping {name}");
            return false;
        }
        true
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// A completion that maps its value into an event and posts it.
    pub fn completion<T, F>(&self, into_event: F) -> Completion<T>
    where
        T: 'static,
        F: FnOnce(T) -> SessionEvent + Send + 'static,
    {
        let handle = self.clone();
        Completion::new(move |value| {
            handle.post(into_event(value));
        })
    }

    pub fn activate(&self) -> bool {
        self.post(SessionEvent::Activate)
    }

    pub fn set_origin(&self, origin: Option<Coordinate>) -> bool {
        self.post(SessionEvent::SetOrigin(origin))
    }

    pub fn set_destination(&self, destination: Option<Coordinate>) -> bool {
        self.post(SessionEvent::SetDestination(destination))
    }

    pub fn set_simulate(&self, simulate: bool) -> bool {
        self.post(SessionEvent::SetSimulate(simulate))
    }

    pub fn set_mute(&self, muted: bool) -> bool {
        self.post(SessionEvent::SetMute(muted))
    }

    pub fn toggle_mute(&self) -> bool {
        self.post(SessionEvent::ToggleMute)
    }

    pub fn set_end_of_route_feedback(&self, show: bool) -> bool {
        self.post(SessionEvent::SetEndOfRouteFeedback(show))
    }

    pub fn set_orientation(&self, orientation: Orientation) -> bool {
        self.post(SessionEvent::SetOrientation(orientation))
    }

    pub fn recenter(&self) -> bool {
        self.post(SessionEvent::Recenter)
    }

    pub fn show_overview(&self) -> bool {
        self.post(SessionEvent::ShowOverview)
    }

    pub fn cancel_navigation(&self) -> bool {
        self.post(SessionEvent::CancelNavigation)
    }

    pub fn teardown(&self) -> bool {
        self.post(SessionEvent::Teardown)
    }

    /// Report a user pan/zoom on the map.
    pub fn map_gesture(&self) -> bool {
        self.post(SessionEvent::MapGesture)
    }
}
