// SPDX-License-Identifier: GPL-3.0-only
//! The navigation session coordinator
//!
//! [`NavigationSession`] owns every pipeline and applies [`SessionEvent`]s
//! one at a time from its inbox. Collaborators only ever see snapshots and
//! report back through [`Completion`]s, so the order in which effects reach
//! the camera, the map and the speaker is the order events were applied.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use navkit_shared::validation::validate_route_endpoints;
use navkit_shared::{
    Coordinate, HostEvent, Position, RouteCandidate, RouteOutcome, RouteRequest, RouterFailure,
    RoutingProfile, VoiceCue,
};
use tokio::sync::{broadcast, mpsc, watch};

use super::events::{Completion, SessionEvent, SessionHandle};
use super::state::{GuidanceMode, SessionState, UiSnapshot};
use crate::camera::{
    CameraFrame, CameraMode, CameraSettings, NavigationCameraState, Orientation,
    ViewportController,
};
use crate::config::NavigationConfig;
use crate::error::NavError;
use crate::location::{FixSink, LocationPipeline, LocationProvider, LocationProviderFactory};
use crate::permission::PermissionSource;
use crate::render::{MapSurface, arrow_command, route_change_command};
use crate::route::{
    ActiveRoutes, GuidanceSettings, ProgressTracker, ProgressUpdate, RouteProjection,
    RouteSession, RoutingService,
};
use crate::voice::{
    AnnouncementPlayer, SpeechAnnouncement, SpeechResult, SpeechSynthesizer, VoiceAction,
    VoicePipeline, VoiceState,
};

/// Host events buffered per subscriber before the oldest are dropped
const HOST_EVENT_CAPACITY: usize = 256;

/// The external services a session drives.
#[derive(Clone)]
pub struct Collaborators {
    pub routing: Arc<dyn RoutingService>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub player: Arc<dyn AnnouncementPlayer>,
    pub surface: Arc<dyn MapSurface>,
    pub permission: Arc<dyn PermissionSource>,
    pub providers: Arc<dyn LocationProviderFactory>,
}

/// Per-session options. Host inputs may still change the flags before
/// activation.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub profile: RoutingProfile,
    pub language: String,
    pub style_uri: String,
    pub alternatives: bool,
    pub simulate: bool,
    pub muted: bool,
    pub end_of_route_feedback: bool,
    pub orientation: Orientation,
    pub camera: CameraSettings,
    pub guidance: GuidanceSettings,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&NavigationConfig::default())
    }
}

impl From<&NavigationConfig> for SessionSettings {
    fn from(config: &NavigationConfig) -> Self {
        Self {
            profile: config.session.profile,
            language: config.session.language.clone(),
            style_uri: config.session.map_style.clone(),
            alternatives: config.routing.alternatives,
            simulate: config.session.simulate,
            muted: config.session.mute,
            end_of_route_feedback: config.session.end_of_route_feedback,
            orientation: config.camera.orientation,
            camera: CameraSettings::from(&config.camera),
            guidance: GuidanceSettings::from(&config.guidance),
        }
    }
}

pub struct NavigationSession {
    settings: SessionSettings,
    collaborators: Collaborators,
    handle: SessionHandle,

    state: SessionState,
    mode: GuidanceMode,
    simulate: bool,
    end_of_route_feedback: bool,
    origin: Option<Coordinate>,
    destination: Option<Coordinate>,
    style_loaded: bool,

    routes: RouteSession,
    tracker: Option<ProgressTracker>,
    location: LocationPipeline,
    provider: Option<Box<dyn LocationProvider>>,
    viewport: ViewportController,
    voice: VoicePipeline,

    host_events: broadcast::Sender<HostEvent>,
    ui: watch::Sender<UiSnapshot>,
    camera: watch::Sender<NavigationCameraState>,
}

impl NavigationSession {
    /// Create a session and the inbox that [`NavigationSession::run`]
    /// consumes.
    #[must_use]
    pub fn new(
        settings: SessionSettings,
        collaborators: Collaborators,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, inbox) = mpsc::unbounded_channel();
        let (host_events, _) = broadcast::channel(HOST_EVENT_CAPACITY);
        let viewport = ViewportController::new(settings.camera.clone(), settings.orientation);
        let (ui, _) = watch::channel(UiSnapshot::derive(
            SessionState::Uninitialized,
            viewport.state(),
            settings.muted,
        ));
        let (camera, _) = watch::channel(viewport.state());

        let session = Self {
            mode: GuidanceMode::from_simulate(settings.simulate),
            simulate: settings.simulate,
            end_of_route_feedback: settings.end_of_route_feedback,
            location: LocationPipeline::new(settings.guidance.snap_threshold_m),
            voice: VoicePipeline::new(settings.muted),
            viewport,
            handle: SessionHandle::new(tx),
            state: SessionState::Uninitialized,
            origin: None,
            destination: None,
            style_loaded: false,
            routes: RouteSession::new(),
            tracker: None,
            provider: None,
            host_events,
            ui,
            camera,
            settings,
            collaborators,
        };
        (session, inbox)
    }

    /// Sender for host inputs and collaborator callbacks.
    #[must_use]
    pub fn session_handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.host_events.subscribe()
    }

    #[must_use]
    pub fn ui_snapshot(&self) -> watch::Receiver<UiSnapshot> {
        self.ui.subscribe()
    }

    #[must_use]
    pub fn camera_state(&self) -> watch::Receiver<NavigationCameraState> {
        self.camera.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn voice_state(&self) -> VoiceState {
        self.voice.state()
    }

    #[must_use]
    pub fn active_routes(&self) -> Option<&ActiveRoutes> {
        self.routes.active()
    }

    #[must_use]
    pub fn last_frame(&self) -> Option<&CameraFrame> {
        self.viewport.last_frame()
    }

    /// Apply events until the session terminates.
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<SessionEvent>) {
        info!("Navigation session started");
        while let Some(event) = inbox.recv().await {
            self.handle(event);
            if self.state.is_terminated() {
                break;
            }
        }
        self.teardown();

        // Release voice results queued behind the teardown
        inbox.close();
        while let Ok(event) = inbox.try_recv() {
            self.handle(event);
        }
        info!("Navigation session stopped");
    }

    /// Apply one event and republish the derived UI state.
    pub fn handle(&mut self, event: SessionEvent) {
        let name = event.name();
        match event {
            // Late voice results are released even after teardown
            SessionEvent::SynthesisFinished { epoch, result } => {
                self.handle_synthesis_finished(epoch, result);
            }
            SessionEvent::PlaybackFinished {
                epoch,
                announcement,
            } => self.handle_playback_finished(epoch, &announcement),
            _ if self.state.is_terminated() => {
                debug!("{}, ignoring {name}", NavError::SessionTerminated);
                return;
            }
            SessionEvent::Activate => self.handle_activate(),
            SessionEvent::SetOrigin(origin) => {
                self.origin = origin;
                if self.state == SessionState::Uninitialized {
                    self.viewport.set_origin_hint(origin);
                }
                self.handle_endpoints_changed();
            }
            SessionEvent::SetDestination(destination) => {
                self.destination = destination;
                self.handle_endpoints_changed();
            }
            SessionEvent::SetSimulate(simulate) => self.handle_set_simulate(simulate),
            SessionEvent::SetMute(muted) => self.handle_set_mute(muted),
            SessionEvent::ToggleMute => self.handle_set_mute(!self.voice.is_muted()),
            SessionEvent::SetEndOfRouteFeedback(show) => self.end_of_route_feedback = show,
            SessionEvent::SetOrientation(orientation) => {
                self.viewport.set_orientation(orientation);
                self.evaluate_camera();
            }
            SessionEvent::Recenter => self.handle_camera_request(CameraMode::Following),
            SessionEvent::ShowOverview => self.handle_camera_request(CameraMode::Overview),
            SessionEvent::CancelNavigation => self.handle_cancel_navigation(),
            SessionEvent::Teardown => self.teardown(),
            SessionEvent::LocationFix { epoch, position } => {
                self.handle_location_fix(epoch, position);
            }
            SessionEvent::ProviderLost { epoch, reason } => {
                self.handle_provider_lost(epoch, &reason);
            }
            SessionEvent::RoutesResolved {
                generation,
                outcome,
            } => self.handle_routes_resolved(generation, outcome),
            SessionEvent::StyleLoaded(result) => self.handle_style_loaded(result),
            SessionEvent::CameraTransitionFinished { transition } => {
                if self.viewport.finish_transition(transition) {
                    self.evaluate_camera();
                }
            }
            SessionEvent::MapGesture => {
                debug!("Map gesture, camera released");
                self.viewport.on_gesture();
            }
        }
        self.publish();
    }

    /// Unregister everything. Safe to call more than once.
    pub fn teardown(&mut self) {
        if self.state.is_terminated() {
            return;
        }
        info!("Tearing down navigation session ({})", self.state);

        if let Some(generation) = self.routes.cancel_pending() {
            debug!("Canceling route request {generation}");
        }
        self.collaborators.routing.cancel_all();
        self.clear_route();
        self.stop_provider();

        if let Some(announcement) = self.voice.shutdown() {
            self.collaborators.speech.clean(&announcement);
        }
        self.collaborators.speech.cancel();
        self.collaborators.player.shutdown();
        self.collaborators.surface.release();
        self.viewport.reset();

        self.set_state(SessionState::Terminated);
        self.publish();
    }

    fn handle_activate(&mut self) {
        match self.state {
            SessionState::Uninitialized => {
                self.mode = GuidanceMode::from_simulate(self.simulate);
                info!("Activating navigation session ({} guidance)", self.mode);

                let done = self.handle.completion(SessionEvent::StyleLoaded);
                self.collaborators
                    .surface
                    .load_style(&self.settings.style_uri, done);

                // Snap onto the origin without animating
                self.viewport.set_origin_hint(self.origin);
                if let Some(animation) = self.viewport.request_following(Duration::ZERO) {
                    self.collaborators.surface.apply_camera(&animation.frame);
                }
                self.collaborators.player.set_volume(self.voice.volume());
            }
            SessionState::AwaitingPermission => debug!("Retrying location permission"),
            state => {
                debug!("Session already active ({state}), ignoring activation");
                return;
            }
        }

        if self.collaborators.permission.has_fine_or_coarse_location() {
            self.enter_ready();
        } else {
            warn!("{}, waiting for the host to activate again", NavError::PermissionDenied);
            if self.state != SessionState::AwaitingPermission {
                self.set_state(SessionState::AwaitingPermission);
            }
        }
    }

    fn enter_ready(&mut self) {
        if !self.set_state(SessionState::Ready) {
            return;
        }
        if self.mode == GuidanceMode::Real {
            self.start_provider(None);
        }
        self.request_route(None);
    }

    fn handle_set_simulate(&mut self, simulate: bool) {
        if self.state == SessionState::Uninitialized {
            self.simulate = simulate;
        } else if simulate != self.simulate {
            warn!("Guidance mode is fixed at activation, ignoring simulate={simulate}");
        }
    }

    fn handle_set_mute(&mut self, muted: bool) {
        let volume = self.voice.set_muted(muted);
        self.collaborators.player.set_volume(volume);
        info!("Voice guidance {}", if muted { "muted" } else { "unmuted" });
    }

    fn handle_endpoints_changed(&mut self) {
        if !self.state.is_active() {
            return;
        }
        if self.origin.is_some() && self.destination.is_some() {
            self.request_route(None);
        } else if self.stop_guidance() {
            info!("Route endpoint cleared, navigation stopped");
        }
    }

    fn handle_cancel_navigation(&mut self) {
        if self.stop_guidance() {
            info!("Navigation cancelled");
            self.emit(HostEvent::NavigationCancelled);
        } else {
            debug!("Nothing to cancel in state {}", self.state);
        }
    }

    /// Issue a route request from `from`, or from the configured origin.
    fn request_route(&mut self, from: Option<Coordinate>) {
        let (Some(origin), Some(destination)) = (from.or(self.origin), self.destination) else {
            return;
        };
        if let Err(e) = validate_route_endpoints(&origin, &destination) {
            let e = NavError::from(e);
            error!("Not requesting a route: {e}");
            self.emit(HostEvent::error(e.to_string()));
            return;
        }

        let rerouting = self.state.is_guiding();
        if !self.set_state(SessionState::RouteRequested { rerouting }) {
            return;
        }
        let generation = self.routes.begin_request();
        let request = RouteRequest {
            origin,
            destination,
            profile: self.settings.profile,
            language: self.settings.language.clone(),
            alternatives: self.settings.alternatives,
        };
        info!(
            "Requesting {} route {origin} -> {destination} (generation {generation}{})",
            request.profile,
            if rerouting { ", reroute" } else { "" }
        );

        let done = self
            .handle
            .completion(move |outcome| SessionEvent::RoutesResolved {
                generation,
                outcome,
            });
        self.collaborators.routing.request(request, done);
    }

    fn handle_routes_resolved(&mut self, generation: u64, outcome: RouteOutcome) {
        if let Err(e) = self.routes.check_current(generation) {
            debug!("{e}");
            return;
        }
        self.routes.finish_request(generation);
        let SessionState::RouteRequested { rerouting } = self.state else {
            debug!("Route result {generation} arrived in state {}", self.state);
            return;
        };

        match outcome {
            RouteOutcome::Ready(candidates) if !candidates.is_empty() => {
                self.accept_routes(generation, candidates);
            }
            RouteOutcome::Ready(_) => self.route_failed(
                rerouting,
                vec![RouterFailure::new("No route found").with_code("NoRoute")],
            ),
            RouteOutcome::Failure(reasons) => self.route_failed(rerouting, reasons),
            RouteOutcome::Canceled => {
                info!("{}", NavError::RouteRequestCanceled);
                self.leave_route_request(rerouting);
            }
        }
    }

    fn route_failed(&mut self, rerouting: bool, reasons: Vec<RouterFailure>) {
        let e = NavError::RouteRequestFailed { reasons };
        error!("{e}");
        self.emit(HostEvent::error(e.to_string()));
        self.leave_route_request(rerouting);
    }

    /// A failed reroute keeps guiding the old route.
    fn leave_route_request(&mut self, rerouting: bool) {
        if rerouting {
            self.set_state(SessionState::Guiding(self.mode));
        } else {
            self.set_state(SessionState::Ready);
        }
    }

    fn accept_routes(&mut self, generation: u64, candidates: Vec<RouteCandidate>) {
        let Some(active) = self.routes.accept(generation, candidates) else {
            return;
        };
        let command = route_change_command(Some(active));
        let primary = Arc::clone(&active.primary);
        info!(
            "Route {} accepted: {:.0} m, {:.0} s, {} alternatives (generation {generation})",
            primary.id,
            primary.distance,
            primary.duration,
            active.alternatives.len()
        );

        self.collaborators.surface.submit(command);
        self.tracker = Some(ProgressTracker::new(
            Arc::clone(&primary),
            generation,
            self.settings.guidance,
        ));
        self.location.reset_matching();
        self.viewport
            .on_route_changed(Some((Arc::clone(&primary), generation)));

        if !self.set_state(SessionState::Guiding(self.mode)) {
            return;
        }
        match self.mode {
            GuidanceMode::Simulated => self.start_provider(Some(primary)),
            GuidanceMode::Real if self.provider.is_none() => self.start_provider(None),
            GuidanceMode::Real => {}
        }
        self.evaluate_camera();
    }

    /// Leave Guiding or RouteRequested for Ready. Returns whether anything
    /// was stopped.
    fn stop_guidance(&mut self) -> bool {
        if !matches!(
            self.state,
            SessionState::Guiding(_) | SessionState::RouteRequested { .. }
        ) {
            return false;
        }
        if let Some(generation) = self.routes.cancel_pending() {
            debug!("Abandoning route request {generation}");
        }
        self.clear_route();
        if self.mode == GuidanceMode::Simulated {
            self.stop_provider();
        }
        self.set_state(SessionState::Ready);
        self.evaluate_camera();
        true
    }

    fn clear_route(&mut self) {
        self.tracker = None;
        self.location.reset_matching();
        self.viewport.on_route_changed(None);
        let previous = self.routes.clear();
        if let Some(previous) = previous {
            debug!("Clearing route {}", previous.primary.id);
            self.collaborators
                .surface
                .submit(route_change_command(None));
        }
    }

    /// Replace the running provider. `route` selects the replay provider.
    fn start_provider(&mut self, route: Option<Arc<RouteCandidate>>) {
        self.stop_provider();
        let mut provider = match route {
            Some(route) => self.collaborators.providers.simulated(route),
            None => self.collaborators.providers.real(),
        };
        let epoch = self.location.begin_epoch();
        match provider.start(FixSink::new(self.handle.clone(), epoch)) {
            Ok(()) => {
                info!("Location provider {} started (epoch {epoch})", provider.name());
                self.provider = Some(provider);
            }
            Err(e) => {
                warn!("Failed to start location provider {}: {e:#}", provider.name());
                self.location.end_epoch();
            }
        }
    }

    fn stop_provider(&mut self) {
        if let Some(mut provider) = self.provider.take() {
            debug!("Stopping location provider {}", provider.name());
            provider.stop();
        }
        self.location.end_epoch();
    }

    fn handle_provider_lost(&mut self, epoch: u64, reason: &str) {
        if !self.location.is_current(epoch) {
            debug!("Ignoring loss of stale provider epoch {epoch}");
            return;
        }
        warn!("Location provider lost: {reason}");
        if let Some(mut provider) = self.provider.take() {
            provider.stop();
        }
        self.location.end_epoch();
    }

    fn handle_location_fix(&mut self, epoch: u64, position: Position) {
        if !self.location.is_current(epoch) {
            debug!("Dropping fix from stale provider epoch {epoch}");
            return;
        }
        if !self.state.is_active() {
            debug!("Dropping fix in state {}", self.state);
            return;
        }

        let projection = self
            .tracker
            .as_ref()
            .and_then(|tracker| tracker.project(&position.coordinate));
        let matched = self
            .tracker
            .as_ref()
            .zip(projection.as_ref())
            .map(|(tracker, projection)| (tracker.route().as_ref(), projection));
        let fix = self.location.normalize(position, matched);

        self.collaborators.surface.update_location_indicator(&fix);
        self.emit(HostEvent::LocationChanged {
            latitude: fix.enhanced.latitude(),
            longitude: fix.enhanced.longitude(),
        });
        self.viewport.on_location(&fix);
        self.evaluate_camera();

        if self.state.is_guiding() {
            self.advance_guidance(fix.raw.coordinate, projection);
        }
    }

    fn advance_guidance(&mut self, raw: Coordinate, projection: Option<RouteProjection>) {
        let off_route_threshold = self.settings.guidance.off_route_threshold_m;
        let Some(tracker) = self.tracker.as_mut() else {
            return;
        };

        let off_route = self.mode == GuidanceMode::Real
            && !tracker.has_arrived()
            && tracker.observe_offset(projection.as_ref());
        let update = projection
            .filter(|projection| projection.offset <= off_route_threshold)
            .map(|projection| tracker.advance(&projection));
        let route = Arc::clone(tracker.route());
        let generation = tracker.generation();

        if let Some(update) = update {
            self.apply_progress(&route, generation, update);
        }
        if off_route && !matches!(self.state, SessionState::RouteRequested { .. }) {
            warn!("Off route, rerouting from {raw}");
            self.request_route(Some(raw));
        }
    }

    fn apply_progress(&mut self, route: &RouteCandidate, generation: u64, update: ProgressUpdate) {
        let ProgressUpdate {
            progress,
            cue,
            arrived,
        } = update;

        self.viewport.on_progress(progress);
        self.evaluate_camera();

        match arrow_command(self.style_loaded, route, generation, &progress) {
            Ok(Some(command)) => self.collaborators.surface.submit(command),
            Ok(None) => {}
            Err(e) => debug!("Skipping maneuver arrow: {e}"),
        }

        self.emit(HostEvent::from(&progress));
        if let Some(cue) = cue {
            self.announce(cue);
        }
        if arrived {
            info!("Arrived at destination");
            self.emit(HostEvent::Arrived {
                end_of_route_feedback: self.end_of_route_feedback,
            });
        }
    }

    fn announce(&mut self, cue: VoiceCue) {
        let Some(epoch) = self.voice.on_cue(&cue) else {
            return;
        };
        debug!("Synthesizing {}: {}", cue.instruction_id, cue.text);
        let done = self
            .handle
            .completion(move |result| SessionEvent::SynthesisFinished { epoch, result });
        self.collaborators.speech.synthesize(cue, done);
    }

    fn handle_synthesis_finished(&mut self, epoch: u64, result: SpeechResult) {
        match self.voice.on_synthesized(epoch, result) {
            VoiceAction::Play(announcement) => {
                let done: Completion<SpeechAnnouncement> =
                    self.handle
                        .completion(move |announcement| SessionEvent::PlaybackFinished {
                            epoch,
                            announcement,
                        });
                self.collaborators.player.play(announcement, done);
            }
            VoiceAction::Discard(announcement) => {
                self.collaborators.speech.clean(&announcement);
            }
        }
    }

    fn handle_playback_finished(&mut self, epoch: u64, announcement: &SpeechAnnouncement) {
        if self.voice.on_playback_finished(epoch) {
            self.collaborators.speech.clean(announcement);
        } else {
            debug!("Announcement {} already released", announcement.id);
        }
    }

    fn handle_style_loaded(&mut self, result: Result<(), String>) {
        match result {
            Ok(()) => {
                info!("Map style loaded");
                self.style_loaded = true;
            }
            Err(reason) => warn!("Map style failed to load: {reason}"),
        }
    }

    fn handle_camera_request(&mut self, mode: CameraMode) {
        if self.state == SessionState::Uninitialized {
            debug!("Camera request before activation ignored");
            return;
        }
        let duration = self.viewport.default_transition();
        let animation = match mode {
            CameraMode::Following => self.viewport.request_following(duration),
            CameraMode::Overview => self.viewport.request_overview(duration),
        };
        let Some(animation) = animation else {
            return;
        };

        if animation.duration.is_zero() {
            self.collaborators.surface.apply_camera(&animation.frame);
            return;
        }
        let transition = animation.transition;
        let done = self
            .handle
            .completion(move |()| SessionEvent::CameraTransitionFinished { transition });
        self.collaborators
            .surface
            .animate_camera(&animation.frame, animation.duration, done);
    }

    fn evaluate_camera(&mut self) {
        if let Some(frame) = self.viewport.evaluate() {
            self.collaborators.surface.apply_camera(&frame);
        }
    }

    fn set_state(&mut self, next: SessionState) -> bool {
        let previous = self.state;
        match self.state.transition(next) {
            Ok(()) => {
                if previous != next {
                    info!("Session {previous} -> {next}");
                }
                true
            }
            Err(e) => {
                warn!("{e}");
                false
            }
        }
    }

    fn emit(&self, event: HostEvent) {
        debug!("Host event: {}", event.event_name());
        if self.host_events.send(event).is_err() {
            debug!("No host event subscribers");
        }
    }

    fn publish(&self) {
        let snapshot = UiSnapshot::derive(
            self.state,
            self.viewport.state(),
            self.voice.is_muted(),
        );
        self.ui.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });

        let camera = self.viewport.state();
        self.camera.send_if_modified(|current| {
            if *current == camera {
                return false;
            }
            *current = camera;
            true
        });
    }
}

impl Drop for NavigationSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
