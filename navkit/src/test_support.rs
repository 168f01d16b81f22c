// SPDX-License-Identifier: GPL-3.0-only
//! Fixtures and recording collaborators shared by the unit and scenario tests

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use navkit_shared::{
    Coordinate, Maneuver, ManeuverKind, Position, RouteCandidate, RouteLeg, RouteOutcome,
    RouteRequest, VoiceCue,
};
use parking_lot::Mutex;

use crate::camera::CameraFrame;
use crate::location::{FixSink, LocationFix, LocationProvider, LocationProviderFactory};
use crate::permission::PermissionSource;
use crate::render::{MapSurface, RenderCommand};
use crate::route::RoutingService;
use crate::session::events::Completion;
use crate::voice::{AnnouncementPlayer, SpeechAnnouncement, SpeechResult, SpeechSynthesizer};

/// A straight eastbound route of three ~744 m segments at 48.0N with a
/// depart, a left turn at the second vertex, and an arrival.
pub fn straight_route(id: &str) -> RouteCandidate {
    let geometry = vec![
        Coordinate::new(2.00, 48.0),
        Coordinate::new(2.01, 48.0),
        Coordinate::new(2.02, 48.0),
        Coordinate::new(2.03, 48.0),
    ];
    let probe = RouteCandidate::new(id, geometry.clone(), Vec::new(), Vec::new(), 0.0, 0.0);
    let turn_at = probe.distance_at_vertex(1);
    let end = probe.geometry_length();

    let maneuvers = vec![
        Maneuver {
            index: 0,
            leg_index: 0,
            location: geometry[0],
            distance_from_start: 0.0,
            kind: ManeuverKind::Depart,
            modifier: None,
            instruction: "Head east".to_string(),
            voice_cues: Vec::new(),
        },
        Maneuver {
            index: 1,
            leg_index: 0,
            location: geometry[1],
            distance_from_start: turn_at,
            kind: ManeuverKind::Turn,
            modifier: Some("left".to_string()),
            instruction: "Turn left".to_string(),
            voice_cues: vec![VoiceCue {
                instruction_id: format!("{id}-cue-1"),
                text: "In 200 meters, turn left".to_string(),
                ssml: None,
                maneuver_index: 1,
                trigger_distance: 200.0,
            }],
        },
        Maneuver {
            index: 2,
            leg_index: 0,
            location: geometry[3],
            distance_from_start: end,
            kind: ManeuverKind::Arrive,
            modifier: None,
            instruction: "You have arrived".to_string(),
            voice_cues: vec![VoiceCue {
                instruction_id: format!("{id}-cue-2"),
                text: "You have arrived".to_string(),
                ssml: None,
                maneuver_index: 2,
                trigger_distance: 0.0,
            }],
        },
    ];
    let legs = vec![RouteLeg {
        summary: "Test road".to_string(),
        distance: end,
        duration: 180.0,
    }];
    RouteCandidate::new(id, geometry, legs, maneuvers, end, 180.0)
}

/// A reading on the straight route `meters` from its start.
pub fn position_along(route: &RouteCandidate, meters: f64) -> Position {
    let coordinate = route
        .coordinate_at(meters)
        .unwrap_or(Coordinate::new(2.0, 48.0));
    Position::new(coordinate).with_bearing(90.0).with_speed(13.9)
}

fn pop_front<T>(queue: &Mutex<Vec<T>>) -> Option<T> {
    let mut queue = queue.lock();
    if queue.is_empty() {
        None
    } else {
        Some(queue.remove(0))
    }
}

/// Holds every request until the test resolves it.
#[derive(Debug, Default)]
pub struct MockRouting {
    pub requests: Mutex<Vec<RouteRequest>>,
    pending: Mutex<Vec<Completion<RouteOutcome>>>,
    pub cancel_all_calls: AtomicUsize,
}

impl MockRouting {
    /// Resolve the oldest unanswered request.
    pub fn resolve_next(&self, outcome: RouteOutcome) -> bool {
        match pop_front(&self.pending) {
            Some(done) => {
                done.complete(outcome);
                true
            }
            None => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl RoutingService for MockRouting {
    fn request(&self, request: RouteRequest, done: Completion<RouteOutcome>) {
        self.requests.lock().push(request);
        self.pending.lock().push(done);
    }

    fn cancel_all(&self) {
        self.cancel_all_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct MockSpeech {
    pub cues: Mutex<Vec<VoiceCue>>,
    pending: Mutex<Vec<(VoiceCue, Completion<SpeechResult>)>>,
    pub cleaned: Mutex<Vec<String>>,
    pub cancel_calls: AtomicUsize,
}

impl MockSpeech {
    /// Finish the oldest synthesis with an audio file.
    pub fn finish_next(&self) -> bool {
        match pop_front(&self.pending) {
            Some((cue, done)) => {
                let file = PathBuf::from(format!("/tmp/{}.mp3", cue.instruction_id));
                done.complete(Ok(SpeechAnnouncement::synthesized(&cue, file)));
                true
            }
            None => false,
        }
    }

    /// Fail the oldest synthesis.
    pub fn fail_next(&self, message: &str) -> bool {
        match pop_front(&self.pending) {
            Some((cue, done)) => {
                done.complete(Err(crate::voice::SpeechError {
                    message: message.to_string(),
                    fallback: SpeechAnnouncement::fallback(&cue),
                }));
                true
            }
            None => false,
        }
    }

    pub fn cue_ids(&self) -> Vec<String> {
        self.cues
            .lock()
            .iter()
            .map(|cue| cue.instruction_id.clone())
            .collect()
    }
}

impl SpeechSynthesizer for MockSpeech {
    fn synthesize(&self, cue: VoiceCue, done: Completion<SpeechResult>) {
        self.cues.lock().push(cue.clone());
        self.pending.lock().push((cue, done));
    }

    fn clean(&self, announcement: &SpeechAnnouncement) {
        self.cleaned.lock().push(announcement.id.clone());
    }

    fn cancel(&self) {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct MockPlayer {
    pub played: Mutex<Vec<SpeechAnnouncement>>,
    pending: Mutex<Vec<(SpeechAnnouncement, Completion<SpeechAnnouncement>)>>,
    pub volumes: Mutex<Vec<f32>>,
    pub shutdown_calls: AtomicUsize,
}

impl MockPlayer {
    pub fn finish_next(&self) -> bool {
        match pop_front(&self.pending) {
            Some((announcement, done)) => {
                done.complete(announcement);
                true
            }
            None => false,
        }
    }

    pub fn last_volume(&self) -> Option<f32> {
        self.volumes.lock().last().copied()
    }
}

impl AnnouncementPlayer for MockPlayer {
    fn play(&self, announcement: SpeechAnnouncement, done: Completion<SpeechAnnouncement>) {
        self.played.lock().push(announcement.clone());
        self.pending.lock().push((announcement, done));
    }

    fn set_volume(&self, volume: f32) {
        self.volumes.lock().push(volume);
    }

    fn shutdown(&self) {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct MockSurface {
    pub styles: Mutex<Vec<String>>,
    style_done: Mutex<Vec<Completion<Result<(), String>>>>,
    pub commands: Mutex<Vec<RenderCommand>>,
    pub indicators: Mutex<Vec<LocationFix>>,
    pub frames: Mutex<Vec<CameraFrame>>,
    animations: Mutex<Vec<Completion<()>>>,
    pub animated: Mutex<Vec<(CameraFrame, Duration)>>,
    pub release_calls: AtomicUsize,
}

impl MockSurface {
    pub fn finish_style(&self, result: Result<(), String>) -> bool {
        match pop_front(&self.style_done) {
            Some(done) => {
                done.complete(result);
                true
            }
            None => false,
        }
    }

    pub fn finish_animation(&self) -> bool {
        match pop_front(&self.animations) {
            Some(done) => {
                done.complete(());
                true
            }
            None => false,
        }
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .lock()
            .iter()
            .filter(|command| matches!(command, RenderCommand::DrawRoutes { .. }))
            .count()
    }

    pub fn clear_count(&self) -> usize {
        self.commands
            .lock()
            .iter()
            .filter(|command| matches!(command, RenderCommand::ClearRoutes))
            .count()
    }

    pub fn arrow_count(&self) -> usize {
        self.commands
            .lock()
            .iter()
            .filter(|command| matches!(command, RenderCommand::Arrow(_)))
            .count()
    }
}

impl MapSurface for MockSurface {
    fn load_style(&self, style_uri: &str, done: Completion<Result<(), String>>) {
        self.styles.lock().push(style_uri.to_string());
        self.style_done.lock().push(done);
    }

    fn submit(&self, command: RenderCommand) {
        self.commands.lock().push(command);
    }

    fn update_location_indicator(&self, fix: &LocationFix) {
        self.indicators.lock().push(fix.clone());
    }

    fn apply_camera(&self, frame: &CameraFrame) {
        self.frames.lock().push(frame.clone());
    }

    fn animate_camera(&self, frame: &CameraFrame, duration: Duration, done: Completion<()>) {
        self.animated.lock().push((frame.clone(), duration));
        self.animations.lock().push(done);
    }

    fn release(&self) {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct MockPermission(AtomicBool);

impl MockPermission {
    pub fn new(granted: bool) -> Self {
        Self(AtomicBool::new(granted))
    }

    pub fn set(&self, granted: bool) {
        self.0.store(granted, Ordering::SeqCst);
    }
}

impl PermissionSource for MockPermission {
    fn has_fine_or_coarse_location(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One provider start seen by [`MockProviders`].
#[derive(Debug, Clone)]
pub struct ProviderStart {
    pub name: &'static str,
    pub route_id: Option<String>,
    pub sink: FixSink,
}

#[derive(Debug, Default)]
struct ProviderLog {
    starts: Mutex<Vec<ProviderStart>>,
    stops: AtomicUsize,
}

/// Providers that deliver nothing on their own. Tests push fixes through
/// the recorded sinks.
#[derive(Debug, Default)]
pub struct MockProviders {
    log: Arc<ProviderLog>,
}

impl MockProviders {
    pub fn starts(&self) -> Vec<ProviderStart> {
        self.log.starts.lock().clone()
    }

    pub fn stop_count(&self) -> usize {
        self.log.stops.load(Ordering::SeqCst)
    }

    /// Sink of the most recently started provider.
    pub fn latest_sink(&self) -> Option<FixSink> {
        self.log.starts.lock().last().map(|start| start.sink.clone())
    }
}

struct MockProvider {
    name: &'static str,
    route_id: Option<String>,
    log: Arc<ProviderLog>,
    running: bool,
}

impl LocationProvider for MockProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn start(&mut self, sink: FixSink) -> anyhow::Result<()> {
        self.running = true;
        self.log.starts.lock().push(ProviderStart {
            name: self.name,
            route_id: self.route_id.clone(),
            sink,
        });
        Ok(())
    }

    fn stop(&mut self) {
        if std::mem::take(&mut self.running) {
            self.log.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl LocationProviderFactory for MockProviders {
    fn real(&self) -> Box<dyn LocationProvider> {
        Box::new(MockProvider {
            name: "mock-gps",
            route_id: None,
            log: Arc::clone(&self.log),
            running: false,
        })
    }

    fn simulated(&self, route: Arc<RouteCandidate>) -> Box<dyn LocationProvider> {
        Box::new(MockProvider {
            name: "mock-replay",
            route_id: Some(route.id.clone()),
            log: Arc::clone(&self.log),
            running: false,
        })
    }
}
