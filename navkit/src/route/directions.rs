// SPDX-License-Identifier: GPL-3.0-only
//! HTTP client for a Mapbox Directions v5 compatible routing API

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use navkit_shared::validation::validate_access_token;
use navkit_shared::{
    Coordinate, Maneuver, ManeuverKind, RouteCandidate, RouteLeg, RouteOutcome, RouteRequest,
    RouterFailure, VoiceCue,
};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::oneshot;

use super::RoutingService;
use crate::config::RoutingConfig;
use crate::session::events::Completion;

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    code: String,
    message: Option<String>,
    uuid: Option<String>,
    #[serde(default)]
    routes: Vec<ApiRoute>,
}

#[derive(Debug, Deserialize)]
struct ApiRoute {
    distance: f64,
    duration: f64,
    geometry: ApiGeometry,
    #[serde(default)]
    legs: Vec<ApiLeg>,
}

#[derive(Debug, Deserialize)]
struct ApiGeometry {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct ApiLeg {
    distance: f64,
    duration: f64,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    steps: Vec<ApiStep>,
}

#[derive(Debug, Deserialize)]
struct ApiStep {
    distance: f64,
    maneuver: ApiManeuver,
    #[serde(default, rename = "voiceInstructions")]
    voice_instructions: Vec<ApiVoiceInstruction>,
}

#[derive(Debug, Deserialize)]
struct ApiManeuver {
    location: [f64; 2],
    #[serde(rename = "type")]
    kind: String,
    modifier: Option<String>,
    #[serde(default)]
    instruction: String,
}

#[derive(Debug, Deserialize)]
struct ApiVoiceInstruction {
    #[serde(rename = "distanceAlongGeometry")]
    distance_along_geometry: f64,
    announcement: String,
    #[serde(rename = "ssmlAnnouncement")]
    ssml_announcement: Option<String>,
}

/// Parse a Directions response body into an outcome.
#[must_use]
pub fn parse_directions(body: &str) -> RouteOutcome {
    let response: DirectionsResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) => {
            return RouteOutcome::Failure(vec![
                RouterFailure::new(format!("Invalid directions response: {e}"))
                    .with_code("InvalidResponse"),
            ]);
        }
    };

    if response.code != "Ok" {
        let message = response
            .message
            .unwrap_or_else(|| "Routing service returned no route".to_string());
        return RouteOutcome::Failure(vec![RouterFailure::new(message).with_code(response.code)]);
    }

    let uuid = response
        .uuid
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let candidates = response
        .routes
        .into_iter()
        .enumerate()
        .map(|(index, route)| into_candidate(format!("{uuid}#{index}"), route))
        .collect();
    RouteOutcome::Ready(candidates)
}

fn into_candidate(id: String, route: ApiRoute) -> RouteCandidate {
    let geometry: Vec<Coordinate> = route
        .geometry
        .coordinates
        .iter()
        .map(|[longitude, latitude]| Coordinate::new(*longitude, *latitude))
        .collect();

    // Step distances are in API meters; rescale them onto the measured
    // geometry so maneuvers line up with projected positions.
    let measured = RouteCandidate::new("", geometry.clone(), Vec::new(), Vec::new(), 0.0, 0.0)
        .geometry_length();
    let scale = if route.distance > 0.0 && measured > 0.0 {
        measured / route.distance
    } else {
        1.0
    };

    let mut maneuvers = Vec::new();
    let mut cues: Vec<(usize, VoiceCue)> = Vec::new();
    let mut start = 0.0;
    for (leg_index, leg) in route.legs.iter().enumerate() {
        for (step_index, step) in leg.steps.iter().enumerate() {
            let index = maneuvers.len();
            let kind = step
                .maneuver
                .kind
                .replace(' ', "_")
                .parse::<ManeuverKind>()
                .unwrap_or_else(|_| ManeuverKind::Other(step.maneuver.kind.clone()));
            maneuvers.push(Maneuver {
                index,
                leg_index,
                location: Coordinate::new(step.maneuver.location[0], step.maneuver.location[1]),
                distance_from_start: start * scale,
                kind,
                modifier: step.maneuver.modifier.clone(),
                instruction: step.maneuver.instruction.clone(),
                voice_cues: Vec::new(),
            });

            // Instructions on a step announce the maneuver that ends it
            for (cue_index, instruction) in step.voice_instructions.iter().enumerate() {
                cues.push((
                    index + 1,
                    VoiceCue {
                        instruction_id: format!("{id}:{leg_index}:{step_index}:{cue_index}"),
                        text: instruction.announcement.clone(),
                        ssml: instruction.ssml_announcement.clone(),
                        maneuver_index: index + 1,
                        trigger_distance: instruction.distance_along_geometry * scale,
                    },
                ));
            }
            start += step.distance;
        }
    }

    let last = maneuvers.len().saturating_sub(1);
    for (target, mut cue) in cues {
        let target = target.min(last);
        cue.maneuver_index = target;
        if let Some(maneuver) = maneuvers.get_mut(target) {
            maneuver.voice_cues.push(cue);
        }
    }

    let legs = route
        .legs
        .iter()
        .map(|leg| RouteLeg {
            summary: leg.summary.clone(),
            distance: leg.distance,
            duration: leg.duration,
        })
        .collect();

    RouteCandidate::new(id, geometry, legs, maneuvers, route.distance, route.duration)
}

pub struct DirectionsClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    next_request: AtomicU64,
    in_flight: Arc<Mutex<HashMap<u64, oneshot::Sender<()>>>>,
}

impl DirectionsClient {
    /// # Errors
    /// Returns an error if no valid access token is configured or the HTTP
    /// client cannot be built.
    pub fn new(config: &RoutingConfig) -> Result<Self> {
        let access_token = config
            .resolved_access_token()
            .context("No routing access token: set routing.access_token or MAPBOX_ACCESS_TOKEN")?;
        validate_access_token(&access_token).context("Invalid routing access token")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token,
            next_request: AtomicU64::new(0),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn url(&self, request: &RouteRequest) -> String {
        let RouteRequest {
            origin,
            destination,
            profile,
            ..
        } = request;
        format!(
            "{}/directions/v5/mapbox/{profile}/{},{};{},{}",
            self.base_url,
            origin.longitude,
            origin.latitude,
            destination.longitude,
            destination.latitude
        )
    }

    /// Perform one request and wait for its outcome.
    pub async fn fetch(&self, request: &RouteRequest) -> RouteOutcome {
        fetch_outcome(
            self.client.clone(),
            self.url(request),
            self.access_token.clone(),
            request.clone(),
        )
        .await
    }
}

async fn fetch_body(
    client: &reqwest::Client,
    url: &str,
    access_token: &str,
    request: &RouteRequest,
) -> Result<(reqwest::StatusCode, String)> {
    let alternatives = request.alternatives.to_string();
    let response = client
        .get(url)
        .query(&[
            ("access_token", access_token),
            ("geometries", "geojson"),
            ("overview", "full"),
            ("steps", "true"),
            ("voice_instructions", "true"),
            ("voice_units", "metric"),
            ("language", request.language.as_str()),
            ("alternatives", alternatives.as_str()),
        ])
        .send()
        .await
        .context("Directions request failed")?;
    let status = response.status();
    let body = response
        .text()
        .await
        .context("Failed to read directions response")?;
    Ok((status, body))
}

async fn fetch_outcome(
    client: reqwest::Client,
    url: String,
    access_token: String,
    request: RouteRequest,
) -> RouteOutcome {
    debug!("Requesting route {} -> {}", request.origin, request.destination);
    match fetch_body(&client, &url, &access_token, &request).await {
        Ok((status, body)) if status.is_success() => parse_directions(&body),
        Ok((status, body)) => match parse_directions(&body) {
            RouteOutcome::Failure(reasons) => RouteOutcome::Failure(reasons),
            _ => RouteOutcome::Failure(vec![
                RouterFailure::new(format!("Directions API returned {status}"))
                    .with_code(status.as_str()),
            ]),
        },
        Err(e) => {
            warn!("{e:#}");
            RouteOutcome::Failure(vec![RouterFailure::new(format!("{e:#}"))])
        }
    }
}

impl RoutingService for DirectionsClient {
    fn request(&self, request: RouteRequest, done: Completion<RouteOutcome>) {
        let id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.in_flight.lock().insert(id, cancel_tx);

        let in_flight = Arc::clone(&self.in_flight);
        let client = self.client.clone();
        let url = self.url(&request);
        let access_token = self.access_token.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel_rx => RouteOutcome::Canceled,
                outcome = fetch_outcome(client, url, access_token, request) => outcome,
            };
            in_flight.lock().remove(&id);
            done.complete(outcome);
        });
    }

    fn cancel_all(&self) {
        let pending: Vec<_> = self.in_flight.lock().drain().collect();
        if !pending.is_empty() {
            info!("Canceling {} route request(s)", pending.len());
        }
        for (_, cancel) in pending {
            let _ = cancel.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"{
        "code": "Ok",
        "uuid": "abc",
        "routes": [{
            "distance": 1500.0,
            "duration": 120.0,
            "geometry": {"type": "LineString", "coordinates": [[2.00, 48.0], [2.01, 48.0], [2.02, 48.0]]},
            "legs": [{
                "distance": 1500.0,
                "duration": 120.0,
                "summary": "Rue de Test",
                "steps": [
                    {
                        "distance": 750.0,
                        "maneuver": {"location": [2.00, 48.0], "type": "depart", "instruction": "Head east"},
                        "voiceInstructions": [
                            {"distanceAlongGeometry": 750.0, "announcement": "Head east", "ssmlAnnouncement": "<speak>Head east</speak>"},
                            {"distanceAlongGeometry": 200.0, "announcement": "In 200 meters, turn left"}
                        ]
                    },
                    {
                        "distance": 750.0,
                        "maneuver": {"location": [2.01, 48.0], "type": "turn", "modifier": "left", "instruction": "Turn left"},
                        "voiceInstructions": [
                            {"distanceAlongGeometry": 50.0, "announcement": "You have arrived"}
                        ]
                    },
                    {
                        "distance": 0.0,
                        "maneuver": {"location": [2.02, 48.0], "type": "arrive", "instruction": "You have arrived"},
                        "voiceInstructions": []
                    }
                ]
            }]
        }]
    }"#;

    #[test]
    fn test_parse_routes_maneuvers_and_cues() {
        let RouteOutcome::Ready(candidates) = parse_directions(RESPONSE) else {
            panic!("expected routes");
        };
        assert_eq!(candidates.len(), 1);
        let route = &candidates[0];
        assert_eq!(route.id, "abc#0");
        assert_eq!(route.geometry.len(), 3);
        assert_eq!(route.legs[0].summary, "Rue de Test");
        assert_eq!(route.maneuvers.len(), 3);

        let turn = &route.maneuvers[1];
        assert_eq!(turn.kind, ManeuverKind::Turn);
        assert_eq!(turn.modifier.as_deref(), Some("left"));
        // Scaled onto the measured ~1488 m geometry
        assert!((turn.distance_from_start - route.geometry_length() / 2.0).abs() < 1.0);

        // Step 0 instructions announce maneuver 1
        assert_eq!(turn.voice_cues.len(), 2);
        assert_eq!(turn.voice_cues[0].ssml.as_deref(), Some("<speak>Head east</speak>"));
        assert!(turn.voice_cues.iter().all(|cue| cue.maneuver_index == 1));
        assert_eq!(route.maneuvers[2].voice_cues[0].text, "You have arrived");
        assert_eq!(route.maneuvers[2].kind, ManeuverKind::Arrive);
    }

    #[test]
    fn test_error_code_becomes_failure() {
        let body = r#"{"code": "NoRoute", "message": "No route found", "routes": []}"#;
        match parse_directions(body) {
            RouteOutcome::Failure(reasons) => {
                assert_eq!(reasons.len(), 1);
                assert_eq!(reasons[0].code.as_deref(), Some("NoRoute"));
                assert_eq!(reasons[0].message, "No route found");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(matches!(
            parse_directions("<html>"),
            RouteOutcome::Failure(_)
        ));
    }

    #[test]
    fn test_request_url() {
        let client = DirectionsClient::new(&RoutingConfig {
            base_url: "https://api.example.com/".to_string(),
            access_token: Some("pk.test".to_string()),
            ..RoutingConfig::default()
        })
        .unwrap();
        let request = RouteRequest {
            origin: Coordinate::new(2.450_804_8, 48.569_198_1),
            destination: Coordinate::new(2.300_946, 48.606_716),
            profile: navkit_shared::RoutingProfile::DrivingTraffic,
            language: "fr".to_string(),
            alternatives: true,
        };
        assert_eq!(
            client.url(&request),
            "https://api.example.com/directions/v5/mapbox/driving-traffic/2.4508048,48.5691981;2.300946,48.606716"
        );
    }

    #[tokio::test]
    async fn test_cancel_all_completes_with_canceled() {
        let client = DirectionsClient::new(&RoutingConfig {
            // Nothing listens here; the request hangs until the timeout
            base_url: "http://10.255.255.1:9".to_string(),
            access_token: Some("pk.test".to_string()),
            ..RoutingConfig::default()
        })
        .unwrap();
        let (tx, rx) = oneshot::channel();
        client.request(
            RouteRequest {
                origin: Coordinate::new(2.0, 48.0),
                destination: Coordinate::new(2.1, 48.0),
                profile: navkit_shared::RoutingProfile::Driving,
                language: "fr".to_string(),
                alternatives: false,
            },
            Completion::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        client.cancel_all();
        assert!(matches!(rx.await.unwrap(), RouteOutcome::Canceled));
    }
}
