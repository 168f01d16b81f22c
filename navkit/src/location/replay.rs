// SPDX-License-Identifier: GPL-3.0-only
//! Simulated location provider that drives along a route

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use navkit_shared::models::geo::initial_bearing;
use navkit_shared::{Position, RouteCandidate};
use tokio::task::JoinHandle;

use super::{FixSink, LocationProvider};
use crate::config::ReplayConfig;

/// Used when the route carries no duration (~50 km/h).
const FALLBACK_SPEED_MPS: f64 = 13.9;

#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySettings {
    pub tick: Duration,
    pub speed_multiplier: f64,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(1000),
            speed_multiplier: 1.0,
        }
    }
}

impl From<&ReplayConfig> for ReplaySettings {
    fn from(config: &ReplayConfig) -> Self {
        Self {
            tick: Duration::from_millis(config.tick_ms.max(1)),
            speed_multiplier: if config.speed_multiplier > 0.0 {
                config.speed_multiplier
            } else {
                1.0
            },
        }
    }
}

/// Positions every `step_m` meters along `route`, ending exactly on the
/// destination. Each carries the bearing of its segment and `speed`.
#[must_use]
pub fn sample_route(route: &RouteCandidate, step_m: f64, speed: f64) -> Vec<Position> {
    let length = route.geometry_length();
    if route.geometry.len() < 2 || step_m <= 0.0 {
        return route
            .origin()
            .map(|origin| vec![Position::new(*origin).with_speed(0.0)])
            .unwrap_or_default();
    }

    let mut positions = Vec::new();
    let mut distance: f64 = 0.0;
    loop {
        let clamped = distance.min(length);
        if let (Some(coordinate), Some(segment)) =
            (route.coordinate_at(clamped), route.segment_at(clamped))
        {
            let bearing = initial_bearing(&route.geometry[segment], &route.geometry[segment + 1]);
            positions.push(
                Position::new(coordinate)
                    .with_bearing(bearing)
                    .with_speed(speed),
            );
        }
        if clamped >= length {
            break;
        }
        distance += step_m;
    }
    positions
}

pub struct ReplayProvider {
    route: Arc<RouteCandidate>,
    settings: ReplaySettings,
    task: Option<JoinHandle<()>>,
}

impl ReplayProvider {
    #[must_use]
    pub fn new(route: Arc<RouteCandidate>, settings: ReplaySettings) -> Self {
        Self {
            route,
            settings,
            task: None,
        }
    }

    fn speed(&self) -> f64 {
        self.route.average_speed().unwrap_or(FALLBACK_SPEED_MPS) * self.settings.speed_multiplier
    }
}

impl LocationProvider for ReplayProvider {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn start(&mut self, sink: FixSink) -> anyhow::Result<()> {
        self.stop();

        let speed = self.speed();
        let step = speed * self.settings.tick.as_secs_f64();
        let positions = sample_route(&self.route, step, speed);
        let tick = self.settings.tick;
        info!(
            "Replaying route {} at {speed:.1} m/s ({} positions)",
            self.route.id,
            positions.len()
        );

        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            for position in positions {
                interval.tick().await;
                if !sink.push(position) {
                    debug!("Replay stopped: session gone");
                    return;
                }
            }
            sink.lost("replay finished");
        }));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Replay provider stopped");
        }
    }
}

impl Drop for ReplayProvider {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::events::{SessionEvent, SessionHandle};
    use crate::test_support::straight_route;
    use tokio::sync::mpsc;

    #[test]
    fn test_sample_route_ends_on_destination() {
        let route = straight_route("r1");
        let positions = sample_route(&route, 500.0, 10.0);
        let length = route.geometry_length();

        assert_eq!(positions.len(), (length / 500.0).ceil() as usize + 1);
        assert_eq!(positions[0].coordinate, route.geometry[0]);
        let last = positions.last().unwrap();
        assert!(last.coordinate.distance_to(route.destination().unwrap()) < 0.01);
        assert!(positions.iter().all(|p| p.speed == Some(10.0)));
        assert!((positions[0].bearing.unwrap() - 90.0).abs() < 0.1);
    }

    #[test]
    fn test_settings_from_config_guards_zero_values() {
        let settings = ReplaySettings::from(&ReplayConfig {
            tick_ms: 0,
            speed_multiplier: 0.0,
        });
        assert_eq!(settings.tick, Duration::from_millis(1));
        assert!((settings.speed_multiplier - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_emits_fixes_then_reports_completion() {
        let route = Arc::new(straight_route("r1"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut provider = ReplayProvider::new(
            route,
            ReplaySettings {
                tick: Duration::from_millis(100),
                speed_multiplier: 100.0,
            },
        );
        provider.start(FixSink::new(SessionHandle::new(tx), 3)).unwrap();

        let mut fixes = 0;
        loop {
            match rx.recv().await.unwrap() {
                SessionEvent::LocationFix { epoch, .. } => {
                    assert_eq!(epoch, 3);
                    fixes += 1;
                }
                SessionEvent::ProviderLost { epoch, reason } => {
                    assert_eq!(epoch, 3);
                    assert_eq!(reason, "replay finished");
                    break;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert!(fixes >= 2);
    }
}
