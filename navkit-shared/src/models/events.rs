// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};

use crate::models::progress::RouteProgress;

/// Events the session emits to its host.
///
/// Serialized as `{"event": "location_changed", ...}` so a host can forward
/// them verbatim to a UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    LocationChanged {
        latitude: f64,
        longitude: f64,
    },
    RouteProgressChanged {
        distance_traveled: f64,
        duration_remaining: f64,
        fraction_traveled: f64,
        distance_remaining: f64,
    },
    Arrived {
        end_of_route_feedback: bool,
    },
    NavigationCancelled,
    Error {
        message: String,
    },
}

impl HostEvent {
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        HostEvent::Error {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            HostEvent::LocationChanged { .. } => "location_changed",
            HostEvent::RouteProgressChanged { .. } => "route_progress_changed",
            HostEvent::Arrived { .. } => "arrived",
            HostEvent::NavigationCancelled => "navigation_cancelled",
            HostEvent::Error { .. } => "error",
        }
    }
}

impl From<&RouteProgress> for HostEvent {
    fn from(progress: &RouteProgress) -> Self {
        HostEvent::RouteProgressChanged {
            distance_traveled: progress.distance_traveled,
            duration_remaining: progress.duration_remaining,
            fraction_traveled: progress.fraction_traveled,
            distance_remaining: progress.distance_remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_event_json_shape() {
        let event = HostEvent::LocationChanged {
            latitude: 48.5,
            longitude: 2.4,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "location_changed");
        assert_eq!(json["latitude"], 48.5);

        let cancelled = serde_json::to_value(HostEvent::NavigationCancelled).unwrap();
        assert_eq!(cancelled, serde_json::json!({"event": "navigation_cancelled"}));
    }

    #[test]
    fn test_progress_conversion() {
        let progress = RouteProgress::along(100.0, 400.0, 40.0);
        match HostEvent::from(&progress) {
            HostEvent::RouteProgressChanged {
                distance_remaining,
                fraction_traveled,
                ..
            } => {
                assert!((distance_remaining - 300.0).abs() < 1e-9);
                assert!((fraction_traveled - 0.25).abs() < 1e-9);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(HostEvent::error("boom").event_name(), "error");
    }
}
