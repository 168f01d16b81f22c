// SPDX-License-Identifier: GPL-3.0-only
//! Location providers and fix normalization
//!
//! A provider pushes raw [`Position`]s into a [`FixSink`]. Every provider
//! start opens a new epoch, and the sink tags each fix with it so the
//! coordinator can drop fixes from a provider it already replaced.

pub mod gpsd;
pub mod pipeline;
pub mod replay;

use std::sync::Arc;

use navkit_shared::{Position, RouteCandidate};
use serde::Serialize;

use crate::config::NavigationConfig;
use crate::session::events::{SessionEvent, SessionHandle};

pub use gpsd::GpsdProvider;
pub use pipeline::LocationPipeline;
pub use replay::ReplayProvider;

/// A normalized fix: the raw reading plus its map-matched counterpart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationFix {
    pub raw: Position,
    pub enhanced: Position,
    /// Route vertices passed since the previous matched fix
    pub key_points: Vec<Position>,
}

impl LocationFix {
    /// A fix with no route to match against.
    #[must_use]
    pub fn unmatched(raw: Position) -> Self {
        Self {
            enhanced: raw.clone(),
            raw,
            key_points: Vec::new(),
        }
    }
}

/// Where a provider delivers its readings.
#[derive(Debug, Clone)]
pub struct FixSink {
    handle: SessionHandle,
    epoch: u64,
}

impl FixSink {
    #[must_use]
    pub fn new(handle: SessionHandle, epoch: u64) -> Self {
        Self { handle, epoch }
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Deliver a reading. Returns `false` once nobody is listening, which
    /// tells the provider to stop.
    pub fn push(&self, position: Position) -> bool {
        self.handle.post(SessionEvent::LocationFix {
            epoch: self.epoch,
            position,
        })
    }

    /// Report that no more readings will come from this provider.
    pub fn lost(&self, reason: impl Into<String>) {
        self.handle.post(SessionEvent::ProviderLost {
            epoch: self.epoch,
            reason: reason.into(),
        });
    }
}

pub trait LocationProvider: Send {
    fn name(&self) -> &'static str;

    /// Begin delivering fixes into `sink`.
    ///
    /// # Errors
    /// Returns an error if the provider cannot be started at all. Failures
    /// after a successful start are reported through [`FixSink::lost`].
    fn start(&mut self, sink: FixSink) -> anyhow::Result<()>;

    /// Stop delivering. Idempotent.
    fn stop(&mut self);
}

/// Builds the provider for each guidance mode.
pub trait LocationProviderFactory: Send + Sync {
    fn real(&self) -> Box<dyn LocationProvider>;
    fn simulated(&self, route: Arc<RouteCandidate>) -> Box<dyn LocationProvider>;
}

/// gpsd for real guidance, route replay for simulated guidance.
#[derive(Debug, Clone)]
pub struct DefaultProviderFactory {
    gpsd_addr: String,
    replay: replay::ReplaySettings,
}

impl DefaultProviderFactory {
    #[must_use]
    pub fn from_config(config: &NavigationConfig) -> Self {
        Self {
            gpsd_addr: config.location.gpsd_addr.clone(),
            replay: replay::ReplaySettings::from(&config.replay),
        }
    }
}

impl LocationProviderFactory for DefaultProviderFactory {
    fn real(&self) -> Box<dyn LocationProvider> {
        Box::new(GpsdProvider::new(self.gpsd_addr.clone()))
    }

    fn simulated(&self, route: Arc<RouteCandidate>) -> Box<dyn LocationProvider> {
        Box::new(ReplayProvider::new(route, self.replay.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navkit_shared::Coordinate;
    use tokio::sync::mpsc;

    #[test]
    fn test_sink_tags_epoch() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = FixSink::new(SessionHandle::new(tx), 4);

        assert!(sink.push(Position::new(Coordinate::new(2.0, 48.0))));
        sink.lost("gone");

        match rx.try_recv().unwrap() {
            SessionEvent::LocationFix { epoch, position } => {
                assert_eq!(epoch, 4);
                assert!((position.latitude() - 48.0).abs() < f64::EPSILON);
            }
            other => panic!("unexpected event {other:?}"),
        }
        match rx.try_recv().unwrap() {
            SessionEvent::ProviderLost { epoch, reason } => {
                assert_eq!(epoch, 4);
                assert_eq!(reason, "gone");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_unmatched_fix_mirrors_raw() {
        let raw = Position::new(Coordinate::new(2.0, 48.0)).with_bearing(90.0);
        let fix = LocationFix::unmatched(raw.clone());
        assert_eq!(fix.enhanced, raw);
        assert!(fix.key_points.is_empty());
    }
}
