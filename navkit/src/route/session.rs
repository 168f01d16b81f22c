// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;

use log::debug;
use navkit_shared::RouteCandidate;

use crate::error::NavError;

/// The accepted route plus the alternatives returned with it.
#[derive(Debug, Clone)]
pub struct ActiveRoutes {
    /// Generation of the request that produced these routes
    pub generation: u64,
    pub primary: Arc<RouteCandidate>,
    pub alternatives: Vec<Arc<RouteCandidate>>,
}

/// Request generations and the single active route.
///
/// Each request bumps the generation. Only a result carrying the pending
/// generation may be applied, everything else is stale.
#[derive(Debug, Default)]
pub struct RouteSession {
    generation: u64,
    pending: Option<u64>,
    active: Option<ActiveRoutes>,
}

impl RouteSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, superseding any pending one.
    pub fn begin_request(&mut self) -> u64 {
        self.generation += 1;
        if let Some(previous) = self.pending.replace(self.generation) {
            debug!("Route request {previous} superseded by {}", self.generation);
        }
        self.generation
    }

    /// # Errors
    /// Returns [`NavError::StaleAsyncResult`] unless `generation` is the
    /// pending request.
    pub fn check_current(&self, generation: u64) -> Result<(), NavError> {
        if self.pending == Some(generation) {
            Ok(())
        } else {
            Err(NavError::StaleAsyncResult {
                generation,
                current: self.pending,
            })
        }
    }

    /// Mark the pending request as answered.
    pub fn finish_request(&mut self, generation: u64) {
        if self.pending == Some(generation) {
            self.pending = None;
        }
    }

    /// Forget the pending request so its result arrives stale.
    pub fn cancel_pending(&mut self) -> Option<u64> {
        self.pending.take()
    }

    #[must_use]
    pub fn pending(&self) -> Option<u64> {
        self.pending
    }

    /// Make the first candidate active. Returns `None` for an empty list.
    pub fn accept(
        &mut self,
        generation: u64,
        candidates: Vec<RouteCandidate>,
    ) -> Option<&ActiveRoutes> {
        let mut candidates = candidates.into_iter().map(Arc::new);
        let primary = candidates.next()?;
        self.active = Some(ActiveRoutes {
            generation,
            primary,
            alternatives: candidates.collect(),
        });
        self.active.as_ref()
    }

    /// Drop the active route, returning it so the caller can clean up.
    pub fn clear(&mut self) -> Option<ActiveRoutes> {
        self.active.take()
    }

    #[must_use]
    pub fn active(&self) -> Option<&ActiveRoutes> {
        self.active.as_ref()
    }
}
