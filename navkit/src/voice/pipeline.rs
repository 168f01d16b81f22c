// SPDX-License-Identifier: GPL-3.0-only
use log::{debug, warn};
use navkit_shared::VoiceCue;
use serde::Serialize;

use super::{SpeechAnnouncement, SpeechResult};
use crate::error::NavError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VoiceState {
    #[default]
    Idle,
    Synthesizing,
    Playing,
}

/// What the coordinator should do with a synthesis result.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceAction {
    Play(SpeechAnnouncement),
    /// Stale result: release it without playing
    Discard(SpeechAnnouncement),
}

/// Single-flight voice state. At most one announcement is synthesizing or
/// playing; cues arriving meanwhile are dropped.
#[derive(Debug, Default)]
pub struct VoicePipeline {
    state: VoiceState,
    epoch: u64,
    muted: bool,
    current: Option<SpeechAnnouncement>,
}

impl VoicePipeline {
    #[must_use]
    pub fn new(muted: bool) -> Self {
        Self {
            muted,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn state(&self) -> VoiceState {
        self.state
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    #[must_use]
    pub fn volume(&self) -> f32 {
        if self.muted { 0.0 } else { 1.0 }
    }

    /// Returns the new volume. Pipeline state is untouched.
    pub fn set_muted(&mut self, muted: bool) -> f32 {
        self.muted = muted;
        self.volume()
    }

    /// Accept a cue for synthesis. Returns the epoch to tag the synthesis
    /// with, or `None` when the cue is dropped.
    pub fn on_cue(&mut self, cue: &VoiceCue) -> Option<u64> {
        if self.state != VoiceState::Idle {
            debug!(
                "Dropping voice cue {} while {:?}: {}",
                cue.instruction_id, self.state, cue.text
            );
            return None;
        }
        self.state = VoiceState::Synthesizing;
        Some(self.epoch)
    }

    pub fn on_synthesized(&mut self, epoch: u64, result: SpeechResult) -> VoiceAction {
        let announcement = match result {
            Ok(announcement) => announcement,
            Err(e) => {
                if epoch == self.epoch {
                    warn!("{}", NavError::SynthesisFailed(e.message.clone()));
                }
                e.fallback
            }
        };
        if epoch != self.epoch || self.state != VoiceState::Synthesizing {
            debug!("Discarding stale announcement {}", announcement.id);
            return VoiceAction::Discard(announcement);
        }
        self.state = VoiceState::Playing;
        self.current = Some(announcement.clone());
        VoiceAction::Play(announcement)
    }

    /// Returns whether the caller still has to release the announcement.
    /// An older epoch means [`VoicePipeline::shutdown`] already handed it out.
    pub fn on_playback_finished(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch {
            return false;
        }
        if self.state == VoiceState::Playing {
            self.state = VoiceState::Idle;
            self.current = None;
        }
        true
    }

    /// Invalidate everything in flight. Returns the announcement that was
    /// playing so its resources can be released.
    pub fn shutdown(&mut self) -> Option<SpeechAnnouncement> {
        self.epoch += 1;
        self.state = VoiceState::Idle;
        self.current.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::SpeechError;
    use std::path::PathBuf;

    fn cue(id: &str) -> VoiceCue {
        VoiceCue {
            instruction_id: id.to_string(),
            text: format!("cue {id}"),
            ssml: None,
            maneuver_index: 1,
            trigger_distance: 100.0,
        }
    }

    #[test]
    fn test_synthesize_play_finish() {
        let mut voice = VoicePipeline::new(false);
        let epoch = voice.on_cue(&cue("a")).unwrap();
        assert_eq!(voice.state(), VoiceState::Synthesizing);

        let announcement = SpeechAnnouncement::synthesized(&cue("a"), PathBuf::from("/tmp/a.mp3"));
        let action = voice.on_synthesized(epoch, Ok(announcement.clone()));
        assert_eq!(action, VoiceAction::Play(announcement));
        assert_eq!(voice.state(), VoiceState::Playing);

        assert!(voice.on_playback_finished(epoch));
        assert_eq!(voice.state(), VoiceState::Idle);
    }

    #[test]
    fn test_cue_dropped_while_busy() {
        let mut voice = VoicePipeline::new(false);
        let epoch = voice.on_cue(&cue("a")).unwrap();
        assert!(voice.on_cue(&cue("b")).is_none());

        voice.on_synthesized(epoch, Ok(SpeechAnnouncement::fallback(&cue("a"))));
        assert!(voice.on_cue(&cue("c")).is_none());
        assert_eq!(voice.state(), VoiceState::Playing);
    }

    #[test]
    fn test_failure_plays_fallback() {
        let mut voice = VoicePipeline::new(false);
        let epoch = voice.on_cue(&cue("a")).unwrap();
        let action = voice.on_synthesized(
            epoch,
            Err(SpeechError {
                message: "HTTP 500".to_string(),
                fallback: SpeechAnnouncement::fallback(&cue("a")),
            }),
        );
        match action {
            VoiceAction::Play(announcement) => assert!(announcement.is_fallback()),
            other => panic!("unexpected action {other:?}"),
        }
        assert_eq!(voice.state(), VoiceState::Playing);
    }

    #[test]
    fn test_mute_keeps_state() {
        let mut voice = VoicePipeline::new(true);
        assert!(voice.volume().abs() < f32::EPSILON);
        voice.on_cue(&cue("a"));
        assert!((voice.set_muted(false) - 1.0).abs() < f32::EPSILON);
        assert_eq!(voice.state(), VoiceState::Synthesizing);
        assert!(voice.set_muted(true).abs() < f32::EPSILON);
        assert_eq!(voice.state(), VoiceState::Synthesizing);
    }

    #[test]
    fn test_late_results_after_shutdown_are_discarded() {
        let mut voice = VoicePipeline::new(false);
        let epoch = voice.on_cue(&cue("a")).unwrap();
        assert!(voice.shutdown().is_none());

        let announcement = SpeechAnnouncement::synthesized(&cue("a"), PathBuf::from("/tmp/a.mp3"));
        assert_eq!(
            voice.on_synthesized(epoch, Ok(announcement.clone())),
            VoiceAction::Discard(announcement)
        );
        assert!(!voice.on_playback_finished(epoch));
        assert_eq!(voice.state(), VoiceState::Idle);
    }

    #[test]
    fn test_shutdown_returns_playing_announcement() {
        let mut voice = VoicePipeline::new(false);
        let epoch = voice.on_cue(&cue("a")).unwrap();
        voice.on_synthesized(epoch, Ok(SpeechAnnouncement::fallback(&cue("a"))));
        assert_eq!(voice.shutdown().map(|a| a.id), Some("a".to_string()));
        assert_eq!(voice.state(), VoiceState::Idle);
        // Released by shutdown, the late completion must not release it again
        assert!(!voice.on_playback_finished(epoch));
    }
}
