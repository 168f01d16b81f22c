// SPDX-License-Identifier: GPL-3.0-only
//! Spoken guidance: synthesis, playback and the single-flight pipeline

pub mod client;
pub mod pipeline;

use std::path::PathBuf;

use navkit_shared::VoiceCue;
use serde::Serialize;

use crate::session::events::Completion;

pub use client::VoiceClient;
pub use pipeline::{VoiceAction, VoicePipeline, VoiceState};

/// Something the player can speak.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechAnnouncement {
    pub id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssml: Option<String>,
    /// Synthesized audio; `None` for a text-only fallback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl SpeechAnnouncement {
    #[must_use]
    pub fn synthesized(cue: &VoiceCue, file: PathBuf) -> Self {
        Self {
            id: cue.instruction_id.clone(),
            text: cue.text.clone(),
            ssml: cue.ssml.clone(),
            file: Some(file),
        }
    }

    /// Text-only announcement used when synthesis fails.
    #[must_use]
    pub fn fallback(cue: &VoiceCue) -> Self {
        Self {
            id: cue.instruction_id.clone(),
            text: cue.text.clone(),
            ssml: cue.ssml.clone(),
            file: None,
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.file.is_none()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct SpeechError {
    pub message: String,
    /// Still playable in place of the failed synthesis
    pub fallback: SpeechAnnouncement,
}

pub type SpeechResult = Result<SpeechAnnouncement, SpeechError>;

pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, cue: VoiceCue, done: Completion<SpeechResult>);
    /// Release resources held by a finished announcement.
    fn clean(&self, announcement: &SpeechAnnouncement);
    /// Abort in-flight synthesis.
    fn cancel(&self);
}

pub trait AnnouncementPlayer: Send + Sync {
    /// Play `announcement`; `done` gets it back when playback ends.
    fn play(&self, announcement: SpeechAnnouncement, done: Completion<SpeechAnnouncement>);
    /// 0.0 (muted) to 1.0
    fn set_volume(&self, volume: f32);
    fn shutdown(&self);
}
