// SPDX-License-Identifier: GPL-3.0-only
//! HTTP speech synthesis against a Mapbox voice compatible API

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use navkit_shared::VoiceCue;
use parking_lot::Mutex;
use reqwest::Url;
use tokio::task::AbortHandle;

use super::{SpeechAnnouncement, SpeechError, SpeechResult, SpeechSynthesizer};
use crate::config::VoiceConfig;
use crate::session::events::Completion;

/// Request parameters, cloned into each synthesis task.
#[derive(Clone)]
struct Speaker {
    client: reqwest::Client,
    base_url: Url,
    access_token: String,
    language: String,
    cache_dir: PathBuf,
}

pub struct VoiceClient {
    speaker: Speaker,
    in_flight: Mutex<Vec<AbortHandle>>,
}

impl VoiceClient {
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: &VoiceConfig, access_token: String, language: String) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid voice base URL '{}'", config.base_url))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            speaker: Speaker {
                client,
                base_url,
                access_token,
                language,
                cache_dir: config.resolved_cache_dir(),
            },
            in_flight: Mutex::new(Vec::new()),
        })
    }

    /// Synthesize `cue` and wait for the result.
    pub async fn speak(&self, cue: &VoiceCue) -> SpeechResult {
        self.speaker.speak(cue).await
    }
}

impl Speaker {
    fn speak_url(&self, text: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("Voice base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["voice", "v1", "speak", text]);
        Ok(url)
    }

    async fn fetch(&self, cue: &VoiceCue) -> Result<PathBuf> {
        let (text, text_type) = match &cue.ssml {
            Some(ssml) => (ssml.as_str(), "ssml"),
            None => (cue.text.as_str(), "text"),
        };
        let url = self.speak_url(text)?;

        let response = self
            .client
            .get(url)
            .query(&[
                ("textType", text_type),
                ("language", self.language.as_str()),
                ("outputFormat", "mp3"),
                ("access_token", self.access_token.as_str()),
            ])
            .send()
            .await
            .context("Voice request failed")?;
        if !response.status().is_success() {
            anyhow::bail!("Voice API returned {}", response.status());
        }
        let audio = response
            .bytes()
            .await
            .context("Failed to read voice response")?;

        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.cache_dir.display()))?;
        let path = self
            .cache_dir
            .join(format!("{}.mp3", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, &audio)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Synthesized '{}' into {}", cue.text, path.display());
        Ok(path)
    }

    async fn speak(&self, cue: &VoiceCue) -> SpeechResult {
        match self.fetch(cue).await {
            Ok(path) => Ok(SpeechAnnouncement::synthesized(cue, path)),
            Err(e) => Err(SpeechError {
                message: format!("{e:#}"),
                fallback: SpeechAnnouncement::fallback(cue),
            }),
        }
    }
}

fn remove_audio(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {e}", path.display()),
    }
}

impl SpeechSynthesizer for VoiceClient {
    fn synthesize(&self, cue: VoiceCue, done: Completion<SpeechResult>) {
        let speaker = self.speaker.clone();
        let task = tokio::spawn(async move {
            let result = speaker.speak(&cue).await;
            done.complete(result);
        });
        let mut in_flight = self.in_flight.lock();
        in_flight.retain(|handle| !handle.is_finished());
        in_flight.push(task.abort_handle());
    }

    fn clean(&self, announcement: &SpeechAnnouncement) {
        if let Some(file) = &announcement.file {
            remove_audio(file);
        }
    }

    fn cancel(&self) {
        let handles: Vec<_> = self.in_flight.lock().drain(..).collect();
        if !handles.is_empty() {
            info!("Canceling {} speech request(s)", handles.len());
        }
        for handle in handles {
            handle.abort();
        }
    }
}
