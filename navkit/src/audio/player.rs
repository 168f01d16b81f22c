// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use log::{debug, info, warn};

use super::decode::pcm_decode;
use super::output::{SharedVolume, attention_tone, play_samples};
use crate::session::events::Completion;
use crate::voice::{AnnouncementPlayer, SpeechAnnouncement};

const TONE_SAMPLE_RATE: u32 = 44_100;

/// Plays announcements on the default output device.
///
/// Decoding and the cpal stream run on the blocking pool so the session
/// task never waits on audio.
#[derive(Debug)]
pub struct AudioPlayer {
    volume: SharedVolume,
    stop: Arc<AtomicBool>,
}

impl AudioPlayer {
    #[must_use]
    pub fn new(muted: bool) -> Self {
        Self {
            volume: SharedVolume::new(if muted { 0.0 } else { 1.0 }),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn volume(&self) -> f32 {
        self.volume.get()
    }
}

fn play_announcement(
    announcement: &SpeechAnnouncement,
    volume: &SharedVolume,
    stop: &Arc<AtomicBool>,
) -> Result<()> {
    if let Some(file) = &announcement.file {
        let (pcm, sample_rate) = pcm_decode(file)?;
        info!("🔊 {}", announcement.text);
        return play_samples(&pcm, sample_rate, volume, stop);
    }
    info!("🔊 (text only) {}", announcement.text);
    play_samples(
        &attention_tone(TONE_SAMPLE_RATE),
        TONE_SAMPLE_RATE,
        volume,
        stop,
    )
}

impl AnnouncementPlayer for AudioPlayer {
    fn play(&self, announcement: SpeechAnnouncement, done: Completion<SpeechAnnouncement>) {
        if self.stop.load(Ordering::Acquire) {
            debug!("Player shut down, skipping {}", announcement.id);
            done.complete(announcement);
            return;
        }

        let volume = self.volume.clone();
        let stop = Arc::clone(&self.stop);
        tokio::spawn(async move {
            let playing = announcement.clone();
            let result =
                tokio::task::spawn_blocking(move || play_announcement(&playing, &volume, &stop))
                    .await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Announcement playback failed: {e:#}"),
                Err(e) => warn!("Playback task failed: {e}"),
            }
            done.complete(announcement);
        });
    }

    fn set_volume(&self, volume: f32) {
        self.volume.set(volume);
    }

    fn shutdown(&self) {
        if !self.stop.swap(true, Ordering::AcqRel) {
            debug!("Audio player shut down");
        }
    }
}
