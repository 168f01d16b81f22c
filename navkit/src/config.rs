// SPDX-License-Identifier: GPL-3.0-only
use anyhow::{Context, Result};
use log::{debug, warn};
use navkit_shared::RoutingProfile;
use navkit_shared::validation::{ValidationError, validate_language};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::camera::Orientation;

pub const ACCESS_TOKEN_ENV: &str = "MAPBOX_ACCESS_TOKEN";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub session: SessionConfig,
    pub routing: RoutingConfig,
    pub voice: VoiceConfig,
    pub camera: CameraConfig,
    pub location: LocationConfig,
    pub replay: ReplayConfig,
    pub guidance: GuidanceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub simulate: bool,
    pub mute: bool,
    pub end_of_route_feedback: bool,
    pub profile: RoutingProfile,
    pub language: String,
    pub map_style: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            simulate: false,
            mute: false,
            end_of_route_feedback: false,
            profile: RoutingProfile::default(),
            language: "fr".to_string(),
            map_style: "mapbox://styles/mapbox/streets-v12".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub base_url: String,
    /// Falls back to `MAPBOX_ACCESS_TOKEN` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    pub timeout_secs: u64,
    pub alternatives: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mapbox.com".to_string(),
            access_token: None,
            timeout_secs: 30,
            alternatives: true,
        }
    }
}

impl RoutingConfig {
    #[must_use]
    pub fn resolved_access_token(&self) -> Option<String> {
        self.access_token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .or_else(|| {
                std::env::var(ACCESS_TOKEN_ENV)
                    .ok()
                    .filter(|token| !token.trim().is_empty())
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub base_url: String,
    /// Where synthesized announcements are written before playback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mapbox.com".to_string(),
            cache_dir: None,
            timeout_secs: 15,
        }
    }
}

impl VoiceConfig {
    #[must_use]
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("navkit")
                .join("voice")
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub orientation: Orientation,
    pub pixel_density: f64,
    /// Viewport size in density-independent pixels
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub transition_ms: u64,
    pub following_zoom: f64,
    pub following_pitch: f64,
    pub max_overview_zoom: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            orientation: Orientation::Portrait,
            pixel_density: 1.0,
            viewport_width: 400.0,
            viewport_height: 800.0,
            transition_ms: 1500,
            following_zoom: 16.5,
            following_pitch: 45.0,
            max_overview_zoom: 16.35,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub gpsd_addr: String,
    pub permission_granted: bool,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            gpsd_addr: "127.0.0.1:2947".to_string(),
            permission_granted: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub tick_ms: u64,
    pub speed_multiplier: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            speed_multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidanceConfig {
    pub snap_threshold_m: f64,
    pub off_route_threshold_m: f64,
    pub off_route_fix_count: u32,
    pub arrival_threshold_m: f64,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            snap_threshold_m: 30.0,
            off_route_threshold_m: 50.0,
            off_route_fix_count: 3,
            arrival_threshold_m: 20.0,
        }
    }
}

/// Values given explicitly on the command line for this run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub simulate: Option<bool>,
    pub mute: Option<bool>,
    pub end_of_route_feedback: Option<bool>,
    pub orientation: Option<Orientation>,
    pub profile: Option<RoutingProfile>,
    pub language: Option<String>,
    pub gpsd_addr: Option<String>,
    pub replay_speed: Option<f64>,
    pub permission_granted: Option<bool>,
}

fn set_if_changed<T: PartialEq>(target: &mut T, value: Option<T>) -> bool {
    match value {
        Some(value) if *target != value => {
            *target = value;
            true
        }
        _ => false,
    }
}

impl NavigationConfig {
    /// Get the config file path
    fn get_config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".config")
            })
            .join("navkit");

        config_dir.join("navigation.toml")
    }

    /// Load configuration from disk
    #[must_use]
    pub fn load() -> Self {
        Self::load_from(&Self::get_config_path())
    }

    /// Load configuration from `config_path`, falling back to defaults.
    #[must_use]
    pub fn load_from(config_path: &Path) -> Self {
        match fs::read_to_string(config_path) {
            Ok(content) => match toml::from_str::<NavigationConfig>(&content) {
                Ok(config) => {
                    debug!("Loaded navigation config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    warn!(
                        "Failed to parse config file {}: {e}. Using defaults.",
                        config_path.display()
                    );
                    Self::default()
                }
            },
            Err(e) => {
                debug!(
                    "Config file {} not found or unreadable: {e}. Using defaults.",
                    config_path.display()
                );
                Self::default()
            }
        }
    }

    /// Save configuration to disk
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration directory cannot be created,
    /// serialization fails, or the file cannot be written.
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::get_config_path();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save configuration to `config_path`
    ///
    /// # Errors
    ///
    /// See [`NavigationConfig::save`].
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let toml_content = self.to_toml()?;
        fs::write(config_path, toml_content)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;

        debug!("Saved navigation config to {}", config_path.display());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// # Errors
    ///
    /// Returns a [`ValidationError`] for an unusable language tag.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_language(&self.session.language)
    }

    /// Apply command line overrides. Returns whether anything changed.
    pub fn apply_cli_overrides(&mut self, overrides: &CliOverrides) -> bool {
        let mut changed = false;
        changed |= set_if_changed(&mut self.session.simulate, overrides.simulate);
        changed |= set_if_changed(&mut self.session.mute, overrides.mute);
        changed |= set_if_changed(
            &mut self.session.end_of_route_feedback,
            overrides.end_of_route_feedback,
        );
        changed |= set_if_changed(&mut self.camera.orientation, overrides.orientation);
        changed |= set_if_changed(&mut self.session.profile, overrides.profile);
        changed |= set_if_changed(&mut self.session.language, overrides.language.clone());
        changed |= set_if_changed(&mut self.location.gpsd_addr, overrides.gpsd_addr.clone());
        changed |= set_if_changed(&mut self.replay.speed_multiplier, overrides.replay_speed);
        changed |= set_if_changed(
            &mut self.location.permission_granted,
            overrides.permission_granted,
        );
        changed
    }
}
