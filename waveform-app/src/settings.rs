//! Persistent application settings (JSON file in app data directory).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use waveform_core::EngineConfig;

/// Overrides the settings file location when set.
pub const SETTINGS_PATH_ENV: &str = "WAVEFORM_SETTINGS_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub duration_seconds: u32,
    pub signal_frequency: f32,
    pub baseline_frequency: f32,
    pub noise_resolution: u32,
    pub sample_rate: u32,
    pub chunk_length: usize,
    pub display_seconds: u32,
    pub noise_seed: Option<u64>,
    /// Log a window summary every N snapshots.
    pub log_every_ticks: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            duration_seconds: engine.duration_seconds,
            signal_frequency: engine.signal_frequency,
            baseline_frequency: engine.baseline_frequency,
            noise_resolution: engine.noise_resolution,
            sample_rate: engine.sample_rate,
            chunk_length: engine.chunk_length,
            display_seconds: engine.display_seconds,
            noise_seed: None,
            log_every_ticks: 3,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        let defaults = Self::default();
        self.duration_seconds = self.duration_seconds.clamp(1, 3600);
        self.signal_frequency = normalize_frequency(self.signal_frequency, defaults.signal_frequency);
        self.baseline_frequency =
            normalize_frequency(self.baseline_frequency, defaults.baseline_frequency);
        self.noise_resolution = self.noise_resolution.min(32);
        self.sample_rate = self.sample_rate.clamp(1, 192_000);
        self.display_seconds = self.display_seconds.clamp(1, 60);
        // A chunk must fit both the display window and the source series.
        self.chunk_length = self
            .chunk_length
            .clamp(1, self.window_len().min(self.series_len()));
        self.log_every_ticks = self.log_every_ticks.clamp(1, 10_000);
    }

    /// Samples the display window holds at the configured rate.
    pub fn window_len(&self) -> usize {
        self.display_seconds as usize * self.sample_rate as usize
    }

    /// Samples in the precomputed source series.
    pub fn series_len(&self) -> usize {
        self.duration_seconds as usize * self.sample_rate as usize
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            duration_seconds: self.duration_seconds,
            signal_frequency: self.signal_frequency,
            baseline_frequency: self.baseline_frequency,
            noise_resolution: self.noise_resolution,
            sample_rate: self.sample_rate,
            chunk_length: self.chunk_length,
            display_seconds: self.display_seconds,
            noise_seed: self.noise_seed,
        }
    }
}

fn normalize_frequency(raw: f32, fallback: f32) -> f32 {
    if raw.is_finite() {
        raw.clamp(0.0, 10_000.0)
    } else {
        fallback
    }
}

/// `--settings` wins, then `WAVEFORM_SETTINGS_PATH`, then the app data dir.
pub fn resolve_settings_path(cli: Option<PathBuf>) -> PathBuf {
    cli.or_else(|| {
        std::env::var_os(SETTINGS_PATH_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    })
    .unwrap_or_else(default_settings_path)
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Waveform Plotter")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("waveform-plotter")
            .join("settings.json")
    }
}

/// Unreadable or malformed files fall back to defaults.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
