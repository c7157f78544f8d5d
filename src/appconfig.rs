use std::{path::Path, time::Instant};

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "annotator.toml";

const MAX_CLOSE_DELAY_MS: u64 = 10 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// bounding box for the displayed bitmap
    pub max_display_width: u32,
    pub max_display_height: u32,
    /// delay between the "All is done" screen and closing the window
    pub close_delay_ms: u64,
    /// rewritten after every image transition
    pub export_file_name: String,
    /// final export is `<prefix>_<YYYYMMDD_HHMM>.json`
    pub export_prefix: String,
    pub cache_image_dimensions: bool,
    pub marker_radius: f32,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            max_display_width: 1000,
            max_display_height: 720,
            close_delay_ms: 2000,
            export_file_name: "annotations.json".to_string(),
            export_prefix: "annotations".to_string(),
            cache_image_dimensions: false,
            marker_radius: 5.0,
        }
    }
}

impl AppSettings {
    pub fn display_bound(&self) -> (u32, u32) {
        (self.max_display_width, self.max_display_height)
    }

    pub fn close_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.close_delay_ms)
    }

    /// Out-of-range delays fall back to the default one.
    pub fn close_deadline(&self, now: Instant) -> Instant {
        let deadline = (self.close_delay_ms <= MAX_CLOSE_DELAY_MS)
            .then(|| now.checked_add(self.close_delay()))
            .flatten();
        deadline.unwrap_or_else(|| {
            warn!("close_delay_ms {} out of range", self.close_delay_ms);
            now + AppSettings::default().close_delay()
        })
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let s = toml::to_string_pretty(self).context("Failed to serialize AppSettings to TOML")?;
        std::fs::write(path, s)?;
        Ok(())
    }

    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
        let settings: AppSettings = toml::from_str(&s)?;

        ensure!(
            settings.max_display_width > 0 && settings.max_display_height > 0,
            "Display bound must be non-zero, got {}x{}",
            settings.max_display_width,
            settings.max_display_height
        );
        ensure!(
            settings.close_delay_ms <= MAX_CLOSE_DELAY_MS,
            "close_delay_ms must be at most {}, got {}",
            MAX_CLOSE_DELAY_MS,
            settings.close_delay_ms
        );
        ensure!(
            !settings.export_file_name.is_empty(),
            "export_file_name must not be empty"
        );

        Ok(settings)
    }

    /// Missing file means defaults, a broken one is logged and ignored.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        if !path.as_ref().exists() {
            debug!("No config at {}, using defaults", path.as_ref().display());
            return Self::default();
        }
        match Self::read_from_file(&path) {
            Ok(settings) => {
                info!("Loaded settings from {}", path.as_ref().display());
                settings
            }
            Err(e) => {
                error!("Failed to read options from file: {:#}", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "close_delay_ms = 500\nmarker_radius = 8.0\n").unwrap();

        let settings = AppSettings::read_from_file(&path).unwrap();
        assert_eq!(settings.close_delay_ms, 500);
        assert_eq!(settings.marker_radius, 8.0);
        assert_eq!(settings.display_bound(), (1000, 720));
        assert_eq!(settings.export_file_name, "annotations.json");
    }

    #[test]
    fn save_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let settings = AppSettings {
            cache_image_dimensions: true,
            ..Default::default()
        };
        settings.save_to_file(&path).unwrap();
        assert_eq!(AppSettings::read_from_file(&path).unwrap(), settings);
    }

    #[test]
    fn zero_bound_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "max_display_width = 0\n").unwrap();

        assert!(AppSettings::read_from_file(&path).is_err());
        assert_eq!(AppSettings::load_or_default(&path), AppSettings::default());
    }

    #[test]
    fn huge_close_delay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "close_delay_ms = 9000000000000\n").unwrap();
        assert!(AppSettings::read_from_file(&path).is_err());

        let settings = AppSettings {
            close_delay_ms: u64::MAX,
            ..Default::default()
        };
        let now = Instant::now();
        assert_eq!(
            settings.close_deadline(now),
            now + std::time::Duration::from_millis(2000)
        );
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            AppSettings::load_or_default(dir.path().join("nope.toml")),
            AppSettings::default()
        );
    }
}
