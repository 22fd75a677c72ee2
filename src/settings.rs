use std::path::{Path, PathBuf};

use crate::canvas::Viewport;
use crate::components::strokes::DEFAULT_STROKE_WIDTH;
use crate::error::InpaintError;
use crate::ops::mask::Renderer;
use crate::ops::request::DEFAULT_TIMEOUT_SECS;

/// Default inference service base URL.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000";

/// Settings that persist across sessions
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Inference service base URL (without `/inpaint`)
    pub endpoint: String,
    /// Display viewport the image is fitted into
    pub viewport: Viewport,
    /// Brush diameter in display pixels
    pub stroke_width: f32,
    /// Per-request timeout
    pub request_timeout_secs: u64,
    /// Send the negative prompt without the safety prefix
    pub allow_sensitive: bool,
    /// Mask rasterization backend
    pub renderer: Renderer,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            viewport: Viewport::default(),
            stroke_width: DEFAULT_STROKE_WIDTH,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            allow_sensitive: false,
            renderer: Renderer::default(),
        }
    }
}

impl Settings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/inpaintfe/inpaintfe_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\InpaintFE\inpaintfe_settings.cfg
    /// On macOS:   ~/Library/Application Support/InpaintFE/inpaintfe_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("inpaintfe");
            return Some(config_dir.join("inpaintfe_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(
                PathBuf::from(appdata)
                    .join("InpaintFE")
                    .join("inpaintfe_settings.cfg"),
            );
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("InpaintFE")
                    .join("inpaintfe_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("inpaintfe_settings.cfg")))
        }
    }

    /// Serialize as `key=value` lines.
    pub fn to_config_string(&self) -> String {
        format!(
            "endpoint={}\n\
             viewport_width={}\n\
             viewport_height={}\n\
             stroke_width={}\n\
             request_timeout_secs={}\n\
             allow_sensitive={}\n\
             renderer={}\n",
            self.endpoint,
            self.viewport.width,
            self.viewport.height,
            self.stroke_width,
            self.request_timeout_secs,
            self.allow_sensitive,
            self.renderer.label(),
        )
    }

    /// Parse `key=value` lines. Unknown keys and unparsable values keep the
    /// default for that key.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "endpoint" => {
                    if !val.is_empty() {
                        s.endpoint = val.to_string();
                    }
                }
                "viewport_width" => {
                    if let Ok(v) = val.parse::<u32>()
                        && v > 0
                    {
                        s.viewport.width = v;
                    }
                }
                "viewport_height" => {
                    if let Ok(v) = val.parse::<u32>()
                        && v > 0
                    {
                        s.viewport.height = v;
                    }
                }
                "stroke_width" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v.is_finite()
                        && v > 0.0
                    {
                        s.stroke_width = v;
                    }
                }
                "request_timeout_secs" => {
                    if let Ok(v) = val.parse::<u64>()
                        && v > 0
                    {
                        s.request_timeout_secs = v;
                    }
                }
                "allow_sensitive" => {
                    s.allow_sensitive = val == "true";
                }
                "renderer" => {
                    if let Some(r) = Renderer::parse(val) {
                        s.renderer = r;
                    }
                }
                _ => {}
            }
        }
        s
    }

    /// Load settings from `path` (returns default if file missing or corrupt)
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_config_str(&content),
            Err(_) => Self::default(),
        }
    }

    /// Load settings from the platform location.
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Save settings to `path`, creating the parent directory.
    pub fn save_to(&self, path: &Path) -> Result<(), InpaintError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| InpaintError::Io(format!("create {}: {}", parent.display(), e)))?;
        }
        std::fs::write(path, self.to_config_string())
            .map_err(|e| InpaintError::Io(format!("write {}: {}", path.display(), e)))
    }

    /// Save settings to the platform location.
    pub fn save(&self) -> Result<PathBuf, InpaintError> {
        let path = Self::settings_path()
            .ok_or_else(|| InpaintError::Io("no settings directory".to_string()))?;
        self.save_to(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.cfg");
        let s = Settings {
            endpoint: "https://infer.example/api".into(),
            viewport: Viewport::new(1024, 768),
            stroke_width: 32.5,
            request_timeout_secs: 15,
            allow_sensitive: true,
            renderer: Renderer::Parallel,
        };
        s.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), s);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Settings::load_from(&dir.path().join("nope.cfg")), Settings::default());
    }

    #[test]
    fn bad_values_fall_back_per_key() {
        let s = Settings::from_config_str(
            "# comment\nviewport_width=0\nviewport_height=abc\nstroke_width=-4\n\
             renderer=gpu\nrequest_timeout_secs=30\nmystery=1\nnot a pair\n",
        );
        let d = Settings::default();
        assert_eq!(s.viewport, d.viewport);
        assert_eq!(s.stroke_width, d.stroke_width);
        assert_eq!(s.renderer, d.renderer);
        assert_eq!(s.request_timeout_secs, 30);
    }
}
