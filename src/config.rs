use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classes::{default_class_names, ClassSelection};
use crate::error::ClasswatchError;
use crate::playback::PlaybackConfig;

const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CONFIDENCE: f32 = 0.25;
const DEFAULT_IOU: f32 = 0.45;
const DEFAULT_IDLE_WAIT_MS: u64 = 100;
const DEFAULT_FRAME_INTERVAL_MS: u64 = 30;

#[derive(Debug, Deserialize, Default)]
struct AppConfigFile {
    detector: Option<DetectorConfigFile>,
    classes: Option<ClassesConfigFile>,
    playback: Option<PlaybackConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassesConfigFile {
    names: Option<Vec<String>>,
    selected: Option<Vec<usize>>,
}

#[derive(Debug, Deserialize, Default)]
struct PlaybackConfigFile {
    idle_wait_ms: Option<u64>,
    frame_interval_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub detector: DetectorSettings,
    pub class_names: Vec<String>,
    pub selection: ClassSelection,
    pub playback: PlaybackConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            model_path: None,
            input_width: DEFAULT_INPUT_SIZE,
            input_height: DEFAULT_INPUT_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE,
            iou_threshold: DEFAULT_IOU,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let class_names = default_class_names();
        Self {
            detector: DetectorSettings::default(),
            selection: ClassSelection::all(class_names.len()),
            class_names,
            playback: PlaybackConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the TOML file named by `CLASSWATCH_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CLASSWATCH_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (or defaults), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Self {
        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector_file
                .backend
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            model_path: detector_file.model_path,
            input_width: detector_file.input_width.unwrap_or(DEFAULT_INPUT_SIZE),
            input_height: detector_file.input_height.unwrap_or(DEFAULT_INPUT_SIZE),
            confidence_threshold: detector_file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE),
            iou_threshold: detector_file.iou_threshold.unwrap_or(DEFAULT_IOU),
        };
        let class_names = file
            .classes
            .as_ref()
            .and_then(|classes| classes.names.clone())
            .unwrap_or_else(default_class_names);
        let selection = file
            .classes
            .and_then(|classes| classes.selected)
            .map(ClassSelection::new)
            .unwrap_or_else(|| ClassSelection::all(class_names.len()));
        let playback_file = file.playback.unwrap_or_default();
        let playback = PlaybackConfig {
            idle_wait: Duration::from_millis(
                playback_file.idle_wait_ms.unwrap_or(DEFAULT_IDLE_WAIT_MS),
            ),
            frame_interval: Duration::from_millis(
                playback_file
                    .frame_interval_ms
                    .unwrap_or(DEFAULT_FRAME_INTERVAL_MS),
            ),
        };
        Self {
            detector,
            class_names,
            selection,
            playback,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(backend) = std::env::var("CLASSWATCH_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.trim().to_lowercase();
            }
        }
        if let Ok(path) = std::env::var("CLASSWATCH_MODEL") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(classes) = std::env::var("CLASSWATCH_CLASSES") {
            if !classes.trim().is_empty() {
                self.selection = ClassSelection::parse(&classes, self.class_names.len())
                    .map_err(|e| anyhow!("CLASSWATCH_CLASSES: {}", e))?;
            }
        }
        if let Ok(value) = std::env::var("CLASSWATCH_CONFIDENCE") {
            self.detector.confidence_threshold = value
                .parse()
                .map_err(|_| anyhow!("CLASSWATCH_CONFIDENCE must be a number"))?;
        }
        if let Ok(value) = std::env::var("CLASSWATCH_IDLE_WAIT_MS") {
            self.playback.idle_wait = parse_millis("CLASSWATCH_IDLE_WAIT_MS", &value)?;
        }
        if let Ok(value) = std::env::var("CLASSWATCH_FRAME_INTERVAL_MS") {
            self.playback.frame_interval = parse_millis("CLASSWATCH_FRAME_INTERVAL_MS", &value)?;
        }
        Ok(())
    }

    fn validate(&self) -> std::result::Result<(), ClasswatchError> {
        if self.class_names.is_empty() {
            return Err(config_error("at least one class name is required"));
        }
        if let Some(id) = self.selection.ids().find(|&id| id >= self.class_names.len()) {
            return Err(ClasswatchError::Config(format!(
                "selected class {} is out of range (known classes: {})",
                id,
                self.class_names.len()
            )));
        }
        if !(0.0..=1.0).contains(&self.detector.confidence_threshold) {
            return Err(config_error("confidence_threshold must be within 0..=1"));
        }
        if !(0.0..=1.0).contains(&self.detector.iou_threshold) {
            return Err(config_error("iou_threshold must be within 0..=1"));
        }
        if self.detector.input_width == 0 || self.detector.input_height == 0 {
            return Err(config_error("model input size must be non-zero"));
        }
        if self.playback.idle_wait.is_zero() {
            return Err(config_error("idle_wait_ms must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn config_error(reason: &str) -> ClasswatchError {
    ClasswatchError::Config(reason.to_string())
}

fn parse_millis(key: &str, value: &str) -> Result<Duration> {
    let ms: u64 = value
        .trim()
        .parse()
        .map_err(|_| anyhow!("{} must be an integer number of milliseconds", key))?;
    Ok(Duration::from_millis(ms))
}
