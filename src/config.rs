use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::alarm::DEFAULT_ALARM_CLIP_MS;
use crate::clock::Millis;
use crate::detect::DetectOptions;
use crate::ingest::SourceConfig;
use crate::track::{AlertPolicy, DEFAULT_STALE_ENTRY_TTL_MS};

const DEFAULT_SOURCE_URL: &str = "stub://camera";
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_PIPELINE: &str = "stub";
const DEFAULT_MIN_SCORE: f32 = 0.2;
const DEFAULT_MAX_RESULTS: usize = 5;
const DEFAULT_REFRESH_HZ: u32 = 60;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct WatchConfigFile {
    source: Option<SourceConfigFile>,
    detection: Option<DetectionConfigFile>,
    alert: Option<AlertConfigFile>,
    audio: Option<AudioConfigFile>,
    render: Option<RenderConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SourceConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectionConfigFile {
    pipeline: Option<String>,
    script_path: Option<PathBuf>,
    min_score: Option<f32>,
    max_results: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AlertConfigFile {
    expression: Option<String>,
    score_threshold: Option<f32>,
    duration_ms: Option<Millis>,
    cooldown_ms: Option<Millis>,
    stale_entry_ttl_ms: Option<Millis>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AudioConfigFile {
    clip_ms: Option<Millis>,
    bell: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RenderConfigFile {
    output_path: Option<PathBuf>,
    font_path: Option<PathBuf>,
    refresh_hz: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub source: SourceConfig,
    pub detection: DetectionSettings,
    pub alert: AlertSettings,
    pub audio: AudioSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    /// Registered pipeline name (`stub`, `scripted`).
    pub pipeline: String,
    /// Detection script for the `scripted` pipeline.
    pub script_path: Option<PathBuf>,
    pub options: DetectOptions,
}

#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub policy: AlertPolicy,
    /// `None` keeps entries of faces that left the frame for the whole session.
    pub stale_entry_ttl_ms: Option<Millis>,
}

#[derive(Debug, Clone)]
pub struct AudioSettings {
    pub clip_ms: Millis,
    /// Ring the terminal bell on alerts.
    pub bell: bool,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub output_path: Option<PathBuf>,
    pub font_path: Option<PathBuf>,
    pub refresh_hz: u32,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self::from_file(WatchConfigFile::default())
    }
}

impl WatchConfig {
    /// Defaults, then the file named by `SCOWL_CONFIG`, then `SCOWL_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SCOWL_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: WatchConfigFile) -> Self {
        let source = file.source.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let alert = file.alert.unwrap_or_default();
        let audio = file.audio.unwrap_or_default();
        let render = file.render.unwrap_or_default();
        let default_policy = AlertPolicy::default();

        Self {
            source: SourceConfig {
                url: source.url.unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
                width: source.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
                height: source.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
            },
            detection: DetectionSettings {
                pipeline: detection
                    .pipeline
                    .unwrap_or_else(|| DEFAULT_PIPELINE.to_string()),
                script_path: detection.script_path,
                options: DetectOptions {
                    min_score: detection.min_score.unwrap_or(DEFAULT_MIN_SCORE),
                    max_results: detection.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
                },
            },
            alert: AlertSettings {
                policy: AlertPolicy {
                    expression: alert.expression.unwrap_or(default_policy.expression),
                    score_threshold: alert
                        .score_threshold
                        .unwrap_or(default_policy.score_threshold),
                    duration_limit_ms: alert
                        .duration_ms
                        .unwrap_or(default_policy.duration_limit_ms),
                    cooldown_ms: alert.cooldown_ms.unwrap_or(default_policy.cooldown_ms),
                },
                stale_entry_ttl_ms: match alert.stale_entry_ttl_ms {
                    Some(0) => None,
                    Some(ttl) => Some(ttl),
                    None => Some(DEFAULT_STALE_ENTRY_TTL_MS),
                },
            },
            audio: AudioSettings {
                clip_ms: audio.clip_ms.unwrap_or(DEFAULT_ALARM_CLIP_MS),
                bell: audio.bell.unwrap_or(true),
            },
            render: RenderSettings {
                output_path: render.output_path,
                font_path: render.font_path,
                refresh_hz: render.refresh_hz.unwrap_or(DEFAULT_REFRESH_HZ),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = env_string("SCOWL_SOURCE_URL") {
            self.source.url = url;
        }
        if let Some(pipeline) = env_string("SCOWL_PIPELINE") {
            self.detection.pipeline = pipeline;
        }
        if let Some(path) = env_string("SCOWL_SCRIPT_PATH") {
            self.detection.script_path = Some(PathBuf::from(path));
        }
        if let Some(expression) = env_string("SCOWL_EXPRESSION") {
            self.alert.policy.expression = expression;
        }
        if let Some(threshold) = env_string("SCOWL_SCORE_THRESHOLD") {
            self.alert.policy.score_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("SCOWL_SCORE_THRESHOLD must be a number"))?;
        }
        if let Some(duration) = env_string("SCOWL_DURATION_MS") {
            self.alert.policy.duration_limit_ms = duration.parse().map_err(|_| {
                anyhow!("SCOWL_DURATION_MS must be an integer number of milliseconds")
            })?;
        }
        if let Some(cooldown) = env_string("SCOWL_COOLDOWN_MS") {
            self.alert.policy.cooldown_ms = cooldown.parse().map_err(|_| {
                anyhow!("SCOWL_COOLDOWN_MS must be an integer number of milliseconds")
            })?;
        }
        if let Some(path) = env_string("SCOWL_OUTPUT_PATH") {
            self.render.output_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&mut self) -> Result<()> {
        self.alert.policy.expression = self.alert.policy.expression.trim().to_lowercase();
        self.alert.policy.validate()?;

        let options = &self.detection.options;
        if !(0.0..=1.0).contains(&options.min_score) {
            return Err(anyhow!(
                "min detection score must be in [0, 1], got {}",
                options.min_score
            ));
        }
        if options.max_results == 0 {
            return Err(anyhow!("max detection results must be at least 1"));
        }
        if self.detection.pipeline == "scripted" && self.detection.script_path.is_none() {
            return Err(anyhow!("the scripted pipeline needs a script_path"));
        }
        if self.audio.clip_ms == 0 {
            return Err(anyhow!("alarm clip duration must be greater than zero"));
        }
        if self.render.refresh_hz == 0 {
            return Err(anyhow!("refresh rate must be greater than zero"));
        }
        Ok(())
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<WatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_alert_policy() {
        let cfg = WatchConfig::default();
        assert_eq!(cfg.alert.policy, AlertPolicy::default());
        assert_eq!(cfg.alert.stale_entry_ttl_ms, Some(DEFAULT_STALE_ENTRY_TTL_MS));
        assert_eq!(cfg.detection.options, DetectOptions::default());
        assert_eq!(cfg.detection.pipeline, "stub");
        assert_eq!(cfg.source.url, "stub://camera");
    }

    #[test]
    fn zero_ttl_disables_eviction() {
        let file: WatchConfigFile =
            serde_json::from_str(r#"{"alert": {"stale_entry_ttl_ms": 0}}"#).unwrap();
        assert_eq!(WatchConfig::from_file(file).alert.stale_entry_ttl_ms, None);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<WatchConfigFile>(r#"{"alerts": {}}"#).is_err());
    }

    #[test]
    fn scripted_pipeline_requires_script() {
        let mut cfg = WatchConfig::default();
        cfg.detection.pipeline = "scripted".to_string();
        assert!(cfg.validate().is_err());
        cfg.detection.script_path = Some(PathBuf::from("faces.jsonl"));
        assert!(cfg.validate().is_ok());
    }
}
