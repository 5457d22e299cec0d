use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::alert::NotificationPolicy;
use crate::source::{parse_resolution, Resolution, SourceSpec};
use crate::Fault;

const DEFAULT_MODEL_PATH: &str = "cabin_model.onnx";
const DEFAULT_SOURCE: &str = "usb0";
const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;
const DEFAULT_TARGET_LABEL: &str = "Kid";
const DEFAULT_RESOLUTION: &str = "640x480";
const DEFAULT_RECORD_DIR: &str = "capture";
const DEFAULT_BACKEND: &str = "scripted";
const DEFAULT_ALERT_ENDPOINT: &str = "https://api.telegram.org";
const DEFAULT_ALERT_MESSAGE: &str = "ALERT: A kid was detected inside the locked car!";
const DEFAULT_LAMP_PIN: u8 = 17;
const DEFAULT_BUTTON_PIN: u8 = 27;
const DEFAULT_POLL_MS: u64 = 100;
const DEFAULT_DEBOUNCE_MS: u64 = 30;

#[derive(Debug, Deserialize, Default)]
struct WatchConfigFile {
    model_path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    source: Option<String>,
    min_confidence: Option<f32>,
    target_label: Option<String>,
    resolution: Option<String>,
    record: Option<bool>,
    record_dir: Option<PathBuf>,
    backend: Option<String>,
    alert: Option<AlertConfigFile>,
    gate: Option<GateConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    endpoint: Option<String>,
    bot_token: Option<String>,
    chat_id: Option<String>,
    message: Option<String>,
    policy: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct GateConfigFile {
    enabled: Option<bool>,
    lamp_pin: Option<u8>,
    button_pin: Option<u8>,
    button_active_low: Option<bool>,
    poll_ms: Option<u64>,
    debounce_ms: Option<u64>,
}

/// Validated daemon configuration. All invalid values are rejected here,
/// before the control loop starts.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub model_path: PathBuf,
    /// Label file, one label per line. When absent the detector runs with a
    /// single-class table containing only the target label.
    pub labels_path: Option<PathBuf>,
    pub source: String,
    pub min_confidence: f32,
    pub target_label: String,
    pub resolution: Option<Resolution>,
    pub record: bool,
    pub record_dir: PathBuf,
    pub backend: String,
    pub alert: AlertSettings,
    pub gate: GateSettings,
}

#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub endpoint: String,
    pub bot_token: String,
    pub chat_id: String,
    pub message: String,
    pub policy: NotificationPolicy,
}

#[derive(Debug, Clone)]
pub struct GateSettings {
    pub enabled: bool,
    pub lamp_pin: u8,
    pub button_pin: u8,
    pub button_active_low: bool,
    pub poll_ms: u64,
    pub debounce_ms: u64,
}

impl WatchConfig {
    /// Load from the file named by CABINWATCH_CONFIG (when set), apply
    /// environment overrides, then validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CABINWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: WatchConfigFile) -> Result<Self> {
        let resolution = match file
            .resolution
            .unwrap_or_else(|| DEFAULT_RESOLUTION.to_string())
            .as_str()
        {
            "" => None,
            raw => Some(parse_resolution(raw)?),
        };
        let alert_file = file.alert.unwrap_or_default();
        let policy = match alert_file.policy.as_deref() {
            Some(raw) => raw.parse::<NotificationPolicy>()?,
            None => NotificationPolicy::default(),
        };
        let gate_file = file.gate.unwrap_or_default();

        Ok(Self {
            model_path: file
                .model_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            labels_path: file.labels_path,
            source: file.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            min_confidence: file.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE),
            target_label: file
                .target_label
                .unwrap_or_else(|| DEFAULT_TARGET_LABEL.to_string()),
            resolution,
            record: file.record.unwrap_or(false),
            record_dir: file
                .record_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RECORD_DIR)),
            backend: file.backend.unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            alert: AlertSettings {
                endpoint: alert_file
                    .endpoint
                    .unwrap_or_else(|| DEFAULT_ALERT_ENDPOINT.to_string()),
                bot_token: alert_file.bot_token.unwrap_or_default(),
                chat_id: alert_file.chat_id.unwrap_or_default(),
                message: alert_file
                    .message
                    .unwrap_or_else(|| DEFAULT_ALERT_MESSAGE.to_string()),
                policy,
            },
            gate: GateSettings {
                enabled: gate_file.enabled.unwrap_or(false),
                lamp_pin: gate_file.lamp_pin.unwrap_or(DEFAULT_LAMP_PIN),
                button_pin: gate_file.button_pin.unwrap_or(DEFAULT_BUTTON_PIN),
                button_active_low: gate_file.button_active_low.unwrap_or(true),
                poll_ms: gate_file.poll_ms.unwrap_or(DEFAULT_POLL_MS),
                debounce_ms: gate_file.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS),
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = std::env::var("CABINWATCH_SOURCE") {
            if !source.trim().is_empty() {
                self.source = source;
            }
        }
        if let Ok(path) = std::env::var("CABINWATCH_MODEL") {
            if !path.trim().is_empty() {
                self.model_path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("CABINWATCH_LABELS") {
            if !path.trim().is_empty() {
                self.labels_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(value) = std::env::var("CABINWATCH_MIN_CONFIDENCE") {
            self.min_confidence = value
                .parse()
                .map_err(|_| anyhow!("CABINWATCH_MIN_CONFIDENCE must be a number in [0,1]"))?;
        }
        if let Ok(label) = std::env::var("CABINWATCH_TARGET_LABEL") {
            if !label.trim().is_empty() {
                self.target_label = label;
            }
        }
        if let Ok(raw) = std::env::var("CABINWATCH_RESOLUTION") {
            self.resolution = match raw.trim() {
                "" => None,
                raw => Some(parse_resolution(raw)?),
            };
        }
        if let Ok(value) = std::env::var("CABINWATCH_RECORD") {
            self.record = matches!(value.trim(), "1" | "true" | "yes");
        }
        if let Ok(backend) = std::env::var("CABINWATCH_BACKEND") {
            if !backend.trim().is_empty() {
                self.backend = backend;
            }
        }
        if let Ok(endpoint) = std::env::var("CABINWATCH_ALERT_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.alert.endpoint = endpoint;
            }
        }
        if let Ok(token) = std::env::var("CABINWATCH_BOT_TOKEN") {
            if !token.trim().is_empty() {
                self.alert.bot_token = token;
            }
        }
        if let Ok(chat_id) = std::env::var("CABINWATCH_CHAT_ID") {
            if !chat_id.trim().is_empty() {
                self.alert.chat_id = chat_id;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Fault::Configuration(format!(
                "min_confidence {} is outside [0,1]",
                self.min_confidence
            ))
            .into());
        }
        if self.target_label.trim().is_empty() {
            return Err(Fault::Configuration("target_label must not be empty".to_string()).into());
        }

        let spec = SourceSpec::parse(&self.source)?;
        if self.record {
            if !spec.supports_recording() {
                return Err(Fault::Configuration(
                    "recording is only supported for video and camera sources".to_string(),
                )
                .into());
            }
            if self.resolution.is_none() {
                return Err(Fault::Configuration(
                    "recording requires an explicit resolution".to_string(),
                )
                .into());
            }
        }

        if !matches!(self.backend.as_str(), "scripted" | "tract") {
            return Err(
                Fault::Configuration(format!("unknown backend '{}'", self.backend)).into(),
            );
        }

        if self.gate.enabled {
            if self.gate.lamp_pin == self.gate.button_pin {
                return Err(Fault::Configuration(
                    "gate lamp_pin and button_pin must differ".to_string(),
                )
                .into());
            }
            if self.gate.poll_ms == 0 {
                return Err(
                    Fault::Configuration("gate poll_ms must be greater than zero".to_string())
                        .into(),
                );
            }
        }

        if self.alert.bot_token.trim().is_empty() || self.alert.chat_id.trim().is_empty() {
            return Err(Fault::Configuration(
                "alert bot_token and chat_id must be set".to_string(),
            )
            .into());
        }
        Ok(())
    }

    /// The source kind this configuration resolves to. Also checked during
    /// validation; callers after `load()` can rely on it parsing.
    pub fn source_spec(&self) -> Result<SourceSpec> {
        SourceSpec::parse(&self.source)
    }
}

fn read_config_file(path: &Path) -> Result<WatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> WatchConfig {
        let mut cfg = WatchConfig::from_file(WatchConfigFile::default()).expect("defaults");
        cfg.source = "stub://cabin".to_string();
        cfg.alert.bot_token = "123:abc".to_string();
        cfg.alert.chat_id = "42".to_string();
        cfg
    }

    #[test]
    fn defaults_validate_once_credentials_are_set() {
        let mut cfg = base();
        cfg.validate().expect("valid defaults");
        assert_eq!(cfg.min_confidence, 0.5);
        assert_eq!(cfg.target_label, "Kid");
        assert_eq!(
            cfg.resolution,
            Some(Resolution {
                width: 640,
                height: 480
            })
        );
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let mut cfg = base();
        cfg.min_confidence = 1.5;
        let err = cfg.validate().expect_err("confidence out of range");
        let fault = err.downcast_ref::<Fault>().expect("fault kind");
        assert!(matches!(fault, Fault::Configuration(_)));
    }

    #[test]
    fn recording_requires_a_motion_source_and_resolution() {
        let mut cfg = base();
        cfg.record = true;
        assert!(cfg.validate().is_err(), "stub source cannot record");

        cfg.source = "usb0".to_string();
        cfg.resolution = None;
        assert!(cfg.validate().is_err(), "recording needs a resolution");

        cfg.resolution = Some(Resolution {
            width: 640,
            height: 480,
        });
        cfg.validate().expect("camera recording with resolution");
    }

    #[test]
    fn gate_pins_must_differ() {
        let mut cfg = base();
        cfg.gate.enabled = true;
        cfg.gate.lamp_pin = 5;
        cfg.gate.button_pin = 5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let mut cfg = base();
        cfg.alert.bot_token.clear();
        assert!(cfg.validate().is_err());
    }
}
