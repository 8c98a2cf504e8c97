use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

const DEFAULT_CAMERA: &str = "stub://camera0";
const DEFAULT_MICROPHONE: &str = "stub://mic0";
const DEFAULT_DETECTOR: &str = "synthetic";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize, Default)]
struct ProctorConfigFile {
    service_url: Option<String>,
    devices: Option<DeviceConfigFile>,
    detector: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DeviceConfigFile {
    camera: Option<String>,
    microphone: Option<String>,
}

/// Runtime configuration for a proctored session.
///
/// Loaded from an optional JSON file named by `PROCTOR_CONFIG`, then
/// overridden by individual environment variables, then validated.
#[derive(Debug, Clone)]
pub struct ProctorConfig {
    /// Exam service base URL. When absent, callers fall back to an in-memory
    /// service (the synthetic demo path).
    pub service_url: Option<String>,
    pub camera: String,
    pub microphone: String,
    pub detector: String,
    pub request_timeout: Duration,
}

impl ProctorConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PROCTOR_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ProctorConfigFile) -> Self {
        let camera = file
            .devices
            .as_ref()
            .and_then(|devices| devices.camera.clone())
            .unwrap_or_else(|| DEFAULT_CAMERA.to_string());
        let microphone = file
            .devices
            .and_then(|devices| devices.microphone)
            .unwrap_or_else(|| DEFAULT_MICROPHONE.to_string());
        Self {
            service_url: file.service_url,
            camera,
            microphone,
            detector: file.detector.unwrap_or_else(|| DEFAULT_DETECTOR.to_string()),
            request_timeout: Duration::from_secs(
                file.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("PROCTOR_SERVICE_URL") {
            if !url.trim().is_empty() {
                self.service_url = Some(url);
            }
        }
        if let Ok(camera) = std::env::var("PROCTOR_CAMERA") {
            if !camera.trim().is_empty() {
                self.camera = camera;
            }
        }
        if let Ok(microphone) = std::env::var("PROCTOR_MICROPHONE") {
            if !microphone.trim().is_empty() {
                self.microphone = microphone;
            }
        }
        if let Ok(detector) = std::env::var("PROCTOR_DETECTOR") {
            if !detector.trim().is_empty() {
                self.detector = detector;
            }
        }
        if let Ok(timeout) = std::env::var("PROCTOR_TIMEOUT_SECS") {
            let seconds: u64 = timeout.parse().map_err(|_| {
                anyhow!("PROCTOR_TIMEOUT_SECS must be an integer number of seconds")
            })?;
            self.request_timeout = Duration::from_secs(seconds);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if let Some(url) = &self.service_url {
            let parsed = Url::parse(url)
                .map_err(|e| anyhow!("invalid service_url '{}': {}", url, e))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(anyhow!(
                    "service_url scheme '{}' is not supported; expected http(s)",
                    parsed.scheme()
                ));
            }
        }
        Url::parse(&self.camera).map_err(|e| anyhow!("invalid camera spec: {}", e))?;
        Url::parse(&self.microphone).map_err(|e| anyhow!("invalid microphone spec: {}", e))?;
        crate::detect::validate_detector_spec(&self.detector)?;
        if self.request_timeout.as_secs() == 0 {
            return Err(anyhow!("request timeout must be greater than zero"));
        }
        Ok(())
    }

    pub fn devices(&self) -> crate::session::SessionDevices {
        crate::session::SessionDevices {
            camera: self.camera.clone(),
            microphone: self.microphone.clone(),
        }
    }
}

fn read_config_file(path: &Path) -> Result<ProctorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
