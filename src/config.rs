use std::ffi::OsString;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SynthError;
use crate::layout::RecommendSettings;
use crate::synth::StyleSettings;
use crate::timing::DEFAULT_FALLBACK_BPM;

// ── Generator configuration ──────────────────────────────────────

/// Timing-stage tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimingSettings {
    pub fallback_bpm: f64,
    /// How long to wait for the external beat analyzer before falling back.
    pub detection_timeout_secs: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            fallback_bpm: DEFAULT_FALLBACK_BPM,
            detection_timeout_secs: 120,
        }
    }
}

/// Everything the pipeline stages are constructed from. A partial file
/// overrides only the sections and fields it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneratorConfig {
    pub version: u32,
    pub style: StyleSettings,
    pub recommend: RecommendSettings,
    pub timing: TimingSettings,
}

const CONFIG_VERSION: u32 = 1;

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            style: StyleSettings::default(),
            recommend: RecommendSettings::default(),
            timing: TimingSettings::default(),
        }
    }
}

/// Load the config at `path`, or the built-in defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<GeneratorConfig, SynthError> {
    let Some(path) = path else {
        return Ok(GeneratorConfig::default());
    };
    let config: GeneratorConfig = read_json(path).map_err(|e| match e {
        SynthError::Json(e) => SynthError::InvalidConfiguration {
            message: format!("{}: {e}", path.display()),
        },
        other => other,
    })?;
    if config.version > CONFIG_VERSION {
        return Err(SynthError::InvalidConfiguration {
            message: format!(
                "{}: config version {} is newer than supported ({CONFIG_VERSION})",
                path.display(),
                config.version
            ),
        });
    }
    debug!(path = %path.display(), "loaded generator config");
    Ok(config)
}

// ── JSON file helpers ────────────────────────────────────────────

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, SynthError> {
    let data = fs::read_to_string(path)?;
    let value = serde_json::from_str(&data)?;
    Ok(value)
}

/// Pretty-print `value` to `path` via a sibling temp file, so readers never
/// see a half-written document.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SynthError> {
    let json = serde_json::to_string_pretty(value)?;
    let mut tmp_name = OsString::from(path.file_name().unwrap_or_default());
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    fs::write(&tmp_path, json.as_bytes())?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}
