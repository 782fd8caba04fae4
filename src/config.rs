//! Engine configuration with JSON persistence.

use crate::dsp::fingerprint::FingerprintConfig;
use crate::dsp::peaks::PeakConfig;
use crate::dsp::spectrogram::SpectrogramConfig;
use crate::matcher::MatchConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Rate every clip must arrive at; resampling happens upstream.
pub const DEFAULT_SAMPLE_RATE: u32 = 22_050;

/// Aggregated configuration for the whole pipeline and match engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub spectrogram: SpectrogramConfig,
    pub peaks: PeakConfig,
    pub fingerprint: FingerprintConfig,
    pub matching: MatchConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            spectrogram: SpectrogramConfig::default(),
            peaks: PeakConfig::default(),
            fingerprint: FingerprintConfig::default(),
            matching: MatchConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Clamp every section into a usable range.
    pub fn normalized(mut self) -> Self {
        self.sample_rate = self.sample_rate.max(1);
        self.spectrogram = self.spectrogram.normalized();
        self.peaks = self.peaks.normalized();
        self.fingerprint = self.fingerprint.normalized();
        self.matching = self.matching.normalized();
        self
    }

    /// Load from a JSON file, falling back to defaults when the file is
    /// missing or unparseable.
    pub fn load_or_default(path: &Path) -> Self {
        let config: EngineConfig = std::fs::read_to_string(path)
            .ok()
            .and_then(|s| {
                serde_json::from_str(&s)
                    .map_err(|e| warn!("[config] parse error {path:?}: {e}"))
                    .ok()
            })
            .unwrap_or_default();
        config.normalized()
    }

    /// Write as pretty JSON, via a temp file so a crash never leaves a
    /// half-written config behind.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, &json)?;
        std::fs::rename(&temp_path, path)
    }
}
