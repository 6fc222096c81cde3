//! Pipeline settings persistence.
//!
//! Holds the display point budget and the filter presets applied to signals
//! by label. Stored as JSON in the platform config directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::analysis::{
    Behavior, Characteristic, FilterEngine, FilterError, FilterSpec, Transform,
};

/// Errors from reading or writing the settings file
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to access settings file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One filter of a preset. The sample rate comes from the signal it is
/// applied to.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PresetFilter {
    pub behavior: Behavior,
    /// Butterworth when omitted
    #[serde(default)]
    pub characteristic: Option<Characteristic>,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default = "default_order")]
    pub order: usize,
    pub cutoff: f64,
    #[serde(default)]
    pub gain: Option<f64>,
    #[serde(default)]
    pub bandwidth: Option<f64>,
    /// Run forward and backward
    #[serde(default)]
    pub zero_phase: bool,
}

fn default_order() -> usize {
    1
}

impl PresetFilter {
    fn new(behavior: Behavior, cutoff: f64) -> Self {
        Self {
            behavior,
            characteristic: None,
            transform: Transform::Bilinear,
            order: 1,
            cutoff,
            gain: None,
            bandwidth: None,
            zero_phase: true,
        }
    }

    pub fn to_spec(&self, sample_rate: f64) -> FilterSpec {
        FilterSpec {
            behavior: self.behavior,
            characteristic: Some(self.characteristic.unwrap_or_default()),
            transform: self.transform,
            order: self.order,
            sample_rate,
            cutoff: self.cutoff,
            gain: self.gain,
            bandwidth: self.bandwidth,
            one_db: false,
            pre_gain: false,
        }
    }
}

/// Named filter chain, matched to signals by label keyword
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FilterPreset {
    pub name: String,
    /// Case-insensitive substrings of the signal label
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub filters: Vec<PresetFilter>,
}

impl FilterPreset {
    pub fn matches(&self, label: &str) -> bool {
        let label = label.to_ascii_lowercase();
        self.keywords
            .iter()
            .any(|k| !k.is_empty() && label.contains(&k.to_ascii_lowercase()))
    }

    /// Run every filter of the chain over `samples`, in order.
    ///
    /// Filters with a cutoff at or above the channel's Nyquist frequency are
    /// skipped: a lowpass there passes everything, and nothing else has a
    /// usable band left.
    pub fn apply(&self, sample_rate: f64, samples: &mut Vec<f64>) -> Result<(), FilterError> {
        for filter in &self.filters {
            if filter.cutoff >= sample_rate / 2.0 {
                if filter.behavior == Behavior::Lowpass {
                    tracing::debug!(
                        "Preset {}: lowpass at {} Hz is above Nyquist for {} Hz, skipping",
                        self.name,
                        filter.cutoff,
                        sample_rate
                    );
                } else {
                    tracing::warn!(
                        "Preset {}: {} at {} Hz cannot be realized at {} Hz, skipping",
                        self.name,
                        filter.behavior,
                        filter.cutoff,
                        sample_rate
                    );
                }
                continue;
            }
            let mut engine = FilterEngine::from_spec(&filter.to_spec(sample_rate))?;
            if filter.zero_phase {
                *samples = engine.filtfilt(samples.as_slice());
            } else {
                engine.multi_step_in_place(samples);
            }
        }
        Ok(())
    }
}

/// Settings that persist across sessions
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PipelineSettings {
    /// Settings file version for migration support
    #[serde(default = "default_version")]
    pub version: u32,
    /// Point budget for resampled display output
    #[serde(default = "default_display_points")]
    pub display_points: usize,
    /// Allow resampling above the source length
    #[serde(default)]
    pub upsample: bool,
    #[serde(default = "default_presets")]
    pub presets: Vec<FilterPreset>,
}

fn default_version() -> u32 {
    1
}

fn default_display_points() -> usize {
    2000
}

fn default_presets() -> Vec<FilterPreset> {
    let highpass = PresetFilter::new(Behavior::Highpass, 0.3);
    vec![
        FilterPreset {
            name: "eeg".to_string(),
            keywords: vec!["EEG".to_string()],
            filters: vec![highpass.clone(), PresetFilter::new(Behavior::Lowpass, 35.0)],
        },
        FilterPreset {
            name: "eog".to_string(),
            keywords: vec!["EOG".to_string()],
            filters: vec![highpass.clone(), PresetFilter::new(Behavior::Lowpass, 35.0)],
        },
        FilterPreset {
            name: "emg".to_string(),
            keywords: vec!["EMG".to_string(), "Chin".to_string()],
            filters: vec![PresetFilter::new(Behavior::Highpass, 10.0)],
        },
        FilterPreset {
            name: "ecg".to_string(),
            keywords: vec!["ECG".to_string(), "EKG".to_string()],
            filters: vec![highpass, PresetFilter::new(Behavior::Lowpass, 70.0)],
        },
    ]
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            version: default_version(),
            display_points: default_display_points(),
            upsample: false,
            presets: default_presets(),
        }
    }
}

impl PipelineSettings {
    /// Get the config directory path for edfscope
    pub fn get_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("edfscope"))
    }

    /// Get the path to the settings JSON file
    pub fn get_settings_path() -> Option<PathBuf> {
        Self::get_config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Self {
        let path = match Self::get_settings_path() {
            Some(p) => p,
            None => return Self::default(),
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Using default settings: {}", e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SettingsError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::get_settings_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        std::fs::write(path, content).map_err(io_err)
    }

    /// Look up a preset by name
    pub fn preset(&self, name: &str) -> Option<&FilterPreset> {
        self.presets.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// First preset with a keyword found in `label`
    pub fn preset_for_label(&self, label: &str) -> Option<&FilterPreset> {
        self.presets.iter().find(|p| p.matches(label))
    }
}
