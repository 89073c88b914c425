//! The built-in `patch_cnn` manifest and typed views over its sections.
//!
//! Consumers (feature extraction, training, inference, dataset loading) read
//! their section through these views once the tree is frozen.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::manifest;
use crate::sentinel::{Combinator, SentinelRules};
use crate::tree::{ConfigTree, FrozenConfig};

const BUILTIN_MANIFEST: &str = include_str!("../manifests/patch_cnn.yaml");

/// Sub-folder of `Dataset.SavePath` that holds extracted features by default.
pub const FEATURE_SUBDIR: &str = "feature";

/// Raw text of the built-in manifest.
pub fn manifest() -> &'static str {
    BUILTIN_MANIFEST
}

/// Load the built-in manifest.
pub fn default_tree() -> ConfigResult<ConfigTree> {
    manifest::load(BUILTIN_MANIFEST)
}

/// Derivation rules for the sentinels in the built-in manifest.
pub fn default_rules() -> SentinelRules {
    SentinelRules::new().derive(
        "Dataset.FeatureSavePath",
        "Dataset.SavePath",
        Combinator::Join(FEATURE_SUBDIR.to_string()),
    )
}

/// How the most likely pitch is picked from the model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxMethod {
    Posterior,
    Prior,
}

impl MaxMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaxMethod::Posterior => "posterior",
            MaxMethod::Prior => "prior",
        }
    }

    /// Parse a manifest value. Matching is exact.
    pub fn parse(s: &str) -> Option<MaxMethod> {
        match s {
            "posterior" => Some(MaxMethod::Posterior),
            "prior" => Some(MaxMethod::Prior),
            _ => None,
        }
    }
}

impl fmt::Display for MaxMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `General.*`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralSettings {
    pub transcription_mode: String,
    pub checkpoint_path: BTreeMap<String, PathBuf>,
}

impl GeneralSettings {
    /// Checkpoint for the configured transcription mode.
    pub fn checkpoint(&self) -> Option<&PathBuf> {
        self.checkpoint_path.get(&self.transcription_mode)
    }
}

/// `Feature.*`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSettings {
    pub patch_size: u32,
    pub peak_threshold: f64,
    pub hop_size: f64,
    pub sampling_rate: u32,
    pub window_size: u32,
    pub frequency_resolution: f64,
    pub frequency_center: f64,
    pub time_center: f64,
    pub gamma: Vec<f64>,
    pub bins_per_octave: u32,
}

/// `Model.*`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub save_prefix: String,
    pub save_path: PathBuf,
}

/// `Dataset.*`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSettings {
    pub save_path: PathBuf,
    pub feature_save_path: PathBuf,
}

/// `Inference.*`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceSettings {
    pub threshold: f64,
    pub max_method: MaxMethod,
}

/// `Training.*`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSettings {
    pub epoch: u32,
    pub steps: u32,
    pub val_steps: u32,
    pub batch_size: u32,
    pub val_batch_size: u32,
    pub early_stop: u32,
    pub init_learning_rate: f64,
}

/// All sections of a resolved `patch_cnn` configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchCnnSettings {
    pub general: GeneralSettings,
    pub feature: FeatureSettings,
    pub model: ModelSettings,
    pub dataset: DatasetSettings,
    pub inference: InferenceSettings,
    pub training: TrainingSettings,
}

impl PatchCnnSettings {
    /// Read every section out of a frozen tree.
    pub fn from_frozen(config: &FrozenConfig) -> ConfigResult<Self> {
        let tree = config.tree();
        Ok(PatchCnnSettings {
            general: GeneralSettings {
                transcription_mode: tree.get_str("General.TranscriptionMode")?.to_string(),
                checkpoint_path: string_map(tree, "General.CheckpointPath")?,
            },
            feature: FeatureSettings {
                patch_size: count(tree, "Feature.PatchSize")?,
                peak_threshold: tree.get_f64("Feature.PeakThreshold")?,
                hop_size: tree.get_f64("Feature.HopSize")?,
                sampling_rate: count(tree, "Feature.SamplingRate")?,
                window_size: count(tree, "Feature.WindowSize")?,
                frequency_resolution: tree.get_f64("Feature.FrequencyResolution")?,
                frequency_center: tree.get_f64("Feature.FrequencyCenter")?,
                time_center: tree.get_f64("Feature.TimeCenter")?,
                gamma: float_list(tree, "Feature.Gamma")?,
                bins_per_octave: count(tree, "Feature.BinsPerOctave")?,
            },
            model: ModelSettings {
                save_prefix: tree.get_str("Model.SavePrefix")?.to_string(),
                save_path: tree.get_str("Model.SavePath")?.into(),
            },
            dataset: DatasetSettings {
                save_path: tree.get_str("Dataset.SavePath")?.into(),
                feature_save_path: tree.get_str("Dataset.FeatureSavePath")?.into(),
            },
            inference: InferenceSettings {
                threshold: tree.get_f64("Inference.Threshold")?,
                max_method: {
                    let raw = tree.get_str("Inference.MaxMethod")?;
                    MaxMethod::parse(raw).ok_or_else(|| {
                        ConfigError::type_mismatch(
                            "Inference.MaxMethod",
                            format!("unknown max method '{raw}'"),
                        )
                    })?
                },
            },
            training: TrainingSettings {
                epoch: count(tree, "Training.Epoch")?,
                steps: count(tree, "Training.Steps")?,
                val_steps: count(tree, "Training.ValSteps")?,
                batch_size: count(tree, "Training.BatchSize")?,
                val_batch_size: count(tree, "Training.ValBatchSize")?,
                early_stop: count(tree, "Training.EarlyStop")?,
                init_learning_rate: tree.get_f64("Training.InitLearningRate")?,
            },
        })
    }
}

/// Non-negative Integer setting that fits in `u32`.
fn count(tree: &ConfigTree, path: &str) -> ConfigResult<u32> {
    let value = tree.get_i64(path)?;
    u32::try_from(value).map_err(|_| {
        ConfigError::type_mismatch(path, format!("expected a non-negative count, got {value}"))
    })
}

fn float_list(tree: &ConfigTree, path: &str) -> ConfigResult<Vec<f64>> {
    tree.get_list(path)?
        .iter()
        .map(|item| {
            item.as_f64().ok_or_else(|| {
                ConfigError::type_mismatch(path, format!("expected Float elements, found {item}"))
            })
        })
        .collect()
}

fn string_map(tree: &ConfigTree, path: &str) -> ConfigResult<BTreeMap<String, PathBuf>> {
    tree.get_map(path)?
        .iter()
        .map(|(key, value)| match (key.as_str(), value.as_str()) {
            (Some(k), Some(v)) => Ok((k.to_string(), PathBuf::from(v))),
            _ => Err(ConfigError::type_mismatch(
                path,
                format!("expected String entries, found {key}: {value}"),
            )),
        })
        .collect()
}
