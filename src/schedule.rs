//! Weight initialisation and the three-stage fine-tuning schedule.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::config::BagsConfig;
use crate::error::BagsegError;

/// Head layers whose shapes depend on the class count. They are skipped
/// when starting from COCO weights.
pub const COCO_EXCLUDED_LAYERS: [&str; 4] = [
    "mrcnn_class_logits",
    "mrcnn_bbox_fc",
    "mrcnn_bbox",
    "mrcnn_mask",
];

/// Where the initial weights come from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum WeightSource {
    #[default]
    ImageNet,
    Coco,
    /// The most recent checkpoint in the logs directory.
    Last,
    File(PathBuf),
}

impl WeightSource {
    /// Layers to leave uninitialised when loading these weights.
    pub fn excluded_layers(&self) -> &'static [&'static str] {
        match self {
            WeightSource::Coco => &COCO_EXCLUDED_LAYERS,
            _ => &[],
        }
    }
}

impl FromStr for WeightSource {
    type Err = BagsegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" => Err(BagsegError::InvalidWeights(
                "weights source must not be empty".to_string(),
            )),
            "coco" => Ok(WeightSource::Coco),
            "imagenet" => Ok(WeightSource::ImageNet),
            "last" => Ok(WeightSource::Last),
            _ => Ok(WeightSource::File(PathBuf::from(trimmed))),
        }
    }
}

impl fmt::Display for WeightSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightSource::ImageNet => f.write_str("imagenet"),
            WeightSource::Coco => f.write_str("coco"),
            WeightSource::Last => f.write_str("last"),
            WeightSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Which layers are trainable during a stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LayerGroup {
    #[serde(rename = "heads")]
    Heads,
    /// ResNet stage 4 and up, plus heads.
    #[serde(rename = "4+")]
    Stage4Up,
    #[serde(rename = "all")]
    All,
}

impl LayerGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerGroup::Heads => "heads",
            LayerGroup::Stage4Up => "4+",
            LayerGroup::All => "all",
        }
    }
}

impl fmt::Display for LayerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One training stage.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Stage {
    pub name: &'static str,
    pub learning_rate: f64,
    pub epochs: u32,
    pub layers: LayerGroup,
}

/// Heads first, then ResNet stage 4 and up, then everything at a tenth of
/// the learning rate.
pub fn fine_tune_schedule(config: &BagsConfig) -> Vec<Stage> {
    vec![
        Stage {
            name: "Training network heads",
            learning_rate: config.learning_rate,
            epochs: config.epochs_per_stage,
            layers: LayerGroup::Heads,
        },
        Stage {
            name: "Fine tune Resnet stage 4 and up",
            learning_rate: config.learning_rate,
            epochs: config.epochs_per_stage,
            layers: LayerGroup::Stage4Up,
        },
        Stage {
            name: "Fine tune all layers",
            learning_rate: config.learning_rate / 10.0,
            epochs: config.epochs_per_stage,
            layers: LayerGroup::All,
        },
    ]
}
