//! JSON plans for running the schedule out of process.
//!
//! [`PlanRecorder`] stands in for a real model: every weight load and stage
//! it is asked to run is recorded, and the resulting [`TrainingPlan`] is
//! handed to the framework as a file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use super::{sample_image_ids, DetectionModel, ModelMode};
use crate::config::BagsConfig;
use crate::dataset::BagsDataset;
use crate::error::BagsegError;
use crate::ids::ImageId;
use crate::index::ImageRecord;
use crate::mask::MaskSummary;
use crate::schedule::{Stage, WeightSource};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlannedStage {
    #[serde(flatten)]
    pub stage: Stage,
    pub train_images: usize,
    pub val_images: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrainingPlan {
    pub config: BagsConfig,
    pub mode: ModelMode,
    pub weights: Option<WeightSource>,
    pub excluded_layers: Vec<String>,
    pub stages: Vec<PlannedStage>,
    pub train_images: Vec<ImageRecord>,
    pub val_images: Vec<ImageRecord>,
}

/// A [`DetectionModel`] that records what it is asked to do.
#[derive(Debug)]
pub struct PlanRecorder {
    plan: TrainingPlan,
}

impl PlanRecorder {
    pub fn new(config: BagsConfig, mode: ModelMode) -> Self {
        Self {
            plan: TrainingPlan {
                config,
                mode,
                weights: None,
                excluded_layers: Vec::new(),
                stages: Vec::new(),
                train_images: Vec::new(),
                val_images: Vec::new(),
            },
        }
    }

    pub fn plan(&self) -> &TrainingPlan {
        &self.plan
    }

    pub fn into_plan(self) -> TrainingPlan {
        self.plan
    }
}

impl DetectionModel for PlanRecorder {
    fn mode(&self) -> ModelMode {
        self.plan.mode
    }

    fn load_weights(
        &mut self,
        source: &WeightSource,
        exclude: &[&str],
    ) -> Result<(), BagsegError> {
        self.plan.weights = Some(source.clone());
        self.plan.excluded_layers = exclude.iter().map(|layer| layer.to_string()).collect();
        Ok(())
    }

    fn train(
        &mut self,
        train: &BagsDataset,
        val: &BagsDataset,
        stage: &Stage,
    ) -> Result<(), BagsegError> {
        if train.is_empty() {
            return Err(BagsegError::EmptyDataset);
        }
        if self.plan.train_images.is_empty() {
            self.plan.train_images = train.records().to_vec();
            self.plan.val_images = val.records().to_vec();
        }
        self.plan.stages.push(PlannedStage {
            stage: stage.clone(),
            train_images: train.size(),
            val_images: val.size(),
        });
        Ok(())
    }
}

/// One sampled eval image with the masks it resolves to.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EvalImage {
    pub id: ImageId,
    pub reference: String,
    pub width: u32,
    pub height: u32,
    pub masks: Vec<MaskSummary>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EvalPlan {
    pub config: BagsConfig,
    pub mode: ModelMode,
    pub weights: WeightSource,
    pub images: Vec<EvalImage>,
}

/// Sample eval images and resolve their masks.
///
/// An image whose masks name an unknown class fails the whole plan.
pub fn build_eval_plan(
    config: &BagsConfig,
    weights: &WeightSource,
    dataset: &BagsDataset,
    sample: usize,
    seed: Option<u64>,
) -> Result<EvalPlan, BagsegError> {
    let mut images = Vec::new();
    for image_id in sample_image_ids(dataset, sample, seed)? {
        let record = dataset.record(image_id)?;
        images.push(EvalImage {
            id: image_id,
            reference: dataset.reference(image_id)?,
            width: record.width,
            height: record.height,
            masks: dataset.mask_summary(image_id)?,
        });
    }

    Ok(EvalPlan {
        config: config.inference(),
        mode: ModelMode::Inference,
        weights: weights.clone(),
        images,
    })
}

/// Write `plan` as pretty JSON, creating parent directories.
pub fn write_plan<T: Serialize>(path: &Path, plan: &T) -> Result<(), BagsegError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(BagsegError::Io)?;
    }

    let file = File::create(path).map_err(BagsegError::Io)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, plan).map_err(|source| BagsegError::PlanWrite {
        path: path.to_path_buf(),
        source,
    })?;
    writer.write_all(b"\n").map_err(BagsegError::Io)?;
    writer.flush().map_err(BagsegError::Io)
}
