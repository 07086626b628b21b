//! Drives an external detection framework through training and evaluation.
//!
//! The model itself lives outside this crate. [`DetectionModel`] and
//! [`ApScorer`] are the operations consumed from it.

mod plan;

pub use plan::{
    build_eval_plan, write_plan, EvalImage, EvalPlan, PlanRecorder, PlannedStage, TrainingPlan,
};

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;

use crate::dataset::BagsDataset;
use crate::error::BagsegError;
use crate::ids::ImageId;
use crate::schedule::{Stage, WeightSource};

/// Images sampled for evaluation unless told otherwise.
pub const DEFAULT_EVAL_SAMPLE: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelMode {
    Training,
    Inference,
}

/// Training operations of the external model.
pub trait DetectionModel {
    fn mode(&self) -> ModelMode;

    /// Load initial weights, leaving the `exclude` layers untouched.
    fn load_weights(&mut self, source: &WeightSource, exclude: &[&str])
        -> Result<(), BagsegError>;

    fn train(
        &mut self,
        train: &BagsDataset,
        val: &BagsDataset,
        stage: &Stage,
    ) -> Result<(), BagsegError>;
}

/// Per-image average precision computed by the external model.
pub trait ApScorer {
    fn average_precision(
        &mut self,
        dataset: &BagsDataset,
        image_id: ImageId,
    ) -> Result<f64, BagsegError>;
}

/// Load weights, then run each stage in order. Stops at the first failure.
pub fn run_training<M: DetectionModel + ?Sized>(
    model: &mut M,
    train: &BagsDataset,
    val: &BagsDataset,
    weights: &WeightSource,
    schedule: &[Stage],
) -> Result<(), BagsegError> {
    if model.mode() != ModelMode::Training {
        return Err(BagsegError::Model {
            message: "training requires a model built in training mode".to_string(),
        });
    }

    log::info!("loading {} weights", weights);
    model.load_weights(weights, weights.excluded_layers())?;

    for (idx, stage) in schedule.iter().enumerate() {
        log::info!(
            "stage {}/{}: {} (layers={}, lr={}, epochs={})",
            idx + 1,
            schedule.len(),
            stage.name,
            stage.layers,
            stage.learning_rate,
            stage.epochs
        );
        model.train(train, val, stage)?;
    }
    Ok(())
}

/// AP of each sampled image and their mean.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EvalReport {
    pub per_image: Vec<(ImageId, f64)>,
    pub mean_ap: f64,
}

/// Score up to `sample` randomly chosen images of `dataset`.
pub fn run_evaluation<S: ApScorer + ?Sized>(
    scorer: &mut S,
    dataset: &BagsDataset,
    sample: usize,
    seed: Option<u64>,
) -> Result<EvalReport, BagsegError> {
    let image_ids = sample_image_ids(dataset, sample, seed)?;

    let mut per_image = Vec::with_capacity(image_ids.len());
    for image_id in image_ids {
        let ap = scorer.average_precision(dataset, image_id)?;
        log::debug!("{}: AP {:.4}", dataset.reference(image_id)?, ap);
        per_image.push((image_id, ap));
    }

    let mean_ap = per_image.iter().map(|(_, ap)| ap).sum::<f64>() / per_image.len() as f64;
    log::info!("mAP over {} image(s): {:.4}", per_image.len(), mean_ap);

    Ok(EvalReport { per_image, mean_ap })
}

/// Up to `k` image ids chosen uniformly without replacement, in id order.
pub fn sample_image_ids(
    dataset: &BagsDataset,
    k: usize,
    seed: Option<u64>,
) -> Result<Vec<ImageId>, BagsegError> {
    if dataset.is_empty() {
        return Err(BagsegError::EmptyDataset);
    }
    if k == 0 {
        return Err(BagsegError::InvalidConfig {
            message: "evaluation sample size must be greater than 0".to_string(),
        });
    }

    let mut ids = dataset.image_ids();
    if k >= ids.len() {
        return Ok(ids);
    }

    if let Some(seed) = seed {
        let mut rng = StdRng::seed_from_u64(seed);
        ids.shuffle(&mut rng);
    } else {
        let mut rng = rand::rng();
        ids.shuffle(&mut rng);
    }

    ids.truncate(k);
    ids.sort();
    Ok(ids)
}
