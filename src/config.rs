//! Training configuration for the bags dataset.
//!
//! Values default to the stock bags setup; a YAML file may override any
//! subset of fields.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::BAG_CLASSES;
use crate::error::BagsegError;
use crate::index::{EvalPattern, DEFAULT_EVAL_PATTERN, DEFAULT_IMAGE_EXTENSION};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BagsConfig {
    /// Recognizable configuration name, used for output file names.
    pub name: String,
    pub gpu_count: u32,
    pub images_per_gpu: u32,
    /// Background plus one per class.
    pub num_classes: usize,
    pub steps_per_epoch: u32,
    pub validation_steps: u32,
    pub image_min_dim: u32,
    pub image_max_dim: u32,
    pub learning_rate: f64,
    pub epochs_per_stage: u32,
    pub eval_pattern: String,
    pub image_extension: String,
    pub classes: Vec<String>,
}

impl Default for BagsConfig {
    fn default() -> Self {
        Self {
            name: "bags".to_string(),
            gpu_count: 1,
            images_per_gpu: 1,
            num_classes: 1 + BAG_CLASSES.len(),
            steps_per_epoch: 3000,
            validation_steps: 100,
            image_min_dim: 800,
            image_max_dim: 1024,
            learning_rate: 0.001,
            epochs_per_stage: 10,
            eval_pattern: DEFAULT_EVAL_PATTERN.to_string(),
            image_extension: DEFAULT_IMAGE_EXTENSION.to_string(),
            classes: BAG_CLASSES.iter().map(|name| name.to_string()).collect(),
        }
    }
}

impl BagsConfig {
    /// Load and validate a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, BagsegError> {
        let raw = fs::read_to_string(path).map_err(BagsegError::Io)?;
        let config: Self =
            serde_yaml::from_str(&raw).map_err(|source| BagsegError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Variant used when running detection: one image at a time.
    pub fn inference(&self) -> Self {
        Self {
            gpu_count: 1,
            images_per_gpu: 1,
            ..self.clone()
        }
    }

    pub fn batch_size(&self) -> u32 {
        self.gpu_count.saturating_mul(self.images_per_gpu)
    }

    pub fn eval_pattern(&self) -> Result<EvalPattern, BagsegError> {
        EvalPattern::new(&self.eval_pattern)
    }

    pub fn validate(&self) -> Result<(), BagsegError> {
        let invalid = |message: String| Err(BagsegError::InvalidConfig { message });

        if self.name.trim().is_empty() {
            return invalid("name must not be empty".to_string());
        }
        if self.gpu_count == 0 || self.images_per_gpu == 0 {
            return invalid("gpu_count and images_per_gpu must be at least 1".to_string());
        }
        if self.image_min_dim == 0 || self.image_min_dim > self.image_max_dim {
            return invalid(format!(
                "image_min_dim ({}) must be positive and not exceed image_max_dim ({})",
                self.image_min_dim, self.image_max_dim
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            ));
        }
        if self.epochs_per_stage == 0 {
            return invalid("epochs_per_stage must be at least 1".to_string());
        }
        if self.classes.is_empty() {
            return invalid("at least one class is required".to_string());
        }
        let mut seen = HashSet::new();
        for class in &self.classes {
            if !seen.insert(class.as_str()) {
                return Err(BagsegError::DuplicateClass(class.clone()));
            }
        }
        if self.num_classes != self.classes.len() + 1 {
            return invalid(format!(
                "num_classes is {} but {} class(es) plus background are listed",
                self.num_classes,
                self.classes.len()
            ));
        }
        if self.image_extension.trim().is_empty() {
            return invalid("image_extension must not be empty".to_string());
        }
        self.eval_pattern()?;
        Ok(())
    }
}

impl fmt::Display for BagsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configurations:")?;
        let rows: [(&str, String); 12] = [
            ("BATCH_SIZE", self.batch_size().to_string()),
            ("EPOCHS_PER_STAGE", self.epochs_per_stage.to_string()),
            ("EVAL_PATTERN", self.eval_pattern.clone()),
            ("GPU_COUNT", self.gpu_count.to_string()),
            ("IMAGES_PER_GPU", self.images_per_gpu.to_string()),
            ("IMAGE_EXTENSION", self.image_extension.clone()),
            ("IMAGE_MAX_DIM", self.image_max_dim.to_string()),
            ("IMAGE_MIN_DIM", self.image_min_dim.to_string()),
            ("LEARNING_RATE", self.learning_rate.to_string()),
            ("NAME", self.name.clone()),
            ("NUM_CLASSES", self.num_classes.to_string()),
            ("STEPS_PER_EPOCH", self.steps_per_epoch.to_string()),
        ];
        for (key, value) in rows {
            writeln!(f, "{key:30} {value}")?;
        }
        writeln!(f, "{:30} {}", "VALIDATION_STEPS", self.validation_steps)
    }
}
