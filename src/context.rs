//! Everything a run needs, built once from the parsed command line.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::BagsConfig;
use crate::dataset::BagsDataset;
use crate::driver::DEFAULT_EVAL_SAMPLE;
use crate::error::BagsegError;
use crate::index::{DatasetLayout, IndexOptions, Split};
use crate::mask::{BoxMaskSynthesizer, MaskSynthesizer};
use crate::schedule::WeightSource;

/// Top-level action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Command {
    /// Fine-tune on the train split, validating on the eval split.
    Train,
    /// Evaluate on a sample of the eval split.
    Eval,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Train => f.write_str("train"),
            Command::Eval => f.write_str("eval"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TrainingContext {
    pub command: Command,
    pub config: BagsConfig,
    pub layout: DatasetLayout,
    pub weights: WeightSource,
    pub logs_dir: PathBuf,
    pub eval_sample: usize,
    pub seed: Option<u64>,
    pub verify_image_size: bool,
}

impl TrainingContext {
    /// Validate `config` and resolve the dataset layout under `data_root`.
    pub fn new(
        command: Command,
        config: BagsConfig,
        data_root: &Path,
        logs_dir: impl Into<PathBuf>,
    ) -> Result<Self, BagsegError> {
        config.validate()?;
        Ok(Self {
            command,
            config,
            layout: DatasetLayout::from_root(data_root),
            weights: WeightSource::default(),
            logs_dir: logs_dir.into(),
            eval_sample: DEFAULT_EVAL_SAMPLE,
            seed: None,
            verify_image_size: false,
        })
    }

    pub fn index_options(&self, split: Split) -> Result<IndexOptions, BagsegError> {
        let mut options = IndexOptions::new(
            self.layout.clone(),
            split,
            self.config.image_min_dim,
            self.config.image_max_dim,
        );
        options.eval_pattern = self.config.eval_pattern()?;
        options.image_extension = self.config.image_extension.clone();
        options.verify_image_size = self.verify_image_size;
        Ok(options)
    }

    /// Masks from the annotation boxes of this layout.
    pub fn mask_synthesizer(&self) -> Arc<dyn MaskSynthesizer> {
        Arc::new(BoxMaskSynthesizer::new(self.layout.annotations_dir.clone()))
    }

    pub fn load_dataset(
        &self,
        split: Split,
        synthesizer: Arc<dyn MaskSynthesizer>,
    ) -> Result<BagsDataset, BagsegError> {
        BagsDataset::load(
            &self.index_options(split)?,
            self.config.classes.iter().cloned(),
            synthesizer,
        )
    }

    /// `<logs>/<name>_<command>_plan.json`
    pub fn plan_path(&self) -> PathBuf {
        self.logs_dir
            .join(format!("{}_{}_plan.json", self.config.name, self.command))
    }
}
