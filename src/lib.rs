//! Bagseg: dataset preparation and fine-tuning driver for Mask R-CNN on the
//! bags dataset.
//!
//! Bagseg indexes a PASCAL VOC style image directory, filters images by
//! size, splits them into train and eval sets by file name and exposes the
//! result through a dataset facade an instance-segmentation framework can
//! consume. The framework itself stays external; bagseg drives it through
//! the [`driver::DetectionModel`] and [`driver::ApScorer`] traits.
//!
//! # Modules
//!
//! - [`annotation`]: VOC annotation reader
//! - [`catalog`]: class name to class id mapping
//! - [`index`]: directory scan, size filter and train/eval split
//! - [`dataset`]: the dataset facade and its builder
//! - [`mask`]: instance masks and the mask synthesizer seam
//! - [`config`], [`schedule`]: training configuration and stages
//! - [`driver`]: training/evaluation driver and JSON plans
//! - [`error`]: error types for bagseg operations

pub mod annotation;
pub mod catalog;
pub mod config;
pub mod context;
pub mod dataset;
pub mod driver;
pub mod error;
pub mod ids;
pub mod index;
pub mod logging;
pub mod mask;
pub mod schedule;

use std::path::PathBuf;

use clap::Parser;

pub use context::{Command, TrainingContext};
pub use error::BagsegError;

use config::BagsConfig;
use driver::{ModelMode, PlanRecorder, DEFAULT_EVAL_SAMPLE};
use index::Split;
use schedule::fine_tune_schedule;

/// Train Mask R-CNN on the custom bags dataset.
#[derive(Parser)]
#[command(name = "bagseg")]
#[command(version, about)]
struct Cli {
    /// 'train' or 'eval'.
    #[arg(value_enum)]
    command: Command,

    /// Path to a weights file, or 'coco', 'imagenet' or 'last'.
    #[arg(long, value_name = "WEIGHTS")]
    model: Option<String>,

    /// Logs and plans directory.
    #[arg(long, default_value = "log/")]
    logs: PathBuf,

    /// Directory containing Data/handbag_images/.
    #[arg(long, default_value = ".", env = "BAGSEG_DATA_ROOT")]
    data_root: PathBuf,

    /// YAML configuration overriding the defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of eval images to sample.
    #[arg(long, default_value_t = DEFAULT_EVAL_SAMPLE)]
    eval_sample: usize,

    /// Seed for eval sampling.
    #[arg(long)]
    seed: Option<u64>,

    /// Warn when an image header disagrees with its annotation size.
    #[arg(long)]
    verify_image_size: bool,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

/// Run the bagseg CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), BagsegError> {
    let cli = Cli::parse();
    logging::setup_logger(&cli.logs, cli.verbose)?;

    let ctx = build_context(cli)?;
    log::info!(
        "{} with {} weights, images from {}",
        ctx.command,
        ctx.weights,
        ctx.layout.images_dir.display()
    );

    match ctx.command {
        Command::Train => run_train(&ctx),
        Command::Eval => run_eval(&ctx),
    }
}

fn build_context(cli: Cli) -> Result<TrainingContext, BagsegError> {
    let config = match &cli.config {
        Some(path) => BagsConfig::load(path)?,
        None => BagsConfig::default(),
    };

    let mut ctx = TrainingContext::new(cli.command, config, &cli.data_root, cli.logs)?;
    if let Some(model) = cli.model.as_deref() {
        ctx.weights = model.parse()?;
    }
    ctx.eval_sample = cli.eval_sample;
    ctx.seed = cli.seed;
    ctx.verify_image_size = cli.verify_image_size;
    Ok(ctx)
}

/// Execute the train command.
fn run_train(ctx: &TrainingContext) -> Result<(), BagsegError> {
    print!("{}", ctx.config);

    let synthesizer = ctx.mask_synthesizer();
    let train = ctx.load_dataset(Split::Train, synthesizer.clone())?;
    print!("{}", train.summary());
    let val = ctx.load_dataset(Split::Eval, synthesizer)?;

    let mut model = PlanRecorder::new(ctx.config.clone(), ModelMode::Training);
    let schedule = fine_tune_schedule(&ctx.config);
    driver::run_training(&mut model, &train, &val, &ctx.weights, &schedule)?;

    let path = ctx.plan_path();
    driver::write_plan(&path, model.plan())?;
    println!(
        "Training plan: {} stage(s), {} train / {} eval image(s), written to {}",
        schedule.len(),
        train.size(),
        val.size(),
        path.display()
    );
    Ok(())
}

/// Execute the eval command.
fn run_eval(ctx: &TrainingContext) -> Result<(), BagsegError> {
    let val = ctx.load_dataset(Split::Eval, ctx.mask_synthesizer())?;
    print!("{}", val.summary());

    let plan = driver::build_eval_plan(
        &ctx.config,
        &ctx.weights,
        &val,
        ctx.eval_sample,
        ctx.seed,
    )?;

    let path = ctx.plan_path();
    driver::write_plan(&path, &plan)?;
    println!(
        "Evaluation plan: {} image(s), written to {}",
        plan.images.len(),
        path.display()
    );
    Ok(())
}
