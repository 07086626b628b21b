use std::path::PathBuf;
use thiserror::Error;

use crate::ids::ImageId;

/// The main error type for bagseg operations.
#[derive(Debug, Error)]
pub enum BagsegError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed annotation {path}: {message}")]
    MalformedAnnotation { path: PathBuf, message: String },

    #[error("Unknown class '{name}' returned for {image}")]
    UnknownClass { name: String, image: PathBuf },

    #[error("Index {index} out of range for dataset of {len} image(s)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Unknown image id {0}")]
    UnknownImageId(ImageId),

    #[error("Duplicate image id {0}")]
    DuplicateImageId(ImageId),

    #[error("Duplicate class '{0}'")]
    DuplicateClass(String),

    #[error("Invalid image directory {path}: {message}")]
    ImageDirInvalid { path: PathBuf, message: String },

    #[error("Invalid eval pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Failed to parse configuration from {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid weights source: {0}")]
    InvalidWeights(String),

    #[error("Invalid mask: {message}")]
    InvalidMask { message: String },

    #[error("Dataset has no images")]
    EmptyDataset,

    #[error("Model error: {message}")]
    Model { message: String },

    #[error("Failed to write plan to {path}: {source}")]
    PlanWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to set up logging: {message}")]
    Logger { message: String },
}
