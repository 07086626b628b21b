//! Dataset indexer: pairs images with annotations, filters by size and
//! splits by file name.
//!
//! The expected layout is
//!
//! ```text
//! <root>/Data/handbag_images/
//!     JPEGImages/*.png
//!     Annotations/*.xml
//! ```
//!
//! Images whose annotation cannot be read, or whose recorded size falls
//! outside `[min_dim, max_dim]`, are skipped without consuming an id.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;
use walkdir::WalkDir;

use crate::annotation::{paired_annotation_path, read_annotation_size};
use crate::error::BagsegError;
use crate::ids::ImageId;

/// Matches `bot` followed by digits right before the `.png` extension.
pub const DEFAULT_EVAL_PATTERN: &str = r"bot[0-9]*\.png$";
pub const DEFAULT_IMAGE_EXTENSION: &str = "png";

/// Train/eval partition tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Eval,
}

impl Split {
    /// `Eval` if the file name matches `pattern`, `Train` otherwise.
    pub fn classify(file_name: &str, pattern: &EvalPattern) -> Self {
        if pattern.is_match(file_name) {
            Split::Eval
        } else {
            Split::Train
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Eval => "eval",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiled file-name pattern selecting the eval split.
#[derive(Clone, Debug)]
pub struct EvalPattern(Regex);

impl EvalPattern {
    pub fn new(pattern: &str) -> Result<Self, BagsegError> {
        Regex::new(pattern)
            .map(Self)
            .map_err(|source| BagsegError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    pub fn is_match(&self, file_name: &str) -> bool {
        self.0.is_match(file_name)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for EvalPattern {
    fn default() -> Self {
        Self::new(DEFAULT_EVAL_PATTERN).expect("default eval pattern is a valid regex")
    }
}

/// Image and annotation directories of one dataset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetLayout {
    pub images_dir: PathBuf,
    pub annotations_dir: PathBuf,
}

impl DatasetLayout {
    pub fn new(images_dir: impl Into<PathBuf>, annotations_dir: impl Into<PathBuf>) -> Self {
        Self {
            images_dir: images_dir.into(),
            annotations_dir: annotations_dir.into(),
        }
    }

    /// Resolve `<root>/Data/handbag_images/{JPEGImages,Annotations}`.
    pub fn from_root(root: &Path) -> Self {
        let base = root.join("Data").join("handbag_images");
        Self::new(base.join("JPEGImages"), base.join("Annotations"))
    }

    /// The annotation file paired with `image_path`.
    pub fn annotation_path_for(&self, image_path: &Path) -> Option<PathBuf> {
        paired_annotation_path(&self.annotations_dir, image_path)
    }
}

/// One indexed image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    pub id: ImageId,
    pub path: PathBuf,
    pub annotation_path: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl ImageRecord {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Indexer options.
#[derive(Clone, Debug)]
pub struct IndexOptions {
    pub layout: DatasetLayout,
    pub split: Split,
    pub min_dim: u32,
    pub max_dim: u32,
    pub eval_pattern: EvalPattern,
    pub image_extension: String,
    /// Compare the image header size with the annotation and warn on mismatch.
    pub verify_image_size: bool,
}

impl IndexOptions {
    pub fn new(layout: DatasetLayout, split: Split, min_dim: u32, max_dim: u32) -> Self {
        Self {
            layout,
            split,
            min_dim,
            max_dim,
            eval_pattern: EvalPattern::default(),
            image_extension: DEFAULT_IMAGE_EXTENSION.to_string(),
            verify_image_size: false,
        }
    }

    pub fn with_split(&self, split: Split) -> Self {
        Self {
            split,
            ..self.clone()
        }
    }

    fn validate(&self) -> Result<(), BagsegError> {
        if self.min_dim > self.max_dim {
            return Err(BagsegError::InvalidConfig {
                message: format!(
                    "min_dim ({}) must not exceed max_dim ({})",
                    self.min_dim, self.max_dim
                ),
            });
        }
        Ok(())
    }

    fn within_bounds(&self, width: u32, height: u32) -> bool {
        let range = self.min_dim..=self.max_dim;
        range.contains(&width) && range.contains(&height)
    }
}

/// Result of one scan, with counts of what was left out.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScanOutcome {
    pub records: Vec<ImageRecord>,
    pub scanned: usize,
    pub malformed: usize,
    pub out_of_bounds: usize,
    pub other_split: usize,
}

/// Index the images of the requested split.
pub fn index_images(options: &IndexOptions) -> Result<Vec<ImageRecord>, BagsegError> {
    Ok(scan(options)?.records)
}

/// Index the images of the requested split and report skip counts.
pub fn scan(options: &IndexOptions) -> Result<ScanOutcome, BagsegError> {
    options.validate()?;

    let image_files = collect_image_files(&options.layout.images_dir, &options.image_extension)?;
    let mut outcome = ScanOutcome {
        scanned: image_files.len(),
        ..Default::default()
    };
    let mut next_id: u64 = 1;

    for image_path in image_files {
        let Some(annotation_path) = options.layout.annotation_path_for(&image_path) else {
            outcome.malformed += 1;
            continue;
        };

        let (width, height) = match read_annotation_size(&annotation_path) {
            Ok(size) => size,
            Err(err) => {
                log::warn!("skipping {}: {}", image_path.display(), err);
                outcome.malformed += 1;
                continue;
            }
        };

        if !options.within_bounds(width, height) {
            log::debug!(
                "skipping {}: {}x{} outside [{}, {}]",
                image_path.display(),
                width,
                height,
                options.min_dim,
                options.max_dim
            );
            outcome.out_of_bounds += 1;
            continue;
        }

        let file_name = image_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        if Split::classify(&file_name, &options.eval_pattern) != options.split {
            outcome.other_split += 1;
            continue;
        }

        if options.verify_image_size {
            check_image_header(&image_path, width, height);
        }

        outcome.records.push(ImageRecord {
            id: ImageId::new(next_id),
            path: image_path,
            annotation_path,
            width,
            height,
        });
        next_id += 1;
    }

    log::info!(
        "indexed {} {} image(s) from {} ({} malformed, {} out of bounds, {} in other split)",
        outcome.records.len(),
        options.split,
        options.layout.images_dir.display(),
        outcome.malformed,
        outcome.out_of_bounds,
        outcome.other_split
    );

    Ok(outcome)
}

fn check_image_header(image_path: &Path, width: u32, height: u32) {
    match imagesize::size(image_path) {
        Ok(size) if size.width == width as usize && size.height == height as usize => {}
        Ok(size) => log::warn!(
            "{}: annotation says {}x{} but image header says {}x{}; keeping annotation size",
            image_path.display(),
            width,
            height,
            size.width,
            size.height
        ),
        Err(err) => log::warn!(
            "{}: cannot read image header: {}",
            image_path.display(),
            err
        ),
    }
}

fn collect_image_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, BagsegError> {
    if !dir.is_dir() {
        return Err(BagsegError::ImageDirInvalid {
            path: dir.to_path_buf(),
            message: "not a directory".to_string(),
        });
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(BagsegError::Io)? {
        let entry = entry.map_err(BagsegError::Io)?;
        let path = entry.path();
        if path.is_file() && has_extension(&path, extension) {
            files.push(path);
        }
    }

    files.sort_by_cached_key(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    });

    let nested = WalkDir::new(dir)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && has_extension(entry.path(), extension))
        .count();
    if nested > 0 {
        log::warn!(
            "image directory {} is scanned flat; ignoring {} .{} file(s) in subdirectories",
            dir.display(),
            nested,
            extension
        );
    }

    Ok(files)
}

/// Exact, case-sensitive extension match: `bot07.PNG` is not a `png` image.
fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(extension)
}
