//! Instance masks and the mask synthesizer seam.
//!
//! The dataset facade never builds masks itself. It asks a
//! [`MaskSynthesizer`] for `(mask, class name)` pairs and resolves the names
//! through the class catalog.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::annotation::{paired_annotation_path, read_annotation, PixelBox};
use crate::error::BagsegError;
use crate::ids::ClassId;

/// A `width x height` binary mask stored row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl BinaryMask {
    /// An all-false mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    /// Wrap row-major bits; `bits.len()` must equal `width * height`.
    pub fn from_bits(width: u32, height: u32, bits: Vec<bool>) -> Result<Self, BagsegError> {
        let expected = width as usize * height as usize;
        if bits.len() != expected {
            return Err(BagsegError::InvalidMask {
                message: format!(
                    "{} bit(s) supplied for a {width}x{height} mask (expected {expected})",
                    bits.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            bits,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[self.offset(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if x < self.width && y < self.height {
            let offset = self.offset(x, y);
            self.bits[offset] = value;
        }
    }

    /// Set every pixel overlapped by `bbox`, clipped to the mask.
    pub fn fill_box(&mut self, bbox: &PixelBox) {
        let x0 = clip(bbox.xmin.floor(), self.width);
        let y0 = clip(bbox.ymin.floor(), self.height);
        let x1 = clip(bbox.xmax.ceil(), self.width);
        let y1 = clip(bbox.ymax.ceil(), self.height);

        for y in y0..y1 {
            for x in x0..x1 {
                self.set(x, y, true);
            }
        }
    }

    /// Number of set pixels.
    pub fn area(&self) -> usize {
        self.bits.iter().filter(|bit| **bit).count()
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

fn clip(value: f64, limit: u32) -> u32 {
    value.max(0.0).min(limit as f64) as u32
}

/// Masks for one image, each paired with its resolved class.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaskSet {
    pub masks: Vec<BinaryMask>,
    pub class_ids: Vec<ClassId>,
}

impl MaskSet {
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BinaryMask, ClassId)> + '_ {
        self.masks.iter().zip(self.class_ids.iter().copied())
    }
}

/// Per-mask summary used in plans and logs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MaskSummary {
    pub class_id: ClassId,
    pub area: usize,
}

/// Produces instance masks and class names for an image.
///
/// Implementations must be deterministic for the same image unless they
/// document otherwise; the dataset facade does not cache results.
pub trait MaskSynthesizer: Send + Sync {
    fn synthesize(&self, image_path: &Path) -> Result<Vec<(BinaryMask, String)>, BagsegError>;
}

/// Rasterises the bounding boxes of the paired VOC annotation, one mask per
/// `<object>`.
#[derive(Clone, Debug)]
pub struct BoxMaskSynthesizer {
    annotations_dir: PathBuf,
}

impl BoxMaskSynthesizer {
    pub fn new(annotations_dir: impl Into<PathBuf>) -> Self {
        Self {
            annotations_dir: annotations_dir.into(),
        }
    }

    fn annotation_path(&self, image_path: &Path) -> Result<PathBuf, BagsegError> {
        paired_annotation_path(&self.annotations_dir, image_path).ok_or_else(|| {
            BagsegError::MalformedAnnotation {
                path: image_path.to_path_buf(),
                message: "image path has no file name".to_string(),
            }
        })
    }
}

impl MaskSynthesizer for BoxMaskSynthesizer {
    fn synthesize(&self, image_path: &Path) -> Result<Vec<(BinaryMask, String)>, BagsegError> {
        let annotation = read_annotation(&self.annotation_path(image_path)?)?;

        Ok(annotation
            .objects
            .into_iter()
            .map(|object| {
                let mut mask = BinaryMask::new(annotation.width, annotation.height);
                mask.fill_box(&object.bbox);
                (mask, object.name)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bits_checks_length() {
        assert!(BinaryMask::from_bits(2, 2, vec![true; 4]).is_ok());
        let err = BinaryMask::from_bits(2, 2, vec![true; 3]).unwrap_err();
        assert!(matches!(err, BagsegError::InvalidMask { .. }));
    }

    #[test]
    fn fill_box_is_clipped_to_mask() {
        let mut mask = BinaryMask::new(10, 10);
        mask.fill_box(&PixelBox {
            xmin: -5.0,
            ymin: 8.0,
            xmax: 3.0,
            ymax: 20.0,
        });
        assert_eq!(mask.area(), 3 * 2);
        assert!(mask.get(0, 9));
        assert!(!mask.get(3, 9));
        assert!(!mask.get(100, 100));
    }

    #[test]
    fn box_synthesizer_reads_paired_annotation() {
        let temp = tempfile::tempdir().expect("create temp dir");
        std::fs::write(
            temp.path().join("bag001.xml"),
            "<annotation><size><width>4</width><height>4</height></size>\
             <object><name>white_bag</name><bndbox><xmin>0</xmin><ymin>0</ymin>\
             <xmax>2</xmax><ymax>2</ymax></bndbox></object></annotation>",
        )
        .expect("write xml");

        let synth = BoxMaskSynthesizer::new(temp.path());
        let masks = synth
            .synthesize(Path::new("/images/JPEGImages/bag001.png"))
            .expect("synthesize");
        assert_eq!(masks.len(), 1);
        assert_eq!(masks[0].1, "white_bag");
        assert_eq!(masks[0].0.area(), 4);
    }

    #[test]
    fn box_synthesizer_pairs_multi_dot_names() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let xml = |side: u32| {
            format!(
                "<annotation><size><width>{side}</width><height>{side}</height></size>\
                 <object><name>white_bag</name><bndbox><xmin>0</xmin><ymin>0</ymin>\
                 <xmax>1</xmax><ymax>1</ymax></bndbox></object></annotation>"
            )
        };
        std::fs::write(temp.path().join("bag.v2.xml"), xml(3)).expect("write xml");
        std::fs::write(temp.path().join("bag.xml"), xml(8)).expect("write decoy");

        let masks = BoxMaskSynthesizer::new(temp.path())
            .synthesize(Path::new("bag.v2.png"))
            .expect("synthesize");
        assert_eq!(masks[0].0.width(), 3);
    }
}
