//! Dataset facade handed to the detection framework.
//!
//! Construction happens in two phases. A [`DatasetBuilder`] accepts class and
//! image registrations; [`DatasetBuilder::prepare`] freezes them into a
//! [`BagsDataset`], which is immutable and safe to share between data-loading
//! workers.

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use crate::catalog::ClassCatalog;
use crate::error::BagsegError;
use crate::ids::{ClassId, ImageId};
use crate::index::{scan, ImageRecord, IndexOptions};
use crate::mask::{MaskSet, MaskSummary, MaskSynthesizer};

/// Unprepared dataset: registrations only.
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    catalog: ClassCatalog,
    records: Vec<ImageRecord>,
    position_by_id: HashMap<ImageId, usize>,
}

impl DatasetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class; ids follow registration order starting at 1.
    pub fn add_class(&mut self, name: impl Into<String>) -> Result<ClassId, BagsegError> {
        self.catalog.push(name.into())
    }

    pub fn add_image(&mut self, record: ImageRecord) -> Result<(), BagsegError> {
        if self.position_by_id.contains_key(&record.id) {
            return Err(BagsegError::DuplicateImageId(record.id));
        }
        self.position_by_id.insert(record.id, self.records.len());
        self.records.push(record);
        Ok(())
    }

    /// Freeze the catalog and image list.
    pub fn prepare(self, synthesizer: Arc<dyn MaskSynthesizer>) -> BagsDataset {
        BagsDataset {
            catalog: self.catalog,
            records: self.records,
            position_by_id: self.position_by_id,
            synthesizer,
        }
    }
}

/// Prepared, read-only dataset.
pub struct BagsDataset {
    catalog: ClassCatalog,
    records: Vec<ImageRecord>,
    position_by_id: HashMap<ImageId, usize>,
    synthesizer: Arc<dyn MaskSynthesizer>,
}

impl fmt::Debug for BagsDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BagsDataset")
            .field("classes", &self.catalog.len())
            .field("images", &self.records.len())
            .finish()
    }
}

impl BagsDataset {
    /// Register `classes`, index the requested split and prepare.
    pub fn load<I, S>(
        options: &IndexOptions,
        classes: I,
        synthesizer: Arc<dyn MaskSynthesizer>,
    ) -> Result<Self, BagsegError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = DatasetBuilder::new();
        for class in classes {
            builder.add_class(class)?;
        }
        for record in scan(options)?.records {
            builder.add_image(record)?;
        }
        Ok(builder.prepare(synthesizer))
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record_at(&self, index: usize) -> Result<&ImageRecord, BagsegError> {
        self.records
            .get(index)
            .ok_or(BagsegError::IndexOutOfRange {
                index,
                len: self.records.len(),
            })
    }

    pub fn record(&self, image_id: ImageId) -> Result<&ImageRecord, BagsegError> {
        self.position_by_id
            .get(&image_id)
            .map(|&position| &self.records[position])
            .ok_or(BagsegError::UnknownImageId(image_id))
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn image_ids(&self) -> Vec<ImageId> {
        self.records.iter().map(|record| record.id).collect()
    }

    /// The identifying path of an image, for diagnostics.
    pub fn reference(&self, image_id: ImageId) -> Result<String, BagsegError> {
        Ok(self.record(image_id)?.path.display().to_string())
    }

    pub fn catalog(&self) -> &ClassCatalog {
        &self.catalog
    }

    /// Class count including background.
    pub fn num_classes(&self) -> usize {
        self.catalog.num_classes()
    }

    /// Synthesize the masks of an image and resolve their class ids.
    ///
    /// Masks are recomputed on every call. A class name missing from the
    /// catalog fails the whole call.
    pub fn masks_for(&self, image_id: ImageId) -> Result<MaskSet, BagsegError> {
        let record = self.record(image_id)?;
        let pairs = self.synthesizer.synthesize(&record.path)?;

        let mut set = MaskSet {
            masks: Vec::with_capacity(pairs.len()),
            class_ids: Vec::with_capacity(pairs.len()),
        };
        for (mask, name) in pairs {
            let class_id = self.catalog.resolve(&name, &record.path)?;
            set.masks.push(mask);
            set.class_ids.push(class_id);
        }
        Ok(set)
    }

    /// Class id and pixel area of each mask of an image.
    pub fn mask_summary(&self, image_id: ImageId) -> Result<Vec<MaskSummary>, BagsegError> {
        Ok(self
            .masks_for(image_id)?
            .iter()
            .map(|(mask, class_id)| MaskSummary {
                class_id,
                area: mask.area(),
            })
            .collect())
    }

    /// Image count, class count and the class table.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        writeln!(out, "Image Count: {}", self.size()).expect("write to string");
        writeln!(out, "Class Count: {}", self.num_classes()).expect("write to string");
        write!(out, "{}", self.catalog).expect("write to string");
        out
    }
}
