//! Class catalog: class name to dense 1-based [`ClassId`].
//!
//! Index 0 is the implicit background class `BG`; it is never stored.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::BagsegError;
use crate::ids::ClassId;

/// Name reported for the implicit background class.
pub const BACKGROUND_NAME: &str = "BG";

/// The twelve bag classes, in catalog order.
pub const BAG_CLASSES: [&str; 12] = [
    "black_backpack",
    "nine_west_bag",
    "meixuan_brown_handbag",
    "sm_bdrew_grey_handbag",
    "wine_red_handbag",
    "sm_bclarre_blush_crossbody",
    "mk_brown_wrislet",
    "black_plain_bag",
    "lmk_brown_messenger_bag",
    "sm_peach_backpack",
    "black_ameligalanti",
    "white_bag",
];

/// Ordered, immutable class catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClassCatalog {
    names: Vec<String>,
    #[serde(skip)]
    index_by_name: HashMap<String, ClassId>,
}

impl ClassCatalog {
    /// Build a catalog from names in order. Duplicates are rejected.
    pub fn new<I, S>(names: I) -> Result<Self, BagsegError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut catalog = Self::default();
        for name in names {
            catalog.push(name.into())?;
        }
        Ok(catalog)
    }

    /// Catalog of the twelve bag classes.
    pub fn bags() -> Self {
        Self::new(BAG_CLASSES).expect("built-in class list has no duplicates")
    }

    pub(crate) fn push(&mut self, name: String) -> Result<ClassId, BagsegError> {
        if name.trim().is_empty() {
            return Err(BagsegError::InvalidConfig {
                message: "class names must not be empty".to_string(),
            });
        }
        if self.index_by_name.contains_key(&name) {
            return Err(BagsegError::DuplicateClass(name));
        }
        let id = ClassId::new(self.names.len() as u32 + 1);
        self.index_by_name.insert(name.clone(), id);
        self.names.push(name);
        Ok(id)
    }

    /// Number of registered classes, background excluded.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Number of classes the model predicts, background included.
    pub fn num_classes(&self) -> usize {
        self.names.len() + 1
    }

    pub fn get(&self, name: &str) -> Option<ClassId> {
        self.index_by_name.get(name).copied()
    }

    /// Resolve a class name returned for `image`.
    pub fn resolve(&self, name: &str, image: &Path) -> Result<ClassId, BagsegError> {
        self.get(name).ok_or_else(|| BagsegError::UnknownClass {
            name: name.to_string(),
            image: image.to_path_buf(),
        })
    }

    pub fn name_of(&self, id: ClassId) -> Option<&str> {
        if id.is_background() {
            return Some(BACKGROUND_NAME);
        }
        self.names
            .get(id.as_u32() as usize - 1)
            .map(String::as_str)
    }

    /// Registered classes in index order, background excluded.
    pub fn iter(&self) -> impl Iterator<Item = (ClassId, &str)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(|(idx, name)| (ClassId::new(idx as u32 + 1), name.as_str()))
    }
}

impl fmt::Display for ClassCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:3}. {:50}", 0, BACKGROUND_NAME)?;
        for (id, name) in self.iter() {
            writeln!(f, "{:3}. {:50}", id.as_u32(), name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_dense_and_one_based() {
        let catalog = ClassCatalog::new(["a", "b", "c"]).expect("catalog");
        assert_eq!(catalog.get("a"), Some(ClassId(1)));
        assert_eq!(catalog.get("c"), Some(ClassId(3)));
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.num_classes(), 4);
        let ids: Vec<u32> = catalog.iter().map(|(id, _)| id.as_u32()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn duplicates_are_rejected() {
        let err = ClassCatalog::new(["a", "b", "a"]).unwrap_err();
        assert!(matches!(err, BagsegError::DuplicateClass(name) if name == "a"));
    }

    #[test]
    fn unknown_class_is_typed() {
        let catalog = ClassCatalog::bags();
        let err = catalog
            .resolve("green_tote", Path::new("img.png"))
            .unwrap_err();
        assert!(matches!(err, BagsegError::UnknownClass { name, .. } if name == "green_tote"));
    }

    #[test]
    fn background_name_is_reserved_at_zero() {
        let catalog = ClassCatalog::bags();
        assert_eq!(catalog.name_of(ClassId::BACKGROUND), Some("BG"));
        assert_eq!(catalog.name_of(ClassId(12)), Some("white_bag"));
        assert_eq!(catalog.name_of(ClassId(13)), None);
        assert_eq!(catalog.num_classes(), 13);
    }

    #[test]
    fn display_lists_background_first() {
        let catalog = ClassCatalog::new(["black_backpack"]).expect("catalog");
        let text = catalog.to_string();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("  0. BG"));
        assert!(lines.next().unwrap().starts_with("  1. black_backpack"));
    }
}
