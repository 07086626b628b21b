//! Pascal VOC annotation reader.
//!
//! Each image in the bags dataset has a same-named `.xml` file under
//! `Annotations/`. The indexer only needs `size/width` and `size/height`;
//! the `<object>` list is kept so masks can be built from the boxes.

use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::Node;
use serde::Serialize;

use crate::error::BagsegError;

pub const ANNOTATION_EXTENSION: &str = "xml";

/// A parsed VOC annotation file.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Annotation {
    pub filename: Option<String>,
    pub width: u32,
    pub height: u32,
    pub depth: Option<u32>,
    pub objects: Vec<AnnotatedObject>,
}

/// One `<object>` entry: a class name and its pixel-space box.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnnotatedObject {
    pub name: String,
    pub bbox: PixelBox,
}

/// Axis-aligned box in pixel coordinates, `(xmin, ymin)` to `(xmax, ymax)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PixelBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl PixelBox {
    pub fn width(&self) -> f64 {
        (self.xmax - self.xmin).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.ymax - self.ymin).max(0.0)
    }
}

/// Read and parse a VOC annotation file.
pub fn read_annotation(path: &Path) -> Result<Annotation, BagsegError> {
    let xml = fs::read_to_string(path).map_err(|source| BagsegError::MalformedAnnotation {
        path: path.to_path_buf(),
        message: format!("cannot read file: {source}"),
    })?;
    parse_annotation_str(&xml, path)
}

/// Read only the `(width, height)` recorded in an annotation file.
///
/// `<object>` entries are not parsed.
pub fn read_annotation_size(path: &Path) -> Result<(u32, u32), BagsegError> {
    let xml = fs::read_to_string(path).map_err(|source| BagsegError::MalformedAnnotation {
        path: path.to_path_buf(),
        message: format!("cannot read file: {source}"),
    })?;
    let document = parse_document(&xml, path)?;
    let root = annotation_root(&document, path)?;
    let size = required_child_element(root, "size", path, "<annotation>")?;
    Ok((
        parse_required_dim(size, "width", path)?,
        parse_required_dim(size, "height", path)?,
    ))
}

/// The annotation paired with `image_path`: the image file name with its
/// last extension replaced by `.xml`, under `annotations_dir`.
pub fn paired_annotation_path(annotations_dir: &Path, image_path: &Path) -> Option<PathBuf> {
    let mut file_name = image_path.file_stem()?.to_os_string();
    file_name.push(".");
    file_name.push(ANNOTATION_EXTENSION);
    Some(annotations_dir.join(file_name))
}

/// Parse an annotation from a UTF-8 string.
///
/// Useful for testing/fuzzing parse behavior in-memory.
pub fn from_annotation_str(xml: &str) -> Result<Annotation, BagsegError> {
    parse_annotation_str(xml, Path::new("<memory>"))
}

/// Parse an annotation from bytes. The input must be valid UTF-8.
pub fn from_annotation_slice(bytes: &[u8]) -> Result<Annotation, BagsegError> {
    let xml = std::str::from_utf8(bytes).map_err(|source| BagsegError::MalformedAnnotation {
        path: PathBuf::from("<memory>"),
        message: format!("input is not valid UTF-8: {source}"),
    })?;
    from_annotation_str(xml)
}

fn parse_document<'input>(
    xml: &'input str,
    path: &Path,
) -> Result<roxmltree::Document<'input>, BagsegError> {
    roxmltree::Document::parse(xml).map_err(|source| BagsegError::MalformedAnnotation {
        path: path.to_path_buf(),
        message: source.to_string(),
    })
}

fn annotation_root<'a, 'input>(
    document: &'a roxmltree::Document<'input>,
    path: &Path,
) -> Result<Node<'a, 'input>, BagsegError> {
    let root = document.root_element();
    if root.tag_name().name() != "annotation" {
        return Err(malformed(path, "missing <annotation> root element"));
    }
    Ok(root)
}

fn parse_annotation_str(xml: &str, path: &Path) -> Result<Annotation, BagsegError> {
    let document = parse_document(xml, path)?;
    let root = annotation_root(&document, path)?;

    let filename = optional_child_text(root, "filename");

    let size = required_child_element(root, "size", path, "<annotation>")?;
    let width = parse_required_dim(size, "width", path)?;
    let height = parse_required_dim(size, "height", path)?;
    let depth = optional_child_text(size, "depth")
        .map(|raw| {
            raw.parse::<u32>().map_err(|_| {
                malformed(
                    path,
                    &format!("invalid <depth> value '{raw}' in <size>; expected u32"),
                )
            })
        })
        .transpose()?;

    let mut objects = Vec::new();
    for object in root
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "object")
    {
        let name = required_child_text(object, "name", path, "<object>")?;
        let bndbox = required_child_element(object, "bndbox", path, "<object>")?;

        objects.push(AnnotatedObject {
            name,
            bbox: PixelBox {
                xmin: parse_required_f64(bndbox, "xmin", path)?,
                ymin: parse_required_f64(bndbox, "ymin", path)?,
                xmax: parse_required_f64(bndbox, "xmax", path)?,
                ymax: parse_required_f64(bndbox, "ymax", path)?,
            },
        });
    }

    Ok(Annotation {
        filename,
        width,
        height,
        depth,
        objects,
    })
}

fn malformed(path: &Path, message: &str) -> BagsegError {
    BagsegError::MalformedAnnotation {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn required_child_element<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<Node<'a, 'input>, BagsegError> {
    child_element(node, tag).ok_or_else(|| malformed(path, &format!("missing <{tag}> in {context}")))
}

fn required_child_text(
    node: Node<'_, '_>,
    tag: &str,
    path: &Path,
    context: &str,
) -> Result<String, BagsegError> {
    optional_child_text(node, tag)
        .ok_or_else(|| malformed(path, &format!("missing <{tag}> in {context}")))
}

fn parse_required_dim(node: Node<'_, '_>, tag: &str, path: &Path) -> Result<u32, BagsegError> {
    let raw = required_child_text(node, tag, path, "<size>")?;
    match raw.parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(malformed(
            path,
            &format!("invalid <{tag}> value '{raw}' in <size>; expected positive integer"),
        )),
    }
}

fn parse_required_f64(node: Node<'_, '_>, tag: &str, path: &Path) -> Result<f64, BagsegError> {
    let raw = required_child_text(node, tag, path, "<bndbox>")?;
    raw.parse::<f64>().map_err(|_| {
        malformed(
            path,
            &format!("invalid <{tag}> value '{raw}' in <bndbox>; expected floating-point number"),
        )
    })
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn optional_child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}
