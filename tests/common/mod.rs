#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use bagseg::index::DatasetLayout;
use tempfile::TempDir;

/// Minimal PNG: signature plus an IHDR chunk, enough for header readers.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(33);
    bytes.extend_from_slice(&[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n']);
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&[8, 2, 0, 0, 0]);
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes
}

pub fn annotation_xml(file_name: &str, width: u32, height: u32, objects: &[(&str, [f64; 4])]) -> String {
    let mut xml = String::new();
    writeln!(xml, "<annotation>").unwrap();
    writeln!(xml, "  <folder>JPEGImages</folder>").unwrap();
    writeln!(xml, "  <filename>{file_name}</filename>").unwrap();
    writeln!(
        xml,
        "  <size><width>{width}</width><height>{height}</height><depth>3</depth></size>"
    )
    .unwrap();
    for (name, [xmin, ymin, xmax, ymax]) in objects {
        writeln!(
            xml,
            "  <object><name>{name}</name><bndbox><xmin>{xmin}</xmin><ymin>{ymin}</ymin>\
             <xmax>{xmax}</xmax><ymax>{ymax}</ymax></bndbox></object>"
        )
        .unwrap();
    }
    writeln!(xml, "</annotation>").unwrap();
    xml
}

/// A bags dataset laid out under a temporary root.
pub struct BagsFixture {
    pub root: TempDir,
    pub layout: DatasetLayout,
}

impl BagsFixture {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        let layout = DatasetLayout::from_root(root.path());
        fs::create_dir_all(&layout.images_dir).expect("create images dir");
        fs::create_dir_all(&layout.annotations_dir).expect("create annotations dir");
        Self { root, layout }
    }

    pub fn root_path(&self) -> &Path {
        self.root.path()
    }

    pub fn image_path(&self, file_name: &str) -> PathBuf {
        self.layout.images_dir.join(file_name)
    }

    /// Add an image and its annotation with the same size.
    pub fn add(&self, file_name: &str, width: u32, height: u32) -> &Self {
        self.add_with_objects(file_name, width, height, &[])
    }

    pub fn add_with_objects(
        &self,
        file_name: &str,
        width: u32,
        height: u32,
        objects: &[(&str, [f64; 4])],
    ) -> &Self {
        fs::write(self.image_path(file_name), png_bytes(width, height)).expect("write image");
        self.write_annotation(file_name, &annotation_xml(file_name, width, height, objects));
        self
    }

    /// Add an image whose annotation has the given raw XML.
    pub fn add_raw(&self, file_name: &str, xml: &str) -> &Self {
        fs::write(self.image_path(file_name), png_bytes(1, 1)).expect("write image");
        self.write_annotation(file_name, xml);
        self
    }

    /// Add an image with no annotation file at all.
    pub fn add_unannotated(&self, file_name: &str) -> &Self {
        fs::write(self.image_path(file_name), png_bytes(1, 1)).expect("write image");
        self
    }

    fn write_annotation(&self, file_name: &str, xml: &str) {
        let xml_path = self
            .layout
            .annotation_path_for(Path::new(file_name))
            .expect("annotation path");
        fs::write(xml_path, xml).expect("write annotation");
    }
}
