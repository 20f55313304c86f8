#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use image::{ImageFormat, Rgb, RgbImage};
use lookalike::embedding::{EmbeddingCapability, Extractor, EMBEDDING_DIM};
use lookalike::store::{FeatureStore, FeatureStoreBuilder, ImageRecord};
use ndarray::Array4;
use tempfile::TempDir;

pub const RED: [u8; 3] = [255, 0, 0];
pub const DARK_RED: [u8; 3] = [128, 0, 0];
pub const GREEN: [u8; 3] = [0, 255, 0];
pub const BLUE: [u8; 3] = [0, 0, 255];

/// Deterministic stand-in for the model: per-channel means, repeated to `dims`.
///
/// Solid primaries come out at cosine -1/3 from each other and exactly 1 from
/// themselves.
pub struct MeanColor {
    pub dims: usize,
}

impl EmbeddingCapability for MeanColor {
    fn embed(&self, input: &Array4<f32>) -> Result<Vec<f32>> {
        let pixels = (input.shape()[1] * input.shape()[2]) as f32;
        let mut means = [0.0f32; 3];
        for ((_, _, _, c), v) in input.indexed_iter() {
            means[c] += v / pixels;
        }
        Ok((0..self.dims).map(|i| means[i % 3]).collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Sleeps before answering, to exercise timeouts.
pub struct Slow(pub Duration);

impl EmbeddingCapability for Slow {
    fn embed(&self, _input: &Array4<f32>) -> Result<Vec<f32>> {
        std::thread::sleep(self.0);
        Ok(vec![1.0; EMBEDDING_DIM])
    }
}

pub fn stub_extractor() -> Extractor {
    Extractor::new(Arc::new(MeanColor { dims: EMBEDDING_DIM }), 32)
}

pub fn png_bytes(rgb: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(16, 16, Rgb(rgb));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

pub fn write_png(path: &Path, rgb: [u8; 3]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, png_bytes(rgb)).unwrap();
}

/// A fixture tree under `<tmp>/static/dataset`:
///
/// ```text
/// Cats/a_red.png  Cats/b_dark_red.png  Cats/notes.txt  Cats/nested/
/// Dogs/blue.png   Dogs/green.png
/// Empty/
/// README.md
/// ```
pub struct Dataset {
    pub tmp: TempDir,
    pub asset_root: PathBuf,
    pub root: PathBuf,
}

impl Dataset {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let asset_root = tmp.path().join("static");
        let root = asset_root.join("dataset");
        std::fs::create_dir_all(&root).unwrap();
        Self {
            tmp,
            asset_root,
            root,
        }
    }

    pub fn populated() -> Self {
        let ds = Self::new();
        write_png(&ds.root.join("Cats/a_red.png"), RED);
        write_png(&ds.root.join("Cats/b_dark_red.png"), DARK_RED);
        std::fs::write(ds.root.join("Cats/notes.txt"), "not an image").unwrap();
        std::fs::create_dir_all(ds.root.join("Cats/nested")).unwrap();
        write_png(&ds.root.join("Dogs/green.png"), GREEN);
        write_png(&ds.root.join("Dogs/blue.png"), BLUE);
        std::fs::create_dir_all(ds.root.join("Empty")).unwrap();
        std::fs::write(ds.root.join("README.md"), "top-level files are ignored").unwrap();
        ds
    }

    pub fn store_path(&self) -> PathBuf {
        self.tmp.path().join("features.db")
    }
}

/// Build a store directly from `(embedding, relative_path, category)` triples.
pub fn store_of(entries: &[(Vec<f32>, &str, &str)]) -> FeatureStore {
    let dims = entries.first().map(|e| e.0.len()).unwrap_or(EMBEDDING_DIM);
    let mut builder = FeatureStoreBuilder::new(dims);
    for (embedding, path, category) in entries {
        builder
            .push(
                embedding,
                ImageRecord {
                    relative_path: path.to_string(),
                    category: category.to_string(),
                },
            )
            .unwrap();
    }
    builder.finish()
}
