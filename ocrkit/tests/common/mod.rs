// Common test utilities for integration tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};

use image::{DynamicImage, GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use ocrkit::config::RegionConfig;
use ocrkit::{OcrConfig, OcrEngine, OcrKitError, Recognition, Result};

static INIT: Once = Once::new();

/// Initialize tracing subscriber once for tests
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Config that never touches the environment or a real tesseract install.
pub fn test_config() -> OcrConfig {
    OcrConfig {
        tesseract_path: PathBuf::from("/nonexistent/bin/tesseract"),
        languages: "eng".to_string(),
        extraction_threshold: 80,
        retry_threshold: 80,
        max_retries: 3,
        scratch_dir: None,
        cleanup_scratch: false,
        region: RegionConfig {
            binary_threshold: 127,
            min_width: 50,
            min_height: 10,
            write_crops: true,
        },
    }
}

/// Dark bars standing in for lines of text on a light page.
pub fn write_text_page(path: &Path) {
    let mut page = GrayImage::from_pixel(320, 200, Luma([245]));
    for line in 0..4i32 {
        draw_filled_rect_mut(
            &mut page,
            Rect::at(24, 24 + line * 40).of_size(260, 14),
            Luma([20]),
        );
    }
    DynamicImage::ImageLuma8(page)
        .save(path)
        .unwrap_or_else(|e| panic!("Failed to write test page {}: {e}", path.display()));
}

pub fn write_blank_page(path: &Path) {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(320, 200, Luma([255])))
        .save(path)
        .unwrap_or_else(|e| panic!("Failed to write blank page {}: {e}", path.display()));
}

/// Two dark paragraph blocks separated by whitespace.
pub fn write_two_paragraph_page(path: &Path) {
    let mut page = GrayImage::from_pixel(600, 400, Luma([255]));
    draw_filled_rect_mut(&mut page, Rect::at(40, 40).of_size(500, 120), Luma([15]));
    draw_filled_rect_mut(&mut page, Rect::at(40, 230).of_size(420, 110), Luma([15]));
    DynamicImage::ImageLuma8(page)
        .save(path)
        .unwrap_or_else(|e| panic!("Failed to write paragraph page {}: {e}", path.display()));
}

/// File names in `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("Failed to read scratch directory")
        .map(|entry| {
            entry
                .expect("Failed to read directory entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}

/// Engine that replays a fixed list of confidences and records every call.
///
/// Once the script runs out the last confidence repeats.
pub struct ScriptedEngine {
    text: String,
    confidences: Vec<f32>,
    calls: Mutex<Vec<(PathBuf, String)>>,
}

impl ScriptedEngine {
    pub fn new(text: &str, confidences: &[f32]) -> Self {
        Self {
            text: text.to_string(),
            confidences: confidences.to_vec(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(PathBuf, String)> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock poisoned").len()
    }
}

impl OcrEngine for ScriptedEngine {
    fn recognize(&self, image: &Path, lang: &str) -> Result<Recognition> {
        let mut calls = self.calls.lock().expect("calls lock poisoned");
        let index = calls.len().min(self.confidences.len().saturating_sub(1));
        calls.push((image.to_path_buf(), lang.to_string()));

        let conf = self.confidences.get(index).copied().unwrap_or(0.0);
        Ok(Recognition {
            text: self.text.clone(),
            // A layout row plus two words at the scripted confidence.
            token_confidences: vec![-1.0, conf, conf],
        })
    }
}

/// Engine that always fails the way a missing binary does.
pub struct BrokenEngine;

impl OcrEngine for BrokenEngine {
    fn recognize(&self, _image: &Path, _lang: &str) -> Result<Recognition> {
        Err(OcrKitError::OcrEngine(
            "Failed to run OCR engine: No such file or directory".to_string(),
        ))
    }
}
