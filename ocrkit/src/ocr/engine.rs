use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, warn};

use crate::error::{OcrKitError, Result};

/// Raw engine output for one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recognition {
    pub text: String,
    /// Per-token confidences on the engine's 0..100 scale. Layout rows
    /// report -1 and are kept here; filtering happens in the extractor.
    pub token_confidences: Vec<f32>,
}

/// Anything that can turn an image file into text plus token confidences.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &Path, lang: &str) -> Result<Recognition>;
}

/// Runs the `tesseract` binary as a subprocess, once per output mode.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
}

impl TesseractEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn is_available(&self) -> bool {
        self.binary.is_file()
    }

    fn run(&self, image: &Path, lang: &str, extra: &[&str]) -> Result<Output> {
        let output = Command::new(&self.binary)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(lang)
            .args(extra)
            .output()
            .map_err(|e| {
                OcrKitError::OcrEngine(format!(
                    "Failed to run OCR engine {}: {e}",
                    self.binary.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrKitError::OcrEngine(format!(
                "OCR engine exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(output)
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &Path, lang: &str) -> Result<Recognition> {
        debug!(
            binary = %self.binary.display(),
            image = %image.display(),
            lang,
            "Running tesseract"
        );

        let tsv = self.run(image, lang, &["tsv"])?;
        let token_confidences = parse_tsv_confidences(&tsv.stdout)?;

        let plain = self.run(image, lang, &[])?;
        let text = String::from_utf8_lossy(&plain.stdout).trim_end().to_string();

        Ok(Recognition {
            text,
            token_confidences,
        })
    }
}

/// Pull the `conf` column out of tesseract's TSV output.
pub fn parse_tsv_confidences(tsv: &[u8]) -> Result<Vec<f32>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .from_reader(tsv);

    let conf_index = reader
        .headers()
        .map_err(|e| OcrKitError::OcrEngine(format!("Failed to read TSV header: {e}")))?
        .iter()
        .position(|h| h.trim() == "conf")
        .ok_or_else(|| OcrKitError::OcrEngine("TSV output has no 'conf' column".to_string()))?;

    let mut confidences = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| OcrKitError::OcrEngine(format!("Failed to read TSV row: {e}")))?;
        let Some(raw) = record.get(conf_index) else {
            warn!(line = line + 2, "TSV row is missing the conf field, skipping");
            continue;
        };
        let conf: f32 = raw.trim().parse().map_err(|e| {
            OcrKitError::OcrEngine(format!(
                "Unparseable confidence '{raw}' on TSV line {}: {e}",
                line + 2
            ))
        })?;
        confidences.push(conf);
    }

    Ok(confidences)
}
