use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Read `var` and parse its trimmed value. Unset or blank variables yield
/// `None`; unparseable ones are logged and yield `None` too.
fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let raw = env::var(var).ok()?;
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    value
        .parse()
        .map_err(|e| tracing::warn!(var, value, error = %e, "Ignoring invalid environment value"))
        .ok()
}

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    parse_env_opt(var).unwrap_or(default)
}

/// Confidence gates live on the 0..=100 scale reported by the engine.
fn parse_threshold(var: &str, default: u8) -> u8 {
    let value: u8 = parse_env_or(var, default);
    if value > 100 {
        tracing::warn!(var, value, "Threshold exceeds 100, clamping");
        100
    } else {
        value
    }
}

pub const DEFAULT_TESSERACT_PATH: &str = "/usr/bin/tesseract";
pub const DEFAULT_LANGUAGE: &str = "eng";
pub const DEFAULT_CONFIDENCE_THRESHOLD: u8 = 80;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub tesseract_path: PathBuf,
    pub languages: String,
    /// Gate applied by `extract_text` when no threshold is supplied.
    pub extraction_threshold: u8,
    /// Gate used by the retry controller, independent of `extraction_threshold`.
    pub retry_threshold: u8,
    pub max_retries: u32,
    /// Where derived images are written. `None` writes beside the source.
    pub scratch_dir: Option<PathBuf>,
    /// Remove intermediate retry images once `recover_extract` returns.
    pub cleanup_scratch: bool,
    pub region: RegionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegionConfig {
    pub binary_threshold: u8,
    pub min_width: u32,
    pub min_height: u32,
    pub write_crops: bool,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            binary_threshold: parse_env_or("OCR_REGION_THRESHOLD", 127),
            min_width: parse_env_or("OCR_REGION_MIN_WIDTH", 50),
            min_height: parse_env_or("OCR_REGION_MIN_HEIGHT", 10),
            write_crops: parse_env_or("OCR_REGION_WRITE_CROPS", true),
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: env::var("OCR_TESSERACT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_TESSERACT_PATH)),
            languages: env::var("OCR_LANGUAGES").unwrap_or_else(|_| DEFAULT_LANGUAGE.to_string()),
            extraction_threshold: parse_threshold(
                "OCR_CONFIDENCE_THRESHOLD",
                DEFAULT_CONFIDENCE_THRESHOLD,
            ),
            retry_threshold: parse_threshold("OCR_RETRY_THRESHOLD", DEFAULT_CONFIDENCE_THRESHOLD),
            max_retries: parse_env_or("OCR_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            scratch_dir: parse_env_opt("OCR_SCRATCH_DIR"),
            cleanup_scratch: parse_env_or("OCR_CLEANUP_SCRATCH", false),
            region: RegionConfig::default(),
        }
    }
}

impl OcrConfig {
    pub fn from_env() -> Self {
        Self::default()
    }
}
