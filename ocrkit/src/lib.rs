pub mod config;
pub mod error;
pub mod ocr;

pub use config::{OcrConfig, RegionConfig};
pub use error::{OcrKitError, Result};
pub use ocr::{ExtractionResult, OcrEngine, OcrPipeline, Recognition, Region, Strategy};
