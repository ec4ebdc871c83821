//! OCR Recovery Pipeline
//!
//! Turns an image into text with a confidence score and, when the score is
//! too low, retries with alternative preprocessing until a retry budget runs
//! out.
//!
//! # Architecture
//!
//! - `preprocessing`: `Strategy` (`otsu`, `adaptive`, `deskew`) and the
//!   derived-image writer
//! - `regions`: bounding boxes of ink blocks, with optional crops
//! - `engine`: `OcrEngine` trait and the `TesseractEngine` subprocess backend
//! - `extractor`: confidence aggregation and gating
//! - `recovery`: the retry controller
//! - `pipeline`: `OcrPipeline`, the sync API plus its tokio offload wrappers
//!
//! # Scratch files
//!
//! Derived images are written beside the source (or under
//! `OcrConfig::scratch_dir`) as `<stem>_preprocessed.<ext>`,
//! `<stem>_retry_<strategy>.<ext>` and `<stem>_region_<N>.<ext>`; the retry
//! loop writes `<stem>_retry_<round>_<strategy>.<ext>`. Names depend only on
//! the source, so concurrent calls on the same source must use distinct
//! scratch directories.
//!
//! # Usage
//!
//! ```rust,ignore
//! let pipeline = OcrPipeline::new(&OcrConfig::from_env());
//! let result = pipeline.recover_extract_async("/scans/page.png", 3).await?;
//! ```

mod engine;
mod extractor;
mod image_ref;
mod pipeline;
mod preprocessing;
mod recovery;
mod regions;

pub use engine::{parse_tsv_confidences, OcrEngine, Recognition, TesseractEngine};
pub use extractor::{aggregate_confidence, extract, gate, ExtractionResult};
pub use image_ref::ImageRef;
pub use pipeline::OcrPipeline;
pub use preprocessing::{preprocess, PreprocessedImage, Strategy};
pub use recovery::{recover_extract, RecoveryOptions, RetryPlan};
pub use regions::{detect_regions, Region};
