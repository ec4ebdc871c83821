//! Confidence-gated retry loop.
//!
//! Each round extracts from the current image; when confidence falls short the
//! next strategy in the rotation is applied to that same image, so
//! preprocessing compounds (e.g. binarize, then deskew the binarized page).
//! Round `n` writes `<stem>_retry_<n>_<strategy>.<ext>`, named after the
//! original source so names stay bounded however large the budget.
//! Engine and IO failures end the loop immediately: a different strategy
//! cannot fix a missing binary or an unreadable file.

use std::path::Path;

use tracing::{debug, info, warn};

use super::engine::OcrEngine;
use super::extractor::{extract, ExtractionResult};
use super::image_ref::ImageRef;
use super::preprocessing::{preprocess_to, PreprocessedImage, Strategy};
use crate::error::Result;

/// Strategy rotation and retry budget for one `recover_extract` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPlan {
    rotation: Vec<Strategy>,
    max_retries: u32,
}

impl RetryPlan {
    pub fn new(max_retries: u32) -> Self {
        Self::with_rotation(Strategy::ROTATION.to_vec(), max_retries)
    }

    /// An empty rotation falls back to the default one; a zero budget is raised to one.
    pub fn with_rotation(rotation: Vec<Strategy>, max_retries: u32) -> Self {
        let rotation = if rotation.is_empty() {
            warn!("Empty strategy rotation, using the default");
            Strategy::ROTATION.to_vec()
        } else {
            rotation
        };
        let max_retries = if max_retries == 0 {
            warn!("Retry budget of 0 raised to 1");
            1
        } else {
            max_retries
        };
        Self {
            rotation,
            max_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn rotation(&self) -> &[Strategy] {
        &self.rotation
    }

    /// Strategy applied after the `retry`-th failed extraction (0-based).
    pub fn strategy_for(&self, retry: u32) -> Strategy {
        self.rotation[retry as usize % self.rotation.len()]
    }
}

/// Per-call settings for the retry loop.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryOptions<'a> {
    pub lang: &'a str,
    /// Gate for both retrying and returning text.
    pub threshold: u8,
    pub scratch: &'a Path,
    /// Delete every derived image once the call finishes.
    pub cleanup: bool,
}

/// Extract text from `src`, retrying with the plan's strategies on low confidence.
///
/// Performs at most `max_retries + 1` extractions and `max_retries`
/// preprocessing steps. Returns `text: None` with the last confidence when
/// the budget runs out.
pub fn recover_extract(
    engine: &dyn OcrEngine,
    src: &ImageRef,
    plan: &RetryPlan,
    opts: &RecoveryOptions<'_>,
) -> Result<ExtractionResult> {
    let mut derived = Vec::new();
    let outcome = run_rounds(engine, src, plan, opts, &mut derived);

    if opts.cleanup {
        for image in &derived {
            if let Err(e) = image.remove() {
                warn!(path = %image.path.display(), error = %e, "Failed to remove scratch image");
            }
        }
    }

    outcome
}

fn run_rounds(
    engine: &dyn OcrEngine,
    src: &ImageRef,
    plan: &RetryPlan,
    opts: &RecoveryOptions<'_>,
    derived: &mut Vec<PreprocessedImage>,
) -> Result<ExtractionResult> {
    let mut current = src.clone();
    let mut retry = 0;

    loop {
        let result = extract(engine, &current, opts.lang, opts.threshold)?;

        if result.confidence >= opts.threshold {
            info!(
                source = %src.path().display(),
                retries = retry,
                confidence = result.confidence,
                "Recovered text"
            );
            return Ok(result);
        }

        if retry == plan.max_retries() {
            info!(
                source = %src.path().display(),
                retries = retry,
                confidence = result.confidence,
                "Retry budget exhausted"
            );
            return Ok(ExtractionResult {
                text: None,
                confidence: result.confidence,
            });
        }

        let strategy = plan.strategy_for(retry);
        debug!(
            retry,
            strategy = %strategy,
            confidence = result.confidence,
            threshold = opts.threshold,
            "Low confidence, preprocessing and retrying"
        );

        let dest = src.derived_path(opts.scratch, &retry_suffix(retry + 1, strategy));
        let next = preprocess_to(&current, strategy, dest)?;
        current = ImageRef::new(&next.path)?;
        derived.push(next);
        retry += 1;
    }
}

/// Suffix of the image written by the 1-based retry `round`.
fn retry_suffix(round: u32, strategy: Strategy) -> String {
    format!("retry_{round}_{strategy}")
}
