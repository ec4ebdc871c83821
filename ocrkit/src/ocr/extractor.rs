use serde::{Deserialize, Serialize};
use tracing::info;

use super::engine::{OcrEngine, Recognition};
use super::image_ref::ImageRef;
use crate::error::Result;

/// Text recognized from one image, gated on confidence.
///
/// `text` is `None` when the engine ran but its confidence fell below the
/// gate, which is distinct from an error (the engine could not run at all).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: Option<String>,
    pub confidence: u8,
}

impl ExtractionResult {
    pub fn is_accepted(&self) -> bool {
        self.text.is_some()
    }
}

/// Mean of the strictly positive token confidences, truncated to `0..=100`.
pub fn aggregate_confidence(token_confidences: &[f32]) -> u8 {
    let positive: Vec<f32> = token_confidences
        .iter()
        .copied()
        .filter(|c| *c > 0.0)
        .collect();
    if positive.is_empty() {
        return 0;
    }
    let mean = positive.iter().sum::<f32>() / positive.len() as f32;
    mean.clamp(0.0, 100.0) as u8
}

/// Apply the confidence gate to a raw recognition.
pub fn gate(recognition: Recognition, threshold: u8) -> ExtractionResult {
    let confidence = aggregate_confidence(&recognition.token_confidences);
    let text = (confidence >= threshold).then_some(recognition.text);
    ExtractionResult { text, confidence }
}

/// Run `engine` on `image` and gate the result on `threshold`.
///
/// `lang` goes to the engine untouched.
pub fn extract(
    engine: &dyn OcrEngine,
    image: &ImageRef,
    lang: &str,
    threshold: u8,
) -> Result<ExtractionResult> {
    image.ensure_readable()?;

    let recognition = engine.recognize(image.path(), lang)?;
    let result = gate(recognition, threshold);

    info!(
        image = %image.path().display(),
        lang,
        confidence = result.confidence,
        threshold,
        accepted = result.is_accepted(),
        "Extracted text"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrKitError;
    use std::path::Path;
    use std::sync::Mutex;

    struct FixedEngine {
        recognition: Recognition,
        langs: Mutex<Vec<String>>,
    }

    impl OcrEngine for FixedEngine {
        fn recognize(&self, _image: &Path, lang: &str) -> Result<Recognition> {
            self.langs.lock().unwrap().push(lang.to_string());
            Ok(self.recognition.clone())
        }
    }

    fn fixed(text: &str, confs: &[f32]) -> FixedEngine {
        FixedEngine {
            recognition: Recognition {
                text: text.to_string(),
                token_confidences: confs.to_vec(),
            },
            langs: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn test_aggregate_ignores_non_positive() {
        assert_eq!(aggregate_confidence(&[-1.0, 0.0, 90.0, 80.0]), 85);
    }

    #[test]
    fn test_aggregate_empty_is_zero() {
        assert_eq!(aggregate_confidence(&[]), 0);
        assert_eq!(aggregate_confidence(&[-1.0, -1.0, 0.0]), 0);
    }

    #[test]
    fn test_aggregate_truncates() {
        assert_eq!(aggregate_confidence(&[96.9, 95.9]), 96);
    }

    #[test]
    fn test_aggregate_stays_in_range() {
        assert_eq!(aggregate_confidence(&[250.0]), 100);
    }

    #[test]
    fn test_gate_accepts_at_threshold() {
        let result = gate(
            Recognition {
                text: "hello".to_string(),
                token_confidences: vec![80.0],
            },
            80,
        );
        assert_eq!(result.text.as_deref(), Some("hello"));
        assert_eq!(result.confidence, 80);
    }

    #[test]
    fn test_gate_rejects_below_threshold() {
        let result = gate(
            Recognition {
                text: "he1lo".to_string(),
                token_confidences: vec![79.5],
            },
            80,
        );
        assert!(result.text.is_none());
        assert_eq!(result.confidence, 79);
    }

    #[test]
    fn test_extract_passes_language_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        image::GrayImage::new(4, 4).save(&path).unwrap();
        let image = ImageRef::new(&path).unwrap();
        let engine = fixed("Hallo", &[92.0]);

        let result = extract(&engine, &image, "deu+not-a-lang", 80).unwrap();
        assert_eq!(result.text.as_deref(), Some("Hallo"));
        assert_eq!(*engine.langs.lock().unwrap(), vec!["deu+not-a-lang".to_string()]);
    }

    #[test]
    fn test_extract_missing_source_skips_engine() {
        let image = ImageRef::new("/no/such/scan.png").unwrap();
        let engine = fixed("unused", &[99.0]);

        let err = extract(&engine, &image, "eng", 80).unwrap_err();
        assert!(matches!(err, OcrKitError::Io(_)));
        assert!(engine.langs.lock().unwrap().is_empty());
    }
}
