use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrKitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(String),

    #[error("OCR engine error: {0}")]
    OcrEngine(String),

    #[error("Unknown preprocessing strategy: {0}")]
    UnknownStrategy(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OcrKitError {
    /// True for failures reading the source or writing a scratch image.
    pub fn is_io(&self) -> bool {
        matches!(self, OcrKitError::Io(_) | OcrKitError::Image(_))
    }

    pub fn is_engine(&self) -> bool {
        matches!(self, OcrKitError::OcrEngine(_))
    }
}

impl From<image::ImageError> for OcrKitError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => OcrKitError::Io(e),
            other => OcrKitError::Image(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, OcrKitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_io_error_maps_to_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: OcrKitError = image::ImageError::IoError(io).into();
        assert!(matches!(err, OcrKitError::Io(_)));
        assert!(err.is_io());
    }

    #[test]
    fn test_unsupported_image_error_maps_to_image() {
        let unsupported = image::ImageError::Unsupported(
            image::error::UnsupportedError::from_format_and_kind(
                image::error::ImageFormatHint::Unknown,
                image::error::UnsupportedErrorKind::Format(
                    image::error::ImageFormatHint::Unknown,
                ),
            ),
        );
        let err: OcrKitError = unsupported.into();
        assert!(matches!(err, OcrKitError::Image(_)));
        assert!(err.is_io());
        assert!(!err.is_engine());
    }

    #[test]
    fn test_error_display() {
        let err = OcrKitError::UnknownStrategy("sharpen".to_string());
        assert_eq!(err.to_string(), "Unknown preprocessing strategy: sharpen");
    }
}
