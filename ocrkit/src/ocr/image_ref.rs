use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use mime_guess::Mime;
use tracing::debug;

use crate::error::{OcrKitError, Result};

const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// A caller-owned source image on disk.
///
/// The path is made absolute on construction and the encoding is inferred
/// from the extension, which must be one of `png`, `jpg` or `jpeg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    path: PathBuf,
    stem: String,
    extension: String,
    mime: Mime,
    format: ImageFormat,
}

impl ImageRef {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                OcrKitError::Image(format!(
                    "Image path has no extension: {}",
                    path.display()
                ))
            })?;

        if !SUPPORTED_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str()) {
            return Err(OcrKitError::Image(format!(
                "Unsupported image extension '{extension}': {}",
                path.display()
            )));
        }

        let format = ImageFormat::from_extension(&extension).ok_or_else(|| {
            OcrKitError::Image(format!("No encoder for extension '{extension}'"))
        })?;

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                OcrKitError::Image(format!("Image path has no file name: {}", path.display()))
            })?;

        let mime = mime_guess::from_path(&path).first_or_octet_stream();

        Ok(Self {
            path,
            stem,
            extension,
            mime,
            format,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn mime(&self) -> &Mime {
        &self.mime
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Fails with `Io` if the file is missing or unreadable.
    pub fn ensure_readable(&self) -> Result<()> {
        std::fs::File::open(&self.path)?;
        Ok(())
    }

    pub fn open(&self) -> Result<DynamicImage> {
        let img = image::open(&self.path)?;
        debug!(
            path = %self.path.display(),
            width = img.width(),
            height = img.height(),
            "Loaded source image"
        );
        Ok(img)
    }

    /// Directory scratch images go to: the configured root, else beside the source.
    pub fn scratch_root(&self, configured: Option<&Path>) -> PathBuf {
        match configured {
            Some(dir) => dir.to_path_buf(),
            None => self
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    /// `<scratch>/<stem>_<suffix>.<ext>`
    pub fn derived_path(&self, scratch: &Path, suffix: &str) -> PathBuf {
        scratch.join(format!("{}_{}.{}", self.stem, suffix, self.extension))
    }

    /// Encode `img` with this image's format at `dest`.
    pub fn write_derived(&self, img: &DynamicImage, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let img = match self.format {
            // JPEG has no alpha channel.
            ImageFormat::Jpeg if img.color().has_alpha() => DynamicImage::ImageRgb8(img.to_rgb8()),
            _ => img.clone(),
        };
        img.save_with_format(dest, self.format)?;
        debug!(path = %dest.display(), "Wrote scratch image");
        Ok(())
    }
}
