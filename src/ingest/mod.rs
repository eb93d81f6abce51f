//! Frame sources.
//!
//! - Synthetic source (`stub://name`) for demos and tests
//! - Directory of still images (feature: ingest-image-dir), played in name order
//!
//! All sources produce `Frame` instances that are handed to the pipeline for one
//! cycle and then dropped. Sources MUST NOT store frames or log pixel content.
//!
//! Opening a source that cannot deliver frames fails with `AcquisitionError`.

#[cfg(feature = "ingest-image-dir")]
pub mod image_dir;
pub mod synthetic;

use anyhow::Result;
use std::fmt;

use crate::frame::Frame;

#[cfg(feature = "ingest-image-dir")]
pub use image_dir::ImageDirSource;
pub use synthetic::SyntheticSource;

/// Camera/media acquisition boundary.
pub trait FrameSource {
    /// Open the stream. Fails with `AcquisitionError` when nothing can be captured.
    fn open(&mut self) -> Result<()>;

    /// Capture the current frame. While paused the source keeps returning the
    /// frame it was paused on.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Freeze playback.
    fn pause(&mut self);

    /// Resume playback.
    fn play(&mut self) -> Result<()>;

    fn is_paused(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub url: String,
}

/// The source could not be opened: no device, permission denied, empty stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcquisitionError {
    pub url: String,
    pub reason: String,
}

impl AcquisitionError {
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "camera error ({}): {}", self.url, self.reason)
    }
}

impl std::error::Error for AcquisitionError {}

/// Configuration for a camera source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceConfig {
    /// `stub://name`, `dir:///path/to/frames`, or a plain directory path.
    pub url: String,
    /// Frame width of synthetic sources.
    pub width: u32,
    /// Frame height of synthetic sources.
    pub height: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            width: 640,
            height: 480,
        }
    }
}

/// Source selected from a URL.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "ingest-image-dir")]
    ImageDir(ImageDirSource),
}

impl CameraSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(AcquisitionError::new("", "no source configured").into());
        }
        if config.url.starts_with("stub://") {
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticSource::new(config)),
            });
        }
        let path = config.url.strip_prefix("dir://").unwrap_or(&config.url);
        if path.contains("://") {
            return Err(AcquisitionError::new(&config.url, "unsupported source scheme").into());
        }
        #[cfg(feature = "ingest-image-dir")]
        {
            Ok(Self {
                backend: CameraBackend::ImageDir(ImageDirSource::new(path)),
            })
        }
        #[cfg(not(feature = "ingest-image-dir"))]
        {
            Err(AcquisitionError::new(
                &config.url,
                "image directory sources require the ingest-image-dir feature",
            )
            .into())
        }
    }
}

impl FrameSource for CameraSource {
    fn open(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.open(),
            #[cfg(feature = "ingest-image-dir")]
            CameraBackend::ImageDir(source) => source.open(),
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-image-dir")]
            CameraBackend::ImageDir(source) => source.next_frame(),
        }
    }

    fn pause(&mut self) {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.pause(),
            #[cfg(feature = "ingest-image-dir")]
            CameraBackend::ImageDir(source) => source.pause(),
        }
    }

    fn play(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.play(),
            #[cfg(feature = "ingest-image-dir")]
            CameraBackend::ImageDir(source) => source.play(),
        }
    }

    fn is_paused(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.is_paused(),
            #[cfg(feature = "ingest-image-dir")]
            CameraBackend::ImageDir(source) => source.is_paused(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-image-dir")]
            CameraBackend::ImageDir(source) => source.stats(),
        }
    }
}
