//! Captured frame container.
//!
//! - `Frame`: owns the pixel data of one captured image. Bytes are private.
//! - `FrameView`: borrowed, read-only view handed to the perception pipeline.
//!
//! Frames of faces are sensitive: pixels are never logged, never serialized, and
//! are zeroized when the frame is dropped at the end of its cycle.

use zeroize::Zeroize;

/// Bytes per pixel of every frame produced by the ingestion layer (RGBA8).
pub const BYTES_PER_PIXEL: usize = 4;

// ----------------------------------------------------------------------------
// Frame: owned capture
// ----------------------------------------------------------------------------

/// One captured frame. There is no `Clone` and no byte accessor; pipelines get a
/// `FrameView` instead.
pub struct Frame {
    /// Private RGBA8 pixel data, row major.
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// Monotonically increasing sequence number assigned by the source.
    pub seq: u64,
}

impl Frame {
    /// Create a frame. Called only by the ingestion layer.
    pub(crate) fn new(data: Vec<u8>, width: u32, height: u32, seq: u64) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * BYTES_PER_PIXEL);
        Self {
            data,
            width,
            height,
            seq,
        }
    }

    /// Read-only view for inference.
    pub fn view(&self) -> FrameView<'_> {
        FrameView { frame: self }
    }

    /// Build a frame from caller-provided RGBA8 pixels, for sources that live
    /// outside this crate.
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32, seq: u64) -> anyhow::Result<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if data.len() != expected {
            anyhow::bail!(
                "frame {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            );
        }
        Ok(Self::new(data, width, height, seq))
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("seq", &self.seq)
            .field("bytes", &self.data.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// FrameView: what pipelines receive
// ----------------------------------------------------------------------------

/// Borrowed view of a frame for the perception pipeline.
///
/// The pixel slice is lent for the duration of the `detect` call only; the
/// lifetime prevents a pipeline from keeping it.
#[derive(Clone, Copy)]
pub struct FrameView<'a> {
    frame: &'a Frame,
}

impl<'a> FrameView<'a> {
    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }

    pub fn seq(&self) -> u64 {
        self.frame.seq
    }

    /// RGBA8 pixels, row major.
    pub fn pixels(&self) -> &'a [u8] {
        &self.frame.data
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
