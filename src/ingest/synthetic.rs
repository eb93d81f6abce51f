//! Synthetic frame source (`stub://`).
//!
//! Produces a moving RGBA gradient. `stub://empty` opens as an empty stream and
//! `stub://denied` as a refused device, for exercising acquisition failures.

use anyhow::{bail, Result};

use super::{AcquisitionError, FrameSource, SourceConfig, SourceStats};
use crate::frame::{Frame, BYTES_PER_PIXEL};

pub struct SyntheticSource {
    config: SourceConfig,
    opened: bool,
    paused: bool,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            opened: false,
            paused: false,
            frame_count: 0,
        }
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let (w, h) = (self.config.width as usize, self.config.height as usize);
        let mut pixels = vec![0u8; w * h * BYTES_PER_PIXEL];
        let shift = self.frame_count as usize;
        for (i, px) in pixels.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            let (x, y) = (i % w, i / w);
            px[0] = ((x + shift) % 256) as u8;
            px[1] = ((y + shift / 2) % 256) as u8;
            px[2] = ((x + y) % 256) as u8;
            px[3] = 255;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn open(&mut self) -> Result<()> {
        let url = &self.config.url;
        match url.as_str() {
            "stub://denied" => {
                return Err(AcquisitionError::new(url, "permission denied").into());
            }
            "stub://empty" => {
                return Err(AcquisitionError::new(url, "stream empty").into());
            }
            _ => {}
        }
        if self.config.width == 0 || self.config.height == 0 {
            return Err(AcquisitionError::new(url, "stream empty").into());
        }
        self.opened = true;
        self.paused = false;
        log::info!(
            "SyntheticSource: opened {} ({}x{})",
            url,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.opened {
            bail!("source {} is not open", self.config.url);
        }
        if !self.paused {
            self.frame_count += 1;
        }
        Ok(Frame::new(
            self.generate_pixels(),
            self.config.width,
            self.config.height,
            self.frame_count,
        ))
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn play(&mut self) -> Result<()> {
        if !self.opened {
            bail!("source {} is not open", self.config.url);
        }
        self.paused = false;
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}
