//! Directory of still images played as a stream.
//!
//! Files with a png/jpg/jpeg/bmp extension are played in file-name order and the
//! sequence loops at the end. Frames are decoded in memory and never written back.

use anyhow::{anyhow, bail, Result};
use std::path::{Path, PathBuf};

use super::{AcquisitionError, FrameSource, SourceStats};
use crate::frame::Frame;

const EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

pub struct ImageDirSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    paused: bool,
    frame_count: u64,
}

impl ImageDirSource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            files: Vec::new(),
            cursor: 0,
            paused: false,
            frame_count: 0,
        }
    }

    fn url(&self) -> String {
        format!("dir://{}", self.dir.display())
    }

    fn decode(&self, path: &Path) -> Result<Frame> {
        let image = image::open(path)
            .map_err(|e| anyhow!("failed to decode {}: {}", path.display(), e))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        Ok(Frame::new(image.into_raw(), width, height, self.frame_count))
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageDirSource {
    fn open(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| AcquisitionError::new(self.url(), e.to_string()))?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        if files.is_empty() {
            return Err(AcquisitionError::new(self.url(), "stream empty").into());
        }
        files.sort();
        log::info!(
            "ImageDirSource: opened {} ({} frames)",
            self.dir.display(),
            files.len()
        );
        self.files = files;
        self.cursor = 0;
        self.paused = false;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if self.files.is_empty() {
            bail!("source {} is not open", self.url());
        }
        if !self.paused {
            self.frame_count += 1;
            if self.frame_count > 1 {
                self.cursor = (self.cursor + 1) % self.files.len();
            }
        }
        let path = self.files[self.cursor].clone();
        self.decode(&path)
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn play(&mut self) -> Result<()> {
        if self.files.is_empty() {
            bail!("source {} is not open", self.url());
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
            url: self.url(),
        }
    }
}
