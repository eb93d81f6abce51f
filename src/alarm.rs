//! Audible alert with its own debounce.
//!
//! The alarm is independent of the per-entity cooldown: while a clip is
//! sounding, further triggers are ignored so playback never overlaps.

use anyhow::Result;
use std::io::Write;

use crate::clock::Millis;

/// Default debounce window, slightly longer than the alarm clip.
pub const DEFAULT_ALARM_CLIP_MS: Millis = 3100;

/// Audio playback boundary.
pub trait AudioSink: Send {
    fn play(&mut self) -> Result<()>;
}

/// Rings the terminal bell on stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalBell;

impl AudioSink for TerminalBell {
    fn play(&mut self) -> Result<()> {
        let mut stderr = std::io::stderr();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        Ok(())
    }
}

/// Discards playback requests.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentSink;

impl AudioSink for SilentSink {
    fn play(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Identifies one playback. A token from an earlier playback is stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AlarmToken(u64);

pub struct Alarm {
    sink: Box<dyn AudioSink>,
    clip_ms: Millis,
    generation: u64,
    playing: Option<(AlarmToken, Millis)>,
    plays: u64,
}

impl Alarm {
    pub fn new(sink: Box<dyn AudioSink>, clip_ms: Millis) -> Self {
        Self {
            sink,
            clip_ms,
            generation: 0,
            playing: None,
            plays: 0,
        }
    }

    /// Start playback unless a clip is already sounding.
    ///
    /// Playback errors are logged and otherwise ignored: the debounce window
    /// still opens so a broken sink is not hammered every frame.
    pub fn trigger(&mut self, now: Millis) -> Option<AlarmToken> {
        if self.is_playing(now) {
            return None;
        }
        self.generation += 1;
        let token = AlarmToken(self.generation);
        self.playing = Some((token, now.saturating_add(self.clip_ms)));
        self.plays += 1;
        if let Err(e) = self.sink.play() {
            log::debug!("alarm playback failed: {}", e);
        }
        Some(token)
    }

    pub fn is_playing(&self, now: Millis) -> bool {
        matches!(self.playing, Some((_, until)) if now < until)
    }

    /// End the debounce window early. Returns false for a stale token.
    pub fn cancel(&mut self, token: AlarmToken) -> bool {
        match self.playing {
            Some((current, _)) if current == token => {
                self.playing = None;
                true
            }
            _ => false,
        }
    }

    /// Number of playbacks started.
    pub fn plays(&self) -> u64 {
        self.plays
    }
}

impl Default for Alarm {
    fn default() -> Self {
        Self::new(Box::new(SilentSink), DEFAULT_ALARM_CLIP_MS)
    }
}
