use anyhow::{bail, Result};

use crate::clock::Millis;

/// Thresholds of the alert state machine.
#[derive(Clone, Debug, PartialEq)]
pub struct AlertPolicy {
    /// Expression whose score is watched.
    pub expression: String,
    /// A score strictly above this is elevated; at or below is not.
    pub score_threshold: f32,
    /// Continuous elevation required before alerting, exclusive.
    pub duration_limit_ms: Millis,
    /// How long an alert stays active after it fires.
    pub cooldown_ms: Millis,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            expression: "angry".to_string(),
            score_threshold: 0.3,
            duration_limit_ms: 3000,
            cooldown_ms: 3100,
        }
    }
}

impl AlertPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.expression.trim().is_empty() {
            bail!("alert expression label must not be empty");
        }
        if !(0.0..1.0).contains(&self.score_threshold) {
            bail!(
                "score threshold must be in [0, 1), got {}",
                self.score_threshold
            );
        }
        if self.duration_limit_ms == 0 {
            bail!("duration limit must be greater than zero");
        }
        if self.cooldown_ms == 0 {
            bail!("cooldown must be greater than zero");
        }
        Ok(())
    }

    pub fn is_elevated(&self, score: f32) -> bool {
        score > self.score_threshold
    }
}

/// Per-entity temporal state. Only the tracker mutates it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlertState {
    start: Millis,
    flagged: bool,
    persist_until: Millis,
    last_seen: Millis,
}

impl AlertState {
    pub(crate) fn accumulating(now: Millis) -> Self {
        Self {
            start: now,
            flagged: false,
            persist_until: 0,
            last_seen: now,
        }
    }

    /// When the current run of elevation began.
    pub fn start(&self) -> Millis {
        self.start
    }

    pub fn flagged(&self) -> bool {
        self.flagged
    }

    /// Meaningful only once flagged.
    pub fn persist_until(&self) -> Millis {
        self.persist_until
    }

    pub fn last_seen(&self) -> Millis {
        self.last_seen
    }

    pub fn is_alerting(&self, now: Millis) -> bool {
        self.flagged && now < self.persist_until
    }

    pub fn phase(&self, now: Millis) -> EntityPhase {
        if !self.flagged {
            EntityPhase::Accumulating
        } else if now < self.persist_until {
            EntityPhase::Alerting
        } else {
            EntityPhase::Cooled
        }
    }

    pub(crate) fn touch(&mut self, now: Millis) {
        self.last_seen = now;
    }

    /// Dwell is compared strictly: exactly `duration_limit_ms` is not enough.
    pub(crate) fn dwell_exceeded(&self, now: Millis, policy: &AlertPolicy) -> bool {
        !self.flagged && now.saturating_sub(self.start) > policy.duration_limit_ms
    }

    pub(crate) fn flag(&mut self, now: Millis, policy: &AlertPolicy) {
        self.flagged = true;
        self.persist_until = now.saturating_add(policy.cooldown_ms);
    }

    /// Start a fresh episode after the persistence window lapsed while still elevated.
    pub(crate) fn rearm(&mut self, now: Millis) {
        self.start = now;
        self.flagged = false;
        self.persist_until = 0;
    }
}

/// Logical state of one identity key at a point in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityPhase {
    /// No entry.
    Idle,
    /// Elevated, dwell time accumulating.
    Accumulating,
    /// Alert fired and persistence window still open.
    Alerting,
    /// Alert fired, window lapsed; cleared or re-armed on the next update.
    Cooled,
}
