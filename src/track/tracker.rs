use std::collections::{HashMap, HashSet};

use crate::clock::Millis;
use crate::detect::FaceDetection;

use super::identity::{CornerKeyResolver, IdentityKey, IdentityResolver};
use super::state::{AlertPolicy, AlertState, EntityPhase};

/// Default time after which an entity that stopped appearing is forgotten.
pub const DEFAULT_STALE_ENTRY_TTL_MS: Millis = 10_000;

/// A detection ready to draw, paired with its identity and alert flag.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderableEntity {
    pub key: IdentityKey,
    pub detection: FaceDetection,
    /// Score of the watched expression in this frame.
    pub score: f32,
    pub is_alerting: bool,
}

/// Emitted once when an entity transitions into alerting.
#[derive(Clone, Debug, PartialEq)]
pub struct AlertEvent {
    pub key: IdentityKey,
    pub score: f32,
    pub at: Millis,
    pub persist_until: Millis,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub updates: u64,
    pub rejected_detections: u64,
    pub alerts_fired: u64,
    pub pruned_entries: u64,
}

/// Owns the identity key → alert state map for one session.
pub struct EntityTracker<R = CornerKeyResolver> {
    policy: AlertPolicy,
    resolver: R,
    states: HashMap<IdentityKey, AlertState>,
    stale_ttl_ms: Option<Millis>,
    stats: TrackerStats,
}

impl EntityTracker<CornerKeyResolver> {
    pub fn new(policy: AlertPolicy) -> Self {
        Self::with_resolver(policy, CornerKeyResolver)
    }
}

impl<R: IdentityResolver> EntityTracker<R> {
    pub fn with_resolver(policy: AlertPolicy, resolver: R) -> Self {
        Self {
            policy,
            resolver,
            states: HashMap::new(),
            stale_ttl_ms: Some(DEFAULT_STALE_ENTRY_TTL_MS),
            stats: TrackerStats::default(),
        }
    }

    /// Forget entries not seen for `ttl_ms`. `None` keeps them for the whole session.
    pub fn with_stale_ttl(mut self, ttl_ms: Option<Millis>) -> Self {
        self.stale_ttl_ms = ttl_ms;
        self
    }

    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    /// Number of keys currently holding state.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self, key: &IdentityKey) -> Option<&AlertState> {
        self.states.get(key)
    }

    pub fn phase(&self, key: &IdentityKey, now: Millis) -> EntityPhase {
        self.states
            .get(key)
            .map(|state| state.phase(now))
            .unwrap_or(EntityPhase::Idle)
    }

    /// Advance every entity seen in this frame.
    ///
    /// `on_alert` runs once per entity that starts alerting in this call.
    /// Malformed detections are skipped and do not appear in the output.
    pub fn update<F>(
        &mut self,
        detections: Vec<FaceDetection>,
        now: Millis,
        mut on_alert: F,
    ) -> Vec<RenderableEntity>
    where
        F: FnMut(&AlertEvent),
    {
        self.stats.updates += 1;
        let mut seen = HashSet::with_capacity(detections.len());
        let mut entities = Vec::with_capacity(detections.len());

        for (idx, detection) in detections.into_iter().enumerate() {
            let bbox = match detection.validate() {
                Ok(bbox) => bbox,
                Err(e) => {
                    self.stats.rejected_detections += 1;
                    log::warn!("skipping detection #{}: {}", idx, e);
                    continue;
                }
            };
            let key = self.resolver.resolve(&bbox);
            if !seen.insert(key.clone()) {
                log::debug!("identity key {} seen twice in one frame", key);
            }

            let score = detection.expressions.score(&self.policy.expression);
            let is_alerting = self.step(&key, score, now, &mut on_alert);
            entities.push(RenderableEntity {
                key,
                detection,
                score,
                is_alerting,
            });
        }

        self.prune_stale(now);
        entities
    }

    fn step<F>(&mut self, key: &IdentityKey, score: f32, now: Millis, on_alert: &mut F) -> bool
    where
        F: FnMut(&AlertEvent),
    {
        if !self.policy.is_elevated(score) {
            let alerting = self.states.get(key).map(|state| state.is_alerting(now));
            return match alerting {
                Some(true) => {
                    if let Some(state) = self.states.get_mut(key) {
                        state.touch(now);
                    }
                    true
                }
                Some(false) => {
                    self.states.remove(key);
                    false
                }
                None => false,
            };
        }

        let state = self
            .states
            .entry(key.clone())
            .or_insert_with(|| AlertState::accumulating(now));
        state.touch(now);

        if state.flagged() && !state.is_alerting(now) {
            log::debug!("entity {} still elevated after cooldown, re-arming", key);
            state.rearm(now);
        }

        if state.dwell_exceeded(now, &self.policy) {
            state.flag(now, &self.policy);
            self.stats.alerts_fired += 1;
            on_alert(&AlertEvent {
                key: key.clone(),
                score,
                at: now,
                persist_until: state.persist_until(),
            });
        }
        state.is_alerting(now)
    }

    fn prune_stale(&mut self, now: Millis) {
        let Some(ttl) = self.stale_ttl_ms else {
            return;
        };
        let before = self.states.len();
        self.states
            .retain(|_, state| now.saturating_sub(state.last_seen()) <= ttl);
        let pruned = before - self.states.len();
        if pruned > 0 {
            self.stats.pruned_entries += pruned as u64;
            log::debug!("pruned {} stale entities", pruned);
        }
    }

    /// Drop all entity state.
    pub fn clear(&mut self) {
        self.states.clear();
    }
}
