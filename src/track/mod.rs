//! Entity tracking and the sustained-expression alert state machine.
//!
//! Per identity key:
//!
//! ```text
//! Idle --score > threshold--> Accumulating --dwell > limit--> Alerting
//!  ^                              |                              |
//!  +------score <= threshold------+        window lapsed --------+
//!  +---------------- score <= threshold ----- Cooled ---- score > threshold --> Accumulating
//! ```
//!
//! Alerting ignores the score until its persistence window ends.

mod identity;
mod state;
mod tracker;

pub use identity::{corner_key, CornerKeyResolver, IdentityKey, IdentityResolver};
pub use state::{AlertPolicy, AlertState, EntityPhase};
pub use tracker::{
    AlertEvent, EntityTracker, RenderableEntity, TrackerStats, DEFAULT_STALE_ENTRY_TTL_MS,
};
