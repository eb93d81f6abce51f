use std::fmt;

use crate::detect::BoxRect;

/// Identity of a tracked face across frames.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdentityKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Maps a validated detection box to an identity key.
///
/// The tracker's transition logic only ever sees keys, so a matching-based
/// resolver (IoU, motion models) can replace the positional one.
pub trait IdentityResolver {
    fn resolve(&mut self, bbox: &BoxRect) -> IdentityKey;
}

/// Positional identity: `"{round(x)}-{round(y)}"` of the box top-left corner.
///
/// Not a real track id. A face moving more than half a pixel between frames
/// gets a new key, and overlapping faces may share one.
#[derive(Clone, Copy, Debug, Default)]
pub struct CornerKeyResolver;

impl IdentityResolver for CornerKeyResolver {
    fn resolve(&mut self, bbox: &BoxRect) -> IdentityKey {
        IdentityKey(corner_key(bbox))
    }
}

/// Rounds half toward positive infinity, so `-2.5` keys as `-2`.
pub fn corner_key(bbox: &BoxRect) -> String {
    format!("{}-{}", round_half_up(bbox.x), round_half_up(bbox.y))
}

fn round_half_up(v: f32) -> i64 {
    (v + 0.5).floor() as i64
}
