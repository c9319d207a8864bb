use std::collections::BTreeMap;

use ambience_backend::AudioSessionPolicy;
use serde::Deserialize;

/// Session settings chosen at startup.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Forwarded to platforms that have an audio session.
    pub policy: AudioSessionPolicy,
    /// Initial sticky volumes by track id, clamped like any other volume.
    pub volumes: BTreeMap<String, i64>,
}
