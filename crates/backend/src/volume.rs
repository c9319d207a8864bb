use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_VOLUME: u8 = 50;
pub const MAX_VOLUME: u8 = 100;

/// A track volume in percent, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct Volume(u8);

impl Volume {
    pub const DEFAULT: Volume = Volume(DEFAULT_VOLUME);
    pub const MUTED: Volume = Volume(0);
    pub const FULL: Volume = Volume(MAX_VOLUME);

    /// Clamp any integer into range.
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(0, MAX_VOLUME as i64) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Linear gain in `0.0..=1.0` as backends expect it.
    pub fn gain(self) -> f32 {
        self.0 as f32 / MAX_VOLUME as f32
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<i64> for Volume {
    fn from(value: i64) -> Self {
        Self::clamped(value)
    }
}

impl From<Volume> for u8 {
    fn from(volume: Volume) -> Self {
        volume.0
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamping() {
        assert_eq!(Volume::clamped(-20).get(), 0);
        assert_eq!(Volume::clamped(0).get(), 0);
        assert_eq!(Volume::clamped(73).get(), 73);
        assert_eq!(Volume::clamped(100).get(), 100);
        assert_eq!(Volume::clamped(250).get(), 100);
        assert_eq!(Volume::clamped(i64::MIN).get(), 0);
    }

    #[test]
    fn test_gain() {
        assert_eq!(Volume::DEFAULT.gain(), 0.5);
        assert_eq!(Volume::FULL.gain(), 1.0);
        assert_eq!(Volume::MUTED.gain(), 0.0);
        assert!((Volume::clamped(80).gain() - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_display() {
        assert_eq!(Volume::clamped(35).to_string(), "35%");
    }
}
