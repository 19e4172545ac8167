//! OSC time tags
//!
//! Time tags use the NTP format: 32 bits of seconds since 1900-01-01
//! followed by 32 bits of fractional seconds.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::{Error, Result};

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970)
pub const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

const FRACTION_SCALE: f64 = 4_294_967_296.0; // 2^32

/// A 64-bit OSC time tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeTag {
    pub seconds: u32,
    pub fraction: u32,
}

impl TimeTag {
    /// The special "execute immediately" tag
    pub const IMMEDIATE: TimeTag = TimeTag {
        seconds: 0,
        fraction: 1,
    };

    pub const fn new(seconds: u32, fraction: u32) -> Self {
        Self { seconds, fraction }
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    /// Build from the big-endian wire value
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            seconds: (bits >> 32) as u32,
            fraction: bits as u32,
        }
    }

    /// The big-endian wire value
    pub const fn to_bits(self) -> u64 {
        ((self.seconds as u64) << 32) | self.fraction as u64
    }

    pub fn is_immediate(&self) -> bool {
        *self == Self::IMMEDIATE
    }
}

impl Default for TimeTag {
    fn default() -> Self {
        Self::IMMEDIATE
    }
}

impl From<u64> for TimeTag {
    fn from(bits: u64) -> Self {
        Self::from_bits(bits)
    }
}

impl From<TimeTag> for u64 {
    fn from(tag: TimeTag) -> Self {
        tag.to_bits()
    }
}

impl From<SystemTime> for TimeTag {
    fn from(time: SystemTime) -> Self {
        // Pre-1970 times are clamped to the Unix epoch.
        let since_unix = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        let seconds = (since_unix.as_secs() + NTP_UNIX_OFFSET) as u32;
        let fraction = (since_unix.subsec_nanos() as f64 / 1e9 * FRACTION_SCALE) as u32;
        Self { seconds, fraction }
    }
}

impl TryFrom<TimeTag> for SystemTime {
    type Error = Error;

    fn try_from(tag: TimeTag) -> Result<Self> {
        let secs = (tag.seconds as u64)
            .checked_sub(NTP_UNIX_OFFSET)
            .ok_or_else(|| Error::EncodeError(format!("time tag {} predates the Unix epoch", tag)))?;
        let nanos = (tag.fraction as f64 / FRACTION_SCALE * 1e9) as u64;
        Ok(UNIX_EPOCH + Duration::from_secs(secs) + Duration::from_nanos(nanos))
    }
}

impl std::fmt::Display for TimeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:08x}", self.seconds, self.fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_roundtrip() {
        let tag = TimeTag::new(0xDEAD_BEEF, 0x0102_0304);
        assert_eq!(tag.to_bits(), 0xDEAD_BEEF_0102_0304);
        assert_eq!(TimeTag::from_bits(tag.to_bits()), tag);
    }

    #[test]
    fn test_immediate() {
        assert_eq!(TimeTag::IMMEDIATE.to_bits(), 1);
        assert!(TimeTag::default().is_immediate());
        assert!(!TimeTag::now().is_immediate());
    }

    #[test]
    fn test_unix_epoch() {
        let tag = TimeTag::from(UNIX_EPOCH);
        assert_eq!(tag.seconds as u64, NTP_UNIX_OFFSET);
        assert_eq!(tag.fraction, 0);
    }

    #[test]
    fn test_system_time_conversion() {
        let time = UNIX_EPOCH + Duration::from_millis(1_700_000_000_500);
        let tag = TimeTag::from(time);
        let back = SystemTime::try_from(tag).unwrap();
        let drift = back
            .duration_since(time)
            .unwrap_or_else(|e| e.duration());
        assert!(drift < Duration::from_micros(1));
    }

    #[test]
    fn test_before_unix_epoch_fails() {
        assert!(SystemTime::try_from(TimeTag::IMMEDIATE).is_err());
    }
}
