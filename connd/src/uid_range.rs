//! Inclusive ranges of application UIDs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CapabilitiesError;

/// A closed, inclusive range of application UIDs.
///
/// Both bounds are non-negative by construction (`u32`), and `start <= stop`
/// is enforced by [`UidRange::new`]. Equality and ordering are on the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawUidRange")]
pub struct UidRange {
    start: u32,
    stop: u32,
}

#[derive(Deserialize)]
struct RawUidRange {
    start: u32,
    stop: u32,
}

impl TryFrom<RawUidRange> for UidRange {
    type Error = CapabilitiesError;

    fn try_from(raw: RawUidRange) -> Result<Self, Self::Error> {
        UidRange::new(raw.start, raw.stop)
    }
}

impl UidRange {
    /// Create a range, rejecting inverted bounds.
    pub fn new(start: u32, stop: u32) -> Result<Self, CapabilitiesError> {
        if start > stop {
            return Err(CapabilitiesError::InvertedRange { start, stop });
        }
        Ok(Self { start, stop })
    }

    /// Range covering exactly one UID.
    pub fn single(uid: u32) -> Self {
        Self {
            start: uid,
            stop: uid,
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn stop(&self) -> u32 {
        self.stop
    }

    /// Number of UIDs in the range. Never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        u64::from(self.stop - self.start) + 1
    }

    pub fn contains(&self, uid: u32) -> bool {
        self.start <= uid && uid <= self.stop
    }

    pub fn overlaps(&self, other: &UidRange) -> bool {
        self.start <= other.stop && other.start <= self.stop
    }
}

impl fmt::Display for UidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.stop)
    }
}

impl FromStr for UidRange {
    type Err = CapabilitiesError;

    /// Parse `"start-stop"` or a bare `"uid"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| CapabilitiesError::MalformedRange(s.to_string()))
        };

        match s.split_once('-') {
            Some((start, stop)) => UidRange::new(parse(start)?, parse(stop)?),
            None => Ok(UidRange::single(parse(s)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_range_rejected() {
        assert!(matches!(
            UidRange::new(10, 5),
            Err(CapabilitiesError::InvertedRange { start: 10, stop: 5 })
        ));
    }

    #[test]
    fn test_single_uid_range() {
        let range = UidRange::single(10050);
        assert_eq!(range.start(), 10050);
        assert_eq!(range.stop(), 10050);
        assert_eq!(range.len(), 1);
        assert!(range.contains(10050));
        assert!(!range.contains(10051));
    }

    #[test]
    fn test_full_width_len() {
        let range = UidRange::new(0, u32::MAX).unwrap();
        assert_eq!(range.len(), u64::from(u32::MAX) + 1);
    }

    #[test]
    fn test_overlaps() {
        let a = UidRange::new(100, 199).unwrap();
        let b = UidRange::new(199, 300).unwrap();
        let c = UidRange::new(200, 300).unwrap();
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_parse() {
        assert_eq!("10000-10999".parse::<UidRange>().unwrap(), UidRange::new(10000, 10999).unwrap());
        assert_eq!("10050".parse::<UidRange>().unwrap(), UidRange::single(10050));
        assert!("abc".parse::<UidRange>().is_err());
        assert!("5-1".parse::<UidRange>().is_err());
    }

    #[test]
    fn test_deserialize_rejects_inverted() {
        let ok: UidRange = serde_json::from_str(r#"{"start":1,"stop":2}"#).unwrap();
        assert_eq!(ok, UidRange::new(1, 2).unwrap());
        assert!(serde_json::from_str::<UidRange>(r#"{"start":3,"stop":2}"#).is_err());
    }
}
