//! Hand sides and the hand landmark topology.

use std::{fmt, str::FromStr};

use anyhow::bail;
use serde::{Deserialize, Serialize};

/// Which hand a detection or landmark slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandSide {
    Right,
    Left,
}

impl HandSide {
    /// Both sides, in slot order.
    pub const ALL: [HandSide; 2] = [HandSide::Right, HandSide::Left];

    /// Returns the index of the landmark slot reserved for this side.
    ///
    /// Slot 0 holds the right hand, slot 1 the left hand.
    #[inline]
    pub fn slot(self) -> usize {
        match self {
            HandSide::Right => 0,
            HandSide::Left => 1,
        }
    }

    #[inline]
    pub fn opposite(self) -> HandSide {
        match self {
            HandSide::Right => HandSide::Left,
            HandSide::Left => HandSide::Right,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HandSide::Right => "right",
            HandSide::Left => "left",
        }
    }
}

impl fmt::Display for HandSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandSide {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "right" => Ok(HandSide::Right),
            "left" => Ok(HandSide::Left),
            _ => bail!("invalid hand side '{s}' (expected 'left' or 'right')"),
        }
    }
}

/// The hand configuration of a captured scene: which hands are physically present.
///
/// This is declared once per run. Detections for a side that is not part of the configuration
/// are treated as mislabeled and folded into the present side (see [`crate::canonical`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandSides {
    Right,
    Left,
    Both,
}

impl HandSides {
    /// Builds the configuration from a list of side names such as `["right", "left"]`.
    ///
    /// Duplicates are ignored. An empty list is an error.
    pub fn from_names<I, S>(names: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (mut right, mut left) = (false, false);
        for name in names {
            match name.as_ref().parse::<HandSide>()? {
                HandSide::Right => right = true,
                HandSide::Left => left = true,
            }
        }

        match (right, left) {
            (true, true) => Ok(HandSides::Both),
            (true, false) => Ok(HandSides::Right),
            (false, true) => Ok(HandSides::Left),
            (false, false) => bail!("hand configuration must name at least one side"),
        }
    }

    /// Returns the single present side, or [`None`] if both hands are present.
    pub fn single(self) -> Option<HandSide> {
        match self {
            HandSides::Right => Some(HandSide::Right),
            HandSides::Left => Some(HandSide::Left),
            HandSides::Both => None,
        }
    }

    /// Number of hands present in the scene.
    pub fn count(self) -> usize {
        match self {
            HandSides::Both => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for HandSides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandSides::Right => f.write_str("[right]"),
            HandSides::Left => f.write_str("[left]"),
            HandSides::Both => f.write_str("[right, left]"),
        }
    }
}

/// Names for the hand pose landmarks, in the order the detector reports them.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Bones of the hand skeleton, as pairs of connected landmarks.
pub const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Surround the palm:
        (Wrist, ThumbCmc),
        (ThumbCmc, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (PinkyMcp, Wrist),
        // Thumb:
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_fixed() {
        assert_eq!(HandSide::Right.slot(), 0);
        assert_eq!(HandSide::Left.slot(), 1);
        assert_eq!(HandSide::Right.opposite(), HandSide::Left);
    }

    #[test]
    fn sides_from_names() {
        assert_eq!(HandSides::from_names(["right"]).unwrap(), HandSides::Right);
        assert_eq!(HandSides::from_names(["left"]).unwrap(), HandSides::Left);
        assert_eq!(
            HandSides::from_names(["left", "right"]).unwrap(),
            HandSides::Both
        );
        assert_eq!(
            HandSides::from_names(["right", "right"]).unwrap(),
            HandSides::Right
        );
        HandSides::from_names(Vec::<String>::new()).unwrap_err();
        HandSides::from_names(["middle"]).unwrap_err();
    }

    #[test]
    fn connectivity_covers_all_landmarks() {
        let mut seen = [false; 21];
        for (a, b) in CONNECTIVITY {
            seen[*a as usize] = true;
            seen[*b as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
