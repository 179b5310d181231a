//! Enforcement of the scene's hand configuration.
//!
//! When only one hand is present in the scene, the detector's handedness label carries no
//! information: every detected hand must be that one hand. Canonicalization folds such hands into
//! the present side's slot and clears the other slot. It never invents landmarks.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::hand::HandSides;
use crate::landmark::{CameraMarks, FrameMarks};

/// Canonicalizes a single frame.
///
/// With a single-hand configuration, the present side's slot is kept if it is filled and
/// otherwise takes the hand from the opposite slot; the opposite slot is always cleared. With both
/// hands present the frame is returned unchanged.
///
/// This is idempotent.
pub fn canonicalize(frame: &FrameMarks, sides: HandSides) -> FrameMarks {
    let Some(side) = sides.single() else {
        return *frame;
    };

    let mut canonical = FrameMarks::EMPTY;
    canonical[side] = frame[side].or(frame[side.opposite()]);
    canonical
}

/// Canonicalizes every frame of a camera.
pub fn canonicalize_camera(marks: &[FrameMarks], sides: HandSides) -> CameraMarks {
    marks
        .par_iter()
        .map(|frame| canonicalize(frame, sides))
        .collect()
}

/// Canonicalizes the results of all cameras in place.
pub fn canonicalize_all(results: &mut BTreeMap<String, CameraMarks>, sides: HandSides) {
    if sides == HandSides::Both {
        return;
    }
    for (serial, marks) in results.iter_mut() {
        let before = marks.iter().filter(|f| f.hands().count() == 2).count();
        *marks = canonicalize_camera(marks, sides);
        if before != 0 {
            log::debug!("{serial}: dropped a second hand in {before} frames");
        }
    }
}
