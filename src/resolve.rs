//! Assignment of raw detections to hand slots.

use std::cmp::Ordering;

use crate::detection::RawDetection;
use crate::landmark::{FrameMarks, HandMarks};

/// Resolves the detections of one frame into a [`FrameMarks`].
///
/// Each detection is placed in the slot of its side label. When two detections claim the same
/// side, the one with the higher score keeps it and the other one is moved to the opposite slot.
/// On equal scores, the earlier detection keeps its label. Nothing is dropped because of a
/// labeling conflict.
///
/// Labels that the scene's hand configuration rules out are placed as-is; that policy is applied
/// later by [`crate::canonical`].
///
/// If the detector reported more than two hands, only the two with the highest scores are used.
pub fn resolve(detections: &[RawDetection]) -> FrameMarks {
    let mut frame = FrameMarks::EMPTY;
    match detections {
        [] => {}
        [det] => frame[det.side] = Some(HandMarks::from_f32(&det.landmarks)),
        [first, second] => place_pair(&mut frame, first, second),
        _ => {
            log::warn!(
                "detector reported {} hands, keeping the 2 most confident",
                detections.len()
            );
            let mut ranked = detections.iter().collect::<Vec<_>>();
            // stable sort, so earlier detections win ties
            ranked.sort_by(|a, b| descending_score(a, b));
            place_pair(&mut frame, ranked[0], ranked[1]);
        }
    }
    frame
}

fn place_pair(frame: &mut FrameMarks, first: &RawDetection, second: &RawDetection) {
    let (first_side, second_side) = if first.side != second.side {
        (first.side, second.side)
    } else if first.score >= second.score {
        log::trace!(
            "both hands labeled {}, relabeling the second ({:.2} <= {:.2})",
            first.side,
            second.score,
            first.score,
        );
        (first.side, first.side.opposite())
    } else {
        log::trace!(
            "both hands labeled {}, relabeling the first ({:.2} < {:.2})",
            first.side,
            first.score,
            second.score,
        );
        (second.side.opposite(), second.side)
    };

    frame[first_side] = Some(HandMarks::from_f32(&first.landmarks));
    frame[second_side] = Some(HandMarks::from_f32(&second.landmarks));
}

fn descending_score(a: &RawDetection, b: &RawDetection) -> Ordering {
    b.score.total_cmp(&a.score)
}
