//! Resolved landmark records.
//!
//! A [`FrameMarks`] holds the landmarks of at most one right and one left hand for a single frame
//! of a single camera. A slot either holds a complete [`HandMarks`] or nothing; partially valid
//! slots cannot be represented. The sentinel value [`SENTINEL`] only exists at the array boundary
//! (see [`crate::archive`]).

use std::ops::{Index, IndexMut};

use itertools::Itertools;

use crate::hand::HandSide;

/// Number of landmarks per hand.
pub const NUM_LANDMARKS: usize = 21;

/// Coordinate value marking an absent hand in landmark arrays.
pub const SENTINEL: i64 = -1;

/// An integer pixel position `[x, y]`.
pub type Point = [i64; 2];

/// The 21 landmarks of one detected hand, in integer pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandMarks {
    points: [Point; NUM_LANDMARKS],
}

impl HandMarks {
    pub fn new(points: [Point; NUM_LANDMARKS]) -> Self {
        Self { points }
    }

    /// Converts detector output (floating point pixel coordinates) into integer landmarks.
    ///
    /// Coordinates are truncated toward zero.
    pub fn from_f32(points: &[[f32; 2]; NUM_LANDMARKS]) -> Self {
        Self {
            points: points.map(|[x, y]| [x as i64, y as i64]),
        }
    }

    #[inline]
    pub fn points(&self) -> &[Point; NUM_LANDMARKS] {
        &self.points
    }

    #[inline]
    pub fn get(&self, index: usize) -> Point {
        self.points[index]
    }

    /// Returns the axis-aligned bounding box of all landmarks as `[x_min, y_min, x_max, y_max]`.
    pub fn bounding_box(&self) -> [i64; 4] {
        let xs = self.points.iter().map(|p| p[0]).minmax().into_option();
        let ys = self.points.iter().map(|p| p[1]).minmax().into_option();
        match (xs, ys) {
            (Some((x0, x1)), Some((y0, y1))) => [x0, y0, x1, y1],
            // `NUM_LANDMARKS` is non-zero
            _ => unreachable!(),
        }
    }
}

/// The resolved landmarks of one frame: slot 0 is the right hand, slot 1 the left hand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FrameMarks {
    slots: [Option<HandMarks>; 2],
}

impl FrameMarks {
    /// A record with both slots empty.
    pub const EMPTY: Self = Self { slots: [None, None] };

    pub fn new(right: Option<HandMarks>, left: Option<HandMarks>) -> Self {
        Self {
            slots: [right, left],
        }
    }

    #[inline]
    pub fn right(&self) -> Option<&HandMarks> {
        self.slots[0].as_ref()
    }

    #[inline]
    pub fn left(&self) -> Option<&HandMarks> {
        self.slots[1].as_ref()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Returns an iterator over the filled slots and the side they belong to.
    pub fn hands(&self) -> impl Iterator<Item = (HandSide, &HandMarks)> + '_ {
        HandSide::ALL
            .into_iter()
            .filter_map(|side| self[side].as_ref().map(|marks| (side, marks)))
    }
}

impl Index<HandSide> for FrameMarks {
    type Output = Option<HandMarks>;

    #[inline]
    fn index(&self, side: HandSide) -> &Option<HandMarks> {
        &self.slots[side.slot()]
    }
}

impl IndexMut<HandSide> for FrameMarks {
    #[inline]
    fn index_mut(&mut self, side: HandSide) -> &mut Option<HandMarks> {
        &mut self.slots[side.slot()]
    }
}

/// The resolved landmarks of every frame of one camera, indexed by frame.
pub type CameraMarks = Vec<FrameMarks>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::hand_at;

    #[test]
    fn float_landmarks_truncate() {
        let marks = HandMarks::from_f32(&[[10.9, 20.1]; NUM_LANDMARKS]);
        assert!(marks.points().iter().all(|p| *p == [10, 20]));
    }

    #[test]
    fn bounding_box() {
        let mut points = [[50, 60]; NUM_LANDMARKS];
        points[3] = [10, 80];
        points[7] = [90, 5];
        assert_eq!(HandMarks::new(points).bounding_box(), [10, 5, 90, 80]);
    }

    #[test]
    fn index_by_side() {
        let mut frame = FrameMarks::EMPTY;
        assert!(frame.is_empty());
        frame[HandSide::Left] = Some(hand_at(7, 7));
        assert!(frame.right().is_none());
        assert_eq!(frame.left(), Some(&hand_at(7, 7)));
        assert_eq!(
            frame.hands().map(|(side, _)| side).collect::<Vec<_>>(),
            [HandSide::Left]
        );
    }
}
