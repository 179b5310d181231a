//! Running a detector over the frames of a single camera.

use std::{fmt, time::Duration};

use anyhow::Context;

use crate::detection::HandDetector;
use crate::hand::HandSide;
use crate::image::Image;
use crate::landmark::{CameraMarks, FrameMarks};
use crate::resolve::resolve;
use crate::timer::Timer;

/// Summary of one camera's detection run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceStats {
    /// Number of processed frames.
    pub frames: usize,
    /// Number of frames for which the detector returned an error.
    pub failed_frames: usize,
    /// Number of frames with a filled right / left slot, indexed by [`HandSide::slot`].
    pub hands: [usize; 2],
    /// Average time spent in the detector per frame.
    pub detect_time: Duration,
}

impl SequenceStats {
    /// Returns the number of frames in which the `side` slot was filled.
    pub fn detections(&self, side: HandSide) -> usize {
        self.hands[side.slot()]
    }

    fn record(&mut self, frame: &FrameMarks) {
        self.frames += 1;
        for (side, _) in frame.hands() {
            self.hands[side.slot()] += 1;
        }
    }
}

impl fmt::Display for SequenceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames, {} right, {} left, {} failed detector calls, {:.01}ms/frame",
            self.frames,
            self.detections(HandSide::Right),
            self.detections(HandSide::Left),
            self.failed_frames,
            self.detect_time.as_secs_f32() * 1000.0,
        )
    }
}

/// The result of a camera's detection run.
#[derive(Debug, Clone)]
pub struct CameraOutput {
    pub marks: CameraMarks,
    pub stats: SequenceStats,
}

/// Runs `detector` over frames `0..num_frames`, strictly in order.
///
/// `load` is called once per frame, right before the frame is passed to the detector. An error
/// returned by `load` fails the whole run. A detector error only affects its frame, which is
/// recorded as having no hands.
pub fn run_sequence<D, L>(
    detector: &mut D,
    num_frames: usize,
    mut load: L,
) -> anyhow::Result<CameraOutput>
where
    D: HandDetector + ?Sized,
    L: FnMut(usize) -> anyhow::Result<Image>,
{
    let timer = Timer::new("detect");
    let mut stats = SequenceStats::default();
    let mut marks = CameraMarks::with_capacity(num_frames);

    for index in 0..num_frames {
        let image = load(index).with_context(|| format!("failed to load frame {index}"))?;
        let frame = match timer.time(|| detector.detect(&image)) {
            Ok(detections) => resolve(&detections),
            Err(e) => {
                log::warn!("detection failed on frame {index}: {e:#}");
                stats.failed_frames += 1;
                FrameMarks::EMPTY
            }
        };
        stats.record(&frame);
        marks.push(frame);
    }

    stats.detect_time = timer.average();
    log::trace!("{timer}");
    Ok(CameraOutput { marks, stats })
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::*;
    use crate::hand::HandSide::*;
    use crate::test::{detection_at, hand_at, ScriptedDetector};

    fn blank(_: usize) -> anyhow::Result<Image> {
        Ok(Image::new(2, 2))
    }

    #[test]
    fn frames_in_order() {
        let mut detector = ScriptedDetector::new([
            Some(vec![detection_at(0.0, 0.0, Right, 0.9)]),
            Some(vec![]),
            Some(vec![
                detection_at(2.0, 2.0, Left, 0.9),
                detection_at(3.0, 3.0, Right, 0.8),
            ]),
        ]);
        let output = run_sequence(&mut detector, 3, blank).unwrap();

        assert_eq!(
            output.marks,
            [
                FrameMarks::new(Some(hand_at(0, 0)), None),
                FrameMarks::EMPTY,
                FrameMarks::new(Some(hand_at(3, 3)), Some(hand_at(2, 2))),
            ]
        );
        assert_eq!(output.stats.frames, 3);
        assert_eq!(output.stats.detections(Right), 2);
        assert_eq!(output.stats.detections(Left), 1);
        assert_eq!(output.stats.failed_frames, 0);
    }

    #[test]
    fn detector_error_degrades_to_empty_frame() {
        let mut detector = ScriptedDetector::new([
            None,
            Some(vec![detection_at(1.0, 1.0, Left, 0.5)]),
        ]);
        let output = run_sequence(&mut detector, 2, blank).unwrap();

        assert_eq!(output.marks[0], FrameMarks::EMPTY);
        assert_eq!(output.marks[1].left(), Some(&hand_at(1, 1)));
        assert_eq!(output.stats.failed_frames, 1);
    }

    #[test]
    fn load_error_fails_run() {
        let mut detector = ScriptedDetector::new([Some(vec![]), Some(vec![])]);
        let err = run_sequence(&mut detector, 2, |index| {
            if index == 1 {
                bail!("disk on fire");
            }
            blank(index)
        })
        .unwrap_err();

        assert!(format!("{err:#}").contains("frame 1"));
    }
}
