//! Interface to the external hand landmark detector.
//!
//! The detector itself is a black box: given an image it reports up to
//! [`DetectorConfig::max_num_hands`] hands, each with [`NUM_LANDMARKS`] image-space landmarks, a
//! handedness label and a confidence score. Detectors may keep temporal tracking state between
//! calls, so one instance must only ever see the frames of a single camera, in order.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::hand::{HandSide, HandSides};
use crate::image::Image;
use crate::landmark::NUM_LANDMARKS;

/// A single hand reported by the detector.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawDetection {
    /// Landmark positions in image pixel coordinates.
    pub landmarks: [[f32; 2]; NUM_LANDMARKS],
    /// The handedness label assigned by the detector. This may be wrong.
    pub side: HandSide,
    /// Detection confidence in range 0.0 to 1.0.
    pub score: f32,
}

/// Trait for hand landmark detectors.
pub trait HandDetector {
    /// Detects the hands in `image`.
    ///
    /// Detectors are called with the frames of one camera in frame order and may rely on that.
    fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<RawDetection>>;
}

impl<D: HandDetector + ?Sized> HandDetector for Box<D> {
    fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<RawDetection>> {
        (**self).detect(image)
    }
}

/// Detector settings shared by every camera of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub max_num_hands: usize,
    pub min_hand_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    pub min_hand_presence_confidence: f32,
    /// Frame rate of the input sequence, used by detectors that track over time.
    pub frame_rate: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_num_hands: 2,
            min_hand_detection_confidence: 0.1,
            min_tracking_confidence: 0.5,
            min_hand_presence_confidence: 0.5,
            frame_rate: 30,
        }
    }
}

impl DetectorConfig {
    /// Returns the default configuration, limited to the number of hands present in the scene.
    pub fn for_sides(sides: HandSides) -> Self {
        Self {
            max_num_hands: sides.count(),
            ..Self::default()
        }
    }
}

/// Creates a fresh detector for each camera.
///
/// Every camera job calls [`DetectorFactory::create`] on its own worker thread, so detectors never
/// share state across cameras. Any `Fn(&DetectorConfig, &str) -> anyhow::Result<D>` closure
/// implements this trait.
pub trait DetectorFactory: Send + Sync {
    type Detector: HandDetector;

    /// Creates a detector for the camera identified by `serial`.
    fn create(&self, config: &DetectorConfig, serial: &str) -> anyhow::Result<Self::Detector>;
}

impl<F, D> DetectorFactory for F
where
    F: Fn(&DetectorConfig, &str) -> anyhow::Result<D> + Send + Sync,
    D: HandDetector,
{
    type Detector = D;

    fn create(&self, config: &DetectorConfig, serial: &str) -> anyhow::Result<D> {
        self(config, serial)
    }
}

/// Replays detections exported by an external detector.
///
/// The recording is a JSON array with one entry per frame; each entry is a list of
/// [`RawDetection`]s. Every call to [`HandDetector::detect`] returns the next frame's detections,
/// ignoring the image.
pub struct ReplayDetector {
    frames: std::vec::IntoIter<Vec<RawDetection>>,
    min_confidence: f32,
    next_frame: usize,
}

impl ReplayDetector {
    /// File name of the recording inside a camera's folder.
    pub const FILE_NAME: &'static str = "detections.json";

    /// Loads a recording from `path`.
    pub fn open<P: AsRef<Path>>(path: P, config: &DetectorConfig) -> anyhow::Result<Self> {
        Self::open_impl(path.as_ref(), config)
    }

    fn open_impl(path: &Path, config: &DetectorConfig) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open detection recording '{}'", path.display()))?;
        let frames: Vec<Vec<RawDetection>> = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("malformed detection recording '{}'", path.display()))?;
        log::trace!(
            "loaded {} recorded frames from '{}'",
            frames.len(),
            path.display()
        );
        Ok(Self::from_frames(frames, config))
    }

    pub fn from_frames(frames: Vec<Vec<RawDetection>>, config: &DetectorConfig) -> Self {
        Self {
            frames: frames.into_iter(),
            min_confidence: config.min_hand_detection_confidence,
            next_frame: 0,
        }
    }
}

impl HandDetector for ReplayDetector {
    fn detect(&mut self, _image: &Image) -> anyhow::Result<Vec<RawDetection>> {
        let frame = self.next_frame;
        self.next_frame += 1;
        let Some(mut detections) = self.frames.next() else {
            bail!("detection recording ends before frame {frame}");
        };
        detections.retain(|det| det.score >= self.min_confidence);
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::detection_at;

    #[test]
    fn config_follows_hand_count() {
        assert_eq!(DetectorConfig::for_sides(HandSides::Left).max_num_hands, 1);
        assert_eq!(DetectorConfig::for_sides(HandSides::Both).max_num_hands, 2);
    }

    #[test]
    fn replay_filters_and_runs_out() {
        let image = Image::new(1, 1);
        let mut det = ReplayDetector::from_frames(
            vec![
                vec![
                    detection_at(1.0, 1.0, HandSide::Right, 0.9),
                    detection_at(2.0, 2.0, HandSide::Left, 0.05),
                ],
                vec![],
            ],
            &DetectorConfig::default(),
        );

        let first = det.detect(&image).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].side, HandSide::Right);
        assert!(det.detect(&image).unwrap().is_empty());
        det.detect(&image).unwrap_err();
    }

    #[test]
    fn replay_parses_recording() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ReplayDetector::FILE_NAME);
        let hand = serde_json::json!({
            "landmarks": vec![[3.5, 4.5]; NUM_LANDMARKS],
            "side": "left",
            "score": 0.75,
        });
        std::fs::write(&path, serde_json::json!([[hand], []]).to_string()).unwrap();

        let mut det = ReplayDetector::open(&path, &DetectorConfig::default()).unwrap();
        let image = Image::new(1, 1);
        let first = det.detect(&image).unwrap();
        assert_eq!(first[0].side, HandSide::Left);
        assert_eq!(first[0].landmarks[20], [3.5, 4.5]);
        assert!(det.detect(&image).unwrap().is_empty());
    }
}
