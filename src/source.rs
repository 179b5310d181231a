//! Access to the frames of a multi-camera capture.

use std::{
    collections::BTreeSet,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;

use crate::hand::HandSides;
use crate::image::Image;

/// A source of synchronized camera frames.
///
/// Every camera has the same number of frames, and frame `i` of every camera was captured at the
/// same time.
pub trait ImageSource: Send + Sync {
    /// Returns the camera serials, in the order they were declared.
    fn serials(&self) -> &[String];

    fn num_frames(&self) -> usize;

    /// Returns the hand configuration of the captured scene.
    fn hand_sides(&self) -> HandSides;

    /// Loads frame `frame` of camera `serial`.
    fn image(&self, serial: &str, frame: usize) -> anyhow::Result<Image>;
}

/// An inconsistency in the description of a sequence.
///
/// These are detected before any camera is processed and abort the run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("sequence lists no cameras")]
    NoCameras,
    #[error("camera '{0}' is listed more than once")]
    DuplicateSerial(String),
    #[error("sequence has no frames")]
    NoFrames,
    #[error("invalid hand configuration {sides:?}: {reason}")]
    HandSides { sides: Vec<String>, reason: String },
    #[error("camera folder '{}' does not exist", .0.display())]
    MissingCamera(PathBuf),
}

/// Contents of a sequence's `meta.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct SequenceMeta {
    pub serials: Vec<String>,
    pub num_frames: usize,
    pub mano_sides: Vec<String>,
}

/// Checks that a sequence has at least one frame and at least one camera, and that no camera is
/// listed twice.
pub fn validate_cameras(serials: &[String], num_frames: usize) -> Result<(), ConfigError> {
    if serials.is_empty() {
        return Err(ConfigError::NoCameras);
    }
    let mut seen = BTreeSet::new();
    for serial in serials {
        if !seen.insert(serial.as_str()) {
            return Err(ConfigError::DuplicateSerial(serial.clone()));
        }
    }
    if num_frames == 0 {
        return Err(ConfigError::NoFrames);
    }
    Ok(())
}

impl SequenceMeta {
    /// Checks the metadata for consistency and returns the parsed hand configuration.
    pub fn validate(&self) -> Result<HandSides, ConfigError> {
        validate_cameras(&self.serials, self.num_frames)?;
        HandSides::from_names(&self.mano_sides).map_err(|e| ConfigError::HandSides {
            sides: self.mano_sides.clone(),
            reason: e.to_string(),
        })
    }
}

/// A sequence stored as a folder on disk.
///
/// ```text
/// <root>/meta.json
/// <root>/<serial>/color_000000.jpg
/// <root>/<serial>/color_000001.jpg
/// ...
/// ```
///
/// Frames may also be stored as `.png`.
pub struct SequenceFolder {
    root: PathBuf,
    meta: SequenceMeta,
    sides: HandSides,
}

impl SequenceFolder {
    pub const META_FILE: &'static str = "meta.json";

    /// Opens and validates the sequence at `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        Self::open_impl(root.as_ref())
    }

    fn open_impl(root: &Path) -> anyhow::Result<Self> {
        let meta_path = root.join(Self::META_FILE);
        let file = File::open(&meta_path)
            .with_context(|| format!("failed to open '{}'", meta_path.display()))?;
        let meta: SequenceMeta = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("malformed sequence metadata '{}'", meta_path.display()))?;

        let sides = meta.validate()?;
        for serial in &meta.serials {
            let dir = root.join(serial);
            if !dir.is_dir() {
                return Err(ConfigError::MissingCamera(dir).into());
            }
        }

        log::info!(
            "opened sequence '{}': {} cameras, {} frames, hands {sides}",
            root.display(),
            meta.serials.len(),
            meta.num_frames,
        );
        Ok(Self {
            root: root.to_path_buf(),
            meta,
            sides,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the folder holding the frames of camera `serial`.
    pub fn camera_dir(&self, serial: &str) -> PathBuf {
        self.root.join(serial)
    }

    /// Returns the path of a frame image, preferring `.jpg` over `.png`.
    pub fn frame_path(&self, serial: &str, frame: usize) -> PathBuf {
        let dir = self.camera_dir(serial);
        let jpg = dir.join(format!("color_{frame:06}.jpg"));
        if jpg.exists() {
            return jpg;
        }
        let png = jpg.with_extension("png");
        if png.exists() {
            png
        } else {
            jpg
        }
    }
}

impl ImageSource for SequenceFolder {
    fn serials(&self) -> &[String] {
        &self.meta.serials
    }

    fn num_frames(&self) -> usize {
        self.meta.num_frames
    }

    fn hand_sides(&self) -> HandSides {
        self.sides
    }

    fn image(&self, serial: &str, frame: usize) -> anyhow::Result<Image> {
        Image::load(self.frame_path(serial, frame))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn meta(serials: &[&str], num_frames: usize, sides: &[&str]) -> SequenceMeta {
        SequenceMeta {
            serials: serials.iter().map(|s| s.to_string()).collect(),
            num_frames,
            mano_sides: sides.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn validation() {
        assert_eq!(
            meta(&["a", "b"], 3, &["right", "left"]).validate().unwrap(),
            HandSides::Both
        );
        assert!(matches!(
            meta(&[], 3, &["right"]).validate(),
            Err(ConfigError::NoCameras)
        ));
        assert!(matches!(
            meta(&["a", "a"], 3, &["right"]).validate(),
            Err(ConfigError::DuplicateSerial(s)) if s == "a"
        ));
        assert!(matches!(
            meta(&["a"], 0, &["right"]).validate(),
            Err(ConfigError::NoFrames)
        ));
        assert!(matches!(
            meta(&["a"], 1, &[]).validate(),
            Err(ConfigError::HandSides { .. })
        ));
        assert!(matches!(
            meta(&["a"], 1, &["both"]).validate(),
            Err(ConfigError::HandSides { .. })
        ));
    }

    #[test]
    fn open_folder() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(SequenceFolder::META_FILE),
            r#"{"serials": ["cam0"], "num_frames": 1, "mano_sides": ["left"]}"#,
        )
        .unwrap();

        // Camera folder is missing.
        let err = SequenceFolder::open(dir.path()).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingCamera(_))
        ));

        fs::create_dir(dir.path().join("cam0")).unwrap();
        let mut frame = Image::new(4, 3);
        frame.clear(crate::image::Color::WHITE);
        frame.save(dir.path().join("cam0/color_000000.png")).unwrap();

        let seq = SequenceFolder::open(dir.path()).unwrap();
        assert_eq!(seq.serials(), ["cam0"]);
        assert_eq!(seq.hand_sides(), HandSides::Left);
        assert_eq!(seq.image("cam0", 0).unwrap(), frame);
        seq.image("cam0", 1).unwrap_err();
    }
}
