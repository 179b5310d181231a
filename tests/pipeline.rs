use std::{
    collections::{BTreeMap, VecDeque},
    path::Path,
    sync::{Arc, Mutex},
};

use anyhow::bail;
use handmarks::{
    archive,
    detection::{DetectorConfig, HandDetector, RawDetection},
    hand::{HandSide, HandSides},
    image::{Color, Image},
    landmark::{FrameMarks, NUM_LANDMARKS, SENTINEL},
    orchestrator::{CameraFailure, FailurePolicy},
    pipeline::{self, OutputPaths, PipelineOptions, VideoFormat},
    source::{ConfigError, ImageSource},
    video::VideoEncoder,
    visualize::Visualizer,
};
use ndarray::s;

/// In-memory sequence whose frames are filled with a color derived from the frame index.
struct ColorSource {
    serials: Vec<String>,
    num_frames: usize,
    sides: HandSides,
}

impl ColorSource {
    fn new(serials: &[&str], num_frames: usize, sides: HandSides) -> Self {
        Self {
            serials: serials.iter().map(|s| s.to_string()).collect(),
            num_frames,
            sides,
        }
    }
}

impl ImageSource for ColorSource {
    fn serials(&self) -> &[String] {
        &self.serials
    }

    fn num_frames(&self) -> usize {
        self.num_frames
    }

    fn hand_sides(&self) -> HandSides {
        self.sides
    }

    fn image(&self, serial: &str, frame: usize) -> anyhow::Result<Image> {
        if !self.serials.iter().any(|s| s == serial) || frame >= self.num_frames {
            bail!("no frame {frame} for camera '{serial}'");
        }
        let mut image = Image::new(32, 24);
        image.clear(Color::from_rgb8(frame as u8, 0, 0));
        Ok(image)
    }
}

struct ScriptDetector(VecDeque<Vec<RawDetection>>);

impl HandDetector for ScriptDetector {
    fn detect(&mut self, _image: &Image) -> anyhow::Result<Vec<RawDetection>> {
        match self.0.pop_front() {
            Some(detections) => Ok(detections),
            None => bail!("no more frames"),
        }
    }
}

fn hand(x: f32, side: HandSide, score: f32) -> RawDetection {
    RawDetection {
        landmarks: [[x, x + 1.0]; NUM_LANDMARKS],
        side,
        score,
    }
}

/// Camera "a" sees the right hand in frame 0 and nothing afterwards, camera "b" sees both hands in
/// every frame.
fn scripted_factory(_: &DetectorConfig, serial: &str) -> anyhow::Result<ScriptDetector> {
    let both = || {
        vec![
            hand(10.0, HandSide::Right, 0.9),
            hand(20.0, HandSide::Left, 0.8),
        ]
    };
    let frames = match serial {
        "a" => vec![vec![hand(10.0, HandSide::Right, 0.9)], vec![], vec![]],
        "b" => vec![both(), both(), both()],
        _ => bail!("unknown camera '{serial}'"),
    };
    Ok(ScriptDetector(frames.into()))
}

fn gif_paths(root: &Path) -> OutputPaths {
    OutputPaths::for_sequence(root, VideoFormat::Gif)
}

#[test]
fn end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let paths = gif_paths(dir.path());
    let options = PipelineOptions::default()
        .workers(2)
        .tile_width(32)
        .save_frames(true);

    let report = pipeline::run(
        Arc::new(ColorSource::new(&["a", "b"], 3, HandSides::Both)),
        Arc::new(scripted_factory),
        &paths,
        &options,
    )
    .unwrap();

    assert!(report.is_success());
    assert_eq!(report.cameras["a"].detections(HandSide::Right), 1);
    assert_eq!(report.cameras["a"].detections(HandSide::Left), 0);
    assert_eq!(report.cameras["b"].detections(HandSide::Left), 3);
    assert!(paths.video.exists());
    for index in 0..3 {
        assert!(paths.frame_dir.join(format!("vis_{index:06}.png")).exists());
    }

    let file = std::fs::File::open(&paths.archive).unwrap();
    let mut npz = ndarray_npy::NpzReader::new(file).unwrap();
    let mut names = npz.names().unwrap();
    names.sort();
    assert_eq!(names, ["a", "b"]);

    let a: ndarray::Array4<i64> = npz.by_name("a").unwrap();
    let b: ndarray::Array4<i64> = npz.by_name("b").unwrap();
    assert_eq!(a.shape(), [2, 3, NUM_LANDMARKS, 2]);
    assert_eq!(b.shape(), [2, 3, NUM_LANDMARKS, 2]);

    // Camera "a", frame 0: right hand only.
    assert!(a.slice(s![0, 0, .., ..]).iter().all(|&v| v != SENTINEL));
    assert!(a.slice(s![1, 0, .., ..]).iter().all(|&v| v == SENTINEL));
    assert_eq!(a[[0, 0, 5, 0]], 10);
    assert_eq!(a[[0, 0, 5, 1]], 11);
    // Camera "a" sees no hands afterwards.
    assert!(a.slice(s![.., 1.., .., ..]).iter().all(|&v| v == SENTINEL));
    assert!(b.iter().all(|&v| v != SENTINEL));
    assert_eq!(b[[1, 2, 0, 0]], 20);
}

#[test]
fn single_hand_scene_is_canonicalized() {
    let dir = tempfile::tempdir().unwrap();
    let paths = gif_paths(dir.path());
    let factory = |_: &DetectorConfig, _: &str| -> anyhow::Result<ScriptDetector> {
        Ok(ScriptDetector(
            vec![
                vec![hand(5.0, HandSide::Left, 0.7)],
                vec![hand(6.0, HandSide::Right, 0.4), hand(7.0, HandSide::Left, 0.9)],
            ]
            .into(),
        ))
    };

    pipeline::run(
        Arc::new(ColorSource::new(&["cam"], 2, HandSides::Right)),
        Arc::new(factory),
        &paths,
        &PipelineOptions::default().visualize(false),
    )
    .unwrap();
    assert!(!paths.video.exists());

    let results = archive::load(&paths.archive).unwrap();
    let marks = &results["cam"];
    assert!(marks.iter().all(|frame| frame.left().is_none()));
    assert_eq!(marks[0].right().unwrap().get(0), [5, 6]);
    assert_eq!(marks[1].right().unwrap().get(0), [6, 7]);
}

#[test]
fn failed_camera_isolated_or_aborting() {
    let factory = |config: &DetectorConfig, serial: &str| {
        if serial == "broken" {
            bail!("camera disconnected");
        }
        scripted_factory(config, "b")
    };
    let serials = ["a", "broken", "b"];

    let dir = tempfile::tempdir().unwrap();
    let paths = gif_paths(dir.path());
    let options = PipelineOptions::default().tile_width(16);
    let report = pipeline::run(
        Arc::new(ColorSource::new(&serials, 3, HandSides::Both)),
        Arc::new(factory),
        &paths,
        &options,
    )
    .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].serial, "broken");
    assert_eq!(report.cameras.keys().collect::<Vec<_>>(), ["a", "b"]);
    let results = archive::load(&paths.archive).unwrap();
    assert_eq!(results.keys().collect::<Vec<_>>(), ["a", "b"]);
    assert!(paths.video.exists());

    let dir = tempfile::tempdir().unwrap();
    let paths = gif_paths(dir.path());
    let err = pipeline::run(
        Arc::new(ColorSource::new(&serials, 3, HandSides::Both)),
        Arc::new(factory),
        &paths,
        &options.failure_policy(FailurePolicy::Abort),
    )
    .unwrap_err();
    assert_eq!(err.downcast_ref::<CameraFailure>().unwrap().serial, "broken");
    assert!(!paths.archive.exists());
}

#[test]
fn invalid_sequence_is_rejected_before_writing() {
    let cases = [
        (ColorSource::new(&[], 3, HandSides::Both), "no cameras"),
        (ColorSource::new(&["a", "b", "a"], 3, HandSides::Both), "duplicate"),
        (ColorSource::new(&["a", "b"], 0, HandSides::Both), "no frames"),
    ];
    for (source, case) in cases {
        let dir = tempfile::tempdir().unwrap();
        let paths = gif_paths(dir.path());
        let err = pipeline::run(
            Arc::new(source),
            Arc::new(scripted_factory),
            &paths,
            &PipelineOptions::default(),
        )
        .unwrap_err();

        let err = err.downcast_ref::<ConfigError>().unwrap();
        match case {
            "no cameras" => assert!(matches!(err, ConfigError::NoCameras)),
            "duplicate" => assert!(matches!(err, ConfigError::DuplicateSerial(s) if s == "a")),
            _ => assert!(matches!(err, ConfigError::NoFrames)),
        }
        assert!(!paths.archive.exists(), "{case}");
        assert!(!paths.video.exists(), "{case}");
    }
}

/// Records the red channel of a pixel of every encoded frame.
struct RecordingEncoder(Mutex<Vec<u8>>);

impl VideoEncoder for RecordingEncoder {
    fn encode(&self, _path: &Path, frames: &[Image], _fps: u32) -> anyhow::Result<()> {
        let mut seen = self.0.lock().unwrap();
        seen.extend(frames.iter().map(|frame| frame.get(20, 20).r()));
        Ok(())
    }
}

#[test]
fn video_frames_in_index_order() {
    const FRAMES: usize = 100;
    let source = ColorSource::new(&["cam"], FRAMES, HandSides::Both);
    let results = BTreeMap::from([("cam".to_string(), vec![FrameMarks::EMPTY; FRAMES])]);

    let vis = Visualizer::new().tile_width(32);
    let mosaics = vis.render(&source, &results).unwrap();
    let encoder = RecordingEncoder(Mutex::new(Vec::new()));
    let dir = tempfile::tempdir().unwrap();
    vis.write_video(&encoder, &dir.path().join("video.mp4"), &mosaics)
        .unwrap();

    let seen = encoder.0.into_inner().unwrap();
    assert_eq!(seen, (0..FRAMES as u8).collect::<Vec<_>>());
}
