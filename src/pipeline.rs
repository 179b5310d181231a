//! The complete processing pipeline: detection, canonicalization, archiving and visualization.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::archive;
use crate::canonical::canonicalize_all;
use crate::detection::{DetectorConfig, DetectorFactory};
use crate::landmark::CameraMarks;
use crate::orchestrator::{CameraFailure, CameraOrchestrator, FailurePolicy};
use crate::sequence::SequenceStats;
use crate::source::{validate_cameras, ImageSource};
use crate::video::encoder_for_path;
use crate::visualize::Visualizer;

pub use crate::orchestrator::DEFAULT_WORKERS;

/// Environment variable overriding the number of workers.
pub const WORKERS_VAR: &str = "HANDMARKS_WORKERS";

/// Container format of the rendered video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VideoFormat {
    #[default]
    Mp4,
    Gif,
}

impl VideoFormat {
    pub fn extension(self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Gif => "gif",
        }
    }
}

/// Where the pipeline writes its results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub archive: PathBuf,
    pub video: PathBuf,
    /// Folder receiving one PNG per rendered frame.
    pub frame_dir: PathBuf,
}

impl OutputPaths {
    /// Returns the standard output locations inside a sequence folder.
    ///
    /// ```text
    /// <sequence>/processed/hand_detection/mp_handmarks_results.npz
    /// <sequence>/processed/hand_detection/vis/mp_handmarks.<ext>
    /// <sequence>/processed/hand_detection/vis/mp_handmarks/vis_000000.png
    /// ```
    pub fn for_sequence(root: &Path, format: VideoFormat) -> Self {
        let out = root.join("processed").join("hand_detection");
        let vis = out.join("vis");
        Self {
            archive: out.join(archive::FILE_NAME),
            video: vis.join(format!("mp_handmarks.{}", format.extension())),
            frame_dir: vis.join("mp_handmarks"),
        }
    }
}

/// Options controlling a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    workers: usize,
    failure_policy: FailurePolicy,
    fps: u32,
    visualize: bool,
    save_frames: bool,
    tile_width: u32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            failure_policy: FailurePolicy::default(),
            fps: 30,
            visualize: true,
            save_frames: false,
            tile_width: 640,
        }
    }
}

impl PipelineOptions {
    /// Returns the default options, with the worker count taken from `HANDMARKS_WORKERS` if set.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(value) = std::env::var(WORKERS_VAR) {
            match value.trim().parse::<usize>() {
                Ok(workers) if workers > 0 => options.workers = workers,
                _ => log::warn!("ignoring invalid {WORKERS_VAR} value '{value}'"),
            }
        }
        options
    }

    /// Sets the maximum number of cameras processed concurrently.
    pub fn workers(self, workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            ..self
        }
    }

    pub fn failure_policy(self, failure_policy: FailurePolicy) -> Self {
        Self {
            failure_policy,
            ..self
        }
    }

    /// Sets the frame rate of the sequence, used by the detector and the rendered video.
    pub fn fps(self, fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            ..self
        }
    }

    /// Enables or disables rendering the visualization. Enabled by default.
    pub fn visualize(self, visualize: bool) -> Self {
        Self { visualize, ..self }
    }

    /// Enables or disables saving each rendered mosaic as a PNG. Disabled by default.
    pub fn save_frames(self, save_frames: bool) -> Self {
        Self {
            save_frames,
            ..self
        }
    }

    pub fn tile_width(self, tile_width: u32) -> Self {
        Self { tile_width, ..self }
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    fn visualizer(&self, paths: &OutputPaths) -> Visualizer {
        let vis = Visualizer::new().fps(self.fps).tile_width(self.tile_width);
        if self.save_frames {
            vis.save_frames(&paths.frame_dir)
        } else {
            vis
        }
    }
}

/// Summary of a pipeline run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Detection statistics of every successful camera.
    pub cameras: BTreeMap<String, SequenceStats>,
    /// Cameras whose detection job failed. These are missing from the archive.
    pub failed: Vec<CameraFailure>,
    /// The written archive.
    pub archive: Option<PathBuf>,
    /// The written video, if visualization was enabled.
    pub video: Option<PathBuf>,
}

impl RunReport {
    /// Returns `true` if every camera was processed successfully.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Logs a per-camera summary.
    pub fn log_summary(&self) {
        for (serial, stats) in &self.cameras {
            log::info!("{serial}: {stats}");
        }
        for failure in &self.failed {
            log::error!("{failure}");
        }
        log::info!(
            "{} cameras processed, {} failed",
            self.cameras.len(),
            self.failed.len()
        );
    }
}

/// Runs detection on every camera of `source`, then canonicalizes, archives and visualizes the
/// results.
///
/// A source without cameras or frames, or with a camera listed twice, is rejected with a
/// [`ConfigError`](crate::source::ConfigError) before anything is processed or written.
pub fn run<S, F>(
    source: Arc<S>,
    factory: Arc<F>,
    paths: &OutputPaths,
    options: &PipelineOptions,
) -> anyhow::Result<RunReport>
where
    S: ImageSource + ?Sized + 'static,
    F: DetectorFactory + 'static,
{
    validate_cameras(source.serials(), source.num_frames())?;
    let sides = source.hand_sides();
    let config = DetectorConfig {
        frame_rate: options.fps,
        ..DetectorConfig::for_sides(sides)
    };

    let results = CameraOrchestrator::new()
        .workers(options.workers)
        .failure_policy(options.failure_policy)
        .run(source.clone(), factory, &config)?;

    let mut report = RunReport {
        failed: results.failed,
        ..RunReport::default()
    };
    let mut marks = BTreeMap::new();
    for (serial, output) in results.outputs {
        report.cameras.insert(serial.clone(), output.stats);
        marks.insert(serial, output.marks);
    }

    canonicalize_all(&mut marks, sides);
    archive::save(&paths.archive, &marks)?;
    report.archive = Some(paths.archive.clone());

    if options.visualize {
        visualize(&*source, &marks, paths, options)?;
        report.video = Some(paths.video.clone());
    }

    Ok(report)
}

/// Renders the visualization from a previously written archive.
pub fn run_vis_only<S>(
    source: &S,
    paths: &OutputPaths,
    options: &PipelineOptions,
) -> anyhow::Result<RunReport>
where
    S: ImageSource + ?Sized,
{
    validate_cameras(source.serials(), source.num_frames())?;
    let marks = archive::load(&paths.archive)?;
    log::info!(
        "loaded landmarks of {} cameras from '{}'",
        marks.len(),
        paths.archive.display()
    );
    visualize(source, &marks, paths, options)?;
    Ok(RunReport {
        video: Some(paths.video.clone()),
        ..RunReport::default()
    })
}

fn visualize<S>(
    source: &S,
    marks: &BTreeMap<String, CameraMarks>,
    paths: &OutputPaths,
    options: &PipelineOptions,
) -> anyhow::Result<()>
where
    S: ImageSource + ?Sized,
{
    let vis = options.visualizer(paths);
    let mosaics = vis.render(source, marks)?;
    vis.write_video(&*encoder_for_path(&paths.video), &paths.video, &mosaics)
}
