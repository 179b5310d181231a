use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use handmarks::detection::{DetectorConfig, ReplayDetector};
use handmarks::orchestrator::FailurePolicy;
use handmarks::pipeline::{self, OutputPaths, PipelineOptions, VideoFormat};
use handmarks::source::SequenceFolder;

#[derive(Parser, Debug)]
#[command(
    name = "handmarks",
    about = "Reconcile per-camera hand landmarks of a multi-camera sequence and render them"
)]
struct Args {
    /// Sequence folder containing `meta.json` and one folder per camera.
    #[arg(long)]
    sequence_folder: PathBuf,
    /// Number of cameras processed concurrently (overrides HANDMARKS_WORKERS).
    #[arg(long)]
    workers: Option<usize>,
    /// Stop at the first failed camera instead of finishing the others.
    #[arg(long)]
    fail_fast: bool,
    /// Frame rate of the sequence and the rendered video.
    #[arg(long, default_value_t = 30)]
    fps: u32,
    /// Skip rendering the visualization.
    #[arg(long, conflicts_with = "vis_only")]
    no_vis: bool,
    /// Also save every rendered mosaic as a PNG image.
    #[arg(long)]
    save_vis_images: bool,
    /// Container format of the rendered video.
    #[arg(long, value_enum, default_value_t = VideoExt::Mp4)]
    video_ext: VideoExt,
    /// Only render the visualization from an existing archive.
    #[arg(long)]
    vis_only: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum VideoExt {
    Mp4,
    Gif,
}

fn main() -> Result<()> {
    handmarks::init_logger!();

    let args = Args::parse();
    let source = Arc::new(SequenceFolder::open(&args.sequence_folder)?);

    let mut options = PipelineOptions::from_env()
        .failure_policy(if args.fail_fast {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Isolate
        })
        .fps(args.fps)
        .visualize(!args.no_vis)
        .save_frames(args.save_vis_images);
    if let Some(workers) = args.workers {
        options = options.workers(workers);
    }

    let format = match args.video_ext {
        VideoExt::Mp4 => VideoFormat::Mp4,
        VideoExt::Gif => VideoFormat::Gif,
    };
    let paths = OutputPaths::for_sequence(source.root(), format);

    if args.vis_only {
        pipeline::run_vis_only(&*source, &paths, &options)?;
        return Ok(());
    }

    let root = source.root().to_path_buf();
    let factory = move |config: &DetectorConfig, serial: &str| {
        ReplayDetector::open(root.join(serial).join(ReplayDetector::FILE_NAME), config)
    };
    let report = pipeline::run(source, Arc::new(factory), &paths, &options)?;
    report.log_summary();

    if !report.is_success() {
        let total = report.failed.len() + report.cameras.len();
        bail!("{} of {total} cameras failed", report.failed.len());
    }
    Ok(())
}
