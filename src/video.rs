//! Encoding of rendered frames into video files.

use std::{
    ffi::OsString,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    process::{Command, Stdio},
};

use anyhow::{bail, Context};
use image::{
    codecs::gif::{self, Repeat},
    Delay, Frame,
};

use crate::image::Image;

/// Writes a sequence of equally sized frames to a video file.
pub trait VideoEncoder: Send + Sync {
    /// Encodes `frames`, in order, into a video at `path` playing at `fps` frames per second.
    fn encode(&self, path: &Path, frames: &[Image], fps: u32) -> anyhow::Result<()>;
}

/// Returns an encoder suitable for the file extension of `path`.
///
/// `.gif` files are written with [`GifEncoder`], everything else is handed to ffmpeg.
pub fn encoder_for_path(path: &Path) -> Box<dyn VideoEncoder> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("gif") => Box::new(GifEncoder::default()),
        _ => Box::new(FfmpegEncoder::from_env()),
    }
}

fn check_frames(frames: &[Image]) -> anyhow::Result<(u32, u32)> {
    let Some(first) = frames.first() else {
        bail!("cannot encode a video without frames");
    };
    let size = (first.width(), first.height());
    if let Some((index, frame)) = frames
        .iter()
        .enumerate()
        .find(|(_, f)| (f.width(), f.height()) != size)
    {
        bail!(
            "frame {index} is {}x{}, but the video is {}x{}",
            frame.width(),
            frame.height(),
            size.0,
            size.1
        );
    }
    Ok(size)
}

/// Encodes animated GIFs.
#[derive(Debug, Clone)]
pub struct GifEncoder {
    /// Quantization speed, from 1 (best quality) to 30 (fastest).
    pub speed: i32,
}

impl Default for GifEncoder {
    fn default() -> Self {
        Self { speed: 10 }
    }
}

impl VideoEncoder for GifEncoder {
    fn encode(&self, path: &Path, frames: &[Image], fps: u32) -> anyhow::Result<()> {
        check_frames(frames)?;
        let file = File::create(path)
            .with_context(|| format!("failed to create '{}'", path.display()))?;

        let mut encoder = gif::GifEncoder::new_with_speed(BufWriter::new(file), self.speed);
        encoder.set_repeat(Repeat::Infinite)?;
        let delay = Delay::from_numer_denom_ms(1000, fps.max(1));
        encoder
            .encode_frames(
                frames
                    .iter()
                    .map(|image| Frame::from_parts(image.buf.clone(), 0, 0, delay)),
            )
            .with_context(|| format!("failed to encode '{}'", path.display()))?;
        Ok(())
    }
}

/// Encodes videos by piping raw frames into an `ffmpeg` process.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: OsString,
}

impl FfmpegEncoder {
    /// Environment variable overriding the `ffmpeg` binary.
    pub const PROGRAM_VAR: &'static str = "HANDMARKS_FFMPEG";

    pub fn new<P: Into<OsString>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Uses the program named by `HANDMARKS_FFMPEG`, or `ffmpeg` from `PATH`.
    pub fn from_env() -> Self {
        Self::new(std::env::var_os(Self::PROGRAM_VAR).unwrap_or_else(|| "ffmpeg".into()))
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn encode(&self, path: &Path, frames: &[Image], fps: u32) -> anyhow::Result<()> {
        let (width, height) = check_frames(frames)?;

        let mut child = Command::new(&self.program)
            .args(["-y", "-loglevel", "error"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgba"])
            .arg("-s")
            .arg(format!("{width}x{height}"))
            .arg("-r")
            .arg(fps.max(1).to_string())
            .args(["-i", "-"])
            // yuv420p needs even dimensions
            .args(["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2", "-pix_fmt", "yuv420p"])
            .arg(path)
            .stdin(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to run '{}'", self.program.to_string_lossy()))?;

        let write_result = match child.stdin.take() {
            Some(stdin) => {
                let mut stdin = BufWriter::new(stdin);
                frames
                    .iter()
                    .try_for_each(|frame| stdin.write_all(frame.data()))
                    .and_then(|()| stdin.flush())
            }
            None => Ok(()),
        };

        let status = child.wait().context("failed to wait for ffmpeg")?;
        if !status.success() {
            bail!("ffmpeg failed to encode '{}' ({status})", path.display());
        }
        write_result.context("failed to stream frames to ffmpeg")?;
        log::debug!("encoded {} frames into '{}'", frames.len(), path.display());
        Ok(())
    }
}
