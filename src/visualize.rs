//! Rendering of multi-camera landmark visualizations.
//!
//! Every frame index is rendered into one mosaic that shows the frame of every camera with its
//! landmarks drawn on top. Frames are rendered in parallel; the finished mosaics are optionally
//! saved as PNG images by a separate pool of writer threads and then encoded into a video in frame
//! order.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use anyhow::{bail, Context};
use rayon::prelude::*;

use crate::image::Image;
use crate::landmark::CameraMarks;
use crate::mosaic::{self, MosaicLayout, Tile};
use crate::overlay::draw_frame_marks;
use crate::pool::WorkerPool;
use crate::source::ImageSource;
use crate::timer::{Progress, Timer};
use crate::video::VideoEncoder;

/// Returns the file name of the saved mosaic of frame `index`.
pub fn frame_file_name(index: usize) -> String {
    format!("vis_{index:06}.png")
}

/// Renders landmark mosaics.
#[derive(Debug, Clone)]
pub struct Visualizer {
    fps: u32,
    tile_width: u32,
    frame_dir: Option<PathBuf>,
    writers: usize,
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Visualizer {
    pub fn new() -> Self {
        Self {
            fps: 30,
            tile_width: 640,
            frame_dir: None,
            writers: 4,
        }
    }

    /// Sets the frame rate of the encoded video. Defaults to 30.
    pub fn fps(self, fps: u32) -> Self {
        Self { fps, ..self }
    }

    /// Sets the width of each camera's tile in the mosaic. Defaults to 640.
    pub fn tile_width(self, tile_width: u32) -> Self {
        Self {
            tile_width: tile_width.max(1),
            ..self
        }
    }

    /// Saves every rendered mosaic as a PNG image in `dir`.
    pub fn save_frames<P: Into<PathBuf>>(self, dir: P) -> Self {
        Self {
            frame_dir: Some(dir.into()),
            ..self
        }
    }

    /// Sets the number of threads writing mosaic images. Defaults to 4.
    pub fn writers(self, writers: usize) -> Self {
        Self { writers, ..self }
    }

    /// Renders the mosaic of every frame of `source`, returning them in frame order.
    ///
    /// Cameras of `source` without an entry in `results` are shown as blank tiles. Mosaics are
    /// saved as they are rendered if [`Visualizer::save_frames`] was used.
    pub fn render<S>(
        &self,
        source: &S,
        results: &BTreeMap<String, CameraMarks>,
    ) -> anyhow::Result<Vec<Image>>
    where
        S: ImageSource + ?Sized,
    {
        let num_frames = source.num_frames();
        let mut serials = source.serials().to_vec();
        serials.sort();
        for (serial, marks) in results {
            if !serials.contains(serial) {
                log::warn!("ignoring landmarks of unknown camera '{serial}'");
            } else if marks.len() != num_frames {
                bail!(
                    "camera '{serial}' has landmarks for {} frames, but the sequence has {num_frames}",
                    marks.len()
                );
            }
        }

        let layout = self.layout(source, &serials, results)?;
        log::info!(
            "rendering {num_frames} mosaics of {}x{} pixels ({}x{} tiles)",
            layout.width(),
            layout.height(),
            layout.columns,
            layout.rows,
        );

        let writer = match &self.frame_dir {
            Some(dir) => {
                fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create '{}'", dir.display()))?;
                Some(FrameWriter::spawn(self.writers)?)
            }
            None => None,
        };

        let timer = Timer::new("render");
        let progress = Mutex::new(Progress::new("render", num_frames));
        let mosaics = (0..num_frames)
            .into_par_iter()
            .map(|index| -> anyhow::Result<Image> {
                let mosaic = timer.time(|| render_frame(source, &serials, results, &layout, index))?;
                if let (Some(writer), Some(dir)) = (&writer, &self.frame_dir) {
                    writer.submit(dir.join(frame_file_name(index)), mosaic.clone());
                }
                progress
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .tick_quiet(100);
                Ok(mosaic)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        log::debug!("{timer}");
        progress
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .finish();

        if let Some(writer) = writer {
            writer.finish()?;
        }
        Ok(mosaics)
    }

    /// Encodes `mosaics` into a video at `path`, creating its parent directories.
    pub fn write_video(
        &self,
        encoder: &dyn VideoEncoder,
        path: &Path,
        mosaics: &[Image],
    ) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create '{}'", parent.display()))?;
        }
        encoder
            .encode(path, mosaics, self.fps)
            .with_context(|| format!("failed to write video '{}'", path.display()))?;
        log::info!("wrote {} frames to '{}'", mosaics.len(), path.display());
        Ok(())
    }

    fn layout<S>(
        &self,
        source: &S,
        serials: &[String],
        results: &BTreeMap<String, CameraMarks>,
    ) -> anyhow::Result<MosaicLayout>
    where
        S: ImageSource + ?Sized,
    {
        // Take the tile aspect ratio from a camera that has results, so that a failed camera
        // with unreadable frames does not break rendering.
        let reference = serials
            .iter()
            .find(|serial| results.contains_key(*serial))
            .or(serials.first());
        let Some(serial) = reference else {
            bail!("cannot render a sequence without cameras");
        };
        let frame = source
            .image(serial, 0)
            .with_context(|| format!("failed to load frame 0 of camera '{serial}'"))?;
        Ok(MosaicLayout::scaled(
            serials.len(),
            frame.width(),
            frame.height(),
            self.tile_width,
        ))
    }
}

/// Renders the mosaic of a single frame.
pub fn render_frame<S>(
    source: &S,
    serials: &[String],
    results: &BTreeMap<String, CameraMarks>,
    layout: &MosaicLayout,
    index: usize,
) -> anyhow::Result<Image>
where
    S: ImageSource + ?Sized,
{
    let mut images = Vec::with_capacity(serials.len());
    for serial in serials {
        let image = match results.get(serial) {
            Some(marks) => {
                let mut image = source.image(serial, index).with_context(|| {
                    format!("failed to load frame {index} of camera '{serial}'")
                })?;
                draw_frame_marks(&mut image, &marks[index]);
                Some(image)
            }
            None => None,
        };
        images.push(image);
    }

    let tiles = serials
        .iter()
        .zip(&images)
        .map(|(serial, image)| Tile {
            label: serial,
            image: image.as_ref(),
        })
        .collect::<Vec<_>>();
    Ok(mosaic::compose(layout, &tiles))
}

/// Saves images on a pool of writer threads and collects the failures.
struct FrameWriter {
    pool: WorkerPool<(PathBuf, Image)>,
    errors: crossbeam::channel::Receiver<anyhow::Error>,
}

impl FrameWriter {
    fn spawn(writers: usize) -> anyhow::Result<Self> {
        let (error_tx, errors) = crossbeam::channel::unbounded();
        let pool = WorkerPool::builder()
            .name("frame writer")
            .workers(writers)
            .spawn(move |(path, image): (PathBuf, Image)| {
                if let Err(e) = image.save(&path) {
                    error_tx.send(e).ok();
                }
            })
            .context("failed to spawn frame writers")?;
        Ok(Self { pool, errors })
    }

    fn submit(&self, path: PathBuf, image: Image) {
        self.pool.submit((path, image));
    }

    /// Waits for all queued images to be written, returning the first error.
    fn finish(self) -> anyhow::Result<()> {
        self.pool.join();
        let mut errors = self.errors.try_iter();
        match errors.next() {
            Some(first) => {
                let more = errors.count();
                if more != 0 {
                    log::error!("{more} more frame images could not be written");
                }
                Err(first)
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::HandSides;
    use crate::image::Color;
    use crate::landmark::FrameMarks;
    use crate::test::hand_at;

    struct GraySource {
        serials: Vec<String>,
    }

    impl ImageSource for GraySource {
        fn serials(&self) -> &[String] {
            &self.serials
        }

        fn num_frames(&self) -> usize {
            2
        }

        fn hand_sides(&self) -> HandSides {
            HandSides::Both
        }

        fn image(&self, _serial: &str, _frame: usize) -> anyhow::Result<Image> {
            let mut image = Image::new(40, 20);
            image.clear(Color::from_rgb8(128, 128, 128));
            Ok(image)
        }
    }

    #[test]
    fn failed_camera_is_blank_tile() {
        let source = GraySource {
            serials: vec!["b".into(), "a".into()],
        };
        let results = BTreeMap::from([(
            "b".to_string(),
            vec![FrameMarks::EMPTY, FrameMarks::new(Some(hand_at(5, 5)), None)],
        )]);

        let dir = tempfile::tempdir().unwrap();
        let mosaics = Visualizer::new()
            .tile_width(40)
            .save_frames(dir.path())
            .render(&source, &results)
            .unwrap();

        assert_eq!(mosaics.len(), 2);
        assert_eq!((mosaics[0].width(), mosaics[0].height()), (80, 20));
        // "a" sorts first and has no results
        assert_eq!(mosaics[0].get(30, 15), Color::BLACK);
        assert_eq!(mosaics[0].get(70, 15), Color::from_rgb8(128, 128, 128));
        for index in 0..2 {
            assert!(dir.path().join(frame_file_name(index)).exists());
        }
    }

    #[test]
    fn landmark_count_mismatch() {
        let source = GraySource {
            serials: vec!["a".into()],
        };
        let results = BTreeMap::from([("a".to_string(), vec![FrameMarks::EMPTY])]);
        Visualizer::new().render(&source, &results).unwrap_err();
    }
}
