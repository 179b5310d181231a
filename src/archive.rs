//! Persistence of landmark results as a compressed NumPy `.npz` archive.
//!
//! The archive holds one `int64` array per camera, named by the camera serial, with shape
//! `(2, num_frames, 21, 2)`: slot (right, left), frame, landmark, and `x`/`y`. Absent hands are
//! stored with every coordinate set to [`SENTINEL`].

use std::{
    collections::BTreeMap,
    fs::{self, File},
    path::Path,
};

use anyhow::{bail, Context};
use ndarray::{s, Array4, ArrayView4};
use ndarray_npy::{NpzReader, NpzWriter};

use crate::hand::HandSide;
use crate::landmark::{CameraMarks, FrameMarks, HandMarks, NUM_LANDMARKS, SENTINEL};

/// Default file name of the archive.
pub const FILE_NAME: &str = "mp_handmarks_results.npz";

/// Converts a camera's landmarks into the archive's array layout.
pub fn to_array(marks: &[FrameMarks]) -> Array4<i64> {
    let mut array = Array4::from_elem((2, marks.len(), NUM_LANDMARKS, 2), SENTINEL);
    for (index, frame) in marks.iter().enumerate() {
        for (side, hand) in frame.hands() {
            for (landmark, [x, y]) in hand.points().iter().enumerate() {
                array[[side.slot(), index, landmark, 0]] = *x;
                array[[side.slot(), index, landmark, 1]] = *y;
            }
        }
    }
    array
}

/// Converts an array in the archive's layout back into landmarks.
///
/// A slot is absent if and only if all of its coordinates are [`SENTINEL`].
pub fn from_array(array: ArrayView4<'_, i64>) -> anyhow::Result<CameraMarks> {
    let (slots, num_frames, landmarks, coords) = array.dim();
    if (slots, landmarks, coords) != (2, NUM_LANDMARKS, 2) {
        bail!(
            "landmark array has shape {:?}, expected (2, n, {NUM_LANDMARKS}, 2)",
            array.shape()
        );
    }

    let marks = (0..num_frames)
        .map(|index| {
            let mut frame = FrameMarks::EMPTY;
            for side in HandSide::ALL {
                let hand = array.slice(s![side.slot(), index, .., ..]);
                if hand.iter().all(|&v| v == SENTINEL) {
                    continue;
                }
                let mut points = [[0; 2]; NUM_LANDMARKS];
                for (landmark, point) in points.iter_mut().enumerate() {
                    *point = [hand[[landmark, 0]], hand[[landmark, 1]]];
                }
                frame[side] = Some(HandMarks::new(points));
            }
            frame
        })
        .collect();
    Ok(marks)
}

/// Writes the results of all cameras to a compressed `.npz` archive at `path`.
///
/// Missing parent directories are created.
pub fn save<P: AsRef<Path>>(path: P, results: &BTreeMap<String, CameraMarks>) -> anyhow::Result<()> {
    save_impl(path.as_ref(), results)
}

fn save_impl(path: &Path, results: &BTreeMap<String, CameraMarks>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create '{}'", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("failed to create '{}'", path.display()))?;

    let mut npz = NpzWriter::new_compressed(file);
    for (serial, marks) in results {
        npz.add_array(serial.as_str(), &to_array(marks))
            .with_context(|| format!("failed to write '{serial}' to '{}'", path.display()))?;
    }
    npz.finish()
        .with_context(|| format!("failed to finish '{}'", path.display()))?;

    log::info!(
        "wrote landmarks of {} cameras to '{}'",
        results.len(),
        path.display()
    );
    Ok(())
}

/// Reads an archive written by [`save`].
pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<BTreeMap<String, CameraMarks>> {
    load_impl(path.as_ref())
}

fn load_impl(path: &Path) -> anyhow::Result<BTreeMap<String, CameraMarks>> {
    let file = File::open(path).with_context(|| format!("failed to open '{}'", path.display()))?;
    let mut npz =
        NpzReader::new(file).with_context(|| format!("failed to read '{}'", path.display()))?;

    let mut results = BTreeMap::new();
    let names = npz
        .names()
        .with_context(|| format!("failed to list arrays in '{}'", path.display()))?;
    for name in names {
        let array: Array4<i64> = npz
            .by_name(&name)
            .with_context(|| format!("failed to read '{name}' from '{}'", path.display()))?;
        let marks = from_array(array.view()).with_context(|| format!("camera '{name}'"))?;
        results.insert(name, marks);
    }
    Ok(results)
}
