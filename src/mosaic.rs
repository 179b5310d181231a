//! Tiling of per-camera images into one composite frame.

use crate::image::{draw, Color, Image};

/// Grid geometry of a mosaic.
///
/// Tiles are laid out row by row in a near-square grid with `ceil(sqrt(n))` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MosaicLayout {
    pub columns: u32,
    pub rows: u32,
    pub tile_width: u32,
    pub tile_height: u32,
}

impl MosaicLayout {
    pub fn new(num_tiles: usize, tile_width: u32, tile_height: u32) -> Self {
        let num_tiles = num_tiles.max(1) as u32;
        let mut columns = (num_tiles as f64).sqrt().ceil() as u32;
        // guard against float rounding for perfect squares
        while columns > 1 && (columns - 1) * (columns - 1) >= num_tiles {
            columns -= 1;
        }
        let rows = (num_tiles + columns - 1) / columns;
        Self {
            columns,
            rows,
            tile_width,
            tile_height,
        }
    }

    /// Computes a layout whose tiles are `tile_width` pixels wide and keep the aspect ratio of a
    /// `frame_width`x`frame_height` camera frame.
    pub fn scaled(num_tiles: usize, frame_width: u32, frame_height: u32, tile_width: u32) -> Self {
        let tile_height = if frame_width == 0 {
            tile_width
        } else {
            (u64::from(tile_width) * u64::from(frame_height) / u64::from(frame_width)).max(1) as u32
        };
        Self::new(num_tiles, tile_width, tile_height)
    }

    pub fn width(&self) -> u32 {
        self.columns * self.tile_width
    }

    pub fn height(&self) -> u32 {
        self.rows * self.tile_height
    }

    /// Returns the top left corner of tile `index`.
    pub fn tile_origin(&self, index: usize) -> (u32, u32) {
        let index = index as u32;
        (
            index % self.columns * self.tile_width,
            index / self.columns * self.tile_height,
        )
    }
}

/// A mosaic tile: a camera label and its rendered frame, if the camera has one.
pub struct Tile<'a> {
    pub label: &'a str,
    pub image: Option<&'a Image>,
}

/// Composes `tiles` into a single image.
///
/// Tile images are scaled to the layout's tile size. Tiles without an image are left black. Every
/// tile is labelled in its top left corner.
pub fn compose(layout: &MosaicLayout, tiles: &[Tile<'_>]) -> Image {
    let mut mosaic = Image::new(layout.width(), layout.height());
    mosaic.clear(Color::BLACK);

    for (index, tile) in tiles.iter().enumerate() {
        let (x, y) = layout.tile_origin(index);
        if let Some(image) = tile.image {
            mosaic.blit(&image.resized(layout.tile_width, layout.tile_height), x, y);
        }
        draw::text(&mut mosaic, x as i32 + 4, y as i32 + 4, tile.label)
            .align_left()
            .align_top()
            .color(Color::YELLOW);
    }

    mosaic
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_is_near_square() {
        let dims = |n| {
            let layout = MosaicLayout::new(n, 1, 1);
            (layout.columns, layout.rows)
        };
        assert_eq!(dims(1), (1, 1));
        assert_eq!(dims(2), (2, 1));
        assert_eq!(dims(3), (2, 2));
        assert_eq!(dims(4), (2, 2));
        assert_eq!(dims(5), (3, 2));
        assert_eq!(dims(8), (3, 3));
        assert_eq!(dims(9), (3, 3));
        assert_eq!(dims(10), (4, 3));
    }

    #[test]
    fn scaled_keeps_aspect() {
        let layout = MosaicLayout::scaled(4, 1280, 720, 320);
        assert_eq!((layout.tile_width, layout.tile_height), (320, 180));
        assert_eq!((layout.width(), layout.height()), (640, 360));
        assert_eq!(layout.tile_origin(3), (320, 180));
    }

    #[test]
    fn compose_places_tiles() {
        let mut red = Image::new(10, 10);
        red.clear(Color::RED);
        let layout = MosaicLayout::new(3, 20, 20);
        let mosaic = compose(
            &layout,
            &[
                Tile { label: "", image: Some(&red) },
                Tile { label: "", image: None },
                Tile { label: "", image: Some(&red) },
            ],
        );

        assert_eq!((mosaic.width(), mosaic.height()), (40, 40));
        assert_eq!(mosaic.get(10, 10), Color::RED);
        assert_eq!(mosaic.get(30, 10), Color::BLACK);
        assert_eq!(mosaic.get(10, 30), Color::RED);
        assert_eq!(mosaic.get(30, 30), Color::BLACK);
    }
}
