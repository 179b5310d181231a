//! Drawing primitives used for debug overlays.
//!
//! Every function returns a guard that draws when dropped, so the drawing can be customized by
//! chaining setters first:
//!
//! ```no_run
//! # use handmarks::image::{draw, Color, Image};
//! # let mut image = Image::new(64, 64);
//! draw::line(&mut image, 0, 0, 10, 10).color(Color::GREEN).stroke_width(2);
//! ```

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii, MonoTextStyle},
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};

use crate::image::{Color, Image};

/// Guard returned by [`rect`]; draws the rectangle when dropped and allows customization.
pub struct DrawRect<'a> {
    image: &'a mut Image,
    rect: Rectangle,
    color: Color,
    stroke_width: u32,
}

impl DrawRect<'_> {
    /// Sets the rectangle's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the rectangle's stroke width.
    ///
    /// By default, a stroke width of 1 is used.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawRect<'_> {
    fn drop(&mut self) {
        let style = PrimitiveStyle::with_stroke(self.color, self.stroke_width);
        infallible(self.rect.into_styled(style).draw(&mut Target(&mut *self.image)));
    }
}

/// Guard returned by [`marker`]; draws the marker when dropped and allows customization.
pub struct DrawMarker<'a> {
    image: &'a mut Image,
    x: i32,
    y: i32,
    color: Color,
}

impl DrawMarker<'_> {
    /// Half the width and height of the 5x5 marker cross.
    const OFFSET: i32 = 2;

    /// Sets the marker's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }
}

impl Drop for DrawMarker<'_> {
    fn drop(&mut self) {
        let offset = Self::OFFSET;
        let pixels = (-offset..=offset)
            .zip(-offset..=offset)
            .chain((-offset..=offset).rev().zip(-offset..=offset))
            .map(|(xoff, yoff)| Pixel(Point::new(self.x + xoff, self.y + yoff), self.color));
        infallible(Target(&mut *self.image).draw_iter(pixels));
    }
}

/// Guard returned by [`line`][line()]; draws the line when dropped and allows customization.
pub struct DrawLine<'a> {
    image: &'a mut Image,
    start: Point,
    end: Point,
    color: Color,
    stroke_width: u32,
}

impl DrawLine<'_> {
    /// Sets the line's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the line's stroke width.
    ///
    /// By default, a stroke width of 1 is used.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawLine<'_> {
    fn drop(&mut self) {
        let style = PrimitiveStyle::with_stroke(self.color, self.stroke_width);
        infallible(
            Line::new(self.start, self.end)
                .into_styled(style)
                .draw(&mut Target(&mut *self.image)),
        );
    }
}

/// Guard returned by [`text`]; draws the text when dropped and allows customization.
pub struct DrawText<'a> {
    image: &'a mut Image,
    x: i32,
    y: i32,
    text: &'a str,
    color: Color,
    alignment: Alignment,
    baseline: Baseline,
}

impl DrawText<'_> {
    /// Sets the text color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Aligns the top of the text with the `y` coordinate.
    pub fn align_top(&mut self) -> &mut Self {
        self.baseline = Baseline::Top;
        self
    }

    /// Aligns the bottom of the text with the `y` coordinate.
    pub fn align_bottom(&mut self) -> &mut Self {
        self.baseline = Baseline::Bottom;
        self
    }

    /// Aligns the left side of the text with the `x` coordinate.
    pub fn align_left(&mut self) -> &mut Self {
        self.alignment = Alignment::Left;
        self
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        // FIXME: e-g's mono fonts only cover ASCII; non-ASCII serials render as '?'
        let character_style = MonoTextStyle::new(&ascii::FONT_6X10, self.color);
        let text_style = TextStyleBuilder::new()
            .alignment(self.alignment)
            .baseline(self.baseline)
            .build();
        infallible(
            Text::with_text_style(
                self.text,
                Point::new(self.x, self.y),
                character_style,
                text_style,
            )
            .draw(&mut Target(&mut *self.image)),
        );
    }
}

/// Draws the outline of the rectangle spanning `(x0, y0)` to `(x1, y1)` (inclusive) onto an image.
pub fn rect(image: &mut Image, x0: i32, y0: i32, x1: i32, y1: i32) -> DrawRect<'_> {
    DrawRect {
        image,
        rect: Rectangle::with_corners(Point::new(x0, y0), Point::new(x1, y1)),
        color: Color::RED,
        stroke_width: 1,
    }
}

/// Draws a marker onto an image.
///
/// This can be used to visualize shape landmarks or points of interest.
pub fn marker(image: &mut Image, x: i32, y: i32) -> DrawMarker<'_> {
    DrawMarker {
        image,
        x,
        y,
        color: Color::from_rgb8(255, 0, 0),
    }
}

/// Draws a line onto an image.
pub fn line(image: &mut Image, start_x: i32, start_y: i32, end_x: i32, end_y: i32) -> DrawLine<'_> {
    DrawLine {
        image,
        start: Point::new(start_x, start_y),
        end: Point::new(end_x, end_y),
        color: Color::from_rgb8(0, 0, 255),
        stroke_width: 1,
    }
}

/// Draws a text string onto an image.
///
/// By default, the text is drawn centered horizontally and vertically around `x` and `y`.
pub fn text<'a>(image: &'a mut Image, x: i32, y: i32, text: &'a str) -> DrawText<'a> {
    DrawText {
        image,
        x,
        y,
        text,
        color: Color::from_rgb8(255, 0, 0),
        alignment: Alignment::Center,
        baseline: Baseline::Middle,
    }
}

fn infallible<T>(res: Result<T, Infallible>) {
    match res {
        Ok(_) => {}
        Err(infallible) => match infallible {},
    }
}

struct Target<'a>(&'a mut Image);

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        let (width, height) = (self.0.width(), self.0.height());

        Rectangle {
            top_left: Point { x: 0, y: 0 },
            size: Size { width, height },
        }
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.y >= 0 {
                self.0.set(point.x as u32, point.y as u32, color);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_outline() {
        let mut image = Image::new(12, 12);
        rect(&mut image, 2, 2, 8, 8).color(Color::BLUE);
        assert_eq!(image.get(2, 2), Color::BLUE);
        assert_eq!(image.get(8, 8), Color::BLUE);
        assert_eq!(image.get(5, 2), Color::BLUE);
        assert_eq!(image.get(5, 5), Color::NULL);
    }

    #[test]
    fn marker_is_a_cross() {
        let mut image = Image::new(9, 9);
        marker(&mut image, 4, 4).color(Color::WHITE);
        assert_eq!(image.get(4, 4), Color::WHITE);
        assert_eq!(image.get(2, 2), Color::WHITE);
        assert_eq!(image.get(6, 2), Color::WHITE);
        assert_eq!(image.get(4, 2), Color::NULL);
    }

    #[test]
    fn drawing_outside_is_clipped() {
        let mut image = Image::new(4, 4);
        line(&mut image, -10, -10, 20, 20).color(Color::GREEN);
        marker(&mut image, -5, 100);
        text(&mut image, 50, 50, "out of bounds");
        assert_eq!(image.get(0, 0), Color::GREEN);
        assert_eq!(image.get(3, 3), Color::GREEN);
    }
}
