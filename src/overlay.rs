//! Debug overlay of resolved hand landmarks.

use crate::hand::{HandSide, CONNECTIVITY};
use crate::image::{draw, Color, Image};
use crate::landmark::{FrameMarks, HandMarks};

/// Returns the color used to draw hands of the given side.
pub fn side_color(side: HandSide) -> Color {
    match side {
        HandSide::Right => Color::from_rgb8(255, 64, 64),
        HandSide::Left => Color::from_rgb8(64, 160, 255),
    }
}

/// Draws every hand of `frame` onto `image`.
pub fn draw_frame_marks(image: &mut Image, frame: &FrameMarks) {
    for (side, hand) in frame.hands() {
        draw_hand(image, hand, side);
    }
}

/// Draws a hand's skeleton, its landmarks, its bounding box and a side label.
pub fn draw_hand(image: &mut Image, hand: &HandMarks, side: HandSide) {
    let color = side_color(side);
    let bounds = Bounds::of(image);
    for (a, b) in CONNECTIVITY {
        let Some(([ax, ay], [bx, by])) = bounds.clip(hand.get(*a as usize), hand.get(*b as usize))
        else {
            continue;
        };
        draw::line(image, ax, ay, bx, by)
            .color(Color::WHITE)
            .stroke_width(2);
    }
    for &point in hand.points() {
        let [x, y] = bounds.clamp(point);
        draw::marker(image, x, y).color(color);
    }

    let [x0, y0, x1, y1] = hand.bounding_box();
    let [x0, y0] = bounds.clamp([x0, y0]);
    let [x1, y1] = bounds.clamp([x1, y1]);
    draw::rect(image, x0, y0, x1, y1).color(color);
    let label = match side {
        HandSide::Right => "R",
        HandSide::Left => "L",
    };
    draw::text(image, x0, y0 - 2, label)
        .align_left()
        .align_bottom()
        .color(color);
}

/// The image area plus a margin wide enough that clipped strokes and markers still reach the edge.
///
/// Landmarks can lie arbitrarily far outside the image. Drawing them unclipped overflows the
/// `i32` arithmetic of the line rasterizer, so everything is clipped or clamped to this area.
struct Bounds {
    min: f64,
    max_x: f64,
    max_y: f64,
}

impl Bounds {
    const MARGIN: f64 = 8.0;

    fn of(image: &Image) -> Self {
        Self {
            min: -Self::MARGIN,
            max_x: f64::from(image.width()) + Self::MARGIN,
            max_y: f64::from(image.height()) + Self::MARGIN,
        }
    }

    fn clamp(&self, [x, y]: [i64; 2]) -> [i32; 2] {
        [
            (x as f64).clamp(self.min, self.max_x) as i32,
            (y as f64).clamp(self.min, self.max_y) as i32,
        ]
    }

    /// Clips the segment from `a` to `b` (Liang-Barsky), returning [`None`] if it lies entirely
    /// outside.
    fn clip(&self, a: [i64; 2], b: [i64; 2]) -> Option<([i32; 2], [i32; 2])> {
        let (x0, y0) = (a[0] as f64, a[1] as f64);
        let (dx, dy) = (b[0] as f64 - x0, b[1] as f64 - y0);
        let (mut t0, mut t1) = (0.0f64, 1.0f64);
        for (p, q) in [
            (-dx, x0 - self.min),
            (dx, self.max_x - x0),
            (-dy, y0 - self.min),
            (dy, self.max_y - y0),
        ] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
            if t0 > t1 {
                return None;
            }
        }

        // `f64` loses precision for huge coordinates; clamping keeps the rounded result in bounds.
        let at = |t: f64| {
            [
                (x0 + t * dx).round().clamp(self.min, self.max_x) as i32,
                (y0 + t * dy).round().clamp(self.min, self.max_y) as i32,
            ]
        };
        Some((at(t0), at(t1)))
    }
}
