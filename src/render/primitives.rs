//! Primitive rendering functions.
//!
//! Implements rasterization algorithms for basic geometric shapes.

use crate::color::Rgba;
use crate::framebuffer::Framebuffer;

// ============================================================================
// Line Drawing
// ============================================================================

/// Draw a line using Bresenham's algorithm (non-antialiased).
///
/// # Arguments
///
/// * `fb` - Target framebuffer
/// * `x0`, `y0` - Start coordinates
/// * `x1`, `y1` - End coordinates
/// * `color` - Line color
pub fn draw_line(fb: &mut Framebuffer, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba) {
    bresenham(x0, y0, x1, y1, |x, y, _| {
        if x >= 0 && y >= 0 {
            fb.set_pixel(x as u32, y as u32, color);
        }
    });
}

/// Draw a line `thickness` pixels wide.
///
/// Axis-aligned lines are filled as rectangles; other lines are stroked
/// with a square brush centered on the Bresenham path.
pub fn draw_line_thick(
    fb: &mut Framebuffer,
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    thickness: u32,
    color: Rgba,
) {
    let t = thickness.max(1) as i32;
    let half = t / 2;

    if y0 == y1 {
        let (lo, hi) = (x0.min(x1), x0.max(x1));
        draw_rect(fb, lo, y0 - half, (hi - lo + 1) as u32, t as u32, color);
        return;
    }
    if x0 == x1 {
        let (lo, hi) = (y0.min(y1), y0.max(y1));
        draw_rect(fb, x0 - half, lo, t as u32, (hi - lo + 1) as u32, color);
        return;
    }

    bresenham(x0, y0, x1, y1, |x, y, _| {
        draw_rect(fb, x - half, y - half, t as u32, t as u32, color);
    });
}

/// Draw a dashed line with `dash` pixels on and `dash` pixels off.
pub fn draw_dashed_line(
    fb: &mut Framebuffer,
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    dash: u32,
    color: Rgba,
) {
    let period = (dash.max(1) * 2) as usize;
    bresenham(x0, y0, x1, y1, |x, y, step| {
        if step % period < period / 2 && x >= 0 && y >= 0 {
            fb.set_pixel(x as u32, y as u32, color);
        }
    });
}

fn bresenham(x0: i32, y0: i32, x1: i32, y1: i32, mut plot: impl FnMut(i32, i32, usize)) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;
    let mut step = 0usize;

    loop {
        plot(x, y, step);
        step += 1;

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
}

// ============================================================================
// Rectangle Drawing
// ============================================================================

/// Draw a filled rectangle. Negative origins are clipped.
pub fn draw_rect(fb: &mut Framebuffer, x: i32, y: i32, width: u32, height: u32, color: Rgba) {
    let clip_w = if x < 0 { width.saturating_sub(x.unsigned_abs()) } else { width };
    let clip_h = if y < 0 { height.saturating_sub(y.unsigned_abs()) } else { height };
    fb.fill_rect(x.max(0) as u32, y.max(0) as u32, clip_w, clip_h, color);
}

/// Draw a rectangle outline.
pub fn draw_rect_outline(
    fb: &mut Framebuffer,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    color: Rgba,
    thickness: u32,
) {
    let thickness = thickness.max(1);
    let x = x.max(0) as u32;
    let y = y.max(0) as u32;

    // Top edge
    fb.fill_rect(x, y, width, thickness, color);
    // Bottom edge
    if height > thickness {
        fb.fill_rect(x, y + height - thickness, width, thickness, color);
    }
    // Left edge
    if height > 2 * thickness {
        fb.fill_rect(x, y + thickness, thickness, height - 2 * thickness, color);
    }
    // Right edge
    if width > thickness && height > 2 * thickness {
        fb.fill_rect(
            x + width - thickness,
            y + thickness,
            thickness,
            height - 2 * thickness,
            color,
        );
    }
}

// ============================================================================
// Circle/Point Drawing
// ============================================================================

/// Draw a filled circle using the midpoint algorithm.
///
/// Translucent colors are alpha-blended so overlapping markers stay visible.
pub fn draw_circle(fb: &mut Framebuffer, cx: i32, cy: i32, radius: i32, color: Rgba) {
    if radius <= 0 {
        if radius == 0 && cx >= 0 && cy >= 0 {
            fb.blend_pixel(cx as u32, cy as u32, color);
        }
        return;
    }

    // Spans are collected first so blended rows are painted exactly once.
    let mut spans: Vec<(i32, i32)> = vec![(i32::MAX, i32::MIN); (2 * radius + 1) as usize];
    let mut widen = |dy: i32, half: i32| {
        let span = &mut spans[(dy + radius) as usize];
        span.0 = span.0.min(cx - half);
        span.1 = span.1.max(cx + half);
    };

    let mut x = radius;
    let mut y = 0;
    let mut err = 1 - radius;

    while x >= y {
        widen(y, x);
        widen(-y, x);
        widen(x, y);
        widen(-x, y);

        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }

    for (i, &(x1, x2)) in spans.iter().enumerate() {
        if x1 <= x2 {
            draw_horizontal_line(fb, x1, x2, cy - radius + i as i32, color);
        }
    }
}

/// Draw a point with variable size (rendered as filled circle).
pub fn draw_point(fb: &mut Framebuffer, x: f32, y: f32, size: f32, color: Rgba) {
    let radius = (size / 2.0).round() as i32;
    draw_circle(fb, x.round() as i32, y.round() as i32, radius, color);
}

/// Helper to draw a horizontal line (used by filled circle).
#[inline]
fn draw_horizontal_line(fb: &mut Framebuffer, x1: i32, x2: i32, y: i32, color: Rgba) {
    if y < 0 || y >= fb.height() as i32 {
        return;
    }

    let x_start = x1.max(0) as u32;
    let x_end = (x2 + 1).max(0).min(fb.width() as i32) as u32;

    if x_start >= x_end {
        return;
    }
    if color.a == 255 {
        fb.fill_rect(x_start, y as u32, x_end - x_start, 1, color);
    } else {
        for x in x_start..x_end {
            fb.blend_pixel(x, y as u32, color);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> Framebuffer {
        let mut fb = Framebuffer::new(100, 100).expect("framebuffer creation should succeed");
        fb.clear(Rgba::WHITE);
        fb
    }

    #[test]
    fn test_draw_line_horizontal() {
        let mut fb = canvas();
        draw_line(&mut fb, 10, 50, 90, 50, Rgba::BLACK);

        assert_eq!(fb.get_pixel(10, 50), Some(Rgba::BLACK));
        assert_eq!(fb.get_pixel(50, 50), Some(Rgba::BLACK));
        assert_eq!(fb.get_pixel(90, 50), Some(Rgba::BLACK));
    }

    #[test]
    fn test_draw_line_diagonal() {
        let mut fb = canvas();
        draw_line(&mut fb, 10, 10, 90, 90, Rgba::BLACK);

        assert_eq!(fb.get_pixel(10, 10), Some(Rgba::BLACK));
        assert_eq!(fb.get_pixel(50, 50), Some(Rgba::BLACK));
        assert_eq!(fb.get_pixel(90, 90), Some(Rgba::BLACK));
    }

    #[test]
    fn test_line_out_of_bounds() {
        let mut fb = canvas();
        draw_line(&mut fb, -10, -10, 110, 110, Rgba::BLACK);
        assert_eq!(fb.get_pixel(50, 50), Some(Rgba::BLACK));
    }

    #[test]
    fn test_draw_line_thick() {
        let mut fb = canvas();
        draw_line_thick(&mut fb, 10, 50, 90, 50, 3, Rgba::BLACK);

        assert_eq!(fb.get_pixel(50, 49), Some(Rgba::BLACK));
        assert_eq!(fb.get_pixel(50, 51), Some(Rgba::BLACK));
        assert_eq!(fb.get_pixel(50, 53), Some(Rgba::WHITE));
    }

    #[test]
    fn test_dashed_line_has_gaps() {
        let mut fb = canvas();
        draw_dashed_line(&mut fb, 0, 10, 99, 10, 4, Rgba::BLACK);

        assert_eq!(fb.get_pixel(0, 10), Some(Rgba::BLACK));
        assert_eq!(fb.get_pixel(5, 10), Some(Rgba::WHITE));
        assert_eq!(fb.get_pixel(8, 10), Some(Rgba::BLACK));
    }

    #[test]
    fn test_draw_rect_negative_origin() {
        let mut fb = canvas();
        draw_rect(&mut fb, -10, -10, 20, 20, Rgba::BLACK);

        assert_eq!(fb.get_pixel(9, 9), Some(Rgba::BLACK));
        assert_eq!(fb.get_pixel(10, 10), Some(Rgba::WHITE));
    }

    #[test]
    fn test_draw_rect_outline() {
        let mut fb = canvas();
        draw_rect_outline(&mut fb, 20, 20, 30, 30, Rgba::BLACK, 2);

        assert_eq!(fb.get_pixel(20, 20), Some(Rgba::BLACK));
        assert_eq!(fb.get_pixel(35, 35), Some(Rgba::WHITE));
    }

    #[test]
    fn test_draw_circle() {
        let mut fb = canvas();
        draw_circle(&mut fb, 50, 50, 20, Rgba::BLACK);

        assert_eq!(fb.get_pixel(50, 50), Some(Rgba::BLACK));
        assert_eq!(fb.get_pixel(70, 50), Some(Rgba::BLACK));
        assert_eq!(fb.get_pixel(5, 5), Some(Rgba::WHITE));
    }

    #[test]
    fn test_translucent_circle_blends_once() {
        let mut fb = canvas();
        draw_circle(&mut fb, 50, 50, 5, Rgba::new(0, 0, 0, 128));

        // every covered pixel sees the same single blend
        let center = fb.get_pixel(50, 50).unwrap();
        let edge = fb.get_pixel(55, 50).unwrap();
        assert_eq!(center, edge);
        assert!(center.r > 120 && center.r < 135);
    }

    #[test]
    fn test_circle_zero_radius() {
        let mut fb = canvas();
        draw_circle(&mut fb, 50, 50, 0, Rgba::BLACK);
        assert_eq!(fb.get_pixel(50, 50), Some(Rgba::BLACK));
    }

    #[test]
    fn test_draw_point() {
        let mut fb = canvas();
        draw_point(&mut fb, 50.0, 50.0, 10.0, Rgba::BLACK);
        assert_eq!(fb.get_pixel(50, 50), Some(Rgba::BLACK));
    }
}
