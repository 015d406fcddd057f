//! Built-in 5x7 bitmap glyphs for overlay text.
//!
//! Only the characters the overlays use are defined; anything else renders as `?`.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

pub const GLYPH_WIDTH: u32 = 5;
pub const GLYPH_HEIGHT: u32 = 7;
const GLYPH_SPACING: u32 = 1;

// Each row is 5 bits wide, most significant bit on the left.
fn glyph(c: char) -> [u8; 7] {
    match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        ' ' => [0x00; 7],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'g' => [0x00, 0x0F, 0x11, 0x11, 0x0F, 0x01, 0x0E],
        'n' => [0x00, 0x00, 0x16, 0x19, 0x11, 0x11, 0x11],
        'o' => [0x00, 0x00, 0x0E, 0x11, 0x11, 0x11, 0x0E],
        't' => [0x08, 0x08, 0x1C, 0x08, 0x08, 0x09, 0x06],
        'u' => [0x00, 0x00, 0x11, 0x11, 0x11, 0x13, 0x0D],
        _ => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
    }
}

/// Rendered width of `text` in pixels at `scale`.
pub fn text_width(text: &str, scale: u32) -> u32 {
    let chars = text.chars().count() as u32;
    if chars == 0 {
        return 0;
    }
    (chars.saturating_mul(GLYPH_WIDTH + GLYPH_SPACING) - GLYPH_SPACING).saturating_mul(scale)
}

pub fn text_height(scale: u32) -> u32 {
    GLYPH_HEIGHT.saturating_mul(scale)
}

/// Draw `text` with its top-left corner at `(x, y)`. Pixels outside the image are clipped.
pub fn draw_text_mut(image: &mut RgbImage, text: &str, x: i32, y: i32, scale: u32, color: Rgb<u8>) {
    let scale = i64::from(scale.max(1));
    let (width, height) = (i64::from(image.width()), i64::from(image.height()));
    let advance = i64::from(GLYPH_WIDTH + GLYPH_SPACING) * scale;
    for (i, c) in text.chars().enumerate() {
        let origin_x = i64::from(x) + i as i64 * advance;
        if origin_x >= width {
            break;
        }
        for (row, bits) in glyph(c).iter().enumerate() {
            let py = i64::from(y) + row as i64 * scale;
            if py >= height || py + scale <= 0 {
                continue;
            }
            for col in 0..GLYPH_WIDTH {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                let px = origin_x + i64::from(col) * scale;
                if px >= width || px + scale <= 0 {
                    continue;
                }
                fill_block(image, px, py, scale, color);
            }
        }
    }
}

// Caller guarantees the block overlaps the image.
fn fill_block(image: &mut RgbImage, x: i64, y: i64, size: i64, color: Rgb<u8>) {
    let (width, height) = (i64::from(image.width()), i64::from(image.height()));
    let (x0, y0) = (x.max(0), y.max(0));
    let (x1, y1) = ((x + size).min(width), (y + size).min(height));
    let rect = Rect::at(x0 as i32, y0 as i32).of_size((x1 - x0) as u32, (y1 - y0) as u32);
    draw_filled_rect_mut(image, rect, color);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_accounts_for_spacing_and_scale() {
        assert_eq!(text_width("", 2), 0);
        assert_eq!(text_width("1", 1), 5);
        assert_eq!(text_width("12", 1), 11);
        assert_eq!(text_width("12", 3), 33);
        assert_eq!(text_height(3), 21);
    }

    #[test]
    fn draws_set_bits_only() {
        let mut img = RgbImage::new(8, 8);
        let red = Rgb([255, 0, 0]);
        draw_text_mut(&mut img, "-", 0, 0, 1, red);
        // '-' is a single full row at index 3.
        for x in 0..5 {
            assert_eq!(*img.get_pixel(x, 3), red);
            assert_eq!(*img.get_pixel(x, 2), Rgb([0, 0, 0]));
        }
    }

    #[test]
    fn clips_text_outside_the_image() {
        let mut img = RgbImage::new(4, 4);
        draw_text_mut(&mut img, "Count: 12", -3, -5, 2, Rgb([1, 2, 3]));
        draw_text_mut(&mut img, "ID:1", 100, 100, 1, Rgb([1, 2, 3]));
    }

    #[test]
    fn extreme_origins_and_scales_do_not_overflow() {
        let mut img = RgbImage::new(6, 6);
        let c = Rgb([9, 9, 9]);
        draw_text_mut(&mut img, "Count: 99", i32::MIN, i32::MIN, u32::MAX, c);
        draw_text_mut(&mut img, "Count: 99", i32::MAX, i32::MAX, u32::MAX, c);
        draw_text_mut(&mut img, "D", -2, -2, u32::MAX, c);
        assert_eq!(*img.get_pixel(5, 5), c);
        assert_eq!(text_height(u32::MAX), u32::MAX);
        assert_eq!(text_width("ab", u32::MAX), u32::MAX);
    }
}
