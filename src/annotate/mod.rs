//! Frame annotation.
//!
//! Draws one rectangle and label per accepted detection plus a count overlay, then
//! hands the frame to the sink. Annotation only reads detection data.

mod font;

use anyhow::Result;
use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::detect::BoundingBox;
use crate::frame::Frame;
use crate::output::FrameSink;

pub use font::{draw_text_mut, text_height, text_width};

/// Distance between the label's bottom edge and the top of its box.
const LABEL_OFFSET: i32 = 10;
/// Anchor of the count overlay: left edge and bottom edge of the text.
const COUNT_ORIGIN: (i32, i32) = (10, 30);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnnotationStyle {
    pub box_color: Rgb<u8>,
    pub label_color: Rgb<u8>,
    pub count_color: Rgb<u8>,
    pub box_thickness: u32,
    pub label_scale: u32,
    pub count_scale: u32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            box_color: Rgb([0, 255, 0]),
            label_color: Rgb([0, 255, 0]),
            count_color: Rgb([255, 0, 0]),
            box_thickness: 2,
            label_scale: 1,
            count_scale: 3,
        }
    }
}

/// What gets drawn for one detection.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub track_id: u64,
    pub bbox: BoundingBox,
    pub weight: f64,
}

pub fn label_text(track_id: u64, weight: f64) -> String {
    format!("ID:{} {:.1}g", track_id, weight)
}

pub fn count_text(count: usize) -> String {
    format!("Count: {}", count)
}

fn text_height_px(scale: u32) -> i32 {
    i32::try_from(text_height(scale)).unwrap_or(i32::MAX)
}

#[derive(Clone, Debug, Default)]
pub struct FrameAnnotator {
    style: AnnotationStyle,
}

impl FrameAnnotator {
    pub fn new(style: AnnotationStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &AnnotationStyle {
        &self.style
    }

    /// Draw boxes, labels and the count overlay onto `frame`.
    pub fn render(&self, frame: &mut Frame, annotations: &[Annotation], count: usize) {
        let image = frame.image_mut();
        let (width, height) = (f64::from(image.width()), f64::from(image.height()));
        // Edges clamped this far outside the frame stay invisible.
        let margin = f64::from(self.style.box_thickness.min(64)) + 1.0;
        for annotation in annotations {
            let b = &annotation.bbox;
            let (x1, y1) = (f64::from(b.x1), f64::from(b.y1));
            let (x2, y2) = (f64::from(b.x2), f64::from(b.y2));
            if x2 < 0.0 || y2 < 0.0 || x1 > width || y1 > height {
                continue;
            }
            let x1 = x1.clamp(-margin, width + margin);
            let y1 = y1.clamp(-margin, height + margin);
            let x2 = x2.clamp(-margin, width + margin);
            let y2 = y2.clamp(-margin, height + margin);
            let x = x1.floor() as i32;
            let y = y1.floor() as i32;
            let w = ((x2 - x1).round() as u32).max(1);
            let h = ((y2 - y1).round() as u32).max(1);
            for inset in 0..self.style.box_thickness {
                let (Some(iw), Some(ih)) = (
                    w.checked_sub(inset.saturating_mul(2)),
                    h.checked_sub(inset.saturating_mul(2)),
                ) else {
                    break;
                };
                if iw == 0 || ih == 0 {
                    break;
                }
                let inset = inset as i32;
                let rect = Rect::at(x + inset, y + inset).of_size(iw, ih);
                draw_hollow_rect_mut(image, rect, self.style.box_color);
            }

            let label_top = y
                .saturating_sub(LABEL_OFFSET)
                .saturating_sub(text_height_px(self.style.label_scale))
                .max(0);
            draw_text_mut(
                image,
                &label_text(annotation.track_id, annotation.weight),
                x.max(0),
                label_top,
                self.style.label_scale,
                self.style.label_color,
            );
        }

        let count_top = COUNT_ORIGIN
            .1
            .saturating_sub(text_height_px(self.style.count_scale))
            .max(0);
        draw_text_mut(
            image,
            &count_text(count),
            COUNT_ORIGIN.0,
            count_top,
            self.style.count_scale,
            self.style.count_color,
        );
    }

    /// Render the overlays and write the frame. Frames with no detections are
    /// still written, with a zero count.
    pub fn annotate_and_write(
        &self,
        frame: &mut Frame,
        annotations: &[Annotation],
        count: usize,
        sink: &mut dyn FrameSink,
    ) -> Result<()> {
        self.render(frame, annotations, count);
        sink.write_frame(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::SourceInfo;
    use crate::output::MemorySink;

    fn any_pixel_in(frame: &Frame, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>, c: Rgb<u8>) -> bool {
        ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
            .any(|(x, y)| *frame.image().get_pixel(x, y) == c)
    }

    #[test]
    fn label_formats() {
        assert_eq!(label_text(3, 0.225), "ID:3 0.2g");
        assert_eq!(label_text(12, 41.96), "ID:12 42.0g");
        assert_eq!(count_text(0), "Count: 0");
    }

    #[test]
    fn draws_box_label_and_count() {
        let annotator = FrameAnnotator::default();
        let mut frame = Frame::filled(100, 100, [0, 0, 0]);
        let annotation = Annotation {
            track_id: 1,
            bbox: BoundingBox::new(20.0, 40.0, 60.0, 80.0),
            weight: 0.4,
        };
        annotator.render(&mut frame, std::slice::from_ref(&annotation), 1);

        let green = Rgb([0, 255, 0]);
        assert_eq!(*frame.image().get_pixel(20, 50), green);
        assert_eq!(*frame.image().get_pixel(21, 50), green);
        assert_eq!(*frame.image().get_pixel(40, 60), Rgb([0, 0, 0]));
        // Label sits between the count overlay and the box top.
        assert!(any_pixel_in(&frame, 20..70, 23..30, green));
        assert!(any_pixel_in(&frame, 10..60, 9..30, Rgb([255, 0, 0])));
    }

    #[test]
    fn empty_frame_still_gets_count_and_is_written() {
        let annotator = FrameAnnotator::default();
        let mut sink = MemorySink::new();
        sink.open(&SourceInfo {
            width: 64,
            height: 48,
            fps: 30.0,
            frame_count: None,
        })
        .unwrap();
        let mut frame = Frame::filled(64, 48, [0, 0, 0]);
        annotator
            .annotate_and_write(&mut frame, &[], 0, &mut sink)
            .unwrap();

        assert_eq!(sink.frames().len(), 1);
        let written = &sink.frames()[0];
        let red = Rgb([255, 0, 0]);
        assert!(written.pixels().any(|p| *p == red));
        assert!(!written.pixels().any(|p| *p == Rgb([0, 255, 0])));
    }

    #[test]
    fn degenerate_and_offscreen_boxes_do_not_panic() {
        let annotator = FrameAnnotator::default();
        let mut frame = Frame::filled(32, 32, [0, 0, 0]);
        let annotations = vec![
            Annotation {
                track_id: 1,
                bbox: BoundingBox::new(5.0, 5.0, 5.0, 5.0),
                weight: 0.0,
            },
            Annotation {
                track_id: 2,
                bbox: BoundingBox::new(-50.0, -50.0, 500.0, 500.0),
                weight: 1.0e6,
            },
        ];
        annotator.render(&mut frame, &annotations, 2);
    }

    #[test]
    fn boxes_far_outside_the_frame_are_skipped_or_clamped() {
        let annotator = FrameAnnotator::default();
        let mut frame = Frame::filled(100, 100, [0, 0, 0]);
        let annotations = vec![
            Annotation {
                track_id: 1,
                bbox: BoundingBox::new(-3.0e9, -3.0e9, 0.0, 0.0),
                weight: 0.1,
            },
            Annotation {
                track_id: 2,
                bbox: BoundingBox::new(4.0e9, 4.0e9, 5.0e9, 5.0e9),
                weight: 0.1,
            },
            Annotation {
                track_id: 3,
                bbox: BoundingBox::new(-3.0e9, 60.0, 3.0e9, 70.0),
                weight: 0.1,
            },
        ];
        annotator.render(&mut frame, &annotations, 3);

        let green = Rgb([0, 255, 0]);
        // The wide box keeps its horizontal edges; the side edges sit outside the frame.
        assert_eq!(*frame.image().get_pixel(50, 60), green);
        assert_eq!(*frame.image().get_pixel(50, 69), green);
        assert_eq!(*frame.image().get_pixel(0, 65), Rgb([0, 0, 0]));
        assert_eq!(*frame.image().get_pixel(99, 65), Rgb([0, 0, 0]));
    }
}
