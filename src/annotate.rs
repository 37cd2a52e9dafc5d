// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Drawing detections onto images.

#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]

use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use rand::Rng;

use crate::download::download_file;
use crate::error::{DetectError, Result};
use crate::labels::ClassLabels;
use crate::results::Detection;
use crate::visualizer::{Color, sample_colors};

/// Assets URL for downloading fonts
const ASSETS_URL: &str = "https://github.com/ultralytics/assets/releases/download/v0.0.0";

/// Font used for labels.
pub const DEFAULT_FONT: &str = "Arial.ttf";

/// Box outline width in pixels.
const THICKNESS: i32 = 2;

/// Label text height in pixels.
const FONT_SIZE: f32 = 16.0;

/// Colours for the classes present in one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassPalette {
    entries: Vec<(usize, Color)>,
}

impl ClassPalette {
    /// Colour assigned to `class`.
    #[must_use]
    pub fn color(&self, class: usize) -> Option<Color> {
        self.entries
            .iter()
            .find(|(c, _)| *c == class)
            .map(|&(_, color)| color)
    }

    /// Number of classes with a colour.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no class has a colour.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Give each distinct class a different palette colour.
///
/// `classes` must be sorted and deduplicated; colour `i` of the sample goes
/// to `classes[i]`.
///
/// # Errors
///
/// Returns [`DetectError::PaletteExhausted`] for more than 20 classes.
pub fn assign_class_colors<R: Rng + ?Sized>(classes: &[usize], rng: &mut R) -> Result<ClassPalette> {
    let colors = sample_colors(classes.len(), rng)?;
    Ok(ClassPalette {
        entries: classes.iter().copied().zip(colors).collect(),
    })
}

/// Path of the cached label font, fetching it into the user config
/// directory on first use. `None` when it can't be obtained.
pub fn check_font(font: &str) -> Option<PathBuf> {
    let font_name = Path::new(font).file_name()?.to_string_lossy().into_owned();
    let cache_dir = dirs::config_dir()?.join(crate::NAME);
    let font_path = cache_dir.join(&font_name);
    if font_path.is_file() {
        return Some(font_path);
    }

    if let Err(e) = fs::create_dir_all(&cache_dir) {
        crate::warn!("Failed to create font cache {}: {e}", cache_dir.display());
        return None;
    }
    let url = format!("{ASSETS_URL}/{font_name}");
    match download_file(&url, &font_path) {
        Ok(()) => Some(font_path),
        Err(e) => {
            crate::warn!("Label font unavailable: {e}");
            None
        }
    }
}

/// Draws boxes and labels. One annotator serves a whole run.
pub struct Annotator {
    font: Option<FontVec>,
    scale: PxScale,
    warned_missing_font: bool,
}

impl Annotator {
    /// Create an annotator; `None` draws boxes only.
    #[must_use]
    pub fn new(font: Option<FontVec>) -> Self {
        Self {
            font,
            scale: PxScale::from(FONT_SIZE),
            warned_missing_font: false,
        }
    }

    /// Create an annotator with the default font, fetching it if needed.
    #[must_use]
    pub fn with_default_font() -> Self {
        let font = check_font(DEFAULT_FONT)
            .and_then(|path| fs::read(path).ok())
            .and_then(|data| FontVec::try_from_vec(data).ok());
        Self::new(font)
    }

    /// True when labels can be rendered.
    #[must_use]
    pub const fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw `detections` onto a fresh canvas made from `image`.
    ///
    /// # Arguments
    ///
    /// * `image` - Original image, consumed as the canvas.
    /// * `detections` - Boxes already rescaled to `image`.
    /// * `labels` - Class names.
    /// * `palette` - Colour per class present in `detections`.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::AnnotationError`] for a class index without a
    /// label or colour.
    pub fn annotate(
        &mut self,
        image: DynamicImage,
        detections: &[Detection],
        labels: &ClassLabels,
        palette: &ClassPalette,
    ) -> Result<RgbImage> {
        let mut canvas = image.into_rgb8();
        let (width, height) = canvas.dimensions();
        if width == 0 || height == 0 {
            return Ok(canvas);
        }

        for det in detections {
            let name = labels.name(det.cls_pred)?;
            let color = palette.color(det.cls_pred).ok_or_else(|| {
                DetectError::AnnotationError(format!("No colour assigned to class {}", det.cls_pred))
            })?;

            let Some((x1, y1, x2, y2)) = clamp_box(det, width, height) else {
                continue;
            };
            draw_outline(&mut canvas, (x1, y1, x2, y2), color);
            self.draw_label(&mut canvas, name, (x1, y1), color);
        }

        Ok(canvas)
    }

    fn draw_label(&mut self, canvas: &mut RgbImage, text: &str, corner: (i32, i32), color: Color) {
        let Some(font) = &self.font else {
            if !self.warned_missing_font {
                crate::warn!("No font available, labels will not be drawn");
                self.warned_missing_font = true;
            }
            return;
        };

        let (text_w, text_h) = text_size(self.scale, font, text);
        let (text_w, text_h) = (text_w as i32, text_h as i32);
        let (x, y) = corner;
        // above the box, or just inside it at the top edge
        let text_y = if y - text_h - 2 >= 0 { y - text_h - 2 } else { y + THICKNESS };
        let text_x = x.min(canvas.width() as i32 - 1).max(0);

        let background = Rect::at(text_x, text_y).of_size((text_w + 2).max(1) as u32, (text_h + 2).max(1) as u32);
        draw_filled_rect_mut(canvas, background, color.to_rgb());
        draw_text_mut(
            canvas,
            Color::WHITE.to_rgb(),
            text_x + 1,
            text_y + 1,
            self.scale,
            font,
            text,
        );
    }
}

impl std::fmt::Debug for Annotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotator")
            .field("has_font", &self.font.is_some())
            .field("scale", &self.scale)
            .finish()
    }
}

/// Round and clamp a detection to the canvas; `None` if nothing is left.
fn clamp_box(det: &Detection, width: u32, height: u32) -> Option<(i32, i32, i32, i32)> {
    let (w, h) = (width as i32, height as i32);
    let mut x1 = det.x1.round() as i32;
    let mut y1 = det.y1.round() as i32;
    let mut x2 = det.x2.round() as i32;
    let mut y2 = det.y2.round() as i32;
    if x1 > x2 {
        std::mem::swap(&mut x1, &mut x2);
    }
    if y1 > y2 {
        std::mem::swap(&mut y1, &mut y2);
    }

    let x1 = x1.clamp(0, w - 1);
    let y1 = y1.clamp(0, h - 1);
    let x2 = x2.clamp(0, w - 1);
    let y2 = y2.clamp(0, h - 1);
    (x2 > x1 && y2 > y1).then_some((x1, y1, x2, y2))
}

fn draw_outline(canvas: &mut RgbImage, (x1, y1, x2, y2): (i32, i32, i32, i32), color: Color) {
    for t in 0..THICKNESS {
        let tx1 = (x1 + t).min(x2);
        let ty1 = (y1 + t).min(y2);
        let tx2 = (x2 - t).max(tx1);
        let ty2 = (y2 - t).max(ty1);
        if tx2 > tx1 && ty2 > ty1 {
            let rect = Rect::at(tx1, ty1).of_size((tx2 - tx1) as u32, (ty2 - ty1) as u32);
            draw_hollow_rect_mut(canvas, rect, color.to_rgb());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn gray(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([128, 128, 128])))
    }

    #[test]
    fn test_assign_colors_distinct() {
        let mut rng = StdRng::seed_from_u64(1);
        let palette = assign_class_colors(&[0, 3, 7], &mut rng).unwrap();
        assert_eq!(palette.len(), 3);
        let a = palette.color(0).unwrap();
        let b = palette.color(3).unwrap();
        let c = palette.color(7).unwrap();
        assert!(a != b && b != c && a != c);
        assert!(palette.color(1).is_none());
    }

    #[test]
    fn test_assign_colors_exhausted() {
        let mut rng = StdRng::seed_from_u64(1);
        let classes: Vec<usize> = (0..21).collect();
        assert!(matches!(
            assign_class_colors(&classes, &mut rng),
            Err(DetectError::PaletteExhausted { .. })
        ));
    }

    #[test]
    fn test_draws_box_in_class_color() {
        let mut rng = StdRng::seed_from_u64(3);
        let palette = assign_class_colors(&[0], &mut rng).unwrap();
        let color = palette.color(0).unwrap().to_rgb();
        let labels = ClassLabels::from_names(["cat"]);
        let det = Detection::new([10.0, 10.0, 40.0, 30.0], 0.9, 0.9, 0);

        let mut annotator = Annotator::new(None);
        let out = annotator.annotate(gray(64, 48), &[det], &labels, &palette).unwrap();
        assert_eq!(out.dimensions(), (64, 48));
        assert_eq!(out.get_pixel(10, 10), &color);
        assert_eq!(out.get_pixel(39, 29), &color);
        assert_eq!(out.get_pixel(11, 20), &color);
        // interior and outside untouched
        assert_eq!(out.get_pixel(25, 20), &Rgb([128, 128, 128]));
        assert_eq!(out.get_pixel(50, 40), &Rgb([128, 128, 128]));
    }

    #[test]
    fn test_unknown_class_is_an_error() {
        let mut rng = StdRng::seed_from_u64(3);
        let palette = assign_class_colors(&[5], &mut rng).unwrap();
        let labels = ClassLabels::from_names(["cat"]);
        let det = Detection::new([1.0, 1.0, 5.0, 5.0], 0.9, 0.9, 5);
        let err = Annotator::new(None)
            .annotate(gray(8, 8), &[det], &labels, &palette)
            .unwrap_err();
        assert!(matches!(err, DetectError::AnnotationError(_)));
    }

    #[test]
    fn test_box_outside_canvas_is_skipped() {
        let mut rng = StdRng::seed_from_u64(3);
        let palette = assign_class_colors(&[0], &mut rng).unwrap();
        let labels = ClassLabels::from_names(["cat"]);
        let det = Detection::new([100.0, 100.0, 200.0, 200.0], 0.9, 0.9, 0);
        let out = Annotator::new(None)
            .annotate(gray(16, 16), &[det], &labels, &palette)
            .unwrap();
        assert!(out.pixels().all(|p| *p == Rgb([128, 128, 128])));
    }
}
