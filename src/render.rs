use std::{
    fs,
    io::Cursor,
    path::{Path, PathBuf},
};

use image::{DynamicImage, ImageFormat, ImageOutputFormat, Rgba, RgbaImage};
use tracing::{debug, warn};

use crate::{error::Result, placement::Placement, text::GlyphPainter};

/// Draws `placements` in order on a `width`×`height` canvas filled with `background`.
///
/// A painter error for one placement never aborts the image: the error is
/// logged and the placement's box is outlined in its color instead.
pub fn render<P: GlyphPainter + ?Sized>(
    painter: &P,
    placements: &[Placement],
    width: u32,
    height: u32,
    background: Rgba<u8>,
) -> RgbaImage {
    let _span = tracing::debug_span!("render", words = placements.len(), width, height).entered();
    let mut canvas = RgbaImage::from_pixel(width, height, background);

    for placement in placements {
        if let Err(err) = painter.paint(&mut canvas, placement) {
            warn!(text = %placement.text, "{err}; outlining its box instead");
            outline_box(&mut canvas, placement);
        }
    }

    canvas
}

fn outline_box(canvas: &mut RgbaImage, placement: &Placement) {
    let right = placement.right().min(canvas.width());
    let bottom = placement.bottom().min(canvas.height());
    for y in placement.y..bottom {
        for x in placement.x..right {
            let edge = x == placement.x || y == placement.y || x + 1 == right || y + 1 == bottom;
            if edge {
                canvas.put_pixel(x, y, placement.color);
            }
        }
    }
}

/// Encodes `image` in the format named by the path's extension (PNG when the
/// extension is unknown).
pub fn encode_image(image: &RgbaImage, path: &Path) -> Result<Vec<u8>> {
    let format = ImageFormat::from_path(path).unwrap_or(ImageFormat::Png);
    let dynamic = match format {
        // no alpha channel in JPEG
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(image.clone()).to_rgb8()),
        _ => DynamicImage::ImageRgba8(image.clone()),
    };

    let mut bytes = Vec::new();
    dynamic.write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::from(format))?;
    Ok(bytes)
}

/// Writes `image` to `path` through a temporary sibling file, so a failed run
/// never leaves a truncated image behind.
pub fn save_image(image: &RgbaImage, path: &Path) -> Result<()> {
    let bytes = encode_image(image, path)?;
    let partial = partial_path(path);

    if let Err(err) = fs::write(&partial, &bytes).and_then(|_| fs::rename(&partial, path)) {
        let _ = fs::remove_file(&partial);
        return Err(err.into());
    }
    debug!(path = %path.display(), bytes = bytes.len(), "saved image");
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "wordcloud".into());
    path.with_file_name(format!(".{name}.partial"))
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::{render, save_image};
    use crate::{
        error::{Error, Result},
        placement::Placement,
        text::{FontMetrics, GlyphBox, GlyphPainter, Rotation},
    };

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    /// Fills every glyph box solid, or fails for text containing `!`.
    struct SolidPainter;

    impl FontMetrics for SolidPainter {
        fn measure(&self, text: &str, size: f32, rotation: Rotation) -> GlyphBox {
            let width = (text.chars().count() as f32 * size / 2.0).ceil() as u32;
            GlyphBox::oriented(width, size as u32, rotation)
        }
    }

    impl GlyphPainter for SolidPainter {
        fn paint(&self, target: &mut RgbaImage, placement: &Placement) -> Result<()> {
            if placement.text.contains('!') {
                return Err(Error::Render("unsupported".into()));
            }
            for y in placement.y..placement.bottom() {
                for x in placement.x..placement.right() {
                    target.put_pixel(x, y, placement.color);
                }
            }
            Ok(())
        }
    }

    fn placement(text: &str, x: u32, y: u32) -> Placement {
        Placement {
            text: text.into(),
            weight: 1.0,
            index: 0,
            x,
            y,
            font_size: 4.0,
            rotation: Rotation::Horizontal,
            glyph_box: SolidPainter.measure(text, 4.0, Rotation::Horizontal),
            color: RED,
        }
    }

    #[test]
    fn no_placements_give_a_blank_canvas() {
        let image = render(&SolidPainter, &[], 20, 10, WHITE);
        assert_eq!(image.dimensions(), (20, 10));
        assert!(image.pixels().all(|px| *px == WHITE));
    }

    #[test]
    fn placements_are_drawn_in_their_boxes() {
        let image = render(&SolidPainter, &[placement("ab", 2, 3)], 20, 10, WHITE);
        assert_eq!(*image.get_pixel(2, 3), RED);
        assert_eq!(*image.get_pixel(5, 6), RED);
        assert_eq!(*image.get_pixel(6, 3), WHITE);
        assert_eq!(*image.get_pixel(1, 3), WHITE);
    }

    #[test]
    fn failed_glyphs_fall_back_to_an_outline() {
        let image = render(&SolidPainter, &[placement("a!", 2, 2)], 20, 10, WHITE);
        // 4x4 box at (2, 2): border drawn, inside left alone
        assert_eq!(*image.get_pixel(2, 2), RED);
        assert_eq!(*image.get_pixel(5, 5), RED);
        assert_eq!(*image.get_pixel(3, 3), WHITE);
    }

    #[test]
    fn saves_png_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.png");
        let image = render(&SolidPainter, &[placement("ab", 0, 0)], 8, 8, WHITE);

        save_image(&image, &path).unwrap();

        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded, image);
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn failed_save_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("cloud.png");
        let image = RgbaImage::new(4, 4);

        assert!(save_image(&image, &path).is_err());
        assert!(!path.exists());
    }
}
