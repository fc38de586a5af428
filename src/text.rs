use std::{fs, path::Path};

use ab_glyph::{point, Font, FontVec, Glyph, GlyphId, Point, PxScale, ScaleFont};
use image::{Pixel, Rgba, RgbaImage};
use tracing::warn;

use crate::{
    error::{Error, Result},
    io::FontSource,
    placement::Placement,
};

/// Characters tried, in order, when the font has no glyph for a character.
const FALLBACK_CHARS: [char; 2] = ['\u{25A1}', '?'];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    Horizontal,
    /// Rotated 90° counter-clockwise, reading bottom to top.
    Vertical,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Horizontal => 0,
            Rotation::Vertical => 90,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Rotation::Horizontal => Rotation::Vertical,
            Rotation::Vertical => Rotation::Horizontal,
        }
    }
}

/// Pixel box of a term at a given size and rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GlyphBox {
    pub width: u32,
    pub height: u32,
}

impl GlyphBox {
    /// Box of horizontal text, turned for `rotation`.
    pub fn oriented(width: u32, height: u32, rotation: Rotation) -> Self {
        match rotation {
            Rotation::Horizontal => GlyphBox { width, height },
            Rotation::Vertical => GlyphBox {
                width: height,
                height: width,
            },
        }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

pub trait FontMetrics {
    /// Measures `text` set on a single line at `size` pixels.
    fn measure(&self, text: &str, size: f32, rotation: Rotation) -> GlyphBox;
}

pub trait GlyphPainter: FontMetrics {
    /// Draws the placement's text inside its glyph box.
    fn paint(&self, target: &mut RgbaImage, placement: &Placement) -> Result<()>;
}

impl<T: FontMetrics + ?Sized> FontMetrics for &T {
    fn measure(&self, text: &str, size: f32, rotation: Rotation) -> GlyphBox {
        (**self).measure(text, size, rotation)
    }
}

impl<T: GlyphPainter + ?Sized> GlyphPainter for &T {
    fn paint(&self, target: &mut RgbaImage, placement: &Placement) -> Result<()> {
        (**self).paint(target, placement)
    }
}

/// An outline font loaded from a TrueType/OpenType file or collection.
pub struct Typeface {
    font: FontVec,
}

impl std::fmt::Debug for Typeface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Typeface")
            .field("glyph_count", &self.font.glyph_count())
            .finish()
    }
}

impl Typeface {
    pub fn from_bytes(data: Vec<u8>, index: u32) -> Result<Self> {
        let font = FontVec::try_from_vec_and_index(data, index).map_err(|err| {
            Error::InvalidFont {
                reason: err.to_string(),
            }
        })?;
        Ok(Typeface { font })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_source(&FontSource::new(path.as_ref()))
    }

    pub fn from_source(source: &FontSource) -> Result<Self> {
        if !source.path.exists() {
            return Err(Error::InputNotFound {
                path: source.path.clone(),
            });
        }
        let data = fs::read(&source.path)?;
        Self::from_bytes(data, source.index)
    }

    pub fn font(&self) -> &FontVec {
        &self.font
    }
}

impl FontMetrics for Typeface {
    fn measure(&self, text: &str, size: f32, rotation: Rotation) -> GlyphBox {
        let glyphs = text_to_glyphs(text, &self.font, PxScale::from(size));
        GlyphBox::oriented(glyphs.width, glyphs.height, rotation)
    }
}

impl GlyphPainter for Typeface {
    fn paint(&self, target: &mut RgbaImage, placement: &Placement) -> Result<()> {
        let glyph_data = text_to_glyphs(
            &placement.text,
            &self.font,
            PxScale::from(placement.font_size),
        );
        if !glyph_data.missing.is_empty() {
            let err = Error::Render(format!(
                "no glyph for {:?} in {:?}, drew a fallback",
                glyph_data.missing, placement.text
            ));
            warn!("{err}");
        }

        let drawn = draw_glyphs_to_rgba_buffer(target, &glyph_data, &self.font, placement);
        if drawn == 0 && placement.text.chars().any(|c| !c.is_whitespace()) {
            return Err(Error::Render(format!(
                "no outline could be rasterized for {:?}",
                placement.text
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct GlyphData {
    pub glyphs: Vec<Glyph>,
    pub width: u32,
    pub height: u32,
    /// Characters the font does not cover; they were laid out with a fallback glyph.
    pub missing: Vec<char>,
}

/// Lays `text` out on one line, top-left at the origin.
pub fn text_to_glyphs(text: &str, font: &FontVec, scale: PxScale) -> GlyphData {
    let scaled_font = font.as_scaled(scale);

    let mut glyphs: Vec<Glyph> = vec![];
    let mut missing = vec![];
    layout_line(&scaled_font, point(0.0, 0.0), text, &mut glyphs, &mut missing);

    let glyphs_height = scaled_font.height().ceil() as u32;
    let glyphs_width = match (glyphs.first(), glyphs.last()) {
        (Some(first), Some(last)) => {
            let max_x = last.position.x + scaled_font.h_advance(last.id);
            (max_x - first.position.x).ceil().max(0.0) as u32
        }
        _ => 0,
    };

    GlyphData {
        glyphs,
        width: glyphs_width,
        height: glyphs_height,
        missing,
    }
}

fn layout_line<F, SF>(
    font: &SF,
    position: Point,
    text: &str,
    target: &mut Vec<Glyph>,
    missing: &mut Vec<char>,
) where
    F: Font,
    SF: ScaleFont<F>,
{
    let mut caret = position + point(0.0, font.ascent());
    let mut last_glyph: Option<GlyphId> = None;
    for c in text.chars() {
        if c.is_control() {
            continue;
        }

        let mut id = font.glyph_id(c);
        if id.0 == 0 {
            missing.push(c);
            id = FALLBACK_CHARS
                .iter()
                .map(|fallback| font.glyph_id(*fallback))
                .find(|fallback| fallback.0 != 0)
                .unwrap_or(id);
        }

        if let Some(previous) = last_glyph.take() {
            caret.x += font.kern(previous, id);
        }
        let glyph = id.with_scale_and_position(font.scale(), caret);
        last_glyph = Some(id);
        caret.x += font.h_advance(id);

        target.push(glyph);
    }
}

/// Maps a pixel of the unrotated text box to the canvas, or `None` when it
/// falls outside the placement's glyph box.
fn local_to_canvas(placement: &Placement, lx: i32, ly: i32) -> Option<(u32, u32)> {
    let glyph_box = placement.glyph_box;
    let (run_width, run_height) = match placement.rotation {
        Rotation::Horizontal => (glyph_box.width, glyph_box.height),
        Rotation::Vertical => (glyph_box.height, glyph_box.width),
    };
    if lx < 0 || ly < 0 || lx >= run_width as i32 || ly >= run_height as i32 {
        return None;
    }

    let (dx, dy) = match placement.rotation {
        Rotation::Horizontal => (lx as u32, ly as u32),
        Rotation::Vertical => (ly as u32, run_width - 1 - lx as u32),
    };
    Some((placement.x + dx, placement.y + dy))
}

fn blend_pixel(target: &mut RgbaImage, x: u32, y: u32, color: Rgba<u8>, coverage: f32) {
    if x >= target.width() || y >= target.height() {
        return;
    }
    let coverage = coverage.clamp(0.0, 1.0);
    let px = target.get_pixel_mut(x, y);
    px.apply2(&color, |old, new| {
        ((coverage * new as f32) + (1.0 - coverage) * old as f32).round() as u8
    });
}

/// Returns the number of glyphs that had an outline.
fn draw_glyphs_to_rgba_buffer(
    buffer: &mut RgbaImage,
    glyph_data: &GlyphData,
    font: &FontVec,
    placement: &Placement,
) -> usize {
    let mut drawn = 0;
    for glyph in &glyph_data.glyphs {
        if let Some(outlined) = font.outline_glyph(glyph.clone()) {
            drawn += 1;
            let bounds = outlined.px_bounds();

            outlined.draw(|x, y, v| {
                let lx = bounds.min.x as i32 + x as i32;
                let ly = bounds.min.y as i32 + y as i32;
                if let Some((cx, cy)) = local_to_canvas(placement, lx, ly) {
                    blend_pixel(buffer, cx, cy, placement.color, v);
                }
            })
        }
    }
    drawn
}

/// Font-free metrics: every character is a fixed fraction of the font size
/// wide, with CJK and other full-width characters a full em.
///
/// Painting draws one block per character, which is enough for previews and
/// for checking a layout without a font file.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ApproxMetrics {
    pub narrow_advance: f32,
    pub wide_advance: f32,
    pub line_height: f32,
}

impl Default for ApproxMetrics {
    fn default() -> Self {
        ApproxMetrics {
            narrow_advance: 0.6,
            wide_advance: 1.0,
            line_height: 1.2,
        }
    }
}

impl ApproxMetrics {
    fn advance(&self, c: char) -> f32 {
        if c.is_control() {
            0.0
        } else if is_wide(c) {
            self.wide_advance
        } else {
            self.narrow_advance
        }
    }

    fn run_size(&self, text: &str, size: f32) -> (u32, u32) {
        let ems: f32 = text.chars().map(|c| self.advance(c)).sum();
        let width = (ems * size).ceil().max(0.0) as u32;
        if width == 0 {
            return (0, 0);
        }
        (width, (size * self.line_height).ceil() as u32)
    }
}

fn is_wide(c: char) -> bool {
    matches!(c,
        '\u{1100}'..='\u{115F}'
        | '\u{2E80}'..='\u{A4CF}'
        | '\u{AC00}'..='\u{D7A3}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{FE30}'..='\u{FE4F}'
        | '\u{FF00}'..='\u{FF60}'
        | '\u{FFE0}'..='\u{FFE6}')
}

impl FontMetrics for ApproxMetrics {
    fn measure(&self, text: &str, size: f32, rotation: Rotation) -> GlyphBox {
        let (width, height) = self.run_size(text, size);
        GlyphBox::oriented(width, height, rotation)
    }
}

impl GlyphPainter for ApproxMetrics {
    fn paint(&self, target: &mut RgbaImage, placement: &Placement) -> Result<()> {
        let size = placement.font_size;
        let (_, run_height) = self.run_size(&placement.text, size);
        let inset = (size * 0.1).round() as i32;

        let mut caret: f32 = 0.0;
        for c in placement.text.chars() {
            let advance = self.advance(c) * size;
            let left = caret.round() as i32 + inset;
            let right = (caret + advance).round() as i32 - inset;
            caret += advance;
            if c.is_whitespace() {
                continue;
            }

            for ly in inset..run_height as i32 - inset {
                for lx in left..right {
                    if let Some((x, y)) = local_to_canvas(placement, lx, ly) {
                        blend_pixel(target, x, y, placement.color, 1.0);
                    }
                }
            }
        }
        Ok(())
    }
}
