use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use image::Rgba;
use nanorand::{Rng, WyRand};
use palette::{Hsl, IntoColor, Pixel, Srgb};

use crate::{
    error::{Error, Result},
    placement::Placement,
};

/// How each placed word is colored.
#[derive(Clone, Copy, Debug, Default)]
pub enum ColorPolicy {
    /// Every word in the same color.
    Fixed(Rgba<u8>),
    /// Hue derived from the word's text, stable across runs.
    Hashed,
    /// Linear blend from `to` (lightest word) to `from` (heaviest word).
    Gradient { from: Rgba<u8>, to: Rgba<u8> },
    /// Random fully saturated hue from the layout seed.
    #[default]
    Random,
    Custom(fn(&Placement, &mut WyRand) -> Rgba<u8>),
}

impl ColorPolicy {
    /// Assigns a color to every placement. The same seed gives the same colors.
    pub fn apply(&self, placements: &mut [Placement], seed: u64) {
        let max_weight = placements
            .iter()
            .map(|placement| placement.weight)
            .fold(0.0, f32::max);
        let mut rng = WyRand::new_seed(seed);

        for placement in placements.iter_mut() {
            placement.color = match *self {
                ColorPolicy::Fixed(color) => color,
                ColorPolicy::Hashed => hashed_color(&placement.text),
                ColorPolicy::Gradient { from, to } => {
                    let t = if max_weight > 0.0 {
                        placement.weight / max_weight
                    } else {
                        1.0
                    };
                    lerp(to, from, t)
                }
                ColorPolicy::Random => random_color_rgba(&mut rng),
                ColorPolicy::Custom(color_func) => color_func(placement, &mut rng),
            };
        }
    }
}

/// Parses a CSS color such as `white`, `#000000` or `rgb(10, 20, 30)`.
pub fn parse_color(value: &str) -> Result<Rgba<u8>> {
    let color = csscolorparser::parse(value.trim()).map_err(|err| Error::InvalidColor {
        value: value.to_string(),
        reason: err.to_string(),
    })?;
    Ok(Rgba(color.to_rgba8()))
}

pub fn hsl_to_rgba(hue: f32, saturation: f32, lightness: f32) -> Rgba<u8> {
    let col = Hsl::new(hue, saturation, lightness);
    let rgb: Srgb = col.into_color();

    let raw: [u8; 3] = rgb.into_format().into_raw();

    Rgba([raw[0], raw[1], raw[2], 255])
}

fn random_color_rgba(rng: &mut WyRand) -> Rgba<u8> {
    let hue: u16 = rng.generate_range(0..360);
    hsl_to_rgba(hue as f32, 1.0, 0.5)
}

fn hashed_color(text: &str) -> Rgba<u8> {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let hue = (hasher.finish() % 360) as f32;
    hsl_to_rgba(hue, 0.8, 0.45)
}

fn lerp(a: Rgba<u8>, b: Rgba<u8>, t: f32) -> Rgba<u8> {
    let t = t.clamp(0.0, 1.0);
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    Rgba([
        mix(a.0[0], b.0[0]),
        mix(a.0[1], b.0[1]),
        mix(a.0[2], b.0[2]),
        mix(a.0[3], b.0[3]),
    ])
}
