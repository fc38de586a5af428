//! Sequential placement of terms onto an occupancy grid.
//!
//! Terms are placed heaviest first. The first term starts at the maximum font
//! size; every later one starts from the size of the last placed term, scaled
//! by the ratio of their relative weights and never larger. Each term gets an
//! ideal point near the canvas center (later terms are allowed further out)
//! and a rectangular spiral of candidate centers around that point. A
//! candidate is accepted when its margin-padded box is empty in the
//! summed-area table. When the spiral runs out of in-canvas candidates the
//! font shrinks; a term that does not fit at the minimum size is dropped.
//!
//! Every random choice for a term comes from an RNG seeded with the layout seed
//! and the term's index, so a layout is a pure function of its inputs.

use std::f32::consts::TAU;

use image::Rgba;
use nanorand::{Rng, WyRand};
use tracing::{debug, debug_span};

use crate::{
    frequency::Term,
    mask::OccupancyGrid,
    sat::SummedAreaTable,
    text::{FontMetrics, GlyphBox, Rotation},
};

/// A term at its final position. `x`/`y` is the top-left corner of the glyph box.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    pub text: String,
    pub weight: f32,
    /// Rank of the term in the input list.
    pub index: usize,
    pub x: u32,
    pub y: u32,
    pub font_size: f32,
    pub rotation: Rotation,
    pub glyph_box: GlyphBox,
    pub color: Rgba<u8>,
}

impl Placement {
    pub fn right(&self) -> u32 {
        self.x + self.glyph_box.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.glyph_box.height
    }

    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.glyph_box.width as f32 / 2.0,
            self.y as f32 + self.glyph_box.height as f32 / 2.0,
        )
    }

    pub fn intersects(&self, other: &Placement) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayoutOptions {
    pub min_font_size: f32,
    /// `None` derives the size from a trial layout of the two heaviest terms.
    /// Larger values are capped at the longer canvas side.
    pub max_font_size: Option<f32>,
    /// Factor applied to the font size after a failed search.
    pub font_step: f32,
    /// Free pixels kept around every glyph box.
    pub word_margin: u32,
    pub word_rotate_chance: f64,
    /// How much the font size follows the weight: `0` gives every term the
    /// size of the previous one, `1` scales it by the ratio of their weights.
    pub relative_font_scaling: f32,
    /// In-canvas candidate positions tried per font size and orientation.
    pub max_search_steps: usize,
    /// `0` places every term.
    pub max_words: usize,
    pub rng_seed: Option<u64>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        LayoutOptions {
            min_font_size: 4.0,
            max_font_size: None,
            font_step: 0.9,
            word_margin: 2,
            word_rotate_chance: 0.10,
            relative_font_scaling: 0.5,
            max_search_steps: 200_000,
            max_words: 0,
            rng_seed: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayoutStats {
    pub placed: usize,
    pub dropped: usize,
    pub search_steps: u64,
}

pub struct PlacementEngine<'m, M: FontMetrics + ?Sized> {
    metrics: &'m M,
    options: LayoutOptions,
    grid: OccupancyGrid,
    sat: SummedAreaTable,
    free_area: u64,
    stats: LayoutStats,
}

impl<'m, M: FontMetrics + ?Sized> PlacementEngine<'m, M> {
    pub fn new(metrics: &'m M, grid: OccupancyGrid, options: LayoutOptions) -> Self {
        let sat = SummedAreaTable::new(&grid);
        let free_area = u64::from(grid.width()) * u64::from(grid.height()) - u64::from(sat.total());

        PlacementEngine {
            metrics,
            options,
            grid,
            sat,
            free_area,
            stats: LayoutStats::default(),
        }
    }

    pub fn stats(&self) -> LayoutStats {
        self.stats
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    pub fn into_grid(self) -> OccupancyGrid {
        self.grid
    }

    /// Places `terms`, which must be sorted heaviest first.
    ///
    /// Terms that do not fit are skipped and counted in [`LayoutStats::dropped`].
    pub fn place(&mut self, terms: &[Term]) -> Vec<Placement> {
        let limit = match self.options.max_words {
            0 => terms.len(),
            max_words => terms.len().min(max_words),
        };
        let terms = &terms[..limit];
        let _span = debug_span!(
            "place",
            terms = terms.len(),
            width = self.grid.width(),
            height = self.grid.height()
        )
        .entered();

        if terms.is_empty() {
            return vec![];
        }

        let base_seed = self
            .options
            .rng_seed
            .unwrap_or_else(|| WyRand::new().generate::<u64>());
        let min_size = self.options.min_font_size.max(1.0);
        let canvas_size = self.grid.width().max(self.grid.height()) as f32;
        let max_size = match self.options.max_font_size {
            Some(size) => size.min(canvas_size),
            None => self.derived_max_font_size(terms, base_seed),
        }
        .floor()
        .max(min_size);
        let scaling = self.options.relative_font_scaling.clamp(0.0, 1.0);
        debug!(max_size, min_size, "font size range");

        let mut placements = Vec::with_capacity(terms.len());
        // relative size and font size of the last placed term
        let mut last: Option<(f32, f32)> = None;

        for (index, term) in terms.iter().enumerate() {
            let start_size = match last {
                None => max_size,
                Some((last_relative, last_size)) => {
                    let ratio = term.relative_size / last_relative;
                    let ratio = if ratio.is_finite() { ratio } else { 1.0 };
                    (last_size * (scaling * ratio + (1.0 - scaling)))
                        .round()
                        .clamp(min_size, last_size)
                }
            };

            let mut rng = term_rng(base_seed, index);
            let preferred = if unit(&mut rng) < self.options.word_rotate_chance as f32 {
                Rotation::Vertical
            } else {
                Rotation::Horizontal
            };
            let ideal = self.ideal_point(index, terms.len(), &mut rng);

            match self.fit_term(term, index, start_size, min_size, preferred, ideal, &mut rng) {
                Some(placement) => {
                    last = Some((term.relative_size, placement.font_size));
                    self.stats.placed += 1;
                    placements.push(placement);
                }
                None => {
                    self.stats.dropped += 1;
                    debug!(text = %term.text, index, "term does not fit, skipping");
                }
            }
        }

        placements
    }

    /// Lays out the two heaviest terms on a scratch copy of the grid, starting
    /// at the canvas height, and takes the harmonic mean of their sizes.
    fn derived_max_font_size(&self, terms: &[Term], seed: u64) -> f32 {
        let height = self.grid.height() as f32;
        if terms.len() < 2 {
            return height;
        }

        let options = LayoutOptions {
            max_font_size: Some(height),
            max_words: 0,
            rng_seed: Some(seed),
            ..self.options.clone()
        };
        let mut trial = PlacementEngine::new(self.metrics, self.grid.clone(), options);
        let sizes: Vec<f32> = trial
            .place(&terms[..2])
            .iter()
            .map(|placement| placement.font_size)
            .collect();

        match sizes.as_slice() {
            [first, second] => (2.0 * first * second / (first + second)).floor(),
            [only] => *only,
            _ => height,
        }
    }

    /// Canvas center for the first term; later terms get a random offset whose
    /// bound grows with `sqrt(index / count)`.
    fn ideal_point(&self, index: usize, count: usize, rng: &mut WyRand) -> (i64, i64) {
        let half_width = self.grid.width() as f32 / 2.0;
        let half_height = self.grid.height() as f32 / 2.0;
        let spread = (index as f32 / count.max(1) as f32).sqrt();

        let angle = unit(rng) * TAU;
        let radius = unit(rng) * spread;
        (
            (half_width + angle.cos() * radius * half_width) as i64,
            (half_height + angle.sin() * radius * half_height) as i64,
        )
    }

    fn orientations(&self, preferred: Rotation) -> Vec<Rotation> {
        let chance = self.options.word_rotate_chance;
        if chance <= 0.0 {
            vec![Rotation::Horizontal]
        } else if chance >= 1.0 {
            vec![Rotation::Vertical]
        } else {
            vec![preferred, preferred.flipped()]
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn fit_term(
        &mut self,
        term: &Term,
        index: usize,
        start_size: f32,
        min_size: f32,
        preferred: Rotation,
        ideal: (i64, i64),
        rng: &mut WyRand,
    ) -> Option<Placement> {
        let orientations = self.orientations(preferred);
        let mirror = (rng.generate_range(0_u8..2) == 1, rng.generate_range(0_u8..2) == 1);

        let mut size = start_size;
        loop {
            for rotation in &orientations {
                let glyph_box = self.metrics.measure(&term.text, size, *rotation);
                if glyph_box.is_empty() {
                    return None;
                }
                if let Some((x, y)) = self.search(glyph_box, ideal, mirror) {
                    return Some(self.commit(term, index, size, *rotation, glyph_box, x, y));
                }
            }

            if size <= min_size {
                return None;
            }
            size = (size * self.options.font_step)
                .min(size - 1.0)
                .floor()
                .max(min_size);
        }
    }

    /// Finds the top-left corner of a free, margin-padded cell for `glyph_box`.
    ///
    /// Only candidates whose cell lies inside the canvas are tested and
    /// charged to the `max_search_steps` budget of this attempt.
    fn search(
        &mut self,
        glyph_box: GlyphBox,
        ideal: (i64, i64),
        mirror: (bool, bool),
    ) -> Option<(u32, u32)> {
        let margin = self.options.word_margin;
        let cell_width = glyph_box.width.saturating_add(margin);
        let cell_height = glyph_box.height.saturating_add(margin);
        if cell_width > self.grid.width() || cell_height > self.grid.height() {
            return None;
        }
        if u64::from(cell_width) * u64::from(cell_height) > self.free_area {
            return None;
        }

        let width = i64::from(self.grid.width());
        let height = i64::from(self.grid.height());
        let cell_width = i64::from(cell_width);
        let cell_height = i64::from(cell_height);

        // step follows the glyph's short side
        let step = i64::from((glyph_box.width.min(glyph_box.height) / 4).clamp(1, 8));
        let aspect = width as f32 / height as f32;
        let step_x = ((step as f32 * aspect.max(1.0)).round() as i64).max(1);
        let step_y = ((step as f32 / aspect.min(1.0)).round() as i64).max(1);

        // lattice offsets whose cell stays inside the canvas
        let origin_x = ideal.0 - cell_width / 2;
        let origin_y = ideal.1 - cell_height / 2;
        let (lo_x, hi_x) = lattice_range(-origin_x, width - cell_width - origin_x, step_x);
        let (lo_y, hi_y) = lattice_range(-origin_y, height - cell_height - origin_y, step_y);
        if lo_x > hi_x || lo_y > hi_y {
            return None;
        }
        let max_ring = [lo_x, hi_x, lo_y, hi_y]
            .iter()
            .map(|bound| bound.unsigned_abs())
            .max()
            .unwrap_or(0);

        let mut budget = self.options.max_search_steps;
        for (rx, ry) in Spiral::new(max_ring) {
            let sx = if mirror.0 { -rx } else { rx };
            let sy = if mirror.1 { -ry } else { ry };
            if sx < lo_x || sx > hi_x || sy < lo_y || sy > hi_y {
                continue;
            }
            if budget == 0 {
                return None;
            }
            budget -= 1;
            self.stats.search_steps += 1;

            let left = origin_x + sx * step_x;
            let top = origin_y + sy * step_y;
            if self.sat.region_is_empty(
                left as usize,
                top as usize,
                cell_width as usize,
                cell_height as usize,
            ) {
                return Some((left as u32, top as u32));
            }
        }

        None
    }

    #[allow(clippy::too_many_arguments)]
    fn commit(
        &mut self,
        term: &Term,
        index: usize,
        font_size: f32,
        rotation: Rotation,
        glyph_box: GlyphBox,
        cell_x: u32,
        cell_y: u32,
    ) -> Placement {
        let margin = self.options.word_margin;
        let cell_width = glyph_box.width + margin;
        let cell_height = glyph_box.height + margin;

        self.grid.fill_rect(cell_x, cell_y, cell_width, cell_height);
        self.sat.refresh_from_row(&self.grid, cell_y as usize);
        self.free_area -= u64::from(cell_width) * u64::from(cell_height);

        Placement {
            text: term.text.clone(),
            weight: term.weight,
            index,
            x: cell_x + margin / 2,
            y: cell_y + margin / 2,
            font_size,
            rotation,
            glyph_box,
            color: Rgba([0, 0, 0, 255]),
        }
    }
}

/// Places `terms` on `grid`. See [`PlacementEngine::place`].
pub fn place<M: FontMetrics + ?Sized>(
    terms: &[Term],
    grid: OccupancyGrid,
    metrics: &M,
    options: LayoutOptions,
) -> Vec<Placement> {
    PlacementEngine::new(metrics, grid, options).place(terms)
}

fn term_rng(seed: u64, index: usize) -> WyRand {
    WyRand::new_seed(seed ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Multiples `k` of `step` with `low <= k * step <= high`, as an inclusive range of `k`.
fn lattice_range(low: i64, high: i64, step: i64) -> (i64, i64) {
    let lo = -((-low).div_euclid(step));
    let hi = high.div_euclid(step);
    (lo, hi)
}

fn unit(rng: &mut WyRand) -> f32 {
    rng.generate::<u32>() as f32 / u32::MAX as f32
}

/// Square rings of lattice points around the origin: the origin, then the 8
/// points at Chebyshev distance 1, the 16 at distance 2, and so on.
struct Spiral {
    ring: u64,
    position: u64,
    max_ring: u64,
}

impl Spiral {
    fn new(max_ring: u64) -> Self {
        Spiral {
            ring: 0,
            position: 0,
            max_ring,
        }
    }
}

impl Iterator for Spiral {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.ring > self.max_ring {
            return None;
        }
        if self.ring == 0 {
            self.ring = 1;
            return Some((0, 0));
        }

        let r = self.ring as i64;
        let side_length = 2 * r;
        let side = self.position as i64 / side_length;
        let offset = self.position as i64 % side_length;
        let point = match side {
            0 => (-r + offset, -r),
            1 => (r, -r + offset),
            2 => (r - offset, r),
            _ => (-r, r - offset),
        };

        self.position += 1;
        if self.position == 8 * self.ring {
            self.ring += 1;
            self.position = 0;
        }
        Some(point)
    }
}
