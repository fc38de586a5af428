use image::{GrayImage, Rgba, RgbaImage};
use nanorand::{Rng, WyRand};
use tracing::{debug, info};

pub use color::{parse_color, ColorPolicy};
pub use error::{Error, Result};
pub use frequency::{terms_from_weights, Term, WordCounter};
pub use io::{FontLocator, FontSource, SystemFontLocator};
pub use mask::{MaskOptions, MaskPolarity, OccupancyGrid};
pub use placement::{place as place_terms, LayoutOptions, LayoutStats, Placement, PlacementEngine};
pub use render::save_image;
pub use text::{ApproxMetrics, FontMetrics, GlyphBox, GlyphPainter, Rotation, Typeface};
pub use tokenizer::{ChineseTokenizer, Tokenizer, WordTokenizer};

#[cfg(feature = "cli")]
pub mod cli;
pub mod color;
pub mod dump;
pub mod error;
pub mod frequency;
pub mod io;
pub mod mask;
pub mod placement;
pub mod render;
mod sat;
pub mod text;
pub mod tokenizer;

/// Where the canvas comes from. A mask decides the canvas size by itself.
pub enum WordCloudSize {
    FromDimensions { width: u32, height: u32 },
    FromMask(GrayImage),
}

impl WordCloudSize {
    pub fn into_grid(self, options: &MaskOptions) -> Result<OccupancyGrid> {
        match self {
            WordCloudSize::FromDimensions { width, height } => OccupancyGrid::blank(width, height),
            WordCloudSize::FromMask(mask) => OccupancyGrid::from_mask(&mask, options),
        }
    }
}

/// A finished layout: colored placements on a canvas of known size.
#[derive(Clone, Debug, PartialEq)]
pub struct WordCloudLayout {
    pub width: u32,
    pub height: u32,
    pub placements: Vec<Placement>,
    pub stats: LayoutStats,
    /// Seed the layout and its colors were drawn from; reusing it reproduces them.
    pub seed: u64,
}

pub struct WordCloud<F> {
    tokenizer: Box<dyn Tokenizer>,
    counter: WordCounter,
    face: F,
    background_color: Rgba<u8>,
    layout: LayoutOptions,
    mask_options: MaskOptions,
    color_policy: ColorPolicy,
}

impl<F: GlyphPainter> WordCloud<F> {
    pub fn new(face: F) -> Self {
        WordCloud {
            tokenizer: Box::new(ChineseTokenizer::default()),
            counter: WordCounter::default(),
            face,
            background_color: Rgba([255, 255, 255, 255]),
            layout: LayoutOptions::default(),
            mask_options: MaskOptions::default(),
            color_policy: ColorPolicy::default(),
        }
    }

    pub fn with_tokenizer(mut self, value: impl Tokenizer + 'static) -> Self {
        self.tokenizer = Box::new(value);
        self
    }

    /// Replaces the counter, including its `max_words`.
    pub fn with_counter(mut self, value: WordCounter) -> Self {
        self.counter = value;
        self
    }

    pub fn with_background_color(mut self, value: Rgba<u8>) -> Self {
        self.background_color = value;
        self
    }

    pub fn with_min_font_size(mut self, value: f32) -> Self {
        self.layout.min_font_size = value;
        self
    }

    pub fn with_max_font_size(mut self, value: Option<f32>) -> Self {
        self.layout.max_font_size = value;
        self
    }

    pub fn with_font_step(mut self, value: f32) -> Self {
        self.layout.font_step = value;
        self
    }

    pub fn with_word_margin(mut self, value: u32) -> Self {
        self.layout.word_margin = value;
        self
    }

    pub fn with_word_rotate_chance(mut self, value: f64) -> Self {
        self.layout.word_rotate_chance = value;
        self
    }

    pub fn with_relative_font_scaling(mut self, value: f32) -> Self {
        self.layout.relative_font_scaling = value;
        self
    }

    pub fn with_rng_seed(mut self, value: u64) -> Self {
        self.layout.rng_seed = Some(value);
        self
    }

    pub fn with_max_search_steps(mut self, value: usize) -> Self {
        self.layout.max_search_steps = value;
        self
    }

    /// Caps both the counted terms and the placed terms. `0` is unlimited.
    pub fn with_max_words(mut self, value: usize) -> Self {
        self.counter.max_words = value;
        self.layout.max_words = value;
        self
    }

    pub fn with_mask_options(mut self, value: MaskOptions) -> Self {
        self.mask_options = value;
        self
    }

    pub fn with_color_policy(mut self, value: ColorPolicy) -> Self {
        self.color_policy = value;
        self
    }

    pub fn face(&self) -> &F {
        &self.face
    }

    pub fn terms_from_text(&self, text: &str) -> Vec<Term> {
        let tokens = self.tokenizer.segment(text);
        let terms = self.counter.count(tokens.iter().copied());
        debug!(tokens = tokens.len(), terms = terms.len(), "counted words");
        terms
    }

    /// Places `terms` (heaviest first) and colors the result.
    pub fn layout(&self, terms: &[Term], size: WordCloudSize) -> Result<WordCloudLayout> {
        let grid = size.into_grid(&self.mask_options)?;
        let (width, height) = (grid.width(), grid.height());

        // one seed drives both placement and color
        let seed = self
            .layout
            .rng_seed
            .unwrap_or_else(|| WyRand::new().generate::<u64>());
        let options = LayoutOptions {
            rng_seed: Some(seed),
            ..self.layout.clone()
        };

        let mut engine = PlacementEngine::new(&self.face, grid, options);
        let mut placements = engine.place(terms);
        let stats = engine.stats();
        self.color_policy.apply(&mut placements, seed);

        info!(
            placed = stats.placed,
            dropped = stats.dropped,
            steps = stats.search_steps,
            seed,
            "layout finished"
        );

        Ok(WordCloudLayout {
            width,
            height,
            placements,
            stats,
            seed,
        })
    }

    pub fn render(&self, layout: &WordCloudLayout) -> RgbaImage {
        render::render(
            &self.face,
            &layout.placements,
            layout.width,
            layout.height,
            self.background_color,
        )
    }

    pub fn generate_from_terms(&self, terms: &[Term], size: WordCloudSize) -> Result<RgbaImage> {
        let layout = self.layout(terms, size)?;
        Ok(self.render(&layout))
    }

    pub fn generate_from_text(&self, text: &str, size: WordCloudSize) -> Result<RgbaImage> {
        let terms = self.terms_from_text(text);
        self.generate_from_terms(&terms, size)
    }
}
