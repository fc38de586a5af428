use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use image::{GrayImage, Rgba};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    color::{parse_color, ColorPolicy},
    dump::write_layout_json,
    frequency::WordCounter,
    io::{load_mask, load_stopwords, read_text, resolve_font, FontLocator, SystemFontLocator},
    mask::{MaskOptions, MaskPolarity},
    render::save_image,
    text::{GlyphPainter, Typeface},
    WordCloud, WordCloudSize,
};

#[derive(Parser, Debug)]
#[clap(name = "wordcloud-cn", version, about = "Word cloud images from Chinese or English documents")]
pub struct Args {
    /// Input document (.txt or .docx)
    #[clap(long, value_parser, default_value = "data/input.txt")]
    pub text: PathBuf,

    /// Output image; the format follows the extension
    #[clap(long, value_parser, default_value = "output.png")]
    pub output: PathBuf,

    #[clap(long, value_parser, default_value_t = 1200)]
    pub width: u32,

    #[clap(long, value_parser, default_value_t = 800)]
    pub height: u32,

    /// Background, any CSS color
    #[clap(long, value_parser, default_value = "white")]
    pub background: String,

    #[clap(long = "max_words", alias = "max-words", value_parser, default_value_t = 300)]
    pub max_words: usize,

    /// Shortest word kept, in characters
    #[clap(
        long = "min_word_length",
        alias = "min-word-length",
        value_parser,
        default_value_t = 2
    )]
    pub min_word_length: usize,

    /// Font file; empty to search the system for a CJK font
    #[clap(long, value_parser, default_value = "")]
    pub font: String,

    /// One stopword per line; ignored when missing
    #[clap(long, value_parser, default_value = "data/stopwords.txt")]
    pub stopwords: PathBuf,

    /// Mask image; ignored when missing. Overrides width and height
    #[clap(long, value_parser, default_value = "data/mask.png")]
    pub mask: PathBuf,

    #[clap(long, value_parser)]
    pub seed: Option<u64>,

    /// Luma at which a mask pixel counts as light
    #[clap(long, value_parser, default_value_t = 128)]
    pub mask_threshold: u8,

    /// Which mask pixels are kept free of words. `dark` (default) excludes
    /// pixels below the threshold, so words fill the light shape. `light`
    /// excludes the light pixels, the classic word-cloud convention where
    /// a white background surrounds a dark silhouette
    #[clap(long, value_enum, default_value = "dark")]
    pub mask_polarity: PolarityArg,

    #[clap(long, value_enum, default_value = "random")]
    pub colors: ColorsArg,

    #[clap(long, value_parser, default_value_t = 0.1)]
    pub rotate_chance: f64,

    /// Also write the placements as JSON
    #[clap(long, value_parser)]
    pub layout_json: Option<PathBuf>,

    /// Debug logging
    #[clap(short, long, action)]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolarityArg {
    /// Dark mask pixels are forbidden
    Dark,
    /// Light mask pixels are forbidden
    Light,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorsArg {
    Random,
    Hashed,
    Gradient,
}

impl From<PolarityArg> for MaskPolarity {
    fn from(value: PolarityArg) -> Self {
        match value {
            PolarityArg::Dark => MaskPolarity::DarkForbidden,
            PolarityArg::Light => MaskPolarity::LightForbidden,
        }
    }
}

impl From<ColorsArg> for ColorPolicy {
    fn from(value: ColorsArg) -> Self {
        match value {
            ColorsArg::Random => ColorPolicy::Random,
            ColorsArg::Hashed => ColorPolicy::Hashed,
            ColorsArg::Gradient => ColorPolicy::Gradient {
                from: Rgba([20, 50, 110, 255]),
                to: Rgba([120, 175, 230, 255]),
            },
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    execute(&args, &SystemFontLocator::default())
}

/// Logs to stderr. `RUST_LOG` applies unless `verbose` asks for debug output.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn execute(args: &Args, locator: &dyn FontLocator) -> Result<()> {
    let text = read_text(&args.text)?;
    let stopwords = load_stopwords(&args.stopwords)
        .with_context(|| format!("reading stopwords from {}", args.stopwords.display()))?;
    let mask = load_mask(&args.mask)?;

    let explicit = (!args.font.is_empty()).then(|| Path::new(args.font.as_str()));
    let source = resolve_font(explicit, locator)?;
    info!(font = %source.path.display(), index = source.index, "using font");
    let typeface = Typeface::from_source(&source)?;

    write_cloud(args, &text, stopwords, mask, typeface)
}

/// Everything after the inputs are loaded: count, lay out, render, save.
pub fn write_cloud<F: GlyphPainter>(
    args: &Args,
    text: &str,
    stopwords: HashSet<String>,
    mask: Option<GrayImage>,
    face: F,
) -> Result<()> {
    let background = parse_color(&args.background)?;

    let size = match mask {
        Some(mask) => {
            if mask.dimensions() != (args.width, args.height) {
                warn!(
                    mask_width = mask.width(),
                    mask_height = mask.height(),
                    width = args.width,
                    height = args.height,
                    "mask size overrides the requested canvas size"
                );
            }
            WordCloudSize::FromMask(mask)
        }
        None => WordCloudSize::FromDimensions {
            width: args.width,
            height: args.height,
        },
    };

    let counter = WordCounter::default()
        .with_stopwords(stopwords)
        .with_min_word_length(args.min_word_length);
    let mask_options = MaskOptions::default()
        .with_threshold(args.mask_threshold)
        .with_polarity(args.mask_polarity.into());

    let mut cloud = WordCloud::new(face)
        .with_counter(counter)
        .with_max_words(args.max_words)
        .with_background_color(background)
        .with_word_rotate_chance(args.rotate_chance)
        .with_mask_options(mask_options)
        .with_color_policy(args.colors.into());
    if let Some(seed) = args.seed {
        cloud = cloud.with_rng_seed(seed);
    }

    let terms = cloud.terms_from_text(text);
    if terms.is_empty() {
        warn!("no words left after filtering, the image will be blank");
    }

    let layout = cloud.layout(&terms, size)?;
    let image = cloud.render(&layout);

    // the image is written last so a failed run leaves no partial output
    if let Some(path) = &args.layout_json {
        write_layout_json(path, &layout)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    if let Err(err) = save_image(&image, &args.output) {
        if let Some(path) = &args.layout_json {
            let _ = fs::remove_file(path);
        }
        return Err(err).with_context(|| format!("writing {}", args.output.display()));
    }

    info!(
        output = %args.output.display(),
        words = layout.placements.len(),
        "word cloud written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, fs};

    use clap::Parser;
    use image::Rgba;

    use super::{execute, write_cloud, Args, ColorsArg, PolarityArg};
    use crate::{
        error::Error,
        io::{FontLocator, FontSource},
        text::ApproxMetrics,
    };

    struct NoFonts;

    impl FontLocator for NoFonts {
        fn detect(&self) -> Option<FontSource> {
            None
        }
    }

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["wordcloud-cn"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_the_documented_flags() {
        let args = args(&[]);
        assert_eq!(args.text.to_str(), Some("data/input.txt"));
        assert_eq!(args.output.to_str(), Some("output.png"));
        assert_eq!((args.width, args.height), (1200, 800));
        assert_eq!(args.background, "white");
        assert_eq!(args.max_words, 300);
        assert_eq!(args.min_word_length, 2);
        assert!(args.font.is_empty());
        assert_eq!(args.mask_polarity, PolarityArg::Dark);
        assert_eq!(args.colors, ColorsArg::Random);
        assert!(args.seed.is_none());
    }

    #[test]
    fn accepts_both_spellings_of_word_limits() {
        let args = args(&["--max_words", "12", "--min-word-length", "3"]);
        assert_eq!(args.max_words, 12);
        assert_eq!(args.min_word_length, 3);

        let args = Args::try_parse_from(["wordcloud-cn", "--max-words", "7"]).unwrap();
        assert_eq!(args.max_words, 7);
    }

    #[test]
    fn missing_text_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.png");
        let args = args(&[
            "--text",
            dir.path().join("absent.txt").to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
        ]);

        let err = execute(&args, &NoFonts).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::InputNotFound { .. })
        ));
        assert!(!output.exists());
    }

    #[test]
    fn no_font_means_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.txt");
        fs::write(&input, "网络 缓存 缓存").unwrap();
        let output = dir.path().join("out.png");
        let args = args(&[
            "--text",
            input.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
            "--stopwords",
            dir.path().join("none.txt").to_str().unwrap(),
            "--mask",
            dir.path().join("none.png").to_str().unwrap(),
        ]);

        let err = execute(&args, &NoFonts).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NoFontAvailable)
        ));
        assert!(!output.exists());
    }

    #[test]
    fn writes_image_and_layout_json() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("cloud.png");
        let json = dir.path().join("layout.json");
        let args = args(&[
            "--output",
            output.to_str().unwrap(),
            "--width",
            "160",
            "--height",
            "120",
            "--background",
            "#000000",
            "--seed",
            "3",
            "--layout-json",
            json.to_str().unwrap(),
        ]);
        let stopwords: HashSet<String> = ["the".to_string()].into_iter().collect();

        write_cloud(
            &args,
            "the cache the network cache",
            stopwords,
            None,
            ApproxMetrics::default(),
        )
        .unwrap();

        let image = image::open(&output).unwrap().to_rgba8();
        assert_eq!(image.dimensions(), (160, 120));
        assert_eq!(*image.get_pixel(0, 0), Rgba([0, 0, 0, 255]));

        let layout: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(layout["words"][0]["text"], "cache");
        assert!(layout["words"]
            .as_array()
            .unwrap()
            .iter()
            .all(|word| word["text"] != "the"));
    }

    #[test]
    fn bad_background_is_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("cloud.png");
        let args = args(&["--output", output.to_str().unwrap(), "--background", "nope"]);

        let err = write_cloud(&args, "word", HashSet::new(), None, ApproxMetrics::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::InvalidColor { .. })
        ));
        assert!(!output.exists());
    }

    #[test]
    fn failed_layout_json_leaves_no_image_behind() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("cloud.png");
        let json = dir.path().join("missing-dir").join("layout.json");
        let args = args(&[
            "--output",
            output.to_str().unwrap(),
            "--width",
            "120",
            "--height",
            "80",
            "--seed",
            "1",
            "--layout-json",
            json.to_str().unwrap(),
        ]);

        let err = write_cloud(&args, "cache network", HashSet::new(), None, ApproxMetrics::default());
        assert!(err.is_err());
        assert!(!output.exists());
        assert!(!json.exists());
    }

    #[test]
    fn numbers_stay_out_of_the_cloud() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("cloud.png");
        let json = dir.path().join("layout.json");
        let args = args(&[
            "--output",
            output.to_str().unwrap(),
            "--width",
            "200",
            "--height",
            "150",
            "--seed",
            "4",
            "--layout-json",
            json.to_str().unwrap(),
        ]);

        write_cloud(
            &args,
            "2024 2024 2024 cache cache network",
            HashSet::new(),
            None,
            ApproxMetrics::default(),
        )
        .unwrap();

        let layout: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
        let words = layout["words"].as_array().unwrap();
        assert_eq!(words[0]["text"], "cache");
        assert!(words.iter().all(|word| word["text"] != "2024"));
    }

    #[test]
    fn polarity_help_names_both_conventions() {
        let command = <Args as clap::CommandFactory>::command();
        let arg = command
            .get_arguments()
            .find(|arg| arg.get_id() == "mask-polarity")
            .unwrap();
        let help = arg.get_long_help().or_else(|| arg.get_help()).unwrap();
        assert!(help.contains("(default)"));
        assert!(help.contains("classic word-cloud convention"));
    }
}
