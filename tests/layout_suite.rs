use image::{GrayImage, Luma, Rgba};
use wordcloud_cn::{
    terms_from_weights, ApproxMetrics, ColorPolicy, MaskOptions, MaskPolarity, Typeface,
    WordCloud, WordCloudLayout, WordCloudSize, WordCounter, WordTokenizer,
};

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

fn cloud() -> WordCloud<ApproxMetrics> {
    WordCloud::new(ApproxMetrics::default()).with_rng_seed(2024)
}

/// Left half black, right half white.
fn split_mask(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}

fn assert_no_overlap(layout: &WordCloudLayout) {
    for (i, a) in layout.placements.iter().enumerate() {
        assert!(a.right() <= layout.width && a.bottom() <= layout.height);
        for b in &layout.placements[i + 1..] {
            assert!(!a.intersects(b), "{} overlaps {}", a.text, b.text);
        }
    }
}

#[test]
fn chinese_text_is_counted_and_placed() {
    let cloud = cloud().with_counter(WordCounter::default().with_min_word_length(2));
    let terms = cloud.terms_from_text("缓存，网络。缓存！");
    assert_eq!(terms[0].text, "缓存");
    assert_eq!(terms[0].weight, 2.0);

    let layout = cloud
        .layout(&terms, WordCloudSize::FromDimensions { width: 400, height: 300 })
        .unwrap();
    assert_eq!(layout.placements[0].text, "缓存");
    assert_eq!(layout.stats.placed + layout.stats.dropped, terms.len());
    assert_no_overlap(&layout);
}

#[test]
fn filtered_out_text_gives_a_blank_canvas() {
    let cloud = cloud()
        .with_tokenizer(WordTokenizer::default())
        .with_counter(WordCounter::default().with_min_word_length(2));
    let terms = cloud.terms_from_text("a");
    assert!(terms.is_empty());

    let layout = cloud
        .layout(&terms, WordCloudSize::FromDimensions { width: 200, height: 200 })
        .unwrap();
    assert!(layout.placements.is_empty());

    let image = cloud.render(&layout);
    assert_eq!(image.dimensions(), (200, 200));
    assert!(image.pixels().all(|px| *px == WHITE));
}

#[test]
fn heavy_term_is_centered() {
    let terms = terms_from_weights([("heavy", 100.0), ("light", 1.0)]);
    let layout = cloud()
        .layout(&terms, WordCloudSize::FromDimensions { width: 500, height: 500 })
        .unwrap();

    let heavy = &layout.placements[0];
    assert_eq!(heavy.text, "heavy");
    let (cx, cy) = heavy.center();
    assert!((125.0..=375.0).contains(&cx));
    assert!((125.0..=375.0).contains(&cy));
}

#[test]
fn dark_forbidden_mask_keeps_words_on_the_light_side() {
    let words: Vec<String> = (0..30).map(|i| format!("w{i}")).collect();
    let terms = terms_from_weights(words.iter().map(|w| (w.as_str(), 1.0)));

    let layout = cloud()
        .layout(&terms, WordCloudSize::FromMask(split_mask(240, 160)))
        .unwrap();
    assert!(!layout.placements.is_empty());
    assert!(layout.placements.iter().all(|p| p.x >= 120));
    assert_no_overlap(&layout);
}

#[test]
fn light_forbidden_mask_keeps_words_on_the_dark_side() {
    let words: Vec<String> = (0..30).map(|i| format!("w{i}")).collect();
    let terms = terms_from_weights(words.iter().map(|w| (w.as_str(), 1.0)));

    let layout = cloud()
        .with_mask_options(MaskOptions::default().with_polarity(MaskPolarity::LightForbidden))
        .layout(&terms, WordCloudSize::FromMask(split_mask(240, 160)))
        .unwrap();
    assert!(!layout.placements.is_empty());
    assert!(layout.placements.iter().all(|p| p.right() <= 120));
    assert_no_overlap(&layout);
}

#[test]
fn mask_without_free_area_places_nothing() {
    let terms = terms_from_weights([("one", 2.0), ("two", 1.0)]);
    let mask = GrayImage::from_pixel(120, 80, Luma([0]));

    let layout = cloud().layout(&terms, WordCloudSize::FromMask(mask)).unwrap();
    assert!(layout.placements.is_empty());
    assert_eq!(layout.stats.dropped, 2);
}

#[test]
fn seeded_images_are_identical() {
    let cloud = cloud()
        .with_tokenizer(WordTokenizer::default())
        .with_color_policy(ColorPolicy::Hashed);
    let text = "layout layout layout spiral spiral table mask canvas canvas";
    let size = || WordCloudSize::FromDimensions { width: 320, height: 240 };

    let first = cloud.generate_from_text(text, size()).unwrap();
    let second = cloud.generate_from_text(text, size()).unwrap();
    assert_eq!(first, second);
    assert!(first.pixels().any(|px| *px != WHITE));
}

#[test]
fn outline_font_cloud_is_drawn() {
    let face = Typeface::from_path(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fonts/Tuffy.ttf"))
        .unwrap();
    let cloud = WordCloud::new(face)
        .with_tokenizer(WordTokenizer::default())
        .with_color_policy(ColorPolicy::Fixed(Rgba([10, 10, 10, 255])))
        .with_rng_seed(8);
    let terms = cloud.terms_from_text("Kite kite Kite river stone stone Kite");

    let layout = cloud
        .layout(&terms, WordCloudSize::FromDimensions { width: 300, height: 200 })
        .unwrap();
    assert_eq!(layout.placements[0].text, "Kite");
    assert_eq!(layout.stats.placed, terms.len());
    assert_no_overlap(&layout);

    let image = cloud.render(&layout);
    let inked = image.pixels().filter(|px| **px != WHITE).count();
    assert!(inked > 0);
}
