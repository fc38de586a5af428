use std::{fs::File, io::BufWriter, path::Path};

use serde::Serialize;

use crate::{error::Result, placement::Placement, WordCloudLayout};

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    pub placed: usize,
    pub dropped: usize,
    pub words: Vec<WordDump>,
}

#[derive(Debug, Serialize)]
pub struct WordDump {
    pub text: String,
    pub weight: f32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub font_size: f32,
    /// `0` or `90`, counter-clockwise.
    pub rotation: u32,
    /// `#rrggbbaa`
    pub color: String,
}

impl LayoutDump {
    pub fn from_layout(layout: &WordCloudLayout) -> Self {
        LayoutDump {
            width: layout.width,
            height: layout.height,
            seed: layout.seed,
            placed: layout.stats.placed,
            dropped: layout.stats.dropped,
            words: layout.placements.iter().map(WordDump::from_placement).collect(),
        }
    }
}

impl WordDump {
    pub fn from_placement(placement: &Placement) -> Self {
        let [r, g, b, a] = placement.color.0;
        WordDump {
            text: placement.text.clone(),
            weight: placement.weight,
            x: placement.x,
            y: placement.y,
            width: placement.glyph_box.width,
            height: placement.glyph_box.height,
            font_size: placement.font_size,
            rotation: placement.rotation.degrees(),
            color: format!("#{r:02x}{g:02x}{b:02x}{a:02x}"),
        }
    }
}

pub fn write_layout_json(path: &Path, layout: &WordCloudLayout) -> Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_layout(layout);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
