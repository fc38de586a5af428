//! File-system boundary: documents, stopword lists, masks and fonts.

use std::{
    collections::HashSet,
    env, fs,
    io::Read,
    path::{Path, PathBuf},
};

use fontdb::{Database, Family, Query, Source};
use image::GrayImage;
use roxmltree::{Document, Node};
use tracing::{debug, info};

use crate::error::{Error, Result};

const WORD_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Reads a document as text. `.docx` files yield their paragraphs followed by
/// their table cells; anything else is read as UTF-8, replacing invalid bytes.
pub fn read_text(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(Error::InputNotFound {
            path: path.to_path_buf(),
        });
    }

    let is_docx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("docx"))
        .unwrap_or(false);
    if is_docx {
        return read_docx(path);
    }

    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn read_docx(path: &Path) -> Result<String> {
    let unreadable = |reason: String| Error::UnreadableDocument {
        path: path.to_path_buf(),
        reason,
    };

    let file = fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|err| unreadable(err.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|err| unreadable(err.to_string()))?
        .read_to_string(&mut xml)
        .map_err(|err| unreadable(err.to_string()))?;

    docx_text(&xml).map_err(unreadable)
}

/// Extracts the text of a WordprocessingML `document.xml`.
pub fn docx_text(xml: &str) -> Result<String, String> {
    let doc = Document::parse(xml).map_err(|err| err.to_string())?;

    let paragraphs = doc
        .descendants()
        .filter(|node| node.has_tag_name((WORD_NS, "p")))
        .filter(|node| !node.ancestors().any(|a| a.has_tag_name((WORD_NS, "tbl"))))
        .map(|node| paragraph_text(node).trim().to_string());

    let cells = doc
        .descendants()
        .filter(|node| node.has_tag_name((WORD_NS, "tc")))
        .map(|cell| {
            cell.children()
                .filter(|node| node.has_tag_name((WORD_NS, "p")))
                .map(paragraph_text)
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        });

    let lines: Vec<String> = paragraphs
        .chain(cells)
        .filter(|line| !line.is_empty())
        .collect();
    Ok(lines.join("\n"))
}

fn paragraph_text(paragraph: Node<'_, '_>) -> String {
    let mut text = String::new();
    for node in paragraph.descendants() {
        if node.has_tag_name((WORD_NS, "t")) {
            text.push_str(node.text().unwrap_or_default());
        } else if node.has_tag_name((WORD_NS, "tab")) {
            text.push('\t');
        } else if node.has_tag_name((WORD_NS, "br")) || node.has_tag_name((WORD_NS, "cr")) {
            text.push('\n');
        }
    }
    text
}

/// One stopword per line. A missing file is an empty list.
pub fn load_stopwords(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() {
        debug!(path = %path.display(), "no stopword file, filtering nothing");
        return Ok(HashSet::new());
    }

    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .map(str::trim)
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect())
}

/// Loads a mask image as grayscale. A missing file means no mask.
pub fn load_mask(path: &Path) -> Result<Option<GrayImage>> {
    if !path.exists() {
        info!(path = %path.display(), "no mask file, using a rectangular canvas");
        return Ok(None);
    }

    let bytes = fs::read(path)?;
    decode_mask(&bytes).map(Some)
}

pub fn decode_mask(bytes: &[u8]) -> Result<GrayImage> {
    let mask = image::load_from_memory(bytes)
        .map_err(|err| Error::InvalidMask(err.to_string()))?
        .to_luma8();
    if mask.width() == 0 || mask.height() == 0 {
        return Err(Error::InvalidMask("mask image has zero area".into()));
    }
    Ok(mask)
}

/// A font file and the face index inside it (non-zero only for collections).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontSource {
    pub path: PathBuf,
    pub index: u32,
}

impl FontSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FontSource {
            path: path.into(),
            index: 0,
        }
    }
}

pub trait FontLocator {
    fn detect(&self) -> Option<FontSource>;
}

/// Looks for a CJK-capable font: first at well-known paths, then among the
/// system fonts by family name.
#[derive(Clone, Debug)]
pub struct SystemFontLocator {
    pub candidates: Vec<PathBuf>,
    pub families: Vec<String>,
    pub query_system: bool,
}

impl Default for SystemFontLocator {
    fn default() -> Self {
        let windows_fonts = PathBuf::from(env::var("WINDIR").unwrap_or_else(|_| "C:\\Windows".into()))
            .join("Fonts");

        let candidates = vec![
            windows_fonts.join("msyh.ttc"),
            windows_fonts.join("simhei.ttf"),
            windows_fonts.join("simsun.ttc"),
            PathBuf::from("/System/Library/Fonts/STHeiti Light.ttc"),
            PathBuf::from("/System/Library/Fonts/STHeiti Medium.ttc"),
            PathBuf::from("/System/Library/Fonts/PingFang.ttc"),
            PathBuf::from("/usr/share/fonts/truetype/arphic/ukai.ttc"),
            PathBuf::from("/usr/share/fonts/truetype/arphic/uming.ttc"),
        ];
        let families = [
            "Microsoft YaHei",
            "SimHei",
            "PingFang SC",
            "Noto Sans CJK SC",
            "Source Han Sans SC",
            "WenQuanYi Micro Hei",
            "WenQuanYi Zen Hei",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        SystemFontLocator {
            candidates,
            families,
            query_system: true,
        }
    }
}

impl FontLocator for SystemFontLocator {
    fn detect(&self) -> Option<FontSource> {
        if let Some(path) = self.candidates.iter().find(|path| path.exists()) {
            return Some(FontSource::new(path.clone()));
        }
        if !self.query_system {
            return None;
        }

        let mut db = Database::new();
        db.load_system_fonts();
        self.families.iter().find_map(|family| {
            let query = Query {
                families: &[Family::Name(family.as_str())],
                ..Query::default()
            };
            let id = db.query(&query)?;
            match db.face_source(id)? {
                (Source::File(path), index) | (Source::SharedFile(path, _), index) => {
                    Some(FontSource { path, index })
                }
                _ => None,
            }
        })
    }
}

/// The explicitly requested font, or whatever `locator` finds.
pub fn resolve_font(explicit: Option<&Path>, locator: &dyn FontLocator) -> Result<FontSource> {
    match explicit {
        Some(path) if !path.exists() => Err(Error::InputNotFound {
            path: path.to_path_buf(),
        }),
        Some(path) => Ok(FontSource::new(path)),
        None => locator.detect().ok_or(Error::NoFontAvailable),
    }
}
