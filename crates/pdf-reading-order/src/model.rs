use std::collections::BTreeMap;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

/// Rectangle in page space, origin at the top-left corner, y growing downward.
///
/// Deserializes from an array of any length; missing coordinates are zero and
/// extra ones are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f64>", into = "[f64; 4]")]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    #[must_use]
    pub const fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

impl From<[f64; 4]> for BBox {
    fn from([x0, y0, x1, y1]: [f64; 4]) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

impl From<Vec<f64>> for BBox {
    fn from(coords: Vec<f64>) -> Self {
        let mut padded = [0.0; 4];
        for (slot, value) in padded.iter_mut().zip(coords) {
            *slot = value;
        }
        Self::from(padded)
    }
}

impl From<BBox> for [f64; 4] {
    fn from(bbox: BBox) -> Self {
        [bbox.x0, bbox.y0, bbox.x1, bbox.y1]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSpan {
    pub text: String,
    pub size: f64,
    pub flags: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawLine {
    pub spans: Vec<RawSpan>,
}

/// One region of a page as handed over by a [`crate::ContentExtractor`].
///
/// Deserialization never rejects a block for its shape: a missing or unknown
/// `type` yields [`RawBlock::Other`], and `type` may also be the numeric code
/// `0` (text) or `1` (image).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RawBlock {
    Text { bbox: BBox, lines: Vec<RawLine> },
    Image {
        bbox: BBox,
        width: Option<u32>,
        height: Option<u32>,
    },
    /// Neither text nor raster image, e.g. a vector drawing.
    Other { bbox: BBox },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BlockTag {
    Code(i64),
    Name(String),
    Unknown(#[allow(dead_code)] IgnoredAny),
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct LenientBlock {
    #[serde(rename = "type")]
    tag: Option<BlockTag>,
    bbox: Option<BBox>,
    lines: Option<Vec<RawLine>>,
    width: Option<f64>,
    height: Option<f64>,
}

impl<'de> Deserialize<'de> for RawBlock {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let block = LenientBlock::deserialize(deserializer)?;
        let bbox = block.bbox.unwrap_or_default();

        Ok(match block.tag {
            Some(BlockTag::Code(0)) => Self::Text {
                bbox,
                lines: block.lines.unwrap_or_default(),
            },
            Some(BlockTag::Name(name)) if name.eq_ignore_ascii_case("text") => Self::Text {
                bbox,
                lines: block.lines.unwrap_or_default(),
            },
            Some(BlockTag::Code(1)) => Self::Image {
                bbox,
                width: block.width.map(pixel_count),
                height: block.height.map(pixel_count),
            },
            Some(BlockTag::Name(name)) if name.eq_ignore_ascii_case("image") => Self::Image {
                bbox,
                width: block.width.map(pixel_count),
                height: block.height.map(pixel_count),
            },
            _ => Self::Other { bbox },
        })
    }
}

// Truncates toward zero; negative and NaN become 0, huge values saturate.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn pixel_count(value: f64) -> u32 {
    value as u32
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPage {
    pub blocks: Vec<RawBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDocument {
    pub pages: Vec<RawPage>,
    pub metadata: BTreeMap<String, String>,
}

impl RawDocument {
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    pub page_num: u32,
    pub block_num: u32,
    pub bbox: BBox,
    pub block_type: BlockType,
    #[serde(default)]
    pub font_size: f64,
    #[serde(default)]
    pub font_flags: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub success: bool,
    pub full_text: String,
    pub blocks: Vec<TextBlock>,
    pub page_count: usize,
    pub metadata: BTreeMap<String, String>,
    pub error: Option<String>,
}

impl ParseResult {
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "unknown parse failure".to_string();
        }

        Self {
            success: false,
            full_text: String::new(),
            blocks: Vec::new(),
            page_count: 0,
            metadata: BTreeMap::new(),
            error: Some(error),
        }
    }
}

/// A vertical band of blocks sharing approximately the same left edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnBand {
    /// Left edge of the first block assigned to the band.
    pub left: f64,
    pub blocks: Vec<TextBlock>,
}
