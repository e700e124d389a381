use crate::model::{BBox, BlockType, RawBlock, RawDocument, RawLine, RawPage, TextBlock};

/// Flattens every page of `document` into [`TextBlock`]s, pages in order,
/// blocks in extraction order. `block_num` restarts at zero on each page.
#[must_use]
pub fn extract_text_blocks(document: &RawDocument) -> Vec<TextBlock> {
    let mut blocks = Vec::new();
    for (index, page) in document.pages.iter().enumerate() {
        let page_num = u32::try_from(index + 1).unwrap_or(u32::MAX);
        let page_blocks = extract_page_blocks(page, page_num);
        tracing::debug!(page = page_num, blocks = page_blocks.len(), "extracted page blocks");
        blocks.extend(page_blocks);
    }
    blocks
}

#[must_use]
pub fn extract_page_blocks(page: &RawPage, page_num: u32) -> Vec<TextBlock> {
    let mut blocks = Vec::new();
    let mut block_num = 0_u32;

    for raw in &page.blocks {
        let block = match raw {
            RawBlock::Text { bbox, lines } => text_block(lines, *bbox, page_num, block_num),
            RawBlock::Image {
                bbox,
                width,
                height,
            } => Some(image_block(
                width.unwrap_or(0),
                height.unwrap_or(0),
                *bbox,
                page_num,
                block_num,
            )),
            RawBlock::Other { .. } => None,
        };

        if let Some(block) = block {
            blocks.push(block);
            block_num += 1;
        }
    }

    blocks
}

fn text_block(lines: &[RawLine], bbox: BBox, page_num: u32, block_num: u32) -> Option<TextBlock> {
    let mut text = String::new();
    let mut font_size = 0.0_f64;
    let mut font_flags = 0_u32;

    for line in lines {
        for span in &line.spans {
            text.push_str(&span.text);
            // Size and flags are taken together until a non-zero size shows up.
            if font_size == 0.0 {
                font_size = span.size;
                font_flags = span.flags;
            }
        }
        text.push(' ');
    }

    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    Some(TextBlock {
        text: text.to_string(),
        page_num,
        block_num,
        bbox,
        block_type: BlockType::Text,
        font_size,
        font_flags,
    })
}

fn image_block(width: u32, height: u32, bbox: BBox, page_num: u32, block_num: u32) -> TextBlock {
    TextBlock {
        text: format!("[IMAGE: {width}x{height}]"),
        page_num,
        block_num,
        bbox,
        block_type: BlockType::Image,
        font_size: 0.0,
        font_flags: 0,
    }
}
