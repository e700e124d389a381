use std::cmp::Ordering;

use crate::model::TextBlock;

fn reading_key_cmp(left: &TextBlock, right: &TextBlock) -> Ordering {
    left.page_num
        .cmp(&right.page_num)
        .then_with(|| left.bbox.y0.total_cmp(&right.bbox.y0))
        .then_with(|| left.bbox.x0.total_cmp(&right.bbox.x0))
}

/// Orders blocks by page, then top edge, then left edge. The sort is stable,
/// so blocks with identical keys keep their extraction order.
#[must_use]
pub fn sort_blocks_reading_order(mut blocks: Vec<TextBlock>) -> Vec<TextBlock> {
    blocks.sort_by(reading_key_cmp);
    blocks
}
