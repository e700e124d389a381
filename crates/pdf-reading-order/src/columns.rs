use crate::model::{ColumnBand, TextBlock};

/// Groups the blocks of `page_num` into column bands, left to right.
///
/// A block joins the first band, in creation order, whose representative left
/// edge lies within `tolerance` of its own `x0`; otherwise it opens a new band
/// keyed by that `x0`. Blocks inside a band are ordered top to bottom.
///
/// Left edges that drift further than `tolerance` inside one visual column
/// (staggered or indented text) end up in separate bands.
#[must_use]
pub fn detect_columns(blocks: &[TextBlock], page_num: u32, tolerance: f64) -> Vec<ColumnBand> {
    let mut bands: Vec<ColumnBand> = Vec::new();

    for block in blocks.iter().filter(|block| block.page_num == page_num) {
        let x0 = block.bbox.x0;
        match bands
            .iter()
            .position(|band| (x0 - band.left).abs() <= tolerance)
        {
            Some(index) => bands[index].blocks.push(block.clone()),
            None => bands.push(ColumnBand {
                left: x0,
                blocks: vec![block.clone()],
            }),
        }
    }

    bands.sort_by(|left, right| left.left.total_cmp(&right.left));
    for band in &mut bands {
        band.blocks
            .sort_by(|left, right| left.bbox.y0.total_cmp(&right.bbox.y0));
    }

    tracing::debug!(page = page_num, columns = bands.len(), "detected column bands");
    bands
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::detect_columns;
    use crate::model::{BBox, BlockType, TextBlock};

    fn block(text: &str, page_num: u32, x0: f64, y0: f64) -> TextBlock {
        TextBlock {
            text: text.to_string(),
            page_num,
            block_num: 0,
            bbox: BBox::new(x0, y0, x0 + 80.0, y0 + 12.0),
            block_type: BlockType::Text,
            font_size: 10.0,
            font_flags: 0,
        }
    }

    fn layout(bands: &[crate::ColumnBand]) -> Vec<(f64, Vec<&str>)> {
        bands
            .iter()
            .map(|band| {
                (
                    band.left,
                    band.blocks.iter().map(|block| block.text.as_str()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn clusters_left_edges_into_three_bands() {
        let blocks = vec![
            block("a", 1, 10.0, 300.0),
            block("b", 1, 12.0, 100.0),
            block("c", 1, 200.0, 50.0),
            block("d", 1, 205.0, 20.0),
            block("e", 1, 400.0, 10.0),
        ];

        let bands = detect_columns(&blocks, 1, 50.0);
        assert_eq!(
            layout(&bands),
            vec![
                (10.0, vec!["b", "a"]),
                (200.0, vec!["d", "c"]),
                (400.0, vec!["e"]),
            ]
        );
    }

    #[test]
    fn bands_are_ordered_by_representative_not_discovery() {
        let blocks = vec![
            block("right", 1, 400.0, 10.0),
            block("left", 1, 30.0, 10.0),
        ];

        let bands = detect_columns(&blocks, 1, 50.0);
        assert_eq!(
            layout(&bands),
            vec![(30.0, vec!["left"]), (400.0, vec!["right"])]
        );
    }

    #[test]
    fn first_created_band_wins_over_closest() {
        // 60 lies within tolerance of both 20 and 100; 20 was created first.
        let blocks = vec![
            block("first", 1, 20.0, 0.0),
            block("second", 1, 100.0, 0.0),
            block("between", 1, 60.0, 5.0),
        ];

        let bands = detect_columns(&blocks, 1, 50.0);
        assert_eq!(
            layout(&bands),
            vec![(20.0, vec!["first", "between"]), (100.0, vec!["second"])]
        );
    }

    #[test]
    fn drift_is_measured_against_the_representative() {
        let blocks = vec![
            block("a", 1, 0.0, 0.0),
            block("b", 1, 40.0, 10.0),
            block("c", 1, 80.0, 20.0),
        ];

        let bands = detect_columns(&blocks, 1, 50.0);
        assert_eq!(
            layout(&bands),
            vec![(0.0, vec!["a", "b"]), (80.0, vec!["c"])]
        );
    }

    #[test]
    fn other_pages_and_empty_input_yield_nothing() {
        let blocks = vec![block("a", 2, 10.0, 10.0)];
        assert!(detect_columns(&blocks, 1, 50.0).is_empty());
        assert!(detect_columns(&[], 1, 50.0).is_empty());
    }

    #[test]
    fn tolerance_is_configurable() {
        let blocks = vec![block("a", 1, 10.0, 0.0), block("b", 1, 30.0, 10.0)];
        assert_eq!(detect_columns(&blocks, 1, 50.0).len(), 1);
        assert_eq!(detect_columns(&blocks, 1, 5.0).len(), 2);
    }
}
