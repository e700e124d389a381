mod assemble;
mod block_extract;
mod columns;
mod error;
mod model;
mod options;
mod pdf_reader;
mod reading_order;

pub use assemble::{assemble_full_text, page_break_marker};
pub use block_extract::{extract_page_blocks, extract_text_blocks};
pub use columns::detect_columns;
pub use error::ParseError;
pub use model::{
    BBox, BlockType, ColumnBand, ParseResult, RawBlock, RawDocument, RawLine, RawPage, RawSpan,
    TextBlock,
};
pub use options::{DEFAULT_COLUMN_TOLERANCE, LayoutOptions, PageSelection};
pub use pdf_reader::{ContentExtractor, LopdfExtractor};
pub use reading_order::sort_blocks_reading_order;

/// Parses a PDF held in memory. Never fails: extractor errors come back as
/// a [`ParseResult`] with `success == false`.
#[must_use]
pub fn parse(document_bytes: &[u8]) -> ParseResult {
    parse_with(&LopdfExtractor, document_bytes)
}

#[must_use]
pub fn parse_with<E>(extractor: &E, document_bytes: &[u8]) -> ParseResult
where
    E: ContentExtractor + ?Sized,
{
    tracing::debug!(bytes = document_bytes.len(), "parsing document");
    match extractor.extract(document_bytes) {
        Ok(raw) => parse_document(raw),
        Err(error) => failed(&error),
    }
}

/// Runs block extraction, reading-order sorting and text assembly over an
/// already extracted content tree.
#[must_use]
pub fn parse_document(raw: RawDocument) -> ParseResult {
    let blocks = sort_blocks_reading_order(extract_text_blocks(&raw));
    let full_text = assemble_full_text(&blocks);

    tracing::info!(
        pages = raw.page_count(),
        blocks = blocks.len(),
        chars = full_text.chars().count(),
        "parsed document"
    );

    ParseResult {
        success: true,
        full_text,
        blocks,
        page_count: raw.page_count(),
        metadata: raw.metadata,
        error: None,
    }
}

pub fn parse_raw_json(raw_json: &str) -> Result<ParseResult, ParseError> {
    let raw = serde_json::from_str::<RawDocument>(raw_json)?;
    Ok(parse_document(raw))
}

/// Column bands of one page, read straight from the PDF bytes.
///
/// This is a query of its own; the assembled text of [`parse`] does not use
/// column bands.
pub fn detect_page_columns(
    document_bytes: &[u8],
    page_num: u32,
    options: &LayoutOptions,
) -> Result<Vec<ColumnBand>, ParseError> {
    options.validate()?;
    let raw = LopdfExtractor.extract(document_bytes)?;
    Ok(detect_columns(
        &extract_text_blocks(&raw),
        page_num,
        options.column_tolerance,
    ))
}

fn failed(error: &ParseError) -> ParseResult {
    tracing::error!("failed to parse document: {error}");
    ParseResult::failure(error.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;

    use super::{ContentExtractor, parse_raw_json, parse_with};
    use crate::error::ParseError;
    use crate::model::{BBox, BlockType, RawBlock, RawDocument, RawLine, RawPage, RawSpan};

    struct FixedExtractor(RawDocument);

    impl ContentExtractor for FixedExtractor {
        fn extract(&self, _document_bytes: &[u8]) -> Result<RawDocument, ParseError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenExtractor;

    impl ContentExtractor for BrokenExtractor {
        fn extract(&self, _document_bytes: &[u8]) -> Result<RawDocument, ParseError> {
            Err(ParseError::Content {
                page: 2,
                message: "unexpected end of stream".to_string(),
            })
        }
    }

    fn text_block(text: &str, x0: f64, y0: f64) -> RawBlock {
        RawBlock::Text {
            bbox: BBox::new(x0, y0, x0 + 100.0, y0 + 14.0),
            lines: vec![RawLine {
                spans: vec![RawSpan {
                    text: text.to_string(),
                    size: 12.0,
                    flags: 0,
                }],
            }],
        }
    }

    fn two_page_document() -> RawDocument {
        RawDocument {
            pages: vec![
                RawPage {
                    blocks: vec![text_block("Hello", 72.0, 72.0)],
                },
                RawPage {
                    blocks: vec![text_block("World", 72.0, 72.0)],
                },
            ],
            metadata: BTreeMap::from([("title".to_string(), "Greeting".to_string())]),
        }
    }

    #[test]
    fn assembles_two_pages_with_one_page_break() {
        let result = parse_with(&FixedExtractor(two_page_document()), b"ignored");

        assert!(result.success);
        assert_eq!(result.full_text, "Hello\n\n\n\n--- Page 2 ---\n\nWorld");
        assert_eq!(result.page_count, 2);
        assert_eq!(result.metadata["title"], "Greeting");
        assert_eq!(result.error, None);
    }

    #[test]
    fn blocks_come_back_in_reading_order_with_extraction_numbers() {
        let document = RawDocument {
            pages: vec![RawPage {
                blocks: vec![
                    text_block("footer", 72.0, 700.0),
                    RawBlock::Image {
                        bbox: BBox::new(300.0, 100.0, 400.0, 150.0),
                        width: Some(100),
                        height: Some(50),
                    },
                    text_block("title", 72.0, 40.0),
                ],
            }],
            metadata: BTreeMap::new(),
        };

        let result = parse_with(&FixedExtractor(document), b"ignored");
        let order = result
            .blocks
            .iter()
            .map(|block| (block.text.as_str(), block.block_num, block.block_type))
            .collect::<Vec<_>>();

        assert_eq!(
            order,
            vec![
                ("title", 2, BlockType::Text),
                ("[IMAGE: 100x50]", 1, BlockType::Image),
                ("footer", 0, BlockType::Text),
            ]
        );
        assert_eq!(result.full_text, "title\n\n[IMAGE: 100x50]\n\nfooter");
    }

    #[test]
    fn repeated_parses_are_identical() {
        let extractor = FixedExtractor(two_page_document());
        let first = serde_json::to_string(&parse_with(&extractor, b"x")).expect("serialize");
        let second = serde_json::to_string(&parse_with(&extractor, b"x")).expect("serialize");
        assert_eq!(first, second);
    }

    #[test]
    fn extractor_errors_become_failure_results() {
        let result = parse_with(&BrokenExtractor, b"%PDF-1.4");

        assert!(!result.success);
        assert_eq!(result.full_text, "");
        assert!(result.blocks.is_empty());
        assert!(result.metadata.is_empty());
        assert_eq!(result.page_count, 0);
        assert_eq!(
            result.error.as_deref(),
            Some("failed to read content of page 2: unexpected end of stream")
        );
    }

    #[test]
    fn raw_trees_tolerate_odd_blocks() {
        let result = parse_raw_json(
            r#"{"pages":[{"blocks":[
                {"bbox":[0,0,1,1]},
                {"type":"drawing","bbox":[0,0,500,500]},
                {"type":"image","bbox":[10,300,110,350],"width":100.0,"height":50.0},
                {"type":"text","bbox":[5,6],"lines":[{"spans":[{"text":"Title"}]}]}
            ]}]}"#,
        )
        .expect("odd blocks should not fail the document");

        assert!(result.success);
        assert_eq!(result.full_text, "Title\n\n[IMAGE: 100x50]");
        let numbers = result
            .blocks
            .iter()
            .map(|block| block.block_num)
            .collect::<Vec<_>>();
        assert_eq!(numbers, vec![1, 0]);
        assert_eq!(<[f64; 4]>::from(result.blocks[0].bbox), [5.0, 6.0, 0.0, 0.0]);
    }

    #[test]
    fn malformed_raw_json_is_still_an_error() {
        assert!(matches!(
            parse_raw_json(r#"{"pages": 3}"#),
            Err(ParseError::RawContent(_))
        ));
    }

    #[test]
    fn success_serializes_error_as_null() {
        let result = parse_with(&FixedExtractor(RawDocument::default()), b"");
        let json = serde_json::to_value(&result).expect("serialize");

        assert_eq!(json["success"], true);
        assert_eq!(json["full_text"], "");
        assert_eq!(json["page_count"], 0);
        assert!(json["error"].is_null());
    }
}
