use crate::model::TextBlock;

#[must_use]
pub fn page_break_marker(page_num: u32) -> String {
    format!("\n\n--- Page {page_num} ---\n\n")
}

/// Joins already-sorted blocks into one string. A page-break marker goes in
/// front of the first block of every page except the first one seen.
#[must_use]
pub fn assemble_full_text(sorted_blocks: &[TextBlock]) -> String {
    let mut full_text = String::new();
    let mut current_page = None;

    for block in sorted_blocks {
        if current_page != Some(block.page_num) {
            if current_page.is_some() {
                full_text.push_str(&page_break_marker(block.page_num));
            }
            current_page = Some(block.page_num);
        }

        full_text.push_str(&block.text);
        full_text.push_str("\n\n");
    }

    full_text.trim().to_string()
}
