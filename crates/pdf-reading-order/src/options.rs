use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::ParseError;

pub const DEFAULT_COLUMN_TOLERANCE: f64 = 50.0;

/// 1-based page ranges such as `1-3,5`, kept as ranges so wide selections
/// cost nothing until a page is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    ranges: Vec<RangeInclusive<u32>>,
}

impl PageSelection {
    #[must_use]
    pub fn contains(&self, page: u32) -> bool {
        self.ranges.iter().any(|range| range.contains(&page))
    }
}

fn page_number(raw: &str, what: &str) -> Result<u32, String> {
    let page = raw
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid {what}: '{}'", raw.trim()))?;
    if page == 0 {
        return Err("pages are 1-based".to_string());
    }
    Ok(page)
}

impl FromStr for PageSelection {
    type Err = String;

    fn from_str(selection: &str) -> Result<Self, Self::Err> {
        let ranges = selection
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| match token.split_once('-') {
                Some((start, end)) => {
                    let start = page_number(start, "page range start")?;
                    let end = page_number(end, "page range end")?;
                    if end < start {
                        return Err(format!("invalid range '{token}': end is before start"));
                    }
                    Ok(start..=end)
                }
                None => page_number(token, "page number").map(|page| page..=page),
            })
            .collect::<Result<Vec<_>, _>>()?;

        if ranges.is_empty() {
            return Err("page selection cannot be empty".to_string());
        }
        Ok(Self { ranges })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutOptions {
    /// Maximum left-edge distance for two blocks to share a column band.
    pub column_tolerance: f64,
}

impl LayoutOptions {
    pub fn validate(&self) -> Result<(), ParseError> {
        if !self.column_tolerance.is_finite() || self.column_tolerance < 0.0 {
            return Err(ParseError::InvalidOption(format!(
                "column_tolerance must be a finite, non-negative number, got {}",
                self.column_tolerance
            )));
        }
        Ok(())
    }
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            column_tolerance: DEFAULT_COLUMN_TOLERANCE,
        }
    }
}
