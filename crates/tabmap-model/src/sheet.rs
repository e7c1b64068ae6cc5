//! Raw tab contents as returned by a sheet source.

use serde::{Deserialize, Serialize};

/// Rows of one spreadsheet tab plus the detected header position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSheet {
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
    pub detected_header_row: usize,
    /// Detection confidence, 0 to 100.
    pub header_confidence: u8,
}

impl RawSheet {
    pub fn new(rows: Vec<Vec<String>>, detected_header_row: usize, header_confidence: u8) -> Self {
        Self {
            total_rows: rows.len(),
            rows,
            detected_header_row,
            header_confidence: header_confidence.min(100),
        }
    }

    /// Header cells of `header_row`, trimmed; empty when out of range.
    pub fn headers_at(&self, header_row: usize) -> Vec<String> {
        self.rows
            .get(header_row)
            .map(|row| row.iter().map(|cell| cell.trim().to_string()).collect())
            .unwrap_or_default()
    }

    /// Rows below `header_row`.
    pub fn data_rows_after(&self, header_row: usize) -> &[Vec<String>] {
        self.rows.get(header_row.saturating_add(1)..).unwrap_or(&[])
    }

    /// Non-blank values of one column below `header_row`, up to `limit`.
    pub fn sample_values(&self, header_row: usize, index: usize, limit: usize) -> Vec<String> {
        self.data_rows_after(header_row)
            .iter()
            .filter_map(|row| row.get(index))
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .take(limit)
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> RawSheet {
        RawSheet::new(
            vec![
                vec!["Report".into()],
                vec![" Brand ".into(), "ASIN".into()],
                vec!["Acme".into(), "".into()],
                vec!["".into(), "B00X".into()],
            ],
            1,
            80,
        )
    }

    #[test]
    fn headers_and_data_follow_header_row() {
        let sheet = sheet();
        assert_eq!(sheet.headers_at(1), vec!["Brand", "ASIN"]);
        assert_eq!(sheet.data_rows_after(1).len(), 2);
        assert!(sheet.data_rows_after(10).is_empty());
        assert!(sheet.headers_at(10).is_empty());
        assert!(sheet.data_rows_after(usize::MAX).is_empty());
        assert!(sheet.headers_at(usize::MAX).is_empty());
    }

    #[test]
    fn samples_skip_blank_cells() {
        assert_eq!(sheet().sample_values(1, 1, 5), vec!["B00X"]);
    }
}
