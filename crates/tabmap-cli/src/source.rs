//! CSV files as spreadsheet tabs.
//!
//! A directory is treated as one source and each `<tab>.csv` in it as a tab.
//! Rows are kept as read, minus fully blank lines; the header row is only
//! detected, never stripped.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use tabmap_model::RawSheet;
use tabmap_session::{SessionError, SheetSource};

/// Rows scanned when looking for the header.
const HEADER_SCAN_ROWS: usize = 5;

#[derive(Debug, Clone)]
pub struct CsvSheetSource {
    dir: PathBuf,
}

impl CsvSheetSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn tab_path(&self, tab: &str) -> PathBuf {
        self.dir.join(format!("{tab}.csv"))
    }
}

impl SheetSource for CsvSheetSource {
    async fn fetch(&self, source_id: &str, tab: &str) -> tabmap_session::Result<RawSheet> {
        let path = self.tab_path(tab);
        let load_error = |message: String| SessionError::SourceLoad {
            source_id: source_id.to_string(),
            tab: tab.to_string(),
            message,
        };
        tokio::task::spawn_blocking(move || read_sheet(&path))
            .await
            .map_err(|e| load_error(e.to_string()))?
            .map_err(|e| load_error(format!("{e:#}")))
    }
}

fn normalize_cell(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

/// Reads a CSV file and detects its header row.
pub fn read_sheet(path: &Path) -> Result<RawSheet> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("read csv: {}", path.display()))?;
    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("read record: {}", path.display()))?;
        let row: Vec<String> = record.iter().map(normalize_cell).collect();
        if row.iter().all(|value| value.is_empty()) {
            continue;
        }
        rows.push(row);
    }
    let (header_row, confidence) = detect_header_row(&rows);
    tracing::debug!(
        path = %path.display(),
        rows = rows.len(),
        header_row,
        confidence,
        "read sheet"
    );
    Ok(RawSheet::new(rows, header_row, confidence))
}

#[derive(Debug, Default, Clone, Copy)]
struct RowStats {
    total: usize,
    non_empty: usize,
    numeric: usize,
    alpha: usize,
}

impl RowStats {
    fn ratio(self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64
        }
    }

    fn non_empty_ratio(self) -> f64 {
        self.ratio(self.non_empty)
    }

    fn numeric_ratio(self) -> f64 {
        self.ratio(self.numeric)
    }

    fn alpha_ratio(self) -> f64 {
        self.ratio(self.alpha)
    }
}

fn row_stats(row: &[String]) -> RowStats {
    let mut stats = RowStats {
        total: row.len(),
        ..RowStats::default()
    };
    for cell in row.iter().map(|cell| cell.trim()) {
        if cell.is_empty() {
            continue;
        }
        stats.non_empty += 1;
        if cell.replace(',', "").parse::<f64>().is_ok() {
            stats.numeric += 1;
        }
        if cell.chars().any(|ch| ch.is_alphabetic()) {
            stats.alpha += 1;
        }
    }
    stats
}

fn is_data_like(stats: RowStats) -> bool {
    stats.numeric_ratio() >= 0.2
}

fn is_header_like(stats: RowStats) -> bool {
    stats.non_empty_ratio() >= 0.5 && stats.alpha_ratio() >= 0.5 && stats.numeric_ratio() <= 0.1
}

/// Picks the header row and a 0-100 confidence.
///
/// Title rows above a table are usually sparse, so the widest header-like
/// row before the first data-like row wins; ties go to the later row.
fn detect_header_row(rows: &[Vec<String>]) -> (usize, u8) {
    if rows.is_empty() {
        return (0, 0);
    }
    let widest = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
    let scanned = rows.len().min(HEADER_SCAN_ROWS);
    let stats: Vec<RowStats> = rows.iter().take(scanned).map(|row| row_stats(row)).collect();
    let search_end = stats
        .iter()
        .position(|stat| is_data_like(*stat))
        .unwrap_or(scanned)
        .max(1);

    let mut best: Option<(usize, usize)> = None;
    for (index, stat) in stats.iter().enumerate().take(search_end) {
        if is_header_like(*stat) && best.is_none_or(|(_, filled)| stat.non_empty >= filled) {
            best = Some((index, stat.non_empty));
        }
    }
    match best {
        Some((index, filled)) => {
            let fill = filled as f64 / widest as f64;
            let alpha = stats[index].alpha_ratio();
            let confidence = (50.0 + 25.0 * fill + 25.0 * alpha).round() as u8;
            (index, confidence)
        }
        None => (0, 20),
    }
}
