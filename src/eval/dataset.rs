//! Evaluation dataset loading and validation.
//!
//! Line-based JSON rows, validated individually with line-aware messages.
//! A single invalid row rejects the whole run. Rows are ordered by a
//! numeric-aware qid key so `q2` sorts before `q10`.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DatasetError, Result};

/// A labeled relevant page span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldSpan {
    /// Document identifier.
    pub doc_id: String,
    /// First relevant page (1-based).
    pub start_page: u32,
    /// Last relevant page (inclusive).
    pub end_page: u32,
}

/// One evaluation question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRow {
    /// Unique question id.
    pub qid: String,
    /// Question text.
    pub question: String,
    /// Whether the corpus can answer the question.
    pub answerable: bool,
    /// Labeled relevant spans; empty iff not answerable.
    #[serde(default)]
    pub gold: Vec<GoldSpan>,
}

/// One segment of a numeric-aware sort key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum KeyPart {
    /// Numeric run, compared numerically.
    Num(u64),
    /// Text run, compared lexically.
    Text(String),
}

/// Numeric-aware sort key for qids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QidKey(Vec<KeyPart>);

impl Ord for QidKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for QidKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Builds the numeric-aware sort key for a qid (`q2` < `q10`).
#[must_use]
pub fn qid_sort_key(qid: &str) -> QidKey {
    let mut parts = Vec::new();
    let mut digits = String::new();
    let mut text = String::new();

    for c in qid.chars() {
        if c.is_ascii_digit() {
            if !text.is_empty() {
                parts.push(KeyPart::Text(std::mem::take(&mut text)));
            }
            digits.push(c);
        } else {
            if !digits.is_empty() {
                parts.push(KeyPart::Num(digits.parse().unwrap_or(u64::MAX)));
                digits.clear();
            }
            text.push(c);
        }
    }
    if !digits.is_empty() {
        parts.push(KeyPart::Num(digits.parse().unwrap_or(u64::MAX)));
    }
    if !text.is_empty() {
        parts.push(KeyPart::Text(text));
    }
    QidKey(parts)
}

fn validate_row(row: &DatasetRow, line: usize, allow_unlabeled: bool) -> Result<()> {
    if row.qid.trim().is_empty() {
        return Err(DatasetError::InvalidRow {
            line,
            reason: "empty qid".to_string(),
        }
        .into());
    }
    if row.question.trim().is_empty() {
        return Err(DatasetError::InvalidRow {
            line,
            reason: format!("empty question for qid {}", row.qid),
        }
        .into());
    }
    for span in &row.gold {
        if span.start_page < 1 || span.end_page < span.start_page {
            return Err(DatasetError::InvalidRow {
                line,
                reason: format!(
                    "qid {}: invalid gold span p{}-p{}",
                    row.qid, span.start_page, span.end_page
                ),
            }
            .into());
        }
        if span.doc_id.trim().is_empty() {
            return Err(DatasetError::InvalidRow {
                line,
                reason: format!("qid {}: gold span with empty doc_id", row.qid),
            }
            .into());
        }
    }
    if !row.answerable && !row.gold.is_empty() {
        return Err(DatasetError::InvalidRow {
            line,
            reason: format!("qid {}: unanswerable row with gold spans", row.qid),
        }
        .into());
    }
    if row.answerable && row.gold.is_empty() && !allow_unlabeled {
        return Err(DatasetError::InvalidRow {
            line,
            reason: format!(
                "qid {}: answerable row without gold spans (pass --allow-unlabeled to accept)",
                row.qid
            ),
        }
        .into());
    }
    Ok(())
}

/// Loads and validates a dataset, returning rows in qid order.
///
/// # Errors
///
/// Returns [`DatasetError`] on read failure, an invalid row, or a
/// duplicate qid; there are no partial loads.
pub fn load_dataset<P: AsRef<Path>>(path: P, allow_unlabeled: bool) -> Result<Vec<DatasetRow>> {
    let path_str = path.as_ref().to_string_lossy().to_string();
    let file = File::open(path.as_ref()).map_err(|e| DatasetError::ReadFailed {
        path: path_str.clone(),
        reason: e.to_string(),
    })?;
    let reader = BufReader::new(file);

    let mut rows: Vec<DatasetRow> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| DatasetError::ReadFailed {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let row: DatasetRow =
            serde_json::from_str(&line).map_err(|e| DatasetError::InvalidRow {
                line: line_no,
                reason: e.to_string(),
            })?;
        validate_row(&row, line_no, allow_unlabeled)?;
        if !seen.insert(row.qid.clone()) {
            return Err(DatasetError::DuplicateQid {
                line: line_no,
                qid: row.qid,
            }
            .into());
        }
        rows.push(row);
    }

    rows.sort_by(|a, b| qid_sort_key(&a.qid).cmp(&qid_sort_key(&b.qid)));
    info!(rows = rows.len(), path = %path_str, "dataset loaded");
    Ok(rows)
}
