use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::SyncError;

/// One spreadsheet line. Every column is optional at this layer; the stages
/// decide which ones a given row must carry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Row {
    #[serde(rename = "Summary", default)]
    pub summary: Option<String>,
    #[serde(rename = "Issue Type", default)]
    pub issue_type: Option<String>,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    // The legacy sheets used both spellings depending on which script
    // consumed them.
    #[serde(rename = "StartDate", alias = "Start date", default)]
    pub start_date: Option<String>,
    #[serde(rename = "DueDate", alias = "Due date", default)]
    pub due_date: Option<String>,
    #[serde(rename = "Depends on", default)]
    pub depends_on: Option<String>,
    #[serde(rename = "IssueKey", default)]
    pub issue_key: Option<String>,
    #[serde(rename = "Priority", default)]
    pub priority: Option<String>,
    #[serde(rename = "Labels", default)]
    pub labels: Option<String>,
    #[serde(rename = "Components", default)]
    pub components: Option<String>,
    #[serde(rename = "FixVersions", default)]
    pub fix_versions: Option<String>,
    #[serde(rename = "AssigneeEmail", default)]
    pub assignee_email: Option<String>,
    #[serde(rename = "EpicKey", default)]
    pub epic_key: Option<String>,
    #[serde(rename = "ParentKey", default)]
    pub parent_key: Option<String>,
    #[serde(rename = "Dependencies", default)]
    pub dependencies: Option<String>,
}

impl Row {
    /// Rows without an explicit type are plain Tasks.
    pub fn effective_issue_type(&self) -> &str {
        match self.issue_type.as_deref() {
            Some(t) if !t.trim().is_empty() => t.trim(),
            _ => "Task",
        }
    }
}

pub fn read_rows(path: &Path) -> Result<Vec<Row>, SyncError> {
    let display = path.display().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| SyncError::Csv {
            path: display.clone(),
            detail: e.to_string(),
        })?;

    let headers = reader.headers().map_err(|e| SyncError::Csv {
        path: display.clone(),
        detail: e.to_string(),
    })?;
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(SyncError::EmptyHeader(display));
    }

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: Row = record.map_err(|e| SyncError::Csv {
            path: display.clone(),
            detail: e.to_string(),
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Split a comma-separated cell, trimming entries and dropping empties.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%m/%d/%Y", "%m-%d-%Y", "%d %b %Y", "%d %B %Y",
    "%b %d %Y", "%B %d %Y", "%Y/%m/%d",
];

/// Normalize a spreadsheet date cell to yyyy-mm-dd, trying the formats the
/// source sheets have been seen to use. Returns None for blanks, spreadsheet
/// null sentinels, and anything unparseable.
pub fn normalize_date(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() || matches!(s.to_ascii_lowercase().as_str(), "nan" | "none" | "null") {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.format("%Y-%m-%d").to_string());
        }
    }
    None
}
