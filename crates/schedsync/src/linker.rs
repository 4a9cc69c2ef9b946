use std::path::Path;

use tracing::warn;

use crate::client::{Jira, SummaryMatch};
use crate::error::SyncError;
use crate::rows;

#[derive(Debug, Default)]
pub struct LinkSummary {
    pub processed: usize,
    pub linked: usize,
    pub skipped: usize,
}

/// Create "blocked by" links for every row carrying both a Summary and a
/// Depends on value. Both sides must resolve to exactly one issue.
pub fn run(jira: &Jira, csv_path: &Path, project_key: &str) -> Result<LinkSummary, SyncError> {
    let rows = rows::read_rows(csv_path)?;
    let mut summary = LinkSummary::default();

    for row in &rows {
        let (Some(src), Some(dep)) = (
            row.summary.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            row.depends_on.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        ) else {
            continue;
        };
        summary.processed += 1;

        let Some(src_key) = resolve_one(jira, project_key, src)? else {
            summary.skipped += 1;
            continue;
        };
        let Some(dep_key) = resolve_one(jira, project_key, dep)? else {
            summary.skipped += 1;
            continue;
        };

        // The Summary side is the blocked one.
        match jira.link_blocks(&src_key, &dep_key) {
            Ok(()) => {
                summary.linked += 1;
                if summary.linked % 10 == 0 {
                    println!(
                        "[progress] Linked {} so far... last: {src_key} <- {dep_key}",
                        summary.linked
                    );
                }
            }
            Err(e) => {
                if e.is_fatal() {
                    return Err(e);
                }
                warn!(inward = %src_key, outward = %dep_key, "link failed: {e}");
                summary.skipped += 1;
            }
        }
    }

    println!(
        "Final summary: processed {} rows with dependencies, linked {}, skipped {}.",
        summary.processed, summary.linked, summary.skipped
    );
    Ok(summary)
}

fn resolve_one(jira: &Jira, project_key: &str, summary: &str) -> Result<Option<String>, SyncError> {
    match jira.find_by_summary(project_key, summary) {
        Ok(SummaryMatch::One(key)) => Ok(Some(key)),
        Ok(SummaryMatch::NotFound) => {
            warn!(summary, "no issue found for summary");
            Ok(None)
        }
        Ok(SummaryMatch::Ambiguous(count)) => {
            warn!(summary, count, "summary matches more than one issue");
            Ok(None)
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(summary, "summary lookup failed: {e}");
            Ok(None)
        }
    }
}
