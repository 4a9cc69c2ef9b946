use std::collections::HashMap;
use std::path::Path;

use serde_json::{Value, json};
use tracing::warn;

use crate::client::{Jira, SummaryMatch, to_adf};
use crate::config::Config;
use crate::error::SyncError;
use crate::rows::{self, Row, normalize_date};

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub deleted: usize,
    pub created: usize,
    pub linked: usize,
    pub skipped: usize,
}

/// Import Tasks and Sub-tasks from the sheet, in file order. Unless `wipe`
/// is suppressed the target project is emptied first. Dependency targets
/// are resolved inline as each row is processed (in-run map first, then a
/// live search), so a `Depends on` naming a later sheet row only resolves
/// if the tracker already knows it; the link calls themselves are queued
/// and issued after all creates.
pub fn run(
    jira: &mut Jira,
    config: &Config,
    csv_path: &Path,
    project_key: &str,
    wipe: bool,
) -> Result<ImportSummary, SyncError> {
    let rows = rows::read_rows(csv_path)?;
    let mut summary = ImportSummary::default();

    if wipe {
        summary.deleted = wipe_project(jira, project_key)?;
    }

    // Keys created during this run, indexed by bare task summary and by
    // "parent:subtask" for sub-tasks. Owned here, handed to the link step.
    let mut created: HashMap<String, String> = HashMap::new();
    let mut pending_links: Vec<(String, String)> = Vec::new();
    let mut current_parent: Option<String> = None;
    let total = rows.len();

    println!("Creating tasks and subtasks...");
    for (idx, row) in rows.iter().enumerate() {
        let n = idx + 1;
        let Some(summary_text) = row.summary.as_deref().filter(|s| !s.trim().is_empty()) else {
            warn!(row = n, "skipping row without a Summary");
            summary.skipped += 1;
            continue;
        };
        let summary_text = summary_text.trim();

        let key = match row.effective_issue_type() {
            "Task" => {
                let fields = issue_fields(config, project_key, row, "Task", None);
                match jira.create_issue(&fields) {
                    Ok(key) => {
                        created.insert(summary_text.to_string(), key.clone());
                        current_parent = Some(summary_text.to_string());
                        if n == 1 || n % 10 == 0 || n == total {
                            println!("[{n}/{total}] Created Task: {summary_text} ({key})");
                        }
                        key
                    }
                    Err(e) => {
                        if e.is_fatal() {
                            return Err(e);
                        }
                        warn!(row = n, summary = summary_text, "task create failed: {e}");
                        // don't let following sub-tasks attach to an older task
                        current_parent = None;
                        summary.skipped += 1;
                        continue;
                    }
                }
            }
            "Sub-task" => {
                let Some(parent_key) = current_parent
                    .as_deref()
                    .and_then(|p| created.get(p))
                    .cloned()
                else {
                    warn!(
                        row = n,
                        summary = summary_text,
                        "sub-task has no preceding parent task, skipping"
                    );
                    summary.skipped += 1;
                    continue;
                };
                let fields = issue_fields(config, project_key, row, "Sub-task", Some(&parent_key));
                match jira.create_issue(&fields) {
                    Ok(key) => {
                        let parent = current_parent.as_deref().unwrap_or_default();
                        created.insert(format!("{parent}:{summary_text}"), key.clone());
                        key
                    }
                    Err(e) => {
                        if e.is_fatal() {
                            return Err(e);
                        }
                        warn!(row = n, summary = summary_text, "sub-task create failed: {e}");
                        summary.skipped += 1;
                        continue;
                    }
                }
            }
            other => {
                warn!(row = n, issue_type = other, "unknown issue type, skipping");
                summary.skipped += 1;
                continue;
            }
        };
        summary.created += 1;

        if let Some(dep) = row.depends_on.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            match resolve_dep(&created, current_parent.as_deref(), dep) {
                Some(dep_key) => pending_links.push((key, dep_key)),
                None => match jira.find_by_summary(project_key, dep) {
                    Ok(SummaryMatch::One(dep_key)) => pending_links.push((key, dep_key)),
                    Ok(_) => {
                        warn!(row = n, dependency = dep, "could not resolve dependency");
                    }
                    Err(e) => {
                        if e.is_fatal() {
                            return Err(e);
                        }
                        warn!(row = n, dependency = dep, "dependency lookup failed: {e}");
                    }
                },
            }
        }
    }

    if pending_links.is_empty() {
        println!("No dependencies to link.");
    } else {
        println!("Linking dependencies...");
        for (blocked, blocker) in &pending_links {
            match jira.link_blocks(blocked, blocker) {
                Ok(()) => summary.linked += 1,
                Err(e) => {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    warn!(inward = %blocked, outward = %blocker, "link failed: {e}");
                }
            }
        }
        println!("Dependency linking complete.");
    }

    println!(
        "Import complete. Created: {}, Linked: {}, Skipped: {}.",
        summary.created, summary.linked, summary.skipped
    );
    if jira.dry_run() {
        println!("Dry-run mode: no issues actually created.");
    }
    Ok(summary)
}

/// Delete everything in the project. Individual delete failures are logged
/// and the batch continues.
fn wipe_project(jira: &Jira, project_key: &str) -> Result<usize, SyncError> {
    println!("Searching for issues to delete in project {project_key}...");
    let issues = jira.search(&format!("project = {project_key}"))?;
    if issues.is_empty() {
        println!("No issues found to delete.");
        return Ok(0);
    }
    let total = issues.len();
    println!("Deleting {total} issues in project {project_key}...");
    let mut deleted = 0;
    for (i, issue) in issues.iter().enumerate() {
        let n = i + 1;
        match jira.delete_issue(&issue.key) {
            Ok(()) => {
                deleted += 1;
                if n == 1 || n % 10 == 0 || n == total {
                    println!("[{n}/{total}] Deleted {}", issue.key);
                }
            }
            Err(e) => warn!(key = %issue.key, "delete failed: {e}"),
        }
    }
    println!("Wipe complete.");
    Ok(deleted)
}

fn issue_fields(
    config: &Config,
    project_key: &str,
    row: &Row,
    issue_type: &str,
    parent_key: Option<&str>,
) -> Value {
    let mut fields = json!({
        "summary": row.summary.as_deref().unwrap_or_default().trim(),
        "project": { "key": project_key },
        "issuetype": { "name": issue_type },
        "description": to_adf(row.description.as_deref().unwrap_or_default()),
    });
    if let Some(due) = row.due_date.as_deref().and_then(normalize_date) {
        fields["duedate"] = Value::String(due);
    }
    if let Some(field) = &config.start_date_field
        && let Some(start) = row.start_date.as_deref().and_then(normalize_date)
    {
        fields[field.as_str()] = Value::String(start);
    }
    if let Some(parent) = parent_key {
        fields["parent"] = json!({ "key": parent });
    }
    fields
}

/// Resolve a dependency name against keys created during this run: a bare
/// task summary first, then a sibling sub-task under the current parent.
fn resolve_dep(
    created: &HashMap<String, String>,
    current_parent: Option<&str>,
    dep: &str,
) -> Option<String> {
    if let Some(key) = created.get(dep) {
        return Some(key.clone());
    }
    if let Some(parent) = current_parent
        && let Some(key) = created.get(&format!("{parent}:{dep}"))
    {
        return Some(key.clone());
    }
    None
}
