use std::path::Path;

use clap::ValueEnum;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::client::{Jira, Project, SummaryMatch};
use crate::config::Config;
use crate::error::SyncError;
use crate::rows::{self, Row, normalize_date, split_list};

/// Which way a `Dependencies` entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    /// The row's issue is blocked by each listed key.
    #[value(name = "blocked_by")]
    BlockedBy,
    /// The row's issue blocks each listed key.
    #[value(name = "blocks")]
    Blocks,
}

impl Direction {
    /// (inward, outward) pair for a link between the row's issue and one
    /// dependency key. Inward is the blocked side.
    pub fn link_pair<'a>(self, issue: &'a str, dep: &'a str) -> (&'a str, &'a str) {
        match self {
            Direction::BlockedBy => (issue, dep),
            Direction::Blocks => (dep, issue),
        }
    }
}

#[derive(Debug, Default)]
pub struct UpdateSummary {
    pub updated: usize,
    pub linked: usize,
    pub skipped: usize,
}

/// Push sheet fields onto existing issues and create dependency links from
/// the `Dependencies` column.
pub fn run(
    jira: &mut Jira,
    config: &Config,
    csv_path: &Path,
    project_key: &str,
    direction: Direction,
    max: Option<usize>,
) -> Result<UpdateSummary, SyncError> {
    let project = jira.get_project(project_key)?;
    let rows = rows::read_rows(csv_path)?;
    let mut summary = UpdateSummary::default();

    for (idx, row) in rows.iter().enumerate() {
        let n = idx + 1;
        if let Some(limit) = max
            && summary.updated >= limit
        {
            break;
        }

        let key = match resolve_row(jira, project_key, row) {
            Ok(Some(key)) => key,
            Ok(None) => {
                summary.skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        match build_fields(jira, config, &project, row) {
            Ok(fields) => match jira.update_issue(&key, &Value::Object(fields)) {
                Ok(()) => {
                    summary.updated += 1;
                    if summary.updated % 10 == 0 {
                        println!("[{}] Updated through {key}", summary.updated);
                    }
                }
                Err(e) => {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    warn!(row = n, key = %key, "update failed: {e}");
                }
            },
            Err(e) => {
                if e.is_fatal() {
                    return Err(e);
                }
                warn!(row = n, key = %key, "building fields failed, row skipped: {e}");
                summary.skipped += 1;
                continue;
            }
        }

        if let Some(deps) = row.dependencies.as_deref() {
            for dep in split_list(deps) {
                let (inward, outward) = direction.link_pair(&key, &dep);
                match jira.link_blocks(inward, outward) {
                    Ok(()) => summary.linked += 1,
                    Err(e) => {
                        if e.is_fatal() {
                            return Err(e);
                        }
                        warn!(row = n, key = %key, dep = %dep, "link failed: {e}");
                    }
                }
            }
        }
    }

    println!(
        "Done. Updated: {}, Linked: {}, Skipped: {}.",
        summary.updated, summary.linked, summary.skipped
    );
    if jira.dry_run() {
        println!("No changes were made. Remove --dry-run to apply updates.");
    }
    Ok(summary)
}

/// IssueKey verbatim when present; otherwise the summary must match exactly
/// one issue in the project. Returns Ok(None) when the row cannot be
/// resolved (already warned about).
fn resolve_row(jira: &Jira, project_key: &str, row: &Row) -> Result<Option<String>, SyncError> {
    if let Some(key) = row.issue_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        return Ok(Some(key.to_string()));
    }
    let Some(summary) = row.summary.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        warn!("row has neither IssueKey nor Summary");
        return Ok(None);
    };
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

fn build_fields(
    jira: &mut Jira,
    config: &Config,
    project: &Project,
    row: &Row,
) -> Result<Map<String, Value>, SyncError> {
    let mut fields = Map::new();

    if let Some(raw) = row.start_date.as_deref().filter(|s| !s.trim().is_empty()) {
        if let Some(field) = &config.start_date_field {
            match normalize_date(raw) {
                Some(date) => {
                    fields.insert(field.clone(), Value::String(date));
                }
                None => warn!(value = raw, "unparseable StartDate, field omitted"),
            }
        }
    }
    if let Some(raw) = row.due_date.as_deref().filter(|s| !s.trim().is_empty()) {
        match normalize_date(raw) {
            Some(date) => {
                fields.insert("duedate".into(), Value::String(date));
            }
            None => warn!(value = raw, "unparseable DueDate, field omitted"),
        }
    }

    if let Some(desc) = row.description.as_deref().filter(|s| !s.trim().is_empty()) {
        fields.insert("description".into(), Value::String(desc.to_string()));
    }
    if let Some(prio) = row.priority.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        fields.insert("priority".into(), json!({ "name": prio }));
    }
    if let Some(labels) = row.labels.as_deref().filter(|s| !s.trim().is_empty()) {
        fields.insert("labels".into(), json!(split_list(labels)));
    }

    if let Some(comps) = row.components.as_deref().filter(|s| !s.trim().is_empty()) {
        let mut refs = Vec::new();
        for name in split_list(comps) {
            let id = jira.get_or_create_component(&project.id, &name)?;
            refs.push(json!({ "id": id }));
        }
        fields.insert("components".into(), Value::Array(refs));
    }
    if let Some(vers) = row.fix_versions.as_deref().filter(|s| !s.trim().is_empty()) {
        let mut refs = Vec::new();
        for name in split_list(vers) {
            let id = jira.get_or_create_version(&project.id, &name)?;
            refs.push(json!({ "id": id }));
        }
        fields.insert("fixVersions".into(), Value::Array(refs));
    }

    if let Some(email) = row.assignee_email.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        match jira.resolve_user(email)? {
            Some(account_id) => {
                fields.insert("assignee".into(), json!({ "accountId": account_id }));
            }
            None => warn!(email, "no tracker account for email, assignee omitted"),
        }
    }

    if let Some(epic) = row.epic_key.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        fields.insert(config.epic_link_field.clone(), Value::String(epic.to_string()));
    }
    if let Some(parent) = row.parent_key.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        fields.insert("parent".into(), json!({ "key": parent }));
    }

    Ok(fields)
}
