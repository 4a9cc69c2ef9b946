use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::config::Config;
use crate::error::SyncError;

const SEARCH_PAGE_SIZE: u64 = 100;

/// Key of an issue "created" by a dry-run; lets the import map stay usable
/// without touching the tracker.
pub const DRY_RUN_KEY: &str = "DRY-KEY";

#[derive(Debug, Deserialize)]
pub struct Project {
    pub id: String,
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedEntity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct FoundIssue {
    pub key: String,
    #[serde(default)]
    pub fields: IssueFields,
}

#[derive(Debug, Default, Deserialize)]
pub struct IssueFields {
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<FoundIssue>,
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    key: String,
}

#[derive(Debug, Deserialize)]
struct FoundUser {
    #[serde(rename = "accountId")]
    account_id: String,
}

/// Outcome of resolving a summary to exactly one issue.
#[derive(Debug)]
pub enum SummaryMatch {
    One(String),
    NotFound,
    Ambiguous(usize),
}

/// Synchronous tracker client. One request in flight at a time, basic auth
/// on every call, optional pause between calls. In dry-run mode mutating
/// calls print what they would send and return placeholders; read-only
/// calls always execute.
pub struct Jira {
    http: HttpClient,
    base_url: String,
    user: String,
    token: String,
    throttle: Duration,
    dry_run: bool,
    user_cache: HashMap<String, Option<String>>,
    // project id -> lowercased name -> entity id
    component_cache: HashMap<String, HashMap<String, String>>,
    version_cache: HashMap<String, HashMap<String, String>>,
}

impl Jira {
    pub fn new(config: &Config, dry_run: bool) -> Jira {
        Jira {
            http: HttpClient::new(),
            base_url: config.base_url.clone(),
            user: config.user.clone(),
            token: config.token.clone(),
            throttle: config.throttle,
            dry_run,
            user_cache: HashMap::new(),
            component_cache: HashMap::new(),
            version_cache: HashMap::new(),
        }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn pause(&self) {
        if !self.throttle.is_zero() {
            thread::sleep(self.throttle);
        }
    }

    fn send(&self, req: RequestBuilder) -> Result<Response, SyncError> {
        let resp = req
            .basic_auth(&self.user, Some(&self.token))
            .header("Accept", "application/json")
            .send()
            .map_err(|e| SyncError::Request(e.to_string()))?;
        self.pause();
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let body = resp.text().unwrap_or_default();
            Err(SyncError::Http {
                status: status.as_u16(),
                body,
            })
        }
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, SyncError> {
        let resp = self.send(self.http.get(self.url(path)))?;
        resp.json().map_err(|e| SyncError::Request(e.to_string()))
    }

    fn get_json_query<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, SyncError> {
        let resp = self.send(self.http.get(self.url(path)).query(query))?;
        resp.json().map_err(|e| SyncError::Request(e.to_string()))
    }

    fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        payload: &Value,
    ) -> Result<T, SyncError> {
        let resp = self.send(self.http.post(self.url(path)).json(payload))?;
        resp.json().map_err(|e| SyncError::Request(e.to_string()))
    }

    // --------- Issues ---------

    /// Create an issue; returns its key, or DRY-KEY in dry-run mode.
    pub fn create_issue(&self, fields: &Value) -> Result<String, SyncError> {
        if self.dry_run {
            let summary = fields["summary"].as_str().unwrap_or("(no summary)");
            println!("[dry-run] POST {} :: {summary}", self.url("/rest/api/3/issue"));
            return Ok(DRY_RUN_KEY.to_string());
        }
        let created: CreatedIssue =
            self.post_json("/rest/api/3/issue", &json!({ "fields": fields }))?;
        Ok(created.key)
    }

    pub fn update_issue(&self, key: &str, fields: &Value) -> Result<(), SyncError> {
        let path = format!("/rest/api/3/issue/{key}");
        if self.dry_run {
            println!("[dry-run] PUT {} :: {fields}", self.url(&path));
            return Ok(());
        }
        self.send(self.http.put(self.url(&path)).json(&json!({ "fields": fields })))?;
        Ok(())
    }

    pub fn delete_issue(&self, key: &str) -> Result<(), SyncError> {
        let path = format!("/rest/api/3/issue/{key}?deleteSubtasks=true");
        if self.dry_run {
            println!("[dry-run] DELETE {}", self.url(&path));
            return Ok(());
        }
        self.send(self.http.delete(self.url(&path)))?;
        Ok(())
    }

    /// Create a "Blocks" link: `inward` is the blocked issue, `outward` the
    /// issue it waits on.
    pub fn link_blocks(&self, inward: &str, outward: &str) -> Result<(), SyncError> {
        let payload = json!({
            "type": { "name": "Blocks" },
            "inwardIssue": { "key": inward },
            "outwardIssue": { "key": outward },
        });
        if self.dry_run {
            println!(
                "[dry-run] POST {} :: {inward} blocked by {outward}",
                self.url("/rest/api/3/issueLink")
            );
            return Ok(());
        }
        self.send(self.http.post(self.url("/rest/api/3/issueLink")).json(&payload))?;
        Ok(())
    }

    // --------- Search ---------

    /// Run a JQL search, following pagination until the reported total is
    /// reached. Read-only, so it executes even in dry-run mode.
    pub fn search(&self, jql: &str) -> Result<Vec<FoundIssue>, SyncError> {
        let mut start_at = 0u64;
        let mut issues = Vec::new();
        loop {
            let payload = json!({
                "jql": jql,
                "startAt": start_at,
                "maxResults": SEARCH_PAGE_SIZE,
                "fields": ["summary"],
            });
            let page: SearchResponse = self.post_json("/rest/api/3/search", &payload)?;
            let batch = page.issues.len() as u64;
            if batch == 0 {
                break;
            }
            issues.extend(page.issues);
            start_at += batch;
            if start_at >= page.total {
                break;
            }
        }
        Ok(issues)
    }

    /// Resolve a summary to an issue key, requiring exactly one exact match
    /// (case-insensitive, whitespace-trimmed).
    pub fn find_by_summary(
        &self,
        project_key: &str,
        summary: &str,
    ) -> Result<SummaryMatch, SyncError> {
        let jql = format!("project = \"{project_key}\" AND summary ~ \"\\\"{summary}\\\"\"");
        let hits = self.search(&jql)?;
        let wanted = summary.trim().to_lowercase();
        let exact: Vec<&FoundIssue> = hits
            .iter()
            .filter(|i| {
                i.fields
                    .summary
                    .as_deref()
                    .is_some_and(|s| s.trim().to_lowercase() == wanted)
            })
            .collect();
        Ok(match exact.len() {
            0 => SummaryMatch::NotFound,
            1 => SummaryMatch::One(exact[0].key.clone()),
            n => SummaryMatch::Ambiguous(n),
        })
    }

    // --------- Project, users, auxiliary entities ---------

    pub fn get_project(&self, key: &str) -> Result<Project, SyncError> {
        self.get_json(&format!("/rest/api/3/project/{key}"))
            .map_err(|e| match e {
                SyncError::Http { status: 404, .. } => SyncError::ProjectNotFound(key.to_string()),
                other => other,
            })
    }

    /// Resolve an email to an account id, caching misses as well as hits.
    pub fn resolve_user(&mut self, email: &str) -> Result<Option<String>, SyncError> {
        if let Some(cached) = self.user_cache.get(email) {
            return Ok(cached.clone());
        }
        let users: Vec<FoundUser> =
            self.get_json_query("/rest/api/3/user/search", &[("query", email)])?;
        let account = users.into_iter().next().map(|u| u.account_id);
        self.user_cache.insert(email.to_string(), account.clone());
        Ok(account)
    }

    /// Component id for `name`, creating the component if the project does
    /// not have it yet. Existing names are matched case-insensitively, so a
    /// second row naming the same component never issues a second create.
    pub fn get_or_create_component(
        &mut self,
        project_id: &str,
        name: &str,
    ) -> Result<String, SyncError> {
        if !self.component_cache.contains_key(project_id) {
            let listed: Vec<NamedEntity> =
                self.get_json(&format!("/rest/api/3/project/{project_id}/components"))?;
            self.component_cache
                .insert(project_id.to_string(), by_lower_name(listed));
        }
        if let Some(id) = self
            .component_cache
            .get(project_id)
            .and_then(|m| m.get(&name.trim().to_lowercase()))
        {
            return Ok(id.clone());
        }
        let id = self.create_named("/rest/api/3/component", name, project_id)?;
        if let Some(m) = self.component_cache.get_mut(project_id) {
            m.insert(name.trim().to_lowercase(), id.clone());
        }
        Ok(id)
    }

    /// Same contract as get_or_create_component, for fix versions.
    pub fn get_or_create_version(
        &mut self,
        project_id: &str,
        name: &str,
    ) -> Result<String, SyncError> {
        if !self.version_cache.contains_key(project_id) {
            let listed: Vec<NamedEntity> =
                self.get_json(&format!("/rest/api/3/project/{project_id}/versions"))?;
            self.version_cache
                .insert(project_id.to_string(), by_lower_name(listed));
        }
        if let Some(id) = self
            .version_cache
            .get(project_id)
            .and_then(|m| m.get(&name.trim().to_lowercase()))
        {
            return Ok(id.clone());
        }
        let id = self.create_named("/rest/api/3/version", name, project_id)?;
        if let Some(m) = self.version_cache.get_mut(project_id) {
            m.insert(name.trim().to_lowercase(), id.clone());
        }
        Ok(id)
    }

    fn create_named(&self, path: &str, name: &str, project_id: &str) -> Result<String, SyncError> {
        if self.dry_run {
            println!("[dry-run] POST {} :: {name}", self.url(path));
            return Ok(format!("DRY-{}", name.trim().to_lowercase()));
        }
        let created: NamedEntity =
            self.post_json(path, &json!({ "name": name, "projectId": project_id }))?;
        if created.name.trim().to_lowercase() != name.trim().to_lowercase() {
            warn!(sent = name, got = %created.name, "tracker normalized entity name");
        }
        Ok(created.id)
    }
}

fn by_lower_name(entities: Vec<NamedEntity>) -> HashMap<String, String> {
    entities
        .into_iter()
        .map(|e| (e.name.trim().to_lowercase(), e.id))
        .collect()
}

/// Wrap plain text in the tracker's document format. Blank text becomes a
/// single space, which the API accepts where an empty doc is rejected.
pub fn to_adf(text: &str) -> Value {
    let safe = text.trim();
    let safe = if safe.is_empty() { " " } else { safe };
    json!({
        "type": "doc",
        "version": 1,
        "content": [{
            "type": "paragraph",
            "content": [{ "type": "text", "text": safe }],
        }],
    })
}
