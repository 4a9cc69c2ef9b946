use std::time::Duration;

use crate::error::SyncError;

const DEFAULT_EPIC_LINK_FIELD: &str = "customfield_10014";

/// Credentials and field ids, resolved once at startup and passed by
/// reference to every stage.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub user: String,
    pub token: String,
    /// Custom field id for start date (e.g. customfield_12345), if the site
    /// has one. Omitted from payloads when unset.
    pub start_date_field: Option<String>,
    /// Custom field id used for epic links on older Cloud sites.
    pub epic_link_field: String,
    /// Pause between consecutive API calls.
    pub throttle: Duration,
}

impl Config {
    pub fn resolve(
        jira_url: Option<String>,
        jira_user: Option<String>,
        jira_token: Option<String>,
        start_date_field: Option<String>,
        sleep: f64,
    ) -> Result<Config, SyncError> {
        // The legacy importer script read JIRA_API_TOKEN; accept it as a
        // fallback so either environment keeps working.
        let token = jira_token.or_else(|| std::env::var("JIRA_API_TOKEN").ok());

        // Same treatment for the start-date field, which the legacy updater
        // also read from START_DATE_FIELD.
        let start_date_field = start_date_field
            .or_else(|| std::env::var("START_DATE_FIELD").ok())
            .filter(|s| !s.is_empty());

        let mut missing = Vec::new();
        if jira_url.is_none() {
            missing.push("JIRA_URL");
        }
        if jira_user.is_none() {
            missing.push("JIRA_USER");
        }
        if token.is_none() {
            missing.push("JIRA_TOKEN");
        }
        if !missing.is_empty() {
            return Err(SyncError::MissingEnv(missing));
        }

        let base_url = jira_url.unwrap_or_default();
        Ok(Config {
            base_url: base_url.trim_end_matches('/').to_string(),
            user: jira_user.unwrap_or_default(),
            token: token.unwrap_or_default(),
            start_date_field,
            epic_link_field: std::env::var("EPIC_LINK_FIELD")
                .unwrap_or_else(|_| DEFAULT_EPIC_LINK_FIELD.to_string()),
            throttle: Duration::from_secs_f64(sleep.max(0.0)),
        })
    }
}
