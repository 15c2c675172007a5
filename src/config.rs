use crate::db;
use crate::period::materialize::DEFAULT_CLASS_RULES_CATEGORY;
use crate::period::resolver::CategoryMapping;
use crate::period::transform::ScoringTable;
use crate::period::workflow::SessionSettings;
use crate::period::catalog::PointColumn;
use anyhow::Context;
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::time::Duration;

pub const MAPPING_KEY: &str = "mapping.categories";
pub const SCORING_KEY: &str = "scoring.overrides";
pub const CLASS_RULES_KEY: &str = "classRules.category";

const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Process-level settings read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_filter: String,
    pub remote_url: Option<String>,
    pub remote_token: Option<String>,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            remote_url: None,
            remote_token: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Config {
        Config::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Config {
        let non_blank = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let http_timeout = non_blank("PERIODD_HTTP_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));
        Config {
            log_filter: non_blank("PERIODD_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            remote_url: non_blank("PERIODD_REMOTE_URL"),
            remote_token: non_blank("PERIODD_REMOTE_TOKEN"),
            http_timeout,
        }
    }
}

pub fn load_mapping(conn: &Connection) -> anyhow::Result<CategoryMapping> {
    match db::settings_get_json(conn, MAPPING_KEY)? {
        Some(v) => serde_json::from_value(v).context("stored category mapping is malformed"),
        None => Ok(CategoryMapping::new()),
    }
}

pub fn save_mapping(conn: &Connection, mapping: &CategoryMapping) -> anyhow::Result<()> {
    db::settings_set_json(conn, MAPPING_KEY, &serde_json::to_value(mapping)?)
}

pub fn load_scoring_overrides(conn: &Connection) -> anyhow::Result<BTreeMap<PointColumn, i32>> {
    match db::settings_get_json(conn, SCORING_KEY)? {
        Some(v) => serde_json::from_value(v).context("stored scoring overrides are malformed"),
        None => Ok(BTreeMap::new()),
    }
}

pub fn save_scoring_overrides(
    conn: &Connection,
    overrides: &BTreeMap<PointColumn, i32>,
) -> anyhow::Result<()> {
    db::settings_set_json(conn, SCORING_KEY, &serde_json::to_value(overrides)?)
}

pub fn class_rules_category(conn: &Connection) -> anyhow::Result<String> {
    let stored = db::settings_get_json(conn, CLASS_RULES_KEY)?;
    Ok(stored
        .as_ref()
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_CLASS_RULES_CATEGORY)
        .to_string())
}

/// Session settings for the selected workspace; built-in defaults without one.
pub fn session_settings(conn: Option<&Connection>) -> anyhow::Result<SessionSettings> {
    let Some(conn) = conn else {
        return Ok(SessionSettings::default());
    };
    Ok(SessionSettings {
        mapping: load_mapping(conn)?,
        scoring: ScoringTable::with_overrides(&load_scoring_overrides(conn)?),
        class_rules_category: class_rules_category(conn)?,
    })
}
