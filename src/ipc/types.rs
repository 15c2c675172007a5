use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::config::Config;
use crate::period::workflow::Session;
use crate::store::{EventStore, HttpEventStore, SqliteEventStore};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The workspace store and an optional remote; the remote wins when set.
#[derive(Default)]
pub struct Stores {
    pub local: Option<SqliteEventStore>,
    pub remote: Option<HttpEventStore>,
}

impl Stores {
    pub fn active(&self) -> Option<&dyn EventStore> {
        if let Some(r) = &self.remote {
            return Some(r as &dyn EventStore);
        }
        self.local.as_ref().map(|l| l as &dyn EventStore)
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        self.active().map(|s| s.backend_name())
    }
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub stores: Stores,
    pub session: Option<Session>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        AppState {
            workspace: None,
            db: None,
            stores: Stores::default(),
            session: None,
            config,
        }
    }
}
