//! Blocking REST client for a remote event-resource API.

use crate::store::{
    Classroom, DesiredEvent, EventQuery, EventStore, EventTypeCatalogEntry, PersistedEvent,
    Roster, Student, StoreError, SyncOutcome, SyncRequest,
};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub struct HttpEventStore {
    base: Url,
    token: Option<String>,
    client: Client,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedCount {
    #[serde(default)]
    created_count: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApprovedCount {
    #[serde(default)]
    approved_count: usize,
}

impl HttpEventStore {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, StoreError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base = Url::parse(trimmed)
            .map_err(|e| StoreError::Invalid(format!("bad base url {}: {}", base_url, e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(StoreError::Invalid(format!(
                "base url must be http(s): {}",
                base_url
            )));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(HttpEventStore {
            base,
            token: token.filter(|t| !t.trim().is_empty()),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    /// Appends path segments to the base url; each segment is escaped, so ids
    /// cannot change the route.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Invalid(format!("base url cannot take a path: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(t) => builder.bearer_auth(t),
            None => builder,
        }
    }

    fn send(&self, builder: RequestBuilder) -> Result<Response, StoreError> {
        let resp = self.authorized(builder).send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &[&str], query: &[(&str, String)]) -> Result<T, StoreError> {
        let url = self.endpoint(path)?;
        debug!(url = %url, "GET");
        let resp = self.send(self.client.get(url).query(query))?;
        Ok(resp.json()?)
    }

    /// POST that tolerates an empty response body.
    fn post_json<T: DeserializeOwned + Default>(
        &self,
        path: &[&str],
        body: &serde_json::Value,
    ) -> Result<T, StoreError> {
        let url = self.endpoint(path)?;
        debug!(url = %url, "POST");
        let resp = self.send(self.client.post(url).json(body))?;
        let text = resp.text()?;
        if text.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&text).map_err(|e| StoreError::Invalid(e.to_string()))
    }
}

fn event_query_params(query: &EventQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("classroomId", query.classroom_id.clone()),
        ("date", query.date.clone()),
    ];
    if let Some(p) = query.period {
        params.push(("period", p.to_string()));
    }
    params
}

impl EventStore for HttpEventStore {
    fn backend_name(&self) -> &'static str {
        "remote"
    }

    fn list_event_types(&self) -> Result<Vec<EventTypeCatalogEntry>, StoreError> {
        self.get_json(&["event-types"], &[])
    }

    fn list_classrooms(&self) -> Result<Vec<Classroom>, StoreError> {
        self.get_json(&["classrooms"], &[])
    }

    fn list_students(&self, classroom_id: &str) -> Result<Vec<Student>, StoreError> {
        self.get_json(&["classrooms", classroom_id, "students"], &[])
    }

    fn my_classroom_roster(&self) -> Result<Roster, StoreError> {
        self.get_json(&["classrooms", "mine", "roster"], &[])
    }

    fn list_events(&self, query: &EventQuery) -> Result<Vec<PersistedEvent>, StoreError> {
        self.get_json(&["events"], &event_query_params(query))
    }

    fn bulk_create_events(&self, events: &[DesiredEvent]) -> Result<usize, StoreError> {
        let body = json!({ "events": events });
        let resp: CreatedCount = self.post_json(&["events", "bulk-create"], &body)?;
        Ok(resp.created_count)
    }

    fn bulk_sync_events(&self, request: &SyncRequest) -> Result<SyncOutcome, StoreError> {
        let body = serde_json::to_value(request).map_err(|e| StoreError::Invalid(e.to_string()))?;
        self.post_json(&["events", "bulk-sync"], &body)
    }

    fn delete_event(&self, id: &str) -> Result<(), StoreError> {
        debug!(id, "DELETE");
        self.send(self.client.delete(self.endpoint(&["events", id])?))?;
        Ok(())
    }

    fn bulk_approve_events(&self, query: &EventQuery) -> Result<usize, StoreError> {
        let body = serde_json::to_value(query).map_err(|e| StoreError::Invalid(e.to_string()))?;
        let resp: ApprovedCount = self.post_json(&["events", "bulk-approve"], &body)?;
        Ok(resp.approved_count)
    }
}
