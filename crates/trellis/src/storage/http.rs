//! REST issue-store client.
//!
//! Talks to the issue API (see `trellis-server` for the reference routes):
//!
//! - `GET {base}/issues/{id}`
//! - `GET {base}/issues/key/{key}`
//! - `GET {base}/issues?projectId=&epicLink=&epicKey=&parentId=`
//! - `GET {base}/projects/{id}`
//!
//! A 404 on a single-record lookup maps to `StoreError::NotFound`. The
//! listing endpoint answers an empty array when nothing matches, so a 404
//! there is a `StoreError::Status` like any other unexpected status.
//! Every other failure is reported as transport, status or decode error.

use crate::domain::{Issue, IssueFilter, Project};
use crate::storage::{IssueStore, StoreError};
use crate::type_hierarchy::ConfigError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Header carrying the acting user, when known.
pub const USER_HEADER: &str = "x-trellis-user";

/// Caller identity passed explicitly to the HTTP store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<String>,
    pub token: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        match &self.user {
            Some(user) => request.header(USER_HEADER, user),
            None => request,
        }
    }
}

/// Issue store backed by the REST API.
#[derive(Clone)]
pub struct HttpIssueStore {
    client: Client,
    base_url: Url,
    session: Session,
}

impl HttpIssueStore {
    /// Build a client for `base_url` (e.g. `http://localhost:3000/api`).
    pub fn new(base_url: &str, session: Session, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ConfigError::InvalidApiUrl(base_url.to_string()))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        not_found: impl FnOnce() -> StoreError,
    ) -> Result<T, StoreError> {
        let response = self
            .session
            .authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        debug!(url = %response.url(), %status, "issue store response");

        if status == StatusCode::NOT_FOUND {
            return Err(not_found());
        }
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

#[async_trait]
impl IssueStore for HttpIssueStore {
    async fn get_issue_by_id(&self, id: &str) -> Result<Issue, StoreError> {
        let url = self.endpoint(&["issues", id]);
        self.fetch(self.client.get(url), || StoreError::issue_not_found(id))
            .await
    }

    async fn get_issue_by_key(&self, key: &str) -> Result<Issue, StoreError> {
        let url = self.endpoint(&["issues", "key", key]);
        self.fetch(self.client.get(url), || StoreError::issue_not_found(key))
            .await
    }

    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>, StoreError> {
        let url = self.endpoint(&["issues"]);
        let missing = url.to_string();
        let request = self.client.get(url).query(filter);
        self.fetch(request, || StoreError::Status {
            status: StatusCode::NOT_FOUND.as_u16(),
            url: missing,
        })
        .await
    }

    async fn get_project(&self, id: &str) -> Result<Project, StoreError> {
        let url = self.endpoint(&["projects", id]);
        self.fetch(self.client.get(url), || StoreError::project_not_found(id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(base: &str) -> HttpIssueStore {
        HttpIssueStore::new(base, Session::anonymous(), Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_endpoint_appends_segments() {
        let store = store("http://localhost:3000/api");
        assert_eq!(
            store.endpoint(&["issues", "key", "POW-1"]).as_str(),
            "http://localhost:3000/api/issues/key/POW-1"
        );
    }

    #[test]
    fn test_endpoint_tolerates_trailing_slash_and_encodes_ids() {
        let store = store("http://localhost:3000/api/");
        assert_eq!(
            store.endpoint(&["issues", "a b/c"]).as_str(),
            "http://localhost:3000/api/issues/a%20b%2Fc"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        for base in ["not a url", "mailto:x@y.z"] {
            let err = HttpIssueStore::new(base, Session::anonymous(), Duration::from_secs(1))
                .err()
                .unwrap();
            assert_eq!(
                err.downcast_ref::<ConfigError>(),
                Some(&ConfigError::InvalidApiUrl(base.to_string()))
            );
        }
    }

    #[test]
    fn test_session_builders() {
        let session = Session::anonymous().with_token("t0k").with_user("alice");
        assert_eq!(session.token.as_deref(), Some("t0k"));
        assert_eq!(session.user.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        // Port 9 (discard) is closed on test machines; connection is refused.
        let store = store("http://127.0.0.1:9/api");
        let err = store.get_issue_by_id("issue-1").await.unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
    }
}
