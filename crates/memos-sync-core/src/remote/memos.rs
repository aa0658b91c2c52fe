//! HTTP client for the Memos REST API.

use std::fmt;
use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;

use crate::config::{Credential, Credentials};
use crate::error::{Error, Result};
use crate::models::{title_from_content, RemoteNote};
use crate::util::compact_text;

use super::{RemoteCapability, RemoteListing, ResourceRef};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const ARCHIVED_ROW_STATUS: &str = "ARCHIVED";

/// `RemoteCapability` over a Memos server.
///
/// Access tokens use the `/api/v1` routes with bearer auth; open IDs use the
/// legacy routes with an `openId` query parameter.
#[derive(Clone)]
pub struct MemosClient {
    client: reqwest::Client,
}

impl MemosClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
        })
    }

    pub async fn list_memos(&self, credentials: &Credentials) -> Result<Vec<RemoteNote>> {
        let body = self.get_text(credentials, &api_path(credentials, "memo")).await?;
        parse_memo_list(&body)
    }

    pub async fn list_resources(&self, credentials: &Credentials) -> Result<Vec<ResourceRef>> {
        let body = self
            .get_text(credentials, &api_path(credentials, "resource"))
            .await?;
        parse_resource_list(&body)
    }

    pub async fn download_resource(
        &self,
        credentials: &Credentials,
        resource: &ResourceRef,
    ) -> Result<Vec<u8>> {
        let request = match resource.external_link.as_deref() {
            Some(link) => self.client.get(link),
            None => self.request(credentials, &resource_path(credentials, resource)),
        };
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Remote(parse_api_error(status, &body)));
        }
        Ok(response.bytes().await?.to_vec())
    }

    fn request(&self, credentials: &Credentials, path: &str) -> RequestBuilder {
        let request = self
            .client
            .get(format!("{}{path}", credentials.base_url))
            .header(reqwest::header::ACCEPT, "application/json");
        match &credentials.credential {
            Credential::AccessToken(token) => request.bearer_auth(token),
            Credential::OpenId(open_id) => request.query(&[("openId", open_id)]),
        }
    }

    async fn get_text(&self, credentials: &Credentials, path: &str) -> Result<String> {
        let response = self.request(credentials, path).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Remote(parse_api_error(status, &body)));
        }
        Ok(body)
    }
}

impl RemoteCapability for MemosClient {
    async fn list(&self, credentials: &Credentials) -> Result<RemoteListing> {
        let notes = self.list_memos(credentials).await?;
        let resources = self.list_resources(credentials).await?;
        Ok(RemoteListing { notes, resources })
    }

    async fn download(&self, credentials: &Credentials, resource: &ResourceRef) -> Result<Vec<u8>> {
        self.download_resource(credentials, resource).await
    }
}

/// Parse a memo list response, wrapped in `{"data": ...}` or bare.
pub fn parse_memo_list(payload: &str) -> Result<Vec<RemoteNote>> {
    let memos: ListPayload<MemoPayload> = serde_json::from_str(payload)?;
    Ok(memos.into_items().into_iter().map(RemoteNote::from).collect())
}

/// Parse a resource list response, wrapped in `{"data": ...}` or bare.
pub fn parse_resource_list(payload: &str) -> Result<Vec<ResourceRef>> {
    let resources: ListPayload<ResourcePayload> = serde_json::from_str(payload)?;
    Ok(resources
        .into_items()
        .into_iter()
        .map(ResourceRef::from)
        .collect())
}

// ---------------------------------------------------------------------------
// Private
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListPayload<T> {
    Wrapped { data: Vec<T> },
    Bare(Vec<T>),
}

impl<T> ListPayload<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RemoteId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RemoteId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(id) => write!(formatter, "{id}"),
            Self::Text(id) => formatter.write_str(id),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemoPayload {
    id: RemoteId,
    #[serde(default)]
    row_status: Option<String>,
    #[serde(default)]
    created_ts: Option<i64>,
    #[serde(default)]
    updated_ts: Option<i64>,
    #[serde(default)]
    content: String,
}

impl From<MemoPayload> for RemoteNote {
    fn from(payload: MemoPayload) -> Self {
        let id = payload.id.to_string();
        let title = title_from_content(&payload.content).unwrap_or_else(|| id.clone());
        Self {
            id,
            title,
            content: payload.content,
            created_at: payload.created_ts,
            updated_at: payload.updated_ts,
            archived: payload
                .row_status
                .is_some_and(|status| status.eq_ignore_ascii_case(ARCHIVED_ROW_STATUS)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourcePayload {
    id: RemoteId,
    filename: String,
    #[serde(default)]
    external_link: Option<String>,
    #[serde(default)]
    memo_id: Option<RemoteId>,
}

impl From<ResourcePayload> for ResourceRef {
    fn from(payload: ResourcePayload) -> Self {
        Self {
            id: payload.id.to_string(),
            filename: payload.filename,
            external_link: payload
                .external_link
                .map(|link| link.trim().to_string())
                .filter(|link| !link.is_empty()),
            memo_id: payload.memo_id.map(|id| id.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn api_path(credentials: &Credentials, resource: &str) -> String {
    match credentials.credential {
        Credential::AccessToken(_) => format!("/api/v1/{resource}"),
        Credential::OpenId(_) => format!("/api/{resource}"),
    }
}

fn resource_path(credentials: &Credentials, resource: &ResourceRef) -> String {
    match credentials.credential {
        Credential::AccessToken(_) => format!("/o/r/{}", resource.id),
        Credential::OpenId(_) => format!(
            "/o/r/{}/{}",
            resource.id,
            urlencoding::encode(&resource.filename)
        ),
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn credentials(credential: Credential) -> Credentials {
        Credentials {
            base_url: "https://memos.example.com".to_string(),
            credential,
        }
    }

    #[test]
    fn parse_memo_list_accepts_bare_arrays() {
        let payload = r##"[
            {"id": 1, "rowStatus": "NORMAL", "createdTs": 10, "updatedTs": 20, "content": "# Title\nbody"},
            {"id": 2, "rowStatus": "ARCHIVED", "createdTs": 30, "updatedTs": 40, "content": "old"}
        ]"##;

        let notes = parse_memo_list(payload).unwrap();
        assert_eq!(
            notes,
            vec![
                RemoteNote {
                    id: "1".to_string(),
                    title: "Title".to_string(),
                    content: "# Title\nbody".to_string(),
                    created_at: Some(10),
                    updated_at: Some(20),
                    archived: false,
                },
                RemoteNote {
                    id: "2".to_string(),
                    title: "old".to_string(),
                    content: "old".to_string(),
                    created_at: Some(30),
                    updated_at: Some(40),
                    archived: true,
                },
            ]
        );
    }

    #[test]
    fn parse_memo_list_accepts_wrapped_payloads_and_missing_fields() {
        let payload = r#"{"data": [{"id": "abc", "content": ""}]}"#;
        let notes = parse_memo_list(payload).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, "abc");
        assert_eq!(notes[0].title, "abc");
        assert_eq!(notes[0].updated_at, None);
        assert!(!notes[0].archived);
    }

    #[test]
    fn parse_memo_list_rejects_garbage() {
        assert!(matches!(
            parse_memo_list("<html>"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn parse_resource_list_normalizes_links() {
        let payload = r#"{"data": [
            {"id": 7, "filename": "sub/pic.png", "externalLink": "", "memoId": 1},
            {"id": 8, "filename": "remote.png", "externalLink": " https://cdn.example.com/x.png "}
        ]}"#;

        let resources = parse_resource_list(payload).unwrap();
        assert_eq!(
            resources,
            vec![
                ResourceRef {
                    id: "7".to_string(),
                    filename: "sub/pic.png".to_string(),
                    external_link: None,
                    memo_id: Some("1".to_string()),
                },
                ResourceRef {
                    id: "8".to_string(),
                    filename: "remote.png".to_string(),
                    external_link: Some("https://cdn.example.com/x.png".to_string()),
                    memo_id: None,
                },
            ]
        );
    }

    #[test]
    fn routes_depend_on_credential_kind() {
        let token = credentials(Credential::AccessToken("t".to_string()));
        let open_id = credentials(Credential::OpenId("o".to_string()));
        let resource = ResourceRef {
            id: "7".to_string(),
            filename: "my pic.png".to_string(),
            external_link: None,
            memo_id: None,
        };

        assert_eq!(api_path(&token, "memo"), "/api/v1/memo");
        assert_eq!(api_path(&open_id, "memo"), "/api/memo");
        assert_eq!(resource_path(&token, &resource), "/o/r/7");
        assert_eq!(resource_path(&open_id, &resource), "/o/r/7/my%20pic.png");
    }

    #[test]
    fn parse_api_error_prefers_message() {
        assert_eq!(
            parse_api_error(StatusCode::UNAUTHORIZED, r#"{"message":" missing token "}"#),
            "missing token (401)"
        );
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, "  "), "HTTP 502");
        assert_eq!(
            parse_api_error(StatusCode::NOT_FOUND, "nope"),
            "nope (404)"
        );
    }
}
