//! The search service client (spec §4.3, §6).
//!
//! Same HTTP client shape as [`crate::infrastructure::extract`]: a
//! `ClientWithMiddleware` with bounded exponential-backoff retries,
//! grounded on the teacher's `CloudServices` client.

use crate::error::{classify_http_error, ArchivistError, Result};
use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::time::Duration;

/// Outcome of a `publish` call (spec §4.3).
#[derive(Debug, Clone, PartialEq)]
pub struct PublishResult {
    pub id: String,
    pub version: i64,
}

/// The search document body for an `Item` (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDocument {
    pub path: String,
    pub tags: Vec<String>,
    pub mime_type: String,
    pub encoding: Option<String>,
    pub language: Option<String>,
    pub size: i64,
    pub ctime: i64,
    pub mtime: i64,
    pub meta: Option<Json>,
    pub text: Option<String>,
}

impl SearchDocument {
    /// Builds the document for a catalog row, splitting `path` into
    /// `tags` the way the spec's example output does
    /// (`tags=["","r","x.txt"]` for `/r/x.txt`), and letting
    /// `meta_json.language` override the top-level `language` when
    /// present (spec §4.3).
    pub fn from_item(
        path: &str,
        mime_type: &str,
        encoding: Option<String>,
        language: Option<String>,
        size: i64,
        ctime: i64,
        mtime: i64,
        meta_json: Option<&str>,
        text: Option<String>,
    ) -> Self {
        let tags = path.split('/').map(|s| s.to_string()).collect();
        let meta: Option<Json> = meta_json.and_then(|s| serde_json::from_str(s).ok());

        let language = meta
            .as_ref()
            .and_then(|m| m.get("language"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .or(language);

        Self {
            path: path.to_string(),
            tags,
            mime_type: mime_type.to_string(),
            encoding,
            language,
            size,
            ctime,
            mtime,
            meta,
            text,
        }
    }
}

#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn publish(
        &self,
        index: &str,
        kind: &str,
        id: Option<&str>,
        body: &SearchDocument,
    ) -> Result<PublishResult>;

    /// Returns `true` if a document existed and was removed, `false` if
    /// it was not present (spec §4.3).
    async fn remove(&self, index: &str, kind: &str, id: &str) -> Result<bool>;

    async fn exists(&self, index: &str, kind: &str, id: &str) -> Result<bool>;

    async fn search(&self, index: &str, kind: &str, query: &Json) -> Result<Json>;

    async fn create_index(&self, index: &str) -> Result<()>;

    async fn delete_index(&self, index: &str) -> Result<()>;

    async fn count(&self, index: &str) -> Result<u64>;

    async fn liveness(&self) -> Result<bool>;
}

/// HTTP client for an Elasticsearch-like search service (spec §6 wire
/// contract).
pub struct ElasticSearchClient {
    http: ClientWithMiddleware,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_version")]
    version: i64,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

impl ElasticSearchClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("search HTTP client must build with static configuration");

        let http = ClientBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(
                ExponentialBackoff::builder().build_with_max_retries(3),
            ))
            .build();

        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn doc_url(&self, index: &str, kind: &str, id: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, index, kind, id)
    }
}

#[async_trait]
impl SearchClient for ElasticSearchClient {
    async fn publish(
        &self,
        index: &str,
        kind: &str,
        id: Option<&str>,
        body: &SearchDocument,
    ) -> Result<PublishResult> {
        let response = match id {
            Some(id) => self
                .http
                .put(self.doc_url(index, kind, id))
                .json(body)
                .send()
                .await
                .map_err(|e| classify_http_error(&e))?,
            None => self
                .http
                .post(format!("{}/{}/{}/", self.base_url, index, kind))
                .json(body)
                .send()
                .await
                .map_err(|e| classify_http_error(&e))?,
        };

        if !response.status().is_success() {
            return Err(ArchivistError::PermanentRemote(format!(
                "publish {}/{}: {}",
                index,
                kind,
                response.status()
            )));
        }

        let parsed: PublishResponse = response
            .json()
            .await
            .map_err(|e| ArchivistError::PermanentRemote(e.to_string()))?;

        Ok(PublishResult {
            id: parsed.id,
            version: parsed.version,
        })
    }

    async fn remove(&self, index: &str, kind: &str, id: &str) -> Result<bool> {
        let response = self
            .http
            .delete(self.doc_url(index, kind, id))
            .send()
            .await
            .map_err(|e| classify_http_error(&e))?;

        match response.status().as_u16() {
            200 | 204 => Ok(true),
            404 => Ok(false),
            _ => Err(ArchivistError::PermanentRemote(format!(
                "remove {}/{}/{}: {}",
                index,
                kind,
                id,
                response.status()
            ))),
        }
    }

    async fn exists(&self, index: &str, kind: &str, id: &str) -> Result<bool> {
        let response = self
            .http
            .head(self.doc_url(index, kind, id))
            .send()
            .await
            .map_err(|e| classify_http_error(&e))?;

        match response.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            _ => Err(ArchivistError::PermanentRemote(format!(
                "exists {}/{}/{}: {}",
                index,
                kind,
                id,
                response.status()
            ))),
        }
    }

    async fn search(&self, index: &str, kind: &str, query: &Json) -> Result<Json> {
        let response = self
            .http
            .get(format!("{}/{}/{}/_search", self.base_url, index, kind))
            .json(query)
            .send()
            .await
            .map_err(|e| classify_http_error(&e))?;

        if !response.status().is_success() {
            return Err(ArchivistError::PermanentRemote(format!(
                "search {}/{}: {}",
                index,
                kind,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ArchivistError::PermanentRemote(e.to_string()))
    }

    async fn create_index(&self, index: &str) -> Result<()> {
        let response = self
            .http
            .put(format!("{}/{}/", self.base_url, index))
            .send()
            .await
            .map_err(|e| classify_http_error(&e))?;

        if !response.status().is_success() {
            return Err(ArchivistError::PermanentRemote(format!(
                "create_index {}: {}",
                index,
                response.status()
            )));
        }
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/{}/", self.base_url, index))
            .send()
            .await
            .map_err(|e| classify_http_error(&e))?;

        if !response.status().is_success() && response.status().as_u16() != 404 {
            return Err(ArchivistError::PermanentRemote(format!(
                "delete_index {}: {}",
                index,
                response.status()
            )));
        }
        Ok(())
    }

    async fn count(&self, index: &str) -> Result<u64> {
        let response = self
            .http
            .get(format!("{}/{}/_count", self.base_url, index))
            .send()
            .await
            .map_err(|e| classify_http_error(&e))?;

        if !response.status().is_success() {
            return Err(ArchivistError::PermanentRemote(format!(
                "count {}: {}",
                index,
                response.status()
            )));
        }

        let parsed: CountResponse = response
            .json()
            .await
            .map_err(|e| ArchivistError::PermanentRemote(e.to_string()))?;
        Ok(parsed.count)
    }

    async fn liveness(&self) -> Result<bool> {
        match self.http.get(&self.base_url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_path_into_tags_like_the_spec_example() {
        let doc = SearchDocument::from_item(
            "/r/x.txt",
            "text/plain",
            Some("utf-8".to_string()),
            None,
            100,
            100,
            100,
            None,
            Some("hello".to_string()),
        );
        assert_eq!(doc.tags, vec!["", "r", "x.txt"]);
    }

    #[test]
    fn meta_json_language_overrides_top_level_language() {
        let doc = SearchDocument::from_item(
            "/r/x.txt",
            "text/plain",
            None,
            Some("en".to_string()),
            10,
            1,
            1,
            Some(r#"{"language": "fr"}"#),
            None,
        );
        assert_eq!(doc.language.as_deref(), Some("fr"));
    }

    #[test]
    fn falls_back_to_detected_language_without_meta_override() {
        let doc = SearchDocument::from_item(
            "/r/x.txt", "text/plain", None, Some("en".to_string()), 10, 1, 1, None, None,
        );
        assert_eq!(doc.language.as_deref(), Some("en"));
    }
}
