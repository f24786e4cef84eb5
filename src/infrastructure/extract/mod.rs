//! The extraction service client (spec §4.2, §6).
//!
//! Grounded on the teacher's `CloudServices` HTTP client
//! (`core/crates/cloud-services/src/client.rs`): a `ClientWithMiddleware`
//! built once at startup, wrapped in a bounded exponential-backoff retry
//! policy (spec §9 design note on HTTP retries), shared read-only across
//! workers.

use crate::error::{classify_http_error, ArchivistError, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_DISPOSITION};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::path::Path;
use std::time::Duration;

/// The composed result of the extraction service's orthogonal probes
/// over one file (spec §4.2).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    pub mime_type: String,
    pub language: Option<String>,
    pub meta_json: Option<String>,
    pub meta_xmp: Option<String>,
    pub data_text: Option<String>,
    pub data_html_head: Option<String>,
    pub data_html_body: Option<String>,
}

#[async_trait]
pub trait ExtractionClient: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<ExtractionResult>;
    async fn liveness(&self) -> Result<bool>;
}

/// HTTP client for a Tika-like extraction service (spec §6 wire
/// contract).
pub struct TikaExtractionClient {
    http: ClientWithMiddleware,
    base_url: String,
}

impl TikaExtractionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("extraction HTTP client must build with static configuration");

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

    fn content_disposition(path: &Path) -> String {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file");
        format!("attachment; filename={}", filename)
    }

    async fn put_file(&self, segment: &str, accept: &str, path: &Path) -> Result<reqwest::Response> {
        let body = tokio::fs::read(path)
            .await
            .map_err(|e| ArchivistError::filesystem(path.display().to_string(), e))?;

        let response = self
            .http
            .put(format!("{}{}", self.base_url, segment))
            .header(ACCEPT, accept)
            .header(CONTENT_DISPOSITION, Self::content_disposition(path))
            .body(body)
            .send()
            .await
            .map_err(|e| classify_http_error(&e))?;

        if !response.status().is_success() {
            return Err(if response.status().is_server_error() {
                ArchivistError::TransientRemote(format!(
                    "{} {}",
                    segment,
                    response.status()
                ))
            } else {
                ArchivistError::PermanentRemote(format!(
                    "{} {}",
                    segment,
                    response.status()
                ))
            });
        }

        Ok(response)
    }

    async fn detect_mime(&self, path: &Path) -> Result<String> {
        let response = self.put_file("/detect/stream", "*/*", path).await?;
        let text = response
            .text()
            .await
            .map_err(|e| ArchivistError::PermanentRemote(e.to_string()))?;
        Ok(text.trim().to_lowercase())
    }

    async fn detect_language(&self, path: &Path) -> Result<Option<String>> {
        let response = self.put_file("/language/stream", "text/plain", path).await?;
        let text = response
            .text()
            .await
            .map_err(|e| ArchivistError::PermanentRemote(e.to_string()))?;
        let lang = text.trim();
        Ok(if lang.is_empty() {
            None
        } else {
            Some(lang.to_string())
        })
    }

    async fn fetch_meta(&self, path: &Path) -> Result<Option<String>> {
        let response = self
            .put_file("/meta", "application/json", path)
            .await?;
        let text = response
            .text()
            .await
            .map_err(|e| ArchivistError::PermanentRemote(e.to_string()))?;
        Ok(if text.trim().is_empty() {
            None
        } else {
            Some(scrub_nul(&text))
        })
    }

    /// Same `/meta` endpoint as [`Self::fetch_meta`], requested as RDF/XMP
    /// instead of JSON (spec §6: "Accept: application/json or
    /// application/rdf+xml").
    async fn fetch_meta_xmp(&self, path: &Path) -> Result<Option<String>> {
        let response = self
            .put_file("/meta", "application/rdf+xml", path)
            .await?;
        let text = response
            .text()
            .await
            .map_err(|e| ArchivistError::PermanentRemote(e.to_string()))?;
        Ok(if text.trim().is_empty() {
            None
        } else {
            Some(text)
        })
    }

    async fn fetch_text(&self, path: &Path) -> Result<Option<String>> {
        let response = self.put_file("/tika", "text/plain", path).await?;
        let text = response
            .text()
            .await
            .map_err(|e| ArchivistError::PermanentRemote(e.to_string()))?;
        Ok(if text.trim().is_empty() {
            None
        } else {
            Some(text)
        })
    }

    /// `<head>`/`<body>` extraction from the service's rendered HTML
    /// (spec §6: "HTML responses are parsed; `<head>` and `<body>` are
    /// extracted as UTF-8 strings").
    async fn fetch_html(&self, path: &Path) -> Result<(Option<String>, Option<String>)> {
        let response = self.put_file("/tika", "text/html", path).await?;
        let html = response
            .text()
            .await
            .map_err(|e| ArchivistError::PermanentRemote(e.to_string()))?;

        if html.trim().is_empty() {
            return Ok((None, None));
        }

        let document = scraper::Html::parse_document(&html);
        let head_selector = scraper::Selector::parse("head").expect("static selector");
        let body_selector = scraper::Selector::parse("body").expect("static selector");

        let head = document
            .select(&head_selector)
            .next()
            .map(|el| el.html());
        let body = document
            .select(&body_selector)
            .next()
            .map(|el| el.html());

        Ok((head, body))
    }
}

#[async_trait]
impl ExtractionClient for TikaExtractionClient {
    async fn extract(&self, path: &Path) -> Result<ExtractionResult> {
        let mime_type = self.detect_mime(path).await?;
        let language = self.detect_language(path).await?;
        let meta_json = self.fetch_meta(path).await?;
        let meta_xmp = self.fetch_meta_xmp(path).await?;
        let data_text = self.fetch_text(path).await?;
        let (data_html_head, data_html_body) = self.fetch_html(path).await?;

        Ok(ExtractionResult {
            mime_type,
            language,
            meta_json,
            meta_xmp,
            data_text,
            data_html_head,
            data_html_body,
        })
    }

    async fn liveness(&self) -> Result<bool> {
        match self
            .http
            .get(format!("{}/version", self.base_url))
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

/// Strips every NUL-like representation from `input` (spec §4.2, §8
/// "NUL scrubbing"): the literal byte `\0`, the escaped form `\x00`
/// written out as text, the Unicode escape (backslash-u-0000), and its
/// double-escaped form `\\u0000` as can appear in a JSON string that
/// was serialised twice.
pub fn scrub_nul(input: &str) -> String {
    let mut out = input.replace('\0', "");
    loop {
        let scrubbed = out
            .replace("\\u0000", "")
            .replace("\\x00", "")
            .replace("\\\\u0000", "");
        if scrubbed == out {
            break;
        }
        out = scrubbed;
    }
    out
}
