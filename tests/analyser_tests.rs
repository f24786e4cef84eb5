//! Analyser behavior against a fake [`ExtractionClient`], covering spec
//! §8's "Ownership" and "Progress" properties and the extractor-outage
//! scenario (§2 scenario 5).

use archivist::config::DatabaseConfig;
use archivist::domain::ItemState;
use archivist::error::{ArchivistError, Result};
use archivist::infrastructure::database::Database;
use archivist::infrastructure::extract::{ExtractionClient, ExtractionResult};
use archivist::operations::catalog::{Catalog, UpsertRow};
use archivist::operations::analyser;
use async_trait::async_trait;
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

async fn test_db() -> Database {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        connect_timeout_secs: 8,
    };
    let db = Database::connect(&config).await.unwrap();
    db.migrate().await.unwrap();
    db
}

async fn seed_need_analysis(db: &Database, path: &str) {
    Catalog::new(db.conn())
        .bulk_upsert(&[UpsertRow {
            path: path.to_string(),
            state: ItemState::NeedAnalysis,
            mime_type: "application/octet-stream".to_string(),
            encoding: None,
            item_ctime: 1,
            item_mtime: 1,
            size: 10,
            os_stat: json!({}),
        }])
        .await
        .unwrap();
}

struct AlwaysSucceeds {
    calls: Arc<AtomicU64>,
}

#[async_trait]
impl ExtractionClient for AlwaysSucceeds {
    async fn extract(&self, _path: &Path) -> Result<ExtractionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ExtractionResult {
            mime_type: "text/plain".to_string(),
            language: Some("en".to_string()),
            meta_json: Some("{\"k\": \"v\\u0000\"}".to_string()),
            meta_xmp: None,
            data_text: Some("content".to_string()),
            data_html_head: None,
            data_html_body: None,
        })
    }

    async fn liveness(&self) -> Result<bool> {
        Ok(true)
    }
}

struct AlwaysFails;

#[async_trait]
impl ExtractionClient for AlwaysFails {
    async fn extract(&self, _path: &Path) -> Result<ExtractionResult> {
        Err(ArchivistError::TransientRemote("extractor down".to_string()))
    }

    async fn liveness(&self) -> Result<bool> {
        Ok(false)
    }
}

#[tokio::test]
async fn successful_extraction_advances_to_need_indexing_and_scrubs_nul() {
    let db = test_db().await;
    seed_need_analysis(&db, "/r/x.txt").await;

    let extraction = AlwaysSucceeds {
        calls: Arc::new(AtomicU64::new(0)),
    };
    let summary = analyser::run(db.conn(), &extraction, 50).await.unwrap();

    assert_eq!(summary.analysed, 1);
    assert_eq!(summary.failed, 0);

    let row = Catalog::new(db.conn()).get("/r/x.txt").await.unwrap().unwrap();
    assert_eq!(row.state, ItemState::NeedIndexing.to_string());
    assert!(!row.meta_json.unwrap().contains("\\u0000"));
}

#[tokio::test]
async fn extractor_outage_returns_row_to_need_analysis() {
    let db = test_db().await;
    seed_need_analysis(&db, "/r/y.txt").await;

    let summary = analyser::run(db.conn(), &AlwaysFails, 50).await.unwrap();
    assert_eq!(summary.analysed, 0);
    assert_eq!(summary.failed, 1);

    let row = Catalog::new(db.conn()).get("/r/y.txt").await.unwrap().unwrap();
    assert_eq!(row.state, ItemState::NeedAnalysis.to_string());
}

#[tokio::test]
async fn a_row_not_in_need_analysis_is_never_claimed() {
    let db = test_db().await;
    // Seed directly as already analysed; the Analyser must not touch it.
    Catalog::new(db.conn())
        .bulk_upsert(&[UpsertRow {
            path: "/r/z.txt".to_string(),
            state: ItemState::Indexed,
            mime_type: "text/plain".to_string(),
            encoding: None,
            item_ctime: 1,
            item_mtime: 1,
            size: 1,
            os_stat: json!({}),
        }])
        .await
        .unwrap();

    let extraction = AlwaysSucceeds {
        calls: Arc::new(AtomicU64::new(0)),
    };
    let summary = analyser::run(db.conn(), &extraction, 50).await.unwrap();
    assert_eq!(summary.analysed, 0);

    let row = Catalog::new(db.conn()).get("/r/z.txt").await.unwrap().unwrap();
    assert_eq!(row.state, ItemState::Indexed.to_string());
}
