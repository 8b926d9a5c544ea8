//! File backed index of finished crawls.
//!
//! Every crawl is kept as a summary plus its capture records. The index answers
//! the lookups callers need once a crawl is done: captures of a crawl, metadata of
//! a single artifact or crawl, and captures by source address or by role.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;

use crate::{
    types::{CaptureRecord, CaptureRole, CrawlResult, CrawlStatus},
    utils::normalize_url,
};

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("crawl {0} not found")]
    CrawlNotFound(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub crawl_id: String,
    pub seed_url: String,
    pub scrapable: bool,
    pub status: CrawlStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexedCrawl {
    summary: CrawlSummary,
    captures: Vec<CaptureRecord>,
}

/// What an identifier resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact<'a> {
    Crawl(&'a CrawlSummary),
    Capture(&'a CaptureRecord),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    crawls: Vec<IndexedCrawl>,
}

#[derive(Debug)]
pub struct CaptureIndex {
    path: PathBuf,
    data: IndexFile,
}

impl CaptureIndex {
    /// Opens the index at `path`; a missing file is an empty index.
    pub async fn load(path: PathBuf) -> Result<Self, IndexError> {
        let data = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no index at {:?}, starting empty", path);
                IndexFile::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(CaptureIndex { path, data })
    }

    pub async fn save(&self) -> Result<(), IndexError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(&self.data)?;
        // write then rename so a crash never leaves a truncated index
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &self.path).await?;
        debug!("index saved to {:?}", self.path);
        Ok(())
    }

    /// Stores a finished crawl, replacing any earlier entry with the same id.
    pub fn record(&mut self, result: &CrawlResult) {
        let entry = IndexedCrawl {
            summary: CrawlSummary {
                crawl_id: result.crawl_id.clone(),
                seed_url: result.seed_url.clone(),
                scrapable: result.scrapable,
                status: result.status.clone(),
                started_at: result.started_at,
                finished_at: result.finished_at,
            },
            captures: result.captures.clone(),
        };
        self.data
            .crawls
            .retain(|c| c.summary.crawl_id != result.crawl_id);
        self.data.crawls.push(entry);
        info!(
            "indexed crawl {} with {} captures",
            result.crawl_id,
            result.captures.len()
        );
    }

    pub fn crawl(&self, crawl_id: &str) -> Option<&CrawlSummary> {
        self.find(crawl_id).map(|c| &c.summary)
    }

    /// Artifact names of a crawl in capture order.
    pub fn captures_for_crawl(&self, crawl_id: &str) -> Result<Vec<String>, IndexError> {
        match self.find(crawl_id) {
            Some(c) => Ok(c.captures.iter().map(|r| r.artifact_name()).collect()),
            None => Err(IndexError::CrawlNotFound(crawl_id.into())),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Artifact<'_>> {
        if let Some(c) = self.find(name) {
            return Some(Artifact::Crawl(&c.summary));
        }
        self.records()
            .find(|r| r.artifact_name() == name)
            .map(Artifact::Capture)
    }

    pub fn captures_for_url(&self, url: &str) -> Vec<&CaptureRecord> {
        let url = normalize_url(url);
        self.records().filter(|r| r.source_url == url).collect()
    }

    pub fn captures_for_role(&self, role: CaptureRole) -> Vec<&CaptureRecord> {
        self.records().filter(|r| r.role == role).collect()
    }

    fn find(&self, crawl_id: &str) -> Option<&IndexedCrawl> {
        self.data
            .crawls
            .iter()
            .find(|c| c.summary.crawl_id == crawl_id)
    }

    fn records(&self) -> impl Iterator<Item = &CaptureRecord> {
        self.data.crawls.iter().flat_map(|c| c.captures.iter())
    }
}
