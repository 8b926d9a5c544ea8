use std::{
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures raised while driving a page session.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("page {url} has no usable viewport height")]
    DegenerateViewport { url: String },
    #[error("could not write capture to {path:?}: {reason}")]
    CaptureWrite { path: PathBuf, reason: String },
    #[error("link_extraction: {0}")]
    LinkExtraction(String),
    #[error("browser: {0}")]
    Browser(String),
}

impl CaptureError {
    pub fn navigation(url: &str, reason: impl Display) -> CaptureError {
        CaptureError::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn capture_write(path: &Path, reason: impl Display) -> CaptureError {
        CaptureError::CaptureWrite {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Errors that stop a crawl before it produces a result.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("invalid seed address {url}: {reason}")]
    InvalidSeed { url: String, reason: String },
    #[error("output directory {path:?} unavailable: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("browser: {0}")]
    Browser(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureRole {
    Seed,
    Linked,
}

impl CaptureRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureRole::Seed => "seed",
            CaptureRole::Linked => "linked",
        }
    }
}

impl Display for CaptureRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CaptureRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seed" => Ok(CaptureRole::Seed),
            "linked" => Ok(CaptureRole::Linked),
            other => Err(format!("unknown capture role {}", other)),
        }
    }
}

/// One saved viewport slice and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub capture_id: String,
    pub crawl_id: String,
    pub source_url: String,
    pub role: CaptureRole,
    pub sequence: u32,
    pub artifact_path: PathBuf,
    pub captured_at: DateTime<Utc>,
}

impl CaptureRecord {
    /// File stem of the artifact, used as its identifier in the index.
    pub fn artifact_name(&self) -> String {
        match self.artifact_path.file_stem() {
            Some(stem) => stem.to_string_lossy().to_string(),
            None => format!(
                "{}_{}_{}{}",
                self.crawl_id, self.capture_id, self.role, self.sequence
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CrawlStatus {
    Done,
    Failed { reason: String },
    TimedOut,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedLink {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub crawl_id: String,
    pub seed_url: String,
    pub captures: Vec<CaptureRecord>,
    pub scrapable: bool,
    pub status: CrawlStatus,
    pub skipped: Vec<SkippedLink>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CrawlResult {
    pub fn new(crawl_id: &str, seed_url: &str) -> Self {
        CrawlResult {
            crawl_id: crawl_id.into(),
            seed_url: seed_url.into(),
            captures: vec![],
            scrapable: false,
            status: CrawlStatus::Done,
            skipped: vec![],
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Appends every slice of one page at once so a result never holds half a page.
    pub fn push_page(&mut self, records: Vec<CaptureRecord>) {
        self.captures.extend(records);
        self.scrapable = !self.captures.is_empty();
    }

    pub fn finalize(mut self, status: CrawlStatus) -> Self {
        if let CrawlStatus::Failed { .. } = status {
            self.captures.clear();
        }
        self.scrapable = !self.captures.is_empty();
        self.status = status;
        self.finished_at = Some(Utc::now());
        self
    }

    /// Distinct source addresses captured with the given role, in capture order.
    pub fn pages(&self, role: CaptureRole) -> Vec<&str> {
        let mut pages: Vec<&str> = vec![];
        for c in self.captures.iter().filter(|c| c.role == role) {
            if !pages.contains(&c.source_url.as_str()) {
                pages.push(&c.source_url);
            }
        }
        pages
    }
}
