#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use pagesnap::{
    browser_controller::{PageSession, SessionFactory},
    types::CaptureError,
    utils::normalize_url,
};

pub const SEED: &str = "https://example.com";

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub total: u64,
    pub viewport: u64,
    pub links: Vec<String>,
    pub fail_open: bool,
    pub fail_capture: bool,
    pub fail_links: bool,
    pub hang: bool,
    // raised once this page finishes loading
    pub terminate_on_open: Option<Arc<AtomicBool>>,
}

impl FakePage {
    pub fn sized(total: u64, viewport: u64) -> Self {
        FakePage {
            total,
            viewport,
            ..Default::default()
        }
    }

    pub fn linking(mut self, links: &[&str]) -> Self {
        self.links = links.iter().map(|l| l.to_string()).collect();
        self
    }
}

/// Everything the scripted browser was asked to do.
#[derive(Debug, Default)]
pub struct SessionLog {
    pub acquired: usize,
    pub closed: usize,
    pub opened: Vec<String>,
    pub captures: Vec<PathBuf>,
    pub scrolls: Vec<u64>,
}

#[derive(Clone, Default)]
pub struct FakeBrowser {
    pages: HashMap<String, FakePage>,
    pub log: Arc<Mutex<SessionLog>>,
    fail_launch: bool,
}

impl FakeBrowser {
    pub fn new() -> Self {
        FakeBrowser::default()
    }

    pub fn failing_launch() -> Self {
        FakeBrowser {
            fail_launch: true,
            ..Default::default()
        }
    }

    pub fn page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(normalize_url(url), page);
        self
    }

    pub fn opened(&self) -> Vec<String> {
        self.log.lock().unwrap().opened.clone()
    }

    pub fn closed(&self) -> usize {
        self.log.lock().unwrap().closed
    }

    pub fn captures(&self) -> Vec<PathBuf> {
        self.log.lock().unwrap().captures.clone()
    }

    pub fn scrolls(&self) -> Vec<u64> {
        self.log.lock().unwrap().scrolls.clone()
    }
}

pub struct FakeSession {
    pages: HashMap<String, FakePage>,
    current: Option<FakePage>,
    log: Arc<Mutex<SessionLog>>,
}

impl FakeSession {
    fn page(&self) -> Result<&FakePage, CaptureError> {
        self.current
            .as_ref()
            .ok_or_else(|| CaptureError::navigation("about:blank", "nothing loaded"))
    }
}

#[async_trait]
impl SessionFactory for FakeBrowser {
    type Session = FakeSession;

    async fn acquire(&self) -> Result<FakeSession, CaptureError> {
        if self.fail_launch {
            return Err(CaptureError::Browser("no chrome here".into()));
        }
        self.log.lock().unwrap().acquired += 1;
        Ok(FakeSession {
            pages: self.pages.clone(),
            current: None,
            log: self.log.clone(),
        })
    }
}

#[async_trait]
impl PageSession for FakeSession {
    async fn open(&mut self, address: &str) -> Result<(), CaptureError> {
        self.log.lock().unwrap().opened.push(normalize_url(address));
        self.current = None;
        let page = match self.pages.get(&normalize_url(address)) {
            Some(p) if !p.fail_open => p.clone(),
            _ => return Err(CaptureError::navigation(address, "net::ERR_NAME_NOT_RESOLVED")),
        };
        if page.hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if let Some(flag) = &page.terminate_on_open {
            flag.store(true, Ordering::Relaxed);
        }
        self.current = Some(page);
        Ok(())
    }

    async fn total_height(&mut self) -> Result<u64, CaptureError> {
        Ok(self.page()?.total)
    }

    async fn viewport_height(&mut self) -> Result<u64, CaptureError> {
        Ok(self.page()?.viewport)
    }

    async fn scroll_by(&mut self, delta: u64) -> Result<(), CaptureError> {
        self.log.lock().unwrap().scrolls.push(delta);
        Ok(())
    }

    async fn capture_to(&mut self, path: &Path) -> Result<(), CaptureError> {
        if self.page()?.fail_capture {
            return Err(CaptureError::capture_write(path, "disk full"));
        }
        self.log.lock().unwrap().captures.push(path.to_path_buf());
        Ok(())
    }

    async fn extract_links(&mut self) -> Result<Vec<String>, CaptureError> {
        let page = self.page()?;
        if page.fail_links {
            return Err(CaptureError::LinkExtraction("evaluate not supported".into()));
        }
        Ok(page.links.clone())
    }

    async fn close(&mut self) {
        self.log.lock().unwrap().closed += 1;
    }
}
