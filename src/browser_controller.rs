use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::Tab;
use headless_chrome::{browser::default_executable, Browser, LaunchOptions};
use serde_json::Value;
use sysinfo::{Pid, PidExt, ProcessExt, System, SystemExt};
use tokio::fs;

use crate::types::CaptureError;

const TOTAL_HEIGHT_JS: &str = "document.body ? document.body.scrollHeight : 0";
const VIEWPORT_HEIGHT_JS: &str = "window.innerHeight";
// svg anchors expose `href` as an SVGAnimatedString, keep plain strings only
const LINKS_JS: &str = "JSON.stringify(Array.from(document.querySelectorAll('a[href]'), (a) => a.href)\
     .filter((h) => typeof h === 'string'))";
const ERROR_PAGE_PREFIX: &str = "chrome-error://";

/// Decodes the JSON anchor list, dropping entries that are not strings.
pub fn parse_anchor_list(raw: &str) -> Result<Vec<String>, CaptureError> {
    let values = serde_json::from_str::<Vec<Value>>(raw)
        .map_err(|e| CaptureError::LinkExtraction(e.to_string()))?;
    Ok(values
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect())
}

/// One live tab. Geometry and capture calls refer to the last address opened.
#[async_trait]
pub trait PageSession: Send {
    async fn open(&mut self, address: &str) -> Result<(), CaptureError>;
    async fn total_height(&mut self) -> Result<u64, CaptureError>;
    async fn viewport_height(&mut self) -> Result<u64, CaptureError>;
    async fn scroll_by(&mut self, delta: u64) -> Result<(), CaptureError>;
    async fn capture_to(&mut self, path: &Path) -> Result<(), CaptureError>;
    /// Absolute anchor targets in DOM order.
    async fn extract_links(&mut self) -> Result<Vec<String>, CaptureError>;
    async fn close(&mut self);
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: PageSession;

    async fn acquire(&self) -> Result<Self::Session, CaptureError>;
}

#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    pub timeout: Duration,
    pub window_size: (u32, u32),
}

impl ChromeLauncher {
    pub fn new(timeout: Duration, window_size: (u32, u32)) -> Self {
        ChromeLauncher {
            timeout,
            window_size,
        }
    }
}

#[async_trait]
impl SessionFactory for ChromeLauncher {
    type Session = ChromeSession;

    async fn acquire(&self) -> Result<ChromeSession, CaptureError> {
        ChromeSession::launch(self.timeout, self.window_size)
    }
}

pub struct ChromeSession {
    browser: Option<Browser>,
    tab: Arc<Tab>,
    current: String,
}

impl ChromeSession {
    pub fn launch(timeout: Duration, window_size: (u32, u32)) -> Result<Self, CaptureError> {
        let is_docker = std::env::var("IN_DOCKER").is_ok();
        let path = default_executable().map_err(CaptureError::Browser)?;
        let options = LaunchOptions::default_builder()
            .path(Some(path))
            .window_size(Some(window_size))
            .idle_browser_timeout(timeout)
            // warning only do this if in docker env
            .sandbox(!is_docker)
            .build()
            .map_err(|e| CaptureError::Browser(e.to_string()))?;
        let browser = Browser::new(options)
            .map_err(|e| CaptureError::Browser(format!("browser launching error {}", e)))?;
        let tab = browser
            .new_tab()
            .map_err(|e| CaptureError::Browser(format!("could not create new tab {}", e)))?;
        tab.set_default_timeout(timeout);

        debug!("browser launched with window {:?}", window_size);
        Ok(ChromeSession {
            browser: Some(browser),
            tab,
            current: String::new(),
        })
    }

    fn eval(&self, js: &str) -> Result<Option<Value>, String> {
        self.tab
            .evaluate(js, false)
            .map(|obj| obj.value)
            .map_err(|e| e.to_string())
    }

    fn eval_height(&self, js: &str) -> Result<u64, CaptureError> {
        let value = self
            .eval(js)
            .map_err(|e| CaptureError::navigation(&self.current, e))?;
        Ok(value
            .and_then(|v| v.as_f64())
            .filter(|h| h.is_finite() && *h > 0.0)
            .map(|h| h.ceil() as u64)
            .unwrap_or(0))
    }

    fn kill(browser: &Browser) -> bool {
        let pid = match browser.get_process_id() {
            Some(pid) => Pid::from_u32(pid),
            None => return false,
        };
        let mut s = System::new();
        s.refresh_process(pid);
        if let Some(process) = s.process(pid) {
            debug!("killing process with id {}", pid);
            return process.kill();
        }
        false
    }
}

#[async_trait]
impl PageSession for ChromeSession {
    async fn open(&mut self, address: &str) -> Result<(), CaptureError> {
        self.current = address.to_string();
        let nv = self
            .tab
            .navigate_to(address)
            .map_err(|e| CaptureError::navigation(address, e))?;
        nv.wait_until_navigated()
            .map_err(|e| CaptureError::navigation(address, e))?;

        let landed = self.tab.get_url();
        if landed.starts_with(ERROR_PAGE_PREFIX) {
            return Err(CaptureError::navigation(
                address,
                "browser rendered an error page",
            ));
        }
        debug!("navigated to {}", landed);
        Ok(())
    }

    async fn total_height(&mut self) -> Result<u64, CaptureError> {
        self.eval_height(TOTAL_HEIGHT_JS)
    }

    async fn viewport_height(&mut self) -> Result<u64, CaptureError> {
        self.eval_height(VIEWPORT_HEIGHT_JS)
    }

    async fn scroll_by(&mut self, delta: u64) -> Result<(), CaptureError> {
        self.eval(&format!("window.scrollBy(0, {})", delta))
            .map(|_| ())
            .map_err(|e| CaptureError::navigation(&self.current, e))
    }

    async fn capture_to(&mut self, path: &Path) -> Result<(), CaptureError> {
        let png = self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| CaptureError::capture_write(path, e))?;
        fs::write(path, png)
            .await
            .map_err(|e| CaptureError::capture_write(path, e))?;
        Ok(())
    }

    async fn extract_links(&mut self) -> Result<Vec<String>, CaptureError> {
        let raw = match self.eval(LINKS_JS) {
            Ok(Some(Value::String(s))) => s,
            Ok(other) => {
                return Err(CaptureError::LinkExtraction(format!(
                    "unexpected anchor list {:?} on {}",
                    other,
                    self.tab.get_url()
                )))
            }
            Err(e) => return Err(CaptureError::LinkExtraction(e)),
        };
        parse_anchor_list(&raw)
    }

    async fn close(&mut self) {
        if let Err(e) = self.tab.close(false) {
            warn!("could not close tab {}", e);
        }
        if let Some(browser) = self.browser.take() {
            debug!("killing browser process...");
            Self::kill(&browser);
        }
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if let Some(browser) = self.browser.take() {
            warn!("browser session dropped without close, killing process");
            Self::kill(&browser);
        }
    }
}
