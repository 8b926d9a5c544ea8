use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{fs, sync::mpsc, time::timeout};

use crate::{
    browser_controller::{PageSession, SessionFactory},
    links::{candidates, VisitedSet},
    paginator::{paginate, PageTarget},
    types::{
        CaptureError, CaptureRecord, CaptureRole, CrawlError, CrawlResult, CrawlStatus,
        SkippedLink,
    },
    utils::{normalize_url, parse_seed, DEFAULT_IMAGE_EXT, DEFAULT_OUTPUT_DIR},
};

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct CrawlOptions {
    // distinct linked pages to capture after the seed
    #[builder(default = "5")]
    link_limit: usize,
    // wait after each scroll before the next capture
    #[builder(default = "Duration::from_millis(500)")]
    settle: Duration,
    // wall clock budget for the whole crawl; only checked at await points, so a
    // blocking headless_chrome call can overrun it by up to `browser_timeout`
    #[builder(default = "Duration::from_secs(300)")]
    deadline: Duration,
    #[builder(default = "self.default_output_dir()")]
    output_dir: PathBuf,
    #[builder(default = "self.default_image_ext()")]
    image_ext: String,
    // browser timeout for navigation and protocol calls
    #[builder(default = "Duration::from_secs(45)")]
    browser_timeout: Duration,
    #[builder(default = "(1920, 1080)")]
    window_size: (u32, u32),
}

impl CrawlOptions {
    pub fn default_builder() -> CrawlOptionsBuilder {
        CrawlOptionsBuilder::default()
    }

    pub fn link_limit(&self) -> usize {
        self.link_limit
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn browser_timeout(&self) -> Duration {
        self.browser_timeout
    }

    pub fn window_size(&self) -> (u32, u32) {
        self.window_size
    }
}

impl CrawlOptionsBuilder {
    fn default_output_dir(&self) -> PathBuf {
        PathBuf::from(DEFAULT_OUTPUT_DIR)
    }
    fn default_image_ext(&self) -> String {
        DEFAULT_IMAGE_EXT.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Init,
    CapturingSeed,
    ExtractingLinks,
    CapturingLink,
    Done,
    Failed,
}

pub struct Crawler {
    crawl_id: String,
    seed: String,
    seed_url: String,
    options: CrawlOptions,
    state: CrawlState,
    should_terminate: Arc<AtomicBool>,
    sink: Option<mpsc::Sender<CaptureRecord>>,
}

impl Crawler {
    /// Rejects malformed seeds before any browser work happens.
    pub fn new(crawl_id: &str, seed: &str, options: CrawlOptions) -> Result<Crawler, CrawlError> {
        let seed = parse_seed(seed)?;
        Ok(Crawler {
            crawl_id: crawl_id.into(),
            seed_url: normalize_url(seed.as_str()),
            seed: seed.into(),
            options,
            state: CrawlState::Init,
            should_terminate: Arc::new(AtomicBool::new(false)),
            sink: None,
        })
    }

    pub fn with_termination(mut self, should_terminate: Arc<AtomicBool>) -> Self {
        self.should_terminate = should_terminate;
        self
    }

    /// Records are sent here as soon as each page completes.
    pub fn with_sink(mut self, sink: mpsc::Sender<CaptureRecord>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn crawl_id(&self) -> &str {
        &self.crawl_id
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    pub async fn crawl<F: SessionFactory>(&mut self, factory: &F) -> Result<CrawlResult, CrawlError> {
        self.transition(CrawlState::Init);
        fs::create_dir_all(&self.options.output_dir)
            .await
            .map_err(|source| CrawlError::OutputDir {
                path: self.options.output_dir.clone(),
                source,
            })?;

        let mut result = CrawlResult::new(&self.crawl_id, &self.seed_url);
        let mut session = factory
            .acquire()
            .await
            .map_err(|e| CrawlError::Browser(e.to_string()))?;

        info!(
            "crawl {} of {} started, link limit {}",
            self.crawl_id, self.seed, self.options.link_limit
        );

        let deadline = self.options.deadline;
        let outcome = timeout(deadline, self.traverse(&mut session, &mut result)).await;
        let status = match outcome {
            Ok(status) => status,
            Err(_) => {
                warn!(
                    "crawl {} exceeded its deadline of {:?}, keeping {} captures",
                    self.crawl_id,
                    deadline,
                    result.captures.len()
                );
                CrawlStatus::TimedOut
            }
        };

        session.close().await;
        debug!("session for crawl {} released", self.crawl_id);

        let result = result.finalize(status);
        match result.status {
            CrawlStatus::Failed { .. } => self.transition(CrawlState::Failed),
            _ => self.transition(CrawlState::Done),
        }

        info!(
            "crawl {} finished with {:?}: {} captures over {} linked pages, {} skipped",
            self.crawl_id,
            result.status,
            result.captures.len(),
            result.pages(CaptureRole::Linked).len(),
            result.skipped.len()
        );
        Ok(result)
    }

    async fn traverse<S: PageSession>(
        &mut self,
        session: &mut S,
        result: &mut CrawlResult,
    ) -> CrawlStatus {
        if self.terminated() {
            return CrawlStatus::Terminated;
        }

        self.transition(CrawlState::CapturingSeed);
        let seed = self.seed.clone();
        match self.capture_page(session, &seed, CaptureRole::Seed).await {
            Ok(records) => self.publish(result, records).await,
            Err(e) => {
                error!("seed capture failed for crawl {}: {}", self.crawl_id, e);
                return CrawlStatus::Failed {
                    reason: e.to_string(),
                };
            }
        }

        self.transition(CrawlState::ExtractingLinks);
        let mut visited = VisitedSet::seeded(&self.seed_url);
        let queue = candidates(session, &visited).await;
        debug!("{} candidate links found on {}", queue.len(), seed);

        self.transition(CrawlState::CapturingLink);
        let mut visited_links = 0;
        for candidate in queue {
            if visited_links >= self.options.link_limit {
                debug!("link limit {} reached", self.options.link_limit);
                break;
            }
            if self.terminated() {
                warn!("crawl {} terminated early", self.crawl_id);
                return CrawlStatus::Terminated;
            }
            // failed addresses stay in the set, they are not retried
            if !visited.insert(&candidate) {
                continue;
            }

            match self
                .capture_page(session, &candidate, CaptureRole::Linked)
                .await
            {
                Ok(records) => {
                    self.publish(result, records).await;
                    visited_links += 1;
                }
                Err(e) => {
                    warn!("skipping {}: {}", candidate, e);
                    result.skipped.push(SkippedLink {
                        url: candidate,
                        reason: e.to_string(),
                    });
                }
            }
        }

        CrawlStatus::Done
    }

    async fn capture_page<S: PageSession>(
        &self,
        session: &mut S,
        address: &str,
        role: CaptureRole,
    ) -> Result<Vec<CaptureRecord>, CaptureError> {
        debug!("capturing {} as {}", address, role);
        session.open(address).await?;

        let source_url = normalize_url(address);
        let target = PageTarget {
            crawl_id: &self.crawl_id,
            source_url: &source_url,
            role,
            output_dir: &self.options.output_dir,
            image_ext: &self.options.image_ext,
        };
        paginate(session, &target, self.options.settle).await
    }

    async fn publish(&mut self, result: &mut CrawlResult, records: Vec<CaptureRecord>) {
        let mut closed = false;
        if let Some(sink) = &self.sink {
            for record in records.iter() {
                if let Err(e) = sink.send(record.clone()).await {
                    warn!("capture sink closed, no longer streaming records: {}", e);
                    closed = true;
                    break;
                }
            }
        }
        if closed {
            self.sink = None;
        }
        result.push_page(records);
    }

    fn terminated(&self) -> bool {
        self.should_terminate.load(Ordering::Relaxed)
    }

    fn transition(&mut self, next: CrawlState) {
        debug!("crawl {}: {:?} -> {:?}", self.crawl_id, self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_malformed_seed() {
        let options = CrawlOptions::default_builder().build().unwrap();
        assert!(matches!(
            Crawler::new("k", "not a url", options),
            Err(CrawlError::InvalidSeed { .. })
        ));
    }

    #[test]
    fn builder_defaults() {
        let options = CrawlOptions::default_builder().build().unwrap();
        assert_eq!(options.link_limit(), 5);
        assert_eq!(options.settle, Duration::from_millis(500));
        assert_eq!(options.output_dir(), Path::new("screenshots"));
        assert_eq!(options.image_ext, "png");
    }

    #[test]
    fn seed_is_normalized() {
        let options = CrawlOptions::default_builder().build().unwrap();
        let c = Crawler::new("k", "https://example.com/#intro", options).unwrap();
        assert_eq!(c.seed_url, "https://example.com");
        assert_eq!(c.state(), CrawlState::Init);
    }
}
