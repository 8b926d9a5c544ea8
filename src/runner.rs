use std::sync::{atomic::AtomicBool, Arc};

use signal_hook::consts::{SIGINT, SIGTERM};
use tokio::sync::mpsc;

use crate::{
    browser_controller::{ChromeLauncher, SessionFactory},
    crawler::{CrawlOptions, Crawler},
    types::{CaptureRecord, CrawlError, CrawlResult},
    utils::new_id,
};

pub struct Runner {
    options: CrawlOptions,
    should_terminate: Arc<AtomicBool>,
}

impl Runner {
    pub fn new(options: CrawlOptions) -> anyhow::Result<Self> {
        let should_terminate = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(SIGTERM, Arc::clone(&should_terminate))?;
        signal_hook::flag::register(SIGINT, Arc::clone(&should_terminate))?;

        Ok(Runner {
            options,
            should_terminate,
        })
    }

    pub fn options(&self) -> &CrawlOptions {
        &self.options
    }

    pub fn should_terminate(&self) -> Arc<AtomicBool> {
        self.should_terminate.clone()
    }

    /// Crawls `seed` in a fresh headless Chrome.
    pub async fn run(
        &self,
        seed: &str,
        crawl_id: Option<String>,
        sink: Option<mpsc::Sender<CaptureRecord>>,
    ) -> Result<CrawlResult, CrawlError> {
        let launcher =
            ChromeLauncher::new(self.options.browser_timeout(), self.options.window_size());
        self.run_with(&launcher, seed, crawl_id, sink).await
    }

    pub async fn run_with<F: SessionFactory>(
        &self,
        factory: &F,
        seed: &str,
        crawl_id: Option<String>,
        sink: Option<mpsc::Sender<CaptureRecord>>,
    ) -> Result<CrawlResult, CrawlError> {
        let crawl_id = crawl_id.unwrap_or_else(new_id);

        info!(
            "initializing crawl {} of {} with link limit {} into {:?}",
            crawl_id,
            seed,
            self.options.link_limit(),
            self.options.output_dir()
        );

        let mut crawler = Crawler::new(&crawl_id, seed, self.options.clone())?
            .with_termination(self.should_terminate.clone());
        if let Some(sink) = sink {
            crawler = crawler.with_sink(sink);
        }
        crawler.crawl(factory).await
    }
}
