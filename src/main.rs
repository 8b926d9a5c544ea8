use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use log::debug;
use pagesnap::{
    crawler::CrawlOptions,
    runner::Runner,
    store::{Artifact, CaptureIndex},
    types::{CaptureRecord, CaptureRole},
    utils::{DEFAULT_INDEX_FILE, DEFAULT_OUTPUT_DIR},
};
use tokio::sync::mpsc;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Full page screenshots of a page and the pages it links to", long_about = None)]
struct Args {
    /// Index file where finished crawls are recorded
    #[arg(short = 'i', long, default_value = DEFAULT_INDEX_FILE)]
    index: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Capture a seed page and up to N of the pages it links to
    Crawl {
        url: String,
        /// Number of distinct linked pages to capture
        #[arg(short = 'n', long, default_value_t = 5)]
        links: usize,
        /// Directory the screenshots are written to
        #[arg(short = 'd', long, default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,
        /// Wait in milliseconds after each scroll before capturing
        #[arg(long, default_value_t = 500)]
        settle_ms: u64,
        /// Wall clock budget in seconds for the whole crawl
        #[arg(long, default_value_t = 300)]
        deadline_secs: u64,
        /// Maximum time the browser will wait for an event before timing out
        #[arg(long, default_value_t = 45)]
        browser_timeout: u64,
        /// Use this id instead of a generated one
        #[arg(long)]
        crawl_id: Option<String>,
    },
    /// List the captures of a crawl
    List { crawl_id: String },
    /// Show the crawl or capture an identifier refers to
    Show { name: String },
    /// List captures of a source address
    ByUrl { url: String },
    /// List captures with the given role (seed or linked)
    ByRole { role: CaptureRole },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    debug!("Starting pagesnap with {:#?}", args.clone());

    let mut index = CaptureIndex::load(args.index.clone())
        .await
        .context(format!("could not open index {:?}", args.index))?;

    match args.command {
        Command::Crawl {
            url,
            links,
            output_dir,
            settle_ms,
            deadline_secs,
            browser_timeout,
            crawl_id,
        } => {
            let options = CrawlOptions::default_builder()
                .link_limit(links)
                .output_dir(output_dir)
                .settle(Duration::from_millis(settle_ms))
                .deadline(Duration::from_secs(deadline_secs))
                .browser_timeout(Duration::from_secs(browser_timeout))
                .build()?;
            let runner = Runner::new(options)?;

            let (tx, mut rx) = mpsc::channel::<CaptureRecord>(64);
            let printer = tokio::spawn(async move {
                while let Some(record) = rx.recv().await {
                    print_record(&record);
                }
            });

            let result = runner.run(&url, crawl_id, Some(tx)).await?;
            printer.await?;

            index.record(&result);
            index.save().await?;

            println!("{}", result.crawl_id);
            if !result.scrapable {
                return Err(anyhow!(
                    "{} could not be captured ({:?})",
                    url,
                    result.status
                ));
            }
        }
        Command::List { crawl_id } => {
            for name in index.captures_for_crawl(&crawl_id)? {
                println!("{}", name);
            }
        }
        Command::Show { name } => match index.lookup(&name) {
            Some(Artifact::Crawl(c)) => println!("{}", serde_json::to_string_pretty(c)?),
            Some(Artifact::Capture(r)) => println!("{}", serde_json::to_string_pretty(r)?),
            None => return Err(anyhow!("{} not found", name)),
        },
        Command::ByUrl { url } => index.captures_for_url(&url).into_iter().for_each(print_record),
        Command::ByRole { role } => index
            .captures_for_role(role)
            .into_iter()
            .for_each(print_record),
    }

    Ok(())
}

fn print_record(record: &CaptureRecord) {
    println!(
        "{}\t{}\t{}\t{}",
        record.artifact_name(),
        record.role,
        record.source_url,
        record.artifact_path.display()
    );
}
