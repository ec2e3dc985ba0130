use clap::Parser;
use olx_ads_crawler::olx::{OlxAdsDb, OlxConfig, OlxCrawler};
use olx_ads_crawler::CrawlerError;
use std::path::PathBuf;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;

const DUMP_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Parser, Debug)]
#[command(name = "olx-ads-crawler")]
#[command(about = "Periodically crawls OLX advertisement listings into a local database")]
struct Args {
    /// Listing pages to visit per crawl run
    #[arg(long, default_value_t = 5)]
    pages: u32,

    /// Seconds between crawl runs
    #[arg(long, default_value_t = 60)]
    interval: u64,

    /// Database file
    #[arg(long, default_value = "olx_ads.db")]
    db: String,

    /// Directory for periodic database dumps
    #[arg(long, default_value = "db_dumps")]
    dump_dir: PathBuf,
}

async fn run_crawl(crawler: &OlxCrawler, args: &Args) -> Result<(), CrawlerError> {
    let db = OlxAdsDb::connect(&args.db).await?;
    crawler.crawl(args.pages, &db).await;
    db.close().await;
    Ok(())
}

async fn run_dump(args: &Args) -> Result<(), CrawlerError> {
    let db = OlxAdsDb::connect(&args.db).await?;
    let dump = db.create_dump(&args.dump_dir).await;
    db.close().await;
    let dump = dump?;
    info!("Dump was created at {}", dump.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
                "info,html5ever=error,selectors=error,hyper=warn,reqwest=info,sqlx=warn".into()
            }),
        )
        .with(ErrorLayer::default())
        .init();

    let args = Args::parse();
    let crawler = OlxCrawler::new(OlxConfig::default())?;

    let mut crawl_tick = time::interval(Duration::from_secs(args.interval));
    crawl_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut next_dump = Instant::now() + DUMP_PERIOD;

    // Both arms run inline, so crawl runs never overlap each other and a
    // dump never interleaves with a crawl on this task.
    loop {
        tokio::select! {
            _ = crawl_tick.tick() => {
                if let Err(e) = run_crawl(&crawler, &args).await {
                    error!("Crawl cycle aborted: {}", e);
                }
            }
            _ = time::sleep_until(next_dump) => {
                next_dump += DUMP_PERIOD;
                if let Err(e) = run_dump(&args).await {
                    error!("Failed to create dump: {}", e);
                }
            }
        }
    }
}
