use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Context;
use clap::Parser;
use linkshield::{
    annotator,
    classifier::HttpClassifier,
    document::LiveDocument,
    scanner::{Scanner, ScannerOptions},
    settings::{MemorySettings, SettingsStore},
    utils::DEFAULT_ENDPOINT,
};
use log::info;
use signal_hook::consts::{SIGINT, SIGTERM};
use tokio::time::{sleep, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about = "Scan a page's links against a URL classification service", long_about = None)]
struct Args {
    /// Page to fetch and scan
    url: String,
    /// Classification service endpoint (default: $LINKSHIELD_ENDPOINT)
    #[arg(short, long)]
    endpoint: Option<String>,
    /// Quiet window in ms after the last mutation before a scan fires
    #[arg(long, default_value_t = 500)]
    debounce_ms: u64,
    /// Delay in ms before the initial scan
    #[arg(long, default_value_t = 1000)]
    settle_ms: u64,
    /// Concurrent in-flight classification requests
    #[arg(short, long, default_value_t = 4)]
    concurrency: usize,
    /// Seconds to wait for the scan before giving up
    #[arg(short, long, default_value_t = 30)]
    timeout: u64,
    /// Print the full result set as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let endpoint = args
        .endpoint
        .clone()
        .unwrap_or_else(|| DEFAULT_ENDPOINT.clone());

    let html = reqwest::get(&args.url)
        .await
        .context(format!("could not fetch {}", args.url))?
        .error_for_status()?
        .text()
        .await?;
    let document = LiveDocument::from_html(&html);
    info!(
        "loaded {} with {} links, classifying against {}",
        args.url,
        document.link_targets().len(),
        endpoint
    );

    let classifier = Arc::new(HttpClassifier::new(&endpoint)?);
    let settings: Arc<dyn SettingsStore> = Arc::new(MemorySettings::new(true));
    let options = ScannerOptions::default_builder()
        .settle_delay_ms(args.settle_ms)
        .debounce_ms(args.debounce_ms)
        .concurrent_requests(args.concurrency)
        .build()?;

    let scanner = Scanner::new(document.clone(), classifier, settings, options);
    let controller = scanner.controller();
    let cache = scanner.cache();

    let should_terminate = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGTERM, Arc::clone(&should_terminate))?;
    signal_hook::flag::register(SIGINT, Arc::clone(&should_terminate))?;

    let scan_loop = tokio::spawn(scanner.run(Arc::clone(&should_terminate)));

    // the page's own address first
    let page = controller.check_url(&args.url).await;
    match &page.error_detail {
        Some(detail) => println!(
            "page {} -> {} (classification service unreachable: {})",
            args.url, page.label, detail
        ),
        None => println!("page {} -> {}", args.url, page.label),
    }

    if document.link_targets().is_empty() {
        println!("no links found on the page");
    } else {
        // wait for the settle-delayed scan to publish its first batch
        let deadline = Instant::now() + Duration::from_secs(args.timeout);
        while cache.current().is_empty()
            && Instant::now() < deadline
            && !should_terminate.load(Ordering::Relaxed)
        {
            sleep(Duration::from_millis(100)).await;
        }

        let results = cache.current();
        if args.json {
            println!("{}", serde_json::to_string_pretty(&*results)?);
        } else if results.is_empty() {
            println!("scan produced no results within {}s", args.timeout);
        } else {
            println!("{} links scanned, {} risky", results.len(), results.risky_count());
            for result in results.risky() {
                println!(
                    "  {} -> {} [{}]",
                    result.url,
                    result.label,
                    annotator::label_color(&result.label)
                );
            }
        }
    }

    should_terminate.store(true, Ordering::Relaxed);
    scan_loop.await??;
    Ok(())
}
