use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::StreamExt;
use itertools::Itertools;
use tokio::{
    sync::{mpsc, mpsc::error::TryRecvError, oneshot},
    time::{sleep, Instant},
};
use tokio_retry::{strategy::FixedInterval, Retry};

use crate::{
    annotator,
    cache::ResultCache,
    classifier::Classify,
    control::Controller,
    document::{LiveDocument, MutationEvent},
    settings::SettingsStore,
    types::{BatchResultSet, ClassificationResult},
    utils::jitter,
};

pub(crate) enum ScanCommand {
    Rescan,
    CheckLinks {
        urls: Vec<String>,
        reply: oneshot::Sender<BatchResultSet>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed { links: usize, risky: usize },
    // nothing to classify, the previous batch stays published
    Empty,
    Disabled,
    // another cycle is already running
    Busy,
}

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct ScannerOptions {
    // delay after startup before the first scan, letting the page settle
    #[builder(default = "1000")]
    settle_delay_ms: u64,
    // quiet window after the last structural mutation before a scan fires
    #[builder(default = "500")]
    debounce_ms: u64,
    // in-flight classification requests per batch
    #[builder(default = "4")]
    concurrent_requests: usize,
    // extra attempts when the settings store is unreachable
    #[builder(default = "3")]
    config_retries: usize,
    // base delay between settings store attempts, jittered
    #[builder(default = "500")]
    config_retry_delay_ms: u64,
}

impl ScannerOptions {
    pub fn default_builder() -> ScannerOptionsBuilder {
        ScannerOptionsBuilder::default()
    }
}

pub struct Scanner<C: Classify> {
    document: LiveDocument,
    classifier: Arc<C>,
    settings: Arc<dyn SettingsStore>,
    cache: ResultCache,
    options: ScannerOptions,
    scan_active: Arc<AtomicBool>,
    mutations: mpsc::Receiver<MutationEvent>,
    commands: mpsc::Receiver<ScanCommand>,
    command_tx: mpsc::Sender<ScanCommand>,
}

impl<C: Classify + 'static> Scanner<C> {
    pub fn new(
        document: LiveDocument,
        classifier: Arc<C>,
        settings: Arc<dyn SettingsStore>,
        options: ScannerOptions,
    ) -> Self {
        // subscribe before the loop starts so no early mutation is lost
        let mutations = document.subscribe();
        let (command_tx, commands) = mpsc::channel(64);
        Scanner {
            document,
            classifier,
            settings,
            cache: ResultCache::new(),
            options,
            scan_active: Arc::new(AtomicBool::new(false)),
            mutations,
            commands,
            command_tx,
        }
    }

    pub fn cache(&self) -> ResultCache {
        self.cache.clone()
    }

    pub fn controller(&self) -> Controller<C> {
        Controller::new(
            Arc::clone(&self.classifier),
            self.cache.clone(),
            Arc::clone(&self.settings),
            self.command_tx.clone(),
        )
    }

    // the orchestration loop. every trigger funnels through here, so cycles
    // are serialized and a trigger arriving mid-cycle is queued, not raced
    pub async fn run(mut self, should_terminate: Arc<AtomicBool>) -> anyhow::Result<()> {
        let debounce = Duration::from_millis(self.options.debounce_ms);
        let mut pending = Some(Instant::now() + Duration::from_millis(self.options.settle_delay_ms));

        while !should_terminate.load(Ordering::Relaxed) {
            // each mutation pushes the deadline back; the scan only fires
            // after an uninterrupted quiet window
            while let Ok(event) = self.mutations.try_recv() {
                debug!("document mutation {:?}, debouncing", event);
                pending = Some(Instant::now() + debounce);
            }

            match self.commands.try_recv() {
                Ok(ScanCommand::Rescan) => {
                    debug!("explicit rescan requested");
                    pending = Some(Instant::now());
                }
                Ok(ScanCommand::CheckLinks { urls, reply }) => {
                    let set = self.classify_batch(urls).await;
                    self.cache.publish(set.clone());
                    annotator::apply(&self.document, &set);
                    if reply.send(set).is_err() {
                        warn!("check_links caller went away before the batch completed");
                    }
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {}
            }

            if let Some(deadline) = pending {
                if Instant::now() >= deadline {
                    pending = None;
                    match self.scan_cycle().await {
                        // should not happen from this loop; retry after a
                        // quiet window rather than dropping the trigger
                        ScanOutcome::Busy => pending = Some(Instant::now() + debounce),
                        outcome => debug!("scan cycle finished: {:?}", outcome),
                    }
                }
            }

            sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }

    pub(crate) async fn scan_cycle(&self) -> ScanOutcome {
        // at most one cycle at a time, publishes must never interleave
        if self
            .scan_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return ScanOutcome::Busy;
        }
        let outcome = self.scan_cycle_inner().await;
        self.scan_active.store(false, Ordering::SeqCst);
        outcome
    }

    async fn scan_cycle_inner(&self) -> ScanOutcome {
        if !self.scanning_enabled().await {
            debug!("scanning is disabled, skipping cycle");
            return ScanOutcome::Disabled;
        }

        let urls = self.discover();
        if urls.is_empty() {
            return ScanOutcome::Empty;
        }

        info!("scanning {} links", urls.len());
        let set = self.classify_batch(urls).await;
        let links = set.len();
        let risky = set.risky_count();

        self.cache.publish(set.clone());
        annotator::apply(&self.document, &set);

        info!("scan completed: {} links, {} risky", links, risky);
        ScanOutcome::Completed { links, risky }
    }

    // link targets of the current page, empties dropped, first-seen order kept
    fn discover(&self) -> Vec<String> {
        self.document
            .link_targets()
            .into_iter()
            .filter(|href| !href.is_empty())
            .unique()
            .collect()
    }

    async fn scanning_enabled(&self) -> bool {
        let strategy = FixedInterval::from_millis(self.options.config_retry_delay_ms)
            .map(jitter)
            .take(self.options.config_retries);
        let settings = Arc::clone(&self.settings);
        match Retry::spawn(strategy, move || {
            futures::future::ready(settings.scanning_enabled())
        })
        .await
        {
            Ok(enabled) => enabled,
            Err(e) => {
                // an unreachable store keeps scanning off rather than guessing
                warn!("settings store still unavailable, skipping scan: {}", e);
                false
            }
        }
    }

    // classify every url with bounded concurrency, then assemble the batch in
    // input order. the receive loop is the join barrier: it only ends once
    // every worker has reported, so the batch is complete by construction
    pub(crate) async fn classify_batch(&self, urls: Vec<String>) -> BatchResultSet {
        if urls.is_empty() {
            return BatchResultSet::empty();
        }

        let (work_tx, work_rx) = mpsc::channel::<String>(urls.len());
        let (result_tx, mut result_rx) = mpsc::channel::<(String, ClassificationResult)>(urls.len());

        self.spawn_classifier_workers(work_rx, result_tx);

        for url in &urls {
            if let Err(e) = work_tx.send(url.clone()).await {
                error!("could not queue {} for classification {}", url, e);
            }
        }
        drop(work_tx);

        let mut by_url: HashMap<String, ClassificationResult> = HashMap::with_capacity(urls.len());
        while let Some((url, result)) = result_rx.recv().await {
            by_url.insert(url, result);
        }

        BatchResultSet::from_results(
            urls.into_iter()
                .filter_map(|url| by_url.remove(&url))
                .collect(),
        )
    }

    fn spawn_classifier_workers(
        &self,
        work_rx: mpsc::Receiver<String>,
        result_tx: mpsc::Sender<(String, ClassificationResult)>,
    ) {
        let classifier = Arc::clone(&self.classifier);
        let concurrency = self.options.concurrent_requests;
        tokio::spawn(async move {
            tokio_stream::wrappers::ReceiverStream::new(work_rx)
                .for_each_concurrent(concurrency, |url| {
                    let classifier = Arc::clone(&classifier);
                    let result_tx = result_tx.clone();
                    async move {
                        let result = classifier.classify(&url).await;
                        if let Err(e) = result_tx.send((url, result)).await {
                            error!("could not send classification result {}", e);
                        }
                    }
                })
                .await;
        });
    }
}
