use std::sync::Arc;

use anyhow::anyhow;
use itertools::Itertools;
use tokio::sync::{mpsc, oneshot};

use crate::{
    cache::ResultCache,
    classifier::Classify,
    scanner::ScanCommand,
    settings::{SettingsError, SettingsStore},
    types::{BatchResultSet, ClassificationResult},
};

// what the outside (popup, CLI) is allowed to do: on-demand checks, explicit
// batches, cache reads and the scanning toggle. scan-affecting requests go
// through the scanner's command channel so they serialize with running cycles
pub struct Controller<C: Classify> {
    classifier: Arc<C>,
    cache: ResultCache,
    settings: Arc<dyn SettingsStore>,
    commands: mpsc::Sender<ScanCommand>,
}

impl<C: Classify> Clone for Controller<C> {
    fn clone(&self) -> Self {
        Controller {
            classifier: Arc::clone(&self.classifier),
            cache: self.cache.clone(),
            settings: Arc::clone(&self.settings),
            commands: self.commands.clone(),
        }
    }
}

impl<C: Classify> Controller<C> {
    pub(crate) fn new(
        classifier: Arc<C>,
        cache: ResultCache,
        settings: Arc<dyn SettingsStore>,
        commands: mpsc::Sender<ScanCommand>,
    ) -> Self {
        Controller {
            classifier,
            cache,
            settings,
            commands,
        }
    }

    // single on-demand classification, does not touch the cache
    pub async fn check_url(&self, url: &str) -> ClassificationResult {
        self.classifier.classify(url).await
    }

    // classify an explicit list and publish the batch. an explicit request
    // works even while passive scanning is toggled off
    pub async fn check_links(&self, urls: Vec<String>) -> anyhow::Result<BatchResultSet> {
        let urls: Vec<String> = urls
            .into_iter()
            .filter(|url| !url.is_empty())
            .unique()
            .collect();
        if urls.is_empty() {
            // nothing to do, and the cache keeps its current batch
            return Ok(BatchResultSet::empty());
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(ScanCommand::CheckLinks {
                urls,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow!("scanner is not running"))?;
        reply_rx
            .await
            .map_err(|_| anyhow!("scanner dropped the batch request"))
    }

    pub fn link_results(&self) -> Arc<BatchResultSet> {
        self.cache.current()
    }

    pub async fn rescan(&self) -> anyhow::Result<()> {
        self.commands
            .send(ScanCommand::Rescan)
            .await
            .map_err(|_| anyhow!("scanner is not running"))
    }

    pub fn scanning_enabled(&self) -> Result<bool, SettingsError> {
        self.settings.scanning_enabled()
    }

    // takes effect when the next cycle reaches its discovery gate
    pub fn set_scanning_enabled(&self, enabled: bool) -> Result<(), SettingsError> {
        self.settings.set_scanning_enabled(enabled)
    }
}
