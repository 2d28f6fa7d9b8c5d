use std::sync::{Arc, RwLock};

use scraper::{Html, Selector};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

// structural change notifications; subscribers only use them as a trigger and
// never inspect the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationEvent {
    ChildrenAdded,
    ChildrenRemoved,
}

// the visual state the annotator puts on a risky anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub color: &'static str,
    pub background: String,
    pub tooltip: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub href: String,
    pub text: String,
    pub marker: Option<Marker>,
}

// an in-memory stand-in for the live page: anchors parsed out of HTML, with
// mutation notifications for the scanner and marker storage for the annotator
#[derive(Clone)]
pub struct LiveDocument {
    inner: Arc<RwLock<Inner>>,
}

struct Inner {
    anchors: Vec<Anchor>,
    watchers: Vec<mpsc::Sender<MutationEvent>>,
}

fn anchor_selector() -> Selector {
    Selector::parse("a").unwrap()
}

fn extract_anchors(doc: &Html) -> Vec<Anchor> {
    let selector = anchor_selector();
    doc.select(&selector)
        .filter_map(|element| {
            element.value().attr("href").map(|href| Anchor {
                href: href.to_string(),
                text: element.text().collect::<String>().trim().to_string(),
                marker: None,
            })
        })
        .collect()
}

impl LiveDocument {
    pub fn from_html(html: &str) -> Self {
        let doc = Html::parse_document(html);
        LiveDocument {
            inner: Arc::new(RwLock::new(Inner {
                anchors: extract_anchors(&doc),
                watchers: vec![],
            })),
        }
    }

    pub fn subscribe(&self) -> mpsc::Receiver<MutationEvent> {
        let (tx, rx) = mpsc::channel(32);
        self.inner.write().unwrap().watchers.push(tx);
        rx
    }

    // splice a fragment into the page, as dynamic content would
    pub fn append_html(&self, fragment: &str) {
        let doc = Html::parse_fragment(fragment);
        let mut inner = self.inner.write().unwrap();
        inner.anchors.extend(extract_anchors(&doc));
        notify(&mut inner.watchers, MutationEvent::ChildrenAdded);
    }

    pub fn remove_links(&self, href: &str) -> usize {
        let mut inner = self.inner.write().unwrap();
        let before = inner.anchors.len();
        inner.anchors.retain(|anchor| anchor.href != href);
        let removed = before - inner.anchors.len();
        if removed > 0 {
            notify(&mut inner.watchers, MutationEvent::ChildrenRemoved);
        }
        removed
    }

    // every link target in document order, duplicates included
    pub fn link_targets(&self) -> Vec<String> {
        self.inner
            .read()
            .unwrap()
            .anchors
            .iter()
            .map(|anchor| anchor.href.clone())
            .collect()
    }

    pub fn anchors(&self) -> Vec<Anchor> {
        self.inner.read().unwrap().anchors.clone()
    }

    // marker writes are presentation only and do not count as mutations,
    // otherwise every scan would trigger the next one
    pub fn set_marker(&self, href: &str, marker: Marker) -> usize {
        let mut inner = self.inner.write().unwrap();
        let mut count = 0;
        for anchor in inner.anchors.iter_mut().filter(|a| a.href == href) {
            anchor.marker = Some(marker.clone());
            count += 1;
        }
        count
    }

    pub fn clear_marker(&self, href: &str) -> usize {
        let mut inner = self.inner.write().unwrap();
        let mut count = 0;
        for anchor in inner.anchors.iter_mut().filter(|a| a.href == href) {
            if anchor.marker.take().is_some() {
                count += 1;
            }
        }
        count
    }

    pub fn marker_for(&self, href: &str) -> Option<Marker> {
        self.inner
            .read()
            .unwrap()
            .anchors
            .iter()
            .find(|anchor| anchor.href == href)
            .and_then(|anchor| anchor.marker.clone())
    }
}

fn notify(watchers: &mut Vec<mpsc::Sender<MutationEvent>>, event: MutationEvent) {
    watchers.retain(|tx| match tx.try_send(event) {
        Ok(()) => true,
        // a full buffer is fine, the debounce collapses the burst anyway
        Err(TrySendError::Full(_)) => true,
        Err(TrySendError::Closed(_)) => false,
    });
}
