use std::sync::{Arc, RwLock};

use crate::types::BatchResultSet;

// single-writer, multiple-reader home of the most recent batch; readers get an
// Arc snapshot so a publish can never tear an in-progress read
#[derive(Clone)]
pub struct ResultCache {
    current: Arc<RwLock<Arc<BatchResultSet>>>,
}

impl ResultCache {
    pub fn new() -> Self {
        ResultCache {
            current: Arc::new(RwLock::new(Arc::new(BatchResultSet::empty()))),
        }
    }

    pub fn publish(&self, set: BatchResultSet) {
        *self.current.write().unwrap() = Arc::new(set);
    }

    pub fn current(&self) -> Arc<BatchResultSet> {
        Arc::clone(&self.current.read().unwrap())
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{ClassificationResult, Label};
    use std::collections::HashMap;

    fn batch(urls: &[(&str, Label)]) -> BatchResultSet {
        BatchResultSet::from_results(
            urls.iter()
                .map(|(url, label)| {
                    ClassificationResult::classified(*url, label.clone(), HashMap::new())
                })
                .collect(),
        )
    }

    #[test]
    fn starts_empty() {
        let cache = ResultCache::new();
        assert!(cache.current().is_empty());
    }

    #[test]
    fn publish_replaces_the_whole_set() {
        let cache = ResultCache::new();
        cache.publish(batch(&[("http://a.test", Label::Safe)]));
        cache.publish(batch(&[
            ("http://b.test", Label::Phishing),
            ("http://c.test", Label::Safe),
        ]));

        let current = cache.current();
        assert_eq!(current.len(), 2);
        assert!(current.get("http://a.test").is_none());
    }

    #[test]
    fn readers_keep_a_consistent_snapshot_across_a_publish() {
        let cache = ResultCache::new();
        cache.publish(batch(&[("http://a.test", Label::Safe)]));

        let snapshot = cache.current();
        cache.publish(batch(&[("http://b.test", Label::Malware)]));

        // the old snapshot is whole, not a mix of generations
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get("http://a.test").is_some());
        assert!(cache.current().get("http://b.test").is_some());
    }
}
