use std::collections::BTreeMap;

use tracing::warn;

use super::types::{ContentItem, ExtractionRecord};

/// Assembles the final record list: one record per discovered key, in discovery order.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResultAggregator;

impl ResultAggregator {
    /// `keys[i]` owns sequence number `i + 1`. Items are matched by sequence number; a key
    /// without a matching item is recorded as failed and duplicate items are dropped, so the
    /// output always has exactly `keys.len()` records.
    pub fn aggregate(&self, keys: &[String], items: Vec<ContentItem>) -> Vec<ExtractionRecord> {
        let mut by_sequence: BTreeMap<usize, ContentItem> = BTreeMap::new();
        for item in items {
            if by_sequence.contains_key(&item.sequence_number) {
                warn!(
                    sequence = item.sequence_number,
                    "duplicate extraction result ignored"
                );
                continue;
            }
            by_sequence.insert(item.sequence_number, item);
        }

        keys.iter()
            .enumerate()
            .map(|(index, key)| {
                let sequence = index + 1;
                let item = match by_sequence.remove(&sequence) {
                    Some(item) if item.identity_key == *key => item,
                    Some(item) => {
                        warn!(
                            sequence,
                            expected = %key,
                            found = %item.identity_key,
                            "extraction result does not match discovered key"
                        );
                        ContentItem::failed(key.clone(), sequence)
                    }
                    None => {
                        warn!(sequence, key = %key, "no extraction result for key");
                        ContentItem::failed(key.clone(), sequence)
                    }
                };
                ExtractionRecord::new(item)
            })
            .collect()
    }
}
