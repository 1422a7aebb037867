use serde::{Deserialize, Serialize};

use super::types::ExtractionStatus;

/// Per-run counters reported alongside the records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub pages_opened: u64,
    pub load_more_triggers: u64,
    pub focus_simulations: u64,
    pub overlay_reads: u64,
    pub items_extracted: u64,
    pub items_enriched: u64,
    pub items_partial: u64,
    pub items_failed: u64,
}

impl SessionMetrics {
    pub fn record_page_open(&mut self) {
        self.pages_opened = self.pages_opened.saturating_add(1);
    }

    pub fn record_load_more(&mut self) {
        self.load_more_triggers = self.load_more_triggers.saturating_add(1);
    }

    pub fn record_focus(&mut self) {
        self.focus_simulations = self.focus_simulations.saturating_add(1);
    }

    pub fn record_overlay_read(&mut self) {
        self.overlay_reads = self.overlay_reads.saturating_add(1);
    }

    pub fn record_item(&mut self, status: ExtractionStatus) {
        self.items_extracted = self.items_extracted.saturating_add(1);
        match status {
            ExtractionStatus::Primary => {}
            ExtractionStatus::FallbackEnriched => {
                self.items_enriched = self.items_enriched.saturating_add(1)
            }
            ExtractionStatus::Partial => self.items_partial = self.items_partial.saturating_add(1),
            ExtractionStatus::Failed => self.items_failed = self.items_failed.saturating_add(1),
        }
    }

    /// Share of attempted items that did not fail, as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.items_extracted == 0 {
            0.0
        } else {
            let succeeded = self.items_extracted.saturating_sub(self.items_failed);
            (succeeded as f64 / self.items_extracted as f64) * 100.0
        }
    }
}
