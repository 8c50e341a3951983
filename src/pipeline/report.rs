use std::fmt;

use serde::Serialize;

use crate::types::CacheEntry;

/// Ordered stages of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PipelineStage {
    CacheCheck,
    Discover,
    Ingest,
    Detect,
    Persist,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::CacheCheck => "cache_check",
            PipelineStage::Discover => "discover",
            PipelineStage::Ingest => "ingest",
            PipelineStage::Detect => "detect",
            PipelineStage::Persist => "persist",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request counters for addresses dropped along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub discovered: usize,
    pub duplicates: usize,
    pub unscored: usize,
    pub scoring_failures: usize,
    pub selected: usize,
    pub geocode_no_match: usize,
    pub geocode_failures: usize,
    pub imagery_failures: usize,
    pub detected: usize,
    pub render_failures: usize,
    /// Last stage that ran.
    pub stage_reached: Option<PipelineStage>,
    pub cache_written: bool,
}

impl PipelineReport {
    /// Addresses dropped after selection.
    pub fn dropped_after_selection(&self) -> usize {
        self.geocode_no_match + self.geocode_failures + self.imagery_failures + self.render_failures
    }

    pub(crate) fn enter(&mut self, stage: PipelineStage) {
        self.stage_reached = Some(stage);
    }
}

/// Terminal state of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Served from the cache; no other stage ran.
    CacheHit(CacheEntry),
    /// Freshly computed. Written to the cache unless `report.cache_written` is false.
    Completed {
        entry: CacheEntry,
        report: PipelineReport,
    },
    /// No address survived; nothing was cached.
    Empty { report: PipelineReport },
}

impl PipelineOutcome {
    /// Entry to return to the caller (empty for [`PipelineOutcome::Empty`]).
    pub fn entry(&self) -> CacheEntry {
        match self {
            PipelineOutcome::CacheHit(entry) | PipelineOutcome::Completed { entry, .. } => {
                entry.clone()
            }
            PipelineOutcome::Empty { .. } => CacheEntry::new(),
        }
    }

    pub fn into_entry(self) -> CacheEntry {
        match self {
            PipelineOutcome::CacheHit(entry) | PipelineOutcome::Completed { entry, .. } => entry,
            PipelineOutcome::Empty { .. } => CacheEntry::new(),
        }
    }

    pub fn report(&self) -> Option<&PipelineReport> {
        match self {
            PipelineOutcome::CacheHit(_) => None,
            PipelineOutcome::Completed { report, .. } | PipelineOutcome::Empty { report } => {
                Some(report)
            }
        }
    }

    pub fn is_cache_hit(&self) -> bool {
        matches!(self, PipelineOutcome::CacheHit(_))
    }

    /// Value for the response status header.
    pub fn status_label(&self) -> &'static str {
        match self {
            PipelineOutcome::CacheHit(_) => "HIT",
            PipelineOutcome::Completed { .. } => "MISS",
            PipelineOutcome::Empty { .. } => "EMPTY",
        }
    }
}
