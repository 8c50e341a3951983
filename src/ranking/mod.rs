//! Candidate selection via the solar scoring service.
//!
//! Each address is scored independently. Addresses whose scoring call fails are
//! dropped and counted, never retried: the goal is the best few candidates, not
//! an exhaustive survey. Survivors are ordered by metric descending with ties
//! kept in discovery order, then truncated to `top_k`.

mod scorer;

#[cfg(any(test, feature = "mock"))]
pub use scorer::MockSolarScorer;
pub use scorer::{HttpSolarScorer, MAX_PANEL_COUNT_FIELD, ScoredAddress, SolarScorer};

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use futures_util::{StreamExt, stream};
use tracing::{debug, info, instrument};

use crate::constants::{DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_SCORED_ADDRESSES, DEFAULT_TOP_K};
use crate::types::{Address, Candidate};

/// Result of ranking one discovery batch.
#[derive(Debug, Clone, Default)]
pub struct RankOutcome {
    /// Selected candidates, best first; never longer than `top_k`.
    pub candidates: Vec<Candidate>,
    /// Repeated addresses removed before scoring.
    pub duplicates: usize,
    /// Addresses beyond `max_scored` that were never scored.
    pub unscored: usize,
    /// Scoring calls that failed.
    pub failures: usize,
}

/// Scores addresses and keeps the top-K by metric.
#[derive(Clone)]
pub struct RankingFilter {
    scorer: Arc<dyn SolarScorer>,
    top_k: usize,
    max_scored: usize,
    concurrency: usize,
}

impl std::fmt::Debug for RankingFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankingFilter")
            .field("top_k", &self.top_k)
            .field("max_scored", &self.max_scored)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl RankingFilter {
    pub fn new(scorer: Arc<dyn SolarScorer>) -> Self {
        Self {
            scorer,
            top_k: DEFAULT_TOP_K,
            max_scored: DEFAULT_MAX_SCORED_ADDRESSES,
            concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn max_scored(mut self, max_scored: usize) -> Self {
        self.max_scored = max_scored;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn top_k_value(&self) -> usize {
        self.top_k
    }

    #[instrument(skip(self, addresses), fields(addresses = addresses.len()))]
    pub async fn rank(&self, addresses: &[Address]) -> RankOutcome {
        let unique = dedupe_preserving_order(addresses);
        let duplicates = addresses.len() - unique.len();
        let unscored = unique.len().saturating_sub(self.max_scored);

        let to_score: Vec<Address> = unique
            .into_iter()
            .take(self.max_scored)
            .cloned()
            .collect();
        let attempted = to_score.len();

        let results: Vec<Option<Candidate>> = stream::iter(to_score)
            .map(|address| {
                let scorer = Arc::clone(&self.scorer);
                async move {
                    match scorer.score(&address).await {
                        Ok(scored) if scored.metric.is_finite() => Some(Candidate {
                            address,
                            metric: scored.metric,
                            solar_info: scored.payload,
                        }),
                        Ok(_) => {
                            debug!(%address, "Discarding non-finite score");
                            None
                        }
                        Err(e) => {
                            debug!(%address, error = %e, "Scoring failed, excluding address");
                            None
                        }
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let scored: Vec<Candidate> = results.into_iter().flatten().collect();
        let failures = attempted - scored.len();
        let candidates = select_top_k(scored, self.top_k);

        info!(
            duplicates,
            unscored,
            failures,
            selected = candidates.len(),
            "Ranking complete"
        );

        RankOutcome {
            candidates,
            duplicates,
            unscored,
            failures,
        }
    }
}

/// Stable descending sort by metric, truncated to `top_k`.
pub fn select_top_k(mut candidates: Vec<Candidate>, top_k: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.metric.partial_cmp(&a.metric).unwrap_or(Ordering::Equal));
    candidates.truncate(top_k);
    candidates
}

fn dedupe_preserving_order(addresses: &[Address]) -> Vec<&Address> {
    let mut seen = HashSet::with_capacity(addresses.len());
    addresses
        .iter()
        .filter(|address| seen.insert(address.as_str()))
        .collect()
}
