//! Visit recording, recency-weighted ranking, and detached reclassification.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use rand::seq::IndexedRandom;
use tracing::{debug, error, info, warn};

use orbit_common::{RankedEntity, StatsEntry, StatsMap, STATS_PATH};
use orbit_store::DocumentStore;

use crate::classifier::Classifier;

/// Recency decay constant for the popularity score.
pub const DECAY_HOURS: i64 = 24;

/// Weight of the recency component; views carry the remainder.
pub const RECENCY_WEIGHT: f64 = 0.6;

/// Visible-set defaults: total slots and how many of them are random
/// unclassified picks.
pub const DEFAULT_VISIBLE: usize = 25;
pub const DEFAULT_RANDOM_SLOTS: usize = 5;

/// Entities per reclassification batch, and how far apart batches start.
const RECLASSIFY_BATCH_SIZE: usize = 5;
const RECLASSIFY_STAGGER: Duration = Duration::from_secs(2);

/// Records view events and selects the visible entity set. Classification
/// is triggered inline for entities seen without labels.
pub struct Aggregator {
    store: Arc<DocumentStore>,
    classifier: Arc<Classifier>,
}

impl Aggregator {
    pub fn new(store: Arc<DocumentStore>, classifier: Arc<Classifier>) -> Self {
        Self { store, classifier }
    }

    pub async fn load_stats(&self) -> StatsMap {
        self.store.get_as(STATS_PATH).await.unwrap_or_default()
    }

    /// Record one view. Unclassified entities get a synchronous
    /// classification attempt before the count bumps. On persistence
    /// failure the prior map is returned so the caller stays functional.
    pub async fn record_visit(&self, slug: &str, title: &str) -> StatsMap {
        let mut stats = self.load_stats().await;
        let prior = stats.clone();
        let now = Utc::now();

        let entry = stats.entry(slug.to_string()).or_default();
        entry.title = title.to_string();

        if entry.labels.is_empty() {
            match self.classifier.classify(title).await {
                Ok(classification) if !classification.labels.is_empty() => {
                    entry.labels = classification.labels;
                    entry.last_classified = Some(now);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(slug, error = %e, "Visit-time classification failed");
                }
            }
        }

        entry.views += 1;
        entry.last_visited = Some(now);

        let body = match serde_json::to_value(&stats) {
            Ok(body) => body,
            Err(e) => {
                error!(slug, error = %e, "Stats map failed to serialize");
                return prior;
            }
        };

        match self.store.put(STATS_PATH, body).await {
            Ok(()) => stats,
            Err(e) => {
                error!(slug, error = %e, "Stats persist failed, returning prior map");
                prior
            }
        }
    }

    /// The visible entity set, ranked classified entities first. Any
    /// unclassified entities in the result are queued for background
    /// reclassification.
    pub async fn ranked(&self, n: usize, r: usize) -> Vec<RankedEntity> {
        let stats = self.load_stats().await;
        let board = leaderboard(&stats, n, r, Utc::now());

        let pending: Vec<(String, String)> = board
            .iter()
            .filter(|e| !e.is_classified)
            .map(|e| (e.slug.clone(), e.title.clone()))
            .collect();
        self.spawn_reclassify(pending);

        board
    }

    /// Classify entities in fixed-size batches, each batch starting on a
    /// staggered delay so the oracle is not hit all at once. Detached from
    /// the caller; per-entity failures skip that entity only. Label updates
    /// are merged into the StatsMap in one write at the end — last write
    /// wins against concurrent foreground visits.
    pub fn spawn_reclassify(&self, unclassified: Vec<(String, String)>) {
        if unclassified.is_empty() {
            return;
        }

        let store = Arc::clone(&self.store);
        let classifier = Arc::clone(&self.classifier);

        tokio::spawn(async move {
            let batches: Vec<Vec<(String, String)>> = unclassified
                .chunks(RECLASSIFY_BATCH_SIZE)
                .map(|c| c.to_vec())
                .collect();

            let tasks = batches.into_iter().enumerate().map(|(index, batch)| {
                let classifier = Arc::clone(&classifier);
                async move {
                    tokio::time::sleep(RECLASSIFY_STAGGER * index as u32).await;

                    let mut updates = Vec::new();
                    for (slug, title) in batch {
                        match classifier.classify(&title).await {
                            Ok(c) if !c.labels.is_empty() => {
                                updates.push((slug, c.labels, Utc::now()));
                            }
                            Ok(_) => {
                                debug!(slug, "Reclassification produced no labels");
                            }
                            Err(e) => {
                                warn!(slug, error = %e, "Reclassification failed, skipping entity");
                            }
                        }
                    }
                    updates
                }
            });

            let updates: Vec<_> = join_all(tasks).await.into_iter().flatten().collect();
            if updates.is_empty() {
                return;
            }

            let mut stats: StatsMap = store.get_as(STATS_PATH).await.unwrap_or_default();
            let mut applied = 0u32;
            for (slug, labels, at) in updates {
                if let Some(entry) = stats.get_mut(&slug) {
                    if entry.labels.is_empty() {
                        entry.labels = labels;
                        entry.last_classified = Some(at);
                        applied += 1;
                    }
                }
            }

            match serde_json::to_value(&stats) {
                Ok(body) => {
                    if let Err(e) = store.put(STATS_PATH, body).await {
                        error!(error = %e, "Reclassification merge failed");
                        return;
                    }
                    info!(applied, "Reclassification batch merged");
                }
                Err(e) => error!(error = %e, "Stats map failed to serialize"),
            }
        });
    }
}

/// Blended popularity: raw views weighted against exponential decay since
/// the entity was last classified. Never-classified entries take recency 0.
pub fn score(entry: &StatsEntry, now: DateTime<Utc>) -> f64 {
    let recency = match entry.last_classified {
        Some(at) => {
            let age_secs = (now - at).num_seconds().max(0) as f64;
            let decay_secs = (DECAY_HOURS * 3600) as f64;
            (-(age_secs / decay_secs)).exp()
        }
        None => 0.0,
    };
    entry.views as f64 * (1.0 - RECENCY_WEIGHT) + recency * RECENCY_WEIGHT
}

/// Top `n - r` classified entities by score, then `r` uniform random picks
/// from the unclassified pool.
pub fn leaderboard(stats: &StatsMap, n: usize, r: usize, now: DateTime<Utc>) -> Vec<RankedEntity> {
    let mut classified: Vec<(f64, &String, &StatsEntry)> = stats
        .iter()
        .filter(|(_, e)| e.is_classified())
        .map(|(slug, e)| (score(e, now), slug, e))
        .collect();
    classified.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut board: Vec<RankedEntity> = classified
        .into_iter()
        .take(n.saturating_sub(r))
        .map(|(_, slug, e)| to_ranked(slug, e))
        .collect();

    let unclassified: Vec<(&String, &StatsEntry)> = stats
        .iter()
        .filter(|(_, e)| !e.is_classified())
        .collect();
    let mut rng = rand::rng();
    board.extend(
        unclassified
            .choose_multiple(&mut rng, r)
            .map(|&(slug, e)| to_ranked(slug, e)),
    );

    board
}

fn to_ranked(slug: &str, entry: &StatsEntry) -> RankedEntity {
    RankedEntity {
        slug: slug.to_string(),
        title: entry.title.clone(),
        views: entry.views,
        labels: entry.labels.clone(),
        is_classified: entry.is_classified(),
    }
}
