use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use category_client::{CategoryOracle, OracleRequest};
use orbit_common::{
    classification_path, slugify, Classification, Label, LabelSource, LabelStrength, OrbitError,
    StatsMap, DEFAULT_LABEL_BUDGET, STATS_PATH,
};
use orbit_store::DocumentStore;

/// An entity never carries more labels than this, whatever the oracle says.
pub const MAX_LABELS_PER_ENTITY: usize = 3;

/// Label-budget-constrained classification service.
///
/// A persisted classification is authoritative: re-requesting one never goes
/// back to the oracle. The budget is advisory — this service guarantees the
/// oracle is only ever offered the top-K candidates, not that K is never
/// exceeded.
pub struct Classifier {
    store: Arc<DocumentStore>,
    oracle: Arc<dyn CategoryOracle>,
    budget: usize,
}

impl Classifier {
    pub fn new(store: Arc<DocumentStore>, oracle: Arc<dyn CategoryOracle>) -> Self {
        Self::with_budget(store, oracle, DEFAULT_LABEL_BUDGET)
    }

    pub fn with_budget(
        store: Arc<DocumentStore>,
        oracle: Arc<dyn CategoryOracle>,
        budget: usize,
    ) -> Self {
        Self {
            store,
            oracle,
            budget,
        }
    }

    pub async fn classify(&self, title: &str) -> Result<Classification, OrbitError> {
        let slug = slugify(title);
        let path = classification_path(&slug);

        if let Some(existing) = self.store.get_as::<Classification>(&path).await {
            return Ok(existing);
        }

        let stats: StatsMap = self.store.get_as(STATS_PATH).await.unwrap_or_default();
        let candidates = label_strengths(&stats, self.budget);

        let request = OracleRequest {
            title: title.to_string(),
            candidates,
            budget: self.budget,
        };

        let response = match self.oracle.categorize(&request).await {
            Ok(response) => response,
            Err(e) => {
                // Not persisted: the entity must stay eligible for a
                // future attempt.
                warn!(title, error = %e, "Oracle call failed, entity stays unclassified");
                return Ok(Classification {
                    title: title.to_string(),
                    labels: Vec::new(),
                    explanation: String::new(),
                    timestamp: Utc::now(),
                });
            }
        };

        let labels: Vec<Label> = response
            .labels
            .into_iter()
            .take(MAX_LABELS_PER_ENTITY)
            .map(Label::ai)
            .collect();

        let classification = Classification {
            title: title.to_string(),
            labels,
            explanation: response.explanation,
            timestamp: Utc::now(),
        };

        let body = serde_json::to_value(&classification)
            .map_err(|e| OrbitError::Classification(e.to_string()))?;
        self.store.put(&path, body).await?;

        info!(
            title,
            slug,
            labels = classification.labels.len(),
            "Entity classified"
        );
        Ok(classification)
    }
}

/// Strength table for the oracle: how many entities currently hold each
/// non-historical AI label, strongest first (name as tiebreak so the table
/// is deterministic), capped at `budget`.
pub fn label_strengths(stats: &StatsMap, budget: usize) -> Vec<LabelStrength> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for entry in stats.values() {
        for label in &entry.labels {
            if label.source == LabelSource::Ai && !label.is_historical {
                *counts.entry(label.name.as_str()).or_default() += 1;
            }
        }
    }

    let mut table: Vec<LabelStrength> = counts
        .into_iter()
        .map(|(label, strength)| LabelStrength {
            label: label.to_string(),
            strength,
        })
        .collect();
    table.sort_by(|a, b| b.strength.cmp(&a.strength).then_with(|| a.label.cmp(&b.label)));
    table.truncate(budget);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_common::StatsEntry;

    fn entry_with_labels(names: &[&str]) -> StatsEntry {
        StatsEntry {
            title: "t".to_string(),
            views: 1,
            labels: names.iter().map(|n| Label::ai(*n)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn strengths_count_holders_and_rank() {
        let mut stats = StatsMap::new();
        stats.insert("a".into(), entry_with_labels(&["science", "art"]));
        stats.insert("b".into(), entry_with_labels(&["science"]));
        stats.insert("c".into(), entry_with_labels(&["science", "music"]));

        let table = label_strengths(&stats, 5);
        assert_eq!(table[0].label, "science");
        assert_eq!(table[0].strength, 3);
        // Equal strength breaks ties by name.
        assert_eq!(table[1].label, "art");
        assert_eq!(table[2].label, "music");
    }

    #[test]
    fn table_never_exceeds_budget() {
        let mut stats = StatsMap::new();
        for (i, name) in ["a", "b", "c", "d", "e", "f"].iter().enumerate() {
            for j in 0..3 {
                stats.insert(format!("{i}-{j}"), entry_with_labels(&[name]));
            }
        }

        let table = label_strengths(&stats, 5);
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn trending_and_historical_labels_excluded() {
        let mut stats = StatsMap::new();
        let mut entry = entry_with_labels(&["science"]);
        entry.labels.push(Label::trending("hot-topic"));
        let mut retired = Label::ai("retired");
        retired.is_historical = true;
        entry.labels.push(retired);
        stats.insert("a".into(), entry);

        let table = label_strengths(&stats, 5);
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].label, "science");
    }
}
