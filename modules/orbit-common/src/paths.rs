use crate::slug::slugify;

/// The whole StatsMap lives in one document at this path.
pub const STATS_PATH: &str = "stats/entities";

/// Optional trending-topics document.
pub const TRENDING_PATH: &str = "trending/topics";

/// Bumped on breaking changes to the Classification shape. Older versions
/// stay addressable under their own prefix for migration tooling.
pub const CLASSIFICATION_SCHEMA_VERSION: u32 = 2;

/// Soft ceiling on distinct AI label names the system should maintain.
pub const DEFAULT_LABEL_BUDGET: usize = 5;

pub fn classification_path(slug: &str) -> String {
    format!("classifications/v{CLASSIFICATION_SCHEMA_VERSION}/{slug}")
}

pub fn classification_path_for_title(title: &str) -> String {
    classification_path(&slugify(title))
}

pub fn classification_prefix() -> String {
    format!("classifications/v{CLASSIFICATION_SCHEMA_VERSION}/")
}
