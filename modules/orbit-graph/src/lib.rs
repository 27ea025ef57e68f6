pub mod classifier;
pub mod derive;
pub mod stats;

pub use classifier::{label_strengths, Classifier};
pub use derive::{build_graph, calculate_edges, layout_circular, size_node};
pub use stats::{leaderboard, score, Aggregator};
