//! Pure graph derivation: edges from shared AI labels, node sizing, and a
//! deterministic circular layout. No storage access — everything here is a
//! function of its inputs.

use std::collections::HashSet;
use std::f64::consts::{FRAC_PI_2, TAU};

use orbit_common::{slugify, GraphEdge, GraphNode, Label, LabelSource, RankedEntity};

/// Node size bounds (rendered units) and the multiplier for entities whose
/// title matches a trending topic.
pub const SIZE_FLOOR: f64 = 12.0;
pub const SIZE_CEIL: f64 = 48.0;
pub const TRENDING_BOOST: f64 = 1.4;

/// One edge per unordered pair of nodes sharing at least one AI label.
/// Trending labels never connect anything. Strength is the mean of the two
/// view counts; the primary label is the first shared label in `a`'s order.
pub fn calculate_edges(nodes: &[GraphNode]) -> Vec<GraphEdge> {
    let mut edges = Vec::new();

    for i in 0..nodes.len() {
        for j in (i + 1)..nodes.len() {
            let a = &nodes[i];
            let b = &nodes[j];

            let b_names: HashSet<&str> = b
                .labels
                .iter()
                .filter(|l| l.source == LabelSource::Ai)
                .map(|l| l.name.as_str())
                .collect();

            let shared: Vec<Label> = a
                .labels
                .iter()
                .filter(|l| l.source == LabelSource::Ai && b_names.contains(l.name.as_str()))
                .cloned()
                .collect();

            if shared.is_empty() {
                continue;
            }

            edges.push(GraphEdge {
                a: a.slug.clone(),
                b: b.slug.clone(),
                primary_label: shared[0].name.clone(),
                strength: (a.views + b.views) as f64 / 2.0,
                shared_labels: shared,
            });
        }
    }

    edges
}

/// Linear interpolation between the size bounds by relative view count,
/// boosted for trending titles. `trending` holds slugified topic names.
pub fn size_node(entity: &RankedEntity, all: &[RankedEntity], trending: &HashSet<String>) -> f64 {
    let max_views = all.iter().map(|e| e.views).max().unwrap_or(0).max(1);
    let mut size = SIZE_FLOOR + (entity.views as f64 / max_views as f64) * (SIZE_CEIL - SIZE_FLOOR);
    if trending.contains(&slugify(&entity.title)) {
        size *= TRENDING_BOOST;
    }
    size
}

/// Place node `i` of `N` at angle `(i/N)·2π − π/2` on a fixed-radius circle
/// around `center`. A function of index and count only, so coordinates are
/// exactly reproducible.
pub fn layout_circular(nodes: &mut [GraphNode], center: (f64, f64), radius: f64) {
    let count = nodes.len();
    for (i, node) in nodes.iter_mut().enumerate() {
        let angle = (i as f64 / count as f64) * TAU - FRAC_PI_2;
        node.x = center.0 + radius * angle.cos();
        node.y = center.1 + radius * angle.sin();
    }
}

/// Ranked entities → sized, positioned nodes plus their shared-label edges.
pub fn build_graph(
    ranked: &[RankedEntity],
    trending: &HashSet<String>,
    center: (f64, f64),
    radius: f64,
) -> (Vec<GraphNode>, Vec<GraphEdge>) {
    let mut nodes: Vec<GraphNode> = ranked
        .iter()
        .map(|e| GraphNode {
            slug: e.slug.clone(),
            title: e.title.clone(),
            views: e.views,
            labels: e.labels.clone(),
            size: size_node(e, ranked, trending),
            x: 0.0,
            y: 0.0,
        })
        .collect();

    layout_circular(&mut nodes, center, radius);
    let edges = calculate_edges(&nodes);
    (nodes, edges)
}
