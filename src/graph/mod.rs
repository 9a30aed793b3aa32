//! Relationship graph construction and network analysis
//!
//! Two layers:
//! - `builder`: converts a snapshot into a typed petgraph `DiGraph`
//!   (multigraph, isolated entities kept, dangling relationships skipped)
//! - `analysis`: structural metrics over that graph (centrality,
//!   communities, density, clusters, hubs, path queries)

mod analysis;
mod builder;

pub use analysis::{
    CentralityScore, Community, KeyPlayer, NetworkAnalysisResult, NetworkAnalyzer, PathMetric,
    PathOutcome,
};
pub use builder::{GraphEdge, GraphNode, GraphPayload, NetworkGraph, PayloadEdge};
