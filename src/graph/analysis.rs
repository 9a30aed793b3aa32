//! Network analysis over the relationship graph
//!
//! Computes the structural metrics an investigator reads off the graph:
//! degree and betweenness centrality, community partition, density,
//! connected clusters, key players and structural hubs, plus point-to-point
//! path queries.
//!
//! All metrics treat the graph as undirected (the projection from
//! `NetworkGraph::undirected_adjacency`); direction matters for cycle
//! detection but not for "who sits between whom".

use crate::config::{ConfigError, GraphConfig};
use crate::graph::builder::{GraphPayload, NetworkGraph};
use crate::models::{InvestigationSnapshot, Pattern, Severity};
use petgraph::algo::connected_components;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info};

/// Centrality scores for one entity
#[derive(Debug, Clone, Serialize)]
pub struct CentralityScore {
    pub entity_id: String,
    /// Degree normalized by (n - 1)
    pub degree: f64,
    /// Betweenness normalized by (n - 1)(n - 2) / 2
    pub betweenness: f64,
    /// Weighted blend of degree and betweenness
    pub blended: f64,
}

/// One top-ranked node by blended centrality
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyPlayer {
    pub id: String,
    /// Blended centrality used for the ranking
    pub score: f64,
    pub degree: f64,
    pub betweenness: f64,
}

/// One detected community
#[derive(Debug, Clone, Serialize)]
pub struct Community {
    pub id: usize,
    pub entity_ids: Vec<String>,
}

/// How path length is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMetric {
    /// Each edge costs 1
    Hops,
    /// Each edge costs its accumulated weight
    Weight,
}

/// Result of a point-to-point path query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PathOutcome {
    Found { nodes: Vec<String>, cost: f64 },
    NoPath,
    NodeNotFound(String),
}

/// The full output of one network analysis run
#[derive(Debug, Clone, Serialize)]
pub struct NetworkAnalysisResult {
    pub node_count: usize,
    pub edge_count: usize,
    /// Distinct ordered pairs / n(n - 1); 0.0 when n < 2
    pub density: f64,
    pub centrality: Vec<CentralityScore>,
    pub communities: Vec<Community>,
    /// Weakly connected components
    pub cluster_count: usize,
    /// Top entities by blended centrality
    pub key_players: Vec<KeyPlayer>,
    /// Structural patterns (hub nodes)
    pub structural_patterns: Vec<Pattern>,
    /// True when betweenness was skipped for scale and the blend fell
    /// back to degree alone
    pub approximate: bool,
    pub payload: GraphPayload,
}

/// Runs the structural metrics over one investigation graph
pub struct NetworkAnalyzer {
    config: GraphConfig,
}

impl NetworkAnalyzer {
    /// Create an analyzer, failing fast on an invalid configuration.
    pub fn new(config: &GraphConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
        })
    }

    /// Analyze a snapshot end to end: build the graph, compute every
    /// metric, and return the combined result.
    pub fn analyze(&self, snapshot: &InvestigationSnapshot) -> NetworkAnalysisResult {
        let graph = NetworkGraph::build(snapshot);
        self.analyze_graph(&graph)
    }

    /// Analyze an already-built graph.
    pub fn analyze_graph(&self, graph: &NetworkGraph) -> NetworkAnalysisResult {
        let n = graph.node_count();
        info!(nodes = n, edges = graph.edge_count(), "analyzing network");

        let adjacency = graph.undirected_adjacency();

        let degree = degree_centrality(&adjacency);

        // Betweenness is O(V*E); past the node guard we degrade to a
        // degree-only blend rather than stall the analysis.
        let approximate = n > self.config.max_betweenness_nodes;
        let betweenness = if approximate {
            debug!(
                nodes = n,
                limit = self.config.max_betweenness_nodes,
                "skipping exact betweenness, degree-only blend"
            );
            vec![0.0; n]
        } else {
            betweenness_centrality(&adjacency)
        };

        let centrality = self.blend_centrality(graph, &degree, &betweenness, approximate);
        let key_players = self.key_players(&centrality);
        let communities = louvain_communities(graph, &adjacency);
        let structural_patterns = self.hub_patterns(graph, &adjacency);

        let density = if n < 2 {
            0.0
        } else {
            graph.distinct_pair_count() as f64 / (n * (n - 1)) as f64
        };

        NetworkAnalysisResult {
            node_count: n,
            edge_count: graph.edge_count(),
            density,
            centrality,
            communities,
            cluster_count: connected_components(graph.inner()),
            key_players,
            structural_patterns,
            approximate,
            payload: graph.to_payload(),
        }
    }

    /// Shortest path between two entities over the undirected projection,
    /// so that `a -> b` and `b -> a` queries always agree.
    pub fn shortest_path(
        &self,
        graph: &NetworkGraph,
        from: &str,
        to: &str,
        metric: PathMetric,
    ) -> PathOutcome {
        let Some(src) = graph.node_index(from) else {
            return PathOutcome::NodeNotFound(from.to_string());
        };
        let Some(dst) = graph.node_index(to) else {
            return PathOutcome::NodeNotFound(to.to_string());
        };
        if src == dst {
            return PathOutcome::Found {
                nodes: vec![from.to_string()],
                cost: 0.0,
            };
        }

        let adjacency = graph.undirected_adjacency();
        let found = match metric {
            PathMetric::Hops => bfs_path(&adjacency, src.index(), dst.index()),
            PathMetric::Weight => dijkstra_path(&adjacency, src.index(), dst.index()),
        };

        match found {
            Some((path, cost)) => PathOutcome::Found {
                nodes: path
                    .into_iter()
                    .map(|i| {
                        graph
                            .node_id(petgraph::graph::NodeIndex::new(i))
                            .to_string()
                    })
                    .collect(),
                cost,
            },
            None => PathOutcome::NoPath,
        }
    }

    fn blend_centrality(
        &self,
        graph: &NetworkGraph,
        degree: &[f64],
        betweenness: &[f64],
        approximate: bool,
    ) -> Vec<CentralityScore> {
        let (dw, bw) = if approximate {
            (1.0, 0.0)
        } else {
            (self.config.degree_weight, self.config.betweenness_weight)
        };

        let mut scores: Vec<CentralityScore> = (0..graph.node_count())
            .map(|i| CentralityScore {
                entity_id: graph
                    .node_id(petgraph::graph::NodeIndex::new(i))
                    .to_string(),
                degree: degree[i],
                betweenness: betweenness[i],
                blended: dw * degree[i] + bw * betweenness[i],
            })
            .collect();
        scores.sort_by(|a, b| {
            b.blended
                .total_cmp(&a.blended)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
        scores
    }

    /// Top entities by blended centrality, ties broken by identifier.
    fn key_players(&self, centrality: &[CentralityScore]) -> Vec<KeyPlayer> {
        centrality
            .iter()
            .take(self.config.key_player_count)
            .map(|c| KeyPlayer {
                id: c.entity_id.clone(),
                score: c.blended,
                degree: c.degree,
                betweenness: c.betweenness,
            })
            .collect()
    }

    /// Hub nodes: raw degree beyond mean + sigma * stddev and at least the
    /// configured floor. Each hub is reported as one structural pattern.
    fn hub_patterns(&self, graph: &NetworkGraph, adjacency: &[Vec<(usize, f64)>]) -> Vec<Pattern> {
        let n = adjacency.len();
        if n == 0 {
            return vec![];
        }

        let degrees: Vec<f64> = adjacency.iter().map(|a| a.len() as f64).collect();
        let mean = degrees.iter().sum::<f64>() / n as f64;
        let variance = degrees.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n as f64;
        let std_dev = variance.sqrt();
        let threshold = mean + self.config.hub_sigma * std_dev;

        let mut patterns: Vec<Pattern> = adjacency
            .iter()
            .enumerate()
            .filter(|(_, a)| {
                a.len() >= self.config.hub_min_degree && a.len() as f64 > threshold
            })
            .map(|(i, a)| {
                let id = graph.node_id(petgraph::graph::NodeIndex::new(i)).to_string();
                let deg = a.len();
                let sigmas = if std_dev > f64::EPSILON {
                    (deg as f64 - mean) / std_dev
                } else {
                    self.config.hub_sigma
                };
                let severity = if sigmas >= 2.0 * self.config.hub_sigma {
                    Severity::High
                } else {
                    Severity::Medium
                };
                Pattern::new(
                    "NetworkHub",
                    severity,
                    (0.5 + 0.1 * (sigmas - self.config.hub_sigma)).clamp(0.5, 1.0),
                    format!("Entity {id} is a network hub with {deg} connections"),
                    format!(
                        "{id} has {deg} distinct connections against a network \
                         mean of {mean:.1}, placing it {sigmas:.1} standard \
                         deviations above typical connectivity"
                    ),
                    vec![id],
                )
                .with_evidence("degree", json!(deg))
                .with_evidence("mean_degree", json!(mean))
            })
            .collect();
        patterns.sort_by(|a, b| a.entities.cmp(&b.entities));
        patterns
    }
}

/// Degree centrality normalized by (n - 1). Uses distinct neighbors, so
/// parallel edges do not inflate degree.
fn degree_centrality(adjacency: &[Vec<(usize, f64)>]) -> Vec<f64> {
    let n = adjacency.len();
    if n < 2 {
        return vec![0.0; n];
    }
    adjacency
        .iter()
        .map(|a| a.len() as f64 / (n - 1) as f64)
        .collect()
}

/// Brandes' betweenness centrality over the unweighted undirected
/// projection, normalized by (n - 1)(n - 2) / 2. O(V * E).
fn betweenness_centrality(adjacency: &[Vec<(usize, f64)>]) -> Vec<f64> {
    let n = adjacency.len();
    let mut centrality = vec![0.0_f64; n];
    if n < 3 {
        return centrality;
    }

    let mut stack: Vec<usize> = Vec::with_capacity(n);
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut sigma = vec![0.0_f64; n];
    let mut dist = vec![-1_i64; n];
    let mut delta = vec![0.0_f64; n];
    let mut queue: VecDeque<usize> = VecDeque::new();

    for s in 0..n {
        stack.clear();
        queue.clear();
        for v in 0..n {
            predecessors[v].clear();
            sigma[v] = 0.0;
            dist[v] = -1;
            delta[v] = 0.0;
        }
        sigma[s] = 1.0;
        dist[s] = 0;
        queue.push_back(s);

        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for &(w, _) in &adjacency[v] {
                if dist[w] < 0 {
                    dist[w] = dist[v] + 1;
                    queue.push_back(w);
                }
                if dist[w] == dist[v] + 1 {
                    sigma[w] += sigma[v];
                    predecessors[w].push(v);
                }
            }
        }

        // Dependency accumulation in reverse BFS order
        while let Some(w) = stack.pop() {
            for &v in &predecessors[w] {
                delta[v] += (sigma[v] / sigma[w]) * (1.0 + delta[w]);
            }
            if w != s {
                centrality[w] += delta[w];
            }
        }
    }

    // Each undirected pair was counted from both endpoints
    let norm = ((n - 1) * (n - 2)) as f64 / 2.0;
    for c in &mut centrality {
        *c /= 2.0;
        *c /= norm;
    }
    centrality
}

/// One-level Louvain community detection over the weighted undirected
/// projection. Nodes are visited in index order and moves are applied
/// greedily, so the partition is deterministic for a given graph.
fn louvain_communities(graph: &NetworkGraph, adjacency: &[Vec<(usize, f64)>]) -> Vec<Community> {
    let n = adjacency.len();
    if n == 0 {
        return vec![];
    }

    let node_degree: Vec<f64> = adjacency
        .iter()
        .map(|a| a.iter().map(|(_, w)| w).sum())
        .collect();
    let two_m: f64 = node_degree.iter().sum();

    let mut community: Vec<usize> = (0..n).collect();

    if two_m > f64::EPSILON {
        // Sum of degrees per community, kept incremental across moves
        let mut community_degree = node_degree.clone();

        let mut improved = true;
        let mut rounds = 0;
        while improved && rounds < 10 {
            improved = false;
            rounds += 1;

            for node in 0..n {
                let current = community[node];
                let k_i = node_degree[node];

                // Weight from node into each neighboring community
                let mut links: BTreeMap<usize, f64> = BTreeMap::new();
                for &(nbr, w) in &adjacency[node] {
                    *links.entry(community[nbr]).or_insert(0.0) += w;
                }

                let k_in_current = links.get(&current).copied().unwrap_or(0.0);
                community_degree[current] -= k_i;

                let mut best = current;
                let mut best_gain = 0.0_f64;
                for (&cand, &k_in) in &links {
                    if cand == current {
                        continue;
                    }
                    let gain = (k_in - k_in_current) / two_m
                        - k_i * (community_degree[cand] - community_degree[current])
                            / (two_m * two_m);
                    if gain > best_gain + 1e-12 {
                        best_gain = gain;
                        best = cand;
                    }
                }

                community_degree[best] += k_i;
                if best != current {
                    community[node] = best;
                    improved = true;
                }
            }
        }
    }

    // Renumber communities by first appearance for stable output
    let mut renumber: FxHashMap<usize, usize> = FxHashMap::default();
    let mut members: Vec<Vec<String>> = Vec::new();
    for (node, &comm) in community.iter().enumerate() {
        let next = members.len();
        let idx = *renumber.entry(comm).or_insert(next);
        if idx == members.len() {
            members.push(Vec::new());
        }
        members[idx].push(
            graph
                .node_id(petgraph::graph::NodeIndex::new(node))
                .to_string(),
        );
    }

    members
        .into_iter()
        .enumerate()
        .map(|(id, mut entity_ids)| {
            entity_ids.sort_unstable();
            Community { id, entity_ids }
        })
        .collect()
}

/// BFS shortest path by hop count. Returns the node sequence and cost.
fn bfs_path(adjacency: &[Vec<(usize, f64)>], src: usize, dst: usize) -> Option<(Vec<usize>, f64)> {
    let n = adjacency.len();
    let mut parent = vec![usize::MAX; n];
    let mut visited = vec![false; n];
    let mut queue = VecDeque::new();
    visited[src] = true;
    queue.push_back(src);

    while let Some(v) = queue.pop_front() {
        if v == dst {
            let path = reconstruct(&parent, src, dst);
            let cost = (path.len() - 1) as f64;
            return Some((path, cost));
        }
        for &(w, _) in &adjacency[v] {
            if !visited[w] {
                visited[w] = true;
                parent[w] = v;
                queue.push_back(w);
            }
        }
    }
    None
}

/// Dijkstra shortest path by accumulated edge weight.
fn dijkstra_path(
    adjacency: &[Vec<(usize, f64)>],
    src: usize,
    dst: usize,
) -> Option<(Vec<usize>, f64)> {
    use std::cmp::Reverse;
    use std::collections::BinaryHeap;

    let n = adjacency.len();
    let mut dist = vec![f64::INFINITY; n];
    let mut parent = vec![usize::MAX; n];
    let mut heap: BinaryHeap<Reverse<(OrderedCost, usize)>> = BinaryHeap::new();
    dist[src] = 0.0;
    heap.push(Reverse((OrderedCost(0.0), src)));

    while let Some(Reverse((OrderedCost(d), v))) = heap.pop() {
        if v == dst {
            return Some((reconstruct(&parent, src, dst), d));
        }
        if d > dist[v] {
            continue;
        }
        for &(w, weight) in &adjacency[v] {
            let next = d + weight;
            if next < dist[w] {
                dist[w] = next;
                parent[w] = v;
                heap.push(Reverse((OrderedCost(next), w)));
            }
        }
    }
    None
}

fn reconstruct(parent: &[usize], src: usize, dst: usize) -> Vec<usize> {
    let mut path = vec![dst];
    let mut cur = dst;
    while cur != src {
        cur = parent[cur];
        path.push(cur);
    }
    path.reverse();
    path
}

/// Total-order wrapper so finite path costs can live in a BinaryHeap.
#[derive(PartialEq)]
struct OrderedCost(f64);

impl Eq for OrderedCost {}

impl PartialOrd for OrderedCost {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedCost {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}
