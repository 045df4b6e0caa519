//! Structural analysis over an undirected view of the graph.
//!
//! A [`GraphSnapshot`] is built from one read of the store and answers
//! every structural query from that read, so results are deterministic for
//! a fixed graph state. Edge direction only matters for influence; every
//! other algorithm treats an edge as traversable both ways.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use noesis_types::{KnowledgeNode, NodeId, Relationship};
use serde::{Deserialize, Serialize};

use crate::config::InfluenceWeights;

/// Link counts and the weighted score derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Influence {
    pub node_id: NodeId,
    pub inbound_count: usize,
    pub outbound_count: usize,
    pub influence_score: f64,
}

impl Influence {
    pub fn from_counts(
        node_id: NodeId,
        inbound_count: usize,
        outbound_count: usize,
        weights: &InfluenceWeights,
    ) -> Self {
        Self {
            node_id,
            inbound_count,
            outbound_count,
            influence_score: weights.score(inbound_count, outbound_count),
        }
    }
}

/// A node reached by a neighborhood traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborhoodEntry {
    pub node: KnowledgeNode,
    /// Hops from the origin.
    pub distance: usize,
}

/// A connected component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Member ids in ascending order.
    pub members: Vec<NodeId>,
    pub size: usize,
}

/// An articulation point of the undirected graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeNode {
    pub node: KnowledgeNode,
    /// Distinct neighbors.
    pub degree: usize,
    /// Pieces its own component splits into when the node is removed.
    pub components_after_removal: usize,
}

/// Active nodes and the edges between them.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    nodes: BTreeMap<NodeId, KnowledgeNode>,
    adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>,
    inbound: BTreeMap<NodeId, usize>,
    outbound: BTreeMap<NodeId, usize>,
}

impl GraphSnapshot {
    /// Build a snapshot. Edges with an endpoint outside `nodes` are ignored.
    pub fn new(nodes: Vec<KnowledgeNode>, edges: &[Relationship]) -> Self {
        let nodes: BTreeMap<NodeId, KnowledgeNode> =
            nodes.into_iter().map(|n| (n.id.clone(), n)).collect();

        let mut adjacency: BTreeMap<NodeId, BTreeSet<NodeId>> = nodes
            .keys()
            .map(|id| (id.clone(), BTreeSet::new()))
            .collect();
        let mut inbound = BTreeMap::new();
        let mut outbound = BTreeMap::new();

        for edge in edges {
            if !nodes.contains_key(&edge.source_id) || !nodes.contains_key(&edge.target_id) {
                continue;
            }
            if edge.source_id == edge.target_id {
                continue;
            }
            *outbound.entry(edge.source_id.clone()).or_insert(0) += 1;
            *inbound.entry(edge.target_id.clone()).or_insert(0) += 1;

            if let Some(set) = adjacency.get_mut(&edge.source_id) {
                set.insert(edge.target_id.clone());
            }
            if let Some(set) = adjacency.get_mut(&edge.target_id) {
                set.insert(edge.source_id.clone());
            }
        }

        Self {
            nodes,
            adjacency,
            inbound,
            outbound,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &NodeId) -> Option<&KnowledgeNode> {
        self.nodes.get(id)
    }

    /// Distinct neighbors in either direction, in id order.
    pub fn neighbors(&self, id: &NodeId) -> impl Iterator<Item = &NodeId> {
        self.adjacency.get(id).into_iter().flatten()
    }

    pub fn influence(&self, id: &NodeId, weights: &InfluenceWeights) -> Option<Influence> {
        self.nodes.contains_key(id).then(|| {
            Influence::from_counts(
                id.clone(),
                self.inbound.get(id).copied().unwrap_or(0),
                self.outbound.get(id).copied().unwrap_or(0),
                weights,
            )
        })
    }

    /// Every node's influence, highest first, id as tie-break.
    pub fn influence_ranking(&self, weights: &InfluenceWeights) -> Vec<Influence> {
        let mut ranking: Vec<Influence> = self
            .nodes
            .keys()
            .filter_map(|id| self.influence(id, weights))
            .collect();
        ranking.sort_by(|a, b| {
            b.influence_score
                .total_cmp(&a.influence_score)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        ranking
    }

    /// Breadth-first traversal up to `depth` hops, ordered by (distance, id).
    ///
    /// The origin is reported at distance 0 only when `include_origin` is set.
    pub fn neighborhood(
        &self,
        origin: &NodeId,
        depth: usize,
        include_origin: bool,
    ) -> Vec<NeighborhoodEntry> {
        if !self.nodes.contains_key(origin) {
            return Vec::new();
        }

        let mut reached: BTreeMap<&NodeId, usize> = BTreeMap::new();
        let mut queue = VecDeque::new();
        reached.insert(origin, 0);
        queue.push_back(origin);

        while let Some(current) = queue.pop_front() {
            let distance = reached[current];
            if distance >= depth {
                continue;
            }
            for next in self.neighbors(current) {
                if !reached.contains_key(next) {
                    reached.insert(next, distance + 1);
                    queue.push_back(next);
                }
            }
        }

        let mut entries: Vec<NeighborhoodEntry> = reached
            .into_iter()
            .filter(|(id, _)| include_origin || *id != origin)
            .filter_map(|(id, distance)| {
                self.nodes.get(id).map(|node| NeighborhoodEntry {
                    node: node.clone(),
                    distance,
                })
            })
            .collect();
        entries.sort_by(|a, b| {
            a.distance
                .cmp(&b.distance)
                .then_with(|| a.node.id.cmp(&b.node.id))
        });
        entries
    }

    /// Connected components with at least `min_size` members.
    ///
    /// Singletons count as components; a `min_size` of 0 behaves as 1.
    /// Ordered by size descending, then by smallest member id.
    pub fn clusters(&self, min_size: usize) -> Vec<Cluster> {
        let min_size = min_size.max(1);
        let mut visited: BTreeSet<&NodeId> = BTreeSet::new();
        let mut clusters = Vec::new();

        for start in self.nodes.keys() {
            if !visited.insert(start) {
                continue;
            }

            let mut members = vec![start.clone()];
            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                for next in self.neighbors(current) {
                    if visited.insert(next) {
                        members.push(next.clone());
                        queue.push_back(next);
                    }
                }
            }

            if members.len() >= min_size {
                members.sort();
                clusters.push(Cluster {
                    size: members.len(),
                    members,
                });
            }
        }

        clusters.sort_by(|a, b| {
            b.size
                .cmp(&a.size)
                .then_with(|| a.members.first().cmp(&b.members.first()))
        });
        clusters
    }

    /// Articulation points, ordered by id.
    ///
    /// Uses an iterative low-link depth-first search so deep chains cannot
    /// overflow the stack.
    pub fn bridge_nodes(&self) -> Vec<BridgeNode> {
        let ids: Vec<&NodeId> = self.nodes.keys().collect();
        let index: BTreeMap<&NodeId, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let adjacency: Vec<Vec<usize>> = ids
            .iter()
            .map(|id| self.neighbors(id).filter_map(|n| index.get(n).copied()).collect())
            .collect();

        let n = ids.len();
        let mut discovered: Vec<Option<usize>> = vec![None; n];
        let mut low = vec![0usize; n];
        // Components a node's removal leaves behind, counted per DFS child.
        let mut pieces = vec![0usize; n];
        let mut timer = 0usize;

        for root in 0..n {
            if discovered[root].is_some() {
                continue;
            }
            discovered[root] = Some(timer);
            low[root] = timer;
            timer += 1;

            let mut root_children = 0usize;
            // (vertex, parent, next neighbor index)
            let mut stack: Vec<(usize, Option<usize>, usize)> = vec![(root, None, 0)];

            while let Some(frame) = stack.last_mut() {
                let (v, parent) = (frame.0, frame.1);

                if frame.2 < adjacency[v].len() {
                    let w = adjacency[v][frame.2];
                    frame.2 += 1;

                    if Some(w) == parent {
                        continue;
                    }
                    match discovered[w] {
                        Some(disc_w) => low[v] = low[v].min(disc_w),
                        None => {
                            discovered[w] = Some(timer);
                            low[w] = timer;
                            timer += 1;
                            if v == root {
                                root_children += 1;
                            }
                            stack.push((w, Some(v), 0));
                        }
                    }
                } else {
                    stack.pop();
                    if let Some(p) = parent {
                        low[p] = low[p].min(low[v]);
                        if p != root && discovered[p].is_some_and(|disc_p| low[v] >= disc_p) {
                            pieces[p] += 1;
                        }
                    }
                }
            }

            if root_children >= 2 {
                pieces[root] = root_children - 1;
            }
        }

        (0..n)
            .filter(|&i| pieces[i] > 0)
            .filter_map(|i| {
                self.nodes.get(ids[i]).map(|node| BridgeNode {
                    node: node.clone(),
                    degree: adjacency[i].len(),
                    components_after_removal: pieces[i] + 1,
                })
            })
            .collect()
    }
}
