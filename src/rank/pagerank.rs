//! Damped PageRank over a directed link graph

use std::collections::{HashMap, HashSet};

/// Directed graph of pages keyed by URL.
///
/// Self-loops and repeated edges are dropped on insertion so each page
/// splits its score evenly over its distinct outbound targets.
#[derive(Debug, Default)]
pub struct LinkGraph {
    urls: Vec<String>,
    index: HashMap<String, usize>,
    out_links: Vec<Vec<usize>>,
    edges: HashSet<(usize, usize)>,
    in_degree: Vec<usize>,
}

impl LinkGraph {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut graph = Self::default();
        for url in urls {
            let url = url.into();
            if graph.index.contains_key(&url) {
                continue;
            }
            graph.index.insert(url.clone(), graph.urls.len());
            graph.urls.push(url);
            graph.out_links.push(Vec::new());
            graph.in_degree.push(0);
        }
        graph
    }

    /// Add `from -> to`; returns false for unknown endpoints, self-loops and duplicates
    pub fn add_edge(&mut self, from: &str, to: &str) -> bool {
        let (Some(&f), Some(&t)) = (self.index.get(from), self.index.get(to)) else {
            return false;
        };
        if f == t || !self.edges.insert((f, t)) {
            return false;
        }
        self.out_links[f].push(t);
        self.in_degree[t] += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn index_of(&self, url: &str) -> Option<usize> {
        self.index.get(url).copied()
    }

    pub fn url(&self, node: usize) -> &str {
        &self.urls[node]
    }

    /// Number of distinct pages linking to `node`
    pub fn in_degree(&self, node: usize) -> usize {
        self.in_degree[node]
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

/// Scores from one PageRank computation, indexed like the graph's nodes
#[derive(Debug, Clone)]
pub struct PageRankOutcome {
    pub scores: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Uniform teleport distribution over `n` nodes
pub fn uniform_teleport(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f64; n]
}

/// Teleport distribution spread evenly over `seeds` and zero elsewhere
pub fn seeded_teleport(n: usize, seeds: &[usize]) -> Vec<f64> {
    let unique: HashSet<usize> = seeds.iter().copied().filter(|&s| s < n).collect();
    if unique.is_empty() {
        return uniform_teleport(n);
    }
    let weight = 1.0 / unique.len() as f64;
    (0..n)
        .map(|i| if unique.contains(&i) { weight } else { 0.0 })
        .collect()
}

/// Power iteration of damped PageRank.
///
/// `teleport` is the restart distribution (uniform for classic PageRank,
/// concentrated on seed pages for topic-sensitive PageRank) and must sum to 1.
/// Mass held by pages without outbound links is redistributed along the
/// teleport distribution, so the scores always sum to 1. Iteration stops once
/// the L1 change between rounds drops below `tolerance` or after
/// `max_iterations` rounds.
pub fn pagerank(
    graph: &LinkGraph,
    teleport: &[f64],
    damping: f64,
    tolerance: f64,
    max_iterations: usize,
) -> PageRankOutcome {
    let n = graph.len();
    if n == 0 {
        return PageRankOutcome {
            scores: Vec::new(),
            iterations: 0,
            converged: true,
        };
    }

    let mut scores = vec![1.0 / n as f64; n];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        let dangling: f64 = (0..n)
            .filter(|&i| graph.out_links[i].is_empty())
            .map(|i| scores[i])
            .sum();

        let mut next: Vec<f64> = teleport
            .iter()
            .map(|&t| (1.0 - damping) * t + damping * dangling * t)
            .collect();

        for (source, targets) in graph.out_links.iter().enumerate() {
            if targets.is_empty() {
                continue;
            }
            let share = damping * scores[source] / targets.len() as f64;
            for &target in targets {
                next[target] += share;
            }
        }

        let diff: f64 = next
            .iter()
            .zip(scores.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();

        scores = next;
        iterations += 1;

        if diff < tolerance {
            converged = true;
            break;
        }
    }

    PageRankOutcome {
        scores,
        iterations,
        converged,
    }
}
