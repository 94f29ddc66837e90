//! Semantic clustering of crawled pages
//!
//! Embeds the visible text of every crawled page, partitions the vectors with
//! k-means and stores the result as the site's only active clustering.

mod kmeans;

pub use kmeans::*;

use crate::config::{ClusterConfig, EmbeddingConfig};
use crate::embed::{content_hash, embed_in_batches, normalize_embedding, Embedder};
use crate::error::{Error, Result};
use crate::parse::truncate_chars;
use crate::store::{ClusterAssignment, ClusterRecord, GraphStore, PageStatus, StoredEmbedding};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// One cluster of a clustering run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub id: String,
    pub label: String,
    pub page_count: usize,
    pub centroid: Vec<f32>,
}

/// Outcome of [`ClusterEngine::run`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterResult {
    pub site_id: String,
    /// Exactly one entry per clustered page
    pub assignments: Vec<ClusterAssignment>,
    pub clusters: Vec<ClusterInfo>,
    /// Pages embedded by the provider during this run
    pub embedded: usize,
    /// Pages whose embedding came from the cache
    pub cached: usize,
    pub iterations: usize,
}

struct Candidate {
    page_id: String,
    text: String,
    hash: String,
}

pub struct ClusterEngine {
    store: Arc<dyn GraphStore>,
    embedder: Box<dyn Embedder>,
    embedding: EmbeddingConfig,
    config: ClusterConfig,
}

impl ClusterEngine {
    pub fn new(
        store: Arc<dyn GraphStore>,
        embedder: Box<dyn Embedder>,
        embedding: EmbeddingConfig,
        config: ClusterConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            embedding,
            config,
        }
    }

    /// Cluster the crawled, text-bearing pages of `site_id` into `k` groups.
    ///
    /// Fails with [`Error::InsufficientData`] when fewer than `k` pages have
    /// text. A successful run replaces every earlier cluster of the site.
    pub async fn run(&self, site_id: &str, k: usize) -> Result<ClusterResult> {
        if k == 0 {
            return Err(Error::Config("Cluster count k must be at least 1".to_string()));
        }

        let candidates: Vec<Candidate> = self
            .store
            .list_pages(site_id)
            .await?
            .into_iter()
            .filter(|p| p.get_status().ok() == Some(PageStatus::Crawled))
            .filter(|p| !p.text.trim().is_empty())
            .map(|p| {
                let text = truncate_chars(&p.text, self.embedding.max_input_chars).to_string();
                Candidate {
                    hash: content_hash(&text),
                    page_id: p.id,
                    text,
                }
            })
            .collect();

        if candidates.len() < k {
            return Err(Error::InsufficientData {
                requested: k,
                available: candidates.len(),
            });
        }

        info!(
            "Clustering {} pages of {} into {} clusters",
            candidates.len(),
            site_id,
            k
        );

        let (vectors, embedded) = self.embeddings_for(site_id, &candidates).await?;
        let cached = candidates.len() - embedded;

        let points: Vec<Vec<f32>> = vectors.iter().map(|v| normalize_embedding(v)).collect();
        let fit = KMeans::new(k)
            .with_max_iterations(self.config.max_iterations)
            .with_tolerance(self.config.tolerance)
            .with_seed(self.config.seed)
            .fit(&points);

        let sizes = fit.cluster_sizes();
        let records = fit
            .centroids
            .iter()
            .enumerate()
            .map(|(i, centroid)| ClusterRecord::new(site_id, i, centroid, sizes[i]))
            .collect::<Result<Vec<_>>>()?;

        let assignments: Vec<ClusterAssignment> = candidates
            .iter()
            .zip(fit.assignments.iter())
            .map(|(candidate, &cluster)| ClusterAssignment {
                page_id: candidate.page_id.clone(),
                cluster_id: records[cluster].id.clone(),
            })
            .collect();

        self.store
            .replace_clusters(site_id, &records, &assignments)
            .await?;

        info!(
            "Clustered {} pages into {} clusters in {} iterations ({} embedded, {} cached)",
            assignments.len(),
            records.len(),
            fit.iterations,
            embedded,
            cached
        );

        let clusters = records
            .iter()
            .zip(fit.centroids)
            .map(|(record, centroid)| ClusterInfo {
                id: record.id.clone(),
                label: record.label.clone(),
                page_count: record.page_count as usize,
                centroid,
            })
            .collect();

        Ok(ClusterResult {
            site_id: site_id.to_string(),
            assignments,
            clusters,
            embedded,
            cached,
            iterations: fit.iterations,
        })
    }

    /// Vectors for every candidate in order, reusing cached embeddings whose
    /// content hash and model still match. Returns the number freshly embedded.
    async fn embeddings_for(
        &self,
        site_id: &str,
        candidates: &[Candidate],
    ) -> Result<(Vec<Vec<f32>>, usize)> {
        let model = self.embedder.model_name().to_string();
        let dimension = self.embedder.dimension();

        let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(candidates.len());
        let mut missing = Vec::new();

        for (i, candidate) in candidates.iter().enumerate() {
            let cached = self
                .store
                .get_embedding(site_id, &candidate.page_id)
                .await?
                .filter(|e| {
                    e.content_hash == candidate.hash
                        && e.model == model
                        && e.vector.len() == dimension
                });
            if cached.is_none() {
                missing.push(i);
            }
            vectors.push(cached.map(|e| e.vector));
        }

        debug!(
            "{} of {} pages need embedding",
            missing.len(),
            candidates.len()
        );

        let texts: Vec<String> = missing
            .iter()
            .map(|&i| candidates[i].text.clone())
            .collect();
        let fresh =
            embed_in_batches(self.embedder.as_ref(), texts, self.embedding.batch_size).await?;
        if fresh.len() != missing.len() {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                missing.len(),
                fresh.len()
            )));
        }

        for (&i, vector) in missing.iter().zip(fresh) {
            let candidate = &candidates[i];
            self.store
                .save_embedding(&StoredEmbedding {
                    site_id: site_id.to_string(),
                    page_id: candidate.page_id.clone(),
                    content_hash: candidate.hash.clone(),
                    model: model.clone(),
                    vector: vector.clone(),
                })
                .await?;
            vectors[i] = Some(vector);
        }

        let vectors = vectors
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::Embedding("Missing embedding for a page".to_string()))?;

        Ok((vectors, missing.len()))
    }
}
