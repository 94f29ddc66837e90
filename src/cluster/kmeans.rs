//! K-means with k-means++ seeding

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Output of one k-means fit
#[derive(Debug, Clone)]
pub struct KMeansResult {
    /// Cluster index for every input point, in input order
    pub assignments: Vec<usize>,
    pub centroids: Vec<Vec<f32>>,
    pub iterations: usize,
    /// Sum of squared distances from each point to its centroid
    pub inertia: f64,
}

impl KMeansResult {
    /// Number of points assigned to each cluster
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.centroids.len()];
        for &cluster in &self.assignments {
            sizes[cluster] += 1;
        }
        sizes
    }
}

/// Lloyd's algorithm over Euclidean distance.
///
/// Seeding is driven by a seeded ChaCha8 generator, so the same input and
/// seed always produce the same partition.
pub struct KMeans {
    k: usize,
    max_iterations: usize,
    tolerance: f64,
    seed: u64,
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iterations: 100,
            tolerance: 1e-6,
            seed: 42,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Partition `points` into `min(k, points.len())` non-empty clusters
    pub fn fit(&self, points: &[Vec<f32>]) -> KMeansResult {
        let k = self.k.min(points.len());
        if k == 0 {
            return KMeansResult {
                assignments: Vec::new(),
                centroids: Vec::new(),
                iterations: 0,
                inertia: 0.0,
            };
        }

        let mut centroids = self.kmeans_plus_plus_init(points, k);
        let mut assignments = vec![usize::MAX; points.len()];
        let mut iterations = 0;

        for iteration in 0..self.max_iterations {
            let mut next: Vec<usize> = points.iter().map(|p| nearest(p, &centroids).0).collect();
            reseed_empty_clusters(points, &centroids, &mut next, k);

            let changed = next != assignments;
            assignments = next;

            let updated = compute_means(points, &assignments, k);
            let shift = centroids
                .iter()
                .zip(updated.iter())
                .map(|(a, b)| squared_distance(a, b).sqrt())
                .fold(0.0f64, f64::max);
            centroids = updated;
            iterations = iteration + 1;

            debug!(
                "K-means iteration {}: max centroid shift = {:.6}",
                iteration, shift
            );

            if !changed || shift < self.tolerance {
                break;
            }
        }

        // The last mean update can pull a centroid away from its members
        settle_assignments(points, &mut centroids, &mut assignments, k);

        let inertia = points
            .iter()
            .zip(assignments.iter())
            .map(|(p, &c)| squared_distance(p, &centroids[c]))
            .sum();

        KMeansResult {
            assignments,
            centroids,
            iterations,
            inertia,
        }
    }

    /// Choose initial centroids with probability proportional to squared distance
    fn kmeans_plus_plus_init(&self, points: &[Vec<f32>], k: usize) -> Vec<Vec<f32>> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut chosen = Vec::with_capacity(k);

        chosen.push(rng.gen_range(0..points.len()));

        while chosen.len() < k {
            let distances: Vec<f64> = points
                .iter()
                .map(|p| {
                    chosen
                        .iter()
                        .map(|&c| squared_distance(p, &points[c]))
                        .fold(f64::MAX, f64::min)
                })
                .collect();

            let sum: f64 = distances.iter().sum();
            let next = if sum > 0.0 {
                let target = rng.gen::<f64>() * sum;
                let mut cumsum = 0.0;
                let mut picked = None;
                for (i, &d) in distances.iter().enumerate() {
                    cumsum += d;
                    if d > 0.0 && cumsum >= target {
                        picked = Some(i);
                        break;
                    }
                }
                // Rounding can leave the target just past the final sum
                picked.or_else(|| distances.iter().rposition(|&d| d > 0.0))
            } else {
                None
            };

            // All remaining points coincide with a centroid: take the first unused index
            let next = next
                .or_else(|| (0..points.len()).find(|i| !chosen.contains(i)))
                .unwrap_or(0);
            chosen.push(next);
        }

        chosen.into_iter().map(|i| points[i].clone()).collect()
    }
}

/// Index of and squared distance to the closest centroid (lowest index on ties)
fn nearest(point: &[f32], centroids: &[Vec<f32>]) -> (usize, f64) {
    let mut best = (0, f64::MAX);
    for (i, centroid) in centroids.iter().enumerate() {
        let d = squared_distance(point, centroid);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// Reassign every point to a nearest centroid and fill empty clusters until
/// both hold at once. Reseeded clusters take the adopted point as centroid.
fn settle_assignments(
    points: &[Vec<f32>],
    centroids: &mut [Vec<f32>],
    assignments: &mut [usize],
    k: usize,
) {
    let max_rounds = points.len() + k;
    for _ in 0..max_rounds {
        for (point, assigned) in points.iter().zip(assignments.iter_mut()) {
            let (best, distance) = nearest(point, centroids);
            // Keep the current cluster when it ties with the nearest one
            if *assigned < k && squared_distance(point, &centroids[*assigned]) <= distance {
                continue;
            }
            *assigned = best;
        }

        let moves = reseed_empty_clusters(points, centroids, assignments, k);
        if moves.is_empty() {
            return;
        }
        for (cluster, i) in moves {
            centroids[cluster] = points[i].clone();
        }
    }
}

/// Move the farthest point of a multi-member cluster into each empty cluster.
///
/// Returns the `(cluster, point)` pairs that were moved.
fn reseed_empty_clusters(
    points: &[Vec<f32>],
    centroids: &[Vec<f32>],
    assignments: &mut [usize],
    k: usize,
) -> Vec<(usize, usize)> {
    let mut moves = Vec::new();
    let mut counts = vec![0usize; k];
    for &c in assignments.iter() {
        counts[c] += 1;
    }

    for empty in 0..k {
        if counts[empty] > 0 {
            continue;
        }

        let mut farthest: Option<(usize, f64)> = None;
        for (i, point) in points.iter().enumerate() {
            let current = assignments[i];
            if counts[current] < 2 {
                continue;
            }
            let d = squared_distance(point, &centroids[current]);
            if farthest.map_or(true, |(_, best)| d > best) {
                farthest = Some((i, d));
            }
        }

        if let Some((i, _)) = farthest {
            debug!("Re-seeding empty cluster {} with point {}", empty, i);
            counts[assignments[i]] -= 1;
            assignments[i] = empty;
            counts[empty] += 1;
            moves.push((empty, i));
        }
    }
    moves
}

fn compute_means(points: &[Vec<f32>], assignments: &[usize], k: usize) -> Vec<Vec<f32>> {
    let dim = points.first().map(Vec::len).unwrap_or(0);
    let mut sums = vec![vec![0.0f64; dim]; k];
    let mut counts = vec![0usize; k];

    for (point, &cluster) in points.iter().zip(assignments.iter()) {
        counts[cluster] += 1;
        for (sum, &v) in sums[cluster].iter_mut().zip(point.iter()) {
            *sum += f64::from(v);
        }
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| {
            let n = count.max(1) as f64;
            sum.into_iter().map(|v| (v / n) as f32).collect()
        })
        .collect()
}

pub fn squared_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum()
}
