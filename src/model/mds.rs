//! Metric multidimensional scaling (SMACOF)
//!
//! Embeds a precomputed dissimilarity matrix into a low-dimensional space by
//! majorizing the raw stress with Guttman transforms. Several random starts
//! are run and the configuration with the lowest stress is kept.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// SMACOF parameters
#[derive(Debug, Clone)]
pub struct Mds {
    /// Output dimensionality
    pub n_components: usize,

    /// Number of random starts
    pub n_init: usize,

    /// Iteration cap per start
    pub max_iter: usize,

    /// Relative stress tolerance for convergence
    pub eps: f64,

    /// Seed for the random starts
    pub seed: u64,
}

impl Default for Mds {
    fn default() -> Self {
        Self {
            n_components: 2,
            n_init: 4,
            max_iter: 300,
            eps: 1e-3,
            seed: 0,
        }
    }
}

/// Embedding result
#[derive(Debug, Clone)]
pub struct Embedding {
    /// One coordinate vector per input row
    pub points: Vec<Vec<f64>>,

    /// Raw stress of the embedding
    pub stress: f64,
}

impl Mds {
    /// Two-dimensional MDS with the given seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Embed a symmetric dissimilarity matrix
    pub fn fit(&self, dissimilarities: &[Vec<f64>]) -> Embedding {
        let n = dissimilarities.len();

        if n <= 1 {
            return Embedding {
                points: vec![vec![0.0; self.n_components]; n],
                stress: 0.0,
            };
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut best: Option<Embedding> = None;

        for _ in 0..self.n_init.max(1) {
            let candidate = self.smacof_single(dissimilarities, &mut rng);
            if best.as_ref().map_or(true, |b| candidate.stress < b.stress) {
                best = Some(candidate);
            }
        }

        best.unwrap_or(Embedding {
            points: vec![vec![0.0; self.n_components]; n],
            stress: 0.0,
        })
    }

    fn smacof_single(&self, delta: &[Vec<f64>], rng: &mut ChaCha8Rng) -> Embedding {
        let n = delta.len();
        let dims = self.n_components;

        let mut x: Vec<Vec<f64>> = (0..n)
            .map(|_| (0..dims).map(|_| rng.gen::<f64>()).collect())
            .collect();

        let mut old_stress: Option<f64> = None;
        let mut stress = f64::INFINITY;

        for iteration in 0..self.max_iter {
            let dis = euclidean_distances(&x);

            stress = 0.0;
            for i in 0..n {
                for j in (i + 1)..n {
                    let diff = dis[i][j] - delta[i][j];
                    stress += diff * diff;
                }
            }

            // Guttman transform: X <- B(X) X / n
            let mut b = vec![vec![0.0; n]; n];
            for i in 0..n {
                let mut row_sum = 0.0;
                for j in 0..n {
                    if i != j && dis[i][j] > 0.0 {
                        let ratio = delta[i][j] / dis[i][j];
                        b[i][j] = -ratio;
                        row_sum += ratio;
                    }
                }
                b[i][i] = row_sum;
            }

            let mut next = vec![vec![0.0; dims]; n];
            for i in 0..n {
                for j in 0..n {
                    if b[i][j] != 0.0 {
                        for k in 0..dims {
                            next[i][k] += b[i][j] * x[j][k];
                        }
                    }
                }
                for value in next[i].iter_mut() {
                    *value /= n as f64;
                }
            }
            x = next;

            let norm: f64 = x
                .iter()
                .map(|row| row.iter().map(|v| v * v).sum::<f64>().sqrt())
                .sum();
            if norm <= 0.0 {
                break;
            }

            let relative = stress / norm;
            if let Some(old) = old_stress {
                if old - relative < self.eps {
                    tracing::trace!(iteration, stress, "SMACOF converged");
                    break;
                }
            }
            old_stress = Some(relative);
        }

        Embedding { points: x, stress }
    }
}

/// Pairwise Euclidean distances between rows
pub fn euclidean_distances(points: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut dis = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in (i + 1)..n {
            let d = points[i]
                .iter()
                .zip(&points[j])
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            dis[i][j] = d;
            dis[j][i] = d;
        }
    }

    dis
}
