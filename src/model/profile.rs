//! Document topic profiles and profile distances

/// Topic prior p(t) from Θ, normalized over topics
///
/// `theta` is indexed `[document][topic]`. A Θ with no mass yields a uniform
/// prior.
pub fn topic_probabilities(theta: &[Vec<f64>], topics: usize) -> Vec<f64> {
    let mut p_t = vec![0.0; topics];
    for theta_d in theta {
        for (t, value) in theta_d.iter().enumerate().take(topics) {
            p_t[t] += value;
        }
    }

    let total: f64 = p_t.iter().sum();
    if total > 0.0 {
        p_t.iter_mut().for_each(|p| *p /= total);
    } else if topics > 0 {
        p_t.fill(1.0 / topics as f64);
    }
    p_t
}

/// Bayes inversion p(t | a) of one Φ row
///
/// profile[t] = φ[a,t]·p(t) / Σ φ[a,t']·p(t'). A zero denominator yields the
/// uniform profile.
pub fn topic_profile(phi_row: &[f64], p_t: &[f64]) -> Vec<f64> {
    let weighted: Vec<f64> = phi_row.iter().zip(p_t).map(|(phi, p)| phi * p).collect();
    let total: f64 = weighted.iter().sum();

    if total > 0.0 {
        weighted.into_iter().map(|w| w / total).collect()
    } else {
        vec![1.0 / p_t.len().max(1) as f64; p_t.len()]
    }
}

/// Pairwise cosine distances, 1 − cos
///
/// Zero vectors are at distance 1 from every other vector. The diagonal is 0.
pub fn cosine_distances(vectors: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = vectors.len();
    let norms: Vec<f64> = vectors
        .iter()
        .map(|v| v.iter().map(|x| x * x).sum::<f64>().sqrt())
        .collect();

    let mut distances = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let distance = if norms[i] > 0.0 && norms[j] > 0.0 {
                let dot: f64 = vectors[i].iter().zip(&vectors[j]).map(|(a, b)| a * b).sum();
                (1.0 - dot / (norms[i] * norms[j])).max(0.0)
            } else {
                1.0
            };
            distances[i][j] = distance;
            distances[j][i] = distance;
        }
    }
    distances
}
