//! K-means clustering and cluster profiling.
//!
//! # Algorithm
//!
//! - Initial centroids are `k` points drawn uniformly without replacement
//!   from the distinct input points (no k-means++ spreading). With fewer than
//!   `k` distinct points the draw falls back to input positions, so duplicate
//!   centroids can occur.
//! - Each iteration assigns every point to its nearest centroid (ties go to
//!   the lowest cluster index) and moves each centroid to the mean of its
//!   members. A cluster left without members keeps its previous centroid.
//! - Iteration stops when the summed centroid displacement is below
//!   [`CONVERGENCE_THRESHOLD`] or the budget is spent.
//!
//! # Profiles
//!
//! Every cluster is described by its cohesion (mean member-to-centroid
//! distance) and a per-dimension distinctiveness score
//! `|mean_in − mean_out| / std_all`, ranked descending. A dimension without
//! spread uses a normalizer of 1.

use std::collections::HashSet;

use dealscope_stats::descriptive::{self, euclidean_distance};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result, Warning};

pub const CONVERGENCE_THRESHOLD: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distinctiveness {
    pub dimension: String,
    pub score: f64,
    /// `mean_in − mean_out`, signed.
    pub difference: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub id: usize,
    /// `None` only when profiling an empty membership list.
    pub centroid: Option<Vec<f64>>,
    pub members: Vec<usize>,
    pub size: usize,
    /// Fraction of all points in this cluster.
    pub share: f64,
    pub cohesion: f64,
    pub distinctiveness: Vec<Distinctiveness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub win_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterResult {
    pub clusters: Vec<Cluster>,
    pub centroids: Vec<Vec<f64>>,
    /// Cluster index of every input point.
    pub assignments: Vec<usize>,
    pub iterations: usize,
    pub converged: bool,
    /// Within-cluster sum of squared distances, before each update and after the last.
    pub inertia_history: Vec<f64>,
    pub warnings: Vec<Warning>,
}

/// Runs k-means over `points`.
///
/// `dimensions` names the coordinates for the distinctiveness ranking.
///
/// ```
/// use dealscope_engine::cluster::kmeans;
/// use rand::SeedableRng;
///
/// let points = [0.0, 0.0, 1.0, 10.0, 10.0, 11.0].map(|v| vec![v]).to_vec();
/// let mut rng = rand_pcg::Pcg64::seed_from_u64(42);
/// let result = kmeans(&points, 2, 100, &["amount".to_owned()], &mut rng).unwrap();
///
/// let mut centers = result.centroids.iter().map(|c| c[0]).collect::<Vec<_>>();
/// centers.sort_by(f64::total_cmp);
/// assert!((centers[0] - 1.0 / 3.0).abs() < 1e-9);
/// assert!((centers[1] - 31.0 / 3.0).abs() < 1e-9);
/// ```
pub fn kmeans<R>(
    points: &[Vec<f64>],
    k: usize,
    max_iterations: usize,
    dimensions: &[String],
    rng: &mut R,
) -> Result<ClusterResult>
where
    R: Rng + ?Sized,
{
    if k < 1 || k > points.len() {
        return Err(AnalysisError::InvalidK {
            k,
            points: points.len(),
        });
    }
    if max_iterations == 0 {
        return Err(AnalysisError::validation("max_iterations must be at least 1"));
    }
    validate_points(points, dimensions)?;

    let centroids = initial_centroids(points, k, rng);
    Ok(refine(points, centroids, max_iterations, dimensions))
}

/// Lloyd iterations from the given starting centroids.
fn refine(
    points: &[Vec<f64>],
    mut centroids: Vec<Vec<f64>>,
    max_iterations: usize,
    dimensions: &[String],
) -> ClusterResult {
    let k = centroids.len();
    let mut assignments = assign(points, &centroids);
    let mut inertia_history = vec![];
    let mut converged = false;
    let mut iterations = 0;

    for iteration in 1..=max_iterations {
        inertia_history.push(inertia(points, &centroids, &assignments));

        let mut shift = 0.0;
        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members = (0..points.len()).filter(|&i| assignments[i] == c);
            // an empty cluster keeps its centroid
            if let Some(mean) = mean_point(points, members) {
                shift += euclidean_distance(centroid, &mean);
                *centroid = mean;
            }
        }
        assignments = assign(points, &centroids);
        iterations = iteration;
        tracing::debug!(iteration, shift, "k-means step");
        if shift < CONVERGENCE_THRESHOLD {
            converged = true;
            break;
        }
    }
    inertia_history.push(inertia(points, &centroids, &assignments));

    let memberships = (0..k)
        .map(|c| (0..points.len()).filter(|&i| assignments[i] == c).collect())
        .collect::<Vec<Vec<usize>>>();

    let mut warnings = memberships
        .iter()
        .enumerate()
        .filter(|(_, members)| members.is_empty())
        .map(|(cluster, _)| Warning::EmptyCluster { cluster })
        .collect::<Vec<_>>();
    if !converged {
        warnings.push(Warning::NotConverged { iterations });
    }
    for warning in &warnings {
        tracing::warn!(%warning, "k-means");
    }
    let clusters = memberships
        .into_iter()
        .zip(&centroids)
        .enumerate()
        .map(|(id, (members, centroid))| {
            profile(points, dimensions, id, members, Some(centroid.clone()), None)
        })
        .collect();

    ClusterResult {
        clusters,
        centroids,
        assignments,
        iterations,
        converged,
        inertia_history,
        warnings,
    }
}

/// Profiles externally supplied cluster memberships.
///
/// Centroids are the member means. With `outcomes`, each profile also
/// carries the win rate of its members.
pub fn analyze(
    points: &[Vec<f64>],
    memberships: &[Vec<usize>],
    dimensions: &[String],
    outcomes: Option<&[bool]>,
) -> Result<Vec<Cluster>> {
    if points.is_empty() {
        return Err(AnalysisError::validation("no points to analyze"));
    }
    validate_points(points, dimensions)?;
    if let Some(outcomes) = outcomes.filter(|o| o.len() != points.len()) {
        return Err(AnalysisError::validation(format!(
            "{} outcomes for {} points",
            outcomes.len(),
            points.len()
        )));
    }
    for (c, members) in memberships.iter().enumerate() {
        if let Some(&i) = members.iter().find(|&&i| i >= points.len()) {
            return Err(AnalysisError::validation(format!(
                "cluster {c} references point {i} of {}",
                points.len()
            )));
        }
    }

    Ok(memberships
        .iter()
        .enumerate()
        .map(|(id, members)| {
            let centroid = mean_point(points, members.iter().copied());
            profile(points, dimensions, id, members.clone(), centroid, outcomes)
        })
        .collect())
}

fn validate_points(points: &[Vec<f64>], dimensions: &[String]) -> Result<()> {
    let width = dimensions.len();
    if width == 0 {
        return Err(AnalysisError::validation("points need at least one dimension"));
    }
    for (i, point) in points.iter().enumerate() {
        if point.len() != width {
            return Err(AnalysisError::validation(format!(
                "point {i} has {} coordinates, expected {width}",
                point.len()
            )));
        }
        if point.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::validation(format!(
                "point {i} has a non-finite coordinate"
            )));
        }
    }
    Ok(())
}

fn initial_centroids<R>(points: &[Vec<f64>], k: usize, rng: &mut R) -> Vec<Vec<f64>>
where
    R: Rng + ?Sized,
{
    let mut seen = HashSet::new();
    let distinct = (0..points.len())
        .filter(|&i| seen.insert(point_key(&points[i])))
        .collect::<Vec<_>>();
    let pool = if distinct.len() >= k {
        distinct
    } else {
        (0..points.len()).collect()
    };
    rand::seq::index::sample(rng, pool.len(), k)
        .into_iter()
        .map(|i| points[pool[i]].clone())
        .collect()
}

fn point_key(point: &[f64]) -> Vec<u64> {
    // +0.0 folds -0.0 into the same key
    point.iter().map(|v| (v + 0.0).to_bits()).collect()
}

fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let distance = euclidean_distance(point, centroid);
        if distance < best_distance {
            best = c;
            best_distance = distance;
        }
    }
    best
}

fn assign(points: &[Vec<f64>], centroids: &[Vec<f64>]) -> Vec<usize> {
    points.iter().map(|p| nearest(p, centroids)).collect()
}

fn inertia(points: &[Vec<f64>], centroids: &[Vec<f64>], assignments: &[usize]) -> f64 {
    points
        .iter()
        .zip(assignments)
        .map(|(p, &c)| euclidean_distance(p, &centroids[c]).powi(2))
        .sum()
}

#[expect(clippy::cast_precision_loss)]
fn mean_point<I>(points: &[Vec<f64>], members: I) -> Option<Vec<f64>>
where
    I: IntoIterator<Item = usize>,
{
    let mut count = 0usize;
    let mut sum = vec![0.0; points.first()?.len()];
    for i in members {
        count += 1;
        for (s, v) in sum.iter_mut().zip(&points[i]) {
            *s += v;
        }
    }
    (count > 0).then(|| sum.into_iter().map(|s| s / count as f64).collect())
}

#[expect(clippy::cast_precision_loss)]
fn profile(
    points: &[Vec<f64>],
    dimensions: &[String],
    id: usize,
    members: Vec<usize>,
    centroid: Option<Vec<f64>>,
    outcomes: Option<&[bool]>,
) -> Cluster {
    let size = members.len();
    let cohesion = match &centroid {
        Some(centroid) if size > 0 => {
            members
                .iter()
                .map(|&i| euclidean_distance(&points[i], centroid))
                .sum::<f64>()
                / size as f64
        }
        _ => 0.0,
    };
    let win_rate = outcomes.filter(|_| size > 0).map(|outcomes| {
        members.iter().filter(|&&i| outcomes[i]).count() as f64 / size as f64
    });
    Cluster {
        id,
        centroid,
        distinctiveness: distinctiveness(points, dimensions, &members),
        size,
        share: size as f64 / points.len() as f64,
        cohesion,
        win_rate,
        members,
    }
}

/// Ranked distinctiveness of one member set; empty for an empty cluster.
fn distinctiveness(
    points: &[Vec<f64>],
    dimensions: &[String],
    members: &[usize],
) -> Vec<Distinctiveness> {
    if members.is_empty() {
        return vec![];
    }
    let inside = members.iter().copied().collect::<HashSet<_>>();
    let outside = (0..points.len())
        .filter(|i| !inside.contains(i))
        .collect::<Vec<_>>();
    let mut scores = dimensions
        .iter()
        .enumerate()
        .map(|(j, dimension)| {
            let all = points.iter().map(|p| p[j]).collect::<Vec<_>>();
            let in_values = members.iter().map(|&i| all[i]).collect::<Vec<_>>();
            let out_values = outside.iter().map(|&i| all[i]).collect::<Vec<_>>();
            let mean_in = descriptive::mean(&in_values).unwrap_or(0.0);
            let mean_out = descriptive::mean(&out_values).unwrap_or(mean_in);
            let std_all = descriptive::std_dev(&all)
                .filter(|s| *s > 0.0)
                .unwrap_or(1.0);
            let difference = mean_in - mean_out;
            Distinctiveness {
                dimension: dimension.clone(),
                score: difference.abs() / std_all,
                difference,
            }
        })
        .collect::<Vec<_>>();
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    scores
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("d{i}")).collect()
    }

    fn two_groups() -> Vec<Vec<f64>> {
        [0.0, 0.0, 1.0, 10.0, 10.0, 11.0].map(|v| vec![v]).to_vec()
    }

    fn sorted_centers(result: &ClusterResult) -> Vec<f64> {
        let mut centers = result.centroids.iter().map(|c| c[0]).collect::<Vec<_>>();
        centers.sort_by(f64::total_cmp);
        centers
    }

    mod kmeans {
        use super::*;

        #[test]
        fn test_separated_groups_for_every_seed() {
            for seed in 0..50 {
                let mut rng = Pcg64::seed_from_u64(seed);
                let result = kmeans(&two_groups(), 2, 100, &names(1), &mut rng).unwrap();
                let centers = sorted_centers(&result);
                assert!((centers[0] - 1.0 / 3.0).abs() < 1e-9, "seed {seed}: {centers:?}");
                assert!((centers[1] - 31.0 / 3.0).abs() < 1e-9, "seed {seed}: {centers:?}");
                assert!(result.converged);
                assert!(result.warnings.is_empty());
            }
        }

        #[test]
        fn test_inertia_is_non_increasing() {
            let points = (0..60)
                .map(|i| {
                    let t = f64::from(i);
                    vec![
                        (t * 0.37).sin() * 5.0 + f64::from(i % 3) * 8.0,
                        (t * 0.11).cos() * 4.0,
                    ]
                })
                .collect::<Vec<_>>();
            for seed in 0..10 {
                let mut rng = Pcg64::seed_from_u64(seed);
                let result = kmeans(&points, 3, 100, &names(2), &mut rng).unwrap();
                for pair in result.inertia_history.windows(2) {
                    assert!(pair[1] <= pair[0] + 1e-9, "{:?}", result.inertia_history);
                }
            }
        }

        #[test]
        fn test_same_seed_same_result() {
            let a = kmeans(&two_groups(), 2, 100, &names(1), &mut Pcg64::seed_from_u64(3)).unwrap();
            let b = kmeans(&two_groups(), 2, 100, &names(1), &mut Pcg64::seed_from_u64(3)).unwrap();
            assert_eq!(a, b);
        }

        #[test]
        fn test_invalid_k() {
            let mut rng = Pcg64::seed_from_u64(0);
            for k in [0, 7] {
                let err = kmeans(&two_groups(), k, 10, &names(1), &mut rng).unwrap_err();
                assert_eq!(err, AnalysisError::InvalidK { k, points: 6 });
            }
            let err = kmeans(&[], 1, 10, &names(1), &mut rng).unwrap_err();
            assert_eq!(err, AnalysisError::InvalidK { k: 1, points: 0 });
        }

        #[test]
        fn test_ragged_points() {
            let mut rng = Pcg64::seed_from_u64(0);
            let points = vec![vec![1.0, 2.0], vec![1.0]];
            let err = kmeans(&points, 1, 10, &names(2), &mut rng).unwrap_err();
            assert!(matches!(err, AnalysisError::Validation { .. }));
        }

        #[test]
        fn test_duplicate_points_keep_empty_cluster_centroid() {
            // Only one distinct point: both centroids start on it and the
            // second never receives members.
            let points = vec![vec![2.0, 2.0]; 4];
            let mut rng = Pcg64::seed_from_u64(1);
            let result = kmeans(&points, 2, 10, &names(2), &mut rng).unwrap();
            assert_eq!(result.centroids, vec![vec![2.0, 2.0]; 2]);
            assert_eq!(result.clusters[1].size, 0);
            assert!(result.clusters[1].distinctiveness.is_empty());
            assert!(
                result
                    .warnings
                    .contains(&Warning::EmptyCluster { cluster: 1 })
            );
            assert!(result.converged);
        }

        #[test]
        fn test_cluster_refilled_after_empty_step() {
            // The point at -1 ties between centroids 0 and 1 and goes to 0.
            // Once centroid 0 moves to 2, cluster 1 takes it back.
            let points = [-1.0, 3.0, 4.0, 10.0].map(|v| vec![v]).to_vec();
            let start = vec![vec![1.0], vec![-3.0], vec![10.0]];
            let result = refine(&points, start, 100, &names(1));
            assert_eq!(result.assignments, vec![1, 0, 0, 2]);
            assert!(result.clusters.iter().all(|c| c.size > 0));
            assert!(
                !result
                    .warnings
                    .iter()
                    .any(|w| matches!(w, Warning::EmptyCluster { .. }))
            );
            assert!(result.converged);
        }

        #[test]
        fn test_iteration_cap() {
            // Centroids start at 0 and 1, far from the group means, so one
            // step cannot reach the convergence threshold.
            let points = [0.0, 1.0, 20.0, 21.0, 40.0, 41.0].map(|v| vec![v]).to_vec();
            let start = vec![vec![0.0], vec![1.0]];
            let result = refine(&points, start, 1, &names(1));
            assert_eq!(result.iterations, 1);
            assert!(!result.converged);
            assert_eq!(result.warnings, vec![Warning::NotConverged { iterations: 1 }]);
        }
    }

    mod profile {
        use super::*;

        #[test]
        fn test_cohesion_and_distinctiveness() {
            let points = vec![
                vec![0.0, 5.0],
                vec![2.0, 5.0],
                vec![10.0, 5.0],
                vec![12.0, 5.0],
            ];
            let clusters = analyze(
                &points,
                &[vec![0, 1], vec![2, 3]],
                &["amount".into(), "flat".into()],
                Some(&[true, true, false, true]),
            )
            .unwrap();

            let first = &clusters[0];
            assert_eq!(first.centroid, Some(vec![1.0, 5.0]));
            assert_eq!(first.cohesion, 1.0);
            assert_eq!(first.share, 0.5);
            assert_eq!(first.win_rate, Some(1.0));
            // std of [0, 2, 10, 12] = sqrt(26); zero-spread "flat" uses 1
            assert_eq!(first.distinctiveness[0].dimension, "amount");
            assert!((first.distinctiveness[0].score - 10.0 / 26.0_f64.sqrt()).abs() < 1e-12);
            assert_eq!(first.distinctiveness[0].difference, -10.0);
            assert_eq!(first.distinctiveness[1].score, 0.0);
            assert_eq!(clusters[1].win_rate, Some(0.5));
        }

        #[test]
        fn test_single_cluster_has_zero_distinctiveness() {
            let points = vec![vec![1.0], vec![3.0]];
            let clusters = analyze(&points, &[vec![0, 1]], &names(1), None).unwrap();
            assert_eq!(clusters[0].distinctiveness[0].score, 0.0);
            assert_eq!(clusters[0].win_rate, None);
        }

        #[test]
        fn test_empty_membership() {
            let points = vec![vec![1.0], vec![3.0]];
            let clusters = analyze(&points, &[vec![0, 1], vec![]], &names(1), None).unwrap();
            assert_eq!(clusters[1].centroid, None);
            assert_eq!(clusters[1].cohesion, 0.0);
            assert_eq!(clusters[1].size, 0);
        }

        #[test]
        fn test_out_of_range_member() {
            let points = vec![vec![1.0]];
            assert!(analyze(&points, &[vec![3]], &names(1), None).is_err());
        }
    }
}
