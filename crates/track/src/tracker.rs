//! Module for the two-frame tracking procedure

// crate modules
use crate::error::{Error, Result};

// wxtools modules
use wxtools_cluster::{Cluster, ClusterList, Histogram};
use wxtools_field::Point;
use wxtools_utils::SliceExt;

// external crates
use itertools::iproduct;
use log::{debug, info, warn};

// standard library
use std::collections::HashSet;

/// Configuration of a tracking run
///
/// The three correlation weights must sum to one. The mean-velocity
/// constraint is an optional second displacement bound: a running mean of
/// the accepted pairing velocities (seeded with `max_velocity`), scaled by
/// the security percentage.
#[derive(Debug, Clone)]
pub struct TrackingParams {
    /// Weight of the displacement term (w_d)
    pub dist_weight: f64,
    /// Weight of the histogram size term (w_s)
    pub size_weight: f64,
    /// Weight of the rank-correlation term (w_c)
    pub corr_weight: f64,
    /// Time between the two frames, seconds
    pub delta_t: f64,
    /// Largest time delta tracking is attempted over, seconds
    pub max_delta_t: f64,
    /// Physical maximum object speed, coordinate units per second
    pub max_velocity: f64,
    /// Coverage above which merge/split candidates qualify
    pub merge_threshold: f64,
    /// Also accept pairings within the running mean-velocity bound
    pub use_mean_velocity_constraint: bool,
    /// Allowed deviation factor from the running mean velocity
    pub mean_velocity_security: f64,
    /// Bin count of the correlation histograms
    pub histogram_bins: usize,
}

impl Default for TrackingParams {
    fn default() -> Self {
        Self {
            dist_weight: 1.0 / 3.0,
            size_weight: 1.0 / 3.0,
            corr_weight: 1.0 / 3.0,
            delta_t: 300.0,
            max_delta_t: 930.0,
            max_velocity: 27.0,
            merge_threshold: 0.33,
            use_mean_velocity_constraint: false,
            mean_velocity_security: 0.5,
            histogram_bins: 25,
        }
    }
}

/// Compares two cluster lists and propagates or assigns identifiers
///
/// ```rust, no_run
/// # use wxtools_track::{Tracking, TrackingParams};
/// # use wxtools_cluster::read_cluster_file;
/// let previous = read_cluster_file("clusters_1155.json").unwrap();
/// let current = read_cluster_file("clusters_1200.json").unwrap();
/// let mut previous_list = previous.cluster_list;
/// let mut current_list = current.cluster_list;
///
/// let tracking = Tracking::new(TrackingParams::default()).unwrap();
/// tracking
///     .track(
///         &mut previous_list,
///         &previous.feature_space.points,
///         &mut current_list,
///         &current.feature_space.points,
///         2,   // spatial rank
///         0,   // tracking variable
///         0.0, // valid minimum
///         75.0,
///     )
///     .unwrap();
/// ```
#[derive(Debug)]
pub struct Tracking {
    params: TrackingParams,
}

impl Tracking {
    /// Validate the parameters and set up a tracker
    pub fn new(params: TrackingParams) -> Result<Self> {
        let weight_sum = params.dist_weight + params.size_weight + params.corr_weight;
        if (weight_sum - 1.0).abs() > 1e-9 {
            return Err(Error::InvalidParameter(format!(
                "correlation weights must sum to 1, found {weight_sum}"
            )));
        }
        if params.delta_t <= 0.0 {
            return Err(Error::InvalidParameter(
                "time delta must be positive".to_string(),
            ));
        }
        if params.histogram_bins == 0 {
            return Err(Error::InvalidParameter(
                "histogram bin count must be positive".to_string(),
            ));
        }
        Ok(Self { params })
    }

    /// Match the current frame against the previous one
    ///
    /// Assigns every current cluster an identifier: matched clusters
    /// inherit the previous identifier, merge and split products are
    /// re-tagged fresh, and the remainder get the next unused ids. The
    /// current list's `tracked_ids`, `new_ids`, and `dropped_ids` record
    /// the outcome.
    #[allow(clippy::too_many_arguments)]
    pub fn track(
        &self,
        previous: &mut ClusterList,
        previous_arena: &[Point],
        current: &mut ClusterList,
        current_arena: &[Point],
        spatial_rank: usize,
        variable: usize,
        valid_min: f64,
        valid_max: f64,
    ) -> Result<()> {
        let params = &self.params;
        let mut next_id = previous.highest_id() + 1;

        current.erase_identifiers();
        current.tracked_ids.clear();
        current.new_ids.clear();
        current.dropped_ids.clear();

        if params.delta_t > params.max_delta_t {
            warn!(
                "time delta {}s exceeds the {}s limit, starting a fresh series",
                params.delta_t, params.max_delta_t
            );
            for cluster in &mut current.clusters {
                cluster.id = next_id;
                current.new_ids.push(next_id);
                next_id += 1;
            }
            current.dropped_ids = previous.clusters.iter().map(|c| c.id).collect();
            current.tracking_performed = true;
            return Ok(());
        }

        if current.is_empty() {
            info!("no current clusters, nothing to match");
            current.dropped_ids = previous.clusters.iter().map(|c| c.id).collect();
            current.tracking_performed = true;
            return Ok(());
        }

        let n = current.len();
        let m = previous.len();
        debug!("tracking {n} current against {m} previous clusters");

        // histograms and weighted centres, cached on the clusters
        let bins = params.histogram_bins;
        let hists_n: Vec<Histogram> = current
            .clusters
            .iter_mut()
            .map(|c| {
                c.histogram(current_arena, variable, bins, valid_min, valid_max)
                    .clone()
            })
            .collect();
        let hists_m: Vec<Histogram> = previous
            .clusters
            .iter_mut()
            .map(|c| {
                c.histogram(previous_arena, variable, bins, valid_min, valid_max)
                    .clone()
            })
            .collect();
        let centers_n: Vec<Vec<f64>> = current
            .clusters
            .iter()
            .map(|c| c.weighed_center(current_arena, spatial_rank, variable))
            .collect();
        let centers_m: Vec<Vec<f64>> = previous
            .clusters
            .iter()
            .map(|c| c.weighed_center(previous_arena, spatial_rank, variable))
            .collect();

        // correlation matrices
        let mut displacement = vec![vec![0.0; m]; n];
        let mut hist_diff = vec![vec![0.0; m]; n];
        let mut rank_corr = vec![vec![0.0; m]; n];
        let mut cover_old_by_new = vec![vec![0.0; m]; n];
        let mut cover_new_by_old = vec![vec![0.0; m]; n];

        for (ni, mi) in iproduct!(0..n, 0..m) {
            displacement[ni][mi] = centers_n[ni].distance_to(&centers_m[mi]);
            rank_corr[ni][mi] = hists_n[ni].correlate_kendall(&hists_m[mi]);

            let (sum_n, sum_m) = (hists_n[ni].sum(), hists_m[mi].sum());
            let max_size = sum_n.max(sum_m);
            hist_diff[ni][mi] = if max_size == 0 {
                0.0
            } else {
                (sum_n as f64 - sum_m as f64).abs() / max_size as f64
            };

            cover_old_by_new[ni][mi] = previous.clusters[mi].percent_covered_by(
                previous_arena,
                &current.clusters[ni],
                current_arena,
            );
            cover_new_by_old[ni][mi] = current.clusters[ni].percent_covered_by(
                current_arena,
                &previous.clusters[mi],
                previous_arena,
            );
        }

        // cannot have zeros in the normalisation maxima
        let max_displacement = displacement
            .iter()
            .flatten()
            .fold(f64::MIN_POSITIVE, |a, &b| a.max(b));
        let max_hist_diff = hist_diff.iter().flatten().fold(0.0_f64, |a, &b| a.max(b));
        let max_hist_diff = if max_hist_diff == 0.0 { 1.0 } else { max_hist_diff };

        let mut probability = vec![vec![0.0; m]; n];
        for (ni, mi) in iproduct!(0..n, 0..m) {
            let value = params.dist_weight * erfc(displacement[ni][mi] / max_displacement)
                + params.size_weight * erfc(hist_diff[ni][mi] / max_hist_diff)
                + params.corr_weight * rank_corr[ni][mi];
            if !value.is_finite() {
                return Err(Error::NumericInstability(
                    "the correlation matrix".to_string(),
                ));
            }
            probability[ni][mi] = value;
        }

        // greedy matching in strictly descending probability order
        let displacement_limit = params.max_velocity * params.delta_t;
        let mut used: HashSet<usize> = HashSet::new();
        let mut current_max = f64::INFINITY;
        let mut mean_velocity = params.max_velocity;
        let mut velocity_sum = 0.0;
        let mut velocity_count = 0_usize;

        for _ in 0..(n * m) {
            // ties resolve to the lowest (n, m) through the strict compare
            let mut best: Option<(usize, usize, f64)> = None;
            for (ni, mi) in iproduct!(0..n, 0..m) {
                let value = probability[ni][mi];
                if value < current_max && best.map_or(true, |(_, _, b)| value > b) {
                    best = Some((ni, mi, value));
                }
            }
            let Some((ni, mi, value)) = best else { break };
            current_max = value;

            let distance = displacement[ni][mi];
            let within_limit = distance <= displacement_limit
                || (params.use_mean_velocity_constraint
                    && distance
                        <= mean_velocity * params.mean_velocity_security * params.delta_t);

            if !within_limit {
                debug!(
                    "pairing {ni}/{} rejected, dR={distance:.1} violates the velocity constraint",
                    previous.clusters[mi].id
                );
            } else if current.clusters[ni].id == Cluster::NO_ID && !used.contains(&mi) {
                let id = previous.clusters[mi].id;
                let velocity = distance / params.delta_t;
                info!(
                    "cluster {ni} continues #{id} (p={value:.4}, velocity {velocity:.1})"
                );

                current.clusters[ni].id = id;
                current.tracked_ids.push(id);
                used.insert(mi);

                velocity_sum += velocity;
                velocity_count += 1;
                mean_velocity = velocity_sum / velocity_count as f64;
            }
        }

        // merge detection over coverage of old by new
        for ni in 0..n {
            let candidates: Vec<usize> = (0..m)
                .filter(|&mi| cover_old_by_new[ni][mi] > params.merge_threshold)
                .collect();
            if candidates.len() < 2 {
                continue;
            }

            let merged: Vec<u64> = candidates.iter().map(|&mi| previous.clusters[mi].id).collect();
            info!("clusters {merged:?} appear to have merged into cluster {ni}");

            let id = current.clusters[ni].id;
            if id != Cluster::NO_ID && current.tracked_ids.contains(&id) {
                current.tracked_ids.retain(|&t| t != id);
                current.clusters[ni].id = next_id;
                current.new_ids.push(next_id);
                info!("merge product re-tagged as #{next_id}");
                next_id += 1;
            }
        }

        // split detection over coverage of new by old
        for mi in 0..m {
            let candidates: Vec<usize> = (0..n)
                .filter(|&ni| cover_new_by_old[ni][mi] > params.merge_threshold)
                .collect();
            if candidates.len() < 2 {
                continue;
            }

            info!(
                "cluster #{} appears to have split into {candidates:?}",
                previous.clusters[mi].id
            );
            for ni in candidates {
                let id = current.clusters[ni].id;
                if id != Cluster::NO_ID && current.tracked_ids.contains(&id) {
                    current.tracked_ids.retain(|&t| t != id);
                    current.clusters[ni].id = next_id;
                    current.new_ids.push(next_id);
                    info!("split product re-tagged as #{next_id}");
                    next_id += 1;
                }
            }
        }

        // everything still unidentified gets the next unused id
        for cluster in &mut current.clusters {
            if cluster.id == Cluster::NO_ID {
                cluster.id = next_id;
                current.new_ids.push(next_id);
                next_id += 1;
            }
        }

        // previous identities that did not survive into this frame
        current.dropped_ids = previous
            .clusters
            .iter()
            .map(|c| c.id)
            .filter(|id| !current.tracked_ids.contains(id))
            .collect();

        current.tracking_performed = true;
        Ok(())
    }
}

/// Complementary error function, 1 - erf(x)
fn erfc(x: f64) -> f64 {
    1.0 - erf(x)
}

/// Error function (Abramowitz and Stegun 7.1.26 approximation)
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn erfc_anchors() {
        assert!((erfc(0.0) - 1.0).abs() < 1e-7);
        assert!(erfc(3.0) < 3e-5);
        assert!((erfc(-3.0) - 2.0).abs() < 3e-5);
    }

    #[test]
    fn erfc_is_monotonically_decreasing() {
        let mut last = f64::INFINITY;
        for i in 0..25 {
            let value = erfc(f64::from(i) * 0.1);
            assert!(value < last);
            last = value;
        }
    }

    #[rstest]
    #[case(0.5, 0.3, 0.3)] // sums to 1.1
    #[case(0.2, 0.2, 0.2)] // sums to 0.6
    fn unbalanced_weights_are_rejected(#[case] d: f64, #[case] s: f64, #[case] c: f64) {
        let params = TrackingParams {
            dist_weight: d,
            size_weight: s,
            corr_weight: c,
            ..Default::default()
        };
        assert!(matches!(
            Tracking::new(params),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn non_positive_delta_t_is_rejected() {
        let params = TrackingParams {
            delta_t: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            Tracking::new(params),
            Err(Error::InvalidParameter(_))
        ));
    }
}
